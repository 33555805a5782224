//! Tunables of the imitation-learning engine.
//!
//! Everything lives in one flat [`ImitationConfig`]. Missing JSON fields
//! take their default, so a config file only needs the values it changes:
//!
//! ```json
//! { "blend_strength": 0.4, "multi_layer": true }
//! ```

use std::{fs::File, io, io::BufReader, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("failed to open config file {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse config file {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[display("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[display("fitness percentile band is empty: min {min} > max {max}")]
    EmptyBand { min: f32, max: f32 },
    #[display("strength bounds are inverted: min {min} > max {max}")]
    InvertedStrengthBounds { min: f32, max: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImitationConfig {
    // demonstration capture
    /// Number of sessions kept on disk, ranked by total fitness.
    pub max_saved_sessions: usize,
    /// Frames scoring below this quality are never recorded.
    pub min_frame_quality: f32,
    /// Minimum displacement since the last accepted frame.
    pub movement_threshold: f32,
    /// Minimum summed sensor and action change since the last accepted frame.
    pub change_threshold: f32,

    // trigger
    pub min_cooldown_generations: u64,
    /// Learning fires unconditionally once this many generations pass.
    pub max_interval_generations: u64,
    pub stagnation_threshold: f32,
    /// Relative drop of the recent 3-generation average that counts as decline.
    pub decline_threshold: f32,
    /// Population fitness coefficient of variation below which diversity is low.
    pub low_diversity_threshold: f32,
    pub require_quality_demonstrations: bool,
    pub quality_multiplier: f32,
    pub fitness_window: usize,
    pub improvement_epsilon: f32,

    // learning
    pub use_all_sessions: bool,
    pub max_sessions: usize,
    pub learning_rate: f32,
    pub multi_layer: bool,
    /// Deepest layers modified in multi-layer mode (1 to 3).
    pub layers_to_modify: usize,
    /// Learning rate multiplier per layer of depth.
    pub layer_decay: f32,
    pub use_curriculum: bool,
    /// Population percentile (0-100) compared against stage mastery.
    pub curriculum_percentile: f32,
    /// Multiplier applied to every stage's mastery fitness.
    pub curriculum_mastery_scale: f32,

    // application
    pub blend_strength: f32,
    pub target_count: usize,
    pub min_fitness_percentile: f32,
    pub max_fitness_percentile: f32,

    // validation
    pub validation_enabled: bool,
    pub validation_generations: u64,
    pub min_improvement: f32,
    pub auto_rollback: bool,
    pub adaptive_strength: bool,
    pub min_strength: f32,
    pub max_strength: f32,
}

impl Default for ImitationConfig {
    fn default() -> Self {
        Self {
            max_saved_sessions: 3,
            min_frame_quality: 0.3,
            movement_threshold: 0.1,
            change_threshold: 0.05,

            min_cooldown_generations: 5,
            max_interval_generations: 25,
            stagnation_threshold: 0.6,
            decline_threshold: 0.05,
            low_diversity_threshold: 0.05,
            require_quality_demonstrations: true,
            quality_multiplier: 1.0,
            fitness_window: 10,
            improvement_epsilon: 0.5,

            use_all_sessions: false,
            max_sessions: 3,
            learning_rate: 0.1,
            multi_layer: false,
            layers_to_modify: 2,
            layer_decay: 0.5,
            use_curriculum: true,
            curriculum_percentile: 75.0,
            curriculum_mastery_scale: 1.0,

            blend_strength: 0.3,
            target_count: 5,
            min_fitness_percentile: 0.2,
            max_fitness_percentile: 0.8,

            validation_enabled: true,
            validation_generations: 3,
            min_improvement: 0.05,
            auto_rollback: true,
            adaptive_strength: true,
            min_strength: 0.1,
            max_strength: 0.8,
        }
    }
}

impl ImitationConfig {
    pub fn from_json_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
                path: path.to_owned(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("blend_strength", self.blend_strength),
            ("min_strength", self.min_strength),
            ("max_strength", self.max_strength),
            ("min_fitness_percentile", self.min_fitness_percentile),
            ("max_fitness_percentile", self.max_fitness_percentile),
            ("stagnation_threshold", self.stagnation_threshold),
            ("decline_threshold", self.decline_threshold),
            ("layer_decay", self.layer_decay),
        ] {
            check_range(field, value, 0.0, 1.0)?;
        }
        check_range("curriculum_percentile", self.curriculum_percentile, 0.0, 100.0)?;
        check_range("min_frame_quality", self.min_frame_quality, 0.0, 5.0)?;
        for (field, value) in [
            ("movement_threshold", self.movement_threshold),
            ("change_threshold", self.change_threshold),
            ("low_diversity_threshold", self.low_diversity_threshold),
            ("quality_multiplier", self.quality_multiplier),
            ("improvement_epsilon", self.improvement_epsilon),
            ("learning_rate", self.learning_rate),
            ("curriculum_mastery_scale", self.curriculum_mastery_scale),
        ] {
            check_range(field, value, 0.0, f32::MAX)?;
        }
        for (field, value) in [
            ("max_saved_sessions", self.max_saved_sessions),
            ("max_sessions", self.max_sessions),
            ("fitness_window", self.fitness_window),
            ("layers_to_modify", self.layers_to_modify),
            ("target_count", self.target_count),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.validation_enabled && self.validation_generations == 0 {
            return Err(ConfigError::Zero {
                field: "validation_generations",
            });
        }
        if self.min_fitness_percentile > self.max_fitness_percentile {
            return Err(ConfigError::EmptyBand {
                min: self.min_fitness_percentile,
                max: self.max_fitness_percentile,
            });
        }
        if self.min_strength > self.max_strength {
            return Err(ConfigError::InvertedStrengthBounds {
                min: self.min_strength,
                max: self.max_strength,
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ImitationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ImitationConfig =
            serde_json::from_str(r#"{ "blend_strength": 0.5, "multi_layer": true }"#).unwrap();
        assert!((config.blend_strength - 0.5).abs() < f32::EPSILON);
        assert!(config.multi_layer);
        assert_eq!(config.max_saved_sessions, 3);
    }

    #[test]
    fn test_rejects_out_of_range_strength() {
        let config = ImitationConfig {
            blend_strength: 1.5,
            ..ImitationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "blend_strength",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_inverted_band() {
        let config = ImitationConfig {
            min_fitness_percentile: 0.9,
            max_fitness_percentile: 0.1,
            ..ImitationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBand { .. })));
    }

    #[test]
    fn test_nan_is_rejected() {
        let config = ImitationConfig {
            learning_rate: f32::NAN,
            ..ImitationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imitation.json");
        std::fs::write(&path, r#"{ "target_count": 0 }"#).unwrap();
        assert!(matches!(
            ImitationConfig::from_json_file(&path),
            Err(ConfigError::Zero {
                field: "target_count"
            })
        ));

        std::fs::write(&path, r#"{ "target_count": 8 }"#).unwrap();
        assert_eq!(ImitationConfig::from_json_file(&path).unwrap().target_count, 8);
    }
}
