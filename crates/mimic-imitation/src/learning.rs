//! Distilling demonstration frames into a weight delta.
//!
//! Learning is a single Hebbian-style pass over the admitted frames. For a
//! modified connection layer with input signal `x` and target signal `t`,
//! every frame adds
//!
//! ```text
//! delta[i][j] += rate(quality, depth) * x[i] * t[j]
//! rate(q, d)   = learning_rate * q * layer_decay^d
//! ```
//!
//! where depth `0` is the output layer. The output layer's input is the
//! activation of the last hidden layer and its target is the human action
//! weighted per dimension by the curriculum stage. `x` equals the frame's
//! sensor vector only for a network without hidden layers; otherwise it is
//! what the reference network's hidden layer computes from those sensors. A hidden layer's input
//! is the activation of its source layer and its target is the reference
//! network's activation of the destination neuron scaled by the
//! behavior-weighted mean action, so frames with strong intent reinforce
//! the features the reference network already uses for them.
//!
//! After all frames the accumulated delta is divided by the number of
//! frames processed and clamped to `[-2, 2]`.

use mimic_network::{NetworkWeights, ShapeError};
use tracing::{debug, warn};

use crate::{
    config::ImitationConfig,
    curriculum::CurriculumStage,
    demonstration::{DemonstrationFrame, DemonstrationSession},
};

pub const LEARNED_WEIGHT_LIMIT: f32 = 2.0;

/// Maximum number of layers modified in multi-layer mode.
pub const MAX_MODIFIED_LAYERS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LearnedLayer {
    /// Connection layer of the agent network this buffer maps onto.
    pub layer_index: usize,
    pub rows: usize,
    pub cols: usize,
    /// Row-major, same layout as [`NetworkWeights::layer`].
    pub weights: Vec<f32>,
}

/// Learned weights for the deepest layers of a network, deepest first.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedWeightSet {
    pub layers: Vec<LearnedLayer>,
    pub frames_processed: usize,
    pub sessions_used: usize,
}

impl LearnedWeightSet {
    /// Zero buffers shaped like the `layer_count` deepest layers of `reference`.
    #[must_use]
    pub fn zeros_for(reference: &NetworkWeights, layer_count: usize) -> Self {
        let total = reference.layer_count();
        let layers = (0..layer_count.min(total))
            .filter_map(|depth| {
                let layer_index = total - 1 - depth;
                let (rows, cols) = reference.layer_dims(layer_index)?;
                Some(LearnedLayer {
                    layer_index,
                    rows,
                    cols,
                    weights: vec![0.0; rows * cols],
                })
            })
            .collect();
        Self {
            layers,
            frames_processed: 0,
            sessions_used: 0,
        }
    }

    #[must_use]
    pub fn layer_indices(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.layer_index).collect()
    }

    /// Blends every learned layer into `weights` with the given strength.
    ///
    /// Shapes are checked for all layers before any weight is touched, so a
    /// mismatching network is left unchanged.
    pub fn apply_to(&self, weights: &mut NetworkWeights, strength: f32) -> Result<(), ShapeError> {
        for layer in &self.layers {
            match weights.layer_dims(layer.layer_index) {
                Some(dims) if dims == (layer.rows, layer.cols) => {}
                Some((rows, cols)) => {
                    return Err(ShapeError::LengthMismatch {
                        layer: layer.layer_index,
                        expected: rows * cols,
                        actual: layer.weights.len(),
                    });
                }
                None => {
                    return Err(ShapeError::LayerOutOfRange {
                        layer: layer.layer_index,
                        layer_count: weights.layer_count(),
                    });
                }
            }
        }
        for layer in &self.layers {
            weights.blend_layer(layer.layer_index, &layer.weights, strength)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerSettings {
    pub learning_rate: f32,
    pub multi_layer: bool,
    pub layers_to_modify: usize,
    pub layer_decay: f32,
}

impl LearnerSettings {
    #[must_use]
    pub fn from_config(config: &ImitationConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            multi_layer: config.multi_layer,
            layers_to_modify: config.layers_to_modify,
            layer_decay: config.layer_decay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemonstrationLearner {
    settings: LearnerSettings,
}

impl DemonstrationLearner {
    #[must_use]
    pub fn new(settings: LearnerSettings) -> Self {
        Self { settings }
    }

    /// How many of `reference`'s deepest layers are modified.
    #[must_use]
    pub fn modified_layer_count(&self, reference: &NetworkWeights) -> usize {
        if self.settings.multi_layer {
            self.settings
                .layers_to_modify
                .clamp(1, MAX_MODIFIED_LAYERS)
                .min(reference.layer_count())
        } else {
            1
        }
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    #[must_use]
    pub fn learning_rate(&self, quality: f32, depth: usize) -> f32 {
        self.settings.learning_rate * quality * self.settings.layer_decay.powi(depth as i32)
    }

    /// Learns from every frame of `sessions` admitted by `stage`.
    ///
    /// Without a stage (curriculum disabled) every frame is admitted and
    /// every behavior weight is `1`. Frames whose widths do not match the
    /// reference network are skipped. Returns `None` if no frame was
    /// processed.
    #[expect(clippy::cast_precision_loss)]
    pub fn learn<'a, I>(
        &self,
        sessions: I,
        reference: &NetworkWeights,
        stage: Option<&CurriculumStage>,
    ) -> Option<LearnedWeightSet>
    where
        I: IntoIterator<Item = &'a DemonstrationSession>,
    {
        let mut learned = LearnedWeightSet::zeros_for(reference, self.modified_layer_count(reference));
        let mut rejected = 0;
        let mut mismatched = 0;

        for session in sessions {
            let mut used = false;
            for frame in &session.frames {
                if stage.is_some_and(|s| !s.admits(frame)) {
                    rejected += 1;
                    continue;
                }
                if self.accumulate(&mut learned, frame, reference, stage).is_err() {
                    mismatched += 1;
                    continue;
                }
                learned.frames_processed += 1;
                used = true;
            }
            if used {
                learned.sessions_used += 1;
            }
        }

        if mismatched > 0 {
            warn!(
                frames = mismatched,
                inputs = reference.input_width(),
                outputs = reference.output_width(),
                "skipped demonstration frames not matching the network shape"
            );
        }
        debug!(
            processed = learned.frames_processed,
            rejected,
            sessions = learned.sessions_used,
            "demonstration frames processed"
        );
        if learned.frames_processed == 0 {
            return None;
        }

        let n = learned.frames_processed as f32;
        for layer in &mut learned.layers {
            for w in &mut layer.weights {
                *w = (*w / n).clamp(-LEARNED_WEIGHT_LIMIT, LEARNED_WEIGHT_LIMIT);
            }
        }
        Some(learned)
    }

    fn accumulate(
        &self,
        learned: &mut LearnedWeightSet,
        frame: &DemonstrationFrame,
        reference: &NetworkWeights,
        stage: Option<&CurriculumStage>,
    ) -> Result<(), ShapeError> {
        if frame.human_actions.len() != reference.output_width() {
            return Err(ShapeError::InputWidth {
                expected: reference.output_width(),
                actual: frame.human_actions.len(),
            });
        }
        let activations = reference.activations(&frame.sensor_inputs)?;
        let output_layer = reference.layer_count() - 1;

        let behavior_weight = |j: usize| stage.map_or(1.0, |s| s.behavior_weight(j));
        let action_target = frame
            .human_actions
            .iter()
            .enumerate()
            .map(|(j, a)| behavior_weight(j) * a)
            .collect::<Vec<_>>();
        let weight_sum = (0..action_target.len()).map(behavior_weight).sum::<f32>();
        let mean_action = if weight_sum > f32::EPSILON {
            action_target.iter().sum::<f32>() / weight_sum
        } else {
            0.0
        };

        for (depth, layer) in learned.layers.iter_mut().enumerate() {
            let rate = self.learning_rate(frame.frame_quality, depth);
            let input = &activations[layer.layer_index];
            let target = if layer.layer_index == output_layer {
                action_target.clone()
            } else {
                activations[layer.layer_index + 1]
                    .iter()
                    .map(|a| a * mean_action)
                    .collect()
            };
            for (i, x) in input.iter().enumerate().take(layer.rows) {
                let row = &mut layer.weights[i * layer.cols..(i + 1) * layer.cols];
                for (w, t) in row.iter_mut().zip(&target) {
                    *w += rate * x * t;
                }
            }
        }
        Ok(())
    }
}
