//! Choosing which agents receive learned weights.
//!
//! Elites are never touched: they carry the population's best evolved
//! behavior. From the rest, only agents inside a fitness percentile band
//! are eligible (by default the middle of the pack, where there is room
//! to improve but enough competence to build on), and a random sample of
//! those is taken.
//!
//! Percentiles are assigned by rank with the midpoint convention: among
//! `n` eligible agents sorted best first, the agent at position `p` sits at
//! percentile `1 - (p + 0.5) / n`.

use rand::{Rng, seq::IndexedRandom};

use crate::{
    config::ImitationConfig,
    population::{Agent, AgentId},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCandidate {
    pub id: AgentId,
    pub fitness: f32,
    pub alive: bool,
}

impl TargetCandidate {
    pub fn from_agent<A>(agent: &A) -> Self
    where
        A: Agent + ?Sized,
    {
        Self {
            id: agent.id(),
            fitness: agent.fitness(),
            alive: agent.is_alive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSelection {
    pub elite_count: usize,
    pub min_percentile: f32,
    pub max_percentile: f32,
    pub count: usize,
}

impl TargetSelection {
    #[must_use]
    pub fn from_config(config: &ImitationConfig, elite_count: usize) -> Self {
        Self {
            elite_count,
            min_percentile: config.min_fitness_percentile,
            max_percentile: config.max_fitness_percentile,
            count: config.target_count,
        }
    }

    /// Eligible candidates, best first: elites removed, dead agents
    /// removed, then restricted to the percentile band.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn band(&self, candidates: &[TargetCandidate]) -> Vec<TargetCandidate> {
        let mut ranked = candidates.to_vec();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        let remainder = ranked
            .into_iter()
            .skip(self.elite_count)
            .filter(|c| c.alive)
            .collect::<Vec<_>>();
        let n = remainder.len() as f32;
        remainder
            .into_iter()
            .enumerate()
            .filter(|(p, _)| {
                let percentile = 1.0 - (*p as f32 + 0.5) / n;
                (self.min_percentile..=self.max_percentile).contains(&percentile)
            })
            .map(|(_, c)| c)
            .collect()
    }

    /// Randomly samples up to `count` agents from the band.
    pub fn select<R>(&self, candidates: &[TargetCandidate], rng: &mut R) -> Vec<AgentId>
    where
        R: Rng + ?Sized,
    {
        self.band(candidates)
            .choose_multiple(rng, self.count)
            .map(|c| c.id)
            .collect()
    }
}
