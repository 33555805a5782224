//! The engine's view of the evolutionary population.
//!
//! The population manager owns the agents, their fitness and generation
//! advancement. The engine only reads fitness, rewrites weights and raises
//! the pause flag while it does so.

use mimic_network::NetworkWeights;

/// Stable identity of an agent across generations.
pub type AgentId = u64;

pub trait Agent {
    fn id(&self) -> AgentId;

    fn fitness(&self) -> f32;

    fn is_alive(&self) -> bool;

    fn weights(&self) -> &NetworkWeights;

    fn weights_mut(&mut self) -> &mut NetworkWeights;

    fn set_weights(&mut self, weights: NetworkWeights) {
        *self.weights_mut() = weights;
    }

    /// Task-specific efficiency in `[0, 1]`, e.g. the share of jumps that
    /// cleared an obstacle.
    fn task_efficiency(&self) -> Option<f32> {
        None
    }

    /// Share of the reachable area this agent explored, in `[0, 1]`.
    fn exploration(&self) -> Option<f32> {
        None
    }
}

pub trait Population {
    type Agent: Agent;

    /// Monotonically increasing generation index.
    fn generation(&self) -> u64;

    /// Number of top agents the evolutionary process protects.
    fn elite_count(&self) -> usize;

    fn agents(&self) -> &[Self::Agent];

    fn agents_mut(&mut self) -> &mut [Self::Agent];

    fn agent_mut(&mut self, id: AgentId) -> Option<&mut Self::Agent> {
        self.agents_mut().iter_mut().find(|a| a.id() == id)
    }

    /// Raised by the engine while it rewrites weights.
    fn set_paused(&mut self, paused: bool);

    fn fitnesses(&self) -> Vec<f32> {
        self.agents().iter().map(Agent::fitness).collect()
    }

    fn best_agent(&self) -> Option<&Self::Agent> {
        self.agents()
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
    }
}
