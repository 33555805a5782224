//! In-memory agents and populations for unit tests.

use mimic_network::NetworkWeights;

use crate::{
    demonstration::{action, sensor},
    population::{Agent, AgentId, Population},
};

pub(crate) const LAYER_SIZES: [usize; 3] = [sensor::WIDTH, 6, action::WIDTH];

#[derive(Debug, Clone)]
pub(crate) struct TestAgent {
    pub id: AgentId,
    pub fitness: f32,
    pub alive: bool,
    pub weights: NetworkWeights,
    pub efficiency: Option<f32>,
}

impl TestAgent {
    #[expect(clippy::cast_precision_loss)]
    pub fn new(id: AgentId, fitness: f32) -> Self {
        let weights = NetworkWeights::from_fn(&LAYER_SIZES, |layer, row, col| {
            let seed = (usize::try_from(id).unwrap() + layer * 31 + row * 7 + col * 3) % 17;
            (seed as f32 / 8.5) - 1.0
        })
        .unwrap();
        Self {
            id,
            fitness,
            alive: true,
            weights,
            efficiency: None,
        }
    }
}

impl Agent for TestAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn fitness(&self) -> f32 {
        self.fitness
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn weights(&self) -> &NetworkWeights {
        &self.weights
    }

    fn weights_mut(&mut self) -> &mut NetworkWeights {
        &mut self.weights
    }

    fn task_efficiency(&self) -> Option<f32> {
        self.efficiency
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TestPopulation {
    pub generation: u64,
    pub elite_count: usize,
    pub agents: Vec<TestAgent>,
    pub pause_events: Vec<bool>,
}

impl TestPopulation {
    /// One agent per fitness value, with ids `0..n`.
    pub fn with_fitness(fitness: &[f32]) -> Self {
        Self {
            agents: fitness
                .iter()
                .zip(0..)
                .map(|(&f, id)| TestAgent::new(id, f))
                .collect(),
            ..Self::default()
        }
    }
}

impl Population for TestPopulation {
    type Agent = TestAgent;

    fn generation(&self) -> u64 {
        self.generation
    }

    fn elite_count(&self) -> usize {
        self.elite_count
    }

    fn agents(&self) -> &[TestAgent] {
        &self.agents
    }

    fn agents_mut(&mut self) -> &mut [TestAgent] {
        &mut self.agents
    }

    fn set_paused(&mut self, paused: bool) {
        self.pause_events.push(paused);
    }
}
