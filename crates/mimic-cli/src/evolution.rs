//! Genetic algorithm over network weights.
//!
//! Each generation every individual drives the course once and receives
//! its episode fitness. The next generation is built as follows:
//!
//! 1. **Elite Selection** - the top `elite_count` individuals are carried
//!    over unchanged, keeping their ids
//! 2. **Tournament Selection** - parents are the fittest of random groups
//! 3. **Crossover (BLX-α)** - offspring weights are sampled around both parents
//! 4. **Mutation** - sparse Gaussian noise
//!
//! Offspring get fresh ids, so an agent id always refers to one fixed
//! lineage step. Agents held by the caller (those awaiting validation of
//! an imitation step) are carried over like elites but never become
//! parents, since their fitness predates their current weights. The
//! population implements the imitation engine's
//! [`mimic_imitation::Population`] view.

use std::thread;

use mimic_imitation::{Agent, AgentId};
use mimic_network::{NetworkWeights, ShapeError, weights};
use mimic_stats::descriptive::DescriptiveStats;
use rand::{Rng, seq::IndexedRandom};

use crate::course::{Course, Episode, NetworkController};

#[derive(Debug, Clone)]
pub(crate) struct Individual {
    id: AgentId,
    weights: NetworkWeights,
    fitness: f32,
    alive: bool,
    task_efficiency: Option<f32>,
    exploration: Option<f32>,
}

impl Individual {
    fn new(id: AgentId, weights: NetworkWeights) -> Self {
        Self {
            id,
            weights,
            fitness: 0.0,
            alive: true,
            task_efficiency: None,
            exploration: None,
        }
    }

    fn record(&mut self, episode: &Episode) {
        self.fitness = episode.fitness;
        self.alive = episode.alive;
        self.task_efficiency = episode.task_efficiency;
        self.exploration = Some(episode.exploration);
    }
}

impl Agent for Individual {
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
        self.task_efficiency
    }

    fn exploration(&self) -> Option<f32> {
        self.exploration
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Population {
    generation: u64,
    elite_count: usize,
    individuals: Vec<Individual>,
    next_id: AgentId,
    paused: bool,
}

impl Population {
    pub fn random<R>(
        count: usize,
        layer_sizes: &[usize],
        elite_count: usize,
        rng: &mut R,
    ) -> Result<Self, ShapeError>
    where
        R: Rng + ?Sized,
    {
        let weights = (0..count)
            .map(|_| NetworkWeights::random(rng, layer_sizes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_weights(weights, elite_count))
    }

    /// Seeds a population from one network: the first individual is an
    /// exact copy, the rest are mutated copies.
    pub fn from_template<R>(
        template: &NetworkWeights,
        count: usize,
        elite_count: usize,
        sigma: f32,
        rng: &mut R,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let weights = (0..count)
            .map(|i| {
                let mut w = template.clone();
                if i > 0 {
                    w.mutate(rng, 1.0, sigma);
                }
                w
            })
            .collect();
        Self::from_weights(weights, elite_count)
    }

    fn from_weights(weights: Vec<NetworkWeights>, elite_count: usize) -> Self {
        let individuals = weights
            .into_iter()
            .zip(0..)
            .map(|(w, id)| Individual::new(id, w))
            .collect::<Vec<_>>();
        Self {
            generation: 0,
            elite_count: elite_count.min(individuals.len()),
            next_id: individuals.len() as AgentId,
            individuals,
            paused: false,
        }
    }

    /// Best individual; valid after [`Population::evaluate`].
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    /// Runs every individual on `course` in parallel, then sorts the
    /// population by fitness, best first.
    pub fn evaluate(&mut self, course: &Course, max_steps: usize) {
        thread::scope(|s| {
            for ind in &mut self.individuals {
                s.spawn(move || {
                    let episode = course.run(&mut NetworkController(&ind.weights), max_steps);
                    ind.record(&episode);
                });
            }
        });
        self.individuals
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    pub fn fitness_stats(&self) -> Option<DescriptiveStats> {
        DescriptiveStats::new(self.individuals.iter().map(|ind| ind.fitness))
    }
}

impl mimic_imitation::Population for Population {
    type Agent = Individual;

    fn generation(&self) -> u64 {
        self.generation
    }

    fn elite_count(&self) -> usize {
        self.elite_count
    }

    fn agents(&self) -> &[Individual] {
        &self.individuals
    }

    fn agents_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

#[derive(Debug)]
pub(crate) struct PopulationEvolver {
    /// Number of top individuals preserved unchanged (elitism)
    pub elite_count: usize,
    /// Weights are clipped to `[-max_weight, max_weight]`
    pub max_weight: f32,
    /// Tournament size for selection (larger = stronger selection pressure)
    pub tournament_size: usize,
    /// Standard deviation for Gaussian mutation noise
    pub mutation_sigma: f32,
    /// BLX-α crossover parameter (controls exploration beyond parent range)
    pub blx_alpha: f32,
    /// Probability of mutating each weight
    pub mutation_rate: f32,
}

impl PopulationEvolver {
    /// Builds the next generation, carrying over the individuals listed in
    /// `held` unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the population is not sorted by fitness descending, or if
    /// it is paused.
    #[must_use]
    pub fn evolve<R>(&self, population: &Population, held: &[AgentId], rng: &mut R) -> Population
    where
        R: Rng + ?Sized,
    {
        assert!(!population.paused, "population is being modified");
        assert!(
            population
                .individuals
                .is_sorted_by(|a, b| a.fitness >= b.fitness)
        );
        let elite_count = self.elite_count.min(population.individuals.len());
        let mut next_id = population.next_id;
        let mut next_individuals = population.individuals[..elite_count].to_vec();
        next_individuals.extend(
            population.individuals[elite_count..]
                .iter()
                .filter(|ind| held.contains(&ind.id))
                .cloned(),
        );

        let mut parents = population
            .individuals
            .iter()
            .filter(|ind| !held.contains(&ind.id))
            .collect::<Vec<_>>();
        if parents.is_empty() {
            parents = population.individuals.iter().collect();
        }

        while next_individuals.len() < population.individuals.len() {
            let p1 = tournament_select(&parents, self.tournament_size, rng);
            let p2 = tournament_select(&parents, self.tournament_size, rng);

            let mut child = p1.weights.clone();
            let blended = weights::blx_alpha(
                p1.weights.as_flat(),
                p2.weights.as_flat(),
                self.blx_alpha,
                self.max_weight,
                rng,
            );
            child.as_flat_mut().copy_from_slice(&blended);
            weights::mutate(
                child.as_flat_mut(),
                self.mutation_sigma,
                self.max_weight,
                self.mutation_rate,
                rng,
            );

            next_individuals.push(Individual::new(next_id, child));
            next_id += 1;
        }

        Population {
            generation: population.generation + 1,
            elite_count: population.elite_count,
            individuals: next_individuals,
            next_id,
            paused: false,
        }
    }
}

fn tournament_select<'a, R>(
    candidates: &[&'a Individual],
    tournament_size: usize,
    rng: &mut R,
) -> &'a Individual
where
    R: Rng + ?Sized,
{
    candidates
        .choose_multiple(rng, tournament_size.max(1))
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .copied()
        .unwrap_or(candidates[0])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mimic_imitation::Population as _;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    const LAYERS: [usize; 3] = [8, 6, 4];

    fn evolver() -> PopulationEvolver {
        PopulationEvolver {
            elite_count: 2,
            max_weight: 2.0,
            tournament_size: 3,
            mutation_sigma: 0.1,
            blx_alpha: 0.2,
            mutation_rate: 0.2,
        }
    }

    #[test]
    fn test_evaluate_sorts_best_first() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let mut population = Population::random(8, &LAYERS, 2, &mut rng).unwrap();
        population.evaluate(&Course::standard(), 50);
        let fitness = population.fitnesses();
        assert!(fitness.is_sorted_by(|a, b| a >= b));
        assert!(population.agents().iter().all(|i| i.exploration.is_some()));
        assert_eq!(population.best().map(Individual::fitness), Some(fitness[0]));
    }

    #[test]
    fn test_evolve_keeps_elites_and_assigns_fresh_ids() {
        let mut rng = Pcg64Mcg::seed_from_u64(2);
        let mut population = Population::random(10, &LAYERS, 2, &mut rng).unwrap();
        population.evaluate(&Course::standard(), 30);
        let next = evolver().evolve(&population, &[], &mut rng);

        assert_eq!(next.generation(), 1);
        assert_eq!(next.agents().len(), 10);
        for (a, b) in next.agents()[..2].iter().zip(population.agents()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.weights(), b.weights());
        }
        let ids = next.agents().iter().map(Agent::id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 10);
        assert!(next.agents()[2..].iter().all(|i| i.id() >= 10));
        assert!(
            next.agents()
                .iter()
                .all(|i| i.weights().as_flat().iter().all(|w| w.abs() <= 2.0))
        );
    }

    #[test]
    fn test_evolve_carries_held_individuals() {
        let mut rng = Pcg64Mcg::seed_from_u64(4);
        let mut population = Population::random(10, &LAYERS, 2, &mut rng).unwrap();
        population.evaluate(&Course::standard(), 30);
        let held = [population.agents()[5].id(), population.agents()[8].id()];
        let next = evolver().evolve(&population, &held, &mut rng);

        assert_eq!(next.agents().len(), 10);
        for id in held {
            let before = population.agents().iter().find(|i| i.id() == id).unwrap();
            let after = next.agents().iter().find(|i| i.id() == id).unwrap();
            assert_eq!(after.weights(), before.weights());
        }
        let ids = next.agents().iter().map(Agent::id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 10);
        assert_eq!(next.agents().iter().filter(|i| i.id() >= 10).count(), 6);
    }

    #[test]
    fn test_from_template() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let template = NetworkWeights::random(&mut rng, &LAYERS).unwrap();
        let population = Population::from_template(&template, 4, 1, 0.1, &mut rng);
        assert_eq!(population.agents()[0].weights(), &template);
        assert_ne!(population.agents()[1].weights(), &template);
        assert_eq!(population.elite_count(), 1);
    }
}
