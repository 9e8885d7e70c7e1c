//! Genetic search over [`Schedule`]s.
//!
//! Each generation keeps the top tenth of the population unchanged, then
//! fills the rest with mutated crossover children of tournament-selected
//! parents. The best schedule ever seen is tracked across generations and
//! returned together with the generation that first produced it.

use itertools::Itertools;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Result, TimetableError};
use crate::schedule::{BASE_FITNESS, ExamProblem, Schedule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Probability that any single exam is perturbed in a child.
    pub mutation_rate: f64,
    pub generations: usize,
    pub tournament_size: usize,
    pub seed: Option<u64>,
    /// Wall-clock bound, checked between generations.
    pub time_limit_ms: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            mutation_rate: 0.15,
            generations: 200,
            tournament_size: 3,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(TimetableError::InvalidConfig(
                "Population size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(TimetableError::InvalidConfig(
                "Mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(TimetableError::InvalidConfig(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of schedules copied unchanged into the next generation.
    pub fn elite_count(&self) -> usize {
        (self.population_size / 10).max(1)
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    GenerationBudget,
    TargetReached,
    Deadline,
}

#[derive(Debug, Clone)]
pub struct Evolution<'p> {
    pub best: Schedule<'p>,
    /// Generation in which `best` was first reached.
    pub best_generation: usize,
    pub generations_run: usize,
    /// Best-ever fitness after each generation.
    pub history: Vec<f64>,
    /// Fittest member of each generation's population.
    pub generation_best: Vec<f64>,
    pub stop_reason: StopReason,
}

pub struct Scheduler<'p> {
    problem: &'p ExamProblem,
    config: EvolutionConfig,
}

impl<'p> Scheduler<'p> {
    pub fn new(problem: &'p ExamProblem, config: EvolutionConfig) -> Self {
        Self { problem, config }
    }

    pub fn evolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Evolution<'p> {
        let start_time = Instant::now();
        let population_size = self.config.population_size.max(1);
        let elite_count = self.config.elite_count();
        let deadline = self
            .config
            .time_limit_ms
            .map(|ms| start_time + Duration::from_millis(ms));

        info!(
            "Evolving timetable for {} courses over {} dates x {} timeslots with {} rooms (population {}, {} generations)",
            self.problem.course_count(),
            self.problem.dates().len(),
            self.problem.timeslots().len(),
            self.problem.rooms().len(),
            population_size,
            self.config.generations
        );

        let mut population: Vec<Schedule<'p>> = (0..population_size)
            .map(|_| Schedule::random(self.problem, rng))
            .collect();

        let mut best = fittest(&population).clone();
        let mut best_generation = 0;
        let mut history = Vec::with_capacity(self.config.generations);
        let mut generation_best = Vec::with_capacity(self.config.generations);
        let mut generations_run = 0;
        let mut stop_reason = StopReason::GenerationBudget;

        for generation in 0..self.config.generations {
            generations_run = generation + 1;

            let current = fittest(&population);
            trace!("Generation {}: best fitness {:.2}", generation, current.fitness());
            if current.fitness() > best.fitness() {
                debug!(
                    "Generation {}: improved fitness {:.2} -> {:.2}",
                    generation,
                    best.fitness(),
                    current.fitness()
                );
                best = current.clone();
                best_generation = generation;
            }
            history.push(best.fitness());
            generation_best.push(current.fitness());

            if current.fitness() >= BASE_FITNESS {
                info!("Target fitness reached at generation {}", generation);
                stop_reason = StopReason::TargetReached;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Time limit reached after generation {}", generation);
                stop_reason = StopReason::Deadline;
                break;
            }

            let mut next: Vec<Schedule<'p>> = population
                .iter()
                .sorted_by(|a, b| b.fitness().total_cmp(&a.fitness()))
                .take(elite_count)
                .cloned()
                .collect();

            while next.len() < population_size {
                let first = self.tournament(&population, rng);
                let second = self.tournament(&population, rng);
                let (mut child_a, mut child_b) = first.crossover(second, rng);
                child_a.mutate(self.config.mutation_rate, rng);
                child_b.mutate(self.config.mutation_rate, rng);
                next.push(child_a);
                next.push(child_b);
            }
            next.truncate(population_size);
            population = next;
        }

        info!(
            "Evolution finished in {:.2?} after {} generations: best fitness {:.2} (generation {}, {:?})",
            start_time.elapsed(),
            generations_run,
            best.fitness(),
            best_generation,
            stop_reason
        );

        Evolution {
            best,
            best_generation,
            generations_run,
            history,
            generation_best,
            stop_reason,
        }
    }

    /// Fittest of `tournament_size` distinct schedules drawn uniformly.
    fn tournament<'a, R: Rng + ?Sized>(
        &self,
        population: &'a [Schedule<'p>],
        rng: &mut R,
    ) -> &'a Schedule<'p> {
        let size = self.config.tournament_size.clamp(1, population.len());
        index::sample(rng, population.len(), size)
            .into_iter()
            .map(|idx| &population[idx])
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
            .unwrap_or(&population[0])
    }
}

fn fittest<'a, 'p>(population: &'a [Schedule<'p>]) -> &'a Schedule<'p> {
    population
        .iter()
        .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
        .unwrap_or(&population[0])
}

/// Runs the search with the supplied randomness source.
pub fn evolve<'p, R: Rng + ?Sized>(
    problem: &'p ExamProblem,
    config: EvolutionConfig,
    rng: &mut R,
) -> Evolution<'p> {
    Scheduler::new(problem, config).evolve(rng)
}

/// Runs the search seeded from `config.seed`, or from entropy when unset.
pub fn solve(problem: &ExamProblem, config: EvolutionConfig) -> Evolution<'_> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    evolve(problem, config, &mut rng)
}
