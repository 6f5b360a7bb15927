//! Species: clusters of compatible genomes with fitness sharing.
//!
//! A species keeps a snapshot of its leader (the fittest genome ever assigned
//! to it) as the reference for compatibility checks. At the start of every
//! generation its membership is cut back to the leader alone and rebuilt
//! during speciation.

use rand::Rng;

use crate::config::NeatConfig;
use crate::genome::Genome;

/// Identifier of a species, unique within a population run.
pub type SpeciesId = u64;

/// A cluster of topologically and weight-wise similar genomes.
#[derive(Debug, Clone)]
pub struct Species {
    id: SpeciesId,
    leader: Genome,
    members: Vec<Genome>,
    /// Generations since the species was founded.
    age: u32,
    generations_without_improvement: u32,
    best_fitness: f32,
    /// Lowest raw fitness among members, refreshed by `adjusted_fitness`.
    min_fitness: f32,
    spawn_amount: f32,
}

impl Species {
    /// Found a species with `founder` as leader and sole member.
    #[must_use]
    pub fn new(id: SpeciesId, founder: Genome) -> Self {
        let mut leader = founder.clone();
        leader.invalidate_phenotype();
        Self {
            id,
            best_fitness: founder.fitness,
            min_fitness: founder.fitness,
            leader,
            members: vec![founder],
            age: 0,
            generations_without_improvement: 0,
            spawn_amount: 0.0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SpeciesId {
        self.id
    }

    /// The fittest genome assigned to this species since it was founded.
    #[must_use]
    pub const fn leader(&self) -> &Genome {
        &self.leader
    }

    #[must_use]
    pub fn members(&self) -> &[Genome] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub const fn age(&self) -> u32 {
        self.age
    }

    #[must_use]
    pub const fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    #[must_use]
    pub const fn generations_without_improvement(&self) -> u32 {
        self.generations_without_improvement
    }

    /// Offspring quota computed by the last [`calculate_spawn_amount`](Self::calculate_spawn_amount).
    #[must_use]
    pub const fn spawn_amount(&self) -> f32 {
        self.spawn_amount
    }

    /// Whether the species has gone longer than `limit` generations without improving.
    #[must_use]
    pub const fn is_stagnant(&self, limit: u32) -> bool {
        self.generations_without_improvement > limit
    }

    /// Add a genome to the species.
    ///
    /// A genome fitter than the leader becomes the new leader. A genome that
    /// already has a member slot under its id (the leader carried over from
    /// the last generation) takes over that slot instead of being added twice.
    pub fn add_member(&mut self, genome: Genome) {
        if genome.fitness > self.leader.fitness {
            self.leader = genome.clone();
            self.leader.invalidate_phenotype();
        }
        match self.members.iter_mut().find(|m| m.id == genome.id) {
            Some(slot) => *slot = genome,
            None => self.members.push(genome),
        }
    }

    /// Apply age modifiers and fitness sharing to every member.
    ///
    /// Young species get `fitness * (1 + young_bonus)`, old ones
    /// `fitness * (1 - old_penalty)`; the result is divided by the member
    /// count, stored on the member and summed.
    pub fn adjusted_fitness(&mut self, config: &NeatConfig) -> f32 {
        let count = self.members.len().max(1) as f32;
        let mut total = 0.0;
        self.min_fitness = f32::INFINITY;

        for member in &mut self.members {
            self.min_fitness = self.min_fitness.min(member.fitness);

            let mut fitness = member.fitness;
            if self.age < config.young_age_threshold {
                fitness *= 1.0 + config.young_bonus;
            }
            if self.age > config.old_age_threshold {
                fitness *= 1.0 - config.old_penalty;
            }

            member.adjusted_fitness = fitness / count;
            total += member.adjusted_fitness;
        }

        total
    }

    /// Proportional offspring quota: the species' summed adjusted fitness
    /// divided by the population-wide mean adjusted fitness. Fractional; the
    /// caller rounds.
    pub fn calculate_spawn_amount(&mut self, mean_adjusted_fitness: f32) -> f32 {
        let sum: f32 = self.members.iter().map(|m| m.adjusted_fitness).sum();
        self.spawn_amount = sum / mean_adjusted_fitness;
        self.spawn_amount
    }

    /// Fitness-proportional pick among members, skipping the genome with id
    /// `exclude`.
    ///
    /// Weights are offset by the species' minimum fitness so every member
    /// weighs at least 1. Returns `None` if no member is eligible.
    pub fn get_random_member<R: Rng>(&self, exclude: Option<u64>, rng: &mut R) -> Option<&Genome> {
        let min = if self.min_fitness.is_finite() {
            self.min_fitness
        } else {
            self.members
                .iter()
                .map(|m| m.fitness)
                .fold(f32::INFINITY, f32::min)
        };
        let weight = |genome: &Genome| (genome.fitness - min).max(0.0) + 1.0;

        let eligible = || self.members.iter().filter(move |m| Some(m.id) != exclude);
        let total: f32 = eligible().map(weight).sum();
        if total <= 0.0 {
            return None;
        }

        let mut ball = rng.random::<f32>() * total;
        let mut last = None;
        for member in eligible() {
            ball -= weight(member);
            if ball <= 0.0 {
                return Some(member);
            }
            last = Some(member);
        }
        // Rounding can leave a sliver of the wheel unclaimed.
        last
    }

    /// Start a new generation: keep only the leader as member, age the
    /// species and update the stagnation counter.
    pub fn reset_members(&mut self) {
        let mut leader = self.leader.clone();
        leader.adjusted_fitness = 0.0;
        self.members.clear();
        self.members.push(leader);
        self.age += 1;

        if self.leader.fitness > self.best_fitness {
            self.best_fitness = self.leader.fitness;
            self.generations_without_improvement = 0;
        } else {
            self.generations_without_improvement += 1;
        }
    }
}
