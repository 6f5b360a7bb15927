//! Population controller: action selection and the generational cycle.
//!
//! [`Population::evolve`] runs one full generation in a fixed order:
//!
//! 1. reset every species to its leader and cull stagnant species (the
//!    species led by the best genome of the run is spared);
//! 2. assign the caller's fitness values;
//! 3. re-speciate: a genome that already leads a species returns to it,
//!    every other genome takes the first species within the compatibility
//!    threshold or founds a new one;
//! 4. compute adjusted fitness and the population-wide mean;
//! 5. apportion offspring quotas so they sum to the population size;
//! 6. breed the next generation by elitism, crossover and mutation.
//!
//! The step is synchronous and all randomness comes from the population's
//! single generator, so a fixed seed and fitness sequence reproduce the same
//! generations.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NeatConfig;
use crate::error::EngineError;
use crate::genome::Genome;
use crate::innovation::InnovationRegistry;
use crate::species::{Species, SpeciesId};

/// Summary of one call to [`Population::evolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStats {
    /// Index of the generation that was just evaluated.
    pub generation: u64,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    /// Species alive after re-speciation.
    pub species: usize,
    /// Genomes produced for the next generation.
    pub offspring: usize,
    pub neuron_innovations: u64,
    pub link_innovations: u64,
}

/// A population of genomes evolved with speciated NEAT.
#[derive(Debug)]
pub struct Population<R: Rng = ChaCha8Rng> {
    config: NeatConfig,
    registry: InnovationRegistry,
    genomes: Vec<Genome>,
    species: Vec<Species>,
    rng: R,
    generation: u64,
    next_genome_id: u64,
    next_species_id: SpeciesId,
    /// Fittest genome seen over the whole run.
    champion: Option<Genome>,
    /// Species that received the last generation's best genome; its
    /// offspring quota opens with the elite copy.
    champion_species: Option<SpeciesId>,
}

impl<R: Rng> Population<R> {
    /// Create `size` genomes with the base topology.
    ///
    /// # Errors
    ///
    /// Rejects an invalid configuration, an empty population and networks
    /// without inputs or outputs.
    pub fn new(
        size: usize,
        num_inputs: usize,
        num_outputs: usize,
        config: NeatConfig,
        mut rng: R,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if size == 0 {
            return Err(EngineError::EmptyPopulation);
        }
        if num_inputs == 0 {
            return Err(EngineError::NoInputs);
        }
        if num_outputs == 0 {
            return Err(EngineError::NoOutputs);
        }

        let registry = InnovationRegistry::new(num_inputs, num_outputs);
        let genomes: Vec<Genome> = (0..size as u64)
            .map(|id| Genome::new_base(id, &registry, &config, &mut rng))
            .collect();

        debug!(size, num_inputs, num_outputs, "population created");

        Ok(Self {
            config,
            registry,
            genomes,
            species: Vec::new(),
            rng,
            generation: 0,
            next_genome_id: size as u64,
            next_species_id: 0,
            champion: None,
            champion_species: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &NeatConfig {
        &self.config
    }

    /// Number of genomes per generation.
    #[must_use]
    pub fn size(&self) -> usize {
        self.genomes.len()
    }

    /// Current generation, starting at 0.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Genomes of the current generation, in the order `evaluate` and
    /// `evolve` index them.
    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    #[must_use]
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    #[must_use]
    pub const fn registry(&self) -> &InnovationRegistry {
        &self.registry
    }

    /// Fittest genome seen so far, with the fitness it was evaluated at.
    #[must_use]
    pub const fn best_genome(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    /// Run every genome's phenotype on its row of the observation batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch does not have one row per genome or a
    /// row does not have one value per input.
    pub fn evaluate<O: AsRef<[f32]>>(
        &mut self,
        observations: &[O],
    ) -> Result<Vec<Vec<f32>>, EngineError> {
        self.check_batch(observations.len())?;

        let width = self.registry.num_inputs();
        let mut actions = Vec::with_capacity(self.genomes.len());
        for (index, (genome, observation)) in self.genomes.iter_mut().zip(observations).enumerate()
        {
            let observation = observation.as_ref();
            if observation.len() != width {
                return Err(EngineError::ObservationWidth {
                    index,
                    expected: width,
                    actual: observation.len(),
                });
            }
            actions.push(genome.evaluate(observation));
        }
        Ok(actions)
    }

    /// Allocation-free batch evaluation over row-major buffers of shape
    /// `[size][num_inputs]` and `[size][num_outputs]`.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer has the wrong length.
    pub fn evaluate_into(
        &mut self,
        observations: &[f32],
        actions: &mut [f32],
    ) -> Result<(), EngineError> {
        let num_inputs = self.registry.num_inputs();
        let num_outputs = self.registry.num_outputs();
        if observations.len() != self.genomes.len() * num_inputs {
            return Err(EngineError::BatchSize {
                expected: self.genomes.len() * num_inputs,
                actual: observations.len(),
            });
        }
        if actions.len() != self.genomes.len() * num_outputs {
            return Err(EngineError::BatchSize {
                expected: self.genomes.len() * num_outputs,
                actual: actions.len(),
            });
        }

        let rows = observations.chunks_exact(num_inputs);
        let outs = actions.chunks_exact_mut(num_outputs);
        for ((genome, observation), out) in self.genomes.iter_mut().zip(rows).zip(outs) {
            genome.evaluate_into(observation, out);
        }
        Ok(())
    }

    fn check_batch(&self, rows: usize) -> Result<(), EngineError> {
        if rows == self.genomes.len() {
            Ok(())
        } else {
            Err(EngineError::BatchSize {
                expected: self.genomes.len(),
                actual: rows,
            })
        }
    }

    /// Consume final fitness values and replace the population with the next
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the population untouched, if `fitness` does
    /// not hold one finite value per genome.
    pub fn evolve(&mut self, fitness: &[f32]) -> Result<GenerationStats, EngineError> {
        if fitness.len() != self.genomes.len() {
            return Err(EngineError::FitnessLength {
                expected: self.genomes.len(),
                actual: fitness.len(),
            });
        }
        if let Some(index) = fitness.iter().position(|f| !f.is_finite()) {
            return Err(EngineError::NonFiniteFitness { index });
        }

        let size = self.genomes.len();

        self.reset_species();

        for (genome, &value) in self.genomes.iter_mut().zip(fitness) {
            genome.fitness = value;
        }
        let best_index = best_index(fitness);
        let best_fitness = fitness[best_index];
        let mean_fitness = fitness.iter().sum::<f32>() / size as f32;

        let mut generation_best = self.genomes[best_index].clone();
        generation_best.invalidate_phenotype();
        if self
            .champion
            .as_ref()
            .is_none_or(|champion| best_fitness > champion.fitness)
        {
            self.champion = Some(generation_best.clone());
        }

        self.speciate(best_index);

        let quotas = self.spawn_quotas(size);
        let offspring = self.reproduce(&quotas, &generation_best);
        debug_assert_eq!(offspring.len(), size, "quotas must fill the population");
        self.genomes = offspring;

        let stats = GenerationStats {
            generation: self.generation,
            best_fitness,
            mean_fitness,
            species: self.species.len(),
            offspring: self.genomes.len(),
            neuron_innovations: self.registry.neuron_count(),
            link_innovations: self.registry.link_count(),
        };
        info!(
            generation = stats.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            species = stats.species,
            neurons = stats.neuron_innovations,
            links = stats.link_innovations,
            "generation evolved"
        );

        self.generation += 1;
        Ok(stats)
    }

    /// Cut every species back to its leader and drop stagnant ones, unless
    /// it is led by the run's champion.
    fn reset_species(&mut self) {
        let limit = self.config.generations_allowed_without_improvement;
        let protected = self.champion.as_ref().map(|champion| champion.id);

        for species in &mut self.species {
            species.reset_members();
        }
        self.species.retain(|species| {
            let keep = !species.is_stagnant(limit) || Some(species.leader().id) == protected;
            if !keep {
                debug!(
                    species = species.id(),
                    age = species.age(),
                    best = species.best_fitness(),
                    "culling stagnant species"
                );
            }
            keep
        });
    }

    /// Place every genome in a species.
    ///
    /// An elite copy keeps the id of the leader it was taken from and goes
    /// back to that leader's species. Any other genome joins the first species
    /// whose leader is within the compatibility threshold, or founds a new one.
    fn speciate(&mut self, best_index: usize) {
        let genomes = std::mem::take(&mut self.genomes);
        self.champion_species = None;

        for (index, mut genome) in genomes.into_iter().enumerate() {
            genome.sort_genes();

            let home = self
                .species
                .iter()
                .position(|species| species.leader().id == genome.id)
                .or_else(|| {
                    self.species.iter().position(|species| {
                        genome.compatibility_score(species.leader(), &self.config)
                            < self.config.compatibility_threshold
                    })
                });

            let species_id = match home {
                Some(position) => {
                    let species = &mut self.species[position];
                    species.add_member(genome);
                    species.id()
                }
                None => {
                    let id = self.next_species_id;
                    self.next_species_id += 1;
                    debug!(species = id, genome = genome.id, "founding species");
                    self.species.push(Species::new(id, genome));
                    id
                }
            };

            if index == best_index {
                self.champion_species = Some(species_id);
            }
        }
    }

    /// Offspring count per species, summing exactly to `size`.
    fn spawn_quotas(&mut self, size: usize) -> Vec<usize> {
        let total_adjusted: f32 = self
            .species
            .iter_mut()
            .map(|species| species.adjusted_fitness(&self.config))
            .sum();
        let mean_adjusted = total_adjusted / size as f32;

        let mut quotas: Vec<f32> = self
            .species
            .iter_mut()
            .map(|species| species.calculate_spawn_amount(mean_adjusted).max(0.0))
            .collect();

        let usable = mean_adjusted.is_finite()
            && mean_adjusted > 0.0
            && quotas.iter().all(|q| q.is_finite())
            && quotas.iter().sum::<f32>() > 0.0;
        if !usable {
            warn!(
                mean_adjusted,
                "adjusted fitness is degenerate; apportioning offspring by species size"
            );
            quotas = self.species.iter().map(|s| s.len() as f32).collect();
        }

        let counts = apportion(&quotas, size);
        debug!(?counts, "offspring quotas");
        counts
    }

    /// Breed the next generation from the species' members.
    fn reproduce(&mut self, quotas: &[usize], generation_best: &Genome) -> Vec<Genome> {
        let size = quotas.iter().sum::<usize>();
        let mut next = Vec::with_capacity(size);
        let mut elite_placed = false;

        let Self {
            config,
            registry,
            species,
            rng,
            next_genome_id,
            champion_species,
            ..
        } = self;

        for (species, &quota) in species.iter().zip(quotas) {
            for _ in 0..quota {
                if next.len() >= size {
                    break;
                }

                if !elite_placed && *champion_species == Some(species.id()) {
                    next.push(generation_best.clone());
                    elite_placed = true;
                    continue;
                }

                let id = *next_genome_id;
                *next_genome_id += 1;

                if species.len() == 1 {
                    next.push(species.leader().with_id(id));
                    continue;
                }

                let Some(mum) = species.get_random_member(None, rng) else {
                    next.push(species.leader().with_id(id));
                    continue;
                };

                let mut baby = if rng.random::<f32>() < config.crossover_rate {
                    match species.get_random_member(Some(mum.id), rng) {
                        Some(dad) => Genome::crossover(mum, dad, id, rng),
                        None => mum.with_id(id),
                    }
                } else {
                    mum.with_id(id)
                };

                baby.mutate_add_neuron(config, registry, rng);
                baby.mutate_add_link(config, registry, rng);
                baby.mutate_weights(config, rng);
                baby.sort_genes();
                next.push(baby);
            }
        }

        next
    }
}

/// Index of the highest value; the first one wins ties.
fn best_index(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}

/// Turn fractional quotas into integer counts summing exactly to `total`.
///
/// Quotas are rescaled to sum to `total`, floored, and the remaining slots go
/// to the largest fractional parts (earlier entries win ties).
fn apportion(quotas: &[f32], total: usize) -> Vec<usize> {
    let sum: f32 = quotas.iter().sum();
    if quotas.is_empty() || sum <= 0.0 {
        return vec![0; quotas.len()];
    }

    let scaled: Vec<f32> = quotas.iter().map(|q| q * total as f32 / sum).collect();
    let mut counts: Vec<usize> = scaled.iter().map(|q| q.floor() as usize).collect();

    // Float rounding can push the floored sum past the total.
    while counts.iter().sum::<usize>() > total {
        if let Some(max) = (0..counts.len()).max_by_key(|&i| counts[i]) {
            counts[max] -= 1;
        }
    }

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = scaled[a] - scaled[a].floor();
        let fb = scaled[b] - scaled[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    let mut remaining = total - counts.iter().sum::<usize>();
    for &i in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        counts[i] += 1;
        remaining -= 1;
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_apportion_fills_exactly() {
        assert_eq!(apportion(&[1.5, 1.5, 1.0], 4), vec![2, 1, 1]);
        assert_eq!(apportion(&[0.2, 0.2, 0.2], 10), vec![4, 3, 3]);
        assert_eq!(apportion(&[3.0, 0.0], 3), vec![3, 0]);
        assert_eq!(apportion(&[0.0, 0.0], 3), vec![0, 0]);

        let counts = apportion(&[0.33, 2.71, 9.1, 0.01], 150);
        assert_eq!(counts.iter().sum::<usize>(), 150);
    }

    #[test]
    fn test_best_index_first_wins() {
        assert_eq!(best_index(&[1.0, 3.0, 2.0, 3.0]), 1);
        assert_eq!(best_index(&[-1.0]), 0);
    }

    #[test]
    fn test_new_validates() {
        let bad = NeatConfig {
            add_neuron_rate: 2.0,
            ..NeatConfig::default()
        };
        assert!(matches!(
            Population::new(4, 2, 1, bad, test_rng()),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            Population::new(0, 2, 1, NeatConfig::default(), test_rng()),
            Err(EngineError::EmptyPopulation)
        ));
        assert!(matches!(
            Population::new(4, 0, 1, NeatConfig::default(), test_rng()),
            Err(EngineError::NoInputs)
        ));
        assert!(matches!(
            Population::new(4, 2, 0, NeatConfig::default(), test_rng()),
            Err(EngineError::NoOutputs)
        ));
    }

    #[test]
    fn test_evaluate_shapes() {
        let mut population = Population::new(3, 2, 2, NeatConfig::default(), test_rng()).unwrap();

        let actions = population
            .evaluate(&[[0.1f32, 0.2], [0.3, 0.4], [0.5, 0.6]])
            .unwrap();
        assert_eq!(actions.len(), 3);
        assert!(actions.iter().all(|a| a.len() == 2));

        assert_eq!(
            population.evaluate(&[[0.1f32, 0.2]]),
            Err(EngineError::BatchSize {
                expected: 3,
                actual: 1
            })
        );
        assert!(matches!(
            population.evaluate(&[vec![0.1f32], vec![0.2, 0.3], vec![0.4, 0.5]]),
            Err(EngineError::ObservationWidth { index: 0, .. })
        ));
    }

    #[test]
    fn test_evaluate_into_matches_evaluate() {
        let mut population = Population::new(2, 2, 1, NeatConfig::default(), test_rng()).unwrap();
        let rows = [[0.5f32, -0.5], [1.0, 0.25]];

        let nested = population.evaluate(&rows).unwrap();
        let mut flat = [0.0; 2];
        population
            .evaluate_into(&[0.5, -0.5, 1.0, 0.25], &mut flat)
            .unwrap();

        assert_eq!(flat.to_vec(), nested.concat());
    }

    #[test]
    fn test_evolve_rejects_bad_fitness() {
        let mut population = Population::new(3, 1, 1, NeatConfig::default(), test_rng()).unwrap();

        assert_eq!(
            population.evolve(&[1.0, 2.0]),
            Err(EngineError::FitnessLength {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            population.evolve(&[1.0, f32::NAN, 2.0]),
            Err(EngineError::NonFiniteFitness { index: 1 })
        );
        assert_eq!(population.generation(), 0);
    }

    #[test]
    fn test_single_species_scenario() {
        let mut population = Population::new(4, 2, 1, NeatConfig::default(), test_rng()).unwrap();
        for genome in population.genomes() {
            assert_eq!(genome.num_genes(), 2);
        }

        let stats = population.evolve(&[1.0, 3.0, 2.0, 0.5]).unwrap();

        assert_eq!(stats.species, 1);
        assert_eq!(stats.offspring, 4);
        assert!((stats.best_fitness - 3.0).abs() < 1e-6);
        assert!((stats.mean_fitness - 1.625).abs() < 1e-6);
        assert_eq!(population.generation(), 1);
        assert_eq!(population.genomes().len(), 4);
        for genome in population.genomes() {
            assert!(genome.num_genes() >= 2);
        }
    }

    #[test]
    fn test_champion_survives_as_elite() {
        let mut population = Population::new(6, 2, 1, NeatConfig::default(), test_rng()).unwrap();
        let champion_id = population.genomes()[4].id;
        let champion_links = population.genomes()[4].links().to_vec();

        population
            .evolve(&[0.1, 0.2, 0.3, 0.4, 9.0, 0.5])
            .unwrap();

        let elite = population
            .genomes()
            .iter()
            .find(|g| g.id == champion_id)
            .expect("champion copied into the next generation");
        assert_eq!(elite.links(), champion_links.as_slice());
        assert_eq!(population.best_genome().unwrap().id, champion_id);
    }

    #[test]
    fn test_genome_ids_unique() {
        let mut population = Population::new(20, 3, 2, NeatConfig::default(), test_rng()).unwrap();
        for generation in 0..5 {
            let fitness: Vec<f32> = (0..20).map(|i| ((i * 7 + generation) % 11) as f32).collect();
            population.evolve(&fitness).unwrap();

            let mut ids: Vec<u64> = population.genomes().iter().map(|g| g.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), 20);
        }
    }

    /// Every genome founds its own species and any species that fails to
    /// improve for one generation is stagnant.
    fn isolating_config() -> NeatConfig {
        NeatConfig {
            compatibility_threshold: 0.0,
            generations_allowed_without_improvement: 0,
            ..NeatConfig::default()
        }
    }

    #[test]
    fn test_stagnant_species_are_culled_except_champion() {
        let mut population = Population::new(4, 2, 1, isolating_config(), test_rng()).unwrap();
        population.evolve(&[1.0, 5.0, 2.0, 3.0]).unwrap();

        let champion_id = population.best_genome().unwrap().id;
        let founders: Vec<SpeciesId> = population.species().iter().map(Species::id).collect();
        assert_eq!(founders.len(), 4);
        let home = population
            .species()
            .iter()
            .find(|s| s.leader().id == champion_id)
            .map(Species::id)
            .unwrap();

        for _ in 0..4 {
            // A newcomer wins each generation, so the last generation's best
            // is never the champion.
            let mut runner_up = true;
            let fitness: Vec<f32> = population
                .genomes()
                .iter()
                .map(|g| {
                    if g.id == champion_id {
                        0.5
                    } else if std::mem::take(&mut runner_up) {
                        3.0
                    } else {
                        1.0
                    }
                })
                .collect();
            population.evolve(&fitness).unwrap();

            let alive: Vec<SpeciesId> = population.species().iter().map(Species::id).collect();
            assert!(alive.contains(&home), "champion species {} was culled", home);
            for id in founders.iter().filter(|&&id| id != home) {
                assert!(!alive.contains(id), "stagnant species {} survived", id);
            }
        }

        let champion = population.best_genome().unwrap();
        assert_eq!(champion.id, champion_id);
        assert!((champion.fitness - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_elite_returns_to_its_own_species() {
        let mut population = Population::new(4, 2, 1, isolating_config(), test_rng()).unwrap();
        population.evolve(&[100.0, 1.0, 1.0, 1.0]).unwrap();
        let champion_id = population.best_genome().unwrap().id;

        let mut scored = false;
        let fitness: Vec<f32> = population
            .genomes()
            .iter()
            .map(|g| {
                if g.id != champion_id && !scored {
                    scored = true;
                    50.0
                } else {
                    1.0
                }
            })
            .collect();
        population.evolve(&fitness).unwrap();
        population.evolve(&[1.0; 4]).unwrap();

        let mut leaders: Vec<u64> = population.species().iter().map(|s| s.leader().id).collect();
        leaders.sort_unstable();
        let count = leaders.len();
        leaders.dedup();
        assert_eq!(leaders.len(), count, "two species share a leader");

        let mut members: Vec<u64> = population
            .species()
            .iter()
            .flat_map(|s| s.members().iter().map(|m| m.id))
            .collect();
        members.sort_unstable();
        let count = members.len();
        members.dedup();
        assert_eq!(members.len(), count, "a genome sits in two species");

        assert!(population
            .species()
            .iter()
            .any(|s| s.leader().id == champion_id && (s.leader().fitness - 100.0).abs() < 1e-6));
    }
}
