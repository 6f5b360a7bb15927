//! Integration tests for neat-engine.

use std::collections::{HashMap, HashSet};

use neat_engine::{Genome, InnovationRegistry, NeatConfig, Population};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A config that mutates structure aggressively so a few generations grow
/// hidden neurons, recurrent links and several species.
fn busy_config() -> NeatConfig {
    NeatConfig {
        add_link_rate: 0.5,
        add_recurrent_link_rate: 0.2,
        add_neuron_rate: 0.3,
        weight_mutation_rate: 0.8,
        ..NeatConfig::default()
    }
}

fn fitness_for(population: &mut Population, generation: usize) -> Vec<f32> {
    let observations: Vec<[f32; 3]> = (0..population.size())
        .map(|i| [i as f32 * 0.1, -0.5, generation as f32 * 0.01])
        .collect();
    let actions = population.evaluate(&observations).unwrap();
    actions
        .iter()
        .map(|a| 2.0 - (a[0] - 0.5).abs() - (a[1] + 0.5).abs())
        .collect()
}

fn run(seed: u64, generations: usize) -> Population {
    let rng = ChaCha8Rng::seed_from_u64(seed);
    let mut population = Population::new(30, 3, 2, busy_config(), rng).unwrap();
    for generation in 0..generations {
        let fitness = fitness_for(&mut population, generation);
        population.evolve(&fitness).unwrap();
    }
    population
}

#[test]
fn test_evolution_is_deterministic() {
    let a = run(99, 8);
    let b = run(99, 8);

    assert_eq!(a.genomes().len(), b.genomes().len());
    for (ga, gb) in a.genomes().iter().zip(b.genomes()) {
        assert_eq!(ga.id, gb.id);
        assert_eq!(ga.links(), gb.links());
        assert_eq!(ga.neurons(), gb.neurons());
    }
    assert_eq!(a.registry().records(), b.registry().records());
    assert_eq!(a.species().len(), b.species().len());
}

#[test]
fn test_innovation_ids_identify_structure() {
    let rng = ChaCha8Rng::seed_from_u64(5);
    let mut population = Population::new(30, 3, 2, busy_config(), rng).unwrap();

    let mut by_innovation: HashMap<u64, (u64, u64)> = HashMap::new();
    let mut by_endpoints: HashMap<(u64, u64), u64> = HashMap::new();

    for generation in 0..10 {
        for genome in population.genomes() {
            for link in genome.links() {
                let endpoints = (link.from, link.to);
                assert_eq!(
                    *by_innovation.entry(link.innovation).or_insert(endpoints),
                    endpoints,
                    "innovation {} reused for a different link",
                    link.innovation
                );
                assert_eq!(
                    *by_endpoints.entry(endpoints).or_insert(link.innovation),
                    link.innovation,
                    "link {:?} carries two innovation ids",
                    endpoints
                );
            }
        }
        let fitness = fitness_for(&mut population, generation);
        population.evolve(&fitness).unwrap();
    }

    assert!(!population.registry().novelties().is_empty());
}

#[test]
fn test_population_size_is_conserved() {
    let rng = ChaCha8Rng::seed_from_u64(11);
    let mut population = Population::new(37, 2, 1, busy_config(), rng).unwrap();
    let mut fitness_rng = ChaCha8Rng::seed_from_u64(12);

    for generation in 0..15 {
        // Mix positive, negative and all-zero generations.
        let fitness: Vec<f32> = match generation % 3 {
            0 => (0..37).map(|_| fitness_rng.random_range(0.0..10.0)).collect(),
            1 => (0..37).map(|_| fitness_rng.random_range(-10.0..0.0)).collect(),
            _ => vec![0.0; 37],
        };
        let stats = population.evolve(&fitness).unwrap();
        assert_eq!(stats.offspring, 37);
        assert_eq!(population.genomes().len(), 37);
        assert!(!population.species().is_empty());
    }
}

#[test]
fn test_no_genome_is_lost_in_speciation() {
    let rng = ChaCha8Rng::seed_from_u64(21);
    let mut population = Population::new(30, 3, 2, busy_config(), rng).unwrap();

    for generation in 0..6 {
        let ids: Vec<u64> = population.genomes().iter().map(|g| g.id).collect();
        let fitness = fitness_for(&mut population, generation);
        population.evolve(&fitness).unwrap();

        let mut placed: HashSet<u64> = HashSet::new();
        for species in population.species() {
            placed.insert(species.leader().id);
            placed.extend(species.members().iter().map(|m| m.id));
        }

        for id in ids {
            assert!(placed.contains(&id), "genome {} was lost", id);
        }
        assert!(population.species().iter().all(|s| !s.is_empty()));
    }
}

#[test]
fn test_species_best_fitness_never_decreases() {
    let rng = ChaCha8Rng::seed_from_u64(31);
    let mut population = Population::new(30, 3, 2, busy_config(), rng).unwrap();
    let mut best_seen: HashMap<u64, f32> = HashMap::new();

    for generation in 0..12 {
        let fitness = fitness_for(&mut population, generation);
        population.evolve(&fitness).unwrap();

        for species in population.species() {
            let leader_fitness = species.leader().fitness;
            if let Some(&previous) = best_seen.get(&species.id()) {
                assert!(
                    leader_fitness >= previous,
                    "species {} leader regressed from {} to {}",
                    species.id(),
                    previous,
                    leader_fitness
                );
            }
            best_seen.insert(species.id(), leader_fitness);
        }
    }
}

#[test]
fn test_crossover_gene_count_bound() {
    let population = run(41, 10);
    let config = NeatConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genomes = population.genomes();

    for pair in genomes.windows(2) {
        let (mum, dad) = (&pair[0], &pair[1]);
        let mum_ids: HashSet<u64> = mum.links().iter().map(|l| l.innovation).collect();
        let dad_ids: HashSet<u64> = dad.links().iter().map(|l| l.innovation).collect();
        let union = mum_ids.union(&dad_ids).count();

        let child = Genome::crossover(mum, dad, u64::MAX, &mut rng);
        assert!(child.num_genes() <= union);
        assert!(child.num_genes() >= mum.num_genes().min(dad.num_genes()));
        assert!(child.links().is_sorted_by_key(|l| l.innovation));

        for link in child.links() {
            assert!(child.contains_neuron(link.from));
            assert!(child.contains_neuron(link.to));
        }

        let d_ab = mum.compatibility_score(dad, &config);
        let d_ba = dad.compatibility_score(mum, &config);
        assert!((d_ab - d_ba).abs() < 1e-5, "distance asymmetric: {} vs {}", d_ab, d_ba);
    }
}

#[test]
fn test_evolved_genomes_evaluate_finite() {
    let mut population = run(51, 10);
    let observations = vec![[0.3_f32, -0.2, 0.9]; population.size()];

    for _ in 0..3 {
        let actions = population.evaluate(&observations).unwrap();
        for action in actions {
            assert_eq!(action.len(), 2);
            assert!(action.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
        }
    }
}

#[test]
fn test_example_scenario() {
    let rng = ChaCha8Rng::seed_from_u64(1);
    let mut population = Population::new(4, 2, 1, NeatConfig::default(), rng).unwrap();
    for genome in population.genomes() {
        assert_eq!(genome.num_genes(), 2);
    }

    let stats = population.evolve(&[1.0, 3.0, 2.0, 0.5]).unwrap();

    assert_eq!(stats.species, 1);
    assert_eq!(population.genomes().len(), 4);
    for genome in population.genomes() {
        assert!(genome.num_genes() >= 2);
    }
}

#[test]
fn test_shared_registry_across_genomes() {
    let config = NeatConfig {
        add_neuron_rate: 1.0,
        ..NeatConfig::default()
    };
    let mut registry = InnovationRegistry::new(1, 2);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut genomes: Vec<Genome> = (0..20)
        .map(|id| Genome::new_base(id, &registry, &config, &mut rng))
        .collect();
    for genome in &mut genomes {
        genome.mutate_add_neuron(&config, &mut registry, &mut rng);
    }

    // Two base links can be split, so at most two hidden neurons and four
    // new links exist however many genomes mutated.
    assert!(registry.neuron_count() <= 3 + 2);
    assert!(registry.link_count() <= 2 + 4);
}
