//! Evolving a network that computes XOR.
//!
//! Each generation the whole population is driven through the four XOR cases
//! in lockstep, one batched `evaluate` call per case, and scored on squared
//! error. The third input is a constant bias.
//!
//! Run with: `RUST_LOG=info cargo run --example xor`

use neat_engine::{NeatConfig, Population};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

const CASES: [([f32; 3], f32); 4] = [
    ([0.0, 0.0, 1.0], 0.0),
    ([0.0, 1.0, 1.0], 1.0),
    ([1.0, 0.0, 1.0], 1.0),
    ([1.0, 1.0, 1.0], 0.0),
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = NeatConfig {
        add_link_rate: 0.3,
        add_neuron_rate: 0.1,
        weight_mutation_rate: 0.8,
        compatibility_threshold: 0.5,
        ..NeatConfig::default()
    };

    let population_size = 150;
    let generations = 200;
    let seed = 42;

    let rng = ChaCha8Rng::seed_from_u64(seed);
    let mut population = match Population::new(population_size, 3, 1, config, rng) {
        Ok(population) => population,
        Err(err) => {
            eprintln!("invalid setup: {err}");
            return;
        }
    };

    println!("NEAT XOR");
    println!("Population: {population_size}, generations: {generations}\n");

    let mut solved_at = None;
    for generation in 0..generations {
        let mut error = vec![0.0_f32; population_size];
        for (inputs, expected) in &CASES {
            let observations = vec![*inputs; population_size];
            let actions = population
                .evaluate(&observations)
                .expect("batch matches population");
            for (err, action) in error.iter_mut().zip(&actions) {
                *err += (action[0] - expected).powi(2);
            }
        }

        let fitness: Vec<f32> = error.iter().map(|e| (4.0 - e).max(0.0)).collect();
        let stats = population.evolve(&fitness).expect("one fitness per genome");

        if stats.best_fitness >= 3.9 && solved_at.is_none() {
            solved_at = Some(generation);
        }
        if generation % 10 == 0 || generation == generations - 1 {
            println!(
                "Gen {:3}: best={:.4}, mean={:.4}, species={}",
                generation, stats.best_fitness, stats.mean_fitness, stats.species
            );
        }
        if solved_at.is_some() {
            break;
        }
    }

    let Some(champion) = population.best_genome() else {
        return;
    };
    let mut champion = champion.clone();

    println!();
    println!("Best fitness: {:.4}", champion.fitness);
    println!("Hidden neurons: {}", champion.num_hidden());
    println!("Enabled links: {}", champion.num_enabled_links());
    if let Some(generation) = solved_at {
        println!("Solved at generation {generation}");
    }

    println!("\nChampion outputs:");
    champion.reset_state();
    for (inputs, expected) in &CASES {
        let output = champion.evaluate(inputs)[0];
        let status = if (output - expected).abs() < 0.5 { "ok" } else { "miss" };
        println!(
            "  {} XOR {} = {:.4} (expected {}) {}",
            inputs[0] as i32, inputs[1] as i32, output, *expected as i32, status
        );
    }
}
