//! # NEAT Engine
//!
//! A speciated NeuroEvolution of Augmenting Topologies (NEAT) engine. A
//! population of variable-structure networks is mutated, recombined and
//! selected generation over generation from a fitness signal supplied by an
//! external simulation.
//!
//! ## Features
//!
//! - **Global Innovation Registry**: identical structural mutations arising in
//!   different genomes or generations share one historical marker
//! - **Recurrent Links**: self-loops and back links with stateful evaluation
//! - **Speciation with Fitness Sharing**: age bonuses and penalties,
//!   stagnation culling, champion protection
//! - **Exact Offspring Allocation**: quotas are apportioned so every
//!   generation is filled exactly
//! - **Deterministic**: one seeded generator drives every random decision
//!
//! ## Quick Start
//!
//! ```rust
//! use neat_engine::{NeatConfig, Population};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let rng = ChaCha8Rng::seed_from_u64(42);
//! let mut population = Population::new(16, 2, 1, NeatConfig::default(), rng).unwrap();
//!
//! for _ in 0..3 {
//!     let observations = vec![[0.5_f32, -0.5]; population.size()];
//!     let actions = population.evaluate(&observations).unwrap();
//!
//!     // Reward networks whose output is close to 0.5.
//!     let fitness: Vec<f32> = actions.iter().map(|a| 1.0 - (a[0] - 0.5).abs()).collect();
//!     population.evolve(&fitness).unwrap();
//! }
//! assert_eq!(population.generation(), 3);
//! ```
//!
//! ## Architecture
//!
//! ### Innovation Registry
//!
//! The [`InnovationRegistry`] is owned by the population and passed by
//! reference to every structural mutation. Neuron ids and link innovation ids
//! come from separate counters and are never reused for a different structure.
//!
//! ### Genome and Phenotype
//!
//! A [`Genome`] keeps link genes sorted by innovation id and neuron genes
//! sorted by depth. Its [`Phenotype`] is built lazily from enabled links and
//! keeps neuron values between calls, so recurrent links read the previous
//! step's values.
//!
//! ### Generational Cycle
//!
//! [`Population::evolve`] resets species, assigns fitness, re-speciates,
//! computes shared fitness, apportions offspring and breeds the next
//! generation by elitism, crossover and mutation.

pub mod activation;
pub mod config;
pub mod error;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod phenotype;
pub mod population;
pub mod species;

// Re-exports for convenience
pub use activation::Activation;
pub use config::NeatConfig;
pub use error::{ConfigError, EngineError};
pub use gene::{LinkGene, NeuronGene, NeuronRole};
pub use genome::Genome;
pub use innovation::{InnovationKind, InnovationRecord, InnovationRegistry};
pub use phenotype::Phenotype;
pub use population::{GenerationStats, Population};
pub use species::{Species, SpeciesId};
