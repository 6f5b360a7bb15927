//! Error types for configuration validation and the population boundary.
//!
//! Failed mutation attempts are not errors. Only malformed input at the
//! engine's boundary (bad hyperparameters, mismatched batch shapes,
//! non-finite fitness) is reported here.

use thiserror::Error;

/// A hyperparameter in [`NeatConfig`](crate::NeatConfig) was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The value is NaN or infinite.
    #[error("`{field}` must be finite, got {value}")]
    NotFinite { field: &'static str, value: f32 },

    /// A probability lies outside `[0, 1]`.
    #[error("`{field}` must lie in [0, 1], got {value}")]
    RateOutOfRange { field: &'static str, value: f32 },

    /// A coefficient, threshold or range is negative.
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    /// A retry budget is zero.
    #[error("`{field}` must be at least 1")]
    ZeroBudget { field: &'static str },
}

/// Errors surfaced by [`Population`](crate::Population).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("population size must be at least 1")]
    EmptyPopulation,

    #[error("networks need at least one input")]
    NoInputs,

    #[error("networks need at least one output")]
    NoOutputs,

    #[error("observation batch has {actual} rows, population has {expected} genomes")]
    BatchSize { expected: usize, actual: usize },

    #[error("observation {index} has {actual} values, networks take {expected} inputs")]
    ObservationWidth {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("fitness slice has {actual} entries, population has {expected} genomes")]
    FitnessLength { expected: usize, actual: usize },

    #[error("fitness of genome {index} is not finite")]
    NonFiniteFitness { index: usize },
}
