//! Activation functions applied by the phenotype.
//!
//! Every non-input neuron sums its weighted fan-in and passes the result through
//! the configured activation. The default is `Tanh`.

use serde::{Deserialize, Serialize};

/// Activation function types supported by phenotype neurons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Hyperbolic tangent: f(x) = tanh(x)
    #[default]
    Tanh,
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    Sigmoid,
    /// Rectified Linear Unit: f(x) = max(0, x)
    ReLU,
    /// Identity function: f(x) = x
    Identity,
}

impl Activation {
    /// All available activation functions.
    pub const ALL: [Self; 4] = [Self::Tanh, Self::Sigmoid, Self::ReLU, Self::Identity];

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates. Infinite inputs saturate where the function is bounded.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        if x.is_nan() {
            return f32::NAN;
        }

        match self {
            Self::Tanh => {
                if x == f32::INFINITY {
                    return 1.0;
                }
                if x == f32::NEG_INFINITY {
                    return -1.0;
                }
                x.tanh()
            }
            Self::Sigmoid => {
                // sigmoid(-88) underflows to 0 in f32
                let clamped = x.clamp(-88.0, 88.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::ReLU => x.max(0.0),
            Self::Identity => x,
        }
    }
}
