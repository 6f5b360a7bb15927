//! Gene types for NEAT genomes.
//!
//! This module defines the fundamental building blocks of NEAT networks:
//! - [`NeuronGene`]: Represents neurons in the network
//! - [`LinkGene`]: Represents weighted connections between neurons
//!
//! Both carry identifiers issued by the
//! [`InnovationRegistry`](crate::InnovationRegistry), so the same structure
//! carries the same id in every genome of a run.

use serde::{Deserialize, Serialize};

/// The role of a neuron in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronRole {
    /// Input neuron - takes its value from the observation, no activation applied.
    Input,
    /// Hidden neuron - created by splitting a link.
    Hidden,
    /// Output neuron - read after evaluation.
    Output,
}

/// Depth of input neurons.
pub const INPUT_DEPTH: f32 = 0.0;

/// Depth of output neurons.
pub const OUTPUT_DEPTH: f32 = 1.0;

/// A neuron gene.
///
/// `depth` positions the neuron between the input layer (0.0) and the output
/// layer (1.0). Hidden neurons sit at the midpoint of the link they split, so
/// sorting by depth yields a feed-forward evaluation order with inputs first
/// and outputs last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGene {
    /// Neuron id issued by the innovation registry.
    pub id: u64,
    /// The role of this neuron in the network.
    pub role: NeuronRole,
    /// Position between the input layer (0.0) and the output layer (1.0).
    pub depth: f32,
    /// Set when the neuron carries a self-loop.
    pub recurrent: bool,
}

impl NeuronGene {
    /// Create a new input neuron.
    #[must_use]
    pub fn input(id: u64) -> Self {
        Self {
            id,
            role: NeuronRole::Input,
            depth: INPUT_DEPTH,
            recurrent: false,
        }
    }

    /// Create a new output neuron.
    #[must_use]
    pub fn output(id: u64) -> Self {
        Self {
            id,
            role: NeuronRole::Output,
            depth: OUTPUT_DEPTH,
            recurrent: false,
        }
    }

    /// Create a new hidden neuron at `depth`.
    #[must_use]
    pub fn hidden(id: u64, depth: f32) -> Self {
        Self {
            id,
            role: NeuronRole::Hidden,
            depth,
            recurrent: false,
        }
    }
}

/// A link gene representing a weighted connection between two neurons.
///
/// `innovation` is the alignment key for crossover and compatibility scoring.
/// Only `weight`, `enabled` and `recurrent` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGene {
    /// Link innovation id issued by the innovation registry.
    pub innovation: u64,
    /// Source neuron id.
    pub from: u64,
    /// Target neuron id.
    pub to: u64,
    /// The connection weight.
    pub weight: f32,
    /// Disabled links are skipped by the phenotype but kept for crossover.
    pub enabled: bool,
    /// Set when the link feeds a neuron at the same or a smaller depth.
    pub recurrent: bool,
}

impl LinkGene {
    /// Create a new enabled link.
    #[must_use]
    pub fn new(innovation: u64, from: u64, to: u64, weight: f32, recurrent: bool) -> Self {
        Self {
            innovation,
            from,
            to,
            weight,
            enabled: true,
            recurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neuron_gene_creation() {
        let input = NeuronGene::input(0);
        assert_eq!(input.role, NeuronRole::Input);
        assert!(input.depth.abs() < 1e-6);

        let output = NeuronGene::output(1);
        assert_eq!(output.role, NeuronRole::Output);
        assert!((output.depth - 1.0).abs() < 1e-6);

        let hidden = NeuronGene::hidden(2, 0.5);
        assert_eq!(hidden.role, NeuronRole::Hidden);
        assert!(!hidden.recurrent);
    }

    #[test]
    fn test_link_gene_creation() {
        let link = LinkGene::new(7, 0, 1, 0.5, false);
        assert_eq!(link.innovation, 7);
        assert_eq!((link.from, link.to), (0, 1));
        assert!((link.weight - 0.5).abs() < 1e-6);
        assert!(link.enabled);
        assert!(!link.recurrent);
    }
}
