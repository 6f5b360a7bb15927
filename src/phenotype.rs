//! Evaluable network derived from a genome.
//!
//! The [`Phenotype`] stores, for every neuron, the list of incoming
//! `(weight, source index)` pairs of its enabled links in Compressed Sparse Row
//! (CSR) form. Neurons are executed in the genome's stored order (ascending
//! depth, inputs first, outputs last), so a feed-forward link always reads a
//! value computed earlier in the same pass.
//!
//! ## Recurrent state
//!
//! Neuron values persist between calls. A link whose source is executed after
//! its target (or a self-loop) therefore reads the value from the previous
//! evaluation. The state lives until the phenotype is rebuilt or
//! [`reset_state`](Phenotype::reset_state) is called.

use std::collections::HashMap;

use crate::activation::Activation;
use crate::gene::{LinkGene, NeuronGene, NeuronRole};

/// A compiled, evaluation-ready view of a genome.
#[derive(Debug, Clone)]
pub struct Phenotype {
    /// Current value of every neuron, indexed like the genome's neuron list.
    values: Vec<f32>,
    /// CSR: source neuron indices for all incoming links (flat array).
    csr_sources: Vec<usize>,
    /// CSR: weights, parallel to `csr_sources`.
    csr_weights: Vec<f32>,
    /// CSR: offsets into the flat arrays for each neuron (len = neurons + 1).
    csr_offsets: Vec<usize>,
    input_indices: Vec<usize>,
    output_indices: Vec<usize>,
    /// Non-input neurons in execution order.
    eval_order: Vec<usize>,
    activation: Activation,
}

impl Phenotype {
    /// Build the fan-in structure from enabled links.
    ///
    /// `neurons` must be in evaluation order and `index` must map every neuron
    /// id to its position in `neurons`. Links are consumed in the order given,
    /// which fixes the floating-point summation order per neuron.
    #[must_use]
    pub fn new(
        neurons: &[NeuronGene],
        links: &[LinkGene],
        index: &HashMap<u64, usize>,
        activation: Activation,
    ) -> Self {
        let mut input_indices = Vec::new();
        let mut output_indices = Vec::new();
        let mut eval_order = Vec::with_capacity(neurons.len());

        for (idx, neuron) in neurons.iter().enumerate() {
            match neuron.role {
                NeuronRole::Input => input_indices.push(idx),
                NeuronRole::Hidden => eval_order.push(idx),
                NeuronRole::Output => {
                    output_indices.push(idx);
                    eval_order.push(idx);
                }
            }
        }

        // Count incoming edges per target, then fill.
        let mut counts = vec![0usize; neurons.len()];
        let edges: Vec<(usize, usize, f32)> = links
            .iter()
            .filter(|link| link.enabled)
            .filter_map(|link| {
                let from = *index.get(&link.from)?;
                let to = *index.get(&link.to)?;
                Some((from, to, link.weight))
            })
            .collect();
        for &(_, to, _) in &edges {
            counts[to] += 1;
        }

        let mut csr_offsets = Vec::with_capacity(neurons.len() + 1);
        csr_offsets.push(0);
        for count in &counts {
            let last = csr_offsets[csr_offsets.len() - 1];
            csr_offsets.push(last + count);
        }

        let mut cursor = csr_offsets[..neurons.len()].to_vec();
        let mut csr_sources = vec![0usize; edges.len()];
        let mut csr_weights = vec![0.0f32; edges.len()];
        for (from, to, weight) in edges {
            let slot = cursor[to];
            csr_sources[slot] = from;
            csr_weights[slot] = weight;
            cursor[to] += 1;
        }

        Self {
            values: vec![0.0; neurons.len()],
            csr_sources,
            csr_weights,
            csr_offsets,
            input_indices,
            output_indices,
            eval_order,
            activation,
        }
    }

    /// Run one pass, writing results to a provided buffer.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` or `outputs` do not match the network's layer widths.
    pub fn evaluate_into(&mut self, inputs: &[f32], outputs: &mut [f32]) {
        assert_eq!(
            inputs.len(),
            self.num_inputs(),
            "Input length mismatch: expected {}, got {}",
            self.num_inputs(),
            inputs.len()
        );
        assert_eq!(
            outputs.len(),
            self.num_outputs(),
            "Output length mismatch: expected {}, got {}",
            self.num_outputs(),
            outputs.len()
        );

        for (&idx, &value) in self.input_indices.iter().zip(inputs) {
            self.values[idx] = value;
        }

        for &node_idx in &self.eval_order {
            let start = self.csr_offsets[node_idx];
            let end = self.csr_offsets[node_idx + 1];
            let mut sum = 0.0;
            for i in start..end {
                sum += self.csr_weights[i] * self.values[self.csr_sources[i]];
            }
            self.values[node_idx] = self.activation.apply(sum);
        }

        for (out, &idx) in outputs.iter_mut().zip(&self.output_indices) {
            *out = self.values[idx];
        }
    }

    /// Run one pass and return the output values.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not match the number of input neurons.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Vec<f32> {
        let mut outputs = vec![0.0; self.num_outputs()];
        self.evaluate_into(inputs, &mut outputs);
        outputs
    }

    /// Zero every neuron value, discarding recurrent state.
    pub fn reset_state(&mut self) {
        self.values.fill(0.0);
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_indices.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }

    /// Number of enabled links compiled into the network.
    #[must_use]
    pub fn num_links(&self) -> usize {
        self.csr_sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(neurons: &[NeuronGene]) -> HashMap<u64, usize> {
        neurons.iter().enumerate().map(|(i, n)| (n.id, i)).collect()
    }

    #[test]
    fn test_single_link() {
        let neurons = vec![NeuronGene::input(0), NeuronGene::output(1)];
        let links = vec![LinkGene::new(0, 0, 1, 0.5, false)];
        let mut phenotype = Phenotype::new(&neurons, &links, &index_of(&neurons), Activation::Tanh);

        let out = phenotype.evaluate(&[2.0]);
        assert!((out[0] - 1.0f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_links_are_skipped() {
        let neurons = vec![NeuronGene::input(0), NeuronGene::output(1)];
        let mut link = LinkGene::new(0, 0, 1, 0.5, false);
        link.enabled = false;
        let mut phenotype =
            Phenotype::new(&neurons, &[link], &index_of(&neurons), Activation::Tanh);

        assert_eq!(phenotype.num_links(), 0);
        assert!(phenotype.evaluate(&[2.0])[0].abs() < 1e-6);
    }

    #[test]
    fn test_hidden_chain() {
        let neurons = vec![
            NeuronGene::input(0),
            NeuronGene::hidden(2, 0.5),
            NeuronGene::output(1),
        ];
        let links = vec![
            LinkGene::new(1, 0, 2, 1.0, false),
            LinkGene::new(2, 2, 1, 2.0, false),
        ];
        let mut phenotype =
            Phenotype::new(&neurons, &links, &index_of(&neurons), Activation::Identity);

        assert_eq!((phenotype.num_inputs(), phenotype.num_outputs()), (1, 1));
        let out = phenotype.evaluate(&[0.25]);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_self_loop_reads_previous_value() {
        let mut output = NeuronGene::output(1);
        output.recurrent = true;
        let neurons = vec![NeuronGene::input(0), output];
        let links = vec![
            LinkGene::new(0, 0, 1, 1.0, false),
            LinkGene::new(1, 1, 1, 1.0, true),
        ];
        let mut phenotype =
            Phenotype::new(&neurons, &links, &index_of(&neurons), Activation::Identity);

        assert!((phenotype.evaluate(&[1.0])[0] - 1.0).abs() < 1e-6);
        assert!((phenotype.evaluate(&[1.0])[0] - 2.0).abs() < 1e-6);

        phenotype.reset_state();
        assert!((phenotype.evaluate(&[1.0])[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "Input length mismatch")]
    fn test_input_width_checked() {
        let neurons = vec![NeuronGene::input(0), NeuronGene::output(1)];
        let mut phenotype = Phenotype::new(&neurons, &[], &index_of(&neurons), Activation::Tanh);
        phenotype.evaluate(&[1.0, 2.0]);
    }
}
