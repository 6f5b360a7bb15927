//! Global innovation tracking for NEAT.
//!
//! Every structural novelty (a new link, or a new hidden neuron splitting a
//! link) is recorded once in an append-only registry owned by the population.
//! When another genome later makes the same structural change, in the same or
//! a later generation, it receives the id already on record. This is what
//! makes gene alignment during crossover and compatibility scoring meaningful.
//!
//! Neuron ids and link innovation ids are issued from separate counters. The
//! registry is seeded with the base topology (every input and output neuron
//! and every input -> output link), and those bootstrap records are never
//! candidates for reuse.

use std::collections::HashMap;

use crate::gene::NeuronRole;

/// What kind of structure an innovation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InnovationKind {
    /// A link between two neurons.
    Link,
    /// A neuron with the given role created by splitting the link `from -> to`.
    Neuron(NeuronRole),
}

/// A single entry in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnovationRecord {
    /// A neuron. `split` holds the endpoints of the link it was created from;
    /// bootstrap neurons have none.
    Neuron {
        id: u64,
        split: Option<(u64, u64)>,
        role: NeuronRole,
    },
    /// A link between two neuron ids.
    Link { id: u64, from: u64, to: u64 },
}

/// Append-only registry of structural innovations.
#[derive(Debug, Clone)]
pub struct InnovationRegistry {
    records: Vec<InnovationRecord>,
    /// Ids recorded per novelty after the bootstrap set, oldest first. Links
    /// have exactly one; a split can have several neurons.
    lookup: HashMap<(InnovationKind, u64, u64), Vec<u64>>,
    bootstrap_len: usize,
    num_inputs: usize,
    num_outputs: usize,
    next_neuron_id: u64,
    next_link_id: u64,
}

impl InnovationRegistry {
    /// Create a registry seeded with the base topology.
    ///
    /// Inputs receive neuron ids `0..num_inputs`, outputs the following
    /// `num_outputs` ids. Base links are numbered input-major:
    /// input `i` -> output `o` has innovation `i * num_outputs + o`.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        let mut registry = Self {
            records: Vec::with_capacity(num_inputs + num_outputs + num_inputs * num_outputs),
            lookup: HashMap::new(),
            bootstrap_len: 0,
            num_inputs,
            num_outputs,
            next_neuron_id: 0,
            next_link_id: 0,
        };

        for _ in 0..num_inputs {
            registry.push_neuron(None, NeuronRole::Input);
        }
        for _ in 0..num_outputs {
            registry.push_neuron(None, NeuronRole::Output);
        }
        for input in 0..num_inputs as u64 {
            for output in 0..num_outputs as u64 {
                registry.push_link(input, num_inputs as u64 + output);
            }
        }

        registry.bootstrap_len = registry.records.len();
        registry
    }

    /// Look up an existing novelty with these endpoints.
    ///
    /// For [`InnovationKind::Link`] the result is the link innovation id; for
    /// [`InnovationKind::Neuron`] it is the neuron id created by splitting
    /// `from -> to`. Bootstrap records are never returned.
    #[must_use]
    pub fn check_innovation(&self, from: u64, to: u64, kind: InnovationKind) -> Option<u64> {
        self.check_innovation_unless(from, to, kind, |_| false)
    }

    /// Like [`check_innovation`](Self::check_innovation), but skips ids for
    /// which `held` returns `true`.
    ///
    /// A genome that already holds the neuron for a split passes its own
    /// membership test here, so its second split of that link reuses the
    /// second neuron any other genome recorded for it.
    #[must_use]
    pub fn check_innovation_unless(
        &self,
        from: u64,
        to: u64,
        kind: InnovationKind,
        held: impl Fn(u64) -> bool,
    ) -> Option<u64> {
        self.lookup
            .get(&(kind, from, to))?
            .iter()
            .copied()
            .find(|&id| !held(id))
    }

    /// Record a new novelty and return its id.
    ///
    /// Further neurons for the same split are appended after the first, so
    /// plain lookups keep resolving to the oldest one.
    pub fn create_innovation(&mut self, from: u64, to: u64, kind: InnovationKind) -> u64 {
        let id = match kind {
            InnovationKind::Link => {
                debug_assert!(
                    !self.lookup.contains_key(&(kind, from, to)),
                    "link {from} -> {to} already has an innovation id"
                );
                self.push_link(from, to)
            }
            InnovationKind::Neuron(role) => self.push_neuron(Some((from, to)), role),
        };
        self.lookup.entry((kind, from, to)).or_default().push(id);
        id
    }

    /// Return the recorded id for this novelty, creating one if none exists.
    pub fn get_or_create(&mut self, from: u64, to: u64, kind: InnovationKind) -> u64 {
        match self.check_innovation(from, to, kind) {
            Some(id) => id,
            None => self.create_innovation(from, to, kind),
        }
    }

    /// Neuron ids of the input layer, in order.
    pub fn input_ids(&self) -> impl Iterator<Item = u64> {
        0..self.num_inputs as u64
    }

    /// Neuron ids of the output layer, in order.
    pub fn output_ids(&self) -> impl Iterator<Item = u64> {
        let start = self.num_inputs as u64;
        start..start + self.num_outputs as u64
    }

    /// Innovation id of the base link from input `input` to output `output`.
    #[must_use]
    pub fn base_link(&self, input: usize, output: usize) -> u64 {
        debug_assert!(input < self.num_inputs && output < self.num_outputs);
        (input * self.num_outputs + output) as u64
    }

    #[must_use]
    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[must_use]
    pub const fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Number of neuron ids issued so far, bootstrap included.
    #[must_use]
    pub const fn neuron_count(&self) -> u64 {
        self.next_neuron_id
    }

    /// Number of link innovation ids issued so far, bootstrap included.
    #[must_use]
    pub const fn link_count(&self) -> u64 {
        self.next_link_id
    }

    /// All records in the order they were issued.
    #[must_use]
    pub fn records(&self) -> &[InnovationRecord] {
        &self.records
    }

    /// Records added after the bootstrap set.
    #[must_use]
    pub fn novelties(&self) -> &[InnovationRecord] {
        &self.records[self.bootstrap_len..]
    }

    fn push_neuron(&mut self, split: Option<(u64, u64)>, role: NeuronRole) -> u64 {
        let id = self.next_neuron_id;
        self.next_neuron_id += 1;
        self.records.push(InnovationRecord::Neuron { id, split, role });
        id
    }

    fn push_link(&mut self, from: u64, to: u64) -> u64 {
        let id = self.next_link_id;
        self.next_link_id += 1;
        self.records.push(InnovationRecord::Link { id, from, to });
        id
    }
}
