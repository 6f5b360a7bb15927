//! NEAT genome: neuron and link genes, mutation, crossover and distance.
//!
//! A [`Genome`] keeps its link genes sorted by innovation id (the alignment key
//! for crossover and compatibility scoring) and its neuron genes sorted by
//! depth (the phenotype's execution order). An id -> index map is maintained
//! alongside the neuron list so lookups never scan it.
//!
//! Structural mutations take the population's [`InnovationRegistry`] so that
//! identical changes made by different genomes receive identical ids. The
//! registry shares identifiers only; every genome owns its own gene instances.

use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::config::NeatConfig;
use crate::gene::{LinkGene, NeuronGene, NeuronRole};
use crate::innovation::{InnovationKind, InnovationRegistry};
use crate::phenotype::Phenotype;

/// Serialized form of a genome; derived caches are rebuilt on load.
#[derive(Clone, Serialize, Deserialize)]
struct GenomeRepr {
    id: u64,
    neurons: Vec<NeuronGene>,
    links: Vec<LinkGene>,
    fitness: f32,
    #[serde(default)]
    activation: Activation,
}

/// A single individual: neuron genes, link genes and fitness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GenomeRepr", into = "GenomeRepr")]
pub struct Genome {
    /// Identifier unique within a population run.
    pub id: u64,
    /// Raw fitness assigned by the caller.
    pub fitness: f32,
    /// Fitness after age modifiers and sharing within the species.
    pub adjusted_fitness: f32,
    neurons: Vec<NeuronGene>,
    links: Vec<LinkGene>,
    activation: Activation,
    neuron_index: HashMap<u64, usize>,
    phenotype: Option<Phenotype>,
}

impl From<GenomeRepr> for Genome {
    fn from(repr: GenomeRepr) -> Self {
        let mut genome = Self::from_parts(repr.id, repr.neurons, repr.links, repr.activation);
        genome.fitness = repr.fitness;
        genome
    }
}

impl From<Genome> for GenomeRepr {
    fn from(genome: Genome) -> Self {
        Self {
            id: genome.id,
            neurons: genome.neurons,
            links: genome.links,
            fitness: genome.fitness,
            activation: genome.activation,
        }
    }
}

/// Which parent a crossover treats as the fitter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Mum,
    Dad,
}

/// Draw a fresh weight uniformly from `[-range, range]`.
fn random_weight<R: Rng>(rng: &mut R, range: f32) -> f32 {
    rng.random::<f32>() * 2.0 * range - range
}

impl Genome {
    /// Assemble a genome from gene lists, sorting them and building the index.
    #[must_use]
    pub fn from_parts(
        id: u64,
        neurons: Vec<NeuronGene>,
        links: Vec<LinkGene>,
        activation: Activation,
    ) -> Self {
        let mut genome = Self {
            id,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            neurons,
            links,
            activation,
            neuron_index: HashMap::new(),
            phenotype: None,
        };
        genome.sort_genes();
        genome
    }

    /// Create a genome with the base topology: every input linked to every
    /// output, each link with a fresh small random weight.
    #[must_use]
    pub fn new_base<R: Rng>(
        id: u64,
        registry: &InnovationRegistry,
        config: &NeatConfig,
        rng: &mut R,
    ) -> Self {
        let inputs: Vec<u64> = registry.input_ids().collect();
        let outputs: Vec<u64> = registry.output_ids().collect();

        let mut neurons = Vec::with_capacity(inputs.len() + outputs.len());
        neurons.extend(inputs.iter().map(|&id| NeuronGene::input(id)));
        neurons.extend(outputs.iter().map(|&id| NeuronGene::output(id)));

        let mut links = Vec::with_capacity(inputs.len() * outputs.len());
        for (i, &from) in inputs.iter().enumerate() {
            for (o, &to) in outputs.iter().enumerate() {
                let weight = random_weight(rng, config.new_weight_range);
                links.push(LinkGene::new(registry.base_link(i, o), from, to, weight, false));
            }
        }

        Self::from_parts(id, neurons, links, config.activation)
    }

    /// Copy this genome under a new id, dropping fitness and the phenotype.
    #[must_use]
    pub fn with_id(&self, id: u64) -> Self {
        Self {
            id,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            neurons: self.neurons.clone(),
            links: self.links.clone(),
            activation: self.activation,
            neuron_index: self.neuron_index.clone(),
            phenotype: None,
        }
    }

    /// Neuron genes in evaluation order.
    #[must_use]
    pub fn neurons(&self) -> &[NeuronGene] {
        &self.neurons
    }

    /// Link genes sorted by innovation id.
    #[must_use]
    pub fn links(&self) -> &[LinkGene] {
        &self.links
    }

    /// Look up a neuron gene by id.
    #[must_use]
    pub fn neuron(&self, id: u64) -> Option<&NeuronGene> {
        self.neuron_index.get(&id).map(|&idx| &self.neurons[idx])
    }

    #[must_use]
    pub fn contains_neuron(&self, id: u64) -> bool {
        self.neuron_index.contains_key(&id)
    }

    /// Whether a link `from -> to` exists, enabled or not. Direction matters.
    #[must_use]
    pub fn has_link(&self, from: u64, to: u64) -> bool {
        self.links.iter().any(|l| l.from == from && l.to == to)
    }

    /// Number of link genes, the size used for compatibility normalisation.
    #[must_use]
    pub fn num_genes(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn num_enabled_links(&self) -> usize {
        self.links.iter().filter(|l| l.enabled).count()
    }

    #[must_use]
    pub fn num_hidden(&self) -> usize {
        self.neurons
            .iter()
            .filter(|n| n.role == NeuronRole::Hidden)
            .count()
    }

    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Number of input neurons; they lead the depth-sorted neuron list.
    fn num_inputs(&self) -> usize {
        self.neurons.partition_point(|n| n.role == NeuronRole::Input)
    }

    /// Re-sort both gene lists and rebuild the neuron index.
    ///
    /// Links are ordered by innovation id, neurons by depth with ties broken
    /// by id. Must hold before compatibility scoring or crossover.
    pub fn sort_genes(&mut self) {
        self.links.sort_by_key(|l| l.innovation);
        self.neurons
            .sort_by(|a, b| a.depth.total_cmp(&b.depth).then(a.id.cmp(&b.id)));
        self.rebuild_index();
        self.phenotype = None;
    }

    fn rebuild_index(&mut self) {
        self.neuron_index.clear();
        for (idx, neuron) in self.neurons.iter().enumerate() {
            let previous = self.neuron_index.insert(neuron.id, idx);
            debug_assert!(previous.is_none(), "duplicate neuron id {}", neuron.id);
        }
    }

    fn insert_link(&mut self, link: LinkGene) {
        let pos = self.links.partition_point(|l| l.innovation < link.innovation);
        debug_assert!(
            self.links.get(pos).is_none_or(|l| l.innovation != link.innovation),
            "duplicate innovation {}",
            link.innovation
        );
        self.links.insert(pos, link);
    }

    fn insert_neuron(&mut self, neuron: NeuronGene) {
        let pos = self.neurons.partition_point(|n| {
            n.depth
                .total_cmp(&neuron.depth)
                .then(n.id.cmp(&neuron.id))
                .is_lt()
        });
        self.neurons.insert(pos, neuron);
        self.rebuild_index();
    }

    /// Evaluate the phenotype, building it on first use.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` does not match the number of input neurons.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Vec<f32> {
        self.phenotype().evaluate(inputs)
    }

    /// Evaluate the phenotype into a caller-provided buffer.
    ///
    /// # Panics
    ///
    /// Panics if `inputs` or `outputs` do not match the layer widths.
    pub fn evaluate_into(&mut self, inputs: &[f32], outputs: &mut [f32]) {
        self.phenotype().evaluate_into(inputs, outputs);
    }

    /// Zero the recurrent state of the phenotype, if one has been built.
    pub fn reset_state(&mut self) {
        if let Some(phenotype) = &mut self.phenotype {
            phenotype.reset_state();
        }
    }

    /// The phenotype, built from enabled links on first access.
    pub fn phenotype(&mut self) -> &mut Phenotype {
        self.phenotype.get_or_insert_with(|| {
            Phenotype::new(
                &self.neurons,
                &self.links,
                &self.neuron_index,
                self.activation,
            )
        })
    }

    /// Drop the phenotype so the next evaluation rebuilds it with fresh state.
    pub fn invalidate_phenotype(&mut self) {
        self.phenotype = None;
    }

    /// With probability `config.add_link_rate`, try to add one link.
    ///
    /// With probability `config.add_recurrent_link_rate` the attempt looks for a
    /// hidden or output neuron without a self-loop and loops it onto itself.
    /// Otherwise it looks for a neuron pair with no `from -> to` link yet; the
    /// new link is recurrent when its source is at least as deep as its target.
    /// Returns `false` when the roll fails or the retry budget runs out.
    pub fn mutate_add_link<R: Rng>(
        &mut self,
        config: &NeatConfig,
        registry: &mut InnovationRegistry,
        rng: &mut R,
    ) -> bool {
        if rng.random::<f32>() >= config.add_link_rate {
            return false;
        }

        let first_non_input = self.num_inputs();
        if first_non_input >= self.neurons.len() {
            return false;
        }

        let mut candidate = None;

        if rng.random::<f32>() < config.add_recurrent_link_rate {
            for _ in 0..config.max_tries_loop {
                let neuron = &self.neurons[rng.random_range(first_non_input..self.neurons.len())];
                if !neuron.recurrent && !self.has_link(neuron.id, neuron.id) {
                    candidate = Some((neuron.id, neuron.id, true));
                    break;
                }
            }
        } else {
            for _ in 0..config.max_tries_link {
                let from = &self.neurons[rng.random_range(0..self.neurons.len())];
                let to = &self.neurons[rng.random_range(first_non_input..self.neurons.len())];
                // Self-loops only come from the recurrent path.
                if from.id == to.id || self.has_link(from.id, to.id) {
                    continue;
                }
                candidate = Some((from.id, to.id, from.depth >= to.depth));
                break;
            }
        }

        let Some((from, to, recurrent)) = candidate else {
            return false;
        };

        let innovation = registry.get_or_create(from, to, InnovationKind::Link);
        let weight = random_weight(rng, config.new_weight_range);
        self.insert_link(LinkGene::new(innovation, from, to, weight, recurrent));

        if from == to {
            if let Some(&idx) = self.neuron_index.get(&from) {
                self.neurons[idx].recurrent = true;
            }
        }

        self.phenotype = None;
        true
    }

    /// With probability `config.add_neuron_rate`, split a random enabled,
    /// non-recurrent link with a new hidden neuron.
    ///
    /// The split link is disabled and replaced by `from -> new` (weight 1.0)
    /// and `new -> to` (the old weight). The neuron sits at the midpoint depth.
    /// Returns the new neuron id, or `None` when no link was split.
    pub fn mutate_add_neuron<R: Rng>(
        &mut self,
        config: &NeatConfig,
        registry: &mut InnovationRegistry,
        rng: &mut R,
    ) -> Option<u64> {
        if rng.random::<f32>() >= config.add_neuron_rate || self.links.is_empty() {
            return None;
        }

        let mut chosen = None;
        for _ in 0..config.max_tries_old_link {
            let idx = rng.random_range(0..self.links.len());
            let link = &self.links[idx];
            if link.enabled && !link.recurrent {
                chosen = Some(idx);
                break;
            }
        }
        let idx = chosen?;

        let (from, to, weight) = {
            let link = &self.links[idx];
            (link.from, link.to, link.weight)
        };
        let depth = (self.neuron(from)?.depth + self.neuron(to)?.depth) / 2.0;
        self.links[idx].enabled = false;

        let kind = InnovationKind::Neuron(NeuronRole::Hidden);
        // A genome splitting the same link again (re-enabled through
        // crossover) needs a neuron it does not hold yet.
        let neuron_id = registry
            .check_innovation_unless(from, to, kind, |id| self.contains_neuron(id))
            .unwrap_or_else(|| registry.create_innovation(from, to, kind));

        let in_innovation = registry.get_or_create(from, neuron_id, InnovationKind::Link);
        let out_innovation = registry.get_or_create(neuron_id, to, InnovationKind::Link);

        self.insert_neuron(NeuronGene::hidden(neuron_id, depth));
        self.insert_link(LinkGene::new(in_innovation, from, neuron_id, 1.0, false));
        self.insert_link(LinkGene::new(out_innovation, neuron_id, to, weight, false));

        self.phenotype = None;
        Some(neuron_id)
    }

    /// Each link gene, with probability `config.weight_mutation_rate`, is
    /// either replaced by a fresh weight (`config.weight_replace_rate`) or
    /// perturbed by Gaussian noise. Weights are clamped to `config.weight_limit`.
    ///
    /// Returns the number of genes changed.
    pub fn mutate_weights<R: Rng>(&mut self, config: &NeatConfig, rng: &mut R) -> usize {
        let Ok(noise) = Normal::new(0.0f32, config.weight_perturbation_std) else {
            return 0;
        };

        let mut changed = 0;
        for link in &mut self.links {
            if rng.random::<f32>() >= config.weight_mutation_rate {
                continue;
            }
            if rng.random::<f32>() < config.weight_replace_rate {
                link.weight = random_weight(rng, config.new_weight_range);
            } else {
                link.weight += noise.sample(rng);
            }
            link.weight = link.weight.clamp(-config.weight_limit, config.weight_limit);
            changed += 1;
        }

        if changed > 0 {
            self.phenotype = None;
        }
        changed
    }

    /// Classic NEAT compatibility distance.
    ///
    /// Both link lists are walked in innovation order. Genes past the end of
    /// the other genome's list are excess, other mismatches are disjoint, and
    /// matched genes contribute their mean absolute weight difference. Counts
    /// are normalised by the larger genome's gene count. The result is
    /// symmetric, and the weight term is zero when no genes match.
    #[must_use]
    pub fn compatibility_score(&self, other: &Genome, config: &NeatConfig) -> f32 {
        debug_assert!(self.links.is_sorted_by_key(|l| l.innovation));
        debug_assert!(other.links.is_sorted_by_key(|l| l.innovation));

        let mut matched = 0usize;
        let mut disjoint = 0usize;
        let mut excess = 0usize;
        let mut weight_difference = 0.0f32;

        let (mut i, mut j) = (0, 0);
        loop {
            match (self.links.get(i), other.links.get(j)) {
                (Some(a), Some(b)) => match a.innovation.cmp(&b.innovation) {
                    std::cmp::Ordering::Equal => {
                        matched += 1;
                        weight_difference += (a.weight - b.weight).abs();
                        i += 1;
                        j += 1;
                    }
                    std::cmp::Ordering::Less => {
                        disjoint += 1;
                        i += 1;
                    }
                    std::cmp::Ordering::Greater => {
                        disjoint += 1;
                        j += 1;
                    }
                },
                (Some(_), None) => {
                    excess += 1;
                    i += 1;
                }
                (None, Some(_)) => {
                    excess += 1;
                    j += 1;
                }
                (None, None) => break,
            }
        }

        let n = self.links.len().max(other.links.len()).max(1) as f32;
        let mean_weight_difference = if matched > 0 {
            weight_difference / matched as f32
        } else {
            0.0
        };

        config.excess_coefficient * excess as f32 / n
            + config.disjoint_coefficient * disjoint as f32 / n
            + config.matched_weight_coefficient * mean_weight_difference
    }

    /// Produce an offspring by aligning both parents' link genes.
    ///
    /// The fitter parent is chosen by fitness, then by fewer genes, then at
    /// random. Matching genes come from either parent with equal chance; genes
    /// present in only one parent are inherited only from the fitter one. The
    /// child holds exactly the neurons its links reference plus the fitter
    /// parent's input and output layers.
    #[must_use]
    pub fn crossover<R: Rng>(mum: &Genome, dad: &Genome, child_id: u64, rng: &mut R) -> Genome {
        let best = match mum.fitness.partial_cmp(&dad.fitness) {
            Some(std::cmp::Ordering::Greater) => Parent::Mum,
            Some(std::cmp::Ordering::Less) => Parent::Dad,
            _ => match mum.links.len().cmp(&dad.links.len()) {
                std::cmp::Ordering::Less => Parent::Mum,
                std::cmp::Ordering::Greater => Parent::Dad,
                std::cmp::Ordering::Equal => {
                    if rng.random::<bool>() {
                        Parent::Mum
                    } else {
                        Parent::Dad
                    }
                }
            },
        };

        let mut links = Vec::with_capacity(mum.links.len().max(dad.links.len()));
        let (mut i, mut j) = (0, 0);
        loop {
            let inherited = match (mum.links.get(i), dad.links.get(j)) {
                (Some(a), Some(b)) => match a.innovation.cmp(&b.innovation) {
                    std::cmp::Ordering::Equal => {
                        i += 1;
                        j += 1;
                        Some(if rng.random::<bool>() { a } else { b })
                    }
                    std::cmp::Ordering::Less => {
                        i += 1;
                        (best == Parent::Mum).then_some(a)
                    }
                    std::cmp::Ordering::Greater => {
                        j += 1;
                        (best == Parent::Dad).then_some(b)
                    }
                },
                (Some(a), None) => {
                    i += 1;
                    (best == Parent::Mum).then_some(a)
                }
                (None, Some(b)) => {
                    j += 1;
                    (best == Parent::Dad).then_some(b)
                }
                (None, None) => break,
            };
            if let Some(link) = inherited {
                links.push(link.clone());
            }
        }

        let (fitter, weaker) = match best {
            Parent::Mum => (mum, dad),
            Parent::Dad => (dad, mum),
        };

        let mut neuron_ids: BTreeSet<u64> = fitter
            .neurons
            .iter()
            .filter(|n| n.role != NeuronRole::Hidden)
            .map(|n| n.id)
            .collect();
        for link in &links {
            neuron_ids.insert(link.from);
            neuron_ids.insert(link.to);
        }

        let neurons: Vec<NeuronGene> = neuron_ids
            .into_iter()
            .filter_map(|id| fitter.neuron(id).or_else(|| weaker.neuron(id)))
            .map(|neuron| {
                let mut neuron = neuron.clone();
                neuron.recurrent = links.iter().any(|l| l.from == neuron.id && l.to == neuron.id);
                neuron
            })
            .collect();

        Genome::from_parts(child_id, neurons, links, fitter.activation)
    }
}
