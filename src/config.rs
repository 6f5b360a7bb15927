//! Hyperparameters for mutation, speciation and reproduction.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::ConfigError;

/// Configuration for genome mutation, speciation and reproduction.
///
/// Rates are per-offspring probabilities unless noted otherwise. Use
/// struct-update syntax to override a handful of fields:
///
/// ```rust
/// use neat_engine::NeatConfig;
///
/// let config = NeatConfig {
///     add_neuron_rate: 0.1,
///     ..NeatConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatConfig {
    /// Generations a species may go without improving its best fitness before it is culled.
    pub generations_allowed_without_improvement: u32,
    /// Probability of attempting to add a link.
    pub add_link_rate: f32,
    /// Probability that an add-link attempt looks for a self-loop instead.
    pub add_recurrent_link_rate: f32,
    /// Probability of splitting a link with a new hidden neuron.
    pub add_neuron_rate: f32,
    /// Per-gene probability that a weight is mutated.
    pub weight_mutation_rate: f32,
    /// Per-gene probability of replacing a weight rather than perturbing it.
    pub weight_replace_rate: f32,
    /// Standard deviation of the Gaussian weight perturbation.
    pub weight_perturbation_std: f32,
    /// Fresh weights are drawn uniformly from `[-new_weight_range, new_weight_range]`.
    pub new_weight_range: f32,
    /// Weights are clamped to `[-weight_limit, weight_limit]` after mutation.
    pub weight_limit: f32,
    /// Probability that an offspring is produced by crossover.
    pub crossover_rate: f32,
    /// Genomes closer than this to a species leader join that species.
    pub compatibility_threshold: f32,
    /// Coefficient for excess genes in compatibility distance.
    pub excess_coefficient: f32,
    /// Coefficient for disjoint genes in compatibility distance.
    pub disjoint_coefficient: f32,
    /// Coefficient for the mean weight difference of matched genes.
    pub matched_weight_coefficient: f32,
    /// Species younger than this receive the young bonus.
    pub young_age_threshold: u32,
    /// Fractional fitness boost for young species.
    pub young_bonus: f32,
    /// Species older than this receive the old penalty.
    pub old_age_threshold: u32,
    /// Fractional fitness penalty for old species.
    pub old_penalty: f32,
    /// Attempts at finding a neuron for a self-loop.
    pub max_tries_loop: usize,
    /// Attempts at finding an unconnected neuron pair.
    pub max_tries_link: usize,
    /// Attempts at finding a link to split.
    pub max_tries_old_link: usize,
    /// Activation applied by every non-input neuron.
    pub activation: Activation,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            generations_allowed_without_improvement: 15,
            add_link_rate: 0.07,
            add_recurrent_link_rate: 0.05,
            add_neuron_rate: 0.03,
            weight_mutation_rate: 0.2,
            weight_replace_rate: 0.1,
            weight_perturbation_std: 0.5,
            new_weight_range: 0.3,
            weight_limit: 8.0,
            crossover_rate: 0.7,
            compatibility_threshold: 0.26,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            matched_weight_coefficient: 0.4,
            young_age_threshold: 10,
            young_bonus: 0.3,
            old_age_threshold: 50,
            old_penalty: 0.3,
            max_tries_loop: 5,
            max_tries_link: 10,
            max_tries_old_link: 5,
            activation: Activation::Tanh,
        }
    }
}

impl NeatConfig {
    /// Reject non-finite values, probabilities outside `[0, 1]`, negative
    /// magnitudes and zero retry budgets.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("add_link_rate", self.add_link_rate),
            ("add_recurrent_link_rate", self.add_recurrent_link_rate),
            ("add_neuron_rate", self.add_neuron_rate),
            ("weight_mutation_rate", self.weight_mutation_rate),
            ("weight_replace_rate", self.weight_replace_rate),
            ("crossover_rate", self.crossover_rate),
            ("old_penalty", self.old_penalty),
        ];
        for (field, value) in rates {
            check_finite(field, value)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { field, value });
            }
        }

        let magnitudes = [
            ("weight_perturbation_std", self.weight_perturbation_std),
            ("new_weight_range", self.new_weight_range),
            ("weight_limit", self.weight_limit),
            ("compatibility_threshold", self.compatibility_threshold),
            ("excess_coefficient", self.excess_coefficient),
            ("disjoint_coefficient", self.disjoint_coefficient),
            ("matched_weight_coefficient", self.matched_weight_coefficient),
            ("young_bonus", self.young_bonus),
        ];
        for (field, value) in magnitudes {
            check_finite(field, value)?;
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        let budgets = [
            ("max_tries_loop", self.max_tries_loop),
            ("max_tries_link", self.max_tries_link),
            ("max_tries_old_link", self.max_tries_old_link),
        ];
        for (field, value) in budgets {
            if value == 0 {
                return Err(ConfigError::ZeroBudget { field });
            }
        }

        Ok(())
    }
}

fn check_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}
