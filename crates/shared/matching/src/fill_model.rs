use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{MatchingError, Result};

/// Probabilities driving simulated fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillModelConfig {
    /// Chance a limit order resting exactly at the touch fills on an update
    pub prob_fill_on_limit: f64,
    /// Chance a triggered stop-market order fills on the triggering update
    pub prob_fill_on_stop: f64,
    /// Chance a taker fill slips one price increment
    pub prob_slippage: f64,
    /// Seed for the generator; `None` seeds from entropy
    pub random_seed: Option<u64>,
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            prob_fill_on_limit: 1.0,
            prob_fill_on_stop: 1.0,
            prob_slippage: 0.0,
            random_seed: None,
        }
    }
}

/// Bernoulli fill outcomes from an explicitly seeded generator
///
/// Every engine owns its own model, so two runs with the same seed and the
/// same input draw the same outcomes. Probabilities of exactly `0.0` or
/// `1.0` short-circuit without consuming the generator.
#[derive(Debug, Clone)]
pub struct FillModel {
    config: FillModelConfig,
    rng: StdRng,
}

impl FillModel {
    pub fn new(config: FillModelConfig) -> Result<Self> {
        check_probability("prob_fill_on_limit", config.prob_fill_on_limit)?;
        check_probability("prob_fill_on_stop", config.prob_fill_on_stop)?;
        check_probability("prob_slippage", config.prob_slippage)?;

        let rng = seeded(config.random_seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &FillModelConfig {
        &self.config
    }

    pub fn is_limit_filled(&mut self) -> bool {
        let p = self.config.prob_fill_on_limit;
        self.event_success(p)
    }

    pub fn is_stop_filled(&mut self) -> bool {
        let p = self.config.prob_fill_on_stop;
        self.event_success(p)
    }

    pub fn is_slipped(&mut self) -> bool {
        let p = self.config.prob_slippage;
        self.event_success(p)
    }

    /// Restart the generator from the configured seed
    pub fn reset(&mut self) {
        self.rng = seeded(self.config.random_seed);
    }

    fn event_success(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.rng.gen_bool(probability)
        }
    }
}

impl Default for FillModel {
    fn default() -> Self {
        Self {
            config: FillModelConfig::default(),
            rng: StdRng::seed_from_u64(0),
        }
    }
}

fn seeded(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MatchingError::InvalidProbability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(limit: f64, stop: f64, slip: f64, seed: u64) -> FillModel {
        FillModel::new(FillModelConfig {
            prob_fill_on_limit: limit,
            prob_fill_on_stop: stop,
            prob_slippage: slip,
            random_seed: Some(seed),
        })
        .unwrap()
    }

    #[test]
    fn test_defaults_always_fill_and_never_slip() {
        let mut fm = FillModel::default();
        for _ in 0..10 {
            assert!(fm.is_limit_filled());
            assert!(fm.is_stop_filled());
            assert!(!fm.is_slipped());
        }
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let err = FillModel::new(FillModelConfig {
            prob_slippage: 1.5,
            ..FillModelConfig::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            MatchingError::InvalidProbability {
                name: "prob_slippage",
                value: 1.5
            }
        );
    }

    #[test]
    fn test_same_seed_draws_same_sequence() {
        let mut a = model(0.5, 0.5, 0.5, 42);
        let mut b = model(0.5, 0.5, 0.5, 42);
        let draws_a: Vec<bool> = (0..64).map(|_| a.is_limit_filled()).collect();
        let draws_b: Vec<bool> = (0..64).map(|_| b.is_limit_filled()).collect();
        assert_eq!(draws_a, draws_b);
        // A fair coin over 64 draws is not constant
        assert!(draws_a.iter().any(|d| *d));
        assert!(draws_a.iter().any(|d| !*d));
    }

    #[test]
    fn test_reset_replays_from_seed() {
        let mut fm = model(0.5, 0.5, 0.5, 7);
        let first: Vec<bool> = (0..16).map(|_| fm.is_slipped()).collect();
        fm.reset();
        let second: Vec<bool> = (0..16).map(|_| fm.is_slipped()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_certain_outcomes_do_not_consume_generator() {
        let mut a = model(1.0, 0.0, 0.5, 3);
        let mut b = model(1.0, 0.0, 0.5, 3);
        assert!(a.is_limit_filled());
        assert!(!a.is_stop_filled());
        assert_eq!(a.is_slipped(), b.is_slipped());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: FillModelConfig =
            serde_json::from_str(r#"{"prob_slippage": 0.25, "random_seed": 9}"#).unwrap();
        assert_eq!(config.prob_fill_on_limit, 1.0);
        assert_eq!(config.prob_slippage, 0.25);
        assert_eq!(config.random_seed, Some(9));
    }
}
