use serde::{Deserialize, Serialize};

use crate::{FedErr, Result};

/// How the clients of a round are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientSelection {
    /// Every client trains every round, `fraction_fit` is only recorded.
    #[default]
    All,
    /// A seeded random subset of `max(1, round(fraction_fit * num_clients))` clients per round.
    Fraction,
}

/// How the client deltas of a round are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    #[default]
    Mean,
    /// Weighted by the amount of samples each client trained on.
    Weighted,
}

/// Where the end of run reward comes from and who gets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub user_id: u64,
    pub previous_metric: f64,
    pub current_metric: f64,
    pub scaling_factor: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            user_id: 1,
            previous_metric: 0.5,
            current_metric: 0.4,
            scaling_factor: incentives::DEFAULT_SCALING_FACTOR,
        }
    }
}

/// The parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_rounds: usize,
    pub num_clients: usize,
    pub fraction_fit: f64,
    pub selection: ClientSelection,
    pub aggregation: AggregationKind,
    /// Whether the clients of a round train concurrently.
    pub parallel_clients: bool,
    /// Seeds the client selection.
    pub seed: u64,
    pub reward: RewardConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_rounds: 100,
            num_clients: 2,
            fraction_fit: 0.5,
            selection: ClientSelection::default(),
            aggregation: AggregationKind::default(),
            parallel_clients: false,
            seed: 0,
            reward: RewardConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Checks the configuration is runnable.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.num_clients == 0 {
            return Err(FedErr::InvalidConfig(
                "there must be at least one client".into(),
            ));
        }

        if !(self.fraction_fit > 0. && self.fraction_fit <= 1.) {
            return Err(FedErr::InvalidConfig(format!(
                "fraction_fit must be in (0, 1], got {}",
                self.fraction_fit
            )));
        }

        let scaling = self.reward.scaling_factor;
        if !scaling.is_finite() || scaling < 0. {
            return Err(FedErr::InvalidConfig(format!(
                "the reward scaling factor must be finite and non negative, got {scaling}"
            )));
        }

        let RewardConfig {
            previous_metric,
            current_metric,
            ..
        } = self.reward;
        if !previous_metric.is_finite() || !current_metric.is_finite() {
            return Err(FedErr::InvalidConfig(
                "reward metrics must be finite".into(),
            ));
        }

        Ok(())
    }

    /// Returns the amount of clients trained per round under `ClientSelection::Fraction`.
    pub fn clients_per_round(&self) -> usize {
        match self.selection {
            ClientSelection::All => self.num_clients,
            ClientSelection::Fraction => {
                let n = (self.fraction_fit * self.num_clients as f64).round() as usize;
                n.clamp(1, self.num_clients)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();

        config.validate().unwrap();
        assert_eq!(config.num_rounds, 100);
        assert_eq!(config.clients_per_round(), 2);
    }

    #[test]
    fn test_fraction_bounds() {
        for fraction_fit in [0.0, -0.1, 1.5, f64::NAN] {
            let config = SimulationConfig {
                fraction_fit,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(FedErr::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_zero_clients_is_rejected() {
        let config = SimulationConfig {
            num_clients: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_scaling_is_rejected() {
        let mut config = SimulationConfig::default();
        config.reward.scaling_factor = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clients_per_round_under_fraction() {
        let mut config = SimulationConfig {
            num_clients: 10,
            fraction_fit: 0.34,
            selection: ClientSelection::Fraction,
            ..Default::default()
        };
        assert_eq!(config.clients_per_round(), 3);

        config.fraction_fit = 0.01;
        assert_eq!(config.clients_per_round(), 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"num_rounds": 3, "selection": "fraction", "reward": {"user_id": 7}}"#)
                .unwrap();

        assert_eq!(config.num_rounds, 3);
        assert_eq!(config.num_clients, 2);
        assert_eq!(config.selection, ClientSelection::Fraction);
        assert_eq!(config.reward.user_id, 7);
        assert_eq!(config.reward.previous_metric, 0.5);
    }
}
