use std::{env, fs, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};
use federation::SimulationConfig;
use serde::{Deserialize, Serialize};

/// Names the JSON file to load the settings from, instead of the individual variables.
pub const CONFIG_VAR: &str = "FEDSIM_CONFIG";

/// Everything the node needs to run, read from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_name: String,
    pub simulation: SimulationConfig,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Rows of synthetic training data.
    pub samples: usize,
    pub hidden_size: usize,
    /// Gives every client its own IID slice of the samples instead of the whole set.
    pub partition_data: bool,
    /// Reshuffles every client's rows at the start of each local epoch.
    pub shuffle: bool,
    /// When set, simulation records are appended to this JSON-lines file.
    pub records_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "Federated Learning Simulation with Tokenized Incentives".to_string(),
            simulation: SimulationConfig::default(),
            batch_size: 32,
            learning_rate: 0.001,
            samples: 1024,
            hidden_size: 32,
            partition_data: false,
            shuffle: true,
            records_path: None,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {value:?}"))?;
    }

    Ok(())
}

impl Settings {
    /// Loads the settings from the process environment.
    ///
    /// If `FEDSIM_CONFIG` is set the whole configuration is read from that JSON file, otherwise
    /// every variable that is set overrides its default.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `load`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(CONFIG_VAR) {
            return Self::from_file(&path);
        }

        let mut settings = Self::default();
        let sim = &mut settings.simulation;

        parse(&lookup, "NUM_ROUNDS", &mut sim.num_rounds)?;
        parse(&lookup, "NUM_CLIENTS", &mut sim.num_clients)?;
        parse(&lookup, "FRACTION_FIT", &mut sim.fraction_fit)?;
        parse(&lookup, "TOKEN_REWARD_SCALING_FACTOR", &mut sim.reward.scaling_factor)?;
        parse(&lookup, "SEED", &mut sim.seed)?;
        parse(&lookup, "PARALLEL_CLIENTS", &mut sim.parallel_clients)?;
        parse(&lookup, "BATCH_SIZE", &mut settings.batch_size)?;
        parse(&lookup, "LEARNING_RATE", &mut settings.learning_rate)?;
        parse(&lookup, "SAMPLES", &mut settings.samples)?;
        parse(&lookup, "HIDDEN_SIZE", &mut settings.hidden_size)?;
        parse(&lookup, "PARTITION_DATA", &mut settings.partition_data)?;
        parse(&lookup, "SHUFFLE", &mut settings.shuffle)?;

        if let Some(name) = lookup("PROJECT_NAME") {
            settings.project_name = name;
        }

        settings.records_path = lookup("RECORDS_PATH").map(PathBuf::from);
        settings.validate()?;
        Ok(settings)
    }

    /// Reads the settings from a JSON file, missing fields keep their defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        let settings: Self =
            serde_json::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        self.simulation.validate()?;

        if self.hidden_size == 0 {
            bail!("HIDDEN_SIZE must be positive");
        }

        if self.batch_size == 0 {
            bail!("BATCH_SIZE must be positive");
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            bail!("LEARNING_RATE must be a positive number");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.simulation.num_rounds, 100);
        assert_eq!(settings.simulation.num_clients, 2);
        assert_eq!(settings.simulation.fraction_fit, 0.5);
        assert_eq!(settings.simulation.reward.scaling_factor, 10.0);
        assert!(settings.shuffle);
        assert!(!settings.partition_data);
    }

    #[test]
    fn test_shuffle_can_be_turned_off() {
        let settings = Settings::from_lookup(lookup(&[("SHUFFLE", "false")])).unwrap();
        assert!(!settings.shuffle);
    }

    #[test]
    fn test_variables_override_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("NUM_ROUNDS", "3"),
            ("NUM_CLIENTS", "4"),
            ("FRACTION_FIT", "0.25"),
            ("TOKEN_REWARD_SCALING_FACTOR", "2.5"),
            ("BATCH_SIZE", "8"),
            ("RECORDS_PATH", "/tmp/records.jsonl"),
            ("PROJECT_NAME", "demo"),
        ]))
        .unwrap();

        assert_eq!(settings.simulation.num_rounds, 3);
        assert_eq!(settings.simulation.num_clients, 4);
        assert_eq!(settings.simulation.fraction_fit, 0.25);
        assert_eq!(settings.simulation.reward.scaling_factor, 2.5);
        assert_eq!(settings.batch_size, 8);
        assert_eq!(settings.records_path, Some(PathBuf::from("/tmp/records.jsonl")));
        assert_eq!(settings.project_name, "demo");
    }

    #[test]
    fn test_garbage_is_reported_with_its_key() {
        let err = Settings::from_lookup(lookup(&[("NUM_ROUNDS", "many")])).unwrap_err();
        assert!(err.to_string().contains("NUM_ROUNDS"));
    }

    #[test]
    fn test_invalid_fraction_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("FRACTION_FIT", "2")])).is_err());
    }

    #[test]
    fn test_json_file_takes_precedence() {
        let path = env::temp_dir().join(format!("fedsim-settings-{}.json", std::process::id()));
        fs::write(&path, r#"{"batch_size": 16, "simulation": {"num_rounds": 7}}"#).unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let settings = Settings::from_lookup(lookup(&[
            (CONFIG_VAR, path_str.as_str()),
            ("NUM_ROUNDS", "1"),
        ]))
        .unwrap();

        assert_eq!(settings.batch_size, 16);
        assert_eq!(settings.simulation.num_rounds, 7);
        assert_eq!(settings.simulation.num_clients, 2);

        let _ = fs::remove_file(&path);
    }
}
