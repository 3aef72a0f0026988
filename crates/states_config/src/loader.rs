//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::StatesConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "states.toml";

/// Largest truth-table input width the verifier may be configured for.
const MAX_TRUTH_TABLE_WIDTH: u32 = 24;

/// Loads and validates `states.toml` from a project directory.
///
/// A missing file yields the default configuration.
pub fn load_config(project_dir: &Path) -> Result<StatesConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(StatesConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `states.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<StatesConfig, ConfigError> {
    let config: StatesConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are in range.
fn validate_config(config: &StatesConfig) -> Result<(), ConfigError> {
    if config.simulation.clock_period_ms == 0 {
        return Err(ConfigError::Invalid(
            "simulation.clock_period_ms must be positive".to_string(),
        ));
    }
    if config.verifier.max_truth_table_width > MAX_TRUTH_TABLE_WIDTH {
        return Err(ConfigError::Invalid(format!(
            "verifier.max_truth_table_width must not exceed {MAX_TRUTH_TABLE_WIDTH}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StateActionTiming, TransitionActionTiming};

    #[test]
    fn parse_empty_config() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, StatesConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[simulation]
memorized_state_actions = "on-entry"
continuous_state_actions = "one-tick-after-entry"
memorized_transition_actions = "before-crossing"
pulse_transition_actions = "before-crossing"
clock_period_ms = 250

[verifier]
max_truth_table_width = 8
check_unreachable_states = false
"#;
        let config = load_config_from_str(toml).unwrap();
        let sim = &config.simulation;
        assert_eq!(sim.memorized_state_actions, StateActionTiming::OnEntry);
        assert_eq!(
            sim.continuous_state_actions,
            StateActionTiming::OneTickAfterEntry
        );
        assert_eq!(
            sim.memorized_transition_actions,
            TransitionActionTiming::BeforeCrossing
        );
        assert_eq!(sim.clock_period_ms, 250);
        assert_eq!(config.verifier.max_truth_table_width, 8);
        assert!(!config.verifier.check_unreachable_states);
    }

    #[test]
    fn zero_clock_period_is_rejected() {
        let err = load_config_from_str("[simulation]\nclock_period_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn huge_truth_table_width_is_rejected() {
        let err = load_config_from_str("[verifier]\nmax_truth_table_width = 40\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err =
            load_config_from_str("[simulation]\nmemorized_state_actions = \"later\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), StatesConfig::default());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[simulation]\nclock_period_ms = 10\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.simulation.clock_period_ms, 10);
    }
}
