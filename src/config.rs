//! Scenario file I/O (component C7).
//!
//! A `ScenarioFile` bundles the initial `GlobalState` and the `Trigger`
//! list a run starts from. It has no notion of turn-by-turn state across
//! processes — it's a format-by-extension loader that lets the CLI (and
//! tests/benches/fuzz) read a scenario definition off disk.

use crate::error::{KernelError, Result};
use crate::state::GlobalState;
use crate::trigger::Trigger;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioFile {
    pub name: Option<String>,
    pub initial_state: GlobalState,
    pub triggers: Vec<Trigger>,
}

impl Default for ScenarioFile {
    fn default() -> Self {
        ScenarioFile {
            name: None,
            initial_state: GlobalState::new(),
            triggers: Vec::new(),
        }
    }
}

impl ScenarioFile {
    /// Loads a scenario from a YAML, TOML or JSON file, dispatching on the
    /// file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(KernelError::ConfigFileRead)?;

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| KernelError::UnsupportedConfigFormat("(no extension)".to_string()))?;

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| KernelError::YamlParse(e.to_string())),
            "toml" => toml::from_str(&contents).map_err(|e| KernelError::TomlParse(e.to_string())),
            "json" => serde_json::from_str(&contents)
                .map_err(|e| KernelError::JsonSerialize(e.to_string())),
            other => Err(KernelError::UnsupportedConfigFormat(other.to_string())),
        }
    }

    /// Serializes the scenario to `path`, dispatching on extension the same
    /// way `from_file` reads it.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| KernelError::UnsupportedConfigFormat("(no extension)".to_string()))?;

        let rendered = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                serde_yaml::to_string(self).map_err(|e| KernelError::YamlParse(e.to_string()))?
            }
            "toml" => {
                toml::to_string_pretty(self).map_err(|e| KernelError::TomlParse(e.to_string()))?
            }
            "json" => serde_json::to_string_pretty(self)
                .map_err(|e| KernelError::JsonSerialize(e.to_string()))?,
            other => return Err(KernelError::UnsupportedConfigFormat(other.to_string())),
        };
        fs::write(path, rendered).map_err(KernelError::IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CountryState;
    use crate::trigger::{TriggerAction, TriggerCondition};
    use tempfile::NamedTempFile;

    fn sample_scenario() -> ScenarioFile {
        ScenarioFile {
            name: Some("rate_cut_drill".to_string()),
            initial_state: GlobalState::new().with_country("USA", CountryState::default()),
            triggers: vec![Trigger {
                name: "emergency_cut".to_string(),
                description: None,
                condition: TriggerCondition {
                    when: Some("t >= 3".to_string()),
                    once: true,
                },
                action: TriggerAction::default(),
                expires_after_turns: None,
            }],
        }
    }

    #[test]
    fn round_trips_through_yaml() {
        let scenario = sample_scenario();
        let file = NamedTempFile::with_suffix(".yaml").unwrap();
        scenario.to_file(file.path()).unwrap();
        let back = ScenarioFile::from_file(file.path()).unwrap();
        assert_eq!(scenario, back);
    }

    #[test]
    fn round_trips_through_toml() {
        let scenario = sample_scenario();
        let file = NamedTempFile::with_suffix(".toml").unwrap();
        scenario.to_file(file.path()).unwrap();
        let back = ScenarioFile::from_file(file.path()).unwrap();
        assert_eq!(scenario, back);
    }

    #[test]
    fn round_trips_through_json() {
        let scenario = sample_scenario();
        let file = NamedTempFile::with_suffix(".json").unwrap();
        scenario.to_file(file.path()).unwrap();
        let back = ScenarioFile::from_file(file.path()).unwrap();
        assert_eq!(scenario, back);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let file = NamedTempFile::with_suffix(".ini").unwrap();
        fs::write(file.path(), "anything").unwrap();
        assert!(matches!(
            ScenarioFile::from_file(file.path()),
            Err(KernelError::UnsupportedConfigFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_file_read_error() {
        assert!(matches!(
            ScenarioFile::from_file("/nonexistent/scenario.yaml"),
            Err(KernelError::ConfigFileRead(_))
        ));
    }
}
