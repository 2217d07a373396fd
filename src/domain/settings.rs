//! Engine settings loaded from the `[engine]` config section.

use crate::domain::error::TradeTriggerError;
use crate::domain::evaluator::DEFAULT_CACHE_CAPACITY;
use crate::domain::registry::DEFAULT_MAX_TRIGGERS;
use crate::ports::config_port::ConfigPort;

pub const ENGINE_SECTION: &str = "engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub cache_capacity: usize,
    pub max_triggers: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_triggers: DEFAULT_MAX_TRIGGERS,
        }
    }
}

impl EngineSettings {
    /// Missing keys fall back to defaults; present keys must be positive.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeTriggerError> {
        let defaults = Self::default();
        Ok(Self {
            cache_capacity: positive(config, "cache_capacity", defaults.cache_capacity)?,
            max_triggers: positive(config, "max_triggers", defaults.max_triggers)?,
        })
    }
}

fn positive(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
) -> Result<usize, TradeTriggerError> {
    let Some(raw) = config.get_string(ENGINE_SECTION, key) else {
        return Ok(default);
    };
    let invalid = |reason: String| TradeTriggerError::ConfigInvalid {
        section: ENGINE_SECTION.to_string(),
        key: key.to_string(),
        reason,
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{} must be an integer, got '{}'", key, raw)))?;
    if value <= 0 {
        return Err(invalid(format!("{} must be positive", key)));
    }
    usize::try_from(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                values: pairs
                    .iter()
                    .map(|(k, v)| ((ENGINE_SECTION.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }

        fn sections(&self) -> Vec<String> {
            vec![ENGINE_SECTION.to_string()]
        }

        fn section_entries(&self, _section: &str) -> Vec<(String, String)> {
            Vec::new()
        }
    }

    #[test]
    fn defaults_when_section_missing() {
        let settings = EngineSettings::from_config(&MockConfig::new(&[])).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.cache_capacity, 1000);
        assert_eq!(settings.max_triggers, 100);
    }

    #[test]
    fn reads_values() {
        let config = MockConfig::new(&[("cache_capacity", "50"), ("max_triggers", "3")]);
        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.cache_capacity, 50);
        assert_eq!(settings.max_triggers, 3);
    }

    #[test]
    fn rejects_zero() {
        let config = MockConfig::new(&[("max_triggers", "0")]);
        let err = EngineSettings::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            TradeTriggerError::ConfigInvalid { ref key, .. } if key == "max_triggers"
        ));
    }

    #[test]
    fn rejects_non_integer() {
        let config = MockConfig::new(&[("cache_capacity", "lots")]);
        assert!(matches!(
            EngineSettings::from_config(&config),
            Err(TradeTriggerError::ConfigInvalid { .. })
        ));
    }
}
