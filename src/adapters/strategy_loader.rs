//! Load a [`StrategyDefinition`] from an INI strategy file.
//!
//! ```ini
//! [strategy]
//! name = sma_cross
//! indicators = sma
//! triggers = entry
//!
//! [parameters]
//! sma_period = 20
//!
//! [indicator.sma]
//! type = SMA
//! period = sma_period
//!
//! [trigger.entry]
//! condition = close > indicators.sma
//! actions = buy, stop
//!
//! [action.entry.buy]
//! signal = Long
//!
//! [action.entry.stop]
//! signal = Short
//! orderType = StopTrail
//! trailpercent = 0.05
//! ```
//!
//! When `indicators` or `triggers` is omitted, every `[indicator.*]` or
//! `[trigger.*]` section is used in name order. An action named `None` is a
//! placeholder and is skipped.

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::TradeTriggerError;
use crate::domain::strategy::{ActionSpec, IndicatorSpec, StrategyDefinition, TriggerSpec};
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;
use std::path::Path;

const STRATEGY_SECTION: &str = "strategy";
const PARAMETERS_SECTION: &str = "parameters";
const PLACEHOLDER_ACTION: &str = "None";

pub fn load_strategy_file<P: AsRef<Path>>(
    path: P,
) -> Result<StrategyDefinition, TradeTriggerError> {
    let path = path.as_ref();
    let config = FileConfigAdapter::from_file(path).map_err(|e| TradeTriggerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_strategy(&config)
}

pub fn load_strategy(config: &dyn ConfigPort) -> Result<StrategyDefinition, TradeTriggerError> {
    let name = config
        .get_string(STRATEGY_SECTION, "name")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| TradeTriggerError::ConfigMissing {
            section: STRATEGY_SECTION.to_string(),
            key: "name".to_string(),
        })?;

    let parameters: BTreeMap<String, String> =
        config.section_entries(PARAMETERS_SECTION).into_iter().collect();

    let indicators = names_for(config, "indicators", "indicator.")
        .into_iter()
        .map(|name| load_indicator(config, name))
        .collect::<Result<Vec<_>, _>>()?;

    let triggers = names_for(config, "triggers", "trigger.")
        .into_iter()
        .map(|name| load_trigger(config, &name))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        strategy = %name,
        indicators = indicators.len(),
        triggers = triggers.len(),
        "loaded strategy definition"
    );

    Ok(StrategyDefinition {
        name,
        parameters,
        indicators,
        triggers,
    })
}

/// Names from an explicit comma-separated list, or from section prefixes.
fn names_for(config: &dyn ConfigPort, key: &str, prefix: &str) -> Vec<String> {
    match config.get_string(STRATEGY_SECTION, key) {
        Some(list) => split_list(&list),
        None => config
            .sections()
            .into_iter()
            .filter_map(|s| s.strip_prefix(prefix).map(String::from))
            .filter(|s| !s.contains('.'))
            .collect(),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn load_indicator(
    config: &dyn ConfigPort,
    name: String,
) -> Result<IndicatorSpec, TradeTriggerError> {
    let section = format!("indicator.{}", name);
    let mut params: BTreeMap<String, String> =
        config.section_entries(&section).into_iter().collect();
    let kind = params.remove("type").ok_or_else(|| TradeTriggerError::ConfigMissing {
        section: section.clone(),
        key: "type".to_string(),
    })?;
    Ok(IndicatorSpec { name, kind, params })
}

fn load_trigger(config: &dyn ConfigPort, name: &str) -> Result<TriggerSpec, TradeTriggerError> {
    let section = format!("trigger.{}", name);
    let condition = config
        .get_string(&section, "condition")
        .ok_or_else(|| TradeTriggerError::ConfigMissing {
            section: section.clone(),
            key: "condition".to_string(),
        })?;

    let action_names = config
        .get_string(&section, "actions")
        .map(|list| split_list(&list))
        .unwrap_or_default();

    let actions = action_names
        .iter()
        .map(|action| {
            if action == PLACEHOLDER_ACTION {
                return Ok(None);
            }
            load_action(config, &section, name, action).map(Some)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TriggerSpec {
        name: Some(name.to_string()),
        condition,
        actions,
        enabled: config.get_bool(&section, "enabled", true),
    })
}

fn load_action(
    config: &dyn ConfigPort,
    trigger_section: &str,
    trigger: &str,
    action: &str,
) -> Result<ActionSpec, TradeTriggerError> {
    let section = format!("action.{}.{}", trigger, action);
    let mut params: BTreeMap<String, String> =
        config.section_entries(&section).into_iter().collect();
    if params.is_empty() && !config.sections().contains(&section) {
        return Err(TradeTriggerError::ConfigInvalid {
            section: trigger_section.to_string(),
            key: "actions".to_string(),
            reason: format!("action '{}' has no [{}] section", action, section),
        });
    }
    let kind = params.remove("type");
    Ok(ActionSpec {
        name: Some(action.to_string()),
        kind,
        params,
    })
}
