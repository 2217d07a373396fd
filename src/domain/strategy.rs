//! Data-only strategy definitions.
//!
//! A definition names its parameters, indicators and triggers. Installing it
//! builds validated [`Trigger`]s and registers them in declaration order.

use crate::domain::error::TriggerValidationError;
use crate::domain::registry::TriggerRegistry;
use crate::domain::trigger::{ActionKind, Trigger, TriggerAction};
use std::collections::BTreeMap;

pub const DEFAULT_ACTION_KIND: &str = "TradeAction";

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub kind: String,
    pub params: BTreeMap<String, String>,
}

impl IndicatorSpec {
    /// Parameters with strategy-parameter references replaced by their values.
    ///
    /// A value that exactly matches a strategy parameter name is substituted.
    pub fn resolved_params(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        self.params
            .iter()
            .map(|(key, value)| {
                let value = parameters.get(value).unwrap_or(value);
                (key.clone(), value.clone())
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionSpec {
    pub name: Option<String>,
    /// Defaults to `TradeAction`.
    pub kind: Option<String>,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSpec {
    pub name: Option<String>,
    pub condition: String,
    /// `None` entries are placeholders and are skipped.
    pub actions: Vec<Option<ActionSpec>>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyDefinition {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    pub indicators: Vec<IndicatorSpec>,
    pub triggers: Vec<TriggerSpec>,
}

impl StrategyDefinition {
    pub fn indicator_names(&self) -> Vec<String> {
        self.indicators.iter().map(|i| i.name.clone()).collect()
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Collect every structural problem instead of stopping at the first.
    /// Condition syntax is not checked here.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("strategy name must be a non-empty string".to_string());
        }

        for (i, indicator) in self.indicators.iter().enumerate() {
            if indicator.name.trim().is_empty() {
                issues.push(format!("indicator at index {} has an empty name", i));
            }
            if indicator.kind.trim().is_empty() {
                issues.push(format!(
                    "indicator '{}' is missing required 'type' field",
                    indicator.name
                ));
            }
        }

        for (i, trigger) in self.triggers.iter().enumerate() {
            let label = trigger
                .name
                .as_deref()
                .map_or_else(|| format!("at index {}", i), |n| format!("'{}'", n));
            if trigger.condition.trim().is_empty() {
                issues.push(format!("trigger {} must have a non-empty condition", label));
            }
            if trigger.actions.iter().all(Option::is_none) {
                issues.push(format!("trigger {} must have at least one valid action", label));
            }
            for action in trigger.actions.iter().flatten() {
                let kind = action.kind.as_deref().unwrap_or(DEFAULT_ACTION_KIND);
                if ActionKind::from_name(kind).is_none() {
                    issues.push(format!(
                        "trigger {} uses unsupported action type '{}'",
                        label, kind
                    ));
                }
            }
        }

        issues
    }

    /// Build triggers, naming unnamed triggers `UnnamedTrigger_<n>` and
    /// unnamed actions `unnamed_action_<index>`.
    pub fn build_triggers(&self) -> Result<Vec<Trigger>, TriggerValidationError> {
        let mut unnamed = 0;
        let mut triggers = Vec::with_capacity(self.triggers.len());

        for spec in &self.triggers {
            let name = match spec.name.as_deref().filter(|n| !n.trim().is_empty()) {
                Some(name) => name.to_string(),
                None => {
                    let name = format!("UnnamedTrigger_{}", unnamed);
                    unnamed += 1;
                    name
                }
            };

            let condition = spec.condition.trim();
            if condition.is_empty() {
                return Err(TriggerValidationError::EmptyCondition { trigger: name });
            }

            let mut actions = Vec::new();
            for (j, action) in spec.actions.iter().enumerate() {
                let Some(action) = action else {
                    continue;
                };
                let action_name = action
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("unnamed_action_{}", j));
                let kind = action.kind.as_deref().unwrap_or(DEFAULT_ACTION_KIND);
                actions.push(TriggerAction::from_kind_name(
                    action_name,
                    kind,
                    action.params.clone(),
                )?);
            }

            let trigger = Trigger::new(name, condition, actions)?;
            triggers.push(if spec.enabled { trigger } else { trigger.disabled() });
        }

        Ok(triggers)
    }

    /// Register every trigger, failing on the first invalid one.
    pub fn install(&self, registry: &mut TriggerRegistry) -> Result<(), TriggerValidationError> {
        for trigger in self.build_triggers()? {
            registry.add(trigger)?;
        }
        tracing::info!(strategy = %self.name, triggers = registry.len(), "strategy installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(name: Option<&str>, params: &[(&str, &str)]) -> Option<ActionSpec> {
        Some(ActionSpec {
            name: name.map(String::from),
            kind: None,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    fn trigger(
        name: Option<&str>,
        condition: &str,
        actions: Vec<Option<ActionSpec>>,
    ) -> TriggerSpec {
        TriggerSpec {
            name: name.map(String::from),
            condition: condition.into(),
            actions,
            enabled: true,
        }
    }

    fn sample() -> StrategyDefinition {
        StrategyDefinition {
            name: "sma_cross".into(),
            parameters: BTreeMap::from([("sma_period".to_string(), "20".to_string())]),
            indicators: vec![IndicatorSpec {
                name: "sma".into(),
                kind: "SMA".into(),
                params: BTreeMap::from([("period".to_string(), "sma_period".to_string())]),
            }],
            triggers: vec![
                trigger(
                    Some("entry"),
                    "close > indicators.sma",
                    vec![
                        action(Some("buy"), &[("signal", "Long")]),
                        action(Some("stop"), &[("signal", "Short"), ("orderType", "StopTrail")]),
                    ],
                ),
                trigger(None, "close < 10", vec![None, action(None, &[("signal", "Short")])]),
            ],
        }
    }

    #[test]
    fn indicator_params_substitute_strategy_parameters() {
        let def = sample();
        let params = def.indicators[0].resolved_params(&def.parameters);
        assert_eq!(params.get("period").map(String::as_str), Some("20"));
    }

    #[test]
    fn set_parameter_changes_substitution() {
        let mut def = sample();
        def.set_parameter("sma_period", "50");
        let params = def.indicators[0].resolved_params(&def.parameters);
        assert_eq!(params.get("period").map(String::as_str), Some("50"));
    }

    #[test]
    fn unnamed_triggers_and_actions_get_generated_names() {
        let triggers = sample().build_triggers().unwrap();
        assert_eq!(triggers[0].name(), "entry");
        assert_eq!(triggers[1].name(), "UnnamedTrigger_0");
        let names: Vec<&str> = triggers[1].actions().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["unnamed_action_1"]);
    }

    #[test]
    fn only_placeholders_means_no_actions() {
        let mut def = sample();
        def.triggers[1].actions = vec![None];
        assert!(matches!(
            def.build_triggers(),
            Err(TriggerValidationError::NoActions { .. })
        ));
        assert_eq!(def.validate().len(), 1);
    }

    #[test]
    fn unsupported_action_kind() {
        let mut def = sample();
        if let Some(Some(a)) = def.triggers[0].actions.get_mut(0) {
            a.kind = Some("EmailAction".into());
        }
        assert!(matches!(
            def.build_triggers(),
            Err(TriggerValidationError::UnsupportedActionKind { .. })
        ));
        assert!(def.validate()[0].contains("EmailAction"));
    }

    #[test]
    fn validate_collects_every_issue() {
        let def = StrategyDefinition {
            name: " ".into(),
            parameters: BTreeMap::new(),
            indicators: vec![IndicatorSpec {
                name: "atr".into(),
                kind: String::new(),
                params: BTreeMap::new(),
            }],
            triggers: vec![trigger(None, "", vec![])],
        };
        let issues = def.validate();
        assert_eq!(issues.len(), 4);
        assert!(issues[1].contains("'atr'"));
        assert!(issues[2].contains("index 0"));
    }

    #[test]
    fn install_registers_in_order() {
        let mut registry = TriggerRegistry::new();
        sample().install(&mut registry).unwrap();
        let names: Vec<&str> = registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["entry", "UnnamedTrigger_0"]);
    }

    #[test]
    fn install_fails_on_bad_condition() {
        let mut def = sample();
        def.triggers[0].condition = "close >".into();
        let mut registry = TriggerRegistry::new();
        assert!(matches!(
            def.install(&mut registry),
            Err(TriggerValidationError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn disabled_spec_installs_disabled() {
        let mut def = sample();
        def.triggers[0].enabled = false;
        let mut registry = TriggerRegistry::new();
        def.install(&mut registry).unwrap();
        assert_eq!(registry.get("entry").map(|t| t.is_enabled()), Some(false));
    }
}
