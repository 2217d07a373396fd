//! Trigger registry: the named, ordered set of triggers a strategy runs.

use crate::domain::error::TriggerValidationError;
use crate::domain::evaluator::{ConditionEvaluator, DEFAULT_CACHE_CAPACITY};
use crate::domain::trigger::Trigger;

pub const DEFAULT_MAX_TRIGGERS: usize = 100;

/// Triggers in registration order.
///
/// Registration checks capacity, then name uniqueness, then condition
/// syntax. Membership and enabled-flag changes never touch any execution
/// state held elsewhere.
#[derive(Debug)]
pub struct TriggerRegistry {
    triggers: Vec<Trigger>,
    max_triggers: usize,
    validator: ConditionEvaluator,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRIGGERS, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(max_triggers: usize, cache_capacity: usize) -> Self {
        Self {
            triggers: Vec::new(),
            max_triggers,
            validator: ConditionEvaluator::with_capacity(cache_capacity),
        }
    }

    pub fn add(&mut self, trigger: Trigger) -> Result<(), TriggerValidationError> {
        if self.triggers.len() >= self.max_triggers {
            return Err(TriggerValidationError::CapacityExceeded {
                max: self.max_triggers,
            });
        }
        if self.position(trigger.name()).is_some() {
            return Err(TriggerValidationError::DuplicateTrigger {
                name: trigger.name().to_string(),
            });
        }
        if let Err(source) = self.validator.parse(trigger.condition()) {
            return Err(TriggerValidationError::InvalidCondition {
                trigger: trigger.name().to_string(),
                source,
            });
        }

        tracing::debug!(trigger = trigger.name(), "added trigger");
        self.triggers.push(trigger);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.triggers.remove(index);
                tracing::info!(trigger = name, "removed trigger");
                true
            }
            None => false,
        }
    }

    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(trigger) = self.triggers.iter_mut().find(|t| t.name() == name) else {
            return false;
        };
        trigger.set_enabled(enabled);
        tracing::debug!(trigger = name, enabled, "trigger toggled");
        true
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.triggers.iter().position(|t| t.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter().filter(|t| t.is_enabled())
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn max_triggers(&self) -> usize {
        self.max_triggers
    }

    /// Syntax-check a condition without registering anything.
    pub fn validate(&mut self, condition: &str) -> Result<(), TriggerValidationError> {
        self.validator.parse(condition)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ParseErrorKind;
    use crate::domain::trigger::TriggerAction;

    fn trigger(name: &str, condition: &str) -> Trigger {
        let buy = TriggerAction::trade("buy", &[("signal", "Long")]).unwrap();
        Trigger::new(name, condition, vec![buy]).unwrap()
    }

    #[test]
    fn add_and_get() {
        let mut reg = TriggerRegistry::new();
        reg.add(trigger("entry", "close > 100")).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("entry").map(|t| t.condition()), Some("close > 100"));
        assert!(reg.get("other").is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = TriggerRegistry::new();
        reg.add(trigger("entry", "close > 100")).unwrap();
        let err = reg.add(trigger("entry", "close < 50")).unwrap_err();
        assert_eq!(
            err,
            TriggerValidationError::DuplicateTrigger {
                name: "entry".into()
            }
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn invalid_condition_rejected() {
        let mut reg = TriggerRegistry::new();
        match reg.add(trigger("entry", "close >")).unwrap_err() {
            TriggerValidationError::InvalidCondition { trigger, source } => {
                assert_eq!(trigger, "entry");
                assert_eq!(source.kind, ParseErrorKind::UnexpectedEnd);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn capacity_checked_before_duplicates() {
        let mut reg = TriggerRegistry::with_capacity(1, 10);
        reg.add(trigger("entry", "close > 100")).unwrap();
        assert_eq!(
            reg.add(trigger("entry", "close > 100")).unwrap_err(),
            TriggerValidationError::CapacityExceeded { max: 1 }
        );
    }

    #[test]
    fn registration_order_is_kept() {
        let mut reg = TriggerRegistry::new();
        for name in ["c", "a", "b"] {
            reg.add(trigger(name, "close > 1")).unwrap();
        }
        let names: Vec<&str> = reg.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn enable_disable_remove_report_missing() {
        let mut reg = TriggerRegistry::new();
        reg.add(trigger("entry", "close > 1")).unwrap();

        assert!(reg.disable("entry"));
        assert_eq!(reg.enabled().count(), 0);
        assert!(reg.enable("entry"));
        assert_eq!(reg.enabled().count(), 1);

        assert!(!reg.enable("missing"));
        assert!(!reg.disable("missing"));
        assert!(!reg.remove("missing"));
        assert!(reg.remove("entry"));
        assert!(!reg.contains("entry"));
    }

    #[test]
    fn validate_condition_only() {
        let mut reg = TriggerRegistry::new();
        assert!(reg.validate("close > 1 and volume > 0").is_ok());
        assert!(matches!(
            reg.validate("close + 1"),
            Err(TriggerValidationError::InvalidSyntax(_))
        ));
        assert!(reg.is_empty());
    }
}
