//! Trigger and action definitions.
//!
//! A trigger pairs a condition source with an ordered list of actions. Both
//! validate their shape on construction; condition syntax is checked when
//! the trigger is registered.

use crate::domain::error::TriggerValidationError;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Trade,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TradeAction" | "trade" => Some(ActionKind::Trade),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Trade => "TradeAction",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerAction {
    name: String,
    kind: ActionKind,
    parameters: BTreeMap<String, String>,
}

impl TriggerAction {
    pub fn new(
        name: impl Into<String>,
        kind: ActionKind,
        parameters: BTreeMap<String, String>,
    ) -> Result<Self, TriggerValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TriggerValidationError::EmptyActionName);
        }
        if let Some(key) = parameters.keys().find(|k| k.trim().is_empty()) {
            return Err(TriggerValidationError::InvalidAction {
                action: name,
                reason: format!("parameter name '{}' is empty", key),
            });
        }
        Ok(Self {
            name,
            kind,
            parameters,
        })
    }

    /// Build a trade action from its textual kind, as found in strategy files.
    pub fn from_kind_name(
        name: impl Into<String>,
        kind: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<Self, TriggerValidationError> {
        let name = name.into();
        let Some(kind) = ActionKind::from_name(kind) else {
            return Err(TriggerValidationError::UnsupportedActionKind {
                action: name,
                kind: kind.to_string(),
            });
        };
        Self::new(name, kind, parameters)
    }

    pub fn trade(
        name: impl Into<String>,
        parameters: &[(&str, &str)],
    ) -> Result<Self, TriggerValidationError> {
        let parameters = parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(name, ActionKind::Trade, parameters)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    name: String,
    condition: String,
    actions: Vec<TriggerAction>,
    enabled: bool,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        condition: impl Into<String>,
        actions: Vec<TriggerAction>,
    ) -> Result<Self, TriggerValidationError> {
        let name = name.into();
        let condition = condition.into();

        if name.trim().is_empty() {
            return Err(TriggerValidationError::EmptyName);
        }
        if condition.trim().is_empty() {
            return Err(TriggerValidationError::EmptyCondition { trigger: name });
        }
        if actions.is_empty() {
            return Err(TriggerValidationError::NoActions { trigger: name });
        }
        let mut seen = HashSet::new();
        for action in &actions {
            if !seen.insert(action.name()) {
                return Err(TriggerValidationError::DuplicateAction {
                    trigger: name,
                    action: action.name().to_string(),
                });
            }
        }

        Ok(Self {
            name,
            condition,
            actions,
            enabled: true,
        })
    }

    /// Start out disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn actions(&self) -> &[TriggerAction] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&TriggerAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
