//! Per-bar trigger execution.
//!
//! Each trigger is either idle or running an execution sequence. An idle,
//! enabled trigger whose condition holds on a bar becomes active: its first
//! action is submitted immediately and the rest are queued. Each completed
//! order submits the next queued action; the first failed order abandons the
//! sequence. An active trigger is never re-evaluated.
//!
//! Per-bar problems are reported as [`TriggerOutcome`]s and never stop the
//! remaining triggers from being processed.

use crate::domain::context::EvalContext;
use crate::domain::error::{EvaluationError, OrderExecutionError, TriggerValidationError};
use crate::domain::evaluator::{ConditionEvaluator, ExpressionEvaluator};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::order::{OrderFailure, OrderHandle, OrderRequest, OrderType, Signal};
use crate::domain::registry::TriggerRegistry;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::StrategyDefinition;
use crate::domain::trigger::TriggerAction;
use crate::ports::order_port::BrokerPort;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};

/// What happened to one trigger on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    NotMet {
        trigger: String,
    },
    /// The condition could not be evaluated; retried on the next bar.
    Skipped {
        trigger: String,
        error: EvaluationError,
    },
    Fired {
        trigger: String,
        action: String,
        handle: OrderHandle,
    },
    /// The order port declined the first action.
    Declined {
        trigger: String,
        action: String,
    },
    Aborted {
        trigger: String,
        action: String,
        error: OrderExecutionError,
    },
}

impl TriggerOutcome {
    pub fn trigger(&self) -> &str {
        match self {
            TriggerOutcome::NotMet { trigger }
            | TriggerOutcome::Skipped { trigger, .. }
            | TriggerOutcome::Fired { trigger, .. }
            | TriggerOutcome::Declined { trigger, .. }
            | TriggerOutcome::Aborted { trigger, .. } => trigger,
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self, TriggerOutcome::Fired { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbandonReason {
    OrderFailed(OrderFailure),
    Declined { action: String },
    Error(OrderExecutionError),
}

/// The effect of an order notification on a tracked sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    /// The next action was submitted.
    Advanced {
        trigger: String,
        action: String,
        handle: OrderHandle,
    },
    /// Every action completed; the trigger is idle again.
    Completed { trigger: String },
    /// The sequence stopped early; the trigger is idle again.
    Abandoned {
        trigger: String,
        reason: AbandonReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTrigger {
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAction {
    pub trigger: String,
    pub action: String,
    pub signal: Signal,
    pub order_type: OrderType,
    pub date: NaiveDate,
}

#[derive(Debug, Default)]
struct SequenceState {
    pending: VecDeque<String>,
    orders: HashMap<String, OrderHandle>,
}

#[derive(Debug, Clone)]
struct OrderRef {
    trigger: String,
    action: String,
}

#[derive(Debug)]
pub struct ExecutionEngine {
    registry: TriggerRegistry,
    conditions: ConditionEvaluator,
    expressions: ExpressionEvaluator,
    indicators: Vec<String>,
    sequences: HashMap<String, SequenceState>,
    active: HashSet<String>,
    tracked: HashMap<OrderHandle, OrderRef>,
    executed_triggers: Vec<ExecutedTrigger>,
    executed_actions: Vec<ExecutedAction>,
}

impl ExecutionEngine {
    pub fn new(registry: TriggerRegistry) -> Self {
        Self::with_settings(registry, EngineSettings::default())
    }

    pub fn with_settings(registry: TriggerRegistry, settings: EngineSettings) -> Self {
        Self {
            registry,
            conditions: ConditionEvaluator::with_capacity(settings.cache_capacity),
            expressions: ExpressionEvaluator::with_capacity(settings.cache_capacity),
            indicators: Vec::new(),
            sequences: HashMap::new(),
            active: HashSet::new(),
            tracked: HashMap::new(),
            executed_triggers: Vec::new(),
            executed_actions: Vec::new(),
        }
    }

    pub fn from_definition(
        definition: &StrategyDefinition,
        settings: EngineSettings,
    ) -> Result<Self, TriggerValidationError> {
        let mut registry =
            TriggerRegistry::with_capacity(settings.max_triggers, settings.cache_capacity);
        definition.install(&mut registry)?;
        Ok(Self::with_settings(registry, settings).with_indicators(definition.indicator_names()))
    }

    /// Indicators read from the market port each bar, exposed to conditions
    /// as `indicators.<name>`.
    pub fn with_indicators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators = names.into_iter().map(Into::into).collect();
        self
    }

    fn build_context(&self, bar: &OhlcvBar, broker: &dyn BrokerPort) -> EvalContext {
        let mut ctx = EvalContext::new();
        for (name, value) in bar.fields() {
            ctx.insert(name, value);
        }
        for name in &self.indicators {
            match broker.indicator_value(name) {
                Some(value) if !value.is_nan() => ctx.insert(format!("indicators.{}", name), value),
                _ => tracing::trace!(indicator = %name, "indicator has no value"),
            }
        }
        if let Some(root) = broker.object_root() {
            ctx.set_root(root);
        }
        ctx
    }

    /// Evaluate every enabled, idle trigger against the current bar.
    pub fn on_bar(&mut self, broker: &mut dyn BrokerPort) -> Vec<TriggerOutcome> {
        let bar = broker.current_bar();
        let ctx = self.build_context(&bar, broker);

        let candidates: Vec<String> = self
            .registry
            .enabled()
            .filter(|t| !self.active.contains(t.name()))
            .map(|t| t.name().to_string())
            .collect();

        candidates
            .into_iter()
            .filter_map(|name| self.process_trigger(&name, &ctx, bar.date, &mut *broker))
            .collect()
    }

    fn process_trigger(
        &mut self,
        name: &str,
        ctx: &EvalContext,
        date: NaiveDate,
        broker: &mut dyn BrokerPort,
    ) -> Option<TriggerOutcome> {
        let trigger = self.registry.get(name)?.clone();

        match self.conditions.evaluate(trigger.condition(), ctx) {
            Ok(false) => {
                return Some(TriggerOutcome::NotMet {
                    trigger: name.to_string(),
                });
            }
            Err(error) => {
                tracing::error!(trigger = name, %error, "error processing trigger");
                return Some(TriggerOutcome::Skipped {
                    trigger: name.to_string(),
                    error,
                });
            }
            Ok(true) => {}
        }

        let (first, rest) = trigger.actions().split_first()?;
        tracing::info!(trigger = name, %date, "trigger activated");
        self.active.insert(name.to_string());
        self.executed_triggers.push(ExecutedTrigger {
            name: name.to_string(),
            date,
        });
        self.sequences.insert(
            name.to_string(),
            SequenceState {
                pending: rest.iter().map(|a| a.name().to_string()).collect(),
                orders: HashMap::new(),
            },
        );

        let action = first.name().to_string();
        let outcome = match self.submit(name, first, ctx, date, broker) {
            Ok(Some(handle)) => TriggerOutcome::Fired {
                trigger: name.to_string(),
                action,
                handle,
            },
            Ok(None) => {
                self.reset(name);
                TriggerOutcome::Declined {
                    trigger: name.to_string(),
                    action,
                }
            }
            Err(error) => {
                self.reset(name);
                TriggerOutcome::Aborted {
                    trigger: name.to_string(),
                    action,
                    error,
                }
            }
        };
        Some(outcome)
    }

    fn submit(
        &mut self,
        trigger: &str,
        action: &TriggerAction,
        ctx: &EvalContext,
        date: NaiveDate,
        broker: &mut dyn BrokerPort,
    ) -> Result<Option<OrderHandle>, OrderExecutionError> {
        let request = OrderRequest::from_action(action, &mut self.expressions, ctx)
            .and_then(|request| broker.submit_order(&request).map(|handle| (request, handle)))
            .inspect_err(|error| {
                tracing::error!(
                    trigger,
                    action = action.name(),
                    %error,
                    "failed to execute action"
                );
            })?;

        let (request, Some(handle)) = request else {
            tracing::warn!(trigger, action = action.name(), "order declined");
            return Ok(None);
        };

        self.tracked.insert(
            handle,
            OrderRef {
                trigger: trigger.to_string(),
                action: action.name().to_string(),
            },
        );
        self.sequences
            .entry(trigger.to_string())
            .or_default()
            .orders
            .insert(action.name().to_string(), handle);
        self.executed_actions.push(ExecutedAction {
            trigger: trigger.to_string(),
            action: action.name().to_string(),
            signal: request.signal,
            order_type: request.order_type,
            date,
        });
        tracing::debug!(trigger, action = action.name(), %handle, "tracking order");
        Ok(Some(handle))
    }

    /// Advance the sequence owning `handle`. Untracked handles are ignored.
    pub fn on_order_completed(
        &mut self,
        handle: OrderHandle,
        broker: &mut dyn BrokerPort,
    ) -> Option<NotificationOutcome> {
        let OrderRef { trigger, action } = self.tracked.remove(&handle)?;
        tracing::info!(trigger = %trigger, action = %action, %handle, "order completed");

        let next = self.sequences.get_mut(&trigger).and_then(|seq| {
            seq.orders.remove(&action);
            seq.pending.pop_front()
        });

        let Some(next) = next else {
            self.reset(&trigger);
            tracing::info!(trigger = %trigger, "trigger sequence completed");
            return Some(NotificationOutcome::Completed { trigger });
        };

        let Some(next_action) = self
            .registry
            .get(&trigger)
            .and_then(|t| t.action(&next))
            .cloned()
        else {
            self.reset(&trigger);
            let error = OrderExecutionError::UnknownAction {
                trigger: trigger.clone(),
                action: next,
            };
            tracing::error!(trigger = %trigger, %error, "abandoning sequence");
            return Some(NotificationOutcome::Abandoned {
                trigger,
                reason: AbandonReason::Error(error),
            });
        };

        let bar = broker.current_bar();
        let ctx = self.build_context(&bar, broker);
        let outcome = match self.submit(&trigger, &next_action, &ctx, bar.date, broker) {
            Ok(Some(handle)) => NotificationOutcome::Advanced {
                trigger,
                action: next,
                handle,
            },
            Ok(None) => {
                self.reset(&trigger);
                NotificationOutcome::Abandoned {
                    trigger,
                    reason: AbandonReason::Declined { action: next },
                }
            }
            Err(error) => {
                self.reset(&trigger);
                NotificationOutcome::Abandoned {
                    trigger,
                    reason: AbandonReason::Error(error),
                }
            }
        };
        Some(outcome)
    }

    /// Abandon the sequence owning `handle`. Untracked handles are ignored.
    pub fn on_order_failed(
        &mut self,
        handle: OrderHandle,
        reason: OrderFailure,
    ) -> Option<NotificationOutcome> {
        let OrderRef { trigger, action } = self.tracked.remove(&handle)?;
        tracing::warn!(
            trigger = %trigger,
            action = %action,
            %handle,
            status = %reason,
            "order failed"
        );
        self.reset(&trigger);
        Some(NotificationOutcome::Abandoned {
            trigger,
            reason: AbandonReason::OrderFailed(reason),
        })
    }

    /// Return a trigger to idle, dropping its queue and outstanding handles.
    fn reset(&mut self, trigger: &str) {
        self.sequences.remove(trigger);
        self.active.remove(trigger);
        self.tracked.retain(|_, r| r.trigger != trigger);
    }

    pub fn is_active(&self, trigger: &str) -> bool {
        self.active.contains(trigger)
    }

    /// Active trigger names, sorted.
    pub fn active_triggers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.active.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn pending_actions(&self, trigger: &str) -> Vec<&str> {
        self.sequences
            .get(trigger)
            .map(|seq| seq.pending.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Outstanding order handles for a trigger, sorted.
    pub fn outstanding(&self, trigger: &str) -> Vec<OrderHandle> {
        let mut handles: Vec<OrderHandle> = self
            .sequences
            .get(trigger)
            .map(|seq| seq.orders.values().copied().collect())
            .unwrap_or_default();
        handles.sort_unstable();
        handles
    }

    pub fn executed_triggers(&self) -> &[ExecutedTrigger] {
        &self.executed_triggers
    }

    pub fn executed_actions(&self) -> &[ExecutedAction] {
        &self.executed_actions
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TriggerRegistry {
        &mut self.registry
    }

    /// Log a run summary.
    pub fn stop(&self) {
        tracing::info!(
            triggers_fired = self.executed_triggers.len(),
            actions_submitted = self.executed_actions.len(),
            still_active = self.active.len(),
            "strategy stopped"
        );
    }
}
