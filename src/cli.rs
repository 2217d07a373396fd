//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::strategy_loader::load_strategy_file;
use crate::domain::context::{ContextValue, EvalContext};
use crate::domain::engine::ExecutionEngine;
use crate::domain::error::{EvaluationError, TradeTriggerError, TriggerValidationError};
use crate::domain::evaluator::{ConditionEvaluator, ExpressionEvaluator};
use crate::domain::settings::EngineSettings;

#[derive(Parser, Debug)]
#[command(name = "tradetrigger", about = "Declarative trigger/action strategy tooling")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `tradetrigger=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a strategy file and list its triggers
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
        /// Engine config with an [engine] section
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override a strategy parameter, `name=value`
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
    /// Evaluate an expression against variables given on the command line
    Eval {
        #[arg(short, long)]
        expr: String,
        /// Treat the expression as a boolean condition
        #[arg(long)]
        condition: bool,
        /// Context variable, `name=value`
        #[arg(short, long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty name in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Validate {
            strategy,
            config,
            params,
        } => run_validate(&strategy, config.as_ref(), &params),
        Command::Eval {
            expr,
            condition,
            vars,
        } => run_eval(&expr, condition, &vars),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => (&e).into(),
    }
}

pub fn load_settings(path: Option<&PathBuf>) -> Result<EngineSettings, TradeTriggerError> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| TradeTriggerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    EngineSettings::from_config(&adapter)
}

fn report(err: TradeTriggerError) -> TradeTriggerError {
    eprintln!("error: {err}");
    err
}

fn run_validate(
    strategy_path: &PathBuf,
    config_path: Option<&PathBuf>,
    params: &[(String, String)],
) -> Result<(), TradeTriggerError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let settings = load_settings(config_path).map_err(report)?;
    let mut definition = load_strategy_file(strategy_path).map_err(report)?;
    for (name, value) in params {
        definition.set_parameter(name.clone(), value.clone());
    }

    let issues = definition.validate();
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("  issue: {issue}");
        }
        return Err(report(TradeTriggerError::InvalidStrategy {
            name: definition.name.clone(),
            issues,
        }));
    }

    let engine = match ExecutionEngine::from_definition(&definition, settings) {
        Ok(engine) => engine,
        Err(e) => {
            if let TriggerValidationError::InvalidCondition { trigger, source } = &e {
                let spec = definition
                    .triggers
                    .iter()
                    .find(|t| t.name.as_deref() == Some(trigger.as_str()));
                if let Some(spec) = spec {
                    eprintln!("  {}", source.display_with_context(spec.condition.trim()));
                }
            }
            return Err(report(e.into()));
        }
    };

    eprintln!("\nStrategy: {}", definition.name);
    for indicator in &definition.indicators {
        let params = indicator.resolved_params(&definition.parameters);
        let rendered: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        eprintln!("  indicator {} ({}) {}", indicator.name, indicator.kind, rendered.join(" "));
    }

    let mut parser = ConditionEvaluator::with_capacity(settings.cache_capacity);
    for trigger in engine.registry().iter() {
        let state = if trigger.is_enabled() { "" } else { " [disabled]" };
        eprintln!("\nTrigger {}{}:", trigger.name(), state);
        eprintln!("  Raw:    {}", trigger.condition());
        if let Ok(ast) = parser.parse(trigger.condition()) {
            eprintln!("  Parsed: {}", ast);
        }
        for action in trigger.actions() {
            let rendered: Vec<String> = action
                .parameters()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            eprintln!("  -> {} ({}) {}", action.name(), action.kind(), rendered.join(" "));
        }
    }

    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

fn context_value(raw: &str) -> ContextValue {
    match raw {
        "true" => ContextValue::Bool(true),
        "false" => ContextValue::Bool(false),
        _ => raw
            .parse::<f64>()
            .map(ContextValue::Number)
            .unwrap_or_else(|_| ContextValue::from(raw)),
    }
}

fn run_eval(
    source: &str,
    condition: bool,
    vars: &[(String, String)],
) -> Result<(), TradeTriggerError> {
    let mut ctx = EvalContext::new();
    for (name, value) in vars {
        ctx.insert(name.clone(), context_value(value));
    }

    let result = if condition {
        ConditionEvaluator::new()
            .evaluate(source, &ctx)
            .map(|b| b.to_string())
    } else {
        ExpressionEvaluator::new()
            .evaluate(source, &ctx)
            .map(|n| n.to_string())
    };

    match result {
        Ok(value) => {
            println!("{value}");
            Ok(())
        }
        Err(EvaluationError::Parse(e)) => {
            eprintln!("{}", e.display_with_context(source));
            Err(TradeTriggerError::Parse(e))
        }
        Err(e) => Err(report(e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("close=150").unwrap(),
            ("close".to_string(), "150".to_string())
        );
        assert_eq!(
            parse_key_value("indicators.sma = 1.5").unwrap(),
            ("indicators.sma".to_string(), "1.5".to_string())
        );
        assert!(parse_key_value("close").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn context_values_are_typed() {
        assert_eq!(context_value("1.5"), ContextValue::Number(1.5));
        assert_eq!(context_value("true"), ContextValue::Bool(true));
        assert_eq!(context_value("abc"), ContextValue::Text("abc".into()));
    }

    #[test]
    fn cli_parses_eval() {
        let cli = Cli::try_parse_from([
            "tradetrigger",
            "eval",
            "--expr",
            "close > 1",
            "--condition",
            "--var",
            "close=2",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Eval {
                expr,
                condition,
                vars,
            } => {
                assert_eq!(expr, "close > 1");
                assert!(condition);
                assert_eq!(vars, vec![("close".to_string(), "2".to_string())]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn eval_reports_evaluation_errors() {
        assert!(matches!(
            run_eval("close / 0", false, &[("close".into(), "1".into())]),
            Err(TradeTriggerError::Evaluation(EvaluationError::DivisionByZero))
        ));
        assert!(matches!(
            run_eval("close >", true, &[]),
            Err(TradeTriggerError::Parse(_))
        ));
        assert!(run_eval("close > 1", true, &[("close".into(), "2".into())]).is_ok());
    }

    #[test]
    fn missing_settings_file_is_config_error() {
        let path = PathBuf::from("/nonexistent/engine.ini");
        assert!(matches!(
            load_settings(Some(&path)),
            Err(TradeTriggerError::ConfigParse { .. })
        ));
        assert_eq!(load_settings(None).unwrap(), EngineSettings::default());
    }
}
