//! Domain error types.
//!
//! Setup failures (tokenize, parse, trigger validation) are hard errors that
//! abort configuration. Evaluation and order-execution failures raised while a
//! bar is processed are reported per trigger and never abort the bar.

/// A character the tokenizer could not match against any token pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid character '{character}' at position {position}")]
pub struct TokenizeError {
    pub character: char,
    /// Byte offset of `character` in the source.
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Empty,
    Tokenize,
    UnexpectedToken,
    UnexpectedEnd,
    MissingClosingParen,
    UnmatchedClosingParen,
    TrailingInput,
    BareArithmetic,
    ChainedComparison,
    InvalidNumber,
    NestingTooDeep,
}

/// A parse error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn empty() -> Self {
        Self::new(ParseErrorKind::Empty, "expression cannot be empty", 0)
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

impl From<TokenizeError> for ParseError {
    fn from(err: TokenizeError) -> Self {
        ParseError::new(ParseErrorKind::Tokenize, err.to_string(), err.position)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("variable '{path}' not found in context")]
    VariableNotFound { path: String },

    #[error("cannot convert variable '{path}' to a number: {reason}")]
    NotNumeric { path: String, reason: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown operator '{operator}'")]
    UnknownOperator { operator: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriggerValidationError {
    #[error("trigger name must be a non-empty string")]
    EmptyName,

    #[error("trigger '{trigger}' has an empty condition")]
    EmptyCondition { trigger: String },

    #[error("trigger '{trigger}' must have at least one action")]
    NoActions { trigger: String },

    #[error("action name must be a non-empty string")]
    EmptyActionName,

    #[error("invalid action '{action}': {reason}")]
    InvalidAction { action: String, reason: String },

    #[error(
        "unsupported action type '{kind}' for action '{action}', only 'TradeAction' is supported"
    )]
    UnsupportedActionKind { action: String, kind: String },

    #[error("trigger '{trigger}' declares action '{action}' more than once")]
    DuplicateAction { trigger: String, action: String },

    #[error("trigger with name '{name}' already exists")]
    DuplicateTrigger { name: String },

    #[error("maximum number of triggers ({max}) exceeded")]
    CapacityExceeded { max: usize },

    #[error("invalid condition syntax in trigger '{trigger}': {source}")]
    InvalidCondition {
        trigger: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid condition syntax: {0}")]
    InvalidSyntax(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderExecutionError {
    #[error("invalid signal '{value}', expected 'Long' or 'Short'")]
    InvalidSignal { value: String },

    #[error("unsupported order type '{value}'")]
    UnsupportedOrderType { value: String },

    #[error("invalid parameter {key} = '{value}': {reason}")]
    InvalidParameter {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to evaluate {key} expression: {source}")]
    Expression {
        key: String,
        #[source]
        source: EvaluationError,
    },

    #[error("ticker '{ticker}' not found in data feeds")]
    UnknownTicker { ticker: String },

    #[error("trigger '{trigger}' has no action named '{action}'")]
    UnknownAction { trigger: String, action: String },
}

/// Top-level error type for tradetrigger.
#[derive(Debug, thiserror::Error)]
pub enum TradeTriggerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("strategy '{name}' is invalid: {}", issues.join("; "))]
    InvalidStrategy { name: String, issues: Vec<String> },

    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    TriggerValidation(#[from] TriggerValidationError),

    #[error(transparent)]
    OrderExecution(#[from] OrderExecutionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradeTriggerError> for std::process::ExitCode {
    fn from(err: &TradeTriggerError) -> Self {
        let code: u8 = match err {
            TradeTriggerError::Io(_) => 1,
            TradeTriggerError::ConfigParse { .. }
            | TradeTriggerError::ConfigMissing { .. }
            | TradeTriggerError::ConfigInvalid { .. } => 2,
            TradeTriggerError::InvalidStrategy { .. } => 3,
            TradeTriggerError::Tokenize(_)
            | TradeTriggerError::Parse(_)
            | TradeTriggerError::TriggerValidation(_) => 4,
            TradeTriggerError::Evaluation(_) => 5,
            TradeTriggerError::OrderExecution(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
