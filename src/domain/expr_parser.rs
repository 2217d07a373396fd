//! Recursive descent parser for conditions and arithmetic expressions.
//!
//! Both grammars share the arithmetic core:
//!
//! ```text
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := primary (('*' | '/') primary)*
//! primary        := NUMBER | IDENTIFIER | DOT_VAR | BRACKET_VAR | '(' additive ')'
//! ```
//!
//! The condition grammar adds boolean structure on top:
//!
//! ```text
//! or         := and ('or' and)*
//! and        := comparison ('and' comparison)*
//! comparison := additive (CMP additive)?
//! ```
//!
//! In condition mode a parenthesised group is first tried as `additive ')'`.
//! If that fails the cursor is restored to just after `(` and the group is
//! parsed as `or ')'`. The outcome of every group is memoized by the token
//! index after its `(`, so a group is parsed at most once however often an
//! enclosing group backtracks over it. Groups nest at most
//! [`MAX_NESTING_DEPTH`] levels.

use crate::domain::error::{ParseError, ParseErrorKind};
use crate::domain::expr::{CompareOp, Expr, LogicalOp, MathOp, Value};
use crate::domain::token::{Token, TokenKind, tokenize};
use std::collections::HashMap;

pub const MAX_NESTING_DEPTH: usize = 64;

/// A position in the token stream, as returned by [`TokenCursor::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint(usize);

pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    index: usize,
    source_len: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token], source_len: usize) -> Self {
        Self {
            tokens,
            index: 0,
            source_len,
        }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    pub fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;
        Some(token)
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.index)
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.index = checkpoint.0;
    }

    /// Byte offset of the next token, or the source length at end of input.
    pub fn position(&self) -> usize {
        self.peek().map_or(self.source_len, |t| t.position)
    }

    fn advance_if(&mut self, kind: TokenKind, text: &str) -> bool {
        match self.peek() {
            Some(t) if t.is(kind, text) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Arithmetic,
    Condition,
}

/// A finished group parse and the cursor position it ended at.
type GroupOutcome = (Result<Expr, ParseError>, Checkpoint);

struct Parser<'a> {
    cursor: TokenCursor<'a>,
    mode: Mode,
    depth: usize,
    groups: HashMap<Checkpoint, GroupOutcome>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], source_len: usize, mode: Mode) -> Self {
        Self {
            cursor: TokenCursor::new(tokens, source_len),
            mode,
            depth: 0,
            groups: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<Expr, ParseError> {
        if self.cursor.is_at_end() {
            return Err(ParseError::empty());
        }
        let expr = match self.mode {
            Mode::Arithmetic => self.parse_additive()?,
            Mode::Condition => self.parse_or()?,
        };
        if let Some(token) = self.cursor.peek() {
            let kind = if token.kind == TokenKind::RParen {
                ParseErrorKind::UnmatchedClosingParen
            } else {
                ParseErrorKind::TrailingInput
            };
            return Err(ParseError::new(
                kind,
                format!("unexpected token '{}'", token.text),
                token.position,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.advance_logical(LogicalOp::Or) {
            let right = self.parse_and()?;
            left = Expr::logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.advance_logical(LogicalOp::And) {
            let right = self.parse_comparison()?;
            left = Expr::logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn advance_logical(&mut self, op: LogicalOp) -> bool {
        let found = self
            .cursor
            .peek()
            .filter(|t| t.kind == TokenKind::Logical)
            .and_then(|t| LogicalOp::from_keyword(&t.text));
        if found != Some(op) {
            return false;
        }
        self.cursor.advance();
        true
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.position();
        let left = self.parse_additive()?;

        let Some(token) = self.cursor.peek().filter(|t| t.kind == TokenKind::Comparison) else {
            if left.is_boolean() {
                return Ok(left);
            }
            return Err(ParseError::new(
                ParseErrorKind::BareArithmetic,
                "mathematical expression must be part of a comparison",
                start,
            ));
        };
        self.cursor.advance();

        let op = CompareOp::from_symbol(&token.text).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnexpectedToken,
                format!("unknown comparison operator '{}'", token.text),
                token.position,
            )
        })?;
        let right = self.parse_additive()?;

        if let Some(next) = self.cursor.peek().filter(|t| t.kind == TokenKind::Comparison) {
            return Err(ParseError::new(
                ParseErrorKind::ChainedComparison,
                format!(
                    "chained comparison '{}' is not supported, combine comparisons with 'and'",
                    next.text
                ),
                next.position,
            ));
        }

        Ok(Expr::comparison(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.peek_math(&[MathOp::Add, MathOp::Subtract]) {
            self.cursor.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::math(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;
        while let Some(op) = self.peek_math(&[MathOp::Multiply, MathOp::Divide]) {
            self.cursor.advance();
            let right = self.parse_primary()?;
            left = Expr::math(left, op, right);
        }
        Ok(left)
    }

    fn peek_math(&self, accepted: &[MathOp]) -> Option<MathOp> {
        let token = self.cursor.peek().filter(|t| t.kind == TokenKind::Math)?;
        MathOp::from_symbol(&token.text).filter(|op| accepted.contains(op))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.cursor.peek() else {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedEnd,
                "expected number, variable or '(', found end of input",
                self.cursor.position(),
            ));
        };

        match token.kind {
            TokenKind::LParen => {
                self.cursor.advance();
                self.parse_group(token.position)
            }
            TokenKind::Number => {
                self.cursor.advance();
                token.text.parse::<f64>().map(Expr::Number).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidNumber,
                        format!("invalid number '{}'", token.text),
                        token.position,
                    )
                })
            }
            kind if kind.is_variable() => {
                self.cursor.advance();
                Ok(Expr::Variable(token.text.clone()))
            }
            TokenKind::RParen => Err(ParseError::new(
                ParseErrorKind::UnmatchedClosingParen,
                "unexpected ')'",
                token.position,
            )),
            kind => Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                format!("expected number, variable or '(', found {} '{}'", kind, token.text),
                token.position,
            )),
        }
    }

    /// Parse a parenthesised group; the `(` at `open` is already consumed.
    fn parse_group(&mut self, open: usize) -> Result<Expr, ParseError> {
        let start = self.cursor.checkpoint();
        if let Some((outcome, end)) = self.groups.get(&start).cloned() {
            self.cursor.restore(end);
            return outcome;
        }
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::NestingTooDeep,
                format!("parentheses nested deeper than {} levels", MAX_NESTING_DEPTH),
                open,
            ));
        }

        self.depth += 1;
        let outcome = self.parse_group_body();
        self.depth -= 1;
        self.groups.insert(start, (outcome.clone(), self.cursor.checkpoint()));
        outcome
    }

    fn parse_group_body(&mut self) -> Result<Expr, ParseError> {
        match self.mode {
            Mode::Arithmetic => {
                let inner = self.parse_additive()?;
                self.expect_closing_paren()?;
                Ok(inner)
            }
            Mode::Condition => {
                let after_paren = self.cursor.checkpoint();
                let arithmetic = self
                    .parse_additive()
                    .and_then(|inner| self.expect_closing_paren().map(|()| inner));
                match arithmetic {
                    Ok(inner) => Ok(inner),
                    Err(_) => {
                        self.cursor.restore(after_paren);
                        let inner = self.parse_or()?;
                        self.expect_closing_paren()?;
                        Ok(inner)
                    }
                }
            }
        }
    }

    fn expect_closing_paren(&mut self) -> Result<(), ParseError> {
        if self.cursor.advance_if(TokenKind::RParen, ")") {
            return Ok(());
        }
        let found = match self.cursor.peek() {
            Some(t) => format!("'{}'", t.text),
            None => "end of input".to_string(),
        };
        Err(ParseError::new(
            ParseErrorKind::MissingClosingParen,
            format!("missing closing parenthesis, found {}", found),
            self.cursor.position(),
        ))
    }
}

/// A grammar an [`Evaluator`](crate::domain::evaluator::Evaluator) can be
/// instantiated with.
pub trait Grammar {
    /// What a successful evaluation yields.
    type Output;

    /// Human readable name, used in log messages.
    const NAME: &'static str;

    fn parse_tokens(tokens: &[Token], source_len: usize) -> Result<Expr, ParseError>;

    fn finish(value: Value) -> Self::Output;
}

/// Arithmetic expressions such as `close * 0.98`. Evaluates to `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arithmetic;

/// Boolean conditions such as `close > indicators.sma and volume > 0`.
/// Evaluates to `bool`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Condition;

impl Grammar for Arithmetic {
    type Output = f64;
    const NAME: &'static str = "expression";

    fn parse_tokens(tokens: &[Token], source_len: usize) -> Result<Expr, ParseError> {
        Parser::new(tokens, source_len, Mode::Arithmetic).parse()
    }

    fn finish(value: Value) -> f64 {
        value.as_number()
    }
}

impl Grammar for Condition {
    type Output = bool;
    const NAME: &'static str = "condition";

    fn parse_tokens(tokens: &[Token], source_len: usize) -> Result<Expr, ParseError> {
        Parser::new(tokens, source_len, Mode::Condition).parse()
    }

    fn finish(value: Value) -> bool {
        value.is_truthy()
    }
}

fn parse_with<G: Grammar>(source: &str) -> Result<Expr, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::empty());
    }
    let tokens = tokenize(source)?;
    G::parse_tokens(&tokens, source.len())
}

/// Parse an arithmetic expression.
pub fn parse_arithmetic(source: &str) -> Result<Expr, ParseError> {
    parse_with::<Arithmetic>(source)
}

/// Parse a boolean condition.
pub fn parse_condition(source: &str) -> Result<Expr, ParseError> {
    parse_with::<Condition>(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EvalContext;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    fn eval_arith(source: &str) -> f64 {
        parse_arithmetic(source)
            .unwrap()
            .evaluate(&EvalContext::new())
            .unwrap()
            .as_number()
    }

    #[test]
    fn precedence() {
        assert_eq!(eval_arith("2 + 3 * 4"), 14.0);
        assert_eq!(eval_arith("(2 + 3) * 4"), 20.0);
    }

    #[test]
    fn left_associative() {
        assert_eq!(eval_arith("10 - 4 - 3"), 3.0);
        assert_eq!(eval_arith("64 / 4 / 2"), 8.0);
    }

    #[test]
    fn simple_comparison() {
        assert_eq!(
            parse_condition("close > 100").unwrap(),
            Expr::comparison(var("close"), CompareOp::GreaterThan, num(100.0))
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_condition("a > 1 or b > 2 and c > 3").unwrap();
        assert_eq!(
            expr,
            Expr::logical(
                Expr::comparison(var("a"), CompareOp::GreaterThan, num(1.0)),
                LogicalOp::Or,
                Expr::logical(
                    Expr::comparison(var("b"), CompareOp::GreaterThan, num(2.0)),
                    LogicalOp::And,
                    Expr::comparison(var("c"), CompareOp::GreaterThan, num(3.0)),
                ),
            )
        );
    }

    #[test]
    fn parenthesised_arithmetic_in_comparison() {
        let expr = parse_condition("(high - low) / close > 0.05").unwrap();
        assert_eq!(expr.to_string(), "(((high - low) / close) > 0.05)");
    }

    #[test]
    fn parenthesised_boolean_group_backtracks() {
        let expr = parse_condition("(a > 1 or b > 2) and c < 3").unwrap();
        assert_eq!(expr.to_string(), "(((a > 1) or (b > 2)) and (c < 3))");
    }

    #[test]
    fn nested_boolean_groups() {
        let expr = parse_condition("((a > 1) and (b > 2)) or c == 0").unwrap();
        assert_eq!(expr.to_string(), "(((a > 1) and (b > 2)) or (c == 0))");
    }

    #[test]
    fn qualified_variables_parse() {
        let expr = parse_condition("indicators.sma[0] < datas[0].close").unwrap();
        assert_eq!(expr.variables(), vec!["indicators.sma[0]", "datas[0].close"]);
    }

    #[test]
    fn bare_arithmetic_is_rejected() {
        let err = parse_condition("close + 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BareArithmetic);
        let err = parse_condition("close").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BareArithmetic);
    }

    #[test]
    fn parenthesised_comparison_needs_no_operator() {
        assert!(parse_condition("(close > 1)").is_ok());
    }

    #[test]
    fn dangling_operator_reports_end_of_input() {
        let err = parse_condition("close >").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(err.position, 7);
    }

    #[test]
    fn missing_closing_paren() {
        let err = parse_arithmetic("(close + 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingClosingParen);
        assert_eq!(err.position, 10);
        assert!(parse_condition("(close > 1").is_err());
    }

    #[test]
    fn unmatched_closing_paren() {
        let err = parse_arithmetic("close + 1)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedClosingParen);
        assert_eq!(err.position, 9);
    }

    #[test]
    fn chained_comparison_is_rejected() {
        let err = parse_condition("1 < close < 10").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ChainedComparison);
        assert_eq!(err.position, 10);
    }

    #[test]
    fn arithmetic_rejects_comparison() {
        let err = parse_arithmetic("close > 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TrailingInput);
        assert_eq!(err.position, 6);
    }

    #[test]
    fn no_unary_minus() {
        let err = parse_arithmetic("-5").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.position, 0);
    }

    #[test]
    fn empty_source() {
        assert_eq!(parse_condition("").unwrap_err().kind, ParseErrorKind::Empty);
        assert_eq!(parse_arithmetic("   ").unwrap_err().kind, ParseErrorKind::Empty);
    }

    #[test]
    fn tokenize_failure_becomes_parse_error() {
        let err = parse_condition("close >@ 100").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Tokenize);
        assert_eq!(err.position, 7);
    }

    #[test]
    fn logical_operator_without_operand() {
        let err = parse_condition("close > 1 and").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd);
        assert_eq!(err.position, 13);
    }

    #[test]
    fn cursor_checkpoint_restore() {
        let tokens = tokenize("a + b").unwrap();
        let mut cursor = TokenCursor::new(&tokens, 5);
        cursor.advance();
        let mark = cursor.checkpoint();
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_at_end());
        assert_eq!(cursor.position(), 5);
        cursor.restore(mark);
        assert_eq!(cursor.peek().map(|t| t.text.as_str()), Some("+"));
    }

    fn left_nested(levels: usize) -> String {
        (0..levels).fold("a > 1 and a > 1".to_string(), |inner, _| {
            format!("({}) and a > 1", inner)
        })
    }

    #[test]
    fn nested_boolean_groups_parse_in_linear_time() {
        let source = left_nested(30);
        let started = std::time::Instant::now();
        let expr = parse_condition(&source).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let ctx = EvalContext::new().with("a", 2.0);
        assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Bool(true));
        assert_eq!(expr.variables().len(), 32);
    }

    #[test]
    fn nesting_limit() {
        let nested = |n: usize| format!("{}1{} > 0", "(".repeat(n), ")".repeat(n));
        assert!(parse_condition(&nested(MAX_NESTING_DEPTH)).is_ok());

        let err = parse_condition(&nested(MAX_NESTING_DEPTH + 1)).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(err.position, MAX_NESTING_DEPTH);

        let err = parse_condition(&nested(1000)).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(err.position, MAX_NESTING_DEPTH);

        let deep_math = format!("{}close{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(
            parse_arithmetic(&deep_math).unwrap_err().kind,
            ParseErrorKind::NestingTooDeep
        );
    }
}
