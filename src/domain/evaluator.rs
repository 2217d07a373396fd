//! Parse-and-evaluate front end with a bounded AST cache.

use crate::domain::context::EvalContext;
use crate::domain::error::{EvaluationError, ParseError};
use crate::domain::expr::Expr;
use crate::domain::expr_parser::{Arithmetic, Condition, Grammar};
use crate::domain::token::tokenize;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Evaluates boolean conditions.
pub type ConditionEvaluator = Evaluator<Condition>;

/// Evaluates arithmetic expressions such as order prices.
pub type ExpressionEvaluator = Evaluator<Arithmetic>;

/// Parses sources under grammar `G`, caching ASTs by exact source text.
///
/// When the cache is full the oldest inserted entry is evicted. A capacity
/// of zero disables caching.
#[derive(Debug)]
pub struct Evaluator<G> {
    cache: HashMap<String, Arc<Expr>>,
    order: VecDeque<String>,
    capacity: usize,
    grammar: PhantomData<fn() -> G>,
}

impl<G: Grammar> Default for Evaluator<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Grammar> Evaluator<G> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            grammar: PhantomData,
        }
    }

    pub fn parse(&mut self, source: &str) -> Result<Arc<Expr>, ParseError> {
        if source.trim().is_empty() {
            return Err(ParseError::empty());
        }
        if let Some(ast) = self.cache.get(source) {
            return Ok(Arc::clone(ast));
        }

        let tokens = tokenize(source)?;
        let ast = Arc::new(G::parse_tokens(&tokens, source.len())?);
        self.store(source, Arc::clone(&ast));
        Ok(ast)
    }

    fn store(&mut self, source: &str, ast: Arc<Expr>) {
        if self.capacity == 0 {
            return;
        }
        while self.cache.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.cache.remove(&oldest);
        }
        self.order.push_back(source.to_string());
        self.cache.insert(source.to_string(), ast);
    }

    pub fn evaluate(
        &mut self,
        source: &str,
        ctx: &EvalContext,
    ) -> Result<G::Output, EvaluationError> {
        let ast = self.parse(source).inspect_err(|e| {
            tracing::debug!(grammar = G::NAME, source, error = %e, "parse failed");
        })?;
        self.evaluate_ast(&ast, ctx).inspect_err(|e| {
            tracing::debug!(grammar = G::NAME, source, error = %e, "evaluation failed");
        })
    }

    pub fn evaluate_ast(
        &self,
        ast: &Expr,
        ctx: &EvalContext,
    ) -> Result<G::Output, EvaluationError> {
        ast.evaluate(ctx).map(G::finish)
    }

    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.order.clear();
        tracing::debug!(grammar = G::NAME, "expression cache cleared");
    }
}
