//! Expression AST data structures and evaluation.
//!
//! - `Expr`: immutable tree of number, variable, math, comparison and logical nodes
//! - `Value`: the result of evaluating any node
//!
//! # Evaluation Semantics
//!
//! - `Math`: both operands are always evaluated; a zero divisor is an error
//! - `Comparison`: both operands evaluated, returns a boolean
//! - `and`: returns `false` without evaluating the right operand when the left is false
//! - `or`: returns `true` without evaluating the right operand when the left is true

use crate::domain::context::EvalContext;
use crate::domain::error::EvaluationError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(MathOp::Add),
            "-" => Some(MathOp::Subtract),
            "*" => Some(MathOp::Multiply),
            "/" => Some(MathOp::Divide),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
        }
    }

    pub fn apply(self, left: f64, right: f64) -> Result<f64, EvaluationError> {
        match self {
            MathOp::Add => Ok(left + right),
            MathOp::Subtract => Ok(left - right),
            MathOp::Multiply => Ok(left * right),
            MathOp::Divide => {
                if right == 0.0 {
                    return Err(EvaluationError::DivisionByZero);
                }
                Ok(left / right)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(CompareOp::GreaterThan),
            "<" => Some(CompareOp::LessThan),
            ">=" => Some(CompareOp::GreaterEqual),
            "<=" => Some(CompareOp::LessEqual),
            "==" => Some(CompareOp::Equal),
            "!=" => Some(CompareOp::NotEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::GreaterThan => ">",
            CompareOp::LessThan => "<",
            CompareOp::GreaterEqual => ">=",
            CompareOp::LessEqual => "<=",
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
        }
    }

    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::GreaterThan => left > right,
            CompareOp::LessThan => left < right,
            CompareOp::GreaterEqual => left >= right,
            CompareOp::LessEqual => left <= right,
            CompareOp::Equal => left == right,
            CompareOp::NotEqual => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "and" => Some(LogicalOp::And),
            "or" => Some(LogicalOp::Or),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    /// Booleans take part in arithmetic as 1 and 0.
    pub fn as_number(self) -> f64 {
        match self {
            Value::Number(n) => n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
        }
    }

    pub fn is_truthy(self) -> bool {
        match self {
            Value::Number(n) => n != 0.0,
            Value::Bool(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Math {
        left: Box<Expr>,
        op: MathOp,
        right: Box<Expr>,
    },
    Comparison {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn math(left: Expr, op: MathOp, right: Expr) -> Self {
        Expr::Math {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn comparison(left: Expr, op: CompareOp, right: Expr) -> Self {
        Expr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn logical(left: Expr, op: LogicalOp, right: Expr) -> Self {
        Expr::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn variable(path: impl Into<String>) -> Self {
        Expr::Variable(path.into())
    }

    /// True for nodes that produce a boolean.
    pub fn is_boolean(&self) -> bool {
        matches!(self, Expr::Comparison { .. } | Expr::Logical { .. })
    }

    /// Variable paths referenced anywhere in the tree, in left-to-right order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(path) => out.push(path),
            Expr::Math { left, right, .. }
            | Expr::Comparison { left, right, .. }
            | Expr::Logical { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext) -> Result<Value, EvaluationError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Variable(path) => ctx.resolve(path).map(Value::Number),
            Expr::Math { left, op, right } => {
                let l = left.evaluate(ctx)?.as_number();
                let r = right.evaluate(ctx)?.as_number();
                op.apply(l, r).map(Value::Number)
            }
            Expr::Comparison { left, op, right } => {
                let l = left.evaluate(ctx)?.as_number();
                let r = right.evaluate(ctx)?.as_number();
                Ok(Value::Bool(op.apply(l, r)))
            }
            Expr::Logical { left, op, right } => {
                let l = left.evaluate(ctx)?.is_truthy();
                let result = match op {
                    LogicalOp::And => l && right.evaluate(ctx)?.is_truthy(),
                    LogicalOp::Or => l || right.evaluate(ctx)?.is_truthy(),
                };
                Ok(Value::Bool(result))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Variable(path) => f.write_str(path),
            Expr::Math { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Comparison { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Logical { left, op, right } => {
                write!(f, "({} {} {})", left, op.keyword(), right)
            }
        }
    }
}
