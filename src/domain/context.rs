//! Evaluation context: the values a condition or expression can reference.
//!
//! A context holds flat keys (`close`, `indicators.sma`) plus an optional
//! object root. Dotted and bracketed paths that are not flat keys are
//! decomposed and walked through the root.

use crate::domain::error::EvaluationError;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Number(f64),
    Bool(bool),
    Text(String),
    /// An object with named attributes.
    Record(BTreeMap<String, ContextValue>),
    /// A string-keyed mapping.
    Map(BTreeMap<String, ContextValue>),
    List(Vec<ContextValue>),
}

impl ContextValue {
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ContextValue)>,
    {
        ContextValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ContextValue)>,
    {
        ContextValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Coerce a scalar to `f64`. `path` is used only for the error message.
    pub fn to_number(&self, path: &str) -> Result<f64, EvaluationError> {
        match self {
            ContextValue::Number(n) => Ok(*n),
            ContextValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            ContextValue::Text(s) => {
                s.trim()
                    .parse::<f64>()
                    .map_err(|e| EvaluationError::NotNumeric {
                        path: path.to_string(),
                        reason: format!("'{}': {}", s, e),
                    })
            }
            ContextValue::Record(_) => Err(not_numeric(path, "value is an object")),
            ContextValue::Map(_) => Err(not_numeric(path, "value is a mapping")),
            ContextValue::List(_) => Err(not_numeric(path, "value is a list")),
        }
    }

    /// Attribute lookup first, then key lookup.
    fn member(&self, name: &str) -> Option<&ContextValue> {
        match self {
            ContextValue::Record(fields) => fields.get(name),
            ContextValue::Map(entries) => entries.get(name),
            _ => None,
        }
    }

    fn element(&self, index: usize) -> Option<&ContextValue> {
        match self {
            ContextValue::List(items) => items.get(index),
            _ => None,
        }
    }
}

fn not_numeric(path: &str, reason: &str) -> EvaluationError {
    EvaluationError::NotNumeric {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        ContextValue::Number(n)
    }
}

impl From<i64> for ContextValue {
    fn from(n: i64) -> Self {
        ContextValue::Number(n as f64)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        ContextValue::Bool(b)
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

impl From<Vec<ContextValue>> for ContextValue {
    fn from(items: Vec<ContextValue>) -> Self {
        ContextValue::List(items)
    }
}

/// One step of a decomposed variable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Name(String),
    Index(usize),
    /// Non-numeric bracket contents, walked relative to the current object.
    Nested(Vec<PathPart>),
}

/// Split a qualified name into path parts.
///
/// `indicators.sma.lines.sma` → four names, `datas[0].close` → name, index,
/// name, and `lines[sma]` → name then a nested path `[sma]`.
pub fn split_path(name: &str) -> Vec<PathPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut parts),
            '[' => {
                flush(&mut current, &mut parts);
                let mut inner = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    match c {
                        '[' => depth += 1,
                        ']' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    inner.push(c);
                }
                let index = (!inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()))
                    .then(|| inner.parse::<usize>().ok())
                    .flatten();
                match index {
                    Some(i) => parts.push(PathPart::Index(i)),
                    None => parts.push(PathPart::Nested(split_path(&inner))),
                }
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut parts);
    parts
}

fn flush(current: &mut String, parts: &mut Vec<PathPart>) {
    if !current.is_empty() {
        parts.push(PathPart::Name(std::mem::take(current)));
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    values: HashMap<String, ContextValue>,
    root: Option<ContextValue>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn set_root(&mut self, root: ContextValue) {
        self.root = Some(root);
    }

    pub fn with_root(mut self, root: ContextValue) -> Self {
        self.set_root(root);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a variable reference to a number.
    ///
    /// An exact flat key always wins. Otherwise a path with more than one
    /// part is walked through the object root.
    pub fn resolve(&self, path: &str) -> Result<f64, EvaluationError> {
        if let Some(value) = self.values.get(path) {
            return value.to_number(path);
        }

        let parts = split_path(path);
        let not_found = || EvaluationError::VariableNotFound {
            path: path.to_string(),
        };
        if parts.len() < 2 {
            return Err(not_found());
        }
        let root = self.root.as_ref().ok_or_else(not_found)?;
        walk(root, &parts).ok_or_else(not_found)?.to_number(path)
    }
}

fn walk<'a>(start: &'a ContextValue, parts: &[PathPart]) -> Option<&'a ContextValue> {
    let mut current = start;
    for part in parts {
        current = match part {
            PathPart::Name(name) => current.member(name)?,
            PathPart::Index(i) => current.element(*i)?,
            PathPart::Nested(inner) => {
                if inner.is_empty() {
                    return None;
                }
                walk(current, inner)?
            }
        };
    }
    Some(current)
}
