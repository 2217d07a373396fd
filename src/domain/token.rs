//! Expression tokenizer.
//!
//! Scans left to right, trying each token pattern in a fixed priority order at
//! the current position. The first pattern that matches wins. Qualified
//! identifiers (`indicators.sma`, `datas[0].close`, `lines[sma]`) are emitted
//! as a single token and decomposed later by the variable resolver.

use crate::domain::error::TokenizeError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LParen,
    RParen,
    Comparison,
    Logical,
    Math,
    Number,
    /// `name[name]`
    BracketVar,
    /// `name` followed by one or more `.name` or `[digits]` suffixes.
    DotVar,
    Identifier,
}

impl TokenKind {
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::DotVar | TokenKind::BracketVar
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comparison => "comparison operator",
            TokenKind::Logical => "logical operator",
            TokenKind::Math => "math operator",
            TokenKind::Number => "number",
            TokenKind::BracketVar | TokenKind::DotVar | TokenKind::Identifier => "identifier",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset of the first character in the source.
    pub position: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

const COMPARISON_OPS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];
const LOGICAL_KEYWORDS: [&str; 2] = ["and", "or"];

pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if let Some(ws) = whitespace_len(source, pos) {
            pos += ws;
            continue;
        }

        let Some((kind, len)) = match_token(bytes, pos) else {
            let character = source[pos..].chars().next().unwrap_or('\0');
            return Err(TokenizeError {
                character,
                position: pos,
            });
        };

        tokens.push(Token {
            kind,
            text: source[pos..pos + len].to_string(),
            position: pos,
        });
        pos += len;
    }

    Ok(tokens)
}

fn match_token(bytes: &[u8], pos: usize) -> Option<(TokenKind, usize)> {
    match bytes[pos] {
        b'(' => return Some((TokenKind::LParen, 1)),
        b')' => return Some((TokenKind::RParen, 1)),
        _ => {}
    }

    let rest = &bytes[pos..];
    if let Some(op) = COMPARISON_OPS.iter().find(|op| rest.starts_with(op.as_bytes())) {
        return Some((TokenKind::Comparison, op.len()));
    }

    if let Some(len) = logical_len(bytes, pos) {
        return Some((TokenKind::Logical, len));
    }

    if matches!(bytes[pos], b'+' | b'-' | b'*' | b'/') {
        return Some((TokenKind::Math, 1));
    }

    if let Some(len) = number_len(bytes, pos) {
        return Some((TokenKind::Number, len));
    }

    if let Some(len) = bracket_var_len(bytes, pos) {
        return Some((TokenKind::BracketVar, len));
    }

    if let Some(len) = dot_var_len(bytes, pos) {
        return Some((TokenKind::DotVar, len));
    }

    identifier_len(bytes, pos).map(|len| (TokenKind::Identifier, len))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn whitespace_len(source: &str, pos: usize) -> Option<usize> {
    let len: usize = source[pos..]
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    (len > 0).then_some(len)
}

/// `and`/`or` on word boundaries at both ends.
fn logical_len(bytes: &[u8], pos: usize) -> Option<usize> {
    if pos > 0 && is_word_byte(bytes[pos - 1]) {
        return None;
    }
    let rest = &bytes[pos..];
    LOGICAL_KEYWORDS
        .iter()
        .find(|kw| {
            rest.starts_with(kw.as_bytes())
                && rest.get(kw.len()).is_none_or(|&b| !is_word_byte(b))
        })
        .map(|kw| kw.len())
}

fn digits_len(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Digits with an optional single decimal point: `12`, `12.`, `12.5`.
fn number_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let int = digits_len(bytes, pos);
    if int == 0 {
        return None;
    }
    let mut len = int;
    if bytes.get(pos + len) == Some(&b'.') {
        len += 1;
        len += digits_len(bytes, pos + len);
    }
    Some(len)
}

fn identifier_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let first = *bytes.get(pos)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    Some(1 + bytes[pos + 1..].iter().take_while(|&&b| is_word_byte(b)).count())
}

fn bracket_var_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let name = identifier_len(bytes, pos)?;
    let mut at = pos + name;
    if bytes.get(at) != Some(&b'[') {
        return None;
    }
    at += 1;
    at += identifier_len(bytes, at)?;
    if bytes.get(at) != Some(&b']') {
        return None;
    }
    Some(at + 1 - pos)
}

fn dot_var_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut at = pos + identifier_len(bytes, pos)?;
    let mut suffixes = 0;

    loop {
        match bytes.get(at) {
            Some(b'.') => match identifier_len(bytes, at + 1) {
                Some(len) => at += 1 + len,
                None => break,
            },
            Some(b'[') => {
                let digits = digits_len(bytes, at + 1);
                if digits == 0 || bytes.get(at + 1 + digits) != Some(&b']') {
                    break;
                }
                at += digits + 2;
            }
            _ => break,
        }
        suffixes += 1;
    }

    (suffixes > 0).then_some(at - pos)
}
