//! Minimal boolean filter evaluation for the in-memory backend.
//!
//! Accepts conjunctions (`&&` / `and`) of `field == "literal"` and
//! `field != "literal"` comparisons over string attributes, with optional
//! parentheses. Anything else is rejected the way a real backend rejects a
//! malformed expression.

use crate::error::{Result, VectorStoreError};
use crate::types::DocumentAttributes;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Literal(String),
    Eq,
    Ne,
    And,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    field: String,
    op: CompareOp,
    value: String,
}

/// Parsed conjunction of attribute comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens = tokenize(raw)?;
        if tokens.is_empty() {
            return Ok(Self::default());
        }
        let mut parser = Parser {
            raw,
            tokens: &tokens,
            pos: 0,
            clauses: Vec::new(),
        };
        parser.conjunction()?;
        if parser.pos != tokens.len() {
            return Err(malformed(raw, "unexpected trailing tokens"));
        }
        Ok(Self {
            clauses: parser.clauses,
        })
    }

    #[must_use]
    pub fn matches(&self, entity: &DocumentAttributes) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = entity.field(&clause.field).unwrap_or_default();
            match clause.op {
                CompareOp::Eq => actual == clause.value,
                CompareOp::Ne => actual != clause.value,
            }
        })
    }
}

fn malformed(raw: &str, reason: impl Into<String>) -> VectorStoreError {
    VectorStoreError::MalformedPredicate {
        predicate: raw.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' | '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(malformed(raw, format!("expected '=' after '{c}'")));
                }
                tokens.push(if c == '=' { Token::Eq } else { Token::Ne });
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err(malformed(raw, "expected '&&'"));
                }
                tokens.push(Token::And);
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(malformed(raw, "unterminated string literal"));
                }
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident.eq_ignore_ascii_case("and") {
                    tokens.push(Token::And);
                } else {
                    tokens.push(Token::Ident(ident));
                }
            }
            other => return Err(malformed(raw, format!("unsupported character '{other}'"))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: &'a [Token],
    pos: usize,
    clauses: Vec<Clause>,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn conjunction(&mut self) -> Result<()> {
        self.atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            self.atom()?;
        }
        Ok(())
    }

    fn atom(&mut self) -> Result<()> {
        let raw = self.raw;
        match self.next().cloned() {
            Some(Token::LParen) => {
                self.conjunction()?;
                match self.next() {
                    Some(Token::RParen) => Ok(()),
                    _ => Err(malformed(raw, "unbalanced parentheses")),
                }
            }
            Some(Token::Ident(field)) => {
                if DocumentAttributes::default().field(&field).is_none() {
                    return Err(malformed(raw, format!("unknown field '{field}'")));
                }
                let op = match self.next() {
                    Some(Token::Eq) => CompareOp::Eq,
                    Some(Token::Ne) => CompareOp::Ne,
                    _ => return Err(malformed(raw, format!("expected '==' or '!=' after '{field}'"))),
                };
                let value = match self.next() {
                    Some(Token::Literal(value)) => value.clone(),
                    _ => return Err(malformed(raw, "expected a quoted literal")),
                };
                self.clauses.push(Clause { field, op, value });
                Ok(())
            }
            _ => Err(malformed(raw, "expected a comparison")),
        }
    }
}
