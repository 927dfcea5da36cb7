//! MSBuild `Condition` attribute parsing.
//!
//! CMake writes every per-configuration element of a `.vcxproj` with a
//! guard of the form
//!
//! ```text
//! '$(Configuration)|$(Platform)'=='Debug|ARM64'
//! ```
//!
//! This module parses such expressions (and the `and` / `or` / `Exists(…)`
//! forms found elsewhere in project files) and recognises which
//! [`ConfigPlatform`] a guard selects, independent of spacing.
//!
//! Uses [`chumsky`] for the parsing grammar.
//!
//! ## Grammar (case-insensitive keywords)
//!
//! ```text
//! expr       = or_expr
//! or_expr    = and_expr ('or' and_expr)*
//! and_expr   = atom ('and' atom)*
//! atom       = comparison | exists | '(' expr ')'
//! comparison = quoted ('==' | '!=') quoted
//! exists     = 'Exists' '(' quoted ')'
//! quoted     = "'" chars "'"
//! ```

use std::fmt;

use chumsky::prelude::*;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
//  ConfigPlatform
// ═══════════════════════════════════════════════════════════════════════════════

/// A `(configuration, platform)` pair, written `Debug|ARM64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPlatform {
    pub configuration: String,
    pub platform: String,
}

impl ConfigPlatform {
    pub fn new(configuration: impl Into<String>, platform: impl Into<String>) -> Self {
        Self { configuration: configuration.into(), platform: platform.into() }
    }

    /// Split `Debug|ARM64` on its last `|`.
    pub fn parse(s: &str) -> Option<Self> {
        let (configuration, platform) = s.rsplit_once('|')?;
        Some(Self::new(configuration, platform))
    }
}

impl fmt::Display for ConfigPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.configuration, self.platform)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Compare {
        lhs: Vec<Fragment>,
        op: CompareOp,
        rhs: Vec<Fragment>,
    },
    Exists(Vec<Fragment>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

/// Piece of a quoted operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    /// `$(Name)`
    Property(String),
}

impl Expression {
    /// The configuration a `'$(Configuration)|$(Platform)'=='C|P'` guard
    /// selects.  Any other shape, including compound expressions, yields
    /// `None`.
    pub fn selected_config_platform(&self) -> Option<ConfigPlatform> {
        let Expression::Compare { lhs, op: CompareOp::Equal, rhs } = self else {
            return None;
        };
        let (selector, value) = if is_config_platform_selector(lhs) {
            (lhs, rhs)
        } else {
            (rhs, lhs)
        };
        if !is_config_platform_selector(selector) {
            return None;
        }
        match value.as_slice() {
            [Fragment::Literal(text)] => ConfigPlatform::parse(text),
            _ => None,
        }
    }
}

fn is_config_platform_selector(operand: &[Fragment]) -> bool {
    matches!(
        operand,
        [Fragment::Property(c), Fragment::Literal(bar), Fragment::Property(p)]
            if c == "Configuration" && bar == "|" && p == "Platform"
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parser
// ═══════════════════════════════════════════════════════════════════════════════

/// Split quoted text into literal and `$(Name)` fragments.
fn fragments(s: &str) -> Vec<Fragment> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'(') {
            if !literal.is_empty() {
                parts.push(Fragment::Literal(std::mem::take(&mut literal)));
            }
            chars.next();
            let name: String = chars.by_ref().take_while(|&ch| ch != ')').collect();
            parts.push(Fragment::Property(name));
        } else {
            literal.push(c);
        }
    }

    if !literal.is_empty() {
        parts.push(Fragment::Literal(literal));
    }

    parts
}

fn condition_parser<'a>() -> impl Parser<'a, &'a str, Expression, extra::Err<Simple<'a, char>>> {
    recursive(|expr| {
        let quoted = just('\'')
            .ignore_then(none_of('\'').repeated().to_slice())
            .then_ignore(just('\''))
            .map(fragments);

        let op = just("==")
            .to(CompareOp::Equal)
            .or(just("!=").to(CompareOp::NotEqual));

        let comparison = quoted
            .padded()
            .then(op.padded())
            .then(quoted.padded())
            .map(|((lhs, op), rhs)| Expression::Compare { lhs, op, rhs });

        let word = any()
            .filter(|c: &char| c.is_ascii_alphabetic())
            .repeated()
            .at_least(1)
            .to_slice();

        let exists = word
            .filter(|s: &&str| s.eq_ignore_ascii_case("exists"))
            .ignore_then(just('(').padded())
            .ignore_then(quoted)
            .then_ignore(just(')').padded())
            .map(Expression::Exists);

        let group = expr.delimited_by(just('(').padded(), just(')').padded());

        let atom = choice((comparison, exists, group)).padded();

        let and_kw = word.filter(|s: &&str| s.eq_ignore_ascii_case("and")).padded();
        let and_expr = atom.clone().foldl(and_kw.ignore_then(atom).repeated(), |lhs, rhs| {
            Expression::And(Box::new(lhs), Box::new(rhs))
        });

        let or_kw = word.filter(|s: &&str| s.eq_ignore_ascii_case("or")).padded();
        and_expr.clone().foldl(or_kw.ignore_then(and_expr).repeated(), |lhs, rhs| {
            Expression::Or(Box::new(lhs), Box::new(rhs))
        })
    })
}

/// Parse a `Condition` attribute value.
pub fn parse_condition(input: &str) -> Result<Expression> {
    condition_parser().parse(input).into_result().map_err(|errs| {
        let messages: Vec<String> = errs.iter().map(|e| format!("{e}")).collect();
        Error::Condition(format!("'{input}': {}", messages.join("; ")))
    })
}

/// Whether `condition` is exactly the guard for `target`.  Unparseable
/// conditions never match.
pub fn guards(condition: &str, target: &ConfigPlatform) -> bool {
    parse_condition(condition)
        .ok()
        .and_then(|expr| expr.selected_config_platform())
        .is_some_and(|cp| &cp == target)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
