//! Filter expression parser
//!
//! Inverse of [`crate::filter::FilterSet::serialize`]. Accepts the grammar the
//! serializer emits (`field op 'value'` joined by `;`) and, leniently, bare
//! unquoted values. Used to hydrate filter terms from a location and by the
//! development backend to evaluate incoming filters.

use crate::error::{CoreError, CoreResult};
use crate::filter::{Operator, TERM_SEPARATOR};
use once_cell::sync::OnceCell;
use regex::Regex;

/// One `field op value` term with its value unescaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTerm {
    pub field: String,
    pub operator: Operator,
    /// Unescaped value; pattern operators keep their `%` wildcards
    pub value: String,
}

impl ParsedTerm {
    /// Value as a user would have typed it: the `%...%` wrapper of pattern
    /// operators removed
    pub fn raw_value(&self) -> &str {
        if self.operator.is_pattern() && self.value.len() >= 2 {
            if let Some(inner) = self.value.strip_prefix('%').and_then(|v| v.strip_suffix('%')) {
                return inner;
            }
        }
        &self.value
    }
}

/// Split an expression on `;` outside quoted values
pub fn split_terms(expression: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in expression.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '\'' => in_quote = !in_quote,
            c if c == TERM_SEPARATOR && !in_quote => {
                terms.push(&expression[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    terms.push(&expression[start..]);

    terms.into_iter().filter(|t| !t.trim().is_empty()).collect()
}

/// Parse a single term such as `amount>='100'`
pub fn parse_term(term: &str) -> CoreResult<ParsedTerm> {
    static TERM_PATTERN: OnceCell<Regex> = OnceCell::new();
    let pattern = TERM_PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?s)^\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(==|!=|=ilike=|=like=|>=|<=|>|<)\s*(?:'((?:[^'\\]|\\.)*)'|([^'\s;]+))\s*$"#,
        )
        .unwrap()
    });

    let caps = pattern.captures(term).ok_or_else(|| CoreError::InvalidFilter {
        message: format!("cannot parse term `{}`", term.trim()),
    })?;

    let operator = caps[2]
        .parse::<Operator>()
        .map_err(|message| CoreError::InvalidFilter { message })?;

    let value = match (caps.get(3), caps.get(4)) {
        (Some(quoted), _) => unescape(quoted.as_str()),
        (None, Some(bare)) => bare.as_str().to_string(),
        (None, None) => String::new(),
    };

    Ok(ParsedTerm {
        field: caps[1].to_string(),
        operator,
        value,
    })
}

/// Parse a whole expression; any malformed term fails the expression
pub fn parse_expression(expression: &str) -> CoreResult<Vec<ParsedTerm>> {
    split_terms(expression).into_iter().map(parse_term).collect()
}

fn unescape(quoted: &str) -> String {
    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
                continue;
            }
        }
        value.push(c);
    }
    value
}
