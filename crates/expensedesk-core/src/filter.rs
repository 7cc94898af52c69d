//! Per-column filter terms and their serialization into a filter expression
//!
//! A [`FilterSet`] holds one [`FilterTerm`] per declared column. Serializing it
//! yields the conjunction `term;term;...` in column declaration order, so two
//! sets with the same terms always produce byte-identical strings no matter in
//! which order the terms were edited.

use crate::error::{CoreError, CoreResult};
use crate::expr::{parse_term, split_terms};
use crate::models::Column;

/// Conjunction delimiter between terms
pub const TERM_SEPARATOR: char = ';';

/// Comparison operator of a filter term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// Case-insensitive pattern match
    ILike,
    /// Case-sensitive pattern match
    Like,
}

impl Operator {
    /// Every operator, in the order the operator selector lists them
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::ILike,
        Operator::Like,
    ];

    /// Symbol emitted in the filter expression
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::ILike => "=ilike=",
            Operator::Like => "=like=",
        }
    }

    /// Pattern operators get their value wrapped in `%...%`
    pub fn is_pattern(self) -> bool {
        matches!(self, Operator::ILike | Operator::Like)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Operator {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            "=ilike=" | "ilike" => Ok(Operator::ILike),
            "=like=" | "like" => Ok(Operator::Like),
            other => Err(format!("Invalid operator: {}", other)),
        }
    }
}

/// Quote a raw value for the expression: `\` and `'` are backslash-escaped
pub fn quote_value(value: &str, operator: Operator) -> String {
    let mut quoted = String::with_capacity(value.len() + 4);
    quoted.push('\'');
    if operator.is_pattern() {
        quoted.push('%');
    }
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    if operator.is_pattern() {
        quoted.push('%');
    }
    quoted.push('\'');
    quoted
}

/// Filter state of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    pub column: &'static str,
    pub operator: Operator,
    /// Raw text as typed; empty means no constraint
    pub value: String,
}

impl FilterTerm {
    pub fn new(column: &'static str) -> Self {
        Self {
            column,
            operator: Operator::default(),
            value: String::new(),
        }
    }

    /// A term constrains the result only when its trimmed value is non-empty
    pub fn is_active(&self) -> bool {
        !self.value.trim().is_empty()
    }

    /// `column + operator + quoted value`, or `None` when inactive
    pub fn to_fragment(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        Some(format!(
            "{}{}{}",
            self.column,
            self.operator.symbol(),
            quote_value(&self.value, self.operator)
        ))
    }
}

/// The fixed set of filter terms of a table, one per declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    terms: Vec<FilterTerm>,
}

impl FilterSet {
    /// Fresh terms (`==`, empty) for every column
    pub fn new(columns: &[Column]) -> Self {
        Self {
            terms: columns.iter().map(|c| FilterTerm::new(c.id)).collect(),
        }
    }

    /// Terms in column declaration order
    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn term(&self, column: &str) -> Option<&FilterTerm> {
        self.terms.iter().find(|t| t.column == column)
    }

    /// Update one term; omitted parts keep their previous value
    pub fn set_term(
        &mut self,
        column: &str,
        operator: Option<Operator>,
        value: Option<&str>,
    ) -> CoreResult<()> {
        let term = self
            .terms
            .iter_mut()
            .find(|t| t.column == column)
            .ok_or_else(|| CoreError::UnknownColumn {
                column: column.to_string(),
            })?;
        if let Some(operator) = operator {
            term.operator = operator;
        }
        if let Some(value) = value {
            term.value = value.to_string();
        }
        Ok(())
    }

    /// Reset every term to `==` with an empty value
    pub fn clear(&mut self) {
        for term in &mut self.terms {
            term.operator = Operator::default();
            term.value.clear();
        }
    }

    /// Combined filter expression, absent when no term is active
    pub fn serialize(&self) -> Option<String> {
        let fragments: Vec<String> = self.terms.iter().filter_map(FilterTerm::to_fragment).collect();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join(&TERM_SEPARATOR.to_string()))
        }
    }

    /// Rebuild terms from an expression (e.g. the `filter` URL parameter)
    ///
    /// Unknown columns and malformed terms are skipped with a warning; every
    /// column not mentioned in the expression is left cleared.
    pub fn hydrate(columns: &[Column], expression: &str) -> Self {
        let mut set = Self::new(columns);
        for fragment in split_terms(expression) {
            let parsed = match parse_term(fragment) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("Ignoring filter term from location: {}", e);
                    continue;
                }
            };
            let value = parsed.raw_value();
            if set.set_term(&parsed.field, Some(parsed.operator), Some(value)).is_err() {
                log::warn!("Ignoring filter on unknown column '{}'", parsed.field);
            }
        }
        set
    }
}
