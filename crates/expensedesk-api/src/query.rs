//! Evaluation of filter and sort parameters against stored expenses

use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, Utc};
use expensedesk_core::expr::{parse_expression, ParsedTerm};
use expensedesk_core::{find_column, ColumnKind, Expense, Operator, SortDirection, SortSpec, EXPENSE_COLUMNS};
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Right-hand side of a compiled term
#[derive(Debug)]
enum Operand {
    Text(String),
    Number(Decimal),
    /// Calendar day, compared against the expense's UTC date
    Day(NaiveDate),
    Instant(DateTime<Utc>),
    Pattern(Regex),
}

/// One filter term ready to be applied to rows
#[derive(Debug)]
pub struct Predicate {
    field: &'static str,
    operator: Operator,
    operand: Operand,
}

impl Predicate {
    pub fn compile(term: &ParsedTerm) -> Result<Self, ApiError> {
        let column = find_column(EXPENSE_COLUMNS, &term.field)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown filter field '{}'", term.field)))?;

        let operand = if term.operator.is_pattern() {
            Operand::Pattern(like_regex(&term.value, term.operator == Operator::ILike)?)
        } else {
            match column.kind {
                ColumnKind::Text => Operand::Text(term.value.clone()),
                ColumnKind::Number => Decimal::from_str(term.value.trim())
                    .map(Operand::Number)
                    .map_err(|_| {
                        ApiError::bad_request(format!("'{}' is not a number for {}", term.value, column.id))
                    })?,
                ColumnKind::Date => parse_date(&term.value).ok_or_else(|| {
                    ApiError::bad_request(format!("'{}' is not a date for {}", term.value, column.id))
                })?,
            }
        };

        Ok(Self {
            field: column.id,
            operator: term.operator,
            operand,
        })
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        let ordering = match &self.operand {
            Operand::Pattern(re) => return re.is_match(&field_text(expense, self.field)),
            Operand::Text(value) => field_text(expense, self.field).as_str().cmp(value.as_str()),
            Operand::Number(value) => expense.amount.cmp(value),
            Operand::Day(day) => expense.date.date_naive().cmp(day),
            Operand::Instant(instant) => expense.date.cmp(instant),
        };
        match self.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::ILike | Operator::Like => false,
        }
    }
}

/// Compile a whole `;`-joined expression
pub fn compile_filter(expression: &str) -> Result<Vec<Predicate>, ApiError> {
    let terms = parse_expression(expression).map_err(|e| ApiError::bad_request(e.to_string()))?;
    terms.iter().map(Predicate::compile).collect()
}

fn parse_date(value: &str) -> Option<Operand> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(Operand::Instant(instant.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(Operand::Day)
}

/// SQL `LIKE` pattern to an anchored regex: `%` is any run, `_` any one char
fn like_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, ApiError> {
    let mut re = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| {
        log::error!("Failed to build pattern for '{}': {}", pattern, e);
        ApiError::InternalError
    })
}

fn field_text(expense: &Expense, field: &str) -> String {
    match field {
        "title" => expense.title.clone(),
        "category" => expense.category.clone(),
        "amount" => expense.amount.to_string(),
        "date" => expense.date.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

/// Sort in place; `id` is accepted besides the table columns
pub fn sort_expenses(expenses: &mut [Expense], spec: &SortSpec) -> Result<(), ApiError> {
    let compare: fn(&Expense, &Expense) -> Ordering = match spec.column.as_str() {
        "id" => |a: &Expense, b: &Expense| a.id.cmp(&b.id),
        "title" => |a: &Expense, b: &Expense| a.title.cmp(&b.title),
        "category" => |a: &Expense, b: &Expense| a.category.cmp(&b.category),
        "amount" => |a: &Expense, b: &Expense| a.amount.cmp(&b.amount),
        "date" => |a: &Expense, b: &Expense| a.date.cmp(&b.date),
        other => return Err(ApiError::bad_request(format!("Unknown sort field '{}'", other))),
    };
    match spec.direction {
        SortDirection::Ascending => expenses.sort_by(compare),
        SortDirection::Descending => expenses.sort_by(|a, b| compare(b, a)),
    }
    Ok(())
}
