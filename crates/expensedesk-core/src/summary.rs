//! Spending totals over a recent window
//!
//! One large page of expenses dated after the window start is read and
//! totalled per calendar day, per category and per week of the year.

use crate::client::CollectionClient;
use crate::error::CoreResult;
use crate::filter::{quote_value, Operator};
use crate::models::Expense;
use crate::query::PageQuery;
use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Days covered by a summary
pub const SUMMARY_DAYS: i64 = 30;

/// Rows requested in the single summary read
pub const SUMMARY_FETCH_SIZE: u32 = 1000;

/// Week of the year, counted in Monday-started weeks from the one holding 1 January
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearWeek {
    pub year: i32,
    pub week: u32,
}

impl YearWeek {
    pub fn of(date: NaiveDate) -> Self {
        let lead = NaiveDate::from_ymd_opt(date.year(), 1, 1)
            .map(|jan1| jan1.weekday().num_days_from_monday())
            .unwrap_or(0);
        Self {
            year: date.year(),
            week: (date.ordinal0() + lead) / 7 + 1,
        }
    }

    pub fn label(&self) -> String {
        format!("Week {}", self.week)
    }
}

/// Totals of the expenses since `since`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpenseSummary {
    pub since: Option<DateTime<Utc>>,
    pub daily: BTreeMap<NaiveDate, Decimal>,
    /// In order of first appearance
    pub categories: Vec<(String, Decimal)>,
    pub weekly: BTreeMap<YearWeek, Decimal>,
    pub total: Decimal,
    pub count: usize,
    /// Matching expenses the single read did not return
    pub omitted: u64,
}

impl ExpenseSummary {
    pub fn from_expenses(since: DateTime<Utc>, expenses: &[Expense]) -> Self {
        let mut summary = Self {
            since: Some(since),
            ..Self::default()
        };
        for expense in expenses {
            summary.add(expense);
        }
        summary
    }

    fn add(&mut self, expense: &Expense) {
        let day = expense.date.date_naive();
        *self.daily.entry(day).or_default() += expense.amount;
        *self.weekly.entry(YearWeek::of(day)).or_default() += expense.amount;
        match self.categories.iter_mut().find(|(name, _)| *name == expense.category) {
            Some((_, amount)) => *amount += expense.amount,
            None => self.categories.push((expense.category.clone(), expense.amount)),
        }
        self.total += expense.amount;
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Query for every expense dated after `now - days`
pub fn summary_query(now: DateTime<Utc>, days: i64) -> PageQuery {
    let since = now - Duration::days(days);
    let start = since.to_rfc3339_opts(SecondsFormat::Millis, true);
    PageQuery::new(0, SUMMARY_FETCH_SIZE)
        .with_filter(Some(format!("date>{}", quote_value(&start, Operator::Gt))))
}

/// Read the window in one request and total it
pub async fn fetch_summary<C>(client: &C, now: DateTime<Utc>, days: i64) -> CoreResult<ExpenseSummary>
where
    C: CollectionClient<Record = Expense> + ?Sized,
{
    let query = summary_query(now, days);
    let page = client.fetch(&query).await?;
    let mut summary = ExpenseSummary::from_expenses(now - Duration::days(days), &page.rows);
    summary.omitted = page.total_elements.saturating_sub(page.rows.len() as u64);
    if summary.omitted > 0 {
        log::warn!(
            "Summary covers {} of {} expenses since {}",
            page.rows.len(),
            page.total_elements,
            (now - Duration::days(days)).date_naive()
        );
    }
    Ok(summary)
}
