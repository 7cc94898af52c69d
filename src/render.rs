//! Plain-text rendering of the expense table and its surroundings

use expensedesk_config::CurrencyConfig;
use expensedesk_core::editor::FORM_FIELDS;
use expensedesk_core::{
    Column, ColumnKind, EditorMode, Expense, ExpenseForm, ExpenseSummary, FilterSet, PageResult,
    SortDirection, SortState,
};
use expensedesk_utils::{fit_cell, format_amount, format_number};
use rust_decimal::Decimal;

const ID_WIDTH: usize = 5;

fn column_width(column: &Column) -> usize {
    match column.kind {
        ColumnKind::Text => 22,
        ColumnKind::Number => 14,
        ColumnKind::Date => 10,
    }
}

fn sort_marker(direction: Option<SortDirection>) -> &'static str {
    match direction {
        Some(SortDirection::Ascending) => " ^",
        Some(SortDirection::Descending) => " v",
        None => "",
    }
}

fn cell_text(expense: &Expense, column: &Column, currency: &CurrencyConfig) -> String {
    match column.id {
        "title" => expense.title.clone(),
        "category" => expense.category.clone(),
        "amount" => format_amount(
            &expense.amount,
            &currency.symbol,
            currency.decimal_places,
            &currency.thousands_separator,
        ),
        "date" => expense.date.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

fn align(text: &str, column: &Column) -> String {
    let width = column_width(column);
    if column.kind == ColumnKind::Number && text.chars().count() < width {
        format!("{:>width$}", text, width = width)
    } else {
        fit_cell(text, width)
    }
}

/// Header, one line per row and a page footer
pub fn render_table(
    columns: &[Column],
    sort: &SortState,
    page: &PageResult<Expense>,
    currency: &CurrencyConfig,
) -> String {
    let mut lines = Vec::new();

    let mut header = fit_cell("#", ID_WIDTH);
    for column in columns {
        let label = format!("{}{}", column.label, sort_marker(sort.direction_of(column.id)));
        header.push_str(" | ");
        header.push_str(&fit_cell(&label, column_width(column)));
    }
    let rule = "-".repeat(header.chars().count());
    lines.push(header.trim_end().to_string());
    lines.push(rule);

    if page.rows.is_empty() {
        lines.push("(no expenses)".to_string());
    }
    for expense in &page.rows {
        let mut line = fit_cell(&expense.id.to_string(), ID_WIDTH);
        for column in columns {
            line.push_str(" | ");
            line.push_str(&align(&cell_text(expense, column, currency), column));
        }
        lines.push(line.trim_end().to_string());
    }

    lines.push(render_footer(page));
    lines.join("\n")
}

/// `Page 2 of 3 · 11 expenses · 5 per page`
pub fn render_footer(page: &PageResult<Expense>) -> String {
    let total_pages = page.total_pages.max(1);
    format!(
        "Page {} of {} · {} expenses · {} per page",
        page.number.saturating_add(1),
        total_pages,
        format_number(page.total_elements),
        page.size
    )
}

/// Active filter terms, one per line
pub fn render_filters(filters: &FilterSet) -> String {
    let active: Vec<String> = filters
        .terms()
        .iter()
        .filter(|term| term.is_active())
        .map(|term| format!("  {} {} {}", term.column, term.operator.symbol(), term.value.trim()))
        .collect();
    if active.is_empty() {
        "No filters".to_string()
    } else {
        format!("Filters:\n{}", active.join("\n"))
    }
}

pub fn render_form(mode: EditorMode, form: &ExpenseForm) -> String {
    let title = match mode {
        EditorMode::Create => "New expense".to_string(),
        EditorMode::Edit { id } => format!("Edit expense #{}", id),
    };
    let mut lines = vec![title];
    for name in FORM_FIELDS {
        lines.push(format!("  {:<12} {}", name, form.field(name).unwrap_or_default()));
    }
    lines.join("\n")
}

fn money(amount: &Decimal, currency: &CurrencyConfig) -> String {
    format_amount(
        amount,
        &currency.symbol,
        currency.decimal_places,
        &currency.thousands_separator,
    )
}

fn summary_section<'a>(
    lines: &mut Vec<String>,
    heading: &str,
    rows: impl Iterator<Item = (String, &'a Decimal)>,
    currency: &CurrencyConfig,
) {
    lines.push(format!("{}:", heading));
    for (label, amount) in rows {
        lines.push(format!("  {:<16} {:>14}", label, money(amount, currency)));
    }
}

/// Daily, category and weekly totals of a spending summary
pub fn render_summary(summary: &ExpenseSummary, currency: &CurrencyConfig) -> String {
    let since = summary
        .since
        .map(|since| since.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "the start".to_string());
    if summary.is_empty() {
        return format!("No expenses since {}", since);
    }

    let mut lines = vec![format!(
        "Spending since {} · {} expenses · {}",
        since,
        format_number(summary.count as u64),
        money(&summary.total, currency)
    )];
    if summary.omitted > 0 {
        lines.push(format!("({} more not included)", format_number(summary.omitted)));
    }
    summary_section(
        &mut lines,
        "By day",
        summary.daily.iter().map(|(day, amount)| (day.format("%Y-%m-%d").to_string(), amount)),
        currency,
    );
    summary_section(
        &mut lines,
        "By category",
        summary.categories.iter().map(|(name, amount)| (name.clone(), amount)),
        currency,
    );
    summary_section(
        &mut lines,
        "By week",
        summary.weekly.iter().map(|(week, amount)| (week.label(), amount)),
        currency,
    );
    lines.join("\n")
}
