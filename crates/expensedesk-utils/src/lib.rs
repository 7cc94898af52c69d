//! Utility functions and helpers

use rust_decimal::{Decimal, RoundingStrategy};

/// Format a number with thousands separators
pub fn format_number<T: ToString>(n: T) -> String {
    group_digits(&n.to_string(), ",")
}

/// Insert `separator` every three digits of the integer part of `s`
fn group_digits(s: &str, separator: &str) -> String {
    let (sign, unsigned) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(pos) => (&unsigned[..pos], &unsigned[pos..]),
        None => (unsigned, ""),
    };

    let mut result = String::new();
    let mut count = 0;
    for c in int_part.chars().rev() {
        if count == 3 {
            result.push_str(&separator.chars().rev().collect::<String>());
            count = 0;
        }
        result.push(c);
        count += 1;
    }
    let grouped: String = result.chars().rev().collect();
    format!("{}{}{}", sign, grouped, frac_part)
}

/// Format a money amount, e.g. `₹1,234.50`
pub fn format_amount(amount: &Decimal, symbol: &str, decimal_places: u32, separator: &str) -> String {
    let rounded = amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    let text = if decimal_places == 0 {
        rounded.trunc().to_string()
    } else {
        let s = rounded.to_string();
        match s.find('.') {
            Some(pos) => {
                let present = s.len() - pos - 1;
                format!("{}{}", s, "0".repeat(decimal_places as usize - present.min(decimal_places as usize)))
            }
            None => format!("{}.{}", s, "0".repeat(decimal_places as usize)),
        }
    };
    match text.strip_prefix('-') {
        Some(rest) => format!("-{}{}", symbol, group_digits(rest, separator)),
        None => format!("{}{}", symbol, group_digits(&text, separator)),
    }
}

/// Pad or cut `text` to exactly `width` characters for table cells
pub fn fit_cell(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        let mut cell = text.to_string();
        cell.push_str(&" ".repeat(width - count));
        cell
    } else if width == 0 {
        String::new()
    } else {
        let mut cell: String = text.chars().take(width - 1).collect();
        cell.push('…');
        cell
    }
}
