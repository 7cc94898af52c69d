//! Location synchronization: controller state <-> query string
//!
//! A key is written only when its value differs from the default, so the
//! all-default state is the empty string. Parsing is lenient: unknown keys
//! are ignored and malformed values fall back to their defaults.

use crate::query::PageQuery;
use crate::sort::SortSpec;

pub const PAGE_KEY: &str = "page";
pub const SIZE_KEY: &str = "size";
pub const SORT_KEY: &str = "sort";
pub const FILTER_KEY: &str = "filter";

/// Canonical query string (without `?`) for `query`
pub fn to_query_string(query: &PageQuery, default_size: u32) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if query.page > 0 {
        pairs.push((PAGE_KEY, query.page.to_string()));
    }
    if query.size != default_size {
        pairs.push((SIZE_KEY, query.size.to_string()));
    }
    if let Some(sort) = &query.sort {
        pairs.push((SORT_KEY, sort.serialize()));
    }
    if let Some(filter) = &query.filter {
        pairs.push((FILTER_KEY, filter.clone()));
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `path?query`, or just `path` for the default state
pub fn to_location(path: &str, query: &PageQuery, default_size: u32) -> String {
    let qs = to_query_string(query, default_size);
    if qs.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, qs)
    }
}

/// Decoded key-value pairs of a query string, in order
pub fn parse_pairs(query_string: &str) -> Vec<(String, String)> {
    // Anything before the first `?` is a path unless it already looks like pairs
    let qs = match query_string.split_once('?') {
        Some((path, qs)) if !path.contains('=') && !path.contains('&') => qs,
        _ => query_string,
    };
    qs.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Hydrate a query from a location; absent or malformed keys take defaults
pub fn parse_query_string(query_string: &str, default_size: u32) -> PageQuery {
    let pairs = parse_pairs(query_string);
    let first = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

    let page = match first(PAGE_KEY) {
        Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
            log::warn!("Ignoring malformed page '{}' in location", raw);
            0
        }),
        None => 0,
    };

    let size = match first(SIZE_KEY) {
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(size) if size > 0 => size,
            _ => {
                log::warn!("Ignoring malformed size '{}' in location", raw);
                default_size
            }
        },
        None => default_size,
    };

    let sort = match first(SORT_KEY) {
        Some(raw) if !raw.is_empty() => match SortSpec::parse(raw) {
            Ok(spec) => Some(spec),
            Err(e) => {
                log::warn!("Ignoring sort from location: {}", e);
                None
            }
        },
        _ => None,
    };

    let filter = first(FILTER_KEY)
        .filter(|raw| !raw.trim().is_empty())
        .map(str::to_string);

    PageQuery {
        page,
        size,
        sort,
        filter,
    }
}
