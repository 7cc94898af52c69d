//! Canonical request shape of a paged collection read

use crate::sort::SortSpec;

/// Parameters of one paged read
///
/// Also serves as the request signature for staleness checks: two fetches
/// are interchangeable exactly when their queries are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageQuery {
    /// Zero-based page index
    pub page: u32,
    pub size: u32,
    /// Absent when unsorted
    pub sort: Option<SortSpec>,
    /// Absent when no filter term is active
    pub filter: Option<String>,
}

impl PageQuery {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: None,
            filter: None,
        }
    }

    pub fn with_sort(mut self, sort: Option<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Request parameters: `page` and `size` always, `sort`/`filter` only when present
    pub fn request_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.serialize()));
        }
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.clone()));
        }
        params
    }
}
