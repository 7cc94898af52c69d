//! Page index and page size with their reset rules

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    size: u32,
}

impl Pagination {
    pub fn new(page: u32, size: u32) -> CoreResult<Self> {
        if size == 0 {
            return Err(CoreError::InvalidPageSize { size });
        }
        Ok(Self { page, size })
    }

    /// Zero-based page index
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Move to `page`; returns whether anything changed
    pub fn set_page(&mut self, page: u32) -> bool {
        let changed = self.page != page;
        self.page = page;
        changed
    }

    /// Change the page size; a new size always lands on the first page
    pub fn set_size(&mut self, size: u32) -> CoreResult<bool> {
        if size == 0 {
            return Err(CoreError::InvalidPageSize { size });
        }
        if self.size == size {
            return Ok(false);
        }
        self.size = size;
        self.page = 0;
        Ok(true)
    }

    /// Back to the first page after the filter or sort changed
    pub fn reset(&mut self) {
        self.page = 0;
    }
}
