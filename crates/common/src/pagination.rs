//! Page math shared by every list endpoint

use serde::{Deserialize, Serialize};

/// 1-based page request, clamped before it reaches the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Build a request from raw query values, filling in defaults and clamping
    pub fn new(page: Option<u64>, per_page: Option<u64>, default_size: u64, max_size: u64) -> Self {
        let max_size = max_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_size).clamp(1, max_size),
        }
    }

    /// Zero-based page index as used by the SeaORM paginator
    pub fn index(&self) -> u64 {
        self.page - 1
    }

    pub fn offset(&self) -> u64 {
        self.index() * self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

/// One page of results plus the numbers a pager needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: total_pages(total, request.per_page),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// `ceil(total / per_page)`, zero when there is nothing to show
pub fn total_pages(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}
