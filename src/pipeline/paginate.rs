//! Page windows over a filtered record set.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PAGE_SIZE;

/// Requested page. A zero page size falls back to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    pub fn effective_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Same size, first page.
    pub fn first(&self) -> Self {
        Self {
            page_index: 0,
            page_size: self.page_size,
        }
    }
}

/// One page of records plus enough metadata to render a paginator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
}

/// Slice `filtered[i*s .. i*s+s]`, clamped to the available records.
/// An out-of-range index yields an empty page.
pub fn paginate<T: Clone>(filtered: &[T], request: &PageRequest) -> Page<T> {
    let size = request.effective_size();
    let total = filtered.len();
    let start = request.page_index.saturating_mul(size).min(total);
    let end = start.saturating_add(size).min(total);

    Page {
        items: filtered[start..end].to_vec(),
        total,
        page_index: request.page_index,
        page_size: size,
        page_count: total.div_ceil(size),
    }
}
