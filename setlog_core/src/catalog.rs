//! Exercise catalog pagination.
//!
//! A user's catalog is shown a fixed number of entries at a time, ordered by
//! the per-user sequence number assigned when each entry was added.

use crate::CatalogEntry;
use serde::Serialize;

/// Entries shown on one page
pub const PAGE_SIZE: u32 = 5;

/// Number of pages needed for `count` entries; zero when the catalog is empty
pub fn max_pages(count: usize) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    count.saturating_add(PAGE_SIZE - 1) / PAGE_SIZE
}

/// One page of a catalog plus what is needed to draw navigation
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CatalogPage {
    /// 1-based
    pub page_number: u32,
    pub max_pages: u32,
    pub entries: Vec<CatalogEntry>,
}

impl CatalogPage {
    /// Cut page `page_number` (1-based) out of a catalog.
    ///
    /// Selects entries with sequence number in
    /// `((page_number - 1) * PAGE_SIZE, page_number * PAGE_SIZE]`. Pages past
    /// the end, and any page of an empty catalog, come back empty.
    pub fn from_catalog(catalog: &[CatalogEntry], page_number: u32) -> Self {
        let upper = page_number.saturating_mul(PAGE_SIZE);
        let lower = upper.saturating_sub(PAGE_SIZE);

        let mut entries: Vec<CatalogEntry> = catalog
            .iter()
            .filter(|e| e.seq > lower && e.seq <= upper)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.seq);

        Self {
            page_number,
            max_pages: max_pages(catalog.len()),
            entries,
        }
    }

    /// Show a "next" control unless this is the last page.
    ///
    /// Page 0 is outside the 1-based range and has no navigation.
    pub fn has_next(&self) -> bool {
        self.page_number >= 1 && self.page_number < self.max_pages
    }

    /// Show a "previous" control unless this is the first page
    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}
