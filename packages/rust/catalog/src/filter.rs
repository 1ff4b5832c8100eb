//! In-memory search and display paging over a loaded catalog.

use grantlens_shared::Grant;

/// Grants whose recipient, agency, or description contain `query`,
/// compared case-insensitively. A blank query matches everything.
pub fn search<'a>(grants: &'a [Grant], query: &str) -> Vec<&'a Grant> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return grants.iter().collect();
    }

    grants
        .iter()
        .filter(|g| {
            g.recipient.to_lowercase().contains(&query)
                || g.agency.to_lowercase().contains(&query)
                || g.description.to_lowercase().contains(&query)
        })
        .collect()
}

/// One display page of a larger list.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a, T> {
    /// Items on this page.
    pub items: &'a [T],
    /// 1-based page number after clamping.
    pub page: usize,
    /// Total number of pages (0 for an empty list).
    pub total_pages: usize,
    /// Index of the first item on this page within the full list.
    pub offset: usize,
}

impl<'a, T> PageView<'a, T> {
    /// Slice out `page` (1-based, clamped to the valid range) of `items`.
    pub fn of(items: &'a [T], page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = items.len().div_ceil(per_page);
        let page = page.clamp(1, total_pages.max(1));
        let offset = ((page - 1) * per_page).min(items.len());
        let end = (offset + per_page).min(items.len());

        Self {
            items: &items[offset..end],
            page,
            total_pages,
            offset,
        }
    }

    /// Whether a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}
