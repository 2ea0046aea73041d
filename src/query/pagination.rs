use crate::models::Pagination;

/// Offset of the first row of `page` (1-based) for pages of `limit` rows.
pub fn offset_for(page: u32, limit: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(limit)
}

/// The page actually served once the total number of matching rows is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub requested_page: u32,
    /// `requested_page` clamped to `[1, max(1, total_pages)]`.
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub limit: u32,
}

impl PageWindow {
    pub fn resolve(requested_page: u32, limit: u32, total_items: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);
        let current_page = requested_page.clamp(1, total_pages.max(1));
        Self {
            requested_page,
            current_page,
            total_pages,
            total_items,
            limit,
        }
    }

    pub fn offset(&self) -> u64 {
        offset_for(self.current_page, self.limit)
    }

    /// The rows fetched for the requested page are not the rows of the served page.
    /// Never true for an empty result set: there is nothing to re-fetch.
    pub fn needs_refetch(&self) -> bool {
        self.total_items > 0 && self.current_page != self.requested_page
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
            items_per_page: self.limit,
        }
    }
}
