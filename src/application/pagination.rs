//! Shared page-number pagination helpers.
//!
//! Feeds are paginated by page number with a fixed page size. Out-of-range
//! or missing page numbers clamp to the nearest valid page rather than
//! erroring, so a stale bookmark never produces a failure page.

use std::num::NonZeroU32;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Computes page boundaries for a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page_size: NonZeroU32,
}

impl Pager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: NonZeroU32::new(page_size)
                .unwrap_or_else(|| NonZeroU32::new(DEFAULT_PAGE_SIZE).expect("non-zero default")),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// Number of pages for `total` items. An empty collection still has one
    /// (empty) page so that page 1 is always addressable.
    pub fn page_count(&self, total: u64) -> u32 {
        let size = u64::from(self.page_size.get());
        let pages = total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Clamp a requested page number into `1..=page_count(total)`.
    pub fn clamp_page(&self, requested: Option<u32>, total: u64) -> u32 {
        let last = self.page_count(total);
        requested.unwrap_or(1).clamp(1, last)
    }

    /// Row offset of a (already clamped) page.
    pub fn offset(&self, page: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(self.page_size.get())
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// One page of items together with its position in the whole collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_count: u32,
    pub total: u64,
    pub page_size: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: u32, pager: Pager, total: u64) -> Self {
        Self {
            items,
            page,
            page_count: pager.page_count(total),
            total,
            page_size: pager.page_size(),
        }
    }

    pub fn empty(pager: Pager) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            page_count: 1,
            total: 0,
            page_size: pager.page_size(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u32 {
        (self.page + 1).min(self.page_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        let pager = Pager::new(10);
        assert_eq!(pager.page_count(0), 1);
        assert_eq!(pager.page_count(1), 1);
        assert_eq!(pager.page_count(10), 1);
        assert_eq!(pager.page_count(11), 2);
        assert_eq!(pager.page_count(100), 10);
        assert_eq!(pager.page_count(101), 11);
    }

    #[test]
    fn clamp_page_handles_out_of_range() {
        let pager = Pager::new(10);
        assert_eq!(pager.clamp_page(None, 35), 1);
        assert_eq!(pager.clamp_page(Some(0), 35), 1);
        assert_eq!(pager.clamp_page(Some(2), 35), 2);
        assert_eq!(pager.clamp_page(Some(4), 35), 4);
        assert_eq!(pager.clamp_page(Some(99), 35), 4);
        assert_eq!(pager.clamp_page(Some(7), 0), 1);
    }

    #[test]
    fn offsets_partition_without_gaps() {
        let pager = Pager::new(10);
        let total: u64 = 35;
        let pages = pager.page_count(total);
        assert_eq!(pages, 4);

        let mut covered = 0u64;
        for page in 1..=pages {
            let offset = pager.offset(page);
            assert_eq!(offset, covered);
            let expected_len = u64::from(pager.page_size()).min(total - offset);
            covered += expected_len;
        }
        assert_eq!(covered, total);
    }

    #[test]
    fn last_page_holds_remainder() {
        let pager = Pager::new(10);
        // 35 items: pages 1-3 full, page 4 holds 5.
        assert_eq!(pager.offset(4), 30);
        let remaining = 35 - pager.offset(4);
        assert_eq!(remaining, 5);
    }

    #[test]
    fn zero_page_size_falls_back_to_default() {
        let pager = Pager::new(0);
        assert_eq!(pager.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn paginated_navigation_flags() {
        let pager = Pager::new(10);
        let middle = Paginated::new(vec![1; 10], 2, pager, 35);
        assert!(middle.has_previous());
        assert!(middle.has_next());
        assert_eq!(middle.previous_page(), 1);
        assert_eq!(middle.next_page(), 3);

        let only = Paginated::<i32>::empty(pager);
        assert!(!only.has_previous());
        assert!(!only.has_next());
        assert_eq!(only.page_count, 1);
    }
}
