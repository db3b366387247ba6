//! Page arithmetic shared by every stage.
//!
//! Pages are 1-based. Out-of-range page requests are clamped, never rejected,
//! so a stale page number (for example after a filter shrinks a stage)
//! degrades to the nearest valid page instead of an empty or invalid query.

use serde::{Deserialize, Serialize};

/// Row window for a page query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

/// Number of pages needed for `total_count` rows. Never less than 1.
pub fn compute_total_pages(total_count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total_count.div_ceil(page_size).max(1)
}

pub fn window_for(page: usize, page_size: usize) -> PageWindow {
    let page_size = page_size.max(1);
    PageWindow {
        offset: page.max(1).saturating_sub(1).saturating_mul(page_size),
        limit: page_size,
    }
}

pub fn clamp_page(requested: usize, total_pages: usize) -> usize {
    requested.clamp(1, total_pages.max(1))
}

pub fn next_page(current: usize, total_pages: usize) -> usize {
    clamp_page(current.saturating_add(1), total_pages)
}

pub fn prev_page(current: usize, total_pages: usize) -> usize {
    clamp_page(current.saturating_sub(1), total_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_has_floor_of_one() {
        assert_eq!(compute_total_pages(0, 25), 1);
        assert_eq!(compute_total_pages(1, 25), 1);
        assert_eq!(compute_total_pages(25, 25), 1);
        assert_eq!(compute_total_pages(26, 25), 2);
        assert_eq!(compute_total_pages(250, 100), 3);
    }

    #[test]
    fn test_zero_page_size_is_treated_as_one() {
        assert_eq!(compute_total_pages(3, 0), 3);
        assert_eq!(window_for(2, 0), PageWindow { offset: 1, limit: 1 });
    }

    #[test]
    fn test_window_for() {
        assert_eq!(window_for(1, 100), PageWindow { offset: 0, limit: 100 });
        assert_eq!(window_for(3, 100), PageWindow { offset: 200, limit: 100 });
        // Page 0 is not a page; it maps to the first window.
        assert_eq!(window_for(0, 10), PageWindow { offset: 0, limit: 10 });
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(5, 3), 3);
        assert_eq!(clamp_page(2, 3), 2);
        assert_eq!(clamp_page(4, 0), 1);
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        assert_eq!(next_page(3, 3), 3);
        assert_eq!(next_page(1, 3), 2);
        assert_eq!(prev_page(1, 3), 1);
        assert_eq!(prev_page(3, 3), 2);
        assert_eq!(next_page(usize::MAX, 2), 2);
    }
}
