//! Page arithmetic and page-control navigation.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u32,
    pub page: u32,
}

impl<T> PageResult<T> {
    pub fn empty(page: u32) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
            page,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Converts every row, stopping at the first one that fails.
    pub fn try_map<U, E, F>(self, f: F) -> Result<PageResult<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(PageResult {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total_count: self.total_count,
            total_pages: self.total_pages,
            page: self.page,
        })
    }
}

/// Ceiling division; zero items means zero pages.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let size = u64::from(page_size);
    let pages = total_count.div_ceil(size);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.clamp(1, total_pages.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    Prev,
    Next,
    Page(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub control: PageControl,
    pub enabled: bool,
    pub current: bool,
}

/// Resolves a control click to the page it leads to.
///
/// Returns `None` when the click is a no-op (Prev on the first page, Next on the
/// last, the current page) or targets a page outside `[1, total_pages]`.
pub fn navigate(current: u32, control: PageControl, total_pages: u32) -> Option<u32> {
    if total_pages == 0 {
        return None;
    }
    let current = clamp_page(current, total_pages);
    let target = match control {
        PageControl::Prev if current > 1 => current - 1,
        PageControl::Next if current < total_pages => current + 1,
        PageControl::Page(n) if (1..=total_pages).contains(&n) => n,
        _ => return None,
    };
    (target != current).then_some(target)
}

/// Most numbered pages shown at once.
pub const PAGE_WINDOW: u32 = 9;

/// Prev, the numbered pages around `current`, Next. At most [`PAGE_WINDOW`]
/// numbered pages are listed, kept as centred on `current` as the range
/// allows. Empty when there is at most one page.
pub fn controls(current: u32, total_pages: u32) -> Vec<ControlState> {
    if total_pages <= 1 {
        return Vec::new();
    }
    let current = clamp_page(current, total_pages);
    let first = current
        .saturating_sub(PAGE_WINDOW / 2)
        .max(1)
        .min(total_pages.saturating_sub(PAGE_WINDOW - 1).max(1));
    let last = first.saturating_add(PAGE_WINDOW - 1).min(total_pages);
    let mut out = Vec::with_capacity((last - first) as usize + 3);
    out.push(ControlState {
        control: PageControl::Prev,
        enabled: current > 1,
        current: false,
    });
    for page in first..=last {
        out.push(ControlState {
            control: PageControl::Page(page),
            enabled: page != current,
            current: page == current,
        });
    }
    out.push(ControlState {
        control: PageControl::Next,
        enabled: current < total_pages,
        current: false,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_three_items_make_three_pages() {
        assert_eq!(total_pages(23, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
    }

    #[test]
    fn out_of_range_page_is_clamped_or_rejected() {
        assert_eq!(clamp_page(4, 3), 3);
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(7, 0), 1);
        assert_eq!(navigate(3, PageControl::Page(4), 3), None);
        assert_eq!(navigate(3, PageControl::Page(0), 3), None);
    }

    #[test]
    fn prev_and_next_stop_at_the_edges() {
        assert_eq!(navigate(1, PageControl::Prev, 3), None);
        assert_eq!(navigate(3, PageControl::Next, 3), None);
        assert_eq!(navigate(2, PageControl::Prev, 3), Some(1));
        assert_eq!(navigate(2, PageControl::Next, 3), Some(3));
        assert_eq!(navigate(1, PageControl::Page(2), 3), Some(2));
        assert_eq!(navigate(2, PageControl::Page(2), 3), None);
    }

    #[test]
    fn navigation_never_leaves_range() {
        for total in 0..6u32 {
            for current in 0..8u32 {
                for control in [
                    PageControl::Prev,
                    PageControl::Next,
                    PageControl::Page(current),
                    PageControl::Page(current + 1),
                ] {
                    if let Some(target) = navigate(current, control, total) {
                        assert!((1..=total).contains(&target));
                    }
                }
            }
        }
    }

    #[test]
    fn controls_mark_current_and_disable_edges() {
        let rendered = controls(1, 3);
        assert_eq!(rendered.len(), 5);
        assert_eq!(rendered[0].control, PageControl::Prev);
        assert!(!rendered[0].enabled);
        assert!(rendered[1].current);
        assert!(rendered[4].enabled);

        assert!(controls(1, 1).is_empty());
        assert!(controls(1, 0).is_empty());
    }

    fn numbered(rendered: &[ControlState]) -> Vec<u32> {
        rendered
            .iter()
            .filter_map(|state| match state.control {
                PageControl::Page(page) => Some(page),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn huge_page_counts_render_a_bounded_window() {
        let rendered = controls(5, u32::MAX);
        assert_eq!(rendered.len(), PAGE_WINDOW as usize + 2);
        assert_eq!(numbered(&rendered), (1..=9).collect::<Vec<_>>());
        assert!(rendered.iter().any(|state| state.current));

        let last = controls(u32::MAX, u32::MAX);
        let pages = numbered(&last);
        assert_eq!(pages.last(), Some(&u32::MAX));
        assert_eq!(pages.len(), PAGE_WINDOW as usize);
        assert!(!last[last.len() - 1].enabled);

        assert_eq!(numbered(&controls(50, 100)), (46..=54).collect::<Vec<_>>());
        assert_eq!(numbered(&controls(2, 12)), (1..=9).collect::<Vec<_>>());
        assert_eq!(numbered(&controls(12, 12)), (4..=12).collect::<Vec<_>>());
    }
}
