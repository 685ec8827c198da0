//! Page and scroll arithmetic for walking the inventory grid.

/// Number of inventory rows holding `count` items.
pub fn total_rows(count: u32, columns: usize) -> usize {
    if columns == 0 {
        return 0;
    }
    (count as usize).div_ceil(columns)
}

/// Index of the first slot to click on the current page.
///
/// When fewer rows remain than fit on a page, the final scroll leaves already
/// scanned rows at the top, so clicking starts further down the grid. The
/// first page is never scrolled and always starts at the top.
pub fn page_start_index(
    page_rows: usize,
    columns: usize,
    total_rows: usize,
    rows_queued: usize,
    slot_count: usize,
) -> usize {
    let remaining = total_rows.saturating_sub(rows_queued);
    if rows_queued == 0 || remaining >= page_rows {
        return 0;
    }
    ((page_rows - remaining) * columns).min(slot_count)
}

/// Wheel movement at the end of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollPlan {
    /// Only the remaining rows are scrolled in; the click offset correction applies afterwards.
    Final { ticks: u32 },
    /// A full page, optionally preceded by one tick up to undo scroll acceleration drift.
    FullPage { nudge_up: bool, ticks: u32 },
}

pub fn plan_scroll(
    total_rows: usize,
    rows_queued: usize,
    page_rows: usize,
    ticks_per_row: u32,
    drift_interval_rows: usize,
) -> ScrollPlan {
    let remaining = total_rows.saturating_sub(rows_queued);
    if remaining <= page_rows {
        return ScrollPlan::Final {
            ticks: (ticks_per_row * remaining as u32).saturating_sub(1),
        };
    }
    ScrollPlan::FullPage {
        nudge_up: drift_interval_rows > 0 && rows_queued % drift_interval_rows == 0,
        ticks: (ticks_per_row * page_rows as u32).saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_rows_rounds_up() {
        assert_eq!(total_rows(47, 7), 7);
        assert_eq!(total_rows(49, 7), 7);
        assert_eq!(total_rows(50, 7), 8);
        assert_eq!(total_rows(0, 7), 0);
        assert_eq!(total_rows(10, 0), 0);
    }

    #[test]
    fn test_page_start_for_partial_last_page() {
        // 47 items, 7x5 grid: five rows scanned, two remain
        assert_eq!(page_start_index(5, 7, 7, 5, 35), 21);
        assert_eq!(page_start_index(5, 7, 7, 0, 35), 0);
        assert_eq!(page_start_index(5, 7, 15, 10, 35), 0);
    }

    #[test]
    fn test_small_inventory_starts_at_top() {
        assert_eq!(page_start_index(5, 7, 1, 0, 35), 0);
    }

    #[test]
    fn test_page_start_clamps_when_nothing_remains() {
        assert_eq!(page_start_index(5, 7, 7, 7, 35), 35);
        assert_eq!(page_start_index(5, 7, 7, 9, 30), 30);
    }

    #[test]
    fn test_plan_scroll_final() {
        assert_eq!(plan_scroll(7, 5, 5, 10, 15), ScrollPlan::Final { ticks: 19 });
        assert_eq!(plan_scroll(7, 7, 5, 10, 15), ScrollPlan::Final { ticks: 0 });
    }

    #[test]
    fn test_plan_scroll_full_page_with_drift() {
        assert_eq!(
            plan_scroll(40, 5, 5, 10, 15),
            ScrollPlan::FullPage {
                nudge_up: false,
                ticks: 49
            }
        );
        assert_eq!(
            plan_scroll(40, 15, 5, 10, 15),
            ScrollPlan::FullPage {
                nudge_up: true,
                ticks: 49
            }
        );
        assert_eq!(
            plan_scroll(40, 15, 5, 10, 0),
            ScrollPlan::FullPage {
                nudge_up: false,
                ticks: 49
            }
        );
    }
}
