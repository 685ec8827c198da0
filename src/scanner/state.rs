//! Scan orchestrator state machine.
//!
//! The session walks: DeterminingCount → Paging → Clicking … → Scrolling →
//! Paging … → Done | Stopped. Clicks and scrolls are issued strictly in order
//! from the caller's thread; captured cards go to the work queue and are
//! extracted elsewhere.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::card::{extract_card, CardImageSet};
use super::config::ScannerConfig;
use super::count::read_item_count;
use super::diagnostics::save_image;
use super::driver::{ScreenDriver, WaitProfile};
use super::fields::{below_min_rarity, rarity_of};
use super::layout::ScanLayout;
use super::pagination::{page_start_index, plan_scroll, total_rows, ScrollPlan};
use super::queue::ScanJob;
use crate::ocr::TextRecognizer;
use crate::vision::{draw_overlay, infer_grid, Grid};

/// A grid narrower or shorter than this is suspicious and gets dumped.
const EXPECTED_MIN_COLUMNS: usize = 7;
const EXPECTED_MIN_ROWS: usize = 5;

/// Cooperative stop request, shared between the orchestrator and whoever
/// wants to end the session (UI, rarity gate).
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Session phases.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPhase {
    /// Reading the inventory counter
    DeterminingCount,
    /// Locating slots and choosing where to start on this page
    Paging,
    /// Selecting slots one by one and queueing their cards
    Clicking,
    /// Moving to the next page
    Scrolling,
    /// Target reached or no slots left
    Done,
    /// Stop requested
    Stopped,
    /// Session aborted by an error
    Failed(String),
}

impl ScanPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, ScanPhase::Done | ScanPhase::Stopped | ScanPhase::Failed(_))
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::DeterminingCount => write!(f, "Determining item count"),
            ScanPhase::Paging => write!(f, "Paging"),
            ScanPhase::Clicking => write!(f, "Clicking"),
            ScanPhase::Scrolling => write!(f, "Scrolling"),
            ScanPhase::Done => write!(f, "Done"),
            ScanPhase::Stopped => write!(f, "Stopped"),
            ScanPhase::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}

/// Counters of one scan session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    /// Items read from the counter (or configured)
    pub item_count: u32,
    /// Jobs enqueued so far
    pub queued: u32,
    /// Inventory rows fully clicked through
    pub rows_queued: usize,
    /// Stop once this many jobs are queued
    pub target_count: u32,
    pub total_rows: usize,
}

/// Orchestrator context holding the session's state and collaborators.
pub struct ScanContext<'a, D: ScreenDriver + ?Sized> {
    pub phase: ScanPhase,
    pub state: ScanState,
    driver: &'a mut D,
    recognizer: &'a dyn TextRecognizer,
    config: &'a ScannerConfig,
    layout: ScanLayout,
    sender: Sender<ScanJob>,
    stop: StopFlag,
    grid: Option<Grid>,
    page_start: usize,
    next_slot: usize,
    click_offset: i32,
    diagnostics_dir: Option<PathBuf>,
}

impl<'a, D: ScreenDriver + ?Sized> ScanContext<'a, D> {
    pub fn new(
        driver: &'a mut D,
        recognizer: &'a dyn TextRecognizer,
        config: &'a ScannerConfig,
        sender: Sender<ScanJob>,
        stop: StopFlag,
    ) -> Self {
        let (width, height) = driver.window_size();
        Self {
            phase: ScanPhase::DeterminingCount,
            state: ScanState::default(),
            layout: ScanLayout::new(width, height),
            driver,
            recognizer,
            config,
            sender,
            stop,
            grid: None,
            page_start: 0,
            next_slot: 0,
            click_offset: 0,
            diagnostics_dir: None,
        }
    }

    /// Directory for diagnostic dumps; only used when the config enables them.
    pub fn with_diagnostics_dir(mut self, dir: PathBuf) -> Self {
        if self.config.save_diagnostics {
            self.diagnostics_dir = Some(dir);
        }
        self
    }

    /// Uses a known slot grid instead of inferring one from the first page.
    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn layout(&self) -> &ScanLayout {
        &self.layout
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` while the session should continue. An error moves
    /// the session to `Failed` and is returned to the caller.
    pub fn step(&mut self) -> Result<bool> {
        if self.phase.is_finished() {
            return Ok(false);
        }
        if self.stop.is_requested() {
            crate::log("Stop requested, ending scan");
            self.phase = ScanPhase::Stopped;
            return Ok(false);
        }

        let result = match &self.phase {
            ScanPhase::DeterminingCount => self.determine_count(),
            ScanPhase::Paging => self.start_page(),
            ScanPhase::Clicking => self.click_next_slot(),
            ScanPhase::Scrolling => self.scroll_page(),
            ScanPhase::Done | ScanPhase::Stopped | ScanPhase::Failed(_) => Ok(false),
        };

        if let Err(e) = &result {
            crate::log(&format!("Scan failed during {}: {:#}", self.phase, e));
            self.phase = ScanPhase::Failed(format!("{:#}", e));
        }
        result
    }

    fn determine_count(&mut self) -> Result<bool> {
        let count = if self.config.target_count > 0 {
            self.config.target_count
        } else {
            read_item_count(
                &mut *self.driver,
                &self.layout,
                self.recognizer,
                self.config.max_inventory,
                self.diagnostics_dir.as_deref(),
            )?
        };

        self.state.item_count = count;
        self.state.target_count = count + self.config.count_inflation;
        crate::log(&format!(
            "Scanning {} items (target {} with inflation) on a {} {}x{} window",
            count,
            self.state.target_count,
            self.layout.aspect,
            self.layout.window_width,
            self.layout.window_height
        ));

        self.phase = ScanPhase::Paging;
        Ok(true)
    }

    /// Captures the window and infers the slot grid once per session.
    fn locate_slots(&mut self) -> Result<Grid> {
        let screenshot = self.driver.capture_window()?;
        let params = self
            .config
            .grid_params(screenshot.width(), screenshot.height());

        let grid = match infer_grid(&screenshot, &params) {
            Ok(grid) => grid,
            Err(e) => {
                save_image(self.diagnostics_dir.as_deref(), "inventory.png", &screenshot);
                return Err(e.into());
            }
        };

        if grid.columns < EXPECTED_MIN_COLUMNS || grid.rows < EXPECTED_MIN_ROWS {
            crate::log(&format!(
                "Only {} columns x {} rows detected, continuing with a partial grid",
                grid.columns, grid.rows
            ));
            save_image(
                self.diagnostics_dir.as_deref(),
                "grid.png",
                &draw_overlay(&screenshot, &grid),
            );
        }
        Ok(grid)
    }

    fn start_page(&mut self) -> Result<bool> {
        if self.grid.is_none() {
            self.grid = Some(self.locate_slots()?);
        }
        let grid = self
            .grid
            .as_ref()
            .ok_or_else(|| anyhow!("Slot grid missing"))?;

        self.state.total_rows = total_rows(self.state.item_count, grid.columns);
        let start = page_start_index(
            grid.rows,
            grid.columns,
            self.state.total_rows,
            self.state.rows_queued,
            grid.rectangles.len(),
        );

        if start >= grid.rectangles.len() {
            crate::log(&format!(
                "No slots left to click ({} rows of {} queued)",
                self.state.rows_queued, self.state.total_rows
            ));
            self.phase = ScanPhase::Done;
            return Ok(false);
        }

        self.page_start = start;
        self.next_slot = start;
        self.phase = ScanPhase::Clicking;
        Ok(true)
    }

    fn click_next_slot(&mut self) -> Result<bool> {
        let (slot, slot_count, columns) = {
            let grid = self
                .grid
                .as_ref()
                .ok_or_else(|| anyhow!("Slot grid missing"))?;
            let slot = *grid
                .rectangles
                .get(self.next_slot)
                .ok_or_else(|| anyhow!("Slot {} out of range", self.next_slot))?;
            (slot, grid.rectangles.len(), grid.columns)
        };

        let center = slot.center();
        self.driver
            .set_cursor_pos(center.x, center.y + self.click_offset)?;
        self.driver.click()?;
        self.driver.random_wait(WaitProfile::SelectNextItem);

        let images = extract_card(&mut *self.driver, &self.layout.card, &slot)?;
        self.queue_card(images)?;
        self.next_slot += 1;

        if self.state.queued >= self.state.target_count {
            crate::log(&format!("Queued {} items, scan complete", self.state.queued));
            self.phase = ScanPhase::Done;
            return Ok(false);
        }
        if self.stop.is_requested() {
            crate::log(&format!("Scan stopped after {} items", self.state.queued));
            self.phase = ScanPhase::Stopped;
            return Ok(false);
        }

        if self.next_slot >= slot_count {
            let clicked = slot_count - self.page_start;
            self.state.rows_queued += clicked.div_ceil(columns.max(1));
            self.phase = ScanPhase::Scrolling;
        }
        Ok(true)
    }

    /// Applies the rarity gate and enqueues the card.
    fn queue_card(&mut self, images: CardImageSet) -> Result<()> {
        let rarity = rarity_of(
            &images.name,
            self.layout.rarity_sample,
            self.config.color_tolerance,
        );
        if below_min_rarity(rarity, self.config.min_rarity) {
            crate::log(&format!(
                "Item {} is below {} stars, stopping scan",
                self.state.queued + 1,
                self.config.min_rarity
            ));
            self.stop.request();
            return Ok(());
        }

        self.state.queued += 1;
        self.sender
            .send(ScanJob::new(self.state.queued, images))
            .map_err(|_| anyhow!("Work queue closed"))?;
        Ok(())
    }

    fn scroll_page(&mut self) -> Result<bool> {
        let page_rows = self.grid.as_ref().map(|g| g.rows).unwrap_or(0);
        let plan = plan_scroll(
            self.state.total_rows,
            self.state.rows_queued,
            page_rows,
            self.config.ticks_per_row,
            self.config.drift_interval_rows,
        );

        match plan {
            ScrollPlan::Final { ticks } => {
                if ticks > 0 {
                    self.driver.scroll(-(ticks as i32))?;
                }
                self.click_offset = self.layout.final_page_click_offset;
            }
            ScrollPlan::FullPage { nudge_up, ticks } => {
                if nudge_up {
                    self.driver.scroll(1)?;
                }
                self.driver.scroll(-(ticks as i32))?;
            }
        }
        self.driver.random_wait(WaitProfile::Fast);

        self.phase = ScanPhase::Paging;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};
    use crate::scanner::fields::RARITY_COLORS;
    use crate::scanner::queue::{create_work_queue, next_job};
    use image::{GrayImage, Rgba, RgbaImage};

    /// Records input and serves card captures colored by click number.
    struct FakeDriver {
        size: (u32, u32),
        /// Card color for the n-th click (1-based); five stars otherwise
        colors: Vec<(usize, Rgba<u8>)>,
        clicks: Vec<Point>,
        cursor: Point,
        scrolls: Vec<i32>,
    }

    impl FakeDriver {
        fn new(width: u32, height: u32) -> Self {
            Self {
                size: (width, height),
                colors: Vec::new(),
                clicks: Vec::new(),
                cursor: Point::default(),
                scrolls: Vec::new(),
            }
        }
    }

    impl ScreenDriver for FakeDriver {
        fn window_size(&self) -> (u32, u32) {
            self.size
        }

        fn capture_window(&mut self) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(self.size.0, self.size.1, Rgba([30, 30, 30, 255])))
        }

        fn capture_region(&mut self, region: Rect) -> Result<RgbaImage> {
            let n = self.clicks.len();
            let color = self
                .colors
                .iter()
                .find(|(at, _)| *at == n)
                .map(|(_, c)| *c)
                .unwrap_or(RARITY_COLORS[0].1);
            Ok(RgbaImage::from_pixel(region.width as u32, region.height as u32, color))
        }

        fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()> {
            self.cursor = Point::new(x, y);
            Ok(())
        }

        fn click(&mut self) -> Result<()> {
            self.clicks.push(self.cursor);
            Ok(())
        }

        fn scroll(&mut self, delta: i32) -> Result<()> {
            self.scrolls.push(delta);
            Ok(())
        }

        fn random_wait(&mut self, _profile: WaitProfile) {}
    }

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize_text(&self, _img: &GrayImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// A 7x5 grid of 85x105 slots.
    fn seven_by_five() -> Grid {
        let mut rectangles = Vec::new();
        for row in 0..5 {
            for col in 0..7 {
                rectangles.push(Rect::new(100 + col * 95, 100 + row * 115, 85, 105));
            }
        }
        Grid {
            rectangles,
            columns: 7,
            rows: 5,
        }
    }

    fn run<D: ScreenDriver + ?Sized>(ctx: &mut ScanContext<'_, D>) -> Result<()> {
        while ctx.step()? {}
        Ok(())
    }

    #[test]
    fn test_partial_last_page_starts_mid_grid() {
        let mut driver = FakeDriver::new(1280, 800);
        let config = ScannerConfig::default();
        let recognizer = FixedText("47/2000");
        let (sender, receiver) = create_work_queue();
        let grid = seven_by_five();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, StopFlag::new())
            .with_grid(grid.clone());
        run(&mut ctx).unwrap();

        assert_eq!(ctx.phase, ScanPhase::Done);
        assert_eq!(ctx.state.item_count, 47);
        assert_eq!(ctx.state.target_count, 50);
        assert_eq!(ctx.state.total_rows, 7);
        assert_eq!(ctx.state.queued, 49);
        assert_eq!(ctx.state.rows_queued, 7);
        drop(ctx);

        // First page clicks every slot, second page resumes at index 21
        assert_eq!(driver.clicks.len(), 49);
        assert_eq!(driver.clicks[0], grid.rectangles[0].center());
        let resumed = grid.rectangles[21].center();
        assert_eq!(driver.clicks[35], Point::new(resumed.x, resumed.y + 35));
        assert_eq!(driver.scrolls, vec![-19]);

        let ids: Vec<u32> = std::iter::from_fn(|| next_job(&receiver)).map(|j| j.id).collect();
        assert_eq!(ids, (1..=49).collect::<Vec<_>>());
    }

    #[test]
    fn test_low_rarity_stops_scan() {
        let mut driver = FakeDriver::new(1280, 720);
        driver.colors.push((12, RARITY_COLORS[4].1));
        let config = ScannerConfig {
            target_count: 100,
            ..ScannerConfig::default()
        };
        let recognizer = FixedText("");
        let (sender, receiver) = create_work_queue();
        let stop = StopFlag::new();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, stop.clone())
            .with_grid(seven_by_five());
        run(&mut ctx).unwrap();

        assert_eq!(ctx.phase, ScanPhase::Stopped);
        assert_eq!(ctx.state.queued, 11);
        assert!(stop.is_requested());
        drop(ctx);

        assert_eq!(driver.clicks.len(), 12);
        let mut jobs = 0;
        while next_job(&receiver).is_some() {
            jobs += 1;
        }
        assert_eq!(jobs, 11);
    }

    #[test]
    fn test_unknown_rarity_passes_the_gate() {
        let mut driver = FakeDriver::new(1280, 720);
        driver.colors.push((2, Rgba([0, 0, 0, 255])));
        let config = ScannerConfig {
            target_count: 2,
            ..ScannerConfig::default()
        };
        let recognizer = FixedText("");
        let (sender, _receiver) = create_work_queue();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, StopFlag::new())
            .with_grid(seven_by_five());
        run(&mut ctx).unwrap();

        assert_eq!(ctx.phase, ScanPhase::Done);
        assert_eq!(ctx.state.queued, 5);
    }

    #[test]
    fn test_full_pages_scroll_whole_page() {
        let mut driver = FakeDriver::new(1280, 720);
        let config = ScannerConfig {
            target_count: 80,
            ..ScannerConfig::default()
        };
        let recognizer = FixedText("");
        let (sender, _receiver) = create_work_queue();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, StopFlag::new())
            .with_grid(seven_by_five());
        run(&mut ctx).unwrap();

        assert_eq!(ctx.phase, ScanPhase::Done);
        assert_eq!(ctx.state.queued, 83);
        drop(ctx);

        // 12 rows: two full pages, then the last two rows
        assert_eq!(driver.scrolls, vec![-49, -19]);
    }

    #[test]
    fn test_external_stop_before_start() {
        let mut driver = FakeDriver::new(1280, 720);
        let config = ScannerConfig::default();
        let recognizer = FixedText("10/2000");
        let (sender, _receiver) = create_work_queue();
        let stop = StopFlag::new();
        stop.request();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, stop);
        assert!(!ctx.step().unwrap());
        assert_eq!(ctx.phase, ScanPhase::Stopped);
        drop(ctx);
        assert!(driver.clicks.is_empty());
    }

    #[test]
    fn test_grid_failure_aborts_session() {
        let mut driver = FakeDriver::new(1280, 720);
        let config = ScannerConfig::default();
        let recognizer = FixedText("10/2000");
        let (sender, _receiver) = create_work_queue();

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, StopFlag::new());
        assert!(ctx.step().unwrap());
        let err = ctx.step().unwrap_err();
        assert!(err.to_string().contains("Insufficient items"));
        assert!(matches!(ctx.phase, ScanPhase::Failed(_)));
        assert!(!ctx.step().unwrap());
    }

    #[test]
    fn test_closed_queue_fails_session() {
        let mut driver = FakeDriver::new(1280, 720);
        let config = ScannerConfig {
            target_count: 5,
            ..ScannerConfig::default()
        };
        let recognizer = FixedText("");
        let (sender, receiver) = create_work_queue();
        drop(receiver);

        let mut ctx = ScanContext::new(&mut driver, &recognizer, &config, sender, StopFlag::new())
            .with_grid(seven_by_five());
        assert!(run(&mut ctx).is_err());
        assert!(matches!(ctx.phase, ScanPhase::Failed(_)));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ScanPhase::DeterminingCount.to_string(), "Determining item count");
        assert_eq!(
            ScanPhase::Failed("window closed".to_string()).to_string(),
            "Failed: window closed"
        );
    }
}
