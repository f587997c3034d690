//! Keeps the "current post" in step with the vertical scroll position of a
//! stack of full-viewport post sections.
//!
//! Positions are abstract units: terminal rows in the TUI, pixels anywhere
//! else. All timers are owned here and polled from [`ScrollSyncNavigator::tick`].

use std::time::{Duration, Instant};

use crate::timer::Timer;

const SMOOTH_SCROLL_DURATION: Duration = Duration::from_millis(240);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionAnchor {
    pub top: usize,
    pub height: usize,
}

impl SectionAnchor {
    pub fn bottom(&self) -> usize {
        self.top + self.height
    }

    fn contains(&self, position: usize) -> bool {
        position >= self.top && position < self.bottom()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NavigatorConfig {
    pub scroll_debounce: Duration,
    pub controls_quiet_period: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            scroll_debounce: Duration::from_millis(100),
            controls_quiet_period: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SmoothScroll {
    from: usize,
    to: usize,
    started: Instant,
}

impl SmoothScroll {
    fn offset_at(&self, now: Instant) -> (usize, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= SMOOTH_SCROLL_DURATION {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / SMOOTH_SCROLL_DURATION.as_secs_f64();
        let eased = 1.0 - (1.0 - t).powi(3);
        let from = self.from as f64;
        let to = self.to as f64;
        ((from + (to - from) * eased).round() as usize, false)
    }
}

#[derive(Debug)]
pub struct ScrollSyncNavigator {
    anchors: Vec<SectionAnchor>,
    post_count: usize,
    viewport_height: usize,
    scroll_offset: usize,
    current: usize,
    controls_visible: bool,
    debounce: Duration,
    last_evaluation: Option<Instant>,
    evaluation_pending: bool,
    controls_timer: Timer,
    smooth: Option<SmoothScroll>,
    disposed: bool,
}

impl ScrollSyncNavigator {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            anchors: Vec::new(),
            post_count: 0,
            viewport_height: 0,
            scroll_offset: 0,
            current: 0,
            controls_visible: true,
            debounce: config.scroll_debounce,
            last_evaluation: None,
            evaluation_pending: false,
            controls_timer: Timer::once(config.controls_quiet_period),
            smooth: None,
            disposed: false,
        }
    }

    /// Discards every anchor and rebuilds against a new working set. The
    /// current post goes back to the first one.
    pub fn rebind(&mut self, post_count: usize, viewport_height: usize) {
        self.post_count = post_count;
        self.viewport_height = viewport_height;
        self.anchors = uniform_anchors(post_count, viewport_height);
        self.scroll_offset = 0;
        self.current = 0;
        self.smooth = None;
        self.evaluation_pending = false;
        self.last_evaluation = None;
        self.controls_timer.cancel();
        self.controls_visible = true;
        tracing::debug!(post_count, viewport_height, "navigator rebound");
    }

    /// Lays the sections out again for a new viewport height while staying
    /// on the same post.
    pub fn resize(&mut self, viewport_height: usize) {
        if viewport_height == self.viewport_height {
            return;
        }
        self.viewport_height = viewport_height;
        self.anchors = uniform_anchors(self.post_count, viewport_height);
        self.smooth = None;
        self.scroll_offset = self
            .anchors
            .get(self.current)
            .map(|anchor| anchor.top)
            .unwrap_or(0);
    }

    /// Replaces the anchors with measured sections of arbitrary height.
    pub fn bind_sections(&mut self, anchors: Vec<SectionAnchor>, viewport_height: usize) {
        self.post_count = anchors.len();
        self.anchors = anchors;
        self.viewport_height = viewport_height;
        self.current = self.current.min(self.post_count.saturating_sub(1));
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
    }

    pub fn dispose(&mut self) {
        self.controls_timer.cancel();
        self.smooth = None;
        self.evaluation_pending = false;
        self.anchors.clear();
        self.disposed = true;
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub fn post_count(&self) -> usize {
        self.post_count
    }

    pub fn anchors(&self) -> &[SectionAnchor] {
        &self.anchors
    }

    pub fn is_scrolling(&self) -> bool {
        self.smooth.is_some()
    }

    /// Sections intersecting the viewport, with their offset relative to the
    /// top of the viewport (negative when partially scrolled past).
    pub fn visible_sections(&self) -> Vec<(usize, isize)> {
        let top = self.scroll_offset;
        let bottom = top + self.viewport_height;
        self.anchors
            .iter()
            .enumerate()
            .filter(|(_, anchor)| anchor.bottom() > top && anchor.top < bottom)
            .map(|(index, anchor)| (index, anchor.top as isize - top as isize))
            .collect()
    }

    /// A user scroll to an absolute offset.
    pub fn on_scroll(&mut self, offset: usize, now: Instant) {
        if self.disposed {
            return;
        }
        self.smooth = None;
        self.apply_scroll(offset, now);
    }

    pub fn scroll_by(&mut self, delta: isize, now: Instant) {
        let target = self.scroll_offset.saturating_add_signed(delta);
        self.on_scroll(target, now);
    }

    /// Programmatic navigation: clamps, sets the current post immediately
    /// and glides the viewport to its section.
    pub fn scroll_to_post(&mut self, index: usize, now: Instant) -> bool {
        if self.disposed || self.post_count == 0 {
            return false;
        }
        let index = index.min(self.post_count - 1);
        let changed = index != self.current;
        self.current = index;
        if let Some(anchor) = self.anchors.get(index) {
            let to = anchor.top.min(self.max_offset());
            if to != self.scroll_offset {
                self.smooth = Some(SmoothScroll {
                    from: self.scroll_offset,
                    to,
                    started: now,
                });
            }
        }
        changed
    }

    pub fn next_post(&mut self, now: Instant) -> bool {
        if self.post_count == 0 || self.current + 1 >= self.post_count {
            return false;
        }
        self.scroll_to_post(self.current + 1, now)
    }

    pub fn previous_post(&mut self, now: Instant) -> bool {
        if self.current == 0 {
            return false;
        }
        self.scroll_to_post(self.current - 1, now)
    }

    pub fn first_post(&mut self, now: Instant) -> bool {
        self.scroll_to_post(0, now)
    }

    pub fn last_post(&mut self, now: Instant) -> bool {
        self.scroll_to_post(self.post_count.saturating_sub(1), now)
    }

    /// Advances animation and timers. Returns true when anything visible
    /// changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let mut changed = false;

        // The optimistic index set by scroll_to_post holds until the glide
        // lands; only then is it reconfirmed against the midpoint.
        if let Some(smooth) = self.smooth {
            let (offset, done) = smooth.offset_at(now);
            if offset != self.scroll_offset || done {
                self.scroll_offset = offset.min(self.max_offset());
                self.hide_controls(now);
                changed = true;
            }
            if done {
                self.smooth = None;
                self.request_evaluation(now);
            }
        }

        if self.evaluation_pending && self.debounce_elapsed(now) {
            changed |= self.evaluate(now);
        }

        if self.controls_timer.fire(now) && !self.controls_visible {
            self.controls_visible = true;
            changed = true;
        }

        changed
    }

    fn apply_scroll(&mut self, offset: usize, now: Instant) {
        self.scroll_offset = offset.min(self.max_offset());
        self.hide_controls(now);
        self.request_evaluation(now);
    }

    fn hide_controls(&mut self, now: Instant) {
        self.controls_visible = false;
        self.controls_timer.arm(now);
    }

    fn request_evaluation(&mut self, now: Instant) {
        if self.debounce_elapsed(now) {
            self.evaluate(now);
        } else {
            self.evaluation_pending = true;
        }
    }

    fn debounce_elapsed(&self, now: Instant) -> bool {
        match self.last_evaluation {
            Some(last) => now.saturating_duration_since(last) >= self.debounce,
            None => true,
        }
    }

    fn evaluate(&mut self, now: Instant) -> bool {
        self.last_evaluation = Some(now);
        self.evaluation_pending = false;
        let midpoint = self.scroll_offset + self.viewport_height / 2;
        match self.anchors.iter().position(|anchor| anchor.contains(midpoint)) {
            Some(index) if index != self.current => {
                tracing::trace!(from = self.current, to = index, midpoint, "current post changed");
                self.current = index;
                true
            }
            _ => false,
        }
    }

    fn max_offset(&self) -> usize {
        self.anchors
            .last()
            .map(|anchor| anchor.bottom().saturating_sub(self.viewport_height))
            .unwrap_or(0)
    }
}

fn uniform_anchors(count: usize, height: usize) -> Vec<SectionAnchor> {
    if height == 0 {
        return Vec::new();
    }
    (0..count)
        .map(|index| SectionAnchor {
            top: index * height,
            height,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEIGHT: usize = 40;

    fn navigator(count: usize) -> ScrollSyncNavigator {
        let mut nav = ScrollSyncNavigator::new(NavigatorConfig::default());
        nav.rebind(count, HEIGHT);
        nav
    }

    #[test]
    fn midpoint_selects_section_regardless_of_prior_index() {
        let start = Instant::now();
        let mut nav = navigator(5);
        nav.scroll_to_post(4, start);
        nav.on_scroll(2 * HEIGHT - HEIGHT / 2 + 5, start + Duration::from_secs(1));
        assert_eq!(nav.current_index(), 2);
    }

    #[test]
    fn scroll_evaluations_are_debounced() {
        let start = Instant::now();
        let mut nav = navigator(5);
        nav.on_scroll(HEIGHT, start);
        assert_eq!(nav.current_index(), 1);
        nav.on_scroll(2 * HEIGHT, start + Duration::from_millis(30));
        assert_eq!(nav.current_index(), 1);
        assert!(!nav.tick(start + Duration::from_millis(60)));
        assert!(nav.tick(start + Duration::from_millis(100)));
        assert_eq!(nav.current_index(), 2);
    }

    #[test]
    fn unmatched_midpoint_leaves_index_unchanged() {
        let start = Instant::now();
        let mut nav = ScrollSyncNavigator::new(NavigatorConfig::default());
        nav.rebind(3, 0);
        nav.on_scroll(500, start);
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn scroll_to_post_clamps_and_sets_index_immediately() {
        let start = Instant::now();
        let mut nav = navigator(3);
        assert!(nav.scroll_to_post(10, start));
        assert_eq!(nav.current_index(), 2);
        assert!(nav.is_scrolling());
        for step in 1..=10 {
            nav.tick(start + Duration::from_millis(step * 50));
        }
        assert!(!nav.is_scrolling());
        assert_eq!(nav.scroll_offset(), 2 * HEIGHT);
        assert_eq!(nav.current_index(), 2);
    }

    #[test]
    fn keyboard_paging_clamps_at_bounds() {
        let start = Instant::now();
        let mut nav = navigator(2);
        assert!(!nav.previous_post(start));
        assert!(nav.next_post(start));
        assert_eq!(nav.current_index(), 1);
        assert!(!nav.next_post(start));
        assert_eq!(nav.current_index(), 1);
    }

    #[test]
    fn controls_hide_on_scroll_and_return_after_quiet_period() {
        let start = Instant::now();
        let mut nav = navigator(4);
        assert!(nav.controls_visible());
        nav.on_scroll(10, start);
        assert!(!nav.controls_visible());
        nav.on_scroll(20, start + Duration::from_millis(1500));
        nav.tick(start + Duration::from_millis(2100));
        assert!(!nav.controls_visible());
        nav.tick(start + Duration::from_millis(3500));
        assert!(nav.controls_visible());
    }

    #[test]
    fn rebind_resets_to_first_post() {
        let start = Instant::now();
        let mut nav = navigator(5);
        nav.on_scroll(3 * HEIGHT, start);
        assert_eq!(nav.current_index(), 3);
        nav.rebind(2, HEIGHT);
        assert_eq!(nav.current_index(), 0);
        assert_eq!(nav.scroll_offset(), 0);
        assert_eq!(nav.anchors().len(), 2);
    }

    #[test]
    fn resize_keeps_current_post_in_view() {
        let start = Instant::now();
        let mut nav = navigator(5);
        nav.on_scroll(3 * HEIGHT, start);
        nav.resize(20);
        assert_eq!(nav.current_index(), 3);
        assert_eq!(nav.scroll_offset(), 60);
    }

    #[test]
    fn scroll_offset_is_clamped_to_last_section() {
        let start = Instant::now();
        let mut nav = navigator(3);
        nav.on_scroll(10_000, start);
        assert_eq!(nav.scroll_offset(), 2 * HEIGHT);
        assert_eq!(nav.current_index(), 2);
    }

    #[test]
    fn visible_sections_report_relative_offsets() {
        let start = Instant::now();
        let mut nav = navigator(3);
        nav.on_scroll(HEIGHT / 2, start);
        assert_eq!(nav.visible_sections(), vec![(0, -20), (1, 20)]);
    }

    #[test]
    fn disposed_navigator_ignores_events() {
        let start = Instant::now();
        let mut nav = navigator(3);
        nav.on_scroll(5, start);
        nav.dispose();
        assert!(!nav.tick(start + Duration::from_secs(5)));
        assert!(!nav.controls_visible());
        assert!(!nav.scroll_to_post(2, start));
    }

    #[test]
    fn variable_height_sections_are_supported() {
        let start = Instant::now();
        let mut nav = ScrollSyncNavigator::new(NavigatorConfig::default());
        nav.bind_sections(
            vec![
                SectionAnchor { top: 0, height: 10 },
                SectionAnchor { top: 10, height: 50 },
                SectionAnchor { top: 60, height: 20 },
            ],
            20,
        );
        nav.on_scroll(55, start);
        assert_eq!(nav.current_index(), 2);
    }
}
