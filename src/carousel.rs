//! Per-post media carousel.
//!
//! One controller exists per mounted post view. It owns its auto-advance
//! timer, so swapping the owning post or disposing the controller cancels
//! any pending advance before it can touch the new state.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::gesture::Swipe;
use crate::media::MediaItem;
use crate::timer::Timer;

/// Number of fallback gradients the surface can draw for media-less posts.
pub const GRADIENT_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselMode {
    NoMedia,
    SingleItem,
    MultiItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselKey {
    Previous,
    Next,
}

/// What the surface should draw for the active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaView {
    pub index: usize,
    pub item: MediaItem,
    pub errored: bool,
}

#[derive(Debug)]
pub struct CarouselController {
    owner: Option<i64>,
    items: Vec<MediaItem>,
    active: usize,
    errored: BTreeSet<usize>,
    loaded: BTreeSet<usize>,
    auto_advance: Timer,
    disposed: bool,
}

impl CarouselController {
    pub fn new(interval: Duration) -> Self {
        Self {
            owner: None,
            items: Vec::new(),
            active: 0,
            errored: BTreeSet::new(),
            loaded: BTreeSet::new(),
            auto_advance: Timer::repeating(interval),
            disposed: false,
        }
    }

    /// Binds the carousel to a post. A different sequence number resets the
    /// active index and error flags and restarts the auto-advance timer.
    /// Returns true when the owner changed.
    pub fn mount(&mut self, sequence_number: i64, items: Vec<MediaItem>, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        if self.owner == Some(sequence_number) {
            if self.items != items {
                self.items = items;
                self.active = self.active.min(self.items.len().saturating_sub(1));
                self.errored.retain(|index| *index < self.items.len());
                self.loaded.retain(|index| *index < self.items.len());
                self.restart_timer(now);
            }
            return false;
        }
        tracing::trace!(
            from = ?self.owner,
            to = sequence_number,
            count = items.len(),
            "carousel owner changed"
        );
        self.owner = Some(sequence_number);
        self.items = items;
        self.active = 0;
        self.errored.clear();
        self.loaded.clear();
        self.restart_timer(now);
        true
    }

    /// Detaches from the current post and stops auto-advance. A later
    /// `mount` binds again.
    pub fn unmount(&mut self) {
        if self.owner.is_none() {
            return;
        }
        tracing::trace!(from = ?self.owner, "carousel unmounted");
        self.auto_advance.cancel();
        self.owner = None;
        self.items.clear();
        self.errored.clear();
        self.loaded.clear();
        self.active = 0;
    }

    /// Teardown: cancels the timer and detaches from the post. Further
    /// calls are ignored.
    pub fn dispose(&mut self) {
        self.auto_advance.cancel();
        self.owner = None;
        self.items.clear();
        self.errored.clear();
        self.loaded.clear();
        self.active = 0;
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn owner(&self) -> Option<i64> {
        self.owner
    }

    pub fn mode(&self) -> CarouselMode {
        match self.items.len() {
            0 => CarouselMode::NoMedia,
            1 => CarouselMode::SingleItem,
            _ => CarouselMode::MultiItem,
        }
    }

    /// Navigation chrome (arrows, indicators) is only drawn for multi-item posts.
    pub fn shows_controls(&self) -> bool {
        self.mode() == CarouselMode::MultiItem
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn is_errored(&self, index: usize) -> bool {
        self.errored.contains(&index)
    }

    pub fn view(&self, index: usize) -> Option<MediaView> {
        let item = self.items.get(index)?;
        let errored = self.errored.contains(&index);
        Some(MediaView {
            index,
            item: if errored { item.as_failed() } else { item.clone() },
            errored,
        })
    }

    pub fn active_view(&self) -> Option<MediaView> {
        self.view(self.active)
    }

    pub fn next(&mut self, now: Instant) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        self.active = (self.active + 1) % self.items.len();
        self.restart_timer(now);
        true
    }

    pub fn previous(&mut self, now: Instant) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        let len = self.items.len();
        self.active = (self.active + len - 1) % len;
        self.restart_timer(now);
        true
    }

    pub fn jump_to(&mut self, index: usize, now: Instant) -> bool {
        if self.items.len() <= 1 || index >= self.items.len() || index == self.active {
            return false;
        }
        self.active = index;
        self.restart_timer(now);
        true
    }

    pub fn handle_key(&mut self, key: CarouselKey, now: Instant) -> bool {
        match key {
            CarouselKey::Previous => self.previous(now),
            CarouselKey::Next => self.next(now),
        }
    }

    pub fn handle_swipe(&mut self, swipe: Swipe, now: Instant) -> bool {
        match swipe {
            Swipe::Left => self.next(now),
            Swipe::Right => self.previous(now),
        }
    }

    /// Drives auto-advance. Returns true when the active index moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.disposed || self.items.len() <= 1 {
            return false;
        }
        if self.auto_advance.fire(now) {
            self.active = (self.active + 1) % self.items.len();
            return true;
        }
        false
    }

    /// Records a load failure reported by the surface. Reports addressed to
    /// a post this carousel no longer owns are dropped.
    pub fn mark_errored(&mut self, sequence_number: i64, index: usize) -> bool {
        if self.owner != Some(sequence_number) || index >= self.items.len() {
            return false;
        }
        let inserted = self.errored.insert(index);
        if inserted {
            tracing::debug!(
                post = sequence_number,
                index,
                url = %self.items[index].source_url,
                "media failed to load"
            );
        }
        inserted
    }

    /// Records a successful load. Same ownership rule as [`Self::mark_errored`].
    pub fn mark_loaded(&mut self, sequence_number: i64, index: usize) -> bool {
        if self.owner != Some(sequence_number) || index >= self.items.len() {
            return false;
        }
        self.loaded.insert(index)
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.contains(&index)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.items.len() > 1 {
            self.auto_advance.due()
        } else {
            None
        }
    }

    fn restart_timer(&mut self, now: Instant) {
        if self.items.len() > 1 {
            self.auto_advance.arm(now);
        } else {
            self.auto_advance.cancel();
        }
    }
}

impl Drop for CarouselController {
    fn drop(&mut self) {
        self.auto_advance.cancel();
    }
}

/// Deterministic fallback gradient for a post without content media.
pub fn fallback_gradient(sequence_number: i64) -> usize {
    sequence_number.rem_euclid(GRADIENT_COUNT as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{self, MediaPolicy};
    use crate::post::Post;

    const INTERVAL: Duration = Duration::from_secs(8);

    fn items(count: usize) -> Vec<MediaItem> {
        let mut post = Post::new(1, "c");
        post.media_references = (0..count)
            .map(|i| format!("https://cdn.example.com/{i}.jpg"))
            .collect();
        media::resolve(&post, &MediaPolicy::default())
    }

    fn mounted(count: usize, now: Instant) -> CarouselController {
        let mut carousel = CarouselController::new(INTERVAL);
        carousel.mount(1, items(count), now);
        carousel
    }

    #[test]
    fn no_media_never_shows_controls() {
        let now = Instant::now();
        let mut carousel = mounted(0, now);
        assert_eq!(carousel.mode(), CarouselMode::NoMedia);
        assert!(!carousel.shows_controls());
        assert!(!carousel.next(now));
        assert!(!carousel.tick(now + INTERVAL * 3));
        assert!(carousel.active_view().is_none());
    }

    #[test]
    fn single_item_navigation_is_a_no_op() {
        let now = Instant::now();
        let mut carousel = mounted(1, now);
        assert_eq!(carousel.mode(), CarouselMode::SingleItem);
        assert!(!carousel.shows_controls());
        assert!(!carousel.next(now));
        assert!(!carousel.previous(now));
        assert_eq!(carousel.active_index(), 0);
        assert!(!carousel.tick(now + INTERVAL * 2));
    }

    #[test]
    fn next_and_previous_wrap_and_invert() {
        let now = Instant::now();
        let mut carousel = mounted(3, now);
        for start in 0..3 {
            carousel.jump_to(start, now);
            carousel.next(now);
            carousel.previous(now);
            assert_eq!(carousel.active_index(), start);
            carousel.previous(now);
            carousel.next(now);
            assert_eq!(carousel.active_index(), start);
        }
        carousel.jump_to(2, now);
        carousel.next(now);
        assert_eq!(carousel.active_index(), 0);
        carousel.previous(now);
        assert_eq!(carousel.active_index(), 2);
    }

    #[test]
    fn auto_advance_wraps_every_interval() {
        let start = Instant::now();
        let mut carousel = mounted(2, start);
        assert!(!carousel.tick(start + Duration::from_secs(7)));
        assert!(carousel.tick(start + INTERVAL));
        assert_eq!(carousel.active_index(), 1);
        assert!(carousel.tick(start + INTERVAL * 2));
        assert_eq!(carousel.active_index(), 0);
    }

    #[test]
    fn post_swap_cancels_pending_advance() {
        let start = Instant::now();
        let mut carousel = mounted(3, start);
        carousel.mount(2, items(3), start + Duration::from_secs(5));
        assert!(!carousel.tick(start + Duration::from_millis(8_500)));
        assert_eq!(carousel.active_index(), 0);
        assert!(carousel.tick(start + Duration::from_secs(13)));
        assert_eq!(carousel.active_index(), 1);
    }

    #[test]
    fn post_swap_resets_index_and_errors() {
        let now = Instant::now();
        let mut carousel = mounted(3, now);
        carousel.next(now);
        carousel.mark_errored(1, 1);
        assert!(carousel.is_errored(1));
        assert!(carousel.mount(2, items(3), now));
        assert_eq!(carousel.active_index(), 0);
        assert!(!carousel.is_errored(1));
    }

    #[test]
    fn remounting_same_post_keeps_state() {
        let now = Instant::now();
        let mut carousel = mounted(3, now);
        carousel.next(now);
        assert!(!carousel.mount(1, items(3), now));
        assert_eq!(carousel.active_index(), 1);
    }

    #[test]
    fn stale_error_reports_are_dropped() {
        let now = Instant::now();
        let mut carousel = mounted(2, now);
        carousel.mount(2, items(2), now);
        assert!(!carousel.mark_errored(1, 0));
        assert!(!carousel.is_errored(0));
        assert!(carousel.mark_errored(2, 0));
        assert!(!carousel.mark_loaded(1, 1));
        assert!(carousel.mark_loaded(2, 1));
        assert!(carousel.is_loaded(1));
    }

    #[test]
    fn errored_item_is_viewed_as_unavailable() {
        let now = Instant::now();
        let mut carousel = mounted(2, now);
        carousel.mark_errored(1, 0);
        let view = carousel.active_view().unwrap();
        assert!(view.errored);
        assert_eq!(
            view.item.availability,
            crate::media::Availability::RemotePossiblyRestricted
        );
        assert!(view.item.display_url().is_none());
        assert!(view.item.original_url().is_some());
    }

    #[test]
    fn swipes_and_keys_map_to_navigation() {
        let now = Instant::now();
        let mut carousel = mounted(3, now);
        assert!(carousel.handle_swipe(Swipe::Left, now));
        assert_eq!(carousel.active_index(), 1);
        assert!(carousel.handle_swipe(Swipe::Right, now));
        assert_eq!(carousel.active_index(), 0);
        assert!(carousel.handle_key(CarouselKey::Previous, now));
        assert_eq!(carousel.active_index(), 2);
    }

    #[test]
    fn manual_navigation_restarts_interval() {
        let start = Instant::now();
        let mut carousel = mounted(3, start);
        carousel.next(start + Duration::from_secs(6));
        assert!(!carousel.tick(start + Duration::from_secs(9)));
        assert!(carousel.tick(start + Duration::from_secs(14)));
        assert_eq!(carousel.active_index(), 2);
    }

    #[test]
    fn disposed_carousel_is_inert() {
        let start = Instant::now();
        let mut carousel = mounted(3, start);
        carousel.dispose();
        assert!(!carousel.tick(start + INTERVAL * 4));
        assert!(!carousel.mount(5, items(2), start));
        assert!(carousel.owner().is_none());
    }

    #[test]
    fn unmounted_carousel_stops_advancing_and_can_remount() {
        let start = Instant::now();
        let mut carousel = mounted(3, start);
        carousel.unmount();
        assert!(carousel.owner().is_none());
        assert!(carousel.is_empty());
        assert!(carousel.next_deadline().is_none());
        assert!(!carousel.tick(start + INTERVAL * 2));
        assert!(!carousel.mark_errored(1, 0));
        assert!(!carousel.is_disposed());
        assert!(carousel.mount(1, items(2), start));
        assert!(carousel.tick(start + INTERVAL));
    }

    #[test]
    fn gradient_is_deterministic() {
        assert_eq!(fallback_gradient(7), 1);
        assert_eq!(fallback_gradient(-1), GRADIENT_COUNT - 1);
        assert_eq!(fallback_gradient(12), fallback_gradient(12));
    }

    #[test]
    fn jump_to_ignores_out_of_range() {
        let now = Instant::now();
        let mut carousel = mounted(3, now);
        assert!(!carousel.jump_to(7, now));
        assert!(carousel.jump_to(2, now));
        assert_eq!(carousel.active_index(), 2);
    }
}
