#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    /// Finger travelled right to left.
    Left,
    /// Finger travelled left to right.
    Right,
}

/// Turns a press/release pair into a horizontal swipe. Drags that are
/// mostly vertical or shorter than the threshold are ignored.
#[derive(Debug, Clone)]
pub struct SwipeTracker {
    threshold_px: f64,
    origin: Option<(f64, f64)>,
}

impl SwipeTracker {
    pub fn new(threshold_px: f64) -> Self {
        Self {
            threshold_px: threshold_px.max(1.0),
            origin: None,
        }
    }

    pub fn begin(&mut self, x: f64, y: f64) {
        self.origin = Some((x, y));
    }

    pub fn is_tracking(&self) -> bool {
        self.origin.is_some()
    }

    pub fn cancel(&mut self) {
        self.origin = None;
    }

    pub fn end(&mut self, x: f64, y: f64) -> Option<Swipe> {
        let (start_x, start_y) = self.origin.take()?;
        let dx = x - start_x;
        let dy = y - start_y;
        if dy.abs() > dx.abs() || dx.abs() < self.threshold_px {
            return None;
        }
        if dx < 0.0 {
            Some(Swipe::Left)
        } else {
            Some(Swipe::Right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_drag_past_threshold_is_a_swipe() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(200.0, 100.0);
        assert_eq!(tracker.end(120.0, 110.0), Some(Swipe::Left));
        tracker.begin(100.0, 100.0);
        assert_eq!(tracker.end(151.0, 100.0), Some(Swipe::Right));
    }

    #[test]
    fn short_or_vertical_drags_are_ignored() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(100.0, 100.0);
        assert_eq!(tracker.end(130.0, 100.0), None);
        tracker.begin(100.0, 100.0);
        assert_eq!(tracker.end(170.0, 190.0), None);
    }

    #[test]
    fn release_without_press_does_nothing() {
        let mut tracker = SwipeTracker::new(50.0);
        assert_eq!(tracker.end(0.0, 0.0), None);
        tracker.begin(0.0, 0.0);
        tracker.cancel();
        assert_eq!(tracker.end(300.0, 0.0), None);
    }
}
