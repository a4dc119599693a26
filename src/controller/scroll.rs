use std::time::Duration;
use tokio::time::Instant;

/// Where the article list is scrolled to, in rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollViewport {
    /// First visible row
    pub offset: usize,
    /// Rows that fit on screen
    pub visible: usize,
    /// Rows in the list
    pub content: usize,
}

impl ScrollViewport {
    /// Rows below the bottom edge of the viewport
    pub fn remaining(&self) -> usize {
        self.content
            .saturating_sub(self.offset.saturating_add(self.visible))
    }
}

/// Decides when scrolling should ask for the next page.
///
/// Observations are throttled to one per `min_interval`; an observation that
/// gets through fires when fewer than `threshold_rows` rows remain below the
/// viewport. Whether a load actually starts is up to the controller.
#[derive(Debug)]
pub struct InfiniteScrollTrigger {
    threshold_rows: usize,
    min_interval: Duration,
    last_observed: Option<Instant>,
}

impl InfiniteScrollTrigger {
    pub fn new(threshold_rows: usize, min_interval: Duration) -> Self {
        Self {
            threshold_rows,
            min_interval,
            last_observed: None,
        }
    }

    pub fn observe(&mut self, viewport: ScrollViewport, now: Instant) -> bool {
        if let Some(last) = self.last_observed {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_observed = Some(now);
        viewport.remaining() < self.threshold_rows
    }

    /// Forget the throttle window, e.g. after the list was replaced
    pub fn reset(&mut self) {
        self.last_observed = None;
    }
}
