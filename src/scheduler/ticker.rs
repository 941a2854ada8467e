use std::future::Future;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

/// A recurring trigger for ingestion cycles.
///
/// `tick` resolves when the next cycle should start. Firings that would have
/// happened while the caller was busy are dropped, never queued.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

/// Fires immediately, then every `period`, on the tokio clock.
///
/// Pausing tokio's clock in tests (`start_paused = true`) makes the ticker
/// fully deterministic.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// # Panics
    ///
    /// If `period` is zero. Intervals from [`crate::util::parse_interval`] are
    /// always positive.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
