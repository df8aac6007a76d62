use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Local timer that interpolates the displayed position between
/// authoritative updates.
///
/// The ticker owns a single interval slot. Restarting replaces whatever was
/// in the slot, so there is never more than one live interval per ticker.
#[derive(Debug)]
pub struct ProgressTicker {
    period: Duration,
    interval: Option<Interval>,
    restarts: u64,
}

impl ProgressTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
            restarts: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cancels any running interval and starts a fresh one whose first tick
    /// is one full period from now.
    pub fn restart(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.restarts += 1;
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    /// Cancel-then-optionally-start, the only way authoritative updates
    /// touch the ticker.
    pub fn reset(&mut self, playing: bool) {
        self.cancel();
        if playing {
            self.restart();
        }
    }

    pub fn is_live(&self) -> bool {
        self.interval.is_some()
    }

    /// Number of intervals started over the ticker's lifetime.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Completes at the next tick. Never completes while cancelled.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
