//! Pass Scheduling
//!
//! A [`Scheduler`] decides when the engine starts a pass. Production uses
//! [`IntervalScheduler`] (fires immediately, then every poll interval);
//! tests use [`ManualScheduler`] to fire passes on demand.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Source of pass triggers
#[async_trait]
pub trait Scheduler: Send {
    /// Wait for the next trigger. Returns `false` once the schedule is over.
    async fn tick(&mut self) -> bool;
}

/// Fixed-interval schedule backed by a tokio interval
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    /// The first tick completes immediately
    pub fn new(period: Duration) -> Self {
        // tokio panics on a zero period
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Schedule driven by an explicit [`ManualTrigger`]
pub struct ManualScheduler {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Handle that fires a [`ManualScheduler`]. Dropping every trigger ends the
/// schedule.
#[derive(Clone)]
pub struct ManualTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualScheduler {
    pub fn new() -> (Self, ManualTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTrigger { tx })
    }
}

impl ManualTrigger {
    /// Request a pass. Returns `false` if the scheduler is gone.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interval_first_tick_is_immediate() {
        let mut scheduler = IntervalScheduler::new(Duration::from_secs(3600));
        let ticked = tokio::time::timeout(Duration::from_secs(1), scheduler.tick()).await;
        assert!(matches!(ticked, Ok(true)));
        assert_eq!(scheduler.period(), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_interval_repeats() {
        let mut scheduler = IntervalScheduler::new(Duration::from_millis(50));
        assert!(scheduler.tick().await);

        let start = tokio::time::Instant::now();
        assert!(scheduler.tick().await);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_manual_scheduler() {
        let (mut scheduler, trigger) = ManualScheduler::new();
        assert!(trigger.fire());
        assert!(scheduler.tick().await);

        drop(trigger);
        assert!(!scheduler.tick().await);
    }
}
