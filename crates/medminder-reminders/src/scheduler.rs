use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use medminder_types::clock::Clock;

use crate::matcher::ReminderMatcher;
use crate::report::SweepReport;

/// Owns the minute loop that drives [`ReminderMatcher`] sweeps.
///
/// Sweeps are serialized: a scheduled tick or a
/// [`trigger_now`](Self::trigger_now) call that finds a sweep in progress
/// waits its turn. Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    matcher: ReminderMatcher,
    clock: Arc<dyn Clock>,
    /// Held for the duration of every sweep. Stores the last minute swept by
    /// a scheduled tick.
    sweep: tokio::sync::Mutex<Option<String>>,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReminderScheduler {
    pub fn new(matcher: ReminderMatcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                matcher,
                clock,
                sweep: tokio::sync::Mutex::new(None),
                running: Mutex::new(None),
            }),
        }
    }

    /// Spawn the minute loop. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.clone(), cancel.clone()));
        *running = Some(RunningLoop { cancel, handle });
        info!("Reminder scheduler started");
        true
    }

    /// Cancel the loop and wait for an in-flight sweep to finish.
    pub async fn stop(&self) {
        let running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("Reminder scheduler loop ended abnormally: {}", e);
        }
        info!("Reminder scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Sweep immediately at the clock's current time, after any sweep
    /// already in progress.
    pub async fn trigger_now(&self) -> SweepReport {
        let _guard = self.inner.sweep.lock().await;
        let now = self.inner.clock.now();
        info!("Manual reminder sweep at {}", now);
        self.inner.matcher.run_sweep(now).await
    }

    /// One scheduled tick. The minute is fixed when the tick fires; if another
    /// sweep is running the tick queues behind it and then sweeps that minute.
    /// Returns `None` when this minute was already swept by a scheduled tick.
    pub async fn tick(&self) -> Option<SweepReport> {
        let now = self.inner.clock.now();
        let mut last_minute = match self.inner.sweep.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Reminder sweep in progress; tick for {} queued", now.format("%H:%M"));
                self.inner.sweep.lock().await
            }
        };

        let minute = now.format("%Y-%m-%d %H:%M").to_string();
        if last_minute.as_deref() == Some(minute.as_str()) {
            debug!("Minute {} already swept; skipping tick", minute);
            return None;
        }

        let report = self.inner.matcher.run_sweep(now).await;
        *last_minute = Some(minute);
        Some(report)
    }
}

async fn run_loop(scheduler: ReminderScheduler, cancel: CancellationToken) {
    loop {
        let delay = until_next_minute(scheduler.inner.clock.now());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        scheduler.tick().await;
    }
}

fn until_next_minute(now: DateTime<FixedOffset>) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond().min(999_999_999)));
    Duration::from_secs(60).saturating_sub(into_minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_minute_delay() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let at = |s| tz.with_ymd_and_hms(2024, 1, 1, 8, 0, s).unwrap();
        assert_eq!(until_next_minute(at(0)), Duration::from_secs(60));
        assert_eq!(until_next_minute(at(45)), Duration::from_secs(15));
        let nearly = at(59) + chrono::Duration::milliseconds(900);
        assert_eq!(until_next_minute(nearly), Duration::from_millis(100));
    }
}
