//! Scheduler: fires the progression pipeline at a fixed cadence.
//!
//! An explicit instance owned by the composition root — no module-level
//! state. `Stopped -> Running -> Stopped`; stopping cancels future firings
//! without interrupting an in-flight cycle. A cycle lock guarantees two
//! cycles never run concurrently, whether timer-fired or manual.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{CycleReport, Pipeline, ProgressionStats};

/// Snapshot of the scheduler for operational introspection.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub cadence: Duration,
    pub stats: ProgressionStats,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    cadence: Duration,
    /// `Some` while running, holding the shutdown handle of the current
    /// timer task. Each run gets a fresh `Notify`, so a stop signal meant
    /// for one run can never leak into the next. Only `start` and `stop`
    /// write this slot; the timer task never touches it, so its exit order
    /// relative to a restart is irrelevant.
    run: StdMutex<Option<Arc<Notify>>>,
    /// Serializes cycles: the timer task and `trigger_now` both take this
    /// before running the pipeline.
    cycle_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, cadence: Duration) -> Self {
        Self {
            pipeline,
            cadence,
            run: StdMutex::new(None),
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Begin firing the pipeline every `cadence`. No-op if already running.
    ///
    /// The first firing happens one full cadence after start, matching the
    /// source system's cron behavior. An over-running cycle delays the next
    /// tick instead of overlapping it.
    pub fn start(&self) {
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        if run.is_some() {
            return;
        }
        let shutdown = Arc::new(Notify::new());
        *run = Some(Arc::clone(&shutdown));
        drop(run);

        let pipeline = Arc::clone(&self.pipeline);
        let cycle_lock = Arc::clone(&self.cycle_lock);
        let cadence = self.cadence;

        info!(cadence_secs = cadence.as_secs(), "scheduler started");

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + cadence;
            let mut interval = tokio::time::interval_at(start, cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        // stop() already performed the Running -> Stopped
                        // transition; this task just winds down.
                        info!("scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        // The cycle runs to completion here; stop() only
                        // prevents the next tick from firing.
                        let _guard = cycle_lock.lock().await;
                        let report = pipeline.run_cycle(Utc::now()).await;
                        if report.advanced > 0 {
                            info!(
                                eligible = report.eligible,
                                advanced = report.advanced,
                                digests_sent = report.digests_sent,
                                "cycle complete"
                            );
                        }
                    }
                }
            }
        });
    }

    /// Cancel future firings. Does not interrupt an in-flight cycle.
    /// No-op if not running.
    pub fn stop(&self) {
        let shutdown = self.run.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(shutdown) = shutdown {
            shutdown.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Run state plus fresh eligibility statistics (side-effect-free scan).
    /// A store failure degrades to empty stats rather than an error.
    pub async fn status(&self) -> SchedulerStatus {
        let stats = match self.pipeline.stats(Utc::now()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("stats scan failed: {e}");
                ProgressionStats::default()
            }
        };

        SchedulerStatus {
            running: self.is_running(),
            cadence: self.cadence,
            stats,
        }
    }

    /// Run one cycle immediately, independent of the timer. Safe to call
    /// concurrently with a scheduled firing: the cycle lock serializes them.
    pub async fn trigger_now(&self) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        self.pipeline.run_cycle(Utc::now()).await
    }
}
