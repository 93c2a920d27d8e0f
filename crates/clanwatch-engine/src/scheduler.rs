//! Wall-clock job scheduler.
//!
//! Each job runs on its own task: compute the delay to the soonest target,
//! sleep, run, repeat. The delay is recomputed from the clock after every
//! run, so a slow run never shifts later fires. A job that returns an error
//! or panics is logged and re-armed like any other. The loop exits only when
//! its [`CancellationToken`] is cancelled.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use clanwatch_core::schedule::{next_fire, ScheduleTarget};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    fn targets(&self) -> Vec<ScheduleTarget>;

    /// `target` is the index into [`Job::targets`] that fired.
    async fn run(&self, target: usize) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(offset: FixedOffset, clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self {
            offset,
            clock,
            cancel,
        }
    }

    /// Validate the job's targets and start its loop.
    pub fn spawn(&self, job: Arc<dyn Job>) -> Result<JoinHandle<()>, EngineError> {
        let targets = job.targets();
        let (_, first) = next_fire(&targets, self.clock.now(), self.offset)?;
        tracing::info!(job = job.name(), first_fire = %first.with_timezone(&self.offset), "job scheduled");

        let offset = self.offset;
        let clock = self.clock.clone();
        let cancel = self.cancel.clone();
        Ok(tokio::spawn(async move {
            run_loop(job, targets, offset, clock, cancel).await;
        }))
    }
}

async fn run_loop(
    job: Arc<dyn Job>,
    targets: Vec<ScheduleTarget>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    let mut last_fire: Option<DateTime<Utc>> = None;
    loop {
        // A timer that wakes a hair early must not fire the same target twice.
        let now = clock.now();
        let from = last_fire.map_or(now, |at| at.max(now));
        let (idx, at) = match next_fire(&targets, from, offset) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(job = job.name(), error = %e, "cannot schedule job, stopping");
                return;
            }
        };
        let delay = (at - now).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(job = job.name(), next_fire = %at.with_timezone(&offset), ?delay, "job armed");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job = job.name(), "job loop stopped");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        last_fire = Some(at);

        let started = tokio::time::Instant::now();
        let outcome = AssertUnwindSafe(job.run(idx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(EngineError::Panicked(panic_message(&*panic))));
        match outcome {
            Ok(()) => tracing::info!(job = job.name(), elapsed = ?started.elapsed(), "job finished"),
            Err(e) => tracing::error!(job = job.name(), error = %e, "job failed"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
