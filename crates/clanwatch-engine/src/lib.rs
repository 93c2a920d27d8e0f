//! `clanwatch-engine` drives the async side of clanwatch: fetching rosters
//! with retries, the wall-clock scheduler, and the stats and officer
//! pipelines that sit on top of the `clanwatch-core` domain.
//!
//! ```text
//! Scheduler ──► StatsJob   ──► RetryingSource ─► SnapshotStore ─► Notifier
//!           └─► OfficerJob ──► RetryingSource ─► Watchdog      ─► Notifier
//! ```

pub mod error;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod source;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use error::EngineError;
pub use pipeline::{Context, OfficerJob, StatsJob};
pub use scheduler::{Clock, Job, Scheduler, SystemClock};

/// Schedule both pipelines and wait until `cancel` stops them.
pub async fn run_daemon(ctx: Arc<Context>, cancel: CancellationToken) -> Result<(), EngineError> {
    let scheduler = Scheduler::new(
        ctx.config.schedule.offset()?,
        ctx.clock.clone(),
        cancel.clone(),
    );
    let handles = [
        scheduler.spawn(Arc::new(StatsJob(ctx.clone())))?,
        scheduler.spawn(Arc::new(OfficerJob(ctx)))?,
    ];
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "job loop ended abnormally");
        }
    }
    Ok(())
}
