use anyhow::Context;
use clanwatch_core::config::WarnLevel;
use clanwatch_engine::{run_daemon, Context as Pipelines};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let ctx = super::open_context(root)?;
    let errors: Vec<String> = ctx
        .config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }

    tracing::info!(clan_id = %ctx.config.clan_id, "clanwatch starting");
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(serve(Arc::new(ctx)))
}

async fn serve(ctx: Arc<Pipelines>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut daemon = tokio::spawn(run_daemon(ctx, cancel.clone()));

    tokio::select! {
        res = &mut daemon => {
            res.context("scheduler task failed")??;
            return Ok(());
        }
        sig = tokio::signal::ctrl_c() => {
            sig.context("failed to listen for ctrl-c")?;
        }
    }

    tracing::info!("shutting down");
    cancel.cancel();
    daemon.await.context("scheduler task failed")??;
    Ok(())
}
