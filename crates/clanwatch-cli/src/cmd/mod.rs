pub mod compare;
pub mod config;
pub mod init;
pub mod run;
pub mod schedule;
pub mod snapshot;
pub mod stats;
pub mod track;
pub mod watchdog;

use anyhow::Context as _;
use clanwatch_core::config::Config;
use clanwatch_core::paths;
use clanwatch_core::store::RedbStore;
use clanwatch_engine::Context;
use std::future::Future;
use std::path::Path;

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

pub(crate) fn open_store(root: &Path) -> anyhow::Result<RedbStore> {
    let path = paths::state_db_path(root);
    RedbStore::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

pub(crate) fn open_context(root: &Path) -> anyhow::Result<Context> {
    let config = load_config(root)?;
    Context::open(root, config).context("failed to open state store")
}

pub(crate) fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}
