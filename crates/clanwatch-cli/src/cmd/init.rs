use anyhow::Context;
use clanwatch_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, clan: Option<&str>) -> anyhow::Result<()> {
    let clan_id = match clan {
        Some(id) => id.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clan".to_string()),
    };

    println!("Initializing clanwatch in: {}", root.display());

    let dir = paths::clanwatch_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::new(&clan_id)
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {} (clan_id: {clan_id})", paths::CONFIG_FILE);
    }

    let existed = paths::state_db_path(root).exists();
    super::open_store(root)?;
    if existed {
        println!("  exists:  {}", paths::STATE_DB);
    } else {
        println!("  created: {}", paths::STATE_DB);
    }

    Ok(())
}
