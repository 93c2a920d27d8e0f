use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CLANWATCH_DIR: &str = ".clanwatch";
pub const CONFIG_FILE: &str = ".clanwatch/config.yaml";
pub const STATE_DB: &str = ".clanwatch/state.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn clanwatch_dir(root: &Path) -> PathBuf {
    root.join(CLANWATCH_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_db_path(root: &Path) -> PathBuf {
    root.join(STATE_DB)
}
