use clanwatch_core::paths::CLANWATCH_DIR;
use std::path::{Path, PathBuf};

/// Resolve the clanwatch root directory.
///
/// Priority:
/// 1. `--root` flag / `CLANWATCH_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `start` looking for `.clanwatch/`
/// 3. Fall back to `start`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(CLANWATCH_DIR).is_dir())
        .unwrap_or(start)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_clanwatch_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(CLANWATCH_DIR)).unwrap();
        let deep = dir.path().join("a/b");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_root_from(&deep), dir.path());
    }

    #[test]
    fn falls_back_to_start() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_root_from(dir.path()), dir.path());
    }
}
