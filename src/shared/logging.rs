use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn engine_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/engine.log")
}

/// Best-effort append; orchestration decisions never fail on logging errors.
pub fn append_engine_log(state_root: &Path, line: &str) {
    let _ = try_append(state_root, line);
}

fn try_append(state_root: &Path, line: &str) -> std::io::Result<()> {
    let path = engine_log_path(state_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    writeln!(file, "{line}")
}
