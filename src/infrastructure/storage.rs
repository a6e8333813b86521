use std::fs;
use std::path::{Path, PathBuf};

pub fn resolve_data_dir(configured: &Path) -> std::io::Result<PathBuf> {
    let data_dir = if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        std::env::current_dir()?.join(configured)
    };
    ensure_dir(&data_dir)?;
    Ok(data_dir)
}

pub fn ensure_pending_dir(data_dir: &Path) -> std::io::Result<PathBuf> {
    let pending_dir = data_dir.join("pending");
    ensure_dir(&pending_dir)?;
    Ok(pending_dir)
}

pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("auditdash.db")
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
