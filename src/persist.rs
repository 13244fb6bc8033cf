use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` through a temporary sibling and rename it over the target,
/// creating parent directories as needed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let tmp = temp_sibling(path);
    let mut file = File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    if let Err(e) = write(&mut file).and_then(|_| file.sync_all().map_err(Into::into)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    drop(file);
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to move {} into place", tmp.display()));
    }
    Ok(())
}
