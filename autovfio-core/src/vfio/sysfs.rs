//! Kernel control-file access.
//!
//! Writes to sysfs control files can block inside the driver core for a long
//! time (a GPU driver refusing to let go, for example). The timeout variant
//! only bounds how long the caller waits: the write itself keeps running on
//! its own thread and may still land after the deadline.

use crate::error::{AutoVfioError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Write `value` plus a newline to a control file.
///
/// The file must already exist; it is opened write-only, never created or
/// truncated, and written with a single call.
pub fn write_control_file(path: &Path, value: &str) -> Result<()> {
    fs::metadata(path).map_err(|e| AutoVfioError::io(path, e))?;

    let mut file =
        OpenOptions::new().write(true).open(path).map_err(|e| AutoVfioError::io(path, e))?;
    file.write_all(format!("{}\n", value).as_bytes()).map_err(|e| AutoVfioError::io(path, e))?;

    Ok(())
}

/// Write to a control file, giving up on waiting after `timeout`.
///
/// A [`AutoVfioError::Timeout`] means the outcome is unknown, not that the
/// write did not happen.
pub async fn write_control_file_timeout(path: &Path, value: &str, timeout: Duration) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    let target = path.to_path_buf();
    let data = value.to_string();

    std::thread::Builder::new()
        .name("sysfs-write".to_string())
        .spawn(move || {
            let result = write_control_file(&target, &data);
            // Receiver is gone once the caller timed out.
            let _ = tx.send(result);
        })
        .map_err(|e| AutoVfioError::io(path, e))?;

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AutoVfioError::Internal(format!(
            "writer thread for {} exited without reporting",
            path.display()
        ))),
        Err(_) => {
            warn!(path = %path.display(), ?timeout, "Control file write timed out");
            Err(AutoVfioError::Timeout { path: path.to_path_buf(), timeout })
        }
    }
}

/// Read a value from a sysfs file, trimmed.
pub fn read_sysfs_value(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AutoVfioError::io(path, e))
}

/// Read a hex id attribute (`0x10de\n`) as bare lowercase hex (`10de`).
pub fn read_hex_id(path: &Path) -> Result<String> {
    let value = read_sysfs_value(path)?;
    Ok(value.trim_start_matches("0x").to_lowercase())
}

/// Basename of a symlink's target (`.../drivers/nouveau` -> `nouveau`).
pub fn read_link_name(link: &Path) -> Result<String> {
    let target = fs::read_link(link).map_err(|e| AutoVfioError::io(link, e))?;
    target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| AutoVfioError::Internal(format!("link {} has no target name", link.display())))
}

/// File types accepted by [`list_entries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dir,
    File,
    Symlink,
}

impl FileKind {
    fn matches(self, file_type: fs::FileType) -> bool {
        match self {
            FileKind::Dir => file_type.is_dir(),
            FileKind::File => file_type.is_file(),
            FileKind::Symlink => file_type.is_symlink(),
        }
    }
}

/// Walk `root` and return every entry of the requested kind.
///
/// The root itself is included and entries are visited in lexical order.
/// Symlinks are never descended into. When `kind` is not
/// [`FileKind::Symlink`], a symlink is resolved one level and its target is
/// returned if the target has the requested type.
pub fn list_entries(root: &Path, kind: FileKind) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(root, kind, &mut found)?;
    debug!(root = %root.display(), ?kind, found = found.len(), "Listed sysfs entries");
    Ok(found)
}

fn walk(path: &Path, kind: FileKind, found: &mut Vec<PathBuf>) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| AutoVfioError::io(path, e))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() && kind != FileKind::Symlink {
        let resolved = fs::canonicalize(path).map_err(|e| AutoVfioError::io(path, e))?;
        let target = fs::metadata(&resolved).map_err(|e| AutoVfioError::io(&resolved, e))?;
        if kind.matches(target.file_type()) {
            found.push(resolved);
        }
    } else if kind.matches(file_type) {
        found.push(path.to_path_buf());
    }

    if file_type.is_dir() {
        let mut children = fs::read_dir(path)
            .map_err(|e| AutoVfioError::io(path, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| AutoVfioError::io(path, e))?;
        children.sort();
        for child in children {
            walk(&child, kind, found)?;
        }
    }

    Ok(())
}
