//! Persisting vfio-pci device ids across reboots.
//!
//! modprobe reads `options vfio-pci ids=<vendor:device>,...` at boot and
//! hands every listed id to vfio-pci before any other driver can claim it.

use crate::error::{AutoVfioError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::{debug, info};

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// What [`persist_vfio_id`] did to the options file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The id was already listed.
    AlreadyPresent,
    /// The id was appended to an existing `options vfio-pci ids=` line.
    Appended,
    /// A new `options vfio-pci ids=` line was added.
    LineAdded,
}

/// Merge `id` (`vendor:device`) into modprobe options content.
///
/// Returns `None` when a non-comment line already mentions the id.
/// Otherwise the id is appended to the first `options vfio-pci ids=...`
/// line, or a new such line is added at the end. All other lines are kept
/// verbatim and in order.
pub fn merge_vfio_id(content: &str, id: &str) -> Option<(String, PersistOutcome)> {
    let already_listed = content
        .lines()
        .any(|line| !line.trim_start().starts_with('#') && line.contains(id));
    if already_listed {
        return None;
    }

    let mut merged = String::with_capacity(content.len() + id.len() + 32);
    let mut outcome = PersistOutcome::LineAdded;

    for line in content.lines() {
        if outcome == PersistOutcome::LineAdded {
            if let Some(rewritten) = append_to_options_line(line, id) {
                merged.push_str(&rewritten);
                merged.push('\n');
                outcome = PersistOutcome::Appended;
                continue;
            }
        }
        merged.push_str(line);
        merged.push('\n');
    }

    if outcome == PersistOutcome::LineAdded {
        merged.push_str(&format!("options vfio-pci ids={}\n", id));
    }

    Some((merged, outcome))
}

/// Rewrite `options vfio-pci ids=a,b [extra...]` as `... ids=a,b,<id> [extra...]`.
fn append_to_options_line(line: &str, id: &str) -> Option<String> {
    let parts: Vec<&str> = WHITESPACE_REGEX.split(line.trim()).collect();
    if parts.len() < 3 || parts[0] != "options" || parts[1] != "vfio-pci" {
        return None;
    }
    let ids = parts[2].strip_prefix("ids=")?;

    let mut list: Vec<&str> = ids.split(',').filter(|s| !s.is_empty()).collect();
    list.push(id);

    let mut rewritten = format!("options vfio-pci ids={}", list.join(","));
    for extra in &parts[3..] {
        rewritten.push(' ');
        rewritten.push_str(extra);
    }
    Some(rewritten)
}

/// Add `id` to the modprobe options file at `path`, creating it if needed.
///
/// The new content replaces the old in place and the file is truncated to
/// the new length, so a shorter result never leaves stale bytes behind.
pub fn persist_vfio_id(path: &Path, id: &str) -> Result<PersistOutcome> {
    let persistence = |source| AutoVfioError::Persistence { path: path.to_path_buf(), source };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o644)
        .open(path)
        .map_err(persistence)?;

    let mut content = String::new();
    file.read_to_string(&mut content).map_err(persistence)?;

    let Some((merged, outcome)) = merge_vfio_id(&content, id) else {
        debug!(path = %path.display(), id = %id, "Device id already persisted");
        return Ok(PersistOutcome::AlreadyPresent);
    };

    file.seek(SeekFrom::Start(0)).map_err(persistence)?;
    file.write_all(merged.as_bytes()).map_err(persistence)?;
    file.set_len(merged.len() as u64).map_err(persistence)?;
    file.sync_all().map_err(persistence)?;

    info!(path = %path.display(), id = %id, ?outcome, "Persisted device id for vfio-pci");
    Ok(outcome)
}
