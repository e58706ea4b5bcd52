//! Re-running the current command with root privileges.

use crate::error::{AutoVfioError, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Whether the process runs as root.
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Whether `sudo` will run without asking for a password.
fn has_passwordless_sudo() -> bool {
    Command::new("sudo")
        .args(["-n", "true"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Arguments for the elevated child.
///
/// sudo resets the environment, so a config file found through
/// `AUTO_VFIO_CONFIG` or discovery is passed explicitly with `--config`.
fn elevated_args(args: Vec<String>, config_file: Option<&Path>) -> Vec<OsString> {
    let mut out = Vec::with_capacity(args.len() + 2);
    if let Some(path) = config_file {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        out.push(OsString::from("--config"));
        out.push(path.into_os_string());
    }
    out.extend(args.into_iter().map(OsString::from));
    out
}

/// Make sure the rest of the command runs as root.
///
/// Returns immediately when already root. Otherwise re-runs the current
/// executable with the same arguments under `sudo`, inheriting stdio, waits
/// for it, and exits this process with the child's exit code.
///
/// `config_file` is the config the caller loaded without an explicit
/// `--config` flag, if any.
pub fn ensure_elevated(config_file: Option<&Path>) -> Result<()> {
    if is_elevated() {
        debug!("Already running as root");
        return Ok(());
    }

    if !has_passwordless_sudo() {
        println!("This operation requires elevated privileges. Requesting sudo...");
    }

    let exe = std::env::current_exe().map_err(|e| AutoVfioError::Elevation {
        reason: format!("failed to get executable path: {}", e),
    })?;
    let args = elevated_args(std::env::args().skip(1).collect(), config_file);

    info!(exe = %exe.display(), "Re-running with sudo");
    let status = Command::new("sudo")
        .arg(&exe)
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| AutoVfioError::Elevation { reason: format!("sudo execution failed: {}", e) })?;

    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_elevated_args_unchanged_without_config() {
        let out = elevated_args(args(&["rebind", "-b", "0000:07:00.0"]), None);
        assert_eq!(out, vec!["rebind", "-b", "0000:07:00.0"]);
    }

    #[test]
    fn test_elevated_args_carry_discovered_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        std::fs::write(&config, "timeout_ms: 500\n").unwrap();

        let out = elevated_args(args(&["rebind", "-b", "0000:07:00.0"]), Some(&config));

        let expected = std::fs::canonicalize(&config).unwrap();
        assert_eq!(out[0], "--config");
        assert_eq!(Path::new(&out[1]), expected.as_path());
        assert_eq!(&out[2..], &["rebind", "-b", "0000:07:00.0"]);
    }
}
