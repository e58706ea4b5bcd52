//! `auto-vfio rebind` command

use anyhow::Result;
use autovfio_core::elevate::ensure_elevated;
use autovfio_core::vfio::{RebindOptions, VfioManager};
use autovfio_core::Config;
use std::path::Path;

/// Move the given devices to vfio-pci, re-running under sudo when needed.
///
/// Per-device failures are logged by the manager and do not fail the
/// command. `config_file` is handed to the elevated child when the config
/// was not given with `--config`.
pub async fn rebind(
    config: &Config,
    config_file: Option<&Path>,
    buses: &[String],
    persist: bool,
) -> Result<()> {
    ensure_elevated(config_file)?;

    let options = RebindOptions { persist: persist || config.rebind.persist, timeout: config.timeout() };
    let manager = VfioManager::new(&config.paths, options);
    manager.rebind_devices(buses).await;
    Ok(())
}
