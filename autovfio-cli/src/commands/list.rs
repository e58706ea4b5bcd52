//! `auto-vfio list` command

use anyhow::{Context, Result};
use autovfio_core::vfio::enumerate_devices;
use autovfio_core::{render_listing, Config, ListOptions, OutputFormat};
use tracing::debug;

/// Print every PCI device, grouped by IOMMU group.
///
/// Flags win over the `list` section of the config file.
pub fn list(
    config: &Config,
    tree: bool,
    output: Option<OutputFormat>,
    query: Option<String>,
) -> Result<()> {
    let options = ListOptions {
        tree: tree || config.list.tree,
        format: output.or(config.list.output),
        query: query.or_else(|| config.list.query.clone()),
    };

    let devices = enumerate_devices(&config.paths).context("Failed to enumerate PCI devices")?;
    debug!(devices = devices.len(), format = ?options.format, tree = options.tree, "Listing devices");

    let text = render_listing(&devices, &options)?;
    print!("{}", text);
    Ok(())
}
