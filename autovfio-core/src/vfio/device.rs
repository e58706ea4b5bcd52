//! PCI device records read from sysfs.

use crate::error::{AutoVfioError, Result};
use crate::paths::SysfsLayout;
use crate::vfio::ids::PciIds;
use crate::vfio::sysfs::{list_entries, read_hex_id, read_link_name, FileKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Regular expression to validate PCI address format: 0000:01:00.0
///
/// The domain is at least four digits; VMD domains print as `10000`.
static PCI_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{4,}:[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7]$")
        .expect("Invalid PCI address regex")
});

/// VFIO-PCI driver name.
pub const VFIO_PCI_DRIVER: &str = "vfio-pci";

/// One PCI function as seen at enumeration time.
///
/// `kernel_driver` is a snapshot; nothing stops the binding from changing
/// before a rebind acts on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PciDevice {
    /// PCI address (e.g., "0000:07:00.0")
    pub bus: String,
    /// Vendor ID (e.g., "10de" for NVIDIA)
    pub vendor_id: String,
    /// Device ID (e.g., "1eb8")
    pub device_id: String,
    pub vendor_name: String,
    pub device_name: String,
    /// Class and subclass code (e.g., "0300")
    pub class: String,
    /// Class name (e.g., "VGA compatible controller")
    pub device_class: String,
    pub revision: String,
    /// Current driver, empty if unbound
    pub kernel_driver: String,
    /// IOMMU group ID, empty if IOMMU is off
    pub iommu_group: String,
}

impl PciDevice {
    /// Read a device from its sysfs directory.
    pub fn from_sysfs(layout: &SysfsLayout, address: &str, ids: &PciIds) -> Result<Self> {
        if !is_valid_pci_address(address) {
            return Err(AutoVfioError::InvalidPciAddress { address: address.to_string() });
        }

        let sysfs_path = layout.device_dir(address);
        let vendor_id = read_hex_id(&sysfs_path.join("vendor"))?;
        let device_id = read_hex_id(&sysfs_path.join("device"))?;
        // 0x030000 -> 0300, dropping the programming interface byte
        let class_code = read_hex_id(&sysfs_path.join("class"))?;
        let class = class_code.get(..4).unwrap_or(&class_code).to_string();
        let revision = read_hex_id(&sysfs_path.join("revision")).unwrap_or_default();

        let kernel_driver = read_optional_link(&sysfs_path.join("driver"));
        let iommu_group = read_optional_link(&sysfs_path.join("iommu_group"));

        debug!(
            address = %address,
            vendor = %vendor_id,
            device = %device_id,
            driver = %kernel_driver,
            iommu_group = %iommu_group,
            "Read PCI device info"
        );

        Ok(Self {
            bus: address.to_string(),
            vendor_name: ids.vendor_name(&vendor_id),
            device_name: ids.device_name(&vendor_id, &device_id),
            device_class: ids.class_name(&class),
            vendor_id,
            device_id,
            class,
            revision,
            kernel_driver,
            iommu_group,
        })
    }
}

/// Validate PCI address format.
pub fn is_valid_pci_address(address: &str) -> bool {
    PCI_ADDRESS_REGEX.is_match(address)
}

/// Enumerate every PCI device the kernel exposes, sorted by bus address.
///
/// Devices whose attributes cannot be read are skipped with a warning.
pub fn enumerate_devices(layout: &SysfsLayout) -> Result<Vec<PciDevice>> {
    let root = &layout.pci_devices;
    let ids = PciIds::load(&layout.pci_ids);

    // Entries are links into the device tree; the walk resolves them.
    let mut addresses: Vec<String> = list_entries(root, FileKind::Dir)?
        .into_iter()
        .filter(|path| path != root && path.join("vendor").exists())
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().to_string()))
        .filter(|name| is_valid_pci_address(name))
        .collect();
    addresses.sort();
    addresses.dedup();

    let mut devices = Vec::with_capacity(addresses.len());
    for address in addresses {
        match PciDevice::from_sysfs(layout, &address, &ids) {
            Ok(device) => devices.push(device),
            Err(e) => warn!(address = %address, error = %e, "Skipping unreadable PCI device"),
        }
    }

    debug!(count = devices.len(), "Enumerated PCI devices");
    Ok(devices)
}

fn read_optional_link(link: &Path) -> String {
    if fs::symlink_metadata(link).is_err() {
        return String::new();
    }
    read_link_name(link).unwrap_or_default()
}

/// Read only what the rebind engine needs, without touching the ID database.
pub(crate) fn read_id_pair(layout: &SysfsLayout, address: &str) -> Result<(String, String)> {
    let dir = layout.device_dir(address);
    let vendor = read_hex_id(&dir.join("vendor"))?;
    let device = read_hex_id(&dir.join("device"))?;
    Ok((vendor, device))
}
