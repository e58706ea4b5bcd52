//! Centralized path configuration for auto-vfio.
//!
//! Every kernel interface and config file the tool touches goes through
//! [`SysfsLayout`], so the whole engine can be pointed at a different root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sysfs path for PCI devices.
pub const PCI_DEVICES_PATH: &str = "/sys/bus/pci/devices";

/// Sysfs path for PCI drivers.
pub const PCI_DRIVERS_PATH: &str = "/sys/bus/pci/drivers";

/// nvidia_drm kernel mode-setting parameter.
pub const NVIDIA_MODESET_PATH: &str = "/sys/module/nvidia_drm/parameters/modeset";

/// modprobe options file read at boot.
pub const VFIO_CONF_PATH: &str = "/etc/modprobe.d/vfio.conf";

/// Default PCI ID database locations, first hit wins.
pub const PCI_IDS_PATHS: [&str; 3] =
    ["/usr/share/hwdata/pci.ids", "/usr/share/misc/pci.ids", "/usr/share/pci.ids"];

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "default.yaml";

/// Locations of the kernel control files and persistent config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsLayout {
    pub pci_devices: PathBuf,
    pub pci_drivers: PathBuf,
    pub nvidia_modeset: PathBuf,
    pub vfio_conf: PathBuf,
    pub pci_ids: Vec<PathBuf>,
}

impl Default for SysfsLayout {
    fn default() -> Self {
        Self {
            pci_devices: PathBuf::from(PCI_DEVICES_PATH),
            pci_drivers: PathBuf::from(PCI_DRIVERS_PATH),
            nvidia_modeset: PathBuf::from(NVIDIA_MODESET_PATH),
            vfio_conf: PathBuf::from(VFIO_CONF_PATH),
            pci_ids: PCI_IDS_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl SysfsLayout {
    /// Layout rooted at `root`, mirroring the real filesystem below it.
    pub fn rooted_at(root: &Path) -> Self {
        let join = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            pci_devices: join(PCI_DEVICES_PATH),
            pci_drivers: join(PCI_DRIVERS_PATH),
            nvidia_modeset: join(NVIDIA_MODESET_PATH),
            vfio_conf: join(VFIO_CONF_PATH),
            pci_ids: PCI_IDS_PATHS.iter().map(|p| join(p)).collect(),
        }
    }

    /// Sysfs directory of a single device.
    pub fn device_dir(&self, address: &str) -> PathBuf {
        self.pci_devices.join(address)
    }

    /// The `driver` link of a device.
    pub fn device_driver_link(&self, address: &str) -> PathBuf {
        self.device_dir(address).join("driver")
    }

    /// Directory of a driver under the PCI bus.
    pub fn driver_dir(&self, driver: &str) -> PathBuf {
        self.pci_drivers.join(driver)
    }
}

/// Get the user config file path.
///
/// Resolution order:
/// 1. `AUTO_VFIO_CONFIG` environment variable
/// 2. `default.yaml` in the working directory if it exists
/// 3. `$XDG_CONFIG_HOME/auto-vfio/config.yaml` if it exists
pub fn config_file() -> Option<PathBuf> {
    if let Ok(file) = std::env::var("AUTO_VFIO_CONFIG") {
        return Some(PathBuf::from(file));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir().map(|d| d.join("auto-vfio").join("config.yaml")).filter(|p| p.is_file())
}
