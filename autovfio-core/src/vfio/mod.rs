//! VFIO (Virtual Function I/O) device handling for Linux.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     VFIO Rebind                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VfioManager                                                │
//! │  ├── rebind_devices() - Move devices to vfio-pci            │
//! │  └── rebind_device()  - Discover/quirk/unbind/bind one      │
//! │                                                             │
//! │  persist                                                    │
//! │  └── merge_vfio_id() - modprobe `options vfio-pci ids=`     │
//! │                                                             │
//! │  PciDevice / enumerate_devices()                            │
//! │  └── Device metadata: ids, names, driver, IOMMU group       │
//! │                                                             │
//! │  iommu                                                      │
//! │  └── group_by_iommu(), natural_compare()                    │
//! │                                                             │
//! │  sysfs                                                      │
//! │  └── Control-file writes bounded by a timeout               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use autovfio_core::vfio::{RebindOptions, VfioManager};
//!
//! let manager = VfioManager::new(&config.paths, RebindOptions::default());
//! let reports = manager.rebind_devices(&["0000:07:00.0".to_string()]).await;
//! ```

mod device;
mod ids;
mod iommu;
mod manager;
mod persist;
pub mod sysfs;

#[cfg(test)]
pub(crate) mod testutil;

pub use device::{enumerate_devices, is_valid_pci_address, PciDevice, VFIO_PCI_DRIVER};
pub use ids::PciIds;
pub use iommu::{group_by_iommu, groups_to_value, natural_compare, sorted_group_ids, IommuGroups};
pub use manager::{
    DeviceReport, RebindOptions, RebindOutcome, RebindStep, RebindSummary, StepError, VfioManager,
};
pub use persist::{merge_vfio_id, persist_vfio_id, PersistOutcome};
