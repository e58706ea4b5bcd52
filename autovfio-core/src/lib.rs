//! auto-vfio core library
//!
//! PCI device discovery, IOMMU grouping and vfio-pci rebinding for Linux
//! hosts preparing devices for VM passthrough.

pub mod config;
pub mod elevate;
pub mod error;
pub mod observability;
pub mod output;
pub mod paths;
pub mod vfio;

// Re-export commonly used items
pub use config::Config;
pub use error::{AutoVfioError, Result};
pub use observability::init as init_observability;
pub use output::{render_listing, ListOptions, OutputFormat};
