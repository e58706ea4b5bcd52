//! VFIO rebind engine.
//!
//! Moves PCI devices from their current driver to vfio-pci, one device at a
//! time:
//!
//! ```text
//! Discover -> [Persist] -> Quirk-Check -> Unbind -> Bind -> Done
//! ```
//!
//! A failure only ends processing of the device it happened on. There is no
//! rollback: a device whose bind fails after a successful unbind is left
//! without a driver and reported as failed.

use crate::error::{AutoVfioError, Result};
use crate::paths::SysfsLayout;
use crate::vfio::device::{is_valid_pci_address, read_id_pair, VFIO_PCI_DRIVER};
use crate::vfio::persist::{persist_vfio_id, PersistOutcome};
use crate::vfio::sysfs::{
    list_entries, read_link_name, read_sysfs_value, write_control_file_timeout, FileKind,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Options for a rebind run.
#[derive(Debug, Clone)]
pub struct RebindOptions {
    /// Also add the device id to the modprobe options file
    pub persist: bool,
    /// Bound on each control-file write
    pub timeout: Duration,
}

impl Default for RebindOptions {
    fn default() -> Self {
        Self { persist: false, timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS) }
    }
}

/// Stage of the per-device state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebindStep {
    Discover,
    Persist,
    QuirkCheck,
    Unbind,
    Bind,
}

impl fmt::Display for RebindStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "discover",
            Self::Persist => "persist",
            Self::QuirkCheck => "quirk-check",
            Self::Unbind => "unbind",
            Self::Bind => "bind",
        };
        f.write_str(name)
    }
}

/// Successful end states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebindOutcome {
    /// Device moved to vfio-pci.
    Rebound,
    /// Device was already on vfio-pci; nothing was written.
    AlreadyBound,
}

/// A failed step, with the driver observed afterwards when it was checked.
#[derive(Debug)]
pub struct StepError {
    pub step: RebindStep,
    pub source: AutoVfioError,
    pub observed_driver: Option<String>,
}

impl StepError {
    fn new(step: RebindStep, source: AutoVfioError) -> Self {
        Self { step, source, observed_driver: None }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.source)?;
        if let Some(driver) = &self.observed_driver {
            write!(f, " (device now on driver {:?})", driver)?;
        }
        Ok(())
    }
}

/// Result of processing one requested device.
#[derive(Debug)]
pub struct DeviceReport {
    pub bus: String,
    /// Driver the device was on when discovered
    pub driver: Option<String>,
    /// `vendor:device` pair
    pub id_pair: Option<String>,
    /// Set when persistence was requested
    pub persist: Option<std::result::Result<PersistOutcome, String>>,
    pub result: std::result::Result<RebindOutcome, StepError>,
}

impl DeviceReport {
    fn new(bus: &str) -> Self {
        Self {
            bus: bus.to_string(),
            driver: None,
            id_pair: None,
            persist: None,
            result: Ok(RebindOutcome::Rebound),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Counts over a batch of reports.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebindSummary {
    pub rebound: usize,
    pub already_bound: usize,
    pub failed: usize,
}

impl RebindSummary {
    pub fn from_reports(reports: &[DeviceReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            match report.result {
                Ok(RebindOutcome::Rebound) => summary.rebound += 1,
                Ok(RebindOutcome::AlreadyBound) => summary.already_bound += 1,
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }
}

/// Drivers that need work before they let go of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverQuirk {
    /// nvidia_drm keeps the framebuffer while kernel mode-setting is on.
    NvidiaModeset,
}

impl DriverQuirk {
    fn for_driver(driver: &str) -> Option<Self> {
        match driver {
            "nvidia" => Some(Self::NvidiaModeset),
            _ => None,
        }
    }
}

/// Rebinds devices to vfio-pci.
#[derive(Debug)]
pub struct VfioManager<'a> {
    layout: &'a SysfsLayout,
    options: RebindOptions,
}

impl<'a> VfioManager<'a> {
    /// Create a manager over the given sysfs layout.
    pub fn new(layout: &'a SysfsLayout, options: RebindOptions) -> Self {
        Self { layout, options }
    }

    /// Rebind every requested device, strictly one after another.
    ///
    /// Never fails as a whole; each device gets its own report.
    pub async fn rebind_devices(&self, pci_addresses: &[String]) -> Vec<DeviceReport> {
        info!(devices = ?pci_addresses, persist = self.options.persist, "Rebinding devices to vfio-pci");

        let mut reports = Vec::with_capacity(pci_addresses.len());
        for addr in pci_addresses {
            let report = self.rebind_device(addr).await;
            match &report.result {
                Ok(RebindOutcome::Rebound) => info!(bus = %addr, "Device bound successfully"),
                Ok(RebindOutcome::AlreadyBound) => {
                    warn!(bus = %addr, "Device is already bound to vfio-pci")
                }
                Err(e) => error!(
                    bus = %addr,
                    step = %e.step,
                    error = %e.source,
                    observed_driver = ?e.observed_driver,
                    "Failed to rebind device"
                ),
            }
            reports.push(report);
        }

        let summary = RebindSummary::from_reports(&reports);
        info!(
            succeeded = summary.rebound,
            already_bound = summary.already_bound,
            failed = summary.failed,
            "Rebind finished"
        );
        reports
    }

    /// Run the state machine for a single device.
    pub async fn rebind_device(&self, bus: &str) -> DeviceReport {
        let mut report = DeviceReport::new(bus);
        let result = self.run(bus, &mut report).await;
        report.result = result;
        report
    }

    async fn run(
        &self,
        bus: &str,
        report: &mut DeviceReport,
    ) -> std::result::Result<RebindOutcome, StepError> {
        use RebindStep::*;

        // Discover
        let driver_link = self.discover_driver_link(bus).map_err(|e| StepError::new(Discover, e))?;
        let (vendor_id, device_id) =
            read_id_pair(self.layout, bus).map_err(|e| StepError::new(Discover, e))?;
        let id_pair = format!("{}:{}", vendor_id, device_id);
        report.id_pair = Some(id_pair.clone());

        // Persist, independent of how the transition goes
        if self.options.persist {
            let persisted = persist_vfio_id(&self.layout.vfio_conf, &id_pair);
            match &persisted {
                Ok(outcome) => info!(
                    bus = %bus,
                    path = %self.layout.vfio_conf.display(),
                    ?outcome,
                    "Device persisted to vfio-pci"
                ),
                Err(e) => error!(bus = %bus, step = %Persist, error = %e, "Failed to persist device"),
            }
            report.persist = Some(persisted.map_err(|e| e.to_string()));
        }

        let driver = read_link_name(&driver_link).map_err(|e| StepError::new(Discover, e))?;
        report.driver = Some(driver.clone());

        // Quirk-Check
        if driver == VFIO_PCI_DRIVER {
            return Ok(RebindOutcome::AlreadyBound);
        }
        if let Some(quirk) = DriverQuirk::for_driver(&driver) {
            self.apply_quirk(quirk).await.map_err(|e| StepError::new(QuirkCheck, e))?;
        }

        // Unbind
        info!(bus = %bus, driver = %driver, "Unbinding device from driver");
        if let Err(e) = self.write(&driver_link.join("unbind"), bus).await {
            let observed = self.current_driver(bus);
            if !(e.is_timeout() && observed.is_none()) {
                return Err(StepError { step: Unbind, source: e, observed_driver: observed });
            }
            warn!(bus = %bus, "Unbind timed out but device is no longer bound, continuing");
        }

        // Bind
        info!(bus = %bus, "Binding device to vfio-pci");
        let vfio_dir = self.layout.driver_dir(VFIO_PCI_DRIVER);
        let new_id = format!("{} {}", vendor_id, device_id);
        let bound = match self.write(&vfio_dir.join("new_id"), &new_id).await {
            Ok(()) => self.write(&vfio_dir.join("bind"), bus).await,
            Err(e) => Err(e),
        };

        match bound {
            Ok(()) => Ok(RebindOutcome::Rebound),
            Err(e) => {
                // new_id makes vfio-pci probe matching devices on its own,
                // which can make the explicit bind fail or hang.
                let observed = self.current_driver(bus);
                if observed.as_deref() == Some(VFIO_PCI_DRIVER) {
                    debug!(bus = %bus, error = %e, "Device auto-bound to vfio-pci");
                    Ok(RebindOutcome::Rebound)
                } else {
                    Err(StepError { step: Bind, source: e, observed_driver: observed })
                }
            }
        }
    }

    /// Locate the device's `driver` symlink.
    fn discover_driver_link(&self, bus: &str) -> Result<PathBuf> {
        if !is_valid_pci_address(bus) {
            return Err(AutoVfioError::InvalidPciAddress { address: bus.to_string() });
        }

        let driver_path = self.layout.device_driver_link(bus);
        let links = list_entries(&driver_path, FileKind::Symlink)?;
        links
            .into_iter()
            .next()
            .ok_or_else(|| AutoVfioError::DriverNotFound { address: bus.to_string() })
    }

    async fn apply_quirk(&self, quirk: DriverQuirk) -> Result<()> {
        match quirk {
            DriverQuirk::NvidiaModeset => {
                let modeset = &self.layout.nvidia_modeset;
                if read_sysfs_value(modeset)? == "Y" {
                    info!(path = %modeset.display(), "Disabling nvidia_drm modeset");
                    self.write(modeset, "N").await?;
                }
                Ok(())
            }
        }
    }

    async fn write(&self, path: &Path, value: &str) -> Result<()> {
        debug!(path = %path.display(), value = %value, "Writing control file");
        write_control_file_timeout(path, value, self.options.timeout).await
    }

    /// Re-read the driver binding after a write with unknown outcome.
    fn current_driver(&self, bus: &str) -> Option<String> {
        read_link_name(&self.layout.device_driver_link(bus)).ok()
    }
}
