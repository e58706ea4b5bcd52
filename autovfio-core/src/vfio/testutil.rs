//! Fake sysfs tree for unit tests.

use crate::paths::SysfsLayout;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct FakeSysfs {
    _root: TempDir,
    pub layout: SysfsLayout,
    devices_tree: PathBuf,
    groups_tree: PathBuf,
}

impl FakeSysfs {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let layout = SysfsLayout::rooted_at(root.path());
        let devices_tree = root.path().join("sys/devices/pci0000:00");
        let groups_tree = root.path().join("sys/kernel/iommu_groups");
        for dir in [&layout.pci_devices, &layout.pci_drivers, &devices_tree, &groups_tree] {
            fs::create_dir_all(dir).unwrap();
        }
        let sysfs = Self { _root: root, layout, devices_tree, groups_tree };
        sysfs.add_driver("vfio-pci");
        sysfs
    }

    /// Create a driver directory with its control files.
    pub fn add_driver(&self, name: &str) -> PathBuf {
        let dir = self.layout.driver_dir(name);
        fs::create_dir_all(&dir).unwrap();
        for control in ["bind", "unbind", "new_id"] {
            fs::write(dir.join(control), "").unwrap();
        }
        dir
    }

    pub fn add_device(
        &self,
        address: &str,
        vendor: &str,
        device: &str,
        class: &str,
        driver: Option<&str>,
        group: Option<&str>,
    ) {
        let real = self.devices_tree.join(address);
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("vendor"), format!("0x{}\n", vendor)).unwrap();
        fs::write(real.join("device"), format!("0x{}\n", device)).unwrap();
        fs::write(real.join("class"), format!("{}\n", class)).unwrap();
        fs::write(real.join("revision"), "0xa1\n").unwrap();

        if let Some(driver) = driver {
            let driver_dir = self.add_driver(driver);
            symlink(driver_dir, real.join("driver")).unwrap();
        }
        if let Some(group) = group {
            let group_dir = self.groups_tree.join(group);
            fs::create_dir_all(&group_dir).unwrap();
            symlink(group_dir, real.join("iommu_group")).unwrap();
        }

        symlink(&real, self.layout.pci_devices.join(address)).unwrap();
    }

    pub fn set_modeset(&self, value: &str) {
        let path = &self.layout.nvidia_modeset;
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, value).unwrap();
    }

    pub fn write_pci_ids(&self, content: &str) {
        let path = &self.layout.pci_ids[0];
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn read_control(&self, driver: &str, control: &str) -> String {
        fs::read_to_string(self.layout.driver_dir(driver).join(control)).unwrap()
    }

    /// Point a device's `driver` link somewhere else, or remove it.
    pub fn relink_driver(&self, address: &str, driver: Option<&str>) {
        let link = self.layout.device_driver_link(address);
        fs::remove_file(&link).unwrap();
        if let Some(driver) = driver {
            symlink(self.layout.driver_dir(driver), link).unwrap();
        }
    }

    /// Replace a control file with a FIFO so writes block until it is drained.
    pub fn make_blocking(&self, path: &Path) {
        fs::remove_file(path).unwrap();
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
    }

    /// Read whatever the abandoned writer eventually delivers.
    pub fn drain(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }
}
