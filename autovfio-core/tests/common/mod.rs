//! Fake sysfs tree shared by the integration tests.

#![allow(dead_code)]

use autovfio_core::paths::SysfsLayout;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct Host {
    _root: TempDir,
    pub layout: SysfsLayout,
    devices_tree: PathBuf,
    groups_tree: PathBuf,
}

impl Host {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let layout = SysfsLayout::rooted_at(root.path());
        let devices_tree = root.path().join("sys/devices/pci0000:00");
        let groups_tree = root.path().join("sys/kernel/iommu_groups");
        for dir in [&layout.pci_devices, &layout.pci_drivers, &devices_tree, &groups_tree] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::create_dir_all(layout.vfio_conf.parent().unwrap()).unwrap();

        let host = Self { _root: root, layout, devices_tree, groups_tree };
        host.driver("vfio-pci");
        host
    }

    pub fn driver(&self, name: &str) -> PathBuf {
        let dir = self.layout.driver_dir(name);
        fs::create_dir_all(&dir).unwrap();
        for control in ["bind", "unbind", "new_id"] {
            if !dir.join(control).exists() {
                fs::write(dir.join(control), "").unwrap();
            }
        }
        dir
    }

    /// Add a device with the given `vendor:device` ids, class code and group.
    pub fn device(&self, address: &str, ids: &str, class: &str, driver: &str, group: &str) {
        let (vendor, device) = ids.split_once(':').unwrap();
        let real = self.devices_tree.join(address);
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("vendor"), format!("0x{}\n", vendor)).unwrap();
        fs::write(real.join("device"), format!("0x{}\n", device)).unwrap();
        fs::write(real.join("class"), format!("0x{}00\n", class)).unwrap();
        fs::write(real.join("revision"), "0xa1\n").unwrap();

        symlink(self.driver(driver), real.join("driver")).unwrap();
        let group_dir = self.groups_tree.join(group);
        fs::create_dir_all(&group_dir).unwrap();
        symlink(group_dir, real.join("iommu_group")).unwrap();
        symlink(&real, self.layout.pci_devices.join(address)).unwrap();
    }

    pub fn pci_ids(&self, content: &str) {
        let path = &self.layout.pci_ids[0];
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn control(&self, driver: &str, control: &str) -> String {
        fs::read_to_string(self.layout.driver_dir(driver).join(control)).unwrap()
    }

    pub fn vfio_conf(&self) -> String {
        fs::read_to_string(&self.layout.vfio_conf).unwrap()
    }
}
