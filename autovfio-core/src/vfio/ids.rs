//! PCI ID database lookup.
//!
//! Parses the `pci.ids` text format shipped by hwdata/pciutils:
//!
//! ```text
//! 10de  NVIDIA Corporation
//! 	1eb8  TU104GL [Tesla T4]
//! C 03  Display controller
//! 	00  VGA compatible controller
//! ```
//!
//! Subsystem lines (two tabs) and programming interfaces are ignored.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default)]
struct Vendor {
    name: String,
    devices: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Class {
    name: String,
    subclasses: HashMap<String, String>,
}

/// In-memory PCI ID database.
#[derive(Debug, Default)]
pub struct PciIds {
    vendors: HashMap<String, Vendor>,
    classes: HashMap<String, Class>,
}

enum Section {
    None,
    Vendor(String),
    Class(String),
}

impl PciIds {
    /// Load the first readable database from `candidates`.
    ///
    /// Returns an empty database when none is available; lookups then fall
    /// back to numeric names.
    pub fn load(candidates: &[impl AsRef<Path>]) -> Self {
        for path in candidates {
            let path = path.as_ref();
            if let Ok(content) = fs::read_to_string(path) {
                let ids = Self::parse(&content);
                debug!(
                    path = %path.display(),
                    vendors = ids.vendors.len(),
                    classes = ids.classes.len(),
                    "Loaded PCI ID database"
                );
                return ids;
            }
        }
        debug!("No PCI ID database found, using numeric names");
        Self::default()
    }

    /// Parse database text.
    pub fn parse(content: &str) -> Self {
        let mut ids = Self::default();
        let mut section = Section::None;

        for line in content.lines() {
            if line.is_empty() || line.starts_with('#') || line.starts_with("\t\t") {
                continue;
            }

            if let Some(rest) = line.strip_prefix('\t') {
                let Some((id, name)) = split_entry(rest) else { continue };
                match &section {
                    Section::Vendor(v) => {
                        if let Some(vendor) = ids.vendors.get_mut(v) {
                            vendor.devices.insert(id, name);
                        }
                    }
                    Section::Class(c) => {
                        if let Some(class) = ids.classes.get_mut(c) {
                            class.subclasses.insert(id, name);
                        }
                    }
                    Section::None => {}
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("C ") {
                if let Some((id, name)) = split_entry(rest) {
                    ids.classes.insert(id.clone(), Class { name, ..Default::default() });
                    section = Section::Class(id);
                }
                continue;
            }

            // Other single-letter sections (device types, languages...) end here.
            match split_entry(line) {
                Some((id, name)) if id.len() == 4 => {
                    ids.vendors.insert(id.clone(), Vendor { name, ..Default::default() });
                    section = Section::Vendor(id);
                }
                _ => section = Section::None,
            }
        }

        ids
    }

    /// Vendor name, or `Vendor <id>` when unknown.
    pub fn vendor_name(&self, vendor_id: &str) -> String {
        self.vendors
            .get(&vendor_id.to_lowercase())
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("Vendor {}", vendor_id))
    }

    /// Device name, or `Device <id>` when unknown.
    pub fn device_name(&self, vendor_id: &str, device_id: &str) -> String {
        self.vendors
            .get(&vendor_id.to_lowercase())
            .and_then(|v| v.devices.get(&device_id.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| format!("Device {}", device_id))
    }

    /// Name for a 4-digit class+subclass code (`0300`).
    ///
    /// Prefers the subclass name, then the class name.
    pub fn class_name(&self, code: &str) -> String {
        let code = code.to_lowercase();
        let (class_id, subclass_id) = code.split_at(code.len().min(2));
        match self.classes.get(class_id) {
            Some(class) => {
                class.subclasses.get(subclass_id).cloned().unwrap_or_else(|| class.name.clone())
            }
            None => format!("Class {}", code),
        }
    }
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let (id, name) = line.split_once(char::is_whitespace)?;
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some((id.to_lowercase(), name.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# comment
10de  NVIDIA Corporation
\t1eb8  TU104GL [Tesla T4]
\t\t10de 12a2  Tesla T4
\t10f8  TU104 HD Audio Controller
8086  Intel Corporation
\t1533  I210 Gigabit Network Connection

C 02  Network controller
\t00  Ethernet controller
C 03  Display controller
\t00  VGA compatible controller
\t\t00  VGA controller
\t02  3D controller
C 04  Multimedia controller
";

    #[test]
    fn test_vendor_and_device_names() {
        let ids = PciIds::parse(SAMPLE);
        assert_eq!(ids.vendor_name("10de"), "NVIDIA Corporation");
        assert_eq!(ids.device_name("10de", "1eb8"), "TU104GL [Tesla T4]");
        assert_eq!(ids.device_name("10DE", "10F8"), "TU104 HD Audio Controller");
        assert_eq!(ids.device_name("8086", "1533"), "I210 Gigabit Network Connection");
    }

    #[test]
    fn test_class_names() {
        let ids = PciIds::parse(SAMPLE);
        assert_eq!(ids.class_name("0300"), "VGA compatible controller");
        assert_eq!(ids.class_name("0302"), "3D controller");
        assert_eq!(ids.class_name("0403"), "Multimedia controller");
        assert_eq!(ids.class_name("0c03"), "Class 0c03");
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        let ids = PciIds::default();
        assert_eq!(ids.vendor_name("1234"), "Vendor 1234");
        assert_eq!(ids.device_name("1234", "abcd"), "Device abcd");
    }

    #[test]
    fn test_load_missing_database() {
        let ids = PciIds::load(&["/nonexistent/pci.ids"]);
        assert_eq!(ids.vendor_name("10de"), "Vendor 10de");
    }
}
