//! Human-readable listing of IOMMU groups.

use crate::error::{AutoVfioError, Result};
use crate::vfio::{sorted_group_ids, IommuGroups, PciDevice};
use serde_json::Value;
use std::fmt::Write as _;

/// Render query results as the text listing.
///
/// The text view needs the grouped shape back: exactly one object mapping
/// group ids to device arrays. Anything else is an error suggesting a
/// machine format.
pub fn render_nodes(nodes: &[Value], tree: bool) -> Result<String> {
    let node = match nodes {
        [node @ Value::Object(_)] => node,
        _ => {
            return Err(AutoVfioError::Encode {
                format: "text".to_string(),
                reason: "query result is not a group map; use --output for other shapes".to_string(),
            })
        }
    };
    let groups: IommuGroups =
        serde_json::from_value(node.clone()).map_err(|e| AutoVfioError::Encode {
            format: "text".to_string(),
            reason: format!("query result is not a group map: {}", e),
        })?;
    Ok(render_groups(&groups, tree))
}

/// Render groups in natural group order.
///
/// Flat mode prints one line per device prefixed with its group. Tree mode
/// prints a group header, then the device class whenever it changes from
/// the previous device, then indented device lines.
pub fn render_groups(groups: &IommuGroups, tree: bool) -> String {
    let mut out = String::new();
    for id in sorted_group_ids(groups) {
        if tree {
            let _ = writeln!(out, "IOMMU Group {}:", id);
        }
        let mut previous_class: Option<(&str, &str)> = None;
        for device in &groups[id] {
            let class = (device.device_class.as_str(), device.class.as_str());
            if tree {
                if previous_class != Some(class) {
                    let _ = writeln!(out, "  {} [{}]:", class.0, class.1);
                    previous_class = Some(class);
                }
                let _ = writeln!(out, "    {}", device_line(device));
            } else {
                let _ = writeln!(
                    out,
                    "IOMMU Group {}: {} [{}]: {}",
                    id,
                    class.0,
                    class.1,
                    device_line(device)
                );
            }
        }
    }
    out
}

fn device_line(device: &PciDevice) -> String {
    format!(
        "{} {} {} [{}:{}] (rev {}) driver: {}",
        device.bus,
        device.vendor_name,
        device.device_name,
        device.vendor_id,
        device.device_id,
        device.revision,
        device.kernel_driver
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfio::{group_by_iommu, groups_to_value};

    fn device(bus: &str, class: &str, device_class: &str, group: &str) -> PciDevice {
        PciDevice {
            bus: bus.to_string(),
            vendor_id: "10de".to_string(),
            device_id: "1eb8".to_string(),
            vendor_name: "NVIDIA Corporation".to_string(),
            device_name: "TU104GL [Tesla T4]".to_string(),
            class: class.to_string(),
            device_class: device_class.to_string(),
            revision: "a1".to_string(),
            kernel_driver: "nouveau".to_string(),
            iommu_group: group.to_string(),
        }
    }

    fn sample() -> IommuGroups {
        group_by_iommu(&[
            device("0000:07:00.0", "0300", "VGA compatible controller", "10"),
            device("0000:07:00.1", "0403", "Audio device", "10"),
            device("0000:00:01.0", "0604", "PCI bridge", "2"),
            device("0000:00:01.1", "0604", "PCI bridge", "2"),
        ])
    }

    #[test]
    fn test_flat_listing() {
        let out = render_groups(&sample(), false);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "IOMMU Group 2: PCI bridge [0604]: 0000:00:01.0 NVIDIA Corporation TU104GL [Tesla T4] [10de:1eb8] (rev a1) driver: nouveau"
        );
        assert!(lines[2].starts_with("IOMMU Group 10: VGA compatible controller [0300]: 0000:07:00.0 "));
    }

    #[test]
    fn test_tree_listing() {
        let out = render_groups(&sample(), true);
        let expected_prefixes = [
            "IOMMU Group 2:",
            "  PCI bridge [0604]:",
            "    0000:00:01.0 ",
            "    0000:00:01.1 ",
            "IOMMU Group 10:",
            "  VGA compatible controller [0300]:",
            "    0000:07:00.0 ",
            "  Audio device [0403]:",
            "    0000:07:00.1 ",
        ];
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), expected_prefixes.len());
        for (line, prefix) in lines.iter().zip(expected_prefixes) {
            assert!(line.starts_with(prefix), "{:?} should start with {:?}", line, prefix);
        }
    }

    #[test]
    fn test_render_nodes() {
        let value = groups_to_value(&sample()).unwrap();
        let out = render_nodes(&[value], true).unwrap();
        assert!(out.starts_with("IOMMU Group 2:\n"));

        let err = render_nodes(&[Value::String("x".into())], false).unwrap_err();
        assert!(matches!(err, AutoVfioError::Encode { .. }));
        assert!(render_nodes(&[], false).is_err());
    }
}
