//! IOMMU group handling.
//!
//! IOMMU groups are the smallest unit of device isolation. All devices in an
//! IOMMU group share the same memory isolation domain, so a VM gets either
//! all of them or none. Groups are derived from enumerated devices on every
//! listing; nothing is cached between invocations.

use crate::vfio::device::PciDevice;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Devices keyed by IOMMU group ID, in enumeration order within a group.
pub type IommuGroups = HashMap<String, Vec<PciDevice>>;

/// Partition devices by IOMMU group.
///
/// Every device lands in exactly one group, under its own `iommu_group`
/// key. No sorting happens here.
pub fn group_by_iommu(devices: &[PciDevice]) -> IommuGroups {
    let mut groups = IommuGroups::new();
    for device in devices {
        groups.entry(device.iommu_group.clone()).or_default().push(device.clone());
    }
    groups
}

/// Group IDs in natural order (`2` before `10`).
pub fn sorted_group_ids(groups: &IommuGroups) -> Vec<&str> {
    let mut ids: Vec<&str> = groups.keys().map(String::as_str).collect();
    ids.sort_by(|a, b| natural_compare(a, b));
    ids
}

/// Groups as a JSON object whose keys follow natural order.
pub fn groups_to_value(groups: &IommuGroups) -> serde_json::Result<Value> {
    let mut object = Map::new();
    for id in sorted_group_ids(groups) {
        object.insert(id.to_string(), serde_json::to_value(&groups[id])?);
    }
    Ok(Value::Object(object))
}

/// Natural string ordering.
///
/// Digit runs compare numerically: leading zeros are skipped, then the
/// shorter run is smaller, then digits compare one by one. Everything else
/// compares by code point. When one side runs out first, byte length
/// decides, then plain byte order, so only equal strings compare equal.
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());
    let (mut i, mut j) = (0, 0);

    while i < a_len && j < b_len {
        if a_chars[i].is_ascii_digit() && b_chars[j].is_ascii_digit() {
            while i < a_len && a_chars[i] == '0' {
                i += 1;
            }
            while j < b_len && b_chars[j] == '0' {
                j += 1;
            }

            let (a_start, b_start) = (i, j);
            while i < a_len && a_chars[i].is_ascii_digit() {
                i += 1;
            }
            while j < b_len && b_chars[j].is_ascii_digit() {
                j += 1;
            }

            let a_run = &a_chars[a_start..i];
            let b_run = &b_chars[b_start..j];
            let ordering = a_run.len().cmp(&b_run.len()).then_with(|| a_run.cmp(b_run));
            if ordering != Ordering::Equal {
                return ordering;
            }
            continue;
        }

        match a_chars[i].cmp(&b_chars[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            other => return other,
        }
    }

    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
