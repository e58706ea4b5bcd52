//! Listing pipeline: enumerate, group, query, render.

mod common;

use autovfio_core::vfio::enumerate_devices;
use autovfio_core::{render_listing, ListOptions, OutputFormat};
use common::Host;

const PCI_IDS: &str = "\
10de  NVIDIA Corporation
\t1eb8  TU104GL [Tesla T4]
\t10f8  TU104 HD Audio Controller
8086  Intel Corporation
\t1901  6th-10th Gen Core Processor PCIe Controller (x16)
C 03  Display controller
\t00  VGA compatible controller
C 04  Multimedia controller
\t03  Audio device
C 06  Bridge
\t04  PCI bridge
";

fn host() -> Host {
    let host = Host::new();
    host.pci_ids(PCI_IDS);
    host.device("0000:07:00.0", "10de:1eb8", "0300", "nouveau", "10");
    host.device("0000:07:00.1", "10de:10f8", "0403", "snd_hda_intel", "10");
    host.device("0000:00:01.0", "8086:1901", "0604", "pcieport", "2");
    host
}

#[test]
fn test_tree_listing() {
    let host = host();
    let devices = enumerate_devices(&host.layout).unwrap();
    let out = render_listing(&devices, &ListOptions { tree: true, ..Default::default() }).unwrap();

    let expected = "\
IOMMU Group 2:
  PCI bridge [0604]:
    0000:00:01.0 Intel Corporation 6th-10th Gen Core Processor PCIe Controller (x16) [8086:1901] (rev a1) driver: pcieport
IOMMU Group 10:
  VGA compatible controller [0300]:
    0000:07:00.0 NVIDIA Corporation TU104GL [Tesla T4] [10de:1eb8] (rev a1) driver: nouveau
  Audio device [0403]:
    0000:07:00.1 NVIDIA Corporation TU104 HD Audio Controller [10de:10f8] (rev a1) driver: snd_hda_intel
";
    assert_eq!(out, expected);
}

#[test]
fn test_flat_listing() {
    let host = host();
    let devices = enumerate_devices(&host.layout).unwrap();
    let out = render_listing(&devices, &ListOptions::default()).unwrap();

    let first = out.lines().next().unwrap();
    assert!(first.starts_with("IOMMU Group 2: PCI bridge [0604]: 0000:00:01.0 Intel Corporation"));
    assert_eq!(out.lines().count(), 3);
}

#[test]
fn test_query_with_machine_output() {
    let host = host();
    let devices = enumerate_devices(&host.layout).unwrap();

    let options = ListOptions {
        format: Some(OutputFormat::Json),
        query: Some(".\"10\"[] | select(.kernelDriver == \"nouveau\") | .bus".to_string()),
        ..Default::default()
    };
    assert_eq!(render_listing(&devices, &options).unwrap(), "\"0000:07:00.0\"\n");

    let options = ListOptions { format: Some(OutputFormat::Yaml), query: Some("keys".into()), ..Default::default() };
    assert_eq!(render_listing(&devices, &options).unwrap(), "- '2'\n- '10'\n");
}

#[test]
fn test_csv_listing_is_flat() {
    let host = host();
    let devices = enumerate_devices(&host.layout).unwrap();

    let options = ListOptions { format: Some(OutputFormat::Csv), ..Default::default() };
    let out = render_listing(&devices, &options).unwrap();
    let mut lines = out.lines();
    assert_eq!(
        lines.next().unwrap(),
        "bus,vendorId,deviceId,vendorName,deviceName,class,deviceClass,revision,kernelDriver,iommuGroup"
    );
    assert!(lines.next().unwrap().starts_with("0000:00:01.0,8086,1901,Intel Corporation,"));
}

#[test]
fn test_text_view_rejects_non_group_result() {
    let host = host();
    let devices = enumerate_devices(&host.layout).unwrap();

    let options = ListOptions { query: Some(".[][] | .bus".into()), ..Default::default() };
    assert!(render_listing(&devices, &options).is_err());
}
