//! `auto-vfio version` command

pub fn version() {
    println!("auto-vfio {}", env!("CARGO_PKG_VERSION"));
}
