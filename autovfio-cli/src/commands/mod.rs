//! CLI command implementations

pub mod list;
pub mod rebind;
pub mod version;

pub use list::list;
pub use rebind::rebind;
pub use version::version;
