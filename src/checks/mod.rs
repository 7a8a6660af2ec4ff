//! Preflight checks bundled with the binary.

pub mod disk_check;

pub use disk_check::DiskCheck;
