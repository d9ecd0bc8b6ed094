//! Partition allow-list policy.

use dsu_shared::errors::{DsuError, DsuResult};

/// Partitions this installer never writes.
///
/// These are either managed by the installer itself (`userdata`) or are not
/// replaceable through a dynamic system slot.
pub const DENIED_PARTITIONS: &[&str] = &[
    "vbmeta",
    "boot",
    "userdata",
    "dtbo",
    "super_empty",
    "system_other",
    "scratch",
];

/// Whether `name` may be installed as a dynamic system partition.
pub fn is_supported(name: &str) -> bool {
    !DENIED_PARTITIONS.contains(&name)
}

/// Whether `name` is usable as a partition and staging file name.
///
/// Rejects empty names and anything that could leave the staging directory.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Fail with `Unsupported` for names that [`is_valid_name`] rejects.
pub fn check_name(name: &str) -> DsuResult<()> {
    if is_valid_name(name) {
        return Ok(());
    }
    Err(DsuError::Unsupported(format!("invalid partition name `{}`", name)))
}
