//! Preflight checks for the build-and-deploy pipeline.
//!
//! Validates that the host has the external tools a workflow is about
//! to invoke, and takes a best-effort single-instance lock so a second
//! concurrent invocation cannot fight over the loop device. The lock is
//! advisory only; it does not protect against a mount left behind by a
//! crashed run (the mount session checks /proc/mounts for that).

use anyhow::{bail, Context};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Error, Result};
use crate::process;

/// Lock file taken for the lifetime of the process.
pub const LOCK_FILE: &str = ".qor-builder.lock";

/// Tools needed by build/clean workflows. Each entry is
/// (command, package hint).
pub const BUILD_TOOLS: &[(&str, &str)] = &[("make", "make")];

/// Tools needed by any workflow that touches the disk image. Covers
/// the mount lifecycle plus every host command deploy issues against
/// the mounted filesystem.
pub const DISK_TOOLS: &[(&str, &str)] = &[
    ("losetup", "util-linux"),
    ("mount", "util-linux"),
    ("umount", "util-linux"),
    ("cp", "coreutils"),
    ("rm", "coreutils"),
    ("mkdir", "coreutils"),
    ("sync", "coreutils"),
];

/// Tools needed to run the kernel.
pub const RUN_TOOLS: &[(&str, &str)] = &[("cargo", "rust")];

/// Check that every listed tool resolves on PATH.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !process::exists(tool) {
            missing.push(format!("  {} (install: {})", tool, package));
        }
    }

    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::Host(anyhow::anyhow!(
        "missing required host tools:\n{}",
        missing.join("\n")
    )))
}

/// Take an exclusive lock at the project root.
///
/// The returned handle must stay alive for the duration of the
/// workflow; dropping it releases the lock. A held lock means another
/// invocation is already running against the same tree.
pub fn acquire_instance_lock(root: &Path) -> Result<File> {
    let lock = || -> anyhow::Result<File> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file '{}'", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            bail!(
                "another qor-builder is already running against this tree \
                 (lock held on '{}')",
                path.display()
            );
        }
        Ok(file)
    };

    lock().map_err(Error::Host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_required_tools_passes_for_basics() {
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_reports_missing() {
        let tools = &[("definitely_not_a_real_command_12345", "fake-package")];
        let err = check_required_tools(tools).unwrap_err();
        assert!(err.to_string().contains("fake-package"));
    }

    #[test]
    fn test_instance_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();

        let held = acquire_instance_lock(temp.path()).unwrap();
        assert!(acquire_instance_lock(temp.path()).is_err());

        drop(held);
        assert!(acquire_instance_lock(temp.path()).is_ok());
    }
}
