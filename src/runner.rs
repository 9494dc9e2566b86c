//! Kernel launch and guest output retrieval.
//!
//! Boots Qor through the kernel crate's `cargo run --release`, blocking
//! with stdio attached to the invoking terminal. After a clean exit the
//! guest's home directory is copied back to the host under a fresh
//! mount session, with the same guaranteed-release discipline as the
//! deploy path.

use anyhow::Context;
use std::path::Path;

use crate::disk::MountSession;
use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::fsutil::recreate_dir;
use crate::process::Cmd;

/// Guest subtree copied to the host after a run.
const GUEST_OUTPUT_SUBTREE: &str = "home/root";

/// Launch the kernel and, on success, retrieve its output.
pub fn run_kernel(env: &QorEnv) -> Result<()> {
    println!("Starting Qor");

    Cmd::new("cargo")
        .args(["run", "--release"])
        .current_dir(&env.kernel_dir())
        .envs(env.tool_env())
        .error_msg("qor-os exited with a failure")
        .run_interactive()
        .map_err(Error::Run)?;

    copy_output(env)
}

/// Copy the guest's `/home/root` into `qor-userland/root-output`.
pub fn copy_output(env: &QorEnv) -> Result<()> {
    println!("Copying output");

    let session = MountSession::acquire(env)?;
    let result = copy_guest_output(session.mountpoint(), env);
    session.release();
    result
}

/// The copy runs unprivileged: the retrieved tree must stay owned by
/// the invoking user so the next retrieval can delete and recreate it.
fn copy_guest_output(mount_root: &Path, env: &QorEnv) -> Result<()> {
    let copy = || -> anyhow::Result<()> {
        let guest_home = mount_root.join(GUEST_OUTPUT_SUBTREE);
        let output_dir = env.output_dir();

        recreate_dir(&output_dir)
            .with_context(|| format!("resetting '{}'", output_dir.display()))?;

        Cmd::new("cp")
            .arg("-rp")
            .arg_path(&guest_home)
            .arg_path(&output_dir)
            .error_msg(format!(
                "failed to copy guest output from '{}'",
                guest_home.display()
            ))
            .run()?;
        Ok(())
    };

    copy().map_err(Error::Deploy)
}
