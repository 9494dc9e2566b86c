//! Loopback mount session and disk deployment.
//!
//! [`MountSession`] binds the disk image to the fixed loopback device
//! and mounts it; release runs on every exit path of the owning scope.
//! The caller acquires once, does its work, and calls
//! [`MountSession::release`]; if an error propagates first, the `Drop`
//! backstop performs the same teardown. Teardown is idempotent and
//! defensive: a binding that is already gone is cleaned up best-effort
//! without turning release into a failure.
//!
//! [`deploy`] repopulates the mounted filesystem from scratch: clear,
//! recreate `/lib` and `/bin`, copy the userland root template, then
//! copy every target's artifact to its `output-path`. Repeating it with
//! unchanged inputs yields identical content.
//!
//! Host-level commands (`losetup`, `mount`, `rm`, `cp`, `mkdir`) run
//! through sudo unless the context disables it.

use anyhow::{bail, Context};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::process::CmdStatus;
use crate::registry::TargetRegistry;

/// Host commands behind the mount lifecycle. Acquire steps return
/// errors; teardown steps are best-effort and only warn, so a binding
/// that is already gone never turns release into a failure. Tests
/// substitute a recording fake to observe teardown.
trait LoopMount {
    fn attach(&self) -> anyhow::Result<()>;
    fn mount(&self) -> anyhow::Result<()>;
    fn sync(&self);
    fn unmount(&self);
    fn detach(&self);
}

/// Production implementation driving losetup/mount/umount on the host.
struct HostMount<'a> {
    env: &'a QorEnv,
}

impl HostMount<'_> {
    fn warn_on_failure(result: anyhow::Result<CmdStatus>) {
        match result {
            Err(e) => eprintln!("  [WARN] release step failed: {e:#}"),
            Ok(status) if !status.success() => {
                let detail = status.stderr().trim().to_string();
                if detail.is_empty() {
                    eprintln!("  [WARN] release step exited {}", status.code());
                } else {
                    eprintln!("  [WARN] release step exited {}: {}", status.code(), detail);
                }
            }
            Ok(_) => {}
        }
    }
}

impl LoopMount for HostMount<'_> {
    fn attach(&self) -> anyhow::Result<()> {
        self.env
            .host_cmd("losetup")
            .arg(&self.env.loop_device)
            .arg_path(&self.env.image)
            .error_msg(format!(
                "losetup failed to bind {} to '{}'",
                self.env.loop_device,
                self.env.image.display()
            ))
            .run()?;
        Ok(())
    }

    fn mount(&self) -> anyhow::Result<()> {
        self.env
            .host_cmd("mount")
            .arg(&self.env.loop_device)
            .arg_path(&self.env.mountpoint)
            .error_msg(format!(
                "mount of {} at '{}' rejected",
                self.env.loop_device,
                self.env.mountpoint.display()
            ))
            .run()?;
        Ok(())
    }

    fn sync(&self) {
        Self::warn_on_failure(
            self.env
                .host_cmd("sync")
                .arg_path(&self.env.mountpoint)
                .allow_fail()
                .run(),
        );
    }

    fn unmount(&self) {
        Self::warn_on_failure(
            self.env
                .host_cmd("umount")
                .arg_path(&self.env.mountpoint)
                .allow_fail()
                .run(),
        );
    }

    fn detach(&self) {
        Self::warn_on_failure(
            self.env
                .host_cmd("losetup")
                .arg("-d")
                .arg(&self.env.loop_device)
                .allow_fail()
                .run(),
        );
    }
}

/// Active binding of the disk image to the loop device, mounted at the
/// fixed mountpoint. At most one session is active process-wide.
pub struct MountSession<'a> {
    env: &'a QorEnv,
    ops: Box<dyn LoopMount + 'a>,
    released: bool,
}

impl<'a> MountSession<'a> {
    /// Bind the image to the loop device and mount it.
    ///
    /// Fails before any filesystem mutation: missing image, device or
    /// mountpoint already in use, or a rejected mount. A mount failure
    /// after a successful bind detaches the device again.
    pub fn acquire(env: &'a QorEnv) -> Result<Self> {
        let precheck = || -> anyhow::Result<()> {
            if !env.image.is_file() {
                bail!("disk image not found at '{}'", env.image.display());
            }
            check_stale_mount(env)
        };
        precheck().map_err(Error::Mount)?;

        Self::with_ops(env, Box::new(HostMount { env }))
    }

    fn with_ops(env: &'a QorEnv, ops: Box<dyn LoopMount + 'a>) -> Result<Self> {
        ops.attach().map_err(Error::Mount)?;

        if let Err(e) = ops.mount() {
            // Partial acquire: detach the device before reporting.
            ops.detach();
            return Err(Error::Mount(e));
        }

        Ok(Self {
            env,
            ops,
            released: false,
        })
    }

    /// Root of the mounted filesystem.
    pub fn mountpoint(&self) -> &Path {
        &self.env.mountpoint
    }

    /// Unmount and detach. Runs exactly once; the `Drop` backstop
    /// covers scopes that exit through an error instead.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.ops.sync();
        self.ops.unmount();
        self.ops.detach();
    }
}

impl Drop for MountSession<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Refuse to stack a second mount over a device or mountpoint that is
/// already in use, typically left behind by a crashed run. Best-effort:
/// skipped entirely when /proc/mounts is unavailable.
fn check_stale_mount(env: &QorEnv) -> anyhow::Result<()> {
    let mounts = match fs::read_to_string("/proc/mounts") {
        Ok(mounts) => mounts,
        Err(_) => return Ok(()),
    };

    for line in mounts.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(point)) = (fields.next(), fields.next()) else {
            continue;
        };
        if device == env.loop_device || Path::new(point) == env.mountpoint {
            bail!(
                "'{}' is already mounted at '{}'; unmount it first \
                 (possibly left behind by a previous crashed run)",
                device,
                point
            );
        }
    }

    Ok(())
}

/// Clear and repopulate the mounted filesystem.
///
/// Requires an active session; the caller owns the mount lifecycle, so
/// a failure here never leaks the mount.
pub fn deploy(session: &MountSession<'_>, registry: &TargetRegistry) -> Result<()> {
    deploy_into(session.mountpoint(), session.env, registry).map_err(Error::Deploy)
}

fn deploy_into(root: &Path, env: &QorEnv, registry: &TargetRegistry) -> anyhow::Result<()> {
    let template = env.root_template();
    if !template.is_dir() {
        bail!("userland root template not found at '{}'", template.display());
    }

    // (a) remove all existing content at the mountpoint
    let mut stale: Vec<_> = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("reading mountpoint '{}'", root.display()))?
    {
        stale.push(entry?.path());
    }
    if !stale.is_empty() {
        let mut cmd = env.host_cmd("rm").arg("-rf");
        for path in &stale {
            cmd = cmd.arg_path(path);
        }
        cmd.error_msg("failed to clear mounted filesystem").run()?;
    }

    // (b) recreate the standard top-level directories
    env.host_cmd("mkdir")
        .arg_path(&root.join("lib"))
        .arg_path(&root.join("bin"))
        .error_msg("failed to create /lib and /bin on the mounted filesystem")
        .run()?;

    // (c) copy the root template, preserving permissions
    let entries: Vec<_> = fs::read_dir(&template)
        .with_context(|| format!("reading template '{}'", template.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    if !entries.is_empty() {
        let file_count = WalkDir::new(&template)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
        println!("  Copying root template ({} files)", file_count);

        let mut cmd = env.host_cmd("cp").arg("-rp");
        for entry in &entries {
            cmd = cmd.arg_path(&entry.path());
        }
        cmd.arg_path(root)
            .error_msg("failed to copy userland root template")
            .run()?;
    }

    // (d) copy every artifact to its output path, in registry order
    for target in registry {
        let artifact = target.artifact_path(env);
        if !artifact.is_file() {
            bail!(
                "artifact for target '{}' not found at '{}'; build it first",
                target.name,
                artifact.display()
            );
        }

        let dest = target.deploy_dest(root);
        if let Some(parent) = dest.parent() {
            env.host_cmd("mkdir")
                .arg("-p")
                .arg_path(parent)
                .error_msg(format!("failed to create '{}'", parent.display()))
                .run()?;
        }

        println!("    {} -> {}", target.bin_path, target.output_path);
        env.host_cmd("cp")
            .arg("-p")
            .arg_path(&artifact)
            .arg_path(&dest)
            .error_msg(format!(
                "failed to copy artifact for target '{}'",
                target.name
            ))
            .run()?;
    }

    Ok(())
}
