//! Project context shared by every component.
//!
//! [`QorEnv`] is constructed once at startup from the working directory
//! plus an optional `qor-builder.toml`, and passed explicitly to every
//! component that needs it. Nothing mutates the process environment or
//! the process working directory; external build tools receive the
//! include/lib path variables per spawned child instead.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Default disk-image file, relative to the project root.
pub const DEFAULT_IMAGE: &str = "qor-os/hdd.dsk";

/// Default loopback device the image is bound to.
pub const DEFAULT_LOOP_DEVICE: &str = "/dev/loop16";

/// Default mountpoint for the bound device.
pub const DEFAULT_MOUNTPOINT: &str = "/mnt";

/// Optional config file overriding the fixed disk identifiers.
pub const CONFIG_FILE: &str = "qor-builder.toml";

/// Environment variable consumed by target makefiles for the shared
/// include tree. The name is part of the userland build contract.
pub const INCLUDE_PATH_VAR: &str = "qorIncludePath";

/// Environment variable consumed by target makefiles for the shared
/// library tree.
pub const LIB_PATH_VAR: &str = "qorLibPath";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    disk: Option<DiskToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiskToml {
    image: Option<String>,
    #[serde(rename = "loop-device")]
    loop_device: Option<String>,
    mountpoint: Option<String>,
    #[serde(rename = "use-sudo")]
    use_sudo: Option<bool>,
}

/// Explicit project context: working directory root, fixed host disk
/// identifiers, and the derived paths every workflow needs.
#[derive(Debug, Clone)]
pub struct QorEnv {
    root: PathBuf,
    /// Disk-image file bound to the loop device.
    pub image: PathBuf,
    /// Loopback device identifier.
    pub loop_device: String,
    /// Fixed mountpoint for the image.
    pub mountpoint: PathBuf,
    /// Run host-level disk commands through sudo. Disable when the
    /// whole tool already runs as root.
    pub use_sudo: bool,
}

impl QorEnv {
    /// Build a context rooted at `root` with the fixed defaults.
    pub fn new(root: PathBuf) -> Self {
        let image = root.join(DEFAULT_IMAGE);
        Self {
            root,
            image,
            loop_device: DEFAULT_LOOP_DEVICE.to_string(),
            mountpoint: PathBuf::from(DEFAULT_MOUNTPOINT),
            use_sudo: true,
        }
    }

    /// Build a context rooted at `root`, applying `qor-builder.toml`
    /// overrides if the file exists.
    pub fn load(root: PathBuf) -> Result<Self> {
        let mut env = Self::new(root);
        let config_path = env.root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(env);
        }

        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("reading '{}'", config_path.display()))?;
        let parsed: ConfigToml = toml::from_str(&raw)
            .with_context(|| format!("parsing '{}'", config_path.display()))?;

        if let Some(disk) = parsed.disk {
            if let Some(image) = disk.image {
                env.image = env.root.join(image);
            }
            if let Some(device) = disk.loop_device {
                env.loop_device = device;
            }
            if let Some(mountpoint) = disk.mountpoint {
                env.mountpoint = PathBuf::from(mountpoint);
            }
            if let Some(use_sudo) = disk.use_sudo {
                env.use_sudo = use_sudo;
            }
        }

        Ok(env)
    }

    /// Project root (the directory the tool was invoked from).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Userland tree containing the descriptor, template, and shared
    /// include/lib directories.
    pub fn userland_dir(&self) -> PathBuf {
        self.root.join("qor-userland")
    }

    /// Target descriptor file.
    pub fn registry_path(&self) -> PathBuf {
        self.userland_dir().join("build.json")
    }

    /// Shared include tree exported to target makefiles.
    pub fn include_dir(&self) -> PathBuf {
        self.userland_dir().join("include")
    }

    /// Shared library tree exported to target makefiles.
    pub fn lib_dir(&self) -> PathBuf {
        self.userland_dir().join("lib")
    }

    /// Userland root template copied verbatim into every deployment.
    pub fn root_template(&self) -> PathBuf {
        self.userland_dir().join("root")
    }

    /// Host-side tree the guest's home directory is copied into after
    /// a run.
    pub fn output_dir(&self) -> PathBuf {
        self.userland_dir().join("root-output")
    }

    /// Kernel crate directory (`cargo run --release` runs here).
    pub fn kernel_dir(&self) -> PathBuf {
        self.root.join("qor-os")
    }

    /// libc header source for the `update` subcommand.
    pub fn libc_include_dir(&self) -> PathBuf {
        self.root.join("libc/include")
    }

    /// Destination of the libc header sync.
    pub fn libc_include_dest(&self) -> PathBuf {
        self.include_dir().join("libc")
    }

    /// Environment variables exported to every external build tool,
    /// postbuild hook, and kernel run.
    pub fn tool_env(&self) -> [(String, String); 2] {
        [
            (
                INCLUDE_PATH_VAR.to_string(),
                self.include_dir().to_string_lossy().into_owned(),
            ),
            (
                LIB_PATH_VAR.to_string(),
                self.lib_dir().to_string_lossy().into_owned(),
            ),
        ]
    }

    /// Command builder for host-level disk operations, routed through
    /// sudo when enabled.
    pub fn host_cmd(&self, program: &str) -> Cmd {
        if self.use_sudo {
            Cmd::new("sudo").arg(program)
        } else {
            Cmd::new(program)
        }
    }
}
