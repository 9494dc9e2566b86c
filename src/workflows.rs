//! Subcommand routing and workflow composition.
//!
//! Each CLI subcommand maps to a composition over the registry, build
//! loop, disk session, and runner. Every workflow loads and validates
//! the registry first, so a malformed descriptor aborts before any
//! external process is spawned.

use crate::build::{self, Make};
use crate::disk::{self, MountSession};
use crate::env::QorEnv;
use crate::error::Result;
use crate::headers::update_headers;
use crate::preflight::{check_required_tools, BUILD_TOOLS, DISK_TOOLS, RUN_TOOLS};
use crate::registry::TargetRegistry;
use crate::runner;

/// One recognized subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Clean,
    Build,
    BuildRun,
    Rebuild,
    Disk,
    Run,
    Update,
}

impl Workflow {
    /// Map a subcommand token to a workflow. `None` means usage + exit.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "clean" => Some(Self::Clean),
            "build" => Some(Self::Build),
            "build-run" => Some(Self::BuildRun),
            "rebuild" => Some(Self::Rebuild),
            "disk" => Some(Self::Disk),
            "run" => Some(Self::Run),
            "update" => Some(Self::Update),
            _ => None,
        }
    }

    /// Whether this workflow mounts the disk image.
    fn uses_disk(self) -> bool {
        !matches!(self, Self::Clean | Self::Update)
    }

    /// Host tools this workflow will invoke.
    fn required_tools(self, env: &QorEnv) -> Vec<(&'static str, &'static str)> {
        let mut tools = Vec::new();
        match self {
            Self::Clean | Self::Build | Self::BuildRun | Self::Rebuild => {
                tools.extend(BUILD_TOOLS);
            }
            Self::Disk | Self::Run | Self::Update => {}
        }
        if self.uses_disk() {
            tools.extend(DISK_TOOLS);
            if env.use_sudo {
                tools.push(("sudo", "sudo"));
            }
        }
        if matches!(self, Self::BuildRun | Self::Run) {
            tools.extend(RUN_TOOLS);
        }
        tools
    }
}

/// Run one workflow to completion. The registry is loaded exactly once
/// and shared by every step.
pub fn dispatch(env: &QorEnv, workflow: Workflow) -> Result<()> {
    let registry = TargetRegistry::load(&env.registry_path())?;
    check_required_tools(&workflow.required_tools(env))?;

    match workflow {
        Workflow::Clean => cmd_clean(env, &registry),
        Workflow::Build => cmd_build(env, &registry),
        Workflow::BuildRun => {
            cmd_build(env, &registry)?;
            runner::run_kernel(env)
        }
        Workflow::Rebuild => {
            cmd_clean(env, &registry)?;
            update_headers(env)?;
            cmd_build(env, &registry)
        }
        Workflow::Disk => deploy_to_disk(env, &registry),
        Workflow::Run => runner::run_kernel(env),
        Workflow::Update => update_headers(env),
    }
}

/// `clean`: run the clean action for every target, never skipped.
fn cmd_clean(env: &QorEnv, registry: &TargetRegistry) -> Result<()> {
    build::clean_all(&Make::new(env), registry)
}

/// `build`: staleness check + build + hooks per target, then deploy.
fn cmd_build(env: &QorEnv, registry: &TargetRegistry) -> Result<()> {
    build::build_all(env, &Make::new(env), registry)?;
    deploy_to_disk(env, registry)
}

/// Mount, deploy, unmount. Release runs on both exit paths: explicitly
/// after a successful deploy, via the session guard when deploy fails.
fn deploy_to_disk(env: &QorEnv, registry: &TargetRegistry) -> Result<()> {
    println!("Copying files to Disk");

    let session = MountSession::acquire(env)?;
    let result = disk::deploy(&session, registry);
    session.release();
    result
}
