//! Staleness-driven build orchestration.
//!
//! Walks the registry in declaration order, one target at a time:
//! query staleness, rebuild if stale, then run the target's postbuild
//! hooks. The first failure of any step aborts the whole run — builds
//! have inter-target ordering significance (libraries consumed by later
//! targets), so continuing past a failure is unsafe.

pub mod hooks;
pub mod make;

pub use make::{BuildTool, Make};

use anyhow::Context;

use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::registry::TargetRegistry;

/// Per-target result of one build pass. Transient; produced and
/// consumed within a single workflow invocation.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub name: String,
    /// Whether the build tool was actually invoked (target was stale).
    pub rebuilt: bool,
}

/// Check and build every registered target, in declaration order.
///
/// Targets the tool reports up to date are skipped entirely: no build,
/// no hooks. Returns one outcome per target on full success.
pub fn build_all(
    env: &QorEnv,
    tool: &dyn BuildTool,
    registry: &TargetRegistry,
) -> Result<Vec<BuildOutcome>> {
    // Target makefiles link against qorLibPath; make sure it exists
    // before the first build.
    std::fs::create_dir_all(env.lib_dir())
        .with_context(|| format!("creating '{}'", env.lib_dir().display()))
        .map_err(Error::Host)?;

    println!("Building Binaries");

    let mut outcomes = Vec::with_capacity(registry.len());
    for target in registry {
        if !tool.is_stale(target)? {
            println!("  [SKIP] {} up to date", target.name);
            outcomes.push(BuildOutcome {
                name: target.name.clone(),
                rebuilt: false,
            });
            continue;
        }

        println!("Building {}", target.name);
        tool.build(target)?;

        if !target.postbuild.is_empty() {
            println!("Running post build for {}", target.name);
            hooks::run_postbuild(env, target)?;
        }

        outcomes.push(BuildOutcome {
            name: target.name.clone(),
            rebuilt: true,
        });
    }

    let rebuilt = outcomes.iter().filter(|o| o.rebuilt).count();
    println!(
        "  {} of {} targets rebuilt ({} up to date)",
        rebuilt,
        outcomes.len(),
        outcomes.len() - rebuilt
    );

    Ok(outcomes)
}

/// Run the clean action for every registered target, independent of
/// staleness.
pub fn clean_all(tool: &dyn BuildTool, registry: &TargetRegistry) -> Result<()> {
    println!("Removing Binaries");
    for target in registry {
        println!("Removing {}", target.name);
        tool.clean(target)?;
    }
    Ok(())
}
