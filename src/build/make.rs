//! External build tool interface.
//!
//! [`BuildTool`] is the seam between the orchestration loop and the
//! concrete tool; [`Make`] is the production implementation driving
//! `make` in each target's build directory. Tests substitute a
//! recording fake.

use anyhow::anyhow;

use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::process::Cmd;
use crate::registry::Target;

/// Per-target operations delegated to the external build tool.
pub trait BuildTool {
    /// Ask whether a rebuild is needed, without side effects.
    ///
    /// A "stale" answer is not an error; only a failure to invoke the
    /// tool at all is.
    fn is_stale(&self, target: &Target) -> Result<bool>;

    /// Rebuild the target, streaming output live.
    fn build(&self, target: &Target) -> Result<()>;

    /// Delete the target's build products.
    fn clean(&self, target: &Target) -> Result<()>;
}

/// `make` driven inside each target's `make-path`.
pub struct Make<'a> {
    env: &'a QorEnv,
}

impl<'a> Make<'a> {
    pub fn new(env: &'a QorEnv) -> Self {
        Self { env }
    }

    fn base_cmd(&self, target: &Target) -> Cmd {
        Cmd::new("make")
            .current_dir(&target.build_dir(self.env))
            .envs(self.env.tool_env())
    }

    fn check_build_dir(&self, target: &Target) -> Result<()> {
        let dir = target.build_dir(self.env);
        if !dir.join("Makefile").is_file() {
            return Err(Error::Tool {
                tool: "make".to_string(),
                target: target.name.clone(),
                cause: anyhow!("no Makefile in '{}'", dir.display()),
            });
        }
        Ok(())
    }
}

impl BuildTool for Make<'_> {
    fn is_stale(&self, target: &Target) -> Result<bool> {
        self.check_build_dir(target)?;

        // make -q exits 0 when up to date and nonzero when a rebuild
        // is needed. Output is suppressed.
        let status = self
            .base_cmd(target)
            .arg("-q")
            .allow_fail()
            .run()
            .map_err(|e| Error::Tool {
                tool: "make".to_string(),
                target: target.name.clone(),
                cause: e,
            })?;

        Ok(!status.success())
    }

    fn build(&self, target: &Target) -> Result<()> {
        self.check_build_dir(target)?;

        self.base_cmd(target)
            .error_msg(format!("make failed in '{}'", target.make_path))
            .run_interactive()
            .map_err(|e| Error::Build {
                target: target.name.clone(),
                cause: e,
            })
    }

    fn clean(&self, target: &Target) -> Result<()> {
        self.check_build_dir(target)?;

        let status = self
            .base_cmd(target)
            .arg("clean")
            .error_msg(format!("make clean failed in '{}'", target.make_path))
            .run()
            .map_err(|e| Error::Build {
                target: target.name.clone(),
                cause: e,
            })?;

        for line in status.stdout().lines().chain(status.stderr().lines()) {
            println!("  {}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process;
    use std::fs;
    use tempfile::TempDir;

    fn target(make_path: &str) -> Target {
        Target {
            name: "LibC".to_string(),
            make_path: make_path.to_string(),
            bin_path: "libc/bin/libc.a".to_string(),
            output_path: "/lib/libc.a".to_string(),
            postbuild: vec![],
        }
    }

    #[test]
    fn test_missing_makefile_is_tool_error() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("libc")).unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());

        let result = Make::new(&env).clean(&target("libc"));
        assert!(matches!(result, Err(Error::Tool { .. })));
    }

    #[test]
    fn test_clean_runs_make_clean() {
        if !process::exists("make") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("libc");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Makefile"), "clean:\n\t@echo removed objects\n").unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());

        Make::new(&env).clean(&target("libc")).unwrap();
    }

    #[test]
    fn test_is_stale_reflects_make_query() {
        if !process::exists("make") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("libc");
        fs::create_dir_all(&dir).unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());
        let make = Make::new(&env);

        // Missing product with a recipe: make -q exits nonzero.
        fs::write(dir.join("Makefile"), "all:\n\t@touch all\n").unwrap();
        assert!(make.is_stale(&target("libc")).unwrap());

        // Existing product with no prerequisites: up to date.
        fs::write(dir.join("all"), "").unwrap();
        assert!(!make.is_stale(&target("libc")).unwrap());
    }
}
