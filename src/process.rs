//! Structured external command invocation.
//!
//! Every external tool in this crate goes through [`Cmd`]: an argument
//! list, an optional working directory, per-child environment variables,
//! and a capture-or-stream mode. Nothing is ever interpolated into a
//! shell, so descriptor-supplied paths cannot inject commands.
//!
//! # Example
//!
//! ```rust,ignore
//! use qor_builder::process::Cmd;
//!
//! // Quiet query: capture output, tolerate a nonzero exit.
//! let status = Cmd::new("make").arg("-q").current_dir(&dir).allow_fail().run()?;
//! let stale = !status.success();
//!
//! // Interactive build: stream stdout/stderr to the terminal.
//! Cmd::new("make")
//!     .current_dir(&dir)
//!     .error_msg("make failed")
//!     .run_interactive()?;
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Check if a command exists on the host system.
pub fn exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Result of a captured [`Cmd::run`].
#[derive(Debug)]
pub struct CmdStatus {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl CmdStatus {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 if the child was killed by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}

/// Builder for a single external command invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    error_msg: Option<String>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            error_msg: None,
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument verbatim (no lossy conversion surprises
    /// for ASCII paths; non-UTF-8 paths are converted lossily).
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Message used when the command exits nonzero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// A nonzero exit is returned as a status instead of an error.
    /// Spawn failures are still errors.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn check(&self, status: ExitStatus, stderr: &str) -> Result<()> {
        if status.success() || self.allow_fail {
            return Ok(());
        }
        let msg = self
            .error_msg
            .clone()
            .unwrap_or_else(|| format!("command failed: {}", self.display()));
        if stderr.trim().is_empty() {
            bail!("{} ({})", msg, status);
        }
        bail!("{} ({})\n{}", msg, status, stderr.trim_end());
    }

    /// Run with stdout/stderr captured. Returns the status and captured
    /// output; errors on nonzero exit unless [`Cmd::allow_fail`] was set.
    pub fn run(self) -> Result<CmdStatus> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn '{}'", self.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        self.check(output.status, &stderr)?;

        Ok(CmdStatus {
            status: output.status,
            stdout,
            stderr,
        })
    }

    /// Run with stdio inherited so the user sees output live. Blocks
    /// until the child exits.
    pub fn run_interactive(self) -> Result<()> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to spawn '{}'", self.display()))?;
        self.check(status, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let status = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(status.success());
        assert_eq!(status.stdout().trim(), "hello");
    }

    #[test]
    fn test_run_nonzero_is_error() {
        let result = Cmd::new("false").error_msg("expected failure").run();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("expected failure"));
    }

    #[test]
    fn test_allow_fail_returns_status() {
        let status = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!status.success());
        assert_eq!(status.code(), 1);
    }

    #[test]
    fn test_spawn_failure_is_error_even_with_allow_fail() {
        let result = Cmd::new("definitely_not_a_real_command_12345")
            .allow_fail()
            .run();
        assert!(result.is_err());
    }

    #[test]
    fn test_current_dir_and_env() {
        let temp = tempfile::TempDir::new().unwrap();
        let status = Cmd::new("pwd").current_dir(temp.path()).run().unwrap();
        // Canonicalize both sides; macOS tempdirs go through /private.
        assert_eq!(
            std::fs::canonicalize(status.stdout().trim()).unwrap(),
            std::fs::canonicalize(temp.path()).unwrap()
        );

        let status = Cmd::new("env").env("QOR_TEST_VAR", "42").run().unwrap();
        assert!(status.stdout().contains("QOR_TEST_VAR=42"));
    }

    #[test]
    fn test_exists() {
        assert!(exists("ls"));
        assert!(!exists("definitely_not_a_real_command_12345"));
    }
}
