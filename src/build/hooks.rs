//! Postbuild hook execution.
//!
//! Hooks are the `postbuild` actions a target declares: auxiliary
//! commands (typically file copies) run in declared order, once each,
//! immediately after that target rebuilt. The first failing hook aborts
//! the whole workflow; already-run hooks are not rolled back.
//!
//! Actions are split into an argument list and executed directly, never
//! through a shell interpreter.

use anyhow::anyhow;

use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::process::Cmd;
use crate::registry::Target;

/// Split a descriptor action string into program + arguments.
///
/// Whitespace-separated; no quoting or expansion is supported, which
/// covers the `cp src dst` style actions the descriptor uses.
pub fn parse_action(action: &str) -> Option<(String, Vec<String>)> {
    let mut words = action.split_whitespace().map(str::to_string);
    let program = words.next()?;
    Some((program, words.collect()))
}

/// Run every postbuild action of `target`, in declared order.
pub fn run_postbuild(env: &QorEnv, target: &Target) -> Result<()> {
    for (index, action) in target.postbuild.iter().enumerate() {
        let hook_err = |cause: anyhow::Error| Error::Hook {
            target: target.name.clone(),
            index,
            command: action.clone(),
            cause,
        };

        let (program, args) =
            parse_action(action).ok_or_else(|| hook_err(anyhow!("empty action")))?;

        println!("    {}", action);
        let status = Cmd::new(program)
            .args(args)
            .current_dir(env.root())
            .envs(env.tool_env())
            .error_msg("hook exited nonzero")
            .run()
            .map_err(hook_err)?;

        for line in status.stdout().lines().chain(status.stderr().lines()) {
            println!("      {}", line);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_splits_words() {
        let (program, args) = parse_action("cp libc/bin/libc.a qor-userland/lib/libc.a").unwrap();
        assert_eq!(program, "cp");
        assert_eq!(args, ["libc/bin/libc.a", "qor-userland/lib/libc.a"]);
    }

    #[test]
    fn test_parse_action_empty_is_none() {
        assert!(parse_action("   ").is_none());
    }
}
