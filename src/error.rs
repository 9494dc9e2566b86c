//! Error kinds for the build-and-deploy pipeline.
//!
//! Every workflow step returns one of these kinds; nothing retries or
//! recovers locally. The binary maps any error to a nonzero exit after
//! printing the full chain.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// One variant per failure class in the pipeline.
///
/// The `anyhow::Error` payloads carry the contextual chain built at the
/// failure site (`{0:#}` prints the whole chain inline).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target descriptor is missing, unreadable, or malformed.
    /// Raised before any external process is spawned.
    #[error("invalid target descriptor '{}': {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    /// The external build tool could not be invoked at all
    /// (spawn failure, missing build directory). A "stale" query
    /// result is NOT a ToolError.
    #[error("failed to invoke {tool} for target '{target}': {cause:#}")]
    Tool {
        tool: String,
        target: String,
        cause: anyhow::Error,
    },

    /// The build tool ran and exited nonzero. Aborts the whole
    /// workflow; later targets are not attempted.
    #[error("build failed for target '{target}': {cause:#}")]
    Build {
        target: String,
        cause: anyhow::Error,
    },

    /// A postbuild action exited nonzero. Earlier actions are not
    /// rolled back.
    #[error("postbuild hook {index} of target '{target}' failed ({command}): {cause:#}")]
    Hook {
        target: String,
        index: usize,
        command: String,
        cause: anyhow::Error,
    },

    /// Loopback binding or mount acquisition failed. Raised before
    /// any filesystem mutation.
    #[error("disk mount failed: {0:#}")]
    Mount(anyhow::Error),

    /// A copy during deploy or output retrieval failed. The mount is
    /// still released by the owning session.
    #[error("disk deploy failed: {0:#}")]
    Deploy(anyhow::Error),

    /// The kernel/emulator process exited nonzero or could not start.
    #[error("kernel run failed: {0:#}")]
    Run(anyhow::Error),

    /// A host-side filesystem operation outside the mount failed
    /// (shared lib dir creation, header sync, single-instance lock).
    #[error("host filesystem operation failed: {0:#}")]
    Host(anyhow::Error),
}
