//! Build, deploy, and run orchestrator for the Qor OS userland.
//!
//! Decides *whether* and *in what order* to invoke the external build
//! tools for a fixed set of userland targets, then deploys the results
//! onto a loopback-mounted disk image. The crate never compiles
//! anything itself; its job is ordering, fail-fast propagation, and
//! guaranteed cleanup of shared host resources around the external
//! invocations.
//!
//! # Architecture
//!
//! ```text
//! qor-builder <subcommand>
//!     │
//!     ├── registry   - declarative target list (qor-userland/build.json)
//!     ├── build      - staleness query, make invocation, postbuild hooks
//!     ├── disk       - loopback mount session + deploy to the image
//!     ├── runner     - kernel launch + guest output retrieval
//!     └── workflows  - subcommand → composed pipeline
//! ```
//!
//! Execution is single-threaded and sequential throughout: targets are
//! checked and built one at a time in declaration order, and at most
//! one mount session is active process-wide.

pub mod build;
pub mod disk;
pub mod env;
pub mod error;
pub mod fsutil;
pub mod headers;
pub mod preflight;
pub mod process;
pub mod registry;
pub mod runner;
pub mod workflows;

pub use env::QorEnv;
pub use error::{Error, Result};
pub use registry::{Target, TargetRegistry};
pub use workflows::Workflow;
