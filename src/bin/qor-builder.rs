use std::process::ExitCode;

use anyhow::Context;
use qor_builder::env::QorEnv;
use qor_builder::error::Error;
use qor_builder::preflight::acquire_instance_lock;
use qor_builder::workflows::{self, Workflow};

fn usage(prog: &str) {
    println!("USAGE: {} <subcommand>", prog);
    println!();
    println!("   Subcommands:");
    println!("     clean                Delete all binaries and libraries");
    println!("     build                Build all of the userland programs");
    println!("     build-run            Build all of the userland programs and then run");
    println!("     disk                 Move necessary files to disk");
    println!("     rebuild              Delete all binaries and libraries, and then build");
    println!("     run                  Run Qor");
    println!("     update               Update header files");
}

fn main() -> ExitCode {
    let mut args = std::env::args();
    let prog = args.next().unwrap_or_else(|| "qor-builder".to_string());

    let Some(token) = args.next() else {
        usage(&prog);
        eprintln!("ERROR: Expected subcommand");
        return ExitCode::FAILURE;
    };

    let Some(workflow) = Workflow::parse(&token) else {
        usage(&prog);
        eprintln!("ERROR: Unknown subcommand {}", token);
        return ExitCode::FAILURE;
    };

    match run(workflow) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(workflow: Workflow) -> qor_builder::Result<()> {
    let cwd = std::env::current_dir()
        .context("resolving current directory")
        .map_err(Error::Host)?;
    let env = QorEnv::load(cwd).map_err(Error::Host)?;

    // Held until the process exits; a second invocation against the
    // same tree fails fast instead of racing for the loop device.
    let _lock = acquire_instance_lock(env.root())?;

    workflows::dispatch(&env, workflow)
}
