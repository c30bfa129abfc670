//! `forkctl status <name>`
//!
//! Evaluates the status predicate and prints it. Unlike every other
//! subcommand, "dirty" is not a failure of the command — `main` maps the
//! returned cleanliness directly onto the process exit code rather than
//! going through the generic error-implies-1 path.

use forkctl::status::Status;

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `status`, returning whether the entry was clean.
pub fn run(ctx: &Context, name: &str) -> Result<bool, ForkctlError> {
    let entry = ctx.config.get(name)?;
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);

    let status = forkctl::status::status(entry, &pins, &clone_dir, &ctx.vcs)?;
    println!("{name}: {status}");
    Ok(matches!(status, Status::Clean))
}
