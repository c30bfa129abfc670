//! `forkctl clean <name>`
//!
//! Removes the live clone (but not its pins) if the status guard reports it
//! safe to wipe.

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `clean`.
pub fn run(ctx: &Context, name: &str) -> Result<(), ForkctlError> {
    let entry = ctx.config.get(name)?;
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);

    forkctl::lifecycle::clean(entry, &pins, &clone_dir, &ctx.vcs)?;
    println!("cleaned `{name}`");
    Ok(())
}
