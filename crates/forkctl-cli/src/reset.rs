//! `forkctl reset <name>`
//!
//! Removes both the live clone and its pins if the status guard reports the
//! clone safe to wipe. Unlike `clean`, this erases recorded history — the
//! next `record` starts from nothing.

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `reset`.
pub fn run(ctx: &Context, name: &str) -> Result<(), ForkctlError> {
    let entry = ctx.config.get(name)?;
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);

    forkctl::lifecycle::reset(entry, &pins, &clone_dir, &ctx.vcs)?;
    println!("reset `{name}` — pins and clone both removed");
    Ok(())
}
