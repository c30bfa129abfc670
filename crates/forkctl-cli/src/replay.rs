//! `forkctl replay <name>`
//!
//! Reproduces `name`'s clone from its pins alone — it never contacts the
//! advisor. Fails loudly if the rebuilt HEAD disagrees with the pinned one.

use forkctl::hook;
use forkctl::replay::ReplayOutcome;

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `replay`.
pub fn run(ctx: &Context, name: &str) -> Result<(), ForkctlError> {
    let entry = ctx.config.get(name)?;
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);
    let hook = hook::from_entry(entry);

    let outcome = forkctl::replay::replay(name, entry, &pins, &clone_dir, &ctx.vcs, hook.as_ref())?;

    match outcome {
        ReplayOutcome::AlreadyPresent => println!("`{name}` already present at {}", clone_dir.display()),
        ReplayOutcome::ShallowCloned => println!("`{name}` is reference-only; shallow-cloned"),
        ReplayOutcome::Skipped { reason } => println!("`{name}` skipped: {reason}"),
        ReplayOutcome::Replayed { head } => println!("replayed `{name}` to {head}"),
    }
    Ok(())
}
