//! `forkctl save <name> [desc]`
//!
//! Captures the worktree's divergence from the pinned HEAD as a new local
//! patch, then rebuilds the clone from that HEAD by reapplying every local
//! patch (including the new one) under deterministic identities.

use forkctl::lifecycle::SaveOutcome;

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `save`. `desc` defaults to `"local"` when absent, matching
/// [`forkctl::local_patch::sanitize_desc`]'s fallback.
pub fn run(ctx: &Context, name: &str, desc: Option<&str>) -> Result<(), ForkctlError> {
    let entry = ctx.config.get(name)?;
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);

    let outcome = forkctl::lifecycle::save(name, desc.unwrap_or("local"), entry, &pins, &clone_dir, &ctx.vcs)?;

    match outcome {
        SaveOutcome::NoChanges => println!("`{name}` matches its pinned HEAD; nothing to save"),
        SaveOutcome::Saved { filename, head } => println!("saved `{name}` as {filename}, HEAD now {head}"),
    }
    Ok(())
}
