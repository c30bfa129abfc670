//! `forkctl push <name> [target]`
//!
//! Cherry-picks every commit since the pinned HEAD onto `target` (or, if
//! absent, the lexicographically-last `pr-*` branch). Conflicts are left
//! for the operator to resolve by hand — no automatic rollback.

use forkctl::lifecycle::PushOutcome;

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `push`.
pub fn run(ctx: &Context, name: &str, target: Option<&str>) -> Result<(), ForkctlError> {
    let pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);

    let outcome = forkctl::lifecycle::push(name, target, &pins, &clone_dir, &ctx.vcs)?;

    match outcome {
        PushOutcome::Pushed { target } => println!("pushed `{name}` onto {target}"),
        PushOutcome::Conflicted { target, paths } => {
            println!("`{name}` conflicted cherry-picking onto {target} in {} file(s):", paths.len());
            for path in &paths {
                println!("  {path}");
            }
            println!("resolve by hand in the clone, then `git cherry-pick --continue`");
        }
    }
    Ok(())
}
