//! `forkctl record <name> [ref...]`
//!
//! Builds a fresh clone and pin set for `name` from its configured (or
//! overridden) merge refs, contacting the advisor for any conflicts that
//! arise and recording its resolutions for replay to reuse forever after.

use forkctl::advisor::HttpAdvisor;
use forkctl::hook;

use crate::context::Context;
use crate::error::ForkctlError;

/// Run `record`. `refs` replaces the entry's configured refs for this run
/// when non-empty, per spec.md §6.
pub fn run(
    ctx: &Context,
    name: &str,
    refs: &[String],
    advisor_endpoint: &str,
    advisor_api_key: &str,
) -> Result<(), ForkctlError> {
    let entry = ctx.config.get(name)?;
    let mut pins = ctx.pins(name);
    let clone_dir = ctx.clone_dir(name);
    let advisor: HttpAdvisor = HttpAdvisor::new(advisor_endpoint, advisor_api_key)?;
    let hook = hook::from_entry(entry);

    let outcome = forkctl::record::record(name, refs, entry, &mut pins, &clone_dir, &ctx.vcs, &advisor, hook.as_ref())?;

    println!("recorded `{name}` at {}", outcome.head);
    Ok(())
}
