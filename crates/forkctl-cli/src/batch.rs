//! `forkctl status-all`, `clean-all`, `replay-all` — the aggregate commands
//! that iterate every configured entry and report per-entry outcomes
//! without letting one entry's failure stop the rest.

use forkctl::lifecycle::NamedResult;
use forkctl::replay::ReplayOutcome;
use forkctl::status::Status;

use crate::context::Context;

/// Run `status-all`, returning whether every entry was clean.
#[must_use]
pub fn status_all(ctx: &Context) -> bool {
    let results = forkctl::lifecycle::status_all(&ctx.config, &ctx.pins_root, &ctx.clones_root, &ctx.vcs);
    let mut all_clean = true;
    for NamedResult { name, result } in results {
        match result {
            Ok(status) => {
                println!("{name}: {status}");
                all_clean &= matches!(status, Status::Clean);
            }
            Err(e) => {
                println!("{name}: error — {e}");
                all_clean = false;
            }
        }
    }
    all_clean
}

/// Run `clean-all`, returning whether every entry cleaned without error.
#[must_use]
pub fn clean_all(ctx: &Context) -> bool {
    let results = forkctl::lifecycle::clean_all(&ctx.config, &ctx.pins_root, &ctx.clones_root, &ctx.vcs);
    let mut all_ok = true;
    for NamedResult { name, result } in results {
        match result {
            Ok(()) => println!("{name}: cleaned"),
            Err(e) => {
                println!("{name}: error — {e}");
                all_ok = false;
            }
        }
    }
    all_ok
}

/// Run `replay-all`, returning whether every entry replayed without error.
#[must_use]
pub fn replay_all(ctx: &Context) -> bool {
    let results = forkctl::lifecycle::replay_all(&ctx.config, &ctx.pins_root, &ctx.clones_root, &ctx.vcs);
    let mut all_ok = true;
    for NamedResult { name, result } in results {
        match result {
            Ok(ReplayOutcome::AlreadyPresent) => println!("{name}: already present"),
            Ok(ReplayOutcome::ShallowCloned) => println!("{name}: shallow-cloned"),
            Ok(ReplayOutcome::Skipped { reason }) => println!("{name}: skipped — {reason}"),
            Ok(ReplayOutcome::Replayed { head }) => println!("{name}: replayed to {head}"),
            Err(e) => {
                println!("{name}: error — {e}");
                all_ok = false;
            }
        }
    }
    all_ok
}
