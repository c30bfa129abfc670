use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use forkctl_cli::context::Context;
use forkctl_cli::error::ForkctlError;
use forkctl_cli::{batch, clean, push, record, replay, reset, save, status, telemetry};

/// Deterministic record/replay for forked source repositories.
///
/// forkctl declares a set of managed fork entries in `.forkctl/config.json`
/// — each an upstream repository plus an ordered list of merge refs (commit
/// hashes, PR numbers, or branch names). `record` builds a fresh clone by
/// merging every ref in order, asking an external advisor to resolve
/// whatever conflicts come up; the advisor's resolutions are captured once,
/// positionally, into pins under `.forkctl/pins/<name>/`. `replay` rebuilds
/// the exact same clone from those pins alone, without ever asking the
/// advisor again, and fails loudly if the result doesn't match byte for
/// byte.
///
/// QUICK START:
///
///   forkctl record acme main feature-branch 1234
///   forkctl status acme
///   forkctl save acme "local tweak"
///   forkctl push acme
#[derive(Parser)]
#[command(name = "forkctl")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'forkctl <command> --help' for more information on a specific command.")]
struct Cli {
    /// Path to `config.json`. Defaults to `<repo_root>/.forkctl/config.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Advisor HTTP endpoint, used by `record` to resolve merge conflicts.
    #[arg(long, env = "FORKCTL_ADVISOR_ENDPOINT", default_value = "http://localhost:8787", global = true)]
    advisor_endpoint: String,

    /// Bearer token for the advisor endpoint.
    #[arg(long, env = "FORKCTL_ADVISOR_API_KEY", default_value = "", global = true)]
    advisor_api_key: String,

    /// Emit JSON-formatted logs instead of the default human-readable
    /// format. Useful when `status-all`/`replay-all` run in CI.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh clone for `name` by merging its configured refs.
    ///
    /// Refuses to run if the live clone is dirty (see `status`). Any ref
    /// given on the command line replaces the entry's configured `refs` for
    /// this run only — the config file itself is untouched.
    Record {
        /// The managed entry's name.
        name: String,
        /// Merge refs (commit hash, PR number, or branch name), in order.
        /// Replaces the entry's configured refs when non-empty.
        refs: Vec<String>,
    },

    /// Rebuild `name`'s clone from its pins alone.
    ///
    /// Never contacts the advisor. Fails if the rebuilt HEAD disagrees with
    /// the pinned HEAD — pins are stale, or an upstream ref changed underfoot.
    Replay {
        /// The managed entry's name.
        name: String,
    },

    /// Capture the worktree's divergence from the pinned HEAD as a new
    /// local patch, and rebuild the clone to include it.
    ///
    /// A no-op if the worktree and index already match the pinned HEAD.
    /// `desc` becomes part of the patch filename, sanitized to `[A-Za-z0-9_.-]`
    /// and falling back to `local` if empty after sanitization.
    Save {
        /// The managed entry's name.
        name: String,
        /// A short description, folded into the patch filename.
        desc: Option<String>,
    },

    /// Cherry-pick every commit since the pinned HEAD onto a target branch.
    ///
    /// Defaults to the lexicographically-last `pr-*` branch when no target
    /// is given. Requires a `wip` branch (left by `record`/`replay`) to
    /// exist. Conflicts are left for manual resolution — no auto-rollback.
    Push {
        /// The managed entry's name.
        name: String,
        /// The branch to cherry-pick onto. Defaults to the last `pr-*` branch.
        target: Option<String>,
    },

    /// Report whether `name`'s clone is safe to wipe.
    Status {
        /// The managed entry's name.
        name: String,
    },

    /// Remove `name`'s live clone, but keep its pins.
    Clean {
        /// The managed entry's name.
        name: String,
    },

    /// Remove `name`'s live clone and its pins.
    ///
    /// Erases recorded history — the next `record` starts from nothing.
    Reset {
        /// The managed entry's name.
        name: String,
    },

    /// Run `status` against every configured entry.
    #[command(name = "status-all")]
    StatusAll,

    /// Run `clean` against every configured entry.
    #[command(name = "clean-all")]
    CleanAll,

    /// Run `replay` against every configured entry.
    #[command(name = "replay-all")]
    ReplayAll,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    let ctx = match Context::load(cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Status { name } => match status::run(&ctx, &name) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::StatusAll => {
            if batch::status_all(&ctx) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::CleanAll => {
            if batch::clean_all(&ctx) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::ReplayAll => {
            if batch::replay_all(&ctx) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Record { name, refs } => {
            exit_code(record::run(&ctx, &name, &refs, &cli.advisor_endpoint, &cli.advisor_api_key))
        }
        Commands::Replay { name } => exit_code(replay::run(&ctx, &name)),
        Commands::Save { name, desc } => exit_code(save::run(&ctx, &name, desc.as_deref())),
        Commands::Push { name, target } => exit_code(push::run(&ctx, &name, target.as_deref())),
        Commands::Clean { name } => exit_code(clean::run(&ctx, &name)),
        Commands::Reset { name } => exit_code(reset::run(&ctx, &name)),
    }
}

fn exit_code(result: Result<(), ForkctlError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
