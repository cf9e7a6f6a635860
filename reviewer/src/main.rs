//! Code review workflow orchestrator CLI.
//!
//! Drives a review run from a free-form request to a published report, using
//! the local adapters configured in `.reviewer/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use reviewer::core::router::{Decision, Halt, route};
use reviewer::core::state::ReviewState;
use reviewer::exit_codes;
use reviewer::io::config::{ReviewConfig, load_config, write_config};
use reviewer::io::input::{InputSource, NoInput, OnceInput, StdinInput};
use reviewer::io::run_state::load_state;
use reviewer::logging;
use reviewer::looping::{CancelToken, LoopOutcome, LoopStop};
use reviewer::start::{DriveTarget, LocalAdapters, allocate_run, drive};

#[derive(Parser)]
#[command(
    name = "reviewer",
    version,
    about = "Code review workflow orchestrator"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = ".reviewer/config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start a new review run for a request.
    Run {
        /// Free-form request, e.g. "review https://github.com/org/repo".
        #[arg(long)]
        input: String,
        /// Ask for corrected input on stdin instead of suspending.
        #[arg(long)]
        interactive: bool,
    },
    /// Continue a persisted run.
    Resume {
        /// State file written by a previous `run` or `resume`.
        #[arg(long)]
        state: PathBuf,
        /// Corrected request for a run awaiting input.
        #[arg(long)]
        input: Option<String>,
        /// Clear a recorded step failure and retry from that step.
        #[arg(long)]
        retry: bool,
    },
    /// Print the next routing decision for a state file.
    Route {
        #[arg(long)]
        state: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run { input, interactive } => {
            let config = load_config(&cli.config)?;
            let source: Box<dyn InputSource> = if interactive {
                Box::new(StdinInput)
            } else {
                Box::new(NoInput)
            };
            let handle = allocate_run(&config.state_dir)?;
            println!("run {}", handle.run_id);
            execute(
                ReviewState::new(input),
                &handle.run_id,
                &handle.state_path,
                &config,
                source.as_ref(),
            )
        }
        Command::Resume {
            state,
            input,
            retry,
        } => {
            let config = load_config(&cli.config)?;
            let mut loaded = load_state(&state)?;
            if retry && let Some(error) = loaded.error.take() {
                info!(reason = %error.reason, "cleared recorded failure");
            }
            let source: Box<dyn InputSource> = match input {
                Some(text) => Box::new(OnceInput::new(text)),
                None => Box::new(NoInput),
            };
            let handle = allocate_run(&config.state_dir)?;
            println!("run {} (resuming {})", handle.run_id, state.display());
            execute(loaded, &handle.run_id, &state, &config, source.as_ref())
        }
        Command::Route { state } => {
            let config = load_config(&cli.config)?;
            let loaded = load_state(&state)?;
            match route(&loaded, &config.route_policy()) {
                Decision::Run(step) => println!("run {step}"),
                Decision::Halt(Halt::Success) => println!("halt success"),
                Decision::Halt(Halt::Failure { reason }) => println!("halt failure: {reason}"),
            }
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &ReviewConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn execute(
    state: ReviewState,
    run_id: &str,
    state_path: &Path,
    config: &ReviewConfig,
    input: &dyn InputSource,
) -> Result<i32> {
    let adapters = LocalAdapters::from_config(config)?;
    let collab = adapters.collaborators(input);
    let outcome = drive(
        state,
        DriveTarget {
            run_id,
            state_path,
        },
        &collab,
        config,
        &CancelToken::new(),
    )?;
    Ok(report(&outcome, state_path))
}

fn report(outcome: &LoopOutcome, state_path: &Path) -> i32 {
    let steps = outcome.steps_executed;
    match &outcome.stop {
        LoopStop::Success => {
            let score = outcome
                .state
                .report
                .as_ref()
                .map(|report| report.overall_score)
                .unwrap_or_default();
            println!(
                "review complete after {steps} steps: ticket {}, overall score {score}/100",
                outcome.state.ticket_id.as_deref().unwrap_or("-")
            );
            exit_codes::OK
        }
        LoopStop::Failed(info) => {
            let step = info.step.map(|s| s.to_string()).unwrap_or_else(|| "run".to_string());
            eprintln!("{step} failed ({}): {}", info.kind, info.reason);
            exit_codes::FAILED
        }
        LoopStop::Cancelled => {
            eprintln!("run cancelled after {steps} steps");
            exit_codes::CANCELLED
        }
        LoopStop::AwaitingInput(request) => {
            eprintln!("{}", request.prompt);
            eprintln!(
                "resume with: reviewer resume --state {} --input <request>",
                state_path.display()
            );
            exit_codes::AWAITING_INPUT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["reviewer", "run", "--input", "review x"]);
        assert!(matches!(
            cli.command,
            Command::Run { ref input, interactive: false } if input == "review x"
        ));
        assert_eq!(cli.config, PathBuf::from(".reviewer/config.toml"));
    }

    #[test]
    fn parse_resume_with_input() {
        let cli = Cli::parse_from([
            "reviewer",
            "--config",
            "cfg.toml",
            "resume",
            "--state",
            "s.json",
            "--input",
            "https://github.com/org/repo",
            "--retry",
        ]);
        assert_eq!(cli.config, PathBuf::from("cfg.toml"));
        assert!(matches!(
            cli.command,
            Command::Resume { ref input, retry: true, .. } if input.as_deref() == Some("https://github.com/org/repo")
        ));
    }

    #[test]
    fn init_writes_default_config_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".reviewer/config.toml");
        assert_eq!(cmd_init(&path, false).expect("init"), exit_codes::OK);
        assert_eq!(load_config(&path).expect("load"), ReviewConfig::default());
        assert_eq!(cmd_init(&path, false).expect("again"), exit_codes::OK);
    }
}
