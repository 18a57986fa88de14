use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use econ_kernel::completion::{generate_completion, parse_shell_name};
use econ_kernel::{step, KernelError, ScenarioFile};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "econ-kernel")]
#[command(about = "Advances a deterministic economic scenario turn by turn.")]
struct Cli {
    /// Path to a scenario file (YAML, TOML or JSON) bundling an initial
    /// state and trigger list.
    #[arg(short, long)]
    scenario: Option<String>,

    /// Number of turns to advance.
    #[arg(short = 'n', long, default_value_t = 1)]
    steps: usize,

    /// Write the final state and the concatenated audit trail to this path
    /// as JSON. When omitted, a colored per-step summary prints instead.
    #[arg(short, long)]
    output: Option<String>,

    /// Log level: error, warn, info, debug, trace. Can also be set via
    /// RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable colored terminal output.
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Print reducer implementations registered for a reducer slot and exit.
    #[arg(long)]
    list_reducers: bool,

    /// Show a progress bar instead of a per-step summary. Only meaningful
    /// alongside --output, since the bar and the per-step printout would
    /// otherwise fight over the same terminal lines.
    #[arg(long, default_value_t = false)]
    progress: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a shell completion script for this CLI to stdout.
    Completions {
        /// bash, zsh, fish or powershell
        shell: String,
    },
}

#[derive(Serialize)]
struct RunOutput {
    final_state: econ_kernel::GlobalState,
    audits: Vec<econ_kernel::StepAudit>,
    newly_fired: Vec<Vec<String>>,
    newly_expired: Vec<Vec<String>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &cli.log_level);
    }
    env_logger::init();

    if let Some(Command::Completions { shell }) = &cli.command {
        let shell_enum = parse_shell_name(shell)
            .ok_or_else(|| format!("unsupported shell '{}'; try bash, zsh, fish or powershell", shell))?;
        generate_completion::<Cli>(shell_enum, "econ-kernel", &mut io::stdout());
        return Ok(());
    }

    if cli.list_reducers {
        for (reducer_type, impl_name) in econ_kernel::reducers::list_reducer_implementations() {
            println!("{} -> {}", reducer_type.bold(), impl_name);
        }
        return Ok(());
    }

    let scenario_path = cli
        .scenario
        .ok_or("--scenario <path> is required unless --list-reducers or a subcommand is given")?;

    info!("{}", format!("loading scenario from {}", scenario_path).bright_cyan());
    let scenario = ScenarioFile::from_file(&scenario_path)?;
    debug!(
        "loaded {} countries and {} triggers",
        scenario.initial_state.countries.len(),
        scenario.triggers.len()
    );

    let mut state = scenario.initial_state;
    let triggers = scenario.triggers;
    let mut fired_set = BTreeSet::new();
    let mut fire_turn_map = BTreeMap::new();
    let mut audits = Vec::with_capacity(cli.steps);
    let mut newly_fired_per_step = Vec::with_capacity(cli.steps);
    let mut newly_expired_per_step = Vec::with_capacity(cli.steps);

    let show_progress = cli.progress && cli.output.is_some();
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(cli.steps as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
                .expect("invalid progress bar template")
                .progress_chars("=>-"),
        );
        pb.set_message("simulating");
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    for turn in 0..cli.steps {
        let now = Utc::now();
        let result = step(state, &triggers, fired_set, fire_turn_map, now);

        if let Some(pb) = &progress_bar {
            pb.inc(1);
        } else if cli.output.is_none() {
            print_step_summary(turn, &result.audit, &result.newly_fired, &result.newly_expired);
        }
        if !result.audit.errors.is_empty() {
            for err in &result.audit.errors {
                warn!("{}", err);
            }
        }

        state = result.new_state;
        fired_set = result.fired_set;
        fire_turn_map = result.fire_turn_map;
        newly_fired_per_step.push(result.newly_fired);
        newly_expired_per_step.push(result.newly_expired);
        audits.push(result.audit);
    }
    if let Some(pb) = &progress_bar {
        pb.finish_with_message("done");
    }
    let elapsed = start.elapsed();

    info!(
        "{}",
        format!(
            "advanced {} steps in {:.3}s ({:.0} steps/s)",
            cli.steps,
            elapsed.as_secs_f64(),
            cli.steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
        )
        .bright_green()
    );

    if let Some(output_path) = cli.output {
        let out = RunOutput {
            final_state: state,
            audits,
            newly_fired: newly_fired_per_step,
            newly_expired: newly_expired_per_step,
        };
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| KernelError::JsonSerialize(e.to_string()))?;
        fs::write(&output_path, json).map_err(KernelError::IoError)?;
        info!("{}", format!("audit trail written to {}", output_path).bright_blue());
    }

    Ok(())
}

fn print_step_summary(
    turn: usize,
    audit: &econ_kernel::StepAudit,
    newly_fired: &[String],
    newly_expired: &[String],
) {
    println!(
        "{} {} {}",
        "step".bold(),
        turn,
        format!("(t={})", audit.timestep).dimmed()
    );
    println!(
        "  {} {}",
        "reducers:".dimmed(),
        audit.reducer_sequence.join(", ")
    );
    println!(
        "  {} {}",
        "field changes:".dimmed(),
        audit.field_changes.len().to_string().yellow()
    );
    if !newly_fired.is_empty() {
        println!("  {} {}", "fired:".green(), newly_fired.join(", "));
    }
    if !newly_expired.is_empty() {
        println!("  {} {}", "expired:".magenta(), newly_expired.join(", "));
    }
    if !audit.errors.is_empty() {
        println!("  {} {}", "errors:".red().bold(), audit.errors.join("; "));
    }
}
