//! unity-build - build a Unity project from the command line
//!
//! Picks batchmode when the editor is closed and hands the build to the open
//! editor through `build_trigger.json` / `build_result.json` when it is not.
//!
//! ```text
//! unity-build --config config.json --increment minor
//! unity-build --version 1.4.0 --mode batchmode
//! unity-build --dry-run
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};

use unity_build_core::locator::search_root_from_input;
use unity_build_core::{
    detect_mode, load_editors_cache, save_editors_cache, search_for_editors, BuildConfig,
    BuildError, BuildMode, BuildOrchestrator, BuildOutcome, BuildPlan, ConfiguredMode,
    IncrementKind, PlannedAction, SemanticVersion, EDITORS_CACHE_FILENAME,
};

#[derive(Parser)]
#[command(name = "unity-build")]
#[command(author = "Stevedores Org")]
#[command(about = "Build a Unity project from the command line", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Build this exact version (X.Y.Z) instead of deriving the next one
    #[arg(long = "version", value_name = "X.Y.Z")]
    build_version: Option<String>,

    /// Version part to increment: major, minor or patch
    #[arg(long)]
    increment: Option<IncrementKind>,

    /// Build mode: auto, batchmode or trigger
    #[arg(long)]
    mode: Option<ConfiguredMode>,

    /// Show what would be built without building
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and a JSON plan with --dry-run)
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    unity_build_core::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(error_exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = BuildConfig::load(&cli.config)?.with_overrides(cli.increment, cli.mode);
    let explicit_version = cli
        .build_version
        .as_deref()
        .map(str::parse::<SemanticVersion>)
        .transpose()?;

    let config = ensure_editors_path(config, &cli.config, !cli.dry_run)?;
    let orchestrator = BuildOrchestrator::new(config);
    let plan = orchestrator.plan(explicit_version)?;

    if cli.dry_run {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("{}", render_plan(&plan, orchestrator.config()));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = orchestrator.execute(&plan).await?;
    report_outcome(&plan, &outcome)
}

/// Fill in `unity_editors_path` from the cache or an interactive search when a
/// headless run needs it. A search result is cached only when `persist` is set.
fn ensure_editors_path(
    mut config: BuildConfig,
    config_path: &Path,
    persist: bool,
) -> Result<BuildConfig> {
    if config.unity_editors_path.is_some() {
        return Ok(config);
    }
    if detect_mode(config.build_mode, &config.project_path).mode != BuildMode::Batchmode {
        return Ok(config);
    }

    let cache_path = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(EDITORS_CACHE_FILENAME);

    let editors = match load_editors_cache(&cache_path) {
        Some(path) => {
            info!(editors = %path.display(), "Using cached Unity editors folder");
            path
        }
        None => {
            let path = prompt_for_editors(&mut std::io::stdin().lock(), &mut std::io::stderr())?;
            if persist {
                save_editors_cache(&cache_path, &path);
            }
            path
        }
    };

    config.unity_editors_path = Some(editors);
    Ok(config)
}

/// Ask for search roots until Unity editors are found or the user gives up.
fn prompt_for_editors(input: &mut impl BufRead, output: &mut impl Write) -> Result<PathBuf> {
    loop {
        write!(
            output,
            "Unity editors folder is not configured. \
             Enter a drive letter or folder to search (empty to cancel): "
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 || line.trim().is_empty() {
            return Err(BuildError::Config(
                "Unity editors folder not found; set unity_editors_path in the configuration"
                    .to_string(),
            )
            .into());
        }

        let root = search_root_from_input(&line);
        writeln!(output, "Searching {} ...", root.display())?;
        if let Some(found) = search_for_editors(&root) {
            writeln!(output, "Found Unity editors: {}", found.display())?;
            return Ok(found);
        }
        writeln!(output, "No Unity editors found under {}", root.display())?;
    }
}

fn render_plan(plan: &BuildPlan, config: &BuildConfig) -> String {
    let mut lines = vec![
        "Dry run, nothing will be built".to_string(),
        format!("Version:   {}", plan.version),
        format!("Artifact:  {}", plan.artifact_filename),
        format!(
            "Mode:      {} (editor lock {})",
            plan.mode,
            if plan.lock_present { "present" } else { "absent" }
        ),
        format!("Project:   {}", config.project_path.display()),
        format!("Scenes:    {}", config.scenes.join(", ")),
        format!("Target:    {}", config.build_target),
        format!("Output:    {}", plan.output_path.display()),
    ];
    match &plan.action {
        PlannedAction::Batchmode(command) => {
            lines.push(format!("Command:   {}", command.display_line()));
            for (key, value) in &command.env {
                lines.push(format!("Env:       {key}={value}"));
            }
        }
        PlannedAction::Trigger(request) => {
            let body = serde_json::to_string_pretty(request).unwrap_or_default();
            lines.push(format!("Request:   {body}"));
        }
    }
    lines.join("\n")
}

fn report_outcome(plan: &BuildPlan, outcome: &BuildOutcome) -> Result<ExitCode> {
    if !outcome.success {
        eprintln!("Build failed after {:.1}s", outcome.duration_seconds);
        eprintln!("{}", outcome.error_message);
        return Ok(exit_code(outcome_exit_code(outcome)));
    }

    let size = match std::fs::metadata(&plan.output_path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => bail!("artifact not found: {}", plan.output_path.display()),
    };

    println!("Build succeeded in {:.1}s", outcome.duration_seconds);
    println!("Version:  {}", plan.version);
    println!("Artifact: {}", plan.output_path.display());
    println!("Size:     {:.2} MB", size as f64 / (1024.0 * 1024.0));
    Ok(ExitCode::SUCCESS)
}

fn error_exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<BuildError>()
        .map(BuildError::exit_code)
        .unwrap_or(1)
}

fn outcome_exit_code(outcome: &BuildOutcome) -> i32 {
    match outcome.exit_code {
        Some(code) if code != 0 => code,
        _ => 1,
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(exit_status(code))
}

/// Non-zero process status for a failure code; out-of-range codes become 1.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}
