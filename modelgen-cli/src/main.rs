//! # modelgen
//!
//! CLI tool for generating Rust content models from a schema snapshot.
//!
//! ## Usage
//!
//! ```bash
//! # Generate models using modelgen.toml (or defaults)
//! modelgen generate
//!
//! # Generate from a specific snapshot into a specific directory
//! modelgen generate --schema ./schema.json --models-dir ./src/models
//!
//! # Watch mode for development
//! modelgen generate --watch
//!
//! # Dry run to preview changes
//! modelgen generate --dry-run
//!
//! # Initialize configuration
//! modelgen init
//!
//! # Check that generated models are up-to-date (exit code 2 when not)
//! modelgen validate
//!
//! # Show the outcome of the last run
//! modelgen status --json
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use modelgen::{
    planner::TypeSkip, status::StatusState, Diagnostic, FsFileStore, GenerationMode,
    GenerationStatus, JsonSchemaFile, JsonStatusFile, Orchestrator, RunReport, Severity,
    StatusSink, WriteResult,
};
use modelgen_cli::{
    config::{CliArgs, Config, ConfigManager},
    error::CliError,
    logging,
    validate::validate,
    watcher::{FileWatcher, WatchEvent},
};

#[derive(Parser)]
#[command(name = "modelgen")]
#[command(author, version, about = "Generate Rust content models from a schema snapshot", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate models from the schema snapshot
    Generate {
        /// JSON schema snapshot
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Directory holding hand-authored and generated models
        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Namespace of the generated models
        #[arg(short, long)]
        namespace: Option<String>,

        /// What to produce: nothing, source-only or artifact
        #[arg(long)]
        mode: Option<GenerationMode>,

        /// Output directory for the compiled artifact
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Watch for file changes and regenerate
        #[arg(short, long)]
        watch: bool,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize a new modelgen configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "modelgen.toml")]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate that generated models are up-to-date
    Validate {
        /// JSON schema snapshot
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Directory holding hand-authored and generated models
        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Namespace of the generated models
        #[arg(short, long)]
        namespace: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the outcome of the last generation run
    Status {
        /// Directory holding hand-authored and generated models
        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Generate {
            schema,
            models_dir,
            namespace,
            mode,
            artifact_dir,
            watch,
            dry_run,
            config,
        } => {
            let args = CliArgs {
                models_dir,
                namespace,
                mode,
                schema,
                artifact_dir,
            };
            cmd_generate(config, &args, watch, dry_run)
        }

        Commands::Init { output, force } => cmd_init(output, force),

        Commands::Validate {
            schema,
            models_dir,
            namespace,
            config,
        } => {
            let args = CliArgs {
                models_dir,
                namespace,
                schema,
                ..Default::default()
            };
            cmd_validate(config, &args)
        }

        Commands::Status {
            models_dir,
            json,
            config,
        } => {
            let args = CliArgs {
                models_dir,
                ..Default::default()
            };
            cmd_status(config, &args, json)
        }
    }
}

fn load_config(path: Option<PathBuf>, args: &CliArgs) -> Result<Config, CliError> {
    let config = ConfigManager::load(path.as_deref())?;
    let config = ConfigManager::merge_cli_args(config, args);
    config.validate()?;
    Ok(config)
}

/// Generate command implementation.
fn cmd_generate(
    config_path: Option<PathBuf>,
    args: &CliArgs,
    watch: bool,
    dry_run: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path, args)?;

    if watch {
        run_watch_mode(&config, dry_run)
    } else {
        run_generate(&config, dry_run)
    }
}

/// Run model generation once.
fn run_generate(config: &Config, dry_run: bool) -> Result<(), CliError> {
    println!(
        "{} {} ({} mode)",
        "Generating models in".cyan(),
        config.models.dir.display(),
        config.models.mode
    );

    // A dry run must not overwrite the outcome of the last real run.
    let status: Arc<dyn StatusSink> = if dry_run {
        Arc::new(GenerationStatus::new())
    } else {
        Arc::new(JsonStatusFile::new(config.status_file()))
    };

    let orchestrator = Orchestrator::new(config.settings())
        .with_store(Arc::new(FsFileStore::new(dry_run)))
        .with_status(status)
        .with_compiler(Arc::new(config.compiler()));

    let report = orchestrator.run(&JsonSchemaFile::new(&config.schema.path))?;
    print_report(&report);

    Ok(())
}

/// Run in watch mode.
fn run_watch_mode(config: &Config, dry_run: bool) -> Result<(), CliError> {
    println!("{}", "Starting watch mode...".cyan());
    println!("  Watching: {}", config.models.dir.display());
    println!("  Watching: {}", config.schema.path.display());
    println!("  Press Ctrl+C to stop\n");

    // Initial generation; later failures are reported and the watch goes on.
    if let Err(e) = run_generate(config, dry_run) {
        print_error(&e);
    }

    let watcher = FileWatcher::new(&config.models.dir, &config.schema.path);
    let (_debouncer, rx) = watcher.watch()?;

    println!("\n{}", "Watching for changes...".cyan());

    while let Ok(event) = rx.recv() {
        match &event {
            WatchEvent::Error(message) => {
                println!("{} {}", "Watch error:".red(), message);
                continue;
            }
            WatchEvent::SchemaChanged(path) => {
                println!("\n{} {}", "Schema changed:".cyan(), path.display());
            }
            WatchEvent::SourceChanged(path) | WatchEvent::SourceDeleted(path) => {
                println!("\n{} {}", "File changed:".cyan(), path.display());
            }
        }

        // Drain events of the same burst so one save triggers one run.
        while rx.try_recv().is_ok() {}

        if let Err(e) = run_generate(config, dry_run) {
            println!("{} {}", "Generation error:".red(), e);
        }

        println!("\n{}", "Watching for changes...".cyan());
    }

    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "Error:".red(),
            output.display()
        );
        println!("  Use --force to overwrite");
        return Err(CliError::Validation(
            "Configuration file already exists".to_string(),
        ));
    }

    let content = ConfigManager::default_config_content();
    std::fs::write(&output, content)?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Validate command implementation.
fn cmd_validate(config_path: Option<PathBuf>, args: &CliArgs) -> Result<(), CliError> {
    println!("{}", "Validating models...".cyan());

    let config = load_config(config_path, args)?;
    let report = validate(&config.settings(), &JsonSchemaFile::new(&config.schema.path))?;
    print_diagnostics(&report.diagnostics);

    if report.is_up_to_date() {
        println!(
            "{} {} generated file(s) are up-to-date",
            "✓".green(),
            report.checked
        );
        return Ok(());
    }

    println!("{} Models are out of date", "✗".red());
    for drift in &report.drift {
        println!("  {:>8} {}", drift.kind.to_string().yellow(), drift.path.display());
    }
    println!("  Run 'modelgen generate' to update");

    JsonStatusFile::new(config.status_file()).mark_out_of_date();

    Err(CliError::Validation(format!(
        "{} generated file(s) out of date",
        report.drift.len()
    )))
}

/// Status command implementation.
fn cmd_status(config_path: Option<PathBuf>, args: &CliArgs, json: bool) -> Result<(), CliError> {
    let config = load_config(config_path, args)?;
    let state: StatusState = JsonStatusFile::new(config.status_file()).load()?;
    let dashboard = state.dashboard(config.models.mode);

    if json {
        let content = serde_json::to_string_pretty(&dashboard)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        println!("{}", content);
        return Ok(());
    }

    if dashboard.enable {
        println!("{}", dashboard.text.green());
    } else {
        println!("{}", dashboard.text.yellow());
    }
    if dashboard.out_of_date_models {
        println!("  {}", "Models are out of date.".yellow());
    }
    match &dashboard.last_error {
        Some(error) => {
            println!("  {}", "Last generation reported:".red());
            for line in error.lines() {
                println!("    {}", line);
            }
        }
        None => println!("  {}", "Last generation succeeded.".green()),
    }

    Ok(())
}

/// Print what a run did.
fn print_report(report: &RunReport) {
    if !report.deleted.is_empty() {
        println!(
            "  Removed {} previously generated file(s)",
            report.deleted.len().to_string().green()
        );
    }

    for result in &report.written {
        match result {
            WriteResult::Written { path, bytes } => {
                println!(
                    "{} Written {} bytes to {}",
                    "✓".green(),
                    bytes,
                    path.display()
                );
            }
            WriteResult::DryRun { content, path } => {
                println!(
                    "{} Would write to {}:",
                    "[dry-run]".yellow(),
                    path.display()
                );
                println!("{}", "─".repeat(60).dimmed());
                println!("{}", content);
                println!("{}", "─".repeat(60).dimmed());
            }
        }
    }

    for skipped in &report.skipped_types {
        let reason = match skipped.reason {
            TypeSkip::IgnoredByMarker => "ignored",
            TypeSkip::ImplementedByHand => "implemented by hand",
            TypeSkip::Unresolvable => "unresolvable",
        };
        println!(
            "  {} {} ({})",
            "Skipped".dimmed(),
            skipped.class_name,
            reason
        );
    }

    print_diagnostics(&report.diagnostics);

    if let Some(artifact) = &report.artifact {
        println!(
            "{} Compiled {}",
            "✓".green(),
            artifact.path.display()
        );
    }

    println!(
        "  Generated {} model(s)",
        report.plans.len().to_string().green()
    );
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let line = diagnostic.to_string();
        match diagnostic.severity {
            Severity::Error => println!("  {}", line.red()),
            Severity::Warning => println!("  {}", line.yellow()),
        }
    }
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
