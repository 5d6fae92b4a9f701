use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tablesplit::{FinalizeConfig, FinalizedModel, ModelDeclaration};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tablesplit")]
#[command(about = "Validate and inspect table-splitting model declarations")]
struct Cli {
    /// Log finalization details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Finalize a declaration and report whether it is valid
    Check {
        path: PathBuf,
        #[command(flatten)]
        options: FinalizeOptions,
    },
    /// Finalize a declaration and print its table summary as JSON
    Inspect {
        path: PathBuf,
        #[command(flatten)]
        options: FinalizeOptions,
    },
}

#[derive(clap::Args)]
struct FinalizeOptions {
    /// Reject derived types whose periods differ from their root
    #[arg(long)]
    strict_temporal: bool,
    /// Suffix for derived history table names
    #[arg(long, default_value = "History")]
    history_suffix: String,
    /// Allow hierarchies sharing a table to disagree on temporal settings
    #[arg(long)]
    no_shared_temporal_check: bool,
}

impl FinalizeOptions {
    fn config(&self) -> FinalizeConfig {
        FinalizeConfig::new()
            .history_table_suffix(&self.history_suffix)
            .strict_temporal_markers(self.strict_temporal)
            .validate_shared_temporal(!self.no_shared_temporal_check)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check { path, options } => check(&path, &options),
        Command::Inspect { path, options } => inspect(&path, &options),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tablesplit=debug" } else { "tablesplit=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn finalize(path: &Path, options: &FinalizeOptions) -> Result<FinalizedModel> {
    let declaration = ModelDeclaration::load(path)
        .with_context(|| format!("Failed to load model declaration '{}'", path.display()))?;
    declaration
        .finalize(options.config())
        .with_context(|| format!("Model '{}' failed to finalize", path.display()))
}

fn check(path: &Path, options: &FinalizeOptions) -> Result<()> {
    let model = finalize(path, options)?;
    let summary = model.summary();
    if summary.tables.is_empty() {
        return Err(anyhow!("Model '{}' declares no entity types", path.display()));
    }

    println!("OK: {}", path.display());
    for table in &summary.tables {
        let temporal = table
            .temporal
            .as_ref()
            .map(|resolved| format!(" {}", resolved))
            .unwrap_or_default();
        println!(
            "  {} ({} entity types, rows owned by {}){}",
            table.table,
            table.members.len(),
            table.row_owner,
            temporal
        );
    }
    Ok(())
}

fn inspect(path: &Path, options: &FinalizeOptions) -> Result<()> {
    let model = finalize(path, options)?;
    let json = serde_json::to_string_pretty(&model.summary()).context("Failed to serialize summary")?;
    println!("{}", json);
    Ok(())
}
