use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use electerm_data_core::{
    APP_PATH_ENV, AppContext, AppType, RecordStore, Table, ToolConfig, export_all, table_counts,
};
use electerm_data_sqlite::{
    BundledSqlite, MigrationError, MigrationOutcome, MigrationState, RuntimeSupport,
    TableOutcome, authoritative_backend, database_path, is_migration_required, migrate,
    open_authoritative,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit status when migration finished but skipped one or more tables.
const EXIT_TABLES_SKIPPED: i32 = 2;

const RULE_WIDTH: usize = 40;

/// CLI-specific app type enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliAppType {
    Desktop,
    Web,
}

impl From<CliAppType> for AppType {
    fn from(app_type: CliAppType) -> Self {
        match app_type {
            CliAppType::Desktop => Self::Desktop,
            CliAppType::Web => Self::Web,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "electerm-data-tool", version)]
#[command(about = "CLI tool for electerm data migration and export")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Data root containing the electerm directories (overrides APP_PATH).
    #[arg(long, global = true)]
    app_path: Option<PathBuf>,
    /// electerm flavour whose data layout to use.
    #[arg(long, global = true)]
    app_type: Option<CliAppType>,
    /// User namespace under `users/`.
    #[arg(long, global = true)]
    user: Option<String>,
    /// YAML file providing `app_path`, `app_type` and `user` defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate electerm database from v1 (NeDB) to v2 (SQLite).
    Migrate,
    /// Export all electerm data to a JSON file.
    Export(ExportArgs),
    /// Display information about the current electerm data.
    Info,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Path to the output JSON file.
    output_path: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = resolve_context(&cli.global).and_then(|ctx| match cli.command {
        Command::Migrate => run_migrate(&ctx),
        Command::Export(args) => run_export(&ctx, args).map(|()| 0),
        Command::Info => run_info(&ctx).map(|()| 0),
    });

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the [`AppContext`] from flags, then `APP_PATH`, then the config
/// file, then platform defaults.
fn resolve_context(args: &GlobalArgs) -> Result<AppContext, String> {
    let flags = ToolConfig {
        app_path: args.app_path.clone(),
        app_type: args.app_type.map(AppType::from),
        user: args.user.clone(),
    };
    let file = match &args.config {
        Some(path) => ToolConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => ToolConfig::default(),
    };
    let env_app_path = if flags.app_path.is_some() {
        None
    } else {
        std::env::var_os(APP_PATH_ENV).map(PathBuf::from)
    };

    let ctx = flags
        .or(file)
        .resolve(env_app_path)
        .map_err(|e| format!("Failed to resolve data location: {e}"))?;
    debug!(
        app_type = %ctx.app_type(),
        data_root = %ctx.data_root().display(),
        user = ctx.user(),
        "Resolved app context"
    );
    Ok(ctx)
}

fn run_migrate(ctx: &AppContext) -> Result<i32, String> {
    let outcome = migrate(ctx, &BundledSqlite).map_err(|e| match e {
        MigrationError::UnsupportedRuntime(reason) => format!(
            "Migration requires SQLite 3.24.0 or newer: {reason}. \
             You can still use the export command."
        ),
        other => format!("Migration failed: {other}"),
    })?;

    let report = match outcome {
        MigrationOutcome::NotRequired(MigrationState::Completed) => {
            println!("Migration already completed. Nothing to do.");
            return Ok(0);
        }
        MigrationOutcome::NotRequired(state) => {
            println!("No NeDB (v1) data found ({state}). Nothing to migrate.");
            return Ok(0);
        }
        MigrationOutcome::Migrated(report) => report,
    };

    for (table, outcome) in &report.tables {
        if let TableOutcome::Failed {
            stage,
            written,
            error,
        } = outcome
        {
            eprintln!("warning: skipped table {table} ({stage} failed after {written} records): {error}");
        }
    }

    let db_path = database_path(ctx);
    let skipped = report.skipped_tables();
    if skipped.is_empty() {
        println!("Migration from NeDB to SQLite completed successfully!");
        println!(
            "{} records migrated to: {}",
            report.copied_records(),
            db_path.display()
        );
        Ok(0)
    } else {
        println!(
            "Migration from NeDB to SQLite completed with {} skipped table(s).",
            skipped.len()
        );
        println!(
            "{} records migrated to: {}",
            report.copied_records(),
            db_path.display()
        );
        Ok(EXIT_TABLES_SKIPPED)
    }
}

fn run_export(ctx: &AppContext, args: ExportArgs) -> Result<(), String> {
    let mut store = open_authoritative(ctx).map_err(|e| format!("Failed to open database: {e}"))?;
    let backend = store.backend();
    debug!(%backend, "Exporting from authoritative store");

    let snapshot = export_all(store.as_mut(), &Table::ALL);

    let output_path = std::env::current_dir()
        .map_err(|e| format!("Failed to resolve working directory: {e}"))?
        .join(&args.output_path);
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| format!("Failed to serialize export: {e}"))?;
    fs::write(&output_path, json)
        .map_err(|e| format!("Failed to write '{}': {e}", output_path.display()))?;

    println!("Database Type: {}", backend.label());
    println!("Export completed successfully!");
    println!(
        "{} total records exported to: {}",
        snapshot.total_records(),
        output_path.display()
    );
    Ok(())
}

fn run_info(ctx: &AppContext) -> Result<(), String> {
    let backend = authoritative_backend(ctx);
    let migration_recommended = is_migration_required(ctx);

    if migration_recommended {
        println!("v1 database detected.");
        match BundledSqlite.check() {
            Ok(()) => println!("  Run 'electerm-data-tool migrate' to upgrade to v2"),
            Err(reason) => println!("  Migration to v2 is unavailable: {reason}"),
        }
    }

    let mut store = open_authoritative(ctx).map_err(|e| format!("Failed to read database: {e}"))?;
    let counts = table_counts(store.as_mut(), &Table::ALL);

    println!("Electerm Data Information");
    if migration_recommended {
        println!("Database Type: {} - Migration recommended", backend.label());
    } else {
        println!("Database Type: {}", backend.label());
    }
    println!("Data Location: {}", data_location(ctx, store.as_ref()).display());
    println!("{}", "=".repeat(RULE_WIDTH));

    let mut total = 0;
    for entry in &counts {
        match entry.count {
            Some(count) => {
                total += count;
                println!("{:<20}: {count} records", entry.table.as_str());
            }
            None => println!("{:<20}: Error reading table", entry.table.as_str()),
        }
    }

    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Total Records: {total}");
    Ok(())
}

/// Directory (NeDB) or file (SQLite) holding the authoritative data.
fn data_location(ctx: &AppContext, store: &dyn RecordStore) -> PathBuf {
    let location = store.location(Table::Bookmarks);
    if location == database_path(ctx) {
        return location;
    }
    location
        .parent()
        .map(PathBuf::from)
        .unwrap_or(location)
}
