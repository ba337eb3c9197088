//! Schemadoc Export CLI Tool
//!
//! Command-line interface for exporting a database schema to DBML.
//! The model comes either from registered change-sets (`replay`) or from
//! a live database catalog (`inspect`); `info` prints the model to the
//! console without writing an artifact.

use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::distributions::Alphanumeric;
use rand::Rng;
use schemadoc::config::ExportConfig;
use schemadoc::connection::{database_name, open_source, resolve_driver};
use schemadoc::export::{ExportOutcome, ExportSource, Exporter};
use schemadoc::inspect::SchemaInspector;
use schemadoc::replay::registered_versions;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "schemadoc-export")]
#[command(about = "DBML export tool for schemadoc")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database connection URL or SQLite file path
    #[arg(long)]
    database_url: Option<String>,

    /// Directory artifacts are written into
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Table name prefix stripped from exported names
    #[arg(long)]
    prefix: Option<String>,

    /// JSON file mapping catalog type names to documentation type names
    #[arg(long)]
    custom_types: Option<PathBuf>,

    /// Project name override (defaults to the database name)
    #[arg(long)]
    project_name: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export from registered change-sets, no database connection needed
    Replay {
        /// Dry run - list the change-sets that would be replayed
        #[arg(long)]
        dry_run: bool,

        /// Print the dbdocs publish hint after the export
        #[arg(long)]
        dbdocs: bool,
    },

    /// Export from a live database catalog
    Inspect {
        /// Print the dbdocs publish hint after the export
        #[arg(long)]
        dbdocs: bool,
    },

    /// Print tables, columns, indexes and relations without exporting
    Info,
}

/// Effective settings after merging CLI flags over configuration.
struct Settings {
    database_url: String,
    artifact_dir: PathBuf,
    table_prefix: Option<String>,
    custom_types: Option<PathBuf>,
    project_name: Option<String>,
}

impl Settings {
    fn merge(cli: &Cli, config: ExportConfig) -> Self {
        let database_url = cli
            .database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or(config.database_url);

        Self {
            database_url,
            artifact_dir: cli
                .artifact_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(config.artifact_dir)),
            table_prefix: cli.prefix.clone().or(config.table_prefix),
            custom_types: cli
                .custom_types
                .clone()
                .or(config.custom_types.map(PathBuf::from)),
            project_name: cli.project_name.clone().or(config.project_name),
        }
    }
}

/// Change-set registrations for replay exports.
///
/// Applications embedding this binary register their change-sets here
/// before command dispatch.
fn register_changes() {}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = match ExportConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: configuration not loaded, using defaults: {}", e);
            ExportConfig::default()
        }
    };
    let settings = Settings::merge(&cli, config);

    register_changes();

    // Execute command
    let result = match cli.command {
        Commands::Replay { dry_run, dbdocs } => handle_replay(&settings, dry_run, dbdocs),
        Commands::Inspect { dbdocs } => handle_inspect(&settings, dbdocs),
        Commands::Info => handle_info(&settings),
    };

    match result {
        Ok(()) => {
            if !cli.quiet {
                println!("✅ Success");
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    }
}

fn build_exporter(settings: &Settings, driver: &str, project: &str) -> Exporter {
    let exporter = Exporter::new(project, driver, settings.artifact_dir.clone());
    match &settings.custom_types {
        Some(path) => exporter.with_type_overrides_file(path),
        None => exporter,
    }
}

fn project_name(settings: &Settings) -> String {
    settings
        .project_name
        .clone()
        .unwrap_or_else(|| database_name(&settings.database_url))
}

fn handle_replay(settings: &Settings, dry_run: bool, dbdocs: bool) -> anyhow::Result<()> {
    let versions = registered_versions()?;

    if dry_run {
        if versions.is_empty() {
            println!("No change-sets registered, nothing to replay");
            return Ok(());
        }
        println!("Would replay {} change-set(s):", versions.len());
        for (i, version) in versions.iter().enumerate() {
            println!("  {}. version {}", i + 1, version);
        }
        return Ok(());
    }

    let driver = resolve_driver(&settings.database_url)?;
    let project = project_name(settings);

    println!("Replaying change-sets...");
    let exporter = build_exporter(settings, driver.as_str(), &project);
    let outcome = exporter.run(ExportSource::Replay)?;
    report_outcome(&outcome, &project, dbdocs);
    Ok(())
}

fn handle_inspect(settings: &Settings, dbdocs: bool) -> anyhow::Result<()> {
    let project = project_name(settings);
    let inspector = connect_inspector(settings)?;
    let driver = inspector.driver().to_string();

    println!("Inspecting '{}' catalog...", driver);
    let exporter = build_exporter(settings, &driver, &project);
    let outcome = exporter.run(ExportSource::Catalog(inspector))?;
    report_outcome(&outcome, &project, dbdocs);
    Ok(())
}

fn handle_info(settings: &Settings) -> anyhow::Result<()> {
    let project = project_name(settings);
    let inspector = connect_inspector(settings)?;
    let driver = inspector.driver().to_string();

    let exporter = build_exporter(settings, &driver, &project);
    let (_, docs) = exporter.documents(ExportSource::Catalog(inspector))?;

    println!("\n📊 Schema of '{}' ({})\n", project, driver);
    for doc in &docs {
        println!("📦 {}", doc.name.bold());
        let columns = doc.column_listing();
        if !columns.is_empty() {
            println!("{}", columns);
        }
        let indexes = doc.index_listing();
        if !indexes.is_empty() {
            println!("{}", indexes);
        }
        let relations = doc.relation_listing();
        if !relations.is_empty() {
            println!("{}\n", relations);
        }
    }
    println!("📈 Summary: {} table(s)", docs.len());
    Ok(())
}

fn connect_inspector(settings: &Settings) -> anyhow::Result<SchemaInspector> {
    let source = open_source(&settings.database_url)?;
    Ok(match &settings.table_prefix {
        Some(prefix) => SchemaInspector::with_prefix(source, prefix),
        None => SchemaInspector::new(source),
    })
}

fn report_outcome(outcome: &ExportOutcome, project: &str, dbdocs: bool) {
    if outcome.degraded {
        println!(
            "{}",
            "⚠️  Serialization degraded, no artifact was written".yellow()
        );
        return;
    }

    if let Some(path) = &outcome.artifact {
        println!(
            "✅ Created ! File Path : {} ({} table(s))",
            path.display(),
            outcome.tables
        );

        if dbdocs {
            println!(
                "{}",
                "Please Install dbdocs (npm install -g dbdocs) before run command".yellow()
            );
            println!(
                "Now you can run with command : dbdocs build {} --project={} --password={}",
                path.display(),
                project,
                random_password()
            );
        }
    }
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
