pub mod anomalies;
pub mod chain;
pub mod changes;
pub mod cli;
pub mod columns;
pub mod condition;
pub mod config;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod explain;
pub mod io_utils;
pub mod operations;
pub mod plan;
pub mod profile;
pub mod quality;
pub mod relationships;
pub mod sandbox;
pub mod stats;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, OutputFormat},
    config::EngineConfig,
    engine::Engine,
    operations::{OPERATION_ALIASES, OPERATION_NAMES},
    plan::CommandPlan,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_insight", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Profile(args) => handle_profile(&args),
        Commands::Apply(args) => handle_apply(&args),
        Commands::Operations => {
            handle_operations();
            Ok(())
        }
    }
}

fn handle_profile(args: &cli::ProfileArgs) -> Result<()> {
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let dataset = io_utils::read_dataset(&args.input, args.delimiter)?;
    info!(
        "Profiling {} row(s) across {} column(s) from {:?}",
        dataset.row_count(),
        dataset.column_count(),
        args.input
    );
    let profile = profile::profile_dataset(&dataset, &config);
    match args.format {
        OutputFormat::Table => print!("{}", table::render_profile(&profile)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&profile).context("Serializing profile")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn handle_apply(args: &cli::ApplyArgs) -> Result<()> {
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let plan = CommandPlan::load(&args.plan)?;
    let dataset = io_utils::read_dataset(&args.input, args.delimiter)?;
    info!(
        "Applying {} step(s) to {} row(s) from {:?}",
        plan.step_count(),
        dataset.row_count(),
        args.input
    );

    let result = Engine::new(config).apply(dataset, &plan);
    if args.changes_json {
        let json = serde_json::to_string_pretty(&result).context("Serializing change log")?;
        eprintln!("{json}");
    }
    if args.explain || !result.success {
        for line in explain::describe_result(&result) {
            eprintln!("{line}");
        }
    }
    if let Some(failure) = &result.error {
        return Err(anyhow!(failure.message.clone()));
    }

    if let Some(limit) = args.preview {
        print!("{}", table::render_preview(&result.dataset, limit));
        info!(
            "Previewed {} of {} row(s); {} row(s) removed",
            limit.min(result.dataset.row_count()),
            result.dataset.row_count(),
            result.rows_removed()
        );
        return Ok(());
    }

    io_utils::write_dataset(&result.dataset, args.output.as_deref(), args.delimiter)
        .with_context(|| match &args.output {
            Some(path) => format!("Writing output to {path:?}"),
            None => "Writing output to stdout".to_string(),
        })?;
    info!(
        "Wrote {} row(s) after {} change(s); {} row(s) removed",
        result.dataset.row_count(),
        result.changes.len(),
        result.rows_removed()
    );
    Ok(())
}

fn handle_operations() {
    let rows = OPERATION_NAMES
        .iter()
        .map(|name| {
            let aliases = OPERATION_ALIASES
                .iter()
                .filter(|(_, canonical)| canonical == name)
                .map(|(alias, _)| *alias)
                .join(", ");
            vec![name.to_string(), aliases]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&["operation", "aliases"], &rows));
}
