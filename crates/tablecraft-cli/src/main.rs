//! Tablecraft CLI
//!
//! Command-line access to configuration-driven CRUD screens.

#![warn(clippy::all)]

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tablecraft_cli::cli::{Cli, Command};
use tablecraft_cli::commands::{App, generate_config, render_report};
use tablecraft_cli::config_handlers::handle_config_command;
use tablecraft_cli::TablecraftConfig;
use tablecraft_core::ConfigManager;

fn init_logging(verbose: bool) {
    let default = if verbose { "info,tablecraft=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = match cli.command {
        Command::Config { action } => {
            handle_config_command(cli.config.as_deref(), action)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Generate { metadata, out } => {
            for path in generate_config(&metadata, &out)? {
                println!("{}", path.display());
            }
            return Ok(ExitCode::SUCCESS);
        }
        other => other,
    };

    let mut config = TablecraftConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.config_dir {
        config.config_dir = Some(dir);
    }
    tracing::debug!(base_url = %config.api.base_url, "loaded settings");
    let app = App::connect(&config)?;

    match command {
        Command::Tables => print!("{}", app.tables().await?),
        Command::List {
            table,
            search,
            sort,
            desc,
        } => print!(
            "{}",
            app.list(&table, search.as_deref(), sort.as_deref(), desc)
                .await?
        ),
        Command::Form { table, record } => {
            print!("{}", app.form(&table, record.as_deref()).await?);
        }
        Command::Validate { table, file, edit } => {
            let report = app.validate(&table, &file, edit).await?;
            print!("{}", render_report(&report));
            if !report.is_valid() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Submit { table, file, edit } => {
            let stored = app.submit(&table, &file, edit).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stored).context("rendering stored record")?
            );
        }
        Command::Delete { table, keys } => {
            if app.delete(&table, &keys).await? {
                println!("Deleted");
            } else {
                println!("No matching record");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Config { .. } | Command::Generate { .. } => {}
    }
    Ok(ExitCode::SUCCESS)
}
