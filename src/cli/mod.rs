//! Command-line surface.
//!
//! Thin glue over the tracer, store, and analyzers: argument parsing here,
//! command handlers in [`commands`], terminal rendering in [`render`].

pub mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "tracepulse", version, about = "Phase-resolved HTTP latency tracer")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Trace an endpoint and show the phase breakdown
    Trace {
        /// URL or @preset name
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Header in 'Name: Value' form, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body data
        #[arg(short = 'd', long)]
        data: Option<String>,
        /// Number of requests
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,
        /// Label for grouping
        #[arg(short, long)]
        label: Option<String>,
        /// Do not save results to history
        #[arg(long)]
        no_save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Skip TLS certificate verification
        #[arg(long)]
        insecure: bool,
    },

    /// Compare latency across several endpoints
    Compare {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Requests per URL
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Show trace history (all URLs when none is given)
    History {
        url: Option<String>,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },

    /// Aggregate statistics with percentiles
    Stats { url: String },

    /// Detect latency regressions against history
    Regressions { url: String },

    /// Continuously monitor an endpoint (Ctrl+C to stop)
    Watch {
        url: String,
        /// Seconds between traces
        #[arg(short, long, default_value_t = 10.0)]
        interval: f64,
        /// Alert when total latency exceeds this many milliseconds
        #[arg(short, long)]
        alert_above: Option<f64>,
        #[arg(long)]
        timeout: Option<f64>,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },

    /// Import and trace a cURL command
    Curl {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Manage saved request presets
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Export trace history as CSV or JSON
    Export {
        url: Option<String>,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: u32,
    },

    /// Delete trace history
    Clean {
        #[arg(long)]
        url: Option<String>,
        /// Delete only traces older than N days
        #[arg(long)]
        older_than_days: Option<i64>,
        /// Delete everything
        #[arg(long)]
        all: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run the dashboard API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PresetCommands {
    /// Save a URL as a named preset, usable as `trace @name`
    Save {
        name: String,
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        #[arg(short = 'd', long)]
        data: Option<String>,
    },
    /// List saved presets
    List,
    /// Delete a preset
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Trace { url, method, headers, data, count, timeout, label, no_save, json, insecure } => {
            commands::trace(
                &config,
                commands::TraceArgs {
                    url,
                    method,
                    headers,
                    data,
                    count,
                    timeout,
                    label,
                    no_save,
                    json,
                    insecure,
                },
            )
            .await
        }
        Commands::Compare { urls, count, timeout } => {
            commands::compare(&config, urls, count, timeout).await
        }
        Commands::History { url, label, limit } => {
            commands::history(&config, url, label, limit).await
        }
        Commands::Stats { url } => commands::stats(&config, url).await,
        Commands::Regressions { url } => commands::regressions(&config, url).await,
        Commands::Watch { url, interval, alert_above, timeout, method } => {
            commands::watch(&config, url, interval, alert_above, timeout, method).await
        }
        Commands::Curl { command } => commands::curl(&config, command).await,
        Commands::Preset { command } => commands::preset(&config, command).await,
        Commands::Export { url, label, format, output, limit } => {
            commands::export(&config, url, label, format, output, limit).await
        }
        Commands::Clean { url, older_than_days, all, yes } => {
            commands::clean(&config, url, older_than_days, all, yes).await
        }
        Commands::Serve { port, host } => commands::serve(&config, port, host).await,
    }
}
