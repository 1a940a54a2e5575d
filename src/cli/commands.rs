//! Command handlers.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use colored::Colorize;
use tokio::net::TcpListener;

use crate::analysis::{compute_stats, detect_regressions};
use crate::cli::{render, ExportFormat, PresetCommands};
use crate::config::AppConfig;
use crate::curl::parse_curl;
use crate::dashboard::{self, AppState};
use crate::export;
use crate::store::{Preset, QueryFilter, SqliteStore, TraceStore};
use crate::tracer::{trace_many, trace_urls, Recorder, TraceRequest, TraceResult};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// History window consulted for stats and regression analysis.
const ANALYSIS_WINDOW: u32 = 200;

pub struct TraceArgs {
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub data: Option<String>,
    pub count: usize,
    pub timeout: Option<f64>,
    pub label: Option<String>,
    pub no_save: bool,
    pub json: bool,
    pub insecure: bool,
}

async fn open_store(config: &AppConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    Ok(SqliteStore::open(&config.store.database_path()).await?)
}

fn parse_header_args(headers: &[String]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|h| h.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn timeout_from(config: &AppConfig, flag: Option<f64>) -> Duration {
    flag.map(|secs| Duration::from_secs_f64(secs.max(0.0)))
        .unwrap_or_else(|| config.trace.timeout())
}

pub async fn trace(config: &AppConfig, args: TraceArgs) -> CommandResult {
    let store = open_store(config).await?;

    // `@name` pulls a saved preset; explicit flags still win.
    let from_preset = args.url.starts_with('@');
    let mut request = if let Some(name) = args.url.strip_prefix('@') {
        let Some(preset) = store.get_preset(name).await? else {
            eprintln!("{} preset '{name}' not found", "error:".red().bold());
            return Ok(());
        };
        println!("{}", format!("using preset: {} {}", preset.method, preset.url).dimmed());
        let mut request = TraceRequest::new(&preset.url).with_method(&preset.method);
        request.headers.extend(preset.headers);
        request.body = preset.body.map(String::into_bytes);
        request
    } else {
        TraceRequest::new(&args.url)
    };

    if !from_preset || args.method != "GET" {
        request.method = args.method.to_ascii_uppercase();
    }
    for (name, value) in parse_header_args(&args.headers) {
        request.headers.insert(name, value);
    }
    if let Some(data) = args.data {
        request.body = Some(data.into_bytes());
    }
    request.timeout = timeout_from(config, args.timeout);
    request.label = args.label;
    request.insecure = args.insecure;

    let results = trace_many(&request, args.count).await?;

    if args.json {
        if results.len() == 1 {
            println!("{}", serde_json::to_string_pretty(&results[0])?);
        } else {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    } else {
        for (i, result) in results.iter().enumerate() {
            if results.len() > 1 {
                println!("{}", format!("--- request {}/{} ---", i + 1, results.len()).dimmed());
            }
            render::render_result(result);
        }
        if results.len() > 1 {
            if let Some(avg) = TraceResult::averaged(&results) {
                println!("{}", "--- average ---".dimmed());
                render::render_result(&avg);
            }
        }
    }

    if !args.no_save {
        for result in &results {
            store.append(result).await?;
        }
        println!("{}", format!("  saved {} trace(s) to history", results.len()).dimmed());
    }
    Ok(())
}

pub async fn compare(
    config: &AppConfig,
    urls: Vec<String>,
    count: usize,
    timeout: Option<f64>,
) -> CommandResult {
    println!("{}", format!("tracing {} URLs concurrently ({count} each)...", urls.len()).dimmed());
    let base = TraceRequest::new(&urls[0]).with_timeout(timeout_from(config, timeout));
    let grouped = trace_urls(&base, &urls, count).await?;

    let mut rows = Vec::new();
    for (url, results) in grouped {
        if let Some(avg) = TraceResult::averaged(&results) {
            rows.push(avg);
        } else {
            eprintln!("{} no successful traces for {url}", "warning:".yellow());
        }
    }
    render::render_comparison(&rows);
    Ok(())
}

pub async fn history(
    config: &AppConfig,
    url: Option<String>,
    label: Option<String>,
    limit: u32,
) -> CommandResult {
    let store = open_store(config).await?;
    let Some(url) = url else {
        let summaries = store.list_urls().await?;
        if summaries.is_empty() {
            println!("{}", "no traces yet; run 'tracepulse trace <url>' first".dimmed());
        } else {
            render::render_urls(&summaries);
        }
        return Ok(());
    };

    let url = crate::tracer::normalize_url(&url);
    let filter = QueryFilter { label, limit: Some(limit), ..QueryFilter::default() };
    let traces = store.query(&url, &filter).await?;
    if traces.is_empty() {
        println!("{}", "no traces found".dimmed());
    } else {
        render::render_history(&traces);
    }
    Ok(())
}

pub async fn stats(config: &AppConfig, url: String) -> CommandResult {
    let store = open_store(config).await?;
    let url = crate::tracer::normalize_url(&url);
    let results = store.query(&url, &QueryFilter::latest(ANALYSIS_WINDOW)).await?;
    let stats = compute_stats(&url, &results);
    if stats.trace_count == 0 {
        println!("{}", format!("no successful traces for {url}").dimmed());
    } else {
        render::render_stats(&stats);
    }
    Ok(())
}

pub async fn regressions(config: &AppConfig, url: String) -> CommandResult {
    let store = open_store(config).await?;
    let url = crate::tracer::normalize_url(&url);
    let results = store.query(&url, &QueryFilter::latest(ANALYSIS_WINDOW)).await?;
    let findings = detect_regressions(&results, &config.regression);
    render::render_findings(&url, &findings);
    Ok(())
}

pub async fn watch(
    config: &AppConfig,
    url: String,
    interval: f64,
    alert_above: Option<f64>,
    timeout: Option<f64>,
    method: String,
) -> CommandResult {
    let store = open_store(config).await?;
    let request = TraceRequest::new(&url)
        .with_method(&method)
        .with_timeout(timeout_from(config, timeout));

    println!(
        "\n{} {} every {interval}s{}",
        "watching".cyan().bold(),
        request.url,
        alert_above.map(|ms| format!(" | alert above {ms}ms")).unwrap_or_default()
    );
    println!("{}", "press Ctrl+C to stop\n".dimmed());

    let recorder = Recorder::new();
    let mut traced = 0u64;
    loop {
        let result = recorder.trace(&request).await?;
        store.append(&result).await?;
        render::render_watch_line(&result, alert_above);
        traced += 1;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs_f64(interval.max(0.0))) => {}
        }
    }

    println!("\n{}", format!("stopped after {traced} trace(s)").dimmed());
    let results = store.query(&request.url, &QueryFilter::latest(ANALYSIS_WINDOW)).await?;
    let stats = compute_stats(&request.url, &results);
    if stats.trace_count > 0 {
        println!(
            "{}",
            format!(
                "  avg {:.0}ms | min {:.0}ms | max {:.0}ms",
                stats.avg_total_ms, stats.min_total_ms, stats.max_total_ms
            )
            .dimmed()
        );
    }
    Ok(())
}

pub async fn curl(config: &AppConfig, command: Vec<String>) -> CommandResult {
    let store = open_store(config).await?;
    let mut request = match parse_curl(&command.join(" ")) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return Ok(());
        }
    };
    request.timeout = config.trace.timeout();
    println!("{}", format!("parsed: {} {}", request.method, request.url).dimmed());

    let result = Recorder::new().trace(&request).await?;
    render::render_result(&result);
    let id = store.append(&result).await?;
    println!("{}", format!("  trace #{id} saved").dimmed());
    Ok(())
}

pub async fn preset(config: &AppConfig, command: PresetCommands) -> CommandResult {
    let store = open_store(config).await?;
    match command {
        PresetCommands::Save { name, url, method, headers, data } => {
            let preset = Preset {
                name: name.clone(),
                url: crate::tracer::normalize_url(&url),
                method: method.to_ascii_uppercase(),
                headers: parse_header_args(&headers).into_iter().collect(),
                body: data,
            };
            store.save_preset(&preset).await?;
            println!("{} preset '{name}' saved -> {} {}", "ok:".green(), preset.method, preset.url);
            println!("{}", format!("  use: tracepulse trace @{name}").dimmed());
        }
        PresetCommands::List => {
            let presets = store.list_presets().await?;
            if presets.is_empty() {
                println!("{}", "no presets; use 'tracepulse preset save <name> <url>'".dimmed());
            } else {
                render::render_presets(&presets);
            }
        }
        PresetCommands::Delete { name } => {
            if store.delete_preset(&name).await? {
                println!("{} preset '{name}' deleted", "ok:".green());
            } else {
                eprintln!("{} preset '{name}' not found", "error:".red().bold());
            }
        }
    }
    Ok(())
}

pub async fn export(
    config: &AppConfig,
    url: Option<String>,
    label: Option<String>,
    format: ExportFormat,
    output: Option<PathBuf>,
    limit: u32,
) -> CommandResult {
    let store = open_store(config).await?;
    let traces = match url {
        Some(url) => {
            let url = crate::tracer::normalize_url(&url);
            let filter = QueryFilter { label, limit: Some(limit), ..QueryFilter::default() };
            store.query(&url, &filter).await?
        }
        None => store.recent(limit).await?,
    };
    if traces.is_empty() {
        println!("{}", "no traces to export".dimmed());
        return Ok(());
    }

    let content = match format {
        ExportFormat::Csv => export::to_csv(&traces),
        ExportFormat::Json => export::to_json(&traces)?,
    };
    match output {
        Some(path) => {
            std::fs::write(&path, content)?;
            println!("{} exported {} trace(s) to {}", "ok:".green(), traces.len(), path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

pub async fn clean(
    config: &AppConfig,
    url: Option<String>,
    older_than_days: Option<i64>,
    all: bool,
    yes: bool,
) -> CommandResult {
    if url.is_none() && older_than_days.is_none() && !all {
        eprintln!("{} pass --url, --older-than-days, or --all", "error:".red().bold());
        return Ok(());
    }
    if !yes {
        print!("Delete trace history? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("aborted");
            return Ok(());
        }
    }

    let store = open_store(config).await?;
    let url = url.map(|u| crate::tracer::normalize_url(&u));
    let deleted = match older_than_days {
        Some(days) => {
            let cutoff = Utc::now() - ChronoDuration::days(days);
            store.purge_before(cutoff, url.as_deref()).await?
        }
        None => store.purge(url.as_deref()).await?,
    };
    println!("{} deleted {deleted} trace(s)", "ok:".green());
    Ok(())
}

pub async fn serve(config: &AppConfig, port: Option<u16>, host: Option<String>) -> CommandResult {
    let store = open_store(config).await?;

    let bind_address = match (host, port) {
        (None, None) => config.dashboard.bind_address.clone(),
        (host, port) => {
            let default: std::net::SocketAddr = config.dashboard.bind_address.parse()?;
            format!(
                "{}:{}",
                host.unwrap_or_else(|| default.ip().to_string()),
                port.unwrap_or_else(|| default.port())
            )
        }
    };

    let listener = TcpListener::bind(&bind_address).await?;
    println!("{} http://{bind_address}", "tracepulse dashboard API at".cyan().bold());

    let state = AppState {
        store: Arc::new(store),
        regression: config.regression.clone(),
        trace_defaults: config.trace.clone(),
    };
    dashboard::serve(listener, state).await?;
    Ok(())
}
