//! Terminal rendering for trace results and analysis output.

use chrono::Local;
use colored::{ColoredString, Colorize};

use crate::analysis::{EndpointStats, RegressionFinding, Severity};
use crate::store::{Preset, UrlSummary};
use crate::tracer::{Phase, TraceResult};

const BAR_WIDTH: usize = 30;

fn ms_colored(ms: f64) -> ColoredString {
    let text = format!("{ms:.1}ms");
    if ms < 50.0 {
        text.green()
    } else if ms < 200.0 {
        text.yellow()
    } else if ms < 500.0 {
        text.truecolor(219, 109, 40)
    } else {
        text.red()
    }
}

fn status_colored(status: Option<u16>) -> ColoredString {
    match status {
        Some(code) if (200..300).contains(&code) => code.to_string().green(),
        Some(code) if code < 400 => code.to_string().yellow(),
        Some(code) => code.to_string().red(),
        None => "-".dimmed(),
    }
}

fn bar(value: f64, total: f64) -> String {
    if total <= 0.0 {
        return String::new();
    }
    let filled = ((value / total).min(1.0) * BAR_WIDTH as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Full phase breakdown for one result.
pub fn render_result(result: &TraceResult) {
    if let Some(error) = &result.error {
        println!("\n{} {}\n", "✗".red().bold(), error.message.red());
        return;
    }

    let mut summary = format!(
        "{} {}\nHTTP {}  |  {}  |  {} bytes",
        result.method.bold(),
        result.url,
        status_colored(result.status_code),
        format!("{:.0}ms", result.total_ms).bold(),
        result.response_size.unwrap_or(0),
    );
    if let Some(ip) = &result.ip_address {
        summary.push_str(&format!("  |  {ip}"));
    }
    if let Some(tls) = &result.tls_version {
        summary.push_str(&format!("  |  {tls}"));
    }
    println!("\n{summary}");

    for phase in Phase::MEASURED {
        let Some(ms) = result.phase_ms(phase) else { continue };
        let pct = if result.total_ms > 0.0 { ms / result.total_ms * 100.0 } else { 0.0 };
        println!(
            "  {:<20} {:>10}  {}  {:>5.1}%",
            phase.label(),
            ms_colored(ms),
            bar(ms, result.total_ms).cyan(),
            pct
        );
    }

    // Call out a phase that dominates the trace.
    let slowest = Phase::MEASURED
        .iter()
        .filter_map(|p| result.phase_ms(*p).map(|ms| (*p, ms)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((phase, ms)) = slowest {
        if result.total_ms > 0.0 && ms > result.total_ms * 0.5 {
            println!(
                "  {} {} accounts for {:.0}% of total latency",
                "bottleneck:".yellow(),
                phase.label().bold(),
                ms / result.total_ms * 100.0
            );
        }
    }
    println!();
}

/// Side-by-side comparison of averaged results.
pub fn render_comparison(rows: &[TraceResult]) {
    println!(
        "\n{:<44} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10}",
        "URL".bold(),
        "DNS",
        "TCP",
        "TLS",
        "Server",
        "Transfer",
        "Total"
    );
    for row in rows {
        println!(
            "{:<44} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10}",
            truncate(&row.url, 43),
            ms_cell(row.dns_ms),
            ms_cell(row.tcp_connect_ms),
            ms_cell(row.tls_handshake_ms),
            ms_cell(row.server_processing_ms),
            ms_cell(row.content_transfer_ms),
            ms_colored(row.total_ms).bold()
        );
    }
    println!();
}

/// History table for one URL, oldest first.
pub fn render_history(traces: &[TraceResult]) {
    println!(
        "\n{:<17} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10}",
        "Time".bold(),
        "Status",
        "DNS",
        "TCP",
        "TLS",
        "Server",
        "Transfer",
        "Total"
    );
    for trace in traces {
        let time = trace.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{:<17} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10}",
            time,
            status_colored(trace.status_code),
            ms_cell(trace.dns_ms),
            ms_cell(trace.tcp_connect_ms),
            ms_cell(trace.tls_handshake_ms),
            ms_cell(trace.server_processing_ms),
            ms_cell(trace.content_transfer_ms),
            ms_colored(trace.total_ms).bold()
        );
    }
    println!();
}

/// Summary table of every traced URL.
pub fn render_urls(summaries: &[UrlSummary]) {
    println!("\n{:<54} {:>7} {:>10} {:>10} {:>10}", "URL".bold(), "Traces", "Avg", "Min", "Max");
    for summary in summaries {
        println!(
            "{:<54} {:>7} {:>10} {:>10} {:>10}",
            truncate(&summary.url, 53),
            summary.trace_count,
            ms_colored(summary.avg_total_ms),
            format!("{:.0}ms", summary.min_total_ms).green(),
            format!("{:.0}ms", summary.max_total_ms).red()
        );
    }
    println!();
}

/// Statistics panel for one URL.
pub fn render_stats(stats: &EndpointStats) {
    println!("\n{}", stats.url.cyan().bold());
    println!("  traces:            {}", stats.trace_count.to_string().bold());
    println!("  avg latency:       {}", ms_colored(stats.avg_total_ms).bold());
    println!("  min latency:       {}", format!("{:.0}ms", stats.min_total_ms).green());
    println!("  max latency:       {}", format!("{:.0}ms", stats.max_total_ms).red());
    println!("\n  {}", "percentiles".bold());
    println!("  p50 (median):      {}", ms_colored(stats.p50_ms));
    println!("  p95:               {}", ms_colored(stats.p95_ms));
    println!("  p99:               {}", ms_colored(stats.p99_ms));
    println!("\n  {}", "phase averages".bold());
    println!("  dns:               {:.1}ms", stats.avg_dns_ms);
    println!("  tcp connect:       {:.1}ms", stats.avg_tcp_connect_ms);
    println!("  tls handshake:     {:.1}ms", stats.avg_tls_handshake_ms);
    println!("  server processing: {:.1}ms", stats.avg_server_processing_ms);
    println!("  content transfer:  {:.1}ms\n", stats.avg_content_transfer_ms);
}

/// Regression findings, most severe change first.
pub fn render_findings(url: &str, findings: &[RegressionFinding]) {
    if findings.is_empty() {
        println!("{}", format!("no regressions detected for {url}").green());
        return;
    }
    println!("\n{} {}", "regressions detected for".bold(), url.cyan());
    for finding in findings {
        let severity = match finding.severity {
            Severity::Severe => finding.severity.to_string().red().bold(),
            Severity::Moderate => finding.severity.to_string().truecolor(219, 109, 40),
            _ => finding.severity.to_string().yellow(),
        };
        println!("  [{severity}] {}", finding.message);
    }
    println!();
}

/// Preset listing.
pub fn render_presets(presets: &[Preset]) {
    println!("\n{:<16} {:<8} {:<50} {}", "Name".bold(), "Method", "URL", "Headers");
    for preset in presets {
        let headers = if preset.headers.is_empty() {
            "-".to_string()
        } else {
            format!("{} header(s)", preset.headers.len())
        };
        println!(
            "{:<16} {:<8} {:<50} {}",
            format!("@{}", preset.name).cyan(),
            preset.method,
            truncate(&preset.url, 49),
            headers.dimmed()
        );
    }
    println!();
}

/// One line of `watch` output.
pub fn render_watch_line(result: &TraceResult, alert_above: Option<f64>) {
    let time = Local::now().format("%H:%M:%S");
    match &result.error {
        Some(error) => println!("  [{time}] {} {}", "✗".red(), error.message.red()),
        None => {
            let mut line = format!(
                "  [{time}] {} {:>8}  dns:{:>5} tcp:{:>5} tls:{:>5} srv:{:>5} xfer:{:>5}",
                status_colored(result.status_code),
                ms_colored(result.total_ms),
                ms_short(result.dns_ms),
                ms_short(result.tcp_connect_ms),
                ms_short(result.tls_handshake_ms),
                ms_short(result.server_processing_ms),
                ms_short(result.content_transfer_ms),
            );
            if let Some(limit) = alert_above {
                if result.total_ms > limit {
                    line.push_str(&format!("  {}", format!("ALERT >{limit}ms").red().bold()));
                }
            }
            println!("{line}");
        }
    }
}

fn ms_cell(value: Option<f64>) -> String {
    value.map(|ms| format!("{ms:.1}ms")).unwrap_or_else(|| "-".to_string())
}

fn ms_short(value: Option<f64>) -> String {
    value.map(|ms| format!("{ms:.0}")).unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
