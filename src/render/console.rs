use std::io::Write;

use tracing::debug;

use crate::metrics::MetricsSummary;
use crate::pipeline::Window;

use super::{RenderedView, SnapshotRenderer};

/// Prints one summary line per rendered view to stdout.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl SnapshotRenderer for ConsoleRenderer {
    fn render(&mut self, view: &RenderedView<'_>) {
        let line = summary_line(view);
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{}", line) {
            debug!("Failed to write summary line: {}", err);
        }
    }
}

/// Single-line rendering of a view, e.g.
/// `[5m live] samples=120 points=120 loss=0.83% avg=12.40ms ...`.
#[must_use]
pub fn summary_line(view: &RenderedView<'_>) -> String {
    let metrics = view.metrics;
    format!(
        "[{} {}] samples={} points={} loss={:.2}% avg={} min={} max={} jitter={}",
        view.window,
        view.origin.as_str(),
        metrics.count,
        view.samples.len(),
        metrics.packet_loss_pct,
        format_latency(metrics.avg_latency_ms),
        format_latency(metrics.min_latency_ms),
        format_latency(metrics.max_latency_ms),
        format_latency(metrics.jitter_ms),
    )
}

/// Multi-line report used by the one-shot `summary` command.
#[must_use]
pub fn summary_lines(window: Window, metrics: &MetricsSummary) -> Vec<String> {
    vec![
        format!("Window: {}", window),
        format!("Samples: {}", metrics.count),
        format!("Successful: {}", metrics.successes),
        format!("Failed: {}", metrics.failures),
        format!("Packet Loss: {:.2}%", metrics.packet_loss_pct),
        format!("Avg Latency: {}", format_latency(metrics.avg_latency_ms)),
        format!("Min Latency: {}", format_latency(metrics.min_latency_ms)),
        format!("Max Latency: {}", format_latency(metrics.max_latency_ms)),
        format!("Jitter: {}", format_latency(metrics.jitter_ms)),
    ]
}

fn format_latency(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |ms| format!("{:.2}ms", ms))
}
