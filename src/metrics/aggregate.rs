use super::{MetricsSummary, Sample};

/// Computes windowed statistics over `samples`.
///
/// Latency figures only consider successful samples that carry a latency.
/// Jitter is the mean absolute difference between consecutive entries of
/// that subset, in input order, and needs at least two of them. Input order
/// and duplicate timestamps do not matter for anything but jitter.
#[must_use]
pub fn aggregate(samples: &[Sample]) -> MetricsSummary {
    let count = samples.len() as u64;
    let successes = samples.iter().filter(|sample| sample.success).count() as u64;
    let failures = count.saturating_sub(successes);
    let packet_loss_pct = if count > 0 {
        failures as f64 * 100.0 / count as f64
    } else {
        0.0
    };

    let latencies: Vec<f64> = samples
        .iter()
        .filter(|sample| sample.success)
        .filter_map(|sample| sample.latency_ms)
        .collect();

    let (avg_latency_ms, min_latency_ms, max_latency_ms) = match latencies.split_first() {
        Some((&first, rest)) => {
            let (sum, min, max) = rest.iter().fold(
                (first, first, first),
                |(sum, min, max), &value| (sum + value, min.min(value), max.max(value)),
            );
            (Some(sum / latencies.len() as f64), Some(min), Some(max))
        }
        None => (None, None, None),
    };

    MetricsSummary {
        count,
        successes,
        failures,
        packet_loss_pct,
        avg_latency_ms,
        min_latency_ms,
        max_latency_ms,
        jitter_ms: jitter(&latencies),
    }
}

fn jitter(latencies: &[f64]) -> Option<f64> {
    if latencies.len() < 2 {
        return None;
    }
    let diffs = latencies.windows(2).filter_map(|pair| match pair {
        [previous, current] => Some((current - previous).abs()),
        _ => None,
    });
    let (sum, steps) = diffs.fold((0.0, 0usize), |(sum, steps), diff| {
        (sum + diff, steps.saturating_add(1))
    });
    if steps == 0 {
        None
    } else {
        Some(sum / steps as f64)
    }
}
