use std::path::Path;

use chrono::SecondsFormat;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::metrics::Sample;

const CSV_HEADER: &[u8] = b"id,ts_utc,success,latency_ms\n";

/// Writes `samples` as CSV, numbering rows from 1. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns an error when the file cannot be created or written.
pub async fn export_csv(path: &Path, samples: &[Sample]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(CSV_HEADER).await?;
    for (index, sample) in samples.iter().enumerate() {
        let line = csv_line(index.saturating_add(1), sample);
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// One CSV row, newline included. Absent latency is an empty field.
#[must_use]
pub fn csv_line(id: usize, sample: &Sample) -> String {
    let latency = sample
        .latency_ms
        .map(|value| value.to_string())
        .unwrap_or_default();
    format!(
        "{},{},{},{}\n",
        id,
        sample
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        u8::from(sample.success),
        latency
    )
}
