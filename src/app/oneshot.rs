use chrono::Utc;
use tracing::info;

use crate::args::{ExportArgs, SourceArgs};
use crate::error::AppResult;
use crate::metrics::aggregate;
use crate::pipeline::filter_window;
use crate::render::{export_csv, summary_lines};

use super::fetch_once;

pub(crate) async fn run_summary(source: &SourceArgs) -> AppResult<()> {
    let samples = fetch_once(source).await?;
    let windowed = filter_window(&samples, source.window, Utc::now());
    let metrics = aggregate(&windowed);
    for line in summary_lines(source.window, &metrics) {
        println!("{}", line);
    }
    Ok(())
}

pub(crate) async fn run_export(args: &ExportArgs) -> AppResult<()> {
    let samples = fetch_once(&args.source).await?;
    export_csv(&args.out, &samples).await?;
    info!(
        "Exported {} samples to {}",
        samples.len(),
        args.out.display()
    );
    Ok(())
}
