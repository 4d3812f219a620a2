//! Consumers of snapshots: the console renderer and CSV export.
mod console;
mod export;


use crate::metrics::{MetricsSummary, Sample};
use crate::pipeline::Window;

pub use console::{ConsoleRenderer, summary_line, summary_lines};
pub use export::{csv_line, export_csv};

/// Where a rendered view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOrigin {
    /// A snapshot produced by the pipeline engine.
    Engine,
    /// A locally computed view from a direct history fetch, used while the
    /// engine's output is stale.
    Fallback,
}

impl RenderOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RenderOrigin::Engine => "live",
            RenderOrigin::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderedView<'view> {
    pub origin: RenderOrigin,
    pub window: Window,
    pub metrics: &'view MetricsSummary,
    pub samples: &'view [Sample],
}

/// Receives every view the coordinator decides to draw.
pub trait SnapshotRenderer: Send {
    fn render(&mut self, view: &RenderedView<'_>);
}
