use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsSummary, Sample};

use super::Window;

/// Messages accepted by the pipeline engine, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Add { sample: Sample },
    /// Seeds the store; ignored unless the store is empty.
    BulkAdd { samples: Vec<Sample> },
    ReplaceAll { samples: Vec<Sample> },
    SetWindow { window: Window },
    SetDecimationTarget { target: i64 },
    Snapshot {},
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "add",
            Command::BulkAdd { .. } => "bulkAdd",
            Command::ReplaceAll { .. } => "replaceAll",
            Command::SetWindow { .. } => "setWindow",
            Command::SetDecimationTarget { .. } => "setDecimationTarget",
            Command::Snapshot {} => "snapshot",
        }
    }
}

/// Read-only view of the windowed store: metrics over every retained sample
/// in the window, plus the decimated series for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metrics: MetricsSummary,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    /// Emitted after a mutating command.
    Update,
    /// Answer to an explicit `snapshot` request.
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    #[serde(rename = "payload")]
    pub snapshot: Snapshot,
}
