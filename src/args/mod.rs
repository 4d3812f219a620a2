//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;


pub use cli::{Command, ExportArgs, LinkpulseArgs, SourceArgs, SummaryArgs, WatchArgs};
pub use types::PositiveUsize;

pub(crate) use defaults::default_snapshot_db_path;
