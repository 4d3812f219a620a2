use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::PipelineError;
use crate::metrics::{Sample, aggregate};

use super::command::{Command, Reply, ReplyKind, Snapshot};
use super::decimate::{CentroidFallback, MIN_DECIMATION_TARGET, clamp_target, decimate};
use super::{Clock, SampleStore, Window, filter_window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub window: Window,
    pub decimation_target: usize,
    pub centroid_fallback: CentroidFallback,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(window: Window, decimation_target: usize) -> Self {
        Self {
            window,
            decimation_target: decimation_target.max(MIN_DECIMATION_TARGET),
            centroid_fallback: CentroidFallback::default(),
        }
    }

    #[must_use]
    pub const fn with_centroid_fallback(mut self, fallback: CentroidFallback) -> Self {
        self.centroid_fallback = fallback;
        self
    }
}

/// Owns the sample store and applies commands to it one at a time.
pub struct PipelineEngine {
    store: SampleStore,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
}

impl PipelineEngine {
    /// Creates an engine with an empty store.
    ///
    /// # Errors
    ///
    /// Returns `ZeroCapacity` when `capacity` is 0.
    pub fn new(
        capacity: usize,
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            store: SampleStore::new(capacity)?,
            config,
            clock,
        })
    }

    #[must_use]
    pub const fn config(&self) -> PipelineConfig {
        self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Applies `command`, returning the reply the consumer should receive.
    ///
    /// Mutations answer with an `Update`, `snapshot` with a `Snapshot`, and
    /// the two config setters answer nothing.
    pub fn execute(&mut self, command: Command) -> Option<Reply> {
        trace!("engine command {}", command.name());
        match command {
            Command::Add { sample } => {
                self.store.append(sample);
                self.evict_by_window();
                Some(self.reply(ReplyKind::Update))
            }
            Command::BulkAdd { samples } => {
                if self.store.is_empty() {
                    self.extend(samples);
                } else {
                    debug!(
                        "Ignoring bulk add of {} samples: store already holds {}",
                        samples.len(),
                        self.store.len()
                    );
                }
                self.evict_by_window();
                Some(self.reply(ReplyKind::Update))
            }
            Command::ReplaceAll { samples } => {
                self.store.clear();
                self.extend(samples);
                self.evict_by_window();
                Some(self.reply(ReplyKind::Update))
            }
            Command::SetWindow { window } => {
                self.config.window = window;
                None
            }
            Command::SetDecimationTarget { target } => {
                let clamped = clamp_target(target);
                if i64::try_from(clamped).ok() != Some(target) {
                    warn!(
                        "Decimation target {} is out of range; using {}",
                        target, clamped
                    );
                }
                self.config.decimation_target = clamped;
                None
            }
            Command::Snapshot {} => Some(self.reply(ReplyKind::Snapshot)),
        }
    }

    /// Metrics over the window-filtered store and its decimated series.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let filtered = filter_window(&self.store.all(), self.config.window, self.clock.now());
        Snapshot {
            metrics: aggregate(&filtered),
            samples: decimate(
                &filtered,
                self.config.decimation_target,
                self.config.centroid_fallback,
            ),
        }
    }

    fn reply(&self, kind: ReplyKind) -> Reply {
        Reply {
            kind,
            snapshot: self.snapshot(),
        }
    }

    fn extend(&mut self, samples: Vec<Sample>) {
        for sample in samples {
            self.store.append(sample);
        }
    }

    fn evict_by_window(&mut self) {
        if let Some(cutoff) = self.config.window.cutoff(self.clock.now()) {
            let evicted = self.store.evict_older_than(cutoff);
            if evicted > 0 {
                trace!("Evicted {} samples older than {}", evicted, cutoff);
            }
        }
    }
}

/// Sending half of the engine's command queue.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Queues `command` behind every command sent before it.
    ///
    /// # Errors
    ///
    /// Returns `EngineClosed` when the engine task has stopped.
    pub fn send(&self, command: Command) -> Result<(), PipelineError> {
        self.commands
            .send(command)
            .map_err(|_closed| PipelineError::EngineClosed)
    }
}

/// Moves `engine` onto its own task.
///
/// Commands are processed strictly in send order, each producing at most one
/// reply on the returned receiver. The task ends once every handle is
/// dropped or the reply receiver goes away.
#[must_use]
pub fn spawn_engine(
    mut engine: PipelineEngine,
) -> (EngineHandle, mpsc::UnboundedReceiver<Reply>, JoinHandle<()>) {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<Reply>();

    let task = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if let Some(reply) = engine.execute(command)
                && reply_tx.send(reply).is_err()
            {
                debug!("Snapshot consumer dropped; stopping pipeline engine");
                break;
            }
        }
        debug!("Pipeline engine stopped with {} samples", engine.len());
    });

    (
        EngineHandle {
            commands: command_tx,
        },
        reply_rx,
        task,
    )
}
