use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, sleep_until};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::metrics::{Sample, aggregate};
use crate::persist::{PersistedSnapshot, SnapshotSlot};
use crate::pipeline::{
    CentroidFallback, Command, EngineHandle, MIN_DECIMATION_TARGET, Reply, Window, clamp_target,
    decimate,
};
use crate::render::{RenderOrigin, RenderedView, SnapshotRenderer};

use super::backoff::{Backoff, BackoffPolicy};
use super::throttle::RenderThrottle;
use super::transport::{HistoryFetch, LiveStream, LiveTransport};

#[cfg(test)]
mod tests;

/// Every third consecutive stale cycle also resynchronizes the engine.
const RESYNC_EVERY_STALE_CYCLES: u32 = 3;
/// Lower bound for periodic timers; `tokio::time::interval` rejects zero.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    pub window: Window,
    pub decimation_target: usize,
    /// Also applied to fallback renders so they match engine output.
    pub centroid_fallback: CentroidFallback,
    pub history_limit: usize,
    pub render_interval: Duration,
    pub stale_after: Duration,
    pub stale_poll_interval: Duration,
    pub seed_grace: Duration,
    pub refresh_interval: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            window: Window::default(),
            decimation_target: 500,
            centroid_fallback: CentroidFallback::default(),
            history_limit: 300,
            render_interval: Duration::from_millis(250),
            stale_after: Duration::from_secs(15),
            stale_poll_interval: Duration::from_secs(5),
            seed_grace: Duration::from_secs(3),
            refresh_interval: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Requests accepted by a running coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorControl {
    /// Stop forwarding live samples; the connection stays open.
    Pause,
    Resume,
    SetWindow(Window),
    SetDecimationTarget(i64),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    ControlClosed,
    EngineClosed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub stop: Option<StopReason>,
    pub live_samples: u64,
    pub dropped_while_paused: u64,
    pub reconnects: u64,
    pub failed_reconnects: u64,
    pub stale_cycles: u64,
    pub fetch_failures: u64,
    pub renders: u64,
    pub fallback_renders: u64,
    pub throttled: u64,
    pub persist_requests: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPurpose {
    /// After a successful reconnect.
    Backfill,
    /// Startup seeding when nothing has arrived within the grace period.
    Seed,
    /// Direct render while engine output is stale.
    Fallback { resync: bool },
    WindowChange,
}

/// What caused the engine reply that is expected next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplySource {
    Live,
    History,
    Refresh,
}

/// One entry per dispatched command that the engine answers, in send order.
#[derive(Debug, Clone, Copy)]
struct PendingReply {
    source: ReplySource,
    window: Window,
}

struct FetchOutcome {
    purpose: FetchPurpose,
    window: Window,
    result: Result<Vec<Sample>, TransportError>,
}

/// Drives a [`PipelineEngine`](crate::pipeline::PipelineEngine) from a live
/// transport and history pulls, and renders what comes back.
pub struct StreamCoordinator {
    engine: EngineHandle,
    replies: mpsc::UnboundedReceiver<Reply>,
    live_transport: Arc<dyn LiveTransport>,
    history: Arc<dyn HistoryFetch>,
    slot: Option<Arc<dyn SnapshotSlot>>,
    renderer: Box<dyn SnapshotRenderer>,
    settings: CoordinatorSettings,
    window: Window,
    decimation_target: usize,
    paused: bool,
    live: Option<LiveStream>,
    backoff: Backoff,
    reconnect_at: Option<Instant>,
    pending_replies: VecDeque<PendingReply>,
    /// Last engine reply to a live sample; only live data counts as fresh.
    last_live_reply_at: Option<Instant>,
    consecutive_stale: u32,
    has_series: bool,
    throttle: RenderThrottle,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    report: CoordinatorReport,
}

impl StreamCoordinator {
    #[must_use]
    pub fn new(
        engine: EngineHandle,
        replies: mpsc::UnboundedReceiver<Reply>,
        live_transport: Arc<dyn LiveTransport>,
        history: Arc<dyn HistoryFetch>,
        renderer: Box<dyn SnapshotRenderer>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            replies,
            live_transport,
            history,
            slot: None,
            renderer,
            window: settings.window,
            decimation_target: settings.decimation_target.max(MIN_DECIMATION_TARGET),
            paused: false,
            live: None,
            backoff: Backoff::new(settings.backoff),
            reconnect_at: None,
            pending_replies: VecDeque::new(),
            last_live_reply_at: None,
            consecutive_stale: 0,
            has_series: false,
            throttle: RenderThrottle::new(settings.render_interval),
            fetch_tx,
            fetch_rx,
            report: CoordinatorReport::default(),
            settings,
        }
    }

    #[must_use]
    pub fn with_snapshot_slot(mut self, slot: Arc<dyn SnapshotSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Runs until `Shutdown`, until `control` closes, or until the engine
    /// stops.
    pub async fn run(
        mut self,
        mut control: mpsc::Receiver<CoordinatorControl>,
    ) -> CoordinatorReport {
        self.restore_persisted().await;
        self.connect_initial().await;

        let start = Instant::now();
        let stale_period = self.settings.stale_poll_interval.max(MIN_TIMER_PERIOD);
        let mut stale_poll = interval_at(start + stale_period, stale_period);
        stale_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let refresh_period = self.settings.refresh_interval.max(MIN_TIMER_PERIOD);
        let mut refresh = interval_at(start + refresh_period, refresh_period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let seed_timer = sleep(self.settings.seed_grace);
        tokio::pin!(seed_timer);
        let mut seed_pending = true;

        let stop = loop {
            tokio::select! {
                request = control.recv() => match request {
                    Some(CoordinatorControl::Shutdown) => break StopReason::Shutdown,
                    Some(request) => self.handle_control(request),
                    None => break StopReason::ControlClosed,
                },
                reply = self.replies.recv() => match reply {
                    Some(reply) => self.handle_reply(reply),
                    None => break StopReason::EngineClosed,
                },
                item = next_live(&mut self.live) => self.handle_live_item(item),
                () = reconnect_due(self.reconnect_at) => self.attempt_reconnect().await,
                _ = stale_poll.tick() => self.check_staleness(),
                _ = refresh.tick() => self.dispatch(Command::Snapshot {}),
                () = &mut seed_timer, if seed_pending => {
                    seed_pending = false;
                    self.seed_if_empty();
                },
                Some(outcome) = self.fetch_rx.recv() => self.handle_fetch(outcome),
            }
        };

        info!("Stream coordinator stopped: {:?}", stop);
        self.report.stop = Some(stop);
        self.report
    }

    async fn restore_persisted(&mut self) {
        let Some(slot) = self.slot.as_ref() else {
            return;
        };
        match slot.load().await {
            Ok(Some(snapshot)) if snapshot.window == self.window => {
                let samples = snapshot.samples();
                info!("Restoring {} persisted samples", samples.len());
                self.dispatch(Command::BulkAdd { samples });
            }
            Ok(Some(snapshot)) => debug!(
                "Persisted snapshot is for window {}, not {}; skipping",
                snapshot.window, self.window
            ),
            Ok(None) => debug!("No persisted snapshot"),
            Err(err) => warn!("Failed to load persisted snapshot: {}", err),
        }
    }

    async fn connect_initial(&mut self) {
        match self.live_transport.connect().await {
            Ok(stream) => {
                info!("Live stream connected");
                self.live = Some(stream);
            }
            Err(err) => {
                warn!("Live stream unavailable: {}", err);
                self.schedule_reconnect();
            }
        }
    }

    fn handle_live_item(&mut self, item: Option<Result<Sample, TransportError>>) {
        match item {
            Some(Ok(sample)) => {
                if self.paused {
                    self.report.dropped_while_paused =
                        self.report.dropped_while_paused.saturating_add(1);
                    return;
                }
                self.report.live_samples = self.report.live_samples.saturating_add(1);
                self.dispatch(Command::Add { sample });
            }
            Some(Err(err)) => {
                warn!("Live stream lost: {}", err);
                self.live = None;
                self.schedule_reconnect();
            }
            None => {
                warn!("Live stream closed");
                self.live = None;
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            return;
        }
        let delay = self.backoff.next_delay();
        info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.backoff.attempt()
        );
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn attempt_reconnect(&mut self) {
        self.reconnect_at = None;
        if self.live.is_some() {
            debug!("Already connected; ignoring pending reconnect");
            return;
        }
        match self.live_transport.connect().await {
            Ok(stream) => {
                info!("Live stream reconnected");
                self.live = Some(stream);
                self.backoff.reset();
                self.report.reconnects = self.report.reconnects.saturating_add(1);
                self.spawn_fetch(FetchPurpose::Backfill);
            }
            Err(err) => {
                warn!("Reconnect failed: {}", err);
                self.report.failed_reconnects = self.report.failed_reconnects.saturating_add(1);
                self.schedule_reconnect();
            }
        }
    }

    fn check_staleness(&mut self) {
        let stale = self
            .last_live_reply_at
            .is_none_or(|at| at.elapsed() > self.settings.stale_after);
        if !stale {
            self.consecutive_stale = 0;
            return;
        }
        self.consecutive_stale = self.consecutive_stale.saturating_add(1);
        self.report.stale_cycles = self.report.stale_cycles.saturating_add(1);
        let resync = self.consecutive_stale % RESYNC_EVERY_STALE_CYCLES == 0;
        debug!(
            "Engine output stale ({} consecutive); fetching history",
            self.consecutive_stale
        );
        self.spawn_fetch(FetchPurpose::Fallback { resync });
    }

    fn seed_if_empty(&mut self) {
        if self.has_series {
            return;
        }
        debug!("No data after seed grace; seeding from history");
        self.spawn_fetch(FetchPurpose::Seed);
    }

    fn handle_reply(&mut self, reply: Reply) {
        let pending = self.pending_replies.pop_front().unwrap_or_else(|| {
            debug!("Engine reply without a pending command");
            PendingReply {
                source: ReplySource::Refresh,
                window: self.window,
            }
        });
        if pending.source == ReplySource::Live {
            self.last_live_reply_at = Some(Instant::now());
        }
        let snapshot = reply.snapshot;
        if !snapshot.samples.is_empty() {
            self.has_series = true;
        }
        if !self.throttle.admit(Instant::now()) {
            self.report.throttled = self.report.throttled.saturating_add(1);
            return;
        }
        self.renderer.render(&RenderedView {
            origin: RenderOrigin::Engine,
            window: pending.window,
            metrics: &snapshot.metrics,
            samples: &snapshot.samples,
        });
        self.report.renders = self.report.renders.saturating_add(1);
        if pending.window != self.window {
            debug!(
                "Not persisting a {} series after switching to {}",
                pending.window, self.window
            );
        } else if !snapshot.samples.is_empty() {
            self.persist(&snapshot.samples);
        }
    }

    fn persist(&mut self, samples: &[Sample]) {
        let Some(slot) = self.slot.as_ref().map(Arc::clone) else {
            return;
        };
        let snapshot =
            PersistedSnapshot::capture(self.window, self.decimation_target, samples, Utc::now());
        self.report.persist_requests = self.report.persist_requests.saturating_add(1);
        tokio::spawn(async move {
            if let Err(err) = slot.store(&snapshot).await {
                warn!("Persist skipped: {}", err);
            }
        });
    }

    fn handle_fetch(&mut self, outcome: FetchOutcome) {
        let samples = match outcome.result {
            Ok(samples) => samples,
            Err(err) => {
                warn!("History fetch ({:?}) failed: {}", outcome.purpose, err);
                self.report.fetch_failures = self.report.fetch_failures.saturating_add(1);
                return;
            }
        };
        debug!(
            "History fetch ({:?}) for {} returned {} samples",
            outcome.purpose,
            outcome.window,
            samples.len()
        );
        match outcome.purpose {
            FetchPurpose::Backfill | FetchPurpose::WindowChange => {
                self.dispatch(Command::ReplaceAll { samples });
            }
            FetchPurpose::Seed => self.dispatch(Command::BulkAdd { samples }),
            FetchPurpose::Fallback { resync } => {
                self.render_fallback(outcome.window, &samples);
                if resync {
                    self.dispatch(Command::ReplaceAll { samples });
                }
            }
        }
    }

    fn render_fallback(&mut self, window: Window, samples: &[Sample]) {
        if !self.throttle.admit(Instant::now()) {
            self.report.throttled = self.report.throttled.saturating_add(1);
            return;
        }
        let metrics = aggregate(samples);
        let series = decimate(samples, self.decimation_target, self.settings.centroid_fallback);
        self.renderer.render(&RenderedView {
            origin: RenderOrigin::Fallback,
            window,
            metrics: &metrics,
            samples: &series,
        });
        self.report.fallback_renders = self.report.fallback_renders.saturating_add(1);
    }

    fn handle_control(&mut self, request: CoordinatorControl) {
        match request {
            CoordinatorControl::Pause => {
                info!("Paused");
                self.paused = true;
            }
            CoordinatorControl::Resume => {
                info!("Resumed");
                self.paused = false;
            }
            CoordinatorControl::SetWindow(window) => {
                info!("Window set to {}", window);
                self.window = window;
                self.dispatch(Command::SetWindow { window });
                self.spawn_fetch(FetchPurpose::WindowChange);
            }
            CoordinatorControl::SetDecimationTarget(target) => {
                self.decimation_target = clamp_target(target);
                self.dispatch(Command::SetDecimationTarget { target });
                self.dispatch(Command::Snapshot {});
            }
            CoordinatorControl::Shutdown => {}
        }
    }

    fn spawn_fetch(&self, purpose: FetchPurpose) {
        let history = Arc::clone(&self.history);
        let results = self.fetch_tx.clone();
        let window = self.window;
        let limit = self.settings.history_limit;
        tokio::spawn(async move {
            let result = history.fetch(window, limit).await;
            if results
                .send(FetchOutcome {
                    purpose,
                    window,
                    result,
                })
                .is_err()
            {
                debug!("Coordinator gone; discarding {:?} fetch", purpose);
            }
        });
    }

    fn dispatch(&mut self, command: Command) {
        let name = command.name();
        let source = match &command {
            Command::Add { .. } => Some(ReplySource::Live),
            Command::BulkAdd { .. } | Command::ReplaceAll { .. } => Some(ReplySource::History),
            Command::Snapshot {} => Some(ReplySource::Refresh),
            Command::SetWindow { .. } | Command::SetDecimationTarget { .. } => None,
        };
        match self.engine.send(command) {
            Ok(()) => {
                if let Some(source) = source {
                    self.pending_replies.push_back(PendingReply {
                        source,
                        window: self.window,
                    });
                }
            }
            Err(err) => warn!("Dropping {} command: {}", name, err),
        }
    }
}

async fn next_live(live: &mut Option<LiveStream>) -> Option<Result<Sample, TransportError>> {
    match live.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
