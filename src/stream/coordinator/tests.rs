use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use futures_util::stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use super::*;
use crate::persist::MemorySnapshotSlot;
use crate::pipeline::{PipelineConfig, PipelineEngine, SystemClock, spawn_engine};

const HOUR: Duration = Duration::from_secs(3_600);

type LiveSender = mpsc::UnboundedSender<Result<Sample, TransportError>>;

#[derive(Debug, Clone, PartialEq)]
struct View {
    origin: RenderOrigin,
    window: Window,
    count: u64,
    points: usize,
}

#[derive(Clone, Default)]
struct CollectingRenderer {
    views: Arc<Mutex<Vec<View>>>,
}

impl SnapshotRenderer for CollectingRenderer {
    fn render(&mut self, view: &RenderedView<'_>) {
        if let Ok(mut views) = self.views.lock() {
            views.push(View {
                origin: view.origin,
                window: view.window,
                count: view.metrics.count,
                points: view.samples.len(),
            });
        }
    }
}

/// Scripted live transport: each `connect` pops the next scripted result.
#[derive(Default)]
struct ScriptedLive {
    script: Mutex<VecDeque<Option<mpsc::UnboundedReceiver<Result<Sample, TransportError>>>>>,
    connects: Mutex<Vec<Instant>>,
}

impl ScriptedLive {
    fn push_connection(&self) -> Result<LiveSender, String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .map_err(|err| err.to_string())?
            .push_back(Some(rx));
        Ok(tx)
    }

    fn push_failure(&self) -> Result<(), String> {
        self.script
            .lock()
            .map_err(|err| err.to_string())?
            .push_back(None);
        Ok(())
    }

    fn connect_times(&self) -> Result<Vec<Instant>, String> {
        Ok(self.connects.lock().map_err(|err| err.to_string())?.clone())
    }
}

#[async_trait]
impl LiveTransport for ScriptedLive {
    async fn connect(&self) -> Result<LiveStream, TransportError> {
        let next = {
            let mut connects = self
                .connects
                .lock()
                .map_err(|_poisoned| TransportError::from("connect log poisoned"))?;
            connects.push(Instant::now());
            let mut script = self
                .script
                .lock()
                .map_err(|_poisoned| TransportError::from("script poisoned"))?;
            script.pop_front().flatten()
        };
        match next {
            Some(rx) => {
                let live: LiveStream = Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                }));
                Ok(live)
            }
            None => Err(TransportError::Unavailable {
                context: "scripted connect",
                message: "refused".to_owned(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingHistory {
    samples: Mutex<Vec<Sample>>,
    calls: Mutex<Vec<(Window, usize)>>,
}

impl RecordingHistory {
    fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: Mutex::new(samples),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Result<Vec<(Window, usize)>, String> {
        Ok(self.calls.lock().map_err(|err| err.to_string())?.clone())
    }
}

#[async_trait]
impl HistoryFetch for RecordingHistory {
    async fn fetch(&self, window: Window, limit: usize) -> Result<Vec<Sample>, TransportError> {
        self.calls
            .lock()
            .map_err(|_poisoned| TransportError::from("calls poisoned"))?
            .push((window, limit));
        Ok(self
            .samples
            .lock()
            .map_err(|_poisoned| TransportError::from("samples poisoned"))?
            .clone())
    }
}

struct Harness {
    control: mpsc::Sender<CoordinatorControl>,
    task: JoinHandle<CoordinatorReport>,
    views: Arc<Mutex<Vec<View>>>,
}

impl Harness {
    fn start(
        settings: CoordinatorSettings,
        live: Arc<ScriptedLive>,
        history: Arc<RecordingHistory>,
        slot: Option<Arc<dyn SnapshotSlot>>,
    ) -> Result<Self, String> {
        let engine = PipelineEngine::new(
            1_000,
            PipelineConfig::new(settings.window, settings.decimation_target),
            Arc::new(SystemClock),
        )
        .map_err(|err| err.to_string())?;
        let (handle, replies, _engine_task) = spawn_engine(engine);
        let renderer = CollectingRenderer::default();
        let views = Arc::clone(&renderer.views);
        let mut coordinator =
            StreamCoordinator::new(handle, replies, live, history, Box::new(renderer), settings);
        if let Some(slot) = slot {
            coordinator = coordinator.with_snapshot_slot(slot);
        }
        let (control, control_rx) = mpsc::channel(16);
        let task = tokio::spawn(coordinator.run(control_rx));
        Ok(Self {
            control,
            task,
            views,
        })
    }

    async fn send(&self, request: CoordinatorControl) -> Result<(), String> {
        self.control
            .send(request)
            .await
            .map_err(|err| format!("control send failed: {}", err))
    }

    fn views(&self) -> Result<Vec<View>, String> {
        Ok(self.views.lock().map_err(|err| err.to_string())?.clone())
    }

    async fn shutdown(self) -> Result<CoordinatorReport, String> {
        self.send(CoordinatorControl::Shutdown).await?;
        self.task
            .await
            .map_err(|err| format!("coordinator panicked: {}", err))
    }
}

/// Only the timers under test are short; the rest stay out of the way.
fn quiet_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        window: Window::All,
        render_interval: Duration::ZERO,
        stale_poll_interval: HOUR,
        stale_after: HOUR,
        seed_grace: HOUR,
        refresh_interval: HOUR,
        ..CoordinatorSettings::default()
    }
}

fn recent_samples(count: usize) -> Vec<Sample> {
    let now = Utc::now();
    (0..count)
        .map(|index| {
            let offset = i64::try_from(count - index).unwrap_or(i64::MAX);
            Sample::new(
                now - TimeDelta::seconds(offset),
                true,
                Some(10.0 + f64::from(u32::try_from(index).unwrap_or(0))),
            )
        })
        .collect()
}

fn close_to(actual: Duration, expected: Duration) -> bool {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    diff <= Duration::from_millis(5)
}

#[tokio::test(start_paused = true)]
async fn reconnect_backs_off_then_resets_and_backfills() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    drop(live.push_connection()?);
    live.push_failure()?;
    live.push_failure()?;
    let second = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(4)));

    let harness = Harness::start(
        quiet_settings(),
        Arc::clone(&live),
        Arc::clone(&history),
        None,
    )?;
    sleep(Duration::from_secs(10)).await;

    let connects = live.connect_times()?;
    if connects.len() != 4 {
        return Err(format!("Expected 4 connects, got {}", connects.len()));
    }
    let gaps: Vec<Duration> = connects
        .windows(2)
        .map(|pair| match pair {
            [earlier, later] => later.duration_since(*earlier),
            _ => Duration::ZERO,
        })
        .collect();
    let expected = [
        Duration::from_millis(1_500),
        Duration::from_millis(2_250),
        Duration::from_millis(3_375),
    ];
    if gaps.len() != expected.len()
        || !gaps
            .iter()
            .zip(expected.iter())
            .all(|(gap, want)| close_to(*gap, *want))
    {
        return Err(format!("Unexpected reconnect gaps: {:?}", gaps));
    }

    let calls = history.calls()?;
    if calls != vec![(Window::All, 300)] {
        return Err(format!("Expected one backfill fetch, got {:?}", calls));
    }
    let backfilled = harness
        .views()?
        .iter()
        .any(|view| view.origin == RenderOrigin::Engine && view.count == 4);
    if !backfilled {
        return Err(format!("Backfill never rendered: {:?}", harness.views()?));
    }

    // A successful reconnect resets the attempt counter.
    let third = live.push_connection()?;
    let dropped_at = Instant::now();
    drop(second);
    sleep(Duration::from_secs(5)).await;
    let connects = live.connect_times()?;
    let latest = connects.last().ok_or("missing connect")?;
    if !close_to(latest.duration_since(dropped_at), Duration::from_millis(1_500)) {
        return Err(format!(
            "Backoff not reset: next connect after {:?}",
            latest.duration_since(dropped_at)
        ));
    }
    drop(third);

    let report = harness.shutdown().await?;
    if report.reconnects != 2 || report.failed_reconnects != 2 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stale_cycles_render_fallback_and_resync_every_third() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(6)));
    let settings = CoordinatorSettings {
        stale_poll_interval: Duration::from_secs(5),
        stale_after: Duration::from_secs(15),
        ..quiet_settings()
    };

    let harness = Harness::start(settings, live, Arc::clone(&history), None)?;
    sleep(Duration::from_secs(16)).await;

    let views = harness.views()?;
    let fallback = views
        .iter()
        .filter(|view| view.origin == RenderOrigin::Fallback)
        .count();
    if fallback != 3 {
        return Err(format!("Expected 3 fallback renders, got {:?}", views));
    }
    let engine_views: Vec<&View> = views
        .iter()
        .filter(|view| view.origin == RenderOrigin::Engine)
        .collect();
    if engine_views.len() != 1 || engine_views.first().map(|view| view.count) != Some(6) {
        return Err(format!("Expected one resync render, got {:?}", views));
    }
    if history.calls()?.len() != 3 {
        return Err(format!("Unexpected fetches: {:?}", history.calls()?));
    }

    let report = harness.shutdown().await?;
    if report.stale_cycles != 3 || report.fallback_renders != 3 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn seeds_from_history_after_grace_period() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(5)));
    let settings = CoordinatorSettings {
        seed_grace: Duration::from_secs(3),
        ..quiet_settings()
    };

    let harness = Harness::start(settings, live, Arc::clone(&history), None)?;
    sleep(Duration::from_secs(2)).await;
    if !history.calls()?.is_empty() {
        return Err("Seeded before the grace period".to_owned());
    }
    sleep(Duration::from_secs(2)).await;
    let views = harness.views()?;
    if views.last().map(|view| view.count) != Some(5) || history.calls()?.len() != 1 {
        return Err(format!("Expected seeded render, got {:?}", views));
    }
    harness.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn live_series_skips_seeding() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(5)));
    let settings = CoordinatorSettings {
        seed_grace: Duration::from_secs(3),
        ..quiet_settings()
    };

    let harness = Harness::start(settings, live, Arc::clone(&history), None)?;
    for sample in recent_samples(2) {
        live_tx
            .send(Ok(sample))
            .map_err(|err| format!("live send failed: {}", err))?;
    }
    sleep(Duration::from_secs(5)).await;
    if !history.calls()?.is_empty() {
        return Err(format!("Unexpected seed fetch: {:?}", history.calls()?));
    }
    let report = harness.shutdown().await?;
    if report.live_samples != 2 || report.renders != 2 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pause_drops_live_samples_until_resume() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::default());
    let harness = Harness::start(quiet_settings(), live, history, None)?;
    let mut samples = recent_samples(2).into_iter();

    harness.send(CoordinatorControl::Pause).await?;
    sleep(Duration::from_millis(10)).await;
    let first = samples.next().ok_or("missing sample")?;
    live_tx
        .send(Ok(first))
        .map_err(|err| format!("live send failed: {}", err))?;
    sleep(Duration::from_millis(10)).await;
    if !harness.views()?.is_empty() {
        return Err("Paused coordinator rendered a live sample".to_owned());
    }

    harness.send(CoordinatorControl::Resume).await?;
    sleep(Duration::from_millis(10)).await;
    let second = samples.next().ok_or("missing sample")?;
    live_tx
        .send(Ok(second))
        .map_err(|err| format!("live send failed: {}", err))?;
    sleep(Duration::from_millis(10)).await;

    let views = harness.views()?;
    if views.len() != 1 || views.first().map(|view| view.count) != Some(1) {
        return Err(format!("Expected one render of one sample, got {:?}", views));
    }
    let report = harness.shutdown().await?;
    if report.dropped_while_paused != 1 || report.live_samples != 1 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn throttle_drops_excess_renders() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let live_tx = live.push_connection()?;
    let settings = CoordinatorSettings {
        render_interval: Duration::from_secs(1),
        ..quiet_settings()
    };
    let harness = Harness::start(settings, live, Arc::new(RecordingHistory::default()), None)?;

    for sample in recent_samples(3) {
        live_tx
            .send(Ok(sample))
            .map_err(|err| format!("live send failed: {}", err))?;
    }
    sleep(Duration::from_millis(1_100)).await;
    for sample in recent_samples(1) {
        live_tx
            .send(Ok(sample))
            .map_err(|err| format!("live send failed: {}", err))?;
    }
    sleep(Duration::from_millis(10)).await;

    let views = harness.views()?;
    let counts: Vec<u64> = views.iter().map(|view| view.count).collect();
    if counts != vec![1, 4] {
        return Err(format!("Unexpected rendered counts: {:?}", counts));
    }
    let report = harness.shutdown().await?;
    if report.throttled != 2 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn persisted_snapshot_is_replayed_and_refreshed() -> Result<(), String> {
    let restored = PersistedSnapshot::capture(Window::All, 500, &recent_samples(3), Utc::now());
    let slot = Arc::new(MemorySnapshotSlot::with_snapshot(restored));
    let live = Arc::new(ScriptedLive::default());
    let live_tx = live.push_connection()?;
    let harness = Harness::start(
        quiet_settings(),
        live,
        Arc::new(RecordingHistory::default()),
        Some(Arc::clone(&slot) as Arc<dyn SnapshotSlot>),
    )?;
    sleep(Duration::from_millis(10)).await;
    if harness.views()?.first().map(|view| view.count) != Some(3) {
        return Err(format!("Snapshot not replayed: {:?}", harness.views()?));
    }

    for sample in recent_samples(1) {
        live_tx
            .send(Ok(sample))
            .map_err(|err| format!("live send failed: {}", err))?;
    }
    sleep(Duration::from_millis(10)).await;
    let saved = slot
        .load()
        .await
        .map_err(|err| err.to_string())?
        .ok_or("nothing persisted")?;
    if saved.samples.len() != 4 || saved.window != Window::All {
        return Err(format!("Unexpected persisted snapshot: {:?}", saved));
    }
    let report = harness.shutdown().await?;
    if report.persist_requests != 2 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn persisted_snapshot_for_other_window_is_ignored() -> Result<(), String> {
    let restored =
        PersistedSnapshot::capture(Window::OneHour, 500, &recent_samples(3), Utc::now());
    let slot: Arc<dyn SnapshotSlot> = Arc::new(MemorySnapshotSlot::with_snapshot(restored));
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let harness = Harness::start(
        quiet_settings(),
        live,
        Arc::new(RecordingHistory::default()),
        Some(slot),
    )?;
    sleep(Duration::from_millis(10)).await;
    if !harness.views()?.is_empty() {
        return Err(format!("Unexpected replay: {:?}", harness.views()?));
    }
    harness.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn window_and_target_changes_reach_the_engine() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(10)));
    let harness = Harness::start(quiet_settings(), live, Arc::clone(&history), None)?;

    harness
        .send(CoordinatorControl::SetWindow(Window::OneHour))
        .await?;
    sleep(Duration::from_millis(10)).await;
    if history.calls()? != vec![(Window::OneHour, 300)] {
        return Err(format!("Unexpected fetches: {:?}", history.calls()?));
    }
    let views = harness.views()?;
    let last = views.last().ok_or("window change not rendered")?;
    if last.window != Window::OneHour || last.count != 10 || last.points != 10 {
        return Err(format!("Unexpected view: {:?}", last));
    }

    harness
        .send(CoordinatorControl::SetDecimationTarget(1))
        .await?;
    sleep(Duration::from_millis(10)).await;
    let views = harness.views()?;
    let last = views.last().ok_or("target change not rendered")?;
    if last.count != 10 || last.points != 2 {
        return Err(format!("Expected clamped decimation, got {:?}", last));
    }
    harness.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_requests_snapshots() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let settings = CoordinatorSettings {
        refresh_interval: Duration::from_secs(10),
        ..quiet_settings()
    };
    let harness = Harness::start(settings, live, Arc::new(RecordingHistory::default()), None)?;
    sleep(Duration::from_secs(25)).await;
    if harness.views()?.len() != 2 {
        return Err(format!("Expected two refresh renders, got {:?}", harness.views()?));
    }
    harness.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn closing_control_channel_stops_the_coordinator() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let _live_tx = live.push_connection()?;
    let harness = Harness::start(
        quiet_settings(),
        live,
        Arc::new(RecordingHistory::default()),
        None,
    )?;
    let Harness { control, task, .. } = harness;
    drop(control);
    let report = task
        .await
        .map_err(|err| format!("coordinator panicked: {}", err))?;
    if report.stop != Some(StopReason::ControlClosed) {
        return Err(format!("Unexpected stop: {:?}", report.stop));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_live_stream_goes_stale_with_default_timers() -> Result<(), String> {
    let live = Arc::new(ScriptedLive::default());
    let live_tx = live.push_connection()?;
    let history = Arc::new(RecordingHistory::with_samples(recent_samples(6)));
    let settings = CoordinatorSettings {
        window: Window::All,
        ..CoordinatorSettings::default()
    };
    let harness = Harness::start(settings, live, Arc::clone(&history), None)?;

    // Seed at 3s, then every stale poll from 5s to 60s fetches history even
    // though the periodic refresh keeps the engine answering.
    sleep(Duration::from_secs(62)).await;
    let calls = history.calls()?.len();
    if calls != 13 {
        return Err(format!("Expected seed plus 12 stale fetches, got {}", calls));
    }

    // Live data makes the engine fresh again until it goes quiet for 15s.
    for sample in recent_samples(1) {
        live_tx
            .send(Ok(sample))
            .map_err(|err| format!("live send failed: {}", err))?;
    }
    sleep(Duration::from_secs(15)).await;
    let calls = history.calls()?.len();
    if calls != 13 {
        return Err(format!("Fresh live data still fetched: {} calls", calls));
    }
    sleep(Duration::from_secs(5)).await;
    let calls = history.calls()?.len();
    if calls != 14 {
        return Err(format!("Expected staleness to resume, got {} calls", calls));
    }

    let report = harness.shutdown().await?;
    if report.stale_cycles != 13 || report.live_samples != 1 {
        return Err(format!("Unexpected report: {:?}", report));
    }
    Ok(())
}

#[tokio::test]
async fn reply_keeps_the_window_it_was_computed_for() -> Result<(), String> {
    let engine = PipelineEngine::new(
        100,
        PipelineConfig::new(Window::All, 500),
        Arc::new(SystemClock),
    )
    .map_err(|err| err.to_string())?;
    let (handle, replies, _engine_task) = spawn_engine(engine);
    let renderer = CollectingRenderer::default();
    let views = Arc::clone(&renderer.views);
    let slot = Arc::new(MemorySnapshotSlot::default());
    let mut coordinator = StreamCoordinator::new(
        handle,
        replies,
        Arc::new(ScriptedLive::default()),
        Arc::new(RecordingHistory::default()),
        Box::new(renderer),
        quiet_settings(),
    )
    .with_snapshot_slot(Arc::clone(&slot) as Arc<dyn SnapshotSlot>);

    for sample in recent_samples(2) {
        coordinator.handle_live_item(Some(Ok(sample)));
    }
    coordinator.handle_control(CoordinatorControl::SetWindow(Window::OneHour));
    for _ in 0..2 {
        let reply = coordinator
            .replies
            .recv()
            .await
            .ok_or("engine stopped")?;
        coordinator.handle_reply(reply);
    }
    sleep(Duration::from_millis(10)).await;

    let windows: Vec<Window> = views
        .lock()
        .map_err(|err| err.to_string())?
        .iter()
        .map(|view| view.window)
        .collect();
    if windows != vec![Window::All, Window::All] {
        return Err(format!("Unexpected view windows: {:?}", windows));
    }
    let persisted = slot.load().await.map_err(|err| err.to_string())?;
    if persisted.is_some() {
        return Err(format!("Outdated series persisted: {:?}", persisted));
    }
    if coordinator.report.persist_requests != 0 {
        return Err(format!("Unexpected report: {:?}", coordinator.report));
    }
    Ok(())
}
