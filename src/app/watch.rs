use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::args::{WatchArgs, default_snapshot_db_path};
use crate::error::{AppError, AppResult, PipelineError};
use crate::persist::{SnapshotSlot, SqliteSnapshotSlot};
use crate::pipeline::{PipelineConfig, PipelineEngine, SystemClock, spawn_engine};
use crate::render::ConsoleRenderer;
use crate::shutdown::setup_signal_shutdown_handler;
use crate::stream::{
    BackoffPolicy, CoordinatorSettings, SseLiveTransport, StopReason, StreamCoordinator,
};

use super::{Connections, require_server};

/// Control requests are rare; a small buffer is plenty.
const CONTROL_CHANNEL_CAPACITY: usize = 8;

pub(crate) fn coordinator_settings(args: &WatchArgs) -> CoordinatorSettings {
    CoordinatorSettings {
        window: args.source.window,
        decimation_target: args.decimation_target.get(),
        centroid_fallback: args.centroid_fallback,
        history_limit: args.source.history_limit.get(),
        render_interval: args.render_interval,
        stale_after: args.stale_after,
        stale_poll_interval: args.stale_poll,
        seed_grace: args.seed_grace,
        refresh_interval: args.refresh_interval,
        backoff: BackoffPolicy {
            base: args.reconnect_base,
            growth: args.reconnect_growth,
            max: args.reconnect_max,
        },
    }
}

async fn open_snapshot_slot(args: &WatchArgs) -> Option<Arc<dyn SnapshotSlot>> {
    if args.no_persist {
        return None;
    }
    let path = args
        .snapshot_db
        .clone()
        .unwrap_or_else(default_snapshot_db_path);
    match SqliteSnapshotSlot::open(&path).await {
        Ok(slot) => {
            info!("Snapshot persistence at {}", path.display());
            Some(Arc::new(slot))
        }
        Err(err) => {
            warn!("Snapshot persistence disabled: {}", err);
            None
        }
    }
}

pub(crate) async fn run_watch(args: &WatchArgs) -> AppResult<()> {
    let server = require_server(&args.source)?.clone();
    let connections = Connections::new(&args.source)?;
    let history = connections.history(&args.source);
    let live = Arc::new(SseLiveTransport::new(
        connections.client.clone(),
        connections.endpoints.stream.clone(),
    ));

    let settings = coordinator_settings(args);
    let engine = PipelineEngine::new(
        args.capacity.get(),
        PipelineConfig::new(settings.window, settings.decimation_target)
            .with_centroid_fallback(settings.centroid_fallback),
        Arc::new(SystemClock),
    )?;
    let config = engine.config();
    debug!(
        "Engine capacity {}, target {}, centroid fallback {}",
        args.capacity.get(),
        config.decimation_target,
        config.centroid_fallback.as_str()
    );
    let (handle, replies, engine_task) = spawn_engine(engine);

    let mut coordinator = StreamCoordinator::new(
        handle,
        replies,
        live,
        history,
        Box::new(ConsoleRenderer),
        settings,
    );
    if let Some(slot) = open_snapshot_slot(args).await {
        coordinator = coordinator.with_snapshot_slot(slot);
    }

    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    let signal_task = setup_signal_shutdown_handler(control_tx);

    info!("Watching {} (window {})", server, settings.window);
    let report = coordinator.run(control_rx).await;
    signal_task.abort();
    engine_task.await?;

    info!(
        "Received {} live samples, {} reconnects, {} stale cycles, {} renders",
        report.live_samples, report.reconnects, report.stale_cycles, report.renders
    );
    if report.stop == Some(StopReason::EngineClosed) {
        return Err(AppError::pipeline(PipelineError::EngineClosed));
    }
    Ok(())
}
