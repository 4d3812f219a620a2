//! Turns process signals into a coordinator shutdown request.
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::stream::CoordinatorControl;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Sends `Shutdown` on Ctrl+C (or SIGTERM on unix). The task also ends
/// quietly once the coordinator drops its control receiver.
#[must_use]
pub fn setup_signal_shutdown_handler(control: mpsc::Sender<CoordinatorControl>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = control.closed() => return,
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!("Failed to listen for Ctrl+C: {}", err);
                        return;
                    }
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = control.closed() => return,
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!("Failed to listen for Ctrl+C: {}", err);
                        return;
                    }
                }
            }
        }

        info!("Shutdown requested");
        if control.send(CoordinatorControl::Shutdown).await.is_err() {
            debug!("Coordinator already stopped");
        }
    })
}
