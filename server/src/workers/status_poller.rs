//! Status poller: keeps stored pod status in line with the runtime

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::backends::ContainerBackend;
use crate::channels::Broadcaster;
use crate::errors::KabinetError;
use crate::services::pods::broadcast_pod;
use crate::storage::Store;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the poller worker
pub async fn run<S, F>(
    options: &Options,
    backend: Arc<dyn ContainerBackend>,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Status poller starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Status poller shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        match poll_once(backend.as_ref(), store.as_ref(), &broadcaster).await {
            Ok(changed) => debug!("Poll complete, {} pods changed", changed),
            Err(e) => error!("Poll failed: {}", e),
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Status poller shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}

/// Refresh the heartbeat and reconcile every pod of the backend once.
/// Returns how many pods changed status.
pub async fn poll_once(
    backend: &dyn ContainerBackend,
    store: &dyn Store,
    broadcaster: &Broadcaster,
) -> Result<usize, KabinetError> {
    let backend_id = backend.record().id.as_str();
    store.touch_backend(backend_id).await?;

    let mut changed = 0;
    for pod in store.list_pods(Some(backend_id)).await? {
        let status = match backend.get_status(&pod).await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to query status of pod {}: {}", pod.id, e);
                continue;
            }
        };
        if status == pod.status {
            continue;
        }

        info!("Pod {} changed {} -> {}", pod.id, pod.status, status);
        let pod = match store.update_pod_status(&pod.id, status).await {
            Ok(pod) => pod,
            Err(e) => {
                error!("Failed to record status of pod {}: {}", pod.id, e);
                continue;
            }
        };
        changed += 1;
        if let Err(e) = broadcast_pod(broadcaster, &pod, false).await {
            error!("Failed to broadcast status of pod {}: {}", pod.id, e);
        }
    }

    if changed > 0 {
        store.flush().await?;
    }
    Ok(changed)
}
