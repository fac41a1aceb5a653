//! Backend worker: drains the dispatch inbox, one call at a time

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channels::{Broadcaster, CallEnvelope, DispatchTable, ALL_GROUP, DISPATCH_CHANNEL};
use crate::errors::KabinetError;
use kabinet_messages::DispatchFailure;

/// Run the backend worker until shutdown or until every sender is gone
pub async fn run(
    mut inbox: mpsc::Receiver<serde_json::Value>,
    table: &DispatchTable,
    broadcaster: &Broadcaster,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Backend worker starting...");

    loop {
        let message = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Backend worker shutting down...");
                return;
            }
            message = inbox.recv() => message,
        };

        let Some(message) = message else {
            warn!("Backend inbox closed, worker exiting");
            return;
        };

        handle_message(message, table, broadcaster).await;
    }
}

/// Resolve and run one call. Failures are logged and broadcast, never returned.
pub async fn handle_message(
    message: serde_json::Value,
    table: &DispatchTable,
    broadcaster: &Broadcaster,
) {
    let call: CallEnvelope = match serde_json::from_value(message) {
        Ok(call) => call,
        Err(e) => {
            error!("Dropping malformed call: {}", e);
            report(broadcaster, "<malformed>", &KabinetError::from(e)).await;
            return;
        }
    };

    let handler = match table.resolve(&call.function_name) {
        Ok(handler) => handler,
        Err(e) => {
            error!("Dropping call: {}", e);
            report(broadcaster, &call.function_name, &e).await;
            return;
        }
    };

    debug!("Running {}", call.function_name);
    if let Err(e) = handler.handle(&call).await {
        error!("{} failed: {}", call.function_name, e);
        report(broadcaster, &call.function_name, &e).await;
    }
}

async fn report(broadcaster: &Broadcaster, function_name: &str, error: &KabinetError) {
    let failure = DispatchFailure {
        function_name: function_name.to_string(),
        error: error.to_string(),
    };
    if let Err(e) = broadcaster
        .publish(DISPATCH_CHANNEL, &failure, &[ALL_GROUP])
        .await
    {
        warn!("Failed to broadcast dispatch failure: {}", e);
    }
}
