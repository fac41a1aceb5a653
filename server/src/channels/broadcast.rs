//! Typed publish/subscribe over channel groups

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{trace, warn};

use crate::channels::layer::{message_kind, ChannelLayer, ChannelMessage};
use crate::errors::KabinetError;

/// Flavour pull progress
pub const FLAVOUR_CHANNEL: &str = "flavour";
/// Pod status changes
pub const POD_CHANNEL: &str = "pod";
/// Background job failures
pub const DISPATCH_CHANNEL: &str = "dispatch";
/// Group every listener can join to see all messages on a channel
pub const ALL_GROUP: &str = "all";

#[derive(Clone)]
pub struct Broadcaster {
    layer: Arc<ChannelLayer>,
}

impl Broadcaster {
    pub fn new(layer: Arc<ChannelLayer>) -> Self {
        Self { layer }
    }

    /// Publish `message` on `channel` to each group
    pub async fn publish<M: Serialize>(
        &self,
        channel: &str,
        message: &M,
        groups: &[&str],
    ) -> Result<(), KabinetError> {
        let payload = serde_json::to_value(message)?;
        for group in groups {
            let delivered = self
                .layer
                .group_send(group, ChannelMessage::new(channel, payload.clone()))
                .await;
            trace!("Published {} to {} ({} listeners)", channel, group, delivered);
        }
        Ok(())
    }

    /// Subscribe to `channel` on each group.
    ///
    /// The subscription is live when this returns; messages published afterwards are
    /// delivered. Messages of other channels on the same groups are skipped, as are
    /// payloads that do not decode as `T`.
    pub async fn listen<T>(&self, channel: &str, groups: &[&str]) -> BoxStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let kind = message_kind(channel);
        let mut receivers = Vec::with_capacity(groups.len());
        for group in groups {
            receivers.push(BroadcastStream::new(self.layer.group_subscribe(group).await));
        }

        stream::select_all(receivers)
            .filter_map(move |item| {
                let decoded = match item {
                    Ok(message) if message.kind == kind => {
                        match serde_json::from_value::<T>(message.payload) {
                            Ok(value) => Some(value),
                            Err(e) => {
                                warn!("Dropping undecodable {} message: {}", kind, e);
                                None
                            }
                        }
                    }
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!("Listener on {} lagged, skipped {} messages", kind, missed);
                        None
                    }
                };
                futures::future::ready(decoded)
            })
            .boxed()
    }
}
