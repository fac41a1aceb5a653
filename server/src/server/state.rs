//! Server state

use std::sync::Arc;

use crate::backends::ContainerBackend;
use crate::channels::Broadcaster;
use crate::storage::Store;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub backend: Arc<dyn ContainerBackend>,
    pub broadcaster: Broadcaster,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn Store>,
        backend: Arc<dyn ContainerBackend>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            backend,
            broadcaster,
        }
    }
}
