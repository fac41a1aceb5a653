//! Backend kinds that are declared but cannot run anything yet

use async_trait::async_trait;

use crate::backends::ContainerBackend;
use crate::flavours::Capabilities;
use crate::models::{Backend, BackendKind};

/// Stand-in for apptainer and kubernetes backends
pub struct UnsupportedBackend {
    record: Backend,
    capabilities: Capabilities,
}

impl UnsupportedBackend {
    pub fn new(record: Backend, capabilities: Capabilities) -> Self {
        Self {
            record,
            capabilities,
        }
    }
}

#[async_trait]
impl ContainerBackend for UnsupportedBackend {
    fn kind(&self) -> BackendKind {
        self.record.kind
    }

    fn record(&self) -> &Backend {
        &self.record
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}
