//! Backend capability interface
//!
//! Every compute backend implements `ContainerBackend`. Operations a backend kind does
//! not support fail with `NotImplementedByBackend`.

pub mod docker;
pub mod progress;
pub mod runtime;
pub mod unsupported;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::KabinetError;
use crate::flavours::{Capabilities, Selection};
use crate::models::{Backend, BackendKind, Flavour, Pod, PodStatus, Release, Setup};
use kabinet_messages::FlavourUpdate;

pub use docker::DockerBackend;
pub use unsupported::UnsupportedBackend;

pub type FlavourUpdates = BoxStream<'static, FlavourUpdate>;

#[async_trait]
pub trait ContainerBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// The registered backend this instance acts for
    fn record(&self) -> &Backend;

    fn capabilities(&self) -> &Capabilities;

    fn unsupported(&self, operation: &str) -> KabinetError {
        KabinetError::not_implemented(self.kind().as_str(), operation)
    }

    /// Queue an image pull and return without waiting for it
    async fn pull_flavour(&self, _flavour: &Flavour) -> Result<(), KabinetError> {
        Err(self.unsupported("pull_flavour"))
    }

    async fn is_image_pulled(&self, _image: &str) -> Result<bool, KabinetError> {
        Err(self.unsupported("is_image_pulled"))
    }

    /// Fitness score of a flavour, or `KabinetError::RateError` when it cannot run here
    async fn rate_flavour(&self, _flavour: &Flavour) -> Result<u64, KabinetError> {
        Err(self.unsupported("rate_flavour"))
    }

    async fn get_fitting_flavour(&self, _release: &Release) -> Result<Selection, KabinetError> {
        Err(self.unsupported("get_fitting_flavour"))
    }

    /// Bring the setup's pod up, reusing whatever already exists
    async fn up_setup(&self, _setup: &Setup) -> Result<Pod, KabinetError> {
        Err(self.unsupported("up_setup"))
    }

    /// Make sure the container for (setup, flavour) exists and return its name
    async fn ensure_container(
        &self,
        _setup: &Setup,
        _flavour: &Flavour,
    ) -> Result<String, KabinetError> {
        Err(self.unsupported("ensure_container"))
    }

    /// `PodStatus::Unknown` when the container is gone
    async fn get_status(&self, _pod: &Pod) -> Result<PodStatus, KabinetError> {
        Err(self.unsupported("get_status"))
    }

    /// Empty when the container is gone
    async fn get_logs(&self, _pod: &Pod) -> Result<String, KabinetError> {
        Err(self.unsupported("get_logs"))
    }

    async fn watch_flavour(&self, _flavour_id: &str) -> Result<FlavourUpdates, KabinetError> {
        Err(self.unsupported("watch_flavour"))
    }

    async fn watch_flavours(&self) -> Result<FlavourUpdates, KabinetError> {
        Err(self.unsupported("watch_flavours"))
    }
}
