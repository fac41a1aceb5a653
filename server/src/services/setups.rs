//! Setup creation and deployment

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::backends::ContainerBackend;
use crate::errors::KabinetError;
use crate::models::{Pod, Setup};
use crate::storage::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSetupInput {
    pub release_id: String,
    #[serde(default)]
    pub flavour_id: Option<String>,
    pub installer: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    pub api_token: String,
    #[serde(default)]
    pub fakts_url: Option<Url>,
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// Store a setup with its flavour resolved: the pinned one, or the backend's best fit
pub async fn create_setup(
    store: &dyn Store,
    backend: &dyn ContainerBackend,
    input: CreateSetupInput,
) -> Result<Setup, KabinetError> {
    let release = store.get_release(&input.release_id).await?;

    let flavour_id = match input.flavour_id {
        Some(flavour_id) => {
            let flavour = store.get_flavour(&flavour_id).await?;
            if flavour.release_id != release.id {
                return Err(KabinetError::ValidationError(format!(
                    "flavour {} does not belong to release {}",
                    flavour.id, release.id
                )));
            }
            flavour.id
        }
        None => backend.get_fitting_flavour(&release).await?.flavour.id,
    };

    let mut setup = Setup::new(release.id, input.installer, input.api_token);
    setup.flavour_id = Some(flavour_id);
    setup.command = input.command;
    setup.fakts_url = input.fakts_url;
    if let Some(instance_id) = input.instance_id {
        setup.instance_id = instance_id;
    }

    let setup = store.insert_setup(setup).await?;
    info!("Created setup {} for release {}", setup.id, setup.release_id);
    Ok(setup)
}

pub async fn deploy_setup(
    store: &dyn Store,
    backend: &dyn ContainerBackend,
    setup_id: &str,
) -> Result<Pod, KabinetError> {
    let setup = store.get_setup(setup_id).await?;
    backend.up_setup(&setup).await
}
