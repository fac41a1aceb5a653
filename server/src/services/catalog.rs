//! Release and flavour ingestion

use serde::Deserialize;
use tracing::info;

use crate::errors::KabinetError;
use crate::flavours::Selector;
use crate::models::{Flavour, Release};
use crate::storage::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct FlavourInput {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub selectors: serde_json::Value,
    #[serde(default)]
    pub builder: String,
    #[serde(default)]
    pub manifest: serde_json::Value,
    #[serde(default)]
    pub requirements: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInput {
    pub app: String,
    pub version: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub flavours: Vec<FlavourInput>,
}

/// Upsert a release and its flavours, in the order given.
///
/// Every selector list is decoded before anything is written.
pub async fn register_release(
    store: &dyn Store,
    input: ReleaseInput,
) -> Result<(Release, Vec<Flavour>), KabinetError> {
    let mut decoded = Vec::with_capacity(input.flavours.len());
    for flavour in &input.flavours {
        let selectors = Selector::decode_list(&flavour.selectors).map_err(|e| match e {
            KabinetError::SchemaError(msg) => {
                KabinetError::SchemaError(format!("flavour {}: {}", flavour.name, msg))
            }
            other => other,
        })?;
        decoded.push(selectors);
    }

    let mut release = Release::new(input.app, input.version);
    release.scopes = input.scopes;
    release.logo = input.logo;
    if let Some(entrypoint) = input.entrypoint {
        release.entrypoint = entrypoint;
    }
    let release = store.upsert_release(release).await?;

    let mut flavours = Vec::with_capacity(input.flavours.len());
    for (flavour, selectors) in input.flavours.into_iter().zip(decoded) {
        let mut record = Flavour::new(release.id.clone(), flavour.name, flavour.image, selectors);
        record.builder = flavour.builder;
        record.manifest = flavour.manifest;
        record.requirements = flavour.requirements;
        flavours.push(store.upsert_flavour(record).await?);
    }

    info!(
        "Registered {} {} with {} flavours",
        release.app,
        release.version,
        flavours.len()
    );
    Ok((release, flavours))
}
