//! Release and flavour models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flavours::selectors::Selector;

/// An application version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Unique release ID
    pub id: String,

    /// Application identifier (e.g. "github.io.jhnnsrs.demo")
    pub app: String,

    /// Semantic version string
    pub version: String,

    /// Scopes the application requests
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Optional logo reference
    #[serde(default)]
    pub logo: Option<String>,

    /// Entrypoint module
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

fn default_entrypoint() -> String {
    "app".to_string()
}

impl Release {
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            app: app.into(),
            version: version.into(),
            scopes: Vec::new(),
            logo: None,
            entrypoint: default_entrypoint(),
            created_at: Utc::now(),
        }
    }
}

/// One runnable variant of a release, bound to a single image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavour {
    /// Unique flavour ID
    pub id: String,

    /// Release this flavour belongs to
    pub release_id: String,

    /// Name, unique within the release (e.g. "vanilla", "cuda")
    pub name: String,

    /// Container image reference
    pub image: String,

    /// Requirements and preferences, in declaration order
    #[serde(default)]
    pub selectors: Vec<Selector>,

    /// Builder that produced the image
    #[serde(default)]
    pub builder: String,

    /// Free-form manifest metadata
    #[serde(default)]
    pub manifest: serde_json::Value,

    /// Free-form requirements metadata
    #[serde(default)]
    pub requirements: serde_json::Value,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Flavour {
    pub fn new(
        release_id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        selectors: Vec<Selector>,
    ) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            release_id: release_id.into(),
            name: name.into(),
            image: image.into(),
            selectors,
            builder: String::new(),
            manifest: serde_json::Value::Null,
            requirements: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}
