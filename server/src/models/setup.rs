//! Setup model

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// User intent to run a release on a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setup {
    /// Unique setup ID
    pub id: String,

    /// Release to run
    pub release_id: String,

    /// Flavour pinned by the user, if any
    #[serde(default)]
    pub flavour_id: Option<String>,

    /// User who requested the install
    pub installer: String,

    /// Command override for the container
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Token handed to the app so it can call back into the platform
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub api_token: SecretString,

    /// Configuration endpoint handed to the app
    #[serde(default)]
    pub fakts_url: Option<Url>,

    /// Instance namespace the app registers under
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    pub created_at: DateTime<Utc>,
}

fn default_instance_id() -> String {
    "default".to_string()
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw))
}

impl Setup {
    pub fn new(
        release_id: impl Into<String>,
        installer: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            release_id: release_id.into(),
            flavour_id: None,
            installer: installer.into(),
            command: None,
            api_token: SecretString::from(api_token.into()),
            fakts_url: None,
            instance_id: default_instance_id(),
            created_at: Utc::now(),
        }
    }

    /// Environment handed to the container
    pub fn container_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("FAKTS_TOKEN".to_string(), self.api_token.expose_secret().to_string()),
            ("INSTANCE_ID".to_string(), self.instance_id.clone()),
        ];
        if let Some(url) = &self.fakts_url {
            env.push(("FAKTS_URL".to_string(), url.to_string()));
        }
        env
    }
}
