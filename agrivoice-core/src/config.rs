use crate::error::AssistantError;
use crate::types::AssistantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    // Public (browser-safe) key of the voice service account.
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    pub ws_url: String,
}

impl VoiceSettings {
    pub fn public_key(&self) -> Result<&str, AssistantError> {
        self.public_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AssistantError::InvalidConfiguration("missing public key".into()))
    }

    pub fn assistant_id(&self) -> Result<AssistantId, AssistantError> {
        AssistantId::parse(self.assistant_id.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub voice: VoiceSettings,
    // Base of the prediction API, e.g. "https://host/api".
    pub api_base_url: String,

    // The bearer token is stored outside this struct at rest.
}
