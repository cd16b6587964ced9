use agrivoice_core::{AppConfig, VoiceSettings};

pub const DEFAULT_CONFIG_FILE: &str = "agrivoice.json";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_VOICE_WS_URL: &str = "ws://127.0.0.1:8765/call";

/// Public key and assistant id have no defaults; they come from the voice
/// service account.
pub fn default_app_config() -> AppConfig {
    AppConfig {
        voice: VoiceSettings {
            public_key: None,
            assistant_id: None,
            ws_url: DEFAULT_VOICE_WS_URL.into(),
        },
        api_base_url: DEFAULT_API_BASE_URL.into(),
    }
}
