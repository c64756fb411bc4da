use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Environment variable holding the model provider API key.
pub const ENV_API_KEY: &str = "OR_API_KEY";
/// Environment variable holding the model identifier.
pub const ENV_MODEL_NAME: &str = "OR_MODEL_NAME";

/// Top-level configuration for the Lexi application.
///
/// Loaded from `~/.lexi/config.toml` by default. Each section corresponds
/// to one crate or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl LexiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LexiConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply provider credentials from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply provider credentials from an arbitrary key lookup.
    ///
    /// Empty values are ignored so that an exported-but-blank variable does
    /// not wipe a key set in the config file.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup(ENV_MODEL_NAME).filter(|v| !v.trim().is_empty()) {
            self.llm.model = model;
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and saved uploads.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.lexi/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

/// Language model provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Full URL of the chat completions endpoint.
    pub base_url: String,
    /// Bearer token. Usually supplied through `OR_API_KEY`.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Value of the `HTTP-Referer` header.
    pub referer: String,
    /// Value of the `X-Title` header.
    pub title: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "openai/gpt-4o-mini".to_string(),
            timeout_secs: 60,
            referer: "http://localhost".to_string(),
            title: "English Grammar Chatbot".to_string(),
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of most recent turns rendered into each prompt.
    pub history_limit: usize,
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 5,
            max_message_length: 2000,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Path to the GGML Whisper model file.
    pub model_path: String,
    /// Transcription language code.
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
    /// Maximum accepted audio upload size in bytes.
    pub max_upload_bytes: usize,
    /// Keep uploaded audio under `<data_dir>/audio`.
    pub save_uploads: bool,
    /// ffmpeg binary used to decode Ogg and WebM recordings.
    pub ffmpeg_path: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model_path: "~/.lexi/models/ggml-base.bin".to_string(),
            language: "en".to_string(),
            beam_size: 5,
            max_upload_bytes: 25 * 1024 * 1024,
            save_uploads: false,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Requests per second allowed on routes that reach the model or
    /// the transcriber.
    pub rate_limit_per_sec: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LexiError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = LexiConfig::default();
        assert_eq!(config.general.data_dir, "~/.lexi/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.chat.history_limit, 5);
        assert_eq!(config.llm.timeout_secs, 60);
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.voice.language, "en");
        assert_eq!(config.voice.beam_size, 5);
        assert!(!config.voice.save_uploads);
        assert_eq!(config.voice.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"
port = 9090

[llm]
model = "meta-llama/llama-3.1-8b-instruct"
timeout_secs = 30

[chat]
history_limit = 8
"#;
        let file = create_temp_config(content);
        let config = LexiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.port, 9090);
        assert_eq!(config.llm.model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.chat.history_limit, 8);
        // Untouched fields keep their defaults.
        assert_eq!(config.chat.max_message_length, 2000);
        assert_eq!(config.llm.title, "English Grammar Chatbot");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = LexiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.api.rate_limit_per_sec, 20);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = LexiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "~/.lexi/data");
        assert_eq!(config.voice.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("[general\nport = ");
        let result = LexiConfig::load(file.path());
        assert!(matches!(result, Err(LexiError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = LexiConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.lexi/data");
    }

    #[test]
    fn test_load_or_default_invalid_file() {
        let file = create_temp_config("[voice\nffmpeg_path = ");
        let config = LexiConfig::load_or_default(file.path());
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.voice.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let file = create_temp_config("[general]\nlog_level = \"debug\"\n[voice]\nffmpeg_path = \"/opt/ffmpeg/bin/ffmpeg\"\n");
        let config = LexiConfig::load_or_default(file.path());
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.voice.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    fn test_env_overrides_replace_credentials() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_API_KEY, "sk-test"), (ENV_MODEL_NAME, "vendor/model")]);
        let mut config = LexiConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.model, "vendor/model");
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = LexiConfig::default();
        config.llm.api_key = "from-file".to_string();
        config.apply_overrides_from(|k| (k == ENV_API_KEY).then(|| "  ".to_string()));
        assert_eq!(config.llm.api_key, "from-file");
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
    }
}
