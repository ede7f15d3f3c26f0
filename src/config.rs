//! Configuration loading for the page narrator.
//!
//! All user-tunable settings are loaded from `conf/config.toml` if present.
//! Missing or invalid entries fall back to defaults so the reader can still
//! start, and numeric values are clamped to ranges the backends accept.

use narrator_core::NormalizerConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_remote_tts_enabled")]
    pub remote_tts_enabled: bool,
    #[serde(default = "default_remote_tts_endpoint")]
    pub remote_tts_endpoint: String,
    #[serde(default)]
    pub remote_tts_api_key: Option<String>,
    #[serde(default = "default_remote_tts_api_key_env")]
    pub remote_tts_api_key_env: String,
    #[serde(default)]
    pub remote_tts_voice: Option<String>,
    #[serde(default = "default_remote_tts_speaking_rate")]
    pub remote_tts_speaking_rate: f32,
    #[serde(default = "default_remote_tts_chunk_bytes")]
    pub remote_tts_chunk_bytes: usize,
    #[serde(default = "default_local_tts_command")]
    pub local_tts_command: String,
    #[serde(default = "default_local_tts_rate")]
    pub local_tts_rate: u32,
    #[serde(default = "default_playback_volume")]
    pub playback_volume: f32,
    #[serde(default = "default_text_chars_per_line")]
    pub text_chars_per_line: usize,
    #[serde(default = "default_text_lines_per_page")]
    pub text_lines_per_page: usize,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub normalization: NormalizerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: default_log_level(),
            language: default_language(),
            remote_tts_enabled: default_remote_tts_enabled(),
            remote_tts_endpoint: default_remote_tts_endpoint(),
            remote_tts_api_key: None,
            remote_tts_api_key_env: default_remote_tts_api_key_env(),
            remote_tts_voice: None,
            remote_tts_speaking_rate: default_remote_tts_speaking_rate(),
            remote_tts_chunk_bytes: default_remote_tts_chunk_bytes(),
            local_tts_command: default_local_tts_command(),
            local_tts_rate: default_local_tts_rate(),
            playback_volume: default_playback_volume(),
            text_chars_per_line: default_text_chars_per_line(),
            text_lines_per_page: default_text_lines_per_page(),
            cache_dir: default_cache_dir(),
            normalization: NormalizerConfig::default(),
        }
    }
}

impl AppConfig {
    /// API key for the remote service: the configured value, else the
    /// environment variable named by `remote_tts_api_key_env`.
    pub fn remote_api_key(&self) -> Option<String> {
        self.remote_api_key_with(|name| env::var(name).ok())
    }

    fn remote_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        let direct = self
            .remote_tts_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        direct.or_else(|| {
            lookup(&self.remote_tts_api_key_env)
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
        })
    }

    fn clamped(mut self) -> Self {
        self.remote_tts_speaking_rate = clamp_f32(
            self.remote_tts_speaking_rate,
            0.25,
            4.0,
            default_remote_tts_speaking_rate(),
        );
        self.playback_volume = clamp_f32(self.playback_volume, 0.0, 2.0, default_playback_volume());
        self.remote_tts_chunk_bytes = self.remote_tts_chunk_bytes.clamp(64, 5000);
        self.local_tts_rate = self.local_tts_rate.clamp(80, 450);
        self.text_chars_per_line = self.text_chars_per_line.clamp(20, 240);
        self.text_lines_per_page = self.text_lines_per_page.clamp(5, 200);
        if self.language.trim().is_empty() {
            warn!("Empty language in config; using default");
            self.language = default_language();
        }
        self
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded config");
            data
        }
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default config: {err}");
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg.clamped()
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_language() -> String {
    narrator_core::session::DEFAULT_LANGUAGE.to_string()
}

fn default_remote_tts_enabled() -> bool {
    true
}

fn default_remote_tts_endpoint() -> String {
    DEFAULT_REMOTE_ENDPOINT.to_string()
}

fn default_remote_tts_api_key_env() -> String {
    "GOOGLE_TTS_API_KEY".to_string()
}

fn default_remote_tts_speaking_rate() -> f32 {
    1.0
}

fn default_remote_tts_chunk_bytes() -> usize {
    narrator_core::speech::DEFAULT_CHUNK_LIMIT
}

fn default_local_tts_command() -> String {
    "espeak-ng".to_string()
}

fn default_local_tts_rate() -> u32 {
    175
}

fn default_playback_volume() -> f32 {
    1.0
}

fn default_text_chars_per_line() -> usize {
    80
}

fn default_text_lines_per_page() -> usize {
    40
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_config(contents: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = env::temp_dir().join(format!("page-narrator-config-{nanos}.toml"));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/page-narrator/config.toml"));
        assert_eq!(config.language, "pt-BR");
        assert_eq!(config.local_tts_command, "espeak-ng");
        assert_eq!(config.remote_tts_chunk_bytes, 4800);
        assert!(config.normalization.enabled);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_config(
            r#"
log_level = "debug"
language = "en-US"
remote_tts_voice = "en-US-Neural2-C"

[normalization]
drop_numeric_bracket_citations = false
"#,
        );
        let config = load_config(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.language, "en-US");
        assert_eq!(config.remote_tts_voice.as_deref(), Some("en-US-Neural2-C"));
        assert!(!config.normalization.drop_numeric_bracket_citations);
        assert!(config.normalization.collapse_whitespace);
        assert_eq!(config.text_lines_per_page, 40);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let path = temp_config(
            r#"
remote_tts_speaking_rate = 9.0
remote_tts_chunk_bytes = 100000
local_tts_rate = 5
playback_volume = -1.0
text_chars_per_line = 1
"#,
        );
        let config = load_config(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.remote_tts_speaking_rate, 4.0);
        assert_eq!(config.remote_tts_chunk_bytes, 5000);
        assert_eq!(config.local_tts_rate, 80);
        assert_eq!(config.playback_volume, 0.0);
        assert_eq!(config.text_chars_per_line, 20);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let path = temp_config("language = [unterminated");
        let config = load_config(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(config.language, "pt-BR");
    }

    #[test]
    fn api_key_prefers_config_then_environment() {
        let mut config = AppConfig::default();
        let from_env = |name: &str| (name == "GOOGLE_TTS_API_KEY").then(|| " env-key ".to_string());

        assert_eq!(config.remote_api_key_with(from_env).as_deref(), Some("env-key"));
        assert_eq!(config.remote_api_key_with(|_| None), None);

        config.remote_tts_api_key = Some("  ".to_string());
        assert_eq!(config.remote_api_key_with(|_| None), None);

        config.remote_tts_api_key = Some("file-key".to_string());
        assert_eq!(config.remote_api_key_with(from_env).as_deref(), Some("file-key"));
    }
}
