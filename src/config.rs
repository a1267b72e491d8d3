use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_HISTORY_TOKENS: usize = 3000;
pub const DEFAULT_MAX_REPLY_TOKENS: u32 = 600;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_TRANSCRIPT_DIR: &str = "transcripts";

/// Fatal at startup; the session never begins with a broken configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set; add it to the environment or a .env file")]
    MissingApiKey,
    #[error("unsupported model id '{model}'; supported models: {supported}")]
    UnsupportedModel { model: String, supported: String },
    #[error("failed to initialize tokenizer: {0}")]
    Tokenizer(String),
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Deserialize, Default, Clone)]
struct FileConfig {
    model: Option<String>,
    max_history_tokens: Option<usize>,
    max_reply_tokens: Option<u32>,
    temperature: Option<f32>,
    transcript_dir: Option<String>,
}

fn config_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("config.toml"),
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("curio/config.toml"),
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".curio/config.toml"),
    ]
}

fn load_file_config() -> FileConfig {
    for path in config_paths() {
        if !path.exists() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
            }
        }
    }
    FileConfig::default()
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Resolved runtime settings. Precedence: defaults, then `config.toml`,
/// then environment, then CLI flags (applied by the caller).
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub max_history_tokens: usize,
    pub max_reply_tokens: u32,
    pub temperature: f32,
    pub debug: bool,
    pub transcript_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let file = load_file_config();

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let model = std::env::var("CURIO_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let transcript_dir = match env_flag("CURIO_NO_TRANSCRIPT") {
            Some(true) => None,
            _ => Some(PathBuf::from(
                file.transcript_dir
                    .unwrap_or_else(|| DEFAULT_TRANSCRIPT_DIR.to_string()),
            )),
        };

        Ok(Self {
            api_key,
            model,
            max_history_tokens: file.max_history_tokens.unwrap_or(DEFAULT_MAX_HISTORY_TOKENS),
            max_reply_tokens: file.max_reply_tokens.unwrap_or(DEFAULT_MAX_REPLY_TOKENS),
            temperature: file.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            debug: env_flag("CURIO_DEBUG").unwrap_or(false),
            transcript_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_api_key_is_fatal() {
        std::env::remove_var("OPENAI_API_KEY");
        let err = Settings::load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("CURIO_MODEL", "gpt-4");
        std::env::set_var("CURIO_DEBUG", "1");

        let settings = Settings::load().unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model, "gpt-4");
        assert!(settings.debug);
        assert_eq!(settings.max_history_tokens, DEFAULT_MAX_HISTORY_TOKENS);

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("CURIO_MODEL");
        std::env::remove_var("CURIO_DEBUG");
    }

    #[test]
    #[serial]
    fn file_config_applies_and_env_still_wins() {
        let dir = tempfile::tempdir().unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        std::fs::write(
            "config.toml",
            "model = \"gpt-4\"\nmax_history_tokens = 1234\ntemperature = 0.25\n",
        )
        .unwrap();
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::remove_var("CURIO_MODEL");

        let settings = Settings::load().unwrap();
        assert_eq!(settings.model, "gpt-4");
        assert_eq!(settings.max_history_tokens, 1234);
        assert_eq!(settings.temperature, 0.25);
        assert_eq!(settings.max_reply_tokens, DEFAULT_MAX_REPLY_TOKENS);

        // Env outranks the file for the model id.
        std::env::set_var("CURIO_MODEL", "gpt-4o");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.max_history_tokens, 1234);

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("CURIO_MODEL");
        std::env::set_current_dir(previous).unwrap();
    }

    #[test]
    #[serial]
    fn blank_api_key_counts_as_missing() {
        std::env::set_var("OPENAI_API_KEY", "   ");
        let err = Settings::load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        std::env::remove_var("OPENAI_API_KEY");
    }
}
