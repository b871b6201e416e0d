use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use voicelink_core::{ConversationConfig, PlaybackMode};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The realtime voice backend to talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("'{other}' is not a supported provider (openai, gemini)")),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: Provider,
    pub token_url: String,
    pub openai_model: String,
    pub instructions: String,
    pub capture_interval: Duration,
    pub playback_mode: PlaybackMode,
    pub playback_cooldown: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider_str =
            std::env::var("REALTIME_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = provider_str
            .parse::<Provider>()
            .map_err(|e| ConfigError::InvalidValue("REALTIME_PROVIDER".to_string(), e))?;

        let token_url = std::env::var("TOKEN_URL")
            .unwrap_or_else(|_| "http://localhost:3000/session".to_string());
        url::Url::parse(&token_url)
            .map_err(|e| ConfigError::InvalidValue("TOKEN_URL".to_string(), e.to_string()))?;

        let openai_model = std::env::var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|_| openai_realtime::DEFAULT_MODEL.to_string());

        let instructions = std::env::var("INSTRUCTIONS")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());

        let capture_interval = duration_ms("CAPTURE_INTERVAL_MS", 250)?;
        if capture_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CAPTURE_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let playback_mode_str =
            std::env::var("PLAYBACK_MODE").unwrap_or_else(|_| "utterance".to_string());
        let playback_mode = match playback_mode_str.to_lowercase().as_str() {
            "utterance" => PlaybackMode::Utterance,
            "streaming" => PlaybackMode::Streaming,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PLAYBACK_MODE".to_string(),
                    format!("'{}' is not one of utterance, streaming", other),
                ));
            }
        };

        let playback_cooldown = duration_ms("PLAYBACK_COOLDOWN_MS", 0)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            provider,
            token_url,
            openai_model,
            instructions,
            capture_interval,
            playback_mode,
            playback_cooldown,
            log_level,
        })
    }

    pub fn conversation_config(&self) -> ConversationConfig {
        ConversationConfig {
            capture_interval: self.capture_interval,
            playback_mode: self.playback_mode,
            playback_cooldown: self.playback_cooldown,
        }
    }
}

fn duration_ms(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("REALTIME_PROVIDER");
            env::remove_var("TOKEN_URL");
            env::remove_var("OPENAI_REALTIME_MODEL");
            env::remove_var("INSTRUCTIONS");
            env::remove_var("CAPTURE_INTERVAL_MS");
            env::remove_var("PLAYBACK_MODE");
            env::remove_var("PLAYBACK_COOLDOWN_MS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAI));
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Gemini));
        assert!("azure".parse::<Provider>().is_err());
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.token_url, "http://localhost:3000/session");
        assert_eq!(config.openai_model, "gpt-realtime");
        assert_eq!(config.instructions, "You are a helpful assistant.");
        assert_eq!(config.capture_interval, Duration::from_millis(250));
        assert_eq!(config.playback_mode, PlaybackMode::Utterance);
        assert_eq!(config.playback_cooldown, Duration::ZERO);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("REALTIME_PROVIDER", "gemini");
            env::set_var("TOKEN_URL", "https://tokens.example.com/session");
            env::set_var("INSTRUCTIONS", "Speak slowly.");
            env::set_var("CAPTURE_INTERVAL_MS", "100");
            env::set_var("PLAYBACK_MODE", "streaming");
            env::set_var("PLAYBACK_COOLDOWN_MS", "300");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.token_url, "https://tokens.example.com/session");
        assert_eq!(config.instructions, "Speak slowly.");
        assert_eq!(config.log_level, Level::DEBUG);

        let conversation = config.conversation_config();
        assert_eq!(conversation.capture_interval, Duration::from_millis(100));
        assert_eq!(conversation.playback_mode, PlaybackMode::Streaming);
        assert_eq!(conversation.playback_cooldown, Duration::from_millis(300));
    }

    #[test]
    #[serial]
    fn test_config_invalid_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("REALTIME_PROVIDER", "azure");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "REALTIME_PROVIDER"),
            _ => panic!("Expected InvalidValue for REALTIME_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_zero_capture_interval() {
        clear_env_vars();
        unsafe {
            env::set_var("CAPTURE_INTERVAL_MS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "CAPTURE_INTERVAL_MS"),
            _ => panic!("Expected InvalidValue for CAPTURE_INTERVAL_MS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_token_url() {
        clear_env_vars();
        unsafe {
            env::set_var("TOKEN_URL", "not a url");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TOKEN_URL"),
            _ => panic!("Expected InvalidValue for TOKEN_URL"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
