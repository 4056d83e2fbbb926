use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod movies;
pub mod render;
pub mod transcript;

pub use movies::{
    clean_folder_name, scan_and_rename, MovieLookup, MovieMatch, RenameEntry, RenameOptions,
    RenameOutcome, RenameReport, Renamer, TmdbClient,
};
pub use render::{
    clean_transcript, merge_blocks, render_blocks, split_lines, CleanOptions, DEFAULT_SEPARATOR,
};
pub use transcript::{
    classify, parse_blocks, resolve_speaker_name, speaker_label, Block, LineKind, SpeakerNames,
    UNKNOWN_SPEAKER,
};

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV_VAR: &str = "MEDIA_TIDY_CONFIG";

#[derive(Error, Debug)]
pub enum TidyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Lookup error: {0}")]
    Lookup(String),
    #[error("Credential error: {0}")]
    Credentials(String),
    #[error("Prompt error: {0}")]
    Prompt(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptSettings {
    pub speaker1: String,
    pub speaker2: String,
    pub separator: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        let names = SpeakerNames::default();
        TranscriptSettings {
            speaker1: names.first,
            speaker2: names.second,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovieSettings {
    pub tmdb_endpoint: String,
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MovieSettings {
    fn default() -> Self {
        MovieSettings {
            tmdb_endpoint: "https://api.themoviedb.org/3".to_string(),
            language: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub transcript: TranscriptSettings,
    pub movies: MovieSettings,
}

impl AppConfig {
    /// Load the user config, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, TidyError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, TidyError> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let config_content = std::fs::read_to_string(path)
            .map_err(|e| TidyError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str::<AppConfig>(&config_content).map_err(|e| {
            TidyError::Config(format!(
                "Failed to parse config: {}\n\nPlease check your config file at: {}",
                e,
                path.display()
            ))
        })
    }

    /// `MEDIA_TIDY_CONFIG` wins over the platform config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }

        directories::ProjectDirs::from("com", "media-tidy", "media-tidy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Stores the TMDb API key in the OS keyring.
pub struct CredentialManager {
    service_name: String,
    account: String,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialManager {
    pub fn new() -> Self {
        Self {
            service_name: "media-tidy".to_string(),
            account: "tmdb".to_string(),
        }
    }

    pub fn get_api_key(&self) -> Result<Option<String>, TidyError> {
        for env_var_name in ["MEDIA_TIDY_TMDB_API_KEY", "TMDB_API_KEY"] {
            if let Ok(key) = std::env::var(env_var_name) {
                if !key.trim().is_empty() {
                    return Ok(Some(key.trim().to_string()));
                }
            }
        }

        let entry = self.entry()?;

        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TidyError::Credentials(format!(
                "Failed to retrieve API key from keyring: {}",
                e
            ))),
        }
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<(), TidyError> {
        self.entry()?.set_password(api_key).map_err(|e| {
            TidyError::Credentials(format!("Failed to store API key in keyring: {}", e))
        })
    }

    pub fn delete_api_key(&self) -> Result<(), TidyError> {
        match self.entry()?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(TidyError::Credentials(format!(
                "Failed to delete API key from keyring: {}",
                e
            ))),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, TidyError> {
        keyring::Entry::new(&self.service_name, &self.account)
            .map_err(|e| TidyError::Credentials(format!("Failed to access keyring: {}", e)))
    }
}

/// Install a stderr tracing subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for segment in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(segment);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  hello \n\t world  "), "hello world");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace(" \n "), "");
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.transcript.speaker1, "Speaker 1");
        assert_eq!(config.transcript.speaker2, "Speaker 2");
        assert_eq!(config.transcript.separator, "\n\n");
        assert_eq!(config.movies.tmdb_endpoint, "https://api.themoviedb.org/3");
        assert_eq!(config.movies.timeout_secs, 30);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[transcript]
speaker1 = "John"

[movies]
language = "de-DE"
"#,
        )
        .unwrap();
        assert_eq!(config.transcript.speaker1, "John");
        assert_eq!(config.transcript.speaker2, "Speaker 2");
        assert_eq!(config.movies.language.as_deref(), Some("de-DE"));
        assert_eq!(config.movies.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transcript\nspeaker1 = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, TidyError::Config(_)));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transcript]\nseparator = \"\\n---\\n\"\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.transcript.separator, "\n---\n");
    }
}
