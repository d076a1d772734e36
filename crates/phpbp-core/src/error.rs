use thiserror::Error;

use crate::http::HttpError;

#[derive(Error, Debug)]
pub enum BuildpackError {
    // JSON/parsing errors
    #[error("Failed to parse composer.json: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Http(#[from] HttpError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Package errors
    #[error("Invalid package identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Download failed for {package}: {reason}")]
    DownloadFailed { package: String, reason: String },

    #[error("Checksum mismatch for {package}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to extract {package}: {reason}")]
    ExtractionFailed { package: String, reason: String },

    // Build errors
    #[error("Dependency installation failed: {0}")]
    DependencyInstall(String),

    #[error("composer.lock not found, run `composer update` and commit the lock file")]
    MissingLockFile,

    #[error("No framework matched the application")]
    NoFramework,

    #[error("Unknown framework: {0}")]
    UnknownFramework(String),

    #[error("Hook failed: {0}")]
    HookFailed(String),

    #[error("Layout error: {0}")]
    Layout(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error in {template}: {reason}")]
    Template { template: String, reason: String },

    // Runtime errors
    #[error("Failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Supervisor error: {0}")]
    Supervisor(String),
}

pub type Result<T> = std::result::Result<T, BuildpackError>;
