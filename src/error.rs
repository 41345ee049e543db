use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("Config directory not found at {0}. Run 'payouts init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response from server: {0}")]
    Decode(String),

    /// The server answered with `success: false`; the message is shown as-is.
    #[error("{0}")]
    Rejected(String),

    #[error("Reference number is required")]
    MissingReference,

    #[error("Invalid payment method '{0}'. Use bank_transfer, cheque, credit_card or a provider name.")]
    InvalidPaymentMethod(String),

    #[error("Page number must be a positive integer (got {0})")]
    InvalidPage(u32),

    #[error("Cache entry '{key}' could not be used: {reason}")]
    Cache { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PayoutError {
    /// Failures that may be papered over with cached data.
    pub fn is_transport(&self) -> bool {
        matches!(self, PayoutError::Transport(_) | PayoutError::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, PayoutError>;
