use std::path::PathBuf;

use thiserror::Error;

use crate::locale::Locale;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The service answered with a non-success status.
    #[error("{}", rejection_text(.status, .message))]
    Rejected { status: u16, message: Option<String> },
    #[error("cannot reach server: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("unexpected response body (status {status}): {source}")]
    MalformedResponse {
        status: u16,
        #[source]
        source: reqwest::Error,
    },
}

fn rejection_text(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("Error {status}"),
    }
}

impl GatewayError {
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        Self::Rejected { status, message }
    }

    /// Text shown to the user in place of the result.
    pub fn display_message(&self, locale: Locale) -> String {
        match self {
            GatewayError::Rejected { status, message } => rejection_text(status, message),
            GatewayError::Unreachable(_) => locale.catalog().unreachable.to_string(),
            GatewayError::MalformedResponse { .. } => locale.catalog().malformed.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } | GatewayError::MalformedResponse { status, .. } => {
                Some(*status)
            }
            GatewayError::Unreachable(_) => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionStateError {
    #[error("cannot commit an empty story id")]
    EmptyIdentity,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid server url '{value}': {source}")]
    ServerUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}
