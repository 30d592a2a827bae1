use thiserror::Error;

const GENERIC_FAILURE: &str = "request failed, please try again";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("not signed in or session expired")]
    Unauthenticated,
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("server returned {status}{}", message_suffix(.message))]
    Server {
        status: u16,
        message: Option<String>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {message}"),
        None => String::new(),
    }
}

impl ApiError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Banner text for the status surface.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "Please sign in to continue.".to_string(),
            ApiError::Validation { field, reason } => format!("{field}: {reason}"),
            ApiError::Server {
                status,
                message: Some(message),
            } if !message.trim().is_empty() => format!("Error {status}: {}", message.trim()),
            ApiError::Server { status, .. } => format!("Error {status}: {GENERIC_FAILURE}"),
            ApiError::Transport(_) | ApiError::Decode(_) => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthenticated)
            || matches!(self, ApiError::Server { status: 401, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
