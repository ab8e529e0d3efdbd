use thiserror::Error;

/// Postgres error code for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SupabaseError {
    /// Builds the error for a non-success response.
    pub fn from_response(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            409 => SupabaseError::Conflict(body),
            _ if is_unique_violation(&body) => SupabaseError::Conflict(body),
            _ => SupabaseError::Api { status, body },
        }
    }

    /// Server errors, rate limiting and network failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            SupabaseError::Api { status, .. } => *status >= 500 || *status == 429,
            SupabaseError::Transport(_) => true,
            _ => false,
        }
    }
}

fn is_unique_violation(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("code").and_then(|c| c.as_str()).map(|c| c == UNIQUE_VIOLATION))
        .unwrap_or(false)
}

/// Recovers a typed error carried inside an `anyhow::Error`.
pub fn classify(error: &anyhow::Error) -> Option<&SupabaseError> {
    error.downcast_ref::<SupabaseError>()
}
