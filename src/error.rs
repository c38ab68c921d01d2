//! User-visible failures of a turn.
//!
//! Everything protocol-level is recovered locally and never shows up here;
//! these variants are the ones the console surfaces verbatim.

use thiserror::Error;

/// Marker the backend puts in a 404 body when the requested model needs a key.
pub const MODEL_NOT_FOUND_MARKER: &str = "Model not found";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// No credential configured for a non-local endpoint. Raised before any
    /// network call.
    #[error("An API key is required to use these models. Set PAIRPAD_API_KEY.")]
    MissingCredential,

    #[error("Model '{model}' requires a valid API key. Please check your settings.")]
    ModelRequiresKey { model: String },

    #[error("Server Error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("API request to '{url}' failed: {message}")]
    Transport { url: String, message: String },
}

impl ConsoleError {
    /// Maps a non-2xx response onto the taxonomy.
    pub fn from_status(status: u16, body: &str, reason: Option<&str>, model: &str) -> Self {
        if status == 404 && body.contains(MODEL_NOT_FOUND_MARKER) {
            return Self::ModelRequiresKey {
                model: model.to_string(),
            };
        }
        let body = if body.trim().is_empty() {
            reason.unwrap_or_default().to_string()
        } else {
            body.to_string()
        };
        Self::Server { status, body }
    }
}
