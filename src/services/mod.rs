//! Remote Collaborators
//!
//! HTTP clients for the language model, word lookup and translation. Each
//! sits behind an `async_trait` seam so the engine can be driven by fakes.

pub mod dictionary;
pub mod model;
pub mod translate;

pub use dictionary::{DictionaryClient, WordLookup};
pub use model::{CompletionModel, CompletionRequest, GroqClient};
pub use translate::{GoogleTranslateClient, Translator};

/// Error types for collaborator calls
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Service not configured: {0}")]
    NotConfigured(&'static str),
}
