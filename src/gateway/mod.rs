//! Remote completion gateway
//!
//! The generative model is an opaque remote text-completion service: one
//! prompt (optionally with an attached image) in, raw text out, no
//! streaming. [`CompletionGateway`] is the seam the orchestrator depends on;
//! [`GeminiGateway`] is the production implementation.

pub mod gemini;
pub mod prompts;

use crate::Result;
use async_trait::async_trait;

pub use gemini::GeminiGateway;
pub use prompts::build_prompt;

/// Image attached to a generation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Raw image bytes (base64-encoded at request time)
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// External text-completion service
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Send a composed prompt and await the raw response text.
    ///
    /// Fails with `CodevoiceError::Gateway`; callers surface the failure once
    /// and never retry automatically.
    async fn generate(&self, prompt: &str, image: Option<&ImagePayload>) -> Result<String>;
}
