//! Configuration for the integration layer
//!
//! Provides centralized configuration for the orchestrator and its
//! components.

use crate::voice::VoiceConfig;
use crate::{CodevoiceError, Result};

/// Configuration for the complete integration
#[derive(Clone, Debug)]
pub struct IntegrationConfig {
    /// Model name passed to the completion gateway
    pub model: String,

    /// Username under which exchanges are recorded in history
    pub username: String,

    /// Voice assistant configuration
    pub voice: VoiceConfig,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            username: "guest".to_string(),
            voice: VoiceConfig::default(),
        }
    }
}

impl IntegrationConfig {
    /// Set the gateway model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the history username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the voice configuration
    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(CodevoiceError::Config("model must not be empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(CodevoiceError::Config(
                "username must not be empty".to_string(),
            ));
        }
        if self.voice.wake_phrase.trim().is_empty() {
            return Err(CodevoiceError::Config(
                "wake phrase must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
