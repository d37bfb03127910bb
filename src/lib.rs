pub mod gateway;
pub mod integration;
pub mod markdown;
pub mod session;
pub mod voice;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CodevoiceError {
    #[error("Input validation error: {0}")]
    InputValidation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Speech platform not supported: {0}")]
    UnsupportedPlatform(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CodevoiceError {
    fn from(e: std::io::Error) -> Self {
        CodevoiceError::Persistence(e.to_string())
    }
}

impl CodevoiceError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user can correct the input and resubmit
            CodevoiceError::InputValidation(_) => true,
            // Surfaced once; the user resubmits manually
            CodevoiceError::Gateway(_) => true,
            // Clears as soon as the in-flight request completes
            CodevoiceError::Busy(_) => true,
            // Missing speech support disables the feature for the session
            CodevoiceError::UnsupportedPlatform(_) => false,
            // Recognizer errors are retried with backoff
            CodevoiceError::Recognition(_) => true,
            // The store falls back to an empty state
            CodevoiceError::Persistence(_) => true,
            // Channel errors indicate internal issues
            CodevoiceError::Channel(_) => false,
            // Config errors require user intervention
            CodevoiceError::Config(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            CodevoiceError::InputValidation(_) => {
                "Please provide code or a prompt before submitting.".to_string()
            }
            CodevoiceError::Gateway(_) => {
                "AI request failed. Please try again.".to_string()
            }
            CodevoiceError::Busy(_) => {
                "A request is already in progress. Please wait for it to finish.".to_string()
            }
            CodevoiceError::UnsupportedPlatform(_) => {
                "Voice features are not supported on this platform.".to_string()
            }
            CodevoiceError::Recognition(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            CodevoiceError::Persistence(_) => {
                "Failed to save your session history.".to_string()
            }
            CodevoiceError::Channel(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            CodevoiceError::Config(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CodevoiceError>;
