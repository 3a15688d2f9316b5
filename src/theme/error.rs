//! Template error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// Template missing from the embedded assets
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    TemplateError(String),
}
