//! Template error types

use std::fmt;

/// Errors that can occur while rendering a manifest document
#[derive(Debug)]
pub enum TemplateError {
    /// Rendering failed in the given pass (syntax error, undefined value)
    Render {
        /// 1-based pass number
        pass: u8,
        /// The underlying minijinja error
        source: minijinja::Error,
    },
    /// Placeholders remain after the final pass
    Unresolved(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render { pass, source } => {
                write!(f, "cannot inject runtime information (pass {}): {}", pass, source)
            }
            Self::Unresolved(placeholder) => write!(
                f,
                "unresolved placeholder after final pass: {}",
                placeholder
            ),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render { source, .. } => Some(source),
            Self::Unresolved(_) => None,
        }
    }
}
