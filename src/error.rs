//! Error types for the engine

use thiserror::Error;

use crate::value::JsValue;

/// Source location information for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub source_name: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(source_name: Option<String>, line: u32, column: u32) -> Self {
        Self {
            source_name,
            line,
            column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_name {
            Some(name) => write!(f, "{}:{}:{}", name, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Main error type for compilation and evaluation
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("SyntaxError: {message} at {location}")]
    SyntaxError {
        message: String,
        location: SourceLocation,
    },

    #[error("TypeError: {message}{}", format_location(.location))]
    TypeError {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    /// A script-level `throw` that no frame caught
    #[error("{message}")]
    Thrown { value: JsValue, message: String },

    /// Environment or configuration misuse detected by the evaluator itself
    #[error("EvaluatorException: {message}")]
    Evaluator { message: String },

    /// The embedder tripped the interrupt handle
    #[error("Execution interrupted")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_location(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::SyntaxError {
            message: message.into(),
            location: SourceLocation::new(None, line, column),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
            location: None,
        }
    }

    pub fn type_error_at(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::TypeError {
            message: message.into(),
            location: Some(SourceLocation::new(None, line, column)),
        }
    }

    /// `"name" is not defined`
    pub fn reference_error(name: impl std::fmt::Display) -> Self {
        JsError::ReferenceError {
            message: format!("\"{}\" is not defined.", name),
        }
    }

    pub fn reference_error_with_message(message: impl Into<String>) -> Self {
        JsError::ReferenceError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn evaluator_error(message: impl Into<String>) -> Self {
        JsError::Evaluator {
            message: message.into(),
        }
    }

    /// Create an internal error for unexpected interpreter states
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    pub fn thrown(value: JsValue, message: impl Into<String>) -> Self {
        JsError::Thrown {
            value,
            message: message.into(),
        }
    }

    /// Attach a source name to a syntax error that was raised without one
    pub fn with_source_name(self, name: &str) -> Self {
        match self {
            JsError::SyntaxError {
                message,
                mut location,
            } => {
                if location.source_name.is_none() {
                    location.source_name = Some(name.to_string());
                }
                JsError::SyntaxError { message, location }
            }
            other => other,
        }
    }

    /// Whether script `catch` clauses may observe this error
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JsError::Interrupted | JsError::Internal(_))
    }

    /// Name of the script-visible constructor for engine-raised errors
    pub fn error_name(&self) -> &'static str {
        match self {
            JsError::SyntaxError { .. } => "SyntaxError",
            JsError::TypeError { .. } => "TypeError",
            JsError::ReferenceError { .. } => "ReferenceError",
            JsError::RangeError { .. } => "RangeError",
            JsError::Evaluator { .. } | JsError::Internal(_) | JsError::Interrupted => "Error",
            JsError::Thrown { .. } => "Error",
        }
    }

    /// The bare message, without the error name prefix
    pub fn message(&self) -> String {
        match self {
            JsError::SyntaxError { message, .. }
            | JsError::TypeError { message, .. }
            | JsError::ReferenceError { message }
            | JsError::RangeError { message }
            | JsError::Thrown { message, .. }
            | JsError::Evaluator { message } => message.clone(),
            JsError::Interrupted => "Execution interrupted".to_string(),
            JsError::Internal(msg) => msg.clone(),
        }
    }

    /// The thrown script value, if this error came from a script `throw`
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JsError::Thrown { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_renders_location() {
        let err = JsError::syntax_error("missing ; before statement", 3, 7).with_source_name("a.js");
        assert_eq!(
            err.to_string(),
            "SyntaxError: missing ; before statement at a.js:3:7"
        );
    }

    #[test]
    fn interrupts_are_not_catchable() {
        assert!(!JsError::Interrupted.is_catchable());
        assert!(JsError::range_error("r").is_catchable());
    }
}
