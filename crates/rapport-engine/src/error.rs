//! Error types for report generation.

use thiserror::Error;

/// Errors produced while processing a template.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Syntactic or contextual command error: unknown alias, duplicate IF,
    /// END outside of a loop context, malformed FOR clause.
    #[error("{message}: {command}")]
    InvalidCommand { message: String, command: String },

    /// An identifier or dotted path did not resolve in the report data or
    /// the loop variables.
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    /// A function name did not resolve in the function table.
    #[error("function not found: {name}")]
    FunctionNotFound { name: String },

    /// The command name is not one the dispatcher knows.
    #[error("command syntax error: {command}")]
    CommandSyntax { command: String },

    /// Image parameter validation failed.
    #[error("image error: {message}")]
    Image { message: String },

    /// Link parameter validation failed.
    #[error("link error: {message}")]
    Link { message: String },

    /// IF/END-IF counts did not match at the end of the walk.
    #[error("incomplete conditional statement")]
    IncompleteConditional,

    /// A FOR loop was still open at the end of the walk.
    #[error("unterminated FOR loop ('FOR {var_name}')")]
    UnterminatedFor { var_name: String },

    /// The template tree violated a structural expectation.
    #[error("template syntax error: {message}")]
    TemplateSyntax { message: String },

    /// Several errors collected during a non-fail-fast walk.
    #[error("{}", join_errors(.0))]
    Multiple(Vec<ReportError>),
}

impl ReportError {
    pub(crate) fn invalid_command(message: impl Into<String>, command: impl Into<String>) -> Self {
        ReportError::InvalidCommand {
            message: message.into(),
            command: command.into(),
        }
    }

    pub(crate) fn template_syntax(message: impl Into<String>) -> Self {
        ReportError::TemplateSyntax {
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[ReportError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_joins_messages() {
        let err = ReportError::Multiple(vec![
            ReportError::KeyNotFound {
                key: "a".to_string(),
            },
            ReportError::IncompleteConditional,
        ]);
        assert_eq!(
            err.to_string(),
            "key not found: a; incomplete conditional statement"
        );
    }
}
