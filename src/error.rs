//! Error types for the expression engine

use thiserror::Error;

use crate::ast::Span;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or evaluating an expression.
///
/// Parse-stage errors carry 1-based line/column positions; evaluation-stage
/// errors carry the source span of the offending node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("type error: {message}")]
    Type { message: String, span: Span },

    #[error("resolver error: {message}")]
    Resolver { message: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("unknown sentinel ${name} at line {line}, column {column}")]
    UnknownSentinel {
        name: String,
        line: usize,
        column: usize,
    },
}

impl Error {
    /// Shorthand for a `Type` error at the given span.
    pub(crate) fn type_at(span: Span, message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
            span,
        }
    }

    /// Shorthand for a `Resolver` error at the given span.
    pub(crate) fn resolver_at(span: Span, message: impl Into<String>) -> Self {
        Error::Resolver {
            message: message.into(),
            span,
        }
    }

    /// Fill in a span on errors raised below the AST (resolvers, coercion
    /// helpers) that did not know their source position.
    pub(crate) fn with_span(self, span: Span) -> Self {
        let default = Span::default();
        match self {
            Error::Type { message, span: s } if s == default => Error::Type { message, span },
            Error::Resolver { message, span: s } if s == default => {
                Error::Resolver { message, span }
            }
            Error::DivisionByZero { span: s } if s == default => Error::DivisionByZero { span },
            other => other,
        }
    }
}
