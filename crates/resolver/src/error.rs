//! Error types for configuration resolution.
//!
//! Every failure is fatal for the load that triggered it. Errors are grouped
//! into categories so callers can tell schema mistakes apart from failing
//! user callbacks and broken modules.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::store::EntityKind;
use crate::value::Value;

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of resolution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown field, or a known field with an unexpected shape.
    Schema,
    /// A user callback signalled failure or raised an error.
    Callback,
    /// A module could not be fetched, found or evaluated.
    Module,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Schema => "Invalid declaration",
            Self::Callback => "Callback failed",
            Self::Module => "Module resolution failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while resolving declarations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity kind has no field with this name.
    #[error("unsupported {kind}'s field '{field}'")]
    UnknownField {
        /// Entity kind being updated.
        kind: EntityKind,
        /// Offending field name.
        field: String,
    },

    /// A known field received a value of the wrong shape.
    #[error("invalid value of a {kind}'s field '{field}': expected {expected}, got {got}")]
    InvalidField {
        /// Entity kind being updated.
        kind: EntityKind,
        /// Field name.
        field: String,
        /// Shape the field accepts.
        expected: &'static str,
        /// Rendering of the rejected value.
        got: String,
    },

    /// A task declared both an inline script and a script file.
    #[error(
        "invalid task definition '{task}': can't use 'script_file' and 'script' at the same time"
    )]
    ScriptConflict {
        /// Task name.
        task: String,
    },

    /// Any other malformed declaration.
    #[error("{0}")]
    Schema(String),

    /// A handle that was not issued by this resolver.
    #[error("{kind} handle does not belong to this resolver")]
    UnknownHandle {
        /// Kind of the referenced entity.
        kind: EntityKind,
    },

    /// A driver engine callback returned something other than a string.
    #[error("driver '{driver}' engine has to return a string, got {got}")]
    EngineNotString {
        /// Driver name.
        driver: String,
        /// Rendering of the returned value.
        got: String,
    },

    /// A prepare callback returned an explicit `false`.
    #[error("{kind} '{name}' returned false from the prepare function")]
    PrepareRejected {
        /// Entity kind owning the callback.
        kind: EntityKind,
        /// Entity name.
        name: String,
    },

    /// Error raised inside a user callback, propagated unchanged.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),

    /// `import` was called while another module's entrypoint was evaluating.
    #[error("'{name}' can't be imported while evaluating module '{active}': nested module importing is not supported")]
    NestedImport {
        /// Module requested by the nested call.
        name: String,
        /// Module currently being evaluated.
        active: String,
    },

    /// The fetch collaborator failed to download a module.
    #[error("failed to fetch module '{name}': {message}")]
    Fetch {
        /// Import name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The module cache directory has no entrypoint file.
    #[error("invalid module '{name}': {} not found", .path.display())]
    InvalidModule {
        /// Import name.
        name: String,
        /// Expected entrypoint path.
        path: PathBuf,
    },

    /// Evaluating a module's entrypoint failed.
    #[error("error in module '{name}': {source}")]
    Module {
        /// Import name.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// The evaluator could not read or interpret a declaration file.
    #[error("failed to evaluate {}: {message}", .path.display())]
    Evaluate {
        /// File being evaluated.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error around the module cache.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an unknown-field error.
    pub fn unknown_field(kind: EntityKind, field: impl Into<String>) -> Self {
        Self::UnknownField {
            kind,
            field: field.into(),
        }
    }

    /// Create a wrong-shape error for `field`.
    pub fn invalid_field(
        kind: EntityKind,
        field: impl Into<String>,
        expected: &'static str,
        got: &Value,
    ) -> Self {
        Self::InvalidField {
            kind,
            field: field.into(),
            expected,
            got: got.to_string(),
        }
    }

    /// Create a generic schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownField { .. }
            | Error::InvalidField { .. }
            | Error::ScriptConflict { .. }
            | Error::Schema(_)
            | Error::UnknownHandle { .. }
            | Error::EngineNotString { .. }
            | Error::Evaluate { .. } => ErrorCategory::Schema,
            Error::PrepareRejected { .. } | Error::Callback(_) => ErrorCategory::Callback,
            Error::NestedImport { .. }
            | Error::Fetch { .. }
            | Error::InvalidModule { .. }
            | Error::Module { .. }
            | Error::Io { .. } => ErrorCategory::Module,
        }
    }

    /// Innermost error, looking through module evaluation wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Module { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_names_the_field() {
        let err = Error::unknown_field(EntityKind::Host, "colour");
        assert_eq!(err.to_string(), "unsupported host's field 'colour'");
        assert_eq!(err.category(), ErrorCategory::Schema);
    }

    #[test]
    fn test_invalid_field_renders_value() {
        let err = Error::invalid_field(EntityKind::Task, "pty", "a bool", &Value::from("yes"));
        assert_eq!(
            err.to_string(),
            "invalid value of a task's field 'pty': expected a bool, got \"yes\""
        );
    }

    #[test]
    fn test_callback_error_is_transparent() {
        let err = Error::from(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.category(), ErrorCategory::Callback);
    }

    #[test]
    fn test_root_unwraps_module_errors() {
        let nested = Error::NestedImport {
            name: "b".into(),
            active: "a".into(),
        };
        let err = Error::Module {
            name: "a".into(),
            source: Box::new(nested),
        };
        assert_eq!(err.category(), ErrorCategory::Module);
        assert!(matches!(err.root(), Error::NestedImport { name, .. } if name == "b"));
    }
}
