//! Error types for relmap operations.

use std::fmt;

/// The primary error type for all relmap operations.
#[derive(Debug)]
pub enum Error {
    /// Schema lookup or registration errors
    Schema(SchemaError),
    /// Configuration errors (statement registry, addon wiring)
    Config(ConfigError),
    /// A column value failed its constraint
    Validation(ColumnValidationError),
    /// A reference column was assigned an incompatible value
    InvalidReference(InvalidReference),
    /// Operator/dialect combination without a compiler
    Unsupported(UnsupportedOperation),
    /// Collection/record lookup errors (out of range, absent, unsaved)
    Record(RecordError),
    /// Context parameter errors (paging, ordering)
    Context(ContextError),
    /// Transport/pool failures surfaced by the connection boundary
    Connection(ConnectionError),
    /// Pool lifecycle errors
    Pool(PoolError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub model: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Column not found on the schema
    ColumnNotFound,
    /// Collector not found on the schema
    CollectorNotFound,
    /// Model not registered
    ModelNotFound,
    /// Two columns registered under the same field name
    DuplicateColumn,
    /// Re-registration with a different definition
    ConflictingRegistration,
    /// Flag combination is internally inconsistent
    InvalidFlags,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// Raised when a value fails a column's constraint before any SQL is
/// compiled or executed.
#[derive(Debug)]
pub struct ColumnValidationError {
    pub column: String,
    pub message: String,
}

#[derive(Debug)]
pub struct InvalidReference {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug)]
pub struct UnsupportedOperation {
    pub dialect: &'static str,
    pub operation: String,
}

#[derive(Debug)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// Index past the end of a collection
    OutOfRange,
    /// Record absent from a collection
    NotFound,
    /// Operation requires an identity the record does not have
    Unsaved,
    /// Record has been deleted; further mutation is fatal
    Deleted,
}

#[derive(Debug)]
pub struct ContextError {
    pub message: String,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the native handle
    Open,
    /// Statement execution failed
    Execute,
    /// Connection used after close
    Closed,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// Pool has been shut down
    Closed,
    /// Invalid pool configuration
    Config,
}

impl Error {
    /// Shorthand for a column-not-found schema error.
    pub fn column_not_found(model: impl Into<String>, column: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            kind: SchemaErrorKind::ColumnNotFound,
            model: model.into(),
            name: column.into(),
        })
    }

    /// Shorthand for a collector-not-found schema error.
    pub fn collector_not_found(model: impl Into<String>, collector: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            kind: SchemaErrorKind::CollectorNotFound,
            model: model.into(),
            name: collector.into(),
        })
    }

    /// Shorthand for a model-not-registered schema error.
    pub fn model_not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Error::Schema(SchemaError {
            kind: SchemaErrorKind::ModelNotFound,
            name: model.clone(),
            model,
        })
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
        })
    }

    /// Shorthand for a column validation failure.
    pub fn validation(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(ColumnValidationError {
            column: column.into(),
            message: message.into(),
        })
    }

    /// Shorthand for an unsupported operator/dialect combination.
    pub fn unsupported(dialect: &'static str, operation: impl Into<String>) -> Self {
        Error::Unsupported(UnsupportedOperation {
            dialect,
            operation: operation.into(),
        })
    }

    /// Shorthand for a record error.
    pub fn record(kind: RecordErrorKind, message: impl Into<String>) -> Self {
        Error::Record(RecordError {
            kind,
            message: message.into(),
        })
    }

    /// Check whether this error is a schema error of the given kind.
    pub fn is_schema_error(&self, kind: SchemaErrorKind) -> bool {
        matches!(self, Error::Schema(e) if e.kind == kind)
    }

    /// Check whether this error is a record error of the given kind.
    pub fn is_record_error(&self, kind: RecordErrorKind) -> bool {
        matches!(self, Error::Record(e) if e.kind == kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "Schema error: {e}"),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Validation(e) => write!(f, "Validation error on '{}': {}", e.column, e.message),
            Error::InvalidReference(e) => write!(
                f,
                "Invalid reference for '{}': expected {}, got {}",
                e.column, e.expected, e.actual
            ),
            Error::Unsupported(e) => {
                write!(f, "Unsupported operation on {}: {}", e.dialect, e.operation)
            }
            Error::Record(e) => write!(f, "Record error: {}", e.message),
            Error::Context(e) => write!(f, "Context error: {}", e.message),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SchemaErrorKind::ColumnNotFound => {
                write!(f, "did not find column '{}' on '{}'", self.name, self.model)
            }
            SchemaErrorKind::CollectorNotFound => {
                write!(
                    f,
                    "did not find collector '{}' on '{}'",
                    self.name, self.model
                )
            }
            SchemaErrorKind::ModelNotFound => write!(f, "model '{}' is not registered", self.model),
            SchemaErrorKind::DuplicateColumn => {
                write!(
                    f,
                    "column '{}' defined more than once on '{}'",
                    self.name, self.model
                )
            }
            SchemaErrorKind::ConflictingRegistration => {
                write!(
                    f,
                    "model '{}' re-registered with a conflicting definition",
                    self.model
                )
            }
            SchemaErrorKind::InvalidFlags => {
                write!(
                    f,
                    "column '{}' on '{}' carries an inconsistent flag combination",
                    self.name, self.model
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ColumnValidationError> for Error {
    fn from(err: ColumnValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<InvalidReference> for Error {
    fn from(err: InvalidReference) -> Self {
        Error::InvalidReference(err)
    }
}

impl From<UnsupportedOperation> for Error {
    fn from(err: UnsupportedOperation) -> Self {
        Error::Unsupported(err)
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        Error::Record(err)
    }
}

impl From<ContextError> for Error {
    fn from(err: ContextError) -> Self {
        Error::Context(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
    }
}

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;
