//! Error types for field definition, schema resolution and factory lifecycles

use std::fmt;

use thiserror::Error;

/// Result type for factory operations
pub type Result<T> = std::result::Result<T, FactoryError>;

/// Invalid call sequencing on a field builder.
///
/// These are recorded while the builder chain runs and reported when the
/// schema is built, so a broken schema never reaches a test body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Cannot call .depends_on() multiple times on the same field!")]
    DependsOnTwice,

    #[error("Cannot call .using() multiple times on the same field!")]
    UseTwice,

    #[error("Cannot call .using() before .depends_on()!")]
    UseBeforeDependsOn,

    #[error("Cannot call .depends_on() with an empty dependency list!")]
    EmptyDependencies,

    /// `depends_on` was declared but nothing reads the declared keys
    #[error("Cannot call .depends_on() without .using() or .default_with_context()!")]
    UnusedDependencies,

    #[error("default value could not be serialized: {message}")]
    InvalidDefault { message: String },
}

/// Errors raised while assembling a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid field '{key}': {source}")]
    InvalidField {
        key: String,
        #[source]
        source: FieldError,
    },

    #[error("duplicate field name: {key}")]
    DuplicateField { key: String },

    #[error("field name should be a non-empty string")]
    EmptyFieldName,
}

/// A required field whose value is still undefined after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub key: String,
    pub fixture_list: Vec<String>,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixture_list.is_empty() {
            return write!(f, "- {}: must be provided as an attribute", self.key);
        }
        write!(
            f,
            "- {}: must be provided as an attribute or via the test context ({})",
            self.key,
            self.fixture_list.join(", ")
        )
    }
}

/// Raised when required fields remain undefined after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedFieldError {
    pub factory: String,
    pub missing: Vec<MissingField>,
}

impl UndefinedFieldError {
    pub fn new(factory: impl Into<String>, missing: Vec<MissingField>) -> Self {
        Self {
            factory: factory.into(),
            missing,
        }
    }

    /// Keys of the missing fields, in schema declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(|m| m.key.as_str())
    }
}

impl fmt::Display for UndefinedFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} required field(s) have undefined values:",
            self.factory,
            self.missing.len()
        )?;
        for field in &self.missing {
            write!(f, "\n{field}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UndefinedFieldError {}

/// Returned by `Expose::expose` when the consumer finished without teardown.
///
/// Propagate it with `?` so the code after the expose point only runs when
/// teardown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("skipping test cleanup")]
pub struct Skipped;

/// Errors that can occur while defining or running a factory
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("factory name should be a non-empty string")]
    InvalidName,

    /// A lifecycle operation ran before a construction function was attached
    #[error(".fixture() must be called before .{operation}()")]
    NotConfigured { operation: &'static str },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    UndefinedFields(#[from] UndefinedFieldError),

    /// The construction function returned without exposing a value
    #[error("[{factory}] construction finished without exposing a value")]
    NotExposed { factory: String },

    #[error("expected a JSON object, received {kind}")]
    NotAnObject { kind: &'static str },

    #[error(transparent)]
    Skipped(#[from] Skipped),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure raised by user construction or teardown code, passed through as-is
    #[error(transparent)]
    Construction(anyhow::Error),
}

impl FactoryError {
    /// The missing-field report, when this is a validation failure.
    pub fn missing_fields(&self) -> Option<&[MissingField]> {
        match self {
            Self::UndefinedFields(err) => Some(&err.missing),
            _ => None,
        }
    }

    /// True when this only reports a skipped teardown, in any wrapping.
    pub fn is_skipped(&self) -> bool {
        match self {
            Self::Skipped(_) => true,
            Self::Construction(err) => err.downcast_ref::<Skipped>().is_some(),
            _ => false,
        }
    }
}
