//! Errors reported in execution results.

use crate::coercion::CoercionError;
use crate::resolver::ResolverError;
use gqlx_core::LineColumn;
use gqlx_syntax::OperationType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Extends a response path by one segment.
pub(crate) fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment);
    child
}

/// A 1-based position in the request document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl From<LineColumn> for Location {
    fn from(lc: LineColumn) -> Self {
        Self {
            line: lc.line,
            column: lc.column,
        }
    }
}

/// An error as it appears in the `errors` list of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, serde_json::Value>,
}

impl GraphQLError {
    /// Creates a new error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: IndexMap::new(),
        }
    }

    /// Adds a path to the error.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", serde_json::Value::String(code.into()))
    }

    /// The `extensions.code` value, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(serde_json::Value::as_str)
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.path.is_empty() {
            f.write_str(" at ")?;
            for (i, segment) in self.path.iter().enumerate() {
                if i > 0 {
                    f.write_str(".")?;
                }
                write!(f, "{segment}")?;
            }
        }
        Ok(())
    }
}

/// A failure that stops the request before any field is resolved.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("GraphQL cannot execute a request containing a {kind}")]
    UnsupportedDefinition { kind: &'static str },

    #[error("Must provide an operation.")]
    NoOperation,

    #[error("Must provide operation name if query contains multiple operations")]
    AmbiguousOperation,

    #[error("Unknown operation named \"{name}\".")]
    UnknownOperation { name: String },

    #[error(transparent)]
    VariableCoercion(#[from] CoercionError),

    #[error("Can only execute queries and mutations")]
    UnsupportedOperationKind { kind: Option<OperationType> },

    #[error("Schema is not configured for mutations")]
    MutationsUnsupported,
}

impl ExecutionError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedDefinition { .. } => "UNSUPPORTED_DEFINITION",
            Self::NoOperation => "NO_OPERATION",
            Self::AmbiguousOperation => "AMBIGUOUS_OPERATION",
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::VariableCoercion(_) => "VARIABLE_COERCION_ERROR",
            Self::UnsupportedOperationKind { .. } => "UNSUPPORTED_OPERATION_KIND",
            Self::MutationsUnsupported => "MUTATIONS_UNSUPPORTED",
        }
    }

    /// Formats the error for a response.
    #[must_use]
    pub fn to_graphql_error(&self) -> GraphQLError {
        GraphQLError::new(self.to_string()).with_code(self.code())
    }
}

/// A failure local to one field. The field becomes `null` and siblings
/// continue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    ArgumentCoercion(CoercionError),

    #[error("Cannot return null for non-nullable field {parent}.{field}.")]
    NonNullViolation { parent: String, field: String },

    #[error("Expected a list for field {parent}.{field} of type \"{ty}\", found {found}.")]
    NotAList {
        parent: String,
        field: String,
        ty: String,
        found: &'static str,
    },

    #[error(
        "Abstract type \"{abstract_type}\" must resolve to an object type at runtime for field {parent}.{field}. Received \"{received}\"."
    )]
    UnresolvedAbstractType {
        abstract_type: String,
        parent: String,
        field: String,
        received: String,
    },

    #[error("Resolver for field {parent}.{field} timed out after {timeout_ms}ms")]
    Timeout {
        parent: String,
        field: String,
        timeout_ms: u64,
    },

    #[error("Query exceeds the maximum depth of {max_depth}")]
    DepthLimit { max_depth: usize },
}

impl FieldError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Resolver(e) => e.code(),
            Self::ArgumentCoercion(_) => "ARGUMENT_COERCION_ERROR",
            Self::NonNullViolation { .. } => "NON_NULL_VIOLATION",
            Self::NotAList { .. } => "NOT_A_LIST",
            Self::UnresolvedAbstractType { .. } => "UNRESOLVED_ABSTRACT_TYPE",
            Self::Timeout { .. } => "RESOLVER_TIMEOUT",
            Self::DepthLimit { .. } => "MAX_DEPTH_EXCEEDED",
        }
    }
}

/// Per-request error list shared by every execution phase.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<GraphQLError>>,
}

impl ErrorCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&self, error: GraphQLError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the collector, returning errors in the order they were added.
    #[must_use]
    pub fn into_errors(self) -> Vec<GraphQLError> {
        self.errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
