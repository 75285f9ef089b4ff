//! Resolver system.
//!
//! This module provides the resolver trait and infrastructure for field resolution.

use crate::coercion::Variables;
use crate::context::Fragments;
use crate::error::PathSegment;
use crate::schema::{ObjectDef, Schema, TypeRef};
use crate::value::ResolvableObject;
use gqlx_syntax::{Field, OperationDefinition};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Arguments passed to a resolver, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs {
    args: IndexMap<String, Value>,
}

impl ResolverArgs {
    /// Creates new resolver args.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets an argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    #[must_use]
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or does not deserialize into `T`.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        let value = self
            .args
            .get(name)
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ResolverError::InvalidArgument {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ResolverArgs {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Info about the field being resolved.
pub struct ResolveInfo<'a> {
    /// The field name being resolved.
    pub field_name: &'a str,
    /// Every field node sharing this response key, in document order.
    pub field_nodes: &'a [&'a Field],
    pub return_type: &'a TypeRef,
    pub parent_type: &'a ObjectDef,
    pub schema: &'a Schema,
    pub fragments: &'a Fragments<'a>,
    pub root_value: &'a dyn ResolvableObject,
    pub operation: &'a OperationDefinition,
    pub variable_values: &'a Variables,
    /// Path to this field.
    pub path: Vec<PathSegment>,
}

impl ResolveInfo<'_> {
    /// The field node whose arguments were used.
    #[must_use]
    pub fn field_node(&self) -> Option<&Field> {
        self.field_nodes.first().copied()
    }
}

impl fmt::Debug for ResolveInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveInfo")
            .field("field_name", &self.field_name)
            .field("return_type", &self.return_type.to_string())
            .field("parent_type", &self.parent_type.name)
            .field("operation", &self.operation.name_str())
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Error from a resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument \"{name}\": {message}")]
    InvalidArgument { name: String, message: String },

    #[error("{0}")]
    Custom(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Creates a custom error.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingArgument(_) => "MISSING_ARGUMENT",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Custom(_) => "RESOLVER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value.
    fn resolve<'a>(
        &'a self,
        source: &'a dyn ResolvableObject,
        args: &'a ResolverArgs,
        info: &'a ResolveInfo<'a>,
    ) -> ResolverFuture<'a>;
}

/// A shared resolver attached to a field definition.
#[derive(Clone)]
pub struct FieldResolver(Arc<dyn Resolver>);

impl FieldResolver {
    pub fn new(resolver: impl Resolver + 'static) -> Self {
        Self(Arc::new(resolver))
    }
}

impl std::ops::Deref for FieldResolver {
    type Target = dyn Resolver;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldResolver(..)")
    }
}

/// A sync resolver function.
pub type SyncResolverFn = Arc<
    dyn Fn(&dyn ResolvableObject, &ResolverArgs, &ResolveInfo<'_>) -> ResolverResult + Send + Sync,
>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    /// Creates a new function resolver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn ResolvableObject, &ResolverArgs, &ResolveInfo<'_>) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve<'a>(
        &'a self,
        source: &'a dyn ResolvableObject,
        args: &'a ResolverArgs,
        info: &'a ResolveInfo<'a>,
    ) -> ResolverFuture<'a> {
        let result = (self.func)(source, args, info);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn = Arc<dyn Fn(ResolverArgs) -> ResolverFuture<'static> + Send + Sync>;

/// A wrapper for async resolver functions.
///
/// The closure receives owned arguments so the returned future can be
/// `'static`, e.g. to await a database call.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolverArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |args| -> ResolverFuture<'static> { Box::pin(f(args)) }),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(
        &'a self,
        _source: &'a dyn ResolvableObject,
        args: &'a ResolverArgs,
        _info: &'a ResolveInfo<'a>,
    ) -> ResolverFuture<'a> {
        (self.func)(args.clone())
    }
}

/// Reads the property named after the field, invoking it if it is a thunk.
/// A missing property resolves to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl DefaultResolver {
    #[must_use]
    pub fn resolve_sync(source: &dyn ResolvableObject, field_name: &str) -> Value {
        source.resolve_property(field_name).unwrap_or(Value::Null)
    }
}

impl Resolver for DefaultResolver {
    fn resolve<'a>(
        &'a self,
        source: &'a dyn ResolvableObject,
        _args: &'a ResolverArgs,
        info: &'a ResolveInfo<'a>,
    ) -> ResolverFuture<'a> {
        let value = Self::resolve_sync(source, info.field_name);
        Box::pin(async move { Ok(value) })
    }
}
