//! Parent values handed to resolvers.
//!
//! Resolvers never see concrete Rust types. A parent is anything that can
//! answer "what is your property called `name`", either with a stored
//! value or with a thunk that produces one on demand.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// A zero-argument value producer stored as an object property.
pub type Thunk = dyn Fn() -> Value + Send + Sync;

/// A property of a parent value.
#[derive(Clone, Copy)]
pub enum Property<'a> {
    Value(&'a Value),
    Thunk(&'a Thunk),
}

impl Property<'_> {
    /// Returns the property value, invoking it if it is a thunk.
    #[must_use]
    pub fn get(self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Thunk(thunk) => thunk(),
        }
    }
}

impl fmt::Debug for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// A value that fields can be resolved against.
pub trait ResolvableObject: Send + Sync {
    /// Looks up a property by name.
    fn property(&self, name: &str) -> Option<Property<'_>>;

    /// The runtime type name, used to resolve interfaces and unions.
    fn typename(&self) -> Option<String> {
        self.property("__typename")
            .map(Property::get)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Looks up a property and evaluates it.
    fn resolve_property(&self, name: &str) -> Option<Value> {
        self.property(name).map(Property::get)
    }
}

impl ResolvableObject for Value {
    fn property(&self, name: &str) -> Option<Property<'_>> {
        self.as_object()?.get(name).map(Property::Value)
    }
}

impl ResolvableObject for Map<String, Value> {
    fn property(&self, name: &str) -> Option<Property<'_>> {
        self.get(name).map(Property::Value)
    }
}

enum Entry {
    Value(Value),
    Thunk(Box<Thunk>),
}

/// An object whose properties may be computed lazily.
///
/// ```
/// use gqlx_runtime::{ObjectValue, ResolvableObject};
/// use serde_json::json;
///
/// let user = ObjectValue::new()
///     .with("name", json!("Ada"))
///     .with_thunk("greeting", || json!("hello"));
///
/// assert_eq!(user.resolve_property("greeting"), Some(json!("hello")));
/// ```
#[derive(Default)]
pub struct ObjectValue {
    entries: IndexMap<String, Entry>,
}

impl ObjectValue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stored property.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds a computed property.
    #[must_use]
    pub fn with_thunk<F>(mut self, name: impl Into<String>, thunk: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.insert_thunk(name, thunk);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), Entry::Value(value));
    }

    pub fn insert_thunk<F>(&mut self, name: impl Into<String>, thunk: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Entry::Thunk(Box::new(thunk)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResolvableObject for ObjectValue {
    fn property(&self, name: &str) -> Option<Property<'_>> {
        self.entries.get(name).map(|entry| match entry {
            Entry::Value(value) => Property::Value(value),
            Entry::Thunk(thunk) => Property::Thunk(thunk.as_ref()),
        })
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            match entry {
                Entry::Value(value) => map.entry(name, value),
                Entry::Thunk(_) => map.entry(name, &"<thunk>"),
            };
        }
        map.finish()
    }
}
