//! Schema model: the read-only type system the executor runs against.

use crate::resolver::{FieldResolver, Resolver};
use gqlx_syntax::ast;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the built-in scalar types.
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// A GraphQL schema.
///
/// Built through [`SchemaBuilder`], which guarantees that the query root
/// exists and that every configured root names an object type.
#[derive(Debug, Clone)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    types: IndexMap<String, TypeDef>,
}

impl Schema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the query root type.
    #[must_use]
    pub fn query_type(&self) -> &ObjectDef {
        match self.object_type(&self.query_type) {
            Some(object) => object,
            None => unreachable!("query root type is checked by SchemaBuilder::build"),
        }
    }

    /// Returns the mutation root type, if mutations are configured.
    #[must_use]
    pub fn mutation_type(&self) -> Option<&ObjectDef> {
        self.mutation_type
            .as_deref()
            .and_then(|name| self.object_type(name))
    }

    /// Returns the subscription root type, if subscriptions are configured.
    #[must_use]
    pub fn subscription_type(&self) -> Option<&ObjectDef> {
        self.subscription_type
            .as_deref()
            .and_then(|name| self.object_type(name))
    }

    /// Gets a type by name.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Gets an object type by name.
    #[must_use]
    pub fn object_type(&self, name: &str) -> Option<&ObjectDef> {
        match self.types.get(name) {
            Some(TypeDef::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Returns all types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Returns true if `object` is a possible runtime type of the named
    /// interface or union (or is that object type itself).
    #[must_use]
    pub fn is_possible_type(&self, abstract_name: &str, object: &ObjectDef) -> bool {
        match self.types.get(abstract_name) {
            Some(TypeDef::Object(o)) => o.name == object.name,
            Some(TypeDef::Interface(_)) => object.implements.iter().any(|i| i == abstract_name),
            Some(TypeDef::Union(u)) => u.members.iter().any(|m| *m == object.name),
            _ => false,
        }
    }

    /// Returns true if the type can be used for variables and arguments.
    #[must_use]
    pub fn is_input_type(&self, ty: &TypeRef) -> bool {
        matches!(
            self.types.get(ty.named_type()),
            Some(TypeDef::Scalar(_) | TypeDef::Enum(_) | TypeDef::InputObject(_))
        )
    }
}

/// Error returned when a schema fails its construction checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema has no query root type")]
    MissingQueryType,

    #[error("{operation} root type \"{name}\" is not defined")]
    UndefinedRootType {
        operation: &'static str,
        name: String,
    },

    #[error("{operation} root type \"{name}\" must be an object type, found {kind}")]
    RootTypeNotObject {
        operation: &'static str,
        name: String,
        kind: &'static str,
    },
}

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::Interface(i) => &i.name,
            Self::Union(u) => &u.name,
            Self::Enum(e) => &e.name,
            Self::InputObject(i) => &i.name,
        }
    }

    /// The introspection kind, e.g. `OBJECT`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "SCALAR",
            Self::Object(_) => "OBJECT",
            Self::Interface(_) => "INTERFACE",
            Self::Union(_) => "UNION",
            Self::Enum(_) => "ENUM",
            Self::InputObject(_) => "INPUT_OBJECT",
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => s.description.as_deref(),
            Self::Object(o) => o.description.as_deref(),
            Self::Interface(i) => i.description.as_deref(),
            Self::Union(u) => u.description.as_deref(),
            Self::Enum(e) => e.description.as_deref(),
            Self::InputObject(i) => i.description.as_deref(),
        }
    }

    /// Output fields of object and interface types.
    #[must_use]
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(o) => Some(&o.fields),
            Self::Interface(i) => Some(&i.fields),
            _ => None,
        }
    }
}

macro_rules! impl_into_type_def {
    ($($def:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$def> for TypeDef {
                fn from(def: $def) -> Self {
                    Self::$variant(def)
                }
            }
        )*
    };
}

impl_into_type_def! {
    ScalarDef => Scalar,
    ObjectDef => Object,
    InterfaceDef => Interface,
    UnionDef => Union,
    EnumDef => Enum,
    InputObjectDef => InputObject,
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScalarDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "named_list")]
    pub fields: IndexMap<String, FieldDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
}

impl ObjectDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "named_list")]
    pub fields: IndexMap<String, FieldDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
}

impl InterfaceDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<String>,
}

impl UnionDef {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Enum type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            values: values
                .into_iter()
                .map(|v| EnumValueDef {
                    name: v.into(),
                    description: None,
                    deprecation_reason: None,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|v| v.name == name)
    }
}

/// Enum value definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValueDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_reason: Option<String>,
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputObjectDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "named_list")]
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: InputValueDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Output field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, with = "named_list")]
    pub arguments: IndexMap<String, InputValueDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_reason: Option<String>,
    /// Field-specific resolver; the default property resolver is used when absent.
    #[serde(skip)]
    pub resolver: Option<FieldResolver>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            deprecation_reason: None,
            resolver: None,
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn argument(mut self, argument: InputValueDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    /// Sets the resolver.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(FieldResolver::new(resolver));
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }
}

/// Argument or input field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValueDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl InputValueDef {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    #[must_use]
    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A reference to a type, possibly wrapped in list and non-null modifiers.
///
/// Serialized as its SDL spelling, e.g. `"[String!]!"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    #[must_use]
    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// The innermost named type.
    #[must_use]
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
        }
    }

    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Converts a type reference from a document.
    #[must_use]
    pub fn from_ast(ty: &ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => Self::Named(name.value.clone()),
            ast::Type::List(inner, _) => Self::list(Self::from_ast(inner)),
            ast::Type::NonNull(inner, _) => Self::non_null(Self::from_ast(inner)),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Error returned for a malformed type string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type reference \"{0}\"")]
pub struct TypeRefParseError(pub String);

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeRefParseError(s.to_string());
        let s = s.trim();

        if let Some(inner) = s.strip_suffix('!') {
            let inner: TypeRef = inner.parse().map_err(|_| invalid())?;
            if inner.is_non_null() {
                return Err(invalid());
            }
            return Ok(Self::non_null(inner));
        }

        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
            return Ok(Self::list(inner.parse().map_err(|_| invalid())?));
        }

        let is_name = s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_name {
            Ok(Self::named(s))
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeRefParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.to_string()
    }
}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    types: IndexMap<String, TypeDef>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a new schema builder with the built-in scalars registered.
    #[must_use]
    pub fn new() -> Self {
        let mut types = IndexMap::new();
        for name in BUILTIN_SCALARS {
            types.insert(name.to_string(), TypeDef::Scalar(ScalarDef::new(name)));
        }
        Self {
            query_type: None,
            mutation_type: None,
            subscription_type: None,
            types,
        }
    }

    /// Sets the query type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.subscription_type = Some(name.into());
        self
    }

    /// Adds a type, replacing any type of the same name.
    #[must_use]
    pub fn add_type(mut self, type_def: impl Into<TypeDef>) -> Self {
        let type_def = type_def.into();
        self.types.insert(type_def.name().to_string(), type_def);
        self
    }

    /// Builds the schema.
    ///
    /// # Errors
    ///
    /// Fails when the query root is missing or a configured root type is
    /// undefined or not an object type.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let query_type = self.query_type.ok_or(SchemaError::MissingQueryType)?;

        let roots = [
            ("query", Some(&query_type)),
            ("mutation", self.mutation_type.as_ref()),
            ("subscription", self.subscription_type.as_ref()),
        ];
        for (operation, name) in roots {
            let Some(name) = name else { continue };
            match self.types.get(name) {
                Some(TypeDef::Object(_)) => {}
                Some(other) => {
                    return Err(SchemaError::RootTypeNotObject {
                        operation,
                        name: name.clone(),
                        kind: other.kind(),
                    })
                }
                None => {
                    return Err(SchemaError::UndefinedRootType {
                        operation,
                        name: name.clone(),
                    })
                }
            }
        }

        Ok(Schema {
            query_type,
            mutation_type: self.mutation_type,
            subscription_type: self.subscription_type,
            types: self.types,
        })
    }
}

/// A schema described as JSON, e.g. for the command line.
///
/// ```json
/// {
///   "query": "Query",
///   "types": [
///     { "kind": "OBJECT", "name": "Query",
///       "fields": [{ "name": "hello", "type": "String!" }] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl SchemaConfig {
    /// Parses a schema description from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for malformed input.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// Builds the described schema.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::build`].
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut builder = SchemaBuilder::new().query_type(self.query);
        if let Some(mutation) = self.mutation {
            builder = builder.mutation_type(mutation);
        }
        if let Some(subscription) = self.subscription {
            builder = builder.subscription_type(subscription);
        }
        self.types
            .into_iter()
            .fold(builder, SchemaBuilder::add_type)
            .build()
    }
}

/// Definitions stored by name but written as a list.
trait Named {
    fn name(&self) -> &str;
}

impl Named for FieldDef {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for InputValueDef {
    fn name(&self) -> &str {
        &self.name
    }
}

mod named_list {
    use super::Named;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(map: &IndexMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Named,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items
            .into_iter()
            .map(|item| (item.name().to_string(), item))
            .collect())
    }
}
