//! Abstract syntax tree for executable GraphQL documents.
//!
//! Nodes own their text so a document can outlive the source it was parsed
//! from and can also be assembled by hand.

use gqlx_core::{LineColumn, LineIndex, Span};

/// A complete document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub definitions: Vec<Definition>,
    pub span: Span,
    /// Line starts of the parsed source; empty for hand-built documents.
    pub line_index: LineIndex,
}

impl Document {
    /// Creates a document without source positions.
    #[must_use]
    pub fn new(definitions: Vec<Definition>) -> Self {
        Self {
            definitions,
            span: Span::default(),
            line_index: LineIndex::default(),
        }
    }

    /// Converts a node span to a line/column position in the source.
    #[must_use]
    pub fn location(&self, span: Span) -> Option<LineColumn> {
        self.line_index.line_column(span.start)
    }

    /// Iterates the operation definitions in document order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Operation(op) => Some(op),
            _ => None,
        })
    }

    /// Iterates the fragment definitions in document order.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Fragment(frag) => Some(frag),
            _ => None,
        })
    }
}

/// A top-level definition.
#[derive(Debug, Clone)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
    /// A schema definition, recognised but not retained in detail.
    TypeSystem(TypeSystemDefinition),
}

impl Definition {
    /// The node kind name, e.g. `OperationDefinition`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Operation(_) => "OperationDefinition",
            Self::Fragment(_) => "FragmentDefinition",
            Self::TypeSystem(def) => def.node_kind(),
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Operation(op) => op.span,
            Self::Fragment(frag) => frag.span,
            Self::TypeSystem(def) => def.span,
        }
    }
}

/// Type of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation definition.
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    pub operation: OperationType,
    pub name: Option<Name>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl OperationDefinition {
    /// The operation name, or `""` for an anonymous operation.
    #[must_use]
    pub fn name_str(&self) -> &str {
        self.name.as_ref().map_or("", |n| n.value.as_str())
    }
}

/// A variable definition, e.g. `$id: ID! = 1`.
#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub variable: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// A fragment definition.
#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Kind of a type-system definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSystemKind {
    Schema,
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    Directive,
}

impl TypeSystemKind {
    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "schema" => Some(Self::Schema),
            "scalar" => Some(Self::Scalar),
            "type" => Some(Self::Object),
            "interface" => Some(Self::Interface),
            "union" => Some(Self::Union),
            "enum" => Some(Self::Enum),
            "input" => Some(Self::InputObject),
            "directive" => Some(Self::Directive),
            _ => None,
        }
    }
}

/// A type-system definition or extension.
#[derive(Debug, Clone)]
pub struct TypeSystemDefinition {
    pub kind: TypeSystemKind,
    /// True for `extend ...` definitions.
    pub extension: bool,
    pub name: Option<Name>,
    pub span: Span,
}

impl TypeSystemDefinition {
    #[must_use]
    pub fn node_kind(&self) -> &'static str {
        use TypeSystemKind as K;
        match (self.kind, self.extension) {
            (K::Schema, false) => "SchemaDefinition",
            (K::Schema, true) => "SchemaExtension",
            (K::Scalar, false) => "ScalarTypeDefinition",
            (K::Scalar, true) => "ScalarTypeExtension",
            (K::Object, false) => "ObjectTypeDefinition",
            (K::Object, true) => "ObjectTypeExtension",
            (K::Interface, false) => "InterfaceTypeDefinition",
            (K::Interface, true) => "InterfaceTypeExtension",
            (K::Union, false) => "UnionTypeDefinition",
            (K::Union, true) => "UnionTypeExtension",
            (K::Enum, false) => "EnumTypeDefinition",
            (K::Enum, true) => "EnumTypeExtension",
            (K::InputObject, false) => "InputObjectTypeDefinition",
            (K::InputObject, true) => "InputObjectTypeExtension",
            (K::Directive, _) => "DirectiveDefinition",
        }
    }
}

/// A selection set.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
    pub span: Span,
}

impl SelectionSet {
    #[must_use]
    pub fn new(selections: Vec<Selection>) -> Self {
        Self {
            selections,
            span: Span::default(),
        }
    }
}

/// A selection.
#[derive(Debug, Clone)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        match self {
            Self::Field(f) => &f.directives,
            Self::FragmentSpread(s) => &s.directives,
            Self::InlineFragment(i) => &i.directives,
        }
    }
}

/// A field selection.
#[derive(Debug, Clone)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
    pub span: Span,
}

impl Field {
    /// Creates a bare field selection with no alias, arguments or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: Name::new(name),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: None,
            span: Span::default(),
        }
    }

    /// The key this field is reported under: the alias if present, else the name.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().unwrap_or(&self.name).value.as_str()
    }

    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.value == name)
    }
}

/// A named fragment spread, e.g. `...UserFields`.
#[derive(Debug, Clone)]
pub struct FragmentSpread {
    pub fragment_name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// An inline fragment, e.g. `... on User { id }`.
#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// A directive application.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl Directive {
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name.value == name)
    }
}

/// An argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Name,
    pub value: Value,
    pub span: Span,
}

/// A type reference in a variable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Named(Name),
    List(Box<Type>, Span),
    NonNull(Box<Type>, Span),
}

impl Type {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Named(name) => name.span,
            Self::List(_, span) | Self::NonNull(_, span) => *span,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(&name.value),
            Self::List(inner, _) => write!(f, "[{inner}]"),
            Self::NonNull(inner, _) => write!(f, "{inner}!"),
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Name),
    Int(i64, Span),
    Float(f64, Span),
    String(String, Span),
    Boolean(bool, Span),
    Null(Span),
    Enum(Name),
    List(Vec<Value>, Span),
    Object(Vec<(Name, Value)>, Span),
}

impl Value {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Variable(name) | Self::Enum(name) => name.span,
            Self::Int(_, span)
            | Self::Float(_, span)
            | Self::String(_, span)
            | Self::Boolean(_, span)
            | Self::Null(span)
            | Self::List(_, span)
            | Self::Object(_, span) => *span,
        }
    }
}

/// Prints the value as a GraphQL literal.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "${}", name.value),
            Self::Int(n, _) => write!(f, "{n}"),
            Self::Float(n, _) => write!(f, "{n:?}"),
            Self::String(s, _) => write_quoted(f, s),
            Self::Boolean(b, _) => write!(f, "{b}"),
            Self::Null(_) => f.write_str("null"),
            Self::Enum(name) => f.write_str(&name.value),
            Self::List(items, _) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(fields, _) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", name.value)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str) -> std::fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04X}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// A name with its span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

impl Name {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            span: Span::default(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_key() {
        let mut field = Field::new("name");
        assert_eq!(field.response_key(), "name");

        field.alias = Some(Name::new("fullName"));
        assert_eq!(field.response_key(), "fullName");
    }

    #[test]
    fn test_type_display() {
        let ty = Type::NonNull(
            Box::new(Type::List(
                Box::new(Type::NonNull(
                    Box::new(Type::Named(Name::new("String"))),
                    Span::default(),
                )),
                Span::default(),
            )),
            Span::default(),
        );
        assert_eq!(ty.to_string(), "[String!]!");
    }

    #[test]
    fn test_definition_kind() {
        let def = Definition::TypeSystem(TypeSystemDefinition {
            kind: TypeSystemKind::Object,
            extension: true,
            name: Some(Name::new("Query")),
            span: Span::default(),
        });
        assert_eq!(def.kind(), "ObjectTypeExtension");
    }

    #[test]
    fn test_value_display() {
        let span = Span::default();
        let value = Value::Object(
            vec![
                (Name::new("id"), Value::Int(4, span)),
                (Name::new("tag"), Value::String("a\"b".to_string(), span)),
                (
                    Name::new("list"),
                    Value::List(
                        vec![
                            Value::Float(1.5, span),
                            Value::Null(span),
                            Value::Enum(Name::new("RED")),
                            Value::Variable(Name::new("v")),
                        ],
                        span,
                    ),
                ),
            ],
            span,
        );
        assert_eq!(
            value.to_string(),
            r#"{id: 4, tag: "a\"b", list: [1.5, null, RED, $v]}"#
        );
        assert_eq!(Value::Float(2.0, span).to_string(), "2.0");
    }

    #[test]
    fn test_hand_built_document_has_no_locations() {
        let doc = Document::new(Vec::new());
        assert_eq!(doc.location(Span::new(0, 1)), None);
    }
}
