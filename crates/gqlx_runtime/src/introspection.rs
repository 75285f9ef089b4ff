//! Meta-fields and the built-in introspection object types.
//!
//! `__schema` and `__type` resolve to JSON shaped like the types below, and
//! the executor completes that JSON against them like any other object, so
//! sub-selections, aliases and directives apply. Type references inside
//! field and argument descriptions are rendered as SDL strings (`"[ID!]"`).

use crate::resolver::FnResolver;
use crate::schema::{EnumValueDef, FieldDef, InputValueDef, ObjectDef, Schema, TypeDef, TypeRef};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::OnceLock;

struct MetaFields {
    typename: FieldDef,
    schema: FieldDef,
    type_: FieldDef,
}

fn named(name: &str) -> TypeRef {
    TypeRef::named(name)
}

fn required(name: &str) -> TypeRef {
    TypeRef::non_null(named(name))
}

fn list_of(name: &str) -> TypeRef {
    TypeRef::list(required(name))
}

fn meta_fields() -> &'static MetaFields {
    static META: OnceLock<MetaFields> = OnceLock::new();
    META.get_or_init(|| MetaFields {
        typename: FieldDef::new("__typename", required("String")).resolver(FnResolver::new(
            |_, _, info| Ok(Value::String(info.parent_type.name.clone())),
        )),
        schema: FieldDef::new("__schema", required("__Schema"))
            .resolver(FnResolver::new(|_, _, info| Ok(schema_json(info.schema)))),
        type_: FieldDef::new("__type", named("__Type"))
            .argument(InputValueDef::new("name", required("String")))
            .resolver(FnResolver::new(|_, args, info| {
                let name: String = args.require("name")?;
                Ok(info
                    .schema
                    .get_type(&name)
                    .map_or(Value::Null, |def| type_json(info.schema, def)))
            })),
    })
}

fn meta_types() -> &'static FxHashMap<String, ObjectDef> {
    static TYPES: OnceLock<FxHashMap<String, ObjectDef>> = OnceLock::new();
    TYPES.get_or_init(|| {
        let deprecation = |object: ObjectDef| {
            object
                .field(FieldDef::new("isDeprecated", required("Boolean")))
                .field(FieldDef::new("deprecationReason", named("String")))
        };
        [
            ObjectDef::new("__Schema")
                .field(FieldDef::new("queryType", required("__Type")))
                .field(FieldDef::new("mutationType", named("__Type")))
                .field(FieldDef::new("subscriptionType", named("__Type")))
                .field(FieldDef::new("types", TypeRef::non_null(list_of("__Type")))),
            ObjectDef::new("__Type")
                .field(FieldDef::new("kind", required("String")))
                .field(FieldDef::new("name", named("String")))
                .field(FieldDef::new("description", named("String")))
                .field(FieldDef::new("fields", list_of("__Field")))
                .field(FieldDef::new("interfaces", list_of("__Type")))
                .field(FieldDef::new("possibleTypes", list_of("__Type")))
                .field(FieldDef::new("enumValues", list_of("__EnumValue")))
                .field(FieldDef::new("inputFields", list_of("__InputValue"))),
            deprecation(
                ObjectDef::new("__Field")
                    .field(FieldDef::new("name", required("String")))
                    .field(FieldDef::new("description", named("String")))
                    .field(FieldDef::new("args", TypeRef::non_null(list_of("__InputValue"))))
                    .field(FieldDef::new("type", required("String"))),
            ),
            ObjectDef::new("__InputValue")
                .field(FieldDef::new("name", required("String")))
                .field(FieldDef::new("description", named("String")))
                .field(FieldDef::new("type", required("String")))
                .field(FieldDef::new("defaultValue", named("String"))),
            deprecation(
                ObjectDef::new("__EnumValue")
                    .field(FieldDef::new("name", required("String")))
                    .field(FieldDef::new("description", named("String"))),
            ),
        ]
        .into_iter()
        .map(|object| (object.name.clone(), object))
        .collect()
    })
}

/// Returns the built-in introspection object type with this name.
pub(crate) fn meta_object_type(name: &str) -> Option<&'static ObjectDef> {
    meta_types().get(name)
}

/// Looks up a field definition, including the meta-fields.
///
/// `__typename` exists on every object type; `__schema` and `__type` only
/// on the query root.
pub(crate) fn get_field_def<'s>(
    schema: &'s Schema,
    parent_type: &'s ObjectDef,
    field_name: &str,
) -> Option<&'s FieldDef> {
    let meta = meta_fields();
    let is_query_root = parent_type.name == schema.query_type().name;
    match field_name {
        "__typename" => Some(&meta.typename),
        "__schema" if is_query_root => Some(&meta.schema),
        "__type" if is_query_root => Some(&meta.type_),
        _ => parent_type.fields.get(field_name),
    }
}

fn schema_json(schema: &Schema) -> Value {
    let root = |object: Option<&ObjectDef>| {
        object
            .and_then(|o| schema.get_type(&o.name))
            .map_or(Value::Null, |def| type_json(schema, def))
    };
    json!({
        "queryType": root(Some(schema.query_type())),
        "mutationType": root(schema.mutation_type()),
        "subscriptionType": root(schema.subscription_type()),
        "types": schema.types().map(|def| type_json(schema, def)).collect::<Vec<_>>(),
    })
}

/// Interfaces and possible types only carry `kind` and `name`.
fn type_reference(schema: &Schema, name: &str) -> Value {
    json!({
        "kind": schema.get_type(name).map(TypeDef::kind),
        "name": name,
    })
}

fn type_json(schema: &Schema, def: &TypeDef) -> Value {
    let references = |names: Vec<&str>| {
        names
            .into_iter()
            .map(|name| type_reference(schema, name))
            .collect::<Vec<_>>()
    };
    let interfaces = match def {
        TypeDef::Object(o) => Some(references(o.implements.iter().map(String::as_str).collect())),
        TypeDef::Interface(i) => Some(references(i.implements.iter().map(String::as_str).collect())),
        _ => None,
    };
    let possible_types = match def {
        TypeDef::Union(u) => Some(references(u.members.iter().map(String::as_str).collect())),
        TypeDef::Interface(i) => Some(references(
            schema
                .types()
                .filter_map(|t| match t {
                    TypeDef::Object(o) if o.implements.contains(&i.name) => Some(o.name.as_str()),
                    _ => None,
                })
                .collect(),
        )),
        _ => None,
    };
    let enum_values = match def {
        TypeDef::Enum(e) => Some(e.values.iter().map(enum_value_json).collect::<Vec<_>>()),
        _ => None,
    };
    let input_fields = match def {
        TypeDef::InputObject(i) => Some(i.fields.values().map(input_value_json).collect::<Vec<_>>()),
        _ => None,
    };

    json!({
        "kind": def.kind(),
        "name": def.name(),
        "description": def.description(),
        "fields": def.fields().map(|fields| fields.values().map(field_json).collect::<Vec<_>>()),
        "interfaces": interfaces,
        "possibleTypes": possible_types,
        "enumValues": enum_values,
        "inputFields": input_fields,
    })
}

fn field_json(field: &FieldDef) -> Value {
    json!({
        "name": field.name,
        "description": field.description,
        "args": field.arguments.values().map(input_value_json).collect::<Vec<_>>(),
        "type": field.ty.to_string(),
        "isDeprecated": field.deprecation_reason.is_some(),
        "deprecationReason": field.deprecation_reason,
    })
}

fn input_value_json(input: &InputValueDef) -> Value {
    json!({
        "name": input.name,
        "description": input.description,
        "type": input.ty.to_string(),
        "defaultValue": input.default_value.as_ref().map(Value::to_string),
    })
}

fn enum_value_json(value: &EnumValueDef) -> Value {
    json!({
        "name": value.name,
        "description": value.description,
        "isDeprecated": value.deprecation_reason.is_some(),
        "deprecationReason": value.deprecation_reason,
    })
}
