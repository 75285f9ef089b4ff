//! Variable and argument coercion.
//!
//! Raw JSON variables and document literals are converted into values of
//! the declared input types before any resolver runs.

use crate::error::{child_path, PathSegment};
use crate::resolver::ResolverArgs;
use crate::schema::{FieldDef, Schema, TypeDef, TypeRef};
use gqlx_syntax::ast;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Coerced variable values, keyed by variable name without the `$`.
pub type Variables = IndexMap<String, Value>;

/// Error raised while coercing variables or arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("Variable \"${name}\" expected value of type \"{ty}\" which cannot be used as an input type.")]
    NonInputType { name: String, ty: String },

    #[error("Variable \"${name}\" of required type \"{ty}\" was not provided.")]
    MissingVariable { name: String, ty: String },

    #[error("Variable \"${name}\" of non-null type \"{ty}\" must not be null.")]
    NullVariable { name: String, ty: String },

    #[error("Variable \"${name}\" got invalid value {value}{}; {reason}", at_path(.name, .path))]
    InvalidVariable {
        name: String,
        value: String,
        path: Vec<PathSegment>,
        reason: String,
    },

    #[error("Argument \"{name}\" of required type \"{ty}\" was not provided.")]
    MissingArgument { name: String, ty: String },

    #[error("Argument \"{name}\" of non-null type \"{ty}\" must not be null.")]
    NullArgument { name: String, ty: String },

    #[error("Argument \"{name}\" has invalid value {value}. {reason}")]
    InvalidArgument {
        name: String,
        value: String,
        reason: String,
    },

    #[error(
        "Argument \"{name}\" of required type \"{ty}\" was provided the variable \"${variable}\" which was not provided a runtime value."
    )]
    MissingVariableForArgument {
        name: String,
        ty: String,
        variable: String,
    },
}

fn at_path(name: &str, path: &[PathSegment]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = format!(" at \"{name}");
    for segment in path {
        match segment {
            PathSegment::Field(field) => {
                out.push('.');
                out.push_str(field);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
        }
    }
    out.push('"');
    out
}

/// Where inside a variable value coercion failed.
#[derive(Debug)]
struct InputError {
    path: Vec<PathSegment>,
    reason: String,
}

impl InputError {
    fn new(path: &[PathSegment], reason: impl Into<String>) -> Self {
        Self {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Coerces the raw variable inputs against the operation's definitions.
///
/// Absent nullable variables without a default stay absent.
///
/// # Errors
///
/// Returns the first variable that cannot be coerced.
pub fn coerce_variable_values(
    schema: &Schema,
    definitions: &[ast::VariableDefinition],
    inputs: &Map<String, Value>,
) -> Result<Variables, CoercionError> {
    let mut coerced = Variables::new();

    for definition in definitions {
        let name = definition.variable.as_str();
        let ty = TypeRef::from_ast(&definition.ty);

        if !schema.is_input_type(&ty) {
            return Err(CoercionError::NonInputType {
                name: name.to_string(),
                ty: ty.to_string(),
            });
        }

        match inputs.get(name) {
            None => {
                if let Some(default) = &definition.default_value {
                    let value = value_from_ast(default, &ty, schema, &Variables::new())
                        .map_err(|reason| CoercionError::InvalidVariable {
                            name: name.to_string(),
                            value: default.to_string(),
                            path: Vec::new(),
                            reason,
                        })?;
                    if let Some(value) = value {
                        coerced.insert(name.to_string(), value);
                    }
                } else if ty.is_non_null() {
                    return Err(CoercionError::MissingVariable {
                        name: name.to_string(),
                        ty: ty.to_string(),
                    });
                }
            }
            Some(Value::Null) if ty.is_non_null() => {
                return Err(CoercionError::NullVariable {
                    name: name.to_string(),
                    ty: ty.to_string(),
                });
            }
            Some(value) => {
                let value = coerce_input_value(value, &ty, schema, &[]).map_err(|e| {
                    CoercionError::InvalidVariable {
                        name: name.to_string(),
                        value: value.to_string(),
                        path: e.path,
                        reason: e.reason,
                    }
                })?;
                coerced.insert(name.to_string(), value);
            }
        }
    }

    Ok(coerced)
}

/// Computes the arguments for one field from its first field node.
///
/// # Errors
///
/// Fails on a missing required argument, a `null` for a non-null
/// argument, or a literal that does not fit the argument type.
pub fn coerce_argument_values(
    schema: &Schema,
    field_def: &FieldDef,
    field: &ast::Field,
    variables: &Variables,
) -> Result<ResolverArgs, CoercionError> {
    let mut args = ResolverArgs::new();

    for (name, arg_def) in &field_def.arguments {
        let ty = &arg_def.ty;

        let Some(argument) = field.argument(name) else {
            if let Some(default) = &arg_def.default_value {
                args.set(name.clone(), default.clone());
            } else if ty.is_non_null() {
                return Err(CoercionError::MissingArgument {
                    name: name.clone(),
                    ty: ty.to_string(),
                });
            }
            continue;
        };

        let is_null = match &argument.value {
            ast::Value::Null(_) => true,
            ast::Value::Variable(var) => match variables.get(var.as_str()) {
                Some(value) => value.is_null(),
                None => {
                    if let Some(default) = &arg_def.default_value {
                        args.set(name.clone(), default.clone());
                    } else if ty.is_non_null() {
                        return Err(CoercionError::MissingVariableForArgument {
                            name: name.clone(),
                            ty: ty.to_string(),
                            variable: var.value.clone(),
                        });
                    }
                    continue;
                }
            },
            _ => false,
        };

        if is_null && ty.is_non_null() {
            return Err(CoercionError::NullArgument {
                name: name.clone(),
                ty: ty.to_string(),
            });
        }

        match value_from_ast(&argument.value, ty, schema, variables) {
            Ok(Some(value)) => args.set(name.clone(), value),
            Ok(None) => {}
            Err(reason) => {
                return Err(CoercionError::InvalidArgument {
                    name: name.clone(),
                    value: argument.value.to_string(),
                    reason,
                })
            }
        }
    }

    Ok(args)
}

/// Coerces an external JSON value to an input type.
fn coerce_input_value(
    value: &Value,
    ty: &TypeRef,
    schema: &Schema,
    path: &[PathSegment],
) -> Result<Value, InputError> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(InputError::new(
                    path,
                    format!("Expected non-nullable type \"{ty}\" not to be null."),
                ));
            }
            coerce_input_value(value, inner, schema, path)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(inner) => match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    coerce_input_value(item, inner, schema, &child_path(path, PathSegment::Index(i)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_input_value(
                single, inner, schema, path,
            )?])),
        },
        TypeRef::Named(name) => match schema.get_type(name) {
            Some(TypeDef::Scalar(scalar)) => {
                coerce_scalar(&scalar.name, value).map_err(|reason| InputError::new(path, reason))
            }
            Some(TypeDef::Enum(def)) => match value.as_str() {
                Some(v) if def.has_value(v) => Ok(value.clone()),
                Some(_) => Err(InputError::new(
                    path,
                    format!("Value {value} does not exist in \"{}\" enum.", def.name),
                )),
                None => Err(InputError::new(
                    path,
                    format!("Enum \"{}\" cannot represent non-string value: {value}.", def.name),
                )),
            },
            Some(TypeDef::InputObject(def)) => {
                let Value::Object(fields) = value else {
                    return Err(InputError::new(
                        path,
                        format!("Expected type \"{}\" to be an object.", def.name),
                    ));
                };

                let mut coerced = Map::new();
                for (field_name, field_def) in &def.fields {
                    match fields.get(field_name) {
                        Some(field_value) => {
                            let field_path =
                                child_path(path, PathSegment::Field(field_name.clone()));
                            let field_value =
                                coerce_input_value(field_value, &field_def.ty, schema, &field_path)?;
                            coerced.insert(field_name.clone(), field_value);
                        }
                        None => {
                            if let Some(default) = &field_def.default_value {
                                coerced.insert(field_name.clone(), default.clone());
                            } else if field_def.ty.is_non_null() {
                                return Err(InputError::new(
                                    path,
                                    format!(
                                        "Field \"{field_name}\" of required type \"{}\" was not provided.",
                                        field_def.ty
                                    ),
                                ));
                            }
                        }
                    }
                }

                if let Some(unknown) = fields.keys().find(|k| !def.fields.contains_key(*k)) {
                    return Err(InputError::new(
                        path,
                        format!("Field \"{unknown}\" is not defined by type \"{}\".", def.name),
                    ));
                }

                Ok(Value::Object(coerced))
            }
            _ => Err(InputError::new(
                path,
                format!("Type \"{name}\" is not an input type."),
            )),
        },
    }
}

fn coerce_scalar(name: &str, value: &Value) -> Result<Value, String> {
    match name {
        "Int" => {
            let n = match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                _ => None,
            };
            match n {
                Some(n) if i32::try_from(n).is_ok() => Ok(Value::from(n)),
                Some(_) => Err(format!(
                    "Int cannot represent non 32-bit signed integer value: {value}"
                )),
                None if value.is_u64() => Err(format!(
                    "Int cannot represent non 32-bit signed integer value: {value}"
                )),
                None => Err(format!("Int cannot represent non-integer value: {value}")),
            }
        }
        "Float" => match value {
            Value::Number(_) => Ok(value.clone()),
            _ => Err(format!("Float cannot represent non numeric value: {value}")),
        },
        "String" => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(format!("String cannot represent a non string value: {value}")),
        },
        "Boolean" => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(format!("Boolean cannot represent a non boolean value: {value}")),
        },
        "ID" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err(format!("ID cannot represent value: {value}")),
        },
        _ => Ok(value.clone()),
    }
}

/// Converts a document literal to a value of the given input type.
///
/// Returns `Ok(None)` when the literal is a variable with no runtime value,
/// so the caller can fall back to a default.
///
/// # Errors
///
/// Returns the reason the literal does not fit `ty`.
pub fn value_from_ast(
    literal: &ast::Value,
    ty: &TypeRef,
    schema: &Schema,
    variables: &Variables,
) -> Result<Option<Value>, String> {
    if let ast::Value::Variable(var) = literal {
        return match variables.get(var.as_str()) {
            Some(Value::Null) if ty.is_non_null() => Err(format!(
                "Variable \"${}\" of non-null type \"{ty}\" must not be null.",
                var.value
            )),
            value => Ok(value.cloned()),
        };
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if matches!(literal, ast::Value::Null(_)) {
                return Err(format!("Expected non-nullable type \"{ty}\" not to be null."));
            }
            value_from_ast(literal, inner, schema, variables)
        }
        _ if matches!(literal, ast::Value::Null(_)) => Ok(Some(Value::Null)),
        TypeRef::List(inner) => match literal {
            ast::Value::List(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match value_from_ast(item, inner, schema, variables)? {
                        Some(value) => values.push(value),
                        None if inner.is_non_null() => {
                            return Err(format!("Expected value of non-null type \"{inner}\"."))
                        }
                        None => values.push(Value::Null),
                    }
                }
                Ok(Some(Value::Array(values)))
            }
            single => Ok(value_from_ast(single, inner, schema, variables)?
                .map(|value| Value::Array(vec![value]))),
        },
        TypeRef::Named(name) => match schema.get_type(name) {
            Some(TypeDef::Scalar(scalar)) => scalar_from_ast(&scalar.name, literal, variables).map(Some),
            Some(TypeDef::Enum(def)) => match literal {
                ast::Value::Enum(value) if def.has_value(value.as_str()) => {
                    Ok(Some(Value::String(value.value.clone())))
                }
                ast::Value::Enum(_) => Err(format!(
                    "Value {literal} does not exist in \"{}\" enum.",
                    def.name
                )),
                _ => Err(format!(
                    "Enum \"{}\" cannot represent non-enum value: {literal}.",
                    def.name
                )),
            },
            Some(TypeDef::InputObject(def)) => {
                let ast::Value::Object(fields, _) = literal else {
                    return Err(format!("Expected type \"{}\" to be an object.", def.name));
                };

                if let Some((unknown, _)) =
                    fields.iter().find(|(n, _)| !def.fields.contains_key(n.as_str()))
                {
                    return Err(format!(
                        "Field \"{}\" is not defined by type \"{}\".",
                        unknown.value, def.name
                    ));
                }

                let mut coerced = Map::new();
                for (field_name, field_def) in &def.fields {
                    let provided = fields
                        .iter()
                        .find(|(n, _)| n.value == *field_name)
                        .map(|(_, v)| v);
                    let value = match provided {
                        Some(value) => value_from_ast(value, &field_def.ty, schema, variables)?,
                        None => None,
                    };
                    match value {
                        Some(value) => {
                            coerced.insert(field_name.clone(), value);
                        }
                        None => {
                            if let Some(default) = &field_def.default_value {
                                coerced.insert(field_name.clone(), default.clone());
                            } else if field_def.ty.is_non_null() {
                                return Err(format!(
                                    "Field \"{field_name}\" of required type \"{}\" was not provided.",
                                    field_def.ty
                                ));
                            }
                        }
                    }
                }
                Ok(Some(Value::Object(coerced)))
            }
            _ => Err(format!("Type \"{name}\" is not an input type.")),
        },
    }
}

fn scalar_from_ast(name: &str, literal: &ast::Value, variables: &Variables) -> Result<Value, String> {
    match (name, literal) {
        ("Int", ast::Value::Int(n, _)) => {
            if i32::try_from(*n).is_ok() {
                Ok(Value::from(*n))
            } else {
                Err(format!(
                    "Int cannot represent non 32-bit signed integer value: {literal}"
                ))
            }
        }
        ("Int", _) => Err(format!("Int cannot represent non-integer value: {literal}")),
        ("Float", ast::Value::Int(..) | ast::Value::Float(..)) => {
            Ok(value_from_ast_untyped(literal, variables))
        }
        ("Float", _) => Err(format!("Float cannot represent non numeric value: {literal}")),
        ("String", ast::Value::String(s, _)) => Ok(Value::String(s.clone())),
        ("String", _) => Err(format!("String cannot represent a non string value: {literal}")),
        ("Boolean", ast::Value::Boolean(b, _)) => Ok(Value::Bool(*b)),
        ("Boolean", _) => Err(format!("Boolean cannot represent a non boolean value: {literal}")),
        ("ID", ast::Value::String(s, _)) => Ok(Value::String(s.clone())),
        ("ID", ast::Value::Int(n, _)) => Ok(Value::String(n.to_string())),
        ("ID", _) => Err(format!("ID cannot represent a non-string and non-integer value: {literal}")),
        _ => Ok(value_from_ast_untyped(literal, variables)),
    }
}

/// Converts a literal to JSON without a type, as custom scalars receive it.
#[must_use]
pub fn value_from_ast_untyped(literal: &ast::Value, variables: &Variables) -> Value {
    match literal {
        ast::Value::Variable(var) => variables.get(var.as_str()).cloned().unwrap_or(Value::Null),
        ast::Value::Int(n, _) => Value::from(*n),
        ast::Value::Float(f, _) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        ast::Value::String(s, _) => Value::String(s.clone()),
        ast::Value::Boolean(b, _) => Value::Bool(*b),
        ast::Value::Null(_) => Value::Null,
        ast::Value::Enum(name) => Value::String(name.value.clone()),
        ast::Value::List(items, _) => Value::Array(
            items
                .iter()
                .map(|item| value_from_ast_untyped(item, variables))
                .collect(),
        ),
        ast::Value::Object(fields, _) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.value.clone(), value_from_ast_untyped(value, variables)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDef, InputObjectDef, InputValueDef, ObjectDef, SchemaBuilder};
    use gqlx_syntax::{parse, Document, Selection};
    use serde_json::json;

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(
                ObjectDef::new("Query").field(
                    FieldDef::new("search", TypeRef::named("String"))
                        .argument(InputValueDef::new("term", "String!".parse().unwrap()))
                        .argument(
                            InputValueDef::new("limit", TypeRef::named("Int"))
                                .default_value(json!(10)),
                        )
                        .argument(InputValueDef::new("color", TypeRef::named("Color")))
                        .argument(InputValueDef::new("ids", "[ID!]".parse().unwrap()))
                        .argument(InputValueDef::new("filter", TypeRef::named("Filter"))),
                ),
            )
            .add_type(EnumDef::new("Color", ["RED", "GREEN"]))
            .add_type(
                InputObjectDef::new("Filter")
                    .field(InputValueDef::new("name", "String!".parse().unwrap()))
                    .field(
                        InputValueDef::new("first", TypeRef::named("Int"))
                            .default_value(json!(5)),
                    ),
            )
            .build()
            .unwrap()
    }

    fn document(source: &str) -> Document {
        let result = parse(source);
        assert!(!result.has_errors(), "{source}");
        result.document
    }

    fn variables(source: &str, inputs: Value) -> Result<Variables, CoercionError> {
        let doc = document(source);
        let op = doc.operations().next().unwrap();
        let Value::Object(inputs) = inputs else {
            panic!("inputs must be an object");
        };
        coerce_variable_values(&test_schema(), &op.variable_definitions, &inputs)
    }

    fn arguments(source: &str, vars: &Variables) -> Result<ResolverArgs, CoercionError> {
        let schema = test_schema();
        let doc = document(source);
        let op = doc.operations().next().unwrap();
        let Selection::Field(field) = &op.selection_set.selections[0] else {
            panic!("expected a field");
        };
        let field_def = &schema.query_type().fields["search"];
        coerce_argument_values(&schema, field_def, field, vars)
    }

    #[test]
    fn test_provided_and_default_variables() {
        let vars = variables(
            "query ($term: String!, $limit: Int = 3, $opt: Int) { search(term: $term) }",
            json!({ "term": "rust" }),
        )
        .unwrap();

        assert_eq!(vars["term"], json!("rust"));
        assert_eq!(vars["limit"], json!(3));
        assert!(!vars.contains_key("opt"));
    }

    #[test]
    fn test_missing_required_variable() {
        let err = variables("query ($id: ID!) { search }", json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable \"$id\" of required type \"ID!\" was not provided."
        );
    }

    #[test]
    fn test_null_for_non_null_variable() {
        let err = variables("query ($id: ID!) { search }", json!({ "id": null })).unwrap_err();
        assert!(matches!(err, CoercionError::NullVariable { .. }));
    }

    #[test]
    fn test_invalid_variable_reports_path() {
        let err = variables(
            "query ($ids: [Int]) { search }",
            json!({ "ids": [1, 4_294_967_296_i64] }),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable \"$ids\" got invalid value [1,4294967296] at \"ids[1]\"; \
             Int cannot represent non 32-bit signed integer value: 4294967296"
        );
    }

    #[test]
    fn test_variable_input_rules() {
        let vars = variables(
            "query ($id: ID, $ids: [ID], $c: Color, $f: Filter, $x: Float) { search }",
            json!({ "id": 7, "ids": "single", "c": "RED", "f": { "name": "a" }, "x": 2 }),
        )
        .unwrap();

        assert_eq!(vars["id"], json!("7"));
        assert_eq!(vars["ids"], json!(["single"]));
        assert_eq!(vars["c"], json!("RED"));
        assert_eq!(vars["f"], json!({ "name": "a", "first": 5 }));
        assert_eq!(vars["x"], json!(2));
    }

    #[test]
    fn test_variable_input_object_errors() {
        let err = variables(
            "query ($f: Filter) { search }",
            json!({ "f": { "name": "a", "extra": true } }),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .ends_with("Field \"extra\" is not defined by type \"Filter\"."));

        let err = variables("query ($c: Color) { search }", json!({ "c": "BLUE" })).unwrap_err();
        assert!(err.to_string().contains("does not exist in \"Color\" enum"));
    }

    #[test]
    fn test_non_input_variable_type() {
        let err = variables("query ($q: Query) { search }", json!({})).unwrap_err();
        assert!(matches!(err, CoercionError::NonInputType { .. }));
    }

    #[test]
    fn test_argument_literals_and_defaults() {
        let args = arguments(
            r#"{ search(term: "x", color: GREEN, ids: [1, "2"], filter: { name: "n" }) }"#,
            &Variables::new(),
        )
        .unwrap();

        assert_eq!(args.get("term"), Some(&json!("x")));
        assert_eq!(args.get("limit"), Some(&json!(10)));
        assert_eq!(args.get("color"), Some(&json!("GREEN")));
        assert_eq!(args.get("ids"), Some(&json!(["1", "2"])));
        assert_eq!(args.get("filter"), Some(&json!({ "name": "n", "first": 5 })));
        assert_eq!(
            args.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["term", "limit", "color", "ids", "filter"]
        );
    }

    #[test]
    fn test_argument_variables() {
        let mut vars = Variables::new();
        vars.insert("t".to_string(), json!("from var"));

        let args = arguments("query ($t: String!, $l: Int) { search(term: $t, limit: $l) }", &vars)
            .unwrap();
        assert_eq!(args.get("term"), Some(&json!("from var")));
        // absent variable falls back to the argument default
        assert_eq!(args.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_argument_errors() {
        let err = arguments("{ search }", &Variables::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument \"term\" of required type \"String!\" was not provided."
        );

        let err = arguments("{ search(term: null) }", &Variables::new()).unwrap_err();
        assert!(matches!(err, CoercionError::NullArgument { .. }));

        let err = arguments("query ($t: String) { search(term: $t) }", &Variables::new())
            .unwrap_err();
        assert!(matches!(err, CoercionError::MissingVariableForArgument { .. }));

        let err = arguments(r#"{ search(term: "x", limit: "ten") }"#, &Variables::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument \"limit\" has invalid value \"ten\". Int cannot represent non-integer value: \"ten\""
        );
    }

    #[test]
    fn test_untyped_literal() {
        let doc = document(r#"{ f(a: { x: [1, 2.5, ENUM, $v] }) }"#);
        let op = doc.operations().next().unwrap();
        let Selection::Field(field) = &op.selection_set.selections[0] else {
            panic!("expected a field");
        };
        let mut vars = Variables::new();
        vars.insert("v".to_string(), json!(true));

        assert_eq!(
            value_from_ast_untyped(&field.arguments[0].value, &vars),
            json!({ "x": [1, 2.5, "ENUM", true] })
        );
    }
}
