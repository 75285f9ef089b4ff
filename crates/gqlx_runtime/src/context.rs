//! Per-request execution context.

use crate::coercion::{coerce_variable_values, Variables};
use crate::error::{ErrorCollector, ExecutionError, FieldError, GraphQLError, PathSegment};
use crate::executor::ExecutorConfig;
use crate::schema::{ObjectDef, Schema};
use crate::value::ResolvableObject;
use gqlx_syntax::{Definition, Document, Field, FragmentDefinition, OperationDefinition, OperationType};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Fragment definitions by name.
pub type Fragments<'a> = FxHashMap<&'a str, &'a FragmentDefinition>;

/// Everything a caller supplies for one request.
pub struct ExecuteParams<'a> {
    pub schema: &'a Schema,
    pub root_value: &'a dyn ResolvableObject,
    pub document: &'a Document,
    pub operation_name: Option<&'a str>,
    /// Raw variable values, coerced against the operation's definitions.
    pub variables: Map<String, Value>,
}

impl<'a> ExecuteParams<'a> {
    #[must_use]
    pub fn new(
        schema: &'a Schema,
        document: &'a Document,
        root_value: &'a dyn ResolvableObject,
    ) -> Self {
        Self {
            schema,
            root_value,
            document,
            operation_name: None,
            variables: Map::new(),
        }
    }

    #[must_use]
    pub fn operation_name(mut self, name: &'a str) -> Self {
        self.operation_name = Some(name);
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// Read-only state shared by every phase of one request.
pub struct ExecutionContext<'a> {
    pub schema: &'a Schema,
    pub fragments: Fragments<'a>,
    pub root_value: &'a dyn ResolvableObject,
    pub operation: &'a OperationDefinition,
    pub variable_values: Variables,
    pub document: &'a Document,
    pub errors: &'a ErrorCollector,
    pub config: &'a ExecutorConfig,
}

impl<'a> ExecutionContext<'a> {
    /// Builds the context for a request.
    ///
    /// On failure exactly one error is appended to `errors` and the request
    /// must not proceed.
    ///
    /// # Errors
    ///
    /// See [`ExecutionError`] for the request-level failures.
    pub fn build(
        params: &ExecuteParams<'a>,
        errors: &'a ErrorCollector,
        config: &'a ExecutorConfig,
    ) -> Result<Self, ExecutionError> {
        Self::try_build(params, errors, config).map_err(|error| {
            warn!(code = error.code(), "{error}");
            errors.push(error.to_graphql_error());
            error
        })
    }

    fn try_build(
        params: &ExecuteParams<'a>,
        errors: &'a ErrorCollector,
        config: &'a ExecutorConfig,
    ) -> Result<Self, ExecutionError> {
        let mut operations: FxHashMap<&'a str, &'a OperationDefinition> = FxHashMap::default();
        let mut fragments = Fragments::default();
        let mut single_operation = None;

        for definition in &params.document.definitions {
            match definition {
                Definition::Operation(op) => {
                    single_operation = Some(op);
                    operations.insert(op.name_str(), op);
                }
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
                Definition::TypeSystem(_) => {
                    return Err(ExecutionError::UnsupportedDefinition {
                        kind: definition.kind(),
                    });
                }
            }
        }

        let operation = match params.operation_name.filter(|name| !name.is_empty()) {
            Some(name) => operations
                .get(name)
                .copied()
                .ok_or_else(|| ExecutionError::UnknownOperation {
                    name: name.to_string(),
                })?,
            None => match operations.len() {
                0 => return Err(ExecutionError::NoOperation),
                1 => single_operation.ok_or(ExecutionError::NoOperation)?,
                _ => return Err(ExecutionError::AmbiguousOperation),
            },
        };
        debug!(
            operation = operation.name_str(),
            kind = %operation.operation,
            fragments = fragments.len(),
            "selected operation"
        );

        let variable_values = coerce_variable_values(
            params.schema,
            &operation.variable_definitions,
            &params.variables,
        )?;

        Ok(Self {
            schema: params.schema,
            fragments,
            root_value: params.root_value,
            operation,
            variable_values,
            document: params.document,
            errors,
            config,
        })
    }

    /// Records a field-level failure with its path and the location of the
    /// first field node.
    pub fn record_field_error(&self, error: &FieldError, path: &[PathSegment], field: &Field) {
        debug!(code = error.code(), path = ?path, "{error}");
        let mut formatted = GraphQLError::new(error.to_string())
            .with_code(error.code())
            .with_path(path.to_vec());
        if let Some(location) = self.document.location(field.span) {
            formatted = formatted.with_location(location.into());
        }
        self.errors.push(formatted);
    }
}

/// Returns the root object type an operation starts from.
///
/// # Errors
///
/// Fails for a missing operation, a subscription, or a mutation against a
/// schema without a mutation root.
pub fn get_operation_root_type<'s>(
    schema: &'s Schema,
    operation: Option<&OperationDefinition>,
) -> Result<&'s ObjectDef, ExecutionError> {
    match operation.map(|op| op.operation) {
        Some(OperationType::Query) => Ok(schema.query_type()),
        Some(OperationType::Mutation) => schema
            .mutation_type()
            .ok_or(ExecutionError::MutationsUnsupported),
        kind => Err(ExecutionError::UnsupportedOperationKind { kind }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, SchemaBuilder, TypeRef};
    use gqlx_syntax::parse;
    use serde_json::json;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").field(FieldDef::new("name", TypeRef::named("String"))))
            .build()
            .unwrap()
    }

    fn build(
        source: &str,
        operation_name: Option<&str>,
        variables: Value,
    ) -> (Result<String, ExecutionError>, Vec<GraphQLError>) {
        let schema = schema();
        let document = parse(source).document;
        let root = json!({});
        let errors = ErrorCollector::new();
        let config = ExecutorConfig::default();

        let mut params = ExecuteParams::new(&schema, &document, &root);
        if let Some(name) = operation_name {
            params = params.operation_name(name);
        }
        if let Value::Object(vars) = variables {
            params = params.variables(vars);
        }

        let result = ExecutionContext::build(&params, &errors, &config)
            .map(|ctx| ctx.operation.name_str().to_string());
        (result, errors.into_errors())
    }

    #[test]
    fn test_selects_single_operation() {
        let (result, errors) = build("query Only { name }", None, json!({}));
        assert_eq!(result.unwrap(), "Only");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_anonymous_operation() {
        let (result, _) = build("{ name }", None, json!({}));
        assert_eq!(result.unwrap(), "");
    }

    #[test]
    fn test_ambiguous_operation() {
        let (result, errors) = build("query A { name } query B { name }", None, json!({}));
        assert_eq!(result.unwrap_err(), ExecutionError::AmbiguousOperation);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), Some("AMBIGUOUS_OPERATION"));
    }

    #[test]
    fn test_named_selection() {
        let (result, _) = build("query A { name } query B { name }", Some("B"), json!({}));
        assert_eq!(result.unwrap(), "B");

        let (result, errors) = build("query A { name }", Some("C"), json!({}));
        assert_eq!(
            result.unwrap_err(),
            ExecutionError::UnknownOperation {
                name: "C".to_string()
            }
        );
        assert_eq!(errors[0].message, "Unknown operation named \"C\".");
    }

    #[test]
    fn test_empty_operation_name_means_none() {
        let (result, _) = build("query A { name }", Some(""), json!({}));
        assert_eq!(result.unwrap(), "A");
    }

    #[test]
    fn test_no_operation() {
        let (result, errors) = build("fragment F on Query { name }", None, json!({}));
        assert_eq!(result.unwrap_err(), ExecutionError::NoOperation);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unsupported_definition() {
        let (result, errors) = build("type Query { name: String } { name }", None, json!({}));
        assert_eq!(
            result.unwrap_err(),
            ExecutionError::UnsupportedDefinition {
                kind: "ObjectTypeDefinition"
            }
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_variable_coercion_failure() {
        let (result, errors) = build("query ($n: Int!) { name }", None, json!({}));
        assert!(matches!(
            result.unwrap_err(),
            ExecutionError::VariableCoercion(_)
        ));
        assert_eq!(errors[0].code(), Some("VARIABLE_COERCION_ERROR"));
        assert_eq!(
            errors[0].message,
            "Variable \"$n\" of required type \"Int!\" was not provided."
        );
    }

    #[test]
    fn test_root_type_resolution() {
        let schema = schema();
        let document = parse("query Q { name } mutation M { name } subscription S { name }").document;
        let ops: Vec<_> = document.operations().collect();

        assert_eq!(
            get_operation_root_type(&schema, Some(ops[0])).unwrap().name,
            "Query"
        );
        assert_eq!(
            get_operation_root_type(&schema, Some(ops[1])).unwrap_err(),
            ExecutionError::MutationsUnsupported
        );
        assert_eq!(
            get_operation_root_type(&schema, Some(ops[2])).unwrap_err(),
            ExecutionError::UnsupportedOperationKind {
                kind: Some(OperationType::Subscription)
            }
        );
        assert_eq!(
            get_operation_root_type(&schema, None).unwrap_err(),
            ExecutionError::UnsupportedOperationKind { kind: None }
        );
    }

    #[test]
    fn test_mutation_root_when_configured() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .mutation_type("Mutation")
            .add_type(ObjectDef::new("Query"))
            .add_type(ObjectDef::new("Mutation"))
            .build()
            .unwrap();
        let document = parse("mutation { addItem }").document;
        let op = document.operations().next();

        assert_eq!(
            get_operation_root_type(&schema, op).unwrap().name,
            "Mutation"
        );
    }
}
