//! Query execution.

use crate::coercion::coerce_argument_values;
use crate::collect::{collect_fields, CollectedFields};
use crate::context::{get_operation_root_type, ExecuteParams, ExecutionContext};
use crate::error::{child_path, ErrorCollector, FieldError, GraphQLError, PathSegment};
use crate::introspection::{self, get_field_def};
use crate::resolver::{DefaultResolver, ResolveInfo, Resolver};
use crate::schema::{FieldDef, ObjectDef, TypeDef, TypeRef};
use crate::value::ResolvableObject;
use gqlx_syntax::Field;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// How `null` field values appear in object data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullFields {
    /// Leave the response key out.
    #[default]
    Omit,
    /// Write an explicit `null`.
    Include,
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum depth of nested object completion.
    pub max_depth: usize,
    /// Timeout for field resolution in milliseconds.
    pub field_timeout_ms: Option<u64>,
    pub null_fields: NullFields,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            field_timeout_ms: None,
            null_fields: NullFields::Omit,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_field_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.field_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_null_fields(mut self, null_fields: NullFields) -> Self {
        self.null_fields = null_fields;
        self
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The data. Absent when the request failed before execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl Response {
    /// Creates a successful response with data.
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(error: GraphQLError) -> Self {
        Self::from_errors(vec![error])
    }

    /// Creates an error response with multiple errors.
    #[must_use]
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self { data: None, errors }
    }

    /// Returns true if the response has errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if the response has data.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// The single-use destination of a request's response.
#[derive(Debug)]
pub struct ResponseSink {
    sender: oneshot::Sender<Response>,
}

impl ResponseSink {
    /// Creates a sink and the receiver its response arrives on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Delivers the response. Returns false if the receiver is gone.
    pub fn deliver(self, response: Response) -> bool {
        self.sender.send(response).is_ok()
    }
}

/// The query executor.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with custom configuration.
    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes a request and returns its response.
    pub async fn execute(&self, params: ExecuteParams<'_>) -> Response {
        let (sink, receiver) = ResponseSink::channel();
        self.execute_into(params, sink).await;
        receiver.await.unwrap_or_else(|_| {
            Response::error(
                GraphQLError::new("execution finished without a response").with_code("INTERNAL_ERROR"),
            )
        })
    }

    /// Executes a request and delivers exactly one response to `sink`,
    /// including for requests that fail before any field is resolved.
    #[instrument(skip_all, fields(operation = params.operation_name.unwrap_or_default()))]
    pub async fn execute_into(&self, params: ExecuteParams<'_>, sink: ResponseSink) {
        let errors = ErrorCollector::new();
        let data = self.run(&params, &errors).await;
        let response = Response {
            data,
            errors: errors.into_errors(),
        };
        debug!(errors = response.errors.len(), "request complete");
        if !sink.deliver(response) {
            debug!("response receiver dropped");
        }
    }

    async fn run(&self, params: &ExecuteParams<'_>, errors: &ErrorCollector) -> Option<Value> {
        let ctx = ExecutionContext::build(params, errors, &self.config).ok()?;
        let root_type = match get_operation_root_type(ctx.schema, Some(ctx.operation)) {
            Ok(root_type) => root_type,
            Err(error) => {
                warn!(code = error.code(), "{error}");
                errors.push(error.to_graphql_error());
                return None;
            }
        };
        Some(execute_operation(&ctx, root_type).await)
    }
}

/// Marker for a `null` that must replace the nearest nullable parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PropagateNull;

type BoxFuture<'b, T> = Pin<Box<dyn Future<Output = T> + Send + 'b>>;

async fn execute_operation(ctx: &ExecutionContext<'_>, root_type: &ObjectDef) -> Value {
    let mut fields = CollectedFields::new();
    collect_fields(
        ctx,
        root_type,
        Some(&ctx.operation.selection_set),
        &mut fields,
        &mut FxHashSet::default(),
    );
    match execute_fields(ctx, root_type, ctx.root_value, &fields, &[], 0).await {
        Ok(data) => Value::Object(data),
        Err(PropagateNull) => Value::Null,
    }
}

/// Resolves every collected field against `source`, in collection order.
fn execute_fields<'a, 'b>(
    ctx: &'b ExecutionContext<'a>,
    parent_type: &'b ObjectDef,
    source: &'b dyn ResolvableObject,
    fields: &'b CollectedFields<'a>,
    path: &'b [PathSegment],
    depth: usize,
) -> BoxFuture<'b, Result<Map<String, Value>, PropagateNull>> {
    Box::pin(async move {
        let mut data = Map::new();
        for (&response_key, nodes) in fields {
            let field_path = child_path(path, PathSegment::Field(response_key.to_string()));
            match execute_field(ctx, parent_type, source, nodes, &field_path, depth).await? {
                Some(Value::Null) if ctx.config.null_fields == NullFields::Omit => {}
                Some(value) => {
                    data.insert(response_key.to_string(), value);
                }
                None => {}
            }
        }
        Ok(data)
    })
}

/// Returns `Ok(None)` when the parent type has no such field.
async fn execute_field<'a>(
    ctx: &ExecutionContext<'a>,
    parent_type: &ObjectDef,
    source: &dyn ResolvableObject,
    nodes: &[&'a Field],
    path: &[PathSegment],
    depth: usize,
) -> Result<Option<Value>, PropagateNull> {
    let Some(field) = nodes.first().copied() else {
        return Ok(None);
    };
    let Some(field_def) = get_field_def(ctx.schema, parent_type, field.name.as_str()) else {
        debug!(
            parent = %parent_type.name,
            field = field.name.as_str(),
            "no field definition, omitting"
        );
        return Ok(None);
    };

    let result = match resolve_field_value(ctx, parent_type, source, nodes, field_def, path).await {
        Ok(value) => complete_value(ctx, parent_type, nodes, &field_def.ty, value, path, depth).await,
        Err(error) => {
            ctx.record_field_error(&error, path, field);
            Err(PropagateNull)
        }
    };
    try_nullify(&field_def.ty, result).map(Some)
}

async fn resolve_field_value<'a>(
    ctx: &ExecutionContext<'a>,
    parent_type: &ObjectDef,
    source: &dyn ResolvableObject,
    nodes: &[&'a Field],
    field_def: &FieldDef,
    path: &[PathSegment],
) -> Result<Value, FieldError> {
    let Some(field) = nodes.first().copied() else {
        return Ok(Value::Null);
    };
    let args = coerce_argument_values(ctx.schema, field_def, field, &ctx.variable_values)
        .map_err(FieldError::ArgumentCoercion)?;

    let info = ResolveInfo {
        field_name: field.name.as_str(),
        field_nodes: nodes,
        return_type: &field_def.ty,
        parent_type,
        schema: ctx.schema,
        fragments: &ctx.fragments,
        root_value: ctx.root_value,
        operation: ctx.operation,
        variable_values: &ctx.variable_values,
        path: path.to_vec(),
    };

    debug!(
        parent = %parent_type.name,
        field = info.field_name,
        custom = field_def.resolver.is_some(),
        "resolving field"
    );
    let resolver: &dyn Resolver = match &field_def.resolver {
        Some(resolver) => &**resolver,
        None => &DefaultResolver,
    };
    let future = resolver.resolve(source, &args, &info);

    match ctx.config.field_timeout_ms {
        Some(timeout_ms) => {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), future).await {
                Ok(result) => result.map_err(FieldError::from),
                Err(_) => Err(FieldError::Timeout {
                    parent: parent_type.name.clone(),
                    field: field.name.value.clone(),
                    timeout_ms,
                }),
            }
        }
        None => future.await.map_err(FieldError::from),
    }
}

/// Completes a resolved value against its declared type.
fn complete_value<'a, 'b>(
    ctx: &'b ExecutionContext<'a>,
    parent_type: &'b ObjectDef,
    nodes: &'b [&'a Field],
    ty: &'b TypeRef,
    value: Value,
    path: &'b [PathSegment],
    depth: usize,
) -> BoxFuture<'b, Result<Value, PropagateNull>> {
    Box::pin(async move {
        let Some(field) = nodes.first().copied() else {
            return Ok(Value::Null);
        };

        match ty {
            TypeRef::NonNull(inner) => {
                let completed =
                    complete_value(ctx, parent_type, nodes, inner, value, path, depth).await?;
                if completed.is_null() {
                    let error = FieldError::NonNullViolation {
                        parent: parent_type.name.clone(),
                        field: field.name.value.clone(),
                    };
                    ctx.record_field_error(&error, path, field);
                    return Err(PropagateNull);
                }
                Ok(completed)
            }
            _ if value.is_null() => Ok(Value::Null),
            TypeRef::List(inner) => {
                let Value::Array(items) = value else {
                    let error = FieldError::NotAList {
                        parent: parent_type.name.clone(),
                        field: field.name.value.clone(),
                        ty: ty.to_string(),
                        found: json_kind(&value),
                    };
                    ctx.record_field_error(&error, path, field);
                    return Err(PropagateNull);
                };

                let mut completed = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let item_path = child_path(path, PathSegment::Index(i));
                    let result =
                        complete_value(ctx, parent_type, nodes, inner, item, &item_path, depth)
                            .await;
                    completed.push(try_nullify(inner, result)?);
                }
                Ok(Value::Array(completed))
            }
            TypeRef::Named(name) => match ctx.schema.get_type(name) {
                Some(TypeDef::Object(object)) => {
                    complete_object(ctx, object, nodes, value, path, depth).await
                }
                Some(TypeDef::Interface(_) | TypeDef::Union(_)) => {
                    let runtime_type = value.typename();
                    let object = runtime_type
                        .as_deref()
                        .and_then(|type_name| ctx.schema.object_type(type_name))
                        .filter(|object| ctx.schema.is_possible_type(name, object));
                    match object {
                        Some(object) => complete_object(ctx, object, nodes, value, path, depth).await,
                        None => {
                            let error = FieldError::UnresolvedAbstractType {
                                abstract_type: name.clone(),
                                parent: parent_type.name.clone(),
                                field: field.name.value.clone(),
                                received: runtime_type.unwrap_or_else(|| "null".to_string()),
                            };
                            ctx.record_field_error(&error, path, field);
                            Err(PropagateNull)
                        }
                    }
                }
                Some(_) => Ok(value),
                None => match introspection::meta_object_type(name) {
                    Some(object) => complete_object(ctx, object, nodes, value, path, depth).await,
                    None => Ok(value),
                },
            },
        }
    })
}

/// Executes the merged sub-selections of every field node against `value`.
async fn complete_object<'a>(
    ctx: &ExecutionContext<'a>,
    object_type: &ObjectDef,
    nodes: &[&'a Field],
    value: Value,
    path: &[PathSegment],
    depth: usize,
) -> Result<Value, PropagateNull> {
    if depth >= ctx.config.max_depth {
        if let Some(field) = nodes.first() {
            let error = FieldError::DepthLimit {
                max_depth: ctx.config.max_depth,
            };
            ctx.record_field_error(&error, path, field);
        }
        return Err(PropagateNull);
    }

    let mut sub_fields = CollectedFields::new();
    let mut visited_fragments = FxHashSet::default();
    for &node in nodes {
        collect_fields(
            ctx,
            object_type,
            node.selection_set.as_ref(),
            &mut sub_fields,
            &mut visited_fragments,
        );
    }

    let data = execute_fields(ctx, object_type, &value, &sub_fields, path, depth + 1).await?;
    Ok(Value::Object(data))
}

/// Turns a propagated null into a `null` value if `ty` is nullable.
fn try_nullify(ty: &TypeRef, result: Result<Value, PropagateNull>) -> Result<Value, PropagateNull> {
    match result {
        Err(PropagateNull) if !ty.is_non_null() => Ok(Value::Null),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AsyncFnResolver;
    use crate::schema::{Schema, SchemaBuilder, UnionDef};
    use gqlx_syntax::parse;
    use serde_json::json;

    fn create_test_schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(
                ObjectDef::new("Query")
                    .field(FieldDef::new("user", TypeRef::named("User")))
                    .field(FieldDef::new("users", "[User]".parse().unwrap()))
                    .field(FieldDef::new("strict", "User!".parse().unwrap()))
                    .field(FieldDef::new("pet", TypeRef::named("Pet")))
                    .field(
                        FieldDef::new("slow", TypeRef::named("String")).resolver(
                            AsyncFnResolver::new(|_| async {
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                Ok(json!("late"))
                            }),
                        ),
                    ),
            )
            .add_type(
                ObjectDef::new("User")
                    .field(FieldDef::new("id", "ID!".parse().unwrap()))
                    .field(FieldDef::new("name", TypeRef::named("String")))
                    .field(FieldDef::new("friend", TypeRef::named("User"))),
            )
            .add_type(ObjectDef::new("Dog").field(FieldDef::new("barks", TypeRef::named("Boolean"))))
            .add_type(UnionDef::new("Pet", ["Dog"]))
            .build()
            .unwrap()
    }

    async fn run(source: &str, root: Value, config: ExecutorConfig) -> Response {
        let schema = create_test_schema();
        let document = parse(source).document;
        Executor::with_config(config)
            .execute(ExecuteParams::new(&schema, &document, &root))
            .await
    }

    #[test]
    fn test_executor_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.field_timeout_ms, None);
        assert_eq!(config.null_fields, NullFields::Omit);

        let config = config.with_max_depth(3).with_field_timeout_ms(50);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.field_timeout_ms, Some(50));
    }

    #[tokio::test]
    async fn test_response_sink_delivers_once() {
        let (sink, receiver) = ResponseSink::channel();
        assert!(sink.deliver(Response::data(json!({}))));
        assert_eq!(receiver.await.unwrap(), Response::data(json!({})));

        let (sink, receiver) = ResponseSink::channel();
        drop(receiver);
        assert!(!sink.deliver(Response::default()));
    }

    #[test]
    fn test_response_serialization() {
        let response = Response::error(GraphQLError::new("bad"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "errors": [{ "message": "bad" }] })
        );
        assert!(response.has_errors());
        assert!(!response.has_data());

        let response = Response::data(Value::Null);
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "data": null }));
    }

    #[tokio::test]
    async fn test_nested_objects_and_lists() {
        let root = json!({
            "user": { "id": 1, "name": "Ada", "friend": { "id": 2, "name": "Grace" } },
            "users": [{ "id": 3 }, null, { "id": 4, "name": "Linus" }]
        });
        let response = run(
            "{ user { name friend { id } } users { id name } }",
            root,
            ExecutorConfig::default(),
        )
        .await;

        assert!(!response.has_errors(), "{:?}", response.errors);
        assert_eq!(
            response.data,
            Some(json!({
                "user": { "name": "Ada", "friend": { "id": 2 } },
                "users": [{ "id": 3 }, null, { "id": 4, "name": "Linus" }]
            }))
        );
    }

    #[tokio::test]
    async fn test_include_null_fields() {
        let response = run(
            "{ user { id name } }",
            json!({ "user": { "id": "1" } }),
            ExecutorConfig::default().with_null_fields(NullFields::Include),
        )
        .await;
        assert_eq!(
            response.data,
            Some(json!({ "user": { "id": "1", "name": null } }))
        );
    }

    #[tokio::test]
    async fn test_non_null_violation_bubbles_to_nullable_parent() {
        let response = run(
            "{ user { id name } }",
            json!({ "user": { "name": "no id" } }),
            ExecutorConfig::default().with_null_fields(NullFields::Include),
        )
        .await;

        assert_eq!(response.data, Some(json!({ "user": null })));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].code(), Some("NON_NULL_VIOLATION"));
        assert_eq!(
            response.errors[0].path,
            vec![
                PathSegment::Field("user".to_string()),
                PathSegment::Field("id".to_string())
            ]
        );
        assert_eq!(response.errors[0].locations[0].column, 10);
    }

    #[tokio::test]
    async fn test_non_null_root_field_nulls_data() {
        let response = run("{ strict { id } }", json!({}), ExecutorConfig::default()).await;

        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(
            response.errors[0].message,
            "Cannot return null for non-nullable field Query.strict."
        );
    }

    #[tokio::test]
    async fn test_list_item_error_nulls_item() {
        let response = run(
            "{ users { id } }",
            json!({ "users": [{ "id": 1 }, {}] }),
            ExecutorConfig::default(),
        )
        .await;

        assert_eq!(response.data, Some(json!({ "users": [{ "id": 1 }, null] })));
        assert_eq!(
            serde_json::to_value(&response.errors[0].path).unwrap(),
            json!(["users", 1, "id"])
        );
    }

    #[tokio::test]
    async fn test_not_a_list() {
        let response = run(
            "{ users { id } }",
            json!({ "users": "nope" }),
            ExecutorConfig::default(),
        )
        .await;

        assert_eq!(response.data, Some(json!({})));
        assert_eq!(response.errors[0].code(), Some("NOT_A_LIST"));
    }

    #[tokio::test]
    async fn test_union_resolves_by_typename() {
        let response = run(
            "{ pet { __typename ... on Dog { barks } } }",
            json!({ "pet": { "__typename": "Dog", "barks": true } }),
            ExecutorConfig::default(),
        )
        .await;
        assert_eq!(
            response.data,
            Some(json!({ "pet": { "__typename": "Dog", "barks": true } }))
        );

        let response = run(
            "{ pet { __typename } }",
            json!({ "pet": { "__typename": "User" } }),
            ExecutorConfig::default(),
        )
        .await;
        assert_eq!(response.errors[0].code(), Some("UNRESOLVED_ABSTRACT_TYPE"));
    }

    #[tokio::test]
    async fn test_field_timeout() {
        let response = run(
            "{ slow user { id } }",
            json!({ "user": { "id": 1 } }),
            ExecutorConfig::default().with_field_timeout_ms(10),
        )
        .await;

        assert_eq!(response.data, Some(json!({ "user": { "id": 1 } })));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].code(), Some("RESOLVER_TIMEOUT"));
        assert_eq!(
            response.errors[0].message,
            "Resolver for field Query.slow timed out after 10ms"
        );
    }

    #[tokio::test]
    async fn test_max_depth() {
        let response = run(
            "{ user { friend { name } } }",
            json!({ "user": { "friend": { "name": "deep" } } }),
            ExecutorConfig::default().with_max_depth(1),
        )
        .await;

        assert_eq!(response.data, Some(json!({ "user": {} })));
        assert_eq!(response.errors[0].code(), Some("MAX_DEPTH_EXCEEDED"));
    }

    #[tokio::test]
    async fn test_meta_fields() {
        let response = run(
            r#"{
                __typename
                __schema { qt: queryType { name } mutationType { name } }
                t: __type(name: "Dog") { kind fields { name type } }
                missing: __type(name: "Nope") { name }
            }"#,
            json!({}),
            ExecutorConfig::default().with_null_fields(NullFields::Include),
        )
        .await;
        assert!(!response.has_errors(), "{:?}", response.errors);

        assert_eq!(
            response.data,
            Some(json!({
                "__typename": "Query",
                "__schema": { "qt": { "name": "Query" }, "mutationType": null },
                "t": { "kind": "OBJECT", "fields": [{ "name": "barks", "type": "Boolean" }] },
                "missing": null
            }))
        );
    }

    #[tokio::test]
    async fn test_meta_field_selections_honor_fragments_and_directives() {
        let response = run(
            r#"{
                pet: __type(name: "Pet") {
                    name @skip(if: true)
                    ... on __Type { possibleTypes { __typename name } }
                }
                user: __type(name: "User") { fields @include(if: false) { name } kind }
            }"#,
            json!({}),
            ExecutorConfig::default(),
        )
        .await;
        assert!(!response.has_errors(), "{:?}", response.errors);

        assert_eq!(
            response.data,
            Some(json!({
                "pet": { "possibleTypes": [{ "__typename": "__Type", "name": "Dog" }] },
                "user": { "kind": "OBJECT" }
            }))
        );
    }

    #[tokio::test]
    async fn test_schema_meta_fields_only_on_query_root() {
        let response = run(
            "{ user { __typename __schema { types { name } } } }",
            json!({ "user": { "id": 1 } }),
            ExecutorConfig::default(),
        )
        .await;

        assert_eq!(response.data, Some(json!({ "user": { "__typename": "User" } })));
        assert!(!response.has_errors());
    }
}
