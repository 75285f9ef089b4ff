//! Execution runtime for gqlx.
//!
//! This crate provides the GraphQL execution engine:
//! - `schema`: Schema model and building
//! - `value`: Parent values resolvers read from
//! - `resolver`: Resolver trait and built-in resolvers
//! - `coercion`: Variable and argument coercion
//! - `context`: Per-request execution context and root type selection
//! - `collect`: Field collection
//! - `executor`: Field resolution, value completion and response delivery
//! - `introspection`: `__typename`, `__schema` and `__type`
//!
//! ```
//! use gqlx_runtime::{ExecuteParams, Executor, FieldDef, ObjectDef, SchemaBuilder, TypeRef};
//! use serde_json::json;
//!
//! # tokio_test_block_on(async {
//! let schema = SchemaBuilder::new()
//!     .query_type("Query")
//!     .add_type(ObjectDef::new("Query").field(FieldDef::new("name", TypeRef::named("String"))))
//!     .build()
//!     .unwrap();
//! let document = gqlx_syntax::parse("{ name }").document;
//! let root = json!({ "name": "Ada" });
//!
//! let response = Executor::new()
//!     .execute(ExecuteParams::new(&schema, &document, &root))
//!     .await;
//! assert_eq!(response.data, Some(json!({ "name": "Ada" })));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod coercion;
pub mod collect;
pub mod context;
pub mod error;
pub mod executor;
mod introspection;
pub mod resolver;
pub mod schema;
pub mod value;

pub use coercion::{coerce_argument_values, coerce_variable_values, CoercionError, Variables};
pub use collect::{collect_fields, does_fragment_type_apply, should_include, CollectedFields};
pub use context::{get_operation_root_type, ExecuteParams, ExecutionContext, Fragments};
pub use error::{ErrorCollector, ExecutionError, FieldError, GraphQLError, Location, PathSegment};
pub use executor::{Executor, ExecutorConfig, NullFields, Response, ResponseSink};
pub use resolver::{
    AsyncFnResolver, DefaultResolver, FieldResolver, FnResolver, ResolveInfo, Resolver,
    ResolverArgs, ResolverError, ResolverFuture, ResolverResult,
};
pub use schema::{
    EnumDef, EnumValueDef, FieldDef, InputObjectDef, InputValueDef, InterfaceDef, ObjectDef,
    ScalarDef, Schema, SchemaBuilder, SchemaConfig, SchemaError, TypeDef, TypeRef, UnionDef,
};
pub use value::{ObjectValue, Property, ResolvableObject};
