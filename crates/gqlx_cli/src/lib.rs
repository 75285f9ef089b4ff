//! Command-line interface for gqlx.
//!
//! # Usage
//!
//! ```bash
//! # Execute a query against a JSON root value
//! gqlx exec query.graphql --schema schema.json --root data.json
//!
//! # Pick an operation and pass variables
//! gqlx exec ops.graphql --schema schema.json --operation GetUser --variables vars.json
//!
//! # Check documents for syntax errors
//! gqlx check queries/*.graphql
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use gqlx_runtime::{
    ExecuteParams, Executor, ExecutorConfig, NullFields, Response, SchemaConfig, SchemaError,
};
use gqlx_syntax::ParseResult;
use miette::{NamedSource, Report};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "gqlx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a GraphQL document and print the JSON response
    Exec {
        /// Document to execute
        document: PathBuf,

        /// Schema description (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Root value (JSON object)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Variable values (JSON object)
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Name of the operation to run
        #[arg(short, long)]
        operation: Option<String>,

        /// Write `null` fields instead of omitting them
        #[arg(long)]
        include_nulls: bool,

        /// Maximum depth of nested objects
        #[arg(long)]
        max_depth: Option<usize>,

        /// Per-field resolver timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Check GraphQL documents for syntax errors
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Errors that stop a command before it produces output.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} must contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Inputs of one `exec` run, already loaded from disk.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub document: String,
    pub schema: SchemaConfig,
    pub root: Value,
    pub variables: Map<String, Value>,
    pub operation: Option<String>,
    pub config: ExecutorConfig,
}

/// Runs a command, returning the process exit code.
///
/// # Errors
///
/// Returns an error if an input file cannot be read or decoded, or the
/// schema is invalid.
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Commands::Exec {
            document,
            schema,
            root,
            variables,
            operation,
            include_nulls,
            max_depth,
            timeout_ms,
        } => {
            let mut config = ExecutorConfig::default();
            if include_nulls {
                config = config.with_null_fields(NullFields::Include);
            }
            if let Some(max_depth) = max_depth {
                config = config.with_max_depth(max_depth);
            }
            if let Some(timeout_ms) = timeout_ms {
                config = config.with_field_timeout_ms(timeout_ms);
            }

            let source = read_file(&document)?;
            let parsed = gqlx_syntax::parse(&source);
            if parsed.has_errors() {
                report_diagnostics(&document, &source, &parsed);
                return Ok(1);
            }

            let request = ExecRequest {
                document: source,
                schema: read_json(&schema)?,
                root: root
                    .as_deref()
                    .map(read_json::<Value>)
                    .transpose()?
                    .unwrap_or_else(|| Value::Object(Map::new())),
                variables: variables
                    .as_deref()
                    .map(read_object)
                    .transpose()?
                    .unwrap_or_default(),
                operation,
                config,
            };
            let response = exec(request).await?;
            println!("{}", render_response(&response));
            Ok(i32::from(response.has_errors()))
        }
        Commands::Check { files } => check_files(&files, cli.verbose, cli.quiet),
    }
}

/// Executes a request with default resolvers over its JSON root value.
///
/// # Errors
///
/// Returns [`CliError::Schema`] if the schema description is invalid.
/// Request failures are reported in the response instead.
pub async fn exec(request: ExecRequest) -> Result<Response, CliError> {
    let schema = request.schema.build()?;
    let document = gqlx_syntax::parse(&request.document).document;

    let mut params = ExecuteParams::new(&schema, &document, &request.root)
        .variables(request.variables);
    if let Some(name) = request.operation.as_deref() {
        params = params.operation_name(name);
    }

    debug!(operation = request.operation.as_deref().unwrap_or_default(), "executing");
    Ok(Executor::with_config(request.config).execute(params).await)
}

/// Pretty-prints a response as JSON.
#[must_use]
pub fn render_response(response: &Response) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|e| {
        format!("{{\"errors\":[{{\"message\":{}}}]}}", Value::String(e.to_string()))
    })
}

fn check_files(files: &[PathBuf], verbose: bool, quiet: bool) -> Result<i32, CliError> {
    let mut failed = 0usize;

    for file in files {
        if verbose {
            println!("{} {}", "Checking".blue(), file.display());
        }

        let source = read_file(file)?;
        let parsed = gqlx_syntax::parse(&source);

        if parsed.has_errors() {
            failed += 1;
            report_diagnostics(file, &source, &parsed);
        } else if verbose {
            println!("{} {}", "OK".green(), file.display());
        }
    }

    if failed > 0 {
        eprintln!(
            "{} {} of {} file(s) failed",
            "Error:".red().bold(),
            failed,
            files.len()
        );
        return Ok(1);
    }
    if !quiet {
        println!(
            "{} {} file(s) checked",
            "Success:".green().bold(),
            files.len()
        );
    }
    Ok(0)
}

fn report_diagnostics(path: &Path, source: &str, parsed: &ParseResult) {
    info!(file = %path.display(), errors = parsed.diagnostics.error_count(), "syntax errors");
    for diagnostic in parsed.diagnostics.iter() {
        let report = Report::new(diagnostic.clone())
            .with_source_code(NamedSource::new(path.display().to_string(), source.to_string()));
        eprintln!("{report:?}");
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let source = read_file(path)?;
    serde_json::from_str(&source).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_object(path: &Path) -> Result<Map<String, Value>, CliError> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaConfig {
        SchemaConfig::from_json(
            r#"{
                "query": "Query",
                "types": [
                    { "kind": "OBJECT", "name": "Query", "fields": [
                        { "name": "name", "type": "String" },
                        { "name": "user", "type": "User",
                          "arguments": [{ "name": "id", "type": "ID!" }] }
                    ] },
                    { "kind": "OBJECT", "name": "User", "fields": [
                        { "name": "id", "type": "ID!" },
                        { "name": "email", "type": "String" }
                    ] }
                ]
            }"#,
        )
        .unwrap()
    }

    fn request(document: &str) -> ExecRequest {
        ExecRequest {
            document: document.to_string(),
            schema: schema(),
            root: json!({ "name": "Ada", "user": { "id": "7" } }),
            variables: Map::new(),
            operation: None,
            config: ExecutorConfig::default(),
        }
    }

    #[test]
    fn test_parse_exec_arguments() {
        let cli = Cli::try_parse_from([
            "gqlx",
            "exec",
            "query.graphql",
            "--schema",
            "schema.json",
            "--operation",
            "GetUser",
            "--include-nulls",
            "--max-depth",
            "8",
            "--timeout-ms",
            "250",
        ])
        .unwrap();

        let Commands::Exec {
            document,
            schema,
            root,
            operation,
            include_nulls,
            max_depth,
            timeout_ms,
            ..
        } = cli.command
        else {
            panic!("expected exec");
        };
        assert_eq!(document, PathBuf::from("query.graphql"));
        assert_eq!(schema, PathBuf::from("schema.json"));
        assert_eq!(root, None);
        assert_eq!(operation.as_deref(), Some("GetUser"));
        assert!(include_nulls);
        assert_eq!(max_depth, Some(8));
        assert_eq!(timeout_ms, Some(250));
    }

    #[test]
    fn test_parse_check_requires_files() {
        assert!(Cli::try_parse_from(["gqlx", "check"]).is_err());

        let cli = Cli::try_parse_from(["gqlx", "-q", "check", "a.graphql", "b.graphql"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Check { files } if files.len() == 2));
    }

    #[tokio::test]
    async fn test_exec_request() {
        let response = exec(request(r#"{ name user(id: "7") { id email } }"#)).await.unwrap();
        assert_eq!(
            response.data,
            Some(json!({ "name": "Ada", "user": { "id": "7" } }))
        );
        assert!(!response.has_errors(), "{:?}", response.errors);
    }

    #[tokio::test]
    async fn test_exec_with_operation_and_nulls() {
        let mut req = request(r#"query A { name } query B { user(id: "7") { email } }"#);
        req.operation = Some("B".to_string());
        req.config = ExecutorConfig::default().with_null_fields(NullFields::Include);

        let response = exec(req).await.unwrap();
        assert_eq!(response.data, Some(json!({ "user": { "email": null } })));
        assert!(!response.has_errors(), "{:?}", response.errors);
    }

    #[tokio::test]
    async fn test_exec_missing_required_argument() {
        let response = exec(request("{ name user { id } }")).await.unwrap();
        assert_eq!(response.data, Some(json!({ "name": "Ada" })));
        assert_eq!(response.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_exec_reports_request_errors_in_response() {
        let response = exec(request("query A { name } query B { name }")).await.unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].code(), Some("AMBIGUOUS_OPERATION"));
        assert!(render_response(&response).contains("AMBIGUOUS_OPERATION"));
    }

    #[tokio::test]
    async fn test_exec_invalid_schema() {
        let mut req = request("{ name }");
        req.schema.query = "Missing".to_string();
        let error = exec(req).await.unwrap_err();
        assert!(matches!(error, CliError::Schema(_)));
    }
}
