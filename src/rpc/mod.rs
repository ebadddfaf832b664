use crate::config::Config;
use crate::db::Db;
use crate::error::ServiceError;
use crate::lines::{LinesAction, LinesParams};
use crate::model::Identity;
use crate::services::HtmlSourceDecorator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

/// Response example published with the `lines` method docs.
pub const LINES_EXAMPLE: &str = include_str!("example-lines.json");

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
    /// Login the request is made on behalf of; absent for anonymous callers.
    #[serde(default)]
    user: Option<String>,
}

#[derive(Serialize)]
struct RpcResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Serialize)]
struct RpcError {
    code: u16,
    message: String,
}

#[derive(Deserialize, Default, schemars::JsonSchema)]
struct ListMethodsParams {
    format: Option<String>,
}

struct MethodDoc {
    name: &'static str,
    summary: &'static str,
    since: &'static str,
    internal: bool,
    params: &'static [ParamDoc],
}

struct ParamDoc {
    name: &'static str,
    required: bool,
    description: &'static str,
    default: Option<&'static str>,
    example: &'static str,
}

pub const METHOD_LIST: &[&str] = &["lines", "help", "list_methods"];

const METHOD_DOCS: &[MethodDoc] = &[
    MethodDoc {
        name: "lines",
        summary: "Show source code with line oriented info. Requires the codeviewer permission \
                  on the file's project. Each element of the result array holds the line number, \
                  the decorated content of the line, the SCM author, revision and last commit date \
                  of the line, and its coverage counters.",
        since: "5.0",
        internal: true,
        params: &[
            ParamDoc {
                name: "uuid",
                required: true,
                description: "File uuid",
                default: None,
                example: "f333aab4-7e3a-4d70-87e1-f4c491f05e5c",
            },
            ParamDoc {
                name: "from",
                required: false,
                description: "First line to return. Starts at 1",
                default: Some("1"),
                example: "10",
            },
            ParamDoc {
                name: "to",
                required: false,
                description: "Last line to return (inclusive)",
                default: None,
                example: "20",
            },
        ],
    },
    MethodDoc {
        name: "help",
        summary: "Describe the service and its methods.",
        since: "5.0",
        internal: false,
        params: &[],
    },
    MethodDoc {
        name: "list_methods",
        summary: "List method names, or method docs with parameter schemas.",
        since: "5.0",
        internal: false,
        params: &[ParamDoc {
            name: "format",
            required: false,
            description: "'names' for a bare list, 'details' for docs and schemas",
            default: Some("details"),
            example: "names",
        }],
    },
];

/// Storage plus the stateless collaborators built on top of it.
pub struct App {
    db: Db,
    decorator: HtmlSourceDecorator,
}

impl App {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            decorator: HtmlSourceDecorator::new(),
        }
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(Db::new(db_path)?))
    }

    fn lines_action(&self) -> LinesAction<'_> {
        LinesAction::new(&self.db, &self.db, &self.db, &self.decorator)
            .with_max_lines(Config::get().max_lines)
    }

    fn handle_request(&self, req: RpcRequest) -> RpcResponse {
        let id = req.id.clone();
        let identity = Identity { login: req.user };
        match handle_method(self, &identity, &req.method, req.params) {
            Ok(value) => RpcResponse {
                id,
                result: Some(value),
                error: None,
            },
            Err(err) => error_response(id, &err),
        }
    }
}

pub fn serve(db_path: &Path) -> Result<()> {
    let app = App::open(db_path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(value) => value,
            Err(err) => {
                log::error!("stdin error: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        writeln!(stdout, "{}", respond(&app, &line)?)?;
        stdout.flush()?;
    }

    Ok(())
}

/// Answers one JSONL request line with one JSONL response line.
pub fn respond(app: &App, line: &str) -> Result<String> {
    let response = match serde_json::from_str::<RpcRequest>(line) {
        Ok(request) => app.handle_request(request),
        Err(err) => {
            let err = ServiceError::BadRequest(format!("invalid request: {err}"));
            error_response(Value::Null, &anyhow::Error::new(err))
        }
    };
    Ok(serde_json::to_string(&response)?)
}

pub fn call(
    db_path: &Path,
    method: String,
    params_raw: &str,
    id_raw: &str,
    user: Option<String>,
) -> Result<String> {
    let params: Value = serde_json::from_str(params_raw).with_context(|| "parse params JSON")?;
    let id = parse_value(id_raw);
    let app = App::open(db_path)?;
    let request = RpcRequest {
        id,
        method,
        params,
        user,
    };
    let response = app.handle_request(request);
    Ok(serde_json::to_string(&response)?)
}

pub fn handle_method(app: &App, identity: &Identity, method: &str, params: Value) -> Result<Value> {
    let start = Instant::now();
    let value = match method {
        "help" => method_help(),
        "list_methods" => method_list(params)?,
        "lines" => app.lines_action().handle_value(identity, params)?,
        other => {
            return Err(ServiceError::NotFound(format!("unknown method: {other}")).into());
        }
    };

    let elapsed = start.elapsed();
    if elapsed.as_millis() > u128::from(Config::get().slow_query_ms) {
        log::warn!("Slow query: {method} took {elapsed:?}");
    }
    Ok(value)
}

fn error_response(id: Value, err: &anyhow::Error) -> RpcResponse {
    let code = err
        .downcast_ref::<ServiceError>()
        .map(ServiceError::status_code)
        .unwrap_or(500);
    if code >= 500 {
        log::error!("request failed: {err:#}");
    }
    RpcResponse {
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: err.to_string(),
        }),
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// --- Method docs ---

fn schema_value<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let raw = serde_json::to_value(schema).unwrap_or_else(|_| json!({"type": "object"}));
    simplify_schema(raw)
}

/// Return a simplified JSON Schema for the params struct of the given method.
pub fn method_param_schema(method: &str) -> Value {
    match method {
        "lines" => schema_value::<LinesParams>(),
        "list_methods" => schema_value::<ListMethodsParams>(),
        _ => json!({"type": "object"}),
    }
}

fn simplify_schema(mut schema: Value) -> Value {
    collapse_nullable(&mut schema);
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("definitions");
        obj.remove("title");
    }
    schema
}

/// `Option<T>` fields come out as `"type": [T, "null"]`; keep only `T`.
fn collapse_nullable(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(types)) = map.get("type") {
                let non_null: Vec<Value> = types
                    .iter()
                    .filter(|t| t.as_str() != Some("null"))
                    .cloned()
                    .collect();
                if non_null.len() == 1 {
                    map.insert("type".to_string(), non_null[0].clone());
                }
            }
            if map.get("type").and_then(|t| t.as_str()) == Some("integer") {
                map.remove("format");
            }
            for v in map.values_mut() {
                collapse_nullable(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                collapse_nullable(item);
            }
        }
        _ => {}
    }
}

fn method_docs_json() -> Vec<Value> {
    METHOD_DOCS
        .iter()
        .map(|doc| {
            let params: Vec<Value> = doc
                .params
                .iter()
                .map(|param| {
                    json!({
                        "name": param.name,
                        "required": param.required,
                        "description": param.description,
                        "default": param.default,
                        "example": param.example,
                    })
                })
                .collect();
            let mut entry = json!({
                "name": doc.name,
                "summary": doc.summary,
                "since": doc.since,
                "internal": doc.internal,
                "params": params,
                "schema": method_param_schema(doc.name),
            });
            if doc.name == "lines" {
                if let Ok(example) = serde_json::from_str::<Value>(LINES_EXAMPLE) {
                    entry["response_example"] = example;
                }
            }
            entry
        })
        .collect()
}

fn method_help() -> Value {
    json!({
        "summary": "srclines serves indexed source lines with SCM and coverage data as JSONL RPC over stdin/stdout.",
        "request": {
            "id": "Echoed back in the response",
            "method": "Method name",
            "params": "Method parameters object",
            "user": "Optional login of the caller; omitted or null means anonymous",
        },
        "errors": {
            "400": "Missing or malformed parameter",
            "403": "Caller lacks the required permission",
            "404": "Unknown file, file without sources, or unknown method",
            "500": "Internal failure",
        },
        "methods": METHOD_LIST,
        "method_docs": method_docs_json(),
        "examples": [
            { "method": "lines", "params": { "uuid": "f333aab4-7e3a-4d70-87e1-f4c491f05e5c" } },
            { "method": "lines", "params": { "uuid": "f333aab4-7e3a-4d70-87e1-f4c491f05e5c", "from": 10, "to": 20 }, "user": "alice" },
        ],
        "cli_examples": [
            "srclines import --path dataset.json",
            r#"srclines request --method lines --params '{"uuid":"f333aab4-7e3a-4d70-87e1-f4c491f05e5c","from":10,"to":20}' --user alice"#,
            "srclines serve",
        ]
    })
}

fn method_list(params: Value) -> Result<Value> {
    let params = if params.is_null() {
        ListMethodsParams::default()
    } else {
        serde_json::from_value(params)
            .map_err(|err| ServiceError::BadRequest(format!("invalid list_methods params: {err}")))?
    };
    let format = params
        .format
        .as_deref()
        .unwrap_or("details")
        .trim()
        .to_ascii_lowercase();
    if format == "names" || format == "name" || format == "list" {
        return Ok(json!(METHOD_LIST));
    }
    Ok(json!({
        "methods": method_docs_json(),
        "names": METHOD_LIST,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app() -> (TempDir, App) {
        let temp = TempDir::new().unwrap();
        let app = App::open(&temp.path().join("db.sqlite")).unwrap();
        (temp, app)
    }

    fn respond_json(app: &App, line: &str) -> Value {
        serde_json::from_str(&respond(app, line).unwrap()).unwrap()
    }

    #[test]
    fn example_response_is_valid_json() {
        let example: Value = serde_json::from_str(LINES_EXAMPLE).unwrap();
        assert!(example["sources"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn lines_schema_lists_parameters() {
        let schema = method_param_schema("lines");
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("uuid"));
        assert!(props.contains_key("from"));
        assert!(props.contains_key("to"));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn unparsable_request_is_bad_request() {
        let (_temp, app) = app();
        let response = respond_json(&app, "{not json");
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], 400);
    }

    #[test]
    fn unknown_method_is_not_found() {
        let (_temp, app) = app();
        let response = respond_json(&app, r#"{"id": 7, "method": "drop_tables"}"#);
        assert_eq!(response["id"], 7);
        assert_eq!(response["error"]["code"], 404);
        assert_eq!(response["error"]["message"], "unknown method: drop_tables");
    }

    #[test]
    fn list_methods_names_format() {
        let (_temp, app) = app();
        let response =
            respond_json(&app, r#"{"id": 1, "method": "list_methods", "params": {"format": "names"}}"#);
        assert_eq!(response["result"], json!(METHOD_LIST));
    }

    #[test]
    fn help_documents_lines_method() {
        let (_temp, app) = app();
        let response = respond_json(&app, r#"{"id": "h", "method": "help"}"#);
        let docs = response["result"]["method_docs"].as_array().unwrap();
        let lines = docs.iter().find(|d| d["name"] == "lines").unwrap();
        assert_eq!(lines["since"], "5.0");
        assert_eq!(lines["internal"], true);
        assert_eq!(lines["params"][0]["name"], "uuid");
        assert_eq!(lines["params"][0]["required"], true);
        assert_eq!(lines["params"][1]["default"], "1");
        assert!(lines["response_example"]["sources"].is_array());
    }
}
