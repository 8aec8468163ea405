use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::resolve::resolve_refs;
use super::OpenApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Order in which the verbs of a path item are visited
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Trace => reqwest::Method::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl RequestBody {
    /// The schema declared for `application/json`, if any
    pub fn json_schema(&self) -> Option<&Value> {
        self.content
            .get("application/json")
            .and_then(|media| media.get("schema"))
            .filter(|schema| !schema.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub get: Option<Operation>,
    pub post: Option<Operation>,
    pub put: Option<Operation>,
    pub patch: Option<Operation>,
    pub delete: Option<Operation>,
    pub head: Option<Operation>,
    pub options: Option<Operation>,
    pub trace: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Server {
    url: String,
}

/// One (path, verb) pair of the document
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    pub path: &'a str,
    pub method: HttpMethod,
    pub path_item: &'a PathItem,
    pub operation: &'a Operation,
}

impl<'a> OperationRef<'a> {
    pub fn operation_id(&self) -> Option<&'a str> {
        self.operation.operation_id.as_deref()
    }

    /// Path-level parameters followed by operation-level ones. An operation
    /// parameter replaces a path-level parameter with the same name and location.
    pub fn parameters(&self) -> Vec<&'a Parameter> {
        let mut merged: Vec<&'a Parameter> = Vec::new();
        for parameter in self
            .path_item
            .parameters
            .iter()
            .chain(self.operation.parameters.iter())
        {
            match merged.iter().position(|existing| {
                existing.name == parameter.name && existing.location == parameter.location
            }) {
                Some(index) => merged[index] = parameter,
                None => merged.push(parameter),
            }
        }
        merged
    }
}

/// A parsed OpenAPI document with all local references inlined
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenApiDocument {
    servers: Vec<Server>,
    paths: Vec<(String, PathItem)>,
}

impl OpenApiDocument {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OpenApiError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Build the typed view from an already decoded document.
    pub fn from_value(raw: Value) -> Result<Self, OpenApiError> {
        let value = resolve_refs(&raw)?;

        let servers = match value.get("servers") {
            Some(servers) => serde_json::from_value(servers.clone()).map_err(|source| {
                OpenApiError::Structure {
                    location: "servers".to_string(),
                    source,
                }
            })?,
            None => Vec::new(),
        };

        let mut paths = Vec::new();
        if let Some(items) = value.get("paths").and_then(Value::as_object) {
            for (path, item) in items {
                if path.starts_with("x-") {
                    continue;
                }
                let path_item: PathItem =
                    serde_json::from_value(item.clone()).map_err(|source| {
                        OpenApiError::Structure {
                            location: format!("paths.{}", path),
                            source,
                        }
                    })?;
                paths.push((path.clone(), path_item));
            }
        }

        Ok(Self { servers, paths })
    }

    /// The URL of the first declared server
    pub fn base_url(&self) -> Result<&str, OpenApiError> {
        self.servers
            .first()
            .map(|server| server.url.as_str())
            .ok_or(OpenApiError::MissingServer)
    }

    /// Every operation of the document, paths in document order and verbs in
    /// [`HttpMethod::ALL`] order.
    pub fn operations(&self) -> impl Iterator<Item = OperationRef<'_>> {
        self.paths.iter().flat_map(|(path, path_item)| {
            HttpMethod::ALL.into_iter().filter_map(move |method| {
                path_item.operation(method).map(|operation| OperationRef {
                    path: path.as_str(),
                    method,
                    path_item,
                    operation,
                })
            })
        })
    }

    /// The first operation whose operationId matches
    pub fn find_operation(&self, operation_id: &str) -> Option<OperationRef<'_>> {
        self.operations()
            .find(|operation| operation.operation_id() == Some(operation_id))
    }
}

impl FromStr for OpenApiDocument {
    type Err = OpenApiError;

    /// Parse YAML or JSON text
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::from_value(yaml_to_json(raw))
    }
}

/// YAML allows non-string mapping keys (`200:` under `responses`), JSON does not.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
