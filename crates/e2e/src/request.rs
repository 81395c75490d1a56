//! Request building, HTTP transport and response capture

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult, Layer, Mismatch, Mismatches};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";

/// `{name}` endpoint placeholders
static PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// HTTP methods scenarios may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(E2eError::Config(format!("unsupported HTTP method '{}'", other))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request accumulated across preparatory steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub headers: BTreeMap<String, String>,
    pub path_params: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub form_params: BTreeMap<String, String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

impl PendingRequest {
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn set_path_param(&mut self, name: &str, value: &str) {
        self.path_params.insert(name.to_string(), value.to_string());
    }

    pub fn set_query_param(&mut self, name: &str, value: &str) {
        self.query_params.insert(name.to_string(), value.to_string());
    }

    pub fn set_form_param(&mut self, name: &str, value: &str) {
        self.form_params.insert(name.to_string(), value.to_string());
    }

    pub fn set_accept_type(&mut self, media_type: &str) {
        self.accept = Some(media_type.to_string());
    }

    pub fn set_content_type(&mut self, media_type: &str) {
        self.content_type = Some(media_type.to_string());
    }

    /// Substitute `{name}` placeholders in an endpoint from the path params
    pub fn resolve_endpoint(&self, endpoint: &str) -> E2eResult<String> {
        let placeholder = PLACEHOLDER
            .as_ref()
            .ok_or_else(|| E2eError::Config("invalid endpoint placeholder pattern".to_string()))?;

        let mut missing = Vec::new();
        let resolved = placeholder.replace_all(endpoint, |caps: &regex::Captures<'_>| {
            match self.path_params.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    missing.push(caps[1].to_string());
                    String::new()
                }
            }
        });

        if !missing.is_empty() {
            return Err(E2eError::Config(format!(
                "endpoint '{}' has no value for path param(s): {}",
                endpoint,
                missing.join(", ")
            )));
        }
        Ok(resolved.into_owned())
    }
}

/// A captured response; assertion steps read this and never re-send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Parsed body, `Null` when the body is not JSON
    pub body: Value,
    pub raw: String,
}

impl ResponseSnapshot {
    pub fn new(method: Method, url: &str, status: u16, content_type: Option<String>, raw: String) -> Self {
        let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
        Self {
            method,
            url: url.to_string(),
            status,
            content_type,
            body,
            raw,
        }
    }

    /// Look up a value by dotted path with optional indices (`books[0].name`)
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.body, path)
    }

    /// String form of a value; `None` for absent or null values
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.lookup(path).and_then(value_text)
    }

    /// Compare against an expected media type. Parameters such as charset are
    /// only compared when the expectation names them.
    pub fn content_type_matches(&self, expected: &str) -> bool {
        let Some(actual) = self.content_type.as_deref() else {
            return false;
        };
        let normalize = |s: &str| -> Vec<String> {
            s.split(';')
                .map(|part| part.trim().to_ascii_lowercase().replace(' ', ""))
                .filter(|part| !part.is_empty())
                .collect()
        };
        let actual = normalize(actual);
        let expected = normalize(expected);
        if expected.len() == 1 {
            actual.first() == expected.first()
        } else {
            actual == expected
        }
    }

    pub fn expect_status(&self, code: u16) -> E2eResult<()> {
        if self.status == code {
            return Ok(());
        }
        api_mismatch("status", code.to_string(), Some(self.status.to_string()))
    }

    pub fn expect_content_type(&self, expected: &str) -> E2eResult<()> {
        if self.content_type_matches(expected) {
            return Ok(());
        }
        api_mismatch("content-type", expected, self.content_type.clone())
    }

    /// Every listed path is present and non-null; all failures are reported
    pub fn expect_not_null<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> E2eResult<()> {
        let mut mismatches = Mismatches::default();
        for path in paths {
            if self.get_string(path).is_none() {
                mismatches.push(Mismatch::new(Layer::Api, path, "a non-null value", None));
            }
        }
        mismatches.into_result()
    }

    pub fn expect_field(&self, path: &str, expected: &str) -> E2eResult<()> {
        let actual = self.get_string(path);
        if actual.as_deref() == Some(expected) {
            return Ok(());
        }
        api_mismatch(path, expected, actual)
    }
}

fn api_mismatch(field: &str, expected: impl Into<String>, actual: Option<String>) -> E2eResult<()> {
    Err(E2eError::FieldMismatch(Mismatches(vec![Mismatch::new(
        Layer::Api,
        field,
        expected,
        actual,
    )])))
}

/// Resolve a dotted/indexed path against a JSON value
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (key, indices) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for index in indices.split('[').filter(|s| !s.is_empty()) {
            let index: usize = index.strip_suffix(']')?.parse().ok()?;
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Scalar JSON values as text, containers serialized, null as absent
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// The outbound HTTP capability
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, method: Method, endpoint: &str, request: &PendingRequest) -> E2eResult<ResponseSnapshot>;
}

/// `reqwest`-backed transport against the API base URL
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, method: Method, endpoint: &str, request: &PendingRequest) -> E2eResult<ResponseSnapshot> {
        let url = self.url_for(&request.resolve_endpoint(endpoint)?);
        info!("{} {}", method, url);

        let mut builder = self.client.request(method.into(), url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept.as_str());
        }
        if !request.query_params.is_empty() {
            builder = builder.query(&request.query_params);
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type.as_str());
        }
        if !request.form_params.is_empty() {
            let json_body = request
                .content_type
                .as_deref()
                .map(|ct| ct.to_ascii_lowercase().starts_with(APPLICATION_JSON))
                .unwrap_or(false);
            builder = if json_body {
                builder.json(&request.form_params)
            } else {
                builder.form(&request.form_params)
            };
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let raw = response.text().await?;

        debug!("{} {} -> {} ({} bytes)", method, url, status, raw.len());
        Ok(ResponseSnapshot::new(method, &url, status, content_type, raw))
    }
}
