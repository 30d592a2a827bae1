use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use strum::Display;
use uuid::Uuid;

use super::error::ApiError;
use crate::config::ApiOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
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

static PATH_BASE: Lazy<reqwest::Url> =
    Lazy::new(|| reqwest::Url::parse("http://localhost/").expect("valid base url"));

/// Joins path segments, percent-encoding each one so an id can neither add
/// segments nor start a query string.
pub fn resource_path(segments: &[&str]) -> String {
    let mut url = PATH_BASE.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().trim_start_matches('/').to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// One HTTP exchange with the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(options: &ApiOptions) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs.max(1)))
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request_id = Uuid::new_v4();
        let url = self.url(&request.path);
        tracing::debug!(%request_id, method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header("X-Request-Id", request_id.to_string());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            tracing::warn!(%request_id, status = status.as_u16(), "request failed");
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// `message` from a JSON error body, or the body itself when it is plain text.
pub fn server_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_is_read_from_json_or_text() {
        assert_eq!(
            server_message(&json!({"statusCode": 400, "message": "Thiếu tiêu đề"})),
            Some("Thiếu tiêu đề".to_string())
        );
        assert_eq!(
            server_message(&Value::String("Bad Gateway".into())),
            Some("Bad Gateway".to_string())
        );
        assert_eq!(server_message(&json!({"error": true})), None);
        assert_eq!(server_message(&Value::Null), None);
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let transport = HttpTransport::new(&ApiOptions {
            base_url: "https://api.tintuc.vn/api/".into(),
            ..ApiOptions::default()
        })
        .unwrap();
        assert_eq!(
            transport.url("/articles/filter"),
            "https://api.tintuc.vn/api/articles/filter"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        assert_eq!(resource_path(&["comments", "812"]), "comments/812");
        assert_eq!(
            resource_path(&["comments", "a/b?c", "replies"]),
            "comments/a%2Fb%3Fc/replies"
        );
        assert_eq!(resource_path(&["users", "50%#x"]), "users/50%25%23x");
        assert_eq!(resource_path(&["users", "lê văn"]), "users/l%C3%AA%20v%C4%83n");
    }

    #[test]
    fn method_renders_uppercase() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
