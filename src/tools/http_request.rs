//! HTTP request tool — the generic shape of the platform's thin API wrappers.
//! Lets the agent call external REST endpoints directly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};

use crate::error::{RankError, Result};
use crate::tools::{ParamSpec, Tool};

/// Tool that performs an HTTP request and returns `{status, body}`.
///
/// The body is parsed as JSON when possible so downstream normalization can
/// detect tabular payloads; otherwise it is returned as text, truncated to
/// `max_response_bytes`. Private and loopback hosts are always refused.
pub struct HttpRequestTool {
    client: Client,
    max_response_bytes: usize,
}

impl HttpRequestTool {
    /// Create a new `HttpRequestTool` with a per-request timeout in seconds
    /// and a response size cap.
    pub fn new(timeout_secs: u64, max_response_bytes: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            max_response_bytes,
        }
    }

    /// Validate the URL: must be http(s) without whitespace, and must not
    /// point at a private or loopback host.
    pub fn validate_url(raw_url: &str) -> Result<Url> {
        let url = raw_url.trim();
        if url.is_empty() {
            return Err(RankError::Tool("URL cannot be empty".into()));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(RankError::Tool("URL cannot contain whitespace".into()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RankError::Tool(
                "Only http:// and https:// URLs are allowed".into(),
            ));
        }
        let parsed = Url::parse(url).map_err(|e| RankError::Tool(format!("Invalid URL: {e}")))?;
        let host = parsed.host_str().unwrap_or("").to_lowercase();
        if is_private_host(&host) {
            return Err(RankError::Tool(format!(
                "Blocked private/local host: {host}"
            )));
        }
        Ok(parsed)
    }

    /// Strip headers that could be used for host spoofing or credential theft.
    pub fn strip_dangerous_headers(headers: Vec<(String, String)>) -> Vec<(String, String)> {
        let blocked = ["authorization", "host", "cookie", "set-cookie"];
        headers
            .into_iter()
            .filter(|(k, _)| !blocked.contains(&k.to_lowercase().as_str()))
            .collect()
    }
}

/// Reject loopback, link-local, and RFC 1918 private ranges by host string.
fn is_private_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host == "localhost" || host == "::1" || host == "0.0.0.0" {
        return true;
    }
    if host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("169.254.")
    {
        return true;
    }
    // 172.16.0.0/12
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some(second) = rest.split('.').next() {
            if let Ok(octet) = second.parse::<u8>() {
                return (16..=31).contains(&octet);
            }
        }
    }
    false
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to an external API and return the status and body. \
         Supports GET, POST, PUT, PATCH, DELETE."
    }

    fn input_schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "url",
                "string",
                "Full URL including scheme, e.g. https://api.example.com/v1/keywords",
            ),
            ParamSpec::required(
                "method",
                "string",
                "HTTP method: GET, POST, PUT, PATCH or DELETE",
            ),
            ParamSpec::optional(
                "headers",
                "object",
                "Optional HTTP headers (Authorization, Host, Cookie are stripped)",
            ),
            ParamSpec::optional("body", "string", "Optional request body (for POST/PUT/PATCH)"),
        ]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url_str = args["url"].as_str().unwrap_or("").to_string();
        let method_str = args["method"]
            .as_str()
            .ok_or_else(|| RankError::Tool("Missing required parameter: method".into()))?
            .to_uppercase();

        let parsed = Self::validate_url(&url_str)?;
        let method = Method::from_bytes(method_str.as_bytes())
            .map_err(|_| RankError::Tool(format!("Unknown HTTP method: {method_str}")))?;

        let mut req = self.client.request(method, parsed.as_str());

        if let Some(headers) = args["headers"].as_object() {
            let pairs: Vec<(String, String)> = headers
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            for (k, v) in Self::strip_dangerous_headers(pairs) {
                req = req.header(&k, &v);
            }
        }

        if let Some(body) = args["body"].as_str() {
            // Set Content-Type for JSON-looking bodies unless the caller did,
            // otherwise servers tend to reject the untyped payload.
            let caller_set_ct = args["headers"]
                .as_object()
                .map(|h| h.keys().any(|k| k.to_lowercase() == "content-type"))
                .unwrap_or(false);
            let trimmed = body.trim_start();
            if !caller_set_ct && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
                req = req.header("Content-Type", "application/json");
            }
            req = req.body(body.to_string());
        }

        let response = req
            .send()
            .await
            .map_err(|e| RankError::Tool(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();
        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| RankError::Tool(format!("Failed to read response body: {e}")))?;

        let body_text = if body_bytes.len() > self.max_response_bytes {
            let truncated = &body_bytes[..self.max_response_bytes];
            format!(
                "{}\n[TRUNCATED - {} bytes total]",
                String::from_utf8_lossy(truncated),
                body_bytes.len()
            )
        } else {
            String::from_utf8_lossy(&body_bytes).into_owned()
        };

        let body_value =
            serde_json::from_str::<Value>(&body_text).unwrap_or(Value::String(body_text));

        Ok(json!({"status": status, "body": body_value}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_rejects_empty() {
        assert!(HttpRequestTool::validate_url("").is_err());
    }

    #[test]
    fn test_validate_url_rejects_non_http() {
        assert!(HttpRequestTool::validate_url("ftp://api.example.com/data").is_err());
    }

    #[test]
    fn test_validate_url_rejects_whitespace() {
        assert!(HttpRequestTool::validate_url("https://api.example.com /v1").is_err());
    }

    #[test]
    fn test_validate_url_rejects_private_hosts() {
        for url in [
            "https://localhost/api",
            "https://127.0.0.1/api",
            "https://10.0.0.1/data",
            "https://192.168.1.1/admin",
            "https://169.254.169.254/latest/meta-data",
            "https://172.16.0.1/internal",
            "https://172.31.255.255/internal",
            "http://[::1]/api",
        ] {
            assert!(HttpRequestTool::validate_url(url).is_err(), "{url}");
        }
    }

    #[test]
    fn test_validate_url_accepts_public_hosts() {
        assert!(HttpRequestTool::validate_url("https://api.example.com/v1/users").is_ok());
        // 172.32.x.x is outside the private /12
        assert!(HttpRequestTool::validate_url("https://172.32.0.1/v1").is_ok());
    }

    #[test]
    fn test_strip_dangerous_headers() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer steal-me".to_string()),
            ("Host".to_string(), "evil.com".to_string()),
            ("Cookie".to_string(), "session=1".to_string()),
            ("X-Custom".to_string(), "ok".to_string()),
        ];
        let stripped = HttpRequestTool::strip_dangerous_headers(headers);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped[0].0, "X-Custom");
    }

    #[test]
    fn test_input_schema_shape() {
        let tool = HttpRequestTool::new(30, 1024);
        let schema = tool.input_schema();
        assert_eq!(schema.len(), 4);
        assert!(schema[0].required);
        assert_eq!(schema[0].name, "url");
        assert!(!schema[2].required);
    }

    #[tokio::test]
    async fn test_execute_missing_method_errors() {
        let tool = HttpRequestTool::new(30, 1024);
        let result = tool
            .execute(serde_json::json!({"url": "https://api.example.com"}))
            .await;
        assert!(result.is_err());
    }
}
