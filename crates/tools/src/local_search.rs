//! Local retriever search.
//!
//! POSTs `{"queries": [query], "topk": k, "return_scores": true}` to a
//! retriever service and formats the passages it returns. Every failure
//! is reported in the output string so the model can react to it.

use std::time::Duration;

use agentrl_core::{Error, Tool, ToolError};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

const MIN_TOPK: i64 = 1;
const MAX_TOPK: i64 = 10;
const DEFAULT_TOPK: i64 = 3;

pub struct LocalSearchTool {
    retriever_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl LocalSearchTool {
    pub fn new(retriever_url: impl Into<String>, timeout: Duration) -> agentrl_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            retriever_url: retriever_url.into(),
            timeout,
            client,
        })
    }

    async fn search(&self, query: &str, topk: i64) -> String {
        let payload = json!({"queries": [query], "topk": topk, "return_scores": true});
        debug!(url = %self.retriever_url, topk, "Querying retriever");

        let response = match self.client.post(&self.retriever_url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return self.timeout_message(),
            Err(e) => {
                warn!(error = %e, "Retriever request failed");
                return format!("Request failed: {e}");
            }
        };

        let status = response.status();
        if !status.is_success() {
            return format!("Request failed with HTTP {}.", status.as_u16());
        }

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) if e.is_timeout() => return self.timeout_message(),
            Err(e) => return format!("Request failed: {e}"),
        };

        // One query in, so the passages are `result[0]`.
        let Some(results) = data.get("result").and_then(Value::as_array).filter(|r| !r.is_empty()) else {
            return "No results returned by retriever.".into();
        };
        let Some(passages) = results[0].as_array() else {
            return "Unexpected retriever response format: `result[0]` is not a list.".into();
        };

        let formatted = format_passages(passages);
        if formatted.is_empty() {
            "No passages found.".into()
        } else {
            formatted
        }
    }

    fn timeout_message(&self) -> String {
        format!("Request timed out after {:.1}s.", self.timeout.as_secs_f64())
    }
}

fn parse_topk(value: Option<&Value>) -> i64 {
    let topk = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    topk.unwrap_or(DEFAULT_TOPK).clamp(MIN_TOPK, MAX_TOPK)
}

/// `Doc i — title` headers followed by the passage body.
fn format_passages(passages: &[Value]) -> String {
    let blocks: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| {
            let content = passage
                .pointer("/document/contents")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim();
            let mut header = format!("Doc {}", i + 1);
            if content.is_empty() {
                return header;
            }

            let mut lines = content.lines();
            let title = lines.next().unwrap_or_default().trim();
            let body = lines.collect::<Vec<_>>().join("\n");
            let body = body.trim();

            if !title.is_empty() {
                header.push_str(" — ");
                header.push_str(title);
            }
            if body.is_empty() {
                header
            } else {
                format!("{header}\n{body}")
            }
        })
        .collect();
    blocks.join("\n\n").trim().to_string()
}

#[async_trait]
impl Tool for LocalSearchTool {
    fn name(&self) -> &str {
        "local_search"
    }

    fn description(&self) -> &str {
        "Search a local retriever and return up to `topk` formatted passages."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query."},
                "topk": {
                    "type": "integer",
                    "description": "Maximum number of passages to return.",
                    "minimum": MIN_TOPK,
                    "maximum": MAX_TOPK,
                    "default": DEFAULT_TOPK
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let query = match arguments.get("query") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        if query.is_empty() {
            return Ok("Missing required argument: `query`.".into());
        }
        let topk = parse_topk(arguments.get("topk"));
        Ok(self.search(&query, topk).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    /// Serve `router` on an ephemeral port and return the retrieve URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/retrieve")
    }

    /// A retriever that returns `topk` numbered documents.
    fn retriever() -> Router {
        Router::new().route(
            "/retrieve",
            post(|Json(body): Json<Value>| async move {
                let topk = body["topk"].as_u64().unwrap_or(0);
                let query = body["queries"][0].as_str().unwrap_or_default().to_string();
                let docs: Vec<Value> = (1..=topk)
                    .map(|i| json!({"document": {"contents": format!("Title {i}\n{query} body {i}")}, "score": 0.5}))
                    .collect();
                Json(json!({"result": [docs]}))
            }),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn topk_is_clamped() {
        assert_eq!(parse_topk(None), 3);
        assert_eq!(parse_topk(Some(&json!(0))), 1);
        assert_eq!(parse_topk(Some(&json!(50))), 10);
        assert_eq!(parse_topk(Some(&json!("4"))), 4);
        assert_eq!(parse_topk(Some(&json!(2.9))), 2);
        assert_eq!(parse_topk(Some(&json!("many"))), 3);
    }

    #[test]
    fn formats_passages() {
        let passages = vec![
            json!({"document": {"contents": "Rust\nA systems language.\nFast."}}),
            json!({"document": {"contents": ""}}),
            json!({"document": {"contents": "Only a title"}}),
        ];
        assert_eq!(
            format_passages(&passages),
            "Doc 1 — Rust\nA systems language.\nFast.\n\nDoc 2\n\nDoc 3 — Only a title"
        );
    }

    #[tokio::test]
    async fn searches_retriever() {
        let url = serve(retriever()).await;
        let tool = LocalSearchTool::new(url, Duration::from_secs(5)).unwrap();
        let output = tool.invoke(&args(json!({"query": "ferris", "topk": 2}))).await.unwrap();
        assert_eq!(output, "Doc 1 — Title 1\nferris body 1\n\nDoc 2 — Title 2\nferris body 2");
    }

    #[tokio::test]
    async fn missing_query_is_reported() {
        let tool = LocalSearchTool::new("http://127.0.0.1:9/retrieve", Duration::from_secs(1)).unwrap();
        let output = tool.invoke(&args(json!({"topk": 2}))).await.unwrap();
        assert_eq!(output, "Missing required argument: `query`.");
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let router = Router::new().route("/retrieve", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let tool = LocalSearchTool::new(serve(router).await, Duration::from_secs(5)).unwrap();
        let output = tool.invoke(&args(json!({"query": "x"}))).await.unwrap();
        assert_eq!(output, "Request failed with HTTP 500.");
    }

    #[tokio::test]
    async fn empty_results_are_reported() {
        let router = Router::new().route("/retrieve", post(|| async { Json(json!({"result": []})) }));
        let tool = LocalSearchTool::new(serve(router).await, Duration::from_secs(5)).unwrap();
        let output = tool.invoke(&args(json!({"query": "x"}))).await.unwrap();
        assert_eq!(output, "No results returned by retriever.");
    }

    #[tokio::test]
    async fn slow_retriever_times_out() {
        let router = Router::new().route(
            "/retrieve",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"result": [[]]}))
            }),
        );
        let tool = LocalSearchTool::new(serve(router).await, Duration::from_millis(200)).unwrap();
        let output = tool.invoke(&args(json!({"query": "x"}))).await.unwrap();
        assert_eq!(output, "Request timed out after 0.2s.");
    }
}
