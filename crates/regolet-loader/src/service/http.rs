//! HTTP layer: conditional GET and status mapping.
//!
//! This is the ONLY place for status code handling. service/mod.rs never
//! interprets status codes.

use reqwest::header::{AUTHORIZATION, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{LoadError, LoadResult};

/// Error bodies are cut to this many bytes before surfacing.
const MAX_ERROR_BODY: usize = 1024;

/// Outcome of a conditional fetch.
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    NotModified,
    Fetched(PolicyFetched),
}

#[derive(Debug)]
pub(crate) struct PolicyFetched {
    pub module: String,
    /// Validator from the `ETag` header; `None` when absent, may be empty.
    pub etag: Option<String>,
}

/// HTTP backend for the policy service (holds reqwest client and auth).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) bearer_token: Option<String>,
}

impl HttpBackend {
    /// Issue a GET for `url`, conditional on `etag` when one is known.
    pub(crate) async fn fetch_policy(
        &self,
        policy_name: &str,
        url: &str,
        etag: Option<&str>,
    ) -> LoadResult<FetchOutcome> {
        let mut request = self.client.get(url);

        if let Some(etag) = etag.filter(|e| !e.is_empty()) {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| LoadError::Unreachable {
            message: format!("failed to download policy {}: {}", policy_name, e),
        })?;
        let status = response.status();

        match status {
            StatusCode::NOT_MODIFIED => {
                debug!(policy = %policy_name, "policy not modified (304)");
                Ok(FetchOutcome::NotModified)
            }
            StatusCode::NOT_FOUND => Err(LoadError::NotFound {
                name: policy_name.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = error_body(response).await;
                Err(LoadError::Unauthorized {
                    message: format!("policy download failed: {} {}", status, body),
                })
            }
            s if s.is_success() => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);

                let bytes = response.bytes().await.map_err(|e| LoadError::Unreachable {
                    message: format!("failed to read policy body: {}", e),
                })?;
                let module = String::from_utf8(bytes.to_vec()).map_err(|e| LoadError::Corrupt {
                    message: format!("policy {} is not valid UTF-8: {}", policy_name, e),
                })?;

                Ok(FetchOutcome::Fetched(PolicyFetched { module, etag }))
            }
            _ => {
                let body = error_body(response).await;
                Err(LoadError::Unreachable {
                    message: format!("policy download failed: {} {}", status, body),
                })
            }
        }
    }
}

/// Reads at most `MAX_ERROR_BODY` bytes of an error response.
async fn error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::with_capacity(MAX_ERROR_BODY);
    while let Ok(Some(chunk)) = response.chunk().await {
        if push_limited(&mut body, &chunk) {
            break;
        }
    }
    String::from_utf8_lossy(&body).trim().to_string()
}

/// Appends up to the remaining budget; returns true once the buffer is full.
fn push_limited(body: &mut Vec<u8>, chunk: &[u8]) -> bool {
    let take = MAX_ERROR_BODY.saturating_sub(body.len()).min(chunk.len());
    body.extend_from_slice(&chunk[..take]);
    body.len() >= MAX_ERROR_BODY
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend(token: Option<&str>) -> HttpBackend {
        HttpBackend {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
            bearer_token: token.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_conditional_and_auth_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/policies/auth/user.rego"))
            .and(header("if-none-match", "\"v1\""))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/policies/auth/user.rego", mock_server.uri());
        let outcome = backend(Some("test-token"))
            .fetch_policy("auth.user", &url, Some("\"v1\""))
            .await
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::NotModified));
    }

    #[tokio::test]
    async fn test_fetch_captures_etag() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/policies/example.rego"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("package example")
                    .insert_header("etag", "v1"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/policies/example.rego", mock_server.uri());
        let outcome = backend(None)
            .fetch_policy("example", &url, None)
            .await
            .unwrap();

        match outcome {
            FetchOutcome::Fetched(f) => {
                assert_eq!(f.module, "package example");
                assert_eq!(f.etag.as_deref(), Some("v1"));
            }
            other => panic!("expected Fetched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_status_mapping() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.rego"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private.rego"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.rego"))
            .respond_with(ResponseTemplate::new(500).set_body_string("  boom\n"))
            .mount(&mock_server)
            .await;

        let b = backend(None);
        let base = mock_server.uri();

        let err = b
            .fetch_policy("missing", &format!("{}/missing.rego", base), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { name } if name == "missing"));

        let err = b
            .fetch_policy("private", &format!("{}/private.rego", base), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Unauthorized { .. }));

        let err = b
            .fetch_policy("broken", &format!("{}/broken.rego", base), None)
            .await
            .unwrap_err();
        match err {
            LoadError::Unreachable { message } => {
                assert!(message.contains("500"), "{}", message);
                assert!(message.ends_with("boom"), "{}", message);
            }
            other => panic!("expected Unreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_truncates_error_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(4096)))
            .mount(&mock_server)
            .await;

        let url = format!("{}/p.rego", mock_server.uri());
        let err = backend(None)
            .fetch_policy("p", &url, None)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.len() < 4096);
        assert!(message.ends_with(&"x".repeat(MAX_ERROR_BODY)));
    }

    #[test]
    fn test_push_limited_stops_at_budget() {
        let mut body = Vec::new();
        assert!(!push_limited(&mut body, &[b'a'; 600]));
        assert!(push_limited(&mut body, &[b'b'; 600]));
        assert_eq!(body.len(), MAX_ERROR_BODY);
        assert_eq!(body[MAX_ERROR_BODY - 1], b'b');

        assert!(push_limited(&mut body, b"ignored"));
        assert_eq!(body.len(), MAX_ERROR_BODY);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_utf8_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
            .mount(&mock_server)
            .await;

        let url = format!("{}/p.rego", mock_server.uri());
        let err = backend(None)
            .fetch_policy("p", &url, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let err = backend(None)
            .fetch_policy("p", "http://127.0.0.1:1/p.rego", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Unreachable { .. }));
    }
}
