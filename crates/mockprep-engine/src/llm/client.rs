use super::models::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse};
use crate::text::truncate_str;
use mockprep_adapters::config::Config;
use mockprep_core::{CompletionFuture, CompletionProvider, ProviderError, ProviderErrorKind};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum length for error content in error messages
const MAX_ERROR_CONTENT_LEN: usize = 200;

pub(crate) const INITIAL_BACKOFF_MS: u64 = 2000;
pub(crate) const BACKOFF_MULTIPLIER: u64 = 2;

/// Sanitize API response content for error messages to prevent credential leakage.
fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "api key",
        "x-goog-api-key",
        "secret",
        "password",
        "credential",
        "bearer",
        "aiza", // Google API key prefix
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return "(response details redacted - may contain sensitive data)".to_string();
    }
    truncated.to_string()
}

/// Extract a retry hint from the error body. Gemini reports `"retryDelay": "13s"`.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    text_lower[pos..]
        .split_whitespace()
        .skip(1)
        .take(5)
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .ok()
        })
        .find(|secs| *secs > 0 && *secs < 300)
}

pub(crate) fn backoff_secs(retry_count: u32) -> u64 {
    let factor = BACKOFF_MULTIPLIER.saturating_pow(retry_count.saturating_sub(1));
    let secs = INITIAL_BACKOFF_MS.saturating_mul(factor) / 1000;
    secs.max(1)
}

fn map_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(
            ProviderErrorKind::Timeout,
            "Gemini request timed out. Please try again.",
        )
    } else if err.is_connect() {
        ProviderError::new(
            ProviderErrorKind::Network,
            "Could not connect to Gemini. Check your network and try again.",
        )
    } else {
        // reqwest errors carry the URL, never the header-borne key.
        ProviderError::new(
            ProviderErrorKind::Network,
            format!("Gemini request failed: {}", err.without_url()),
        )
    }
}

/// Map a final non-success status to a typed error.
fn classify_status(status: StatusCode, body: &str, retries: u32) -> ProviderError {
    let api_error = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|env| env.error);
    let key_rejected = api_error
        .as_ref()
        .map(|e| e.message.contains("API key") || e.status.as_deref() == Some("PERMISSION_DENIED"))
        .unwrap_or(false)
        || body.contains("API_KEY_INVALID");

    match status.as_u16() {
        401 | 403 => ProviderError::new(
            ProviderErrorKind::Auth,
            "Gemini rejected the API key. Run 'mockprep setup' to update it.",
        ),
        400 if key_rejected => ProviderError::new(
            ProviderErrorKind::Auth,
            "Gemini rejected the API key. Run 'mockprep setup' to update it.",
        ),
        429 => ProviderError::new(
            ProviderErrorKind::RateLimited,
            format!(
                "Rate limited by Gemini after {} retries. Try again in a few minutes.",
                retries
            ),
        ),
        500..=599 => ProviderError::new(
            ProviderErrorKind::Server,
            format!(
                "Gemini server error ({}). The service may be temporarily unavailable.",
                status
            ),
        ),
        _ => {
            let detail = api_error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| body.to_string());
            ProviderError::new(
                ProviderErrorKind::InvalidResponse,
                format!("API error {}: {}", status, sanitize_api_response(&detail)),
            )
        }
    }
}

/// Pull the completion text out of a successful `generateContent` body.
pub(crate) fn extract_response_text(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::new(
            ProviderErrorKind::InvalidResponse,
            format!("Gemini returned an unreadable response: {}", e),
        )
    })?;

    if let Some(usage) = &parsed.usage_metadata {
        debug!(
            prompt_tokens = usage.prompt_token_count,
            completion_tokens = usage.candidates_token_count,
            total_tokens = usage.total_token_count,
            "Gemini usage"
        );
    }

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(ProviderError::new(
            ProviderErrorKind::Refused,
            format!("Gemini blocked the prompt ({})", reason),
        ));
    }

    let Some(candidate) = parsed.candidates.first() else {
        return Err(ProviderError::new(
            ProviderErrorKind::EmptyResponse,
            "Gemini returned no candidates",
        ));
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if !text.trim().is_empty() {
        return Ok(text);
    }
    match candidate.finish_reason.as_deref() {
        Some("SAFETY") => Err(ProviderError::new(
            ProviderErrorKind::Refused,
            "Gemini withheld the response for safety reasons",
        )),
        reason => Err(ProviderError::new(
            ProviderErrorKind::EmptyResponse,
            format!(
                "Gemini returned an empty response (finish reason: {})",
                reason.unwrap_or("unknown")
            ),
        )),
    }
}

/// Create a configured HTTP client for Gemini requests
pub(crate) fn create_http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Network,
                format!("Failed to create HTTP client: {}", e),
            )
        })
}

/// A failed round trip, with the server's retry hint when it sent one.
#[derive(Debug)]
struct AttemptFailure {
    error: ProviderError,
    retry_after: Option<u64>,
}

impl From<ProviderError> for AttemptFailure {
    fn from(error: ProviderError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Google Gemini completion provider.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: &Config, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(missing_key());
        }
        Ok(Self {
            http: create_http_client(config.request_timeout_secs)?,
            api_key,
            model: config.model.clone(),
            endpoint: endpoint_url(&config.api_base_url, &config.model),
            max_retries: config.max_retries,
        })
    }

    /// Build from config, resolving the key from the credentials store or env.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let api_key = config.api_key().ok_or_else(missing_key)?;
        Self::new(config, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST with automatic retry for every failure whose kind is retryable:
    /// transport errors, timeouts, 429 and 5xx.
    async fn send_with_retry(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GenerateContentRequest::from_prompt(prompt);
        let mut retry_count = 0;

        loop {
            let failure = match self.attempt(&body, retry_count).await {
                Ok(text) => return Ok(text),
                Err(failure) => failure,
            };
            if !failure.error.kind.is_retryable() || retry_count >= self.max_retries {
                return Err(failure.error);
            }
            retry_count += 1;
            let wait = failure
                .retry_after
                .unwrap_or_else(|| backoff_secs(retry_count));
            self.pause(retry_count, wait, failure.error.kind).await;
        }
    }

    /// One round trip. A non-success status is classified as if final.
    async fn attempt(
        &self,
        body: &GenerateContentRequest<'_>,
        retries: u32,
    ) -> Result<String, AttemptFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| AttemptFailure::from(map_request_error(err)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| AttemptFailure::from(map_request_error(err)))?;

        if status.is_success() {
            return Ok(text);
        }
        let retry_after = (status == StatusCode::TOO_MANY_REQUESTS)
            .then(|| parse_retry_after(&text))
            .flatten();
        Err(AttemptFailure {
            error: classify_status(status, &text, retries),
            retry_after,
        })
    }

    async fn pause(&self, attempt: u32, secs: u64, reason: ProviderErrorKind) {
        warn!(
            model = %self.model,
            attempt,
            max_retries = self.max_retries,
            wait_secs = secs,
            reason = ?reason,
            "Retrying Gemini request"
        );
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

impl CompletionProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            info!(model = %self.model, prompt_chars = prompt.len(), "Sending request to Gemini");
            let body = self.send_with_retry(prompt).await?;
            let text = extract_response_text(&body)?;
            debug!(response_chars = text.len(), "Gemini responded");
            Ok(text)
        })
    }
}

fn missing_key() -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::MissingApiKey,
        "No Gemini API key configured. Run 'mockprep setup' or set GEMINI_API_KEY.",
    )
}

fn endpoint_url(base: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base.trim_end_matches('/'),
        model
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const OK_BODY: &str =
        r#"{"candidates":[{"content":{"parts":[{"text":"[]"}]},"finishReason":"STOP"}]}"#;
    const RATE_LIMITED_BODY: &str =
        r#"{"error": {"code": 429, "message": "quota", "details": [{"retryDelay": "1s"}]}}"#;

    /// Local HTTP server replying with `(status, body)` pairs in order, one per
    /// connection. Returns the base URL and a count of requests answered.
    async fn serve(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for (status, body) in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), hits)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let head = String::from_utf8_lossy(&buf);
            let Some(head_end) = head.find("\r\n\r\n") else {
                continue;
            };
            let length = head[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                return;
            }
        }
    }

    fn client_for(base: &str, max_retries: u32) -> GeminiClient {
        GeminiClient {
            http: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            api_key: "test-key".to_string(),
            model: "gemini-test".to_string(),
            endpoint: endpoint_url(base, "gemini-test"),
            max_retries,
        }
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried_until_success() {
        let (base, hits) = serve(vec![(429, RATE_LIMITED_BODY), (200, OK_BODY)]).await;
        let client = client_for(&base, 2);
        assert_eq!(client.generate("hi").await.unwrap(), "[]");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let (base, hits) = serve(vec![(401, "{}"), (200, OK_BODY)]).await;
        let client = client_for(&base, 3);
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_when_retries_exhausted() {
        let (base, hits) = serve(vec![(503, "")]).await;
        let client = client_for(&base, 0);
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Server);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_network() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(&format!("http://{}", addr), 0);
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Network);
        assert!(err.kind.is_retryable());
    }

    #[test]
    fn test_classified_statuses_drive_retry_decision() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            assert!(classify_status(status, "", 0).kind.is_retryable(), "{}", status);
        }
        for status in [StatusCode::UNAUTHORIZED, StatusCode::NOT_FOUND] {
            assert!(!classify_status(status, "", 0).kind.is_retryable(), "{}", status);
        }
    }

    #[test]
    fn test_backoff_doubles_from_two_seconds() {
        assert_eq!(backoff_secs(1), 2);
        assert_eq!(backoff_secs(2), 4);
        assert_eq!(backoff_secs(3), 8);
        assert_eq!(backoff_secs(0), 2);
        assert!(backoff_secs(200) > 0);
    }

    #[test]
    fn test_parse_retry_after_reads_gemini_retry_delay() {
        let body = r#"{"error": {"code": 429, "details": [{"retryDelay": "13s"}]}}"#;
        assert_eq!(parse_retry_after(body), Some(13));
        assert_eq!(parse_retry_after("Please retry after 30 seconds"), Some(30));
        assert_eq!(parse_retry_after("quota exhausted"), None);
        assert_eq!(parse_retry_after("retry after 9999 seconds"), None);
    }

    #[test]
    fn test_sanitize_redacts_key_like_content() {
        assert_eq!(
            sanitize_api_response("bad key AIzaSyExample"),
            "(response details redacted - may contain sensitive data)"
        );
        assert_eq!(sanitize_api_response("model not found"), "model not found");
        assert_eq!(
            sanitize_api_response(&"x".repeat(500)).chars().count(),
            MAX_ERROR_CONTENT_LEN
        );
    }

    #[test]
    fn test_classify_status_kinds() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, "", 0).kind,
            ProviderErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, "", 0).kind,
            ProviderErrorKind::Auth
        );
        let invalid_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, invalid_key, 0).kind,
            ProviderErrorKind::Auth
        );
        let rate = classify_status(StatusCode::TOO_MANY_REQUESTS, "", 3);
        assert_eq!(rate.kind, ProviderErrorKind::RateLimited);
        assert!(rate.message.contains("3 retries"));
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, "", 3).kind,
            ProviderErrorKind::Server
        );
    }

    #[test]
    fn test_classify_status_surfaces_api_message() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-x is not found","status":"NOT_FOUND"}}"#;
        let err = classify_status(StatusCode::NOT_FOUND, body, 0);
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
        assert!(err.message.contains("models/gemini-x is not found"));
    }

    #[test]
    fn test_extract_response_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"id\": 1"},{"text":"}]"}]},"finishReason":"STOP"}],
                      "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":7,"totalTokenCount":12}}"#;
        assert_eq!(extract_response_text(body).unwrap(), "[{\"id\": 1}]");
    }

    #[test]
    fn test_extract_response_text_blocked_prompt_is_refused() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(
            extract_response_text(body).unwrap_err().kind,
            ProviderErrorKind::Refused
        );
    }

    #[test]
    fn test_extract_response_text_safety_finish_is_refused() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert_eq!(
            extract_response_text(body).unwrap_err().kind,
            ProviderErrorKind::Refused
        );
    }

    #[test]
    fn test_extract_response_text_empty_variants() {
        for body in [
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"MAX_TOKENS"}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#,
        ] {
            assert_eq!(
                extract_response_text(body).unwrap_err().kind,
                ProviderErrorKind::EmptyResponse,
                "body {}",
                body
            );
        }
    }

    #[test]
    fn test_extract_response_text_rejects_non_json() {
        assert_eq!(
            extract_response_text("<html>502</html>").unwrap_err().kind,
            ProviderErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_endpoint_url_joins_model() {
        assert_eq!(
            endpoint_url("https://generativelanguage.googleapis.com/v1beta/", "gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_new_rejects_blank_key() {
        let err = GeminiClient::new(&Config::default(), "  ").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MissingApiKey);
    }

    #[test]
    fn test_debug_output_hides_key() {
        let client = GeminiClient::new(&Config::default(), "AIza-secret-value").unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("AIza-secret-value"));
        assert!(rendered.contains("gemini-2.0-flash"));
        assert_eq!(client.name(), "gemini");
        assert_eq!(client.model(), "gemini-2.0-flash");
    }
}
