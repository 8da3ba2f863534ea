use std::env;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CompletionBackend, CompletionError, CompletionRequest};
use crate::config::Config;

const PROVIDER_NAME: &str = "openai";

/// Chat-completion client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OpenAiClient {
    /// Reads the credential from the environment variable named in the config.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        let api_key = match env::var(&config.api_key_env) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => return Err(CompletionError::MissingCredential(config.api_key_env.clone())),
        };

        Self::new(
            &config.endpoint,
            api_key,
            Duration::from_secs(config.request_timeout_secs.max(5)),
        )
    }

    pub fn new(
        endpoint: &str,
        api_key: String,
        request_timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            CompletionError::Configuration(format!("invalid endpoint {}: {}", endpoint, err))
        })?;

        let client = Client::builder()
            .user_agent("aihelper-rs/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                CompletionError::Configuration(format!("failed to build HTTP client: {}", err))
            })?;

        info!(
            "✅ Completion client ready (endpoint: {}, timeout: {:?})",
            endpoint, request_timeout
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            request_timeout,
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if tracing::level_enabled!(tracing::Level::DEBUG) {
            if let Ok(payload) = serde_json::to_string(request) {
                debug!(payload = payload.as_str(), "Sending completion request");
            }
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| CompletionError::http(self.endpoint.as_str(), err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .json::<ApiErrorResponse>()
                .await
                .unwrap_or_default();
            let message = body
                .error
                .and_then(|err| err.message)
                .unwrap_or_else(|| format!("completion failed with status {status}"));
            warn!("{} returned {}: {}", PROVIDER_NAME, status, truncate(&message));
            return Err(CompletionError::status(status, truncate(&message)));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| CompletionError::response(err.to_string()))?;

        extract_first_message(payload)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        info!(
            provider = PROVIDER_NAME,
            model = request.model.as_str(),
            temperature = request.temperature,
            "🧠 Requesting completion ({} prompt chars)",
            request.prompt().chars().count()
        );

        let text = self.send_once(&request).await?;
        debug!("Completion arrived ({} chars)", text.chars().count());
        Ok(text)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// `choices[0].message.content`, or an error when it is absent.
pub fn extract_first_message(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(CompletionError::NoChoices)?;
    choice.message.content.ok_or(CompletionError::EmptyContent)
}

#[derive(Debug, Deserialize, Default)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiErrorDetail {
    message: Option<String>,
}

fn truncate(input: &str) -> String {
    const MAX_CHARS: usize = 512;
    if input.chars().count() <= MAX_CHARS {
        input.to_string()
    } else {
        let head: String = input.chars().take(MAX_CHARS).collect();
        format!("{}…", head)
    }
}


#[cfg(test)]
mod transport_tests {
    use super::*;
    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one request on a loopback port with `status` and `body`.
    /// The handle yields the raw request as received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().expect("addr"));

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.ok();
            request
        });

        (endpoint, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client(endpoint: &str) -> OpenAiClient {
        OpenAiClient::new(endpoint, "test-key".to_string(), Duration::from_secs(5)).expect("client")
    }

    fn request() -> CompletionRequest {
        CompletionRequest::single("gpt-test", 0.0, "Say hello", None)
    }

    #[tokio::test]
    async fn successful_response_returns_first_choice() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello, world."}}]}"#,
        )
        .await;

        let text = client(&endpoint).complete(request()).await.expect("completion");
        assert_eq!(text, "Hello, world.");

        let received = server.await.expect("server task");
        let lowered = received.to_ascii_lowercase();
        assert!(lowered.starts_with("post /v1/chat/completions "));
        assert!(lowered.contains("authorization: bearer test-key"));
        assert!(received.contains(r#""model":"gpt-test""#));
        assert!(received.contains("Say hello"));
    }

    #[tokio::test]
    async fn error_status_carries_api_message() {
        let (endpoint, server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":{"message":"boom"}}"#,
        )
        .await;

        let err = client(&endpoint)
            .complete(request())
            .await
            .expect_err("status error");
        match err {
            CompletionError::HttpStatus { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let received = server.await.expect("server task");
        assert!(received
            .to_ascii_lowercase()
            .contains("authorization: bearer test-key"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let err = client(&format!("http://{addr}/v1/chat/completions"))
            .complete(request())
            .await
            .expect_err("connection refused");
        assert!(matches!(err, CompletionError::Http { .. }));
    }
}
