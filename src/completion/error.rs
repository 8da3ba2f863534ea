use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("missing required environment variable: {0}")]
    MissingCredential(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP status {status} from completion API: {message}")]
    HttpStatus {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("unable to parse completion response: {0}")]
    ResponseParse(String),
    #[error("completion response contained no choices")]
    NoChoices,
    #[error("first completion choice had no message content")]
    EmptyContent,
}

impl CompletionError {
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn status(status: reqwest::StatusCode, message: String) -> Self {
        Self::HttpStatus { status, message }
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::ResponseParse(message.into())
    }
}
