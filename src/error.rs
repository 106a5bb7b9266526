use thiserror::Error;

/// Errors produced anywhere in the search → extraction → analysis pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required record field is missing or blank.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The provider answered, but with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Transport failure, timeout, or retries exhausted.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    #[error("unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The provider payload did not have the expected shape.
    #[error("malformed response from {service}: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },

    #[error("record has no content to analyze")]
    EmptyContent,

    #[error("tone analysis returned an empty summary")]
    EmptySummary,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn malformed(service: &'static str, msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service,
            message: msg.into(),
        }
    }

    pub fn unavailable(service: &'static str, msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: msg.into(),
        }
    }

    /// Stable identifier reported alongside the message at the HTTP boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
            Self::Upstream { .. } => "upstream",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UnsupportedContent(_) => "unsupported_content",
            Self::Extraction(_) => "extraction",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::EmptyContent => "empty_content",
            Self::EmptySummary => "empty_summary",
        }
    }

    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { .. } => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Classify a `reqwest` transport error for the given service.
    pub fn from_transport(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::malformed(service, err.to_string());
        }
        Self::unavailable(service, err.to_string())
    }
}
