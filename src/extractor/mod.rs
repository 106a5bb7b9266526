pub mod html;
pub mod pdf;

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use std::time::Duration;

use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;

pub use html::HtmlTextExtractor;
pub use pdf::{DocumentIntelligence, extract_pdf_text};

const SERVICE: &str = "content source";

/// Turns a document URL into plain text for analysis.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fetch an HTML page and return its visible text (`""` when it has none).
    async fn scrape(&self, url: &str) -> Result<String>;

    /// Fetch a PDF and return its text, pages in source order.
    async fn read_pdf(&self, url: &str) -> Result<String>;
}

/// Fetches documents over HTTP and extracts their text.
pub struct WebExtractor {
    http: Client,
    retry: RetryPolicy,
    document_intelligence: Option<DocumentIntelligence>,
}

impl WebExtractor {
    pub fn new(
        timeout: Duration,
        retry: RetryPolicy,
        document_intelligence: Option<DocumentIntelligence>,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; diligence/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build fetch HTTP client: {e}")))?;
        Ok(Self {
            http,
            retry,
            document_intelligence,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let retry = RetryPolicy::from_settings(&settings.upstream);
        let document_intelligence = settings
            .document_intelligence
            .as_ref()
            .map(|di| DocumentIntelligence::new(di, settings.upstream.timeout, retry))
            .transpose()?;
        Self::new(settings.upstream.timeout, retry, document_intelligence)
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::from_transport(SERVICE, e))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upstream {
                service: SERVICE,
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let response = self.get(url).await?;
        let mime = content_type(&response);
        if !is_textual(mime.as_deref()) {
            return Err(PipelineError::UnsupportedContent(format!(
                "{url} is {}, not an HTML page",
                mime.unwrap_or_default()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PipelineError::from_transport(SERVICE, e))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::from_transport(SERVICE, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentExtractor for WebExtractor {
    async fn scrape(&self, url: &str) -> Result<String> {
        let url = parse_url(url)?;
        let html = self.retry.run(SERVICE, || self.fetch_page(&url)).await?;
        let text = HtmlTextExtractor::extract(&html)?;
        tracing::info!(%url, chars = text.len(), "page scraped");
        Ok(text)
    }

    async fn read_pdf(&self, url: &str) -> Result<String> {
        let url = parse_url(url)?;
        let bytes = self.retry.run(SERVICE, || self.fetch_bytes(&url)).await?;
        if !pdf::is_pdf(&bytes) {
            return Err(PipelineError::UnsupportedContent(format!(
                "{url} did not return a PDF document"
            )));
        }

        let text = match &self.document_intelligence {
            Some(di) => di.read(&bytes).await?,
            None => tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                .await
                .map_err(|e| PipelineError::Extraction(format!("pdf extraction task failed: {e}")))??,
        };
        tracing::info!(
            %url,
            chars = text.len(),
            layout = self.document_intelligence.is_some(),
            "pdf read"
        );
        Ok(text)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| PipelineError::invalid_input(format!("invalid url {raw:?}: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PipelineError::invalid_input(format!(
            "unsupported url scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
}

/// Pages without a declared type are given the benefit of the doubt.
fn is_textual(mime: Option<&str>) -> bool {
    match mime {
        None | Some("") => true,
        Some(m) => matches!(m, "text/html" | "application/xhtml+xml" | "text/plain"),
    }
}
