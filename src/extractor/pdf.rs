use lopdf::Document;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::DocumentIntelligenceSettings;
use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;

const SERVICE: &str = "document intelligence";

/// Whether `bytes` look like a PDF file. Some servers prepend junk, so the
/// header may appear anywhere in the first kilobyte.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Local text extraction, page by page in page-number order.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PipelineError::Extraction(format!("unreadable pdf: {e}")))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    let mut failures = 0usize;
    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "skipping unreadable pdf page");
                failures += 1;
            }
        }
    }
    if !pages.is_empty() && failures == pages.len() {
        return Err(PipelineError::Extraction(
            "no page of the pdf could be decoded".to_string(),
        ));
    }
    Ok(join_pages(texts))
}

/// Concatenate page texts in order, one page after another.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Azure Document Intelligence `prebuilt-layout` client.
#[derive(Debug, Clone)]
pub struct DocumentIntelligence {
    http: Client,
    analyze_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
    retry: RetryPolicy,
}

impl DocumentIntelligence {
    pub fn new(
        settings: &DocumentIntelligenceSettings,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            PipelineError::config(format!("failed to build document intelligence HTTP client: {e}"))
        })?;
        Ok(Self {
            http,
            analyze_url: format!(
                "{}/formrecognizer/documentModels/prebuilt-layout:analyze?api-version={}",
                settings.endpoint.trim_end_matches('/'),
                settings.api_version
            ),
            api_key: settings.api_key.clone(),
            poll_interval: settings.poll_interval,
            max_polls: settings.max_polls,
            retry,
        })
    }

    /// Submit the document and wait for the layout analysis to finish.
    pub async fn read(&self, bytes: &[u8]) -> Result<String> {
        let operation = self.retry.run(SERVICE, || self.submit(bytes)).await?;
        tracing::debug!(%operation, "document analysis submitted");

        for _ in 0..self.max_polls {
            let state = self.retry.run(SERVICE, || self.poll(&operation)).await?;
            match state.status.as_str() {
                "succeeded" => {
                    let result = state.analyze_result.ok_or_else(|| {
                        PipelineError::malformed(SERVICE, "succeeded without analyzeResult")
                    })?;
                    return Ok(result.text());
                }
                "failed" => {
                    let detail = state
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "analysis failed".to_string());
                    return Err(PipelineError::Extraction(detail));
                }
                _ => sleep(self.poll_interval).await,
            }
        }
        Err(PipelineError::unavailable(
            SERVICE,
            format!("analysis not finished after {} polls", self.max_polls),
        ))
    }

    async fn submit(&self, bytes: &[u8]) -> Result<String> {
        let response = self
            .http
            .post(&self.analyze_url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes.to_vec())
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

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::malformed(SERVICE, "missing Operation-Location header"))
    }

    async fn poll(&self, operation: &str) -> Result<AnalyzeOperation> {
        let response = self
            .http
            .get(operation)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
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

        response
            .json()
            .await
            .map_err(|e| PipelineError::malformed(SERVICE, e.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedPage {
    page_number: u32,
    #[serde(default)]
    lines: Vec<AnalyzedLine>,
}

#[derive(Deserialize)]
struct AnalyzedLine {
    content: String,
}

impl AnalyzeResult {
    fn text(mut self) -> String {
        if self.pages.is_empty() {
            return self.content.trim().to_string();
        }
        self.pages.sort_by_key(|p| p.page_number);
        join_pages(self.pages.iter().map(|page| {
            page.lines
                .iter()
                .map(|l| l.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }
}
