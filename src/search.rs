use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SearchSettings;
use crate::data_models::SearchResult;
use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;

const SERVICE: &str = "scrapingbee";

/// Parameters of one web search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub language: Option<String>,
    pub country_code: Option<String>,
    /// Carried for the risk pass; not used to filter results.
    pub commercial_activity: Option<String>,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
}

/// ScrapingBee Google search API client.
#[derive(Debug, Clone)]
pub struct ScrapingBeeSearch {
    http: Client,
    url: String,
    settings: SearchSettings,
    retry: RetryPolicy,
}

impl ScrapingBeeSearch {
    pub fn new(settings: &SearchSettings, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build search HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}/api/v1/store/google", settings.base_url.trim_end_matches('/')),
            settings: settings.clone(),
            retry,
        })
    }

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.settings.api_key.clone()),
            ("search", query.query.trim().to_string()),
            (
                "language",
                query
                    .language
                    .clone()
                    .unwrap_or_else(|| self.settings.language.clone()),
            ),
            (
                "country_code",
                query
                    .country_code
                    .clone()
                    .unwrap_or_else(|| self.settings.country_code.clone()),
            ),
        ];
        if let Some(nb) = self.settings.nb_results {
            params.push(("nb_results", nb.to_string()));
        }
        if let Some(nfpr) = &self.settings.nfpr {
            params.push(("nfpr", nfpr.clone()));
        }
        params
    }

    async fn fetch(&self, params: &[(&'static str, String)]) -> Result<GoogleResponse> {
        let response = self
            .http
            .get(&self.url)
            .query(params)
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

#[async_trait]
impl SearchClient for ScrapingBeeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if query.query.trim().is_empty() {
            return Err(PipelineError::invalid_input("search query cannot be empty"));
        }
        if self.settings.api_key.is_empty() {
            return Err(PipelineError::config("SCRAPINGBEE_API_KEY is not set"));
        }

        let params = self.params(query);
        let response = self.retry.run(SERVICE, || self.fetch(&params)).await?;
        let results = response.organic_results.unwrap_or_default();
        tracing::info!(query = %query.query, results = results.len(), "search completed");
        Ok(results)
    }
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    organic_results: Option<Vec<SearchResult>>,
}
