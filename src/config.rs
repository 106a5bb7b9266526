use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Process-wide configuration. Built once at startup and handed to each
/// collaborator by reference; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub search: SearchSettings,
    pub openai: AzureOpenAiSettings,
    /// Second region, used only when the primary is unavailable.
    pub openai_fallback: Option<AzureOpenAiSettings>,
    pub chat: ChatSettings,
    pub document_intelligence: Option<DocumentIntelligenceSettings>,
    pub api: ApiSettings,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub api_key: String,
    pub base_url: String,
    pub nb_results: Option<u32>,
    pub language: String,
    pub country_code: String,
    pub nfpr: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AzureOpenAiSettings {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub deployment: String,
}

/// Sampling parameters shared by both analysis passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub temperature: f32,
    pub completion_choices: u32,
    pub presence_penalty: f32,
    pub top_p: f32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            completion_choices: 1,
            presence_penalty: 2.0,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentIntelligenceSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    /// Empty disables the `x-api-key` guard.
    pub api_key: String,
    pub origins: Vec<String>,
    pub bind_addr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl Settings {
    /// Load settings from an optional env file, then the process environment.
    /// Process variables win over file entries.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let mut vars = HashMap::new();
        let path = env_file.unwrap_or_else(|| Path::new(".env"));
        match dotenvy::from_path_iter(path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|e| {
                        PipelineError::config(format!("invalid entry in {}: {e}", path.display()))
                    })?;
                    vars.insert(key, value);
                }
            }
            // A missing default .env is fine; an explicitly requested file is not.
            Err(e) if env_file.is_some() => {
                return Err(PipelineError::config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
            Err(_) => {}
        }
        vars.extend(std::env::vars());
        Self::from_map(&vars)
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let search = SearchSettings {
            api_key: get_or_default(vars, "SCRAPINGBEE_API_KEY", ""),
            base_url: get_or_default(vars, "SCRAPINGBEE_BASE_URL", "https://app.scrapingbee.com"),
            nb_results: parse_opt(vars, "SCRAPINGBEE_NB_RESULTS")?,
            language: get_or_default(vars, "SCRAPINGBEE_LANGUAGE", "es"),
            country_code: get_or_default(vars, "SCRAPINGBEE_COUNTRY_CODE", "co"),
            nfpr: get(vars, "SCRAPINGBEE_NFPR"),
        };

        let openai = AzureOpenAiSettings {
            api_key: require(vars, "AZURE_OPENAI_API_KEY")?,
            endpoint: require(vars, "AZURE_OPENAI_API_ENDPOINT")?,
            api_version: get_or_default(vars, "AZURE_OPENAI_API_VERSION", "2024-06-01"),
            deployment: require(vars, "AZURE_OPENAI_MODEL_1_DEPLOYMENT_NAME")?,
        };

        let openai_fallback = match (
            get(vars, "AZURE_OPENAI_API_KEY_1"),
            get(vars, "AZURE_OPENAI_API_ENDPOINT_1"),
        ) {
            (Some(api_key), Some(endpoint)) => Some(AzureOpenAiSettings {
                api_key,
                endpoint,
                api_version: get(vars, "AZURE_OPENAI_API_VERSION_1")
                    .unwrap_or_else(|| openai.api_version.clone()),
                deployment: get(vars, "AZURE_OPENAI_MODEL_1_DEPLOYMENT_NAME_1")
                    .unwrap_or_else(|| openai.deployment.clone()),
            }),
            _ => None,
        };

        let defaults = ChatSettings::default();
        let chat = ChatSettings {
            temperature: parse_or(vars, "AZURE_OPENAI_CHAT_TEMPERATURE", defaults.temperature)?,
            completion_choices: parse_or(
                vars,
                "AZURE_OPENAI_CHAT_COMPLETION_CHOICES",
                defaults.completion_choices,
            )?,
            presence_penalty: parse_or(
                vars,
                "AZURE_OPENAI_CHAT_PRESENCE_PENALTY",
                defaults.presence_penalty,
            )?,
            top_p: parse_or(vars, "AZURE_OPENAI_CHAT_TOP_P", defaults.top_p)?,
        };

        let document_intelligence = match (
            get(vars, "DOCUMENT_INTELLIGENCE_ENDPOINT"),
            get(vars, "DOCUMENT_INTELLIGENCE_API_KEY"),
        ) {
            (Some(endpoint), Some(api_key)) => Some(DocumentIntelligenceSettings {
                endpoint,
                api_key,
                api_version: get_or_default(vars, "DOCUMENT_INTELLIGENCE_API_VERSION", "2023-07-31"),
                poll_interval: Duration::from_millis(parse_or(
                    vars,
                    "DOCUMENT_INTELLIGENCE_POLL_MS",
                    1000u64,
                )?),
                max_polls: parse_or(vars, "DOCUMENT_INTELLIGENCE_MAX_POLLS", 60u32)?,
            }),
            _ => None,
        };

        let api = ApiSettings {
            api_key: get_or_default(vars, "ASSISTANT_API_KEY", ""),
            origins: get_or_default(
                vars,
                "ASSISTANT_API_ORIGINS",
                "http://localhost,http://localhost:8080,*",
            )
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
            bind_addr: get_or_default(vars, "BIND_ADDR", "0.0.0.0:8000"),
        };

        let upstream_defaults = UpstreamSettings::default();
        let upstream = UpstreamSettings {
            timeout: Duration::from_secs(parse_or(
                vars,
                "UPSTREAM_TIMEOUT_SECS",
                upstream_defaults.timeout.as_secs(),
            )?),
            max_retries: parse_or(vars, "UPSTREAM_MAX_RETRIES", upstream_defaults.max_retries)?,
        };

        Ok(Settings {
            search,
            openai,
            openai_fallback,
            chat,
            document_intelligence,
            api,
            upstream,
        })
    }
}

fn get(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_or_default(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    get(vars, key).unwrap_or_else(|| default.to_string())
}

fn require(vars: &HashMap<String, String>, key: &str) -> Result<String> {
    get(vars, key)
        .ok_or_else(|| PipelineError::config(format!("missing required environment variable: {key}")))
}

fn parse_opt<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    get(vars, key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| PipelineError::config(format!("{key} has an invalid value: {v}")))
        })
        .transpose()
}

fn parse_or<T: FromStr>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T> {
    Ok(parse_opt(vars, key)?.unwrap_or(default))
}
