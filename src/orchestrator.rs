use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::data_models::{Record, RiskAssessment, Tone, ToneAssessment};
use crate::error::{PipelineError, Result};
use crate::extractor::{ContentExtractor, WebExtractor};
use crate::llm::{AnalysisClient, AzureOpenAiClient, FailoverAnalysisClient, FieldMap};
use crate::prompts::{self, FunctionSchema};
use crate::retry::RetryPolicy;
use crate::search::{ScrapingBeeSearch, SearchClient, SearchQuery};

/// Pipeline controller. Holds only immutable wiring to its collaborators,
/// so one instance is shared by every request.
pub struct Orchestrator {
    search: Arc<dyn SearchClient>,
    extractor: Arc<dyn ContentExtractor>,
    analysis: Arc<dyn AnalysisClient>,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchClient>,
        extractor: Arc<dyn ContentExtractor>,
        analysis: Arc<dyn AnalysisClient>,
    ) -> Orchestrator {
        Orchestrator {
            search,
            extractor,
            analysis,
        }
    }

    /// Wire the production providers described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Orchestrator> {
        let retry = RetryPolicy::from_settings(&settings.upstream);
        let timeout = settings.upstream.timeout;

        let search = ScrapingBeeSearch::new(&settings.search, timeout, retry)?;
        let extractor = WebExtractor::from_settings(settings)?;

        let primary = AzureOpenAiClient::new(&settings.openai, &settings.chat, timeout, retry)?;
        let secondary = settings
            .openai_fallback
            .as_ref()
            .map(|region| AzureOpenAiClient::new(region, &settings.chat, timeout, retry))
            .transpose()?
            .map(|client| Box::new(client) as Box<dyn AnalysisClient>);
        let analysis = FailoverAnalysisClient::new(Box::new(primary), secondary);

        Ok(Orchestrator::new(
            Arc::new(search),
            Arc::new(extractor),
            Arc::new(analysis),
        ))
    }

    /// Run the web search for `record.search` and return the results as a
    /// JSON array string.
    pub async fn search(&self, record: &Record) -> Result<String> {
        let query = SearchQuery {
            query: required(&record.search, "search")?.to_string(),
            language: record.language.clone(),
            country_code: record.country_code.clone(),
            commercial_activity: record.commercial_activity.clone(),
        };
        let results = self.search.search(&query).await?;
        serialize_results(&results)
    }

    /// Fill `content` with the visible text of the page at `record.url`.
    pub async fn scraping(&self, mut record: Record) -> Result<Record> {
        let url = required(&record.url, "url")?;
        let content = self.extractor.scrape(url).await?;
        record.content = Some(content);
        Ok(record)
    }

    /// Fill `content` with the text of the PDF at `record.url`.
    pub async fn read_pdf(&self, mut record: Record) -> Result<Record> {
        let url = required(&record.url, "url")?;
        let content = self.extractor.read_pdf(url).await?;
        record.content = Some(content);
        Ok(record)
    }

    /// Run the tone pass and then the risk pass over `record.content`.
    /// Every call re-runs both passes.
    pub async fn analyze(&self, mut record: Record) -> Result<Record> {
        let content = match record.content.as_deref() {
            None => return Err(PipelineError::invalid_input("content is required")),
            Some(c) if c.trim().is_empty() => return Err(PipelineError::EmptyContent),
            Some(c) => c,
        };

        let tone = self.tone_pass(record.client_name(), content).await?;
        tracing::info!(tone = %tone.tone, "tone pass completed");

        let risk = self
            .risk_pass(
                record.client_name(),
                record.commercial_activity.as_deref().unwrap_or(""),
                &tone,
            )
            .await?;
        tracing::info!(risk = risk.risk, involvement = risk.involvement, "risk pass completed");

        record.apply_tone(tone);
        record.apply_risk(risk);
        Ok(record)
    }

    /// Stage 1: tone and summary over the document text.
    pub async fn tone_pass(&self, client: &str, content: &str) -> Result<ToneAssessment> {
        let prompt = prompts::tone_prompt(client, content);
        let fields = self.analysis.run(&prompt.instruction, &prompt.schema).await?;
        parse_tone(&prompt.schema, &fields)
    }

    /// Stage 2: involvement, risk and recommendation over the stage 1 summary.
    pub async fn risk_pass(
        &self,
        client: &str,
        commercial_activity: &str,
        tone: &ToneAssessment,
    ) -> Result<RiskAssessment> {
        if tone.summary.trim().is_empty() {
            return Err(PipelineError::EmptySummary);
        }
        let prompt = prompts::risk_prompt(client, commercial_activity, &tone.summary);
        let fields = self.analysis.run(&prompt.instruction, &prompt.schema).await?;
        parse_risk(&prompt.schema, &fields)
    }
}

fn serialize_results<T: Serialize + ?Sized>(results: &T) -> Result<String> {
    serde_json::to_string(results).map_err(|e| {
        PipelineError::malformed("search", format!("search results are not serializable: {e}"))
    })
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PipelineError::invalid_input(format!("{field} is required"))),
    }
}

fn parse_tone(schema: &FunctionSchema, fields: &FieldMap) -> Result<ToneAssessment> {
    let tone: Tone = string_field(schema, fields, "tone")?
        .parse()
        .map_err(|e: String| PipelineError::malformed("analysis", e))?;
    let summary = string_field(schema, fields, "summary")?.trim().to_string();
    if summary.is_empty() {
        return Err(PipelineError::EmptySummary);
    }
    Ok(ToneAssessment { tone, summary })
}

fn parse_risk(schema: &FunctionSchema, fields: &FieldMap) -> Result<RiskAssessment> {
    Ok(RiskAssessment {
        involvement: bool_field(schema, fields, "involvement")?,
        risk: bool_field(schema, fields, "risk")?,
        recommendation: string_field(schema, fields, "recommendation")?
            .trim()
            .to_string(),
    })
}

fn string_field<'a>(schema: &FunctionSchema, fields: &'a FieldMap, name: &str) -> Result<&'a str> {
    fields.get(name).and_then(Value::as_str).ok_or_else(|| {
        PipelineError::malformed("analysis", format!("{}.{name} must be a string", schema.name))
    })
}

fn bool_field(schema: &FunctionSchema, fields: &FieldMap, name: &str) -> Result<bool> {
    match fields.get(name) {
        Some(Value::Bool(b)) => Ok(*b),
        // Some deployments quote booleans despite the schema.
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(PipelineError::malformed(
            "analysis",
            format!("{}.{name} must be a boolean", schema.name),
        )),
    }
}
