#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use diligence::data_models::SearchResult;
use diligence::error::{PipelineError, Result};
use diligence::extractor::ContentExtractor;
use diligence::llm::{AnalysisClient, FieldMap};
use diligence::orchestrator::Orchestrator;
use diligence::prompts::{FunctionSchema, RISK_FUNCTION, TONE_FUNCTION};
use diligence::search::{SearchClient, SearchQuery};

pub struct FakeSearch {
    pub results: Vec<SearchResult>,
    pub queries: Mutex<Vec<SearchQuery>>,
}

impl FakeSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.results.clone())
    }
}

/// Serves page and PDF text from memory, keyed by URL.
#[derive(Default)]
pub struct FakeExtractor {
    pub pages: HashMap<String, String>,
    pub pdfs: HashMap<String, String>,
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn scrape(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::unavailable("content source", format!("{url} unreachable")))
    }

    async fn read_pdf(&self, url: &str) -> Result<String> {
        self.pdfs
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::UnsupportedContent(format!("{url} is not a pdf")))
    }
}

/// Stand-in analyst: reads the tagged sections of each prompt and flags
/// money-laundering language.
#[derive(Default)]
pub struct KeywordAnalyst {
    pub calls: Mutex<Vec<(String, String)>>,
    /// Forces the tone pass to return this summary when set.
    pub summary_override: Option<String>,
}

impl KeywordAnalyst {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn tagged<'a>(text: &'a str, tag: &str) -> &'a str {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.rfind(&open).map(|i| i + open.len()).unwrap_or(0);
    let end = text[start..].find(&close).map(|i| start + i).unwrap_or(text.len());
    &text[start..end]
}

fn is_alarming(text: &str) -> bool {
    let text = text.to_lowercase();
    ["money laundering", "lavado de activos", "investigation", "investigación"]
        .iter()
        .any(|k| text.contains(k))
}

#[async_trait]
impl AnalysisClient for KeywordAnalyst {
    async fn run(&self, instruction: &str, schema: &FunctionSchema) -> Result<FieldMap> {
        self.calls
            .lock()
            .unwrap()
            .push((schema.name.to_string(), instruction.to_string()));

        let value = match schema.name {
            TONE_FUNCTION => {
                let article = tagged(instruction, "newsArticle");
                let tone = if is_alarming(article) { "NEGATIVE" } else { "POSITIVE" };
                let summary = self
                    .summary_override
                    .clone()
                    .unwrap_or_else(|| article.trim().to_string());
                json!({ "tone": tone, "summary": summary })
            }
            RISK_FUNCTION => {
                let summary = tagged(instruction, "summary");
                let client = tagged(instruction, "clientName");
                if is_alarming(summary) && summary.contains(client) {
                    json!({
                        "involvement": true,
                        "risk": true,
                        "recommendation": format!(
                            "{client} está bajo investigación por lavado de activos. Se recomienda no otorgar crédito."
                        ),
                    })
                } else {
                    json!({ "involvement": false, "risk": false, "recommendation": "Sin riesgo" })
                }
            }
            other => panic!("unexpected function {other}"),
        };
        Ok(into_map(value))
    }
}

/// Returns the same answer for every call.
pub struct CannedAnalyst(pub Value);

#[async_trait]
impl AnalysisClient for CannedAnalyst {
    async fn run(&self, _instruction: &str, _schema: &FunctionSchema) -> Result<FieldMap> {
        Ok(into_map(self.0.clone()))
    }
}

pub fn into_map(value: Value) -> FieldMap {
    value.as_object().cloned().expect("json object")
}

pub fn acme_result() -> SearchResult {
    SearchResult {
        position: Some(1),
        title: "Acme Corp recibe subvención".into(),
        url: "https://news.example/acme".into(),
        description: "Acme Corp was awarded a community grant.".into(),
        domain: "news.example".into(),
    }
}

pub fn orchestrator_with(
    search: Arc<FakeSearch>,
    extractor: FakeExtractor,
    analyst: Arc<dyn AnalysisClient>,
) -> Orchestrator {
    Orchestrator::new(search, Arc::new(extractor), analyst)
}

/// Build a PDF with one line of text per page.
pub fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
