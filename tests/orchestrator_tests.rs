mod common;

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use diligence::data_models::{Record, SearchResult, Tone};
use diligence::prompts::{RISK_FUNCTION, TONE_FUNCTION};

use common::{
    CannedAnalyst, FakeExtractor, FakeSearch, KeywordAnalyst, acme_result, orchestrator_with,
    tagged,
};

const ACME_URL: &str = "https://news.example/acme";
const LAUNDERING_URL: &str = "https://news.example/acme-investigation";

fn acme_extractor() -> FakeExtractor {
    FakeExtractor {
        pages: HashMap::from([
            (
                ACME_URL.to_string(),
                "Acme Corp was awarded a community grant.".to_string(),
            ),
            ("https://news.example/blank".to_string(), String::new()),
        ]),
        pdfs: HashMap::from([(
            "https://news.example/report.pdf".to_string(),
            "Page one\nPage two".to_string(),
        )]),
    }
}

fn acme_record() -> Record {
    Record {
        search: Some("Acme Corp".into()),
        language: Some("es".into()),
        country_code: Some("CO".into()),
        commercial_activity: Some("Fabricación de herramientas".into()),
        ..Default::default()
    }
}

mod search {
    use super::*;

    #[tokio::test]
    async fn serializes_results_as_json_array() {
        let search = Arc::new(FakeSearch::new(vec![acme_result()]));
        let orchestrator =
            orchestrator_with(search.clone(), acme_extractor(), Arc::new(KeywordAnalyst::default()));

        let serialized = orchestrator.search(&acme_record()).await.unwrap();
        let results: Vec<SearchResult> = serde_json::from_str(&serialized).unwrap();
        assert_eq!(results, vec![acme_result()]);

        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[0].query, "Acme Corp");
        assert_eq!(queries[0].language.as_deref(), Some("es"));
        assert_eq!(queries[0].country_code.as_deref(), Some("CO"));
        assert_eq!(
            queries[0].commercial_activity.as_deref(),
            Some("Fabricación de herramientas")
        );
    }

    #[tokio::test]
    async fn no_results_is_an_empty_list() {
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            acme_extractor(),
            Arc::new(KeywordAnalyst::default()),
        );
        assert_eq!(orchestrator.search(&acme_record()).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn missing_query_is_invalid_input() {
        let search = Arc::new(FakeSearch::new(vec![acme_result()]));
        let orchestrator =
            orchestrator_with(search.clone(), acme_extractor(), Arc::new(KeywordAnalyst::default()));
        let err = orchestrator.search(&Record::default()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(search.queries.lock().unwrap().is_empty());
    }
}

mod extraction {
    use super::*;

    fn orchestrator() -> diligence::orchestrator::Orchestrator {
        orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            acme_extractor(),
            Arc::new(KeywordAnalyst::default()),
        )
    }

    #[tokio::test]
    async fn scraping_fills_content_and_keeps_other_fields() {
        let mut record = acme_record();
        record.url = Some(ACME_URL.into());
        let record = orchestrator().scraping(record).await.unwrap();
        assert_eq!(
            record.content.as_deref(),
            Some("Acme Corp was awarded a community grant.")
        );
        assert_eq!(record.search.as_deref(), Some("Acme Corp"));
    }

    #[tokio::test]
    async fn blank_page_is_empty_content_not_failure() {
        let mut record = acme_record();
        record.url = Some("https://news.example/blank".into());
        let record = orchestrator().scraping(record).await.unwrap();
        assert_eq!(record.content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn read_pdf_fills_content() {
        let mut record = acme_record();
        record.url = Some("https://news.example/report.pdf".into());
        let record = orchestrator().read_pdf(record).await.unwrap();
        assert_eq!(record.content.as_deref(), Some("Page one\nPage two"));
    }

    #[tokio::test]
    async fn failures_surface_as_errors() {
        let mut record = acme_record();
        record.url = Some("https://news.example/missing".into());
        let err = orchestrator().scraping(record.clone()).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");

        let err = orchestrator().read_pdf(record).await.unwrap_err();
        assert_eq!(err.kind(), "unsupported_content");
    }

    #[tokio::test]
    async fn url_is_required() {
        let err = orchestrator().scraping(acme_record()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("url is required"));
    }
}

mod analyze {
    use super::*;

    #[tokio::test]
    async fn end_to_end_positive_news() {
        let analyst = Arc::new(KeywordAnalyst::default());
        let search = Arc::new(FakeSearch::new(vec![acme_result()]));
        let orchestrator = orchestrator_with(search, acme_extractor(), analyst.clone());

        let results: Vec<SearchResult> =
            serde_json::from_str(&orchestrator.search(&acme_record()).await.unwrap()).unwrap();
        let mut record = acme_record();
        record.url = Some(results[0].url.clone());

        let record = orchestrator.scraping(record).await.unwrap();
        let record = orchestrator.analyze(record).await.unwrap();

        assert_eq!(record.tone, Some(Tone::Positive));
        assert_eq!(record.risk, Some(false));
        assert_eq!(record.involvement, Some(false));
        assert_eq!(record.recommendation.as_deref(), Some("Sin riesgo"));
        assert_eq!(
            record.summary.as_deref(),
            Some("Acme Corp was awarded a community grant.")
        );
    }

    #[tokio::test]
    async fn end_to_end_money_laundering_news() {
        let analyst = Arc::new(KeywordAnalyst::default());
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor {
                pages: HashMap::from([(
                    LAUNDERING_URL.to_string(),
                    "Prosecutors opened an investigation into Acme Corp for money laundering."
                        .to_string(),
                )]),
                ..Default::default()
            },
            analyst.clone(),
        );

        let mut record = acme_record();
        record.url = Some(LAUNDERING_URL.into());
        let record = orchestrator.scraping(record).await.unwrap();
        let record = orchestrator.analyze(record).await.unwrap();

        assert_eq!(record.tone, Some(Tone::Negative));
        assert_eq!(record.involvement, Some(true));
        assert_eq!(record.risk, Some(true));
        let recommendation = record.recommendation.unwrap();
        assert_ne!(recommendation, "Sin riesgo");
        assert!(recommendation.chars().count() < 300);
        assert!(recommendation.contains("lavado de activos"));
    }

    #[tokio::test]
    async fn risk_pass_runs_after_tone_pass_over_its_summary() {
        let analyst = Arc::new(KeywordAnalyst {
            summary_override: Some("Resumen: Acme Corp recibió una beca.".into()),
            ..Default::default()
        });
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor::default(),
            analyst.clone(),
        );
        let mut record = acme_record();
        record.content = Some("A very long article body that should not reach stage two.".into());
        orchestrator.analyze(record).await.unwrap();

        let calls = analyst.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, TONE_FUNCTION);
        assert_eq!(calls[1].0, RISK_FUNCTION);
        assert_eq!(
            tagged(&calls[1].1, "summary"),
            "Resumen: Acme Corp recibió una beca."
        );
        assert_eq!(
            tagged(&calls[1].1, "commercialActivity"),
            "Fabricación de herramientas"
        );
        assert!(!calls[1].1.contains("should not reach stage two"));
    }

    #[tokio::test]
    async fn empty_summary_stops_before_risk_pass() {
        let analyst = Arc::new(KeywordAnalyst {
            summary_override: Some("   ".into()),
            ..Default::default()
        });
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor::default(),
            analyst.clone(),
        );
        let mut record = acme_record();
        record.content = Some("Acme Corp was awarded a community grant.".into());

        let err = orchestrator.analyze(record).await.unwrap_err();
        assert_eq!(err.kind(), "empty_summary");
        let calls = analyst.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, TONE_FUNCTION);
    }

    #[tokio::test]
    async fn missing_or_blank_content_never_calls_the_model() {
        let analyst = Arc::new(KeywordAnalyst::default());
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor::default(),
            analyst.clone(),
        );

        let err = orchestrator.analyze(acme_record()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let mut record = acme_record();
        record.content = Some(" \n ".into());
        let err = orchestrator.analyze(record).await.unwrap_err();
        assert_eq!(err.kind(), "empty_content");

        assert!(analyst.calls().is_empty());
    }

    #[tokio::test]
    async fn each_call_reruns_both_passes() {
        let analyst = Arc::new(KeywordAnalyst::default());
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor::default(),
            analyst.clone(),
        );
        let mut record = acme_record();
        record.content = Some("Acme Corp was awarded a community grant.".into());

        let first = orchestrator.analyze(record).await.unwrap();
        let second = orchestrator.analyze(first.clone()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(analyst.calls().len(), 4);
    }

    #[tokio::test]
    async fn off_schema_tone_is_rejected() {
        let orchestrator = orchestrator_with(
            Arc::new(FakeSearch::new(vec![])),
            FakeExtractor::default(),
            Arc::new(CannedAnalyst(json!({"tone": "NEUTRAL", "summary": "x"}))),
        );
        let mut record = acme_record();
        record.content = Some("text".into());
        let err = orchestrator.analyze(record).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }
}
