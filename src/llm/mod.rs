mod azure;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::prompts::FunctionSchema;

pub use azure::AzureOpenAiClient;

/// Field name → value map returned by one structured-output call.
pub type FieldMap = Map<String, Value>;

/// Client abstraction for one structured-output model invocation.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Send `instruction` and force an answer shaped by `schema`.
    async fn run(&self, instruction: &str, schema: &FunctionSchema) -> Result<FieldMap>;
}

/// Tries the primary region first and falls back to the secondary one when
/// the primary is unreachable. Answers that arrive but are wrong are not
/// retried elsewhere.
pub struct FailoverAnalysisClient {
    primary: Box<dyn AnalysisClient>,
    secondary: Option<Box<dyn AnalysisClient>>,
}

impl FailoverAnalysisClient {
    pub fn new(
        primary: Box<dyn AnalysisClient>,
        secondary: Option<Box<dyn AnalysisClient>>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl AnalysisClient for FailoverAnalysisClient {
    async fn run(&self, instruction: &str, schema: &FunctionSchema) -> Result<FieldMap> {
        match self.primary.run(instruction, schema).await {
            Err(err @ PipelineError::UpstreamUnavailable { .. }) => {
                let Some(secondary) = &self.secondary else {
                    return Err(err);
                };
                tracing::warn!(error = %err, function = schema.name, "primary region unavailable, using secondary");
                secondary.run(instruction, schema).await
            }
            other => other,
        }
    }
}

/// Check that every field the schema requires is present in `fields`.
pub(crate) fn ensure_required(
    service: &'static str,
    schema: &FunctionSchema,
    fields: &FieldMap,
) -> Result<()> {
    let missing: Vec<&str> = schema
        .required_fields()
        .into_iter()
        .filter(|name| !fields.contains_key(*name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::malformed(
            service,
            format!("{} response missing {}", schema.name, missing.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::tone_schema;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        calls: Arc<AtomicU32>,
        reply: fn() -> Result<FieldMap>,
    }

    #[async_trait]
    impl AnalysisClient for Scripted {
        async fn run(&self, _instruction: &str, _schema: &FunctionSchema) -> Result<FieldMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    fn tone_fields() -> Result<FieldMap> {
        Ok(json!({"tone": "POSITIVE", "summary": "ok"})
            .as_object()
            .cloned()
            .unwrap())
    }

    fn down() -> Result<FieldMap> {
        Err(PipelineError::unavailable("azure openai", "connect timeout"))
    }

    fn garbled() -> Result<FieldMap> {
        Err(PipelineError::malformed("azure openai", "not json"))
    }

    fn pair(
        primary: fn() -> Result<FieldMap>,
        secondary: fn() -> Result<FieldMap>,
    ) -> (FailoverAnalysisClient, Arc<AtomicU32>, Arc<AtomicU32>) {
        let p = Arc::new(AtomicU32::new(0));
        let s = Arc::new(AtomicU32::new(0));
        let client = FailoverAnalysisClient::new(
            Box::new(Scripted {
                calls: p.clone(),
                reply: primary,
            }),
            Some(Box::new(Scripted {
                calls: s.clone(),
                reply: secondary,
            }) as Box<dyn AnalysisClient>),
        );
        (client, p, s)
    }

    #[tokio::test]
    async fn uses_secondary_when_primary_unavailable() {
        let (client, p, s) = pair(down, tone_fields);
        let fields = client.run("prompt", &tone_schema()).await.unwrap();
        assert_eq!(fields["tone"], "POSITIVE");
        assert_eq!(p.load(Ordering::SeqCst), 1);
        assert_eq!(s.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_primary_answer_is_not_failed_over() {
        let (client, _, s) = pair(garbled, tone_fields);
        let err = client.run("prompt", &tone_schema()).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert_eq!(s.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn without_secondary_the_primary_error_surfaces() {
        let client = FailoverAnalysisClient::new(
            Box::new(Scripted {
                calls: Arc::new(AtomicU32::new(0)),
                reply: down,
            }),
            None,
        );
        let err = client.run("prompt", &tone_schema()).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[test]
    fn ensure_required_names_missing_fields() {
        let fields = json!({"tone": "NEGATIVE"}).as_object().cloned().unwrap();
        let err = ensure_required("azure openai", &tone_schema(), &fields).unwrap_err();
        assert!(err.to_string().contains("tone_analysis response missing summary"));
    }
}
