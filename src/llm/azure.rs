use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AnalysisClient, FieldMap, ensure_required};
use crate::config::{AzureOpenAiSettings, ChatSettings};
use crate::error::{PipelineError, Result};
use crate::prompts::FunctionSchema;
use crate::retry::RetryPolicy;

const SERVICE: &str = "azure openai";

/// Chat-completions client for one Azure OpenAI region and deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    http: Client,
    url: String,
    api_key: String,
    chat: ChatSettings,
    retry: RetryPolicy,
}

impl AzureOpenAiClient {
    pub fn new(
        settings: &AzureOpenAiSettings,
        chat: &ChatSettings,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(PipelineError::config("Azure OpenAI API key must be provided"));
        }
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            settings.endpoint.trim_end_matches('/'),
            settings.deployment,
            settings.api_version
        );

        let http = Client::builder()
            .user_agent(concat!("diligence/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build Azure OpenAI HTTP client: {e}")))?;

        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            chat: chat.clone(),
            retry,
        })
    }

    async fn complete(&self, payload: &ChatCompletionRequest<'_>) -> Result<ChatCompletionResponse> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(payload)
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
            .map_err(|e| PipelineError::malformed(SERVICE, format!("unreadable chat completion: {e}")))
    }
}

#[async_trait]
impl AnalysisClient for AzureOpenAiClient {
    async fn run(&self, instruction: &str, schema: &FunctionSchema) -> Result<FieldMap> {
        let payload = ChatCompletionRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: instruction,
            }],
            temperature: self.chat.temperature,
            n: self.chat.completion_choices,
            presence_penalty: self.chat.presence_penalty,
            top_p: self.chat.top_p,
            tools: vec![Tool {
                kind: "function",
                function: schema,
            }],
            tool_choice: ToolChoice {
                kind: "function",
                function: ToolChoiceFunction { name: schema.name },
            },
        };

        let chat = self.retry.run(SERVICE, || self.complete(&payload)).await?;
        let arguments = function_arguments(chat)?;
        let fields: FieldMap = serde_json::from_str(&arguments).map_err(|e| {
            PipelineError::malformed(SERVICE, format!("{} arguments are not a JSON object: {e}", schema.name))
        })?;
        ensure_required(SERVICE, schema, &fields)?;
        Ok(fields)
    }
}

/// Pull the forced function-call arguments out of the first choice.
fn function_arguments(chat: ChatCompletionResponse) -> Result<String> {
    let message = chat
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| PipelineError::malformed(SERVICE, "response has no choices"))?;

    message
        .tool_calls
        .into_iter()
        .flatten()
        .next()
        .map(|call| call.function)
        .or(message.function_call)
        .map(|call| call.arguments)
        .ok_or_else(|| PipelineError::malformed(SERVICE, "response has no function call"))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    n: u32,
    presence_penalty: f32,
    top_p: f32,
    tools: Vec<Tool<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct Tool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionSchema,
}

#[derive(Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolChoiceFunction<'a>,
}

#[derive(Serialize)]
struct ToolChoiceFunction<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    arguments: String,
}
