pub mod api;
pub mod config;
pub mod data_models;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod search;
