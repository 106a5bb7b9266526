use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The request/response record threaded through every pipeline step.
/// Unset fields serialize as `null` and are echoed back unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Record {
    pub search: Option<String>,
    pub language: Option<String>,
    pub country_code: Option<String>,
    pub commercial_activity: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,

    pub tone: Option<Tone>,
    pub summary: Option<String>,
    pub involvement: Option<bool>,
    pub risk: Option<bool>,
    pub recommendation: Option<String>,
}

impl Record {
    pub fn for_query(search: impl Into<String>) -> Record {
        Record {
            search: Some(search.into()),
            ..Default::default()
        }
    }

    /// Name of the client under review, empty when the record has none.
    pub fn client_name(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }

    pub fn apply_tone(&mut self, tone: ToneAssessment) {
        self.tone = Some(tone.tone);
        self.summary = Some(tone.summary);
    }

    pub fn apply_risk(&mut self, risk: RiskAssessment) {
        self.involvement = Some(risk.involvement);
        self.risk = Some(risk.risk);
        self.recommendation = Some(risk.recommendation);
    }
}

/// One organic result returned by the search provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tone {
    Positive,
    Negative,
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POSITIVE" => Ok(Tone::Positive),
            "NEGATIVE" => Ok(Tone::Negative),
            other => Err(format!("tone must be POSITIVE or NEGATIVE, got {other:?}")),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Positive => f.write_str("POSITIVE"),
            Tone::Negative => f.write_str("NEGATIVE"),
        }
    }
}

/// Output of the tone pass; the summary feeds the risk pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneAssessment {
    pub tone: Tone,
    pub summary: String,
}

/// Output of the risk pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub involvement: bool,
    pub risk: bool,
    pub recommendation: String,
}
