pub mod chat_client;
pub mod prompts;

pub use chat_client::ChatCompletionsClient;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::NarrativeError;

/// Sentinel text used when no narrative could be produced
pub const UNAVAILABLE: &str = "(analysis unavailable)";

const JSON_ONLY: &str =
    "Return ONLY a single valid JSON object. No extra text, no code fences, no explanation.";

/// External text generator producing narrative insight from a context payload.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, NarrativeError>;
}

/// Ask the generator for a JSON object and decode it into `T`.
///
/// Output wrapped in a Markdown code fence is accepted. Empty output or
/// anything that is not a single JSON object of the right shape is an error.
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn NarrativeGenerator,
    system: &str,
    user: &str,
) -> Result<T, NarrativeError> {
    let user = format!("{}\n\n{}", user, JSON_ONLY);
    let text = generator.generate(system, &user).await?;

    let cleaned = strip_code_fences(&text);
    if cleaned.is_empty() {
        return Err(NarrativeError::Empty);
    }

    serde_json::from_str(cleaned).map_err(|e| {
        log::debug!("Unparseable narrative output: {}", text);
        NarrativeError::Parse(e.to_string())
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrSummary {
    pub summary: String,
    /// LOW, MEDIUM or HIGH
    pub risk_level: String,
    /// 1-10
    pub complexity: i32,
    pub key_changes: Vec<String>,
    pub affected_areas: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub reviewer_notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileChurn {
    pub file: String,
    pub churn: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoAnalysis {
    /// 0-100
    pub health_score: i32,
    /// low, medium or high
    pub risk_level: String,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub hotspots: Vec<FileChurn>,
    pub contributor_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl RepoAnalysis {
    pub fn unavailable() -> Self {
        Self {
            risk_level: "medium".to_string(),
            summary: UNAVAILABLE.to_string(),
            ..Default::default()
        }
    }
}

/// Reference to a PR or issue picked out by the generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRef {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyReport {
    pub highlights: Vec<String>,
    #[serde(rename = "keyPRs")]
    pub key_prs: Vec<ItemRef>,
    pub key_issues: Vec<ItemRef>,
    pub active_contributors: Vec<String>,
    pub risk_alerts: Vec<String>,
    pub velocity_summary: String,
    pub suggested_next_steps: Vec<String>,
}

impl WeeklyReport {
    pub fn unavailable() -> Self {
        Self {
            velocity_summary: UNAVAILABLE.to_string(),
            ..Default::default()
        }
    }
}
