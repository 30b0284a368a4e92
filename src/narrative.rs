use std::fmt::Write;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::NarrativeError;
use crate::metrics::SummaryDocument;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const MAX_OUTPUT_TOKENS: u32 = 3000;

/// Anything that turns a prompt into free-form text.
pub trait TextGenerator {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, NarrativeError>> + Send;
}

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl NarrativeConfig {
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, NarrativeError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                NarrativeError::MissingKey("set OPENAI_API_KEY in the environment or .env".into())
            })?;
        Ok(Self {
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            max_tokens: MAX_OUTPUT_TOKENS,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: NarrativeConfig,
}

impl OpenAiClient {
    pub fn new(config: NarrativeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl TextGenerator for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, NarrativeError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(url = %url, model = %self.config.model, "requesting narrative");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrativeError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NarrativeError::Request(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(NarrativeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| NarrativeError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(NarrativeError::EmptyResponse)
    }
}

pub fn build_prompt(org_name: &str, summary: &SummaryDocument) -> Result<String, NarrativeError> {
    let data = serde_json::to_string_pretty(summary)?;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are an expert data analyst and strategic advisor helping \"{org_name}\" \
         optimize their event performance. Analyze the following comprehensive event data \
         and provide executive-level insights."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "EVENT DATA SUMMARY:");
    let _ = writeln!(prompt, "{data}");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Provide a professional analysis with these sections:");
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "1. **Executive Summary** (2-3 sentences highlighting the most important findings)"
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "2. **Key Performance Indicators**");
    let _ = writeln!(prompt, "   - Overall attendance performance");
    let _ = writeln!(prompt, "   - Best and worst performing events");
    let _ = writeln!(prompt, "   - Trend analysis");
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "3. **Event Type Analysis** (Which types of events perform best and why?)"
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "4. **Attendance Patterns & Trends** (Seasonal patterns, growth trends, conversion rates)"
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "5. **Predictions for Future Events** \
         (Data-driven attendance forecasts for each event type)"
    );
    if summary.has_budget() {
        let _ = writeln!(
            prompt,
            "6. **Financial Analysis** \
             (Budget efficiency, cost per attendee trends, ROI recommendations)"
        );
    }
    if summary.demographics.is_some() {
        let _ = writeln!(
            prompt,
            "7. **Audience Insights** (Demographics breakdown and targeting recommendations)"
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "8. **Strategic Recommendations** \
         (5 specific, actionable recommendations prioritized by impact)"
    );
    let _ = writeln!(prompt);
    let _ = write!(
        prompt,
        "Format your response professionally for board presentation. \
         Use clear headings and bullet points."
    );

    Ok(prompt)
}

pub async fn generate_narrative<G: TextGenerator>(
    generator: &G,
    org_name: &str,
    summary: &SummaryDocument,
) -> Result<String, NarrativeError> {
    let prompt = build_prompt(org_name, summary)?;
    info!(prompt_chars = prompt.len(), "requesting narrative report");

    let text = generator.complete(&prompt).await?;
    if text.trim().is_empty() {
        return Err(NarrativeError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::build_summary;
    use crate::models::{
        DemographicCategory, Demographics, EventRecord, EventType, NormalizedDataset,
    };
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<String>>,
    }

    impl TextGenerator for Canned {
        async fn complete(&self, prompt: &str) -> Result<String, NarrativeError> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn dataset(budget: Option<f64>, demographics: Demographics) -> NormalizedDataset {
        NormalizedDataset::new(
            vec![EventRecord {
                name: "Garba Night".to_string(),
                date: chrono::NaiveDate::from_ymd_opt(2024, 10, 12),
                event_type: EventType::CulturalFestival,
                expected_attendance: Some(200),
                actual_attendance: Some(150),
                total_budget: budget,
                demographics: None,
            }],
            demographics,
        )
    }

    #[test]
    fn prompt_names_org_and_embeds_summary() {
        let summary = build_summary(&dataset(None, Demographics::new()));
        let prompt = build_prompt("Society of Indian Americans", &summary).unwrap();
        assert!(prompt.contains("helping \"Society of Indian Americans\""));
        assert!(prompt.contains("\"total_events\": 1"));
        assert!(prompt.contains("1. **Executive Summary**"));
        assert!(prompt.contains("8. **Strategic Recommendations**"));
        assert!(!prompt.contains("Financial Analysis"));
        assert!(!prompt.contains("Audience Insights"));
    }

    #[test]
    fn optional_sections_follow_available_data() {
        let mut demographics = Demographics::new();
        demographics.set(DemographicCategory::Senior, 9);
        let summary = build_summary(&dataset(Some(900.0), demographics));
        let prompt = build_prompt("Org", &summary).unwrap();
        assert!(prompt.contains("6. **Financial Analysis**"));
        assert!(prompt.contains("7. **Audience Insights**"));
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let generator = Canned {
            reply: "   \n".to_string(),
            seen: Mutex::new(Vec::new()),
        };
        let summary = build_summary(&dataset(None, Demographics::new()));
        let result = generate_narrative(&generator, "Org", &summary).await;
        assert!(matches!(result, Err(NarrativeError::EmptyResponse)));
        assert_eq!(generator.seen.lock().unwrap().len(), 1);
    }
}
