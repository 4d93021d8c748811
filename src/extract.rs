//! Structured extraction over the completion provider.
//!
//! These calls expect a JSON object back from the model. They are not
//! cached. Output that does not match the expected shape is an
//! [`AppError::Parse`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};
use crate::presets::language_directive;
use crate::upstream::{ChatMessage, CompletionProvider, SamplingParams};

const OUTCOMES_PROMPT: &str = r#"You are a clarity-focused AI that extracts actionable outcomes from speech.

MISSION: Extract atomic, independently actionable outcomes ONLY.

OUTCOME TYPES (choose ONE per item):
- message: Something to communicate/send
- task: Action to complete
- idea: Concept/insight to develop
- content: Post/article/creative output
- note: Information to remember

RULES:
1. Each outcome = SHORT (1-2 sentences max)
2. Each outcome = INDEPENDENTLY ACTIONABLE
3. NO long-form writing
4. NO fluff or filler
5. Extract 2-10 outcomes (quality > quantity)

OUTPUT FORMAT (JSON only):
{
  "outcomes": [
    {"type": "task", "text": "Email John about budget"},
    {"type": "idea", "text": "Feature: Auto-save drafts"}
  ]
}"#;

const UNSTUCK_PROMPT: &str = r#"You are a calm, insightful AI that helps people get unstuck.

MISSION: Extract ONE insight + ONE small action.

RULES:
1. Insight = What's actually going on (1-2 sentences, gentle, clear)
2. Action = One TINY doable step (specific, not overwhelming)
3. NO therapy speak
4. NO generic advice
5. NO multiple actions
6. Tone = Calm, supportive, practical

OUTPUT FORMAT (JSON only):
{
  "insight": "You're feeling overwhelmed because you're trying to do everything at once.",
  "action": "Write down just 3 things that matter most today."
}"#;

const OUTCOMES_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.4,
    max_tokens: 600,
};

const UNSTUCK_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.5,
    max_tokens: 400,
};

/// One actionable item pulled out of free-form speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// message, task, idea, content or note
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// One insight plus one small next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unstuck {
    pub insight: String,
    pub action: String,
}

#[derive(Deserialize)]
struct OutcomesEnvelope {
    outcomes: Option<Vec<Outcome>>,
}

#[derive(Deserialize)]
struct UnstuckEnvelope {
    #[serde(default)]
    insight: String,
    #[serde(default)]
    action: String,
}

/// Extracts a list of outcomes from `text`.
pub async fn extract_outcomes(
    provider: &dyn CompletionProvider,
    text: &str,
    language: &str,
) -> Result<Vec<Outcome>> {
    let output = provider
        .complete(&messages(OUTCOMES_PROMPT, text, language), OUTCOMES_PARAMS)
        .await?;

    let envelope: OutcomesEnvelope = parse_json_object(&output)?;
    envelope
        .outcomes
        .ok_or_else(|| AppError::Parse("Invalid outcomes format from AI".to_string()))
}

/// Extracts one insight and one action from `text`.
pub async fn extract_unstuck(
    provider: &dyn CompletionProvider,
    text: &str,
    language: &str,
) -> Result<Unstuck> {
    let output = provider
        .complete(&messages(UNSTUCK_PROMPT, text, language), UNSTUCK_PARAMS)
        .await?;

    let envelope: UnstuckEnvelope = parse_json_object(&output)?;
    if envelope.insight.is_empty() || envelope.action.is_empty() {
        return Err(AppError::Parse("Invalid unstuck format from AI".to_string()));
    }
    Ok(Unstuck {
        insight: envelope.insight,
        action: envelope.action,
    })
}

fn messages(prompt: &str, text: &str, language: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{}{}", prompt, language_directive(language))),
        ChatMessage::user(text),
    ]
}

/// Parses the span from the first `{` to the last `}`, tolerating prose
/// the model puts around it. Falls back to the whole output.
fn parse_json_object<T: DeserializeOwned>(output: &str) -> Result<T> {
    let candidate = match (output.find('{'), output.rfind('}')) {
        (Some(start), Some(end)) if start < end => &output[start..=end],
        _ => output,
    };
    serde_json::from_str(candidate).map_err(|e| {
        warn!("Model output is not valid JSON: {}", e);
        AppError::Parse("Failed to parse AI response as JSON".to_string())
    })
}
