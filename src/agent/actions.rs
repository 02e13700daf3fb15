use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::Value;

use crate::agent::prompt::actions_prompt;
use crate::llm::provider::{
    AssistantInput, AssistantMessage, AssistantPart, GenerationSettings, LlmProvider,
    ToolCallingMode,
};

/// A follow-up button offered under an answer. Clicking it sends `text`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuggestedAction {
    pub text: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    Provider(String),
    Json(String),
    NotAnArray,
}

impl Display for ActionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(msg) => write!(f, "action extraction request failed: {msg}"),
            Self::Json(msg) => write!(f, "action extraction returned invalid JSON: {msg}"),
            Self::NotAnArray => write!(f, "action extraction did not return a JSON array"),
        }
    }
}

impl Error for ActionParseError {}

pub async fn extract_actions<P: LlmProvider>(
    provider: &P,
    response_text: &str,
    generation: GenerationSettings,
) -> Result<Vec<SuggestedAction>, ActionParseError> {
    let output = provider
        .generate(AssistantInput {
            system_instruction: None,
            messages: vec![AssistantMessage::user_text(actions_prompt(response_text))],
            tools: vec![],
            tool_calling_mode: ToolCallingMode::None,
            generation,
        })
        .await
        .map_err(|err| ActionParseError::Provider(err.to_string()))?;

    let raw = output
        .candidates
        .first()
        .map(|candidate| {
            candidate
                .message
                .parts
                .iter()
                .filter_map(|part| match part {
                    AssistantPart::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<String>()
        })
        .unwrap_or_default();

    parse_actions(&raw)
}

/// Parses the model's action list. Models sometimes wrap the JSON in a
/// markdown fence despite being told not to, so one fence is tolerated.
pub fn parse_actions(raw: &str) -> Result<Vec<SuggestedAction>, ActionParseError> {
    let json = strip_code_fence(raw.trim());
    let value = serde_json::from_str::<Value>(json)
        .map_err(|err| ActionParseError::Json(err.to_string()))?;
    if !value.is_array() {
        return Err(ActionParseError::NotAnArray);
    }

    let actions = serde_json::from_value::<Vec<SuggestedAction>>(value)
        .map_err(|err| ActionParseError::Json(err.to_string()))?;
    Ok(actions
        .into_iter()
        .filter(|action| !action.text.trim().is_empty())
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
