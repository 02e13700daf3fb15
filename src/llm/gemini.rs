use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{
    AssistantCandidate, AssistantInput, AssistantMessage, AssistantOutput, AssistantPart,
    AssistantRole, LlmError, LlmProvider, LlmResult, LlmTokenUsageTotals, ToolCallingMode,
};
use crate::http::client::{HttpClient, HttpResponseData};

const ERROR_BODY_MAX_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{method}", self.base_url, self.model)
    }

    fn build_request(input: &AssistantInput) -> GeminiGenerateRequest {
        let (tools, tool_config) = if input.tools.is_empty() {
            (Vec::new(), None)
        } else {
            let mode = match input.tool_calling_mode {
                ToolCallingMode::Auto => "AUTO",
                ToolCallingMode::None => "NONE",
            };
            (
                vec![GeminiTool {
                    function_declarations: input
                        .tools
                        .iter()
                        .map(|decl| GeminiFunctionDeclaration {
                            name: decl.name.clone(),
                            description: decl.description.clone(),
                            parameters_json_schema: decl.parameters_json_schema.clone(),
                        })
                        .collect(),
                }],
                Some(GeminiToolConfig {
                    function_calling_config: GeminiFunctionCallingConfig { mode },
                }),
            )
        };

        GeminiGenerateRequest {
            contents: input.messages.iter().map(content_from_message).collect(),
            system_instruction: input.system_instruction.as_ref().map(|text| {
                GeminiSystemInstruction {
                    parts: vec![GeminiRequestPart::text(text.clone())],
                }
            }),
            tools,
            tool_config,
            generation_config: GeminiGenerationConfig {
                temperature: input.generation.temperature,
                max_output_tokens: input.generation.max_output_tokens,
            },
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = Self::build_request(&input);
        let response = self
            .http
            .post_json(
                &self.endpoint("generateContent"),
                &[("key", self.api_key.as_str())],
                &payload,
            )
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        ensure_success(&response)?;

        let parsed = serde_json::from_str::<GeminiGenerateResponse>(&response.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        let mut acc = StreamAccumulator::default();
        acc.absorb(parsed, &mut |_| {});
        Ok(acc.finish())
    }

    async fn generate_stream<F>(&self, input: AssistantInput, mut on_text: F) -> LlmResult<AssistantOutput>
    where
        F: FnMut(&str) + Send,
    {
        let payload = Self::build_request(&input);
        let mut decoder = SseDecoder::default();
        let mut acc = StreamAccumulator::default();
        let mut parse_error = None;

        let response = self
            .http
            .post_json_stream(
                &self.endpoint("streamGenerateContent"),
                &[("alt", "sse"), ("key", self.api_key.as_str())],
                &payload,
                |chunk| {
                    for event in decoder.push(chunk) {
                        acc.absorb_event(&event, &mut on_text, &mut parse_error);
                    }
                },
            )
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        ensure_success(&response)?;

        if let Some(event) = decoder.finish() {
            acc.absorb_event(&event, &mut on_text, &mut parse_error);
        }
        if let Some(err) = parse_error {
            return Err(err);
        }

        Ok(acc.finish())
    }
}

fn ensure_success(response: &HttpResponseData) -> LlmResult<()> {
    if response.is_success() {
        return Ok(());
    }

    Err(LlmError::HttpStatus {
        status: response.status,
        body: response.body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
    })
}

fn content_from_message(message: &AssistantMessage) -> GeminiContent {
    let role = match message.role {
        AssistantRole::User => "user",
        AssistantRole::Model => "model",
    };

    GeminiContent {
        role: role.to_string(),
        parts: message.parts.iter().map(request_part_from).collect(),
    }
}

fn request_part_from(part: &AssistantPart) -> GeminiRequestPart {
    match part {
        AssistantPart::Text {
            text,
            thought_signature,
        } => GeminiRequestPart {
            thought_signature: thought_signature.clone(),
            ..GeminiRequestPart::text(text.clone())
        },
        AssistantPart::FunctionCall {
            id,
            name,
            args_json,
            thought_signature,
        } => GeminiRequestPart {
            text: None,
            function_call: Some(GeminiFunctionCall {
                id: id.clone(),
                name: name.clone(),
                args: args_json.clone(),
            }),
            function_response: None,
            thought_signature: thought_signature.clone(),
        },
        AssistantPart::FunctionResponse {
            id,
            name,
            response_json,
            thought_signature,
        } => GeminiRequestPart {
            text: None,
            function_call: None,
            function_response: Some(GeminiFunctionResponse {
                id: id.clone(),
                name: name.clone(),
                response: response_json.clone(),
            }),
            thought_signature: thought_signature.clone(),
        },
    }
}

/// Splits a `text/event-stream` body into `data:` payloads. Bytes are
/// buffered until an event is complete, so multi-byte characters split
/// across network chunks survive.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let raw = self.buffer.drain(..end + 2).collect::<Vec<_>>();
            if let Some(data) = event_data(&raw[..end]) {
                events.push(data);
            }
        }
        events
    }

    fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        event_data(&raw)
    }
}

fn event_data(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let data = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");

    if data.trim().is_empty() || data.trim() == "[DONE]" {
        None
    } else {
        Some(data)
    }
}

/// Folds one or more response bodies (a full response, or successive stream
/// events) into a single candidate.
#[derive(Debug, Default)]
struct StreamAccumulator {
    parts: Vec<AssistantPart>,
    finish_reason: Option<String>,
    safety_blocked: bool,
    usage: Option<LlmTokenUsageTotals>,
    saw_candidate: bool,
}

impl StreamAccumulator {
    fn absorb_event<F: FnMut(&str)>(
        &mut self,
        data: &str,
        on_text: &mut F,
        parse_error: &mut Option<LlmError>,
    ) {
        match serde_json::from_str::<GeminiGenerateResponse>(data) {
            Ok(response) => self.absorb(response, on_text),
            Err(err) => {
                parse_error.get_or_insert_with(|| LlmError::Parse(err.to_string()));
            }
        }
    }

    fn absorb<F: FnMut(&str)>(&mut self, response: GeminiGenerateResponse, on_text: &mut F) {
        if let Some(usage) = response.usage_metadata {
            self.usage = Some(LlmTokenUsageTotals {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            });
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return;
        };
        self.saw_candidate = true;
        if candidate.finish_reason.is_some() {
            self.finish_reason = candidate.finish_reason.clone();
        }
        self.safety_blocked |= candidate.is_blocked();

        let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
        for part in parts {
            if part.thought {
                continue;
            }
            if let Some(call) = part.function_call {
                self.parts.push(AssistantPart::FunctionCall {
                    id: call.id,
                    name: call.name,
                    args_json: call.args,
                    thought_signature: part.thought_signature,
                });
            } else if let Some(text) = part.text {
                if !text.is_empty() {
                    on_text(&text);
                }
                self.push_text(text, part.thought_signature);
            }
        }
    }

    fn push_text(&mut self, text: String, signature: Option<String>) {
        if let Some(AssistantPart::Text {
            text: existing,
            thought_signature,
        }) = self.parts.last_mut()
        {
            existing.push_str(&text);
            if signature.is_some() {
                *thought_signature = signature;
            }
            return;
        }

        if text.is_empty() && signature.is_none() {
            return;
        }
        self.parts.push(AssistantPart::Text {
            text,
            thought_signature: signature,
        });
    }

    fn finish(self) -> AssistantOutput {
        let candidates = if self.saw_candidate {
            vec![AssistantCandidate {
                message: AssistantMessage {
                    role: AssistantRole::Model,
                    parts: self.parts,
                },
                finish_reason: self.finish_reason,
                safety_blocked: self.safety_blocked,
            }]
        } else {
            Vec::new()
        };

        AssistantOutput {
            candidates,
            usage: self.usage,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl GeminiRequestPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
            function_response: None,
            thought_signature: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters_json_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<GeminiSafetyRating>,
}

impl GeminiCandidate {
    fn is_blocked(&self) -> bool {
        matches!(self.finish_reason.as_deref(), Some("SAFETY"))
            || self.safety_ratings.iter().any(|rating| rating.blocked)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiSafetyRating {
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
    thought_signature: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}
