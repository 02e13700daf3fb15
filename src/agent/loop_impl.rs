use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::agent::actions::{SuggestedAction, extract_actions};
use crate::agent::dispatch::{FunctionCallSpec, ProverbTools, tool_declarations};
use crate::agent::history::ConversationState;
use crate::agent::prompt::{FINALIZE_INSTRUCTION, REPAIR_INSTRUCTION};
use crate::llm::provider::{
    AssistantCandidate, AssistantInput, AssistantMessage, AssistantPart, AssistantRole,
    GenerationSettings, LlmProvider, LlmTokenUsageTotals, ToolCallingMode,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub per_step_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub invalid_response_retries: usize,
    pub generation: GenerationSettings,
    pub extract_actions: bool,
    pub actions_timeout_ms: u64,
    pub actions_generation: GenerationSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            per_step_timeout_ms: 60_000,
            total_timeout_ms: 180_000,
            invalid_response_retries: 1,
            generation: GenerationSettings::default(),
            extract_actions: true,
            actions_timeout_ms: 20_000,
            actions_generation: GenerationSettings {
                temperature: 0.1,
                max_output_tokens: 4096,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAnswer {
    pub text: String,
    pub degraded: bool,
    pub actions: Vec<SuggestedAction>,
    pub usage: LlmTokenUsageTotals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentProgressEvent {
    StepStarted {
        step: usize,
    },
    TextDelta {
        step: usize,
        text: String,
    },
    ModelResponse {
        step: usize,
        tool_calls: usize,
        has_text: bool,
    },
    ToolRequest {
        step: usize,
        id: Option<String>,
        name: String,
        args_json: Value,
    },
    ToolResult {
        step: usize,
        id: Option<String>,
        name: String,
        ok: bool,
        response_json: Value,
    },
    ActionsReady {
        actions: Vec<SuggestedAction>,
    },
    ActionsUnavailable {
        reason: String,
    },
}

enum Completion {
    /// Text the model produced; `degraded` marks the no-tools fallback.
    Model { text: String, degraded: bool },
    Failed(String),
}

#[derive(Default)]
struct TurnRecord {
    transcript: Vec<String>,
    tool_summaries: Vec<String>,
    usage: LlmTokenUsageTotals,
}

/// Runs chat turns against a provider. Holds no conversation state: every
/// call gets the session's history passed in.
pub struct ChatAgent<P> {
    provider: P,
    tools: ProverbTools,
    system_prompt: String,
    config: AgentConfig,
}

impl<P: LlmProvider> ChatAgent<P> {
    pub fn new(provider: P, tools: ProverbTools, system_prompt: String, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            system_prompt,
            config,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &ProverbTools {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn run_turn<F>(
        &self,
        history: &mut ConversationState,
        user_input: &str,
        on_event: &mut F,
    ) -> AgentAnswer
    where
        F: FnMut(AgentProgressEvent) + Send,
    {
        let mut messages = history.to_messages();
        messages.push(AssistantMessage::user_text(user_input));
        let mut record = TurnRecord::default();

        let completion = self.drive(&mut messages, &mut record, on_event).await;

        if matches!(completion, Completion::Model { .. }) || !record.tool_summaries.is_empty() {
            history.add_user_message(user_input);
            for summary in &record.tool_summaries {
                history.record_tool_call(summary.clone());
            }
        }

        match completion {
            Completion::Model { text, degraded } => {
                history.add_assistant_message(text.clone());
                let actions = self.suggest_actions(&text, on_event).await;
                AgentAnswer {
                    text,
                    degraded,
                    actions,
                    usage: record.usage,
                }
            }
            Completion::Failed(text) => AgentAnswer {
                text,
                degraded: true,
                actions: Vec::new(),
                usage: record.usage,
            },
        }
    }

    async fn drive<F>(
        &self,
        messages: &mut Vec<AssistantMessage>,
        record: &mut TurnRecord,
        on_event: &mut F,
    ) -> Completion
    where
        F: FnMut(AgentProgressEvent) + Send,
    {
        let total_deadline = Instant::now() + Duration::from_millis(self.config.total_timeout_ms);
        let mut invalid_response_attempts = 0usize;

        for step in 1..=self.config.max_steps {
            on_event(AgentProgressEvent::StepStarted { step });

            let Some(timeout_budget) = self.step_budget(total_deadline) else {
                return Completion::Failed(
                    "Assistant hit the total time limit while answering.".to_string(),
                );
            };

            let llm = timeout(
                timeout_budget,
                self.provider
                    .generate_stream(self.step_input(messages, true), |text| {
                        on_event(AgentProgressEvent::TextDelta {
                            step,
                            text: text.to_string(),
                        })
                    }),
            )
            .await;

            let output = match llm {
                Ok(Ok(output)) => output,
                Ok(Err(err)) => {
                    return Completion::Failed(format!("Assistant request failed: {err}"));
                }
                Err(_) => {
                    return Completion::Failed(
                        "Assistant hit a per-step timeout while answering.".to_string(),
                    );
                }
            };
            if let Some(usage) = &output.usage {
                record.usage.add(usage);
            }

            let Some(candidate) = select_candidate(&output.candidates) else {
                if invalid_response_attempts >= self.config.invalid_response_retries {
                    return Completion::Failed(
                        "Assistant returned an invalid response repeatedly and could not answer."
                            .to_string(),
                    );
                }
                invalid_response_attempts += 1;
                messages.push(AssistantMessage::user_text(REPAIR_INSTRUCTION));
                continue;
            };

            let calls = extract_function_calls(&candidate.message.parts);
            let text = extract_text(&candidate.message.parts);
            on_event(AgentProgressEvent::ModelResponse {
                step,
                tool_calls: calls.len(),
                has_text: !text.is_empty(),
            });

            messages.push(candidate.message.clone());
            if !text.is_empty() {
                record.transcript.push(text);
            }

            if calls.is_empty() {
                if !record.transcript.is_empty() {
                    return Completion::Model {
                        text: record.transcript.join("\n\n"),
                        degraded: false,
                    };
                }

                if invalid_response_attempts >= self.config.invalid_response_retries {
                    return Completion::Failed(
                        "Assistant returned an empty response repeatedly and could not answer."
                            .to_string(),
                    );
                }
                invalid_response_attempts += 1;
                messages.push(AssistantMessage::user_text(REPAIR_INSTRUCTION));
                continue;
            }

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                on_event(AgentProgressEvent::ToolRequest {
                    step,
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args_json: call.args_json.clone(),
                });

                let outcome = self.tools.dispatch(call);
                on_event(AgentProgressEvent::ToolResult {
                    step,
                    id: call.id.clone(),
                    name: call.name.clone(),
                    ok: outcome.ok,
                    response_json: outcome.response_json().clone(),
                });
                record.tool_summaries.push(outcome.summary);
                responses.push(outcome.response);
            }
            messages.push(AssistantMessage {
                role: AssistantRole::User,
                parts: responses,
            });
        }

        if let Some(timeout_budget) = self.step_budget(total_deadline)
            && let Some(text) = self.finalize_without_tools(messages, timeout_budget, record).await
        {
            record.transcript.push(text);
            return Completion::Model {
                text: record.transcript.join("\n\n"),
                degraded: true,
            };
        }

        Completion::Failed("Assistant reached the step limit while answering.".to_string())
    }

    fn step_budget(&self, total_deadline: Instant) -> Option<Duration> {
        let now = Instant::now();
        if now >= total_deadline {
            return None;
        }
        let remaining = total_deadline.duration_since(now);
        let budget = Duration::from_millis(self.config.per_step_timeout_ms).min(remaining);
        (!budget.is_zero()).then_some(budget)
    }

    fn step_input(&self, messages: &[AssistantMessage], with_tools: bool) -> AssistantInput {
        let (system_instruction, tools, tool_calling_mode) = if with_tools {
            (self.system_prompt.clone(), tool_declarations(), ToolCallingMode::Auto)
        } else {
            (
                format!("{}\n\n{FINALIZE_INSTRUCTION}", self.system_prompt),
                vec![],
                ToolCallingMode::None,
            )
        };

        AssistantInput {
            system_instruction: Some(system_instruction),
            messages: messages.to_vec(),
            tools,
            tool_calling_mode,
            generation: self.config.generation,
        }
    }

    async fn finalize_without_tools(
        &self,
        messages: &[AssistantMessage],
        timeout_budget: Duration,
        record: &mut TurnRecord,
    ) -> Option<String> {
        let output = timeout(
            timeout_budget,
            self.provider.generate(self.step_input(messages, false)),
        )
        .await
        .ok()?
        .ok()?;
        if let Some(usage) = &output.usage {
            record.usage.add(usage);
        }

        let candidate = select_candidate(&output.candidates)?;
        let text = extract_text(&candidate.message.parts);
        if text.is_empty() { None } else { Some(text) }
    }

    async fn suggest_actions<F>(&self, answer: &str, on_event: &mut F) -> Vec<SuggestedAction>
    where
        F: FnMut(AgentProgressEvent) + Send,
    {
        if !self.config.extract_actions {
            return Vec::new();
        }

        let budget = Duration::from_millis(self.config.actions_timeout_ms);
        match timeout(
            budget,
            extract_actions(&self.provider, answer, self.config.actions_generation),
        )
        .await
        {
            Ok(Ok(actions)) => {
                on_event(AgentProgressEvent::ActionsReady {
                    actions: actions.clone(),
                });
                actions
            }
            Ok(Err(err)) => {
                on_event(AgentProgressEvent::ActionsUnavailable {
                    reason: err.to_string(),
                });
                Vec::new()
            }
            Err(_) => {
                on_event(AgentProgressEvent::ActionsUnavailable {
                    reason: "action extraction timed out".to_string(),
                });
                Vec::new()
            }
        }
    }
}

fn select_candidate(candidates: &[AssistantCandidate]) -> Option<&AssistantCandidate> {
    candidates
        .iter()
        .find(|candidate| {
            is_usable_candidate(candidate)
                && !has_function_calls(&candidate.message.parts)
                && has_non_empty_text(&candidate.message.parts)
        })
        .or_else(|| {
            candidates.iter().find(|candidate| {
                is_usable_candidate(candidate) && has_function_calls(&candidate.message.parts)
            })
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|candidate| is_usable_candidate(candidate))
        })
}

fn is_acceptable_finish_reason(reason: Option<&str>) -> bool {
    !matches!(
        reason,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT")
    )
}

fn is_usable_candidate(candidate: &AssistantCandidate) -> bool {
    !candidate.safety_blocked
        && !candidate.message.parts.is_empty()
        && is_acceptable_finish_reason(candidate.finish_reason.as_deref())
}

fn has_function_calls(parts: &[AssistantPart]) -> bool {
    parts
        .iter()
        .any(|part| matches!(part, AssistantPart::FunctionCall { .. }))
}

fn has_non_empty_text(parts: &[AssistantPart]) -> bool {
    !extract_text(parts).is_empty()
}

fn extract_function_calls(parts: &[AssistantPart]) -> Vec<FunctionCallSpec> {
    parts
        .iter()
        .filter_map(|part| match part {
            AssistantPart::FunctionCall {
                id,
                name,
                args_json,
                ..
            } => Some(FunctionCallSpec {
                id: id.clone(),
                name: name.clone(),
                args_json: args_json.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn extract_text(parts: &[AssistantPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            AssistantPart::Text { text, .. } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
