use crate::llm::provider::{AssistantMessage, AssistantPart, AssistantRole};

/// Conversation memory of one chat session. It is owned by the session and
/// handed to each turn explicitly; nothing here is process-global.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<AssistantMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.push(AssistantRole::User, text.into());
    }

    pub fn add_assistant_message(&mut self, text: impl Into<String>) {
        self.push(AssistantRole::Model, text.into());
    }

    /// Appends the summary of one tool invocation, as produced by
    /// `ToolOutcome::summary`.
    pub fn record_tool_call(&mut self, summary: impl Into<String>) {
        self.add_assistant_message(summary);
    }

    pub fn messages(&self) -> &[AssistantMessage] {
        &self.messages
    }

    pub fn to_messages(&self) -> Vec<AssistantMessage> {
        self.messages.clone()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // Consecutive entries of the same role share one message so the
    // provider always sees alternating turns.
    fn push(&mut self, role: AssistantRole, text: String) {
        if text.trim().is_empty() {
            return;
        }

        match self.messages.last_mut() {
            Some(last) if last.role == role => last.parts.push(AssistantPart::text(text)),
            _ => self.messages.push(AssistantMessage {
                role,
                parts: vec![AssistantPart::text(text)],
            }),
        }
    }
}
