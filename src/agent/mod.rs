pub mod actions;
pub mod dispatch;
pub mod history;
mod loop_impl;
pub mod prompt;

pub use actions::SuggestedAction;
pub use history::ConversationState;
pub use loop_impl::{AgentAnswer, AgentConfig, AgentProgressEvent, ChatAgent};
