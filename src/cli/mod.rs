mod app;
mod args;
mod commands;
mod starters;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub(crate) mod theme;
mod timeline;
mod tui;

pub use app::{App, AppState, KeyOutcome, SharedAgent, TurnOutcome, TurnRequest, UiRegions, UiStateView};
pub use args::CliArgs;
pub use tui::run_tui;
pub(crate) use app::MISSING_KEY_MESSAGE;
