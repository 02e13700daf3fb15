//! Headless driver for the chat screen. Runs on ratatui's `TestBackend`
//! and executes assistant turns inline, so a test observes the screen
//! exactly as it looks once each turn has finished.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::Terminal;
use ratatui::backend::TestBackend;

use crate::agent::{AgentConfig, ChatAgent, ConversationState};
use crate::agent::dispatch::ProverbTools;
use crate::cli::app::{App, AppState, KeyOutcome, SharedAgent, TurnRequest, UiRegions, UiStateView};
use crate::config::ThemeConfig;
use crate::http::client::HttpClient;
use crate::llm::gemini::GeminiProvider;
use crate::trace::SessionTrace;

pub struct UiHarness {
    terminal: Terminal<TestBackend>,
    app: App,
    quit: bool,
}

impl UiHarness {
    pub fn new(width: u16, height: u16, state: AppState) -> Result<Self> {
        let terminal = Terminal::new(TestBackend::new(width, height))?;
        Ok(Self {
            terminal,
            app: App::new(state),
            quit: false,
        })
    }

    pub fn render(&mut self) -> Result<()> {
        let app = &mut self.app;
        self.terminal.draw(|frame| app.render(frame))?;
        Ok(())
    }

    pub async fn send_key(&mut self, key: KeyEvent) -> Result<()> {
        let outcome = self.app.handle_key(key);
        self.apply_outcome(outcome).await?;
        self.render()
    }

    pub async fn send_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        let outcome = self.app.handle_mouse(mouse);
        self.apply_outcome(outcome).await?;
        self.render()
    }

    pub fn regions(&self) -> Result<UiRegions> {
        let regions = self.app.regions();
        if regions.status.height == 0 {
            return Err(anyhow!("screen has not been rendered yet"));
        }
        Ok(regions)
    }

    pub fn buffer_lines(&self) -> Vec<String> {
        let buffer = self.terminal.backend().buffer();
        let area = buffer.area;
        (area.y..area.y + area.height)
            .map(|y| {
                (area.x..area.x + area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    pub fn ui_state_view(&self) -> UiStateView {
        self.app.ui_state_view()
    }

    pub fn history(&self) -> &ConversationState {
        self.app.history()
    }

    pub fn trace_path(&self) -> &Path {
        self.app.trace().file_path()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    async fn apply_outcome(&mut self, outcome: KeyOutcome) -> Result<()> {
        match outcome {
            KeyOutcome::None => {}
            KeyOutcome::Quit => self.quit = true,
            KeyOutcome::StartTurn(request) => self.run_turn(request).await,
        }
        Ok(())
    }

    async fn run_turn(&mut self, request: TurnRequest) {
        let app = &mut self.app;
        let outcome = request.run(&mut |event| app.apply_agent_event(event)).await;
        self.app.finish_turn(outcome);
    }
}

/// Session state with colors off and the trace written under `trace_dir`.
pub fn deterministic_app_state(
    session_id: &str,
    trace_dir: &Path,
    agent: Option<SharedAgent>,
) -> Result<AppState> {
    Ok(AppState {
        session_id: session_id.to_string(),
        agent,
        history: ConversationState::new(),
        theme: ThemeConfig::default(),
        color_enabled: false,
        trace: SessionTrace::create_in_dir(session_id, trace_dir)?,
        startup_notice: None,
    })
}

/// Agent talking to a Gemini-compatible server at `base_url`. Action
/// suggestions are disabled unless `extract_actions` is set, which keeps
/// mock servers down to the main conversation requests.
pub fn gemini_agent(
    base_url: &str,
    tools: ProverbTools,
    system_prompt: &str,
    extract_actions: bool,
) -> Result<SharedAgent> {
    let provider = GeminiProvider::new(
        HttpClient::new(reqwest::Client::new()),
        Some("test-key".to_string()),
        "gemini-test".to_string(),
        base_url.to_string(),
    )?;
    let config = AgentConfig {
        extract_actions,
        ..AgentConfig::default()
    };
    Ok(Arc::new(ChatAgent::new(
        provider,
        tools,
        system_prompt.to_string(),
        config,
    )))
}
