use std::mem;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::agent::dispatch::format_args_summary;
use crate::agent::{AgentAnswer, AgentProgressEvent, ChatAgent, ConversationState};
use crate::cli::commands::{Command, HELP_TEXT, is_command_line, parse_command};
use crate::cli::starters::STARTERS;
use crate::cli::theme::Theme;
use crate::cli::timeline::{
    AssistantStepEvent, AssistantTurn, AssistantTurnState, OutputKind, Timeline,
};
use crate::config::{ThemeConfig, ThemeToken};
use crate::llm::gemini::GeminiProvider;
use crate::trace::SessionTrace;

pub(crate) const INPUT_PROMPT: &str = "> ";
const MAX_INPUT_ROWS: usize = 5;
const MAX_ACTION_ROWS: usize = 4;
const SCROLL_STEP: usize = 3;
pub(crate) const MISSING_KEY_MESSAGE: &str = "Assistant unavailable: missing GEMINI_API_KEY. Set it in your shell, a .env file or the config file.";
const BUSY_MESSAGE: &str = "The assistant is still answering. Wait for the current turn to finish.";

pub type SharedAgent = Arc<ChatAgent<GeminiProvider>>;

/// Everything one chat session owns besides the screen.
pub struct AppState {
    pub session_id: String,
    pub agent: Option<SharedAgent>,
    pub history: ConversationState,
    pub theme: ThemeConfig,
    pub color_enabled: bool,
    pub trace: SessionTrace,
    pub startup_notice: Option<String>,
}

/// Result of feeding one input event to the app.
pub enum KeyOutcome {
    None,
    Quit,
    StartTurn(TurnRequest),
}

/// A turn handed off to whoever drives the event loop. The session's
/// history travels with it and comes back in [`TurnOutcome`].
pub struct TurnRequest {
    agent: SharedAgent,
    history: ConversationState,
    input: String,
}

impl TurnRequest {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub async fn run<F>(self, on_event: &mut F) -> TurnOutcome
    where
        F: FnMut(AgentProgressEvent) + Send,
    {
        let Self {
            agent,
            mut history,
            input,
        } = self;
        let answer = agent.run_turn(&mut history, &input, on_event).await;
        TurnOutcome { history, answer }
    }
}

pub struct TurnOutcome {
    pub history: ConversationState,
    pub answer: AgentAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActionButton {
    label: String,
    message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiRegions {
    pub timeline: Rect,
    pub actions: Rect,
    pub input: Rect,
    pub status: Rect,
}

/// Read-only snapshot of the app for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiStateView {
    pub input: String,
    pub cursor: usize,
    pub timeline_scroll: usize,
    pub show_steps: bool,
    pub turn_in_flight: bool,
    pub action_labels: Vec<String>,
    pub selected_action: Option<String>,
    pub history_len: usize,
}

pub struct App {
    state: AppState,
    theme: Theme,
    timeline: Timeline,
    input: String,
    cursor: usize,
    input_history: Vec<String>,
    history_index: Option<usize>,
    history_draft: String,
    buttons: Vec<ActionButton>,
    selected_button: Option<usize>,
    button_hits: Vec<(Rect, usize)>,
    show_steps: bool,
    timeline_scroll: usize,
    max_scroll: usize,
    regions: UiRegions,
    turn_index: Option<usize>,
}

impl App {
    pub fn new(state: AppState) -> Self {
        let theme = Theme::from_config(state.color_enabled, &state.theme);
        let mut app = Self {
            theme,
            timeline: Timeline::new(),
            input: String::new(),
            cursor: 0,
            input_history: Vec::new(),
            history_index: None,
            history_draft: String::new(),
            buttons: Vec::new(),
            selected_button: None,
            button_hits: Vec::new(),
            show_steps: false,
            timeline_scroll: 0,
            max_scroll: 0,
            regions: UiRegions::default(),
            turn_index: None,
            state,
        };
        if let Some(notice) = app.state.startup_notice.take() {
            let kind = if app.state.agent.is_none() {
                OutputKind::SystemError
            } else {
                OutputKind::SystemInfo
            };
            app.state.trace.log_info(&notice);
            app.timeline.push_output(kind, &notice);
        }
        app.offer_starters();
        app
    }

    pub fn history(&self) -> &ConversationState {
        &self.state.history
    }

    pub fn trace(&self) -> &SessionTrace {
        &self.state.trace
    }

    pub fn regions(&self) -> UiRegions {
        self.regions
    }

    pub fn ui_state_view(&self) -> UiStateView {
        UiStateView {
            input: self.input.clone(),
            cursor: self.cursor,
            timeline_scroll: self.timeline_scroll,
            show_steps: self.show_steps,
            turn_in_flight: self.turn_index.is_some(),
            action_labels: self
                .buttons
                .iter()
                .map(|button| button.label.clone())
                .collect(),
            selected_action: self
                .selected_button
                .and_then(|index| self.buttons.get(index))
                .map(|button| button.label.clone()),
            history_len: self.state.history.len(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c' | 'd') if ctrl => return KeyOutcome::Quit,
            KeyCode::Char('t') if ctrl => self.set_show_steps(!self.show_steps),
            KeyCode::Char('u') if ctrl => {
                self.input.clear();
                self.cursor = 0;
            }
            KeyCode::Char(ch) if !ctrl => self.insert_char(ch),
            KeyCode::Enter => return self.submit_input(),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.remove_char_at_cursor();
                }
            }
            KeyCode::Delete => self.remove_char_at_cursor(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.input_len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input_len(),
            KeyCode::Up => self.history_prev(),
            KeyCode::Down => self.history_next(),
            KeyCode::Tab => self.select_next_button(),
            KeyCode::BackTab => self.select_prev_button(),
            KeyCode::Esc => self.selected_button = None,
            KeyCode::PageUp => self.scroll_up(self.page_size()),
            KeyCode::PageDown => self.scroll_down(self.page_size()),
            _ => {}
        }
        KeyOutcome::None
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> KeyOutcome {
        let position = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::ScrollUp if self.regions.timeline.contains(position) => {
                self.scroll_up(SCROLL_STEP);
            }
            MouseEventKind::ScrollDown if self.regions.timeline.contains(position) => {
                self.scroll_down(SCROLL_STEP);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let hit = self
                    .button_hits
                    .iter()
                    .find(|(rect, _)| rect.contains(position))
                    .map(|(_, index)| *index);
                if let Some(index) = hit {
                    self.selected_button = Some(index);
                    return self.activate_selected_button();
                }
            }
            _ => {}
        }
        KeyOutcome::None
    }

    pub fn apply_agent_event(&mut self, event: AgentProgressEvent) {
        let trace = self.state.trace.clone();
        match event {
            AgentProgressEvent::StepStarted { step } => {
                trace.log_step(&format!("step {step} started"));
            }
            AgentProgressEvent::TextDelta { step, text } => {
                if let Some(turn) = self.current_turn_mut() {
                    turn.push_delta(step, &text);
                }
            }
            AgentProgressEvent::ModelResponse {
                step,
                tool_calls,
                has_text,
            } => {
                trace.log_step(&format!(
                    "step {step} response: tool_calls={tool_calls} has_text={has_text}"
                ));
            }
            AgentProgressEvent::ToolRequest {
                name, args_json, ..
            } => {
                trace.log_tool_call(&format!("{name} {args_json}"));
                let text = format!("-> {name}({})", format_args_summary(&args_json));
                if let Some(turn) = self.current_turn_mut() {
                    turn.events.push(AssistantStepEvent::ToolRequest { text });
                }
            }
            AgentProgressEvent::ToolResult {
                name,
                ok,
                response_json,
                ..
            } => {
                trace.log_tool_result(&format!("{name} {response_json}"));
                let text = if ok {
                    format!("<- {name}: ok")
                } else {
                    let code = response_json
                        .pointer("/error/code")
                        .and_then(|code| code.as_str())
                        .unwrap_or("error");
                    format!("<- {name}: {code}")
                };
                if let Some(turn) = self.current_turn_mut() {
                    turn.events.push(AssistantStepEvent::ToolResult { text, ok });
                }
            }
            AgentProgressEvent::ActionsReady { actions } => {
                let labels = actions
                    .iter()
                    .map(|action| action.text.as_str())
                    .collect::<Vec<_>>();
                trace.log_actions(&format!("{} suggested: {}", labels.len(), labels.join(" | ")));
            }
            AgentProgressEvent::ActionsUnavailable { reason } => {
                trace.log_actions(&format!("unavailable: {reason}"));
            }
        }
    }

    pub fn finish_turn(&mut self, outcome: TurnOutcome) {
        let TurnOutcome { history, answer } = outcome;
        self.state.history = history;
        if answer.degraded {
            self.state.trace.log_error(&answer.text);
        } else {
            self.state.trace.log_assistant_output(&answer.text);
        }
        if !answer.usage.is_zero() {
            self.state.trace.log_step(&format!(
                "tokens in={} out={} total={}",
                answer.usage.input_tokens, answer.usage.output_tokens, answer.usage.total_tokens
            ));
        }

        if let Some(turn) = self.current_turn_mut() {
            turn.state = if answer.degraded {
                AssistantTurnState::CompletedError(answer.text.clone())
            } else {
                AssistantTurnState::CompletedText(answer.text.clone())
            };
            turn.token_usage = Some(answer.usage);
        }
        self.turn_index = None;

        self.buttons = answer
            .actions
            .into_iter()
            .map(|action| ActionButton {
                message: action.text.clone(),
                label: action.text,
            })
            .collect();
        self.selected_button = None;
        self.timeline_scroll = 0;
    }

    pub fn render(&mut self, frame: &mut Frame<'_>) {
        let regions = self.compute_regions(frame.area());
        self.regions = regions;

        self.render_timeline(frame, regions.timeline);
        self.render_actions(frame, regions.actions);
        self.render_input(frame, regions.input);
        self.render_status(frame, regions.status);
    }

    fn compute_regions(&self, area: Rect) -> UiRegions {
        let width = usize::from(area.width);
        let action_rows = if self.buttons.is_empty() {
            0
        } else {
            layout_button_rows(&self.button_widths(), width)
                .len()
                .min(MAX_ACTION_ROWS)
        };
        let input_rows = wrapped_row_count(INPUT_PROMPT.chars().count() + self.input_len() + 1, width)
            .clamp(1, MAX_INPUT_ROWS);

        let [timeline, actions, input, status] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(action_rows as u16),
            Constraint::Length(input_rows as u16),
            Constraint::Length(1),
        ])
        .areas(area);

        UiRegions {
            timeline,
            actions,
            input,
            status,
        }
    }

    fn render_timeline(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let lines = wrap_lines(
            self.timeline.render_lines(&self.theme, self.show_steps),
            usize::from(area.width),
        );
        let height = usize::from(area.height);
        self.max_scroll = lines.len().saturating_sub(height);
        self.timeline_scroll = self.timeline_scroll.min(self.max_scroll);
        let top = self.max_scroll - self.timeline_scroll;

        let visible = lines.into_iter().skip(top).take(height).collect::<Vec<_>>();
        frame.render_widget(Paragraph::new(visible), area);
    }

    fn render_actions(&mut self, frame: &mut Frame<'_>, area: Rect) {
        self.button_hits.clear();
        if area.height == 0 {
            return;
        }

        let rows = layout_button_rows(&self.button_widths(), usize::from(area.width));
        let mut lines = Vec::new();
        for (row_index, row) in rows.iter().take(usize::from(area.height)).enumerate() {
            let mut spans = Vec::new();
            let mut x = area.x;
            for &index in row {
                let button = &self.buttons[index];
                let token = if self.selected_button == Some(index) {
                    ThemeToken::ActionSelected
                } else {
                    ThemeToken::ActionButton
                };
                let text = button_text(&button.label);
                let width = text.chars().count() as u16;
                self.button_hits.push((
                    Rect::new(x, area.y + row_index as u16, width, 1).intersection(area),
                    index,
                ));
                spans.push(Span::styled(text, self.theme.style(token)));
                spans.push(Span::raw(" "));
                x = x.saturating_add(width + 1);
            }
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_input(&self, frame: &mut Frame<'_>, area: Rect) {
        let width = usize::from(area.width);
        let line = Line::from(vec![
            Span::styled(INPUT_PROMPT, self.theme.style(ThemeToken::UserPrompt)),
            Span::styled(self.input.clone(), self.theme.style(ThemeToken::UserInput)),
        ]);
        let lines = wrap_lines(vec![line], width);
        let skip = lines.len().saturating_sub(usize::from(area.height));
        let visible = lines.into_iter().skip(skip).collect::<Vec<_>>();
        frame.render_widget(
            Paragraph::new(visible).block(Block::default().style(self.theme.style(ThemeToken::InputBlock))),
            area,
        );

        if width > 0 {
            let offset = INPUT_PROMPT.chars().count() + self.cursor;
            let row = (offset / width).saturating_sub(skip);
            frame.set_cursor_position(Position::new(
                area.x + (offset % width) as u16,
                area.y + (row as u16).min(area.height.saturating_sub(1)),
            ));
        }
    }

    fn render_status(&self, frame: &mut Frame<'_>, area: Rect) {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                self.status_text(),
                self.theme.style(ThemeToken::Status),
            ))),
            area,
        );
    }

    fn status_text(&self) -> String {
        let state = if self.state.agent.is_none() {
            "assistant unavailable"
        } else if self.turn_index.is_some() {
            "thinking..."
        } else {
            "ready"
        };
        let steps = if self.show_steps { "on" } else { "off" };
        let scroll = if self.timeline_scroll > 0 {
            format!(" | scrolled {}", self.timeline_scroll)
        } else {
            String::new()
        };
        format!(
            "{state} | steps {steps} | session {}{scroll} | Ctrl-C quits",
            self.state.session_id
        )
    }

    fn submit_input(&mut self) -> KeyOutcome {
        if self.input.trim().is_empty() {
            self.input.clear();
            self.cursor = 0;
            return self.activate_selected_button();
        }

        let line = mem::take(&mut self.input);
        self.cursor = 0;
        self.history_index = None;
        self.history_draft.clear();
        let line = line.trim().to_string();
        if self.input_history.last() != Some(&line) {
            self.input_history.push(line.clone());
        }

        if is_command_line(&line) {
            return self.run_command_line(&line);
        }
        self.start_turn(line)
    }

    fn activate_selected_button(&mut self) -> KeyOutcome {
        let Some(button) = self
            .selected_button
            .and_then(|index| self.buttons.get(index))
            .cloned()
        else {
            return KeyOutcome::None;
        };
        self.start_turn(button.message)
    }

    fn start_turn(&mut self, text: String) -> KeyOutcome {
        if self.turn_index.is_some() {
            self.timeline.push_output(OutputKind::SystemInfo, BUSY_MESSAGE);
            return KeyOutcome::None;
        }

        self.buttons.clear();
        self.selected_button = None;
        self.timeline_scroll = 0;
        self.state.trace.log_user_input(&text);

        let Some(agent) = self.state.agent.clone() else {
            self.timeline.push_user_message(&text);
            self.timeline.push_output(OutputKind::SystemError, MISSING_KEY_MESSAGE);
            self.state.trace.log_error(MISSING_KEY_MESSAGE);
            return KeyOutcome::None;
        };

        self.turn_index = Some(self.timeline.push_assistant_turn(text.clone()));
        KeyOutcome::StartTurn(TurnRequest {
            agent,
            history: mem::take(&mut self.state.history),
            input: text,
        })
    }

    fn run_command_line(&mut self, line: &str) -> KeyOutcome {
        self.timeline.push_user_message(line);
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                self.timeline
                    .push_output(OutputKind::SystemError, err.message());
                return KeyOutcome::None;
            }
        };

        match command {
            Command::Help => self.timeline.push_output(OutputKind::SystemInfo, HELP_TEXT),
            Command::Clear => {
                if self.turn_index.is_some() {
                    self.timeline.push_output(OutputKind::SystemInfo, BUSY_MESSAGE);
                } else {
                    self.timeline.clear();
                    self.timeline_scroll = 0;
                }
            }
            Command::History(limit) => self.show_input_history(limit),
            Command::Trace => {
                let text = format!("Trace file: {}", self.state.trace.file_path().display());
                self.timeline.push_output(OutputKind::SystemInfo, &text);
            }
            Command::Steps(Some(value)) => self.set_show_steps(value),
            Command::Steps(None) => {
                let text = format!(
                    "Assistant steps are {}.",
                    if self.show_steps { "shown" } else { "hidden" }
                );
                self.timeline.push_output(OutputKind::SystemInfo, &text);
            }
            Command::Starters => self.offer_starters(),
            Command::Reset => {
                if self.turn_index.is_some() {
                    self.timeline.push_output(OutputKind::SystemInfo, BUSY_MESSAGE);
                } else {
                    self.state.history.clear();
                    self.state.trace.log_info("conversation reset");
                    self.timeline
                        .push_output(OutputKind::SystemInfo, "Conversation reset.");
                    self.offer_starters();
                }
            }
            Command::Quit => return KeyOutcome::Quit,
        }
        KeyOutcome::None
    }

    fn show_input_history(&mut self, limit: Option<usize>) {
        // The /history line itself is the newest entry; leave it out.
        let entries = &self.input_history[..self.input_history.len().saturating_sub(1)];
        if entries.is_empty() {
            self.timeline
                .push_output(OutputKind::SystemInfo, "No input history yet.");
            return;
        }
        let start = limit.map_or(0, |n| entries.len().saturating_sub(n));
        let text = entries[start..]
            .iter()
            .enumerate()
            .map(|(offset, entry)| format!("{:>3}  {entry}", start + offset + 1))
            .collect::<Vec<_>>()
            .join("\n");
        self.timeline.push_output(OutputKind::SystemInfo, &text);
    }

    fn offer_starters(&mut self) {
        self.buttons = STARTERS
            .iter()
            .map(|starter| ActionButton {
                label: starter.label.to_string(),
                message: starter.message.to_string(),
            })
            .collect();
        self.selected_button = None;
    }

    fn set_show_steps(&mut self, value: bool) {
        self.show_steps = value;
    }

    fn select_next_button(&mut self) {
        if self.buttons.is_empty() {
            return;
        }
        self.selected_button = Some(match self.selected_button {
            Some(index) => (index + 1) % self.buttons.len(),
            None => 0,
        });
    }

    fn select_prev_button(&mut self) {
        if self.buttons.is_empty() {
            return;
        }
        let last = self.buttons.len() - 1;
        self.selected_button = Some(match self.selected_button {
            Some(0) | None => last,
            Some(index) => index - 1,
        });
    }

    fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => {
                self.history_draft = self.input.clone();
                self.input_history.len() - 1
            }
            Some(index) => index.saturating_sub(1),
        };
        self.history_index = Some(index);
        self.set_input(self.input_history[index].clone());
    }

    fn history_next(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.input_history.len() {
            self.history_index = Some(index + 1);
            self.set_input(self.input_history[index + 1].clone());
        } else {
            self.history_index = None;
            let draft = mem::take(&mut self.history_draft);
            self.set_input(draft);
        }
    }

    fn set_input(&mut self, text: String) {
        self.input = text;
        self.cursor = self.input_len();
    }

    fn insert_char(&mut self, ch: char) {
        let byte_index = self.byte_index(self.cursor);
        self.input.insert(byte_index, ch);
        self.cursor += 1;
    }

    fn remove_char_at_cursor(&mut self) {
        if self.cursor < self.input_len() {
            let byte_index = self.byte_index(self.cursor);
            self.input.remove(byte_index);
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map_or(self.input.len(), |(index, _)| index)
    }

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    fn scroll_up(&mut self, amount: usize) {
        self.timeline_scroll = (self.timeline_scroll + amount).min(self.max_scroll);
    }

    fn scroll_down(&mut self, amount: usize) {
        self.timeline_scroll = self.timeline_scroll.saturating_sub(amount);
    }

    fn page_size(&self) -> usize {
        usize::from(self.regions.timeline.height).saturating_sub(1).max(1)
    }

    fn button_widths(&self) -> Vec<usize> {
        self.buttons
            .iter()
            .map(|button| button_text(&button.label).chars().count())
            .collect()
    }

    fn current_turn_mut(&mut self) -> Option<&mut AssistantTurn> {
        let index = self.turn_index?;
        self.timeline.assistant_turn_mut(index)
    }
}

fn button_text(label: &str) -> String {
    format!("[ {label} ]")
}

/// Packs buttons left to right into rows of at most `width` columns,
/// one space apart. A button wider than the row gets a row of its own.
fn layout_button_rows(widths: &[usize], width: usize) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = Vec::new();
    let mut used = 0usize;
    for (index, &button_width) in widths.iter().enumerate() {
        match rows.last_mut() {
            Some(row) if used + 1 + button_width <= width => {
                row.push(index);
                used += 1 + button_width;
            }
            _ => {
                rows.push(vec![index]);
                used = button_width;
            }
        }
    }
    rows
}

fn wrapped_row_count(chars: usize, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    chars.div_ceil(width).max(1)
}

/// Hard-wraps styled lines at `width` characters so the scroll math knows
/// exactly how many rows the timeline occupies.
fn wrap_lines(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return lines;
    }

    let mut wrapped = Vec::with_capacity(lines.len());
    for line in lines {
        let mut current: Vec<Span<'static>> = Vec::new();
        let mut used = 0usize;
        let mut emitted = false;
        for span in line.spans {
            let style = span.style;
            let content = span.content.into_owned();
            let mut rest = content.as_str();
            while !rest.is_empty() {
                let split = rest
                    .char_indices()
                    .nth(width - used)
                    .map_or(rest.len(), |(index, _)| index);
                let (head, tail) = rest.split_at(split);
                used += head.chars().count();
                current.push(Span::styled(head.to_string(), style));
                rest = tail;
                if used == width {
                    wrapped.push(Line::from(mem::take(&mut current)));
                    used = 0;
                    emitted = true;
                }
            }
        }
        if !current.is_empty() || !emitted {
            wrapped.push(Line::from(current));
        }
    }
    wrapped
}
