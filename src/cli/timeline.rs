use crate::cli::theme::Theme;
use crate::config::ThemeToken;
use crate::llm::provider::LlmTokenUsageTotals;
use ratatui::text::{Line, Span};

pub(crate) const WELCOME_TEXT: &str = "Welcome to ProverbChat. Ask about Hungarian proverbs or pick a suggestion below (Tab selects, Enter sends). /help lists commands.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputKind {
    SystemInfo,
    SystemError,
}

#[derive(Debug, Clone)]
pub(crate) enum TimelineEntry {
    UserMessage(String),
    OutputLine { kind: OutputKind, text: String },
    AssistantTurn(AssistantTurn),
}

#[derive(Debug, Clone)]
pub(crate) struct AssistantTurn {
    pub(crate) prompt: String,
    pub(crate) events: Vec<AssistantStepEvent>,
    pub(crate) streamed: String,
    last_streamed_step: Option<usize>,
    pub(crate) state: AssistantTurnState,
    pub(crate) token_usage: Option<LlmTokenUsageTotals>,
}

impl AssistantTurn {
    /// Appends streamed text. A new step starts a new paragraph.
    pub(crate) fn push_delta(&mut self, step: usize, text: &str) {
        if self.last_streamed_step.is_some_and(|last| last != step) && !self.streamed.is_empty() {
            self.streamed.push_str("\n\n");
        }
        self.last_streamed_step = Some(step);
        self.streamed.push_str(text);
    }
}

#[derive(Debug, Clone)]
pub(crate) enum AssistantTurnState {
    InFlight,
    CompletedText(String),
    CompletedError(String),
}

#[derive(Debug, Clone)]
pub(crate) enum AssistantStepEvent {
    ToolRequest { text: String },
    ToolResult { text: String, ok: bool },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_output(&mut self, kind: OutputKind, text: &str) {
        for line in split_output_lines(text) {
            self.entries.push(TimelineEntry::OutputLine {
                kind,
                text: line.to_string(),
            });
        }
    }

    pub(crate) fn push_user_message(&mut self, text: &str) {
        self.entries
            .push(TimelineEntry::UserMessage(text.to_string()));
    }

    pub(crate) fn push_assistant_turn(&mut self, prompt: String) -> usize {
        let index = self.entries.len();
        self.entries
            .push(TimelineEntry::AssistantTurn(AssistantTurn {
                prompt,
                events: Vec::new(),
                streamed: String::new(),
                last_streamed_step: None,
                state: AssistantTurnState::InFlight,
                token_usage: None,
            }));
        index
    }

    pub(crate) fn assistant_turn_mut(&mut self, index: usize) -> Option<&mut AssistantTurn> {
        match self.entries.get_mut(index) {
            Some(TimelineEntry::AssistantTurn(turn)) => Some(turn),
            _ => None,
        }
    }

    pub(crate) fn render_lines(
        &self,
        theme: &Theme,
        show_assistant_steps: bool,
    ) -> Vec<Line<'static>> {
        if self.entries.is_empty() {
            return vec![Line::from(Span::styled(
                WELCOME_TEXT,
                theme.style(ThemeToken::SystemInfo),
            ))];
        }

        let context = RenderContext {
            theme,
            show_assistant_steps,
        };
        let mut lines = Vec::new();
        for entry in &self.entries {
            widget_for_entry(entry).render(&context, &mut lines);
        }

        lines
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

trait TimelineWidget {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>);
}

struct RenderContext<'a> {
    theme: &'a Theme,
    show_assistant_steps: bool,
}

impl RenderContext<'_> {
    fn prompt_line(&self, text: &str) -> Line<'static> {
        Line::from(vec![
            Span::styled("you> ", self.theme.style(ThemeToken::UserPrompt)),
            Span::styled(text.to_string(), self.theme.style(ThemeToken::UserInput)),
        ])
    }

    fn styled_lines(&self, text: &str, token: ThemeToken, lines: &mut Vec<Line<'static>>) {
        for line in split_output_lines(text) {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                self.theme.style(token),
            )));
        }
    }
}

struct UserMessageWidget<'a> {
    text: &'a str,
}

impl TimelineWidget for UserMessageWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        lines.push(context.prompt_line(self.text));
    }
}

struct OutputLineWidget<'a> {
    kind: OutputKind,
    text: &'a str,
}

impl TimelineWidget for OutputLineWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        lines.push(Line::from(Span::styled(
            self.text.to_string(),
            context.theme.style(output_token_for(self.kind)),
        )));
    }
}

struct AssistantTurnWidget<'a> {
    turn: &'a AssistantTurn,
}

impl TimelineWidget for AssistantTurnWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        const STEP_PADDING: &str = "  ";
        lines.push(context.prompt_line(&self.turn.prompt));

        if context.show_assistant_steps && !self.turn.events.is_empty() {
            for event in &self.turn.events {
                let (text, token) = match event {
                    AssistantStepEvent::ToolRequest { text } => (text, ThemeToken::ToolRequest),
                    AssistantStepEvent::ToolResult { text, ok: true } => {
                        (text, ThemeToken::ToolResult)
                    }
                    AssistantStepEvent::ToolResult { text, ok: false } => {
                        (text, ThemeToken::SystemError)
                    }
                };
                lines.push(Line::from(Span::styled(
                    format!("{STEP_PADDING}{text}"),
                    context.theme.style(token),
                )));
            }
        }

        match &self.turn.state {
            AssistantTurnState::InFlight => {
                if self.turn.streamed.is_empty() {
                    lines.push(Line::from(vec![
                        Span::raw(STEP_PADDING),
                        Span::styled(
                            "Thinking...",
                            context.theme.style(ThemeToken::AssistantWaiting),
                        ),
                    ]));
                } else {
                    context.styled_lines(&self.turn.streamed, ThemeToken::AssistantText, lines);
                }
            }
            AssistantTurnState::CompletedText(text) => {
                context.styled_lines(text, ThemeToken::AssistantText, lines);
                render_turn_token_total(context, lines, self.turn.token_usage.as_ref());
            }
            AssistantTurnState::CompletedError(message) => {
                context.styled_lines(message, ThemeToken::SystemError, lines);
                render_turn_token_total(context, lines, self.turn.token_usage.as_ref());
            }
        }
        lines.push(Line::from(""));
    }
}

fn render_turn_token_total(
    context: &RenderContext<'_>,
    lines: &mut Vec<Line<'static>>,
    usage: Option<&LlmTokenUsageTotals>,
) {
    if !context.show_assistant_steps {
        return;
    }
    let Some(usage) = usage else {
        return;
    };
    if usage.is_zero() {
        return;
    }

    let total_text = if usage.total_tokens == 0 {
        "?".to_string()
    } else {
        usage.total_tokens.to_string()
    };
    lines.push(Line::from(Span::styled(
        format!("  Tokens (turn): {total_text}"),
        context.theme.style(ThemeToken::SystemInfo),
    )));
}

fn widget_for_entry(entry: &TimelineEntry) -> Box<dyn TimelineWidget + '_> {
    match entry {
        TimelineEntry::UserMessage(text) => Box::new(UserMessageWidget { text }),
        TimelineEntry::OutputLine { kind, text } => {
            Box::new(OutputLineWidget { kind: *kind, text })
        }
        TimelineEntry::AssistantTurn(turn) => Box::new(AssistantTurnWidget { turn }),
    }
}

fn split_output_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }

    text.lines().collect()
}

fn output_token_for(kind: OutputKind) -> ThemeToken {
    match kind {
        OutputKind::SystemInfo => ThemeToken::SystemInfo,
        OutputKind::SystemError => ThemeToken::SystemError,
    }
}
