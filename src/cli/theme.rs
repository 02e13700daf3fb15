use crate::config::{
    HexColor, StyleOverride, ThemeConfig as UserThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
};
use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Theme {
    enabled: bool,
    styles: HashMap<ThemeToken, Style>,
}

impl Theme {
    #[cfg(test)]
    pub fn new(enabled: bool) -> Self {
        Self::from_config(enabled, &UserThemeConfig::default())
    }

    pub fn from_config(enabled: bool, config: &UserThemeConfig) -> Self {
        let mut styles = ThemeToken::all()
            .into_iter()
            .map(|token| (token, preset_style(config.preset, token)))
            .collect::<HashMap<_, _>>();
        for (token, override_style) in &config.styles {
            let base = styles.get(token).copied().unwrap_or_default();
            styles.insert(*token, merge_style(base, override_style));
        }

        Self { enabled, styles }
    }

    pub fn style(&self, token: ThemeToken) -> Style {
        if !self.enabled {
            return disabled_style(token);
        }

        self.styles.get(&token).copied().unwrap_or_default()
    }
}

fn preset_style(preset: ThemePreset, token: ThemeToken) -> Style {
    let palette = match preset {
        ThemePreset::Default => &DEFAULT_PALETTE,
        ThemePreset::Light => &LIGHT_PALETTE,
        ThemePreset::HighContrast => &HIGH_CONTRAST_PALETTE,
    };

    match token {
        ThemeToken::UserPrompt => Style::default()
            .fg(palette.prompt)
            .add_modifier(Modifier::BOLD),
        ThemeToken::UserInput => Style::default().fg(palette.text),
        ThemeToken::AssistantText => Style::default().fg(palette.assistant),
        ThemeToken::AssistantWaiting => Style::default()
            .fg(palette.assistant)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ThemeToken::ToolRequest => Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::ITALIC),
        ThemeToken::ToolResult => Style::default().fg(palette.muted),
        ThemeToken::ActionButton => Style::default().fg(palette.prompt).bg(palette.input_bg),
        ThemeToken::ActionSelected => Style::default()
            .fg(palette.input_bg)
            .bg(palette.prompt)
            .add_modifier(Modifier::BOLD),
        ThemeToken::SystemInfo | ThemeToken::Status => Style::default().fg(palette.info),
        ThemeToken::SystemError => Style::default()
            .fg(palette.error)
            .add_modifier(Modifier::BOLD),
        ThemeToken::InputBlock => Style::default().bg(palette.input_bg).fg(palette.text),
    }
}

struct Palette {
    prompt: Color,
    text: Color,
    assistant: Color,
    muted: Color,
    info: Color,
    error: Color,
    input_bg: Color,
}

const DEFAULT_PALETTE: Palette = Palette {
    prompt: Color::Rgb(158, 206, 106),
    text: Color::White,
    assistant: Color::Rgb(224, 175, 104),
    muted: Color::Rgb(138, 138, 138),
    info: Color::Rgb(86, 95, 137),
    error: Color::Rgb(247, 118, 142),
    input_bg: Color::Rgb(22, 22, 30),
};

const LIGHT_PALETTE: Palette = Palette {
    prompt: Color::Rgb(31, 111, 235),
    text: Color::Rgb(36, 41, 47),
    assistant: Color::Rgb(130, 70, 0),
    muted: Color::Rgb(80, 90, 110),
    info: Color::Rgb(36, 70, 120),
    error: Color::Rgb(176, 0, 32),
    input_bg: Color::Rgb(246, 248, 250),
};

const HIGH_CONTRAST_PALETTE: Palette = Palette {
    prompt: Color::Rgb(0, 255, 127),
    text: Color::Rgb(255, 255, 255),
    assistant: Color::Rgb(255, 215, 0),
    muted: Color::Rgb(220, 220, 220),
    info: Color::Rgb(173, 216, 230),
    error: Color::Rgb(255, 64, 64),
    input_bg: Color::Rgb(0, 0, 0),
};

fn disabled_style(token: ThemeToken) -> Style {
    match token {
        ThemeToken::UserPrompt => Style::default().add_modifier(Modifier::BOLD),
        ThemeToken::ActionSelected => Style::default().add_modifier(Modifier::REVERSED),
        _ => Style::default(),
    }
}

fn merge_style(base: Style, override_style: &StyleOverride) -> Style {
    let mut merged = base;

    if let Some(fg) = override_style.fg {
        merged = merged.fg(color_from_hex(fg));
    }

    if let Some(bg) = override_style.bg {
        merged = merged.bg(color_from_hex(bg));
    }

    if let Some(modifiers) = &override_style.modifiers {
        let modifier = modifiers
            .iter()
            .fold(Modifier::empty(), |acc, modifier| acc | modifier_to_ratatui(*modifier));
        merged = merged
            .remove_modifier(Modifier::all())
            .add_modifier(modifier);
    }

    merged
}

fn color_from_hex(color: HexColor) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn modifier_to_ratatui(modifier: ThemeModifier) -> Modifier {
    match modifier {
        ThemeModifier::Bold => Modifier::BOLD,
        ThemeModifier::Dim => Modifier::DIM,
        ThemeModifier::Italic => Modifier::ITALIC,
        ThemeModifier::Underlined => Modifier::UNDERLINED,
        ThemeModifier::Reversed => Modifier::REVERSED,
        ThemeModifier::CrossedOut => Modifier::CROSSED_OUT,
    }
}
