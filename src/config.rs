use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PROVERBS_FILE: &str = "prompts/proverbs.json";
pub const DEFAULT_SYSTEM_PROMPT_FILE: &str = "prompts/system_prompt.txt";
pub const DEFAULT_GAME_PROVERB_COUNT: usize = 5;

const CONFIG_DIR_NAME: &str = "proverbchat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub proverbs_file: PathBuf,
    pub system_prompt_file: PathBuf,
    pub output_dir: PathBuf,
    pub game_proverb_count: usize,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    pub preset: ThemePreset,
    pub styles: HashMap<ThemeToken, StyleOverride>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            preset: ThemePreset::Default,
            styles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemePreset {
    Default,
    Light,
    HighContrast,
}

impl FromStr for ThemePreset {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "light" => Ok(Self::Light),
            "high-contrast" => Ok(Self::HighContrast),
            _ => Err(format!("unknown preset '{value}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeToken {
    UserPrompt,
    UserInput,
    AssistantText,
    AssistantWaiting,
    ToolRequest,
    ToolResult,
    ActionButton,
    ActionSelected,
    SystemInfo,
    SystemError,
    Status,
    InputBlock,
}

impl ThemeToken {
    pub fn all() -> [Self; 12] {
        [
            Self::UserPrompt,
            Self::UserInput,
            Self::AssistantText,
            Self::AssistantWaiting,
            Self::ToolRequest,
            Self::ToolResult,
            Self::ActionButton,
            Self::ActionSelected,
            Self::SystemInfo,
            Self::SystemError,
            Self::Status,
            Self::InputBlock,
        ]
    }
}

impl FromStr for ThemeToken {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "user_prompt" => Ok(Self::UserPrompt),
            "user_input" => Ok(Self::UserInput),
            "assistant_text" => Ok(Self::AssistantText),
            "assistant_waiting" => Ok(Self::AssistantWaiting),
            "tool_request" => Ok(Self::ToolRequest),
            "tool_result" => Ok(Self::ToolResult),
            "action_button" => Ok(Self::ActionButton),
            "action_selected" => Ok(Self::ActionSelected),
            "system_info" => Ok(Self::SystemInfo),
            "system_error" => Ok(Self::SystemError),
            "status" => Ok(Self::Status),
            "input_block" => Ok(Self::InputBlock),
            _ => Err(format!("unknown token '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOverride {
    pub fg: Option<HexColor>,
    pub bg: Option<HexColor>,
    pub modifiers: Option<Vec<ThemeModifier>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        const EXPECTED: &str = "invalid hex color, expected #RRGGBB";
        let Some(hex) = value.strip_prefix('#') else {
            return Err(EXPECTED.to_string());
        };
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EXPECTED.to_string());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| EXPECTED.to_string())
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeModifier {
    Bold,
    Dim,
    Italic,
    Underlined,
    Reversed,
    CrossedOut,
}

impl FromStr for ThemeModifier {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "bold" => Ok(Self::Bold),
            "dim" => Ok(Self::Dim),
            "italic" => Ok(Self::Italic),
            "underlined" => Ok(Self::Underlined),
            "reversed" => Ok(Self::Reversed),
            "crossed_out" => Ok(Self::CrossedOut),
            _ => Err(format!("unknown modifier '{value}'")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    proverbs_file: Option<String>,
    system_prompt_file: Option<String>,
    output_dir: Option<String>,
    game_proverb_count: Option<i64>,
    theme: Option<RawThemeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThemeConfig {
    name: Option<String>,
    styles: Option<HashMap<String, RawStyleOverride>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStyleOverride {
    fg: Option<String>,
    bg: Option<String>,
    modifiers: Option<Vec<String>>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Resolves the configuration. Precedence, highest first: process env
    /// (including `.env`), config file, built-in defaults. An explicit path
    /// must exist; the discovered default path is optional.
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let (config_path, file_config) = match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    bail!("Failed to load config {}: file not found", path.display());
                }
                (path.to_path_buf(), load_file_config(path)?.unwrap_or_default())
            }
            None => {
                let path = discover_config_path()?;
                let file_config = load_file_config(&path)?.unwrap_or_default();
                (path, file_config)
            }
        };

        dotenvy::dotenv().ok();

        let theme = validate_theme(file_config.theme.as_ref(), &config_path)?;
        let game_proverb_count = match file_config.game_proverb_count {
            None => DEFAULT_GAME_PROVERB_COUNT,
            Some(count) => usize::try_from(count)
                .ok()
                .filter(|count| *count >= 1)
                .ok_or_else(|| {
                    config_error(&config_path, "game_proverb_count", "must be at least 1")
                })?,
        };

        let file_value = |value: &Option<String>| value.as_deref().and_then(non_empty).map(ToOwned::to_owned);

        Ok(Self {
            gemini_api_key: env_non_empty("GEMINI_API_KEY")
                .or_else(|| file_value(&file_config.gemini_api_key)),
            gemini_model: env_non_empty("GEMINI_MODEL")
                .or_else(|| file_value(&file_config.gemini_model))
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: env_non_empty("GEMINI_BASE_URL")
                .or_else(|| file_value(&file_config.gemini_base_url))
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            proverbs_file: env_non_empty("PROVERBCHAT_PROVERBS_FILE")
                .or_else(|| file_value(&file_config.proverbs_file))
                .unwrap_or_else(|| DEFAULT_PROVERBS_FILE.to_string())
                .into(),
            system_prompt_file: env_non_empty("PROVERBCHAT_SYSTEM_PROMPT_FILE")
                .or_else(|| file_value(&file_config.system_prompt_file))
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT_FILE.to_string())
                .into(),
            output_dir: file_value(&file_config.output_dir)
                .unwrap_or_else(|| ".".to_string())
                .into(),
            game_proverb_count,
            theme,
        })
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn validate_theme(raw_theme: Option<&RawThemeConfig>, config_path: &Path) -> Result<ThemeConfig> {
    let Some(theme) = raw_theme else {
        return Ok(ThemeConfig::default());
    };

    let mut config = ThemeConfig::default();

    if let Some(name) = &theme.name {
        config.preset = ThemePreset::from_str(name)
            .map_err(|reason| config_error(config_path, "theme.name", &reason))?;
    }

    for (token_name, raw_style) in theme.styles.iter().flatten() {
        let token = ThemeToken::from_str(token_name).map_err(|reason| {
            config_error(config_path, &format!("theme.styles.{token_name}"), &reason)
        })?;

        let key = |field: &str| format!("theme.styles.{token_name}.{field}");
        let color = |value: Option<&str>, field: &str| -> Result<Option<HexColor>> {
            value
                .map(|value| {
                    HexColor::from_str(value)
                        .map_err(|reason| config_error(config_path, &key(field), &reason))
                })
                .transpose()
        };

        let fg = color(raw_style.fg.as_deref(), "fg")?;
        let bg = color(raw_style.bg.as_deref(), "bg")?;
        let modifiers = raw_style
            .modifiers
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .map(|value| {
                        ThemeModifier::from_str(value)
                            .map_err(|reason| config_error(config_path, &key("modifiers"), &reason))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        config.styles.insert(token, StyleOverride { fg, bg, modifiers });
    }

    Ok(config)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}
