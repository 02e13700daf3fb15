use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "proverbchat")]
#[command(
    about = "Terminal chat assistant for learning Hungarian proverbs",
    long_about = "Terminal chat assistant for learning Hungarian proverbs\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/proverbchat/config.toml\n    2. ~/.config/proverbchat/config.toml"
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON file with the proverb collection.
    #[arg(long, value_name = "PATH")]
    pub proverbs: Option<PathBuf>,

    /// Text file with the assistant's system prompt.
    #[arg(long, value_name = "PATH")]
    pub system_prompt: Option<PathBuf>,

    /// Seed for proverb sampling, for reproducible games.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Write API keys and tokens to the trace file unredacted.
    #[arg(long)]
    pub raw_trace: bool,
}
