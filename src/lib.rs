pub mod agent;
pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod proverbs;
pub mod trace;

use agent::dispatch::ProverbTools;
use agent::prompt::load_system_prompt;
use agent::{AgentConfig, ChatAgent, ConversationState};
use anyhow::{Result, anyhow};
use cli::{AppState, CliArgs, SharedAgent, run_tui};
use config::AppConfig;
use http::client::HttpClient;
use http::redact::Redactor;
use llm::gemini::GeminiProvider;
use llm::provider::LlmError;
use proverbs::ProverbStore;
use std::env;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use trace::SessionTrace;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let store = ProverbStore::load(&config.proverbs_file)
        .map_err(|err| anyhow!("Failed to load proverbs: {err}"))?;
    let system_prompt = load_system_prompt(&config.system_prompt_file)
        .map_err(|err| anyhow!("Failed to load system prompt: {err}"))?;

    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;
    let http = HttpClient::new(reqwest::Client::new())
        .with_trace(trace.clone())
        .with_redactor(Redactor::new(!args.raw_trace));
    let tools = ProverbTools::new(
        Arc::new(store),
        config.game_proverb_count,
        config.output_dir.clone(),
    )
    .with_seed(args.seed);
    trace.log_info(&format!(
        "loaded {} proverbs from {}, files are written to {}",
        tools.store().len(),
        config.proverbs_file.display(),
        tools.output_dir().display()
    ));

    let (agent, startup_notice) = build_agent(&config, http, tools, system_prompt)?;

    let state = AppState {
        session_id,
        agent,
        history: ConversationState::new(),
        theme: config.theme.clone(),
        color_enabled: env::var_os("NO_COLOR").is_none(),
        trace,
        startup_notice,
    };

    run_tui(state).await
}

fn build_agent(
    config: &AppConfig,
    http: HttpClient,
    tools: ProverbTools,
    system_prompt: String,
) -> Result<(Option<SharedAgent>, Option<String>)> {
    match GeminiProvider::new(
        http,
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    ) {
        Ok(provider) => {
            let agent = ChatAgent::new(provider, tools, system_prompt, AgentConfig::default());
            Ok((Some(Arc::new(agent)), None))
        }
        Err(LlmError::MissingApiKey) => Ok((None, Some(cli::MISSING_KEY_MESSAGE.to_string()))),
        Err(err) => Err(err.into()),
    }
}

fn resolve_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = if let Some(path) = args.config.as_deref() {
        AppConfig::load_with_path(Some(path))?
    } else {
        AppConfig::load()?
    };
    if let Some(path) = &args.proverbs {
        config.proverbs_file = path.clone();
    }
    if let Some(path) = &args.system_prompt {
        config.system_prompt_file = path.clone();
    }
    Ok(config)
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
