use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use proverbchat::agent::dispatch::ProverbTools;
use proverbchat::cli::SharedAgent;
use proverbchat::cli::test_support::{UiHarness, deterministic_app_state, gemini_agent};
use proverbchat::proverbs::ProverbStore;
use ratatui::layout::Rect;
use serde_json::{Value, json};
use wiremock::ResponseTemplate;

pub const STREAM_PATH: &str = "/v1beta/models/gemini-test:streamGenerateContent";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-test:generateContent";

const TEST_PROVERBS: &str = r#"[
    {"proverb": "Ki korán kel, aranyat lel.", "meaning": "Aki szorgalmas, sikeres lesz."},
    {"proverb": "Lassan járj, tovább érsz.", "meaning": "A megfontoltság célhoz vezet."},
    {"proverb": "Sok lúd disznót győz.", "meaning": "Sok gyenge legyőzi az erőset."}
]"#;

fn trace_dir() -> PathBuf {
    std::env::temp_dir().join("proverbchat-ui-tests")
}

pub fn new_harness(session_id: &str, width: u16, height: u16) -> Result<UiHarness> {
    start_harness(session_id, width, height, None)
}

pub fn new_harness_with_agent(
    session_id: &str,
    width: u16,
    height: u16,
    agent: SharedAgent,
) -> Result<UiHarness> {
    start_harness(session_id, width, height, Some(agent))
}

fn start_harness(
    session_id: &str,
    width: u16,
    height: u16,
    agent: Option<SharedAgent>,
) -> Result<UiHarness> {
    let state = deterministic_app_state(session_id, &trace_dir(), agent)?;
    let mut harness = UiHarness::new(width, height, state)?;
    harness.render()?;
    Ok(harness)
}

pub fn test_agent(base_url: &str, extract_actions: bool) -> Result<SharedAgent> {
    let store = ProverbStore::from_json_str("test proverbs", TEST_PROVERBS)?;
    let tools = ProverbTools::new(Arc::new(store), 2, std::env::temp_dir()).with_seed(Some(7));
    gemini_agent(
        base_url,
        tools,
        "You help people learn Hungarian proverbs.",
        extract_actions,
    )
}

pub fn text_chunk(text: &str) -> Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

pub fn final_chunk(text: &str, total_tokens: u64) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": total_tokens / 2,
            "candidatesTokenCount": total_tokens - total_tokens / 2,
            "totalTokenCount": total_tokens
        }
    })
}

pub fn function_call_chunk(name: &str, args: Value) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]},
            "finishReason": "STOP"
        }]
    })
}

pub fn sse_response(chunks: &[Value]) -> ResponseTemplate {
    let body = chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\r\n\r\n"))
        .collect::<String>();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

pub fn generate_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

pub async fn type_text(harness: &mut UiHarness, text: &str) -> Result<()> {
    for ch in text.chars() {
        harness
            .send_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))
            .await?;
    }
    Ok(())
}

pub async fn submit_line(harness: &mut UiHarness, line: &str) -> Result<()> {
    type_text(harness, line).await?;
    press_enter(harness).await
}

pub async fn press(harness: &mut UiHarness, code: KeyCode) -> Result<()> {
    harness
        .send_key(KeyEvent::new(code, KeyModifiers::NONE))
        .await
}

pub async fn press_enter(harness: &mut UiHarness) -> Result<()> {
    press(harness, KeyCode::Enter).await
}

pub async fn press_tab(harness: &mut UiHarness) -> Result<()> {
    press(harness, KeyCode::Tab).await
}

pub async fn press_back_tab(harness: &mut UiHarness) -> Result<()> {
    harness
        .send_key(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT))
        .await
}

pub async fn press_up(harness: &mut UiHarness) -> Result<()> {
    press(harness, KeyCode::Up).await
}

pub async fn press_down(harness: &mut UiHarness) -> Result<()> {
    press(harness, KeyCode::Down).await
}

pub async fn press_ctrl(harness: &mut UiHarness, ch: char) -> Result<()> {
    harness
        .send_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
        .await
}

fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
    MouseEvent {
        kind,
        column,
        row,
        modifiers: KeyModifiers::NONE,
    }
}

pub async fn scroll_up(harness: &mut UiHarness, column: u16, row: u16) -> Result<()> {
    harness
        .send_mouse(mouse(MouseEventKind::ScrollUp, column, row))
        .await
}

pub async fn scroll_down(harness: &mut UiHarness, column: u16, row: u16) -> Result<()> {
    harness
        .send_mouse(mouse(MouseEventKind::ScrollDown, column, row))
        .await
}

pub async fn click(harness: &mut UiHarness, column: u16, row: u16) -> Result<()> {
    harness
        .send_mouse(mouse(MouseEventKind::Down(MouseButton::Left), column, row))
        .await
}

pub fn normalized_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn region_text(harness: &UiHarness, area: Rect) -> String {
    let lines = harness.buffer_lines();
    let start_row = usize::from(area.y);
    let end_row = start_row.saturating_add(usize::from(area.height));

    let mut rendered = Vec::new();
    for line in lines.iter().take(end_row.min(lines.len())).skip(start_row) {
        let clipped = line
            .chars()
            .skip(usize::from(area.x))
            .take(usize::from(area.width))
            .collect::<String>();
        rendered.push(clipped);
    }

    normalized_text(&rendered.join("\n"))
}

pub fn timeline_snapshot(harness: &UiHarness) -> Result<String> {
    let regions = harness.regions()?;
    Ok(region_text(harness, regions.timeline))
}

pub fn actions_snapshot(harness: &UiHarness) -> Result<String> {
    let regions = harness.regions()?;
    Ok(region_text(harness, regions.actions))
}

pub fn input_snapshot(harness: &UiHarness) -> Result<String> {
    let regions = harness.regions()?;
    Ok(region_text(harness, regions.input))
}

pub fn status_snapshot(harness: &UiHarness) -> Result<String> {
    let regions = harness.regions()?;
    Ok(region_text(harness, regions.status))
}
