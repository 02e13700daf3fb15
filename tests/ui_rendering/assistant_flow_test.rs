use std::fs;

use anyhow::Result;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ui_rendering::common::{
    GENERATE_PATH, STREAM_PATH, actions_snapshot, click, final_chunk, function_call_chunk,
    generate_response, new_harness_with_agent, press_enter, press_tab, sse_response,
    status_snapshot, submit_line, test_agent, text_chunk, timeline_snapshot,
};

async fn mount_plain_answer(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "test-key"))
        .respond_with(sse_response(&[
            text_chunk("Ki korán kel, "),
            final_chunk("aranyat lel.", 12),
        ]))
        .mount(server)
        .await;
}

#[tokio::test]
async fn streamed_answer_is_rendered_and_remembered() -> Result<()> {
    let server = MockServer::start().await;
    mount_plain_answer(&server).await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-plain", 100, 24, agent)?;

    submit_line(&mut harness, "Mondj egy közmondást!").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("you> Mondj egy közmondást!"));
    assert!(timeline.contains("Ki korán kel, aranyat lel."));
    assert!(!timeline.contains("Thinking..."));
    let view = harness.ui_state_view();
    assert_eq!(view.history_len, 2);
    assert!(!view.turn_in_flight);
    assert!(status_snapshot(&harness)?.starts_with("ready | steps off"));

    let trace = fs::read_to_string(harness.trace_path())?;
    assert!(trace.contains("[user.in    ] Mondj egy közmondást!"));
    assert!(trace.contains("[ai.out     ] Ki korán kel, aranyat lel."));

    Ok(())
}

#[tokio::test]
async fn tool_calls_are_listed_when_steps_are_shown() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(sse_response(&[final_chunk("Itt van két közmondás.", 20)]))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse_response(&[function_call_chunk(
            "GetRandomProverb",
            json!({"count": 2}),
        )]))
        .with_priority(2)
        .mount(&server)
        .await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-tools", 100, 24, agent)?;

    submit_line(&mut harness, "/steps on").await?;
    submit_line(&mut harness, "Adj két közmondást").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("  -> GetRandomProverb(count='2')"));
    assert!(timeline.contains("  <- GetRandomProverb: ok"));
    assert!(timeline.contains("Itt van két közmondás."));
    assert!(timeline.contains("  Tokens (turn): 20"));

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    let follow_up = String::from_utf8_lossy(&requests[1].body);
    assert!(follow_up.contains("\"name\":\"GetRandomProverb\""));
    assert!(follow_up.contains("\"ok\":true"));

    assert_eq!(harness.ui_state_view().history_len, 2);

    Ok(())
}

#[tokio::test]
async fn failed_tool_call_is_reported_as_error_step() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(sse_response(&[final_chunk("Hibás paraméter, bocsánat.", 8)]))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse_response(&[function_call_chunk(
            "GetRandomProverb",
            json!({"count": 0}),
        )]))
        .with_priority(2)
        .mount(&server)
        .await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-tool-error", 100, 24, agent)?;

    submit_line(&mut harness, "/steps on").await?;
    submit_line(&mut harness, "Adj nulla közmondást").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("  <- GetRandomProverb: invalid_argument"));
    assert!(timeline.contains("Hibás paraméter, bocsánat."));

    Ok(())
}

#[tokio::test]
async fn suggested_actions_become_buttons_and_can_be_sent() -> Result<()> {
    let server = MockServer::start().await;
    mount_plain_answer(&server).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(generate_response(
            r#"[{"text": "Még egy közmondást!", "value": "more"}]"#,
        ))
        .mount(&server)
        .await;
    let agent = test_agent(&server.uri(), true)?;
    let mut harness = new_harness_with_agent("flow-actions", 100, 24, agent)?;

    submit_line(&mut harness, "Mondj egy közmondást!").await?;
    assert_eq!(
        harness.ui_state_view().action_labels,
        vec!["Még egy közmondást!"]
    );
    assert_eq!(actions_snapshot(&harness)?, "[ Még egy közmondást! ]");

    press_tab(&mut harness).await?;
    press_enter(&mut harness).await?;

    assert!(timeline_snapshot(&harness)?.contains("you> Még egy közmondást!"));
    assert_eq!(harness.ui_state_view().history_len, 4);

    Ok(())
}

#[tokio::test]
async fn clicking_a_starter_sends_its_message() -> Result<()> {
    let server = MockServer::start().await;
    mount_plain_answer(&server).await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-click", 100, 24, agent)?;

    let actions = harness.regions()?.actions;
    click(&mut harness, actions.x + 2, actions.y).await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("you> Adj nekem 5 db véletlenszerű közmondást, magyarázattal"));
    assert!(timeline.contains("Ki korán kel, aranyat lel."));

    Ok(())
}

#[tokio::test]
async fn provider_error_is_shown_and_not_remembered() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-error", 120, 24, agent)?;

    submit_line(&mut harness, "Szia!").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("Assistant request failed: provider request failed with status 500: boom"));
    let view = harness.ui_state_view();
    assert_eq!(view.history_len, 0);
    assert!(view.action_labels.is_empty());

    Ok(())
}

#[tokio::test]
async fn reset_forgets_conversation_and_offers_starters() -> Result<()> {
    let server = MockServer::start().await;
    mount_plain_answer(&server).await;
    let agent = test_agent(&server.uri(), false)?;
    let mut harness = new_harness_with_agent("flow-reset", 100, 24, agent)?;

    submit_line(&mut harness, "Mondj egy közmondást!").await?;
    assert_eq!(harness.ui_state_view().history_len, 2);

    submit_line(&mut harness, "/reset").await?;

    assert!(timeline_snapshot(&harness)?.contains("Conversation reset."));
    let view = harness.ui_state_view();
    assert_eq!(view.history_len, 0);
    assert_eq!(view.action_labels.len(), 4);

    Ok(())
}
