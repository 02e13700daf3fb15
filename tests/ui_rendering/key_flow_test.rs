use anyhow::Result;
use crossterm::event::KeyCode;

use crate::ui_rendering::common::{
    new_harness, press, press_back_tab, press_ctrl, press_down, press_enter, press_tab, press_up,
    submit_line, timeline_snapshot, type_text,
};

#[tokio::test]
async fn starters_are_offered_and_tab_cycles_through_them() -> Result<()> {
    let mut harness = new_harness("keys-starters", 100, 24)?;

    let view = harness.ui_state_view();
    assert_eq!(
        view.action_labels,
        vec![
            "Véletlenszerű közmondás",
            "Magyarázz el egy közmondást",
            "Játék: hiányzó szó kitalálása",
            "Játék: közmondás jelentésének kitalálása",
        ]
    );
    assert_eq!(view.selected_action, None);

    press_tab(&mut harness).await?;
    assert_eq!(
        harness.ui_state_view().selected_action.as_deref(),
        Some("Véletlenszerű közmondás")
    );
    press_back_tab(&mut harness).await?;
    assert_eq!(
        harness.ui_state_view().selected_action.as_deref(),
        Some("Játék: közmondás jelentésének kitalálása")
    );
    press(&mut harness, KeyCode::Esc).await?;
    assert_eq!(harness.ui_state_view().selected_action, None);

    Ok(())
}

#[tokio::test]
async fn sending_without_api_key_reports_unavailable_assistant() -> Result<()> {
    let mut harness = new_harness("keys-no-agent", 120, 24)?;

    press_tab(&mut harness).await?;
    press_enter(&mut harness).await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("you> Adj nekem 5 db véletlenszerű közmondást, magyarázattal"));
    assert!(timeline.contains("Assistant unavailable: missing GEMINI_API_KEY."));
    let view = harness.ui_state_view();
    assert!(view.action_labels.is_empty(), "buttons are consumed on send");
    assert_eq!(view.history_len, 0);
    assert!(!view.turn_in_flight);

    Ok(())
}

#[tokio::test]
async fn commands_print_help_and_report_errors() -> Result<()> {
    let mut harness = new_harness("keys-commands", 100, 30)?;

    submit_line(&mut harness, "/help").await?;
    submit_line(&mut harness, "/bogus").await?;
    submit_line(&mut harness, "/steps maybe").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("you> /help"));
    assert!(timeline.contains("Available commands:"));
    assert!(timeline.contains("/starters            Offer the starter suggestions again"));
    assert!(timeline.contains("unknown command '/bogus'. Try /help"));
    assert!(timeline.contains("usage: /steps [on|off]"));

    Ok(())
}

#[tokio::test]
async fn steps_toggle_via_command_and_ctrl_t() -> Result<()> {
    let mut harness = new_harness("keys-steps", 100, 24)?;
    assert!(!harness.ui_state_view().show_steps);

    submit_line(&mut harness, "/steps on").await?;
    assert!(harness.ui_state_view().show_steps);

    press_ctrl(&mut harness, 't').await?;
    assert!(!harness.ui_state_view().show_steps);

    submit_line(&mut harness, "/steps").await?;
    assert!(timeline_snapshot(&harness)?.contains("Assistant steps are hidden."));

    Ok(())
}

#[tokio::test]
async fn up_down_walks_input_history_and_restores_draft() -> Result<()> {
    let mut harness = new_harness("keys-history", 100, 24)?;

    submit_line(&mut harness, "/help").await?;
    submit_line(&mut harness, "/trace").await?;
    type_text(&mut harness, "félig").await?;

    press_up(&mut harness).await?;
    assert_eq!(harness.ui_state_view().input, "/trace");
    press_up(&mut harness).await?;
    assert_eq!(harness.ui_state_view().input, "/help");
    press_up(&mut harness).await?;
    assert_eq!(harness.ui_state_view().input, "/help");
    press_down(&mut harness).await?;
    assert_eq!(harness.ui_state_view().input, "/trace");
    press_down(&mut harness).await?;
    assert_eq!(harness.ui_state_view().input, "félig");

    Ok(())
}

#[tokio::test]
async fn history_command_lists_previous_inputs() -> Result<()> {
    let mut harness = new_harness("keys-history-command", 100, 24)?;

    submit_line(&mut harness, "/help").await?;
    submit_line(&mut harness, "/trace").await?;
    submit_line(&mut harness, "/history 1").await?;

    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.contains("  2  /trace"));
    assert!(!timeline.contains("  1  /help"));

    Ok(())
}

#[tokio::test]
async fn trace_command_shows_trace_file() -> Result<()> {
    let mut harness = new_harness("keys-trace", 200, 24)?;

    submit_line(&mut harness, "/trace").await?;

    let expected = format!("Trace file: {}", harness.trace_path().display());
    assert!(timeline_snapshot(&harness)?.contains(&expected));

    Ok(())
}

#[tokio::test]
async fn editing_keys_move_cursor_by_character() -> Result<()> {
    let mut harness = new_harness("keys-editing", 100, 24)?;

    type_text(&mut harness, "árvíz").await?;
    press(&mut harness, KeyCode::Left).await?;
    press(&mut harness, KeyCode::Left).await?;
    press(&mut harness, KeyCode::Backspace).await?;
    let view = harness.ui_state_view();
    assert_eq!(view.input, "áríz");
    assert_eq!(view.cursor, 2);

    press(&mut harness, KeyCode::Home).await?;
    press(&mut harness, KeyCode::Delete).await?;
    press(&mut harness, KeyCode::End).await?;
    type_text(&mut harness, "!").await?;
    assert_eq!(harness.ui_state_view().input, "ríz!");

    press_ctrl(&mut harness, 'u').await?;
    assert_eq!(harness.ui_state_view().input, "");

    Ok(())
}

#[tokio::test]
async fn quit_command_and_ctrl_c_request_exit() -> Result<()> {
    let mut harness = new_harness("keys-quit", 100, 24)?;
    submit_line(&mut harness, "/quit").await?;
    assert!(harness.should_quit());

    let mut harness = new_harness("keys-ctrl-c", 100, 24)?;
    assert!(!harness.should_quit());
    press_ctrl(&mut harness, 'c').await?;
    assert!(harness.should_quit());

    Ok(())
}

#[tokio::test]
async fn starters_command_brings_suggestions_back() -> Result<()> {
    let mut harness = new_harness("keys-starters-command", 100, 24)?;

    press_tab(&mut harness).await?;
    press_enter(&mut harness).await?;
    assert!(harness.ui_state_view().action_labels.is_empty());

    submit_line(&mut harness, "/starters").await?;
    assert_eq!(harness.ui_state_view().action_labels.len(), 4);

    Ok(())
}
