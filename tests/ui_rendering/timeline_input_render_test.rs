use anyhow::Result;

use crate::ui_rendering::common::{
    actions_snapshot, input_snapshot, new_harness, press_tab, status_snapshot, submit_line,
    timeline_snapshot, type_text,
};

#[tokio::test]
async fn initial_screen_shows_welcome_buttons_input_and_status() -> Result<()> {
    let harness = new_harness("render-initial", 100, 20)?;

    assert!(
        timeline_snapshot(&harness)?
            .starts_with("Welcome to ProverbChat. Ask about Hungarian proverbs")
    );
    assert_eq!(
        actions_snapshot(&harness)?,
        "[ Véletlenszerű közmondás ] [ Magyarázz el egy közmondást ] [ Játék: hiányzó szó kitalálása ]\n[ Játék: közmondás jelentésének kitalálása ]"
    );
    assert_eq!(input_snapshot(&harness)?, ">");
    assert_eq!(
        status_snapshot(&harness)?,
        "assistant unavailable | steps off | session render-initial | Ctrl-C quits"
    );

    let regions = harness.regions()?;
    assert_eq!(regions.actions.height, 2);
    assert_eq!(regions.input.height, 1);
    assert_eq!(regions.status.y, 19);

    Ok(())
}

#[tokio::test]
async fn typed_text_is_echoed_in_input_region() -> Result<()> {
    let mut harness = new_harness("render-input", 60, 12)?;

    type_text(&mut harness, "Mit jelent: Lassan járj, tovább érsz?").await?;

    assert_eq!(
        input_snapshot(&harness)?,
        "> Mit jelent: Lassan járj, tovább érsz?"
    );
    assert_eq!(harness.ui_state_view().cursor, 37);

    Ok(())
}

#[tokio::test]
async fn long_input_grows_the_input_region() -> Result<()> {
    let mut harness = new_harness("render-long-input", 20, 16)?;

    type_text(&mut harness, "Addig nyújtózkodj, ameddig a takaród ér.").await?;

    let regions = harness.regions()?;
    assert_eq!(regions.input.height, 3);
    assert_eq!(
        input_snapshot(&harness)?,
        "> Addig nyújtózkodj,\n ameddig a takaród é\nr."
    );

    Ok(())
}

#[tokio::test]
async fn selected_button_is_reported_in_state() -> Result<()> {
    let mut harness = new_harness("render-selected", 100, 20)?;

    press_tab(&mut harness).await?;
    press_tab(&mut harness).await?;

    assert_eq!(
        harness.ui_state_view().selected_action.as_deref(),
        Some("Magyarázz el egy közmondást")
    );
    assert!(actions_snapshot(&harness)?.contains("[ Magyarázz el egy közmondást ]"));

    Ok(())
}

#[tokio::test]
async fn clear_command_restores_welcome_message() -> Result<()> {
    let mut harness = new_harness("render-clear", 100, 20)?;

    submit_line(&mut harness, "/help").await?;
    assert!(timeline_snapshot(&harness)?.contains("Available commands:"));

    submit_line(&mut harness, "/clear").await?;
    let timeline = timeline_snapshot(&harness)?;
    assert!(timeline.starts_with("Welcome to ProverbChat."));
    assert!(!timeline.contains("Available commands:"));

    Ok(())
}

#[tokio::test]
async fn steps_state_is_shown_in_status_line() -> Result<()> {
    let mut harness = new_harness("render-status", 100, 20)?;

    submit_line(&mut harness, "/steps on").await?;

    assert!(status_snapshot(&harness)?.contains("steps on"));

    Ok(())
}
