use anyhow::Result;
use crossterm::event::KeyCode;

use crate::ui_rendering::common::{
    new_harness, press, scroll_down, scroll_up, submit_line, timeline_snapshot,
};

#[tokio::test]
async fn mouse_wheel_scrolls_timeline_and_clamps_at_bottom() -> Result<()> {
    let mut harness = new_harness("scroll-wheel", 100, 16)?;
    for _ in 0..4 {
        submit_line(&mut harness, "/help").await?;
    }
    let bottom = timeline_snapshot(&harness)?;
    assert!(bottom.ends_with("scroll."));

    let timeline = harness.regions()?.timeline;
    scroll_up(&mut harness, 1, timeline.y + 1).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, 3);
    assert_ne!(timeline_snapshot(&harness)?, bottom);

    scroll_down(&mut harness, 1, timeline.y + 1).await?;
    scroll_down(&mut harness, 1, timeline.y + 1).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, 0);
    assert_eq!(timeline_snapshot(&harness)?, bottom);

    Ok(())
}

#[tokio::test]
async fn wheel_outside_timeline_is_ignored() -> Result<()> {
    let mut harness = new_harness("scroll-outside", 100, 16)?;
    for _ in 0..4 {
        submit_line(&mut harness, "/help").await?;
    }

    let status = harness.regions()?.status;
    scroll_up(&mut harness, 1, status.y).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, 0);

    Ok(())
}

#[tokio::test]
async fn scrolling_stops_at_the_first_line() -> Result<()> {
    let mut harness = new_harness("scroll-top", 100, 16)?;
    submit_line(&mut harness, "/help").await?;
    submit_line(&mut harness, "/help").await?;

    let timeline = harness.regions()?.timeline;
    for _ in 0..20 {
        scroll_up(&mut harness, 1, timeline.y).await?;
    }

    assert!(timeline_snapshot(&harness)?.starts_with("you> /help\nAvailable commands:"));
    let scrolled = harness.ui_state_view().timeline_scroll;
    scroll_up(&mut harness, 1, timeline.y).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, scrolled);

    Ok(())
}

#[tokio::test]
async fn page_keys_scroll_by_a_screen() -> Result<()> {
    let mut harness = new_harness("scroll-page", 100, 16)?;
    for _ in 0..4 {
        submit_line(&mut harness, "/help").await?;
    }
    let page = usize::from(harness.regions()?.timeline.height) - 1;

    press(&mut harness, KeyCode::PageUp).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, page);

    press(&mut harness, KeyCode::PageDown).await?;
    assert_eq!(harness.ui_state_view().timeline_scroll, 0);

    Ok(())
}

#[tokio::test]
async fn short_timeline_does_not_scroll() -> Result<()> {
    let mut harness = new_harness("scroll-short", 100, 16)?;
    let timeline = harness.regions()?.timeline;

    scroll_up(&mut harness, 1, timeline.y).await?;

    assert_eq!(harness.ui_state_view().timeline_scroll, 0);
    Ok(())
}
