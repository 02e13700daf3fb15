use std::io;

use anyhow::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind};
use crossterm::execute;
use futures_util::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::agent::AgentProgressEvent;
use crate::cli::app::{App, AppState, KeyOutcome, TurnOutcome, TurnRequest};

enum UiMessage {
    Agent(AgentProgressEvent),
    TurnFinished(TurnOutcome),
}

pub async fn run_tui(state: AppState) -> Result<()> {
    let mut terminal = ratatui::init();
    if let Err(err) = execute!(io::stdout(), EnableMouseCapture) {
        ratatui::restore();
        return Err(err.into());
    }

    let result = event_loop(&mut terminal, App::new(state)).await;

    let _ = execute!(io::stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

async fn event_loop(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        let outcome = tokio::select! {
            maybe_event = events.next() => {
                let Some(event) = maybe_event else {
                    break;
                };
                match event? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                    Event::Mouse(mouse) => app.handle_mouse(mouse),
                    _ => KeyOutcome::None,
                }
            }
            Some(message) = rx.recv() => {
                match message {
                    UiMessage::Agent(event) => app.apply_agent_event(event),
                    UiMessage::TurnFinished(outcome) => app.finish_turn(outcome),
                }
                KeyOutcome::None
            }
        };

        match outcome {
            KeyOutcome::None => {}
            KeyOutcome::Quit => break,
            KeyOutcome::StartTurn(request) => spawn_turn(request, tx.clone()),
        }
    }

    Ok(())
}

fn spawn_turn(request: TurnRequest, tx: UnboundedSender<UiMessage>) {
    tokio::spawn(async move {
        let events_tx = tx.clone();
        let outcome = request
            .run(&mut |event| {
                let _ = events_tx.send(UiMessage::Agent(event));
            })
            .await;
        let _ = tx.send(UiMessage::TurnFinished(outcome));
    });
}
