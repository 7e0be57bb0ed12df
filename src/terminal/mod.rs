pub mod events;
pub mod state;
pub mod ui;

use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::app::App;
use crate::domain::event::{EventKind, MenuEvent};
use crate::mail::api::MailService;
use crate::terminal::state::UiState;

/// Upper bound on how long a key wait may block, so notification clicks
/// arriving on the channel are picked up promptly.
const INPUT_WAIT: Duration = Duration::from_millis(250);

/// Run the menu until the user quits.
pub fn run_terminal<S: MailService>(app: &mut App<S>, clicks: Receiver<MenuEvent>) -> Result<()> {
    color_eyre::install()?;

    let mut terminal = ratatui::init();
    let mut ui = UiState::new();
    let result = run(&mut terminal, app, &mut ui, &clicks);

    ratatui::restore();

    result
}

fn run<S: MailService>(
    terminal: &mut DefaultTerminal,
    app: &mut App<S>,
    ui: &mut UiState,
    clicks: &Receiver<MenuEvent>,
) -> Result<()> {
    loop {
        app.tick(Instant::now());
        while let Ok(ev) = clicks.try_recv() {
            dispatch(terminal, app, ui, ev);
        }
        if app.quit {
            break;
        }

        terminal.draw(|f| ui::render(f, app, ui))?;

        let wait = app.time_until_due(Instant::now()).min(INPUT_WAIT);
        if !event::poll(wait)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(ev) = events::handle_key(key, app, ui) {
                dispatch(terminal, app, ui, ev);
            }
        }
    }
    Ok(())
}

fn dispatch<S: MailService>(
    terminal: &mut DefaultTerminal,
    app: &mut App<S>,
    ui: &mut UiState,
    ev: MenuEvent,
) {
    if ev.kind == EventKind::ShowMessage {
        ui.body_scroll = 0;
    }
    // the browser sign-in prints to the terminal, so step out of the alternate screen
    if ev.kind == EventKind::Reconnect {
        ratatui::restore();
        app.dispatch(ev);
        *terminal = ratatui::init();
        return;
    }
    app.dispatch(ev);
}
