use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, View};
use crate::domain::event::{EventKind, MenuEvent};
use crate::mail::api::MailService;
use crate::terminal::state::UiState;

/// Translate a key press into a menu event. Text entry is applied in place.
pub fn handle_key<S: MailService>(
    key: KeyEvent,
    app: &mut App<S>,
    ui: &mut UiState,
) -> Option<MenuEvent> {
    match &app.view {
        View::Menu => return handle_menu_keys(key, app, ui),
        View::Prompt { .. } if key.code == KeyCode::Enter => {
            app.submit_prompt();
            return None;
        }
        _ => {}
    }

    match &mut app.view {
        View::Menu => None,
        View::Message { scope, id } => {
            let (scope, id) = (scope.clone(), id.clone());
            handle_message_keys(key, ui, scope, id)
        }
        View::Prompt { input, .. } => match key.code {
            KeyCode::Esc => Some(MenuEvent::new(EventKind::Back)),
            KeyCode::Backspace => {
                input.pop();
                None
            }
            KeyCode::Char(c) => {
                input.push(c);
                None
            }
            _ => None,
        },
        View::Reply { text, .. } => handle_reply_keys(key, text),
        View::ConfirmUninstall => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                Some(MenuEvent::new(EventKind::ConfirmUninstall))
            }
            _ => Some(MenuEvent::new(EventKind::Back)),
        },
        View::About => Some(MenuEvent::new(EventKind::Back)),
    }
}

fn handle_menu_keys<S: MailService>(
    key: KeyEvent,
    app: &App<S>,
    ui: &mut UiState,
) -> Option<MenuEvent> {
    let items = app.menu_items();
    match key.code {
        KeyCode::Char('q') => Some(MenuEvent::new(EventKind::Quit)),
        KeyCode::Char('c') => Some(MenuEvent::new(EventKind::CheckNow)),
        KeyCode::Char('i') => Some(MenuEvent::new(EventKind::OpenInbox)),
        KeyCode::Down | KeyCode::Char('j') => {
            ui.move_selection(&items, 1);
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            ui.move_selection(&items, -1);
            None
        }
        KeyCode::Home => {
            ui.list_state.select(None);
            ui.clamp(&items);
            None
        }
        KeyCode::End => {
            ui.move_selection(&items, i32::MAX / 2);
            None
        }
        KeyCode::Enter => {
            let ev = ui.selected(&items).and_then(|i| i.event.clone());
            if ev.as_ref().is_some_and(|e| e.kind == EventKind::ShowMessage) {
                ui.body_scroll = 0;
            }
            ev
        }
        _ => None,
    }
}

fn handle_message_keys(key: KeyEvent, ui: &mut UiState, scope: String, id: String) -> Option<MenuEvent> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(MenuEvent::new(EventKind::Back)),
        KeyCode::Char('o') => Some(MenuEvent::for_scope(EventKind::OpenScope, scope)),
        KeyCode::Char('m') => Some(MenuEvent::for_message(EventKind::MarkAsRead, scope, id)),
        KeyCode::Char('r') => Some(MenuEvent::for_message(EventKind::Reply, scope, id)),
        KeyCode::Down | KeyCode::Char('j') => {
            ui.scroll_body(1);
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            ui.scroll_body(-1);
            None
        }
        KeyCode::PageDown => {
            ui.scroll_body(10);
            None
        }
        KeyCode::PageUp => {
            ui.scroll_body(-10);
            None
        }
        KeyCode::Home => {
            ui.body_scroll = 0;
            None
        }
        _ => None,
    }
}

fn handle_reply_keys(key: KeyEvent, text: &mut String) -> Option<MenuEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Some(MenuEvent::new(EventKind::Back)),
        KeyCode::Char('s') if ctrl => Some(MenuEvent::new(EventKind::SendReply)),
        KeyCode::Char('d') if ctrl => Some(MenuEvent::new(EventKind::SaveDraft)),
        KeyCode::Enter => {
            text.push('\n');
            None
        }
        KeyCode::Backspace => {
            text.pop();
            None
        }
        KeyCode::Char(c) => {
            text.push(c);
            None
        }
        _ => None,
    }
}
