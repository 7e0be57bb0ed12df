use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, MenuItem, VERSION, View};
use crate::mail::api::MailService;
use crate::mail::decoders::format_local;
use crate::terminal::state::UiState;

pub fn render<S: MailService>(f: &mut Frame, app: &App<S>, ui: &mut UiState) {
    let [main, footer] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)])
        .margin(1)
        .areas(f.area());

    let items = app.menu_items();
    ui.clamp(&items);
    render_menu(f, main, app, &items, ui);

    match &app.view {
        View::Menu => {}
        View::Message { id, .. } => render_message(f, main, app, id, ui.body_scroll),
        View::Prompt { kind, input } => {
            let area = centered(main, 70, 5);
            let p = Paragraph::new(format!("{input}_"))
                .block(popup(kind.title()))
                .wrap(Wrap { trim: false });
            f.render_widget(Clear, area);
            f.render_widget(p, area);
        }
        View::Reply { draft, text } => {
            let mut lines = vec![
                Line::from(format!("To: {}", draft.to)),
                Line::from(format!("Cc: {}", draft.cc.join(", "))),
                Line::from(format!("Subject: {}", draft.subject)),
                Line::from(""),
            ];
            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
            lines.push(Line::from("_"));
            let area = centered(main, 90, main.height.saturating_sub(2));
            f.render_widget(Clear, area);
            f.render_widget(
                Paragraph::new(Text::from(lines))
                    .block(popup(" Reply "))
                    .wrap(Wrap { trim: false }),
                area,
            );
        }
        View::ConfirmUninstall => {
            let area = centered(main, 60, 5);
            f.render_widget(Clear, area);
            f.render_widget(
                Paragraph::new("Remove the login item, settings and stored credentials? (y/n)")
                    .block(popup(" Uninstall "))
                    .wrap(Wrap { trim: true }),
                area,
            );
        }
        View::About => {
            let area = centered(main, 60, 6);
            f.render_widget(Clear, area);
            f.render_widget(
                Paragraph::new(format!(
                    "menubar_mail {VERSION}\nUnread Gmail at a glance.\n\nPress any key."
                ))
                .block(popup(" About ")),
                area,
            );
        }
    }

    f.render_widget(hint(app), footer);
}

fn render_menu<S: MailService>(
    f: &mut Frame,
    area: Rect,
    app: &App<S>,
    items: &[MenuItem],
    ui: &mut UiState,
) {
    let title = match app.state.display.indicator_title() {
        t if t.is_empty() => " ✉ ".to_string(),
        t => format!(" ✉ {t} "),
    };
    let border = if app.state.display.total_unread > 0 {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));

    let list_items: Vec<ListItem> = items
        .iter()
        .map(|it| {
            let indent = "  ".repeat(it.depth as usize);
            let style = match (it.event.is_some(), it.depth) {
                (false, _) => Style::default().fg(Color::Gray),
                (true, 1) if app.state.display.scopes.len() > 1 => {
                    Style::default().add_modifier(Modifier::BOLD)
                }
                _ => Style::default(),
            };
            ListItem::new(Line::from(Span::styled(format!("{indent}{}", it.label), style)))
        })
        .collect();

    let list = List::new(list_items)
        .block(block)
        .highlight_symbol("➜ ")
        .highlight_style(Style::default().fg(Color::Green));

    f.render_stateful_widget(list, area, &mut ui.list_state);
}

fn render_message<S: MailService>(f: &mut Frame, area: Rect, app: &App<S>, id: &str, scroll: u16) {
    let Some(r) = app.record(id) else {
        return;
    };
    let date = r.date.as_ref().map(format_local).unwrap_or_default();
    let mut lines = vec![
        Line::from(Span::styled(
            r.subject().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("From: {}", r.from)),
        Line::from(format!("To: {}", r.to)),
    ];
    if !r.cc.is_empty() {
        lines.push(Line::from(format!("Cc: {}", r.cc)));
    }
    lines.push(Line::from(format!("Date: {date}")));
    lines.push(Line::from(""));
    lines.extend(r.body.lines().map(|l| Line::from(l.to_string())));

    let inner = centered(area, 90, area.height.saturating_sub(2));
    f.render_widget(Clear, inner);
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(popup(" Email "))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        inner,
    );
}

fn hint<S: MailService>(app: &App<S>) -> Paragraph<'static> {
    if let Some(status) = &app.status {
        return Paragraph::new(Span::styled(status.clone(), Style::default().fg(Color::Red)));
    }
    let keys: &[(&str, &str)] = match app.view {
        View::Menu => &[
            ("j/k", "move"),
            ("Enter", "select"),
            ("c", "check now"),
            ("i", "inbox"),
            ("q", "quit"),
        ],
        View::Message { .. } => &[
            ("o", "open in browser"),
            ("m", "mark as read"),
            ("r", "reply"),
            ("Esc", "cancel"),
        ],
        View::Prompt { .. } => &[("Enter", "ok"), ("Esc", "cancel")],
        View::Reply { .. } => &[("C-s", "send"), ("C-d", "save draft"), ("Esc", "cancel")],
        View::ConfirmUninstall => &[("y", "uninstall"), ("n", "cancel")],
        View::About => &[],
    };
    let mut spans = Vec::new();
    for (key, what) in keys {
        spans.push(Span::styled(
            key.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {what}  ")));
    }
    Paragraph::new(Line::from(spans))
}

fn popup(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Yellow))
}

/// A box `percent_x` wide and `height` rows tall in the middle of `area`.
fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [_, row, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, cell, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(row);
    cell
}
