//! The indicator's behaviour, independent of how it is drawn.
//!
//! Every menu item, button and notification click becomes a [`MenuEvent`]
//! handled by [`App::dispatch`].

use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use crate::daemon;
use crate::daemon::notifier::Notifier;
use crate::daemon::reconcile::{Limits, PollOutcome};
use crate::domain::event::{EventKind, MenuEvent};
use crate::domain::message::{AppState, MessageId, MessageRecord};
use crate::mail::api::MailService;
use crate::mail::compose::{ReplyDraft, ReplyMode, prepare_reply};
use crate::settings::{self, Settings};
use crate::system;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clicking "Inbox" re-checks shortly after, once the user had a chance to read.
const RECHECK_AFTER_OPEN: Duration = Duration::from_secs(10);

const CHECK_FAILED: &str = "Error checking mail";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Interval,
    Labels,
    Filter,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            PromptKind::Interval => "Set checking interval (s)",
            PromptKind::Labels => {
                "Set labels (comma-separated list). If labels and filter are empty, INBOX is checked."
            }
            PromptKind::Filter => "Set filter, e.g. \"newer_than:1w\" for mails within a week",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Menu,
    Message { scope: String, id: MessageId },
    Prompt { kind: PromptKind, input: String },
    Reply { draft: ReplyDraft, text: String },
    ConfirmUninstall,
    About,
}

/// One line of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub depth: u8,
    pub event: Option<MenuEvent>,
}

impl MenuItem {
    fn action(label: impl Into<String>, depth: u8, event: MenuEvent) -> Self {
        Self {
            label: label.into(),
            depth,
            event: Some(event),
        }
    }

    fn text(label: impl Into<String>, depth: u8) -> Self {
        Self {
            label: label.into(),
            depth,
            event: None,
        }
    }

    fn separator() -> Self {
        Self::text("", 0)
    }
}

pub struct App<S: MailService> {
    pub service: S,
    pub settings: Settings,
    pub state: AppState,
    pub limits: Limits,
    pub view: View,
    /// Last error or confirmation, shown in the footer.
    pub status: Option<String>,
    pub quit: bool,
    /// Set once the user confirmed uninstall; the caller cleans up after
    /// the terminal is restored.
    pub uninstall_requested: bool,
    client_id: Option<String>,
    notifier: Option<Notifier>,
    next_poll: Instant,
    recheck_at: Option<Instant>,
}

impl<S: MailService> App<S> {
    pub fn new(service: S, settings: Settings) -> Self {
        Self {
            service,
            settings,
            state: AppState::new(),
            limits: Limits::default(),
            view: View::Menu,
            status: None,
            quit: false,
            uninstall_requested: false,
            client_id: None,
            notifier: None,
            next_poll: Instant::now(),
            recheck_at: None,
        }
    }

    pub fn with_notifications(mut self, events: Sender<MenuEvent>) -> Self {
        self.notifier = Some(Notifier::new(events, self.settings.dark_icon()));
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.settings.interval_secs())
    }

    /// How long the event loop may sleep before [`App::tick`] has work.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        let due = match self.recheck_at {
            Some(r) if r < self.next_poll => r,
            _ => self.next_poll,
        };
        due.saturating_duration_since(now)
    }

    /// Poll when the interval (or a scheduled re-check) has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let recheck_due = self.recheck_at.is_some_and(|r| now >= r);
        if now >= self.next_poll || recheck_due {
            self.recheck_at = None;
            self.check_now(now);
        }
    }

    fn restart_timer(&mut self, now: Instant) {
        self.next_poll = now + self.interval();
    }

    /// Run one poll. Errors are logged and surfaced in the status line only.
    pub fn check_now(&mut self, now: Instant) -> Option<PollOutcome> {
        self.restart_timer(now);
        match daemon::check(&mut self.service, &self.settings, self.limits, &mut self.state) {
            Ok(outcome) => {
                if let Some(n) = &self.notifier {
                    for mail in &outcome.notifications {
                        n.notify_email(mail);
                    }
                }
                let poll_error_shown = self
                    .status
                    .as_deref()
                    .is_some_and(|s| s.starts_with(CHECK_FAILED));
                if outcome.changed || poll_error_shown {
                    self.status = None;
                }
                self.leave_stale_message_view();
                Some(outcome)
            }
            Err(e) => {
                let hint = if e.is_auth() { " (try Reconnect)" } else { "" };
                self.status = Some(format!("{CHECK_FAILED}: {e}{hint}"));
                None
            }
        }
    }

    fn fail(&mut self, what: &str, e: &dyn std::fmt::Display) {
        log::error!("{what}: {e}");
        self.service.invalidate();
        self.status = Some(format!("Error {what}: {e}"));
    }

    /// The message view closes once the message is no longer unread.
    fn leave_stale_message_view(&mut self) {
        let stale = match &self.view {
            View::Message { id, .. } => self.record(id).is_none(),
            _ => false,
        };
        if stale {
            self.view = View::Menu;
        }
    }

    pub fn record(&self, id: &str) -> Option<&MessageRecord> {
        self.state.cache.get(id).filter(|r| r.is_fetched())
    }

    pub fn dispatch(&mut self, ev: MenuEvent) {
        let now = Instant::now();
        log::debug!("dispatch {ev:?}");
        match ev.kind {
            EventKind::OpenInbox => {
                system::open_gmail(None);
                self.recheck_at = Some(now + RECHECK_AFTER_OPEN);
            }
            EventKind::OpenScope => {
                system::open_gmail(ev.scope.as_deref());
                self.view = View::Menu;
            }
            EventKind::CheckNow => {
                self.check_now(now);
            }
            EventKind::Reconnect => {
                match self.service.reconnect() {
                    Ok(a) => {
                        self.state.address = a;
                        self.status = Some("Reconnected".into());
                    }
                    Err(e) => self.fail("reconnecting", &e),
                }
                self.restart_timer(now);
            }
            EventKind::ShowMessage => self.show_message(ev),
            EventKind::MarkAsRead => {
                if let Some(id) = ev.message_id {
                    match self.service.modify_labels(&id, &[], &["UNREAD"]) {
                        Ok(()) => {
                            self.view = View::Menu;
                            self.check_now(now);
                        }
                        Err(e) => self.fail("marking as read", &e),
                    }
                }
            }
            EventKind::Reply => {
                if let Some(id) = ev.message_id {
                    if let Some(record) = self.record(&id) {
                        let draft = prepare_reply(record, &self.state.address);
                        let text = draft.quoted_body.clone();
                        self.view = View::Reply { draft, text };
                    }
                }
            }
            EventKind::SendReply => self.submit_reply(ReplyMode::Send),
            EventKind::SaveDraft => self.submit_reply(ReplyMode::Draft),
            EventKind::SetInterval => {
                self.open_prompt(PromptKind::Interval, self.settings.interval_secs().to_string())
            }
            EventKind::SetLabels => {
                let current = self.settings.get(settings::KEY_LABELS).unwrap_or("").to_string();
                self.open_prompt(PromptKind::Labels, current)
            }
            EventKind::SetFilter => {
                self.open_prompt(PromptKind::Filter, self.settings.filter().to_string())
            }
            EventKind::ToggleDarkIcon => {
                let on = !self.settings.dark_icon();
                self.settings.set_flag(settings::KEY_DARK_ICON, on);
                if let Some(n) = &mut self.notifier {
                    n.set_dark(on);
                }
                self.save_settings();
            }
            EventKind::ToggleNotification => {
                let on = !self.settings.notifications_enabled();
                self.settings.set_flag(settings::KEY_NOTIFICATION, on);
                self.save_settings();
            }
            EventKind::ToggleStartAtLogin => {
                let on = !self.settings.start_at_login();
                let result = if on {
                    system::register_login_item()
                } else {
                    system::unregister_login_item()
                };
                match result {
                    Ok(()) => {
                        self.settings.set_flag(settings::KEY_START_AT_LOGIN, on);
                        self.save_settings();
                    }
                    Err(e) => self.fail("updating login item", &e),
                }
            }
            EventKind::Uninstall => self.view = View::ConfirmUninstall,
            EventKind::ConfirmUninstall => {
                self.uninstall_requested = true;
                self.quit = true;
            }
            EventKind::About => self.view = View::About,
            EventKind::Back => self.view = View::Menu,
            EventKind::Quit => self.quit = true,
        }
    }

    fn show_message(&mut self, ev: MenuEvent) {
        let Some(id) = ev.message_id else {
            return;
        };
        if self.record(&id).is_none() {
            self.status = Some("That message is no longer unread".into());
            return;
        }
        let scope = ev.scope.unwrap_or_default();
        self.view = View::Message { scope, id };
    }

    fn open_prompt(&mut self, kind: PromptKind, input: String) {
        self.view = View::Prompt { kind, input };
    }

    /// Apply the text typed into the open prompt.
    pub fn submit_prompt(&mut self) {
        let View::Prompt { kind, input } = &self.view else {
            return;
        };
        let (kind, input) = (*kind, input.trim().to_string());
        let now = Instant::now();
        match kind {
            PromptKind::Interval => match input.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    self.settings.set(settings::KEY_INTERVAL, secs.to_string());
                    self.restart_timer(now);
                }
                _ => {
                    self.status = Some(format!("Not a number of seconds: {input:?}"));
                    return;
                }
            },
            PromptKind::Labels => {
                self.settings.set(settings::KEY_LABELS, input);
                self.next_poll = now;
            }
            PromptKind::Filter => {
                self.settings.set(settings::KEY_FILTER, input);
                self.next_poll = now;
            }
        }
        self.save_settings();
        self.view = View::Menu;
    }

    fn submit_reply(&mut self, mode: ReplyMode) {
        let View::Reply { draft, text } = &self.view else {
            return;
        };
        let raw = match draft.to_rfc822(text) {
            Ok(raw) => raw,
            Err(e) => {
                self.status = Some(format!("Could not build reply: {e:#}"));
                return;
            }
        };
        let thread = draft.thread_id.clone();
        let thread = (!thread.is_empty()).then_some(thread);
        let result = match mode {
            ReplyMode::Send => self.service.send_raw(&raw, thread.as_deref()),
            ReplyMode::Draft => self.service.create_draft(&raw, thread.as_deref()),
        };
        match result {
            Ok(()) => {
                self.status = Some(match mode {
                    ReplyMode::Send => "Reply sent".into(),
                    ReplyMode::Draft => "Draft saved".into(),
                });
                self.view = View::Menu;
            }
            Err(e) => self.fail("sending reply", &e),
        }
    }

    fn save_settings(&mut self) {
        if let Err(e) = self.settings.save() {
            log::error!("saving settings: {e:#}");
            self.status = Some(format!("Could not save settings: {e}"));
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The menu as it should be drawn right now.
    pub fn menu_items(&self) -> Vec<MenuItem> {
        let d = &self.state.display;
        let mut items = Vec::new();

        let inbox = if self.state.address.is_empty() {
            "Inbox".to_string()
        } else {
            format!("Inbox: {}", self.state.address)
        };
        items.push(MenuItem::action(inbox, 0, MenuEvent::new(EventKind::OpenInbox)));
        items.push(MenuItem::action("Check now", 0, MenuEvent::new(EventKind::CheckNow)));
        items.push(MenuItem::action("Reconnect", 0, MenuEvent::new(EventKind::Reconnect)));
        items.push(MenuItem::text(format!("Unread messages: {}", d.total_unread), 0));

        let multi = d.scopes.len() > 1;
        for scope in &d.scopes {
            let depth = if multi {
                items.push(MenuItem::action(
                    format!("{}: {}", scope.name, scope.count),
                    1,
                    MenuEvent::for_scope(EventKind::OpenScope, scope.name.clone()),
                ));
                2
            } else {
                1
            };
            for e in &scope.entries {
                items.push(MenuItem::action(
                    e.title.clone(),
                    depth,
                    MenuEvent::for_message(EventKind::ShowMessage, scope.name.clone(), e.id.clone()),
                ));
            }
        }

        let check = |on: bool| if on { "[x]" } else { "[ ]" };
        items.push(MenuItem::separator());
        items.push(MenuItem::action(
            format!("Set checking interval ({}s)", self.settings.interval_secs()),
            0,
            MenuEvent::new(EventKind::SetInterval),
        ));
        items.push(MenuItem::action("Set labels", 0, MenuEvent::new(EventKind::SetLabels)));
        items.push(MenuItem::action("Set filter", 0, MenuEvent::new(EventKind::SetFilter)));
        items.push(MenuItem::separator());
        items.push(MenuItem::action(
            format!("{} Menubar icon for dark", check(self.settings.dark_icon())),
            0,
            MenuEvent::new(EventKind::ToggleDarkIcon),
        ));
        items.push(MenuItem::action(
            format!("{} Mail notification", check(self.settings.notifications_enabled())),
            0,
            MenuEvent::new(EventKind::ToggleNotification),
        ));
        items.push(MenuItem::action(
            format!("{} Start at login", check(self.settings.start_at_login())),
            0,
            MenuEvent::new(EventKind::ToggleStartAtLogin),
        ));
        items.push(MenuItem::separator());
        items.push(MenuItem::action("Uninstall", 0, MenuEvent::new(EventKind::Uninstall)));
        items.push(MenuItem::separator());
        items.push(MenuItem::action("About", 0, MenuEvent::new(EventKind::About)));
        items.push(MenuItem::action("Quit", 0, MenuEvent::new(EventKind::Quit)));
        items
    }
}
