use notify_rust::Notification;
use std::collections::HashSet;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use crate::daemon::reconcile::NewMail;
use crate::domain::event::{EventKind, MenuEvent};
use crate::domain::message::{INBOX, MessageId};

const ICON: &str = "mail-unread";
const ICON_FOR_DARK: &str = "mail-unread-symbolic";

/// Desktop notifications for new mail. Activating one sends a
/// `ShowMessage` event back to the menu loop.
pub struct Notifier {
    icon: &'static str,
    events: Sender<MenuEvent>,
    open: Arc<Mutex<HashSet<MessageId>>>,
}

/// Marks a message's notification as open until dropped.
struct OpenNotification {
    open: Arc<Mutex<HashSet<MessageId>>>,
    id: MessageId,
}

impl Drop for OpenNotification {
    fn drop(&mut self) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl Notifier {
    pub fn new(events: Sender<MenuEvent>, dark: bool) -> Self {
        Self {
            icon: if dark { ICON_FOR_DARK } else { ICON },
            events,
            open: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn set_dark(&mut self, dark: bool) {
        self.icon = if dark { ICON_FOR_DARK } else { ICON };
    }

    /// `None` while an earlier notification for `id` is still open.
    fn mark_open(&self, id: &str) -> Option<OpenNotification> {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if !open.insert(id.to_string()) {
            return None;
        }
        Some(OpenNotification {
            open: Arc::clone(&self.open),
            id: id.to_string(),
        })
    }

    pub fn notify_email(&self, mail: &NewMail) {
        let Some(guard) = self.mark_open(&mail.id) else {
            log::debug!("notification for {} still open", mail.id);
            return;
        };

        let mut n = Notification::new();
        n.summary(&mail.title)
            .icon(self.icon)
            // "default" is what most servers send when the body is clicked
            .action("default", "Show")
            .action("show", "Show");
        #[cfg(all(unix, not(target_os = "macos")))]
        n.hint(notify_rust::Hint::Category("email.arrived".to_string()));

        #[cfg(target_os = "macos")]
        n.subtitle(&mail.subtitle).body(&mail.body);
        #[cfg(not(target_os = "macos"))]
        n.body(&format!("{}\n{}", mail.subtitle, mail.body));

        let handle = match n.show() {
            Ok(h) => h,
            Err(e) => {
                log::warn!("notification error: {e}");
                return;
            }
        };

        // one listener per message; it ends when the notification closes
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let events = self.events.clone();
            let id = mail.id.clone();
            std::thread::spawn(move || {
                let _guard = guard;
                handle.wait_for_action(|action| {
                    if action == "default" || action == "show" {
                        let _ = events.send(MenuEvent::for_message(EventKind::ShowMessage, INBOX, id));
                    }
                });
            });
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        drop((handle, guard));
    }
}
