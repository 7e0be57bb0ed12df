use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub type MessageId = String;

/// Name of the pseudo scope that carries no label restriction.
pub const NO_SCOPE: &str = "None";
pub const INBOX: &str = "INBOX";

/// A bucket of unread messages: one provider label, or no restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: String,
    pub label_id: Option<String>,
}

impl Scope {
    pub fn inbox() -> Self {
        Self {
            name: INBOX.to_string(),
            label_id: Some(INBOX.to_string()),
        }
    }

    pub fn unrestricted() -> Self {
        Self {
            name: NO_SCOPE.to_string(),
            label_id: None,
        }
    }
}

/// What we know about one unread message.
///
/// Records start out with only an id; `subject` is filled in once the full
/// message has been fetched.
#[derive(Debug, Clone, Default)]
pub struct MessageRecord {
    pub id: MessageId,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub subject: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub cc: String,
    /// `Message-ID` header.
    pub rfc822_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub body: String,
    /// Raise a notification once the content arrives.
    pub notify_pending: bool,
}

impl MessageRecord {
    pub fn partial(id: impl Into<MessageId>, notify_pending: bool) -> Self {
        Self {
            id: id.into(),
            notify_pending,
            ..Self::default()
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.subject.is_some()
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}

/// Previous poll's unread ids, per scope name.
pub type WatchState = HashMap<String, Vec<MessageId>>;

/// Message content, keyed by id.
pub type ContentCache = HashMap<MessageId, MessageRecord>;

/// One rendered line in the unread list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub id: MessageId,
    pub thread_id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeView {
    pub name: String,
    /// Every unread id in the scope, not only the rendered ones.
    pub count: usize,
    pub entries: Vec<DisplayEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayList {
    pub total_unread: usize,
    pub scopes: Vec<ScopeView>,
}

impl DisplayList {
    pub fn scope(&self, name: &str) -> Option<&ScopeView> {
        self.scopes.iter().find(|s| s.name == name)
    }

    /// Label text for the indicator itself: empty when nothing is unread.
    pub fn indicator_title(&self) -> String {
        if self.total_unread == 0 {
            String::new()
        } else {
            self.total_unread.to_string()
        }
    }
}

/// Everything the poll loop carries from one cycle to the next.
#[derive(Debug, Clone)]
pub struct AppState {
    pub watch: WatchState,
    pub cache: ContentCache,
    pub first_poll: bool,
    pub display: DisplayList,
    /// Account address, known once the service has authenticated.
    pub address: String,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            watch: WatchState::new(),
            cache: ContentCache::new(),
            first_poll: true,
            display: DisplayList::default(),
            address: String::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
