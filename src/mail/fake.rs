//! In-memory [`MailService`] for tests.

use std::collections::HashMap;

use crate::error::MailError;
use crate::mail::api::{
    ApiMessage, Header, Label, MailService, MessagePage, MessageRef, Payload,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub raw: Vec<u8>,
    pub thread_id: Option<String>,
    pub draft: bool,
}

#[derive(Default)]
pub struct FakeMail {
    pub address: String,
    pub labels: Vec<Label>,
    /// Unread ids per label id; `None` is the unrestricted listing.
    pub unread: HashMap<Option<String>, Vec<String>>,
    pub messages: HashMap<String, ApiMessage>,
    /// 0 means everything on one page.
    pub page_size: usize,
    pub fail_list: bool,
    /// Fail `get_message` once this many calls have succeeded.
    pub fail_get_after: Option<usize>,

    pub label_calls: usize,
    pub list_calls: usize,
    pub fetched: Vec<String>,
    pub invalidations: usize,
    pub queries: Vec<String>,
    pub modified: Vec<(String, Vec<String>, Vec<String>)>,
    pub sent: Vec<Sent>,
}

impl FakeMail {
    pub fn new() -> Self {
        Self {
            address: "me@example.com".into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, name: &str, id: &str) -> Self {
        self.labels.push(Label {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn set_unread(&mut self, label_id: Option<&str>, ids: &[&str]) {
        self.unread.insert(
            label_id.map(str::to_string),
            ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn add_message(&mut self, msg: ApiMessage) {
        self.messages.insert(msg.id.clone(), msg);
    }
}

/// A message with the usual headers and a plain text body.
pub fn message(id: &str, thread: &str, subject: &str, from: &str, date: &str) -> ApiMessage {
    let header = |name: &str, value: &str| Header {
        name: name.into(),
        value: value.into(),
    };
    ApiMessage {
        id: id.into(),
        thread_id: thread.into(),
        label_ids: vec!["UNREAD".into(), "INBOX".into()],
        snippet: format!("snippet of {id}"),
        internal_date: None,
        payload: Payload {
            mime_type: Some("text/plain".into()),
            headers: vec![
                header("Subject", subject),
                header("From", from),
                header("To", "me@example.com"),
                header("Date", date),
                header("Message-ID", &format!("<{id}@example.com>")),
            ],
            ..Payload::default()
        },
    }
}

impl MailService for FakeMail {
    fn profile_address(&mut self) -> Result<String, MailError> {
        Ok(self.address.clone())
    }

    fn list_labels(&mut self) -> Result<Vec<Label>, MailError> {
        self.label_calls += 1;
        Ok(self.labels.clone())
    }

    fn list_unread(
        &mut self,
        label_id: Option<&str>,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessagePage, MailError> {
        self.list_calls += 1;
        self.queries.push(query.to_string());
        if self.fail_list {
            return Err(MailError::Transport("offline".into()));
        }
        let all = self
            .unread
            .get(&label_id.map(str::to_string))
            .cloned()
            .unwrap_or_default();
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = if self.page_size == 0 {
            all.len()
        } else {
            (start + self.page_size).min(all.len())
        };
        let messages = all[start..end]
            .iter()
            .map(|id| MessageRef {
                id: id.clone(),
                thread_id: None,
            })
            .collect();
        let next_page_token = (end < all.len()).then(|| end.to_string());
        Ok(MessagePage {
            messages,
            next_page_token,
        })
    }

    fn get_message(&mut self, id: &str) -> Result<ApiMessage, MailError> {
        if self.fail_get_after.is_some_and(|limit| self.fetched.len() >= limit) {
            return Err(MailError::Timeout(format!("get {id}")));
        }
        self.fetched.push(id.to_string());
        self.messages.get(id).cloned().ok_or(MailError::Api {
            status: 404,
            message: "Requested entity was not found.".into(),
        })
    }

    fn modify_labels(
        &mut self,
        id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), MailError> {
        self.modified.push((
            id.to_string(),
            add.iter().map(|s| s.to_string()).collect(),
            remove.iter().map(|s| s.to_string()).collect(),
        ));
        for ids in self.unread.values_mut() {
            if remove.contains(&"UNREAD") {
                ids.retain(|x| x != id);
            }
        }
        Ok(())
    }

    fn send_raw(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError> {
        self.sent.push(Sent {
            raw: raw.to_vec(),
            thread_id: thread_id.map(str::to_string),
            draft: false,
        });
        Ok(())
    }

    fn create_draft(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError> {
        self.sent.push(Sent {
            raw: raw.to_vec(),
            thread_id: thread_id.map(str::to_string),
            draft: true,
        });
        Ok(())
    }

    fn invalidate(&mut self) {
        self.invalidations += 1;
    }
}
