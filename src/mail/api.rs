use serde::Deserialize;

use crate::error::MailError;

/// A label as listed by `users.labels.list`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

/// One page of `users.messages.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// base64url
    pub data: Option<String>,
    pub size: Option<u64>,
}

/// The message payload and its MIME parts share one shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<Payload>,
}

impl Payload {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn data(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.data.as_deref())
    }
}

/// A full message from `users.messages.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    /// Milliseconds since the epoch, as a decimal string.
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Payload,
}

/// What the poll loop and the menu actions need from the mail provider.
///
/// Implementations keep an authenticated session around between calls;
/// [`MailService::invalidate`] drops it so the next call starts over.
pub trait MailService {
    /// Address of the authenticated account.
    fn profile_address(&mut self) -> Result<String, MailError>;

    fn list_labels(&mut self) -> Result<Vec<Label>, MailError>;

    /// One page of message ids matching `query`, optionally restricted to a label.
    fn list_unread(
        &mut self,
        label_id: Option<&str>,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessagePage, MailError>;

    fn get_message(&mut self, id: &str) -> Result<ApiMessage, MailError>;

    fn modify_labels(&mut self, id: &str, add: &[&str], remove: &[&str])
    -> Result<(), MailError>;

    /// Send an RFC 5322 message.
    fn send_raw(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError>;

    /// Store an RFC 5322 message as a draft.
    fn create_draft(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError>;

    fn invalidate(&mut self);

    /// Forget the session, authenticate again and return the account address.
    fn reconnect(&mut self) -> Result<String, MailError> {
        self.invalidate();
        self.profile_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_deserializes_from_gmail_json() {
        let json = r#"{
            "id": "18c1",
            "threadId": "18c0",
            "labelIds": ["UNREAD", "INBOX"],
            "snippet": "See you tomorrow",
            "internalDate": "1700000000000",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Lunch"}],
                "body": {"size": 0},
                "parts": [
                    {"mimeType": "text/plain", "body": {"size": 5, "data": "aGVsbG8"}}
                ]
            }
        }"#;
        let m: ApiMessage = serde_json::from_str(json).unwrap();
        assert_eq!(m.thread_id, "18c0");
        assert_eq!(m.payload.header("subject"), Some("Lunch"));
        assert_eq!(m.payload.parts[0].data(), Some("aGVsbG8"));
        assert_eq!(m.payload.data(), None);
    }

    #[test]
    fn empty_page_has_no_messages() {
        let page: MessagePage = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(page.messages.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
