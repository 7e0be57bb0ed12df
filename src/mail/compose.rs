use anyhow::{Context, Result};
use lettre::message::{Mailbox, Message, header::ContentType};

use crate::domain::message::MessageRecord;
use crate::mail::decoders::addr_spec;

/// Headers and quoted text for a reply, before the user edits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub to: String,
    pub cc: Vec<String>,
    pub from: String,
    pub subject: String,
    pub quoted_body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub thread_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Send,
    Draft,
}

/// Reply to the sender, copying the other recipients except ourselves.
pub fn prepare_reply(original: &MessageRecord, own_address: &str) -> ReplyDraft {
    let to = addr_spec(&original.from);
    let own = own_address.to_lowercase();
    let to_lower = to.to_lowercase();

    let mut cc: Vec<String> = Vec::new();
    for raw in original.to.split(',').chain(original.cc.split(',')) {
        if raw.trim().is_empty() {
            continue;
        }
        let addr = addr_spec(raw);
        let lower = addr.to_lowercase();
        if lower == to_lower || lower == own || cc.iter().any(|c| c.to_lowercase() == lower) {
            continue;
        }
        cc.push(addr);
    }

    let subject = original.subject();
    let subject = if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    };

    let references = match (&original.references, &original.rfc822_id) {
        (Some(r), Some(id)) => Some(format!("{r} {id}")),
        (None, Some(id)) => Some(id.clone()),
        (Some(r), None) => Some(r.clone()),
        (None, None) => None,
    };

    ReplyDraft {
        to,
        cc,
        from: own_address.to_string(),
        subject,
        quoted_body: quote(&original.body),
        in_reply_to: original.rfc822_id.clone(),
        references,
        thread_id: original.thread_id.clone(),
    }
}

/// Prefix every line with `> `.
pub fn quote(body: &str) -> String {
    let mut out = String::new();
    for line in body.split('\n') {
        out.push_str("> ");
        out.push_str(line.trim_end_matches('\r'));
        out.push('\n');
    }
    out
}

impl ReplyDraft {
    /// Render the RFC 5322 message with `text` as the body.
    pub fn to_rfc822(&self, text: &str) -> Result<Vec<u8>> {
        let mut b = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(self.subject.clone());
        for cc in &self.cc {
            b = b.cc(parse_mailbox(cc)?);
        }
        if let Some(id) = &self.in_reply_to {
            b = b.in_reply_to(id.clone());
        }
        if let Some(refs) = &self.references {
            b = b.references(refs.clone());
        }
        let msg = b
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .context("building reply")?;
        Ok(msg.formatted())
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .with_context(|| format!("invalid address {addr:?}"))
}
