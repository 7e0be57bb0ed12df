//! One poll cycle: list unread ids per scope, diff against the previous
//! snapshot, fetch what is missing and rebuild the display list.

use std::collections::{HashMap, HashSet};

use crate::daemon::display::build_display;
use crate::domain::message::{AppState, INBOX, MessageId, MessageRecord, Scope, WatchState};
use crate::error::MailError;
use crate::mail::api::{ApiMessage, MailService};
use crate::mail::decoders::{
    addr_name, extract_body, message_date, normalize_snippet, unescape_snippet,
};
use crate::settings::Settings;

/// Messages fetched in full per cycle.
pub const MAILS_MAX_GET: usize = 10;
/// Entries shown per scope.
pub const MAILS_MAX_SHOW: usize = 10;
const NOTIFICATION_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_fetch: usize,
    pub max_show: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_fetch: MAILS_MAX_GET,
            max_show: MAILS_MAX_SHOW,
        }
    }
}

/// A message that should be announced with a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMail {
    pub id: MessageId,
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Some scope's unread ids differ from the last snapshot, or a scope went away.
    pub changed: bool,
    pub total_unread: usize,
    pub scopes: Vec<Scope>,
    pub notifications: Vec<NewMail>,
}

/// `Work/Urgent` -> `WORK-URGENT`
pub fn normalize_label(name: &str) -> String {
    name.to_uppercase().replace('/', "-")
}

/// Turn the configured labels and filter into the scopes to watch.
pub fn resolve_scopes(
    service: &mut dyn MailService,
    labels: &[String],
    filter: &str,
) -> Result<Vec<Scope>, MailError> {
    if labels.is_empty() {
        if filter.trim().is_empty() {
            return Ok(vec![Scope::inbox()]);
        }
        return Ok(vec![Scope::unrestricted()]);
    }

    let ids: HashMap<String, String> = if labels.iter().all(|l| l == INBOX) {
        HashMap::from([(INBOX.to_string(), INBOX.to_string())])
    } else {
        service
            .list_labels()?
            .into_iter()
            .map(|l| (normalize_label(&l.name), l.id))
            .collect()
    };

    let mut scopes: Vec<Scope> = Vec::new();
    for label in labels {
        let Some(id) = ids.get(&normalize_label(label)) else {
            log::warn!("label {label} does not exist on this account, ignoring");
            continue;
        };
        if scopes.iter().any(|s| s.name == *label) {
            continue;
        }
        scopes.push(Scope {
            name: label.clone(),
            label_id: Some(id.clone()),
        });
    }
    if scopes.is_empty() {
        scopes.push(Scope::unrestricted());
    }
    Ok(scopes)
}

pub fn unread_query(filter: &str) -> String {
    format!("label:unread {}", filter.trim()).trim_end().to_string()
}

/// Every unread id in `scope`, following page tokens to the end.
fn list_scope(
    service: &mut dyn MailService,
    scope: &Scope,
    query: &str,
) -> Result<Vec<MessageId>, MailError> {
    let mut ids = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = service.list_unread(scope.label_id.as_deref(), query, token.as_deref())?;
        ids.extend(page.messages.into_iter().map(|m| m.id));
        match page.next_page_token {
            Some(t) if !t.is_empty() => token = Some(t),
            _ => break,
        }
    }
    Ok(ids)
}

/// Fill a record from a full message.
pub fn record_from_api(msg: ApiMessage) -> MessageRecord {
    let p = &msg.payload;
    let header = |name: &str| p.header(name).map(str::to_string);
    let from = header("From").unwrap_or_default();

    MessageRecord {
        id: msg.id.clone(),
        thread_id: msg.thread_id.clone(),
        label_ids: msg.label_ids.clone(),
        snippet: unescape_snippet(&msg.snippet),
        // a missing Subject header still marks the record as fetched
        subject: Some(header("Subject").unwrap_or_default()),
        date: message_date(p.header("Date"), msg.internal_date.as_deref()),
        from_name: addr_name(&from),
        from,
        to: header("To").unwrap_or_default(),
        cc: header("Cc").unwrap_or_default(),
        rfc822_id: header("Message-ID"),
        in_reply_to: header("In-Reply-To"),
        references: header("References"),
        body: extract_body(&msg),
        notify_pending: false,
    }
}

/// Run one reconciliation cycle against `service`, updating `state`.
///
/// A listing failure leaves `state` untouched. A failure while fetching
/// content stops fetching for this cycle; what was fetched is kept.
pub fn poll(
    service: &mut dyn MailService,
    settings: &Settings,
    limits: Limits,
    state: &mut AppState,
) -> Result<PollOutcome, MailError> {
    let scopes = resolve_scopes(service, &settings.labels(), settings.filter())?;
    let query = unread_query(settings.filter());

    let mut snapshot = WatchState::new();
    for scope in &scopes {
        let ids = list_scope(service, scope, &query)?;
        snapshot.insert(scope.name.clone(), ids);
    }

    let mut changed = scopes.iter().any(|s| {
        let prev = state.watch.get(&s.name).map(Vec::as_slice).unwrap_or(&[]);
        snapshot.get(&s.name).map(Vec::as_slice).unwrap_or(&[]) != prev
    });
    let removed: Vec<&String> = state
        .watch
        .keys()
        .filter(|k| !snapshot.contains_key(*k))
        .collect();
    if !removed.is_empty() {
        log::debug!("scopes no longer watched: {removed:?}");
        changed = true;
    }
    state.watch = snapshot;

    // a message in two watched labels counts once
    let mut seen: HashSet<&MessageId> = HashSet::new();
    let all_ids: Vec<MessageId> = scopes
        .iter()
        .flat_map(|s| state.watch.get(&s.name).into_iter().flatten())
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();

    let mut outcome = PollOutcome {
        changed,
        total_unread: all_ids.len(),
        scopes: scopes.clone(),
        notifications: Vec::new(),
    };

    let pending = all_ids
        .iter()
        .any(|id| !state.cache.get(id).is_some_and(MessageRecord::is_fetched));
    if !changed && !pending {
        state.first_poll = false;
        return Ok(outcome);
    }

    let keep: HashSet<&str> = all_ids.iter().map(String::as_str).collect();
    state.cache.retain(|id, _| keep.contains(id.as_str()));

    let announce = !state.first_poll;
    for id in &all_ids {
        state
            .cache
            .entry(id.clone())
            .or_insert_with(|| MessageRecord::partial(id.clone(), announce));
    }

    let notify = settings.notifications_enabled();
    let mut fetched = 0;
    for id in &all_ids {
        if state.cache.get(id).is_some_and(MessageRecord::is_fetched) {
            continue;
        }
        if fetched >= limits.max_fetch {
            break;
        }
        fetched += 1;
        match service.get_message(id) {
            Ok(msg) => {
                let was_pending = state.cache.get(id).is_some_and(|r| r.notify_pending);
                let record = record_from_api(msg);
                if was_pending && notify {
                    outcome.notifications.push(NewMail {
                        id: record.id.clone(),
                        title: format!("Mail from {}", record.from_name),
                        subtitle: record.subject().to_string(),
                        body: normalize_snippet(&record.snippet, NOTIFICATION_BODY_CHARS),
                    });
                }
                state.cache.insert(id.clone(), record);
            }
            Err(e) => {
                log::error!("fetching message {id} failed: {e}");
                service.invalidate();
                break;
            }
        }
    }
    log::debug!(
        "{} unread, fetched {fetched}, {} still partial",
        all_ids.len(),
        state.cache.values().filter(|r| !r.is_fetched()).count()
    );

    state.display = build_display(
        &scopes,
        &state.watch,
        &state.cache,
        all_ids.len(),
        limits.max_show,
    );
    state.first_poll = false;
    Ok(outcome)
}
