use std::collections::HashSet;
use std::fmt::Write as _;

use crate::domain::message::{
    ContentCache, DisplayEntry, DisplayList, MessageRecord, Scope, ScopeView, WatchState,
};
use crate::mail::decoders::{format_local, truncate_chars};
use crate::settings::Settings;

pub const TITLE_MAX_CHARS: usize = 80;

/// Build the unread list shown in the menu.
///
/// Per scope: fetched messages only, newest first, one per thread, at most
/// `max_show` entries. `count` always reflects every unread id.
pub fn build_display(
    scopes: &[Scope],
    watch: &WatchState,
    cache: &ContentCache,
    total_unread: usize,
    max_show: usize,
) -> DisplayList {
    let mut views = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let ids = watch.get(&scope.name).map(Vec::as_slice).unwrap_or(&[]);

        let mut fetched: Vec<&MessageRecord> = ids
            .iter()
            .filter_map(|id| cache.get(id))
            .filter(|r| r.is_fetched())
            .collect();
        // stable: equal dates keep listing order
        fetched.sort_by(|a, b| b.date.cmp(&a.date));

        let mut threads: HashSet<&str> = HashSet::new();
        let mut entries = Vec::new();
        for r in fetched {
            let thread = if r.thread_id.is_empty() {
                r.id.as_str()
            } else {
                r.thread_id.as_str()
            };
            if !threads.insert(thread) {
                continue;
            }
            if entries.len() >= max_show {
                break;
            }
            entries.push(entry(r));
        }

        views.push(ScopeView {
            name: scope.name.clone(),
            count: ids.len(),
            entries,
        });
    }
    DisplayList {
        total_unread,
        scopes: views,
    }
}

fn entry(r: &MessageRecord) -> DisplayEntry {
    let date = r.date.as_ref().map(format_local).unwrap_or_default();
    let title = format!("{} | {} | {}", date, r.from_name, r.subject());
    DisplayEntry {
        id: r.id.clone(),
        thread_id: r.thread_id.clone(),
        title: truncate_chars(&title, TITLE_MAX_CHARS),
        snippet: r.snippet.clone(),
    }
}

/// Plain-text report for `--commandline`.
pub fn render_report(settings: &Settings, display: &DisplayList) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "labels: {}", settings.get(crate::settings::KEY_LABELS).unwrap_or(""));
    let _ = writeln!(out, "filter: {}", settings.filter());
    let _ = writeln!(out, "Total number of unread messages: {}\n", display.total_unread);

    if let [only] = display.scopes.as_slice() {
        for e in &only.entries {
            let _ = writeln!(out, "{}", e.title);
        }
    } else {
        for scope in &display.scopes {
            let _ = writeln!(out, "{} messages for {}", scope.count, scope.name);
            for e in &scope.entries {
                let _ = writeln!(out, "{}", e.title);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, thread: &str, secs: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            thread_id: thread.into(),
            subject: Some(format!("subject {id}")),
            from_name: "Alice".into(),
            date: Utc.timestamp_opt(secs, 0).single(),
            snippet: format!("snippet {id}"),
            ..MessageRecord::default()
        }
    }

    fn fixture(records: Vec<MessageRecord>) -> (Vec<Scope>, WatchState, ContentCache) {
        let scopes = vec![Scope::inbox()];
        let mut watch = WatchState::new();
        watch.insert(
            "INBOX".into(),
            records.iter().map(|r| r.id.clone()).collect(),
        );
        let cache = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        (scopes, watch, cache)
    }

    #[test]
    fn newest_first_and_one_per_thread() {
        let (scopes, watch, cache) = fixture(vec![
            record("a", "t1", 100),
            record("b", "t1", 300),
            record("c", "t2", 200),
        ]);
        let d = build_display(&scopes, &watch, &cache, 3, 10);
        let ids: Vec<&str> = d.scopes[0].entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(d.scopes[0].count, 3);
    }

    #[test]
    fn partial_records_are_hidden() {
        let mut partial = record("p", "t9", 500);
        partial.subject = None;
        let (scopes, watch, cache) = fixture(vec![record("a", "t1", 100), partial]);
        let d = build_display(&scopes, &watch, &cache, 2, 10);
        assert_eq!(d.scopes[0].entries.len(), 1);
        assert_eq!(d.scopes[0].count, 2);
    }

    #[test]
    fn cap_applies_per_scope() {
        let records = (0..15)
            .map(|i| record(&format!("m{i}"), &format!("t{i}"), i))
            .collect();
        let (scopes, watch, cache) = fixture(records);
        let d = build_display(&scopes, &watch, &cache, 15, 10);
        assert_eq!(d.scopes[0].entries.len(), 10);
        assert_eq!(d.scopes[0].count, 15);
        assert_eq!(d.scopes[0].entries[0].id, "m14");
    }

    #[test]
    fn title_is_truncated() {
        let mut r = record("a", "t1", 0);
        r.subject = Some("x".repeat(200));
        let e = entry(&r);
        assert_eq!(e.title.chars().count(), TITLE_MAX_CHARS);
        assert!(e.title.contains(" | Alice | xxx"));
    }

    #[test]
    fn report_lists_counts_for_multiple_scopes() {
        let display = DisplayList {
            total_unread: 3,
            scopes: vec![
                ScopeView {
                    name: "WORK".into(),
                    count: 3,
                    entries: vec![],
                },
                ScopeView {
                    name: "PERSONAL".into(),
                    count: 0,
                    entries: vec![],
                },
            ],
        };
        let settings = crate::settings::parse("labels=work,personal\n");
        let text = render_report(&settings, &display);
        assert!(text.contains("labels: WORK,PERSONAL"));
        assert!(text.contains("Total number of unread messages: 3"));
        assert!(text.contains("3 messages for WORK"));
        assert!(text.contains("0 messages for PERSONAL"));
    }
}
