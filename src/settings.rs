//! User preferences persisted as plain `key=value` lines.
//!
//! Anything after a `#` is a comment. Keys we do not know about are kept and
//! written back untouched.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY_INTERVAL: &str = "interval";
pub const KEY_LABELS: &str = "labels";
pub const KEY_FILTER: &str = "filter";
pub const KEY_DARK_ICON: &str = "menubariconfordark";
pub const KEY_NOTIFICATION: &str = "notification";
pub const KEY_START_AT_LOGIN: &str = "startatlogin";

pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    path: Option<PathBuf>,
    entries: Vec<(String, String)>,
}

impl Settings {
    /// Read settings from `path`. A missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self> {
        let mut s = Self {
            path: Some(path.to_path_buf()),
            entries: Vec::new(),
        };
        if !path.exists() {
            return Ok(s);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        s.entries = parse(&text).entries;
        Ok(s)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        fs::write(path, self.to_text())
            .with_context(|| format!("writing settings {}", path.display()))?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = normalize(key, value.into());
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn interval_secs(&self) -> u64 {
        self.get(KEY_INTERVAL)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_INTERVAL_SECS)
    }

    /// Configured labels, upper-cased and trimmed, empties dropped.
    pub fn labels(&self) -> Vec<String> {
        self.get(KEY_LABELS)
            .unwrap_or("")
            .split(',')
            .map(|l| l.trim().to_uppercase())
            .filter(|l| !l.is_empty())
            .collect()
    }

    pub fn filter(&self) -> &str {
        self.get(KEY_FILTER).map(str::trim).unwrap_or("")
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    pub fn set_flag(&mut self, key: &str, on: bool) {
        self.set(key, if on { "1" } else { "0" });
    }

    pub fn dark_icon(&self) -> bool {
        self.flag(KEY_DARK_ICON)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.flag(KEY_NOTIFICATION)
    }

    pub fn start_at_login(&self) -> bool {
        self.flag(KEY_START_AT_LOGIN)
    }
}

fn normalize(key: &str, value: String) -> String {
    if key == KEY_LABELS {
        value.to_uppercase()
    } else {
        value
    }
}

/// Parse settings text. Malformed lines are skipped.
pub fn parse(text: &str) -> Settings {
    let mut s = Settings::default();
    for line in text.lines() {
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::debug!("skipping malformed settings line: {line}");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        s.set(key, value.trim());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let s = parse("# header\n\ninterval=30 # every half minute\nlabels=work,personal\n");
        assert_eq!(s.interval_secs(), 30);
        assert_eq!(s.labels(), vec!["WORK", "PERSONAL"]);
        assert_eq!(s.entries().len(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let s = parse("novalue\n=orphan\nfilter=newer_than:1w\n");
        assert_eq!(s.entries().len(), 1);
        assert_eq!(s.filter(), "newer_than:1w");
    }

    #[test]
    fn value_may_contain_equals() {
        let s = parse("filter=subject:a=b\n");
        assert_eq!(s.filter(), "subject:a=b");
    }

    #[test]
    fn unknown_keys_round_trip_in_order() {
        let s = parse("zeta=1\ninterval=90\nalpha=keep me\n");
        assert_eq!(s.to_text(), "zeta=1\ninterval=90\nalpha=keep me\n");
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.interval_secs(), DEFAULT_INTERVAL_SECS);
        assert!(s.labels().is_empty());
        assert_eq!(s.filter(), "");
        assert!(!s.notifications_enabled());
        assert!(!s.dark_icon());
        assert!(!s.start_at_login());
    }

    #[test]
    fn bad_interval_falls_back() {
        assert_eq!(parse("interval=soon").interval_secs(), DEFAULT_INTERVAL_SECS);
        assert_eq!(parse("interval=0").interval_secs(), DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn flags_use_one_for_true() {
        let mut s = parse("notification=1\nstartatlogin=True\n");
        assert!(s.notifications_enabled());
        assert!(!s.start_at_login());
        s.set_flag(KEY_NOTIFICATION, false);
        assert_eq!(s.get(KEY_NOTIFICATION), Some("0"));
    }

    #[test]
    fn labels_are_upper_cased_on_set() {
        let mut s = Settings::default();
        s.set(KEY_LABELS, "Work/Urgent, home");
        assert_eq!(s.get(KEY_LABELS), Some("WORK/URGENT, HOME"));
        assert_eq!(s.labels(), vec!["WORK/URGENT", "HOME"]);
    }

    #[test]
    fn load_and_save_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings");

        let mut s = Settings::load(&path).unwrap();
        assert!(s.entries().is_empty());

        s.set(KEY_INTERVAL, "120");
        s.set("custom", "x");
        s.save().unwrap();

        let again = Settings::load(&path).unwrap();
        assert_eq!(again.interval_secs(), 120);
        assert_eq!(again.get("custom"), Some("x"));
    }
}
