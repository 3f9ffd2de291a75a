//! Record parser: rebuilds a key/value [`Record`] from a free-form password
//! entry dump.
//!
//! The first line is always the password. Every later line is either a
//! continuation (indented, appended to the previous field), a start line
//! (`key: value`), or blank. A start line without a separator aborts the
//! whole parse with [`EntryError::MissingValue`].
//!
//! After a successful parse the caller's title is normalized with
//! [`crate::title::normalize_title`] and stored under `title`, and a missing
//! `username` is filled from `user` or `email`.
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::record::Record;
use crate::title::normalize_title;

pub const KEY_PASSWORD: &str = "password";
pub const KEY_TITLE: &str = "title";
pub const KEY_TITLE_EXTRA: &str = "title extra 0";
pub const KEY_USERNAME: &str = "username";

/// Fields promoted to `username`, in order of preference.
pub const USERNAME_ALIASES: [&str; 2] = ["user", "email"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("MISSING VALUE: {title}")]
    MissingValue { title: String, line: usize },
}

/// How a single input line contributes to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Password(&'a str),
    Continuation(&'a str),
    /// `value` is `None` when the line has no `:` separator.
    Start {
        key: String,
        value: Option<&'a str>,
    },
    Blank,
}

fn continuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+(?P<data>.*)$").expect("valid continuation regex"))
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*:\s*").expect("valid separator regex"))
}

fn non_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("valid key regex"))
}

/// Replace every run of non-word characters in a key with a single space.
pub fn clean_key(key: &str) -> String {
    non_word_regex().replace_all(key, " ").into_owned()
}

/// Classify line `idx`. Trailing whitespace is ignored.
pub fn classify_line(idx: usize, line: &str) -> Line<'_> {
    let line = line.trim_end();
    if idx == 0 {
        return Line::Password(line);
    }
    if let Some(caps) = continuation_regex().captures(line) {
        if let Some(data) = caps.name("data") {
            return Line::Continuation(data.as_str());
        }
    }
    if line.is_empty() {
        return Line::Blank;
    }
    let mut parts = separator_regex().splitn(line, 2);
    let key = clean_key(parts.next().unwrap_or_default());
    Line::Start {
        key,
        value: parts.next(),
    }
}

/// Parse lines into a record without post-processing. `title` is only used
/// to label a [`EntryError::MissingValue`].
pub fn parse_lines<I, S>(lines: I, title: &str) -> Result<Record, EntryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut record = Record::new();
    let mut last_key: Option<String> = None;
    for (idx, line) in lines.into_iter().enumerate() {
        match classify_line(idx, line.as_ref()) {
            Line::Password(password) => {
                record.insert(KEY_PASSWORD, password);
                last_key = Some(KEY_PASSWORD.to_string());
            }
            Line::Continuation(data) => match &last_key {
                Some(key) => {
                    record.append_line(key, data);
                }
                None => debug!("line {}: continuation without a field, dropped", idx),
            },
            Line::Start {
                key,
                value: Some(value),
            } => {
                let key = if record.contains_key(&key) {
                    let renamed = format!("{} extra {}", key, idx);
                    debug!("line {}: duplicate key {:?} stored as {:?}", idx, key, renamed);
                    renamed
                } else {
                    key
                };
                record.insert(key.clone(), value);
                last_key = Some(key);
            }
            Line::Start { key, value: None } => {
                debug!("line {}: key {:?} has no value", idx, key);
                return Err(EntryError::MissingValue {
                    title: title.to_string(),
                    line: idx,
                });
            }
            Line::Blank => {}
        }
    }
    Ok(record)
}

/// Store `title`, keeping any parsed title as `title extra 0`, and fill
/// `username` from the first alias present.
pub fn post_process(mut record: Record, title: &str) -> Record {
    if let Some(previous) = record.remove(KEY_TITLE) {
        record.insert(KEY_TITLE_EXTRA, previous);
    }
    record.insert(KEY_TITLE, title);
    if record.contains_key(KEY_USERNAME) {
        return record;
    }
    for alias in USERNAME_ALIASES {
        if let Some(value) = record.remove(alias) {
            debug!("promoting {:?} to {:?}", alias, KEY_USERNAME);
            record.insert(KEY_USERNAME, value);
            break;
        }
    }
    record
}

/// Normalize `title`, parse `lines`, and post-process the result.
pub fn build_record<I, S>(title: &str, lines: I) -> Result<Record, EntryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let title = normalize_title(title);
    let record = parse_lines(lines, &title)?;
    Ok(post_process(record, &title))
}
