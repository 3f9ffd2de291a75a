//! Splits a JSON record into the pieces a vault login item needs: title,
//! password, url, and the remaining custom fields.
use std::path::PathBuf;

use crate::record::Record;

/// Field names that may carry the item url, compared trimmed and lowercased.
pub const URL_KEYS: [&str; 2] = ["url", "website"];

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("input is not a JSON object")]
    NotAnObject(#[source] serde_json::Error),
    #[error("input has no title")]
    MissingTitle,
    #[error("temp directory {} is not usable", .path.display())]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write temp file for field {field:?}")]
    TempFile {
        field: String,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to delete {} outside {}", .path.display(), .root.display())]
    UnsafeCleanup { path: PathBuf, root: PathBuf },
    #[error("failed to remove temp file {}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
    },
}

/// Arguments for creating one login item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemArgs {
    pub title: String,
    pub password: String,
    pub url: Option<String>,
    pub fields: Record,
}

pub fn parse_json(text: &str) -> Result<Record, PushError> {
    serde_json::from_str(text).map_err(PushError::NotAnObject)
}

fn url_key(record: &Record) -> Option<String> {
    record
        .keys()
        .find(|k| URL_KEYS.contains(&k.trim().to_lowercase().as_str()))
        .map(str::to_string)
}

/// Take `title`, `password` and the first url-like field out of `record`.
/// A missing password becomes an empty string; a missing title is an error.
pub fn build_item_args(mut record: Record) -> Result<ItemArgs, PushError> {
    let title = record.remove("title").ok_or(PushError::MissingTitle)?;
    let password = record.remove("password").unwrap_or_default();
    let url = url_key(&record).and_then(|k| record.remove(&k));
    Ok(ItemArgs {
        title,
        password,
        url,
        fields: record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_title_password_and_url() {
        let record = parse_json(
            r#"{"title":"Site/Login","password":"pw","Website ":"https://x.test","url":"u2","note":"n"}"#,
        )
        .unwrap();
        let args = build_item_args(record).unwrap();
        assert_eq!(args.title, "Site/Login");
        assert_eq!(args.password, "pw");
        assert_eq!(args.url.as_deref(), Some("https://x.test"));
        assert_eq!(args.fields.keys().collect::<Vec<_>>(), vec!["url", "note"]);
    }

    #[test]
    fn missing_password_is_empty_and_url_optional() {
        let args = build_item_args(parse_json(r#"{"title":"t"}"#).unwrap()).unwrap();
        assert_eq!(args.password, "");
        assert!(args.url.is_none());
        assert!(args.fields.is_empty());
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(matches!(parse_json("[]"), Err(PushError::NotAnObject(_))));
        assert!(matches!(parse_json("not json"), Err(PushError::NotAnObject(_))));
        let err = build_item_args(parse_json(r#"{"password":"pw"}"#).unwrap()).unwrap_err();
        assert!(matches!(err, PushError::MissingTitle));
    }
}
