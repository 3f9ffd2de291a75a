//! Login item creation through the 1Password CLI (`op item create`).
//!
//! Custom fields are passed as `name[type]=value` assignments. Multi-line
//! values cannot be passed inline, so they are written to temp files and the
//! assignment carries the file path instead. Those files live in a
//! [`FieldFiles`] scope that deletes them on every exit path and never touches
//! anything outside its own directory.
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;

use crate::push::{ItemArgs, PushError};
use crate::record::Record;

pub const DEFAULT_PROGRAM: &str = "op";

/// Field names (lowercased) never sent as custom fields.
pub const EXCLUDED_FIELDS: [&str; 3] = ["password", "meta_title", "url"];

const MAX_EMAIL_PART: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Password,
    File,
    Email,
    Text,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Password => "password",
            FieldKind::File => "file",
            FieldKind::Email => "email",
            FieldKind::Text => "text",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<local>[\w\-+.]+)@(?P<domain>[\w\-+.]+)$").expect("valid email regex")
    })
}

/// Loose email check: word characters plus `-+.` on both sides of a single
/// `@`, each side at most 253 characters.
pub fn looks_like_email(value: &str) -> bool {
    email_regex().captures(value).is_some_and(|caps| {
        ["local", "domain"].iter().all(|part| {
            caps.name(part)
                .is_some_and(|m| m.as_str().chars().count() <= MAX_EMAIL_PART)
        })
    })
}

/// Pick the `op` field type for a custom field. First match wins.
pub fn infer_kind(key: &str, value: &str) -> FieldKind {
    if key == "password" {
        FieldKind::Password
    } else if value.contains('\n') {
        FieldKind::File
    } else if looks_like_email(value) {
        FieldKind::Email
    } else {
        FieldKind::Text
    }
}

/// One `name[type]=value` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub name: String,
    pub kind: FieldKind,
    pub value: String,
}

impl fmt::Display for FieldAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]={}", self.name, self.kind, self.value)
    }
}

/// Temp files backing `file` fields. Every file is created under `root` and
/// is removed by [`FieldFiles::cleanup`] or, failing that, on drop.
#[derive(Debug)]
pub struct FieldFiles {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl FieldFiles {
    /// Use `root` as the designated directory. It is canonicalized up front
    /// so every created path lies lexically under it.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PushError> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(|source| PushError::TempDir {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root,
            paths: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Write `data` to a new temp file and return its path.
    pub fn write(&mut self, field: &str, data: &str) -> Result<PathBuf, PushError> {
        let temp_err = |source: std::io::Error| PushError::TempFile {
            field: field.to_string(),
            source,
        };
        let file = tempfile::Builder::new()
            .prefix("pushtoop-")
            .tempfile_in(&self.root)
            .map_err(temp_err)?;
        // Track the path before writing so a failed write is still cleaned up.
        let (mut handle, path) = file.keep().map_err(|e| temp_err(e.error))?;
        self.paths.push(path.clone());
        handle.write_all(data.as_bytes()).map_err(temp_err)?;
        debug!("field {:?} written to {}", field, path.display());
        Ok(path)
    }

    /// Remove every tracked file. All removals are attempted; the first
    /// failure is returned.
    pub fn cleanup(&mut self) -> Result<(), PushError> {
        let mut first_err = None;
        for path in self.paths.drain(..) {
            if let Err(e) = remove_under(&self.root, &path) {
                warn!("{}", e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for FieldFiles {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Delete `path` only if it lies inside `root`.
pub fn remove_under(root: &Path, path: &Path) -> Result<(), PushError> {
    let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
    if escapes || !path.starts_with(root) {
        return Err(PushError::UnsafeCleanup {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    fs::remove_file(path).map_err(|source| PushError::Cleanup {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("removed {}", path.display());
    Ok(())
}

/// Turn the residual fields plus the password into typed assignments. The
/// password always comes last; `file` fields get a temp file in `files`.
pub fn build_assignments(
    fields: &Record,
    password: &str,
    files: &mut FieldFiles,
) -> Result<Vec<FieldAssignment>, PushError> {
    let mut custom: Record = fields
        .iter()
        .filter(|(k, _)| !EXCLUDED_FIELDS.contains(&k.to_lowercase().as_str()))
        .collect();
    custom.insert("password", password);

    let mut out = Vec::with_capacity(custom.len());
    for (name, value) in custom {
        let kind = infer_kind(&name, &value);
        let value = match kind {
            FieldKind::File => files.write(&name, &value)?.display().to_string(),
            _ => value,
        };
        out.push(FieldAssignment { name, kind, value });
    }
    Ok(out)
}

/// Handle on the `op` binary and the vault items go to.
#[derive(Debug, Clone)]
pub struct OpCli {
    program: String,
    vault: Option<String>,
}

impl Default for OpCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl OpCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            vault: None,
        }
    }

    pub fn with_vault(mut self, vault: Option<String>) -> Self {
        self.vault = vault;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name for `op item create`.
    pub fn item_create_args(&self, item: &ItemArgs, fields: &[FieldAssignment]) -> Vec<String> {
        let mut args: Vec<String> = ["item", "create", "--category", "login", "--title"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(item.title.clone());
        if let Some(vault) = &self.vault {
            args.push("--vault".to_string());
            args.push(vault.clone());
        }
        if let Some(url) = &item.url {
            args.push("--url".to_string());
            args.push(url.clone());
        }
        args.extend(fields.iter().map(|f| f.to_string()));
        args
    }

    fn run(&self, args: &[String]) -> Result<(), PushError> {
        info!("running {} {}", self.program, args.join(" "));
        let status = Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|source| PushError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(PushError::CommandFailed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Create a login item. Temp files for multi-line fields are created in
    /// `temp_root` and removed before returning, whatever the outcome. With
    /// `dry_run` the command is built but not executed. Returns the
    /// arguments passed (or that would be passed) to the program.
    pub fn create_login(
        &self,
        item: &ItemArgs,
        temp_root: &Path,
        dry_run: bool,
    ) -> Result<Vec<String>, PushError> {
        let mut files = FieldFiles::new(temp_root)?;
        let fields = build_assignments(&item.fields, &item.password, &mut files)?;
        let args = self.item_create_args(item, &fields);
        let ran = if dry_run { Ok(()) } else { self.run(&args) };
        let cleaned = files.cleanup();
        ran?;
        cleaned?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(fields: &[(&str, &str)]) -> ItemArgs {
        ItemArgs {
            title: "Site/Login".to_string(),
            password: "pw".to_string(),
            url: Some("https://x.test".to_string()),
            fields: fields.iter().copied().collect(),
        }
    }

    #[test]
    fn infers_field_kinds_in_order() {
        assert_eq!(infer_kind("password", "a\nb"), FieldKind::Password);
        assert_eq!(infer_kind("notes", "a\nb"), FieldKind::File);
        assert_eq!(infer_kind("contact", "jo.e+x@mail.example"), FieldKind::Email);
        assert_eq!(infer_kind("contact", "not an email"), FieldKind::Text);
        assert_eq!(infer_kind("Password", "pw"), FieldKind::Text);
    }

    #[test]
    fn email_heuristic_limits_part_length() {
        assert!(looks_like_email("a@b"));
        assert!(!looks_like_email("a@b@c"));
        assert!(!looks_like_email("@b"));
        let long = format!("{}@x.test", "a".repeat(254));
        assert!(!looks_like_email(&long));
    }

    #[test]
    fn excluded_fields_are_dropped_and_password_is_last() {
        let dir = tempdir().unwrap();
        let mut files = FieldFiles::new(dir.path()).unwrap();
        let fields: Record = [
            ("URL", "u"),
            ("meta_title", "m"),
            ("PASSWORD", "old"),
            ("pin", "1234"),
            ("email", "me@x.test"),
        ]
        .into_iter()
        .collect();
        let out = build_assignments(&fields, "pw", &mut files).unwrap();
        let rendered: Vec<String> = out.iter().map(|f| f.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["pin[text]=1234", "email[email]=me@x.test", "password[password]=pw"]
        );
        assert!(files.paths().is_empty());
    }

    #[test]
    fn multiline_fields_use_temp_files_until_cleanup() {
        let dir = tempdir().unwrap();
        let mut files = FieldFiles::new(dir.path()).unwrap();
        let fields: Record = [("notes", "line one\nline two")].into_iter().collect();
        let out = build_assignments(&fields, "pw", &mut files).unwrap();
        assert_eq!(out[0].kind, FieldKind::File);
        let path = PathBuf::from(&out[0].value);
        assert!(path.starts_with(files.root()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "line one\nline two");
        files.cleanup().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_field_files_removes_them() {
        let dir = tempdir().unwrap();
        let path = {
            let mut files = FieldFiles::new(dir.path()).unwrap();
            files.write("notes", "a\nb").unwrap()
        };
        assert!(!path.exists());
    }

    #[test]
    fn root_with_parent_component_is_still_cleaned() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("work")).unwrap();
        fs::create_dir(base.path().join("spill")).unwrap();
        let root = base.path().join("work").join("..").join("spill");
        let mut files = FieldFiles::new(&root).unwrap();
        let path = files.write("notes", "secret\nline").unwrap();
        assert!(path.starts_with(base.path().join("spill").canonicalize().unwrap()));
        assert!(path.exists());
        files.cleanup().unwrap();
        assert!(!path.exists());
        assert_eq!(fs::read_dir(base.path().join("spill")).unwrap().count(), 0);
    }

    #[test]
    fn missing_root_is_an_error() {
        let base = tempdir().unwrap();
        let err = FieldFiles::new(base.path().join("absent")).unwrap_err();
        assert!(matches!(err, PushError::TempDir { .. }));
    }

    #[test]
    fn refuses_to_remove_outside_root() {
        let root = tempdir().unwrap();
        let other = tempdir().unwrap();
        let victim = other.path().join("keep.txt");
        fs::write(&victim, "x").unwrap();
        let err = remove_under(root.path(), &victim).unwrap_err();
        assert!(matches!(err, PushError::UnsafeCleanup { .. }));
        let sneaky = root.path().join("..").join("keep.txt");
        assert!(matches!(
            remove_under(root.path(), &sneaky),
            Err(PushError::UnsafeCleanup { .. })
        ));
        assert!(victim.exists());
    }

    #[test]
    fn builds_item_create_arguments() {
        let op = OpCli::default().with_vault(Some("Private".to_string()));
        let it = item(&[]);
        let fields = vec![FieldAssignment {
            name: "password".to_string(),
            kind: FieldKind::Password,
            value: "pw".to_string(),
        }];
        assert_eq!(
            op.item_create_args(&it, &fields),
            vec![
                "item",
                "create",
                "--category",
                "login",
                "--title",
                "Site/Login",
                "--vault",
                "Private",
                "--url",
                "https://x.test",
                "password[password]=pw",
            ]
        );
    }

    #[test]
    fn dry_run_builds_command_and_cleans_up() {
        let dir = tempdir().unwrap();
        let op = OpCli::default();
        let args = op
            .create_login(&item(&[("notes", "a\nb")]), dir.path(), true)
            .unwrap();
        assert!(args.iter().any(|a| a.starts_with("notes[file]=")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn spawn_failure_still_cleans_up() {
        let dir = tempdir().unwrap();
        let op = OpCli::new("passentry-no-such-binary");
        let err = op
            .create_login(&item(&[("notes", "a\nb")]), dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, PushError::Spawn { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempdir().unwrap();
        let op = OpCli::new("false");
        let err = op
            .create_login(&item(&[("notes", "a\nb")]), dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, PushError::CommandFailed { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
