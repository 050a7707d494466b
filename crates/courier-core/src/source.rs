//! Job inputs: targets, messages and session credentials.
//!
//! A job pulls its inputs from a [`JobSource`] when it starts, so edits to
//! the underlying files only affect jobs started afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};

pub const TARGETS_FILE: &str = "targets.txt";
pub const MESSAGES_FILE: &str = "messages.txt";
pub const SESSION_FILE: &str = "session.json";

/// A recipient on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub display_name: String,
    pub target_id: String,
}

impl Target {
    pub fn new(display_name: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            target_id: target_id.into(),
        }
    }
}

/// Parse a target list, one target per line.
///
/// - blank lines and lines starting with `#` are skipped
/// - `name:id` splits on the first colon
/// - a bare `id` is named `User_<id>`
///
/// File order is preserved.
pub fn parse_targets(contents: &str) -> Vec<Target> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(':') {
            Some((name, id)) => Target::new(name.trim(), id.trim()),
            None => Target::new(format!("User_{}", line), line),
        })
        .collect()
}

/// Parse a message list: every non-blank line, trimmed, in order.
pub fn parse_messages(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Session state handed to the dispatcher to authenticate (e.g. exported cookies).
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(serde_json::Value);

impl Credentials {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// No usable session: missing, `null`, or an empty array/object/string.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Number of entries (cookies) when the session is an array.
    pub fn entry_count(&self) -> usize {
        match &self.0 {
            serde_json::Value::Array(items) => items.len(),
            serde_json::Value::Object(map) => map.len(),
            serde_json::Value::Null => 0,
            _ => 1,
        }
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("entries", &self.entry_count())
            .field("session", &"[REDACTED]")
            .finish()
    }
}

/// Where a job gets its inputs.
pub trait JobSource: Send + Sync {
    fn load_targets(&self) -> Result<Vec<Target>>;
    fn load_messages(&self) -> Result<Vec<String>>;
    fn load_credentials(&self) -> Result<Credentials>;
}

/// Inputs read from a data directory holding `targets.txt`, `messages.txt`
/// and `session.json`. Missing files read as empty.
#[derive(Debug, Clone)]
pub struct FileJobSource {
    dir: PathBuf,
}

impl FileJobSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn targets_path(&self) -> PathBuf {
        self.dir.join(TARGETS_FILE)
    }

    pub fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CourierError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                err
            ))),
        }
    }
}

impl JobSource for FileJobSource {
    fn load_targets(&self) -> Result<Vec<Target>> {
        Ok(Self::read_optional(&self.targets_path())?
            .map(|contents| parse_targets(&contents))
            .unwrap_or_default())
    }

    fn load_messages(&self) -> Result<Vec<String>> {
        Ok(Self::read_optional(&self.messages_path())?
            .map(|contents| parse_messages(&contents))
            .unwrap_or_default())
    }

    fn load_credentials(&self) -> Result<Credentials> {
        let path = self.session_path();
        match Self::read_optional(&path)? {
            None => Ok(Credentials::default()),
            Some(contents) if contents.trim().is_empty() => Ok(Credentials::default()),
            Some(contents) => serde_json::from_str(&contents).map_err(|e| {
                CourierError::Config(format!("Invalid session file {}: {}", path.display(), e))
            }),
        }
    }
}

/// Fixed in-memory inputs.
#[derive(Debug, Clone, Default)]
pub struct StaticJobSource {
    pub targets: Vec<Target>,
    pub messages: Vec<String>,
    pub credentials: Credentials,
}

impl StaticJobSource {
    pub fn new(targets: Vec<Target>, messages: Vec<String>, credentials: Credentials) -> Self {
        Self {
            targets,
            messages,
            credentials,
        }
    }
}

impl JobSource for StaticJobSource {
    fn load_targets(&self) -> Result<Vec<Target>> {
        Ok(self.targets.clone())
    }

    fn load_messages(&self) -> Result<Vec<String>> {
        Ok(self.messages.clone())
    }

    fn load_credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}
