//! Saved conversations as flat JSON files.
//!
//! A session is a pretty-printed JSON array of turns in the active
//! provider family's own shape, stored as `<dir>/<name>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::payload::{turn_from_stored, wire_turn};
use crate::provider::Provider;
use crate::types::{StoredTurn, Turn};

/// Longest accepted session name.
pub const MAX_SESSION_NAME_LEN: usize = 100;

/// Directory name, under the home directory, of the default store.
pub const DEFAULT_SESSION_DIR: &str = ".chat_sessions";

/// A directory of saved sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store in `~/.chat_sessions`.
    pub fn in_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::configuration("cannot determine home directory", None))?;
        Ok(Self::new(home.join(DEFAULT_SESSION_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding session `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Writes `turns` as session `name` and returns the file written.
    pub fn save(&self, name: &str, turns: &[Turn], provider: Provider) -> Result<PathBuf> {
        validate_session_name(name)?;
        fs::create_dir_all(&self.dir).map_err(|err| {
            Error::io(
                format!("cannot create session directory {}", self.dir.display()),
                err,
            )
        })?;
        let wire: Vec<_> = turns
            .iter()
            .filter_map(|turn| wire_turn(turn, provider))
            .collect();
        let json = serde_json::to_string_pretty(&wire)?;
        let path = self.path_for(name);
        fs::write(&path, json)
            .map_err(|err| Error::io(format!("error saving session {}", path.display()), err))?;
        Ok(path)
    }

    /// Reads and validates session `name`.
    pub fn load(&self, name: &str) -> Result<Vec<Turn>> {
        validate_session_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(Error::validation(
                format!("session not found: {}", path.display()),
                Some("name".to_string()),
            ));
        }
        let text = fs::read_to_string(&path)
            .map_err(|err| Error::io(format!("error reading session {}", path.display()), err))?;
        let data: Value = serde_json::from_str(&text).map_err(|err| {
            Error::validation(
                format!("session is corrupt (invalid JSON: {err}). Cannot load."),
                Some("name".to_string()),
            )
        })?;
        let corrupt = |reason: String| {
            Error::validation(
                format!("session is corrupt ({reason}). Cannot load."),
                Some("name".to_string()),
            )
        };
        validate_session_data(&data).map_err(corrupt)?;

        let Value::Array(items) = data else {
            return Err(corrupt("not a JSON array".to_string()));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let stored: StoredTurn = serde_json::from_value(item)
                    .map_err(|err| corrupt(format!("message {index}: {err}")))?;
                turn_from_stored(stored).map_err(|err| corrupt(format!("message {index}: {err}")))
            })
            .collect()
    }

    /// Lists saved session names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|err| {
            Error::io(
                format!("cannot read session directory {}", self.dir.display()),
                err,
            )
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes every saved session.  Returns the names removed.
    pub fn clear(&self) -> Result<Vec<String>> {
        let names = self.list()?;
        for name in &names {
            let path = self.path_for(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(Error::io(
                        format!("cannot delete session {}", path.display()),
                        err,
                    ));
                }
            }
        }
        Ok(names)
    }
}

/// Checks that `name` is usable as a session file name.
pub fn validate_session_name(name: &str) -> Result<()> {
    let valid_chars = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_chars {
        return Err(Error::validation(
            "session name may only contain letters, numbers, dash, underscore",
            Some("name".to_string()),
        ));
    }
    if name.len() > MAX_SESSION_NAME_LEN {
        return Err(Error::validation(
            format!("session name too long (max {MAX_SESSION_NAME_LEN} chars)"),
            Some("name".to_string()),
        ));
    }
    Ok(())
}

/// Checks the shape of a session document.  On failure returns a
/// description naming the first offending message.
pub fn validate_session_data(data: &Value) -> std::result::Result<(), String> {
    let Value::Array(items) = data else {
        return Err("not a JSON array".to_string());
    };
    for (index, item) in items.iter().enumerate() {
        let Value::Object(message) = item else {
            return Err(format!("message {index} is not an object"));
        };
        let role = match message.get("role") {
            Some(Value::String(role)) if !role.is_empty() => role.as_str(),
            _ => return Err(format!("message {index} is missing 'role'")),
        };
        match role {
            "system" => {
                if !matches!(message.get("content"), Some(Value::String(_))) {
                    return Err(format!("message {index}: system message missing string content"));
                }
            }
            "user" | "assistant" | "model" => {
                let has_content = matches!(
                    message.get("content"),
                    Some(Value::String(_)) | Some(Value::Array(_))
                );
                let has_parts = matches!(message.get("parts"), Some(Value::Array(_)));
                if !has_content && !has_parts {
                    return Err(format!(
                        "message {index}: role '{role}' has no content or parts"
                    ));
                }
            }
            other => return Err(format!("message {index}: unknown role '{other}'")),
        }
    }
    Ok(())
}
