//! `.thumbnailer` definition files.
//!
//! A definition is a desktop-entry style key file:
//!
//! ```text
//! [Thumbnailer Entry]
//! TryExec=/usr/bin/gdk-pixbuf-thumbnailer
//! Exec=/usr/bin/gdk-pixbuf-thumbnailer -s %s %u %o
//! MimeType=image/png;image/jpeg;
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ThumbnailError, ThumbnailResult};

/// Group holding the thumbnailer keys.
pub const GROUP: &str = "Thumbnailer Entry";
/// File extension of definition files.
pub const EXTENSION: &str = "thumbnailer";

const KEY_TRY_EXEC: &str = "TryExec";
const KEY_EXEC: &str = "Exec";
const KEY_MIME_TYPE: &str = "MimeType";

/// A thumbnailer loaded from a definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnailer {
    path: PathBuf,
    try_exec: Option<String>,
    command: String,
    mime_types: Vec<String>,
}

impl Thumbnailer {
    /// Load and check the definition at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or names a
    /// `TryExec` program that is not installed.
    pub fn load(path: &Path) -> ThumbnailResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ThumbnailError::io(path, e))?;
        let thumbnailer = Self::parse(path, &contents)?;
        if !thumbnailer.try_exec_available() {
            return Err(ThumbnailError::Definition {
                path: path.to_path_buf(),
                reason: format!(
                    "TryExec program '{}' not found",
                    thumbnailer.try_exec.as_deref().unwrap_or_default()
                ),
            });
        }
        Ok(thumbnailer)
    }

    /// Parse definition text. `path` is recorded as the record's source and
    /// used in error messages; no `TryExec` check is performed.
    ///
    /// # Errors
    ///
    /// Returns an error if the `Thumbnailer Entry` group, `Exec`, or a
    /// non-empty `MimeType` list is missing.
    pub fn parse(path: &Path, contents: &str) -> ThumbnailResult<Self> {
        let invalid = |reason: &str| ThumbnailError::Definition {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let groups = parse_key_file(contents);
        let entry = groups
            .get(GROUP)
            .ok_or_else(|| invalid("missing [Thumbnailer Entry] group"))?;

        let command = entry
            .get(KEY_EXEC)
            .map(|v| unescape(v))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| invalid("missing Exec key"))?;

        let mime_types: Vec<String> = entry
            .get(KEY_MIME_TYPE)
            .map(|v| split_list(v))
            .unwrap_or_default();
        if mime_types.is_empty() {
            return Err(invalid("missing MimeType key"));
        }

        let try_exec = entry
            .get(KEY_TRY_EXEC)
            .map(|v| unescape(v))
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            path: path.to_path_buf(),
            try_exec,
            command,
            mime_types,
        })
    }

    /// Definition file this record was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Program that must be installed for this thumbnailer to be usable.
    #[must_use]
    pub fn try_exec(&self) -> Option<&str> {
        self.try_exec.as_deref()
    }

    /// Command template with `%u`, `%i`, `%o`, `%s` placeholders.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Mime types handled, in file order.
    #[must_use]
    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    /// Whether the `TryExec` program, if any, can be found.
    #[must_use]
    pub fn try_exec_available(&self) -> bool {
        match &self.try_exec {
            Some(program) => which::which(program).is_ok(),
            None => true,
        }
    }

    /// Whether the definition file lives at or below `dir`.
    #[must_use]
    pub fn is_under(&self, dir: &Path) -> bool {
        self.path.starts_with(dir)
    }
}

/// Whether `path` names a definition file.
#[must_use]
pub fn is_definition_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION)
}

/// Parse a key file into `group -> key -> raw value`.
///
/// Comments, blank lines and localized keys (`Name[de]=...`) are skipped.
/// Keys before the first group header are ignored. A repeated key keeps its
/// first value.
fn parse_key_file(contents: &str) -> HashMap<String, HashMap<String, String>> {
    let mut groups: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.to_string());
            groups.entry(name.to_string()).or_default();
            continue;
        }
        let Some(group) = &current else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.contains('[') {
            continue;
        }
        groups
            .entry(group.clone())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    groups
}

/// Resolve key-file escapes in a plain string value.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split a `;`-separated list value, honouring `\;` escapes and dropping
/// empty items (the trailing separator is conventional).
fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(';') => current.push(';'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ';' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| unescape(item.trim()))
        .filter(|item| !item.is_empty())
        .collect()
}
