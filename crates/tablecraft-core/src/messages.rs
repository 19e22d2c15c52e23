//! Message catalogs.
//!
//! Catalogs map message keys (`validation.required`) to templates with
//! positional placeholders (`{0}`). They are read from Java-style
//! `.properties` files or from a flat JSON object.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key → message template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog {
    entries: BTreeMap<String, String>,
}

impl MessageCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `.properties` text.
    ///
    /// Supports `=` and `:` separators, `#`/`!` comments, line
    /// continuations and `\uXXXX` escapes.
    pub fn from_properties(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in logical_lines(text) {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let (key, value) = split_entry(trimmed);
            if !key.is_empty() {
                entries.insert(unescape(key.trim_end()), unescape(value.trim_start()));
            }
        }
        Self { entries }
    }

    /// Reads a flat JSON object; non-string values are stringified.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::config("message catalog must be a JSON object"));
        };
        let entries = map
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Adds or replaces a message.
    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }

    /// Raw template for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Resolves a key, substituting `{0}`, `{1}`, ... with `params`.
    ///
    /// Unknown keys resolve to the key itself.
    pub fn resolve(&self, key: &str, params: &[String]) -> String {
        let template = self.get(key).unwrap_or(key);
        params
            .iter()
            .enumerate()
            .fold(template.to_string(), |text, (i, param)| {
                text.replace(&format!("{{{i}}}"), param)
            })
    }

    /// Messages in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no messages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;
    for raw in text.lines() {
        let part = if continuing { raw.trim_start() } else { raw };
        let trailing = part.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&part[..part.len() - 1]);
            continuing = true;
        } else {
            current.push_str(part);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '=' | ':' if !escaped => return (&line[..i], &line[i + 1..]),
            _ => escaped = false,
        }
    }
    (line, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
