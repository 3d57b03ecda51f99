//! Inline style table for generated email.
//!
//! Mail clients ignore external stylesheets, so every element carries its
//! style inline. Styles are authored as nested JSON: an object becomes a
//! dotted key, and its string members become `name:value;` declarations of
//! that key.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

const BUILTIN_STYLES: &str = include_str!("../../config/styles.json");

#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: HashMap<String, String>,
}

impl StyleSheet {
    /// The style table compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_STYLES)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading styles from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read styles file: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Failed to parse styles JSON")?;
        let root = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("Styles JSON must be an object"))?;

        let mut styles = HashMap::new();
        for (key, value) in root {
            match value {
                Value::Object(nested) => flatten(key, nested, &mut styles),
                _ => warn!(key = %key, "Ignoring top-level style declaration outside a selector"),
            }
        }
        Ok(Self { styles })
    }

    /// Style for one key; unknown keys yield an empty style.
    pub fn get(&self, name: &str) -> &str {
        self.styles.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn flatten(path: &str, object: &Map<String, Value>, styles: &mut HashMap<String, String>) {
    let mut declarations = String::new();
    for (key, value) in object {
        match value {
            Value::String(v) => {
                declarations.push_str(key);
                declarations.push(':');
                declarations.push_str(v);
                declarations.push(';');
            }
            Value::Object(nested) => flatten(&format!("{}.{}", path, key), nested, styles),
            _ => warn!(key = %key, path = %path, "Unexpected value type in styles JSON, ignoring"),
        }
    }
    styles.insert(path.to_string(), declarations);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_keys_are_dotted() {
        let sheet = StyleSheet::from_json(
            r##"{
                "link": { "color": "#00f" },
                "commit": {
                    "padding": "4px",
                    "message": { "block": { "white-space": "pre-wrap" } }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(sheet.get("link"), "color:#00f;");
        assert_eq!(sheet.get("commit"), "padding:4px;");
        assert_eq!(sheet.get("commit.message"), "");
        assert_eq!(sheet.get("commit.message.block"), "white-space:pre-wrap;");
    }

    #[test]
    fn test_unknown_key_is_empty() {
        let sheet = StyleSheet::from_json(r#"{"link": {"color": "red"}}"#).unwrap();
        assert_eq!(sheet.get("nope"), "");
        assert_eq!(sheet.get("link"), "color:red;");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(StyleSheet::from_json("[1, 2]").is_err());
        assert!(StyleSheet::from_json("not json").is_err());
    }

    #[test]
    fn test_builtin_has_required_keys() {
        let sheet = StyleSheet::builtin().unwrap();
        assert!(!sheet.is_empty());
        for key in [
            "link",
            "commit.message.block",
            "commit.files.file.type.added",
            "commit.files.file.type.removed",
            "commit.files.file.type.modified",
        ] {
            assert!(!sheet.get(key).is_empty(), "missing style {}", key);
        }
    }
}
