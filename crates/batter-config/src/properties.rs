//! Build properties and their rendering.
//!
//! Step values may reference properties as:
//! - `${name}` - the property value; left as written when unset
//! - `${name:-default}` - the property value, or `default` when unset

use batter_core::executor::PropertyMap;
use regex::Regex;
use std::sync::LazyLock;

// Regex for matching ${name} and ${name:-default}
static PROPERTY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_.-]*)(?::-([^}]*))?\}").unwrap()
});

/// The properties of one running build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: PropertyMap,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: PropertyMap) -> Self {
        Self { values }
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Interpret a property as a flag. Unset or unrecognised values are `None`.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    pub fn extend(&mut self, values: PropertyMap) {
        self.values.extend(values);
    }

    pub fn as_map(&self) -> &PropertyMap {
        &self.values
    }

    /// Render all property expressions in `template`.
    pub fn render(&self, template: &str) -> String {
        PROPERTY_REGEX
            .replace_all(template, |caps: &regex::Captures| {
                match (self.get(&caps[1]), caps.get(2)) {
                    (Some(value), _) => value.to_string(),
                    (None, Some(default)) => default.as_str().to_string(),
                    (None, None) => caps[0].to_string(),
                }
            })
            .to_string()
    }

    pub fn render_vec(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.render(t)).collect()
    }

    pub fn render_map(&self, templates: &PropertyMap) -> PropertyMap {
        templates
            .iter()
            .map(|(k, v)| (k.clone(), self.render(v)))
            .collect()
    }
}

/// Parse a flag as written by either batter or an upstream engine.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
