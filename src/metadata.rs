//! Bibliographic metadata attached to a render request.
//!
//! Every field is optional. When the caller passes no [`Metadata`] at all the
//! backend emits no front-matter block; an empty record is treated the same
//! way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for the rendered document's front matter.
///
/// Custom fields live in a `BTreeMap` so two records built from the same
/// input always serialise identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Title in a second language.
    #[serde(rename = "chinese_title", skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn title(mut self, v: impl Into<String>) -> Self {
        self.title = non_empty(v.into());
        self
    }

    pub fn translated_title(mut self, v: impl Into<String>) -> Self {
        self.translated_title = non_empty(v.into());
        self
    }

    pub fn authors(mut self, v: impl Into<String>) -> Self {
        self.authors = non_empty(v.into());
        self
    }

    pub fn source(mut self, v: impl Into<String>) -> Self {
        self.source = non_empty(v.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the year from form input; anything unparseable leaves it unset.
    pub fn year_str(mut self, v: &str) -> Self {
        self.year = v.trim().parse().ok().filter(|y| *y != 0);
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .filter_map(|k| non_empty(k.into()))
            .collect();
        self
    }

    /// Set keywords from a comma-separated list, trimming and dropping blanks.
    pub fn keywords_csv(self, csv: &str) -> Self {
        self.keywords(csv.split(',').map(str::trim))
    }

    pub fn abstract_text(mut self, v: impl Into<String>) -> Self {
        self.abstract_text = non_empty(v.into());
        self
    }

    /// Add a custom row; rows with an empty key or value are ignored.
    pub fn custom_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().trim().to_string();
        let value = value.into();
        if !key.is_empty() && !value.trim().is_empty() {
            self.custom_fields.insert(key, value);
        }
        self
    }

    /// Parse a `key=value` row as typed on the command line.
    pub fn custom_field_pair(self, pair: &str) -> Self {
        match pair.split_once('=') {
            Some((k, v)) => self.custom_field(k, v),
            None => self,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
