use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::keywords::HINT_WORDS;
use crate::parser::extract::fields::Fields;

/// Result of processing one crawled page. Built once through
/// [`PolicyRecordBuilder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    title: String,
    url: String,
    #[serde(rename = "content")]
    raw_text: String,
    publish_date: Option<String>,
    department: Option<String>,
    category: String,
    requirements: IndexMap<String, String>,
    crawl_time: DateTime<Local>,
}

impl PolicyRecord {
    pub fn builder(url: &str, title: &str, raw_text: &str) -> PolicyRecordBuilder {
        PolicyRecordBuilder {
            url: url.to_string(),
            title: title.to_string(),
            raw_text: raw_text.to_string(),
            fields: Fields::default(),
            category: None,
            requirements: IndexMap::new(),
            crawl_time: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn publish_date(&self) -> Option<&str> {
        self.publish_date.as_deref()
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn requirements(&self) -> &IndexMap<String, String> {
        &self.requirements
    }

    pub fn requirement(&self, label: &str) -> &str {
        self.requirements.get(label).map_or("", String::as_str)
    }

    pub fn crawl_time(&self) -> DateTime<Local> {
        self.crawl_time
    }

    /// Long body, a substantial requirement excerpt, or a hint word anywhere.
    pub fn is_meaningful(&self) -> bool {
        self.raw_text.chars().count() > 500
            || self
                .requirements
                .values()
                .any(|v| v.trim().chars().count() > 20)
            || HINT_WORDS
                .iter()
                .any(|w| self.title.contains(w) || self.raw_text.contains(w))
    }
}

pub struct PolicyRecordBuilder {
    url: String,
    title: String,
    raw_text: String,
    fields: Fields,
    category: Option<String>,
    requirements: IndexMap<String, String>,
    crawl_time: Option<DateTime<Local>>,
}

impl PolicyRecordBuilder {
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn requirements(mut self, requirements: IndexMap<String, String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn crawl_time(mut self, at: DateTime<Local>) -> Self {
        self.crawl_time = Some(at);
        self
    }

    /// Missing category falls back to the default label; missing time to now.
    pub fn build(self) -> PolicyRecord {
        PolicyRecord {
            title: self.title,
            url: self.url,
            raw_text: self.raw_text,
            publish_date: self.fields.publish_date,
            department: self.fields.department,
            category: self
                .category
                .unwrap_or_else(|| crate::keywords::DEFAULT_CATEGORY.to_string()),
            requirements: self.requirements,
            crawl_time: self.crawl_time.unwrap_or_else(Local::now),
        }
    }
}
