//! Email templates
//!
//! Templates use the Notify placeholder syntax `((name))`. Placeholder names
//! are ASCII letters, digits and underscores.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// `((name))`
pub(crate) static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\(([A-Za-z0-9_]+)\)\)").expect("placeholder pattern is valid"));

/// Email template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Notify template id
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// Subject line
    pub subject: String,
    /// Body in Notify markdown
    pub body: String,
}

impl Template {
    /// Create a template
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// With a display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Placeholder names used by subject and body, sorted and deduplicated
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<&str> {
        PLACEHOLDER
            .captures_iter(&self.subject)
            .chain(PLACEHOLDER.captures_iter(&self.body))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect()
    }
}

/// Templates indexed by id
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, Template>,
}

impl TemplateCatalog {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    /// With a template
    #[must_use]
    pub fn with(mut self, template: Template) -> Self {
        self.insert(template);
        self
    }

    /// Template by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Check if a template exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Number of templates
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate templates in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }
}

impl FromIterator<Template> for TemplateCatalog {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for template in iter {
            catalog.insert(template);
        }
        catalog
    }
}
