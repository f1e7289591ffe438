//! Local template rendering
//!
//! Rendering happens before any network call so that a missing value is a
//! permanent failure on our side instead of a half-filled email.

use crate::template::{Template, PLACEHOLDER};
use regex::Captures;
use serde::Serialize;
use std::collections::BTreeMap;

/// Placeholder values by name
pub type Personalisation = BTreeMap<String, String>;

/// Rendering failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Placeholders with no personalisation value
    #[error("template {template_id} has unfilled placeholders: {}", missing.join(", "))]
    MissingPersonalisation {
        /// Template being rendered
        template_id: String,
        /// Placeholder names, sorted
        missing: Vec<String>,
    },

    /// No template with that id
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

/// Fully rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    /// Source template
    pub template_id: String,
    /// Rendered subject
    pub subject: String,
    /// Rendered body
    pub body: String,
}

/// Render a template with the given values
///
/// Substitution is single pass: values that themselves look like
/// placeholders are inserted verbatim.
///
/// # Errors
/// Returns `RenderError::MissingPersonalisation` listing every placeholder
/// without a value
pub fn render(
    template: &Template,
    personalisation: &Personalisation,
) -> Result<RenderedEmail, RenderError> {
    let missing: Vec<String> = template
        .placeholders()
        .into_iter()
        .filter(|name| !personalisation.contains_key(*name))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        return Err(RenderError::MissingPersonalisation {
            template_id: template.id.clone(),
            missing,
        });
    }

    Ok(RenderedEmail {
        template_id: template.id.clone(),
        subject: substitute(&template.subject, personalisation),
        body: substitute(&template.body, personalisation),
    })
}

fn substitute(text: &str, personalisation: &Personalisation) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            personalisation
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

/// Check rendered text for leftover `((name))` markers
#[must_use]
pub fn has_unfilled_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn values(pairs: &[(&str, &str)]) -> Personalisation {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn fills_subject_and_body() {
        let t = Template::new("t1", "Lease ((uuid))", "Hi ((name)), lease ((uuid)) approved.");
        let email = render(&t, &values(&[("name", "Ada"), ("uuid", "lease-1")])).unwrap();

        assert_eq!(email.subject, "Lease lease-1");
        assert_eq!(email.body, "Hi Ada, lease lease-1 approved.");
    }

    #[test]
    fn missing_values_are_listed() {
        let t = Template::new("t1", "((b))", "((a)) ((c))");
        let err = render(&t, &values(&[("c", "x")])).unwrap_err();

        assert_eq!(
            err,
            RenderError::MissingPersonalisation {
                template_id: "t1".into(),
                missing: vec!["a".into(), "b".into()],
            }
        );
        assert_eq!(err.to_string(), "template t1 has unfilled placeholders: a, b");
    }

    #[test]
    fn values_are_not_expanded_twice() {
        let t = Template::new("t1", "s", "((a))");
        let email = render(&t, &values(&[("a", "((b))"), ("b", "x")])).unwrap();

        assert_eq!(email.body, "((b))");
    }

    #[test]
    fn extra_values_are_ignored() {
        let t = Template::new("t1", "s", "plain");
        assert!(render(&t, &values(&[("unused", "x")])).is_ok());
    }

    proptest! {
        #[test]
        fn rendered_body_contains_every_value(
            fields in prop::collection::btree_map("[a-z][a-z0-9_]{0,8}", "[A-Za-z0-9 .@-]{1,20}", 1..6)
        ) {
            let body = fields
                .keys()
                .map(|k| format!("{k}: (({k}))"))
                .collect::<Vec<_>>()
                .join("\n");
            let t = Template::new("t", "Subject", body);

            let email = render(&t, &fields).unwrap();

            prop_assert!(!has_unfilled_placeholders(&email.body));
            for value in fields.values() {
                prop_assert!(email.body.contains(value.as_str()));
            }
        }
    }
}
