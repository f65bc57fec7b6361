//! Attribute validation rules checked by `save`

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backends::DatabaseValue;

static EMAIL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$").ok()
});

#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Email,
    Pattern(Regex),
    Numeric,
}

impl Rule {
    /// Error message for `field`, or `None` when the value passes.
    /// Rules other than `Required` accept null and empty values.
    pub fn check(&self, field: &str, value: &DatabaseValue) -> Option<String> {
        let text = match value {
            DatabaseValue::Null => None,
            other => other.key_string(),
        };
        let blank = text.as_deref().map(|t| t.trim().is_empty()).unwrap_or(true);

        if let Rule::Required = self {
            return blank.then(|| format!("The {} field is required", field));
        }
        if blank {
            return None;
        }
        let text = text.unwrap_or_default();

        match self {
            Rule::Required => None,
            Rule::MinLength(min) => (text.chars().count() < *min)
                .then(|| format!("The {} field must be at least {} characters", field, min)),
            Rule::MaxLength(max) => (text.chars().count() > *max)
                .then(|| format!("The {} field must not exceed {} characters", field, max)),
            Rule::Email => {
                let valid = EMAIL_PATTERN
                    .as_ref()
                    .map(|pattern| pattern.is_match(&text))
                    .unwrap_or(false);
                (!valid).then(|| format!("The {} field must be a valid email address", field))
            }
            Rule::Pattern(pattern) => (!pattern.is_match(&text))
                .then(|| format!("The {} field format is invalid", field)),
            Rule::Numeric => (value.as_f64().is_none())
                .then(|| format!("The {} field must be numeric", field)),
        }
    }
}

/// Messages collected by the last validating `save`, per field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: String) {
        self.errors.entry(field.to_string()).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.errors.keys()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .errors
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Run every rule against the current attribute values
pub(crate) fn validate<'a, F>(rules: &[(String, Rule)], value_of: F) -> ValidationErrors
where
    F: Fn(&str) -> Option<&'a DatabaseValue>,
{
    let null = DatabaseValue::Null;
    let mut errors = ValidationErrors::new();
    for (field, rule) in rules {
        let value = value_of(field.as_str()).unwrap_or(&null);
        if let Some(message) = rule.check(field, value) {
            errors.add(field, message);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert!(Rule::Required.check("name", &DatabaseValue::Null).is_some());
        assert!(Rule::Required.check("name", &DatabaseValue::from("  ")).is_some());
        assert!(Rule::Required.check("name", &DatabaseValue::from("Ann")).is_none());
        assert!(Rule::Required.check("age", &DatabaseValue::Int64(0)).is_none());
    }

    #[test]
    fn test_optional_rules_skip_blank_values() {
        assert!(Rule::Email.check("email", &DatabaseValue::Null).is_none());
        assert!(Rule::MinLength(3).check("name", &DatabaseValue::from("")).is_none());
    }

    #[test]
    fn test_lengths_count_characters() {
        assert!(Rule::MinLength(3).check("name", &DatabaseValue::from("Zoë")).is_none());
        assert!(Rule::MaxLength(2).check("name", &DatabaseValue::from("Zoë")).is_some());
    }

    #[test]
    fn test_email() {
        assert!(Rule::Email.check("email", &DatabaseValue::from("ann@example.com")).is_none());
        assert!(Rule::Email.check("email", &DatabaseValue::from("ann@")).is_some());
        assert!(Rule::Email.check("email", &DatabaseValue::from("not an email")).is_some());
    }

    #[test]
    fn test_pattern_and_numeric() {
        let slug = Rule::Pattern(Regex::new(r"^[a-z0-9-]+$").unwrap());
        assert!(slug.check("slug", &DatabaseValue::from("hello-world")).is_none());
        assert!(slug.check("slug", &DatabaseValue::from("Hello World")).is_some());
        assert!(Rule::Numeric.check("age", &DatabaseValue::from("12.5")).is_none());
        assert!(Rule::Numeric.check("age", &DatabaseValue::from("twelve")).is_some());
    }

    #[test]
    fn test_validate_collects_per_field() {
        let rules = vec![
            ("name".to_string(), Rule::Required),
            ("email".to_string(), Rule::Required),
            ("email".to_string(), Rule::Email),
        ];
        let email = DatabaseValue::from("nope");
        let errors = validate(&rules, |field| (field == "email").then_some(&email));
        assert_eq!(errors.len(), 2);
        assert!(errors.has("name"));
        assert_eq!(errors.get("email").map(|m| m.len()), Some(1));
    }
}
