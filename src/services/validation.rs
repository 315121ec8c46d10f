//! Form validation
//!
//! Rules are written in the familiar pipe-separated form
//! (`required|alpha_dash|min:5|max:255|unique:posts,slug`) and parsed into
//! [`Rule`] values. A [`RuleSet`] maps form fields to their rules and the
//! [`Validator`] checks a [`PostForm`] against it, collecting messages per
//! field. Uniqueness checks go through [`UniqueLookup`].

use crate::db::repositories::UniqueLookup;
use crate::models::{FieldValue, PostForm};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Rules applied when a post is created
pub const STORE_RULES: &[(&str, &str)] = &[
    ("title", "required|max:255"),
    ("slug", "required|alpha_dash|min:5|max:255|unique:posts,slug"),
    ("category_id", "required|integer"),
    ("body", "required"),
    ("featured_img", "required|file"),
];

/// On update the featured image may be left out to keep the current one
const UPDATE_IMAGE_RULES: &str = "nullable|file";

/// A single validation constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Empty values skip the remaining rules
    Nullable,
    /// Characters for text, kilobytes for files
    Max(usize),
    /// Characters for text, kilobytes for files
    Min(usize),
    /// Letters, digits, `-` and `_`
    AlphaDash,
    Integer,
    File,
    Unique { table: String, column: String },
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "required"),
            Rule::Nullable => write!(f, "nullable"),
            Rule::Max(n) => write!(f, "max:{}", n),
            Rule::Min(n) => write!(f, "min:{}", n),
            Rule::AlphaDash => write!(f, "alpha_dash"),
            Rule::Integer => write!(f, "integer"),
            Rule::File => write!(f, "file"),
            Rule::Unique { table, column } => write!(f, "unique:{},{}", table, column),
        }
    }
}

/// Errors raised while parsing rule strings
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RuleParseError {
    #[error("Unknown validation rule: {0}")]
    UnknownRule(String),

    #[error("Validation rule '{0}' requires a parameter")]
    MissingParameter(String),

    #[error("Invalid parameter for rule '{rule}': {value}")]
    InvalidParameter { rule: String, value: String },
}

/// Parse a pipe-separated rule string
pub fn parse_rules(rules: &str) -> Result<Vec<Rule>, RuleParseError> {
    rules.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_rule)
        .collect()
}

fn parse_rule(part: &str) -> Result<Rule, RuleParseError> {
    let (name, param) = match part.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (part, None),
    };

    let require_param = || param.ok_or_else(|| RuleParseError::MissingParameter(name.to_string()));
    let parse_size = |value: &str| {
        value.parse::<usize>().map_err(|_| RuleParseError::InvalidParameter {
            rule: name.to_string(),
            value: value.to_string(),
        })
    };

    match name {
        "required" => Ok(Rule::Required),
        "nullable" => Ok(Rule::Nullable),
        "alpha_dash" => Ok(Rule::AlphaDash),
        "integer" => Ok(Rule::Integer),
        "file" => Ok(Rule::File),
        "max" => Ok(Rule::Max(parse_size(require_param()?)?)),
        "min" => Ok(Rule::Min(parse_size(require_param()?)?)),
        "unique" => {
            let value = require_param()?;
            match value.split_once(',') {
                Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                    Ok(Rule::Unique {
                        table: table.to_string(),
                        column: column.to_string(),
                    })
                }
                _ => Err(RuleParseError::InvalidParameter {
                    rule: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
        other => Err(RuleParseError::UnknownRule(other.to_string())),
    }
}

/// Ordered mapping of form fields to their rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    /// Build a rule set from `(field, rule string)` pairs
    pub fn parse(pairs: &[(&str, &str)]) -> Result<Self, RuleParseError> {
        let mut fields = Vec::with_capacity(pairs.len());
        for (field, rules) in pairs {
            fields.push((field.to_string(), parse_rules(rules)?));
        }
        Ok(Self { fields })
    }

    pub fn rules_for(&self, field: &str) -> Option<&[Rule]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.rules_for(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields
            .iter()
            .map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }
}

/// Rules for creating a post
pub fn store_rules() -> Result<RuleSet, RuleParseError> {
    RuleSet::parse(STORE_RULES)
}

/// Rules for updating a post whose current slug is `stored_slug`.
///
/// The slug rule is left out entirely when the submitted slug is unchanged,
/// so the post's own slug never trips the uniqueness check.
pub fn compute_validation_rules(
    form: &PostForm,
    stored_slug: &str,
) -> Result<RuleSet, RuleParseError> {
    let slug_unchanged = form.slug.as_deref() == Some(stored_slug);

    let pairs: Vec<(&str, &str)> = STORE_RULES
        .iter()
        .filter(|(field, _)| !(*field == "slug" && slug_unchanged))
        .map(|&(field, rules)| match field {
            "featured_img" => (field, UPDATE_IMAGE_RULES),
            _ => (field, rules),
        })
        .collect();

    RuleSet::parse(&pairs)
}

/// Per-field validation messages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors with a single message on one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .fields
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        write!(f, "{}", messages.join(" "))
    }
}

/// Checks forms against rule sets
pub struct Validator {
    unique: Arc<dyn UniqueLookup>,
}

impl Validator {
    pub fn new(unique: Arc<dyn UniqueLookup>) -> Self {
        Self { unique }
    }

    /// Validate every field of `rules`. Lookup failures are returned as errors,
    /// rule failures as messages in [`ValidationErrors`].
    pub async fn validate(
        &self,
        rules: &RuleSet,
        form: &PostForm,
    ) -> anyhow::Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, field_rules) in rules.iter() {
            let value = form.field(field);
            let label = field.replace('_', " ");

            if is_empty(&value) {
                if field_rules.contains(&Rule::Required) {
                    errors.add(field, format!("The {} field is required.", label));
                }
                continue;
            }

            for rule in field_rules {
                if let Some(message) = self.check(rule, &value, &label).await? {
                    errors.add(field, message);
                }
            }
        }

        Ok(errors)
    }

    async fn check(
        &self,
        rule: &Rule,
        value: &FieldValue<'_>,
        label: &str,
    ) -> anyhow::Result<Option<String>> {
        let message = match (rule, value) {
            (Rule::Required | Rule::Nullable, _) => None,
            (Rule::Max(max), FieldValue::Text(text)) if text.chars().count() > *max => Some(
                format!("The {} may not be greater than {} characters.", label, max),
            ),
            (Rule::Max(max), FieldValue::File(file)) if file.bytes.len() / 1024 > *max => Some(
                format!("The {} may not be greater than {} kilobytes.", label, max),
            ),
            (Rule::Min(min), FieldValue::Text(text)) if text.chars().count() < *min => Some(
                format!("The {} must be at least {} characters.", label, min),
            ),
            (Rule::Min(min), FieldValue::File(file)) if file.bytes.len() / 1024 < *min => Some(
                format!("The {} must be at least {} kilobytes.", label, min),
            ),
            (Rule::AlphaDash, FieldValue::Text(text)) if !is_alpha_dash(text) => Some(format!(
                "The {} may only contain letters, numbers, dashes and underscores.",
                label
            )),
            (Rule::Integer, FieldValue::Text(text)) if text.trim().parse::<i64>().is_err() => {
                Some(format!("The {} must be an integer.", label))
            }
            (Rule::File, FieldValue::Text(_)) => Some(format!("The {} must be a file.", label)),
            (Rule::AlphaDash | Rule::Integer, FieldValue::File(_)) => {
                Some(format!("The {} must be text.", label))
            }
            (Rule::Unique { table, column }, FieldValue::Text(text)) => {
                if self.unique.exists(table, column, text).await? {
                    Some(format!("The {} has already been taken.", label))
                } else {
                    None
                }
            }
            _ => None,
        };
        Ok(message)
    }
}

fn is_empty(value: &FieldValue<'_>) -> bool {
    match value {
        FieldValue::Missing => true,
        FieldValue::Text(text) => text.trim().is_empty(),
        FieldValue::File(file) => !file.is_valid(),
    }
}

/// Letters, digits, dashes and underscores only
pub fn is_alpha_dash(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}
