//! Argument-bag validation and wire-parameter construction.
//!
//! Tool callers hand over a loosely-typed JSON object. [`Args`] reads it with
//! the "empty means unset" convention of the tool layer, and
//! [`ParamsBuilder`] turns the typed request back into the flat key/value
//! form MediaWiki expects.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub type ArgumentBag = Map<String, Value>;

/// Key/value pairs ready for transmission. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedParameters(BTreeMap<String, String>);

impl NormalizedParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ParamsBuilder {
    params: BTreeMap<String, String>,
}

impl ParamsBuilder {
    pub fn action(action: &str) -> Self {
        let mut builder = Self::default();
        builder.set("action", action);
        builder
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn set_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// MediaWiki booleans are true by presence; false is expressed by omission.
    pub fn flag(&mut self, key: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.params.insert(key.to_string(), "1".to_string());
        }
        self
    }

    pub fn list<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> &mut Self {
        if let Some(joined) = join_list(values) {
            self.params.insert(key.to_string(), joined);
        }
        self
    }

    pub fn list_opt<S: AsRef<str>>(&mut self, key: &str, values: Option<&[S]>) -> &mut Self {
        match values {
            Some(values) => self.list(key, values),
            None => self,
        }
    }

    pub fn build(self) -> NormalizedParameters {
        NormalizedParameters(self.params)
    }
}

/// Joins a multi-value parameter. Empty input yields `None` so the key is
/// omitted rather than sent blank. Values that themselves contain a pipe
/// switch to MediaWiki's U+001F separator form.
pub fn join_list<S: AsRef<str>>(values: &[S]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    if values.iter().any(|value| value.as_ref().contains('|')) {
        let mut joined = String::from('\u{1f}');
        let parts = values.iter().map(AsRef::as_ref).collect::<Vec<_>>();
        joined.push_str(&parts.join("\u{1f}"));
        return Some(joined);
    }
    Some(
        values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Rewrites `<prefix>_<slot>` (or an already hyphenated `<prefix>-<slot>`)
/// to the wire form `<prefix>-<slot>` when `prefix` is a known templated
/// parameter. Returns the prefix and slot name.
pub fn templated_slot_key<'a>(key: &'a str, prefixes: &[&'static str]) -> Option<(&'static str, &'a str)> {
    for prefix in prefixes {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        let Some(slot) = rest.strip_prefix('_').or_else(|| rest.strip_prefix('-')) else {
            continue;
        };
        if !slot.is_empty() && !slot.contains(['_', '-', '|']) {
            return Some((prefix, slot));
        }
    }
    None
}

pub fn hyphenate_slot_key(key: &str, prefixes: &[&'static str]) -> Option<String> {
    templated_slot_key(key, prefixes).map(|(prefix, slot)| format!("{prefix}-{slot}"))
}

/// Section identifiers accepted by action=edit: "new" or a non-negative integer.
pub fn validate_edit_section(value: &str) -> Result<(), ValidationError> {
    if value == "new" || is_non_negative_integer(value) {
        return Ok(());
    }
    Err(ValidationError::InvalidSection(value.to_string()))
}

/// action=parse additionally accepts template sections such as `T-2`.
pub fn validate_parse_section(value: &str) -> Result<(), ValidationError> {
    if let Some(rest) = value.strip_prefix("T-")
        && is_non_negative_integer(rest)
    {
        return Ok(());
    }
    validate_edit_section(value)
}

fn is_non_negative_integer(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

pub const WATCHLIST_VALUES: &[&str] = &["nochange", "preferences", "unwatch", "watch"];

/// Read-only view over a tool argument bag.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    bag: &'a ArgumentBag,
}

impl<'a> Args<'a> {
    pub fn new(bag: &'a ArgumentBag) -> Self {
        Self { bag }
    }

    pub fn bag(&self) -> &'a ArgumentBag {
        self.bag
    }

    fn raw(&self, name: &str) -> Option<&'a Value> {
        match self.bag.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Whether the argument carries a meaningful value: non-empty strings,
    /// non-zero numbers, `true`, and non-empty arrays.
    pub fn present(&self, name: &str) -> bool {
        match self.raw(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.is_empty(),
            Some(Value::Number(number)) => number.as_f64() != Some(0.0),
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(_)) => true,
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<String>, ValidationError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(text)) if text.is_empty() => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(_) => Err(invalid_type(name, "string")),
        }
    }

    /// Page content, where an empty string is meaningful (blanking a page).
    pub fn content(&self, name: &str) -> Result<Option<String>, ValidationError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(invalid_type(name, "string")),
        }
    }

    pub fn required_string(&self, name: &str) -> Result<String, ValidationError> {
        self.string(name)?
            .ok_or_else(|| ValidationError::MissingRequired(name.to_string()))
    }

    /// Modern parameter first; the deprecated spelling only fills a gap.
    pub fn string_with_alias(
        &self,
        modern: &str,
        legacy: &str,
    ) -> Result<Option<String>, ValidationError> {
        match self.string(modern)? {
            Some(value) => Ok(Some(value)),
            None => self.string(legacy),
        }
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>, ValidationError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .map(Some)
                .ok_or_else(|| invalid_type(name, "integer")),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| invalid_type(name, "integer")),
            Some(_) => Err(invalid_type(name, "integer")),
        }
    }

    /// Page, revision, and file identifiers: zero is treated as unset.
    pub fn id(&self, name: &str) -> Result<Option<u64>, ValidationError> {
        match self.integer(name)? {
            None | Some(0) => Ok(None),
            Some(value) => u64::try_from(value)
                .map(Some)
                .map_err(|_| invalid_type(name, "positive integer")),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, ValidationError> {
        Ok(self.opt_flag(name)?.unwrap_or(false))
    }

    pub fn flag_or(&self, name: &str, default: bool) -> Result<bool, ValidationError> {
        Ok(self.opt_flag(name)?.unwrap_or(default))
    }

    pub fn opt_flag(&self, name: &str) -> Result<Option<bool>, ValidationError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Bool(enabled)) => Ok(Some(*enabled)),
            Some(Value::Number(number)) => Ok(Some(number.as_f64() != Some(0.0))),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "1" | "true" | "yes" => Ok(Some(true)),
                "0" | "false" | "no" => Ok(Some(false)),
                _ => Err(invalid_type(name, "boolean")),
            },
            Some(_) => Err(invalid_type(name, "boolean")),
        }
    }

    /// Accepts a JSON array or a pipe-separated string. An explicitly empty
    /// list is `Some(vec![])`, distinct from an absent argument.
    pub fn list(&self, name: &str) -> Result<Option<Vec<String>>, ValidationError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(text) if text.is_empty() => {}
                        Value::String(text) => values.push(text.clone()),
                        Value::Number(number) => values.push(number.to_string()),
                        _ => return Err(invalid_type(name, "list of strings")),
                    }
                }
                Ok(Some(values))
            }
            Some(Value::String(text)) => Ok(Some(
                text.split('|')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            )),
            Some(Value::Number(number)) => Ok(Some(vec![number.to_string()])),
            Some(_) => Err(invalid_type(name, "list of strings")),
        }
    }

    pub fn integer_list(&self, name: &str) -> Result<Option<Vec<i64>>, ValidationError> {
        let Some(values) = self.list(name)? else {
            return Ok(None);
        };
        values
            .iter()
            .map(|value| {
                value
                    .parse::<i64>()
                    .map_err(|_| invalid_type(name, "list of integers"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn enum_value(
        &self,
        name: &str,
        allowed: &[&'static str],
    ) -> Result<Option<String>, ValidationError> {
        let Some(value) = self.string(name)? else {
            return Ok(None);
        };
        if allowed.contains(&value.as_str()) {
            return Ok(Some(value));
        }
        Err(ValidationError::InvalidEnumValue {
            name: name.to_string(),
            value,
            allowed: allowed.to_vec(),
        })
    }

    /// At most one member of `names` may be present.
    pub fn exclusive(&self, names: &[&str]) -> Result<(), ValidationError> {
        let supplied = names
            .iter()
            .copied()
            .filter(|name| self.present(name))
            .collect::<Vec<_>>();
        if supplied.len() > 1 {
            return Err(ValidationError::conflicting(&supplied));
        }
        Ok(())
    }

    /// At least one member of `names` must be present.
    pub fn require_any(&self, names: &[&str]) -> Result<(), ValidationError> {
        if names.iter().any(|name| self.present(name)) {
            return Ok(());
        }
        Err(ValidationError::missing_one_of(names))
    }

    /// Exactly one member of `names` must be present.
    pub fn require_one(&self, names: &[&str]) -> Result<(), ValidationError> {
        self.require_any(names)?;
        self.exclusive(names)
    }

    pub fn watchlist(&self) -> Result<Option<String>, ValidationError> {
        // "preferences" is the remote default, so it is never sent.
        Ok(self
            .enum_value("watchlist", WATCHLIST_VALUES)?
            .filter(|value| value != "preferences"))
    }
}

fn invalid_type(name: &str, expected: &'static str) -> ValidationError {
    ValidationError::InvalidType {
        name: name.to_string(),
        expected,
    }
}
