//! Typed request fields.
//!
//! The host hands the broker already-routed field values. [`FieldData`] holds
//! them as a small tagged union and offers typed accessors that fail with a
//! [`ValidationError`] naming the offending field. Input structs such as
//! [`crate::role::RoleInput`] are built from these accessors, never by
//! reflection over a generic map.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::ValidationError;

/// A single loosely-typed field value supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free-form string.
    String(String),
    /// Boolean flag.
    Bool(bool),
    /// Integer (durations given as whole seconds arrive this way).
    Int(i64),
    /// List of strings.
    StringList(Vec<String>),
    /// Already-parsed duration.
    Duration(Duration),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Duration> for FieldValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringList(value.into_iter().map(str::to_string).collect())
    }
}

/// The fields of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldData {
    fields: HashMap<String, FieldValue>,
}

impl FieldData {
    /// Creates an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns `true` if the field was supplied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Builds field data from a JSON object, as decoded by a host.
    ///
    /// Nulls are dropped; nested objects are kept as their JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongType` for non-object input, fractional
    /// numbers and arrays holding anything but strings.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or_else(|| ValidationError::WrongType {
            field: "<request>".to_string(),
            expected: "an object",
        })?;

        let mut data = Self::new();
        for (name, value) in object {
            let field = match value {
                Value::Null => continue,
                Value::String(s) => FieldValue::String(s.clone()),
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::Number(n) => {
                    FieldValue::Int(n.as_i64().ok_or_else(|| ValidationError::WrongType {
                        field: name.clone(),
                        expected: "an integer",
                    })?)
                }
                Value::Array(items) => FieldValue::StringList(
                    items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| ValidationError::WrongType {
                                    field: name.clone(),
                                    expected: "a list of strings",
                                })
                        })
                        .collect::<Result<_, _>>()?,
                ),
                Value::Object(_) => FieldValue::String(value.to_string()),
            };
            data.fields.insert(name.clone(), field);
        }
        Ok(data)
    }

    /// Returns a string field as given.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongType` if the field is not a string.
    pub fn string(&self, name: &str) -> Result<Option<String>, ValidationError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(name, "a string")),
        }
    }

    /// Returns a trimmed, non-empty string field.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` if absent and
    /// `ValidationError::EmptyField` if blank.
    pub fn required_string(&self, name: &str) -> Result<String, ValidationError> {
        let value = self
            .string(name)?
            .ok_or_else(|| ValidationError::MissingField(name.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyField(name.to_string()));
        }
        Ok(value.to_string())
    }

    /// Returns a boolean field. The strings `"true"`/`"false"` are accepted.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongType` for any other value.
    pub fn bool(&self, name: &str) -> Result<Option<bool>, ValidationError> {
        match self.get(name) {
            None => Ok(None),
            Some(FieldValue::Bool(b)) => Ok(Some(*b)),
            Some(FieldValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(wrong_type(name, "a boolean")),
            },
            Some(_) => Err(wrong_type(name, "a boolean")),
        }
    }

    /// Returns a list field with entries trimmed and blanks dropped.
    ///
    /// A single string is split on commas.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongType` for non-string values.
    pub fn string_list(&self, name: &str) -> Result<Option<Vec<String>>, ValidationError> {
        let raw: Vec<&str> = match self.get(name) {
            None => return Ok(None),
            Some(FieldValue::StringList(items)) => items.iter().map(String::as_str).collect(),
            Some(FieldValue::String(s)) => s.split(',').collect(),
            Some(_) => return Err(wrong_type(name, "a list of strings")),
        };
        Ok(Some(
            raw.into_iter()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }

    /// Returns a strictly positive duration field.
    ///
    /// Integers are whole seconds; strings may be integers or humantime
    /// expressions such as `"1h"`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NonPositiveDuration` for zero or negative
    /// values and `ValidationError::WrongType` for anything unparseable.
    pub fn positive_duration(&self, name: &str) -> Result<Option<Duration>, ValidationError> {
        let duration = match self.get(name) {
            None => return Ok(None),
            Some(FieldValue::Duration(d)) => *d,
            Some(FieldValue::Int(secs)) => seconds(name, *secs)?,
            Some(FieldValue::String(s)) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(secs) => seconds(name, secs)?,
                    Err(_) => humantime::parse_duration(s)
                        .map_err(|_| wrong_type(name, "a duration"))?,
                }
            }
            Some(_) => return Err(wrong_type(name, "a duration")),
        };
        if duration.is_zero() {
            return Err(ValidationError::NonPositiveDuration(name.to_string()));
        }
        Ok(Some(duration))
    }
}

fn seconds(name: &str, secs: i64) -> Result<Duration, ValidationError> {
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| ValidationError::NonPositiveDuration(name.to_string()))
}

fn wrong_type(name: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        field: name.to_string(),
        expected,
    }
}
