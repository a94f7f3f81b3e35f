//! Validation of untrusted query values.
//!
//! Every value that reaches a query must pass through [`InputValidator`].
//! The only way to obtain a [`ValidatedValue`] is through the validator, so a
//! query built from unchecked text cannot be expressed.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. empty value
//! 2. longer than the configured maximum (in characters)
//! 3. reserved operator token (`$` prefix, or `$` followed by a name anywhere)
//! 4. nested query structure (object or array shaped text)
//! 5. character allow-list of the field's [`FieldType`]
//! 6. numeric range for integer fields
//!
//! # Examples
//!
//! ```
//! use fieldgate::types::FieldType;
//! use fieldgate::validation::InputValidator;
//!
//! let validator = InputValidator::default();
//!
//! assert!(validator.validate("Alice", FieldType::Alpha).is_ok());
//! assert!(validator.validate(r#"{"$ne": null}"#, FieldType::Alpha).is_err());
//! assert_eq!(
//!     validator.validate("-42", FieldType::Integer).unwrap().as_integer(),
//!     Some(-42)
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::types::FieldType;

/// Default maximum value length, in characters.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 256;

/// Prefix that marks query operators in document stores.
pub const RESERVED_OPERATOR_PREFIX: char = '$';

/// A value that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedValue(Scalar);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scalar {
    Text(String),
    Integer(i64),
}

/// Borrowed view of a [`ValidatedValue`] for adapters binding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarRef<'a> {
    /// Text value.
    Text(&'a str),
    /// Integer value.
    Integer(i64),
}

impl ValidatedValue {
    /// Returns a borrowed view of the value.
    pub fn as_scalar(&self) -> ScalarRef<'_> {
        match &self.0 {
            Scalar::Text(s) => ScalarRef::Text(s),
            Scalar::Integer(i) => ScalarRef::Integer(*i),
        }
    }

    /// Returns the text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match &self.0 {
            Scalar::Text(s) => Some(s),
            Scalar::Integer(_) => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match &self.0 {
            Scalar::Integer(i) => Some(*i),
            Scalar::Text(_) => None,
        }
    }

    /// Returns the value as a JSON scalar.
    pub fn to_json(&self) -> Value {
        match &self.0 {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Integer(i) => Value::from(*i),
        }
    }

    /// Returns the length of the value's text form, in characters.
    pub fn char_len(&self) -> usize {
        match &self.0 {
            Scalar::Text(s) => s.chars().count(),
            Scalar::Integer(i) => i.to_string().len(),
        }
    }
}

impl fmt::Display for ValidatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// Configuration for [`InputValidator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Maximum value length in characters.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_max_length() -> usize {
    DEFAULT_MAX_INPUT_LENGTH
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

/// Pure validator for untrusted values.
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    config: ValidatorConfig,
}

impl InputValidator {
    /// Creates a validator with the given maximum length.
    pub fn new(max_length: usize) -> Self {
        Self::with_config(ValidatorConfig { max_length })
    }

    /// Creates a validator from configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Returns the maximum accepted length.
    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    /// Validates a value for a field of free-form label type.
    pub fn validate_text(&self, raw: &str) -> Result<ValidatedValue, ValidationError> {
        self.validate(raw, FieldType::Label)
    }

    /// Validates `raw` as a value of `field_type`.
    pub fn validate(
        &self,
        raw: &str,
        field_type: FieldType,
    ) -> Result<ValidatedValue, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }

        let length = raw.chars().count();
        if length > self.config.max_length {
            return Err(ValidationError::TooLong {
                length,
                max: self.config.max_length,
            });
        }

        if let Some(token) = find_operator_token(raw) {
            return Err(ValidationError::OperatorToken { token });
        }

        if looks_nested(raw) {
            return Err(ValidationError::NestedObject);
        }

        let validated = match field_type {
            FieldType::Integer => parse_integer(raw)?,
            _ => {
                if let Some(character) = raw.chars().find(|c| !allowed_in(field_type, *c)) {
                    return Err(ValidationError::DisallowedCharacter {
                        character,
                        field_type: field_type.as_str(),
                    });
                }
                Scalar::Text(raw.to_string())
            }
        };

        tracing::trace!(%field_type, length, "validated input value");
        Ok(ValidatedValue(validated))
    }
}

/// Returns the first reserved operator token in `raw`.
///
/// A token is the reserved prefix at the start of the (trimmed) value, or the
/// prefix followed by a letter or underscore anywhere in it.
fn find_operator_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with(RESERVED_OPERATOR_PREFIX) {
        return Some(token_at(trimmed, 0));
    }

    raw.char_indices()
        .filter(|(_, c)| *c == RESERVED_OPERATOR_PREFIX)
        .find(|(i, _)| {
            raw[i + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        })
        .map(|(i, _)| token_at(raw, i))
}

fn token_at(s: &str, start: usize) -> String {
    let rest = &s[start + RESERVED_OPERATOR_PREFIX.len_utf8()..];
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("{}{}", RESERVED_OPERATOR_PREFIX, name)
}

fn looks_nested(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with(['{', '[']) || trimmed.ends_with(['}', ']'])
}

fn allowed_in(field_type: FieldType, c: char) -> bool {
    match field_type {
        FieldType::Alpha => c.is_ascii_alphabetic(),
        FieldType::Integer => c.is_ascii_digit(),
        FieldType::Label => c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'),
        FieldType::Identifier => c.is_ascii_alphanumeric() || matches!(c, '_' | '-'),
    }
}

fn parse_integer(raw: &str) -> Result<Scalar, ValidationError> {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);

    let offending = if digits.is_empty() {
        raw.chars().next()
    } else {
        digits.chars().find(|c| !c.is_ascii_digit())
    };
    if let Some(character) = offending {
        return Err(ValidationError::DisallowedCharacter {
            character,
            field_type: FieldType::Integer.as_str(),
        });
    }

    raw.parse::<i64>()
        .map(Scalar::Integer)
        .map_err(|_| ValidationError::OutOfRange {
            value: raw.to_string(),
        })
}
