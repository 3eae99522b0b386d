//! Cross-field rules that the static schema cannot express.
//!
//! Both rules read a sibling attribute and act on a string attribute. They
//! hold no state and perform no I/O.

use serde_json::{Map, Value};

use crate::schema::Diagnostic;
use crate::types::is_unknown;

/// Requires an attribute to be non-empty whenever a sibling attribute equals
/// a given value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredWhen {
    sibling: &'static str,
    expected: &'static str,
}

impl RequiredWhen {
    /// Require the validated attribute when `sibling == expected`.
    pub const fn new(sibling: &'static str, expected: &'static str) -> Self {
        Self { sibling, expected }
    }

    /// Check `attribute` in `config`, returning a diagnostic on violation.
    ///
    /// An unknown sibling or attribute passes; the rule runs again once the
    /// values are known.
    pub fn validate(&self, attribute: &str, config: &Value) -> Option<Diagnostic> {
        let sibling = config.get(self.sibling).unwrap_or(&Value::Null);
        if sibling.as_str() != Some(self.expected) || is_unknown(sibling) {
            return None;
        }

        match config.get(attribute).unwrap_or(&Value::Null) {
            Value::Null => {},
            Value::String(s) if s.is_empty() => {},
            _ => return None,
        }

        Some(
            Diagnostic::error(format!("Missing required attribute: {}", attribute))
                .with_detail(format!(
                    "The '{}' attribute is required when '{}' is set to '{}'.",
                    attribute, self.sibling, self.expected
                ))
                .with_attribute(attribute),
        )
    }
}

/// Plans an attribute as explicit null, instead of unknown, when it is not
/// configured and a sibling's planned value equals a given value.
///
/// Without this the API-computed default shows up as drift on every plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullWhen {
    sibling: &'static str,
    expected: &'static str,
}

impl NullWhen {
    /// Null the modified attribute when the planned `sibling == expected`.
    pub const fn new(sibling: &'static str, expected: &'static str) -> Self {
        Self { sibling, expected }
    }

    /// Apply the rule to `attribute` in `planned`. Returns true if the
    /// planned value was changed.
    pub fn modify_plan(
        &self,
        attribute: &str,
        config: &Value,
        planned: &mut Map<String, Value>,
    ) -> bool {
        let configured = config.get(attribute).unwrap_or(&Value::Null);
        if !(configured.is_null() || is_unknown(configured)) {
            return false;
        }

        if planned.get(self.sibling).and_then(Value::as_str) != Some(self.expected) {
            return false;
        }

        let previous = planned.insert(attribute.to_string(), Value::Null);
        !matches!(previous, Some(Value::Null))
    }
}
