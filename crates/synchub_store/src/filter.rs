//! Minimal reference filter grammar.
//!
//! The protocol deliberately defines no filter language; filters are
//! backend-interpreted strings. This module implements the small grammar the
//! reference container (and the change-subscription narrowing) understands:
//!
//! - `"true"` matches every entity
//! - `field=value` matches a top-level field by equality, with the value
//!   parsed as JSON when possible and compared as a string otherwise
//!
//! Anything else is rejected as a [`CommandError::Filter`].

use crate::error::CommandError;
use serde_json::Value;

/// Returns whether `entity` matches `filter`.
///
/// The empty filter matches nothing; callers that want "match all" pass
/// `"true"`. Non-object entities only match `"true"`.
pub fn filter_matches(entity: &Value, filter: &str) -> Result<bool, CommandError> {
    if filter.is_empty() {
        return Ok(false);
    }
    if filter == "true" {
        return Ok(true);
    }

    let (field, raw) = filter
        .split_once('=')
        .ok_or_else(|| CommandError::Filter(filter.to_string()))?;
    if field.is_empty() {
        return Err(CommandError::Filter(filter.to_string()));
    }

    let Some(actual) = entity.get(field) else {
        return Ok(false);
    };

    // Compare against the JSON reading of the value when it parses,
    // otherwise against the raw string.
    if let Ok(expected) = serde_json::from_str::<Value>(raw) {
        if actual == &expected {
            return Ok(true);
        }
    }
    Ok(actual.as_str() == Some(raw))
}
