//! Per-argument validation against the declarative schema.
//!
//! Validation runs before anything reaches the process supervisor. Its job is
//! to keep crafted values out of the argument vector: a uid that looks like a
//! flag or a path traversal, or an absent field that would shift the daemon's
//! positional parsing.

use crate::commands::{ArgKind, ArgSpec};
use serde_json::Value;
use url::Url;

/// Field-level rejection; the message names the offending argument.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("{0} must be a string")]
    NotAString(&'static str),
    #[error("{0} too long")]
    TooLong(&'static str),
    #[error("{0} must match [A-Za-z0-9_]+")]
    NotAnIdentifier(&'static str),
    #[error("{0} must be an http(s) URL")]
    NotAUrl(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// True when `s` is non-empty and wholly alphanumeric or underscore.
fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Validate one raw argument against its schema entry.
///
/// `Ok(None)` means the argument is optional and absent: it must be omitted
/// from the argument vector entirely, never passed as an empty string.
/// `Ok(Some(v))` is the exact string to use as one argv element.
pub fn validate(spec: &ArgSpec, raw: Option<&Value>) -> Result<Option<String>, ValidateError> {
    let absent = match raw {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    };
    if absent {
        if spec.required {
            return Err(ValidateError::Missing(spec.name));
        }
        return Ok(None);
    }

    let s = match raw {
        Some(Value::String(s)) => s,
        _ => return Err(ValidateError::NotAString(spec.name)),
    };

    let trimmed = s.trim();
    if let Some(max) = spec.max_len {
        if trimmed.len() > max {
            return Err(ValidateError::TooLong(spec.name));
        }
    }

    match spec.kind {
        ArgKind::Identifier => {
            if !is_identifier(trimmed) {
                return Err(ValidateError::NotAnIdentifier(spec.name));
            }
        }
        ArgKind::Url => {
            let ok = Url::parse(trimmed)
                .map(|u| u.scheme() == "http" || u.scheme() == "https")
                .unwrap_or(false);
            if !ok {
                return Err(ValidateError::NotAUrl(spec.name));
            }
        }
        ArgKind::Freetext => {
            if trimmed.is_empty() {
                return Err(ValidateError::Empty(spec.name));
            }
        }
    }

    Ok(Some(trimmed.to_string()))
}
