//! ErrorMapper: converting server validation payloads into per-field and
//! per-row annotations on a session.

use log::{debug, warn};
use serde_json::Value;

use crate::form::field::FieldPath;
use crate::form::session::FormSession;

/// One mapped error annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub field_path: FieldPath,
    pub message: String,
    /// Present only for nested (list-shaped sub-resource) fields
    pub row_index: Option<usize>,
}

/// Keys the server uses for errors not tied to any field.
const NON_FIELD_KEYS: [&str; 3] = ["non_field_errors", "__all__", "detail"];

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        other => vec![other.to_string()],
    }
}

/// Apply a 400 validation payload to the session.
///
/// Flat fields receive their message list in order (most specific first, as
/// the server sent them). Non-field errors land in the banner list. Nested
/// fields map per-row error objects against the caller-supplied row
/// identifiers; a count mismatch drops the excess with a warning, never
/// silently and never fatally. Returns every entry that was applied.
pub fn apply(payload: &Value, session: &mut FormSession) -> Vec<ErrorEntry> {
    let mut applied = Vec::new();
    let Some(object) = payload.as_object() else {
        session
            .non_field_errors
            .push("The server rejected the submission.".to_string());
        return applied;
    };

    for (key, value) in object {
        if NON_FIELD_KEYS.contains(&key.as_str()) {
            for message in messages_of(value) {
                session.non_field_errors.push(message);
            }
            continue;
        }

        let path = session.path(key);
        let Some(descriptor) = session.descriptor(&path) else {
            debug!("Error for unknown field '{}' shown as non-field", key);
            for message in messages_of(value) {
                session.non_field_errors.push(format!("{}: {}", key, message));
            }
            continue;
        };

        // a hidden field has no row to annotate; its errors surface in the
        // banner so the rejection is never invisible
        if descriptor.hidden {
            let label = descriptor.display_label().to_string();
            for message in messages_of(value) {
                session.non_field_errors.push(format!("{}: {}", label, message));
            }
            continue;
        }

        if descriptor.nested {
            apply_nested(key, value, &path, session, &mut applied);
            continue;
        }

        for message in messages_of(value) {
            applied.push(ErrorEntry {
                field_path: path.clone(),
                message: message.clone(),
                row_index: None,
            });
            session.field_errors.entry(path.clone()).or_default().push(message);
        }
    }

    scroll_to_first_error(session);
    applied
}

fn apply_nested(
    name: &str,
    value: &Value,
    path: &FieldPath,
    session: &mut FormSession,
    applied: &mut Vec<ErrorEntry>,
) {
    let rows = session.nested_rows.get(name).cloned().unwrap_or_default();
    let Some(row_payloads) = value.as_array() else {
        // nested marker but flat payload; fall back to field-level display
        for message in messages_of(value) {
            session
                .field_errors
                .entry(path.clone())
                .or_default()
                .push(message);
        }
        return;
    };

    if row_payloads.len() != rows.len() {
        warn!(
            "Nested error count mismatch for '{}': {} payload rows vs {} known rows; \
             applying the overlapping subset",
            name,
            row_payloads.len(),
            rows.len()
        );
    }

    let usable = row_payloads.len().min(rows.len());
    for (index, row_payload) in row_payloads.iter().take(usable).enumerate() {
        let mut messages = Vec::new();
        match row_payload {
            Value::Object(fields) => {
                for (sub_field, sub_value) in fields {
                    for message in messages_of(sub_value) {
                        messages.push(format!("{}: {}", sub_field, message));
                    }
                }
            }
            other => messages.extend(messages_of(other)),
        }
        if messages.is_empty() {
            continue;
        }
        for message in &messages {
            applied.push(ErrorEntry {
                field_path: path.clone(),
                message: message.clone(),
                row_index: Some(index),
            });
        }
        session
            .row_errors
            .entry(path.clone())
            .or_default()
            .push((index, messages));
    }
}

/// Scroll the first errored field into view, or the whole form to top, so
/// an error is always visible regardless of form length.
fn scroll_to_first_error(session: &mut FormSession) {
    let first = session
        .displayed()
        .enumerate()
        .find(|(_, path)| {
            session.field_errors.contains_key(path) || session.row_errors.contains_key(path)
        })
        .map(|(index, _)| index);
    session.scroll_index = first.unwrap_or(0);
}

/// Remove exactly the state `apply` added.
pub fn clear(session: &mut FormSession) {
    session.field_errors.clear();
    session.row_errors.clear();
    session.non_field_errors.clear();
}

/// Build a validation-shaped payload from client-side check failures so
/// local errors display identically to server 400s.
pub fn synthesize(failures: &[(FieldPath, String)]) -> Value {
    let mut object = serde_json::Map::new();
    for (path, message) in failures {
        object
            .entry(path.base.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .map(|list| list.push(Value::String(message.clone())));
    }
    Value::Object(object)
}
