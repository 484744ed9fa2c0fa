//! SubmissionPipeline: payload assembly, client-side validation gate, and
//! outcome classification.

use anyhow::Result;
use log::debug;
use serde_json::{Map, Value};

use crate::client::{HttpMethod, MultipartField, PartValue, Transport};
use crate::form::field::{FieldKind, FieldPath};
use crate::form::message::SubmitOutcome;
use crate::form::registry;
use crate::form::session::FormSession;

/// Fully assembled request body.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// Run the numeric pre-submission checks over every field.
///
/// Failures abort the network call; the entries display exactly like a
/// server 400 without the round-trip.
pub fn client_validate(session: &FormSession) -> Vec<(FieldPath, String)> {
    let mut failures = Vec::new();
    for path in &session.order {
        let (Some(descriptor), Some(state)) = (session.descriptor(path), session.state(path))
        else {
            continue;
        };
        if let Err(message) = registry::validate(descriptor, state) {
            failures.push((path.clone(), message));
        }
    }
    failures
}

/// Assemble the payload by extracting every field in order.
///
/// Decorative and read-only fields are skipped. If any field is of file
/// kind the entire payload becomes multipart, and every extracted field is
/// carried in it, not only the file.
pub fn build_payload(session: &FormSession) -> Result<Payload> {
    let has_file = session.order.iter().any(|path| {
        session
            .descriptor(path)
            .map(|d| d.kind == FieldKind::File && !d.read_only)
            .unwrap_or(false)
    });

    if has_file {
        build_multipart(session).map(Payload::Multipart)
    } else {
        build_json(session).map(Payload::Json)
    }
}

fn build_json(session: &FormSession) -> Result<Value> {
    let mut body = Map::new();
    for path in &session.order {
        let (Some(descriptor), Some(state)) = (session.descriptor(path), session.state(path))
        else {
            continue;
        };
        if let Some(value) = registry::extract_value(descriptor, state) {
            body.insert(descriptor.name.clone(), value);
        }
    }
    Ok(Value::Object(body))
}

fn build_multipart(session: &FormSession) -> Result<Vec<MultipartField>> {
    let mut parts = Vec::new();
    for path in &session.order {
        let (Some(descriptor), Some(state)) = (session.descriptor(path), session.state(path))
        else {
            continue;
        };
        let Some(value) = registry::extract_value(descriptor, state) else {
            continue;
        };
        if descriptor.kind == FieldKind::File {
            let file_path = match &value {
                Value::String(s) if !s.is_empty() => s.clone(),
                _ => continue,
            };
            let bytes = std::fs::read(&file_path)
                .map_err(|e| anyhow::anyhow!("Cannot read file '{}': {}", file_path, e))?;
            let filename = std::path::Path::new(&file_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file_path.clone());
            parts.push(MultipartField {
                name: descriptor.name.clone(),
                value: PartValue::File {
                    filename,
                    bytes,
                    mime: "application/octet-stream".to_string(),
                },
            });
        } else {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            parts.push(MultipartField {
                name: descriptor.name.clone(),
                value: PartValue::Text(text),
            });
        }
    }
    Ok(parts)
}

/// Send the payload and classify the result.
pub async fn perform(
    transport: &dyn Transport,
    method: HttpMethod,
    url: &str,
    payload: Payload,
) -> SubmitOutcome {
    let sent = match payload {
        Payload::Json(body) => transport.send_json(method, url, &body).await,
        Payload::Multipart(parts) => transport.send_multipart(method, url, parts).await,
    };
    match sent {
        Ok(response) if response.is_success() => {
            debug!("{} {} succeeded ({})", method, url, response.status);
            SubmitOutcome::Success(response.body)
        }
        Ok(response) if response.is_validation_error() => SubmitOutcome::Validation(response.body),
        Ok(response) => SubmitOutcome::Transport(format!(
            "{} {} failed with status {}",
            method, url, response.status
        )),
        Err(e) => SubmitOutcome::Transport(format!("{} {} failed: {}", method, url, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::field::FieldDescriptor;
    use crate::form::registry::seed_state;
    use crate::schema::FieldMeta;
    use serde_json::json;

    fn descriptor(name: &str, kind: &str, value: Value) -> FieldDescriptor {
        let meta = FieldMeta {
            field_type: kind.into(),
            ..Default::default()
        };
        let mut d = FieldDescriptor::from_meta(name, &meta).unwrap();
        if !value.is_null() {
            d.value = Some(value);
        }
        d
    }

    #[test]
    fn json_payload_without_files() {
        let session = FormSession::new(
            "/api/widget/",
            HttpMethod::Post,
            0,
            vec![
                descriptor("name", "string", json!("flange")),
                descriptor("note", "decorative", json!("ignored")),
            ],
            seed_state,
        )
        .unwrap();
        match build_payload(&session).unwrap() {
            Payload::Json(body) => {
                assert_eq!(body["name"], "flange");
                assert!(body.get("note").is_none());
            }
            Payload::Multipart(_) => panic!("expected json payload"),
        }
    }

    #[test]
    fn any_file_field_forces_multipart_with_all_fields() {
        let file = std::env::temp_dir().join("restform-submit-test.bin");
        std::fs::write(&file, b"payload").unwrap();
        let session = FormSession::new(
            "/api/widget/",
            HttpMethod::Post,
            0,
            vec![
                descriptor("name", "string", json!("flange")),
                descriptor(
                    "attachment",
                    "file",
                    json!(file.to_string_lossy().to_string()),
                ),
            ],
            seed_state,
        )
        .unwrap();
        match build_payload(&session).unwrap() {
            Payload::Multipart(parts) => {
                let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
                assert!(names.contains(&"name"), "every field must be carried");
                assert!(names.contains(&"attachment"));
            }
            Payload::Json(_) => panic!("expected multipart payload"),
        }
    }

    #[test]
    fn invalid_numeric_blocks_before_network() {
        let session = FormSession::new(
            "/api/widget/",
            HttpMethod::Post,
            0,
            vec![descriptor("qty", "integer", json!("three"))],
            seed_state,
        )
        .unwrap();
        let failures = client_validate(&session);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, session.path("qty"));
    }
}
