mod common;

use std::sync::Arc;

use anyhow::Result;
use crossterm::event::KeyCode;
use serde_json::json;

use common::{MockTransport, Recorded, drive, part_schema, step};
use restform::client::{HttpMethod, PartValue};
use restform::config::EngineConfig;
use restform::form::{EngineEvent, FieldPath, FormEngine, FormMsg, OpenFormOptions, SuccessPolicy};

fn engine_with(transport: Arc<MockTransport>) -> FormEngine {
    FormEngine::new(transport, EngineConfig::default())
}

async fn open_part_form(engine: &mut FormEngine, options: OpenFormOptions) {
    let command = engine.open("/parts/", HttpMethod::Post, options);
    drive(engine, command).await;
}

async fn type_text(engine: &mut FormEngine, name: &str, text: &str) {
    for c in text.chars() {
        step(
            engine,
            FormMsg::FieldKey {
                path: FieldPath::top(name),
                key: KeyCode::Char(c),
            },
        )
        .await;
    }
}

/// Open the dropdown and commit the currently highlighted choice.
async fn pick_first_choice(engine: &mut FormEngine, name: &str) {
    for key in [KeyCode::Enter, KeyCode::Enter] {
        step(
            engine,
            FormMsg::SelectKey {
                path: FieldPath::top(name),
                key,
            },
        )
        .await;
    }
}

#[tokio::test]
async fn validation_errors_map_to_their_fields() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond(
        "POST /parts/",
        400,
        json!({
            "name": ["This field is required."],
            "color": ["\"green\" is not a valid choice."]
        }),
    );
    let mut engine = engine_with(transport);
    open_part_form(&mut engine, OpenFormOptions::default()).await;

    step(&mut engine, FormMsg::Submit).await;

    let session = engine.active_form().expect("form stays open on 400");
    assert_eq!(
        session.errors_for(&session.path("name")),
        ["This field is required."]
    );
    assert_eq!(session.errors_for(&session.path("color")).len(), 1);
    assert!(!session.submitting, "submit must be re-enabled");
    // first errored field scrolled into view
    assert_eq!(session.scroll_index, 0);
    Ok(())
}

#[tokio::test]
async fn second_attempt_clears_previous_errors() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond("POST /parts/", 400, json!({ "name": ["Required."] }));
    transport.respond("POST /parts/", 201, json!({ "id": 1 }));
    let mut engine = engine_with(transport);
    open_part_form(&mut engine, OpenFormOptions::default()).await;

    step(&mut engine, FormMsg::Submit).await;
    assert!(engine.active_form().unwrap().has_errors());

    type_text(&mut engine, "name", "Bolt").await;
    step(&mut engine, FormMsg::Submit).await;

    assert!(!engine.is_open(), "success closes the form");
    Ok(())
}

#[tokio::test]
async fn payload_carries_typed_values_and_skips_hidden_display_only() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond("POST /parts/", 201, json!({ "id": 1 }));
    let mut engine = engine_with(transport.clone());
    open_part_form(&mut engine, OpenFormOptions::default()).await;

    type_text(&mut engine, "name", "Bolt").await;
    pick_first_choice(&mut engine, "color").await;
    type_text(&mut engine, "qty", "12").await;
    step(&mut engine, FormMsg::Submit).await;

    let body = transport
        .requests()
        .iter()
        .find_map(|r| match r {
            Recorded::Json { body, .. } => Some(body.clone()),
            _ => None,
        })
        .expect("a JSON submission should have happened");
    assert_eq!(body["name"], json!("Bolt"));
    assert_eq!(body["color"], json!("red"));
    assert_eq!(body["qty"], json!(12));
    Ok(())
}

#[tokio::test]
async fn invalid_numeric_input_blocks_the_network_call() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    let mut engine = engine_with(transport.clone());
    open_part_form(&mut engine, OpenFormOptions::default()).await;

    type_text(&mut engine, "qty", "banana").await;
    step(&mut engine, FormMsg::Submit).await;

    assert_eq!(transport.requests_matching("POST"), 0);
    let session = engine.active_form().unwrap();
    assert_eq!(session.errors_for(&session.path("qty")), ["Enter a valid integer."]);
    Ok(())
}

#[tokio::test]
async fn file_field_forces_multipart_with_every_field() -> Result<()> {
    let file_path = std::env::temp_dir().join("restform-upload-test.bin");
    std::fs::write(&file_path, b"payload-bytes")?;

    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /docs/",
        200,
        json!({
            "actions": {
                "POST": {
                    "title": { "type": "string", "required": true },
                    "attachment": { "type": "file upload", "required": true }
                }
            }
        }),
    );
    transport.respond("POST /docs/", 201, json!({ "id": 1 }));
    let mut engine = engine_with(transport.clone());
    let command = engine.open("/docs/", HttpMethod::Post, OpenFormOptions::default());
    drive(&mut engine, command).await;

    type_text(&mut engine, "title", "Manual").await;
    type_text(&mut engine, "attachment", &file_path.to_string_lossy()).await;
    step(&mut engine, FormMsg::Submit).await;

    let parts = transport
        .requests()
        .iter()
        .find_map(|r| match r {
            Recorded::Multipart { parts, .. } => Some(parts.clone()),
            _ => None,
        })
        .expect("file field must force a multipart submission");
    // the non-file field rides along in the same body
    assert!(parts.iter().any(|p| {
        p.name == "title" && matches!(&p.value, PartValue::Text(t) if t == "Manual")
    }));
    assert!(parts.iter().any(|p| {
        p.name == "attachment"
            && matches!(&p.value, PartValue::File { bytes, .. } if bytes == b"payload-bytes")
    }));
    std::fs::remove_file(&file_path).ok();
    Ok(())
}

#[tokio::test]
async fn server_url_wins_over_caller_redirect() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond(
        "POST /parts/",
        201,
        json!({ "id": 1, "url": "/parts/1/" }),
    );
    let mut engine = engine_with(transport);
    let options = OpenFormOptions {
        policy: SuccessPolicy {
            redirect: Some("/fallback/".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    open_part_form(&mut engine, options).await;

    type_text(&mut engine, "name", "Bolt").await;
    step(&mut engine, FormMsg::Submit).await;

    let mut navigated = None;
    while let Some(event) = engine.poll_event() {
        if let EngineEvent::Navigate(url) = event {
            navigated = Some(url);
        }
    }
    assert_eq!(navigated.as_deref(), Some("/parts/1/"));
    Ok(())
}

#[tokio::test]
async fn errors_on_hidden_fields_land_in_the_banner() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond("POST /parts/", 400, json!({ "qty": ["Out of stock."] }));
    let mut engine = engine_with(transport);
    let options = OpenFormOptions {
        fields: vec![
            ("name".into(), Default::default()),
            ("color".into(), Default::default()),
            (
                "qty".into(),
                restform::form::FieldOverride {
                    hidden: Some(true),
                    value: Some(json!(7)),
                    ..Default::default()
                },
            ),
        ],
        ..Default::default()
    };
    open_part_form(&mut engine, options).await;

    type_text(&mut engine, "name", "Bolt").await;
    step(&mut engine, FormMsg::Submit).await;

    let session = engine.active_form().expect("form stays open on 400");
    // the rejection must be visible even though its field never renders
    assert!(session.field_errors.is_empty());
    assert_eq!(session.non_field_errors, ["qty: Out of stock."]);
    Ok(())
}

#[tokio::test]
async fn confirm_affordance_gates_submission() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    transport.respond("POST /parts/", 201, json!({ "id": 1 }));
    let mut engine = engine_with(transport.clone());
    let options = OpenFormOptions {
        confirm: true,
        ..Default::default()
    };
    open_part_form(&mut engine, options).await;

    step(&mut engine, FormMsg::Submit).await;
    assert_eq!(transport.requests_matching("POST"), 0, "unchecked confirm blocks");

    step(&mut engine, FormMsg::ConfirmToggled).await;
    step(&mut engine, FormMsg::Submit).await;
    assert_eq!(transport.requests_matching("POST"), 1);
    Ok(())
}

#[tokio::test]
async fn bulk_delete_submits_item_ids_without_instance_fetch() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /parts/",
        200,
        json!({ "actions": { "DELETE": {} }, "context": { "model": "part" } }),
    );
    transport.respond("DELETE /parts/", 200, json!({ "deleted": 3 }));
    let mut engine = engine_with(transport.clone());
    let options = OpenFormOptions {
        delete_items: Some(vec![json!(1), json!(2), json!(3)]),
        ..Default::default()
    };
    let command = engine.open("/parts/", HttpMethod::Delete, options);
    drive(&mut engine, command).await;

    assert_eq!(transport.requests_matching("GET"), 0);
    step(&mut engine, FormMsg::Submit).await;

    let body = transport
        .requests()
        .iter()
        .find_map(|r| match r {
            Recorded::Json { body, .. } => Some(body.clone()),
            _ => None,
        })
        .expect("bulk delete sends a JSON body");
    assert_eq!(body["items"], json!([1, 2, 3]));
    Ok(())
}

#[tokio::test]
async fn nested_row_errors_attach_to_matching_rows() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /orders/",
        200,
        json!({
            "actions": {
                "POST": {
                    "customer": { "type": "string", "required": true },
                    "lines": { "type": "raw" }
                }
            }
        }),
    );
    transport.respond(
        "POST /orders/",
        400,
        json!({
            "lines": [
                {},
                { "qty": ["Must be positive."] }
            ]
        }),
    );
    let mut engine = engine_with(transport);
    let options = OpenFormOptions {
        fields: vec![
            ("customer".into(), Default::default()),
            (
                "lines".into(),
                restform::form::FieldOverride {
                    nested: Some(true),
                    ..Default::default()
                },
            ),
        ],
        nested_rows: [("lines".to_string(), vec![json!(10), json!(11)])]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let command = engine.open("/orders/", HttpMethod::Post, options);
    drive(&mut engine, command).await;

    step(&mut engine, FormMsg::Submit).await;

    let session = engine.active_form().expect("form stays open on 400");
    let rows = session
        .row_errors
        .get(&session.path("lines"))
        .expect("row errors recorded");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, 1, "error belongs to the second row");
    assert_eq!(rows[0].1, ["qty: Must be positive."]);
    Ok(())
}
