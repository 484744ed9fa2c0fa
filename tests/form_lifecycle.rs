mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use common::{MockTransport, drive, part_schema};
use restform::client::HttpMethod;
use restform::config::EngineConfig;
use restform::form::{EngineEvent, FieldPath, FormEngine, FormSession, NotifyLevel, OpenFormOptions};

fn engine_with(transport: Arc<MockTransport>) -> FormEngine {
    FormEngine::new(transport, EngineConfig::default())
}

fn field_value(session: &FormSession, name: &str) -> Option<serde_json::Value> {
    session
        .descriptor(&session.path(name))
        .and_then(|d| d.effective_value().cloned())
}

#[tokio::test]
async fn create_form_renders_schema_fields_in_order() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    let mut engine = engine_with(transport.clone());

    let command = engine.open("/parts/", HttpMethod::Post, OpenFormOptions::default());
    drive(&mut engine, command).await;

    let session = engine.active_form().expect("form should be interactive");
    let names: Vec<String> = session.order.iter().map(|p| p.base.clone()).collect();
    assert_eq!(names, vec!["name", "color", "qty"]);
    assert_eq!(session.title, "Create part");
    // POST never fetches instance data
    assert_eq!(transport.requests_matching("GET"), 0);
    Ok(())
}

#[tokio::test]
async fn prohibited_method_never_fetches_or_renders() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    // schema only permits POST
    transport.respond("OPTIONS /parts/7/", 200, part_schema());
    let mut engine = engine_with(transport.clone());

    let command = engine.open("/parts/7/", HttpMethod::Delete, OpenFormOptions::default());
    drive(&mut engine, command).await;

    assert!(engine.active_form().is_none());
    assert_eq!(transport.requests_matching("GET"), 0);
    let mut saw_warning = false;
    while let Some(event) = engine.poll_event() {
        if let EngineEvent::Notify { level, .. } = event {
            saw_warning = level == NotifyLevel::Warning;
        }
    }
    assert!(saw_warning, "prohibition should notify the caller");
    Ok(())
}

#[tokio::test]
async fn change_form_seeds_fields_from_instance() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /parts/7/",
        200,
        json!({
            "actions": {
                "PATCH": {
                    "name": { "type": "string", "required": true },
                    "qty": { "type": "integer" }
                }
            },
            "context": { "model": "part" }
        }),
    );
    transport.respond(
        "GET /parts/7/",
        200,
        json!({ "id": 7, "name": "M4 Bolt", "qty": 80 }),
    );
    let mut engine = engine_with(transport);

    let command = engine.open("/parts/7/", HttpMethod::Patch, OpenFormOptions::default());
    drive(&mut engine, command).await;

    let session = engine.active_form().expect("form should be interactive");
    assert_eq!(session.title, "Edit part");
    assert_eq!(field_value(session, "name"), Some(json!("M4 Bolt")));
    assert_eq!(field_value(session, "qty"), Some(json!(80)));
    Ok(())
}

#[tokio::test]
async fn failed_instance_fetch_shows_no_partial_form() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /parts/7/",
        200,
        json!({
            "actions": { "PATCH": { "name": { "type": "string" } } }
        }),
    );
    transport.respond("GET /parts/7/", 500, json!({ "detail": "boom" }));
    let mut engine = engine_with(transport);

    let command = engine.open("/parts/7/", HttpMethod::Patch, OpenFormOptions::default());
    drive(&mut engine, command).await;

    assert!(engine.active_form().is_none());
    assert!(!engine.is_open());
    Ok(())
}

#[tokio::test]
async fn client_field_order_wins_when_overrides_given() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    let mut engine = engine_with(transport);

    let options = OpenFormOptions {
        fields: vec![
            ("qty".into(), Default::default()),
            ("name".into(), Default::default()),
            ("color".into(), Default::default()),
        ],
        ..Default::default()
    };
    let command = engine.open("/parts/", HttpMethod::Post, options);
    drive(&mut engine, command).await;

    let session = engine.active_form().expect("form should be interactive");
    let names: Vec<String> = session.order.iter().map(|p| p.base.clone()).collect();
    assert_eq!(names, vec!["qty", "name", "color"]);
    Ok(())
}

#[tokio::test]
async fn unknown_field_kind_aborts_the_form() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        "OPTIONS /parts/",
        200,
        json!({
            "actions": { "POST": { "weird": { "type": "hologram" } } }
        }),
    );
    let mut engine = engine_with(transport);

    let command = engine.open("/parts/", HttpMethod::Post, OpenFormOptions::default());
    drive(&mut engine, command).await;

    assert!(engine.active_form().is_none());
    Ok(())
}

#[tokio::test]
async fn hidden_fields_are_skipped_in_display_but_kept_in_order() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /parts/", 200, part_schema());
    let mut engine = engine_with(transport);

    let options = OpenFormOptions {
        fields: vec![
            (
                "name".into(),
                restform::form::FieldOverride {
                    hidden: Some(true),
                    value: Some(json!("preset")),
                    ..Default::default()
                },
            ),
            ("color".into(), Default::default()),
            ("qty".into(), Default::default()),
        ],
        ..Default::default()
    };
    let command = engine.open("/parts/", HttpMethod::Post, options);
    drive(&mut engine, command).await;

    let session = engine.active_form().expect("form should be interactive");
    let displayed: Vec<&FieldPath> = session.displayed().collect();
    assert_eq!(displayed.len(), 2);
    assert_eq!(session.order.len(), 3);
    Ok(())
}
