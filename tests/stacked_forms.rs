mod common;

use std::sync::Arc;

use anyhow::Result;
use crossterm::event::KeyCode;
use serde_json::json;

use common::{MockTransport, drive, step};
use restform::client::HttpMethod;
use restform::config::EngineConfig;
use restform::form::session::FieldState;
use restform::form::{
    FieldOverride, FieldPath, FormEngine, FormMsg, OpenFormOptions, SubFormFields, SubFormSpec,
};
use restform::ui::Command;

fn engine_with(transport: Arc<MockTransport>) -> FormEngine {
    FormEngine::new(transport, EngineConfig::default())
}

fn order_schema() -> serde_json::Value {
    json!({
        "actions": {
            "POST": {
                "vendor": {
                    "type": "related field",
                    "required": true,
                    "model": "vendor",
                    "api_url": "/vendors/"
                }
            }
        },
        "context": { "model": "order" }
    })
}

fn vendor_schema() -> serde_json::Value {
    json!({
        "actions": {
            "POST": { "name": { "type": "string", "required": true } }
        },
        "context": { "model": "vendor" }
    })
}

fn creatable_vendor_options() -> OpenFormOptions {
    OpenFormOptions {
        fields: vec![(
            "vendor".into(),
            FieldOverride {
                secondary_create: Some(SubFormSpec {
                    url: "/vendors/".into(),
                    method: HttpMethod::Post,
                    title: Some("New vendor".into()),
                    fields: SubFormFields::Fixed(vec![("name".into(), Default::default())]),
                }),
                ..Default::default()
            },
        )],
        ..Default::default()
    }
}

async fn type_into(engine: &mut FormEngine, path: FieldPath, text: &str) {
    for c in text.chars() {
        step(
            engine,
            FormMsg::FieldKey {
                path: path.clone(),
                key: KeyCode::Char(c),
            },
        )
        .await;
    }
}

#[tokio::test]
async fn secondary_form_stacks_above_its_parent() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /orders/", 200, order_schema());
    transport.respond("OPTIONS /vendors/", 200, vendor_schema());
    let mut engine = engine_with(transport);

    let command = engine.open("/orders/", HttpMethod::Post, creatable_vendor_options());
    drive(&mut engine, command).await;
    assert_eq!(engine.form_count(), 1);

    step(
        &mut engine,
        FormMsg::OpenSecondary {
            path: FieldPath::top("vendor"),
        },
    )
    .await;

    assert_eq!(engine.form_count(), 2);
    let child = engine.active_form().expect("child form interactive");
    assert_eq!(child.depth, 1);
    assert_eq!(child.title, "New vendor");
    // same base name at a different depth never collides
    assert!(child.descriptor(&FieldPath::new("name", 1)).is_some());
    Ok(())
}

#[tokio::test]
async fn created_entity_installs_into_the_parent_field() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /orders/", 200, order_schema());
    transport.respond("OPTIONS /vendors/", 200, vendor_schema());
    transport.respond("POST /vendors/", 201, json!({ "pk": 41, "name": "Initech" }));
    transport.respond("GET /vendors/41/", 200, json!({ "pk": 41, "name": "Initech" }));
    let mut engine = engine_with(transport);

    let command = engine.open("/orders/", HttpMethod::Post, creatable_vendor_options());
    drive(&mut engine, command).await;
    step(
        &mut engine,
        FormMsg::OpenSecondary {
            path: FieldPath::top("vendor"),
        },
    )
    .await;

    type_into(&mut engine, FieldPath::new("name", 1), "Initech").await;
    step(&mut engine, FormMsg::Submit).await;

    // only the inner form closed
    assert_eq!(engine.form_count(), 1);
    let parent = engine.active_form().expect("parent form interactive again");
    match parent.state(&parent.path("vendor")) {
        Some(FieldState::Related(state)) => {
            assert_eq!(
                state.selection.as_ref().map(|s| s.display.as_str()),
                Some("Initech")
            );
            assert_eq!(state.selection.as_ref().map(|s| s.id.clone()), Some(json!(41)));
        }
        other => panic!("expected related state, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn cancelling_the_child_leaves_the_parent_open() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /orders/", 200, order_schema());
    transport.respond("OPTIONS /vendors/", 200, vendor_schema());
    let mut engine = engine_with(transport);

    let command = engine.open("/orders/", HttpMethod::Post, creatable_vendor_options());
    drive(&mut engine, command).await;
    step(
        &mut engine,
        FormMsg::OpenSecondary {
            path: FieldPath::top("vendor"),
        },
    )
    .await;
    assert_eq!(engine.form_count(), 2);

    step(&mut engine, FormMsg::Cancel).await;
    assert_eq!(engine.form_count(), 1);
    assert!(engine.active_form().is_some());

    step(&mut engine, FormMsg::Cancel).await;
    assert!(!engine.is_open());
    Ok(())
}

#[tokio::test]
async fn late_completion_after_close_is_a_no_op() -> Result<()> {
    let transport = Arc::new(MockTransport::new());
    transport.respond("OPTIONS /orders/", 200, order_schema());
    transport.respond(
        "GET /vendors/?search=a&limit=25",
        200,
        json!([{ "pk": 1, "name": "Acme" }]),
    );
    let mut engine = engine_with(transport);

    let command = engine.open("/orders/", HttpMethod::Post, OpenFormOptions::default());
    drive(&mut engine, command).await;

    // a search goes out, then the form closes before it lands
    let pending = engine.update(FormMsg::RelatedInputKey {
        path: FieldPath::top("vendor"),
        key: KeyCode::Char('a'),
    });
    step(&mut engine, FormMsg::Cancel).await;
    assert!(!engine.is_open());

    for leaf in pending.into_leaves() {
        if let Command::Perform(future) = leaf {
            let msg = future.await;
            engine.update(msg);
        }
    }
    assert!(!engine.is_open());
    assert!(engine.active_form().is_none());
    Ok(())
}
