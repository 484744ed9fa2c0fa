//! Capability introspection: fetching and parsing the schema a resource
//! endpoint advertises, plus instance retrieval for change/delete flows.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{HttpMethod, Transport};

/// One choice entry for a choice field, server order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMeta {
    pub value: Value,
    pub display_name: String,
}

/// Server-declared metadata for a single field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub choices: Vec<ChoiceMeta>,
    /// Related-entity attributes
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// Parsed introspection response.
///
/// Absence of a method key in `actions` means the method is not permitted;
/// this is the sole source of permission truth.
#[derive(Debug, Clone, Default)]
pub struct SchemaResponse {
    /// Per permitted method, the server's fields in declaration order.
    pub actions: HashMap<HttpMethod, Vec<(String, FieldMeta)>>,
    pub context: Map<String, Value>,
}

impl SchemaResponse {
    pub fn permits(&self, method: HttpMethod) -> bool {
        self.actions.contains_key(&method)
    }

    pub fn fields_for(&self, method: HttpMethod) -> Option<&[(String, FieldMeta)]> {
        self.actions.get(&method).map(Vec::as_slice)
    }
}

fn parse_method(key: &str) -> Option<HttpMethod> {
    match key.to_ascii_uppercase().as_str() {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "PATCH" => Some(HttpMethod::Patch),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}

/// Parse the body of an introspection response.
pub fn parse_schema(body: &Value) -> Result<SchemaResponse> {
    let root = body
        .as_object()
        .ok_or_else(|| anyhow!("Schema response is not a JSON object"))?;

    let mut actions = HashMap::new();
    if let Some(action_map) = root.get("actions").and_then(Value::as_object) {
        for (method_key, fields_value) in action_map {
            let Some(method) = parse_method(method_key) else {
                debug!("Ignoring unknown action method '{}'", method_key);
                continue;
            };
            let field_map = fields_value.as_object().ok_or_else(|| {
                anyhow!("Fields for action {} are not a JSON object", method_key)
            })?;
            let mut fields = Vec::with_capacity(field_map.len());
            for (name, meta_value) in field_map {
                let meta: FieldMeta = serde_json::from_value(meta_value.clone())
                    .with_context(|| format!("Invalid field metadata for '{}'", name))?;
                fields.push((name.clone(), meta));
            }
            actions.insert(method, fields);
        }
    }

    let context = root
        .get("context")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(SchemaResponse { actions, context })
}

/// Issue the capability-introspection request against `resource_url`.
pub async fn fetch_schema(transport: &dyn Transport, resource_url: &str) -> Result<SchemaResponse> {
    let response = transport.options(resource_url).await?;
    if !response.is_success() {
        bail!(
            "Schema request for {} failed with status {}",
            resource_url,
            response.status
        );
    }
    let schema = parse_schema(&response.body)?;
    debug!(
        "Schema for {}: {} permitted action(s)",
        resource_url,
        schema.actions.len()
    );
    Ok(schema)
}

/// Retrieve current instance data for change/delete forms.
///
/// Any failure aborts form construction; no partial form is shown.
pub async fn fetch_instance(
    transport: &dyn Transport,
    resource_url: &str,
    query: &[(String, String)],
) -> Result<Map<String, Value>> {
    let response = transport.get(resource_url, query).await?;
    if !response.is_success() {
        bail!(
            "Instance request for {} failed with status {}",
            resource_url,
            response.status
        );
    }
    response
        .body
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow!("Instance response for {} is not a JSON object", resource_url))
}
