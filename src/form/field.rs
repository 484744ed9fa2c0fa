//! Field descriptors: the engine's in-memory representation of one form
//! field, merged from server schema and client overrides.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::client::HttpMethod;
use crate::schema::{ChoiceMeta, FieldMeta};

pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
pub static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());

/// Closed union of renderable field kinds.
///
/// An unrecognized wire tag is a hard configuration error, never a silently
/// dropped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Boolean,
    String,
    Url,
    Email,
    Integer,
    Float,
    Decimal,
    Date,
    DateTime,
    Choice,
    RelatedEntity,
    File,
    Decorative,
    Raw,
}

impl FieldKind {
    pub fn parse(tag: &str) -> Result<Self> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => FieldKind::Boolean,
            "string" | "char" | "text" => FieldKind::String,
            "url" => FieldKind::Url,
            "email" => FieldKind::Email,
            "integer" | "int" => FieldKind::Integer,
            "float" => FieldKind::Float,
            "decimal" => FieldKind::Decimal,
            "date" => FieldKind::Date,
            "datetime" | "date-time" => FieldKind::DateTime,
            "choice" => FieldKind::Choice,
            "related field" | "related" | "related_entity" => FieldKind::RelatedEntity,
            "file upload" | "file" | "image upload" => FieldKind::File,
            "decorative" | "candy" => FieldKind::Decorative,
            "raw" => FieldKind::Raw,
            other => bail!("Unrecognized field kind '{}'", other),
        };
        Ok(kind)
    }

    pub fn is_decorative(&self) -> bool {
        matches!(self, FieldKind::Decorative)
    }
}

/// Structured field key: base name plus stacking depth.
///
/// Lookup and equality are defined on the pair, so a parent form and a
/// stacked secondary form can both carry a `name` field without collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub base: String,
    pub depth: u8,
}

impl FieldPath {
    pub fn new(base: impl Into<String>, depth: u8) -> Self {
        Self {
            base: base.into(),
            depth,
        }
    }

    pub fn top(base: impl Into<String>) -> Self {
        Self::new(base, 0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth == 0 {
            f.write_str(&self.base)
        } else {
            write!(f, "{}__{}", self.base, self.depth)
        }
    }
}

/// Declarative change to another field, returned by field callbacks.
///
/// Callbacks never mutate the session directly; they describe what should
/// change and the controller applies it.
#[derive(Debug, Clone)]
pub enum FieldEffect {
    SetValue { target: String, value: Value },
    ClearValue { target: String },
    SetHidden { target: String, hidden: bool },
    SetRequired { target: String, required: bool },
    SetFilters { target: String, filters: Map<String, Value> },
}

/// Callback invoked with a field's new value or selected instance.
#[derive(Clone)]
pub struct FieldCallback(pub Arc<dyn Fn(&Value) -> Vec<FieldEffect> + Send + Sync>);

impl FieldCallback {
    pub fn new(f: impl Fn(&Value) -> Vec<FieldEffect> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, value: &Value) -> Vec<FieldEffect> {
        (self.0)(value)
    }
}

impl fmt::Debug for FieldCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCallback")
    }
}

/// Hook transforming a related-entity field's search filters.
#[derive(Clone)]
pub struct FilterHook(pub Arc<dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync>);

impl FilterHook {
    pub fn new(
        f: impl Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, filters: Map<String, Value>) -> Map<String, Value> {
        (self.0)(filters)
    }
}

impl fmt::Debug for FilterHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterHook")
    }
}

/// Field set for a secondary (stacked) form.
#[derive(Clone)]
pub enum SubFormFields {
    Fixed(Vec<(String, FieldOverride)>),
    /// Produced lazily at open time (e.g. seeded from the parent's state)
    Deferred(Arc<dyn Fn() -> Vec<(String, FieldOverride)> + Send + Sync>),
}

impl SubFormFields {
    pub fn resolve(&self) -> Vec<(String, FieldOverride)> {
        match self {
            SubFormFields::Fixed(fields) => fields.clone(),
            SubFormFields::Deferred(producer) => producer(),
        }
    }
}

impl fmt::Debug for SubFormFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubFormFields::Fixed(fields) => write!(f, "SubFormFields::Fixed({})", fields.len()),
            SubFormFields::Deferred(_) => f.write_str("SubFormFields::Deferred"),
        }
    }
}

/// Deferred definition of a form used to create a related entity inline.
///
/// On success the parent related field is populated with the created
/// instance and only the inner form closes.
#[derive(Debug, Clone)]
pub struct SubFormSpec {
    pub url: String,
    pub method: HttpMethod,
    pub title: Option<String>,
    pub fields: SubFormFields,
}

/// Related-entity attributes of a field.
#[derive(Debug, Clone, Default)]
pub struct RelatedConfig {
    pub resource_url: String,
    pub model_name: Option<String>,
    pub filters: Map<String, Value>,
    pub auto_fill: bool,
    pub secondary_create: Option<SubFormSpec>,
}

/// Client-supplied per-field overrides.
///
/// Display attributes only: `required` and `read_only` truth always comes
/// from the schema.
#[derive(Debug, Clone, Default)]
pub struct FieldOverride {
    pub label: Option<String>,
    pub help_text: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<Value>,
    pub hidden: Option<bool>,
    pub group: Option<String>,
    pub filters: Option<Map<String, Value>>,
    pub auto_fill: Option<bool>,
    pub secondary_create: Option<SubFormSpec>,
    /// Marks a list-shaped child relationship for nested error mapping
    pub nested: Option<bool>,
    pub on_edit: Option<FieldCallback>,
    pub on_select: Option<FieldCallback>,
    pub adjust_filters: Option<FilterHook>,
}

/// Fully merged description of one form field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub read_only: bool,
    pub hidden: bool,
    pub label: Option<String>,
    pub help_text: Option<String>,
    pub placeholder: Option<String>,
    /// Explicit value (instance data or client override); wins over `default`
    pub value: Option<Value>,
    /// Server-declared default
    pub default: Option<Value>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub choices: Vec<ChoiceMeta>,
    pub related: Option<RelatedConfig>,
    pub group: Option<String>,
    pub nested: bool,
    pub on_edit: Option<FieldCallback>,
    pub on_select: Option<FieldCallback>,
    pub adjust_filters: Option<FilterHook>,
}

impl FieldDescriptor {
    /// Build a descriptor from server metadata alone.
    pub fn from_meta(name: &str, meta: &FieldMeta) -> Result<Self> {
        let kind = FieldKind::parse(&meta.field_type)?;
        let related = if kind == FieldKind::RelatedEntity {
            Some(RelatedConfig {
                resource_url: meta.api_url.clone().unwrap_or_default(),
                model_name: meta.model.clone(),
                filters: meta.filters.clone(),
                auto_fill: false,
                secondary_create: None,
            })
        } else {
            None
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            required: meta.required,
            read_only: meta.read_only,
            hidden: false,
            label: meta.label.clone(),
            help_text: meta.help_text.clone(),
            placeholder: None,
            value: None,
            default: meta.default.clone(),
            min_value: meta.min_value,
            max_value: meta.max_value,
            min_length: meta.min_length,
            max_length: meta.max_length,
            choices: meta.choices.clone(),
            related,
            group: None,
            nested: false,
            on_edit: None,
            on_select: None,
            adjust_filters: None,
        })
    }

    /// Apply client overrides. Display attributes win; permission truth
    /// (`required`, `read_only`) stays with the schema.
    pub fn apply_override(&mut self, over: &FieldOverride) {
        if over.label.is_some() {
            self.label = over.label.clone();
        }
        if over.help_text.is_some() {
            self.help_text = over.help_text.clone();
        }
        if over.placeholder.is_some() {
            self.placeholder = over.placeholder.clone();
        }
        if over.value.is_some() {
            self.value = over.value.clone();
        }
        if let Some(hidden) = over.hidden {
            self.hidden = hidden;
        }
        if over.group.is_some() {
            self.group = over.group.clone();
        }
        if let Some(nested) = over.nested {
            self.nested = nested;
        }
        if let Some(related) = self.related.as_mut() {
            if let Some(filters) = &over.filters {
                related.filters = filters.clone();
            }
            if let Some(auto_fill) = over.auto_fill {
                related.auto_fill = auto_fill;
            }
            if over.secondary_create.is_some() {
                related.secondary_create = over.secondary_create.clone();
            }
        }
        if over.on_edit.is_some() {
            self.on_edit = over.on_edit.clone();
        }
        if over.on_select.is_some() {
            self.on_select = over.on_select.clone();
        }
        if over.adjust_filters.is_some() {
            self.adjust_filters = over.adjust_filters.clone();
        }
    }

    /// Effective initial value: explicit value, else server default.
    pub fn effective_value(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Search filters after the adjust hook, if any.
    pub fn adjusted_filters(&self) -> Map<String, Value> {
        let base = self
            .related
            .as_ref()
            .map(|r| r.filters.clone())
            .unwrap_or_default();
        match &self.adjust_filters {
            Some(hook) => hook.apply(base),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(field_type: &str) -> FieldMeta {
        FieldMeta {
            field_type: field_type.to_string(),
            required: true,
            read_only: false,
            label: Some("Server label".into()),
            default: Some(json!("fallback")),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_kind_is_a_hard_error() {
        assert!(FieldDescriptor::from_meta("x", &meta("hologram")).is_err());
    }

    #[test]
    fn override_wins_for_display_but_not_required() {
        let mut descriptor = FieldDescriptor::from_meta("name", &meta("string")).unwrap();
        let over = FieldOverride {
            label: Some("Client label".into()),
            value: Some(json!("preset")),
            ..Default::default()
        };
        descriptor.apply_override(&over);
        assert_eq!(descriptor.display_label(), "Client label");
        assert_eq!(descriptor.effective_value(), Some(&json!("preset")));
        assert!(descriptor.required, "schema required truth must survive");
    }

    #[test]
    fn default_used_when_no_explicit_value() {
        let descriptor = FieldDescriptor::from_meta("name", &meta("string")).unwrap();
        assert_eq!(descriptor.effective_value(), Some(&json!("fallback")));
    }

    #[test]
    fn field_path_encodes_depth() {
        assert_eq!(FieldPath::top("part").to_string(), "part");
        assert_eq!(FieldPath::new("part", 2).to_string(), "part__2");
        assert_ne!(FieldPath::top("part"), FieldPath::new("part", 1));
    }
}
