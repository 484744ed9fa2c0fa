//! FormSession: the live state of one open form.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::client::HttpMethod;
use crate::form::field::{FieldDescriptor, FieldPath};
use crate::form::related::RelatedState;
use crate::ui::widgets::{SelectState, TextInputState};

/// Correlates async completions with the session they were issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Widget state per field kind.
#[derive(Debug, Clone)]
pub enum FieldState {
    Text(TextInputState),
    Checkbox { checked: bool },
    Select(SelectState),
    Related(RelatedState),
    /// Path to the file to upload, edited as text
    File(TextInputState),
    /// Raw passthrough value, rendered read-only
    Raw { value: Option<Value> },
    /// Decorative fields render but hold no value
    Static,
}

/// Invoked with the server response on successful submission.
#[derive(Clone)]
pub struct SuccessCallback(pub Arc<dyn Fn(&Value) + Send + Sync>);

impl SuccessCallback {
    pub fn new(f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for SuccessCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SuccessCallback")
    }
}

/// What happens after a successful submission. Exactly one branch applies,
/// in this order: callback, reload, redirect.
#[derive(Debug, Clone, Default)]
pub struct SuccessPolicy {
    pub on_success: Option<SuccessCallback>,
    pub reload: bool,
    /// Caller-provided fallback; a server-provided `url` in the response
    /// takes precedence over it.
    pub redirect: Option<String>,
}

/// The live instance of one form, from fetch to dismissal.
///
/// A session owns its field-value state exclusively; parent and stacked
/// child sessions communicate only through the install-resolved-entity
/// handoff, never through shared state.
#[derive(Debug, Clone)]
pub struct FormSession {
    pub id: SessionId,
    /// 0 for a top-level form, incremented per stacked secondary form
    pub depth: u8,
    pub resource_url: String,
    pub method: HttpMethod,
    pub title: String,

    pub descriptors: HashMap<FieldPath, FieldDescriptor>,
    /// Field names in display order (hidden fields included; they are
    /// skipped at render time but still submitted)
    pub order: Vec<FieldPath>,
    pub states: HashMap<FieldPath, FieldState>,
    pub permitted: HashSet<HttpMethod>,

    pub collapsed_groups: HashSet<String>,
    pub field_errors: HashMap<FieldPath, Vec<String>>,
    /// Per nested field: (row index, messages) pairs
    pub row_errors: HashMap<FieldPath, Vec<(usize, Vec<String>)>>,
    pub non_field_errors: Vec<String>,
    /// Caller-supplied row identifiers for nested fields, by base name
    pub nested_rows: HashMap<String, Vec<Value>>,

    /// First display index that should be visible (error scrolling)
    pub scroll_index: usize,
    pub submitting: bool,
    pub closed: bool,

    pub confirm_required: bool,
    pub confirmed: bool,

    /// For bulk delete: ids submitted as `{"items": [...]}` without a prior
    /// instance fetch
    pub delete_items: Option<Vec<Value>>,
    /// Query parameters for the instance fetch
    pub instance_query: Vec<(String, String)>,
    pub policy: SuccessPolicy,
}

impl FormSession {
    /// Build a session from merged descriptors in display order.
    pub fn new(
        resource_url: impl Into<String>,
        method: HttpMethod,
        depth: u8,
        descriptors: Vec<FieldDescriptor>,
        seed: impl Fn(&FieldDescriptor) -> FieldState,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        let mut states = HashMap::new();
        for descriptor in descriptors {
            let path = FieldPath::new(descriptor.name.clone(), depth);
            if map.contains_key(&path) {
                bail!(
                    "Duplicate field name '{}' at depth {}",
                    descriptor.name,
                    depth
                );
            }
            states.insert(path.clone(), seed(&descriptor));
            order.push(path.clone());
            map.insert(path, descriptor);
        }
        Ok(Self {
            id: SessionId::new(),
            depth,
            resource_url: resource_url.into(),
            method,
            title: String::new(),
            descriptors: map,
            order,
            states,
            permitted: HashSet::new(),
            collapsed_groups: HashSet::new(),
            field_errors: HashMap::new(),
            row_errors: HashMap::new(),
            non_field_errors: Vec::new(),
            nested_rows: HashMap::new(),
            scroll_index: 0,
            submitting: false,
            closed: false,
            confirm_required: false,
            confirmed: false,
            delete_items: None,
            instance_query: Vec::new(),
            policy: SuccessPolicy::default(),
        })
    }

    pub fn path(&self, base: &str) -> FieldPath {
        FieldPath::new(base, self.depth)
    }

    pub fn descriptor(&self, path: &FieldPath) -> Option<&FieldDescriptor> {
        self.descriptors.get(path)
    }

    pub fn descriptor_mut(&mut self, path: &FieldPath) -> Option<&mut FieldDescriptor> {
        self.descriptors.get_mut(path)
    }

    pub fn state(&self, path: &FieldPath) -> Option<&FieldState> {
        self.states.get(path)
    }

    pub fn state_mut(&mut self, path: &FieldPath) -> Option<&mut FieldState> {
        self.states.get_mut(path)
    }

    /// Displayed fields in order: everything in `order` that is not hidden.
    pub fn displayed(&self) -> impl Iterator<Item = &FieldPath> {
        self.order.iter().filter(|path| {
            self.descriptors
                .get(path)
                .map(|d| !d.hidden)
                .unwrap_or(false)
        })
    }

    /// Record a new value on the descriptor so it round-trips through the
    /// same object for the life of the session, then invoke `on_edit`.
    pub fn set_field_value(
        &mut self,
        path: &FieldPath,
        value: Value,
    ) -> Vec<crate::form::field::FieldEffect> {
        let Some(descriptor) = self.descriptors.get_mut(path) else {
            return Vec::new();
        };
        descriptor.value = Some(value.clone());
        match &descriptor.on_edit {
            Some(callback) => callback.invoke(&value),
            None => Vec::new(),
        }
    }

    pub fn errors_for(&self, path: &FieldPath) -> &[String] {
        self.field_errors
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_errors(&self) -> bool {
        !self.field_errors.is_empty()
            || !self.non_field_errors.is_empty()
            || !self.row_errors.is_empty()
    }

    /// Submit is enabled unless one is in flight or an unchecked confirm
    /// affordance gates it.
    pub fn can_submit(&self) -> bool {
        !self.submitting && !self.closed && (!self.confirm_required || self.confirmed)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn toggle_group(&mut self, group: &str) {
        if !self.collapsed_groups.remove(group) {
            self.collapsed_groups.insert(group.to_string());
        }
    }

    /// Index of a path within the displayed sequence.
    pub fn display_index(&self, path: &FieldPath) -> Option<usize> {
        self.displayed().position(|p| p == path)
    }

    /// Instance data populates descriptor values; fields absent from the
    /// map keep their schema-provided default/value.
    pub fn apply_instance(&mut self, instance: &Map<String, Value>, seed: impl Fn(&FieldDescriptor) -> FieldState) {
        for path in self.order.clone() {
            let Some(descriptor) = self.descriptors.get_mut(&path) else {
                continue;
            };
            if let Some(value) = instance.get(&descriptor.name) {
                if !value.is_null() {
                    descriptor.value = Some(value.clone());
                    let fresh = seed(descriptor);
                    self.states.insert(path, fresh);
                }
            }
        }
    }

    /// Short header when the caller did not supply a title.
    pub fn derive_title(&mut self, model_hint: Option<&str>) {
        if !self.title.is_empty() {
            return;
        }
        let verb = match self.method {
            HttpMethod::Post => "Create",
            HttpMethod::Put | HttpMethod::Patch => "Edit",
            HttpMethod::Delete => "Delete",
            HttpMethod::Get => "View",
        };
        self.title = match model_hint {
            Some(model) => format!("{} {}", verb, model),
            None => verb.to_string(),
        };
    }
}
