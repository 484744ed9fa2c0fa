//! FormController: the top-level orchestrator sequencing fetch → render →
//! interact → submit, and owner of the secondary-form stack.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossterm::event::KeyCode;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::client::{HttpMethod, Transport};
use crate::config::EngineConfig;
use crate::form::errors;
use crate::form::field::{
    FieldDescriptor, FieldEffect, FieldKind, FieldOverride, FieldPath, SubFormSpec,
};
use crate::form::message::{FormMsg, SubmitOutcome};
use crate::form::registry::{self, seed_state};
use crate::form::related::{self, SelectedEntity};
use crate::form::render::{SUBMIT_BUTTON, render_session};
use crate::form::session::{FormSession, SessionId, SuccessPolicy};
use crate::form::submit::{self, Payload};
use crate::schema::{self, SchemaResponse};
use crate::ui::element::{Element, FocusId, Layer};
use crate::ui::theme::Theme;
use crate::ui::Command;

/// Everything a caller can configure when opening a form.
#[derive(Debug, Clone, Default)]
pub struct OpenFormOptions {
    /// Per-field display overrides; when non-empty its order becomes the
    /// display order
    pub fields: Vec<(String, FieldOverride)>,
    /// Explicit values merged over schema defaults (like instance data)
    pub data: Map<String, Value>,
    /// Groups that start collapsed
    pub collapsed_groups: Vec<String>,
    pub title: Option<String>,
    /// Require an explicit confirmation checkbox before submit
    pub confirm: bool,
    pub policy: SuccessPolicy,
    /// Row identifiers for nested fields, used when mapping row-shaped
    /// validation errors
    pub nested_rows: HashMap<String, Vec<Value>>,
    /// Bulk delete: ids submitted as `{"items": [...]}`, no instance fetch
    pub delete_items: Option<Vec<Value>>,
    /// Query parameters for the instance fetch (change/delete flows)
    pub instance_query: Vec<(String, String)>,
}

/// Lifecycle phase of one stacked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormPhase {
    FetchingSchema,
    FetchingInstance,
    Interactive,
    Submitting,
}

struct FormSlot {
    id: SessionId,
    phase: FormPhase,
    resource_url: String,
    method: HttpMethod,
    options: OpenFormOptions,
    session: Option<FormSession>,
    /// For secondary forms: the parent field to install the created
    /// entity into
    parent_field: Option<FieldPath>,
}

/// Outward notifications the embedding application consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Top-level form dismissed
    Closed { success: bool },
    /// Successful submission asked for a page reload
    Reload,
    /// Successful submission asked for navigation
    Navigate(String),
    Notify { level: NotifyLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// The form engine: a stack of sessions (top is interactive, the rest are
/// frozen), an event queue for the embedding app, and the transport.
pub struct FormEngine {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    stack: Vec<FormSlot>,
    events: VecDeque<EngineEvent>,
}

impl FormEngine {
    pub fn new(transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            stack: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Number of stacked forms, including ones still fetching.
    pub fn form_count(&self) -> usize {
        self.stack.len()
    }

    /// The interactive (topmost) form, once built.
    pub fn active_form(&self) -> Option<&FormSession> {
        self.top_session()
    }

    /// A form anywhere in the stack, by depth (0 is the root form).
    pub fn form_at(&self, depth: usize) -> Option<&FormSession> {
        self.stack.get(depth).and_then(|slot| slot.session.as_ref())
    }

    /// Drain the next outward event, if any.
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Open a form for `(resource_url, method)`. Transitions Idle →
    /// FetchingSchema; everything else follows from messages.
    pub fn open(
        &mut self,
        resource_url: impl Into<String>,
        method: HttpMethod,
        options: OpenFormOptions,
    ) -> Command<FormMsg> {
        let resource_url = resource_url.into();
        let slot = FormSlot {
            id: SessionId::new(),
            phase: FormPhase::FetchingSchema,
            resource_url: resource_url.clone(),
            method,
            options,
            session: None,
            parent_field: None,
        };
        let id = slot.id;
        self.stack.push(slot);
        let transport = self.transport.clone();
        Command::perform(
            async move { schema::fetch_schema(transport.as_ref(), &resource_url).await },
            move |result| FormMsg::SchemaFetched {
                session: id,
                result: result.map_err(|e| e.to_string()),
            },
        )
    }

    fn slot_index(&self, id: SessionId) -> Option<usize> {
        self.stack.iter().position(|slot| slot.id == id)
    }

    fn top_session_mut(&mut self) -> Option<&mut FormSession> {
        self.stack.last_mut().and_then(|slot| slot.session.as_mut())
    }

    fn top_session(&self) -> Option<&FormSession> {
        self.stack.last().and_then(|slot| slot.session.as_ref())
    }

    /// Remove a slot and everything stacked above it. Closing a parent
    /// cascades to its children; their pending completions become no-ops.
    fn remove_cascading(&mut self, index: usize) {
        for slot in self.stack.drain(index..) {
            if let Some(mut session) = slot.session {
                session.close();
            }
        }
    }

    fn notify(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.events.push_back(EngineEvent::Notify {
            level,
            message: message.into(),
        });
    }

    /// Single reducer for every message.
    pub fn update(&mut self, msg: FormMsg) -> Command<FormMsg> {
        match msg {
            FormMsg::SchemaFetched { session, result } => self.on_schema(session, result),
            FormMsg::InstanceFetched { session, result } => self.on_instance(session, result),
            FormMsg::FieldKey { path, key } => self.on_field_key(&path, key),
            FormMsg::CheckboxToggled { path } => self.on_checkbox(&path),
            FormMsg::SelectKey { path, key } => self.on_select_key(&path, key),
            FormMsg::RelatedInputKey { path, key } => self.on_related_input(&path, key),
            FormMsg::RelatedNavKey { path, key } => self.on_related_nav(&path, key),
            FormMsg::SearchCompleted {
                session,
                path,
                generation,
                append,
                result,
            } => self.on_search_completed(session, &path, generation, append, result),
            FormMsg::PresetResolved {
                session,
                path,
                result,
            } => self.on_preset_resolved(session, &path, result),
            FormMsg::AutoFillResolved {
                session,
                path,
                result,
            } => self.on_auto_fill_resolved(session, &path, result),
            FormMsg::CreatedResolved {
                session,
                path,
                result,
            } => self.on_created_resolved(session, &path, result),
            FormMsg::OpenSecondary { path } => self.on_open_secondary(&path),
            FormMsg::GroupToggled { group } => {
                if let Some(session) = self.top_session_mut() {
                    session.toggle_group(&group);
                }
                Command::None
            }
            FormMsg::ConfirmToggled => {
                if let Some(session) = self.top_session_mut() {
                    session.confirmed = !session.confirmed;
                }
                Command::None
            }
            FormMsg::Submit => self.on_submit(),
            FormMsg::SubmitFinished { session, outcome } => self.on_submit_finished(session, outcome),
            FormMsg::Cancel => self.on_cancel(),
        }
    }

    // ---- schema / instance -------------------------------------------------

    fn on_schema(
        &mut self,
        id: SessionId,
        result: Result<SchemaResponse, String>,
    ) -> Command<FormMsg> {
        let Some(index) = self.slot_index(id) else {
            return Command::None;
        };
        let schema = match result {
            Ok(schema) => schema,
            Err(message) => {
                self.remove_cascading(index);
                self.notify(NotifyLevel::Error, format!("Form unavailable: {}", message));
                self.emit_closed_if_empty(false);
                return Command::None;
            }
        };

        let method = self.stack[index].method;
        // Sole source of permission truth: a method absent from the action
        // map is prohibited, with no instance fetch and no render.
        if !schema.permits(method) {
            self.remove_cascading(index);
            self.notify(
                NotifyLevel::Warning,
                format!("Action prohibited: {} is not permitted here", method),
            );
            self.emit_closed_if_empty(false);
            return Command::None;
        }

        match self.build_session(index, &schema) {
            Ok(()) => {}
            Err(message) => {
                self.remove_cascading(index);
                self.notify(NotifyLevel::Error, message);
                self.emit_closed_if_empty(false);
                return Command::None;
            }
        }

        let slot = &mut self.stack[index];
        let wants_instance =
            slot.method.fetches_instance() && slot.options.delete_items.is_none();
        if wants_instance {
            slot.phase = FormPhase::FetchingInstance;
            let id = slot.id;
            let url = slot.resource_url.clone();
            let query = slot.options.instance_query.clone();
            let transport = self.transport.clone();
            Command::perform(
                async move { schema::fetch_instance(transport.as_ref(), &url, &query).await },
                move |result| FormMsg::InstanceFetched {
                    session: id,
                    result: result.map_err(|e| e.to_string()),
                },
            )
        } else {
            self.finalize_slot(index)
        }
    }

    fn on_instance(
        &mut self,
        id: SessionId,
        result: Result<Map<String, Value>, String>,
    ) -> Command<FormMsg> {
        let Some(index) = self.slot_index(id) else {
            return Command::None;
        };
        match result {
            Ok(instance) => {
                if let Some(session) = self.stack[index].session.as_mut() {
                    session.apply_instance(&instance, seed_state);
                }
                self.finalize_slot(index)
            }
            Err(message) => {
                // no partial form on a failed instance fetch
                self.remove_cascading(index);
                self.notify(NotifyLevel::Error, format!("Form unavailable: {}", message));
                self.emit_closed_if_empty(false);
                Command::None
            }
        }
    }

    /// Merge schema fields with client overrides into a session.
    fn build_session(&mut self, index: usize, schema: &SchemaResponse) -> Result<(), String> {
        let slot = &mut self.stack[index];
        let server_fields = schema.fields_for(slot.method).unwrap_or_default();
        let overrides: HashMap<&str, &FieldOverride> = slot
            .options
            .fields
            .iter()
            .map(|(name, over)| (name.as_str(), over))
            .collect();

        // client-supplied order wins when given, schema order otherwise
        let ordered_names: Vec<String> = if slot.options.fields.is_empty() {
            server_fields.iter().map(|(name, _)| name.clone()).collect()
        } else {
            slot.options
                .fields
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| {
                    let known = server_fields.iter().any(|(n, _)| n == name);
                    if !known {
                        debug!("Ignoring override for unknown field '{}'", name);
                    }
                    known
                })
                .collect()
        };

        let mut descriptors = Vec::with_capacity(ordered_names.len());
        for name in &ordered_names {
            let Some((_, meta)) = server_fields.iter().find(|(n, _)| n == name) else {
                continue;
            };
            let mut descriptor = FieldDescriptor::from_meta(name, meta)
                .map_err(|e| format!("Form misconfigured: {}", e))?;
            if let Some(over) = overrides.get(name.as_str()) {
                descriptor.apply_override(over);
            }
            if let Some(value) = slot.options.data.get(name) {
                // explicit data wins over override values and defaults
                descriptor.value = Some(value.clone());
            }
            descriptors.push(descriptor);
        }

        // single-instance delete shows the fields it is about to remove,
        // never editable inputs
        if slot.method == HttpMethod::Delete && slot.options.delete_items.is_none() {
            for descriptor in &mut descriptors {
                descriptor.read_only = true;
            }
        }

        let depth = index as u8;
        let mut session = FormSession::new(
            slot.resource_url.clone(),
            slot.method,
            depth,
            descriptors,
            seed_state,
        )
        .map_err(|e| format!("Form misconfigured: {}", e))?;
        session.id = slot.id;
        session.permitted = schema.actions.keys().copied().collect();
        session.confirm_required = slot.options.confirm;
        session.policy = slot.options.policy.clone();
        session.nested_rows = slot.options.nested_rows.clone();
        session.delete_items = slot.options.delete_items.clone();
        session.instance_query = slot.options.instance_query.clone();
        for group in &slot.options.collapsed_groups {
            session.collapsed_groups.insert(group.clone());
        }
        if let Some(title) = &slot.options.title {
            session.title = title.clone();
        }
        let model_hint = schema
            .context
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string);
        session.derive_title(model_hint.as_deref());
        slot.session = Some(session);
        Ok(())
    }

    /// Rendering → Interactive: kick off related-field initialization and
    /// focus the first editable field.
    fn finalize_slot(&mut self, index: usize) -> Command<FormMsg> {
        self.stack[index].phase = FormPhase::Interactive;
        let id = self.stack[index].id;
        let Some(session) = self.stack[index].session.as_ref() else {
            return Command::None;
        };

        let mut commands = Vec::new();
        for path in session.order.clone() {
            let Some(descriptor) = session.descriptor(&path) else {
                continue;
            };
            if descriptor.kind != FieldKind::RelatedEntity {
                continue;
            }
            let descriptor = descriptor.clone();
            let transport = self.transport.clone();
            if let Some(value) = descriptor.effective_value().cloned() {
                // show the preset selection fully rendered, not as a raw id
                let path = path.clone();
                commands.push(Command::perform(
                    async move {
                        related::fetch_by_id(transport.as_ref(), &descriptor, &value).await
                    },
                    move |result| FormMsg::PresetResolved {
                        session: id,
                        path,
                        result: result.map_err(|e| e.to_string()),
                    },
                ));
            } else if descriptor.related.as_ref().is_some_and(|r| r.auto_fill) {
                let path = path.clone();
                commands.push(Command::perform(
                    async move {
                        related::auto_fill_candidate(transport.as_ref(), &descriptor).await
                    },
                    move |result| FormMsg::AutoFillResolved {
                        session: id,
                        path,
                        result: result.map_err(|e| e.to_string()),
                    },
                ));
            }
        }

        if let Some(focus) = first_focus(session) {
            commands.push(Command::set_focus(focus));
        }
        Command::batch(commands)
    }

    // ---- field interaction -------------------------------------------------

    fn apply_effects(&mut self, id: SessionId, effects: Vec<FieldEffect>) {
        let Some(session) = self.session_mut_by_id(id) else {
            return;
        };
        for effect in effects {
            match effect {
                FieldEffect::SetValue { target, value } => {
                    let path = session.path(&target);
                    if let Some(descriptor) = session.descriptor_mut(&path) {
                        descriptor.value = Some(value);
                        let fresh = seed_state(descriptor);
                        session.states.insert(path, fresh);
                    }
                }
                FieldEffect::ClearValue { target } => {
                    let path = session.path(&target);
                    if let Some(descriptor) = session.descriptor_mut(&path) {
                        descriptor.value = None;
                        let fresh = seed_state(descriptor);
                        session.states.insert(path, fresh);
                    }
                }
                FieldEffect::SetHidden { target, hidden } => {
                    let path = session.path(&target);
                    if let Some(descriptor) = session.descriptor_mut(&path) {
                        descriptor.hidden = hidden;
                    }
                }
                FieldEffect::SetRequired { target, required } => {
                    let path = session.path(&target);
                    if let Some(descriptor) = session.descriptor_mut(&path) {
                        descriptor.required = required;
                    }
                }
                FieldEffect::SetFilters { target, filters } => {
                    let path = session.path(&target);
                    if let Some(descriptor) = session.descriptor_mut(&path) {
                        if let Some(related) = descriptor.related.as_mut() {
                            related.filters = filters;
                        }
                    }
                }
            }
        }
    }

    fn on_field_key(&mut self, path: &FieldPath, key: KeyCode) -> Command<FormMsg> {
        let Some(session) = self.top_session_mut() else {
            return Command::None;
        };
        let id = session.id;
        let max_length = session.descriptor(path).and_then(|d| d.max_length);
        let changed = match session.state_mut(path) {
            Some(crate::form::session::FieldState::Text(input))
            | Some(crate::form::session::FieldState::File(input)) => {
                input.handle_key(key, max_length).then(|| input.value().to_string())
            }
            _ => None,
        };
        if let Some(text) = changed {
            let effects = session.set_field_value(path, Value::String(text));
            self.apply_effects(id, effects);
        }
        Command::None
    }

    fn on_checkbox(&mut self, path: &FieldPath) -> Command<FormMsg> {
        let Some(session) = self.top_session_mut() else {
            return Command::None;
        };
        let id = session.id;
        let toggled = match session.state_mut(path) {
            Some(crate::form::session::FieldState::Checkbox { checked }) => {
                *checked = !*checked;
                Some(*checked)
            }
            _ => None,
        };
        if let Some(checked) = toggled {
            let effects = session.set_field_value(path, Value::Bool(checked));
            self.apply_effects(id, effects);
        }
        Command::None
    }

    fn on_select_key(&mut self, path: &FieldPath, key: KeyCode) -> Command<FormMsg> {
        let Some(session) = self.top_session_mut() else {
            return Command::None;
        };
        let id = session.id;
        let choice_count = session.descriptor(path).map(|d| d.choices.len()).unwrap_or(0);
        let committed = match session.state_mut(path) {
            Some(crate::form::session::FieldState::Select(select)) => {
                select.update_option_count(choice_count);
                select.handle_key(key)
            }
            _ => None,
        };
        if let Some(index) = committed {
            let value = session
                .descriptor(path)
                .and_then(|d| d.choices.get(index))
                .map(|c| c.value.clone())
                .unwrap_or(Value::Null);
            let effects = session.set_field_value(path, value);
            self.apply_effects(id, effects);
        }
        Command::None
    }

    fn on_related_input(&mut self, path: &FieldPath, key: KeyCode) -> Command<FormMsg> {
        let (id, descriptor, term, generation) = {
            let Some(session) = self.top_session_mut() else {
                return Command::None;
            };
            let id = session.id;
            let Some(crate::form::session::FieldState::Related(state)) = session.state_mut(path)
            else {
                return Command::None;
            };
            if !state.dropdown.handle_input_key(key) {
                return Command::None;
            }
            // editing the search term invalidates any current selection
            state.selection = None;
            let generation = state.issue_search();
            let term = state.dropdown.input().value().to_string();
            let Some(descriptor) = session.descriptor(path) else {
                return Command::None;
            };
            (id, descriptor.clone(), term, generation)
        };

        let transport = self.transport.clone();
        let page_size = self.config.page_size;
        let path = path.clone();
        Command::perform(
            async move {
                related::search(transport.as_ref(), &descriptor, &term, page_size, None).await
            },
            move |result| FormMsg::SearchCompleted {
                session: id,
                path,
                generation,
                append: false,
                result: result.map_err(|e| e.to_string()),
            },
        )
    }

    /// Fetch the page the continuation cursor points at and extend the
    /// dropdown with it.
    fn on_related_load_more(&mut self, path: &FieldPath) -> Command<FormMsg> {
        let (id, descriptor, term, generation, cursor) = {
            let Some(session) = self.top_session_mut() else {
                return Command::None;
            };
            let id = session.id;
            let Some(crate::form::session::FieldState::Related(state)) = session.state_mut(path)
            else {
                return Command::None;
            };
            let Some(cursor) = state.next_cursor.clone() else {
                return Command::None;
            };
            let generation = state.issue_search();
            let term = state.dropdown.input().value().to_string();
            let Some(descriptor) = session.descriptor(path) else {
                return Command::None;
            };
            (id, descriptor.clone(), term, generation, cursor)
        };

        let transport = self.transport.clone();
        let page_size = self.config.page_size;
        let path = path.clone();
        Command::perform(
            async move {
                related::search(
                    transport.as_ref(),
                    &descriptor,
                    &term,
                    page_size,
                    Some(&cursor),
                )
                .await
            },
            move |result| FormMsg::SearchCompleted {
                session: id,
                path,
                generation,
                append: true,
                result: result.map_err(|e| e.to_string()),
            },
        )
    }

    fn on_related_nav(&mut self, path: &FieldPath, key: KeyCode) -> Command<FormMsg> {
        if key == KeyCode::PageDown {
            return self.on_related_load_more(path);
        }
        let Some(session) = self.top_session_mut() else {
            return Command::None;
        };
        let id = session.id;
        let model_name = session
            .descriptor(path)
            .and_then(|d| d.related.as_ref())
            .and_then(|r| r.model_name.clone());
        let selected = match session.state_mut(path) {
            Some(crate::form::session::FieldState::Related(state)) => state
                .dropdown
                .handle_navigate_key(key)
                .and_then(|index| state.select_index(index, model_name.as_deref())),
            _ => None,
        };
        if let Some(entity) = selected {
            self.commit_selection(id, path, entity);
        }
        Command::None
    }

    /// Record a selected entity: value round-trips through the descriptor,
    /// then `on_select` lets the choice drive other fields.
    fn commit_selection(&mut self, id: SessionId, path: &FieldPath, entity: SelectedEntity) {
        let Some(session) = self.session_mut_by_id(id) else {
            return;
        };
        let mut effects = session.set_field_value(path, entity.id.clone());
        if let Some(callback) = session
            .descriptor(path)
            .and_then(|d| d.on_select.clone())
        {
            effects.extend(callback.invoke(&entity.instance));
        }
        self.apply_effects(id, effects);
    }

    // ---- related async completions ----------------------------------------

    fn session_mut_by_id(&mut self, id: SessionId) -> Option<&mut FormSession> {
        self.stack
            .iter_mut()
            .find(|slot| slot.id == id)
            .and_then(|slot| slot.session.as_mut())
    }

    fn on_search_completed(
        &mut self,
        id: SessionId,
        path: &FieldPath,
        generation: u64,
        append: bool,
        result: Result<crate::form::related::SearchPage, String>,
    ) -> Command<FormMsg> {
        let Some(session) = self.session_mut_by_id(id) else {
            return Command::None; // closed; late responses are no-ops
        };
        let model_name = session
            .descriptor(path)
            .and_then(|d| d.related.as_ref())
            .and_then(|r| r.model_name.clone());
        if let Some(crate::form::session::FieldState::Related(state)) = session.state_mut(path) {
            match result {
                // only the freshest issued search may apply
                Ok(page) if append => {
                    state.append_page(generation, page, model_name.as_deref());
                }
                Ok(page) => {
                    state.apply_page(generation, page, model_name.as_deref());
                }
                Err(message) => warn!("Related search failed: {}", message),
            }
        }
        Command::None
    }

    fn on_preset_resolved(
        &mut self,
        id: SessionId,
        path: &FieldPath,
        result: Result<SelectedEntity, String>,
    ) -> Command<FormMsg> {
        let Some(session) = self.session_mut_by_id(id) else {
            return Command::None;
        };
        match result {
            Ok(entity) => {
                if let Some(crate::form::session::FieldState::Related(state)) =
                    session.state_mut(path)
                {
                    state.install(entity);
                }
            }
            // the raw id is still submitted from the descriptor value
            Err(message) => debug!("Preset resolution for '{}' failed: {}", path, message),
        }
        Command::None
    }

    fn on_auto_fill_resolved(
        &mut self,
        id: SessionId,
        path: &FieldPath,
        result: Result<Option<SelectedEntity>, String>,
    ) -> Command<FormMsg> {
        {
            let Some(session) = self.session_mut_by_id(id) else {
                return Command::None;
            };
            let entity = match result {
                Ok(Some(entity)) => entity,
                Ok(None) => return Command::None,
                Err(message) => {
                    warn!("Auto-fill for '{}' failed: {}", path, message);
                    return Command::None;
                }
            };
            if let Some(crate::form::session::FieldState::Related(state)) = session.state_mut(path)
            {
                state.install(entity.clone());
            }
            // silent pre-selection still fires on_edit so dependent fields
            // can populate without user action
            let effects = session.set_field_value(path, entity.id.clone());
            self.apply_effects(id, effects);
        }
        Command::None
    }

    fn on_created_resolved(
        &mut self,
        id: SessionId,
        path: &FieldPath,
        result: Result<SelectedEntity, String>,
    ) -> Command<FormMsg> {
        let Some(session) = self.session_mut_by_id(id) else {
            return Command::None;
        };
        match result {
            Ok(entity) => {
                if let Some(crate::form::session::FieldState::Related(state)) =
                    session.state_mut(path)
                {
                    state.install(entity.clone());
                }
                // exactly as if picked from search results
                self.commit_selection(id, path, entity);
            }
            Err(message) => {
                warn!("Resolving created entity failed: {}", message);
                self.notify(
                    NotifyLevel::Warning,
                    "Created entry could not be loaded into the field",
                );
            }
        }
        Command::None
    }

    // ---- secondary forms ---------------------------------------------------

    fn on_open_secondary(&mut self, path: &FieldPath) -> Command<FormMsg> {
        let spec: SubFormSpec = {
            let Some(session) = self.top_session() else {
                return Command::None;
            };
            let Some(spec) = session
                .descriptor(path)
                .and_then(|d| d.related.as_ref())
                .and_then(|r| r.secondary_create.clone())
            else {
                return Command::None;
            };
            spec
        };

        let options = OpenFormOptions {
            fields: spec.fields.resolve(),
            title: spec.title.clone(),
            ..Default::default()
        };
        let slot = FormSlot {
            id: SessionId::new(),
            phase: FormPhase::FetchingSchema,
            resource_url: spec.url.clone(),
            method: spec.method,
            options,
            session: None,
            parent_field: Some(path.clone()),
        };
        let id = slot.id;
        // parent keyboard interaction freezes simply by no longer being the
        // top of the stack
        self.stack.push(slot);
        let transport = self.transport.clone();
        let url = spec.url;
        Command::perform(
            async move { schema::fetch_schema(transport.as_ref(), &url).await },
            move |result| FormMsg::SchemaFetched {
                session: id,
                result: result.map_err(|e| e.to_string()),
            },
        )
    }

    // ---- submission --------------------------------------------------------

    fn on_submit(&mut self) -> Command<FormMsg> {
        let Some(slot) = self.stack.last_mut() else {
            return Command::None;
        };
        let Some(session) = slot.session.as_mut() else {
            return Command::None;
        };
        if !session.can_submit() {
            return Command::None;
        }

        errors::clear(session);

        // local numeric checks: identical display to a 400, no round-trip
        let failures = submit::client_validate(session);
        if !failures.is_empty() {
            let payload = errors::synthesize(&failures);
            errors::apply(&payload, session);
            return Command::None;
        }

        let payload = if let Some(items) = &session.delete_items {
            Payload::Json(serde_json::json!({ "items": items }))
        } else {
            match submit::build_payload(session) {
                Ok(payload) => payload,
                Err(e) => {
                    session.non_field_errors.push(e.to_string());
                    return Command::None;
                }
            }
        };

        // disable further submits immediately: at most one in flight
        session.submitting = true;
        slot.phase = FormPhase::Submitting;
        let id = slot.id;
        let method = slot.method;
        let url = slot.resource_url.clone();
        let transport = self.transport.clone();
        Command::perform(
            async move { submit::perform(transport.as_ref(), method, &url, payload).await },
            move |outcome| FormMsg::SubmitFinished {
                session: id,
                outcome,
            },
        )
    }

    fn on_submit_finished(&mut self, id: SessionId, outcome: SubmitOutcome) -> Command<FormMsg> {
        let Some(index) = self.slot_index(id) else {
            return Command::None;
        };
        {
            let slot = &mut self.stack[index];
            slot.phase = FormPhase::Interactive;
            if let Some(session) = slot.session.as_mut() {
                session.submitting = false;
            }
        }

        match outcome {
            SubmitOutcome::Validation(payload) => {
                // recoverable: annotate fields, stay open, submit re-enabled
                if let Some(session) = self.stack[index].session.as_mut() {
                    errors::clear(session);
                    errors::apply(&payload, session);
                }
                Command::None
            }
            SubmitOutcome::Transport(message) => {
                // not recoverable by the form
                self.remove_cascading(index);
                self.notify(NotifyLevel::Error, message);
                self.emit_closed_if_empty(false);
                Command::None
            }
            SubmitOutcome::Success(response) => self.on_submit_success(index, response),
        }
    }

    fn on_submit_success(&mut self, index: usize, response: Value) -> Command<FormMsg> {
        let parent_field = self.stack[index].parent_field.clone();

        if let Some(parent_path) = parent_field {
            // secondary form: install the created entity into the parent
            // field, then close only the inner form
            let created_id = related::instance_id(&response);
            self.remove_cascading(index);

            let Some(parent_slot) = self.stack.last() else {
                return Command::None;
            };
            let parent_id = parent_slot.id;
            let Some(descriptor) = parent_slot
                .session
                .as_ref()
                .and_then(|s| s.descriptor(&parent_path))
                .cloned()
            else {
                return Command::None;
            };
            let Some(created_id) = created_id else {
                warn!("Secondary creation response carries no id");
                return Command::None;
            };
            let transport = self.transport.clone();
            return Command::perform(
                async move {
                    related::fetch_by_id(transport.as_ref(), &descriptor, &created_id).await
                },
                move |result| FormMsg::CreatedResolved {
                    session: parent_id,
                    path: parent_path,
                    result: result.map_err(|e| e.to_string()),
                },
            );
        }

        // top-level success: exactly one of callback, reload, redirect
        let policy = self.stack[index]
            .session
            .as_ref()
            .map(|s| s.policy.clone())
            .unwrap_or_default();
        self.remove_cascading(index);
        if let Some(callback) = policy.on_success {
            (callback.0)(&response);
        } else if policy.reload {
            self.events.push_back(EngineEvent::Reload);
        } else {
            let server_url = response
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(url) = server_url.or(policy.redirect) {
                self.events.push_back(EngineEvent::Navigate(url));
            }
        }
        self.events.push_back(EngineEvent::Closed { success: true });
        Command::None
    }

    fn on_cancel(&mut self) -> Command<FormMsg> {
        let Some(index) = self.stack.len().checked_sub(1) else {
            return Command::None;
        };
        self.remove_cascading(index);
        self.emit_closed_if_empty(false);
        Command::None
    }

    fn emit_closed_if_empty(&mut self, success: bool) {
        if self.stack.is_empty() {
            self.events.push_back(EngineEvent::Closed { success });
        }
    }

    // ---- view --------------------------------------------------------------

    /// Render the whole stack; only the top layer is focusable and lower
    /// layers are dimmed.
    pub fn view(&self, theme: &Theme) -> Element<FormMsg> {
        let mut layers = Vec::new();
        for (i, slot) in self.stack.iter().enumerate() {
            let element = match (&slot.session, slot.phase) {
                (Some(session), _) => render_session(session, theme),
                (None, FormPhase::FetchingInstance) => Element::styled_text(
                    "Loading data…".to_string(),
                    ratatui::style::Style::default().fg(theme.muted),
                ),
                (None, _) => Element::styled_text(
                    "Loading form…".to_string(),
                    ratatui::style::Style::default().fg(theme.muted),
                ),
            };
            let mut layer = Layer::new(element);
            if i > 0 {
                layer = layer.center().dim(true);
            }
            layers.push(layer);
        }
        Element::Stack { layers }
    }
}

/// First editable field in display order, else the submit button.
pub fn first_focus(session: &FormSession) -> Option<FocusId> {
    session
        .displayed()
        .find(|path| {
            session
                .descriptor(path)
                .map(|d| {
                    !d.read_only
                        && !matches!(d.kind, FieldKind::Decorative | FieldKind::Raw)
                })
                .unwrap_or(false)
        })
        .map(registry::focus_id)
        .or_else(|| Some(FocusId::new(SUBMIT_BUTTON)))
}
