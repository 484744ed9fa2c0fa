//! Related-entity resolution: asynchronous search, pagination, eager
//! display of preset values, unambiguous auto-fill and inline creation.

use anyhow::{Result, anyhow, bail};
use log::debug;
use serde_json::{Map, Value};

use crate::client::Transport;
use crate::form::field::FieldDescriptor;
use crate::ui::widgets::AutocompleteState;

/// A resolved selection, kept in fully-rendered form rather than a raw id.
#[derive(Debug, Clone)]
pub struct SelectedEntity {
    pub id: Value,
    pub display: String,
    pub instance: Value,
}

impl SelectedEntity {
    pub fn from_instance(instance: Value, model_name: Option<&str>) -> Result<Self> {
        let id = instance_id(&instance)
            .ok_or_else(|| anyhow!("Related instance has no pk/id field"))?;
        let display = display_name(&instance, model_name);
        Ok(Self {
            id,
            display,
            instance,
        })
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<Value>,
    /// Continuation cursor; presence signals more results are available.
    pub next: Option<String>,
    pub count: Option<u64>,
}

impl SearchPage {
    /// True when the page proves exactly one match exists overall.
    pub fn is_unambiguous_single(&self) -> bool {
        match self.count {
            Some(count) => count == 1,
            None => self.results.len() == 1 && self.next.is_none(),
        }
    }
}

/// Per-field state for a related-entity lookup.
#[derive(Debug, Clone, Default)]
pub struct RelatedState {
    pub selection: Option<SelectedEntity>,
    pub dropdown: AutocompleteState,
    /// Instances backing the dropdown options, same order.
    pub results: Vec<Value>,
    pub next_cursor: Option<String>,
    /// Monotonic counter for last-issued-wins: a search result is applied
    /// only when its generation equals the latest issued one.
    pub generation: u64,
}

impl RelatedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump and return the generation for a newly issued search.
    pub fn issue_search(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Install a completed page if it is still the freshest one.
    pub fn apply_page(
        &mut self,
        generation: u64,
        page: SearchPage,
        model_name: Option<&str>,
    ) -> bool {
        if !self.is_current(generation) {
            debug!(
                "Dropping stale search result (generation {} < {})",
                generation, self.generation
            );
            return false;
        }
        let options: Vec<String> = page
            .results
            .iter()
            .map(|inst| display_name(inst, model_name))
            .collect();
        self.dropdown.set_options(options, page.next.is_some());
        self.results = page.results;
        self.next_cursor = page.next;
        true
    }

    /// Extend the dropdown with a continuation page if it is still the
    /// freshest one.
    pub fn append_page(
        &mut self,
        generation: u64,
        page: SearchPage,
        model_name: Option<&str>,
    ) -> bool {
        if !self.is_current(generation) {
            debug!(
                "Dropping stale continuation page (generation {} < {})",
                generation, self.generation
            );
            return false;
        }
        self.results.extend(page.results);
        self.next_cursor = page.next;
        let options: Vec<String> = self
            .results
            .iter()
            .map(|inst| display_name(inst, model_name))
            .collect();
        self.dropdown.set_options(options, self.next_cursor.is_some());
        true
    }

    /// Commit the dropdown row at `index` as the selection.
    pub fn select_index(&mut self, index: usize, model_name: Option<&str>) -> Option<SelectedEntity> {
        let instance = self.results.get(index)?.clone();
        let selected = SelectedEntity::from_instance(instance, model_name).ok()?;
        self.install(selected.clone());
        Some(selected)
    }

    /// Install an already-resolved entity (preset value, auto-fill, or a
    /// secondary form's creation) exactly as if picked from search.
    pub fn install(&mut self, entity: SelectedEntity) {
        self.dropdown.input_mut().set_value(entity.display.clone());
        self.dropdown.close();
        self.selection = Some(entity);
    }
}

/// Extract an instance's primary key.
pub fn instance_id(instance: &Value) -> Option<Value> {
    instance
        .get("pk")
        .or_else(|| instance.get("id"))
        .cloned()
        .filter(|v| !v.is_null())
}

/// Human-readable rendering of an instance for dropdown rows.
pub fn display_name(instance: &Value, model_name: Option<&str>) -> String {
    for key in ["display_name", "name", "title", "username", "label"] {
        if let Some(text) = instance.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    let id = instance_id(instance).unwrap_or(Value::Null);
    match model_name {
        Some(model) => format!("{} {}", model, id),
        None => id.to_string(),
    }
}

/// Parse a paginated (or bare list) search response body.
pub fn parse_search_page(body: &Value) -> Result<SearchPage> {
    if let Some(results) = body.as_array() {
        return Ok(SearchPage {
            results: results.clone(),
            next: None,
            count: Some(results.len() as u64),
        });
    }
    let object = body
        .as_object()
        .ok_or_else(|| anyhow!("Search response is neither a list nor an object"))?;
    let results = object
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let next = object
        .get("next")
        .and_then(Value::as_str)
        .map(str::to_string);
    let count = object.get("count").and_then(Value::as_u64);
    Ok(SearchPage {
        results,
        next,
        count,
    })
}

fn search_query(
    descriptor: &FieldDescriptor,
    term: &str,
    limit: usize,
    cursor: Option<&str>,
) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = Vec::new();
    for (key, value) in descriptor.adjusted_filters() {
        let rendered = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        query.push((key, rendered));
    }
    if !term.is_empty() {
        query.push(("search".into(), term.into()));
    }
    query.push(("limit".into(), limit.to_string()));
    if let Some(cursor) = cursor {
        query.push(("cursor".into(), cursor.into()));
    }
    query
}

fn related_url(descriptor: &FieldDescriptor) -> Result<&str> {
    let url = descriptor
        .related
        .as_ref()
        .map(|r| r.resource_url.as_str())
        .unwrap_or_default();
    if url.is_empty() {
        bail!(
            "Related field '{}' has no resource URL in its schema",
            descriptor.name
        );
    }
    Ok(url)
}

/// Run one page of search against the field's resource.
pub async fn search(
    transport: &dyn Transport,
    descriptor: &FieldDescriptor,
    term: &str,
    page_size: usize,
    cursor: Option<&str>,
) -> Result<SearchPage> {
    let url = related_url(descriptor)?;
    let query = search_query(descriptor, term, page_size, cursor);
    let response = transport.get(url, &query).await?;
    if !response.is_success() {
        bail!(
            "Related search on {} failed with status {}",
            url,
            response.status
        );
    }
    parse_search_page(&response.body)
}

/// Eagerly fetch a single entity by id so a preset selection can be shown
/// fully rendered.
pub async fn fetch_by_id(
    transport: &dyn Transport,
    descriptor: &FieldDescriptor,
    id: &Value,
) -> Result<SelectedEntity> {
    let base = related_url(descriptor)?;
    let id_text = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let url = format!(
        "{}{}/",
        if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        },
        urlencoding::encode(&id_text)
    );
    let response = transport.get(&url, &[]).await?;
    if !response.is_success() {
        bail!(
            "Fetching related instance {} failed with status {}",
            url,
            response.status
        );
    }
    SelectedEntity::from_instance(
        response.body,
        descriptor
            .related
            .as_ref()
            .and_then(|r| r.model_name.as_deref()),
    )
}

/// Narrowed query for auto-fill: same filters, limited to one result.
///
/// Returns the entity only when exactly one match exists; two or more leave
/// the field untouched.
pub async fn auto_fill_candidate(
    transport: &dyn Transport,
    descriptor: &FieldDescriptor,
) -> Result<Option<SelectedEntity>> {
    let page = search(transport, descriptor, "", 1, None).await?;
    if !page.is_unambiguous_single() {
        debug!(
            "Auto-fill for '{}' skipped: {} candidate(s)",
            descriptor.name,
            page.count.unwrap_or(page.results.len() as u64)
        );
        return Ok(None);
    }
    let instance = page
        .results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Search page claimed one result but was empty"))?;
    let entity = SelectedEntity::from_instance(
        instance,
        descriptor
            .related
            .as_ref()
            .and_then(|r| r.model_name.as_deref()),
    )?;
    Ok(Some(entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stale_generation_is_dropped() {
        let mut state = RelatedState::new();
        let gen_a = state.issue_search();
        let gen_b = state.issue_search();
        let page_b = SearchPage {
            results: vec![json!({"pk": 2, "name": "fresh"})],
            next: None,
            count: Some(1),
        };
        assert!(state.apply_page(gen_b, page_b, None));
        let page_a = SearchPage {
            results: vec![json!({"pk": 1, "name": "stale"})],
            next: None,
            count: Some(1),
        };
        assert!(!state.apply_page(gen_a, page_a, None));
        assert_eq!(state.results[0]["name"], "fresh");
    }

    #[test]
    fn single_result_with_cursor_is_ambiguous() {
        let page = SearchPage {
            results: vec![json!({"pk": 1})],
            next: Some("cursor".into()),
            count: None,
        };
        assert!(!page.is_unambiguous_single());
    }

    #[test]
    fn count_field_decides_when_present() {
        let page = SearchPage {
            results: vec![json!({"pk": 1})],
            next: None,
            count: Some(4),
        };
        assert!(!page.is_unambiguous_single());
    }

    #[test]
    fn display_name_prefers_named_keys() {
        let inst = json!({"pk": 7, "name": "Widget"});
        assert_eq!(display_name(&inst, None), "Widget");
        let bare = json!({"pk": 7});
        assert_eq!(display_name(&bare, Some("part")), "part 7");
    }
}
