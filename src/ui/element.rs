use crossterm::event::KeyCode;
use ratatui::style::Style;
use ratatui::text::Line;

/// Stable identifier for focusable UI elements.
///
/// Owned string rather than a static: form fields are named by runtime
/// schema data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FocusId(pub String);

impl FocusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Layout constraints for sizing elements within containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutConstraint {
    Length(u16),
    Min(u16),
    Fill(u16),
}

/// Alignment for layered elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Center,
    TopLeft,
}

/// A layer in a stack of UI elements (stacked modal forms)
pub struct Layer<Msg> {
    pub element: Element<Msg>,
    pub alignment: Alignment,
    pub dim_below: bool,
}

impl<Msg> Layer<Msg> {
    pub fn new(element: Element<Msg>) -> Self {
        Self {
            element,
            alignment: Alignment::TopLeft,
            dim_below: false,
        }
    }

    pub fn center(mut self) -> Self {
        self.alignment = Alignment::Center;
        self
    }

    pub fn dim(mut self, should_dim: bool) -> Self {
        self.dim_below = should_dim;
        self
    }
}

/// Key callback stored inside an element.
pub type KeyHandler<Msg> = Box<dyn Fn(KeyCode) -> Msg + Send>;

/// Declarative view tree produced by `view()` and drawn by `ui::render`.
pub enum Element<Msg> {
    None,

    Text {
        content: String,
        style: Option<Style>,
    },

    /// Pre-styled line (spans with mixed styles)
    Styled {
        line: Line<'static>,
    },

    Column {
        items: Vec<(Element<Msg>, LayoutConstraint)>,
        spacing: u16,
    },

    Row {
        items: Vec<(Element<Msg>, LayoutConstraint)>,
        spacing: u16,
    },

    /// Bordered, optionally collapsible panel (field groups)
    Panel {
        id: Option<FocusId>,
        title: Option<String>,
        collapsed: bool,
        on_toggle: Option<Msg>,
        child: Box<Element<Msg>>,
    },

    TextInput {
        id: FocusId,
        value: String,
        cursor_pos: usize,
        placeholder: Option<String>,
        on_key: KeyHandler<Msg>,
    },

    Checkbox {
        id: FocusId,
        checked: bool,
        label: String,
        /// Rendered inline next to the box (checkboxes have no natural
        /// space below for hint text)
        inline_help: Option<String>,
        on_toggle: Msg,
    },

    Select {
        id: FocusId,
        options: Vec<String>,
        selected: Option<usize>,
        is_open: bool,
        highlight: usize,
        placeholder: Option<String>,
        on_key: KeyHandler<Msg>,
    },

    Autocomplete {
        id: FocusId,
        value: String,
        cursor_pos: usize,
        options: Vec<String>,
        is_open: bool,
        highlight: usize,
        has_more: bool,
        placeholder: Option<String>,
        on_input: KeyHandler<Msg>,
        on_navigate: KeyHandler<Msg>,
        /// "add new" affordance for inline secondary creation
        on_create: Option<Msg>,
    },

    Button {
        id: FocusId,
        label: String,
        enabled: bool,
        on_press: Option<Msg>,
    },

    /// Stacked layers, later entries on top
    Stack {
        layers: Vec<Layer<Msg>>,
    },
}

impl<Msg> Element<Msg> {
    pub fn text(content: impl Into<String>) -> Self {
        Element::Text {
            content: content.into(),
            style: None,
        }
    }

    pub fn styled_text(content: impl Into<String>, style: Style) -> Self {
        Element::Text {
            content: content.into(),
            style: Some(style),
        }
    }

    pub fn line(line: Line<'static>) -> Self {
        Element::Styled { line }
    }

    pub fn column() -> ColumnBuilder<Msg> {
        ColumnBuilder::new()
    }

    pub fn row() -> RowBuilder<Msg> {
        RowBuilder::new()
    }
}

impl<Msg: Clone> Element<Msg> {
    /// Collect focusable ids in display order (Tab navigation).
    ///
    /// Only the topmost layer of a stack contributes: lower layers are
    /// frozen while a secondary form is open.
    pub fn collect_focusable(&self, out: &mut Vec<FocusId>) {
        match self {
            Element::Column { items, .. } | Element::Row { items, .. } => {
                for (item, _) in items {
                    item.collect_focusable(out);
                }
            }
            Element::Panel {
                id,
                collapsed,
                child,
                ..
            } => {
                if let Some(id) = id {
                    out.push(id.clone());
                }
                if !collapsed {
                    child.collect_focusable(out);
                }
            }
            Element::TextInput { id, .. }
            | Element::Checkbox { id, .. }
            | Element::Select { id, .. }
            | Element::Autocomplete { id, .. } => out.push(id.clone()),
            Element::Button { id, enabled, .. } => {
                if *enabled {
                    out.push(id.clone());
                }
            }
            Element::Stack { layers } => {
                if let Some(top) = layers.last() {
                    top.element.collect_focusable(out);
                }
            }
            _ => {}
        }
    }

    /// Route a key press to the focused element, producing its message.
    pub fn route_key(&self, focused: &FocusId, key: KeyCode) -> Option<Msg> {
        match self {
            Element::Column { items, .. } | Element::Row { items, .. } => items
                .iter()
                .find_map(|(item, _)| item.route_key(focused, key)),
            Element::Panel {
                id,
                collapsed,
                on_toggle,
                child,
                ..
            } => {
                if id.as_ref() == Some(focused) {
                    return match key {
                        KeyCode::Enter | KeyCode::Char(' ') => on_toggle.clone(),
                        _ => None,
                    };
                }
                if *collapsed {
                    None
                } else {
                    child.route_key(focused, key)
                }
            }
            // Esc is left for the surrounding loop (cancel)
            Element::TextInput { id, on_key, .. } => {
                (id == focused && !matches!(key, KeyCode::Esc)).then(|| on_key(key))
            }
            Element::Checkbox { id, on_toggle, .. } => {
                if id == focused && matches!(key, KeyCode::Enter | KeyCode::Char(' ')) {
                    Some(on_toggle.clone())
                } else {
                    None
                }
            }
            Element::Select { id, on_key, .. } => (id == focused).then(|| on_key(key)),
            Element::Autocomplete {
                id,
                is_open,
                on_input,
                on_navigate,
                on_create,
                ..
            } => {
                if id != focused {
                    return None;
                }
                // Insert rather than a printable key, so every character
                // stays typeable as a search term
                if matches!(key, KeyCode::Insert) {
                    if let Some(msg) = on_create {
                        return Some(msg.clone());
                    }
                }
                if *is_open
                    && matches!(
                        key,
                        KeyCode::Up
                            | KeyCode::Down
                            | KeyCode::PageDown
                            | KeyCode::Enter
                            | KeyCode::Esc
                    )
                {
                    Some(on_navigate(key))
                } else {
                    Some(on_input(key))
                }
            }
            Element::Button {
                id,
                enabled,
                on_press,
                ..
            } => {
                if id == focused && *enabled && matches!(key, KeyCode::Enter | KeyCode::Char(' ')) {
                    on_press.clone()
                } else {
                    None
                }
            }
            Element::Stack { layers } => layers
                .last()
                .and_then(|top| top.element.route_key(focused, key)),
            _ => None,
        }
    }
}

/// Builder for vertical layouts
pub struct ColumnBuilder<Msg> {
    items: Vec<(Element<Msg>, LayoutConstraint)>,
    spacing: u16,
}

impl<Msg> ColumnBuilder<Msg> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            spacing: 0,
        }
    }

    pub fn add(mut self, element: Element<Msg>, constraint: LayoutConstraint) -> Self {
        self.items.push((element, constraint));
        self
    }

    pub fn spacing(mut self, spacing: u16) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn build(self) -> Element<Msg> {
        Element::Column {
            items: self.items,
            spacing: self.spacing,
        }
    }
}

impl<Msg> Default for ColumnBuilder<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for horizontal layouts
pub struct RowBuilder<Msg> {
    items: Vec<(Element<Msg>, LayoutConstraint)>,
    spacing: u16,
}

impl<Msg> RowBuilder<Msg> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            spacing: 1,
        }
    }

    pub fn add(mut self, element: Element<Msg>, constraint: LayoutConstraint) -> Self {
        self.items.push((element, constraint));
        self
    }

    pub fn spacing(mut self, spacing: u16) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn build(self) -> Element<Msg> {
        Element::Row {
            items: self.items,
            spacing: self.spacing,
        }
    }
}

impl<Msg> Default for RowBuilder<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Input(KeyCode),
        Navigate(KeyCode),
        Create,
    }

    fn autocomplete(is_open: bool) -> Element<Msg> {
        Element::Autocomplete {
            id: FocusId::new("field:vendor"),
            value: String::new(),
            cursor_pos: 0,
            options: vec![],
            is_open,
            highlight: 0,
            has_more: false,
            placeholder: None,
            on_input: Box::new(Msg::Input),
            on_navigate: Box::new(Msg::Navigate),
            on_create: Some(Msg::Create),
        }
    }

    #[test]
    fn insert_opens_the_create_affordance() {
        let element = autocomplete(false);
        let msg = element.route_key(&FocusId::new("field:vendor"), KeyCode::Insert);
        assert_eq!(msg, Some(Msg::Create));
    }

    #[test]
    fn plus_types_into_the_search_term() {
        let element = autocomplete(false);
        let msg = element.route_key(&FocusId::new("field:vendor"), KeyCode::Char('+'));
        assert_eq!(msg, Some(Msg::Input(KeyCode::Char('+'))));
    }

    #[test]
    fn page_down_reaches_navigation_when_the_dropdown_is_open() {
        let element = autocomplete(true);
        let msg = element.route_key(&FocusId::new("field:vendor"), KeyCode::PageDown);
        assert_eq!(msg, Some(Msg::Navigate(KeyCode::PageDown)));
    }
}
