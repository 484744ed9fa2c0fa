//! FieldRegistry: the pure mapping from field kind to render, value
//! extraction and client-side validation.
//!
//! Every kind in the union has all of these defined; an unrecognized kind
//! never reaches this module (it is rejected while parsing the schema).

use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use serde_json::Value;

use crate::form::field::{EMAIL_RE, FieldDescriptor, FieldKind, FieldPath, URL_RE};
use crate::form::message::FormMsg;
use crate::form::related::RelatedState;
use crate::form::session::FieldState;
use crate::ui::element::{Element, FocusId, LayoutConstraint};
use crate::ui::theme::Theme;
use crate::ui::widgets::{SelectState, TextInputState};

pub fn focus_id(path: &FieldPath) -> FocusId {
    FocusId::new(format!("field:{}", path))
}

/// Render a value the way it appears inside a text input.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Initial widget state for a descriptor, seeded from its effective value.
pub fn seed_state(descriptor: &FieldDescriptor) -> FieldState {
    let value = descriptor.effective_value();
    match descriptor.kind {
        FieldKind::Boolean => FieldState::Checkbox {
            checked: value
                .map(|v| match v {
                    Value::Bool(b) => *b,
                    Value::String(s) => s.eq_ignore_ascii_case("true"),
                    _ => false,
                })
                .unwrap_or(false),
        },
        FieldKind::Choice => {
            let mut state = SelectState::new();
            if let Some(value) = value {
                if let Some(index) = descriptor.choices.iter().position(|c| &c.value == value) {
                    state = SelectState::with_selected(index);
                }
            }
            FieldState::Select(state)
        }
        FieldKind::RelatedEntity => FieldState::Related(RelatedState::new()),
        FieldKind::File => FieldState::File(
            value
                .map(|v| TextInputState::with_value(value_to_text(v)))
                .unwrap_or_default(),
        ),
        FieldKind::Decorative => FieldState::Static,
        FieldKind::Raw => FieldState::Raw {
            value: value.cloned(),
        },
        // all remaining scalar kinds edit as text
        _ => FieldState::Text(
            value
                .map(|v| TextInputState::with_value(value_to_text(v)))
                .unwrap_or_default(),
        ),
    }
}

/// Number of terminal rows a field occupies when rendered.
pub fn field_height(descriptor: &FieldDescriptor) -> u16 {
    if descriptor.hidden {
        return 0;
    }
    match descriptor.kind {
        FieldKind::Boolean => 1,
        FieldKind::Decorative | FieldKind::Raw => 1,
        _ if descriptor.read_only => 2,
        _ => {
            // label + bordered input + optional help line
            let help = if descriptor.help_text.is_some() { 1 } else { 0 };
            4 + help
        }
    }
}

fn label_line(descriptor: &FieldDescriptor, theme: &Theme) -> Element<FormMsg> {
    let mut spans = vec![Span::styled(
        descriptor.display_label().to_string(),
        Style::default().fg(theme.text).bold(),
    )];
    if descriptor.required {
        spans.push(Span::styled(" *", Style::default().fg(theme.error)));
    }
    if descriptor.read_only {
        spans.push(Span::styled(
            "  (read only)",
            Style::default().fg(theme.faint).italic(),
        ));
    }
    Element::line(Line::from(spans))
}

fn help_line(descriptor: &FieldDescriptor, theme: &Theme) -> Option<Element<FormMsg>> {
    descriptor.help_text.as_ref().map(|help| {
        Element::styled_text(help.clone(), Style::default().fg(theme.muted).italic())
    })
}

/// Render one field to its interactive element block.
pub fn render(
    descriptor: &FieldDescriptor,
    path: &FieldPath,
    state: &FieldState,
    theme: &Theme,
) -> Element<FormMsg> {
    if descriptor.read_only {
        return render_read_only(descriptor, state, theme);
    }
    match (descriptor.kind, state) {
        (FieldKind::Boolean, FieldState::Checkbox { checked }) => Element::Checkbox {
            id: focus_id(path),
            checked: *checked,
            label: descriptor.display_label().to_string(),
            inline_help: descriptor.help_text.clone(),
            on_toggle: FormMsg::CheckboxToggled { path: path.clone() },
        },

        (FieldKind::Choice, FieldState::Select(select)) => {
            let options: Vec<String> = descriptor
                .choices
                .iter()
                .map(|c| c.display_name.clone())
                .collect();
            let input = Element::Select {
                id: focus_id(path),
                options,
                selected: select.selected(),
                is_open: select.is_open(),
                highlight: select.highlighted(),
                placeholder: descriptor.placeholder.clone(),
                on_key: {
                    let path = path.clone();
                    Box::new(move |key| FormMsg::SelectKey {
                        path: path.clone(),
                        key,
                    })
                },
            };
            field_block(descriptor, input, theme)
        }

        (FieldKind::RelatedEntity, FieldState::Related(related)) => {
            let input = Element::Autocomplete {
                id: focus_id(path),
                value: related.dropdown.input().value().to_string(),
                cursor_pos: related.dropdown.input().cursor_pos(),
                options: related
                    .dropdown
                    .visible_options()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                is_open: related.dropdown.is_open(),
                highlight: related.dropdown.highlighted(),
                has_more: related.dropdown.has_more(),
                placeholder: descriptor
                    .placeholder
                    .clone()
                    .or_else(|| Some("Type to search…".to_string())),
                on_input: {
                    let path = path.clone();
                    Box::new(move |key| FormMsg::RelatedInputKey {
                        path: path.clone(),
                        key,
                    })
                },
                on_navigate: {
                    let path = path.clone();
                    Box::new(move |key| FormMsg::RelatedNavKey {
                        path: path.clone(),
                        key,
                    })
                },
                on_create: descriptor
                    .related
                    .as_ref()
                    .and_then(|r| r.secondary_create.as_ref())
                    .map(|_| FormMsg::OpenSecondary { path: path.clone() }),
            };
            field_block(descriptor, input, theme)
        }

        (FieldKind::Decorative, _) => Element::styled_text(
            descriptor.display_label().to_string(),
            Style::default().fg(theme.accent).bold(),
        ),

        (FieldKind::Raw, FieldState::Raw { value }) => Element::styled_text(
            value.as_ref().map(value_to_text).unwrap_or_default(),
            Style::default().fg(theme.muted),
        ),

        (FieldKind::File, FieldState::File(input)) => {
            let element = text_input_element(descriptor, path, input);
            field_block(descriptor, element, theme)
        }

        // remaining scalar kinds: free text entry
        (_, FieldState::Text(input)) => {
            let element = text_input_element(descriptor, path, input);
            field_block(descriptor, element, theme)
        }

        // state desynchronized from kind; render inert rather than panic
        _ => Element::styled_text(
            format!("{} (unavailable)", descriptor.display_label()),
            Style::default().fg(theme.faint),
        ),
    }
}

fn text_input_element(
    descriptor: &FieldDescriptor,
    path: &FieldPath,
    input: &TextInputState,
) -> Element<FormMsg> {
    Element::TextInput {
        id: focus_id(path),
        value: input.value().to_string(),
        cursor_pos: input.cursor_pos(),
        placeholder: descriptor.placeholder.clone(),
        on_key: {
            let path = path.clone();
            Box::new(move |key| FormMsg::FieldKey {
                path: path.clone(),
                key,
            })
        },
    }
}

fn field_block(
    descriptor: &FieldDescriptor,
    input: Element<FormMsg>,
    theme: &Theme,
) -> Element<FormMsg> {
    let mut column = Element::column()
        .add(label_line(descriptor, theme), LayoutConstraint::Length(1))
        .add(input, LayoutConstraint::Length(3));
    if let Some(help) = help_line(descriptor, theme) {
        column = column.add(help, LayoutConstraint::Length(1));
    }
    column.build()
}

fn render_read_only(
    descriptor: &FieldDescriptor,
    state: &FieldState,
    theme: &Theme,
) -> Element<FormMsg> {
    let value_text = match state {
        FieldState::Text(input) | FieldState::File(input) => input.value().to_string(),
        FieldState::Checkbox { checked } => if *checked { "yes" } else { "no" }.to_string(),
        FieldState::Select(select) => select
            .selected()
            .and_then(|i| descriptor.choices.get(i))
            .map(|c| c.display_name.clone())
            .unwrap_or_default(),
        FieldState::Related(related) => related
            .selection
            .as_ref()
            .map(|s| s.display.clone())
            .unwrap_or_default(),
        FieldState::Raw { value } => value.as_ref().map(value_to_text).unwrap_or_default(),
        FieldState::Static => String::new(),
    };
    Element::column()
        .add(label_line(descriptor, theme), LayoutConstraint::Length(1))
        .add(
            Element::styled_text(value_text, Style::default().fg(theme.muted)),
            LayoutConstraint::Length(1),
        )
        .build()
}

/// Extract the submittable value for a field, or `None` when the field does
/// not participate in the payload (decorative, read-only).
pub fn extract_value(descriptor: &FieldDescriptor, state: &FieldState) -> Option<Value> {
    if descriptor.kind.is_decorative() || descriptor.read_only {
        return None;
    }
    let value = match (descriptor.kind, state) {
        (FieldKind::Boolean, FieldState::Checkbox { checked }) => Value::Bool(*checked),

        (FieldKind::Choice, FieldState::Select(select)) => select
            .selected()
            .and_then(|i| descriptor.choices.get(i))
            .map(|c| c.value.clone())
            .unwrap_or(Value::Null),

        (FieldKind::RelatedEntity, FieldState::Related(related)) => related
            .selection
            .as_ref()
            .map(|s| s.id.clone())
            .or_else(|| descriptor.effective_value().cloned())
            .unwrap_or(Value::Null),

        (FieldKind::Integer, FieldState::Text(input)) => {
            if input.is_empty() {
                Value::Null
            } else {
                input
                    .value()
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(input.value().to_string()))
            }
        }

        (FieldKind::Float, FieldState::Text(input)) => {
            if input.is_empty() {
                Value::Null
            } else {
                input
                    .value()
                    .parse::<f64>()
                    .ok()
                    .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                    .unwrap_or_else(|| Value::String(input.value().to_string()))
            }
        }

        // decimals stay strings to preserve precision
        (FieldKind::Decimal, FieldState::Text(input)) => {
            if input.is_empty() {
                Value::Null
            } else {
                Value::String(input.value().to_string())
            }
        }

        (FieldKind::File, FieldState::File(input)) => {
            Value::String(input.value().to_string())
        }

        (FieldKind::Raw, FieldState::Raw { value }) => {
            value.clone().unwrap_or(Value::Null)
        }

        (_, FieldState::Text(input)) => Value::String(input.value().to_string()),

        _ => Value::Null,
    };
    Some(value)
}

/// Client-side sanity check run before submission.
///
/// Numeric kinds are checked locally because an invalid numeric string sent
/// as an empty value produces a confusing server-side error. Email/url
/// formats are checked only when non-empty; required-but-empty text fields
/// are left to the server.
pub fn validate(descriptor: &FieldDescriptor, state: &FieldState) -> Result<(), String> {
    match (descriptor.kind, state) {
        (FieldKind::Integer, FieldState::Text(input)) => {
            if input.is_empty() {
                return if descriptor.required {
                    Err("This field is required.".to_string())
                } else {
                    Ok(())
                };
            }
            let parsed: i64 = input
                .value()
                .parse()
                .map_err(|_| "Enter a valid integer.".to_string())?;
            check_bounds(descriptor, parsed as f64)
        }
        (FieldKind::Float | FieldKind::Decimal, FieldState::Text(input)) => {
            if input.is_empty() {
                return if descriptor.required {
                    Err("This field is required.".to_string())
                } else {
                    Ok(())
                };
            }
            let parsed: f64 = input
                .value()
                .parse()
                .map_err(|_| "Enter a valid number.".to_string())?;
            check_bounds(descriptor, parsed)
        }
        (FieldKind::Email, FieldState::Text(input)) => {
            if !input.is_empty() && !EMAIL_RE.is_match(input.value()) {
                Err("Enter a valid email address.".to_string())
            } else {
                Ok(())
            }
        }
        (FieldKind::Url, FieldState::Text(input)) => {
            if !input.is_empty() && !URL_RE.is_match(input.value()) {
                Err("Enter a valid URL.".to_string())
            } else {
                Ok(())
            }
        }
        (FieldKind::Date, FieldState::Text(input)) => {
            if !input.is_empty()
                && chrono::NaiveDate::parse_from_str(input.value(), "%Y-%m-%d").is_err()
            {
                Err("Enter a valid date (YYYY-MM-DD).".to_string())
            } else {
                Ok(())
            }
        }
        (FieldKind::DateTime, FieldState::Text(input)) => {
            if !input.is_empty()
                && chrono::DateTime::parse_from_rfc3339(input.value()).is_err()
                && chrono::NaiveDateTime::parse_from_str(input.value(), "%Y-%m-%dT%H:%M:%S")
                    .is_err()
            {
                Err("Enter a valid date/time.".to_string())
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

fn check_bounds(descriptor: &FieldDescriptor, value: f64) -> Result<(), String> {
    if let Some(min) = descriptor.min_value {
        if value < min {
            return Err(format!("Value must be at least {}.", min));
        }
    }
    if let Some(max) = descriptor.max_value {
        if value > max {
            return Err(format!("Value must be at most {}.", max));
        }
    }
    Ok(())
}
