//! FormRenderer: walks a session's ordered field list and produces the
//! interactive surface, applying grouping and collapsing rules.

use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use serde_json::Value;

use crate::client::HttpMethod;
use crate::form::field::FieldPath;
use crate::form::message::FormMsg;
use crate::form::registry;
use crate::form::session::FormSession;
use crate::ui::element::{Element, FocusId, LayoutConstraint};
use crate::ui::theme::Theme;

pub const SUBMIT_BUTTON: &str = "form:submit";
pub const CANCEL_BUTTON: &str = "form:cancel";
pub const CONFIRM_CHECKBOX: &str = "form:confirm";

/// Fields in display order, with fields sharing a group gathered into one
/// segment at the group's first appearance.
fn segments(session: &FormSession) -> Vec<(Option<String>, Vec<FieldPath>)> {
    let mut result: Vec<(Option<String>, Vec<FieldPath>)> = Vec::new();
    for path in session.displayed() {
        let group = session.descriptor(path).and_then(|d| d.group.clone());
        match &group {
            Some(name) => {
                if let Some(segment) = result
                    .iter_mut()
                    .find(|(g, _)| g.as_deref() == Some(name.as_str()))
                {
                    segment.1.push(path.clone());
                } else {
                    result.push((group, vec![path.clone()]));
                }
            }
            None => match result.last_mut() {
                Some((None, paths)) => paths.push(path.clone()),
                _ => result.push((None, vec![path.clone()])),
            },
        }
    }
    result
}

fn field_with_errors(
    session: &FormSession,
    path: &FieldPath,
    theme: &Theme,
) -> (Element<FormMsg>, u16) {
    let Some(descriptor) = session.descriptor(path) else {
        return (Element::None, 0);
    };
    let Some(state) = session.state(path) else {
        return (Element::None, 0);
    };
    let body = registry::render(descriptor, path, state, theme);
    let body_height = registry::field_height(descriptor);

    let mut error_lines: Vec<String> = session
        .errors_for(path)
        .iter()
        .map(|m| format!("✗ {}", m))
        .collect();
    if let Some(rows) = session.row_errors.get(path) {
        let identifiers = session
            .nested_rows
            .get(&path.base)
            .cloned()
            .unwrap_or_default();
        for (row_index, messages) in rows {
            let row_label = identifiers
                .get(*row_index)
                .map(render_row_id)
                .unwrap_or_else(|| format!("row {}", row_index + 1));
            for message in messages {
                error_lines.push(format!("✗ {}: {}", row_label, message));
            }
        }
    }

    if error_lines.is_empty() {
        return (body, body_height);
    }

    let error_count = error_lines.len() as u16;
    let mut column = Element::column().add(body, LayoutConstraint::Length(body_height));
    for line in error_lines {
        column = column.add(
            Element::styled_text(line, theme.error_style()),
            LayoutConstraint::Length(1),
        );
    }
    (column.build(), body_height + error_count)
}

fn render_row_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => format!("row {}", other),
    }
}

/// Render a full session to its element tree.
pub fn render_session(session: &FormSession, theme: &Theme) -> Element<FormMsg> {
    let mut column = Element::column().spacing(0);

    // header
    let header = Element::line(Line::from(vec![
        Span::styled(
            session.title.clone(),
            Style::default().fg(theme.accent).bold(),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} {}", session.method, session.resource_url),
            Style::default().fg(theme.faint),
        ),
    ]));
    column = column.add(header, LayoutConstraint::Length(1));
    column = column.add(Element::None, LayoutConstraint::Length(1));

    // non-field banner, one alert line each
    for message in &session.non_field_errors {
        column = column.add(
            Element::styled_text(format!("⚠ {}", message), theme.error_style()),
            LayoutConstraint::Length(1),
        );
    }
    if !session.non_field_errors.is_empty() {
        column = column.add(Element::None, LayoutConstraint::Length(1));
    }

    if session.method == HttpMethod::Delete {
        let warning = match &session.delete_items {
            Some(items) => format!(
                "This will permanently delete {} item(s). This cannot be undone.",
                items.len()
            ),
            None => "This will permanently delete the item. This cannot be undone.".to_string(),
        };
        column = column.add(
            Element::styled_text(warning, theme.warning_style()),
            LayoutConstraint::Length(1),
        );
        column = column.add(Element::None, LayoutConstraint::Length(1));
    }

    // fields, honoring the scroll index at field granularity
    let mut skipped = 0usize;
    let mut display_position = 0usize;
    for (group, paths) in segments(session) {
        match group {
            Some(name) => {
                let collapsed = session.collapsed_groups.contains(&name);
                let mut inner = Element::column();
                let mut inner_height = 0u16;
                for path in &paths {
                    if display_position < session.scroll_index {
                        display_position += 1;
                        skipped += 1;
                        continue;
                    }
                    display_position += 1;
                    let (element, height) = field_with_errors(session, path, theme);
                    inner = inner.add(element, LayoutConstraint::Length(height));
                    inner_height += height;
                }
                let panel = Element::Panel {
                    id: Some(FocusId::new(format!("group:{}", name))),
                    title: Some(name.clone()),
                    collapsed,
                    on_toggle: Some(FormMsg::GroupToggled {
                        group: name.clone(),
                    }),
                    child: Box::new(inner.build()),
                };
                let panel_height = if collapsed { 2 } else { inner_height + 2 };
                column = column.add(panel, LayoutConstraint::Length(panel_height));
            }
            None => {
                for path in &paths {
                    if display_position < session.scroll_index {
                        display_position += 1;
                        skipped += 1;
                        continue;
                    }
                    display_position += 1;
                    let (element, height) = field_with_errors(session, path, theme);
                    column = column.add(element, LayoutConstraint::Length(height));
                }
            }
        }
    }
    if skipped > 0 {
        // indicator that fields are scrolled off above
        column = column.add(
            Element::styled_text(
                format!("▲ {} field(s) above", skipped),
                Style::default().fg(theme.faint),
            ),
            LayoutConstraint::Length(1),
        );
    }

    if session.confirm_required {
        column = column.add(
            Element::Checkbox {
                id: FocusId::new(CONFIRM_CHECKBOX),
                checked: session.confirmed,
                label: "I understand the consequences".to_string(),
                inline_help: None,
                on_toggle: FormMsg::ConfirmToggled,
            },
            LayoutConstraint::Length(1),
        );
    }

    column = column.add(Element::None, LayoutConstraint::Fill(1));

    let submit_label = if session.submitting {
        "Submitting…"
    } else {
        match session.method {
            HttpMethod::Delete => "Delete",
            _ => "Submit",
        }
    };
    let buttons = Element::row()
        .add(
            Element::Button {
                id: FocusId::new(SUBMIT_BUTTON),
                label: submit_label.to_string(),
                enabled: session.can_submit(),
                on_press: Some(FormMsg::Submit),
            },
            LayoutConstraint::Length(16),
        )
        .add(
            Element::Button {
                id: FocusId::new(CANCEL_BUTTON),
                label: "Cancel".to_string(),
                enabled: true,
                on_press: Some(FormMsg::Cancel),
            },
            LayoutConstraint::Length(12),
        )
        .add(Element::None, LayoutConstraint::Fill(1))
        .build();
    column = column.add(buttons, LayoutConstraint::Length(1));

    column.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::field::FieldDescriptor;
    use crate::form::registry::seed_state;
    use crate::schema::FieldMeta;

    fn named_field(name: &str, group: Option<&str>) -> FieldDescriptor {
        let meta = FieldMeta {
            field_type: "string".into(),
            ..Default::default()
        };
        let mut d = FieldDescriptor::from_meta(name, &meta).unwrap();
        d.group = group.map(str::to_string);
        d
    }

    #[test]
    fn grouped_fields_gather_at_first_appearance() {
        let session = FormSession::new(
            "/api/x/",
            HttpMethod::Post,
            0,
            vec![
                named_field("a", Some("dims")),
                named_field("b", None),
                named_field("c", Some("dims")),
            ],
            seed_state,
        )
        .unwrap();
        let segments = segments(&session);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0.as_deref(), Some("dims"));
        assert_eq!(segments[0].1.len(), 2);
    }
}
