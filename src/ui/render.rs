use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::ui::element::{Alignment, Element, FocusId, LayoutConstraint};
use crate::ui::theme::Theme;

fn to_constraint(c: LayoutConstraint) -> Constraint {
    match c {
        LayoutConstraint::Length(n) => Constraint::Length(n),
        LayoutConstraint::Min(n) => Constraint::Min(n),
        LayoutConstraint::Fill(n) => Constraint::Fill(n),
    }
}

/// Draw an element tree into `area`.
pub fn draw<Msg: Clone>(
    frame: &mut Frame,
    element: &Element<Msg>,
    area: Rect,
    theme: &Theme,
    focused: Option<&FocusId>,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    match element {
        Element::None => {}

        Element::Text { content, style } => {
            let style = style.unwrap_or_else(|| Style::default().fg(theme.text));
            frame.render_widget(Paragraph::new(content.as_str()).style(style), area);
        }

        Element::Styled { line } => {
            frame.render_widget(Paragraph::new(line.clone()), area);
        }

        Element::Column { items, spacing } => {
            let constraints: Vec<Constraint> = items
                .iter()
                .flat_map(|(_, c)| {
                    let mut v = vec![to_constraint(*c)];
                    if *spacing > 0 {
                        v.push(Constraint::Length(*spacing));
                    }
                    v
                })
                .collect();
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(area);
            let step = if *spacing > 0 { 2 } else { 1 };
            for (i, (item, _)) in items.iter().enumerate() {
                if let Some(chunk) = chunks.get(i * step) {
                    draw(frame, item, *chunk, theme, focused);
                }
            }
        }

        Element::Row { items, spacing } => {
            let constraints: Vec<Constraint> = items
                .iter()
                .flat_map(|(_, c)| {
                    let mut v = vec![to_constraint(*c)];
                    if *spacing > 0 {
                        v.push(Constraint::Length(*spacing));
                    }
                    v
                })
                .collect();
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(constraints)
                .split(area);
            let step = if *spacing > 0 { 2 } else { 1 };
            for (i, (item, _)) in items.iter().enumerate() {
                if let Some(chunk) = chunks.get(i * step) {
                    draw(frame, item, *chunk, theme, focused);
                }
            }
        }

        Element::Panel {
            id,
            title,
            collapsed,
            child,
            ..
        } => {
            let is_focused = id.is_some() && id.as_ref() == focused;
            let border_style = if is_focused {
                Style::default().fg(theme.border_focused)
            } else {
                Style::default().fg(theme.border)
            };
            let mut block = Block::default().borders(Borders::ALL).border_style(border_style);
            if let Some(title) = title {
                let marker = if *collapsed { "▸" } else { "▾" };
                block = block.title(format!(" {} {} ", marker, title));
            }
            let inner = block.inner(area);
            frame.render_widget(block, area);
            if !collapsed {
                draw(frame, child, inner, theme, focused);
            }
        }

        Element::TextInput {
            id,
            value,
            cursor_pos,
            placeholder,
            ..
        } => {
            let is_focused = focused == Some(id);
            draw_input_box(
                frame,
                area,
                theme,
                is_focused,
                value,
                *cursor_pos,
                placeholder.as_deref(),
            );
        }

        Element::Checkbox {
            id,
            checked,
            label,
            inline_help,
            ..
        } => {
            let is_focused = focused == Some(id);
            let box_mark = if *checked { "[x]" } else { "[ ]" };
            let box_style = if is_focused {
                Style::default().fg(theme.border_focused).bold()
            } else {
                Style::default().fg(theme.text)
            };
            let mut spans = vec![
                Span::styled(box_mark.to_string(), box_style),
                Span::raw(" "),
                Span::styled(label.clone(), Style::default().fg(theme.text)),
            ];
            if let Some(help) = inline_help {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    help.clone(),
                    Style::default().fg(theme.muted).italic(),
                ));
            }
            frame.render_widget(Paragraph::new(Line::from(spans)), area);
        }

        Element::Select {
            id,
            options,
            selected,
            is_open,
            highlight,
            placeholder,
            ..
        } => {
            let is_focused = focused == Some(id);
            let display = selected
                .and_then(|i| options.get(i))
                .cloned()
                .or_else(|| placeholder.clone())
                .unwrap_or_default();
            let display_style = if selected.is_some() {
                Style::default().fg(theme.text)
            } else {
                Style::default().fg(theme.faint).italic()
            };
            let border_style = if is_focused {
                Style::default().fg(theme.border_focused)
            } else {
                Style::default().fg(theme.border)
            };
            let block = Block::default().borders(Borders::ALL).border_style(border_style);
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let line = Line::from(vec![
                Span::styled(display, display_style),
                Span::raw(" "),
                Span::styled("▾", Style::default().fg(theme.muted)),
            ]);
            frame.render_widget(Paragraph::new(line), inner);
            if *is_open {
                draw_dropdown(frame, area, theme, options, *highlight, false);
            }
        }

        Element::Autocomplete {
            id,
            value,
            cursor_pos,
            options,
            is_open,
            highlight,
            has_more,
            placeholder,
            on_create,
            ..
        } => {
            let is_focused = focused == Some(id);
            draw_input_box(
                frame,
                area,
                theme,
                is_focused,
                value,
                *cursor_pos,
                placeholder.as_deref(),
            );
            if on_create.is_some() {
                // corner hint for the inline "add new" affordance
                let hint = "Ins: new";
                if area.width as usize > hint.len() + 2 {
                    let hint_area = Rect {
                        x: area.x + area.width - hint.len() as u16 - 2,
                        y: area.y,
                        width: hint.len() as u16,
                        height: 1,
                    };
                    frame.render_widget(
                        Paragraph::new(hint).style(Style::default().fg(theme.success)),
                        hint_area,
                    );
                }
            }
            if *is_open {
                draw_dropdown(frame, area, theme, options, *highlight, *has_more);
            }
        }

        Element::Button {
            id,
            label,
            enabled,
            ..
        } => {
            let is_focused = focused == Some(id);
            let style = if !enabled {
                Style::default().fg(theme.faint)
            } else if is_focused {
                Style::default().fg(theme.base).bg(theme.accent).bold()
            } else {
                Style::default().fg(theme.accent)
            };
            frame.render_widget(
                Paragraph::new(format!("[ {} ]", label)).style(style),
                area,
            );
        }

        Element::Stack { layers } => {
            let last = layers.len().saturating_sub(1);
            for (i, layer) in layers.iter().enumerate() {
                if i == last && layer.dim_below {
                    frame
                        .buffer_mut()
                        .set_style(area, Style::default().fg(theme.faint));
                }
                let layer_area = match layer.alignment {
                    Alignment::TopLeft => area,
                    Alignment::Center => centered(area, 80, 90),
                };
                // only the topmost layer receives focus highlighting
                let layer_focus = if i == last { focused } else { None };
                if layer.alignment == Alignment::Center {
                    frame.render_widget(Clear, layer_area);
                }
                draw(frame, &layer.element, layer_area, theme, layer_focus);
            }
        }
    }
}

fn draw_input_box(
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
    is_focused: bool,
    value: &str,
    cursor_pos: usize,
    placeholder: Option<&str>,
) {
    let border_style = if is_focused {
        Style::default().fg(theme.border_focused)
    } else {
        Style::default().fg(theme.border)
    };
    let block = Block::default().borders(Borders::ALL).border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if value.is_empty() && !is_focused {
        if let Some(ph) = placeholder {
            frame.render_widget(
                Paragraph::new(ph).style(Style::default().fg(theme.faint).italic()),
                inner,
            );
        }
        return;
    }

    // keep the cursor inside the visible window
    let visible_width = inner.width as usize;
    let scroll = if visible_width > 0 && cursor_pos >= visible_width {
        cursor_pos + 1 - visible_width
    } else {
        0
    };
    let chars: Vec<char> = value.chars().collect();
    let end = (scroll + visible_width).min(chars.len());
    let visible: String = chars.get(scroll..end).unwrap_or(&[]).iter().collect();
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(theme.text)),
        inner,
    );

    if is_focused {
        let rel = cursor_pos.saturating_sub(scroll).min(visible_width);
        let cursor_x = inner.x + rel as u16;
        if cursor_x < inner.x + inner.width {
            let cell = Rect {
                x: cursor_x,
                y: inner.y,
                width: 1,
                height: 1,
            };
            frame.buffer_mut().set_style(cell, theme.cursor_style());
        }
    }
}

fn draw_dropdown(
    frame: &mut Frame,
    anchor: Rect,
    theme: &Theme,
    options: &[String],
    highlight: usize,
    has_more: bool,
) {
    let frame_area = frame.area();
    let rows = options.len() as u16 + if has_more { 1 } else { 0 };
    let height = rows.min(frame_area.height.saturating_sub(anchor.y + anchor.height)) + 2;
    let popup = Rect {
        x: anchor.x,
        y: (anchor.y + anchor.height).min(frame_area.height.saturating_sub(1)),
        width: anchor.width,
        height: height.min(frame_area.height - (anchor.y + anchor.height).min(frame_area.height)),
    };
    if popup.height < 3 || popup.width < 3 {
        return;
    }
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let mut lines = Vec::new();
    for (i, opt) in options.iter().enumerate() {
        let style = if i == highlight {
            Style::default().fg(theme.base).bg(theme.accent)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(Span::styled(opt.clone(), style)));
    }
    if has_more {
        lines.push(Line::from(Span::styled(
            "…more results (PgDn loads the next page)".to_string(),
            Style::default().fg(theme.muted).italic(),
        )));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
