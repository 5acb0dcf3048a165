use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::config::RgbColor;
use crate::model::{format_last_activity, format_record_date, format_touched, DraftField};
use crate::session::NoticeKind;
use crate::view::DisplayEntry;

use super::app::App;

const APP_TITLE: &str = "CONTACT STUDIO";
const FORM_HELP: &str = "Tab/↓: next  BackTab/↑: prev  Enter: save  Esc: cancel";
const NOTE_HELP: &str = "Enter: save  Esc: cancel";
const CONFIRM_HELP: &str = "Y/Enter: confirm  N/Esc: cancel";
const SEARCH_HELP: &str = "Enter: search  Esc: cancel";
const HELP_MODAL_FOOTER: &str = "j/k: scroll  g/G: top/bottom  Esc: close";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], app);
    draw_body(frame, chunks[1], app);
    draw_footer(frame, chunks[2], app);

    let area = frame.area();
    if app.form.is_some() {
        draw_form_modal(frame, area, app);
    }
    if app.note_editor.is_some() {
        draw_note_modal(frame, area, app);
    }
    if app.confirm_modal.is_some() {
        draw_confirm_modal(frame, area, app);
    }
    if app.help_modal.is_some() {
        draw_help_modal(frame, area, app);
    }
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let summary = &app.display().summary;
    let stats = format!(
        "{} contacts │ {} domains │ last activity {}",
        summary.total,
        summary.unique_domains,
        format_last_activity(summary.last_activity)
    );
    let backend = app.session().backend();

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", APP_TITLE),
            Style::default()
                .fg(color(app.ui_colors().accent))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {} ", stats), header_text_style(app)),
        Span::styled(format!(" [{}]", backend), separator_style(app)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_body(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Min(0)])
        .split(area);
    draw_list_pane(frame, chunks[0], app);
    draw_details(frame, chunks[1], app);
}

fn draw_list_pane(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, !app.search_focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    draw_search_line(frame, layout[0], app, area.width);
    app.list_height = layout[1].height as usize;
    draw_contact_list(frame, layout[1], app);
}

fn draw_search_line(frame: &mut Frame<'_>, area: Rect, app: &App, outer_width: u16) {
    let label = "SEARCH: ";
    let value = app.search_input.value().to_string();
    let value_style = if app.search_focused {
        Style::default()
    } else {
        separator_style(app)
    };
    let content = Line::from(vec![
        Span::styled(label, header_text_style(app)),
        Span::styled(value, value_style),
    ]);
    render_header_with_separator(frame, area, content, app, outer_width);

    if app.search_focused {
        let x = area
            .x
            .saturating_add(label.len() as u16 + app.search_input.visual_cursor() as u16);
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    }
}

fn draw_contact_list(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let display = app.display();
    let items: Vec<ListItem> = if display.is_empty() {
        let text = if app.session().state().search_active() {
            "No matching contacts"
        } else {
            "No contacts"
        };
        vec![ListItem::new(Line::from(Span::styled(text, separator_style(app))))]
    } else {
        display
            .entries
            .iter()
            .map(|entry| build_list_item(entry, app))
            .collect()
    };

    let mut state = ListState::default();
    state.select(app.cursor());

    let list = List::new(items)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);

    frame.render_stateful_widget(list, area, &mut state);
}

fn build_list_item(entry: &DisplayEntry, app: &App) -> ListItem<'static> {
    let check = if entry.selected { "[x]" } else { "[ ]" };
    let pin = if entry.pinned { "▲" } else { " " };
    let star = if entry.favorite { "★" } else { " " };
    let accent = Style::default().fg(color(app.ui_colors().accent));

    ListItem::new(Line::from(vec![
        Span::raw(format!("{} ", check)),
        Span::styled(pin.to_string(), accent),
        Span::styled(format!("{} ", star), accent),
        Span::raw(entry.contact.name.clone()),
        Span::styled(format!("  {}", entry.contact.email), separator_style(app)),
    ]))
}

fn draw_details(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, false));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let Some(entry) = app.current() else {
        render_centered_words(frame, inner, "NO CONTACT SELECTED");
        return;
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let contact = &entry.contact;
    let mut title = vec![
        Span::styled(
            format!("{} ", contact.initials()),
            Style::default().fg(color(app.ui_colors().accent)),
        ),
        Span::styled(
            contact.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if entry.pinned {
        title.push(Span::styled("  PINNED", header_text_style(app)));
    }
    if entry.favorite {
        title.push(Span::styled("  FAVORITE", header_text_style(app)));
    }
    render_header_with_separator(frame, layout[0], Line::from(title), app, area.width);

    let label_width = 14usize;
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<label_width$}", label), header_text_style(app)),
            Span::raw(value),
        ])
    };

    let note = if entry.note.trim().is_empty() {
        "—".to_string()
    } else {
        entry.note.clone()
    };
    let lines = vec![
        row("Email", contact.email.clone()),
        row("Phone", contact.phone.clone()),
        row(
            "Address",
            contact.address.clone().unwrap_or_else(|| "—".to_string()),
        ),
        row("Created", format_record_date(contact.created_at.as_deref())),
        row("Updated", format_record_date(contact.updated_at.as_deref())),
        row("Last touched", format_touched(entry.last_touched.as_deref())),
        Line::from(""),
        row("Note", note),
    ];

    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        layout[1],
    );
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let colors = app.ui_colors();
    let mut style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let message = if app.form.is_some() {
        FORM_HELP.to_string()
    } else if app.note_editor.is_some() {
        NOTE_HELP.to_string()
    } else if app.confirm_modal.is_some() {
        CONFIRM_HELP.to_string()
    } else if app.search_focused {
        SEARCH_HELP.to_string()
    } else if let Some(notice) = app.notice() {
        let fg = match notice.kind {
            NoticeKind::Error => colors.error,
            NoticeKind::Success => colors.success,
        };
        style = style.fg(color(fg));
        notice.text
    } else if let Some(status) = app.status() {
        status.to_string()
    } else {
        status_line(app)
    };

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    frame.render_widget(Paragraph::new(message).style(style), area);
}

fn status_line(app: &App) -> String {
    let state = app.session().state();
    let display = app.display();
    let mut parts = vec![format!("Sort: {}", state.sort.label())];
    if state.address_only {
        parts.push("With address".to_string());
    }
    if state.search_active() {
        parts.push(format!("Search: {}", state.search_term));
    }
    if display.all_selected() {
        parts.push("All selected".to_string());
    } else if !state.selection.is_empty() {
        parts.push(format!("{} selected", state.selection.len()));
    }
    parts.push(format!(
        "Showing {} of {}",
        display.len(),
        display.summary.total
    ));
    parts.join("  │  ")
}

fn modal_area(area: Rect, height: u16) -> Rect {
    let width = area
        .width
        .saturating_mul(2)
        .saturating_div(3)
        .max(area.width.min(40))
        .min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn modal_block(app: &App, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(Line::from(Span::styled(
            format!(" {} ", title),
            header_text_style(app),
        )))
        .title_alignment(Alignment::Center)
}

fn draw_form_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(form) = app.form.as_ref() else {
        return;
    };

    // label + input + error line per field, blank, help
    let height = (DraftField::ALL.len() as u16) * 3 + 4;
    let modal = modal_area(area, height);
    frame.render_widget(Clear, modal);

    let block = modal_block(app, form.title());
    let inner = block.inner(modal);
    frame.render_widget(block, modal);

    let error_style = Style::default().fg(color(app.ui_colors().error));
    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;
    for field in DraftField::ALL {
        let focused = form.focused() == field;
        let label_style = if focused {
            Style::default()
                .fg(color(app.ui_colors().accent))
                .add_modifier(Modifier::BOLD)
        } else {
            header_text_style(app)
        };
        lines.push(Line::from(Span::styled(
            App::form_field_label(field),
            label_style,
        )));
        if focused {
            cursor = Some((
                inner.x.saturating_add(2 + form.visual_cursor() as u16),
                inner.y.saturating_add(lines.len() as u16),
            ));
        }
        lines.push(Line::from(format!("> {}", form.value(field))));
        match form.error(field) {
            Some(message) => lines.push(Line::from(Span::styled(message, error_style))),
            None => lines.push(Line::from("")),
        }
    }
    lines.push(Line::from(Span::styled(FORM_HELP, separator_style(app))));

    frame.render_widget(Paragraph::new(lines), inner);
    if let Some(position) = cursor {
        frame.set_cursor_position(position);
    }
}

fn draw_note_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(editor) = app.note_editor.as_ref() else {
        return;
    };

    let modal = modal_area(area, 5);
    frame.render_widget(Clear, modal);
    let block = modal_block(app, &format!("NOTE: {}", editor.name));
    let inner = block.inner(modal);
    frame.render_widget(block, modal);

    let label = "NOTE: ";
    let lines = vec![
        Line::from(vec![
            Span::styled(label, header_text_style(app)),
            Span::raw(editor.value().to_string()),
        ]),
        Line::from(""),
        Line::from(Span::styled(NOTE_HELP, separator_style(app))),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    let x = inner
        .x
        .saturating_add(label.len() as u16 + editor.visual_cursor() as u16);
    frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
}

fn draw_confirm_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(modal) = app.confirm_modal.as_ref() else {
        return;
    };

    let rect = modal_area(area, 5);
    frame.render_widget(Clear, rect);
    let block = modal_block(app, &modal.title);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let lines = vec![
        Line::from(modal.message.clone()),
        Line::from(""),
        Line::from(Span::styled(CONFIRM_HELP, separator_style(app))),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    // 2/3 width, 80% height
    let width = area
        .width
        .saturating_mul(2)
        .saturating_div(3)
        .max(40)
        .min(area.width);
    let height = area
        .height
        .saturating_mul(4)
        .saturating_div(5)
        .max(10)
        .min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, modal_area);

    let header_style = header_text_style(app);
    let border_s = border_style(app, true);

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();

    let content_width = width.saturating_sub(4) as usize;
    let action_width = 20usize;

    for (section_idx, section) in sections.iter().enumerate() {
        let header_text = format!(" {} ", section.title);
        let padding_total = content_width.saturating_sub(header_text.len());
        let left_pad = padding_total / 2;
        let right_pad = padding_total - left_pad;
        let header_line = format!(
            "{}{}{}",
            LINE.horizontal.repeat(left_pad),
            header_text,
            LINE.horizontal.repeat(right_pad)
        );
        lines.push(Line::from(Span::styled(header_line, header_style)));

        for entry in &section.entries {
            let action = format!("{:<width$}", entry.action, width = action_width);
            lines.push(Line::from(vec![
                Span::styled(action, Style::default()),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }

        if section_idx < sections.len() - 1 {
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    // borders (2) + footer line (1)
    let inner_height = height.saturating_sub(3) as usize;

    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = total_lines;
    modal.viewport_height = inner_height;

    let max_scroll = modal.total_lines.saturating_sub(modal.viewport_height);
    if modal.scroll > max_scroll {
        modal.scroll = max_scroll;
    }

    let scroll = modal.scroll;
    let viewport_height = modal.viewport_height;
    let scroll_indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(scroll)
        .take(viewport_height)
        .collect();

    let title = Line::from(vec![
        Span::styled(" HELP ", header_style),
        Span::styled(scroll_indicator, header_style),
    ]);
    let footer = Line::from(Span::styled(
        format!(" {} ", HELP_MODAL_FOOTER),
        header_style,
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_s)
        .title(title)
        .title_bottom(footer)
        .title_alignment(Alignment::Center);

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible_lines), inner);
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App, active: bool) -> Style {
    let colors = app.ui_colors();
    let style = Style::default().fg(color(colors.border));
    if active {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

fn header_text_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.separator))
}

fn separator_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.separator))
        .add_modifier(Modifier::DIM)
}

fn render_centered_words(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let mut lines: Vec<Line> = text
        .split_whitespace()
        .map(|word| Line::from(word.to_string()))
        .collect();

    if lines.is_empty() {
        return;
    }

    if lines.len() as u16 > area.height {
        lines.truncate(area.height as usize);
    }

    let height = lines.len() as u16;
    let start_y = area.y + (area.height.saturating_sub(height)) / 2;
    let target = Rect {
        x: area.x,
        y: start_y,
        width: area.width,
        height,
    };

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), target);
}

/// Render a header line with a `├───┤` separator below it that joins the
/// pane's side borders. `outer_width` includes the borders.
fn render_header_with_separator(
    frame: &mut Frame<'_>,
    area: Rect,
    content: Line<'_>,
    app: &App,
    outer_width: u16,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    if area.height == 1 {
        frame.render_widget(Paragraph::new(content), area);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    frame.render_widget(Paragraph::new(content), layout[0]);

    let inner_width = outer_width.saturating_sub(2) as usize;
    let separator = format!(
        "{}{}{}",
        LINE.vertical_right,
        LINE.horizontal.repeat(inner_width),
        LINE.vertical_left
    );
    let separator_line = Line::from(Span::styled(separator, separator_style(app)));

    // shifted left by one so the connectors land on the border
    let separator_area = Rect {
        x: layout[1].x.saturating_sub(1),
        y: layout[1].y,
        width: outer_width,
        height: 1,
    };
    frame.render_widget(Paragraph::new(separator_line), separator_area);
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
