use crate::form::{FieldKind, FormField, ProfileForm, FIXED_FIELD_COUNT};
use crate::keys;
use crate::session::{Session, View};
use crate::theme::{self, icons, StatusKind};
use curltree_core::render::render_plain_text;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const SINGLE_LINE_HEIGHT: u16 = 3;
const BIO_HEIGHT: u16 = 6;

/// Draws one frame. One-shot messages are consumed here.
pub fn render(f: &mut Frame, session: &mut Session, public_host: &str) {
    let area = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, session, chunks[0]);
    match session.view() {
        View::Loading => render_notice(f, chunks[1], "Looking up your profile..."),
        View::Error => render_error(f, session, chunks[1]),
        View::ProfileView => render_profile(f, session, public_host, chunks[1]),
        View::ProfileEdit | View::ProfileCreate => render_form(f, session.form(), chunks[1]),
        View::ConfirmDelete => {
            render_profile(f, session, public_host, chunks[1]);
            render_confirm(f, session, chunks[1]);
        }
    }
    render_status(f, session, chunks[2]);
    render_footer(f, session.view(), chunks[3]);
}

fn render_header(f: &mut Frame, session: &Session, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" curltree · {}", session.view().title()),
        theme::HEADER_STYLE,
    )];
    if let Some(profile) = session.profile() {
        spans.push(Span::styled(
            format!("  @{}", profile.handle),
            theme::MUTED_STYLE,
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_notice(f: &mut Frame, area: Rect, text: &str) {
    let p = Paragraph::new(Span::styled(text.to_string(), theme::MUTED_STYLE));
    f.render_widget(p, area);
}

fn render_error(f: &mut Frame, session: &Session, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Error")
        .border_style(theme::status_style(StatusKind::Error));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = vec![
        Line::from(Span::styled(
            session.fatal().unwrap_or("Unknown error").to_string(),
            theme::status_style(StatusKind::Error),
        )),
        Line::from(""),
        Line::from("Press ctrl+c to exit."),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn render_profile(f: &mut Frame, session: &Session, public_host: &str, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(View::ProfileView.title())
        .border_style(theme::IDLE_BORDER);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = match session.profile() {
        Some(profile) => render_plain_text(&profile.to_public(), public_host),
        None => "No profile loaded.".to_string(),
    };
    let lines: Vec<Line> = text.lines().map(|line| Line::from(line.to_string())).collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn field_height(field: &FormField) -> u16 {
    if field.kind == FieldKind::MultiLine {
        BIO_HEIGHT
    } else {
        SINGLE_LINE_HEIGHT
    }
}

/// Rows are the three fixed fields then one row per link pair.
fn row_heights(form: &ProfileForm) -> Vec<u16> {
    let mut heights = vec![
        field_height(&form.fixed().full_name),
        field_height(&form.fixed().handle),
        field_height(&form.fixed().bio),
    ];
    heights.extend(std::iter::repeat(SINGLE_LINE_HEIGHT).take(form.links().len()));
    heights
}

fn focused_row(form: &ProfileForm) -> usize {
    match form.focused_link_pair() {
        Some(pair) => FIXED_FIELD_COUNT + pair,
        None => form.focus_index(),
    }
}

/// First row to draw so the focused row stays on screen.
fn first_visible_row(heights: &[u16], focused: usize, available: u16) -> usize {
    let mut first = 0;
    while first < focused {
        let used: u16 = heights[first..=focused].iter().sum();
        if used <= available {
            break;
        }
        first += 1;
    }
    first
}

fn render_form(f: &mut Frame, form: &ProfileForm, area: Rect) {
    let heights = row_heights(form);
    let first = first_visible_row(&heights, focused_row(form), area.height);

    let mut y = area.y;
    let bottom = area.y + area.height;
    for (row, height) in heights.iter().enumerate().skip(first) {
        if y + height > bottom {
            break;
        }
        let rect = Rect::new(area.x, y, area.width, *height);
        if row < FIXED_FIELD_COUNT {
            if let Some(field) = form.field(row) {
                render_field(f, field, field.label.to_string(), rect);
            }
        } else {
            let pair_index = row - FIXED_FIELD_COUNT;
            let pair = &form.links()[pair_index];
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(rect);
            render_field(
                f,
                &pair.name,
                format!("{} {} {}", icons::LINK, pair.name.label, pair_index + 1),
                halves[0],
            );
            render_field(f, &pair.url, pair.url.label.to_string(), halves[1]);
        }
        y += height;
    }

    if form.links().is_empty() && y < bottom {
        let hint = Rect::new(area.x, y, area.width, 1);
        render_notice(f, hint, " No links yet. Press ctrl+n to add one.");
    }
}

fn render_field(f: &mut Frame, field: &FormField, title: String, area: Rect) {
    let border_style = if field.is_focused() {
        theme::FOCUSED_BORDER
    } else {
        theme::IDLE_BORDER
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut p = Paragraph::new(field_lines(field));
    if field.kind == FieldKind::MultiLine {
        p = p.wrap(Wrap { trim: false });
    }
    f.render_widget(p, inner);
}

/// Field text with the cursor cell highlighted when focused.
fn field_lines(field: &FormField) -> Vec<Line<'static>> {
    if field.value().is_empty() && !field.is_focused() {
        return vec![Line::from(Span::styled(
            field.placeholder.to_string(),
            theme::PLACEHOLDER_STYLE,
        ))];
    }
    if !field.is_focused() {
        return field
            .value()
            .split('\n')
            .map(|line| Line::from(line.to_string()))
            .collect();
    }

    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    for (index, c) in field.value().chars().enumerate() {
        if index == field.cursor() {
            if !current.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current)));
            }
            let shown = if c == '\n' { " ".to_string() } else { c.to_string() };
            spans.push(Span::styled(shown, theme::CURSOR_STYLE));
            if c == '\n' {
                lines.push(Line::from(std::mem::take(&mut spans)));
            }
            continue;
        }
        if c == '\n' {
            if !current.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current)));
            }
            lines.push(Line::from(std::mem::take(&mut spans)));
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        spans.push(Span::raw(current));
    }
    if field.cursor() >= field.value().chars().count() {
        spans.push(Span::styled(" ", theme::CURSOR_STYLE));
    }
    lines.push(Line::from(spans));
    lines
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_confirm(f: &mut Frame, session: &Session, area: Rect) {
    let dialog = centered(area, 52, 7);
    f.render_widget(Clear, dialog);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Confirm")
        .border_style(theme::DIALOG_BORDER);
    let inner = block.inner(dialog);
    f.render_widget(block, dialog);

    let handle = session
        .profile()
        .map(|profile| format!("@{}", profile.handle))
        .unwrap_or_else(|| "this profile".to_string());
    let text = vec![
        Line::from(format!("Delete {handle}?")),
        Line::from(Span::styled(
            "This cannot be undone.",
            theme::MUTED_STYLE,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", theme::KEY_STYLE),
            Span::raw(" delete   "),
            Span::styled("n", theme::KEY_STYLE),
            Span::raw(" keep"),
        ]),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn render_status(f: &mut Frame, session: &mut Session, area: Rect) {
    let status = if let Some(error) = session.take_error() {
        Some((StatusKind::Error, icons::ERROR, error))
    } else if let Some(message) = session.take_message() {
        Some((StatusKind::Success, icons::OK, message))
    } else if let Some(notice) = session.pending_notice() {
        Some((StatusKind::Pending, icons::PENDING, notice.to_string()))
    } else {
        None
    };

    if let Some((kind, icon, text)) = status {
        let line = Line::from(Span::styled(
            format!(" {icon} {text}"),
            theme::status_style(kind),
        ));
        f.render_widget(Paragraph::new(line), area);
    }
}

fn render_footer(f: &mut Frame, view: View, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (index, binding) in keys::bindings(view).iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled("  ", Style::default()));
        }
        spans.push(Span::styled(binding.keys, theme::KEY_STYLE));
        spans.push(Span::styled(
            format!(" {}", binding.description),
            theme::MUTED_STYLE,
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
