use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const FOCUSED_BORDER: Style = Style::new().fg(Color::Rgb(131, 165, 152));
pub const IDLE_BORDER: Style = Style::new().fg(Color::Rgb(102, 92, 84));
pub const PLACEHOLDER_STYLE: Style = Style::new()
    .fg(Color::Rgb(146, 131, 116))
    .add_modifier(Modifier::ITALIC);
pub const CURSOR_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black);
pub const KEY_STYLE: Style = Style::new()
    .fg(Color::Rgb(250, 189, 47))
    .add_modifier(Modifier::BOLD);
pub const MUTED_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));
pub const DIALOG_BORDER: Style = Style::new()
    .fg(Color::Rgb(254, 128, 25))
    .add_modifier(Modifier::BOLD);

pub fn status_style(kind: StatusKind) -> Style {
    let color = match kind {
        StatusKind::Success => Color::Rgb(184, 187, 38),
        StatusKind::Error => Color::Rgb(251, 73, 52),
        StatusKind::Pending => Color::Rgb(250, 189, 47),
    };
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
    Pending,
}

pub mod icons {
    pub const LINK: &str = "🔗";
    pub const OK: &str = "✓";
    pub const ERROR: &str = "✗";
    pub const PENDING: &str = "…";
}
