use crate::session::View;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Edit,
    Delete,
    Quit,
    NextField,
    PrevField,
    AddLink,
    RemoveLink,
    Save,
    Cancel,
    Confirm,
    Deny,
    Interrupt,
    Input(KeyEvent),
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub keys: &'static str,
    pub description: &'static str,
}

const fn binding(keys: &'static str, description: &'static str) -> Binding {
    Binding { keys, description }
}

const VIEW_BINDINGS: &[Binding] = &[
    binding("ctrl+e", "edit"),
    binding("ctrl+d", "delete"),
    binding("q", "quit"),
];

const EDIT_BINDINGS: &[Binding] = &[
    binding("tab/↓", "next field"),
    binding("shift+tab/↑", "previous field"),
    binding("ctrl+n", "add link"),
    binding("ctrl+d", "remove link"),
    binding("ctrl+s", "save"),
    binding("esc", "cancel"),
];

const CREATE_BINDINGS: &[Binding] = &[
    binding("tab/↓", "next field"),
    binding("shift+tab/↑", "previous field"),
    binding("ctrl+n", "add link"),
    binding("ctrl+d", "remove link"),
    binding("ctrl+s", "create"),
    binding("esc", "quit"),
];

const CONFIRM_BINDINGS: &[Binding] = &[binding("y", "delete"), binding("n/esc", "keep")];

const INTERRUPT_BINDINGS: &[Binding] = &[binding("ctrl+c", "exit")];

pub fn bindings(view: View) -> &'static [Binding] {
    match view {
        View::ProfileView => VIEW_BINDINGS,
        View::ProfileEdit => EDIT_BINDINGS,
        View::ProfileCreate => CREATE_BINDINGS,
        View::ConfirmDelete => CONFIRM_BINDINGS,
        View::Loading | View::Error => INTERRUPT_BINDINGS,
    }
}

fn ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

pub fn resolve(view: View, key: KeyEvent) -> Action {
    if ctrl(&key, 'c') {
        return Action::Interrupt;
    }

    match view {
        View::ProfileView => {
            if ctrl(&key, 'e') {
                Action::Edit
            } else if ctrl(&key, 'd') {
                Action::Delete
            } else if key.code == KeyCode::Char('q') && key.modifiers.is_empty() {
                Action::Quit
            } else {
                Action::Ignore
            }
        }
        View::ProfileEdit | View::ProfileCreate => {
            if ctrl(&key, 'n') {
                return Action::AddLink;
            }
            if ctrl(&key, 'd') {
                return Action::RemoveLink;
            }
            if ctrl(&key, 's') {
                return Action::Save;
            }
            match key.code {
                KeyCode::Tab | KeyCode::Down => Action::NextField,
                KeyCode::BackTab | KeyCode::Up => Action::PrevField,
                KeyCode::Esc => Action::Cancel,
                _ => Action::Input(key),
            }
        }
        View::ConfirmDelete => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Action::Confirm,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Action::Deny,
            _ => Action::Ignore,
        },
        View::Loading | View::Error => Action::Ignore,
    }
}
