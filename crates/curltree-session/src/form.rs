//! Editable profile form: three fixed fields followed by link pairs.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use curltree_core::validation::handle_is_well_formed;
use curltree_core::{
    CreateProfileRequest, LinkInput, Profile, UpdateProfileRequest, MAX_BIO_CHARS,
    MAX_FULL_NAME_CHARS, MAX_HANDLE_CHARS, MAX_LINK_NAME_CHARS, MAX_URL_CHARS,
};
use thiserror::Error;

pub const FIXED_FIELD_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    MultiLine,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub placeholder: &'static str,
    pub max_len: usize,
    pub kind: FieldKind,
    value: String,
    cursor: usize,
    focused: bool,
}

impl FormField {
    pub fn new(
        label: &'static str,
        placeholder: &'static str,
        max_len: usize,
        kind: FieldKind,
    ) -> Self {
        Self {
            label,
            placeholder,
            max_len,
            kind,
            value: String::new(),
            cursor: 0,
            focused: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.chars().take(self.max_len).collect();
        self.cursor = self.char_len();
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.value.len())
    }

    fn insert(&mut self, c: char) -> bool {
        if self.char_len() >= self.max_len {
            return false;
        }
        let offset = self.byte_offset(self.cursor);
        self.value.insert(offset, c);
        self.cursor += 1;
        true
    }

    /// Applies one text-editing keystroke. Returns whether the key was used.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return false;
        }
        match key.code {
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Enter if self.kind == FieldKind::MultiLine => self.insert('\n'),
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                let offset = self.byte_offset(self.cursor);
                self.value.remove(offset);
                true
            }
            KeyCode::Delete => {
                if self.cursor >= self.char_len() {
                    return false;
                }
                let offset = self.byte_offset(self.cursor);
                self.value.remove(offset);
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_len());
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.char_len();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedFields {
    pub full_name: FormField,
    pub handle: FormField,
    pub bio: FormField,
}

impl FixedFields {
    fn new() -> Self {
        Self {
            full_name: FormField::new(
                "Full Name",
                "Ada Lovelace",
                MAX_FULL_NAME_CHARS,
                FieldKind::Text,
            ),
            handle: FormField::new("Handle", "ada", MAX_HANDLE_CHARS, FieldKind::Text),
            bio: FormField::new(
                "Bio",
                "A few words about yourself",
                MAX_BIO_CHARS,
                FieldKind::MultiLine,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub name: FormField,
    pub url: FormField,
}

impl LinkPair {
    pub fn empty() -> Self {
        Self {
            name: FormField::new("Link Name", "Website", MAX_LINK_NAME_CHARS, FieldKind::Text),
            url: FormField::new("URL", "https://", MAX_URL_CHARS, FieldKind::Url),
        }
    }

    fn is_blank(&self) -> bool {
        self.name.is_blank() && self.url.is_blank()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Full name is required")]
    FullNameRequired,
    #[error("Handle is required")]
    HandleRequired,
    #[error("Handle may only contain letters, numbers, '-' and '_', and cannot start or end with '-' or '_'")]
    HandleMalformed,
    #[error("Link {}: both a name and a URL are required", .index + 1)]
    IncompleteLink { index: usize },
    #[error("Link {}: URL must start with http:// or https://", .index + 1)]
    LinkScheme { index: usize },
}

/// The field list is `fixed` followed by `links`; a flat index addresses
/// `0..3` for the fixed fields and `3 + 2 * pair + {0, 1}` for link pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileForm {
    fixed: FixedFields,
    links: Vec<LinkPair>,
    focus: usize,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileForm {
    pub fn new() -> Self {
        let mut form = Self {
            fixed: FixedFields::new(),
            links: Vec::new(),
            focus: 0,
        };
        form.sync_focus();
        form
    }

    /// A blank registration form with one empty link pair to fill in.
    pub fn for_create() -> Self {
        let mut form = Self::new();
        form.append_link_pair();
        form
    }

    pub fn load(&mut self, profile: &Profile) {
        self.fixed = FixedFields::new();
        self.fixed.full_name.set_value(&profile.full_name);
        self.fixed.handle.set_value(&profile.handle);
        self.fixed.bio.set_value(&profile.bio);

        let mut links: Vec<_> = profile.links.iter().collect();
        links.sort_by_key(|link| link.position);
        self.links = links
            .into_iter()
            .map(|link| {
                let mut pair = LinkPair::empty();
                pair.name.set_value(&link.name);
                pair.url.set_value(&link.url);
                pair
            })
            .collect();

        self.focus = 0;
        self.sync_focus();
    }

    pub fn fixed(&self) -> &FixedFields {
        &self.fixed
    }

    pub fn links(&self) -> &[LinkPair] {
        &self.links
    }

    pub fn field_count(&self) -> usize {
        FIXED_FIELD_COUNT + self.links.len() * 2
    }

    pub fn focus_index(&self) -> usize {
        self.focus
    }

    pub fn field(&self, index: usize) -> Option<&FormField> {
        match index {
            0 => Some(&self.fixed.full_name),
            1 => Some(&self.fixed.handle),
            2 => Some(&self.fixed.bio),
            _ => {
                let offset = index - FIXED_FIELD_COUNT;
                let pair = self.links.get(offset / 2)?;
                Some(if offset % 2 == 0 { &pair.name } else { &pair.url })
            }
        }
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut FormField> {
        match index {
            0 => Some(&mut self.fixed.full_name),
            1 => Some(&mut self.fixed.handle),
            2 => Some(&mut self.fixed.bio),
            _ => {
                let offset = index - FIXED_FIELD_COUNT;
                let pair = self.links.get_mut(offset / 2)?;
                Some(if offset % 2 == 0 {
                    &mut pair.name
                } else {
                    &mut pair.url
                })
            }
        }
    }

    /// Index of the link pair holding focus, if any.
    pub fn focused_link_pair(&self) -> Option<usize> {
        if self.focus < FIXED_FIELD_COUNT {
            return None;
        }
        let pair = (self.focus - FIXED_FIELD_COUNT) / 2;
        (pair < self.links.len()).then_some(pair)
    }

    fn sync_focus(&mut self) {
        let focus = self.focus;
        for index in 0..self.field_count() {
            if let Some(field) = self.field_mut(index) {
                field.focused = index == focus;
            }
        }
    }

    /// Moves focus to `index`, clamped to the last field.
    pub fn set_focus(&mut self, index: usize) {
        self.focus = index.min(self.field_count() - 1);
        self.sync_focus();
    }

    pub fn focus_next(&mut self) {
        if self.focus + 1 < self.field_count() {
            self.set_focus(self.focus + 1);
        }
    }

    pub fn focus_previous(&mut self) {
        if self.focus > 0 {
            self.set_focus(self.focus - 1);
        }
    }

    pub fn append_link_pair(&mut self) {
        self.links.push(LinkPair::empty());
    }

    /// Removes the pair containing the focused field. Returns false, leaving
    /// the form untouched, when focus is on a fixed field.
    pub fn remove_focused_link_pair(&mut self) -> bool {
        let Some(pair) = self.focused_link_pair() else {
            return false;
        };
        self.links.remove(pair);
        self.set_focus(self.focus);
        true
    }

    pub fn dispatch_key(&mut self, key: KeyEvent) -> bool {
        let focus = self.focus;
        match self.field_mut(focus) {
            Some(field) => field.handle_key(key),
            None => false,
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.fixed.full_name.is_blank() {
            return Err(FormError::FullNameRequired);
        }
        let handle = self.fixed.handle.value().trim();
        if handle.is_empty() {
            return Err(FormError::HandleRequired);
        }
        if !handle_is_well_formed(handle) {
            return Err(FormError::HandleMalformed);
        }
        for (index, pair) in self.links.iter().enumerate() {
            if pair.is_blank() {
                continue;
            }
            if pair.name.is_blank() || pair.url.is_blank() {
                return Err(FormError::IncompleteLink { index });
            }
            let url = pair.url.value().trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(FormError::LinkScheme { index });
            }
        }
        Ok(())
    }

    fn link_inputs(&self) -> Vec<LinkInput> {
        self.links
            .iter()
            .filter(|pair| !pair.is_blank())
            .map(|pair| LinkInput::new(pair.name.value().trim(), pair.url.value().trim()))
            .collect()
    }

    pub fn to_create_request(&self, fingerprint: &str) -> CreateProfileRequest {
        CreateProfileRequest {
            fingerprint: fingerprint.to_string(),
            full_name: self.fixed.full_name.value().trim().to_string(),
            handle: self.fixed.handle.value().trim().to_string(),
            bio: self.fixed.bio.value().trim().to_string(),
            links: self.link_inputs(),
        }
    }

    pub fn to_update_request(&self) -> UpdateProfileRequest {
        UpdateProfileRequest {
            full_name: self.fixed.full_name.value().trim().to_string(),
            handle: self.fixed.handle.value().trim().to_string(),
            bio: self.fixed.bio.value().trim().to_string(),
            links: self.link_inputs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use curltree_core::Link;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(form: &mut ProfileForm, text: &str) {
        for c in text.chars() {
            form.dispatch_key(key(KeyCode::Char(c)));
        }
    }

    fn fill_pair(form: &mut ProfileForm, pair: usize, name: &str, url: &str) {
        form.set_focus(FIXED_FIELD_COUNT + pair * 2);
        type_text(form, name);
        form.focus_next();
        type_text(form, url);
    }

    fn profile_with_links(links: &[(&str, &str)]) -> Profile {
        Profile {
            id: "p-1".to_string(),
            fingerprint: "ssh-ed25519:00".to_string(),
            full_name: "Ada Lovelace".to_string(),
            handle: "ada".to_string(),
            bio: "Analyst".to_string(),
            links: links
                .iter()
                .enumerate()
                .map(|(i, (name, url))| Link {
                    id: format!("l-{i}"),
                    name: name.to_string(),
                    url: url.to_string(),
                    position: i as u32,
                })
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assert_shape(form: &ProfileForm) {
        let tail = form.field_count() - FIXED_FIELD_COUNT;
        assert_eq!(tail % 2, 0);
        assert!(form.focus_index() < form.field_count());
        let focused: Vec<usize> = (0..form.field_count())
            .filter(|i| form.field(*i).map(FormField::is_focused).unwrap_or(false))
            .collect();
        assert_eq!(focused, vec![form.focus_index()]);
    }

    #[test]
    fn new_form_has_only_fixed_fields() {
        let form = ProfileForm::new();
        assert_eq!(form.field_count(), 3);
        assert_eq!(form.focus_index(), 0);
        assert!(form.field(3).is_none());
        assert_shape(&form);

        let create = ProfileForm::for_create();
        assert_eq!(create.field_count(), 5);
        assert_shape(&create);
    }

    #[test]
    fn focus_moves_without_wrapping() {
        let mut form = ProfileForm::new();
        form.focus_previous();
        assert_eq!(form.focus_index(), 0);
        form.focus_next();
        form.focus_next();
        form.focus_next();
        assert_eq!(form.focus_index(), 2);
        assert!(form.fixed().bio.is_focused());
        assert!(!form.fixed().full_name.is_focused());
    }

    #[test]
    fn append_does_not_move_focus() {
        let mut form = ProfileForm::new();
        form.set_focus(1);
        form.append_link_pair();
        assert_eq!(form.focus_index(), 1);
        assert_eq!(form.field_count(), 5);
    }

    #[test]
    fn removing_focused_pair_collapses_tail() {
        let mut form = ProfileForm::new();
        form.append_link_pair();
        form.append_link_pair();
        assert_eq!(form.field_count(), 7);
        fill_pair(&mut form, 0, "One", "https://one.dev");
        fill_pair(&mut form, 1, "Two", "https://two.dev");

        form.set_focus(4);
        assert!(form.remove_focused_link_pair());
        assert_eq!(form.field_count(), 5);
        assert_eq!(form.field(3).map(FormField::value), Some("Two"));
        assert_eq!(form.field(4).map(FormField::value), Some("https://two.dev"));
        assert_eq!(form.focus_index(), 4);
        assert_shape(&form);
    }

    #[test]
    fn removing_last_pair_clamps_focus() {
        let mut form = ProfileForm::new();
        form.append_link_pair();
        form.set_focus(4);
        assert!(form.remove_focused_link_pair());
        assert_eq!(form.field_count(), 3);
        assert_eq!(form.focus_index(), 2);
        assert_shape(&form);
    }

    #[test]
    fn remove_is_noop_on_fixed_field() {
        let mut form = ProfileForm::new();
        assert!(!form.remove_focused_link_pair());

        form.append_link_pair();
        form.set_focus(2);
        let before = form.clone();
        assert!(!form.remove_focused_link_pair());
        assert!(!form.remove_focused_link_pair());
        assert_eq!(form, before);
    }

    #[test]
    fn keystrokes_reach_only_the_focused_field() {
        let mut form = ProfileForm::new();
        type_text(&mut form, "Ada");
        form.focus_next();
        type_text(&mut form, "ada");
        assert_eq!(form.fixed().full_name.value(), "Ada");
        assert_eq!(form.fixed().handle.value(), "ada");
        assert_eq!(form.fixed().bio.value(), "");
    }

    #[test]
    fn cursor_editing() {
        let mut field = FormField::new("Handle", "", 10, FieldKind::Text);
        for c in "adx".chars() {
            field.handle_key(key(KeyCode::Char(c)));
        }
        field.handle_key(key(KeyCode::Backspace));
        field.handle_key(key(KeyCode::Home));
        field.handle_key(key(KeyCode::Delete));
        field.handle_key(key(KeyCode::Char('A')));
        field.handle_key(key(KeyCode::End));
        field.handle_key(key(KeyCode::Char('a')));
        assert_eq!(field.value(), "Ada");
        assert_eq!(field.cursor(), 3);

        field.handle_key(key(KeyCode::Left));
        field.handle_key(key(KeyCode::Char('é')));
        assert_eq!(field.value(), "Adéa");
        assert!(!field.handle_key(key(KeyCode::Enter)));
        assert!(!field.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL)));
        assert_eq!(field.value(), "Adéa");
    }

    #[test]
    fn insert_stops_at_max_len() {
        let mut field = FormField::new("Handle", "", 3, FieldKind::Text);
        for c in "abcd".chars() {
            field.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(field.value(), "abc");
    }

    #[test]
    fn enter_adds_newline_only_in_bio() {
        let mut form = ProfileForm::new();
        form.set_focus(2);
        type_text(&mut form, "line");
        form.dispatch_key(key(KeyCode::Enter));
        type_text(&mut form, "two");
        assert_eq!(form.fixed().bio.value(), "line\ntwo");
    }

    #[test]
    fn validate_scans_in_field_order() {
        let mut form = ProfileForm::new();
        assert_eq!(form.validate(), Err(FormError::FullNameRequired));

        type_text(&mut form, "Ada");
        assert_eq!(form.validate(), Err(FormError::HandleRequired));

        form.set_focus(1);
        type_text(&mut form, "-ada");
        assert_eq!(form.validate(), Err(FormError::HandleMalformed));
        form.dispatch_key(key(KeyCode::Home));
        form.dispatch_key(key(KeyCode::Delete));
        assert!(form.validate().is_ok());
    }

    #[test]
    fn validate_requires_complete_pairs() {
        let mut form = ProfileForm::new();
        type_text(&mut form, "Ada");
        form.set_focus(1);
        type_text(&mut form, "ada");

        form.append_link_pair();
        assert!(form.validate().is_ok(), "blank pair is allowed");

        form.set_focus(3);
        type_text(&mut form, "Site");
        assert_eq!(form.validate(), Err(FormError::IncompleteLink { index: 0 }));

        form.append_link_pair();
        form.set_focus(6);
        type_text(&mut form, "https://x.dev");
        assert_eq!(form.validate(), Err(FormError::IncompleteLink { index: 0 }));

        form.set_focus(4);
        type_text(&mut form, "ada.dev");
        assert_eq!(form.validate(), Err(FormError::LinkScheme { index: 0 }));
        assert_eq!(
            FormError::LinkScheme { index: 0 }.to_string(),
            "Link 1: URL must start with http:// or https://"
        );
    }

    #[test]
    fn load_then_update_round_trips_links() {
        let profile = profile_with_links(&[("One", "https://one.dev"), ("Two", "https://two.dev")]);
        let mut form = ProfileForm::new();
        form.load(&profile);

        assert_eq!(form.field_count(), 7);
        let request = form.to_update_request();
        assert_eq!(request.full_name, "Ada Lovelace");
        assert_eq!(request.handle, "ada");
        assert_eq!(request.bio, "Analyst");
        assert_eq!(request.links, profile.link_inputs());
    }

    #[test]
    fn requests_drop_blank_pairs_and_trim() {
        let mut form = ProfileForm::for_create();
        type_text(&mut form, "  Ada Lovelace ");
        form.set_focus(1);
        type_text(&mut form, "ada ");
        form.append_link_pair();
        fill_pair(&mut form, 1, " Site ", "https://ada.dev");

        let request = form.to_create_request("ssh-ed25519:ab12");
        assert_eq!(request.fingerprint, "ssh-ed25519:ab12");
        assert_eq!(request.full_name, "Ada Lovelace");
        assert_eq!(request.handle, "ada");
        assert_eq!(request.links, vec![LinkInput::new("Site", "https://ada.dev")]);
    }
}
