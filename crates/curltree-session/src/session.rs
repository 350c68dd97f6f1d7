//! Per-connection state machine. Every input or completion goes through
//! [`Session::handle`], which returns the storage work to start, if any.

use crate::dispatch::{Completion, Mutation, MutationKind, Outcome};
use crate::form::ProfileForm;
use crate::identity::Bootstrap;
use crate::keys::{self, Action};
use crossterm::event::KeyEvent;
use curltree_core::Profile;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Loading,
    Error,
    ProfileView,
    ProfileEdit,
    ProfileCreate,
    ConfirmDelete,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Loading => "Loading",
            View::Error => "Error",
            View::ProfileView => "Your Profile",
            View::ProfileEdit => "Edit Profile",
            View::ProfileCreate => "Create Profile",
            View::ConfirmDelete => "Delete Profile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Key(KeyEvent),
    Completed(Completion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dispatch { ticket: u64, mutation: Mutation },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    ticket: u64,
    kind: MutationKind,
}

pub const CHANGE_IN_PROGRESS: &str = "Another change is still in progress";

#[derive(Debug, Default)]
pub struct Session {
    view: View,
    fingerprint: Option<String>,
    profile: Option<Profile>,
    form: ProfileForm,
    pending: Option<Pending>,
    next_ticket: u64,
    cancel_requested: bool,
    message: Option<String>,
    error: Option<String>,
    fatal: Option<String>,
    should_quit: bool,
    exit_note: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bootstrap(bootstrap: Bootstrap) -> Self {
        let mut session = Self::new();
        session.apply_bootstrap(bootstrap);
        session
    }

    pub fn apply_bootstrap(&mut self, bootstrap: Bootstrap) {
        match bootstrap {
            Bootstrap::Found {
                fingerprint,
                profile,
            } => {
                self.fingerprint = Some(fingerprint);
                self.profile = Some(profile);
                self.view = View::ProfileView;
            }
            Bootstrap::NotRegistered { fingerprint } => {
                self.fingerprint = Some(fingerprint);
                self.form = ProfileForm::for_create();
                self.view = View::ProfileCreate;
            }
            Bootstrap::NoIdentity => {
                self.fatal = Some(
                    "No public key was presented. Connect with an SSH key to manage your profile."
                        .to_string(),
                );
                self.view = View::Error;
            }
            Bootstrap::Fault(reason) => {
                self.fatal = Some(format!("Could not start the session: {reason}"));
                self.view = View::Error;
            }
        }
        debug!(event = "session_ready", view = ?self.view);
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn form(&self) -> &ProfileForm {
        &self.form
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Status text while a mutation is in flight.
    pub fn pending_notice(&self) -> Option<&'static str> {
        let pending = self.pending?;
        if self.cancel_requested {
            return Some("Waiting for the pending change to finish");
        }
        Some(match pending.kind {
            MutationKind::Create | MutationKind::Update => "Saving",
            MutationKind::Delete => "Deleting",
        })
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn exit_note(&self) -> Option<&str> {
        self.exit_note.as_deref()
    }

    /// Consumes the one-shot success message.
    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    /// Consumes the one-shot error message.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Option<Command> {
        match event {
            SessionEvent::Key(key) => self.handle_key(key),
            SessionEvent::Completed(completion) => {
                self.handle_completion(completion);
                None
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.should_quit {
            return None;
        }
        let action = keys::resolve(self.view, key);
        if action == Action::Interrupt {
            self.terminate(None);
            return None;
        }

        match self.view {
            View::Loading | View::Error => None,
            View::ProfileView => {
                match action {
                    Action::Edit => self.begin_edit(),
                    Action::Delete => self.view = View::ConfirmDelete,
                    Action::Quit => self.terminate(None),
                    _ => {}
                }
                None
            }
            View::ProfileEdit | View::ProfileCreate => match action {
                Action::Save => self.submit_form(),
                Action::Cancel => {
                    self.cancel();
                    None
                }
                Action::NextField => {
                    self.form.focus_next();
                    None
                }
                Action::PrevField => {
                    self.form.focus_previous();
                    None
                }
                Action::AddLink => {
                    self.form.append_link_pair();
                    None
                }
                Action::RemoveLink => {
                    self.form.remove_focused_link_pair();
                    None
                }
                Action::Input(key) => {
                    self.form.dispatch_key(key);
                    None
                }
                _ => None,
            },
            View::ConfirmDelete => match action {
                Action::Confirm => self.submit_delete(),
                Action::Deny | Action::Cancel => {
                    self.cancel();
                    None
                }
                _ => None,
            },
        }
    }

    fn begin_edit(&mut self) {
        let Some(profile) = &self.profile else {
            self.error = Some("Profile not found".to_string());
            return;
        };
        self.form.load(profile);
        self.view = View::ProfileEdit;
    }

    /// Leaves the current view, or records the request when a mutation is in
    /// flight so it can be honoured once the outcome is known.
    fn cancel(&mut self) {
        if self.pending.is_some() {
            self.cancel_requested = true;
            return;
        }
        self.leave_current_view();
    }

    fn leave_current_view(&mut self) {
        match self.view {
            View::ProfileEdit | View::ConfirmDelete => self.view = View::ProfileView,
            View::ProfileCreate => self.terminate(None),
            _ => {}
        }
    }

    fn next_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn start(&mut self, mutation: Mutation) -> Option<Command> {
        let ticket = self.next_ticket();
        self.pending = Some(Pending {
            ticket,
            kind: mutation.kind(),
        });
        self.cancel_requested = false;
        Some(Command::Dispatch { ticket, mutation })
    }

    fn submit_form(&mut self) -> Option<Command> {
        if self.pending.is_some() {
            self.error = Some(CHANGE_IN_PROGRESS.to_string());
            return None;
        }
        if let Err(err) = self.form.validate() {
            self.error = Some(err.to_string());
            return None;
        }

        let mutation = if self.view == View::ProfileCreate {
            let Some(fingerprint) = &self.fingerprint else {
                self.error = Some("No identity is attached to this session".to_string());
                return None;
            };
            Mutation::Create(self.form.to_create_request(fingerprint))
        } else {
            let Some(profile) = &self.profile else {
                self.error = Some("Profile not found".to_string());
                return None;
            };
            Mutation::Update {
                id: profile.id.clone(),
                current_handle: profile.handle.clone(),
                request: self.form.to_update_request(),
            }
        };
        self.start(mutation)
    }

    fn submit_delete(&mut self) -> Option<Command> {
        if self.pending.is_some() {
            self.error = Some(CHANGE_IN_PROGRESS.to_string());
            return None;
        }
        let Some(profile) = &self.profile else {
            self.error = Some("Profile not found".to_string());
            return None;
        };
        let id = profile.id.clone();
        self.start(Mutation::Delete { id })
    }

    pub fn handle_completion(&mut self, completion: Completion) {
        if self.should_quit {
            debug!(event = "completion_discarded", ticket = completion.ticket, reason = "terminated");
            return;
        }
        let pending = match self.pending {
            Some(pending) if pending.ticket == completion.ticket => pending,
            _ => {
                debug!(event = "completion_discarded", ticket = completion.ticket, reason = "stale");
                return;
            }
        };
        self.pending = None;
        let cancel_requested = std::mem::take(&mut self.cancel_requested);

        match completion.outcome {
            Outcome::Created(profile) => {
                info!(event = "profile_created", handle = %profile.handle);
                self.profile = Some(profile);
                self.view = View::ProfileView;
                self.message = Some("Profile created!".to_string());
            }
            Outcome::Updated(profile) => {
                info!(event = "profile_updated", handle = %profile.handle);
                self.profile = Some(profile);
                self.view = View::ProfileView;
                self.message = Some("Profile updated!".to_string());
            }
            Outcome::Deleted => {
                info!(event = "profile_deleted");
                self.profile = None;
                self.terminate(Some("Profile deleted. Goodbye!".to_string()));
            }
            Outcome::Failed(err) => {
                debug!(event = "mutation_rejected", kind = pending.kind.label(), error = %err);
                if cancel_requested && self.view == View::ProfileCreate {
                    self.terminate(Some(format!("Profile was not created: {err}")));
                    return;
                }
                self.error = Some(err.to_string());
                if cancel_requested {
                    self.leave_current_view();
                }
            }
        }
    }

    fn terminate(&mut self, note: Option<String>) {
        self.should_quit = true;
        self.exit_note = note;
    }
}
