pub mod dispatch;
pub mod form;
pub mod identity;
pub mod keys;
pub mod session;
pub mod theme;
pub mod ui;

pub use dispatch::{Completion, Mutation, MutationDispatcher, MutationError, Outcome};
pub use form::{FormError, ProfileForm};
pub use identity::{Bootstrap, CredentialSource};
pub use session::{Command, Session, SessionEvent, View};
