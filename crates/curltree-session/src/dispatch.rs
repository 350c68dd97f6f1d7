//! Storage mutations run off the input loop; each resolves to one [`Completion`].

use curltree_core::{CreateProfileRequest, Profile, UpdateProfileRequest};
use curltree_storage::{ProfileStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(CreateProfileRequest),
    Update {
        id: String,
        current_handle: String,
        request: UpdateProfileRequest,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create(_) => MutationKind::Create,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }
}

impl MutationKind {
    pub fn label(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("Handle '{0}' is already taken")]
    DuplicateHandle(String),
    #[error("Profile not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for MutationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::HandleTaken { handle } => MutationError::DuplicateHandle(handle),
            StoreError::NotFound => MutationError::NotFound,
            StoreError::Invalid(validation) => MutationError::Invalid(validation.to_string()),
            StoreError::AlreadyRegistered => {
                MutationError::Invalid("This key already owns a profile".to_string())
            }
            other => MutationError::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(Profile),
    Updated(Profile),
    Deleted,
    Failed(MutationError),
}

/// The single event a dispatched mutation resolves to. `ticket` ties it back
/// to the submission that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub ticket: u64,
    pub outcome: Outcome,
}

fn ensure_handle_free(store: &dyn ProfileStore, handle: &str) -> Result<(), MutationError> {
    if store.handle_exists(handle)? {
        return Err(MutationError::DuplicateHandle(handle.to_string()));
    }
    Ok(())
}

/// Pre-check plus one storage call. Blocking; run it on a blocking thread.
pub fn execute(store: &dyn ProfileStore, mutation: Mutation) -> Outcome {
    let result = match mutation {
        Mutation::Create(request) => ensure_handle_free(store, &request.handle)
            .and_then(|()| store.create(&request).map_err(MutationError::from))
            .map(Outcome::Created),
        Mutation::Update {
            id,
            current_handle,
            request,
        } => {
            let precheck = if request.handle != current_handle {
                ensure_handle_free(store, &request.handle)
            } else {
                Ok(())
            };
            precheck
                .and_then(|()| store.update(&id, &request).map_err(MutationError::from))
                .map(Outcome::Updated)
        }
        Mutation::Delete { id } => store
            .delete(&id)
            .map(|()| Outcome::Deleted)
            .map_err(MutationError::from),
    };
    result.unwrap_or_else(Outcome::Failed)
}

#[derive(Clone)]
pub struct MutationDispatcher {
    store: Arc<dyn ProfileStore>,
    tx: mpsc::Sender<Completion>,
}

impl MutationDispatcher {
    pub fn new(store: Arc<dyn ProfileStore>, tx: mpsc::Sender<Completion>) -> Self {
        Self { store, tx }
    }

    /// Detaches the mutation. Its completion arrives on the channel even if
    /// the session has moved on in the meantime.
    pub fn dispatch(&self, ticket: u64, mutation: Mutation) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let kind = mutation.kind();
        debug!(event = "mutation_dispatched", ticket, kind = kind.label());

        tokio::spawn(async move {
            let outcome =
                match tokio::task::spawn_blocking(move || execute(store.as_ref(), mutation)).await
                {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(event = "mutation_task_failed", ticket, error = %err);
                        Outcome::Failed(MutationError::Storage(err.to_string()))
                    }
                };
            if let Outcome::Failed(err) = &outcome {
                debug!(event = "mutation_failed", ticket, kind = kind.label(), error = %err);
            }
            if tx.send(Completion { ticket, outcome }).await.is_err() {
                debug!(event = "completion_dropped", ticket);
            }
        })
    }
}
