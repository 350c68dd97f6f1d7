use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use curltree_core::{CreateProfileRequest, Profile, UpdateProfileRequest};
use curltree_session::{
    Bootstrap, Command, Completion, MutationDispatcher, MutationError, Outcome, Session,
    SessionEvent, View,
};
use curltree_storage::{ProfileStore, SqliteProfileStore, StoreError};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const ADA_FP: &str = "ssh-ed25519:ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12ab12";
const OTHER_FP: &str = "ssh-ed25519:cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34cd34";

fn key(code: KeyCode) -> SessionEvent {
    SessionEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn ctrl(c: char) -> SessionEvent {
    SessionEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
}

fn type_text(session: &mut Session, text: &str) {
    for c in text.chars() {
        session.handle(key(KeyCode::Char(c)));
    }
}

fn create_request(fingerprint: &str, handle: &str) -> CreateProfileRequest {
    CreateProfileRequest {
        fingerprint: fingerprint.to_string(),
        full_name: "Someone Else".to_string(),
        handle: handle.to_string(),
        bio: String::new(),
        links: Vec::new(),
    }
}

struct Harness {
    session: Session,
    dispatcher: MutationDispatcher,
    rx: mpsc::Receiver<Completion>,
}

impl Harness {
    fn new(store: Arc<dyn ProfileStore>, bootstrap: Bootstrap) -> Self {
        let (tx, rx) = mpsc::channel(4);
        Self {
            session: Session::from_bootstrap(bootstrap),
            dispatcher: MutationDispatcher::new(store, tx),
            rx,
        }
    }

    fn send(&mut self, event: SessionEvent) -> bool {
        match self.session.handle(event) {
            Some(Command::Dispatch { ticket, mutation }) => {
                self.dispatcher.dispatch(ticket, mutation);
                true
            }
            None => false,
        }
    }

    async fn settle(&mut self) -> Completion {
        let completion = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("completion in time")
            .expect("channel open");
        self.session
            .handle(SessionEvent::Completed(completion.clone()));
        completion
    }
}

#[tokio::test]
async fn first_visit_creates_profile() {
    let store = Arc::new(SqliteProfileStore::open_in_memory().expect("open db"));
    let mut harness = Harness::new(
        store.clone(),
        Bootstrap::NotRegistered {
            fingerprint: ADA_FP.to_string(),
        },
    );
    assert_eq!(harness.session.view(), View::ProfileCreate);

    type_text(&mut harness.session, "Ada Lovelace");
    harness.send(key(KeyCode::Tab));
    type_text(&mut harness.session, "ada");
    assert!(harness.send(ctrl('s')));
    harness.settle().await;

    assert_eq!(harness.session.view(), View::ProfileView);
    assert_eq!(
        harness.session.take_message().as_deref(),
        Some("Profile created!")
    );
    let stored = store
        .find_by_fingerprint(ADA_FP)
        .expect("lookup")
        .expect("stored");
    assert_eq!(stored.handle, "ada");
    assert_eq!(harness.session.profile(), Some(&stored));
}

#[tokio::test]
async fn taken_handle_keeps_create_form() {
    let store = Arc::new(SqliteProfileStore::open_in_memory().expect("open db"));
    store
        .create(&create_request(OTHER_FP, "ada"))
        .expect("seed");
    let mut harness = Harness::new(
        store.clone(),
        Bootstrap::NotRegistered {
            fingerprint: ADA_FP.to_string(),
        },
    );

    type_text(&mut harness.session, "Ada Lovelace");
    harness.send(key(KeyCode::Tab));
    type_text(&mut harness.session, "ada");
    let before = harness.session.form().clone();

    assert!(harness.send(ctrl('s')));
    let completion = harness.settle().await;
    assert_eq!(
        completion.outcome,
        Outcome::Failed(MutationError::DuplicateHandle("ada".to_string()))
    );
    assert_eq!(harness.session.view(), View::ProfileCreate);
    assert_eq!(harness.session.form(), &before);
    assert!(store.find_by_fingerprint(ADA_FP).expect("lookup").is_none());
}

#[tokio::test]
async fn edit_with_link_changes_round_trips_through_storage() {
    let store = Arc::new(SqliteProfileStore::open_in_memory().expect("open db"));
    let mut request = create_request(ADA_FP, "ada");
    request.links = vec![
        curltree_core::LinkInput::new("One", "https://one.dev"),
        curltree_core::LinkInput::new("Two", "https://two.dev"),
    ];
    let profile = store.create(&request).expect("seed");
    let mut harness = Harness::new(
        store.clone(),
        Bootstrap::Found {
            fingerprint: ADA_FP.to_string(),
            profile,
        },
    );

    harness.send(ctrl('e'));
    for _ in 0..3 {
        harness.send(key(KeyCode::Down));
    }
    harness.send(ctrl('d'));
    assert_eq!(harness.session.form().field_count(), 5);
    assert!(harness.send(ctrl('s')));
    harness.settle().await;

    let stored = store.find_by_handle("ada").expect("lookup").expect("stored");
    assert_eq!(stored.links.len(), 1);
    assert_eq!(stored.links[0].name, "Two");
    assert_eq!(stored.links[0].position, 0);
}

#[tokio::test]
async fn confirmed_delete_ends_session() {
    let store = Arc::new(SqliteProfileStore::open_in_memory().expect("open db"));
    let profile = store.create(&create_request(ADA_FP, "ada")).expect("seed");
    let mut harness = Harness::new(
        store.clone(),
        Bootstrap::Found {
            fingerprint: ADA_FP.to_string(),
            profile,
        },
    );

    harness.send(ctrl('d'));
    assert!(harness.send(key(KeyCode::Char('y'))));
    harness.settle().await;

    assert!(harness.session.should_quit());
    assert!(store.find_by_handle("ada").expect("lookup").is_none());
}

/// Holds `update` until the test opens the gate.
struct GatedStore {
    inner: SqliteProfileStore,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl GatedStore {
    fn wait(&self) {
        let (lock, cvar) = &*self.gate;
        let mut open = lock.lock().expect("gate lock");
        while !*open {
            open = cvar.wait(open).expect("gate wait");
        }
    }
}

impl ProfileStore for GatedStore {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Profile>, StoreError> {
        self.inner.find_by_fingerprint(fingerprint)
    }

    fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>, StoreError> {
        self.inner.find_by_handle(handle)
    }

    fn create(&self, request: &CreateProfileRequest) -> Result<Profile, StoreError> {
        self.inner.create(request)
    }

    fn update(&self, id: &str, request: &UpdateProfileRequest) -> Result<Profile, StoreError> {
        self.wait();
        self.inner.update(id, request)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id)
    }
}

fn open_gate(gate: &Arc<(Mutex<bool>, Condvar)>) {
    let (lock, cvar) = &**gate;
    *lock.lock().expect("gate lock") = true;
    cvar.notify_all();
}

#[tokio::test]
async fn slow_save_does_not_block_input_and_survives_cancel() {
    let inner = SqliteProfileStore::open_in_memory().expect("open db");
    let profile = inner.create(&create_request(ADA_FP, "ada")).expect("seed");
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let store = Arc::new(GatedStore {
        inner,
        gate: gate.clone(),
    });
    let mut harness = Harness::new(
        store.clone(),
        Bootstrap::Found {
            fingerprint: ADA_FP.to_string(),
            profile,
        },
    );

    harness.send(ctrl('e'));
    harness.send(key(KeyCode::End));
    type_text(&mut harness.session, " Jr");
    assert!(harness.send(ctrl('s')));

    // Input keeps flowing while the update is parked.
    type_text(&mut harness.session, "!");
    assert!(!harness.send(ctrl('s')));
    harness.send(key(KeyCode::Esc));
    assert_eq!(harness.session.view(), View::ProfileEdit);
    assert!(harness.rx.try_recv().is_err());

    open_gate(&gate);
    harness.settle().await;

    assert_eq!(harness.session.view(), View::ProfileView);
    let stored = store.find_by_handle("ada").expect("lookup").expect("stored");
    assert_eq!(stored.full_name, "Someone Else Jr");
    assert_eq!(harness.session.profile(), Some(&stored));
}

/// Reports every handle as free, so the conflict surfaces from `create`.
struct RacyStore {
    inner: SqliteProfileStore,
}

impl ProfileStore for RacyStore {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Profile>, StoreError> {
        self.inner.find_by_fingerprint(fingerprint)
    }

    fn find_by_handle(&self, _handle: &str) -> Result<Option<Profile>, StoreError> {
        Ok(None)
    }

    fn create(&self, request: &CreateProfileRequest) -> Result<Profile, StoreError> {
        self.inner.create(request)
    }

    fn update(&self, id: &str, request: &UpdateProfileRequest) -> Result<Profile, StoreError> {
        self.inner.update(id, request)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id)
    }
}

#[tokio::test]
async fn storage_conflict_after_clean_precheck_is_duplicate_handle() {
    let inner = SqliteProfileStore::open_in_memory().expect("open db");
    inner.create(&create_request(OTHER_FP, "ada")).expect("seed");
    let mut harness = Harness::new(
        Arc::new(RacyStore { inner }),
        Bootstrap::NotRegistered {
            fingerprint: ADA_FP.to_string(),
        },
    );

    type_text(&mut harness.session, "Ada Lovelace");
    harness.send(key(KeyCode::Tab));
    type_text(&mut harness.session, "ada");
    harness.send(ctrl('s'));
    let completion = harness.settle().await;

    assert_eq!(
        completion.outcome,
        Outcome::Failed(MutationError::DuplicateHandle("ada".to_string()))
    );
    assert_eq!(harness.session.view(), View::ProfileCreate);
    assert_eq!(
        harness.session.take_error().as_deref(),
        Some("Handle 'ada' is already taken")
    );
}

#[tokio::test]
async fn cancelled_create_that_conflicts_explains_itself_on_exit() {
    let inner = SqliteProfileStore::open_in_memory().expect("open db");
    inner.create(&create_request(OTHER_FP, "ada")).expect("seed");
    let mut harness = Harness::new(
        Arc::new(RacyStore { inner }),
        Bootstrap::NotRegistered {
            fingerprint: ADA_FP.to_string(),
        },
    );

    type_text(&mut harness.session, "Ada Lovelace");
    harness.send(key(KeyCode::Tab));
    type_text(&mut harness.session, "ada");
    assert!(harness.send(ctrl('s')));
    harness.send(key(KeyCode::Esc));
    assert!(!harness.session.should_quit());
    harness.settle().await;

    assert!(harness.session.should_quit());
    assert_eq!(
        harness.session.exit_note(),
        Some("Profile was not created: Handle 'ada' is already taken")
    );
}
