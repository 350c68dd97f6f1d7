use chrono::{DateTime, Utc};
use curltree_core::{
    new_id, CreateProfileRequest, Link, LinkInput, Profile, UpdateProfileRequest, ValidationError,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

pub const PROFILE_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("handle '{handle}' is already taken")]
    HandleTaken { handle: String },
    #[error("this key already owns a profile")]
    AlreadyRegistered,
    #[error("profile not found")]
    NotFound,
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Persistent profile storage. Every write is atomic with respect to the
/// link list: readers see the whole list before or after a mutation.
pub trait ProfileStore: Send + Sync {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Profile>, StoreError>;
    fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>, StoreError>;
    fn create(&self, request: &CreateProfileRequest) -> Result<Profile, StoreError>;
    fn update(&self, id: &str, request: &UpdateProfileRequest) -> Result<Profile, StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn handle_exists(&self, handle: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_handle(handle)?.is_some())
    }
}

pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let current = self.schema_version()?;
        if current > PROFILE_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchemaVersion {
                found: current,
                supported: PROFILE_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let conn = self.lock()?;
            conn.execute_batch(include_str!("../migrations/0001_profiles.sql"))?;
            conn.execute("PRAGMA user_version = 1", []).map(|_| ())?;
            debug!(event = "schema_migrated", version = 1);
        }

        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let exists = conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    pub fn profile_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?)
    }
}

impl ProfileStore for SqliteProfileStore {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Profile>, StoreError> {
        let conn = self.lock()?;
        load_profile(&conn, ProfileKey::Fingerprint(fingerprint))
    }

    fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>, StoreError> {
        let conn = self.lock()?;
        load_profile(&conn, ProfileKey::Handle(handle))
    }

    fn create(&self, request: &CreateProfileRequest) -> Result<Profile, StoreError> {
        let mut request = request.clone();
        request.sanitize_and_validate()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = new_id();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "
            INSERT INTO profiles (id, fingerprint, full_name, handle, bio, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
            params![
                id,
                request.fingerprint,
                request.full_name,
                request.handle,
                request.bio,
                now,
            ],
        )
        .map_err(|err| map_unique_violation(err, &request.handle))?;
        replace_links(&tx, &id, &request.links)?;

        let profile = load_profile(&tx, ProfileKey::Id(&id))?.ok_or(StoreError::NotFound)?;
        tx.commit()?;
        debug!(event = "profile_created", profile_id = %profile.id, handle = %profile.handle);
        Ok(profile)
    }

    fn update(&self, id: &str, request: &UpdateProfileRequest) -> Result<Profile, StoreError> {
        let mut request = request.clone();
        request.sanitize_and_validate()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx
            .execute(
                "
                UPDATE profiles
                SET full_name = ?1, handle = ?2, bio = ?3, updated_at = ?4
                WHERE id = ?5
                ",
                params![
                    request.full_name,
                    request.handle,
                    request.bio,
                    Utc::now().to_rfc3339(),
                    id,
                ],
            )
            .map_err(|err| map_unique_violation(err, &request.handle))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        replace_links(&tx, id, &request.links)?;

        let profile = load_profile(&tx, ProfileKey::Id(id))?.ok_or(StoreError::NotFound)?;
        tx.commit()?;
        debug!(event = "profile_updated", profile_id = %profile.id, handle = %profile.handle);
        Ok(profile)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(event = "profile_deleted", profile_id = %id);
        Ok(())
    }
}

enum ProfileKey<'a> {
    Id(&'a str),
    Fingerprint(&'a str),
    Handle(&'a str),
}

fn load_profile(conn: &Connection, key: ProfileKey<'_>) -> Result<Option<Profile>, StoreError> {
    let (column, value) = match key {
        ProfileKey::Id(value) => ("id", value),
        ProfileKey::Fingerprint(value) => ("fingerprint", value),
        ProfileKey::Handle(value) => ("handle", value),
    };
    let sql = format!(
        "
        SELECT id, fingerprint, full_name, handle, bio, created_at, updated_at
        FROM profiles
        WHERE {column} = ?1
        "
    );
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .optional()?;

    let Some((id, fingerprint, full_name, handle, bio, created_at, updated_at)) = row else {
        return Ok(None);
    };
    let links = load_links(conn, &id)?;

    Ok(Some(Profile {
        id,
        fingerprint,
        full_name,
        handle,
        bio,
        links,
        created_at: parse_timestamp(created_at)?,
        updated_at: parse_timestamp(updated_at)?,
    }))
}

fn load_links(conn: &Connection, profile_id: &str) -> Result<Vec<Link>, StoreError> {
    let mut statement = conn.prepare(
        "
        SELECT id, name, url, position
        FROM links
        WHERE profile_id = ?1
        ORDER BY position ASC
        ",
    )?;
    let rows = statement.query_map([profile_id], |row| {
        Ok(Link {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            position: row.get::<_, i64>(3)? as u32,
        })
    })?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

/// Wholesale replace: positions are reassigned 0..N-1 in input order.
fn replace_links(tx: &Transaction<'_>, profile_id: &str, links: &[LinkInput]) -> Result<(), StoreError> {
    tx.execute("DELETE FROM links WHERE profile_id = ?1", [profile_id])?;
    let mut statement = tx.prepare(
        "
        INSERT INTO links (id, profile_id, name, url, position)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
    )?;
    for (position, link) in links.iter().enumerate() {
        statement.execute(params![
            new_id(),
            profile_id,
            link.name,
            link.url,
            position as i64,
        ])?;
    }
    Ok(())
}

fn map_unique_violation(err: rusqlite::Error, handle: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if message.contains("profiles.handle") {
                return StoreError::HandleTaken {
                    handle: handle.to_string(),
                };
            }
            if message.contains("profiles.fingerprint") {
                return StoreError::AlreadyRegistered;
            }
        }
    }
    StoreError::Sqlite(err)
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StoreError::Timestamp(err.to_string()))
}
