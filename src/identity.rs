//! The identity provider: sign-up, sign-in (password or anonymous), sign-out
//! and account deletion, plus a feed of identity-change events.
//!
//! OAuth pop-up sign-in is not provided. A third-party provider would create
//! its identities in the same table and publish [IdentityEvent::SignedIn].

use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard},
};

use email_address::EmailAddress;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    Error,
    auth::PasswordHash,
    store::{DocumentStore, StorePath},
};

/// How many identity events a lagging subscriber may fall behind by.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The opaque ID of an identity. Every identity's data lives under this ID in the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Generate a fresh random ID.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing ID, e.g. one read from a cookie or the database.
    pub fn new(id: &str) -> Self {
        Self(id.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated principal, either registered with an email and password or anonymous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    /// `None` for anonymous identities.
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl Identity {
    /// The root of the store subtree that belongs to this identity.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidStorePath] if the ID cannot be used as a path segment.
    pub fn store_root(&self) -> Result<StorePath, Error> {
        StorePath::new(self.id.as_str())
    }
}

/// A change in the signed-in state of an identity.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut(IdentityId),
    Deleted(IdentityId),
}

impl IdentityEvent {
    /// The ID of the identity the event is about.
    pub fn identity_id(&self) -> &IdentityId {
        match self {
            IdentityEvent::SignedIn(identity) => &identity.id,
            IdentityEvent::SignedOut(id) | IdentityEvent::Deleted(id) => id,
        }
    }
}

/// Create the table that holds identities and their credentials.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_identity_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS identity (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE,
                password TEXT,
                is_anonymous INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Stores identities in SQLite and broadcasts [IdentityEvent]s to subscribers.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    db_connection: Arc<Mutex<Connection>>,
    store: Arc<dyn DocumentStore>,
    events: broadcast::Sender<IdentityEvent>,
}

impl IdentityProvider {
    /// Create a provider on a connection set up with [create_identity_table].
    ///
    /// `store` is used to delete an identity's data along with the identity.
    pub fn new(db_connection: Arc<Mutex<Connection>>, store: Arc<dyn DocumentStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            db_connection,
            store,
            events,
        }
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }

    fn publish(&self, event: IdentityEvent) {
        // Sending only fails when nobody is subscribed.
        if self.events.send(event.clone()).is_err() {
            tracing::debug!("No subscribers for identity event {event:?}");
        }
    }

    /// Register a new identity with an email and password.
    ///
    /// The new identity is not signed in.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [Error::InvalidEmail] if `email` is not a valid email address,
    /// - [Error::EmailAlreadyInUse] if another identity has registered `email`,
    /// - [Error::SqlError] or [Error::DatabaseLockError] if the database could not be accessed.
    pub fn sign_up(&self, email: &str, password_hash: PasswordHash) -> Result<Identity, Error> {
        let email = normalize_email(email)?;
        let identity = Identity {
            id: IdentityId::new_random(),
            email: Some(email.clone()),
            is_anonymous: false,
        };

        let connection = self.lock_connection()?;
        let result = connection.execute(
            "INSERT INTO identity (id, email, password, is_anonymous) VALUES (?1, ?2, ?3, 0)",
            (identity.id.as_str(), &email, password_hash.to_string()),
        );

        match result {
            Ok(_) => {}
            // Code 2067 occurs when a UNIQUE constraint failed.
            Err(rusqlite::Error::SqliteFailure(error, _)) if error.extended_code == 2067 => {
                return Err(Error::EmailAlreadyInUse(email));
            }
            Err(error) => return Err(error.into()),
        }

        tracing::info!("Registered identity {}", identity.id);

        Ok(identity)
    }

    /// Sign in with an email and password.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCredentials] if no identity is registered with
    /// `email` or the password does not match.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, Error> {
        let email = email.trim().to_lowercase();

        let row: Option<(String, String)> = self
            .lock_connection()?
            .query_row(
                "SELECT id, password FROM identity WHERE email = :email AND password IS NOT NULL",
                &[(":email", &email)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, raw_password_hash)) = row else {
            return Err(Error::InvalidCredentials);
        };

        let is_password_valid = PasswordHash::new_unchecked(&raw_password_hash)
            .verify(password)
            .map_err(|error| Error::HashingError(error.to_string()))?;

        if !is_password_valid {
            return Err(Error::InvalidCredentials);
        }

        let identity = Identity {
            id: IdentityId(id),
            email: Some(email),
            is_anonymous: false,
        };
        self.publish(IdentityEvent::SignedIn(identity.clone()));

        Ok(identity)
    }

    /// Create and sign in a new anonymous identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database could not be accessed.
    pub fn sign_in_anonymously(&self) -> Result<Identity, Error> {
        let identity = Identity {
            id: IdentityId::new_random(),
            email: None,
            is_anonymous: true,
        };

        self.lock_connection()?.execute(
            "INSERT INTO identity (id, email, password, is_anonymous) VALUES (?1, NULL, NULL, 1)",
            (identity.id.as_str(),),
        )?;

        tracing::info!("Created anonymous identity {}", identity.id);
        self.publish(IdentityEvent::SignedIn(identity.clone()));

        Ok(identity)
    }

    /// Look up the identity with ID `id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no such identity.
    pub fn get_identity(&self, id: &IdentityId) -> Result<Identity, Error> {
        self.lock_connection()?
            .query_row(
                "SELECT id, email, is_anonymous FROM identity WHERE id = :id",
                &[(":id", id.as_str())],
                |row| {
                    Ok(Identity {
                        id: IdentityId(row.get(0)?),
                        email: row.get(1)?,
                        is_anonymous: row.get(2)?,
                    })
                },
            )
            .map_err(|error| error.into())
    }

    /// Announce that the identity has signed out.
    pub fn sign_out(&self, id: &IdentityId) {
        tracing::info!("Identity {id} signed out");
        self.publish(IdentityEvent::SignedOut(id.clone()));
    }

    /// Delete the identity and all of its data in the store.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no such identity. If deleting the
    /// store data fails, the identity row has already been removed.
    pub fn delete_identity(&self, id: &IdentityId) -> Result<(), Error> {
        let rows_affected = self
            .lock_connection()?
            .execute("DELETE FROM identity WHERE id = :id", &[(":id", id.as_str())])?;

        if rows_affected == 0 {
            return Err(Error::NotFound);
        }

        self.store.remove(&StorePath::new(id.as_str())?)?;

        tracing::info!("Deleted identity {id}");
        self.publish(IdentityEvent::Deleted(id.clone()));

        Ok(())
    }

    /// Receive every identity event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}

fn normalize_email(email: &str) -> Result<String, Error> {
    let email = email.trim().to_lowercase();

    if EmailAddress::is_valid(&email) {
        Ok(email)
    } else {
        Err(Error::InvalidEmail(email))
    }
}
