//! A hierarchical document store addressed by `/`-separated paths.
//!
//! Every identity owns the subtree rooted at its ID. The store offers path
//! addressed reads, full-replace writes, deletes and subscriptions that push
//! the current value whenever it changes.
//!
//! Operations are independent of each other: there are no multi-path
//! transactions, so callers that read and then write several paths may
//! interleave with other callers.

mod path;
mod sqlite;

use std::fmt::Debug;

use serde_json::Value;
use tokio::sync::watch;

use crate::Error;

pub use path::StorePath;
pub use sqlite::{SqliteDocumentStore, create_node_table};

/// Path addressed access to the hierarchical store.
pub trait DocumentStore: Debug + Send + Sync {
    /// Read the value at `path`.
    ///
    /// Interior nodes are returned as JSON objects assembled from their
    /// descendants. Returns `None` when nothing is stored at or below `path`.
    fn get(&self, path: &StorePath) -> Result<Option<Value>, Error>;

    /// Replace the value at `path` (and everything below it) with `value`.
    ///
    /// Writing `null` or an empty object is the same as calling [DocumentStore::remove].
    fn set(&self, path: &StorePath, value: Value) -> Result<(), Error>;

    /// Delete the value at `path` and everything below it.
    fn remove(&self, path: &StorePath) -> Result<(), Error>;

    /// Subscribe to the value at `path`.
    ///
    /// The subscription holds the current value straight away and is updated
    /// after every write that touches `path`, one of its ancestors or one of
    /// its descendants. Dropping the subscription unsubscribes.
    fn subscribe(&self, path: &StorePath) -> Result<Subscription, Error>;
}

/// A live view of the value at a store path.
#[derive(Debug)]
pub struct Subscription {
    path: StorePath,
    receiver: watch::Receiver<Option<Value>>,
}

impl Subscription {
    pub(crate) fn new(path: StorePath, receiver: watch::Receiver<Option<Value>>) -> Self {
        Self { path, receiver }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// The latest value pushed by the store.
    pub fn current(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [Error::SubscriptionClosed] if the store has been dropped.
    pub async fn changed(&mut self) -> Result<Option<Value>, Error> {
        self.receiver
            .changed()
            .await
            .map_err(|_| Error::SubscriptionClosed(self.path.to_string()))?;

        Ok(self.receiver.borrow_and_update().clone())
    }
}
