//! A [DocumentStore] that keeps its nodes in a SQLite table.
//!
//! Objects are flattened into one row per leaf value, keyed by the leaf's full
//! path, so that a subtree can be read, replaced or removed with prefix queries.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::{
    Error,
    store::{DocumentStore, StorePath, Subscription},
};

/// Create the table that holds the store's leaf nodes.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_node_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS node (
                path TEXT PRIMARY KEY,
                value TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// A document store backed by a shared SQLite connection.
///
/// Each call takes the connection lock on its own, so a sequence of calls is
/// not atomic.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    connection: Arc<Mutex<Connection>>,
    subscribers: Arc<Mutex<HashMap<StorePath, watch::Sender<Option<Value>>>>>,
}

impl SqliteDocumentStore {
    /// Create a store on a connection that has been set up with [create_node_table].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            connection,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }

    fn lock_subscribers(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<StorePath, watch::Sender<Option<Value>>>>, Error> {
        self.subscribers.lock().map_err(|error| {
            tracing::error!("could not acquire subscriber lock: {error}");
            Error::DatabaseLockError
        })
    }

    /// Push the new value to every subscriber whose path overlaps `changed_path`.
    fn notify(&self, changed_path: &StorePath) -> Result<(), Error> {
        let mut subscribers = self.lock_subscribers()?;
        subscribers.retain(|_, sender| sender.receiver_count() > 0);

        for (path, sender) in subscribers.iter() {
            if !path.overlaps(changed_path) {
                continue;
            }

            let value = self.get(path)?;
            sender.send_if_modified(|current| {
                if *current == value {
                    false
                } else {
                    *current = value;
                    true
                }
            });
        }

        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, path: &StorePath) -> Result<Option<Value>, Error> {
        let connection = self.lock_connection()?;
        let path_string = path.to_string();

        let leaf: Option<String> = connection
            .query_row(
                "SELECT value FROM node WHERE path = :path",
                &[(":path", &path_string)],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(raw_value) = leaf {
            return decode(&path_string, &raw_value).map(Some);
        }

        let prefix = format!("{path_string}/");
        let mut statement = connection.prepare(
            "SELECT path, value FROM node WHERE substr(path, 1, :length) = :prefix ORDER BY path",
        )?;
        let rows = statement
            .query_map(
                rusqlite::named_params! {
                    ":length": prefix.chars().count() as i64,
                    ":prefix": &prefix,
                },
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut root = Map::new();
        for (leaf_path, raw_value) in rows {
            let value = decode(&leaf_path, &raw_value)?;
            let relative_segments = leaf_path[prefix.len()..].split('/').collect::<Vec<_>>();
            insert_nested(&mut root, &relative_segments, value);
        }

        Ok(Some(Value::Object(root)))
    }

    fn set(&self, path: &StorePath, value: Value) -> Result<(), Error> {
        let mut leaves = Vec::new();
        flatten(path, value, &mut leaves)?;

        {
            let mut connection = self.lock_connection()?;
            let transaction = connection.transaction()?;

            delete_subtree(&transaction, path)?;

            if !leaves.is_empty() {
                // A primitive stored at an ancestor is replaced by the new object.
                for ancestor in path.ancestors() {
                    transaction.execute(
                        "DELETE FROM node WHERE path = :path",
                        &[(":path", &ancestor.to_string())],
                    )?;
                }
            }

            for (leaf_path, leaf) in leaves {
                transaction.execute(
                    "INSERT INTO node (path, value) VALUES (?1, ?2)",
                    (leaf_path.to_string(), serde_json::to_string(&leaf)?),
                )?;
            }

            transaction.commit()?;
        }

        self.notify(path)
    }

    fn remove(&self, path: &StorePath) -> Result<(), Error> {
        {
            let connection = self.lock_connection()?;
            delete_subtree(&connection, path)?;
        }

        self.notify(path)
    }

    fn subscribe(&self, path: &StorePath) -> Result<Subscription, Error> {
        let mut subscribers = self.lock_subscribers()?;

        let receiver = match subscribers.get(path) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(self.get(path)?);
                subscribers.insert(path.clone(), sender);
                receiver
            }
        };

        Ok(Subscription::new(path.clone(), receiver))
    }
}

fn decode(path: &str, raw_value: &str) -> Result<Value, Error> {
    serde_json::from_str(raw_value).map_err(|error| Error::InvalidStoredValue {
        path: path.to_owned(),
        reason: error.to_string(),
    })
}

fn delete_subtree(connection: &Connection, path: &StorePath) -> Result<(), Error> {
    let path_string = path.to_string();
    let prefix = format!("{path_string}/");

    connection.execute(
        "DELETE FROM node WHERE path = :path OR substr(path, 1, :length) = :prefix",
        rusqlite::named_params! {
            ":path": &path_string,
            ":length": prefix.chars().count() as i64,
            ":prefix": &prefix,
        },
    )?;

    Ok(())
}

fn flatten(path: &StorePath, value: Value, leaves: &mut Vec<(StorePath, Value)>) -> Result<(), Error> {
    match value {
        Value::Null => {}
        Value::Object(children) => {
            for (key, child) in children {
                flatten(&path.child(&key)?, child, leaves)?;
            }
        }
        leaf => leaves.push((path.clone(), leaf)),
    }

    Ok(())
}

fn insert_nested(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = root;
    for segment in parents {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }

        node = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just replaced with an object"),
        };
    }

    node.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use rusqlite::Connection;
    use serde_json::json;

    use crate::store::{DocumentStore, SqliteDocumentStore, StorePath, create_node_table};

    fn get_store() -> SqliteDocumentStore {
        let connection = Connection::open_in_memory().unwrap();
        create_node_table(&connection).unwrap();

        SqliteDocumentStore::new(Arc::new(Mutex::new(connection)))
    }

    fn path(raw_path: &str) -> StorePath {
        StorePath::new(raw_path).unwrap()
    }

    #[test]
    fn get_missing_path_returns_none() {
        let store = get_store();

        assert_eq!(store.get(&path("abc/balance")).unwrap(), None);
    }

    #[test]
    fn set_then_get_leaf() {
        let store = get_store();

        store.set(&path("abc/balance"), json!(100.0)).unwrap();

        assert_eq!(store.get(&path("abc/balance")).unwrap(), Some(json!(100.0)));
    }

    #[test]
    fn interior_nodes_are_assembled_from_children() {
        let store = get_store();
        store
            .set(&path("abc/records/1"), json!({"amount": 1.0, "type": "Credit"}))
            .unwrap();
        store
            .set(&path("abc/records/2"), json!({"amount": 2.0, "type": "Debit"}))
            .unwrap();

        let records = store.get(&path("abc/records")).unwrap();

        assert_eq!(
            records,
            Some(json!({
                "1": {"amount": 1.0, "type": "Credit"},
                "2": {"amount": 2.0, "type": "Debit"},
            }))
        );
        assert_eq!(store.get(&path("abc/records/2/amount")).unwrap(), Some(json!(2.0)));
    }

    #[test]
    fn set_replaces_the_whole_subtree() {
        let store = get_store();
        store
            .set(&path("abc/records/1"), json!({"amount": 1.0, "tag": "Food"}))
            .unwrap();

        store.set(&path("abc/records/1"), json!({"amount": 5.0})).unwrap();

        assert_eq!(
            store.get(&path("abc/records/1")).unwrap(),
            Some(json!({"amount": 5.0}))
        );
    }

    #[test]
    fn set_object_below_a_primitive_replaces_the_primitive() {
        let store = get_store();
        store.set(&path("abc/records"), json!(1)).unwrap();

        store.set(&path("abc/records/1"), json!(true)).unwrap();

        assert_eq!(
            store.get(&path("abc/records")).unwrap(),
            Some(json!({"1": true}))
        );
    }

    #[test]
    fn set_null_removes() {
        let store = get_store();
        store.set(&path("abc/balance"), json!(3)).unwrap();

        store.set(&path("abc/balance"), serde_json::Value::Null).unwrap();

        assert_eq!(store.get(&path("abc/balance")).unwrap(), None);
    }

    #[test]
    fn remove_deletes_node_and_descendants_only() {
        let store = get_store();
        store.set(&path("abc/records/1"), json!({"amount": 1.0})).unwrap();
        store.set(&path("abc/balance"), json!(1.0)).unwrap();
        store.set(&path("abcd/balance"), json!(2.0)).unwrap();

        store.remove(&path("abc/records")).unwrap();

        assert_eq!(store.get(&path("abc/records")).unwrap(), None);
        assert_eq!(store.get(&path("abc/balance")).unwrap(), Some(json!(1.0)));
        assert_eq!(store.get(&path("abcd/balance")).unwrap(), Some(json!(2.0)));
    }

    #[tokio::test]
    async fn subscription_starts_with_current_value_and_sees_updates() {
        let store = get_store();
        store.set(&path("abc/balance"), json!(10.0)).unwrap();

        let mut subscription = store.subscribe(&path("abc/balance")).unwrap();
        assert_eq!(subscription.current(), Some(json!(10.0)));

        store.set(&path("abc/balance"), json!(20.0)).unwrap();

        let value = tokio::time::timeout(Duration::from_secs(1), subscription.changed())
            .await
            .expect("subscription was not notified")
            .unwrap();
        assert_eq!(value, Some(json!(20.0)));
    }

    #[tokio::test]
    async fn subscription_to_parent_sees_child_writes() {
        let store = get_store();
        let mut subscription = store.subscribe(&path("abc/records")).unwrap();
        assert_eq!(subscription.current(), None);

        store.set(&path("abc/records/1"), json!({"amount": 1.0})).unwrap();

        let value = tokio::time::timeout(Duration::from_secs(1), subscription.changed())
            .await
            .expect("subscription was not notified")
            .unwrap();
        assert_eq!(value, Some(json!({"1": {"amount": 1.0}})));
    }

    #[tokio::test]
    async fn subscription_ignores_unrelated_writes() {
        let store = get_store();
        let mut subscription = store.subscribe(&path("abc/balance")).unwrap();

        store.set(&path("abc/income"), json!(5.0)).unwrap();
        store.set(&path("xyz/balance"), json!(5.0)).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), subscription.changed()).await;
        assert!(result.is_err(), "want no notification, got {result:?}");
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_cleaned_up() {
        let store = get_store();
        let subscription = store.subscribe(&path("abc/balance")).unwrap();
        drop(subscription);

        store.set(&path("abc/balance"), json!(1.0)).unwrap();

        assert!(store.subscribers.lock().unwrap().is_empty());
    }
}
