//! Creates the SQLite tables that back the identity provider and the document store.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{identity::create_identity_table, store::create_node_table};

/// Create the application tables in `connection` if they do not exist yet.
///
/// The tables are created in a single exclusive transaction.
///
/// # Errors
/// Returns an error if a table could not be created or the transaction could not be committed.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_identity_table(&transaction)?;
    create_node_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;

    fn table_names(connection: &Connection) -> Vec<String> {
        connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let tables = table_names(&connection);
        assert!(tables.contains(&"identity".to_owned()), "got tables {tables:?}");
        assert!(tables.contains(&"node".to_owned()), "got tables {tables:?}");
    }

    #[test]
    fn can_initialize_twice() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();
        let want = table_names(&connection);
        initialize(&connection).unwrap();

        assert_eq!(table_names(&connection), want);
    }
}
