pub mod account_store;
pub mod platform;

pub use account_store::AccountStore;
pub use platform::SqlitePlatform;

use crate::error::{CoinflipError, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, Transaction};
use std::path::Path;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoinflipError::internal(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Accounts table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL CHECK (balance >= 0),
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Single-row escrow pot
        conn.execute(
            "CREATE TABLE IF NOT EXISTS escrow (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                balance INTEGER NOT NULL CHECK (balance >= 0)
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO escrow (id, balance) VALUES (0, 0)",
            [],
        )?;

        Ok(())
    }

    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run `f` inside a single sqlite transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls
    /// back every write `f` made.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<CoinflipError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(CoinflipError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(CoinflipError::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use bitcoin::Amount;
    use tempfile::tempdir;

    #[test]
    fn test_storage_creates_database_file() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("coinflip.db");

        let storage = Storage::open(&db_path).unwrap();
        let conn = storage.get_connection();
        AccountStore::new(&conn)
            .create_account(&AccountId::new("alice").unwrap(), chrono::Utc::now())
            .unwrap();

        assert!(db_path.exists());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let storage = Storage::in_memory().unwrap();
        let alice = AccountId::new("alice").unwrap();

        let result: Result<()> = storage.transaction(|tx| {
            let accounts = AccountStore::new(tx);
            accounts.create_account(&alice, chrono::Utc::now())?;
            accounts.deposit(&alice, Amount::from_sat(50))?;
            Err(CoinflipError::internal("abort"))
        });
        assert!(result.is_err());

        let conn = storage.get_connection();
        assert!(!AccountStore::new(&conn).account_exists(&alice).unwrap());
    }
}
