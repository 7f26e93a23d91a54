use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use thiserror::Error;

use super::models::TokenPair;
use super::tables::*;
use super::TokenStore;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// redb-backed token store, one file per data directory.
pub struct Database {
    db: RedbDatabase,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("habit-sync.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSION_TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Token slot operations
    // ========================================================================

    /// Read both token slots. Returns `None` unless both are present.
    pub fn get_tokens(&self) -> Result<Option<TokenPair>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSION_TOKENS)?;

        let access = table.get(ACCESS_TOKEN_SLOT)?.map(|v| v.value().to_string());
        let refresh = table.get(REFRESH_TOKEN_SLOT)?.map(|v| v.value().to_string());

        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Ok(Some(TokenPair {
                access_token,
                refresh_token,
            })),
            _ => Ok(None),
        }
    }

    /// Write both token slots in one transaction
    pub fn put_tokens(&self, pair: &TokenPair) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_TOKENS)?;
            table.insert(ACCESS_TOKEN_SLOT, pair.access_token.as_str())?;
            table.insert(REFRESH_TOKEN_SLOT, pair.refresh_token.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove both token slots. Returns whether anything was stored.
    pub fn delete_tokens(&self) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSION_TOKENS)?;
            let access = table.remove(ACCESS_TOKEN_SLOT)?.is_some();
            let refresh = table.remove(REFRESH_TOKEN_SLOT)?.is_some();
            access || refresh
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

impl TokenStore for Database {
    fn load(&self) -> Result<Option<TokenPair>, DatabaseError> {
        self.get_tokens()
    }

    fn save(&self, pair: &TokenPair) -> Result<(), DatabaseError> {
        self.put_tokens(pair)
    }

    fn clear(&self) -> Result<(), DatabaseError> {
        self.delete_tokens().map(|_| ())
    }
}
