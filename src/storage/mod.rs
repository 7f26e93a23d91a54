pub mod db;
mod memory;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use memory::MemoryStore;
pub use models::TokenPair;
pub use tables::*;

/// Key-value backing for the session's token pair.
///
/// Both slots are written and cleared together; a store never hands out a
/// half pair.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, DatabaseError>;
    fn save(&self, pair: &TokenPair) -> Result<(), DatabaseError>;
    fn clear(&self) -> Result<(), DatabaseError>;
}
