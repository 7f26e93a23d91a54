use std::sync::Mutex;

use super::{DatabaseError, TokenPair, TokenStore};

/// Process-local token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryStore {
    fn load(&self) -> Result<Option<TokenPair>, DatabaseError> {
        let guard = self.pair.lock().map_err(|_| DatabaseError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<(), DatabaseError> {
        let mut guard = self.pair.lock().map_err(|_| DatabaseError::Poisoned)?;
        *guard = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), DatabaseError> {
        let mut guard = self.pair.lock().map_err(|_| DatabaseError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}
