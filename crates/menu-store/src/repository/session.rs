//! Session token persistence.

use std::sync::Arc;

use crate::error::StoreResult;
use crate::storage::KeyValueStorage;
use crate::SESSION_TOKEN_KEY;

#[derive(Clone)]
pub struct SessionRepository {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionRepository {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        SessionRepository { storage }
    }

    pub async fn token(&self) -> StoreResult<Option<String>> {
        Ok(self
            .storage
            .get(SESSION_TOKEN_KEY)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    pub async fn set_token(&self, token: &str) -> StoreResult<()> {
        self.storage.set(SESSION_TOKEN_KEY, token).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.storage.remove(SESSION_TOKEN_KEY).await
    }
}
