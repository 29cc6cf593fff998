//! # Cart Repository
//!
//! Keeps the customer cart across restarts.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use menu_core::Cart;

use crate::error::StoreResult;
use crate::storage::KeyValueStorage;
use crate::CART_KEY;

#[derive(Clone)]
pub struct CartRepository {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl CartRepository {
    pub fn new(storage: Arc<dyn KeyValueStorage>, write_lock: Arc<Mutex<()>>) -> Self {
        CartRepository {
            storage,
            write_lock,
        }
    }

    /// Loads the saved cart, or a fresh one if none (or a corrupt one) is
    /// stored.
    pub async fn load(&self) -> StoreResult<Cart> {
        let Some(raw) = self.storage.get(CART_KEY).await? else {
            return Ok(Cart::new());
        };

        match serde_json::from_str(&raw) {
            Ok(cart) => Ok(cart),
            Err(e) => {
                warn!(error = %e, "Discarding corrupted cart");
                self.storage.remove(CART_KEY).await?;
                Ok(Cart::new())
            }
        }
    }

    /// Saves the cart. An empty cart removes the key.
    pub async fn save(&self, cart: &Cart) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        if cart.is_empty() {
            return self.storage.remove(CART_KEY).await;
        }
        let json = serde_json::to_string(cart)?;
        self.storage.set(CART_KEY, &json).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(CART_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use menu_core::samples::sample_items;
    use menu_core::SizeTier;

    #[tokio::test]
    async fn test_cart_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let repo = CartRepository::new(storage.clone(), Arc::new(Mutex::new(())));

        let mut cart = repo.load().await.unwrap();
        assert!(cart.is_empty());

        let pizza = &sample_items()[0];
        cart.add_item(pizza, SizeTier::Medium, 2).unwrap();
        repo.save(&cart).await.unwrap();

        let restored = repo.load().await.unwrap();
        assert_eq!(restored.total_quantity(), 2);
        assert_eq!(restored.total(), cart.total());

        repo.save(&Cart::new()).await.unwrap();
        assert!(!storage.contains_key(CART_KEY).await);
    }

    #[tokio::test]
    async fn test_corrupted_cart_resets() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_raw(CART_KEY, "not a cart").await;

        let repo = CartRepository::new(storage, Arc::new(Mutex::new(())));
        assert!(repo.load().await.unwrap().is_empty());
    }
}
