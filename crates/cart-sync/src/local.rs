//! Device-local cart storage.
//!
//! The device holds at most one cart, the anonymous one, under a single
//! identity-less key. Values are JSON-encoded [`CartSnapshot`]s and are
//! validated on the way in: anything that does not decode into a valid
//! snapshot is reported as [`LocalStoreError::Corrupt`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use suburbia_core::CartSnapshot;

use crate::error::LocalStoreError;

/// The storage key of the anonymous cart.
pub const LOCAL_CART_KEY: &str = "suburbia-cart";

/// Synchronous key-value persistence for the anonymous cart.
pub trait LocalCartStore {
    /// Read the stored cart; `Ok(None)` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Corrupt` for malformed data and
    /// `LocalStoreError::Io` if storage cannot be read.
    fn load(&self) -> Result<Option<CartSnapshot>, LocalStoreError>;

    /// Replace the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the cart cannot be encoded or written.
    fn save(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError>;

    /// Remove the stored cart. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Io` if storage cannot be modified.
    fn clear(&self) -> Result<(), LocalStoreError>;
}

impl<T: LocalCartStore + ?Sized> LocalCartStore for Arc<T> {
    fn load(&self) -> Result<Option<CartSnapshot>, LocalStoreError> {
        (**self).load()
    }

    fn save(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError> {
        (**self).save(cart)
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        (**self).clear()
    }
}

/// Decode and validate a stored cart.
fn decode(raw: &str) -> Result<CartSnapshot, LocalStoreError> {
    let cart: CartSnapshot =
        serde_json::from_str(raw).map_err(|e| LocalStoreError::Corrupt(e.to_string()))?;
    cart.validate()?;
    Ok(cart)
}

// =============================================================================
// File-backed store
// =============================================================================

/// Stores the cart as `<dir>/suburbia-cart.json`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous cart intact.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{LOCAL_CART_KEY}.json")),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCartStore for FileCartStore {
    fn load(&self) -> Result<Option<CartSnapshot>, LocalStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec(cart)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Keeps the encoded cart in memory, for hosts without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    value: Mutex<Option<String>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `raw` under the cart key.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw stored value, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalCartStore for MemoryCartStore {
    fn load(&self) -> Result<Option<CartSnapshot>, LocalStoreError> {
        self.raw().as_deref().map(decode).transpose()
    }

    fn save(&self, cart: &CartSnapshot) -> Result<(), LocalStoreError> {
        let encoded = serde_json::to_string(cart)?;
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use suburbia_core::{BASE_PRICE, CartItemDraft, ColoredPart, ComponentId, TexturedPart};

    fn one_item_cart() -> CartSnapshot {
        let part = |id: &str| TexturedPart {
            id: ComponentId::new(id),
            name: id.to_string(),
            texture: String::new(),
        };
        let hardware = |id: &str| ColoredPart {
            id: ComponentId::new(id),
            name: id.to_string(),
            color: "#000000".to_string(),
        };
        let mut cart = CartSnapshot::new();
        cart.add(CartItemDraft::new(
            part("deck"),
            part("wheel"),
            hardware("truck"),
            hardware("bolt"),
            BASE_PRICE,
        ));
        cart
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path().join("nested"));
        assert!(store.load().unwrap().is_none());

        let cart = one_item_cart();
        store.save(&cart).unwrap();
        assert_eq!(store.load().unwrap(), Some(cart));
        assert!(store.path().ends_with("suburbia-cart.json"));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_malformed_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(LocalStoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store_rejects_duplicate_ids() {
        let cart = one_item_cart();
        let item = serde_json::to_value(&cart.items()[0]).unwrap();
        let raw = serde_json::json!({ "items": [item.clone(), item] }).to_string();
        let store = MemoryCartStore::with_raw(raw);
        assert!(matches!(store.load(), Err(LocalStoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store_through_arc() {
        let store = Arc::new(MemoryCartStore::new());
        let cart = one_item_cart();
        LocalCartStore::save(&store, &cart).unwrap();
        assert_eq!(LocalCartStore::load(&store).unwrap(), Some(cart));
        LocalCartStore::clear(&store).unwrap();
        assert!(store.raw().is_none());
    }
}
