//! Draft persistence for an in-progress checkout.
//!
//! Single slot, last writer wins. Drafts older than the TTL are discarded on load.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::Cart;
use crate::domain::logistics::{LogisticsDetails, ServiceToggles};

pub const DRAFT_TTL_HOURS: i64 = 24;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub cart: Cart,
    pub logistics: LogisticsDetails,
    pub toggles: ServiceToggles,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Raw storage slot; expiry is handled by [`DraftPersistence`].
pub trait DraftStore: Send + Sync {
    fn write(&self, draft: &CheckoutDraft) -> Result<(), DraftError>;
    fn read(&self) -> Result<Option<CheckoutDraft>, DraftError>;
    fn remove(&self) -> Result<(), DraftError>;
}

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<CheckoutDraft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self { Self::default() }
}

impl DraftStore for MemoryDraftStore {
    fn write(&self, draft: &CheckoutDraft) -> Result<(), DraftError> { *self.slot.lock() = Some(draft.clone()); Ok(()) }
    fn read(&self) -> Result<Option<CheckoutDraft>, DraftError> { Ok(self.slot.lock().clone()) }
    fn remove(&self) -> Result<(), DraftError> { *self.slot.lock() = None; Ok(()) }
}

/// One JSON file per slot, replaced atomically through a temporary sibling.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    /// Slot for a named session inside `dir`. The file name is a name-based UUID of the
    /// session id, so distinct ids never share a file.
    pub fn for_session(dir: &Path, session_id: &str) -> Self {
        let key = Uuid::new_v5(&Uuid::NAMESPACE_OID, session_id.as_bytes());
        Self::new(dir.join(format!("draft-{}.json", key.simple())))
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl DraftStore for FileDraftStore {
    fn write(&self, draft: &CheckoutDraft) -> Result<(), DraftError> {
        if let Some(parent) = self.path.parent() { fs::create_dir_all(parent)?; }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(draft)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<CheckoutDraft>, DraftError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self) -> Result<(), DraftError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct DraftPersistence {
    store: Arc<dyn DraftStore>,
    ttl: Duration,
}

impl std::fmt::Debug for DraftPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftPersistence").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl DraftPersistence {
    pub fn new(store: Arc<dyn DraftStore>) -> Self { Self { store, ttl: Duration::hours(DRAFT_TTL_HOURS) } }
    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryDraftStore::new())) }

    /// Writes a snapshot when there is anything worth keeping, otherwise empties the slot.
    /// Returns whether it wrote.
    pub fn save(&self, cart: &Cart, logistics: &LogisticsDetails, toggles: ServiceToggles) -> Result<bool, DraftError> {
        self.save_at(cart, logistics, toggles, Utc::now())
    }

    pub fn save_at(&self, cart: &Cart, logistics: &LogisticsDetails, toggles: ServiceToggles, now: DateTime<Utc>) -> Result<bool, DraftError> {
        if cart.is_empty() && logistics.is_empty() {
            self.store.remove()?;
            return Ok(false);
        }
        self.store.write(&CheckoutDraft { cart: cart.clone(), logistics: logistics.clone(), toggles, saved_at: now })?;
        Ok(true)
    }

    pub fn load(&self) -> Option<CheckoutDraft> { self.load_at(Utc::now()) }

    /// Unreadable and expired drafts both count as absent and are discarded.
    pub fn load_at(&self, now: DateTime<Utc>) -> Option<CheckoutDraft> {
        let draft = match self.store.read() {
            Ok(draft) => draft?,
            Err(e) => {
                warn!(error = %e, "discarding unreadable checkout draft");
                self.clear();
                return None;
            }
        };
        if now - draft.saved_at > self.ttl {
            debug!(saved_at = %draft.saved_at, "checkout draft expired");
            self.clear();
            return None;
        }
        Some(draft)
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "failed to clear checkout draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CatalogProduct;

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_product(&CatalogProduct::new("A", "S", "Chair", 300.0, 9), 2).unwrap();
        cart
    }

    #[test]
    fn test_skips_empty_state() {
        let drafts = DraftPersistence::in_memory();
        assert!(!drafts.save(&Cart::new(), &LogisticsDetails::default(), ServiceToggles::default()).unwrap());
        assert!(drafts.load().is_none());
    }

    #[test]
    fn test_emptied_cart_drops_previous_draft() {
        let drafts = DraftPersistence::in_memory();
        drafts.save(&cart(), &LogisticsDetails::default(), ServiceToggles::default()).unwrap();
        drafts.save(&Cart::new(), &LogisticsDetails::default(), ServiceToggles::default()).unwrap();
        assert!(drafts.load().is_none());
    }

    #[test]
    fn test_logistics_alone_is_saved() {
        let drafts = DraftPersistence::in_memory();
        let logistics = LogisticsDetails { delivery_address: Some("Calle 8".into()), ..Default::default() };
        assert!(drafts.save(&Cart::new(), &logistics, ServiceToggles::default()).unwrap());
        assert_eq!(drafts.load().unwrap().logistics, logistics);
    }

    #[test]
    fn test_expired_draft_is_absent() {
        let drafts = DraftPersistence::in_memory();
        let saved = Utc::now() - Duration::hours(25);
        drafts.save_at(&cart(), &LogisticsDetails::default(), ServiceToggles::default(), saved).unwrap();
        assert!(drafts.load().is_none());
        // The expired slot is gone, not just hidden.
        assert!(drafts.load_at(saved).is_none());
    }

    #[test]
    fn test_fresh_draft_survives() {
        let drafts = DraftPersistence::in_memory();
        let saved = Utc::now() - Duration::hours(23);
        drafts.save_at(&cart(), &LogisticsDetails::default(), ServiceToggles { delivery: true, ..Default::default() }, saved).unwrap();
        let draft = drafts.load().unwrap();
        assert_eq!(draft.cart.item_count(), 1);
        assert_eq!(draft.saved_at, saved);
        assert!(draft.toggles.delivery);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::for_session(dir.path(), "till/1");
        assert!(store.path().starts_with(dir.path()));
        let drafts = DraftPersistence::new(Arc::new(store.clone()));
        let original = cart();
        drafts.save(&original, &LogisticsDetails::default(), ServiceToggles::default()).unwrap();
        assert_eq!(drafts.load().unwrap().cart, original);
        drafts.clear();
        assert!(store.read().unwrap().is_none());
        drafts.clear();
    }

    #[test]
    fn test_session_ids_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["till/1", "till.1", "till_1", "till 1"].iter()
            .map(|id| FileDraftStore::for_session(dir.path(), id).path().to_path_buf())
            .collect();
        for (i, a) in paths.iter().enumerate() {
            assert!(paths[i + 1..].iter().all(|b| a != b), "{a:?} collides");
        }
        assert_eq!(FileDraftStore::for_session(dir.path(), "till/1").path(), paths[0]);

        let first = DraftPersistence::new(Arc::new(FileDraftStore::for_session(dir.path(), "till/1")));
        let second = DraftPersistence::new(Arc::new(FileDraftStore::for_session(dir.path(), "till_1")));
        first.save(&cart(), &LogisticsDetails::default(), ServiceToggles::default()).unwrap();
        assert!(second.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("draft.json"));
        fs::write(store.path(), b"{not json").unwrap();
        let drafts = DraftPersistence::new(Arc::new(store.clone()));
        assert!(drafts.load().is_none());
        assert!(!store.path().exists());
    }
}
