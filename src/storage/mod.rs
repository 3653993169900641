//! Key-value backends for stored variables.
//!
//! A [`KeyValueStore`] holds text under string keys. Three kinds exist:
//!
//! - [`StoreKind::Durable`]: survives process restarts ([`FileStore::durable`])
//! - [`StoreKind::Session`]: lives as long as one session ([`FileStore::session`])
//! - [`StoreKind::Memory`]: lives inside the variable itself, used as the
//!   fallback when the other two are unavailable
//!
//! Variables pick a backend through a [`StoreBinding`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::errors::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

type Result<T> = std::result::Result<T, Error>;

/// Prefix of every key this crate writes.
pub const KEY_PREFIX: &str = "HUE";

/// Lifetime class of a storage backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Survives process restarts.
    Durable,
    /// Survives only for the current session.
    Session,
    /// Survives only for the lifetime of the owning variable.
    Memory,
}

/// Text storage shared by many variables.
///
/// Calls are synchronous and complete or fail before returning.
pub trait KeyValueStore: Send + Sync {
    /// Lifetime class of this store.
    fn kind(&self) -> StoreKind;

    /// Read the text stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Called once when the owning session shuts down.
    fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Where a variable keeps its value.
#[derive(Clone)]
pub enum StoreBinding {
    /// Write through to a shared store.
    Store(Arc<dyn KeyValueStore>),
    /// Keep the value in the variable only.
    Memory,
}

impl StoreBinding {
    pub fn store(store: Arc<dyn KeyValueStore>) -> Self {
        StoreBinding::Store(store)
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            StoreBinding::Store(store) => store.kind(),
            StoreBinding::Memory => StoreKind::Memory,
        }
    }
}

impl fmt::Debug for StoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBinding::Store(store) => f.debug_tuple("Store").field(&store.kind()).finish(),
            StoreBinding::Memory => f.write_str("Memory"),
        }
    }
}

/// Builds the key for `field` of the group identified by `owner`.
///
/// Groups with different owners never collide, even with identical field names.
///
/// # Examples
///
/// ```
/// use hue_lights_rs::storage::storage_key;
///
/// assert_eq!(storage_key("HueBridgeSession", "HUE_BR_IP"), "HUE_HueBridgeSession_HUE_BR_IP");
/// assert_ne!(storage_key("A", "ip"), storage_key("B", "ip"));
/// ```
pub fn storage_key(owner: &str, field: &str) -> String {
    format!("{KEY_PREFIX}_{owner}_{field}")
}
