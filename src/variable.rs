//! Observable, storage-backed variables.
//!
//! A [`StoredVariable`] caches one value and writes it through to its
//! [`StoreBinding`]. Clones share the same cache and subscribers, so every
//! handle sees the same authoritative value.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{FutureExt, Stream, StreamExt};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::storage::{StoreBinding, StoreKind, storage_key};

type Result<T> = std::result::Result<T, Error>;

mod sealed {
    pub trait Sealed {}
}

/// Types a [`StoredVariable`] can hold: numbers, strings, booleans and
/// vectors of those nested at most three deep.
pub trait Storeable:
    sealed::Sealed + Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + 'static
{
}

macro_rules! storeable {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl Storeable for $t {}
            impl sealed::Sealed for Vec<$t> {}
            impl Storeable for Vec<$t> {}
            impl sealed::Sealed for Vec<Vec<$t>> {}
            impl Storeable for Vec<Vec<$t>> {}
            impl sealed::Sealed for Vec<Vec<Vec<$t>>> {}
            impl Storeable for Vec<Vec<Vec<$t>>> {}
        )*
    };
}

storeable!(bool, String, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);

/// On-disk wrapper; tells "no value" apart from falsy values.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "V")]
    value: Option<T>,
}

struct Slot<T> {
    binding: StoreBinding,
    key: String,
    value: Option<T>,
    loaded: bool,
    default: Option<T>,
    subscribers: Vec<UnboundedSender<Option<T>>>,
}

impl<T: Storeable> Slot<T> {
    fn read(&self) -> Result<Option<T>> {
        let StoreBinding::Store(store) = &self.binding else {
            return Ok(self.value.clone());
        };
        let Some(text) = store.get_item(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => Ok(envelope.value),
            Err(e) => {
                warn!("Unable to parse storage variable {}: {}", self.key, e);
                Ok(None)
            }
        }
    }

    fn write(&self, value: &T) -> Result<()> {
        let StoreBinding::Store(store) = &self.binding else {
            return Ok(());
        };
        let text = serde_json::to_string(&Envelope {
            value: Some(value),
        })
        .map_err(Error::JsonDump)?;
        store.set_item(&self.key, &text)
    }

    fn erase(&self) -> Result<()> {
        match &self.binding {
            StoreBinding::Store(store) => store.remove_item(&self.key),
            StoreBinding::Memory => Ok(()),
        }
    }

    fn load(&mut self) -> Result<()> {
        self.value = self.read()?;
        self.loaded = self.value.is_some() || matches!(self.binding, StoreBinding::Memory);
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        if let Err(e) = self.load() {
            warn!("Unable to read storage variable {}: {}", self.key, e);
        }
    }

    fn emit(&mut self) {
        let value = self.value.clone();
        self.subscribers.retain(|tx| tx.unbounded_send(value.clone()).is_ok());
    }

    fn store_value(&mut self, value: T) -> Result<()> {
        self.write(&value)?;
        self.value = Some(value);
        self.loaded = true;
        self.emit();
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.erase()?;
        self.value = None;
        self.loaded = matches!(self.binding, StoreBinding::Memory);
        self.emit();
        Ok(())
    }
}

/// A typed value kept in a storage backend, with change notifications.
///
/// # Example
///
/// ```
/// use hue_lights_rs::StoredVariable;
/// use hue_lights_rs::storage::StoreBinding;
///
/// let brightness =
///     StoredVariable::bind(StoreBinding::Memory, "Example", "bri", Some(254u8)).unwrap();
/// assert_eq!(brightness.get(), Some(254));
///
/// brightness.set(100).unwrap();
/// assert_eq!(brightness.get(), Some(100));
///
/// brightness.reset().unwrap();
/// assert_eq!(brightness.get(), Some(254));
/// ```
pub struct StoredVariable<T: Storeable> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Storeable> Clone for StoredVariable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Storeable> fmt::Debug for StoredVariable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("StoredVariable")
            .field("key", &slot.key)
            .field("binding", &slot.binding)
            .field("value", &slot.value)
            .finish()
    }
}

impl<T: Storeable> StoredVariable<T> {
    /// Bind `field` of the group `owner` to `binding`.
    ///
    /// Loads any stored value; when there is none and a default is given,
    /// the default is written to the store.
    pub fn bind(
        binding: StoreBinding,
        owner: &str,
        field: &str,
        default: Option<T>,
    ) -> Result<Self> {
        let mut slot = Slot {
            binding,
            key: storage_key(owner, field),
            value: None,
            loaded: false,
            default,
            subscribers: Vec::new(),
        };

        slot.load()?;
        if slot.value.is_none() {
            if let Some(default) = slot.default.clone() {
                slot.store_value(default)?;
            }
        }

        Ok(Self {
            slot: Arc::new(Mutex::new(slot)),
        })
    }

    /// Full storage key of this variable.
    pub fn key(&self) -> String {
        self.lock().key.clone()
    }

    /// Kind of backend this variable writes to.
    pub fn store_kind(&self) -> StoreKind {
        self.lock().binding.kind()
    }

    pub fn default_value(&self) -> Option<T> {
        self.lock().default.clone()
    }

    /// Returns the cached value, loading it from the store first if nothing
    /// is cached. Read failures are logged and read as `None`.
    pub fn get(&self) -> Option<T> {
        let mut slot = self.lock();
        slot.ensure_loaded();
        slot.value.clone()
    }

    /// Store `value` unless it equals the cached value.
    ///
    /// Equal values cause neither a write nor a notification.
    pub fn set(&self, value: T) -> Result<()> {
        let mut slot = self.lock();
        slot.ensure_loaded();
        if slot.value.as_ref() == Some(&value) {
            return Ok(());
        }
        slot.store_value(value)
    }

    /// Store `value` and notify, even if it equals the cached value.
    pub fn force_set(&self, value: T) -> Result<()> {
        self.lock().store_value(value)
    }

    /// Re-read the store, bypassing the cache.
    ///
    /// Subscribers are notified only if the stored value differs from the
    /// cached one.
    pub fn force_get(&self) -> Result<Option<T>> {
        let mut slot = self.lock();
        let before = slot.value.clone();
        slot.load()?;
        if slot.value != before {
            slot.emit();
        }
        Ok(slot.value.clone())
    }

    /// Set back to the default, or [`remove`](Self::remove) when there is none.
    pub fn reset(&self) -> Result<()> {
        let mut slot = self.lock();
        match slot.default.clone() {
            Some(default) => {
                slot.ensure_loaded();
                if slot.value.as_ref() == Some(&default) {
                    return Ok(());
                }
                slot.store_value(default)
            }
            None => slot.clear(),
        }
    }

    /// Clear the cached value and the stored entry, and notify `None`.
    pub fn remove(&self) -> Result<()> {
        self.lock().clear()
    }

    /// Listen for changes.
    ///
    /// The subscription yields the current value first and then every
    /// notification in order. It never ends while the variable exists.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = unbounded();
        let mut slot = self.lock();
        slot.ensure_loaded();
        // the receiver is alive, so this cannot fail
        let _ = tx.unbounded_send(slot.value.clone());
        slot.subscribers.push(tx);
        Subscription { rx }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Change notifications from a [`StoredVariable`].
///
/// Implements [`Stream`]; [`Subscription::try_next`] polls without waiting.
pub struct Subscription<T> {
    rx: UnboundedReceiver<Option<T>>,
}

impl<T> Subscription<T> {
    /// Returns the next queued notification, if one is waiting.
    pub fn try_next(&mut self) -> Option<Option<T>> {
        self.rx.next().now_or_never().flatten()
    }

    /// Drains the queue and returns the latest notification, if any.
    pub fn latest(&mut self) -> Option<Option<T>> {
        let mut latest = None;
        while let Some(value) = self.try_next() {
            latest = Some(value);
        }
        latest
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Option<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts writes so tests can assert on them.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
        removes: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn kind(&self) -> StoreKind {
            StoreKind::Durable
        }

        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_item(key)
        }
    }

    fn counting() -> (Arc<CountingStore>, StoreBinding) {
        let store = Arc::new(CountingStore::default());
        let binding = StoreBinding::store(store.clone());
        (store, binding)
    }

    fn drain<T>(sub: &mut Subscription<T>) -> Vec<Option<T>> {
        std::iter::from_fn(|| sub.try_next()).collect()
    }

    #[test]
    fn test_set_notifies_once() {
        let (_, binding) = counting();
        let var = StoredVariable::<String>::bind(binding, "Test", "name", None).unwrap();
        let mut sub = var.subscribe();
        assert_eq!(drain(&mut sub), vec![None]);

        var.set("lamp".to_string()).unwrap();
        assert_eq!(var.get().as_deref(), Some("lamp"));
        assert_eq!(drain(&mut sub), vec![Some("lamp".to_string())]);
    }

    #[test]
    fn test_set_equal_value_is_noop() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "Test", "n", None).unwrap();
        var.set(5u32).unwrap();
        let mut sub = var.subscribe();
        drain(&mut sub);
        let writes = store.writes.load(Ordering::SeqCst);

        var.set(5).unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), writes);
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn test_force_set_always_writes_and_notifies() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "Test", "n", None).unwrap();
        var.set(5u32).unwrap();
        let mut sub = var.subscribe();
        drain(&mut sub);

        var.force_set(5).unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        assert_eq!(drain(&mut sub), vec![Some(5)]);
    }

    #[test]
    fn test_envelope_format() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "Owner", "flag", None).unwrap();
        var.set(false).unwrap();
        assert_eq!(
            store.inner.get_item("HUE_Owner_flag").unwrap().as_deref(),
            Some("{\"V\":false}")
        );
    }

    #[test]
    fn test_bind_loads_existing_value() {
        let (store, binding) = counting();
        store.inner.set_item("HUE_Owner_ip", "{\"V\":\"10.0.0.2\"}").unwrap();
        let var = StoredVariable::<String>::bind(binding, "Owner", "ip", Some("x".into())).unwrap();
        assert_eq!(var.get().as_deref(), Some("10.0.0.2"));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bind_writes_default_when_absent() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "Owner", "interval", Some(1000u32)).unwrap();
        assert_eq!(var.get(), Some(1000));
        assert!(store.inner.contains_key("HUE_Owner_interval"));
    }

    #[test]
    fn test_malformed_value_reads_as_absent() {
        let (store, binding) = counting();
        store.inner.set_item("HUE_Owner_ip", "{not json").unwrap();
        let var = StoredVariable::<String>::bind(binding, "Owner", "ip", None).unwrap();
        assert_eq!(var.get(), None);

        store.inner.set_item("HUE_Owner_ip", "{\"V\":42}").unwrap();
        assert_eq!(var.force_get().unwrap(), None);
    }

    #[test]
    fn test_reset_with_default() {
        let var = StoredVariable::bind(StoreBinding::Memory, "T", "x", Some(3i64)).unwrap();
        var.set(9).unwrap();
        var.reset().unwrap();
        assert_eq!(var.get(), Some(3));
    }

    #[test]
    fn test_reset_without_default_removes() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "T", "x", None).unwrap();
        var.set(9i64).unwrap();
        let mut sub = var.subscribe();
        drain(&mut sub);

        var.reset().unwrap();
        assert_eq!(var.get(), None);
        assert!(!store.inner.contains_key("HUE_T_x"));
        assert_eq!(drain(&mut sub), vec![None]);
    }

    #[test]
    fn test_remove_notifies_none() {
        let var = StoredVariable::bind(StoreBinding::Memory, "T", "x", Some(1u8)).unwrap();
        let mut sub = var.subscribe();
        var.remove().unwrap();
        assert_eq!(drain(&mut sub), vec![Some(1), None]);
        assert_eq!(var.get(), None);
    }

    #[test]
    fn test_force_get_picks_up_external_writes() {
        let (store, binding) = counting();
        let var = StoredVariable::bind(binding, "T", "x", None).unwrap();
        var.set(1u16).unwrap();
        let mut sub = var.subscribe();
        drain(&mut sub);

        store.inner.set_item("HUE_T_x", "{\"V\":2}").unwrap();
        assert_eq!(var.get(), Some(1));
        assert_eq!(var.force_get().unwrap(), Some(2));
        assert_eq!(var.get(), Some(2));
        assert_eq!(drain(&mut sub), vec![Some(2)]);

        // unchanged re-read stays quiet
        assert_eq!(var.force_get().unwrap(), Some(2));
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn test_clones_share_value_and_subscribers() {
        let var = StoredVariable::<String>::bind(StoreBinding::Memory, "T", "x", None).unwrap();
        let other = var.clone();
        let mut sub = var.subscribe();
        other.set("shared".into()).unwrap();
        assert_eq!(var.get().as_deref(), Some("shared"));
        assert_eq!(sub.latest(), Some(Some("shared".to_string())));
    }

    #[test]
    fn test_nested_arrays() {
        let (_, binding) = counting();
        let var = StoredVariable::<Vec<Vec<f64>>>::bind(binding, "T", "xy", None).unwrap();
        var.set(vec![vec![0.1, 0.2], vec![0.3]]).unwrap();
        assert_eq!(var.force_get().unwrap(), Some(vec![vec![0.1, 0.2], vec![0.3]]));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let var = StoredVariable::bind(StoreBinding::Memory, "T", "x", None).unwrap();
        drop(var.subscribe());
        var.set(1u8).unwrap();
        assert!(var.lock().subscribers.is_empty());
    }

    #[test]
    fn test_stream_interface() {
        let var = StoredVariable::bind(StoreBinding::Memory, "T", "x", Some(true)).unwrap();
        let mut sub = var.subscribe();
        var.set(false).unwrap();
        let first = futures::executor::block_on(sub.next());
        let second = futures::executor::block_on(sub.next());
        assert_eq!(first, Some(Some(true)));
        assert_eq!(second, Some(Some(false)));
    }
}
