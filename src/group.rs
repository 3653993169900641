//! Named bundles of stored variables.

use crate::errors::Error;
use crate::storage::{StoreBinding, StoreKind};
use crate::variable::StoredVariable;

type Result<T> = std::result::Result<T, Error>;

/// A set of [`StoredVariable`]s that are bound, reset and removed together.
///
/// Groups start uninitialized; [`VariableGroup::init`] binds every field.
/// `reset_all` and `remove_all` visit the fields in order and stop at the
/// first failure, leaving earlier fields changed.
pub trait VariableGroup: Send {
    /// Discriminator used in every key of this group.
    fn owner(&self) -> &'static str;

    /// Backend this group asks for when storage is available.
    fn preferred_store(&self) -> StoreKind;

    /// Bind every field to `binding`.
    ///
    /// On failure the group keeps its previous state.
    fn init(&mut self, binding: &StoreBinding) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Reset every field to its default.
    fn reset_all(&self) -> Result<()>;

    /// Remove every field from its backend.
    fn remove_all(&self) -> Result<()>;
}

fn uninitialized(owner: &str) -> ! {
    panic!("{owner} used before init")
}

struct BridgeFields {
    ip: StoredVariable<String>,
    username: StoredVariable<String>,
}

/// Bridge credentials: the bridge IP and the whitelisted username.
///
/// # Example
///
/// ```
/// use hue_lights_rs::{BridgeSession, VariableGroup};
/// use hue_lights_rs::storage::StoreBinding;
///
/// let mut bridge = BridgeSession::default();
/// bridge.init(&StoreBinding::Memory).unwrap();
///
/// bridge.ip().set("192.168.1.20".to_string()).unwrap();
/// assert_eq!(bridge.ip().get().as_deref(), Some("192.168.1.20"));
/// assert_eq!(bridge.username().get(), None);
/// ```
pub struct BridgeSession {
    store: StoreKind,
    fields: Option<BridgeFields>,
}

impl Default for BridgeSession {
    fn default() -> Self {
        Self::new(StoreKind::Durable)
    }
}

impl BridgeSession {
    pub const OWNER: &'static str = "HueBridgeSession";
    pub const IP: &'static str = "HUE_BR_IP";
    pub const USERNAME: &'static str = "HUE_BR_KEY";

    /// Create an uninitialized group that prefers the `store` backend.
    pub fn new(store: StoreKind) -> Self {
        Self {
            store,
            fields: None,
        }
    }

    /// IP address (or host name) of the bridge.
    ///
    /// # Panics
    ///
    /// Panics if the group has not been initialized.
    pub fn ip(&self) -> &StoredVariable<String> {
        &self.fields().ip
    }

    /// Username the bridge issued to this client.
    ///
    /// # Panics
    ///
    /// Panics if the group has not been initialized.
    pub fn username(&self) -> &StoredVariable<String> {
        &self.fields().username
    }

    /// True when both the IP and the username are set and non-empty.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &StoredVariable<String>| v.get().is_some_and(|s| !s.is_empty());
        present(self.ip()) && present(self.username())
    }

    fn fields(&self) -> &BridgeFields {
        match &self.fields {
            Some(fields) => fields,
            None => uninitialized(Self::OWNER),
        }
    }
}

impl VariableGroup for BridgeSession {
    fn owner(&self) -> &'static str {
        Self::OWNER
    }

    fn preferred_store(&self) -> StoreKind {
        self.store
    }

    fn init(&mut self, binding: &StoreBinding) -> Result<()> {
        let ip = StoredVariable::bind(binding.clone(), Self::OWNER, Self::IP, None)?;
        let username = StoredVariable::bind(binding.clone(), Self::OWNER, Self::USERNAME, None)?;
        self.fields = Some(BridgeFields { ip, username });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.fields.is_some()
    }

    fn reset_all(&self) -> Result<()> {
        self.ip().reset()?;
        self.username().reset()
    }

    fn remove_all(&self) -> Result<()> {
        self.ip().remove()?;
        self.username().remove()
    }
}

struct PreferenceFields {
    auto_refresh: StoredVariable<bool>,
    refresh_interval_ms: StoredVariable<u32>,
}

/// Per-session view settings of the light list.
pub struct ViewPreferences {
    fields: Option<PreferenceFields>,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewPreferences {
    pub const OWNER: &'static str = "HueViewPreferences";
    pub const AUTO_REFRESH: &'static str = "AutoRefresh";
    pub const REFRESH_INTERVAL: &'static str = "RefreshInterval";
    pub const DEFAULT_REFRESH_INTERVAL_MS: u32 = 1000;

    pub fn new() -> Self {
        Self { fields: None }
    }

    /// Whether the light list polls the bridge periodically. Defaults to `false`.
    ///
    /// # Panics
    ///
    /// Panics if the group has not been initialized.
    pub fn auto_refresh(&self) -> &StoredVariable<bool> {
        &self.fields().auto_refresh
    }

    /// Poll period in milliseconds. Defaults to 1000.
    ///
    /// # Panics
    ///
    /// Panics if the group has not been initialized.
    pub fn refresh_interval_ms(&self) -> &StoredVariable<u32> {
        &self.fields().refresh_interval_ms
    }

    fn fields(&self) -> &PreferenceFields {
        match &self.fields {
            Some(fields) => fields,
            None => uninitialized(Self::OWNER),
        }
    }
}

impl VariableGroup for ViewPreferences {
    fn owner(&self) -> &'static str {
        Self::OWNER
    }

    fn preferred_store(&self) -> StoreKind {
        StoreKind::Session
    }

    fn init(&mut self, binding: &StoreBinding) -> Result<()> {
        let auto_refresh =
            StoredVariable::bind(binding.clone(), Self::OWNER, Self::AUTO_REFRESH, Some(false))?;
        let refresh_interval_ms = StoredVariable::bind(
            binding.clone(),
            Self::OWNER,
            Self::REFRESH_INTERVAL,
            Some(Self::DEFAULT_REFRESH_INTERVAL_MS),
        )?;
        self.fields = Some(PreferenceFields {
            auto_refresh,
            refresh_interval_ms,
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.fields.is_some()
    }

    fn reset_all(&self) -> Result<()> {
        self.auto_refresh().reset()?;
        self.refresh_interval_ms().reset()
    }

    fn remove_all(&self) -> Result<()> {
        self.auto_refresh().remove()?;
        self.refresh_interval_ms().remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Refuses writes and removals of one key.
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
    }

    impl FailingKey {
        fn check(&self, key: &str) -> Result<()> {
            if key == self.key {
                return Err(Error::StorageBlocked {
                    path: PathBuf::from(key),
                });
            }
            Ok(())
        }
    }

    impl KeyValueStore for FailingKey {
        fn kind(&self) -> StoreKind {
            self.inner.kind()
        }

        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            self.check(key)?;
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.check(key)?;
            self.inner.remove_item(key)
        }
    }

    #[test]
    #[should_panic(expected = "HueBridgeSession used before init")]
    fn test_accessor_before_init_panics() {
        let bridge = BridgeSession::default();
        bridge.ip();
    }

    #[test]
    fn test_bridge_keys() {
        let store = Arc::new(MemoryStore::with_kind(StoreKind::Durable));
        let mut bridge = BridgeSession::default();
        assert!(!bridge.is_initialized());
        bridge.init(&StoreBinding::store(store.clone())).unwrap();
        assert!(bridge.is_initialized());
        assert_eq!(bridge.ip().store_kind(), StoreKind::Durable);

        bridge.ip().set("10.0.0.5".into()).unwrap();
        bridge.username().set("abc".into()).unwrap();
        assert!(store.contains_key("HUE_HueBridgeSession_HUE_BR_IP"));
        assert!(store.contains_key("HUE_HueBridgeSession_HUE_BR_KEY"));
        assert!(bridge.has_credentials());
    }

    #[test]
    fn test_empty_username_is_not_a_credential() {
        let mut bridge = BridgeSession::default();
        bridge.init(&StoreBinding::Memory).unwrap();
        bridge.ip().set("10.0.0.5".into()).unwrap();
        bridge.username().set(String::new()).unwrap();
        assert!(!bridge.has_credentials());
    }

    #[test]
    fn test_bridge_remove_all() {
        let store = Arc::new(MemoryStore::new());
        let mut bridge = BridgeSession::default();
        bridge.init(&StoreBinding::store(store.clone())).unwrap();
        bridge.ip().set("10.0.0.5".into()).unwrap();
        bridge.username().set("abc".into()).unwrap();

        bridge.remove_all().unwrap();
        assert!(store.is_empty());
        assert_eq!(bridge.ip().get(), None);
    }

    #[test]
    fn test_bridge_reset_stops_at_first_failure() {
        let store = Arc::new(FailingKey {
            inner: MemoryStore::new(),
            key: "HUE_HueBridgeSession_HUE_BR_IP",
        });
        store
            .inner
            .set_item("HUE_HueBridgeSession_HUE_BR_IP", "{\"V\":\"10.0.0.5\"}")
            .unwrap();
        store
            .inner
            .set_item("HUE_HueBridgeSession_HUE_BR_KEY", "{\"V\":\"u\"}")
            .unwrap();
        let mut bridge = BridgeSession::default();
        bridge.init(&StoreBinding::store(store.clone())).unwrap();

        assert!(bridge.reset_all().unwrap_err().is_blocked());
        assert_eq!(bridge.ip().get().as_deref(), Some("10.0.0.5"));
        assert_eq!(bridge.username().get().as_deref(), Some("u"));

        assert!(bridge.remove_all().is_err());
        assert!(store.inner.contains_key("HUE_HueBridgeSession_HUE_BR_KEY"));
    }

    #[test]
    fn test_preferences_reset_keeps_earlier_fields_changed() {
        let store = Arc::new(FailingKey {
            inner: MemoryStore::with_kind(StoreKind::Session),
            key: "HUE_HueViewPreferences_RefreshInterval",
        });
        store
            .inner
            .set_item("HUE_HueViewPreferences_AutoRefresh", "{\"V\":true}")
            .unwrap();
        store
            .inner
            .set_item("HUE_HueViewPreferences_RefreshInterval", "{\"V\":250}")
            .unwrap();
        let mut prefs = ViewPreferences::default();
        prefs.init(&StoreBinding::store(store.clone())).unwrap();

        assert!(prefs.reset_all().is_err());
        assert_eq!(prefs.auto_refresh().get(), Some(false));
        assert_eq!(prefs.refresh_interval_ms().get(), Some(250));
    }

    #[test]
    fn test_preferences_defaults_and_reset() {
        let store = Arc::new(MemoryStore::with_kind(StoreKind::Session));
        let mut prefs = ViewPreferences::default();
        prefs.init(&StoreBinding::store(store.clone())).unwrap();
        assert_eq!(prefs.auto_refresh().get(), Some(false));
        assert_eq!(prefs.refresh_interval_ms().get(), Some(1000));
        assert_eq!(store.len(), 2);

        prefs.auto_refresh().set(true).unwrap();
        prefs.refresh_interval_ms().set(250).unwrap();
        prefs.reset_all().unwrap();
        assert_eq!(prefs.auto_refresh().get(), Some(false));
        assert_eq!(prefs.refresh_interval_ms().get(), Some(1000));
    }

    #[test]
    fn test_groups_do_not_collide() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut bridge = BridgeSession::default();
        let mut prefs = ViewPreferences::default();
        bridge.init(&StoreBinding::store(store.clone())).unwrap();
        prefs.init(&StoreBinding::store(store.clone())).unwrap();

        bridge.remove_all().unwrap();
        assert_eq!(prefs.refresh_interval_ms().get(), Some(1000));
    }
}
