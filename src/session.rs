//! Session startup: storage probing, backend selection and schema migration.

use std::env;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Error;
use crate::group::{BridgeSession, VariableGroup, ViewPreferences};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, StoreBinding, StoreKind};
use crate::variable::StoredVariable;

type Result<T> = std::result::Result<T, Error>;

/// Where and how a [`Session`] keeps its state.
///
/// # Example
///
/// ```
/// use hue_lights_rs::SessionConfig;
/// use hue_lights_rs::storage::StoreKind;
///
/// let config = SessionConfig::default()
///     .with_storage_dir("/tmp/hue-state")
///     .with_credential_store(StoreKind::Session);
/// assert_eq!(config.storage_path(), std::path::Path::new("/tmp/hue-state/storage.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory of the durable store.
    pub storage_dir: PathBuf,
    /// Directory of the per-session stores.
    pub session_dir: PathBuf,
    pub session_id: Uuid,
    /// Version of the stored data layout. A different stored version wipes every group.
    pub schema_version: f64,
    /// Backend of the bridge credentials.
    pub credential_store: StoreKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let storage_dir = dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join(Self::APP_DIR);
        SessionConfig {
            storage_dir,
            session_dir: env::temp_dir().join(Self::APP_DIR),
            session_id: Uuid::new_v4(),
            schema_version: Session::SCHEMA_VERSION,
            credential_store: StoreKind::Durable,
        }
    }
}

impl SessionConfig {
    const APP_DIR: &'static str = "hue-lights-rs";
    const STORAGE_FILE: &'static str = "storage.json";

    pub const ENV_STORAGE_DIR: &'static str = "HUE_LIGHTS_STORAGE_DIR";
    pub const ENV_SESSION_DIR: &'static str = "HUE_LIGHTS_SESSION_DIR";
    pub const ENV_SESSION_ID: &'static str = "HUE_LIGHTS_SESSION_ID";

    /// Defaults, overridden by the `HUE_LIGHTS_*` environment variables.
    ///
    /// An unparsable session id is logged and replaced by a fresh one.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(Self::ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env::var_os(Self::ENV_SESSION_DIR) {
            config.session_dir = PathBuf::from(dir);
        }
        if let Ok(id) = env::var(Self::ENV_SESSION_ID) {
            match Uuid::parse_str(&id) {
                Ok(id) => config.session_id = id,
                Err(e) => warn!("Ignoring {}={}: {}", Self::ENV_SESSION_ID, id, e),
            }
        }
        config
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    pub fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = id;
        self
    }

    pub fn with_schema_version(mut self, version: f64) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_credential_store(mut self, store: StoreKind) -> Self {
        self.credential_store = store;
        self
    }

    /// File of the durable store.
    pub fn storage_path(&self) -> PathBuf {
        self.storage_dir.join(Self::STORAGE_FILE)
    }
}

/// Result of the startup storage probe, as a bitmask.
///
/// # Example
///
/// ```
/// use hue_lights_rs::ProbeStatus;
///
/// let status = ProbeStatus::SESSION_FAILURE | ProbeStatus::DURABLE_FAILURE;
/// assert!(status.contains(ProbeStatus::DURABLE_FAILURE));
/// assert!(!status.contains(ProbeStatus::SECURITY_FAILURE));
/// assert_eq!(status.bits(), 3);
/// assert_eq!(status.to_string(), "session, durable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProbeStatus(u8);

impl ProbeStatus {
    pub const PASSED: ProbeStatus = ProbeStatus(0);
    pub const SESSION_FAILURE: ProbeStatus = ProbeStatus(1);
    pub const DURABLE_FAILURE: ProbeStatus = ProbeStatus(2);
    pub const SECURITY_FAILURE: ProbeStatus = ProbeStatus(4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_passed(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: ProbeStatus) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProbeStatus {
    type Output = ProbeStatus;

    fn bitor(self, rhs: ProbeStatus) -> ProbeStatus {
        ProbeStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProbeStatus {
    fn bitor_assign(&mut self, rhs: ProbeStatus) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_passed() {
            return f.write_str("passed");
        }
        let names = [
            (ProbeStatus::SESSION_FAILURE, "session"),
            (ProbeStatus::DURABLE_FAILURE, "durable"),
            (ProbeStatus::SECURITY_FAILURE, "security"),
        ];
        let failed: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&failed.join(", "))
    }
}

/// Process state shared by the bridge client and the views.
///
/// Construction never fails: when storage cannot be used, every group
/// falls back to memory and the session works without persistence.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use hue_lights_rs::{Session, SessionConfig};
/// use hue_lights_rs::storage::{MemoryStore, StoreKind};
///
/// let durable = Arc::new(MemoryStore::with_kind(StoreKind::Durable));
/// let scoped = Arc::new(MemoryStore::with_kind(StoreKind::Session));
/// let session = Session::with_stores(SessionConfig::default(), Some(durable), Some(scoped));
///
/// assert!(session.supports_storage());
/// session.bridge().ip().set("192.168.1.20".to_string()).unwrap();
/// assert_eq!(session.preferences().refresh_interval_ms().get(), Some(1000));
/// session.shutdown();
/// ```
pub struct Session {
    config: SessionConfig,
    status: ProbeStatus,
    schema_reset: bool,
    durable: Option<Arc<dyn KeyValueStore>>,
    scoped: Option<Arc<dyn KeyValueStore>>,
    scratch: MemoryStore,
    bridge: BridgeSession,
    preferences: ViewPreferences,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.config.session_id)
            .field("status", &self.status)
            .field("schema_reset", &self.schema_reset)
            .finish()
    }
}

impl Session {
    /// Layout version of the data this crate writes.
    pub const SCHEMA_VERSION: f64 = 1.0;

    const PROBE_KEY: &'static str = "accessTest";
    const PROBE_VALUE: &'static str = "1";
    const VERSION_OWNER: &'static str = "Session";
    const VERSION_FIELD: &'static str = "Version";

    /// Open the file stores described by `config` and start the session.
    pub fn initialize(config: SessionConfig) -> Session {
        let durable = match FileStore::durable(config.storage_path()) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn KeyValueStore>),
            Err(e) => {
                warn!("Durable storage unavailable: {}", e);
                None
            }
        };
        let scoped = match FileStore::session(&config.session_dir, &config.session_id) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn KeyValueStore>),
            Err(e) => {
                warn!("Session storage unavailable: {}", e);
                None
            }
        };
        Self::with_stores(config, durable, scoped)
    }

    /// Start the session on the given stores. `None` marks a backend as missing.
    pub fn with_stores(
        config: SessionConfig,
        durable: Option<Arc<dyn KeyValueStore>>,
        scoped: Option<Arc<dyn KeyValueStore>>,
    ) -> Session {
        let mut status = ProbeStatus::PASSED;
        status |= probe(scoped.as_deref(), ProbeStatus::SESSION_FAILURE);
        status |= probe(durable.as_deref(), ProbeStatus::DURABLE_FAILURE);

        let mut schema_reset = false;
        if status.is_passed() {
            if let Some(store) = &durable {
                schema_reset = check_version(store, config.schema_version);
            }
        } else {
            warn!(
                "Storage probe failed ({}); session state will not be persisted",
                status
            );
        }

        let mut session = Session {
            bridge: BridgeSession::new(config.credential_store),
            preferences: ViewPreferences::new(),
            config,
            status,
            schema_reset,
            durable,
            scoped,
            scratch: MemoryStore::new(),
        };

        let bindings: Vec<StoreBinding> = session
            .groups()
            .iter()
            .map(|g| session.binding_for(g.preferred_store()))
            .collect();
        for (group, binding) in session.groups_mut().into_iter().zip(bindings) {
            init_group(group, &binding);
        }

        if schema_reset {
            info!("Stored data layout changed; resetting session state");
            for group in session.groups() {
                if let Err(e) = group.reset_all() {
                    error!("Failed to reset {}: {}", group.owner(), e);
                }
            }
        }

        debug!("Session {} started", session.config.session_id);
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn bridge(&self) -> &BridgeSession {
        &self.bridge
    }

    pub fn preferences(&self) -> &ViewPreferences {
        &self.preferences
    }

    pub fn probe_status(&self) -> ProbeStatus {
        self.status
    }

    /// True when both the durable and the session store passed the probe.
    pub fn supports_storage(&self) -> bool {
        self.status.is_passed()
    }

    /// True when startup wiped the groups because of a schema change.
    pub fn schema_reset(&self) -> bool {
        self.schema_reset
    }

    /// In-memory dictionary living as long as the session.
    pub fn scratch(&self) -> &MemoryStore {
        &self.scratch
    }

    /// End the session and release its session-scoped store.
    pub fn shutdown(self) {
        if let Some(store) = &self.scoped {
            if let Err(e) = store.release() {
                warn!("Failed to release session storage: {}", e);
            }
        }
        debug!("Session {} ended", self.config.session_id);
    }

    fn groups(&self) -> [&dyn VariableGroup; 2] {
        [&self.bridge, &self.preferences]
    }

    fn groups_mut(&mut self) -> [&mut dyn VariableGroup; 2] {
        [&mut self.bridge, &mut self.preferences]
    }

    fn binding_for(&self, kind: StoreKind) -> StoreBinding {
        if !self.status.is_passed() {
            return StoreBinding::Memory;
        }
        let store = match kind {
            StoreKind::Durable => self.durable.clone(),
            StoreKind::Session => self.scoped.clone(),
            StoreKind::Memory => None,
        };
        store.map_or(StoreBinding::Memory, StoreBinding::Store)
    }
}

/// Write, read back and remove a test entry.
fn probe(store: Option<&dyn KeyValueStore>, failure: ProbeStatus) -> ProbeStatus {
    let Some(store) = store else {
        return failure;
    };
    match probe_round_trip(store) {
        Ok(true) => ProbeStatus::PASSED,
        Ok(false) => failure,
        Err(e) if e.is_blocked() => ProbeStatus::SECURITY_FAILURE,
        Err(e) => {
            debug!("{} store probe failed: {}", store.kind(), e);
            failure
        }
    }
}

fn probe_round_trip(store: &dyn KeyValueStore) -> Result<bool> {
    store.set_item(Session::PROBE_KEY, Session::PROBE_VALUE)?;
    let read = store.get_item(Session::PROBE_KEY)?;
    store.remove_item(Session::PROBE_KEY)?;
    Ok(read.as_deref() == Some(Session::PROBE_VALUE))
}

/// Returns true when the stored version is absent or differs from `version`.
fn check_version(store: &Arc<dyn KeyValueStore>, version: f64) -> bool {
    let binding = StoreBinding::store(Arc::clone(store));
    let marker = match StoredVariable::<f64>::bind(
        binding,
        Session::VERSION_OWNER,
        Session::VERSION_FIELD,
        None,
    ) {
        Ok(marker) => marker,
        Err(e) => {
            warn!("Unable to read the stored schema version: {}", e);
            return true;
        }
    };

    if marker.get() == Some(version) {
        return false;
    }
    if let Err(e) = marker.set(version) {
        warn!("Unable to write the schema version: {}", e);
    }
    true
}

fn init_group(group: &mut dyn VariableGroup, binding: &StoreBinding) {
    if let Err(e) = group.init(binding) {
        warn!(
            "Unable to bind {} to {} storage, keeping it in memory: {}",
            group.owner(),
            binding.kind(),
            e
        );
        if let Err(e) = group.init(&StoreBinding::Memory) {
            error!("Unable to initialize {}: {}", group.owner(), e);
        }
    }
}
