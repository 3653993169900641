//! Talking to a bridge over its local HTTP API.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{BridgeConfig, Capabilities};
use crate::errors::Error;
use crate::group::BridgeSession;
use crate::lights::{LightCollection, LightRegistry};
use crate::payload::StatePayload;
use crate::response::{SetStateResponse, bridge_error, first_error};
use crate::variable::{StoredVariable, Subscription};

type Result<T> = std::result::Result<T, Error>;

/// Base URL of the API for one username: `http://<ip>/api/<username>/`.
///
/// # Example
///
/// ```
/// use hue_lights_rs::BridgeAddress;
///
/// let address = BridgeAddress::from_credentials("192.168.1.2", "abc").unwrap();
/// assert_eq!(address.as_str(), "http://192.168.1.2/api/abc/");
/// assert_eq!(address.url("lights/1/state"), "http://192.168.1.2/api/abc/lights/1/state");
///
/// assert!(BridgeAddress::from_credentials("192.168.1.2", "").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeAddress(String);

impl BridgeAddress {
    /// Returns `None` unless both parts are non-empty.
    pub fn from_credentials(ip: &str, username: &str) -> Option<Self> {
        if ip.is_empty() || username.is_empty() {
            return None;
        }
        Some(BridgeAddress(format!("http://{ip}/api/{username}/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of `path` below this address.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl fmt::Display for BridgeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP requests against the bridge. Bodies are JSON text.
pub trait BridgeTransport: Send + Sync {
    /// GET `url` and return the response body.
    fn get(&self, url: &str) -> impl Future<Output = Result<String>> + Send;

    /// PUT `body` to `url` and return the response body.
    fn put(&self, url: &str, body: String) -> impl Future<Output = Result<String>> + Send;
}

#[cfg(feature = "http")]
mod http {
    use super::{BridgeTransport, Result};
    use crate::errors::Error;

    /// [`BridgeTransport`] backed by `reqwest`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        http: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self> {
            let http = reqwest::Client::builder()
                .user_agent(concat!("hue-lights-rs/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::Transport(e.to_string()))?;
            Ok(Self::with_client(http))
        }

        pub fn with_client(http: reqwest::Client) -> Self {
            ReqwestTransport { http }
        }

        async fn body(response: reqwest::Response) -> Result<String> {
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(Error::Transport(format!("HTTP {}: {}", status.as_u16(), body)));
            }
            Ok(body)
        }
    }

    impl BridgeTransport for ReqwestTransport {
        async fn get(&self, url: &str) -> Result<String> {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            Self::body(response).await
        }

        async fn put(&self, url: &str, body: String) -> Result<String> {
            let response = self
                .http
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            Self::body(response).await
        }
    }
}

#[cfg(feature = "http")]
pub use http::ReqwestTransport;

/// Parse a reply, turning an embedded bridge error into [`Error::Bridge`].
fn decode<R: DeserializeOwned>(body: &str) -> Result<R> {
    let value: Value = serde_json::from_str(body).map_err(Error::JsonLoad)?;
    if let Some(e) = bridge_error(&value) {
        return Err(e);
    }
    serde_json::from_str(body).map_err(Error::JsonLoad)
}

struct Watch {
    ip: Subscription<String>,
    username: Subscription<String>,
    address: Option<BridgeAddress>,
}

/// Client for one bridge, addressed by the credentials in a [`BridgeSession`].
///
/// The client follows the credential variables: storing a new IP or username
/// anywhere in the process changes the address of the next request.
pub struct BridgeClient<T: BridgeTransport> {
    transport: T,
    ip: StoredVariable<String>,
    username: StoredVariable<String>,
    watch: Mutex<Watch>,
}

impl<T: BridgeTransport> fmt::Debug for BridgeClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("address", &self.address())
            .finish()
    }
}

impl<T: BridgeTransport> BridgeClient<T> {
    /// How long [`BridgeClient::login`] waits for the bridge.
    pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a client for the credentials of `bridge`.
    ///
    /// # Panics
    ///
    /// Panics if `bridge` has not been initialized.
    pub fn new(transport: T, bridge: &BridgeSession) -> Self {
        let ip = bridge.ip().clone();
        let username = bridge.username().clone();

        let mut watch = Watch {
            ip: ip.subscribe(),
            username: username.subscribe(),
            address: None,
        };
        // the current values are read below
        watch.ip.try_next();
        watch.username.try_next();
        watch.address = Self::resolve(&ip, &username);

        BridgeClient {
            transport,
            ip,
            username,
            watch: Mutex::new(watch),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current bridge address, or `None` while the credentials are incomplete.
    pub fn address(&self) -> Option<BridgeAddress> {
        let mut watch = self.lock();
        let ip_changed = watch.ip.latest().is_some();
        let username_changed = watch.username.latest().is_some();
        if ip_changed || username_changed {
            watch.address = Self::resolve(&self.ip, &self.username);
            debug!("Bridge address is now {:?}", watch.address);
        }
        watch.address.clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.address().is_some()
    }

    /// All lights known to the bridge.
    pub async fn get_all_lights(&self) -> Result<LightCollection> {
        let url = self.url("lights")?;
        decode(&self.transport.get(&url).await?)
    }

    /// Fetch the lights and fold them into `registry`.
    ///
    /// Returns the number of lights whose swatch changed.
    pub async fn refresh(&self, registry: &mut LightRegistry) -> Result<usize> {
        let lights = self.get_all_lights().await?;
        Ok(registry.refresh(lights))
    }

    /// Change the state of light `id`.
    ///
    /// The bridge answers with one entry per attribute. The call fails only
    /// when no attribute was applied.
    pub async fn set_light_state(
        &self,
        id: &str,
        payload: &StatePayload,
    ) -> Result<Vec<SetStateResponse>> {
        if !payload.is_valid() {
            return Err(Error::NoAttribute);
        }
        let url = self.url(&format!("lights/{id}/state"))?;
        let body = serde_json::to_string(payload).map_err(Error::JsonDump)?;
        debug!("PUT {} {}", url, body);

        let text = self.transport.put(&url, body).await?;
        let responses: Vec<SetStateResponse> = match serde_json::from_str(&text) {
            Ok(responses) => responses,
            Err(e) => {
                let value: Value = serde_json::from_str(&text).map_err(Error::JsonLoad)?;
                return Err(bridge_error(&value).unwrap_or(Error::JsonLoad(e)));
            }
        };
        if !responses.iter().any(SetStateResponse::is_success) {
            if let Some(e) = first_error(&responses) {
                return Err(e);
            }
        }
        Ok(responses)
    }

    pub async fn get_capabilities(&self) -> Result<Capabilities> {
        let url = self.url("capabilities")?;
        decode(&self.transport.get(&url).await?)
    }

    pub async fn get_config(&self) -> Result<BridgeConfig> {
        let url = self.url("config")?;
        decode(&self.transport.get(&url).await?)
    }

    /// Store new credentials and check them against the bridge.
    ///
    /// The credentials stay stored even if the check fails.
    pub async fn login(&self, ip: &str, username: &str) -> Result<Capabilities> {
        self.ip.set(ip.to_string())?;
        self.username.set(username.to_string())?;
        let url = self.url("capabilities")?;

        let body = tokio::time::timeout(Self::LOGIN_TIMEOUT, self.transport.get(&url))
            .await
            .map_err(|_| Error::Timeout)??;
        let capabilities: Capabilities = decode(&body)?;
        if capabilities.lights.is_none() {
            debug!("Unexpected capabilities reply: {}", body);
            return Err(Error::InvalidBridgeResponse);
        }

        info!("Connected to bridge at {}", ip);
        Ok(capabilities)
    }

    fn url(&self, path: &str) -> Result<String> {
        self.address()
            .map(|a| a.url(path))
            .ok_or(Error::MissingCredentials)
    }

    fn resolve(
        ip: &StoredVariable<String>,
        username: &StoredVariable<String>,
    ) -> Option<BridgeAddress> {
        BridgeAddress::from_credentials(&ip.get()?, &username.get()?)
    }

    fn lock(&self) -> MutexGuard<'_, Watch> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(feature = "http")]
impl BridgeClient<ReqwestTransport> {
    /// Create a client using the default HTTP transport.
    pub fn connect(bridge: &BridgeSession) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?, bridge))
    }
}
