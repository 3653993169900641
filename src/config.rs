//! Bridge capabilities and configuration resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of resources of one kind the bridge can still create.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Available {
    pub available: u32,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RuleCapabilities {
    pub available: u32,
    pub actions: Option<Available>,
    pub conditions: Option<Available>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct SceneCapabilities {
    pub available: u32,
    pub lightstates: Option<Available>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct StreamingCapabilities {
    pub available: u32,
    pub channels: Option<u32>,
    pub total: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Timezones {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Reply to `GET capabilities`.
///
/// An authorized reply always carries `lights`; the login check relies on it.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub lights: Option<Available>,
    pub groups: Option<Available>,
    pub sensors: Option<Available>,
    pub resourcelinks: Option<Available>,
    pub schedules: Option<Available>,
    pub rules: Option<RuleCapabilities>,
    pub scenes: Option<SceneCapabilities>,
    pub streaming: Option<StreamingCapabilities>,
    pub timezones: Option<Timezones>,
}

/// An application registered on the bridge.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub name: String,
    #[serde(rename = "last use date", default)]
    pub last_use_date: Option<String>,
    #[serde(rename = "create date", default)]
    pub create_date: Option<String>,
}

/// Reply to `GET config`.
///
/// Dates are kept as the bridge formats them. Nested update and portal
/// records are kept as raw JSON.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct BridgeConfig {
    pub name: String,
    pub bridgeid: Option<String>,
    pub mac: Option<String>,
    pub modelid: Option<String>,
    pub swversion: Option<String>,
    pub apiversion: Option<String>,
    pub datastoreversion: Option<String>,
    pub zigbeechannel: Option<u8>,
    pub dhcp: Option<bool>,
    pub ipaddress: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub proxyaddress: Option<String>,
    pub proxyport: Option<u16>,
    #[serde(rename = "UTC")]
    pub utc: Option<String>,
    pub localtime: Option<String>,
    pub timezone: Option<String>,
    pub linkbutton: Option<bool>,
    pub portalservices: Option<bool>,
    pub portalconnection: Option<String>,
    pub portalstate: Option<Value>,
    pub internetservices: Option<Value>,
    pub swupdate: Option<Value>,
    pub swupdate2: Option<Value>,
    pub backup: Option<Value>,
    pub factorynew: Option<bool>,
    pub replacesbridgeid: Option<String>,
    pub starterkitid: Option<String>,
    #[serde(default)]
    pub whitelist: BTreeMap<String, WhitelistEntry>,
}

impl BridgeConfig {
    /// True if `username` is registered on the bridge.
    pub fn is_whitelisted(&self, username: &str) -> bool {
        self.whitelist.contains_key(username)
    }
}
