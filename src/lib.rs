//! # hue_lights_rs
//!
//! A Rust client for Hue bridges, built around two pieces:
//!
//! - **Color math**: conversions between the bridge's hue wheel, HSB, CIE 1931
//!   `xy`, sRGB and hex strings (see [`convert`]).
//! - **Session state**: typed, observable variables backed by durable,
//!   session-scoped or in-memory storage, with a startup probe that falls back
//!   to memory and a schema version that wipes stale data.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hue_lights_rs::{BridgeClient, Hue, Session, SessionConfig, StatePayload};
//!
//! async fn turn_blue() -> Result<(), Box<dyn std::error::Error>> {
//!     // Restore credentials saved by a previous run
//!     let session = Session::initialize(SessionConfig::from_env());
//!     let client = BridgeClient::connect(session.bridge())?;
//!
//!     if !client.has_credentials() {
//!         client.login("192.168.1.2", "my-whitelisted-username").await?;
//!     }
//!
//!     let mut payload = StatePayload::new();
//!     payload.on(true);
//!     payload.hue(&Hue::BLUE);
//!     client.set_light_state("1", &payload).await?;
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Colors
//!
//! ```
//! use hue_lights_rs::convert;
//! use hue_lights_rs::Xy;
//!
//! assert_eq!(convert::hue_to_hex(46920), "#0000ff");
//! assert_eq!(convert::hsb_to_hex(0, 254, 254), "#ff0000");
//! assert_eq!(convert::xy_to_hex(Xy::new(0.675, 0.322), 1.0), "#ff0000");
//! ```
//!
//! ## Storage
//!
//! Values are stored as `{"V": <json>}` under `HUE_<group>_<field>`. The
//! durable store is a JSON file below the user's config directory; the
//! session store is a file named after the session id that is removed on
//! [`Session::shutdown`].
//!
//! ## Feature Flags
//!
//! - `http` (default): [`ReqwestTransport`], an HTTP transport built on `reqwest`

mod bridge;
mod config;
pub mod convert;
mod errors;
mod group;
mod lights;
pub mod merge;
mod payload;
mod response;
mod session;
pub mod storage;
mod types;
mod variable;

// Re-export public API
#[cfg(feature = "http")]
pub use bridge::ReqwestTransport;
pub use bridge::{BridgeAddress, BridgeClient, BridgeTransport};
pub use config::{
    Available, BridgeConfig, Capabilities, RuleCapabilities, SceneCapabilities,
    StreamingCapabilities, Timezones, WhitelistEntry,
};
pub use errors::Error;
pub use group::{BridgeSession, VariableGroup, ViewPreferences};
pub use lights::{
    ColorMode, Light, LightCollection, LightRegistry, LightState, LightSwatch, SoftwareUpdate,
};
pub use payload::{Alert, Effect, StatePayload, transition_label};
pub use response::{ApiError, SetStateResponse, bridge_error};
pub use session::{ProbeStatus, Session, SessionConfig};
pub use types::{Brightness, Hsb, Hue, Rgb255, RgbPercent, Saturation, Xy};
pub use variable::{Storeable, StoredVariable, Subscription};
