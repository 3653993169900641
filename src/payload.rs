//! State payload for `PUT lights/{id}/state`.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::types::{Brightness, Hsb, Hue, Saturation, Xy};

/// Temporary flash of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Alert {
    None,
    /// One breathe cycle.
    Select,
    /// Breathe cycles for 15 seconds.
    Lselect,
}

/// Dynamic effect of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    None,
    /// Cycle through all hues at the current brightness and saturation.
    Colorloop,
}

/// A partial light state to send to the bridge.
///
/// Only the attributes that were set are serialized.
///
/// # Creating Payloads
///
/// 1. **From a single attribute** using the [`From`] trait:
///    ```
///    use hue_lights_rs::{StatePayload, Hue};
///    let payload = StatePayload::from(&Hue::BLUE);
///    ```
///
/// 2. **Builder pattern** for combining multiple attributes:
///    ```
///    use hue_lights_rs::{StatePayload, Brightness, Hue};
///    let mut payload = StatePayload::new();
///    payload.on(true);
///    payload.hue(&Hue::GREEN);
///    payload.brightness(&Brightness::create(200).unwrap());
///    payload.transition(4);
///    assert_eq!(
///        serde_json::to_string(&payload).unwrap(),
///        r#"{"on":true,"bri":200,"hue":25500,"transitiontime":4}"#
///    );
///    ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatePayload {
    pub(crate) on: Option<bool>,
    pub(crate) bri: Option<u8>,
    pub(crate) hue: Option<u16>,
    pub(crate) sat: Option<u8>,
    pub(crate) xy: Option<Xy>,
    pub(crate) ct: Option<u16>,
    pub(crate) alert: Option<Alert>,
    pub(crate) effect: Option<Effect>,
    #[serde(rename = "transitiontime")]
    pub(crate) transition: Option<u16>,
}

impl StatePayload {
    /// Coolest color temperature the bridge accepts, in mireds.
    pub const MIN_CT: u16 = 153;
    /// Warmest color temperature the bridge accepts, in mireds.
    pub const MAX_CT: u16 = 500;

    /// Create a new empty payload.
    ///
    /// At least one attribute must be set for the payload to be valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this payload changes anything.
    ///
    /// A transition time alone is not valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::StatePayload;
    ///
    /// let mut payload = StatePayload::new();
    /// payload.transition(10);
    /// assert_eq!(payload.is_valid(), false);
    ///
    /// payload.on(false);
    /// assert_eq!(payload.is_valid(), true);
    /// ```
    pub fn is_valid(&self) -> bool {
        self.on.is_some()
            || self.bri.is_some()
            || self.hue.is_some()
            || self.sat.is_some()
            || self.xy.is_some()
            || self.ct.is_some()
            || self.alert.is_some()
            || self.effect.is_some()
    }

    pub fn on(&mut self, on: bool) {
        self.on = Some(on);
    }

    pub fn brightness(&mut self, brightness: &Brightness) {
        self.bri = Some(brightness.value);
    }

    pub fn hue(&mut self, hue: &Hue) {
        self.hue = Some(hue.0);
    }

    pub fn saturation(&mut self, saturation: &Saturation) {
        self.sat = Some(saturation.value);
    }

    /// Set hue, saturation and brightness at once.
    pub fn hsb(&mut self, hsb: &Hsb) {
        self.hue(&hsb.hue);
        self.saturation(&hsb.saturation);
        self.brightness(&hsb.brightness);
    }

    pub fn xy(&mut self, xy: &Xy) {
        self.xy = Some(*xy);
    }

    /// Set the color temperature in mireds, clamped to 153-500.
    pub fn ct(&mut self, mireds: u16) {
        self.ct = Some(mireds.clamp(Self::MIN_CT, Self::MAX_CT));
    }

    pub fn alert(&mut self, alert: Alert) {
        self.alert = Some(alert);
    }

    pub fn effect(&mut self, effect: Effect) {
        self.effect = Some(effect);
    }

    /// Fade duration, in multiples of 100ms. The bridge defaults to 4.
    pub fn transition(&mut self, tenths: u16) {
        self.transition = Some(tenths);
    }
}

impl From<&Brightness> for StatePayload {
    fn from(brightness: &Brightness) -> Self {
        let mut p = StatePayload::new();
        p.brightness(brightness);
        p
    }
}

impl From<&Hue> for StatePayload {
    fn from(hue: &Hue) -> Self {
        let mut p = StatePayload::new();
        p.hue(hue);
        p
    }
}

impl From<&Hsb> for StatePayload {
    fn from(hsb: &Hsb) -> Self {
        let mut p = StatePayload::new();
        p.hsb(hsb);
        p
    }
}

impl From<&Xy> for StatePayload {
    fn from(xy: &Xy) -> Self {
        let mut p = StatePayload::new();
        p.xy(xy);
        p
    }
}

/// Human readable form of a transition time given in multiples of 100ms.
///
/// # Examples
///
/// ```
/// use hue_lights_rs::transition_label;
///
/// assert_eq!(transition_label(0), "Immediate");
/// assert_eq!(transition_label(4), "400 Milliseconds");
/// assert_eq!(transition_label(15), "1.5 Seconds");
/// assert_eq!(transition_label(900), "1.5 Minutes");
/// ```
pub fn transition_label(tenths: u16) -> String {
    let millis = 100 * u32::from(tenths);
    if millis >= 60_000 {
        format!("{} Minutes", f64::from(millis / 6_000) / 10.0)
    } else if millis >= 1_000 {
        format!("{} Seconds", f64::from(millis / 100) / 10.0)
    } else if millis > 0 {
        format!("{millis} Milliseconds")
    } else {
        "Immediate".to_string()
    }
}
