//! Light resources reported by the bridge, and a cache of them.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::convert;
use crate::errors::Error;
use crate::merge::{Node, Record};
use crate::types::Xy;

type Result<T> = std::result::Result<T, Error>;

/// Which color attributes a light is currently driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Hue and saturation.
    Hs,
    /// CIE xy chromaticity.
    Xy,
    /// Color temperature.
    Ct,
}

/// State of a light, as reported by `GET lights`.
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightState {
    pub on: Option<bool>,
    pub bri: Option<u8>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    pub xy: Option<Xy>,
    pub ct: Option<u16>,
    pub alert: Option<String>,
    pub effect: Option<String>,
    pub colormode: Option<ColorMode>,
    pub reachable: Option<bool>,
    pub transitiontime: Option<u16>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SoftwareUpdate {
    pub state: String,
    pub lastinstall: Option<String>,
}

/// A light known to the bridge.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Light {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub state: LightState,
    #[serde(default)]
    pub modelid: String,
    #[serde(default)]
    pub uniqueid: String,
    #[serde(default)]
    pub swversion: String,
    pub manufacturername: Option<String>,
    pub swconfigid: Option<String>,
    pub swupdate: Option<SoftwareUpdate>,
    pub capabilities: Option<Value>,
}

/// Reply to `GET lights`: lights keyed by bridge id, in reply order.
///
/// Entries are kept as raw JSON so that fields this crate does not model
/// survive a refresh; [`LightCollection::get`] decodes one light.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightCollection(Record);

impl LightCollection {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bridge ids of the lights, in order.
    pub fn ids(&self) -> Vec<String> {
        self.0.keys().map(String::from).collect()
    }

    /// Decode the light with bridge id `id`.
    pub fn get(&self, id: &str) -> Result<Option<Light>> {
        match self.0.get(id) {
            Some(Node::Record(record)) => record.to_typed().map(Some),
            Some(Node::Scalar(_)) => Err(Error::InvalidBridgeResponse),
            None => Ok(None),
        }
    }

    /// Decode every light, skipping (and logging) entries that do not parse.
    pub fn lights(&self) -> Vec<(String, Light)> {
        self.0
            .keys()
            .filter_map(|id| match self.get(id) {
                Ok(light) => light.map(|l| (id.to_string(), l)),
                Err(e) => {
                    warn!("Skipping light {}: {}", id, e);
                    None
                }
            })
            .collect()
    }
}

/// Hex colors derived from a light's hue and xy, for display.
///
/// # Example
///
/// ```
/// use hue_lights_rs::{LightState, LightSwatch};
///
/// let mut state = LightState::default();
/// state.hue = Some(0);
///
/// let mut swatch = LightSwatch::default();
/// assert!(swatch.update(&state));
/// assert_eq!(swatch.hue_hex(), "#ff0000");
/// assert!(!swatch.update(&state));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LightSwatch {
    hue: Option<u16>,
    xy: Option<Xy>,
    hue_hex: String,
    xy_hex: String,
    computed: bool,
}

impl Default for LightSwatch {
    fn default() -> Self {
        LightSwatch {
            hue: None,
            xy: None,
            hue_hex: Self::BLACK.to_string(),
            xy_hex: Self::BLACK.to_string(),
            computed: false,
        }
    }
}

impl LightSwatch {
    const BLACK: &'static str = "#000000";

    pub fn hue_hex(&self) -> &str {
        &self.hue_hex
    }

    /// XY color at full brightness.
    pub fn xy_hex(&self) -> &str {
        &self.xy_hex
    }

    /// Recompute the colors if hue or xy changed. Returns true if it did.
    pub fn update(&mut self, state: &LightState) -> bool {
        if self.computed && self.hue == state.hue && self.xy == state.xy {
            return false;
        }
        self.hue = state.hue;
        self.xy = state.xy;
        self.hue_hex = match state.hue {
            Some(hue) => convert::hue_to_hex(hue),
            None => Self::BLACK.to_string(),
        };
        self.xy_hex = match state.xy {
            Some(xy) => convert::xy_to_hex(xy, 1.0),
            None => Self::BLACK.to_string(),
        };
        self.computed = true;
        true
    }
}

/// The last known `GET lights` reply, refreshed in place.
///
/// Light data is merged into the cache; lights that disappear from the
/// bridge are dropped. The id list is taken from each reply as is.
#[derive(Debug, Default)]
pub struct LightRegistry {
    lights: Option<Record>,
    ids: Vec<String>,
    swatches: HashMap<String, LightSwatch>,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new reply into the cache. Returns how many swatches changed.
    pub fn refresh(&mut self, reply: LightCollection) -> usize {
        self.ids = reply.ids();
        match &mut self.lights {
            Some(lights) => lights.merge(reply.0),
            None => self.lights = Some(reply.0),
        }

        let collection = self.collection();
        self.swatches.retain(|id, _| collection.0.contains_key(id));

        let mut changed = 0;
        for (id, light) in collection.lights() {
            if self.swatches.entry(id).or_default().update(&light.state) {
                changed += 1;
            }
        }
        changed
    }

    /// True once a reply has been received.
    pub fn is_loaded(&self) -> bool {
        self.lights.is_some()
    }

    /// Bridge ids in the order of the last reply.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn light(&self, id: &str) -> Result<Option<Light>> {
        self.collection().get(id)
    }

    /// Decoded lights, in the order of the last reply.
    pub fn lights(&self) -> Vec<(String, Light)> {
        let collection = self.collection();
        self.ids
            .iter()
            .filter_map(|id| match collection.get(id) {
                Ok(light) => light.map(|l| (id.clone(), l)),
                Err(e) => {
                    warn!("Skipping light {}: {}", id, e);
                    None
                }
            })
            .collect()
    }

    pub fn swatch(&self, id: &str) -> Option<&LightSwatch> {
        self.swatches.get(id)
    }

    fn collection(&self) -> LightCollection {
        LightCollection(self.lights.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // raw text: json! values do not keep key order
    fn collection(text: &str) -> LightCollection {
        serde_json::from_str(text).unwrap()
    }

    fn reply() -> LightCollection {
        collection(
            r#"{
            "2": {
                "name": "Desk",
                "type": "Extended color light",
                "modelid": "LCT015",
                "uniqueid": "00:17:88:01:00:00:00:02-0b",
                "swversion": "1.46.13",
                "state": {"on": true, "bri": 254, "hue": 0, "sat": 254, "xy": [0.675, 0.322], "colormode": "xy", "reachable": true, "effect": "none", "alert": "none"}
            },
            "1": {
                "name": "Hall",
                "type": "Dimmable light",
                "state": {"on": false, "bri": 1, "reachable": true}
            }
        }"#,
        )
    }

    #[test]
    fn test_parse_lights() {
        let lights = reply();
        assert_eq!(lights.ids(), ["2", "1"]);

        let desk = lights.get("2").unwrap().unwrap();
        assert_eq!(desk.kind, "Extended color light");
        assert_eq!(desk.state.colormode, Some(ColorMode::Xy));
        assert_eq!(desk.state.xy, Some(Xy::new(0.675, 0.322)));

        let hall = lights.get("1").unwrap().unwrap();
        assert_eq!(hall.state.hue, None);
        assert_eq!(hall.modelid, "");
        assert!(lights.get("9").unwrap().is_none());
    }

    #[test]
    fn test_state_serializes_only_set_fields() {
        let state = LightState {
            on: Some(true),
            xy: Some(Xy::new(0.5, 0.25)),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"on": true, "xy": [0.5, 0.25]})
        );
    }

    #[test]
    fn test_color_mode_strings() {
        assert_eq!(ColorMode::Ct.to_string(), "ct");
        assert_eq!("hs".parse::<ColorMode>().unwrap(), ColorMode::Hs);
    }

    #[test]
    fn test_swatch_tracks_hue_and_xy() {
        let mut swatch = LightSwatch::default();
        let mut state = LightState {
            hue: Some(46920),
            xy: Some(Xy::new(0.675, 0.322)),
            ..Default::default()
        };
        assert!(swatch.update(&state));
        assert_eq!(swatch.hue_hex(), "#0000ff");
        assert_eq!(swatch.xy_hex(), "#ff0000");

        state.bri = Some(10);
        assert!(!swatch.update(&state));

        state.hue = Some(25500);
        assert!(swatch.update(&state));
        assert_eq!(swatch.hue_hex(), "#00ff00");
    }

    #[test]
    fn test_swatch_without_color_is_black() {
        let mut swatch = LightSwatch::default();
        assert!(swatch.update(&LightState::default()));
        assert_eq!(swatch.hue_hex(), "#000000");
        assert_eq!(swatch.xy_hex(), "#000000");
    }

    #[test]
    fn test_registry_ids_follow_latest_reply() {
        let mut registry = LightRegistry::new();
        assert!(!registry.is_loaded());
        assert_eq!(registry.refresh(reply()), 2);
        assert_eq!(registry.ids(), ["2", "1"]);

        let next = collection(
            r#"{
            "1": {"name": "Hall", "type": "Dimmable light", "state": {"on": true, "bri": 100}},
            "3": {"name": "Porch", "type": "Extended color light", "state": {"hue": 46920, "xy": [0.2, 0.1]}},
            "2": {"name": "Desk", "type": "Extended color light", "state": {"on": false, "hue": 0, "xy": [0.675, 0.322]}}
        }"#,
        );
        assert_eq!(registry.refresh(next), 1);
        assert_eq!(registry.ids(), ["1", "3", "2"]);
        let names: Vec<_> = registry.lights().into_iter().map(|(_, l)| l.name).collect();
        assert_eq!(names, ["Hall", "Porch", "Desk"]);

        let desk = registry.light("2").unwrap().unwrap();
        assert_eq!(desk.state.on, Some(false));
        assert_eq!(desk.state.bri, None);
        assert_eq!(registry.swatch("3").unwrap().hue_hex(), "#0000ff");
    }

    #[test]
    fn test_registry_drops_removed_lights() {
        let mut registry = LightRegistry::new();
        registry.refresh(reply());
        registry.refresh(collection(r#"{"1": {"name": "Hall", "state": {}}}"#));
        assert_eq!(registry.ids(), ["1"]);
        assert!(registry.swatch("2").is_none());
        assert_eq!(registry.lights().len(), 1);
    }
}
