//! Hue, saturation and the combined HSB representation used by the bridge.

use serde::{Deserialize, Serialize};

use super::{Brightness, Rgb255, RgbPercent};
use crate::convert;

/// Position on the bridge's hue wheel.
///
/// The full `u16` range is the circle: 0 and 65535 are both red,
/// 25500 is green and 46920 is blue.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Hue(pub u16);

impl Hue {
    pub const RED: Hue = Hue(0);
    pub const GREEN: Hue = Hue(25500);
    pub const BLUE: Hue = Hue(46920);

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Convert to a fully saturated RGB color.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::Hue;
    ///
    /// assert_eq!(Hue::GREEN.to_hex(), "#00ff00");
    /// ```
    pub fn to_rgb_percent(&self) -> RgbPercent {
        convert::hue_to_rgb_percent(self.0)
    }

    pub fn to_rgb255(&self) -> Rgb255 {
        convert::hue_to_rgb255(self.0)
    }

    pub fn to_hex(&self) -> String {
        convert::hue_to_hex(self.0)
    }
}

/// Saturation from 0 (white) to 254 (fully saturated).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Saturation {
    pub(crate) value: u8,
}

impl Default for Saturation {
    fn default() -> Self {
        Self::new()
    }
}

impl Saturation {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 254;

    /// Create a fully saturated value.
    pub fn new() -> Self {
        Saturation { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns `None` if value exceeds 254.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::Saturation;
    ///
    /// assert!(Saturation::create(0).is_some());
    /// assert!(Saturation::create(254).is_some());
    /// assert!(Saturation::create(255).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Saturation { value })
        } else {
            None
        }
    }

    pub fn clamped(value: u8) -> Self {
        Saturation {
            value: value.min(Self::MAX),
        }
    }

    /// Fraction of full saturation (value / 254).
    pub fn percent(&self) -> f64 {
        f64::from(self.value) / f64::from(Self::MAX)
    }
}

/// Hue, saturation and brightness as one color.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Hsb {
    pub hue: Hue,
    pub saturation: Saturation,
    pub brightness: Brightness,
}

impl Hsb {
    pub fn new(hue: Hue, saturation: Saturation, brightness: Brightness) -> Self {
        Self {
            hue,
            saturation,
            brightness,
        }
    }

    pub fn to_rgb_percent(&self) -> RgbPercent {
        convert::hsb_to_rgb_percent(self.hue.0, self.saturation.value, self.brightness.value)
    }

    pub fn to_rgb255(&self) -> Rgb255 {
        convert::hsb_to_rgb255(self.hue.0, self.saturation.value, self.brightness.value)
    }

    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::{Brightness, Hsb, Hue, Saturation};
    ///
    /// let red = Hsb::new(Hue::RED, Saturation::new(), Brightness::new());
    /// assert_eq!(red.to_hex(), "#ff0000");
    /// ```
    pub fn to_hex(&self) -> String {
        convert::hsb_to_hex(self.hue.0, self.saturation.value, self.brightness.value)
    }
}

impl From<&Hsb> for Rgb255 {
    fn from(hsb: &Hsb) -> Self {
        hsb.to_rgb255()
    }
}
