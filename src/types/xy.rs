//! CIE 1931 chromaticity coordinates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Rgb255;
use crate::convert;
use crate::errors::Error;

/// A CIE 1931 `xy` chromaticity.
///
/// Serialized the way the bridge sends it, as a two element array.
/// Both coordinates are clamped to 0.0-1.0 on construction; `z` is implied
/// as `1 - x - y`.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Xy {
    x: f64,
    y: f64,
}

impl Xy {
    /// D65 white point.
    pub const WHITE: Xy = Xy {
        x: 0.3127,
        y: 0.329,
    };

    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        1.0 - self.x - self.y
    }

    pub fn to_rgb255(&self, brightness: f64) -> Rgb255 {
        convert::xy_to_rgb255(*self, brightness)
    }

    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::Xy;
    ///
    /// assert_eq!(Xy::new(0.675, 0.322).to_hex(1.0), "#ff0000");
    /// ```
    pub fn to_hex(&self, brightness: f64) -> String {
        convert::xy_to_hex(*self, brightness)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl From<[f64; 2]> for Xy {
    fn from([x, y]: [f64; 2]) -> Self {
        Xy::new(x, y)
    }
}

impl From<Xy> for [f64; 2] {
    fn from(xy: Xy) -> Self {
        [xy.x, xy.y]
    }
}

impl FromStr for Xy {
    type Err = Error;

    /// Parse from a comma-separated pair (e.g., "0.675,0.322").
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts.as_slice() {
            [x, y] => Ok(Xy::new(*x, *y)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_on_construction() {
        let xy = Xy::new(-0.5, 1.5);
        assert_eq!((xy.x(), xy.y()), (0.0, 1.0));
        assert_eq!(Xy::new(f64::NAN, 0.2).x(), 0.0);
    }

    #[test]
    fn test_serializes_as_array() {
        let xy = Xy::new(0.25, 0.5);
        assert_eq!(serde_json::to_string(&xy).unwrap(), "[0.25,0.5]");
        let back: Xy = serde_json::from_str("[0.25,0.5]").unwrap();
        assert_eq!(back, xy);
    }

    #[test]
    fn test_parse() {
        assert_eq!("0.1, 0.2".parse::<Xy>().unwrap(), Xy::new(0.1, 0.2));
        assert!("0.1".parse::<Xy>().is_err());
    }
}
