//! RGB color representations, as fractions and as bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// An RGB color with each channel as a fraction (0.0-1.0).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RgbPercent {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbPercent {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Truncates each channel to 0-255; lossy.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::RgbPercent;
    ///
    /// let c = RgbPercent::new(1.0, 0.5, 0.0).to_rgb255();
    /// assert_eq!((c.red(), c.green(), c.blue()), (255, 127, 0));
    /// ```
    pub fn to_rgb255(&self) -> Rgb255 {
        Rgb255::rgb(to_byte(self.r), to_byte(self.g), to_byte(self.b))
    }

    pub(crate) fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
        }
    }
}

// `as` saturates, so anything past the ends lands on 0 or 255.
fn to_byte(channel: f64) -> u8 {
    (channel * 255.0).floor() as u8
}

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Rgb255 {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Rgb255 {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a default color (black: 0,0,0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// HTML hex code, lowercase and zero-padded.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_lights_rs::Rgb255;
    ///
    /// assert_eq!(Rgb255::rgb(0, 0, 0).to_hex(), "#000000");
    /// assert_eq!(Rgb255::rgb(255, 255, 255).to_hex(), "#ffffff");
    /// assert_eq!(Rgb255::rgb(10, 171, 3).to_hex(), "#0aab03");
    /// ```
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl fmt::Display for Rgb255 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb255 {
    type Err = Error;

    /// Parse from `#rrggbb` or a comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| Error::InvalidColorString(s.to_string()));
        }

        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgb255> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb255::rgb(channel(0)?, channel(2)?, channel(4)?))
}
