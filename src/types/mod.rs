//! Value types for light color parameters.

mod brightness;
mod color;
mod hue_saturation;
mod xy;

pub use brightness::Brightness;
pub use color::{Rgb255, RgbPercent};
pub use hue_saturation::{Hsb, Hue, Saturation};
pub use xy::Xy;
