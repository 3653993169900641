//! Conversions between the bridge's color representations.
//!
//! Every function here is total: inputs outside their range are clamped and
//! degenerate chromaticities resolve to black. None of the conversions round
//! trip exactly; the 0-255 forms truncate and the XY path normalizes away
//! absolute luminance.

use crate::types::{Brightness, Rgb255, RgbPercent, Saturation, Xy};

const PEAK_RED_LOWER: f64 = 0.0;
const PEAK_GREEN: f64 = 25500.0;
const PEAK_BLUE: f64 = 46920.0;
const PEAK_RED_UPPER: f64 = 65535.0;

const MIDPOINT_YELLOW: f64 = (PEAK_RED_LOWER + PEAK_GREEN) / 2.0;
const MIDPOINT_CYAN: f64 = (PEAK_GREEN + PEAK_BLUE) / 2.0;
const MIDPOINT_MAGENTA: f64 = (PEAK_BLUE + PEAK_RED_UPPER) / 2.0;

/// Brightness floors per channel; blue sits slightly lower.
const BRIGHTNESS_FLOOR_RG: f64 = 0.41;
const BRIGHTNESS_FLOOR_B: f64 = 0.40;

/// Wide RGB D65, rows produce r, g, b from X, Y, Z.
const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [1.656492, -0.354851, -0.255038],
    [-0.707196, 1.655397, 0.036152],
    [0.051713, -0.121364, 1.011530],
];

const GAMMA_THRESHOLD: f64 = 0.0031308;
const GAMMA_LINEAR_SCALE: f64 = 12.92;
const GAMMA_OFFSET: f64 = 0.55;

/// Linearly maps `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// # Examples
///
/// ```
/// use hue_lights_rs::convert::rescale;
///
/// assert_eq!(rescale(5.0, 0.0, 10.0, 100.0, 200.0), 150.0);
/// assert_eq!(rescale(0.0, 0.0, 1.0, 0.41, 1.0), 0.41);
/// ```
pub fn rescale(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let percent = (value - in_min) / (in_max - in_min);
    out_min + percent * (out_max - out_min)
}

/// Convert a hue wheel position to RGB fractions.
///
/// The wheel is split into six linear segments between red, yellow, green,
/// cyan, blue, magenta and back to red. At every point one channel is full,
/// one is zero and the third is on a ramp.
pub fn hue_to_rgb_percent(hue: u16) -> RgbPercent {
    let hue = f64::from(hue);
    let (mut r, mut g, mut b) = (0.0, 0.0, 0.0);

    if hue <= MIDPOINT_YELLOW {
        // red, green rising
        r = 1.0;
        g = hue / MIDPOINT_YELLOW;
    } else if hue <= PEAK_GREEN {
        // green, red falling
        g = 1.0;
        r = 1.0 - (hue - MIDPOINT_YELLOW) / (PEAK_GREEN - MIDPOINT_YELLOW);
    } else if hue <= MIDPOINT_CYAN {
        // green, blue rising
        g = 1.0;
        b = (hue - PEAK_GREEN) / (MIDPOINT_CYAN - PEAK_GREEN);
    } else if hue <= PEAK_BLUE {
        // blue, green falling
        b = 1.0;
        g = 1.0 - (hue - MIDPOINT_CYAN) / (PEAK_BLUE - MIDPOINT_CYAN);
    } else if hue <= MIDPOINT_MAGENTA {
        // blue, red rising
        b = 1.0;
        r = (hue - PEAK_BLUE) / (MIDPOINT_MAGENTA - PEAK_BLUE);
    } else {
        // red, blue falling
        r = 1.0;
        b = 1.0 - (hue - MIDPOINT_MAGENTA) / (PEAK_RED_UPPER - MIDPOINT_MAGENTA);
    }

    RgbPercent::new(r, g, b).clamped()
}

pub fn hue_to_rgb255(hue: u16) -> Rgb255 {
    hue_to_rgb_percent(hue).to_rgb255()
}

/// # Examples
///
/// ```
/// use hue_lights_rs::convert::hue_to_hex;
///
/// assert_eq!(hue_to_hex(0), "#ff0000");
/// assert_eq!(hue_to_hex(46920), "#0000ff");
/// ```
pub fn hue_to_hex(hue: u16) -> String {
    rgb255_to_hex(hue_to_rgb255(hue))
}

/// Convert hue, saturation (0-254) and brightness (1-254) to RGB fractions.
///
/// Saturation blends the hue color toward white. Brightness does not scale
/// to black: it is rescaled onto 0.41-1.0 (0.40-1.0 for blue) so dim lights
/// still render as a visible color.
pub fn hsb_to_rgb_percent(hue: u16, saturation: u8, brightness: u8) -> RgbPercent {
    let mut color = hue_to_rgb_percent(hue);

    let sat = Saturation::clamped(saturation).percent();
    let white = 1.0 - sat;
    color.r = color.r * sat + white;
    color.g = color.g * sat + white;
    color.b = color.b * sat + white;

    let bri = Brightness::clamped(brightness).percent();
    let rg_scale = rescale(bri, 0.0, 1.0, BRIGHTNESS_FLOOR_RG, 1.0);
    let b_scale = rescale(bri, 0.0, 1.0, BRIGHTNESS_FLOOR_B, 1.0);
    color.r *= rg_scale;
    color.g *= rg_scale;
    color.b *= b_scale;

    color
}

pub fn hsb_to_rgb255(hue: u16, saturation: u8, brightness: u8) -> Rgb255 {
    hsb_to_rgb_percent(hue, saturation, brightness).to_rgb255()
}

pub fn hsb_to_hex(hue: u16, saturation: u8, brightness: u8) -> String {
    rgb255_to_hex(hsb_to_rgb255(hue, saturation, brightness))
}

/// Convert a CIE 1931 chromaticity plus luminance to RGB (0-255).
///
/// The result is normalized so its brightest channel is full; only the
/// relative hue and chroma survive. Degenerate input (`y` of zero, a
/// non-positive or non-finite brightness, or a chromaticity outside the
/// gamut that leaves no positive channel) yields black.
pub fn xy_to_rgb255(xy: Xy, brightness: f64) -> Rgb255 {
    let (x, y, z) = (xy.x(), xy.y(), xy.z());
    if y <= 0.0 || !brightness.is_finite() || brightness <= 0.0 {
        return Rgb255::new();
    }

    let big_y = brightness;
    let big_x = (big_y / y) * x;
    let big_z = (big_y / y) * z;

    let linear = XYZ_TO_RGB.map(|row| row[0] * big_x + row[1] * big_y + row[2] * big_z);
    let Some(linear) = normalize(linear) else {
        return Rgb255::new();
    };

    let Some([r, g, b]) = normalize(linear.map(gamma_correct)) else {
        return Rgb255::new();
    };

    RgbPercent::new(r.max(0.0), g.max(0.0), b.max(0.0)).to_rgb255()
}

/// # Examples
///
/// ```
/// use hue_lights_rs::{Xy, convert::xy_to_hex};
///
/// assert_eq!(xy_to_hex(Xy::new(0.3, 0.0), 1.0), "#000000");
/// ```
pub fn xy_to_hex(xy: Xy, brightness: f64) -> String {
    rgb255_to_hex(xy_to_rgb255(xy, brightness))
}

/// Two lowercase hex digits per channel behind a `#`.
pub fn rgb255_to_hex(color: Rgb255) -> String {
    color.to_hex()
}

fn normalize(channels: [f64; 3]) -> Option<[f64; 3]> {
    let max = channels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() || max <= 0.0 {
        return None;
    }
    Some(channels.map(|c| c / max))
}

fn gamma_correct(v: f64) -> f64 {
    if v <= GAMMA_THRESHOLD {
        GAMMA_LINEAR_SCALE * v
    } else {
        (1.0 + GAMMA_OFFSET) * v.powf(1.0 / 2.4) - GAMMA_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_hue_peaks() {
        assert_eq!(hue_to_rgb_percent(0), RgbPercent::new(1.0, 0.0, 0.0));
        assert_eq!(hue_to_rgb_percent(25500), RgbPercent::new(0.0, 1.0, 0.0));
        assert_eq!(hue_to_rgb_percent(46920), RgbPercent::new(0.0, 0.0, 1.0));
        assert_eq!(hue_to_rgb_percent(65535), RgbPercent::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_hue_midpoints() {
        let yellow = hue_to_rgb_percent(12750);
        assert_eq!((yellow.r, yellow.g, yellow.b), (1.0, 1.0, 0.0));

        let cyan = hue_to_rgb_percent(36210);
        assert_eq!((cyan.r, cyan.g, cyan.b), (0.0, 1.0, 1.0));
    }

    #[test]
    fn test_hue_wheel_has_full_and_zero_channel() {
        for hue in (0..=u16::MAX).step_by(97).chain([u16::MAX]) {
            let c = hue_to_rgb_percent(hue);
            let channels = [c.r, c.g, c.b];
            let max = channels.iter().copied().fold(f64::MIN, f64::max);
            let min = channels.iter().copied().fold(f64::MAX, f64::min);
            assert_eq!(max, 1.0, "hue {hue}");
            assert_eq!(min, 0.0, "hue {hue}");
            assert!(channels.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_hue_hex() {
        assert_eq!(hue_to_hex(0), "#ff0000");
        assert_eq!(hue_to_hex(25500), "#00ff00");
        assert_eq!(hue_to_hex(46920), "#0000ff");
        assert_eq!(hue_to_hex(12750), "#ffff00");
    }

    #[test]
    fn test_hsb_desaturated_is_gray() {
        for hue in (0..=u16::MAX).step_by(4099) {
            for bri in [1u8, 64, 127, 200, 254] {
                let c = hsb_to_rgb_percent(hue, 0, bri);
                assert_eq!(c.r, c.g);
                assert!((c.r - c.b).abs() <= 0.011, "hue {hue} bri {bri}");
            }
        }
    }

    #[test]
    fn test_hsb_full_saturation_and_brightness_matches_hue() {
        assert_eq!(hsb_to_rgb255(0, 254, 254), Rgb255::rgb(255, 0, 0));
        assert_eq!(hsb_to_hex(46920, 254, 254), "#0000ff");
    }

    #[test]
    fn test_hsb_clamps_out_of_range() {
        assert_eq!(hsb_to_rgb_percent(0, 255, 255), hsb_to_rgb_percent(0, 254, 254));
        assert_eq!(hsb_to_rgb_percent(0, 200, 0), hsb_to_rgb_percent(0, 200, 1));
    }

    #[test]
    fn test_hsb_dim_floor() {
        let c = hsb_to_rgb_percent(0, 254, 1);
        assert_close(c.r, rescale(1.0 / 254.0, 0.0, 1.0, 0.41, 1.0));
        assert_eq!(hsb_to_rgb255(0, 254, 1).red(), 105);
    }

    #[test]
    fn test_rescale() {
        assert_close(rescale(0.5, 0.0, 1.0, 0.41, 1.0), 0.705);
        assert_close(rescale(2.0, 1.0, 3.0, 0.0, 10.0), 5.0);
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(rgb255_to_hex(Rgb255::rgb(0, 0, 0)), "#000000");
        assert_eq!(rgb255_to_hex(Rgb255::rgb(255, 255, 255)), "#ffffff");
        assert_eq!(rgb255_to_hex(Rgb255::rgb(1, 16, 171)), "#0110ab");
    }

    #[test]
    fn test_xy_red_corner() {
        assert_eq!(xy_to_rgb255(Xy::new(0.675, 0.322), 1.0), Rgb255::rgb(255, 0, 0));
    }

    #[test]
    fn test_xy_white_point_is_light() {
        let c = xy_to_rgb255(Xy::WHITE, 1.0);
        assert_eq!(c.blue(), 255);
        assert!(c.red() > 220 && c.green() > 220, "{c:?}");
    }

    #[test]
    fn test_xy_ignores_absolute_brightness() {
        let xy = Xy::new(0.4, 0.4);
        assert_eq!(xy_to_rgb255(xy, 0.5), xy_to_rgb255(xy, 1.0));
    }

    #[test]
    fn test_xy_degenerate_is_black() {
        assert_eq!(xy_to_rgb255(Xy::new(0.3, 0.0), 1.0), Rgb255::new());
        assert_eq!(xy_to_rgb255(Xy::new(0.3, 0.3), 0.0), Rgb255::new());
        assert_eq!(xy_to_rgb255(Xy::new(0.3, 0.3), f64::NAN), Rgb255::new());
        assert_eq!(xy_to_rgb255(Xy::new(0.0, 0.0), 1.0), Rgb255::new());
    }

    #[test]
    fn test_xy_grid_has_a_full_channel() {
        // u8 output already rules out NaN and negatives; check that nothing collapses.
        for xi in 1..20 {
            for yi in 1..20 {
                let (x, y) = (f64::from(xi) / 20.0, f64::from(yi) / 20.0);
                let c = xy_to_rgb255(Xy::new(x, y), 0.5);
                let max = c.red().max(c.green()).max(c.blue());
                assert!(max == 255 || c == Rgb255::new(), "x {x} y {y} -> {c:?}");
            }
        }
    }
}
