//! Sass colors
//!
//! A color is stored in the representation it was created with (RGB, HSL,
//! or HWB) and converted to the other spaces on demand. Alpha is carried
//! unchanged through every conversion. Equality and hashing work on the
//! canonical RGBA form, so `hsl(0, 100%, 50%)` equals `rgb(255, 0, 0)`.

use crate::error::ValueError;
use std::hash::{Hash, Hasher};

/// The representation a color was constructed with.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorSpace {
    Rgb { red: u8, green: u8, blue: u8 },
    Hsl { hue: f64, saturation: f64, lightness: f64 },
    Hwb { hue: f64, whiteness: f64, blackness: f64 },
}

/// A Sass color with an alpha channel.
///
/// Channel ranges: red/green/blue 0-255, hue 0-360 (normalized), the
/// percentage channels 0-100, alpha 0-1. Constructors reject out-of-range
/// inputs and name the offending channel.
#[derive(Debug, Clone)]
pub struct SassColor {
    space: ColorSpace,
    alpha: f64,
}

fn check_percent(channel: &'static str, value: f64) -> Result<f64, ValueError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ValueError::ChannelOutOfRange { channel, value });
    }
    Ok(value)
}

fn check_alpha(value: f64) -> Result<f64, ValueError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValueError::ChannelOutOfRange {
            channel: "alpha",
            value,
        });
    }
    Ok(value)
}

fn check_rgb_channel(channel: &'static str, value: i64) -> Result<u8, ValueError> {
    if !(0..=255).contains(&value) {
        return Err(ValueError::ChannelOutOfRange {
            channel,
            value: value as f64,
        });
    }
    Ok(value as u8)
}

/// Hue is cyclic: any finite input normalizes into [0, 360).
fn normalize_hue(hue: f64) -> Result<f64, ValueError> {
    if !hue.is_finite() {
        return Err(ValueError::ChannelOutOfRange {
            channel: "hue",
            value: hue,
        });
    }
    Ok(hue.rem_euclid(360.0))
}

impl SassColor {
    /// An opaque RGB color.
    pub fn rgb(red: i64, green: i64, blue: i64) -> Result<Self, ValueError> {
        Self::rgba(red, green, blue, 1.0)
    }

    /// An RGB color with alpha.
    pub fn rgba(red: i64, green: i64, blue: i64, alpha: f64) -> Result<Self, ValueError> {
        Ok(Self {
            space: ColorSpace::Rgb {
                red: check_rgb_channel("red", red)?,
                green: check_rgb_channel("green", green)?,
                blue: check_rgb_channel("blue", blue)?,
            },
            alpha: check_alpha(alpha)?,
        })
    }

    /// An opaque HSL color.
    pub fn hsl(hue: f64, saturation: f64, lightness: f64) -> Result<Self, ValueError> {
        Self::hsla(hue, saturation, lightness, 1.0)
    }

    /// An HSL color with alpha.
    pub fn hsla(
        hue: f64,
        saturation: f64,
        lightness: f64,
        alpha: f64,
    ) -> Result<Self, ValueError> {
        Ok(Self {
            space: ColorSpace::Hsl {
                hue: normalize_hue(hue)?,
                saturation: check_percent("saturation", saturation)?,
                lightness: check_percent("lightness", lightness)?,
            },
            alpha: check_alpha(alpha)?,
        })
    }

    /// An opaque HWB color.
    pub fn hwb(hue: f64, whiteness: f64, blackness: f64) -> Result<Self, ValueError> {
        Self::hwba(hue, whiteness, blackness, 1.0)
    }

    /// An HWB color with alpha.
    pub fn hwba(
        hue: f64,
        whiteness: f64,
        blackness: f64,
        alpha: f64,
    ) -> Result<Self, ValueError> {
        Ok(Self {
            space: ColorSpace::Hwb {
                hue: normalize_hue(hue)?,
                whiteness: check_percent("whiteness", whiteness)?,
                blackness: check_percent("blackness", blackness)?,
            },
            alpha: check_alpha(alpha)?,
        })
    }

    /// Alpha channel, 0-1.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Red channel, 0-255. Converts from HSL/HWB on demand.
    pub fn red(&self) -> u8 {
        self.to_rgb_channels().0
    }

    /// Green channel, 0-255.
    pub fn green(&self) -> u8 {
        self.to_rgb_channels().1
    }

    /// Blue channel, 0-255.
    pub fn blue(&self) -> u8 {
        self.to_rgb_channels().2
    }

    /// Hue, 0-360. Converts from RGB on demand.
    pub fn hue(&self) -> f64 {
        match self.space {
            ColorSpace::Hsl { hue, .. } | ColorSpace::Hwb { hue, .. } => hue,
            ColorSpace::Rgb { red, green, blue } => rgb_to_hsl(red, green, blue).0,
        }
    }

    /// Saturation, 0-100.
    pub fn saturation(&self) -> f64 {
        match self.space {
            ColorSpace::Hsl { saturation, .. } => saturation,
            ColorSpace::Rgb { red, green, blue } => rgb_to_hsl(red, green, blue).1,
            ColorSpace::Hwb { .. } => {
                let (r, g, b) = self.to_rgb_channels();
                rgb_to_hsl(r, g, b).1
            }
        }
    }

    /// Lightness, 0-100.
    pub fn lightness(&self) -> f64 {
        match self.space {
            ColorSpace::Hsl { lightness, .. } => lightness,
            ColorSpace::Rgb { red, green, blue } => rgb_to_hsl(red, green, blue).2,
            ColorSpace::Hwb { .. } => {
                let (r, g, b) = self.to_rgb_channels();
                rgb_to_hsl(r, g, b).2
            }
        }
    }

    /// Whiteness, 0-100.
    pub fn whiteness(&self) -> f64 {
        match self.space {
            ColorSpace::Hwb { whiteness, .. } => whiteness,
            _ => {
                let (r, g, b) = self.to_rgb_channels();
                f64::from(r.min(g).min(b)) / 255.0 * 100.0
            }
        }
    }

    /// Blackness, 0-100.
    pub fn blackness(&self) -> f64 {
        match self.space {
            ColorSpace::Hwb { blackness, .. } => blackness,
            _ => {
                let (r, g, b) = self.to_rgb_channels();
                (1.0 - f64::from(r.max(g).max(b)) / 255.0) * 100.0
            }
        }
    }

    /// True when the color was constructed in RGB space.
    pub fn is_rgb(&self) -> bool {
        matches!(self.space, ColorSpace::Rgb { .. })
    }

    /// True when the color was constructed in HSL space.
    pub fn is_hsl(&self) -> bool {
        matches!(self.space, ColorSpace::Hsl { .. })
    }

    /// True when the color was constructed in HWB space.
    pub fn is_hwb(&self) -> bool {
        matches!(self.space, ColorSpace::Hwb { .. })
    }

    fn to_rgb_channels(&self) -> (u8, u8, u8) {
        match self.space {
            ColorSpace::Rgb { red, green, blue } => (red, green, blue),
            ColorSpace::Hsl {
                hue,
                saturation,
                lightness,
            } => hsl_to_rgb(hue, saturation, lightness),
            ColorSpace::Hwb {
                hue,
                whiteness,
                blackness,
            } => hwb_to_rgb(hue, whiteness, blackness),
        }
    }
}

/// Standard HSL to RGB, channels rounded to 0-255.
fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let s = saturation / 100.0;
    let l = lightness / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h = hue / 60.0;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let scale = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (scale(r1), scale(g1), scale(b1))
}

/// Standard RGB to HSL: hue 0-360, saturation/lightness 0-100.
fn rgb_to_hsl(red: u8, green: u8, blue: u8) -> (f64, f64, f64) {
    let r = f64::from(red) / 255.0;
    let g = f64::from(green) / 255.0;
    let b = f64::from(blue) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let lightness = (max + min) / 2.0;
    let saturation = if delta == 0.0 {
        0.0
    } else {
        delta / (1.0 - (2.0 * lightness - 1.0).abs())
    };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (hue.rem_euclid(360.0), saturation * 100.0, lightness * 100.0)
}

/// HWB to RGB per CSS Color 4: over-saturated whiteness+blackness grays out.
fn hwb_to_rgb(hue: f64, whiteness: f64, blackness: f64) -> (u8, u8, u8) {
    let w = whiteness / 100.0;
    let b = blackness / 100.0;
    if w + b >= 1.0 {
        let gray = (w / (w + b) * 255.0).round().clamp(0.0, 255.0) as u8;
        return (gray, gray, gray);
    }
    let (pure_r, pure_g, pure_b) = hsl_to_rgb(hue, 100.0, 50.0);
    let mix = |pure: u8| {
        ((f64::from(pure) / 255.0 * (1.0 - w - b) + w) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    (mix(pure_r), mix(pure_g), mix(pure_b))
}

impl PartialEq for SassColor {
    fn eq(&self, other: &Self) -> bool {
        self.to_rgb_channels() == other.to_rgb_channels() && self.alpha == other.alpha
    }
}

impl Eq for SassColor {}

impl Hash for SassColor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_rgb_channels().hash(state);
        // Alpha is validated to [0, 1] so -0.0/NaN never reach here
        self.alpha.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_roundtrip_channels() {
        let color = SassColor::rgb(18, 52, 86).unwrap();
        assert_eq!(color.red(), 18);
        assert_eq!(color.green(), 52);
        assert_eq!(color.blue(), 86);
        assert_eq!(color.alpha(), 1.0);
    }

    #[test]
    fn test_out_of_range_channel_reported() {
        let err = SassColor::rgb(256, 0, 0).unwrap_err();
        assert_eq!(
            err,
            ValueError::ChannelOutOfRange {
                channel: "red",
                value: 256.0
            }
        );
        let err = SassColor::rgba(0, 0, 0, 1.5).unwrap_err();
        assert_eq!(
            err,
            ValueError::ChannelOutOfRange {
                channel: "alpha",
                value: 1.5
            }
        );
        let err = SassColor::hsl(0.0, 120.0, 50.0).unwrap_err();
        assert_eq!(
            err,
            ValueError::ChannelOutOfRange {
                channel: "saturation",
                value: 120.0
            }
        );
    }

    #[test]
    fn test_hue_normalizes() {
        let color = SassColor::hsl(400.0, 50.0, 50.0).unwrap();
        assert!((color.hue() - 40.0).abs() < 1e-9);
        let color = SassColor::hsl(-90.0, 50.0, 50.0).unwrap();
        assert!((color.hue() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_hsl_red_equals_rgb_red() {
        let hsl = SassColor::hsl(0.0, 100.0, 50.0).unwrap();
        let rgb = SassColor::rgb(255, 0, 0).unwrap();
        assert_eq!(hsl, rgb);
        assert_eq!(hsl.red(), 255);
        assert_eq!(hsl.green(), 0);
        assert_eq!(hsl.blue(), 0);
    }

    #[test]
    fn test_rgb_to_hsl_channels() {
        let rgb = SassColor::rgb(0, 255, 0).unwrap();
        assert!((rgb.hue() - 120.0).abs() < 1e-9);
        assert!((rgb.saturation() - 100.0).abs() < 1e-9);
        assert!((rgb.lightness() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_hwb_white_and_black() {
        let white = SassColor::hwb(0.0, 100.0, 0.0).unwrap();
        assert_eq!(white, SassColor::rgb(255, 255, 255).unwrap());
        let black = SassColor::hwb(120.0, 0.0, 100.0).unwrap();
        assert_eq!(black, SassColor::rgb(0, 0, 0).unwrap());
    }

    #[test]
    fn test_hwb_oversaturated_grays_out() {
        // w + b > 100 resolves to gray in proportion
        let gray = SassColor::hwb(200.0, 100.0, 100.0).unwrap();
        assert_eq!(gray, SassColor::rgb(128, 128, 128).unwrap());
    }

    #[test]
    fn test_alpha_preserved_across_spaces() {
        let color = SassColor::hsla(120.0, 50.0, 50.0, 0.25).unwrap();
        assert_eq!(color.alpha(), 0.25);
        assert!((color.whiteness() - 25.0).abs() < 0.5);
    }

    #[test]
    fn test_alpha_distinguishes_colors() {
        let opaque = SassColor::rgb(1, 2, 3).unwrap();
        let translucent = SassColor::rgba(1, 2, 3, 0.5).unwrap();
        assert_ne!(opaque, translucent);
    }
}
