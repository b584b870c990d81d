//! 8-bit RGBA colours and hue/saturation/brightness blending.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    /// An opaque colour.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// From a packed `0xAARRGGBB` value.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Hue, saturation and brightness, each in `[0, 1]`.
    pub fn to_hsb(self) -> Hsb {
        let (r, g, b) = (self.r as f32, self.g as f32, self.b as f32);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let brightness = max / 255.0;
        let saturation = if max > 0.0 { (max - min) / max } else { 0.0 };
        if saturation == 0.0 {
            return Hsb::new(0.0, 0.0, brightness);
        }

        let range = max - min;
        let rc = (max - r) / range;
        let gc = (max - g) / range;
        let bc = (max - b) / range;
        let sector = if r == max {
            bc - gc
        } else if g == max {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        let mut hue = sector / 6.0;
        if hue < 0.0 {
            hue += 1.0;
        }
        Hsb::new(hue, saturation, brightness)
    }

    /// Blend towards `other` by `amount` in HSB space, taking the short way
    /// round the hue circle. Alpha is blended linearly.
    pub fn lerp_hsb(self, other: Color, amount: f32) -> Color {
        let amount = amount.clamp(0.0, 1.0);
        if amount == 0.0 {
            return self;
        }
        if amount == 1.0 {
            return other;
        }

        let from = self.to_hsb();
        let to = other.to_hsb();
        let (mut h1, mut h2) = (from.h, to.h);
        if h1 > h2 + 0.5 {
            h2 += 1.0;
        } else if h2 > h1 + 0.5 {
            h1 += 1.0;
        }
        let blended = Hsb::new(
            lerp(h1, h2, amount).rem_euclid(1.0),
            lerp(from.s, to.s, amount),
            lerp(from.b, to.b, amount),
        );
        let alpha = lerp(self.a as f32, other.a as f32, amount).round() as u8;
        Color { a: alpha, ..blended.to_rgb() }
    }

    /// Pick a point on a gradient through `colors` at position `v` in
    /// `[0, 1]`. Returns `None` for an empty list.
    pub fn blend(colors: &[Color], v: f64) -> Option<Color> {
        match colors {
            [] => None,
            [only] => Some(*only),
            _ => {
                let last = colors.len() - 1;
                let position = v.clamp(0.0, 1.0) * last as f64;
                let i = (position.trunc() as usize).min(last);
                if i == last {
                    return Some(colors[last]);
                }
                let amount = (position - i as f64) as f32;
                Some(colors[i].lerp_hsb(colors[i + 1], amount))
            }
        }
    }
}

impl From<u32> for Color {
    fn from(argb: u32) -> Self {
        Color::from_argb(argb)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:08X}", self.to_argb())
    }
}

/// Hue, saturation, brightness.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsb {
    pub h: f32,
    pub s: f32,
    pub b: f32,
}

impl Hsb {
    pub const fn new(h: f32, s: f32, b: f32) -> Self {
        Self { h, s, b }
    }

    /// An opaque RGB colour.
    pub fn to_rgb(self) -> Color {
        let channel = |x: f32| (x * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
        if self.s == 0.0 {
            let v = channel(self.b);
            return Color::rgb(v, v, v);
        }

        let h = (self.h - self.h.floor()) * 6.0;
        let f = h - h.floor();
        let p = self.b * (1.0 - self.s);
        let q = self.b * (1.0 - self.s * f);
        let t = self.b * (1.0 - self.s * (1.0 - f));
        let (r, g, b) = match h as u32 {
            0 => (self.b, t, p),
            1 => (q, self.b, p),
            2 => (p, self.b, t),
            3 => (p, q, self.b),
            4 => (t, p, self.b),
            _ => (self.b, p, q),
        };
        Color::rgb(channel(r), channel(g), channel(b))
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_packing() {
        let c = Color::from_argb(0x80FF1020);
        assert_eq!(c, Color::rgba(0xFF, 0x10, 0x20, 0x80));
        assert_eq!(c.to_argb(), 0x80FF1020);
        assert_eq!(c.to_string(), "#80FF1020");
    }

    #[test]
    fn test_hsb_roundtrip_primaries() {
        for c in [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE, Color::BLACK] {
            assert_eq!(c.to_hsb().to_rgb(), c);
        }
        let hsb = Color::BLUE.to_hsb();
        assert!((hsb.h - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(hsb.s, 1.0);
    }

    #[test]
    fn test_lerp_takes_short_hue_path() {
        // red (h = 0) to magenta (h = 5/6) passes through neither green nor
        // blue-green
        let magenta = Color::rgb(255, 0, 255);
        let mid = Color::RED.lerp_hsb(magenta, 0.5);
        assert_eq!(mid.r, 255);
        assert_eq!(mid.g, 0);
        assert!(mid.b > 100 && mid.b < 140);
    }

    #[test]
    fn test_blend_endpoints() {
        let colors = [Color::RED, Color::GREEN, Color::BLUE];
        assert_eq!(Color::blend(&colors, 0.0), Some(Color::RED));
        assert_eq!(Color::blend(&colors, 0.5), Some(Color::GREEN));
        assert_eq!(Color::blend(&colors, 1.0), Some(Color::BLUE));
        assert_eq!(Color::blend(&[Color::WHITE], 0.3), Some(Color::WHITE));
        assert_eq!(Color::blend(&[], 0.3), None);
    }

    #[test]
    fn test_blend_between_red_and_green_is_yellowish() {
        let mid = Color::blend(&[Color::RED, Color::GREEN], 0.5).unwrap();
        assert_eq!(mid, Color::rgb(255, 255, 0));
    }
}
