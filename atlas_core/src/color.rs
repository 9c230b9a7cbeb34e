use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Opaque 24-bit color. Always rendered as lowercase `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color value")]
    Empty,
    #[error("unrecognised color literal '{0}'")]
    Unrecognised(String),
    #[error("'{0}' is not a #rrggbb color")]
    NotStrictHex(String),
}

impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_color(s)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        normalize_color(&text).map_err(de::Error::custom)
    }
}

/// Accepts `#rgb`, `#rrggbb`, `rgb(r, g, b)` and `[r, g, b]`. Channels are
/// rounded and clamped to 0..=255.
pub fn normalize_color(input: &str) -> Result<Rgb, ColorError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(ColorError::Empty);
    }
    let unrecognised = || ColorError::Unrecognised(text.to_string());

    if let Some(hex) = text.strip_prefix('#') {
        return match hex.len() {
            3 => {
                let mut channels = [0u8; 3];
                for (slot, ch) in channels.iter_mut().zip(hex.chars()) {
                    let nibble = ch.to_digit(16).ok_or_else(unrecognised)? as u8;
                    *slot = nibble * 17;
                }
                Ok(Rgb::new(channels[0], channels[1], channels[2]))
            }
            6 => parse_hex6(hex).ok_or_else(unrecognised),
            _ => Err(unrecognised()),
        };
    }

    let lowered = text.to_ascii_lowercase();
    let body = if let Some(inner) = lowered
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        inner.to_string()
    } else if let Some(inner) = lowered
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        inner.to_string()
    } else {
        return Err(unrecognised());
    };

    let channels = body
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| unrecognised())?;
    if channels.len() != 3 || channels.iter().any(|c| !c.is_finite()) {
        return Err(unrecognised());
    }
    let channel = |value: f64| value.round().clamp(0.0, 255.0) as u8;
    Ok(Rgb::new(
        channel(channels[0]),
        channel(channels[1]),
        channel(channels[2]),
    ))
}

/// Strict form required when an override is confirmed.
pub fn parse_strict_hex(input: &str) -> Result<Rgb, ColorError> {
    input
        .strip_prefix('#')
        .filter(|hex| hex.len() == 6)
        .and_then(parse_hex6)
        .ok_or_else(|| ColorError::NotStrictHex(input.to_string()))
}

fn parse_hex6(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// 33-multiplier string hash over UTF-16 code units with i32 wraparound.
pub fn seed_hash(seed: &str) -> i32 {
    seed.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(33).wrapping_add(i32::from(unit)))
}

/// Deterministic palette entry for a seed such as `conflict:0`.
pub fn pick_palette(palette: &[Rgb], seed: &str) -> Option<Rgb> {
    if palette.is_empty() {
        return None;
    }
    let index = seed_hash(seed).unsigned_abs() as usize % palette.len();
    Some(palette[index])
}
