use crate::{
    foundation::core::Rgba8,
    foundation::diagnostics::{Diagnostics, Warning},
    style::colormap::{Colormap, colormap_index},
};

/// Entries a colormap spreads over when no count is given.
pub const DEFAULT_COLORMAP_COUNT: u64 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Parsed form of a symbolic color string.
pub enum ColorSpec {
    /// `#RGB`, `#RRGGBB`, or `#RRGGBBAA`.
    Hex(Rgba8),
    /// `name(count)` or `name`; the entity id picks the entry.
    Colormap { map: Colormap, count: u64 },
}

impl ColorSpec {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(hex) = raw.strip_prefix('#') {
            return parse_hex(hex).map(ColorSpec::Hex);
        }
        let (name, count) = match raw.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.strip_suffix(')')?.trim();
                let count = inner.parse::<u64>().ok().filter(|c| *c > 0)?;
                (name, count)
            }
            None => (raw, DEFAULT_COLORMAP_COUNT),
        };
        Colormap::from_name(name).map(|map| ColorSpec::Colormap { map, count })
    }

    /// Concrete color for the entity with `id`.
    pub fn color_for(self, id: u64) -> Rgba8 {
        match self {
            ColorSpec::Hex(c) => c,
            ColorSpec::Colormap { map, count } => map.sample(colormap_index(id, count)),
        }
    }
}

/// Resolve a raw color string for entity `id`; unknown strings warn and yield white.
pub fn resolve_color(raw: &str, id: u64, diagnostics: &mut Diagnostics) -> Rgba8 {
    match ColorSpec::parse(raw) {
        Some(spec) => spec.color_for(id),
        None => {
            diagnostics.warn(Warning::UnknownColor {
                raw: raw.to_string(),
            });
            Rgba8::WHITE
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba8> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut c = [0u8; 3];
            for (slot, ch) in c.iter_mut().zip(hex.chars()) {
                let v = ch.to_digit(16)? as u8;
                *slot = v * 17;
            }
            Some(Rgba8::opaque(c[0], c[1], c[2]))
        }
        6 => Some(Rgba8::opaque(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
        )),
        8 => Some(Rgba8 {
            r: byte(&hex[0..2])?,
            g: byte(&hex[2..4])?,
            b: byte(&hex[4..6])?,
            a: byte(&hex[6..8])?,
        }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/style/color.rs"]
mod tests;
