use crate::foundation::core::Rgba8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Built-in colormaps, sampled with an index in `0..=255`.
pub enum Colormap {
    Jet,
    Hsv,
    Gray,
    Viridis,
}

// Anchor stops of viridis, evenly spaced over the index range.
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

impl Colormap {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jet" => Some(Colormap::Jet),
            "hsv" => Some(Colormap::Hsv),
            "gray" | "grey" => Some(Colormap::Gray),
            "viridis" => Some(Colormap::Viridis),
            _ => None,
        }
    }

    pub fn sample(self, index: u8) -> Rgba8 {
        let t = f64::from(index) / 255.0;
        match self {
            Colormap::Jet => {
                let channel = |offset: f64| unit_to_u8(1.5 - (4.0 * t - offset).abs());
                Rgba8::opaque(channel(3.0), channel(2.0), channel(1.0))
            }
            Colormap::Hsv => hue_to_rgb(t * 6.0),
            Colormap::Gray => Rgba8::opaque(index, index, index),
            Colormap::Viridis => {
                let pos = t * (VIRIDIS.len() - 1) as f64;
                let lo = (pos.floor() as usize).min(VIRIDIS.len() - 2);
                let frac = pos - lo as f64;
                let (a, b) = (VIRIDIS[lo], VIRIDIS[lo + 1]);
                let lerp = |x: u8, y: u8| {
                    (f64::from(x) + (f64::from(y) - f64::from(x)) * frac).round() as u8
                };
                Rgba8::opaque(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
            }
        }
    }
}

/// Map an id onto the 256-entry domain: `floor(id * 255 / count) mod 256`.
pub fn colormap_index(id: u64, count: u64) -> u8 {
    let count = count.max(1);
    let scaled = (u128::from(id) * 255) / u128::from(count);
    (scaled % 256) as u8
}

fn unit_to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

// Full saturation and value; `h` in sextants `[0, 6]`.
fn hue_to_rgb(h: f64) -> Rgba8 {
    let sector = (h.floor() as i64).rem_euclid(6);
    let f = h - h.floor();
    let (r, g, b) = match sector {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    Rgba8::opaque(unit_to_u8(r), unit_to_u8(g), unit_to_u8(b))
}

#[cfg(test)]
#[path = "../../tests/unit/style/colormap.rs"]
mod tests;
