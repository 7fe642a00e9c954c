use serde_json::Value;

use crate::{
    foundation::core::{EntityId, Rgba8},
    foundation::diagnostics::{Diagnostics, StyleOrigin, Warning},
    foundation::error::AnnotrackResult,
    model::{entity::Entity, marker_type::MarkerType},
    store::entity_store::EntityStore,
    style::color::resolve_color,
};

/// Parsed style layer: hyphenated keys to JSON values.
pub type StyleMap = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dash,
    Dot,
    DashDot,
}

impl LineStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solid" => Some(LineStyle::Solid),
            "dash" | "dashed" => Some(LineStyle::Dash),
            "dot" | "dotted" => Some(LineStyle::Dot),
            "dashdot" | "dash-dot" => Some(LineStyle::DashDot),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dash => "dash",
            LineStyle::Dot => "dot",
            LineStyle::DashDot => "dashdot",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// Whether marker sizes are in screen pixels or image pixels.
pub enum Transform {
    Screen,
    Image,
}

impl Transform {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screen" => Some(Transform::Screen),
            "image" => Some(Transform::Image),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transform::Screen => "screen",
            Transform::Image => "image",
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
/// How a trajectory is drawn.
pub struct TrackStyle {
    /// Segments between consecutive frames.
    pub line_style: LineStyle,
    /// Segments bridging missing frames.
    pub gap_line_style: LineStyle,
    pub line_width: f64,
    /// Shape of the non-current trajectory points.
    pub point_shape: String,
    pub point_scale: f64,
}

impl Default for TrackStyle {
    fn default() -> Self {
        Self {
            line_style: LineStyle::Solid,
            gap_line_style: LineStyle::Dash,
            line_width: 2.0,
            point_shape: "circle".to_string(),
            point_scale: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
/// Fully resolved style of one entity.
pub struct EffectiveStyle {
    pub shape: String,
    pub line_width: f64,
    pub line_style: LineStyle,
    pub scale: f64,
    pub transform: Transform,
    pub color: Rgba8,
    pub font_size: f64,
    pub track: TrackStyle,
}

impl Default for EffectiveStyle {
    fn default() -> Self {
        Self {
            shape: "cross".to_string(),
            line_width: 2.0,
            line_style: LineStyle::Solid,
            scale: 1.0,
            transform: Transform::Screen,
            color: Rgba8::WHITE,
            font_size: 12.0,
            track: TrackStyle::default(),
        }
    }
}

impl EffectiveStyle {
    /// Style map that, used as an entity override, resolves back to `self`.
    pub fn to_overrides(&self) -> StyleMap {
        let mut m = StyleMap::new();
        m.insert("shape".into(), Value::from(self.shape.clone()));
        m.insert("line-width".into(), Value::from(self.line_width));
        m.insert("line-style".into(), Value::from(self.line_style.as_str()));
        m.insert("scale".into(), Value::from(self.scale));
        m.insert("transform".into(), Value::from(self.transform.as_str()));
        m.insert("color".into(), Value::from(self.color.to_hex()));
        m.insert("font-size".into(), Value::from(self.font_size));
        m.insert(
            "track-line-style".into(),
            Value::from(self.track.line_style.as_str()),
        );
        m.insert(
            "track-gap-line-style".into(),
            Value::from(self.track.gap_line_style.as_str()),
        );
        m.insert("track-line-width".into(), Value::from(self.track.line_width));
        m.insert(
            "track-point-shape".into(),
            Value::from(self.track.point_shape.clone()),
        );
        m.insert("track-point-scale".into(), Value::from(self.track.point_scale));
        m
    }

    /// Same as [`Self::to_overrides`], serialized.
    pub fn to_override_string(&self) -> AnnotrackResult<String> {
        Ok(serde_json::to_string(&Value::Object(self.to_overrides()))?)
    }
}

/// Cascades built-in defaults, type style, track style, and entity style.
///
/// Later layers win key by key. A layer that is not a JSON object, or a key with a value of the
/// wrong kind, is skipped with a [`Warning::MalformedStyle`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleResolver;

impl StyleResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `entity` given its type and, for track points, its track.
    pub fn resolve(
        &self,
        ty: &MarkerType,
        track: Option<&Entity>,
        entity: &Entity,
        diagnostics: &mut Diagnostics,
    ) -> EffectiveStyle {
        let mut layers = vec![(StyleOrigin::Type(ty.id), ty.style.as_deref())];
        if let Some(t) = track {
            layers.push((StyleOrigin::Entity(t.id), t.style.as_deref()));
        }
        layers.push((StyleOrigin::Entity(entity.id), entity.style.as_deref()));

        // Invalid values are dropped per layer so they never hide a lower layer's valid one.
        let mut merged = StyleMap::new();
        for (origin, raw) in layers {
            for (k, v) in parse_layer(raw, origin, diagnostics) {
                if set_key(&mut EffectiveStyle::default(), &k, &v) {
                    merged.insert(k, v);
                } else {
                    diagnostics.warn(Warning::MalformedStyle {
                        origin,
                        message: format!("invalid value {v} for '{k}'"),
                    });
                }
            }
        }

        let color_key = track.map_or(entity.id, |t| t.id);
        apply(&merged, &ty.color, color_key, diagnostics)
    }

    /// Look up type and track of `id` in the store and resolve.
    pub fn resolve_in(
        &self,
        store: &EntityStore,
        id: EntityId,
        diagnostics: &mut Diagnostics,
    ) -> AnnotrackResult<EffectiveStyle> {
        let entity = store.require(id)?;
        let ty = store.types().require(entity.type_id)?;
        let track = entity.track().and_then(|t| store.get(t));
        Ok(self.resolve(ty, track, entity, diagnostics))
    }
}

/// Parse one raw style layer. Absent or blank layers are empty.
pub fn parse_layer(
    raw: Option<&str>,
    origin: StyleOrigin,
    diagnostics: &mut Diagnostics,
) -> StyleMap {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return StyleMap::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(m)) => m,
        Ok(other) => {
            diagnostics.warn(Warning::MalformedStyle {
                origin,
                message: format!("expected a JSON object, got {other}"),
            });
            StyleMap::new()
        }
        Err(e) => {
            diagnostics.warn(Warning::MalformedStyle {
                origin,
                message: e.to_string(),
            });
            StyleMap::new()
        }
    }
}

/// Build the style from a merged map whose values were already checked.
fn apply(
    m: &StyleMap,
    type_color: &str,
    color_key: EntityId,
    diagnostics: &mut Diagnostics,
) -> EffectiveStyle {
    let mut style = EffectiveStyle::default();
    for (key, v) in m {
        set_key(&mut style, key, v);
    }
    let raw_color = m.get("color").and_then(Value::as_str).unwrap_or(type_color);
    style.color = resolve_color(raw_color, color_key.0, diagnostics);
    style
}

/// Write one style key. False if the value has the wrong kind for the key.
fn set_key(style: &mut EffectiveStyle, key: &str, v: &Value) -> bool {
    match key {
        "shape" => set_string(v, &mut style.shape),
        "line-width" => set_number(v, &mut style.line_width),
        "line-style" => set_parsed(v, LineStyle::parse, &mut style.line_style),
        "scale" => set_number(v, &mut style.scale),
        "transform" => set_parsed(v, Transform::parse, &mut style.transform),
        "font-size" => set_number(v, &mut style.font_size),
        "track-line-style" => set_parsed(v, LineStyle::parse, &mut style.track.line_style),
        "track-gap-line-style" => set_parsed(v, LineStyle::parse, &mut style.track.gap_line_style),
        "track-line-width" => set_number(v, &mut style.track.line_width),
        "track-point-shape" => set_string(v, &mut style.track.point_shape),
        "track-point-scale" => set_number(v, &mut style.track.point_scale),
        "color" => v.is_string(),
        // Unknown keys belong to other consumers.
        _ => true,
    }
}

fn set_string(v: &Value, slot: &mut String) -> bool {
    match v.as_str() {
        Some(s) => {
            *slot = s.to_string();
            true
        }
        None => false,
    }
}

fn set_number(v: &Value, slot: &mut f64) -> bool {
    match v.as_f64().filter(|n| n.is_finite() && *n >= 0.0) {
        Some(n) => {
            *slot = n;
            true
        }
        None => false,
    }
}

fn set_parsed<T>(v: &Value, parse: fn(&str) -> Option<T>, slot: &mut T) -> bool {
    match v.as_str().and_then(parse) {
        Some(t) => {
            *slot = t;
            true
        }
        None => false,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/style/resolver.rs"]
mod tests;
