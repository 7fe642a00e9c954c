use crate::foundation::core::TypeId;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
/// Geometric variant a marker type produces. Exactly one per type.
pub enum Mode {
    /// Single positions.
    Point,
    /// Two-point segments.
    Line,
    /// Axis-aligned rectangles.
    Rect,
    /// Points linked across frames.
    Track,
    /// Rotated ellipses.
    Ellipse,
    /// Open or closed polygons.
    Polygon,
}

impl Mode {
    /// All modes in declaration order.
    pub const ALL: [Mode; 6] = [
        Mode::Point,
        Mode::Line,
        Mode::Rect,
        Mode::Track,
        Mode::Ellipse,
        Mode::Polygon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Point => "point",
            Mode::Line => "line",
            Mode::Rect => "rect",
            Mode::Track => "track",
            Mode::Ellipse => "ellipse",
            Mode::Polygon => "polygon",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A catalog entry describing how a family of markers looks and behaves.
pub struct MarkerType {
    /// Stable identifier.
    pub id: TypeId,
    /// Unique display name.
    pub name: String,
    /// Geometric variant of every entity of this type.
    pub mode: Mode,
    /// Hex color (`#rrggbb`) or colormap reference (`jet(10)`).
    pub color: String,
    /// Raw JSON object with style overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Label template; see [`crate::resolve_text`] for placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Hidden types are not displayed.
    #[serde(default)]
    pub hidden: bool,
}

impl MarkerType {
    pub fn new(id: TypeId, name: impl Into<String>, mode: Mode, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mode,
            color: color.into(),
            style: None,
            text: None,
            hidden: false,
        }
    }
}
