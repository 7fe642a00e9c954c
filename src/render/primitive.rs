use crate::{
    foundation::core::{FrameIndex, Point, Rgba8},
    model::{geometry::Geometry, marker_type::Mode},
    style::resolver::{EffectiveStyle, LineStyle},
};

/// What a rasterizer needs to know about one entity, independent of style.
#[derive(Clone, Copy, Debug)]
pub enum EntityView<'a> {
    Marker(&'a Geometry),
    /// Trajectory points inside the visible window, in frame order.
    Track {
        points: &'a [(FrameIndex, Point)],
        current: FrameIndex,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TrajectorySegment {
    pub from: Point,
    pub to: Point,
    pub line_style: LineStyle,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveGeometry {
    Shape(Geometry),
    Trajectory {
        points: Vec<Point>,
        segments: Vec<TrajectorySegment>,
        /// Point on the current frame, drawn with the marker shape.
        current: Option<Point>,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
/// Drawing instruction handed to external renderers and exporters.
pub struct RenderPrimitive {
    pub kind: Mode,
    pub geometry: PrimitiveGeometry,
    pub color: Rgba8,
    pub line_style: LineStyle,
    pub width: f64,
    pub shape: String,
    pub scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Combine an entity view and its resolved style. Pure; never touches pixels.
pub fn render_primitive(view: EntityView<'_>, style: &EffectiveStyle) -> RenderPrimitive {
    match view {
        EntityView::Marker(geometry) => RenderPrimitive {
            kind: geometry.mode(),
            geometry: PrimitiveGeometry::Shape(geometry.clone()),
            color: style.color,
            line_style: style.line_style,
            width: style.line_width,
            shape: style.shape.clone(),
            scale: style.scale,
            label: None,
        },
        EntityView::Track { points, current } => {
            let position = |f: FrameIndex| {
                points
                    .binary_search_by_key(&f, |(k, _)| *k)
                    .ok()
                    .map(|i| points[i].1)
            };
            // One segment per adjacent pair; a frame jump draws it in the gap style.
            let segments = points
                .windows(2)
                .map(|pair| {
                    let ((f0, from), (f1, to)) = (pair[0], pair[1]);
                    TrajectorySegment {
                        from,
                        to,
                        line_style: if f1.0 - f0.0 > 1 {
                            style.track.gap_line_style
                        } else {
                            style.track.line_style
                        },
                    }
                })
                .collect();
            RenderPrimitive {
                kind: Mode::Track,
                geometry: PrimitiveGeometry::Trajectory {
                    points: points.iter().map(|(_, p)| *p).collect(),
                    segments,
                    current: position(current),
                },
                color: style.color,
                line_style: style.track.line_style,
                width: style.track.line_width,
                shape: style.shape.clone(),
                scale: style.scale,
                label: None,
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/primitive.rs"]
mod tests;
