use kurbo::{ParamCurveNearest as _, Shape as _};

use crate::{
    foundation::core::{Point, Vec2},
    model::marker_type::Mode,
};

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointGeom {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineGeom {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Axis-aligned rectangle; `width` and `height` are never negative.
pub struct RectGeom {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Ellipse centered at `(x, y)`, rotated by `angle` degrees.
pub struct EllipseGeom {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolygonGeom {
    pub points: Vec<Point>,
    #[serde(default)]
    pub closed: bool,
}

impl RectGeom {
    /// Rectangle spanned by two corners, re-anchored so the extent stays non-negative.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

impl EllipseGeom {
    pub fn center(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn to_kurbo(self) -> kurbo::Ellipse {
        kurbo::Ellipse::new(
            self.center(),
            (self.width / 2.0, self.height / 2.0),
            self.angle.to_radians(),
        )
    }
}

impl PolygonGeom {
    pub fn to_bez_path(&self) -> kurbo::BezPath {
        let mut path = kurbo::BezPath::new();
        let mut iter = self.points.iter();
        if let Some(first) = iter.next() {
            path.move_to(*first);
            for p in iter {
                path.line_to(*p);
            }
            if self.closed {
                path.close_path();
            }
        }
        path
    }

    fn edges(&self) -> impl Iterator<Item = kurbo::Line> + '_ {
        let n = self.points.len();
        let closing = if self.closed && n > 2 { 1 } else { 0 };
        (0..n.saturating_sub(1) + closing)
            .map(move |i| kurbo::Line::new(self.points[i], self.points[(i + 1) % n]))
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
/// Geometry of a marker on one frame.
pub enum Geometry {
    Point(PointGeom),
    Line(LineGeom),
    Rect(RectGeom),
    Ellipse(EllipseGeom),
    Polygon(PolygonGeom),
}

impl Geometry {
    /// Initial geometry created by a click at `pos` for a type of `mode`.
    ///
    /// Track types start with a point; the track itself is a separate entity.
    pub fn anchored(mode: Mode, pos: Point) -> Self {
        match mode {
            Mode::Point | Mode::Track => Geometry::Point(PointGeom { x: pos.x, y: pos.y }),
            Mode::Line => Geometry::Line(LineGeom {
                x1: pos.x,
                y1: pos.y,
                x2: pos.x,
                y2: pos.y,
            }),
            Mode::Rect => Geometry::Rect(RectGeom::from_corners(pos, pos)),
            Mode::Ellipse => Geometry::Ellipse(EllipseGeom {
                x: pos.x,
                y: pos.y,
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            }),
            Mode::Polygon => Geometry::Polygon(PolygonGeom {
                points: vec![pos],
                closed: false,
            }),
        }
    }

    /// Mode this geometry belongs to when it is not part of a track.
    pub fn mode(&self) -> Mode {
        match self {
            Geometry::Point(_) => Mode::Point,
            Geometry::Line(_) => Mode::Line,
            Geometry::Rect(_) => Mode::Rect,
            Geometry::Ellipse(_) => Mode::Ellipse,
            Geometry::Polygon(_) => Mode::Polygon,
        }
    }

    /// Reference position: point, line start, rect origin, ellipse center, first vertex.
    pub fn anchor(&self) -> Point {
        match self {
            Geometry::Point(p) => Point::new(p.x, p.y),
            Geometry::Line(l) => Point::new(l.x1, l.y1),
            Geometry::Rect(r) => Point::new(r.x, r.y),
            Geometry::Ellipse(e) => e.center(),
            Geometry::Polygon(p) => p.points.first().copied().unwrap_or(Point::ZERO),
        }
    }

    /// Apply a drag from `anchor` to `pos` while the geometry is being drawn.
    pub fn drag_to(&mut self, anchor: Point, pos: Point) {
        match self {
            Geometry::Point(p) => {
                p.x = pos.x;
                p.y = pos.y;
            }
            Geometry::Line(l) => {
                l.x2 = pos.x;
                l.y2 = pos.y;
            }
            Geometry::Rect(r) => *r = RectGeom::from_corners(anchor, pos),
            Geometry::Ellipse(e) => {
                e.width = 2.0 * (pos.x - e.x).abs();
                e.height = 2.0 * (pos.y - e.y).abs();
            }
            Geometry::Polygon(p) => {
                if let Some(last) = p.points.last_mut() {
                    *last = pos;
                }
            }
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Geometry::Point(p) => {
                p.x += delta.x;
                p.y += delta.y;
            }
            Geometry::Line(l) => {
                l.x1 += delta.x;
                l.y1 += delta.y;
                l.x2 += delta.x;
                l.y2 += delta.y;
            }
            Geometry::Rect(r) => {
                r.x += delta.x;
                r.y += delta.y;
            }
            Geometry::Ellipse(e) => {
                e.x += delta.x;
                e.y += delta.y;
            }
            Geometry::Polygon(p) => {
                for v in &mut p.points {
                    *v += delta;
                }
            }
        }
    }

    /// Distance from `pos` to the drawn shape; `0.0` inside filled shapes.
    pub fn distance_to(&self, pos: Point) -> f64 {
        match self {
            Geometry::Point(p) => Point::new(p.x, p.y).distance(pos),
            Geometry::Line(l) => segment_distance(
                kurbo::Line::new((l.x1, l.y1), (l.x2, l.y2)),
                pos,
            ),
            Geometry::Rect(r) => {
                let dx = (r.x - pos.x).max(0.0).max(pos.x - (r.x + r.width));
                let dy = (r.y - pos.y).max(0.0).max(pos.y - (r.y + r.height));
                dx.hypot(dy)
            }
            Geometry::Ellipse(e) => ellipse_distance(*e, pos),
            Geometry::Polygon(p) => {
                if p.points.len() == 1 {
                    return p.points[0].distance(pos);
                }
                if p.closed && p.points.len() > 2 && p.to_bez_path().contains(pos) {
                    return 0.0;
                }
                p.edges()
                    .map(|edge| segment_distance(edge, pos))
                    .fold(f64::INFINITY, f64::min)
            }
        }
    }

    /// Handle positions an editor shows for resizing this shape.
    pub fn handles(&self) -> Vec<Point> {
        match self {
            Geometry::Point(p) => vec![Point::new(p.x, p.y)],
            Geometry::Line(l) => vec![Point::new(l.x1, l.y1), Point::new(l.x2, l.y2)],
            Geometry::Rect(r) => {
                let k = r.to_kurbo();
                vec![
                    Point::new(k.x0, k.y0),
                    Point::new(k.x1, k.y0),
                    Point::new(k.x1, k.y1),
                    Point::new(k.x0, k.y1),
                ]
            }
            Geometry::Ellipse(e) => {
                let (sin, cos) = e.angle.to_radians().sin_cos();
                let rx = Vec2::new(cos, sin) * (e.width / 2.0);
                let ry = Vec2::new(-sin, cos) * (e.height / 2.0);
                vec![e.center(), e.center() + rx, e.center() + ry]
            }
            Geometry::Polygon(p) => p.points.clone(),
        }
    }
}

fn segment_distance(line: kurbo::Line, pos: Point) -> f64 {
    if line.p0 == line.p1 {
        return line.p0.distance(pos);
    }
    line.nearest(pos, 1e-9).distance_sq.sqrt()
}

fn ellipse_distance(e: EllipseGeom, pos: Point) -> f64 {
    let rx = e.width / 2.0;
    let ry = e.height / 2.0;
    if rx <= f64::EPSILON || ry <= f64::EPSILON {
        return e.center().distance(pos);
    }
    if e.to_kurbo().contains(pos) {
        return 0.0;
    }
    // Radial approximation in the ellipse's local frame.
    let (sin, cos) = (-e.angle.to_radians()).sin_cos();
    let d = pos - e.center();
    let lx = d.x * cos - d.y * sin;
    let ly = d.x * sin + d.y * cos;
    let r = ((lx / rx).powi(2) + (ly / ry).powi(2)).sqrt();
    ((r - 1.0) * rx.min(ry)).max(0.0)
}

#[cfg(test)]
#[path = "../../tests/unit/model/geometry.rs"]
mod tests;
