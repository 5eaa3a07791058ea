//! The input path data structure and its builder.
//!
//! A path is a sequence of sub-paths (contours), each made of line, quadratic
//! bézier, conic (rational quadratic) and cubic bézier segments. Sub-paths
//! that are not explicitly closed are implicitly closed by the fill
//! tessellator, so `end(false)` and `end(true)` fill identically.

use crate::math::{point, Box2D, Point};

use alloc::vec::Vec;

/// Determines what regions of a filled path are considered inside.
///
/// The inverse variants fill the complement of the path within the clip
/// bounds supplied to the tessellator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum FillRule {
    NonZero,
    EvenOdd,
    InverseNonZero,
    InverseEvenOdd,
}

impl FillRule {
    /// Whether a region with the given winding number is filled.
    ///
    /// The inverse variants rely on the extra clip-bounds contour that the
    /// tessellator prepends, which shifts the winding number of the
    /// complement region to 1.
    #[inline]
    pub fn is_in(self, winding: i16) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding & 1 != 0,
            FillRule::InverseNonZero => winding == 1,
            FillRule::InverseEvenOdd => winding & 1 == 1,
        }
    }

    #[inline]
    pub fn is_out(self, winding: i16) -> bool {
        !self.is_in(winding)
    }

    #[inline]
    pub fn is_inverse(self) -> bool {
        matches!(self, FillRule::InverseNonZero | FillRule::InverseEvenOdd)
    }
}

/// One path segment, with positions resolved.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathEvent {
    Begin {
        at: Point,
    },
    Line {
        from: Point,
        to: Point,
    },
    Quadratic {
        from: Point,
        ctrl: Point,
        to: Point,
    },
    Conic {
        from: Point,
        ctrl: Point,
        to: Point,
        weight: f32,
    },
    Cubic {
        from: Point,
        ctrl1: Point,
        ctrl2: Point,
        to: Point,
    },
    End {
        last: Point,
        first: Point,
        close: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Verb {
    Begin,
    Line,
    Quadratic,
    Conic,
    Cubic,
    Close,
    End,
}

/// A simple path data structure.
///
/// Points and verbs are stored in separate vectors; conic weights in a third,
/// consumed in order by the iterator.
#[derive(Clone, Debug)]
pub struct Path {
    points: Vec<Point>,
    verbs: Vec<Verb>,
    weights: Vec<f32>,
    fill_rule: Option<FillRule>,
    bounds: Box2D,
}

impl Path {
    /// Creates a builder for this data structure.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule.unwrap_or(FillRule::EvenOdd)
    }

    /// A conservative bounding box: the bounding box of all endpoints and
    /// control points. Cheap to maintain and always contains the path.
    pub fn bounds(&self) -> &Box2D {
        &self.bounds
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            points: self.points.iter(),
            verbs: self.verbs.iter(),
            weights: self.weights.iter(),
            first: point(0.0, 0.0),
            current: point(0.0, 0.0),
        }
    }
}

impl<'l> IntoIterator for &'l Path {
    type Item = PathEvent;
    type IntoIter = Iter<'l>;

    fn into_iter(self) -> Iter<'l> {
        self.iter()
    }
}

/// Builds a `Path`.
///
/// Every sub-path must be wrapped in a `begin`/`end` pair; segments may only
/// be added between the two.
#[derive(Clone, Debug)]
pub struct Builder {
    points: Vec<Point>,
    verbs: Vec<Verb>,
    weights: Vec<f32>,
    fill_rule: Option<FillRule>,
    min: Point,
    max: Point,
    in_subpath: bool,
    has_points: bool,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            points: Vec::new(),
            verbs: Vec::new(),
            weights: Vec::new(),
            fill_rule: None,
            min: point(f32::MAX, f32::MAX),
            max: point(f32::MIN, f32::MIN),
            in_subpath: false,
            has_points: false,
        }
    }

    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = Some(fill_rule);
        self
    }

    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        self.fill_rule = Some(fill_rule);
    }

    fn grow_bounds(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.has_points = true;
    }

    fn push_point(&mut self, p: Point) {
        self.grow_bounds(p);
        self.points.push(p);
    }

    pub fn begin(&mut self, at: Point) {
        debug_assert!(!self.in_subpath);
        self.in_subpath = true;
        self.push_point(at);
        self.verbs.push(Verb::Begin);
    }

    pub fn line_to(&mut self, to: Point) {
        debug_assert!(self.in_subpath);
        self.push_point(to);
        self.verbs.push(Verb::Line);
    }

    pub fn quadratic_bezier_to(&mut self, ctrl: Point, to: Point) {
        debug_assert!(self.in_subpath);
        self.push_point(ctrl);
        self.push_point(to);
        self.verbs.push(Verb::Quadratic);
    }

    /// Adds a rational quadratic bézier segment. A weight of 1 is parabolic,
    /// below 1 elliptical, above 1 hyperbolic.
    pub fn conic_to(&mut self, ctrl: Point, to: Point, weight: f32) {
        debug_assert!(self.in_subpath);
        debug_assert!(weight > 0.0);
        self.push_point(ctrl);
        self.push_point(to);
        self.weights.push(weight);
        self.verbs.push(Verb::Conic);
    }

    pub fn cubic_bezier_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        debug_assert!(self.in_subpath);
        self.push_point(ctrl1);
        self.push_point(ctrl2);
        self.push_point(to);
        self.verbs.push(Verb::Cubic);
    }

    pub fn end(&mut self, close: bool) {
        debug_assert!(self.in_subpath);
        self.in_subpath = false;
        self.verbs.push(if close { Verb::Close } else { Verb::End });
    }

    pub fn close(&mut self) {
        self.end(true);
    }

    pub fn build(self) -> Path {
        debug_assert!(!self.in_subpath);
        let bounds = if self.has_points {
            Box2D {
                min: self.min,
                max: self.max,
            }
        } else {
            Box2D::zero()
        };
        Path {
            points: self.points,
            verbs: self.verbs,
            weights: self.weights,
            fill_rule: self.fill_rule,
            bounds,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterates over a path's events.
#[derive(Clone)]
pub struct Iter<'l> {
    points: core::slice::Iter<'l, Point>,
    verbs: core::slice::Iter<'l, Verb>,
    weights: core::slice::Iter<'l, f32>,
    first: Point,
    current: Point,
}

impl<'l> Iter<'l> {
    #[inline]
    fn next_point(&mut self) -> Point {
        *self.points.next().unwrap()
    }
}

impl<'l> Iterator for Iter<'l> {
    type Item = PathEvent;

    fn next(&mut self) -> Option<PathEvent> {
        match self.verbs.next()? {
            Verb::Begin => {
                let at = self.next_point();
                self.first = at;
                self.current = at;
                Some(PathEvent::Begin { at })
            }
            Verb::Line => {
                let from = self.current;
                let to = self.next_point();
                self.current = to;
                Some(PathEvent::Line { from, to })
            }
            Verb::Quadratic => {
                let from = self.current;
                let ctrl = self.next_point();
                let to = self.next_point();
                self.current = to;
                Some(PathEvent::Quadratic { from, ctrl, to })
            }
            Verb::Conic => {
                let from = self.current;
                let ctrl = self.next_point();
                let to = self.next_point();
                let weight = *self.weights.next().unwrap();
                self.current = to;
                Some(PathEvent::Conic {
                    from,
                    ctrl,
                    to,
                    weight,
                })
            }
            Verb::Cubic => {
                let from = self.current;
                let ctrl1 = self.next_point();
                let ctrl2 = self.next_point();
                let to = self.next_point();
                self.current = to;
                Some(PathEvent::Cubic {
                    from,
                    ctrl1,
                    ctrl2,
                    to,
                })
            }
            Verb::Close => Some(PathEvent::End {
                last: self.current,
                first: self.first,
                close: true,
            }),
            Verb::End => Some(PathEvent::End {
                last: self.current,
                first: self.first,
                close: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let mut builder = Path::builder();
        builder.begin(point(0.0, 0.0));
        builder.line_to(point(1.0, 0.0));
        builder.quadratic_bezier_to(point(2.0, 0.0), point(2.0, 1.0));
        builder.conic_to(point(2.0, 2.0), point(1.0, 2.0), 0.5);
        builder.end(true);
        let path = builder.build();

        let events: Vec<PathEvent> = path.iter().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], PathEvent::Begin { at: point(0.0, 0.0) });
        assert_eq!(
            events[1],
            PathEvent::Line {
                from: point(0.0, 0.0),
                to: point(1.0, 0.0)
            }
        );
        assert_eq!(
            events[4],
            PathEvent::End {
                last: point(1.0, 2.0),
                first: point(0.0, 0.0),
                close: true
            }
        );

        assert_eq!(path.bounds().min, point(0.0, 0.0));
        assert_eq!(path.bounds().max, point(2.0, 2.0));
    }

    #[test]
    fn fill_rules() {
        assert!(FillRule::NonZero.is_in(-2));
        assert!(!FillRule::NonZero.is_in(0));
        assert!(FillRule::EvenOdd.is_in(-1));
        assert!(FillRule::EvenOdd.is_out(2));
        assert!(FillRule::InverseNonZero.is_in(1));
        assert!(!FillRule::InverseNonZero.is_in(2));
        assert!(FillRule::InverseEvenOdd.is_in(1));
        assert!(FillRule::InverseEvenOdd.is_out(0));
        assert!(FillRule::InverseEvenOdd.is_inverse());
        assert!(!FillRule::EvenOdd.is_inverse());
    }

    #[test]
    fn empty_path() {
        let path = Path::builder().build();
        assert!(path.is_empty());
        assert_eq!(path.iter().count(), 0);
        assert_eq!(*path.bounds(), Box2D::zero());
    }
}
