//! The mesh data model shared by every sweep stage.
//!
//! Vertices, edges and polygons form a densely cross-linked graph: vertices
//! are chained into contours and later into sweep order, each vertex carries
//! ordered lists of the edges above and below it, edges are chained into the
//! active edge list and into up to two monotone polygon boundaries. All of
//! these nodes live in one arena (`Mesh`) for the duration of a tessellation
//! call and reference each other through 32-bit index handles with a
//! `u32::MAX` invalid sentinel, so a node never has an independent lifetime.

use crate::math::Point;

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use num_traits::Float;

macro_rules! arena_handle {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub(crate) struct $name(pub(crate) u32);

        impl $name {
            pub const INVALID: Self = Self(u32::MAX);

            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_handle!(VertexId);
arena_handle!(EdgeId);
arena_handle!(PolyId);
arena_handle!(MonoId);

/// Left or Right. Which boundary of a monotone polygon an edge belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// Edge role in the antialiased mesh. Only affects the alpha computed for
/// intersection vertices and the winding assigned when stitching the offset
/// boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EdgeKind {
    Inner,
    Outer,
    Connector,
}

/// A line equation in implicit form: `a * x + b * y + c = 0` for all points
/// (x, y) on the line.
///
/// The coefficients are stored in double precision so that the sign of
/// `dist()` is exact for f32 inputs (it is a polynomial of degree 2). The
/// intersection computation, being of higher degree, is still subject to
/// cancellation; the sweep assumes its output may be off and repairs the
/// mesh topology to match.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line {
    pub fn new(p: Point, q: Point) -> Self {
        Line {
            a: q.y as f64 - p.y as f64,
            b: p.x as f64 - q.x as f64,
            c: p.y as f64 * q.x as f64 - p.x as f64 * q.y as f64,
        }
    }

    #[inline]
    pub fn dist(&self, p: Point) -> f64 {
        self.a * p.x as f64 + self.b * p.y as f64 + self.c
    }

    #[inline]
    pub fn mag_sq(&self) -> f64 {
        self.a * self.a + self.b * self.b
    }

    /// Intersection of two infinite lines.
    pub fn intersect(&self, other: &Line, snap: bool) -> Option<Point> {
        let denom = self.a * other.b - self.b * other.a;
        if denom == 0.0 {
            return None;
        }
        let scale = 1.0 / denom;
        let mut p = Point::new(
            ((self.b * other.c - other.b * self.c) * scale) as f32,
            ((other.a * self.c - self.a * other.c) * scale) as f32,
        );
        if snap {
            p = snap_quarter(p);
        }
        Some(p)
    }
}

/// Round to the nearest quarter pixel, for screen-space tessellation.
#[inline]
pub(crate) fn snap_quarter(p: Point) -> Point {
    Point::new((p.x * 4.0).round() * 0.25, (p.y * 4.0).round() * 0.25)
}

#[inline]
pub(crate) fn coincident(a: Point, b: Point) -> bool {
    a == b
}

/// A mesh vertex.
///
/// The `prev`/`next` slots serve three roles in sequence: the circular
/// per-contour list, then global sweep order after the sort, and finally the
/// scratch ring used by ear clipping during emission. The roles never
/// overlap in time.
pub(crate) struct Vertex {
    pub point: Point,
    /// Coverage in [0, 255]. 255 for everything except antialiased
    /// outer-offset vertices and interpolated intersections.
    pub alpha: u8,
    /// Whether the simplification sweep has passed this vertex.
    pub processed: bool,
    pub prev: VertexId,
    pub next: VertexId,
    pub first_edge_above: EdgeId,
    pub last_edge_above: EdgeId,
    pub first_edge_below: EdgeId,
    pub last_edge_below: EdgeId,
}

/// An edge from a top vertex to a bottom vertex (top precedes bottom in
/// sweep order). `winding` is +1 when the source contour traversed it
/// downward in sweep order and -1 upward; coincident edges fold their
/// windings together.
pub(crate) struct Edge {
    pub top: VertexId,
    pub bottom: VertexId,
    pub winding: i16,
    pub kind: EdgeKind,
    pub line: Line,
    // Active edge list (also reused for boundary chains).
    pub left: EdgeId,
    pub right: EdgeId,
    // Position in the bottom vertex's edges-above list.
    pub above_prev: EdgeId,
    pub above_next: EdgeId,
    // Position in the top vertex's edges-below list.
    pub below_prev: EdgeId,
    pub below_next: EdgeId,
    // Monotone polygon boundaries this edge participates in.
    pub left_poly: PolyId,
    pub right_poly: PolyId,
    pub left_poly_prev: EdgeId,
    pub left_poly_next: EdgeId,
    pub right_poly_prev: EdgeId,
    pub right_poly_next: EdgeId,
    pub used_in_left: bool,
    pub used_in_right: bool,
}

/// One monotone piece of a `Poly`: a chain of edges along a single side,
/// top to bottom.
pub(crate) struct MonotonePoly {
    pub side: Side,
    pub first_edge: EdgeId,
    pub last_edge: EdgeId,
    pub prev: MonoId,
    pub next: MonoId,
}

/// An output polygon: a chain of monotone pieces sharing end vertices, with
/// the winding number accumulated when the sweep opened it.
pub(crate) struct Poly {
    pub first_vertex: VertexId,
    pub winding: i16,
    pub head: MonoId,
    pub tail: MonoId,
    /// Next polygon in the global list.
    pub next: PolyId,
    /// A polygon this one will merge with when the sweep reaches a shared
    /// lower vertex.
    pub partner: PolyId,
    /// Number of vertices along the boundary chains.
    pub count: i32,
}

/// The arena. All nodes are allocated here and freed together when the
/// tessellation call returns.
pub(crate) struct Mesh {
    verts: Vec<Vertex>,
    edges: Vec<Edge>,
    polys: Vec<Poly>,
    monos: Vec<MonotonePoly>,
    pub log: bool,
}

macro_rules! arena_index {
    ($handle:ident, $node:ident, $store:ident) => {
        impl core::ops::Index<$handle> for Mesh {
            type Output = $node;
            #[inline]
            fn index(&self, id: $handle) -> &$node {
                &self.$store[id.index()]
            }
        }

        impl core::ops::IndexMut<$handle> for Mesh {
            #[inline]
            fn index_mut(&mut self, id: $handle) -> &mut $node {
                &mut self.$store[id.index()]
            }
        }
    };
}

arena_index!(VertexId, Vertex, verts);
arena_index!(EdgeId, Edge, edges);
arena_index!(PolyId, Poly, polys);
arena_index!(MonoId, MonotonePoly, monos);

impl Mesh {
    pub fn new() -> Self {
        #[cfg(all(debug_assertions, feature = "std"))]
        let log = std::env::var("TRIFILL_FORCE_LOGGING").is_ok();
        #[cfg(not(all(debug_assertions, feature = "std")))]
        let log = false;

        Mesh {
            verts: Vec::new(),
            edges: Vec::new(),
            polys: Vec::new(),
            monos: Vec::new(),
            log,
        }
    }

    pub fn alloc_vertex(&mut self, point: Point, alpha: u8) -> VertexId {
        let id = VertexId(self.verts.len() as u32);
        self.verts.push(Vertex {
            point,
            alpha,
            processed: false,
            prev: VertexId::INVALID,
            next: VertexId::INVALID,
            first_edge_above: EdgeId::INVALID,
            last_edge_above: EdgeId::INVALID,
            first_edge_below: EdgeId::INVALID,
            last_edge_below: EdgeId::INVALID,
        });
        id
    }

    pub fn alloc_edge(
        &mut self,
        top: VertexId,
        bottom: VertexId,
        winding: i16,
        kind: EdgeKind,
    ) -> EdgeId {
        let line = Line::new(self[top].point, self[bottom].point);
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            top,
            bottom,
            winding,
            kind,
            line,
            left: EdgeId::INVALID,
            right: EdgeId::INVALID,
            above_prev: EdgeId::INVALID,
            above_next: EdgeId::INVALID,
            below_prev: EdgeId::INVALID,
            below_next: EdgeId::INVALID,
            left_poly: PolyId::INVALID,
            right_poly: PolyId::INVALID,
            left_poly_prev: EdgeId::INVALID,
            left_poly_next: EdgeId::INVALID,
            right_poly_prev: EdgeId::INVALID,
            right_poly_next: EdgeId::INVALID,
            used_in_left: false,
            used_in_right: false,
        });
        id
    }

    pub fn alloc_poly(&mut self, first_vertex: VertexId, winding: i16) -> PolyId {
        let id = PolyId(self.polys.len() as u32);
        self.polys.push(Poly {
            first_vertex,
            winding,
            head: MonoId::INVALID,
            tail: MonoId::INVALID,
            next: PolyId::INVALID,
            partner: PolyId::INVALID,
            count: 0,
        });
        id
    }

    pub fn alloc_mono(&mut self, side: Side) -> MonoId {
        let id = MonoId(self.monos.len() as u32);
        self.monos.push(MonotonePoly {
            side,
            first_edge: EdgeId::INVALID,
            last_edge: EdgeId::INVALID,
            prev: MonoId::INVALID,
            next: MonoId::INVALID,
        });
        id
    }

    #[inline]
    pub fn point(&self, v: VertexId) -> Point {
        self[v].point
    }

    #[inline]
    pub fn top_point(&self, e: EdgeId) -> Point {
        self.point(self[e].top)
    }

    #[inline]
    pub fn bottom_point(&self, e: EdgeId) -> Point {
        self.point(self[e].bottom)
    }

    /// `true` when the edge lies strictly to the left of `p`.
    #[inline]
    pub fn is_left_of(&self, e: EdgeId, p: Point) -> bool {
        self[e].line.dist(p) > 0.0
    }

    #[inline]
    pub fn is_right_of(&self, e: EdgeId, p: Point) -> bool {
        self[e].line.dist(p) < 0.0
    }

    /// The line equation must be kept consistent with the endpoints; call
    /// whenever either endpoint changes.
    pub fn recompute_line(&mut self, e: EdgeId) {
        let p = self.top_point(e);
        let q = self.bottom_point(e);
        self[e].line = Line::new(p, q);
    }

    // Per-vertex edges-above list (edges whose bottom is this vertex),
    // ordered left to right.

    pub fn above_list_insert(&mut self, e: EdgeId, prev: EdgeId, next: EdgeId, v: VertexId) {
        self[e].above_prev = prev;
        self[e].above_next = next;
        if prev.is_valid() {
            self[prev].above_next = e;
        } else {
            self[v].first_edge_above = e;
        }
        if next.is_valid() {
            self[next].above_prev = e;
        } else {
            self[v].last_edge_above = e;
        }
    }

    pub fn above_list_remove(&mut self, e: EdgeId) {
        let v = self[e].bottom;
        let prev = self[e].above_prev;
        let next = self[e].above_next;
        if prev.is_valid() {
            self[prev].above_next = next;
        } else {
            self[v].first_edge_above = next;
        }
        if next.is_valid() {
            self[next].above_prev = prev;
        } else {
            self[v].last_edge_above = prev;
        }
        self[e].above_prev = EdgeId::INVALID;
        self[e].above_next = EdgeId::INVALID;
    }

    // Per-vertex edges-below list (edges whose top is this vertex).

    pub fn below_list_insert(&mut self, e: EdgeId, prev: EdgeId, next: EdgeId, v: VertexId) {
        self[e].below_prev = prev;
        self[e].below_next = next;
        if prev.is_valid() {
            self[prev].below_next = e;
        } else {
            self[v].first_edge_below = e;
        }
        if next.is_valid() {
            self[next].below_prev = e;
        } else {
            self[v].last_edge_below = e;
        }
    }

    pub fn below_list_remove(&mut self, e: EdgeId) {
        let v = self[e].top;
        let prev = self[e].below_prev;
        let next = self[e].below_next;
        if prev.is_valid() {
            self[prev].below_next = next;
        } else {
            self[v].first_edge_below = next;
        }
        if next.is_valid() {
            self[next].below_prev = prev;
        } else {
            self[v].last_edge_below = prev;
        }
        self[e].below_prev = EdgeId::INVALID;
        self[e].below_next = EdgeId::INVALID;
    }

    /// Unlinks an edge from both of its vertices.
    pub fn disconnect(&mut self, e: EdgeId) {
        self.above_list_remove(e);
        self.below_list_remove(e);
    }

    /// Intersection of two edges, restricted to the segments.
    ///
    /// The segments are converted to parametric form so that the common
    /// no-intersection case is decided from numerator/denominator signs
    /// without a division. Also computes the coverage of the intersection
    /// point from the edge kinds: crossing a connector interpolates its
    /// endpoint coverages, two outer edges meet at zero coverage, anything
    /// involving an inner edge is fully covered.
    pub fn edge_intersect(&self, e: EdgeId, o: EdgeId) -> Option<(Point, u8)> {
        let ea = &self[e];
        let oa = &self[o];
        if ea.top == oa.top || ea.bottom == oa.bottom {
            return None;
        }
        let denom = ea.line.a * oa.line.b - ea.line.b * oa.line.a;
        if denom == 0.0 {
            return None;
        }
        let e_top = self.point(ea.top);
        let o_top = self.point(oa.top);
        let dx = o_top.x as f64 - e_top.x as f64;
        let dy = o_top.y as f64 - e_top.y as f64;
        let s_numer = dy * oa.line.b + dx * oa.line.a;
        let t_numer = dy * ea.line.b + dx * ea.line.a;
        // If s / denom or t / denom is outside [0, 1] there is no
        // intersection on the segments; the signs tell us without dividing.
        #[allow(clippy::collapsible_else_if)]
        if denom > 0.0 {
            if s_numer < 0.0 || s_numer > denom || t_numer < 0.0 || t_numer > denom {
                return None;
            }
        } else {
            if s_numer > 0.0 || s_numer < denom || t_numer > 0.0 || t_numer < denom {
                return None;
            }
        }
        let s = s_numer / denom;
        debug_assert!((0.0..=1.0).contains(&s));
        let p = Point::new(
            (e_top.x as f64 - s * ea.line.b) as f32,
            (e_top.y as f64 + s * ea.line.a) as f32,
        );
        let alpha = if ea.kind == EdgeKind::Connector {
            let top_a = self[ea.top].alpha as f64;
            let bottom_a = self[ea.bottom].alpha as f64;
            ((1.0 - s) * top_a + s * bottom_a) as u8
        } else if oa.kind == EdgeKind::Connector {
            let t = t_numer / denom;
            let top_a = self[oa.top].alpha as f64;
            let bottom_a = self[oa.bottom].alpha as f64;
            ((1.0 - t) * top_a + t * bottom_a) as u8
        } else if ea.kind == EdgeKind::Outer && oa.kind == EdgeKind::Outer {
            0
        } else {
            255
        };
        Some((p, alpha))
    }
}

/// Head and tail of a doubly-linked vertex chain.
#[derive(Copy, Clone)]
pub(crate) struct VertexList {
    pub head: VertexId,
    pub tail: VertexId,
}

impl VertexList {
    pub fn new() -> Self {
        VertexList {
            head: VertexId::INVALID,
            tail: VertexId::INVALID,
        }
    }

    pub fn insert(&mut self, mesh: &mut Mesh, v: VertexId, prev: VertexId, next: VertexId) {
        mesh[v].prev = prev;
        mesh[v].next = next;
        if prev.is_valid() {
            mesh[prev].next = v;
        } else {
            self.head = v;
        }
        if next.is_valid() {
            mesh[next].prev = v;
        } else {
            self.tail = v;
        }
    }

    pub fn append(&mut self, mesh: &mut Mesh, v: VertexId) {
        self.insert(mesh, v, self.tail, VertexId::INVALID);
    }

    pub fn prepend(&mut self, mesh: &mut Mesh, v: VertexId) {
        self.insert(mesh, v, VertexId::INVALID, self.head);
    }

    pub fn remove(&mut self, mesh: &mut Mesh, v: VertexId) {
        let prev = mesh[v].prev;
        let next = mesh[v].next;
        if prev.is_valid() {
            mesh[prev].next = next;
        } else {
            self.head = next;
        }
        if next.is_valid() {
            mesh[next].prev = prev;
        } else {
            self.tail = prev;
        }
        mesh[v].prev = VertexId::INVALID;
        mesh[v].next = VertexId::INVALID;
    }

    pub fn close(&mut self, mesh: &mut Mesh) {
        if self.head.is_valid() && self.tail.is_valid() {
            let (head, tail) = (self.head, self.tail);
            mesh[tail].next = head;
            mesh[head].prev = tail;
        }
    }
}

/// Head and tail of an edge chain threaded through the `left`/`right` slots.
/// Used for the active edge list and for extracted boundary loops.
#[derive(Copy, Clone)]
pub(crate) struct EdgeList {
    pub head: EdgeId,
    pub tail: EdgeId,
}

impl EdgeList {
    pub fn new() -> Self {
        EdgeList {
            head: EdgeId::INVALID,
            tail: EdgeId::INVALID,
        }
    }

    pub fn contains(&self, mesh: &Mesh, e: EdgeId) -> bool {
        mesh[e].left.is_valid() || mesh[e].right.is_valid() || self.head == e
    }

    pub fn insert(&mut self, mesh: &mut Mesh, e: EdgeId, prev: EdgeId, next: EdgeId) {
        mesh[e].left = prev;
        mesh[e].right = next;
        if prev.is_valid() {
            mesh[prev].right = e;
        } else {
            self.head = e;
        }
        if next.is_valid() {
            mesh[next].left = e;
        } else {
            self.tail = e;
        }
    }

    pub fn append(&mut self, mesh: &mut Mesh, e: EdgeId) {
        self.insert(mesh, e, self.tail, EdgeId::INVALID);
    }

    pub fn remove(&mut self, mesh: &mut Mesh, e: EdgeId) {
        let prev = mesh[e].left;
        let next = mesh[e].right;
        if prev.is_valid() {
            mesh[prev].right = next;
        } else {
            self.head = next;
        }
        if next.is_valid() {
            mesh[next].left = prev;
        } else {
            self.tail = prev;
        }
        mesh[e].left = EdgeId::INVALID;
        mesh[e].right = EdgeId::INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::point;

    #[test]
    fn line_distance_sign() {
        // A downward edge is "left of" the points on its right: they get a
        // positive distance.
        let line = Line::new(point(0.0, 0.0), point(0.0, 10.0));
        assert!(line.dist(point(1.0, 5.0)) > 0.0);
        assert!(line.dist(point(-1.0, 5.0)) < 0.0);
        assert_eq!(line.dist(point(0.0, 7.5)), 0.0);
    }

    #[test]
    fn line_intersection() {
        let a = Line::new(point(0.0, 0.0), point(10.0, 10.0));
        let b = Line::new(point(0.0, 10.0), point(10.0, 0.0));
        let p = a.intersect(&b, false).unwrap();
        assert_eq!(p, point(5.0, 5.0));

        // Parallel lines do not intersect.
        let c = Line::new(point(0.0, 1.0), point(10.0, 11.0));
        assert!(a.intersect(&c, false).is_none());
    }

    #[test]
    fn quarter_pixel_snapping() {
        assert_eq!(snap_quarter(point(1.1, -0.9)), point(1.0, -1.0));
        assert_eq!(snap_quarter(point(0.13, 0.12)), point(0.25, 0.0));
        let a = Line::new(point(0.0, 0.0), point(10.0, 10.1));
        let b = Line::new(point(0.0, 10.0), point(10.0, 0.0));
        let p = a.intersect(&b, true).unwrap();
        assert_eq!(p.x * 4.0, (p.x * 4.0).round());
        assert_eq!(p.y * 4.0, (p.y * 4.0).round());
    }

    #[test]
    fn segment_intersection_is_bounded() {
        let mut mesh = Mesh::new();
        let a = mesh.alloc_vertex(point(0.0, 0.0), 255);
        let b = mesh.alloc_vertex(point(10.0, 10.0), 255);
        let c = mesh.alloc_vertex(point(0.0, 10.0), 255);
        let d = mesh.alloc_vertex(point(10.0, 0.0), 255);
        let e1 = mesh.alloc_edge(a, b, 1, EdgeKind::Inner);
        let e2 = mesh.alloc_edge(c, d, 1, EdgeKind::Inner);
        let (p, alpha) = mesh.edge_intersect(e1, e2).unwrap();
        assert_eq!(p, point(5.0, 5.0));
        assert_eq!(alpha, 255);

        // The segments do not reach each other even though the lines cross.
        let far = mesh.alloc_vertex(point(30.0, 20.0), 255);
        let far2 = mesh.alloc_vertex(point(40.0, 10.0), 255);
        let e3 = mesh.alloc_edge(far, far2, 1, EdgeKind::Inner);
        assert!(mesh.edge_intersect(e1, e3).is_none());
    }
}
