//! Piecewise-linear approximation of path segments (stage 1).
//!
//! Curves are subdivided recursively at the parameter midpoint until the
//! control points are within the flattening tolerance of the chord, with an
//! a-priori subdivision budget derived from the control polygon so that a
//! degenerate curve cannot recurse unboundedly. Conics are first rewritten
//! as a bounded run of plain quadratics.

use crate::math::{point, Box2D, Point};
use crate::mesh::{Mesh, VertexId};
use crate::path::{Path, PathEvent};

use alloc::vec::Vec;
use arrayvec::ArrayVec;

#[cfg(not(feature = "std"))]
use num_traits::Float;

/// Cap on the number of points a single curve may flatten to.
pub(crate) const MAX_POINTS_PER_CURVE: u32 = 1 << 10;

const MIN_CURVE_TOLERANCE: f32 = 0.0001;

/// At most 2^5 quadratics per conic: 1 + 2 * 32 points.
const MAX_CONIC_SUBDIVISIONS: u32 = 5;
pub(crate) type ConicQuads = ArrayVec<Point, 65>;

fn mid(a: Point, b: Point) -> Point {
    point((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

fn distance_to_segment_sq(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.square_length();
    if len_sq <= f32::EPSILON {
        return ap.square_length();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    let projected = a + ab * t;
    (p - projected).square_length()
}

fn point_budget(max_deviation: f32, tolerance: f32) -> u32 {
    let tolerance = tolerance.max(MIN_CURVE_TOLERANCE);
    if !max_deviation.is_finite() {
        return MAX_POINTS_PER_CURVE;
    }
    if max_deviation <= tolerance {
        return 1;
    }
    let div = (max_deviation / tolerance).sqrt();
    if div >= MAX_POINTS_PER_CURVE as f32 {
        return MAX_POINTS_PER_CURVE;
    }
    (div.ceil() as u32)
        .next_power_of_two()
        .clamp(1, MAX_POINTS_PER_CURVE)
}

pub(crate) fn quadratic_point_count(p0: Point, p1: Point, p2: Point, tolerance: f32) -> u32 {
    point_budget(distance_to_segment_sq(p1, p0, p2).sqrt(), tolerance)
}

pub(crate) fn cubic_point_count(
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    tolerance: f32,
) -> u32 {
    let d1 = distance_to_segment_sq(p1, p0, p3);
    let d2 = distance_to_segment_sq(p2, p0, p3);
    point_budget(d1.max(d2).sqrt(), tolerance)
}

/// Approximates a conic by quadratics, splitting the rational curve at its
/// parameter midpoint until dropping the weight is within tolerance.
/// The result is the flattened control polygon: one start point followed by
/// (ctrl, end) pairs.
pub(crate) fn conic_to_quadratics(
    p0: Point,
    p1: Point,
    p2: Point,
    weight: f32,
    tolerance: f32,
) -> ConicQuads {
    let mut out = ConicQuads::new();
    out.push(p0);
    subdivide_conic(
        p0,
        p1,
        p2,
        weight,
        tolerance.max(MIN_CURVE_TOLERANCE),
        MAX_CONIC_SUBDIVISIONS,
        &mut out,
    );
    out
}

fn conic_midpoint(p0: Point, p1: Point, p2: Point, w: f32) -> Point {
    let denom = 2.0 + 2.0 * w;
    point(
        (p0.x + 2.0 * w * p1.x + p2.x) / denom,
        (p0.y + 2.0 * w * p1.y + p2.y) / denom,
    )
}

fn subdivide_conic(
    p0: Point,
    p1: Point,
    p2: Point,
    w: f32,
    tolerance: f32,
    depth: u32,
    out: &mut ConicQuads,
) {
    // The quadratic sharing this conic's control polygon deviates from it
    // the most at the curve midpoint.
    let conic_mid = conic_midpoint(p0, p1, p2, w);
    let quad_mid = mid(mid(p0, p1), mid(p1, p2));
    let error_sq = (conic_mid - quad_mid).square_length();
    if depth == 0 || error_sq <= tolerance * tolerance || !error_sq.is_finite() {
        out.push(p1);
        out.push(p2);
        return;
    }
    let denom = 1.0 + w;
    let l = point((p0.x + w * p1.x) / denom, (p0.y + w * p1.y) / denom);
    let r = point((w * p1.x + p2.x) / denom, (w * p1.y + p2.y) / denom);
    let half_w = ((1.0 + w) * 0.5).sqrt();
    subdivide_conic(p0, l, conic_mid, half_w, tolerance, depth - 1, out);
    subdivide_conic(conic_mid, r, p2, half_w, tolerance, depth - 1, out);
}

fn append_point_to_contour(
    mesh: &mut Mesh,
    p: Point,
    prev: VertexId,
    head: &mut VertexId,
) -> VertexId {
    let v = mesh.alloc_vertex(p, 255);
    if prev.is_valid() {
        mesh[prev].next = v;
        mesh[v].prev = prev;
    } else {
        *head = v;
    }
    v
}

fn generate_quadratic_points(
    mesh: &mut Mesh,
    p0: Point,
    p1: Point,
    p2: Point,
    tol_sq: f32,
    mut prev: VertexId,
    head: &mut VertexId,
    points_left: u32,
) -> VertexId {
    let d = distance_to_segment_sq(p1, p0, p2);
    if points_left < 2 || d < tol_sq || !d.is_finite() {
        return append_point_to_contour(mesh, p2, prev, head);
    }
    let q0 = mid(p0, p1);
    let q1 = mid(p1, p2);
    let r = mid(q0, q1);
    let points_left = points_left >> 1;
    prev = generate_quadratic_points(mesh, p0, q0, r, tol_sq, prev, head, points_left);
    generate_quadratic_points(mesh, r, q1, p2, tol_sq, prev, head, points_left)
}

#[allow(clippy::too_many_arguments)]
fn generate_cubic_points(
    mesh: &mut Mesh,
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    tol_sq: f32,
    mut prev: VertexId,
    head: &mut VertexId,
    points_left: u32,
) -> VertexId {
    let d1 = distance_to_segment_sq(p1, p0, p3);
    let d2 = distance_to_segment_sq(p2, p0, p3);
    if points_left < 2 || (d1 < tol_sq && d2 < tol_sq) || !d1.is_finite() || !d2.is_finite() {
        return append_point_to_contour(mesh, p3, prev, head);
    }
    let q0 = mid(p0, p1);
    let q1 = mid(p1, p2);
    let q2 = mid(p2, p3);
    let r0 = mid(q0, q1);
    let r1 = mid(q1, q2);
    let s = mid(r0, r1);
    let points_left = points_left >> 1;
    prev = generate_cubic_points(mesh, p0, q0, r0, s, tol_sq, prev, head, points_left);
    generate_cubic_points(mesh, s, r1, q2, p3, tol_sq, prev, head, points_left)
}

fn close_contour(mesh: &mut Mesh, head: VertexId, prev: VertexId, contours: &mut Vec<VertexId>) {
    if head.is_valid() && prev.is_valid() {
        mesh[head].prev = prev;
        mesh[prev].next = head;
        contours.push(head);
    }
}

/// Stage 1: convert the path into one circular linked list of vertices per
/// contour. For inverse fill rules a clip-bounds rectangle, wound opposite
/// to the regular traversal, is prepended as the first contour.
///
/// Returns the contour heads and whether the path contained no curves.
pub(crate) fn path_to_contours(
    mesh: &mut Mesh,
    path: &Path,
    tolerance: f32,
    clip_bounds: &Box2D,
) -> (Vec<VertexId>, bool) {
    let tol_sq = tolerance * tolerance;
    let mut contours = Vec::new();
    let mut is_linear = true;
    let mut head = VertexId::INVALID;
    let mut prev = VertexId::INVALID;

    if path.fill_rule().is_inverse() {
        let quad = [
            clip_bounds.min,
            point(clip_bounds.max.x, clip_bounds.min.y),
            clip_bounds.max,
            point(clip_bounds.min.x, clip_bounds.max.y),
        ];
        for p in quad.iter().rev() {
            prev = append_point_to_contour(mesh, *p, prev, &mut head);
        }
        close_contour(mesh, head, prev, &mut contours);
        head = VertexId::INVALID;
        prev = VertexId::INVALID;
    }

    for event in path.iter() {
        match event {
            PathEvent::Begin { at } => {
                head = VertexId::INVALID;
                prev = append_point_to_contour(mesh, at, VertexId::INVALID, &mut head);
            }
            PathEvent::Line { to, .. } => {
                prev = append_point_to_contour(mesh, to, prev, &mut head);
            }
            PathEvent::Quadratic { from, ctrl, to } => {
                let budget = quadratic_point_count(from, ctrl, to, tolerance);
                prev = generate_quadratic_points(
                    mesh, from, ctrl, to, tol_sq, prev, &mut head, budget,
                );
                is_linear = false;
            }
            PathEvent::Conic {
                from,
                ctrl,
                to,
                weight,
            } => {
                let quads = conic_to_quadratics(from, ctrl, to, weight, tolerance);
                let mut q0 = quads[0];
                for q in quads[1..].chunks_exact(2) {
                    let budget = quadratic_point_count(q0, q[0], q[1], tolerance);
                    prev = generate_quadratic_points(
                        mesh, q0, q[0], q[1], tol_sq, prev, &mut head, budget,
                    );
                    q0 = q[1];
                }
                is_linear = false;
            }
            PathEvent::Cubic {
                from,
                ctrl1,
                ctrl2,
                to,
            } => {
                let budget = cubic_point_count(from, ctrl1, ctrl2, to, tolerance);
                prev = generate_cubic_points(
                    mesh, from, ctrl1, ctrl2, to, tol_sq, prev, &mut head, budget,
                );
                is_linear = false;
            }
            PathEvent::End { .. } => {
                close_contour(mesh, head, prev, &mut contours);
                head = VertexId::INVALID;
                prev = VertexId::INVALID;
            }
        }
    }

    (contours, is_linear)
}

/// Upper bound on the number of vertices linearization can produce, plus the
/// number of contours. Used to reject paths that cannot be indexed with 16
/// bits before doing any real work.
pub(crate) fn worst_case_point_count(path: &Path, tolerance: f32) -> (u32, u32) {
    let mut points = 0u32;
    let mut contours = 0u32;
    for event in path.iter() {
        let n = match event {
            PathEvent::Begin { .. } | PathEvent::Line { .. } => 1,
            PathEvent::Quadratic { from, ctrl, to } => {
                quadratic_point_count(from, ctrl, to, tolerance)
            }
            PathEvent::Conic {
                from,
                ctrl,
                to,
                weight,
            } => {
                let quads = conic_to_quadratics(from, ctrl, to, weight, tolerance);
                let mut n = 0u32;
                let mut q0 = quads[0];
                for q in quads[1..].chunks_exact(2) {
                    n = n.saturating_add(quadratic_point_count(q0, q[0], q[1], tolerance));
                    q0 = q[1];
                }
                n
            }
            PathEvent::Cubic {
                from,
                ctrl1,
                ctrl2,
                to,
            } => cubic_point_count(from, ctrl1, ctrl2, to, tolerance),
            PathEvent::End { .. } => {
                contours += 1;
                0
            }
        };
        points = points.saturating_add(n);
    }
    if path.fill_rule().is_inverse() {
        contours += 1;
        points = points.saturating_add(4);
    }
    (points, contours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets() {
        // A flat quadratic needs a single point.
        assert_eq!(
            quadratic_point_count(point(0.0, 0.0), point(5.0, 0.0), point(10.0, 0.0), 0.25),
            1
        );
        // A curvy one gets a power-of-two budget.
        let n = quadratic_point_count(point(0.0, 0.0), point(5.0, 10.0), point(10.0, 0.0), 0.25);
        assert!(n > 1);
        assert!(n.is_power_of_two());
        assert!(n <= MAX_POINTS_PER_CURVE);
    }

    #[test]
    fn conic_expansion_is_bounded() {
        let w = core::f32::consts::FRAC_1_SQRT_2;
        let quads = conic_to_quadratics(
            point(1.0, 0.0),
            point(1.0, 1.0),
            point(0.0, 1.0),
            w,
            0.25,
        );
        assert!(quads.len() >= 3);
        assert!(quads.len() % 2 == 1);
        assert_eq!(quads[0], point(1.0, 0.0));
        assert_eq!(*quads.last().unwrap(), point(0.0, 1.0));
    }

    #[test]
    fn flatten_within_tolerance() {
        let mut mesh = Mesh::new();
        let mut head = VertexId::INVALID;
        let tolerance = 0.1f32;
        let (p0, p1, p2) = (point(0.0, 0.0), point(5.0, 10.0), point(10.0, 0.0));
        let budget = quadratic_point_count(p0, p1, p2, tolerance);
        let first = append_point_to_contour(&mut mesh, p0, VertexId::INVALID, &mut head);
        let last = generate_quadratic_points(
            &mut mesh,
            p0,
            p1,
            p2,
            tolerance * tolerance,
            first,
            &mut head,
            budget,
        );
        assert_eq!(mesh[last].point, p2);
        // Walk the chain; every vertex must be on or near the curve's convex
        // hull and the chain must make progress in x.
        let mut v = head;
        let mut count = 0;
        let mut prev_x = f32::MIN;
        while v.is_valid() {
            let p = mesh[v].point;
            assert!(p.x >= prev_x);
            assert!(p.y >= -0.001 && p.y <= 5.001);
            prev_x = p.x;
            count += 1;
            v = mesh[v].next;
        }
        assert!(count > 2);
    }

    #[test]
    fn worst_case_counts() {
        let mut builder = Path::builder();
        builder.begin(point(0.0, 0.0));
        builder.line_to(point(10.0, 0.0));
        builder.line_to(point(10.0, 10.0));
        builder.line_to(point(0.0, 10.0));
        builder.close();
        let path = builder.build();
        let (points, contours) = worst_case_point_count(&path, 0.25);
        assert_eq!(points, 4);
        assert_eq!(contours, 1);
    }
}
