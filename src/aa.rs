//! Antialiased boundary construction (stages 5a to 5d).
//!
//! After simplification, the fill boundary is extracted as closed loops,
//! cleaned of inversion-prone spikes, and extruded by half a pixel on both
//! sides of each edge. The offset vertices are stitched into a new quad
//! mesh with full coverage on the interior ring and zero on the exterior
//! ring, which then goes through the sort/simplify/tessellate stages again.

use crate::math::Vector;
use crate::mesh::{EdgeId, EdgeKind, EdgeList, Mesh, VertexId, VertexList};
use crate::path::FillRule;
use crate::sweep::{
    connect, find_enclosing_edges, insert_edge, new_edge, remove_edge, Comparator,
};

#[cfg(not(feature = "std"))]
use num_traits::Float;

/// The edge's normal, scaled by the winding so that it points away from the
/// filled side. Not unit length.
fn edge_normal(mesh: &Mesh, e: EdgeId) -> Vector {
    let w = mesh[e].winding as f32;
    Vector::new(mesh[e].line.a as f32 * w, mesh[e].line.b as f32 * w)
}

/// Stage 5a: sweep once more and drop every edge whose two sides have the
/// same fill state; only boundary edges survive. Windings are accumulated
/// left to right so each edge carries the winding of the region left of it.
fn remove_non_boundary_edges(mesh: &mut Mesh, list: &VertexList, rule: FillRule) {
    tess_log!(mesh, "removing non-boundary edges");
    let mut active = EdgeList::new();
    let mut v = list.head;
    while v.is_valid() {
        if !mesh[v].first_edge_above.is_valid() && !mesh[v].first_edge_below.is_valid() {
            v = mesh[v].next;
            continue;
        }
        let (left_enclosing, _) = find_enclosing_edges(mesh, v, &active);
        let mut prev_filled =
            left_enclosing.is_valid() && rule.is_in(mesh[left_enclosing].winding);
        let mut e = mesh[v].first_edge_above;
        while e.is_valid() {
            let next = mesh[e].above_next;
            remove_edge(mesh, e, &mut active);
            let filled = rule.is_in(mesh[e].winding);
            if filled == prev_filled {
                mesh.disconnect(e);
            }
            prev_filled = filled;
            e = next;
        }
        let mut prev = left_enclosing;
        let mut e = mesh[v].first_edge_below;
        while e.is_valid() {
            if prev.is_valid() {
                let w = mesh[prev].winding;
                mesh[e].winding += w;
            }
            insert_edge(mesh, e, prev, &mut active);
            prev = e;
            e = mesh[e].below_next;
        }
        v = mesh[v].next;
    }
}

/// Walks one closed boundary loop starting at `e`, clockwise around filled
/// regions and counter-clockwise around unfilled ones, consuming the edges
/// from the mesh as it goes. The surviving edges are rewound to +-1.
fn extract_boundary(mesh: &mut Mesh, boundary: &mut EdgeList, mut e: EdgeId, rule: FillRule) {
    let mut down = rule.is_in(mesh[e].winding);
    while e.is_valid() {
        mesh[e].winding = if down { 1 } else { -1 };
        boundary.append(mesh, e);
        let next;
        if down {
            // Take the next outgoing edge in clockwise order.
            if mesh[e].above_next.is_valid() {
                next = mesh[e].above_next;
                down = false;
            } else if mesh[mesh[e].bottom].last_edge_below.is_valid() {
                next = mesh[mesh[e].bottom].last_edge_below;
                down = true;
            } else if mesh[e].above_prev.is_valid() {
                next = mesh[e].above_prev;
                down = false;
            } else {
                next = EdgeId::INVALID;
            }
        } else {
            // Counter-clockwise.
            if mesh[e].below_prev.is_valid() {
                next = mesh[e].below_prev;
                down = true;
            } else if mesh[mesh[e].top].first_edge_above.is_valid() {
                next = mesh[mesh[e].top].first_edge_above;
                down = false;
            } else if mesh[e].below_next.is_valid() {
                next = mesh[e].below_next;
                down = true;
            } else {
                next = EdgeId::INVALID;
            }
        }
        mesh.disconnect(e);
        e = next;
    }
}

/// Stage 5c: removes "pointy" vertices, where the boundary turns by more
/// than 90 degrees and the previous vertex sits within a quarter pixel of
/// the next edge's line. Offsetting such a corner would produce an inverted
/// quad; the two edges collapse into a single joining edge instead.
fn simplify_boundary(mesh: &mut Mesh, boundary: &mut EdgeList, c: &Comparator) {
    let mut prev_edge = boundary.tail;
    let mut prev_normal = edge_normal(mesh, prev_edge);
    let mut e = boundary.head;
    while e.is_valid() {
        let prev_v = if mesh[prev_edge].winding == 1 {
            mesh[prev_edge].top
        } else {
            mesh[prev_edge].bottom
        };
        let next_v = if mesh[e].winding == 1 {
            mesh[e].bottom
        } else {
            mesh[e].top
        };
        let dist = mesh[e].line.dist(mesh.point(prev_v));
        let normal = edge_normal(mesh, e);
        let denom = 0.0625 * mesh[e].line.mag_sq();
        if prev_normal.dot(normal) < 0.0 && dist * dist <= denom {
            tess_log!(mesh, "collapsing pointy vertex {}", prev_v.0);
            let join = new_edge(mesh, prev_v, next_v, EdgeKind::Inner, c);
            insert_edge(mesh, join, e, boundary);
            remove_edge(mesh, prev_edge, boundary);
            remove_edge(mesh, e, boundary);
            if mesh[join].left.is_valid() && mesh[join].right.is_valid() {
                prev_edge = mesh[join].left;
                e = join;
            } else {
                prev_edge = boundary.tail;
                e = boundary.head;
            }
            prev_normal = edge_normal(mesh, prev_edge);
        } else {
            prev_edge = e;
            prev_normal = normal;
            e = mesh[e].right;
        }
    }
}

/// When the offset corners around a spike cross over, both are pulled onto
/// the intersection of the surrounding connector edges, with the coverage
/// interpolated there, so no inverted quad is produced.
fn fix_inversions(
    mesh: &mut Mesh,
    prev_v: VertexId,
    next_v: VertexId,
    prev_bisector: EdgeId,
    next_bisector: EdgeId,
    prev_edge: EdgeId,
    c: &Comparator,
) {
    if !prev_v.is_valid() || !next_v.is_valid() {
        return;
    }
    let winding = if c.sweep_lt(mesh.point(prev_v), mesh.point(next_v)) {
        1
    } else {
        -1
    };
    if winding != mesh[prev_edge].winding {
        if let Some((p, alpha)) = mesh.edge_intersect(prev_bisector, next_bisector) {
            mesh[prev_v].point = p;
            mesh[next_v].point = p;
            mesh[prev_v].alpha = alpha;
            mesh[next_v].alpha = alpha;
        }
    }
}

/// Stage 5d: displace every boundary edge by half a pixel along its normal
/// in both directions, intersect neighbouring offset lines to place the
/// inner (alpha 255) and outer (alpha 0) vertices, and stitch the rings
/// into a quad mesh. Outer edges keep winding +1; inner edges get -2 so
/// the interior stays covered even where a thin feature self-intersects;
/// connectors are structural and carry no winding.
fn boundary_to_aa_mesh(
    mesh: &mut Mesh,
    boundary: &EdgeList,
    out_mesh: &mut VertexList,
    c: &Comparator,
    snap: bool,
) {
    // Fewer than three edges cannot enclose any area.
    if !boundary.head.is_valid() {
        return;
    }
    let second = mesh[boundary.head].right;
    if !second.is_valid() || !mesh[second].right.is_valid() {
        return;
    }
    let radius = 0.5;
    let mut prev_edge = boundary.tail;
    let offset = radius * mesh[prev_edge].line.mag_sq().sqrt() * mesh[prev_edge].winding as f64;
    let mut prev_inner = mesh[prev_edge].line;
    prev_inner.c -= offset;
    let mut prev_outer = mesh[prev_edge].line;
    prev_outer.c += offset;
    let mut inner_vertices = VertexList::new();
    let mut outer_vertices = VertexList::new();
    let mut prev_bisector = EdgeId::INVALID;
    let mut e = boundary.head;
    while e.is_valid() {
        let offset = radius * mesh[e].line.mag_sq().sqrt() * mesh[e].winding as f64;
        let mut inner = mesh[e].line;
        inner.c -= offset;
        let mut outer = mesh[e].line;
        outer.c += offset;
        let inner_point = prev_inner.intersect(&inner, snap);
        let outer_point = prev_outer.intersect(&outer, snap);
        if let (Some(inner_point), Some(outer_point)) = (inner_point, outer_point) {
            let inner_vertex = mesh.alloc_vertex(inner_point, 255);
            let outer_vertex = mesh.alloc_vertex(outer_point, 0);
            let bisector = new_edge(mesh, outer_vertex, inner_vertex, EdgeKind::Connector, c);
            let inner_tail = inner_vertices.tail;
            let outer_tail = outer_vertices.tail;
            fix_inversions(mesh, inner_tail, inner_vertex, prev_bisector, bisector, prev_edge, c);
            fix_inversions(mesh, outer_tail, outer_vertex, prev_bisector, bisector, prev_edge, c);
            inner_vertices.append(mesh, inner_vertex);
            outer_vertices.append(mesh, outer_vertex);
            prev_bisector = bisector;
        }
        prev_inner = inner;
        prev_outer = outer;
        prev_edge = e;
        e = mesh[e].right;
    }
    inner_vertices.close(mesh);
    outer_vertices.close(mesh);
    let mut inner_vertex = inner_vertices.head;
    let mut outer_vertex = outer_vertices.head;
    if !inner_vertex.is_valid() || !outer_vertex.is_valid() {
        return;
    }
    let bisector = new_edge(
        mesh,
        outer_vertices.head,
        inner_vertices.head,
        EdgeKind::Connector,
        c,
    );
    let inner_tail = inner_vertices.tail;
    let outer_tail = outer_vertices.tail;
    let inner_head = inner_vertices.head;
    let outer_head = outer_vertices.head;
    fix_inversions(mesh, inner_tail, inner_head, prev_bisector, bisector, prev_edge, c);
    fix_inversions(mesh, outer_tail, outer_head, prev_bisector, bisector, prev_edge, c);
    loop {
        let outer_prev = mesh[outer_vertex].prev;
        let inner_prev = mesh[inner_vertex].prev;
        connect(mesh, outer_prev, outer_vertex, EdgeKind::Outer, c, 1);
        connect(mesh, inner_prev, inner_vertex, EdgeKind::Inner, c, -2);
        connect(mesh, outer_vertex, inner_vertex, EdgeKind::Connector, c, 0);
        let inner_next = mesh[inner_vertex].next;
        let outer_next = mesh[outer_vertex].next;
        out_mesh.append(mesh, inner_vertex);
        out_mesh.append(mesh, outer_vertex);
        inner_vertex = inner_next;
        outer_vertex = outer_next;
        if inner_vertex == inner_vertices.head || outer_vertex == outer_vertices.head {
            break;
        }
    }
}

/// Stage 5b driver: strips the mesh down to its boundary, then converts
/// every boundary loop into antialiased geometry.
pub(crate) fn extract_boundaries(
    mesh: &mut Mesh,
    in_mesh: &VertexList,
    out_mesh: &mut VertexList,
    rule: FillRule,
    c: &Comparator,
    snap: bool,
) {
    remove_non_boundary_edges(mesh, in_mesh, rule);
    let mut v = in_mesh.head;
    while v.is_valid() {
        while mesh[v].first_edge_below.is_valid() {
            let mut boundary = EdgeList::new();
            let start = mesh[v].first_edge_below;
            extract_boundary(mesh, &mut boundary, start, rule);
            simplify_boundary(mesh, &mut boundary, c);
            boundary_to_aa_mesh(mesh, &boundary, out_mesh, c, snap);
        }
        v = mesh[v].next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::point;
    use crate::mesh::Line;

    #[test]
    fn normal_flips_with_winding() {
        let mut mesh = Mesh::new();
        let top = mesh.alloc_vertex(point(0.0, 0.0), 255);
        let bottom = mesh.alloc_vertex(point(0.0, 10.0), 255);
        let e = mesh.alloc_edge(top, bottom, 1, EdgeKind::Inner);
        let n = edge_normal(&mesh, e);
        assert_eq!(n, Vector::new(10.0, 0.0));
        mesh[e].winding = -1;
        assert_eq!(edge_normal(&mesh, e), -n);
    }

    #[test]
    fn offset_lines_are_half_a_pixel_apart() {
        let line = Line::new(point(0.0, 0.0), point(0.0, 10.0));
        let offset = 0.5 * line.mag_sq().sqrt();
        let mut inner = line;
        inner.c -= offset;
        let mut outer = line;
        outer.c += offset;
        // The two offset lines sit half a pixel on either side of the edge.
        let p = point(0.0, 5.0);
        let scale = line.mag_sq().sqrt();
        assert!((inner.dist(p) / scale + 0.5).abs() < 1e-6);
        assert!((outer.dist(p) / scale - 0.5).abs() < 1e-6);
    }
}
