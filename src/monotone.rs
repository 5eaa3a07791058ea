//! Stage 5: a second sweep over the simplified mesh that labels each edge
//! with the monotone polygons on its two sides, and stage 6: ear-clipping
//! the monotone polygons into triangles.
//!
//! The active edge list here is the same linked list the simplification
//! sweep used; lookups are O(n) but almost every insertion and removal is
//! O(1) because the neighbour in the list is known from the mesh topology.

use crate::mesh::{EdgeId, EdgeKind, EdgeList, Mesh, MonoId, PolyId, Side, VertexId, VertexList};
use crate::path::FillRule;
use crate::sweep::{find_enclosing_edges, insert_edge, remove_edge};
use crate::vertex::TriangleSink;

fn mono_add_edge(mesh: &mut Mesh, m: MonoId, edge: EdgeId) {
    let prev = mesh[m].last_edge;
    match mesh[m].side {
        Side::Right => {
            debug_assert!(!mesh[edge].used_in_right);
            mesh[edge].right_poly_prev = prev;
            mesh[edge].right_poly_next = EdgeId::INVALID;
            if prev.is_valid() {
                mesh[prev].right_poly_next = edge;
            } else {
                mesh[m].first_edge = edge;
            }
            mesh[edge].used_in_right = true;
        }
        Side::Left => {
            debug_assert!(!mesh[edge].used_in_left);
            mesh[edge].left_poly_prev = prev;
            mesh[edge].left_poly_next = EdgeId::INVALID;
            if prev.is_valid() {
                mesh[prev].left_poly_next = edge;
            } else {
                mesh[m].first_edge = edge;
            }
            mesh[edge].used_in_left = true;
        }
    }
    mesh[m].last_edge = edge;
}

fn poly_last_vertex(mesh: &Mesh, p: PolyId) -> VertexId {
    let tail = mesh[p].tail;
    if tail.is_valid() {
        mesh[mesh[tail].last_edge].bottom
    } else {
        mesh[p].first_vertex
    }
}

/// Adds an edge along one side of a polygon. Either starts the polygon's
/// first monotone piece, extends the current piece along the same side, or
/// forks: the fork bridges down to the new bottom vertex with a synthetic
/// inner edge and continues in a fresh monotone piece (or in the partner
/// polygon if a pending merge was recorded).
///
/// Returns the polygon that now carries the growing side.
fn poly_add_edge(mesh: &mut Mesh, poly: PolyId, edge: EdgeId, side: Side) -> PolyId {
    tess_log!(
        mesh,
        "add edge {} -> {} to poly {:?} ({:?} side)",
        mesh[edge].top.0,
        mesh[edge].bottom.0,
        poly.0,
        side
    );
    match side {
        Side::Right => {
            if mesh[edge].used_in_right {
                return poly;
            }
        }
        Side::Left => {
            if mesh[edge].used_in_left {
                return poly;
            }
        }
    }
    let partner = mesh[poly].partner;
    if partner.is_valid() {
        mesh[poly].partner = PolyId::INVALID;
        mesh[partner].partner = PolyId::INVALID;
    }
    let tail = mesh[poly].tail;
    if !tail.is_valid() {
        let m = mesh.alloc_mono(side);
        mono_add_edge(mesh, m, edge);
        mesh[poly].head = m;
        mesh[poly].tail = m;
        mesh[poly].count += 2;
        return poly;
    }
    let tail_last_bottom = mesh[mesh[tail].last_edge].bottom;
    if mesh[edge].bottom == tail_last_bottom {
        return poly;
    }
    if side == mesh[tail].side {
        mono_add_edge(mesh, tail, edge);
        mesh[poly].count += 1;
        return poly;
    }
    let join = mesh.alloc_edge(tail_last_bottom, mesh[edge].bottom, 1, EdgeKind::Inner);
    mono_add_edge(mesh, tail, join);
    mesh[poly].count += 1;
    if partner.is_valid() {
        poly_add_edge(mesh, partner, join, side);
        partner
    } else {
        let m = mesh.alloc_mono(side);
        mono_add_edge(mesh, m, join);
        mesh[m].prev = tail;
        mesh[tail].next = m;
        mesh[poly].tail = m;
        poly
    }
}

fn new_poly(mesh: &mut Mesh, head: &mut PolyId, v: VertexId, winding: i16) -> PolyId {
    let p = mesh.alloc_poly(v, winding);
    mesh[p].next = *head;
    *head = p;
    p
}

/// Stage 5. Returns the head of the polygon list.
#[cfg_attr(feature = "profiling", inline(never))]
pub(crate) fn tessellate_mesh(mesh: &mut Mesh, list: &VertexList) -> PolyId {
    tess_log!(mesh, "tessellating simple polygons");
    let mut active = EdgeList::new();
    let mut polys = PolyId::INVALID;
    let mut v = list.head;
    while v.is_valid() {
        if !mesh[v].first_edge_above.is_valid() && !mesh[v].first_edge_below.is_valid() {
            v = mesh[v].next;
            continue;
        }
        let (left_enclosing, right_enclosing) = find_enclosing_edges(mesh, v, &active);
        let mut left_poly;
        let mut right_poly;
        if mesh[v].first_edge_above.is_valid() {
            left_poly = mesh[mesh[v].first_edge_above].left_poly;
            right_poly = mesh[mesh[v].last_edge_above].right_poly;
        } else {
            left_poly = if left_enclosing.is_valid() {
                mesh[left_enclosing].right_poly
            } else {
                PolyId::INVALID
            };
            right_poly = if right_enclosing.is_valid() {
                mesh[right_enclosing].left_poly
            } else {
                PolyId::INVALID
            };
        }
        if mesh[v].first_edge_above.is_valid() {
            if left_poly.is_valid() {
                let first_above = mesh[v].first_edge_above;
                left_poly = poly_add_edge(mesh, left_poly, first_above, Side::Right);
            }
            if right_poly.is_valid() {
                let last_above = mesh[v].last_edge_above;
                right_poly = poly_add_edge(mesh, right_poly, last_above, Side::Left);
            }
            // Close off the polygons between the interior edges above.
            let mut e = mesh[v].first_edge_above;
            while e != mesh[v].last_edge_above {
                let right_edge = mesh[e].above_next;
                debug_assert!(mesh.is_right_of(right_edge, mesh.top_point(e)));
                remove_edge(mesh, e, &mut active);
                let e_right_poly = mesh[e].right_poly;
                if e_right_poly.is_valid() {
                    poly_add_edge(mesh, e_right_poly, e, Side::Left);
                }
                let right_left_poly = mesh[right_edge].left_poly;
                if right_left_poly.is_valid() && right_left_poly != e_right_poly {
                    poly_add_edge(mesh, right_left_poly, e, Side::Right);
                }
                e = right_edge;
            }
            let last_above = mesh[v].last_edge_above;
            remove_edge(mesh, last_above, &mut active);
            if !mesh[v].first_edge_below.is_valid()
                && left_poly.is_valid()
                && right_poly.is_valid()
                && left_poly != right_poly
            {
                // The two polygons meet at this vertex from above; they must
                // merge the next time the sweep reaches either of them.
                debug_assert!(!mesh[left_poly].partner.is_valid());
                debug_assert!(!mesh[right_poly].partner.is_valid());
                mesh[right_poly].partner = left_poly;
                mesh[left_poly].partner = right_poly;
            }
        }
        if mesh[v].first_edge_below.is_valid() {
            if !mesh[v].first_edge_above.is_valid() && left_poly.is_valid() && right_poly.is_valid()
            {
                // A split vertex: the enclosing polygon (or polygon pair)
                // continues on both sides of a bridge edge down to v.
                if left_poly == right_poly {
                    let tail = mesh[left_poly].tail;
                    if tail.is_valid() && mesh[tail].side == Side::Left {
                        let last = poly_last_vertex(mesh, left_poly);
                        let winding = mesh[left_poly].winding;
                        left_poly = new_poly(mesh, &mut polys, last, winding);
                        mesh[left_enclosing].right_poly = left_poly;
                    } else {
                        let last = poly_last_vertex(mesh, right_poly);
                        let winding = mesh[right_poly].winding;
                        right_poly = new_poly(mesh, &mut polys, last, winding);
                        mesh[right_enclosing].left_poly = right_poly;
                    }
                }
                let last = poly_last_vertex(mesh, left_poly);
                let join = mesh.alloc_edge(last, v, 1, EdgeKind::Inner);
                left_poly = poly_add_edge(mesh, left_poly, join, Side::Right);
                right_poly = poly_add_edge(mesh, right_poly, join, Side::Left);
            }
            let first_below = mesh[v].first_edge_below;
            mesh[first_below].left_poly = left_poly;
            insert_edge(mesh, first_below, left_enclosing, &mut active);
            let mut left_edge = first_below;
            let mut right_edge = mesh[first_below].below_next;
            while right_edge.is_valid() {
                insert_edge(mesh, right_edge, left_edge, &mut active);
                let mut winding = if mesh[left_edge].left_poly.is_valid() {
                    mesh[mesh[left_edge].left_poly].winding
                } else {
                    0
                };
                winding += mesh[left_edge].winding;
                if winding != 0 {
                    let poly = new_poly(mesh, &mut polys, v, winding);
                    mesh[left_edge].right_poly = poly;
                    mesh[right_edge].left_poly = poly;
                }
                left_edge = right_edge;
                right_edge = mesh[right_edge].below_next;
            }
            let last_below = mesh[v].last_edge_below;
            mesh[last_below].right_poly = right_poly;
        }
        v = mesh[v].next;
    }
    polys
}

/// Stage 6 for one monotone piece: build the vertex ring (bottoms append on
/// the right side, prepend on the left) and ear-clip it. A convex corner is
/// emitted and its apex removed; a collinear corner is removed without
/// emitting the degenerate triangle.
fn emit_mono(mesh: &mut Mesh, m: MonoId, sink: &mut dyn TriangleSink) {
    let side = mesh[m].side;
    let first_edge = mesh[m].first_edge;
    let mut ring = VertexList::new();
    let top = mesh[first_edge].top;
    ring.append(mesh, top);
    let mut e = first_edge;
    while e.is_valid() {
        let bottom = mesh[e].bottom;
        match side {
            Side::Right => {
                ring.append(mesh, bottom);
                e = mesh[e].right_poly_next;
            }
            Side::Left => {
                ring.prepend(mesh, bottom);
                e = mesh[e].left_poly_next;
            }
        }
    }
    let first = ring.head;
    let mut v = mesh[first].next;
    while v != ring.tail {
        debug_assert!(v.is_valid());
        let prev = mesh[v].prev;
        let next = mesh[v].next;
        let p0 = mesh.point(prev);
        let p1 = mesh.point(v);
        let p2 = mesh.point(next);
        let ax = p1.x as f64 - p0.x as f64;
        let ay = p1.y as f64 - p0.y as f64;
        let bx = p2.x as f64 - p1.x as f64;
        let by = p2.y as f64 - p1.y as f64;
        if ax * by - ay * bx >= 0.0 {
            if ax * by - ay * bx > 0.0 {
                sink.triangle(
                    (p0, mesh[prev].alpha),
                    (p1, mesh[v].alpha),
                    (p2, mesh[next].alpha),
                );
            }
            mesh[prev].next = next;
            mesh[next].prev = prev;
            v = if prev == first { next } else { prev };
        } else {
            v = next;
        }
    }
}

fn emit_poly(mesh: &mut Mesh, p: PolyId, sink: &mut dyn TriangleSink) {
    if mesh[p].count < 3 {
        return;
    }
    let mut m = mesh[p].head;
    while m.is_valid() {
        emit_mono(mesh, m, sink);
        m = mesh[m].next;
    }
}

/// Upper bound on the number of vertices emission will write. `rule` of
/// `None` keeps every polygon.
pub(crate) fn count_points(
    mesh: &Mesh,
    polys: PolyId,
    rule: Option<FillRule>,
    wireframe: bool,
) -> usize {
    let per_triangle = if wireframe { 6 } else { 3 };
    let mut count = 0;
    let mut p = polys;
    while p.is_valid() {
        let keep = match rule {
            Some(rule) => rule.is_in(mesh[p].winding),
            None => true,
        };
        if keep && mesh[p].count >= 3 {
            count += (mesh[p].count as usize - 2) * per_triangle;
        }
        p = mesh[p].next;
    }
    count
}

/// Stage 6: triangulate every polygon kept by the fill rule.
pub(crate) fn polys_to_triangles(
    mesh: &mut Mesh,
    polys: PolyId,
    rule: Option<FillRule>,
    sink: &mut dyn TriangleSink,
) {
    let mut p = polys;
    while p.is_valid() {
        let keep = match rule {
            Some(rule) => rule.is_in(mesh[p].winding),
            None => true,
        };
        if keep {
            sink.begin_poly(mesh[p].winding);
            emit_poly(mesh, p, sink);
        }
        p = mesh[p].next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{point, Point};
    use alloc::vec::Vec;

    struct CountingSink {
        triangles: Vec<[Point; 3]>,
    }

    impl TriangleSink for CountingSink {
        fn triangle(&mut self, a: (Point, u8), b: (Point, u8), c: (Point, u8)) {
            self.triangles.push([a.0, b.0, c.0]);
        }
    }

    fn chain(mesh: &mut Mesh, side: Side, points: &[Point]) -> MonoId {
        let m = mesh.alloc_mono(side);
        let mut top = mesh.alloc_vertex(points[0], 255);
        for p in &points[1..] {
            let bottom = mesh.alloc_vertex(*p, 255);
            let e = mesh.alloc_edge(top, bottom, 1, EdgeKind::Inner);
            mono_add_edge(mesh, m, e);
            top = bottom;
        }
        m
    }

    #[test]
    fn emit_right_side_chain() {
        let mut mesh = Mesh::new();
        let m = chain(
            &mut mesh,
            Side::Right,
            &[point(0.0, 0.0), point(5.0, 2.0), point(3.0, 10.0)],
        );
        let mut sink = CountingSink {
            triangles: Vec::new(),
        };
        emit_mono(&mut mesh, m, &mut sink);
        assert_eq!(sink.triangles.len(), 1);
    }

    #[test]
    fn emit_left_side_chain() {
        let mut mesh = Mesh::new();
        let m = chain(
            &mut mesh,
            Side::Left,
            &[point(0.0, 0.0), point(-5.0, 2.0), point(-3.0, 10.0)],
        );
        let mut sink = CountingSink {
            triangles: Vec::new(),
        };
        emit_mono(&mut mesh, m, &mut sink);
        assert_eq!(sink.triangles.len(), 1);
    }

    #[test]
    fn collinear_corner_is_dropped() {
        let mut mesh = Mesh::new();
        let m = chain(
            &mut mesh,
            Side::Right,
            &[
                point(0.0, 0.0),
                point(5.0, 0.0),
                point(10.0, 0.0),
                point(0.0, 10.0),
            ],
        );
        let mut sink = CountingSink {
            triangles: Vec::new(),
        };
        emit_mono(&mut mesh, m, &mut sink);
        // The midpoint of the collinear run contributes no triangle.
        assert_eq!(sink.triangles.len(), 1);
    }
}
