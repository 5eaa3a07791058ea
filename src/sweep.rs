//! Stages 2 to 4: edge construction, vertex sorting and mesh
//! simplification.
//!
//! Simplification is a Bentley-Ottmann style line sweep. Floating point
//! intersections are inexact, so the computed points may violate the mesh
//! topology or the left-to-right order of the active edge list; instead of
//! trusting the arithmetic, the sweep adjusts the topology to match the
//! computed points:
//!
//! * a shortened edge that is no longer ordered against its neighbours at a
//!   shared vertex is folded into the neighbour (`merge_collinear_edges`);
//! * an edge that now violates the active edge list order causes the
//!   neighbour to be split at the offending vertex (`cleanup_active_edges`);
//! * shortening can activate or deactivate an edge, which is repaired by
//!   `fix_active_state`.

use crate::math::{Box2D, Point};
use crate::mesh::{coincident, snap_quarter, EdgeId, EdgeKind, EdgeList, Mesh, VertexId, VertexList};

/// The total order on points that defines the sweep.
///
/// When the path is wider than tall the sweep runs along x, and the
/// secondary key is *descending* y. This keeps the orientation convention
/// intact (edges to the left of the sweep line advance, edges to the right
/// recede): the order is the vertical order rotated by 90 degrees rather
/// than transposed. Do not "fix" the asymmetry.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Comparator {
    horizontal: bool,
}

#[inline]
fn sweep_lt_horiz(a: Point, b: Point) -> bool {
    a.x < b.x || (a.x == b.x && a.y > b.y)
}

#[inline]
fn sweep_lt_vert(a: Point, b: Point) -> bool {
    a.y < b.y || (a.y == b.y && a.x < b.x)
}

impl Comparator {
    pub fn new(bounds: &Box2D) -> Self {
        Comparator {
            horizontal: bounds.width() > bounds.height(),
        }
    }

    #[inline]
    pub fn sweep_lt(&self, a: Point, b: Point) -> bool {
        if self.horizontal {
            sweep_lt_horiz(a, b)
        } else {
            sweep_lt_vert(a, b)
        }
    }
}

/// Allocates an edge between two adjacent contour vertices, oriented by the
/// sweep order.
pub(crate) fn new_edge(
    mesh: &mut Mesh,
    prev: VertexId,
    next: VertexId,
    kind: EdgeKind,
    c: &Comparator,
) -> EdgeId {
    let winding = if c.sweep_lt(mesh.point(prev), mesh.point(next)) {
        1
    } else {
        -1
    };
    let (top, bottom) = if winding < 0 { (next, prev) } else { (prev, next) };
    mesh.alloc_edge(top, bottom, winding, kind)
}

pub(crate) fn remove_edge(mesh: &mut Mesh, e: EdgeId, edges: &mut EdgeList) {
    tess_log!(mesh, "removing edge {} -> {}", mesh[e].top.0, mesh[e].bottom.0);
    if !edges.contains(mesh, e) {
        return;
    }
    edges.remove(mesh, e);
}

pub(crate) fn insert_edge(mesh: &mut Mesh, e: EdgeId, prev: EdgeId, edges: &mut EdgeList) {
    tess_log!(mesh, "inserting edge {} -> {}", mesh[e].top.0, mesh[e].bottom.0);
    if edges.contains(mesh, e) {
        return;
    }
    let next = if prev.is_valid() {
        mesh[prev].right
    } else {
        edges.head
    };
    edges.insert(mesh, e, prev, next);
}

/// The active edges immediately enclosing `v` on its left and right.
pub(crate) fn find_enclosing_edges(
    mesh: &Mesh,
    v: VertexId,
    edges: &EdgeList,
) -> (EdgeId, EdgeId) {
    if mesh[v].first_edge_above.is_valid() && mesh[v].last_edge_above.is_valid() {
        return (
            mesh[mesh[v].first_edge_above].left,
            mesh[mesh[v].last_edge_above].right,
        );
    }
    let p = mesh.point(v);
    let mut next = EdgeId::INVALID;
    let mut prev = edges.tail;
    while prev.is_valid() {
        if mesh.is_left_of(prev, p) {
            break;
        }
        next = prev;
        prev = mesh[prev].left;
    }
    (prev, next)
}

fn find_enclosing_edges_for_edge(
    mesh: &Mesh,
    edge: EdgeId,
    edges: &EdgeList,
    c: &Comparator,
) -> (EdgeId, EdgeId) {
    let top = mesh.top_point(edge);
    let bottom = mesh.bottom_point(edge);
    let mut prev = EdgeId::INVALID;
    let mut next = edges.head;
    while next.is_valid() {
        let next_top = mesh.top_point(next);
        let next_bottom = mesh.bottom_point(next);
        if (c.sweep_lt(next_top, top) && mesh.is_right_of(next, top))
            || (c.sweep_lt(top, next_top) && mesh.is_left_of(edge, next_top))
            || (c.sweep_lt(bottom, next_bottom) && mesh.is_right_of(next, bottom))
            || (c.sweep_lt(next_bottom, bottom) && mesh.is_left_of(edge, next_bottom))
        {
            break;
        }
        prev = next;
        next = mesh[next].right;
    }
    (prev, next)
}

/// An edge belongs in the active edge list exactly while its top vertex has
/// been processed and its bottom has not. Endpoint changes can break either
/// side of that; this reconciles the list.
fn fix_active_state(mesh: &mut Mesh, edge: EdgeId, active: Option<&mut EdgeList>, c: &Comparator) {
    let active = match active {
        Some(a) => a,
        None => return,
    };
    if active.contains(mesh, edge) {
        if mesh[mesh[edge].bottom].processed || !mesh[mesh[edge].top].processed {
            remove_edge(mesh, edge, active);
        }
    } else if mesh[mesh[edge].top].processed && !mesh[mesh[edge].bottom].processed {
        let (left, _right) = find_enclosing_edges_for_edge(mesh, edge, active, c);
        insert_edge(mesh, edge, left, active);
    }
}

/// Threads an edge into its bottom vertex's edges-above list, keeping the
/// list ordered left to right.
pub(crate) fn insert_edge_above(mesh: &mut Mesh, edge: EdgeId, v: VertexId, c: &Comparator) {
    let top = mesh.top_point(edge);
    let bottom = mesh.bottom_point(edge);
    if coincident(top, bottom) || c.sweep_lt(bottom, top) {
        return;
    }
    tess_log!(mesh, "insert edge {} -> {} above vertex {}", mesh[edge].top.0, mesh[edge].bottom.0, v.0);
    let mut prev = EdgeId::INVALID;
    let mut next = mesh[v].first_edge_above;
    while next.is_valid() {
        if mesh.is_right_of(next, top) {
            break;
        }
        prev = next;
        next = mesh[next].above_next;
    }
    mesh.above_list_insert(edge, prev, next, v);
}

/// Same as `insert_edge_above` for the top vertex's edges-below list.
pub(crate) fn insert_edge_below(mesh: &mut Mesh, edge: EdgeId, v: VertexId, c: &Comparator) {
    let top = mesh.top_point(edge);
    let bottom = mesh.bottom_point(edge);
    if coincident(top, bottom) || c.sweep_lt(bottom, top) {
        return;
    }
    tess_log!(mesh, "insert edge {} -> {} below vertex {}", mesh[edge].top.0, mesh[edge].bottom.0, v.0);
    let mut prev = EdgeId::INVALID;
    let mut next = mesh[v].first_edge_below;
    while next.is_valid() {
        if mesh.is_right_of(next, bottom) {
            break;
        }
        prev = next;
        next = mesh[next].below_next;
    }
    mesh.below_list_insert(edge, prev, next, v);
}

fn erase_edge(mesh: &mut Mesh, edge: EdgeId, active: Option<&mut EdgeList>) {
    tess_log!(mesh, "erasing edge {} -> {}", mesh[edge].top.0, mesh[edge].bottom.0);
    mesh.disconnect(edge);
    if let Some(active) = active {
        remove_edge(mesh, edge, active);
    }
}

pub(crate) fn set_top(
    mesh: &mut Mesh,
    edge: EdgeId,
    v: VertexId,
    mut active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    mesh.below_list_remove(edge);
    mesh[edge].top = v;
    mesh.recompute_line(edge);
    insert_edge_below(mesh, edge, v, c);
    fix_active_state(mesh, edge, active.as_deref_mut(), c);
    merge_collinear_edges(mesh, edge, active, c);
}

pub(crate) fn set_bottom(
    mesh: &mut Mesh,
    edge: EdgeId,
    v: VertexId,
    mut active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    mesh.above_list_remove(edge);
    mesh[edge].bottom = v;
    mesh.recompute_line(edge);
    insert_edge_above(mesh, edge, v, c);
    fix_active_state(mesh, edge, active.as_deref_mut(), c);
    merge_collinear_edges(mesh, edge, active, c);
}

fn merge_edges_above(
    mesh: &mut Mesh,
    edge: EdgeId,
    other: EdgeId,
    active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    let edge_top = mesh.top_point(edge);
    let other_top = mesh.top_point(other);
    if coincident(edge_top, other_top) {
        tess_log!(mesh, "merging coincident above edges at ({}, {})", edge_top.x, edge_top.y);
        let w = mesh[edge].winding;
        mesh[other].winding += w;
        erase_edge(mesh, edge, active);
    } else if c.sweep_lt(edge_top, other_top) {
        let w = mesh[edge].winding;
        mesh[other].winding += w;
        let top = mesh[other].top;
        set_bottom(mesh, edge, top, active, c);
    } else {
        let w = mesh[other].winding;
        mesh[edge].winding += w;
        let top = mesh[edge].top;
        set_bottom(mesh, other, top, active, c);
    }
}

fn merge_edges_below(
    mesh: &mut Mesh,
    edge: EdgeId,
    other: EdgeId,
    active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    let edge_bottom = mesh.bottom_point(edge);
    let other_bottom = mesh.bottom_point(other);
    if coincident(edge_bottom, other_bottom) {
        tess_log!(mesh, "merging coincident below edges at ({}, {})", edge_bottom.x, edge_bottom.y);
        let w = mesh[edge].winding;
        mesh[other].winding += w;
        erase_edge(mesh, edge, active);
    } else if c.sweep_lt(edge_bottom, other_bottom) {
        let w = mesh[other].winding;
        mesh[edge].winding += w;
        let bottom = mesh[edge].bottom;
        set_top(mesh, other, bottom, active, c);
    } else {
        let w = mesh[edge].winding;
        mesh[other].winding += w;
        let bottom = mesh[other].bottom;
        set_top(mesh, edge, bottom, active, c);
    }
}

/// Folds an edge into a neighbour in its shared vertex lists when the two
/// are no longer strictly ordered, accumulating the winding.
pub(crate) fn merge_collinear_edges(
    mesh: &mut Mesh,
    edge: EdgeId,
    mut active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    let above_prev = mesh[edge].above_prev;
    let above_next = mesh[edge].above_next;
    if above_prev.is_valid()
        && (mesh[edge].top == mesh[above_prev].top
            || !mesh.is_left_of(above_prev, mesh.top_point(edge)))
    {
        merge_edges_above(mesh, edge, above_prev, active.as_deref_mut(), c);
    } else if above_next.is_valid()
        && (mesh[edge].top == mesh[above_next].top
            || !mesh.is_left_of(edge, mesh.top_point(above_next)))
    {
        merge_edges_above(mesh, edge, above_next, active.as_deref_mut(), c);
    }
    // The merges above may have disconnected `edge`; its below links are
    // cleared in that case and the checks fall through.
    let below_prev = mesh[edge].below_prev;
    let below_next = mesh[edge].below_next;
    if below_prev.is_valid()
        && (mesh[edge].bottom == mesh[below_prev].bottom
            || !mesh.is_left_of(below_prev, mesh.bottom_point(edge)))
    {
        merge_edges_below(mesh, edge, below_prev, active, c);
    } else if below_next.is_valid()
        && (mesh[edge].bottom == mesh[below_next].bottom
            || !mesh.is_left_of(edge, mesh.bottom_point(below_next)))
    {
        merge_edges_below(mesh, edge, below_next, active, c);
    }
}

/// After an endpoint change, splits any active neighbour (or the edge
/// itself) that ended up on the wrong side of the other at an endpoint.
fn cleanup_active_edges(
    mesh: &mut Mesh,
    edge: EdgeId,
    mut active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    let top = mesh[edge].top;
    let bottom = mesh[edge].bottom;
    let top_pt = mesh.point(top);
    let bottom_pt = mesh.point(bottom);
    let left = mesh[edge].left;
    if left.is_valid() {
        let left_top = mesh[left].top;
        let left_bottom = mesh[left].bottom;
        let left_top_pt = mesh.point(left_top);
        let left_bottom_pt = mesh.point(left_bottom);
        if c.sweep_lt(left_top_pt, top_pt) && !mesh.is_left_of(left, top_pt) {
            split_edge(mesh, left, top, active.as_deref_mut(), c);
        } else if c.sweep_lt(top_pt, left_top_pt) && !mesh.is_right_of(edge, left_top_pt) {
            split_edge(mesh, edge, left_top, active.as_deref_mut(), c);
        } else if c.sweep_lt(bottom_pt, left_bottom_pt) && !mesh.is_left_of(left, bottom_pt) {
            split_edge(mesh, left, bottom, active.as_deref_mut(), c);
        } else if c.sweep_lt(left_bottom_pt, bottom_pt) && !mesh.is_right_of(edge, left_bottom_pt) {
            split_edge(mesh, edge, left_bottom, active.as_deref_mut(), c);
        }
    }
    let right = mesh[edge].right;
    if right.is_valid() {
        let right_top = mesh[right].top;
        let right_bottom = mesh[right].bottom;
        let right_top_pt = mesh.point(right_top);
        let right_bottom_pt = mesh.point(right_bottom);
        if c.sweep_lt(right_top_pt, top_pt) && !mesh.is_right_of(right, top_pt) {
            split_edge(mesh, right, top, active.as_deref_mut(), c);
        } else if c.sweep_lt(top_pt, right_top_pt) && !mesh.is_left_of(edge, right_top_pt) {
            split_edge(mesh, edge, right_top, active.as_deref_mut(), c);
        } else if c.sweep_lt(bottom_pt, right_bottom_pt) && !mesh.is_right_of(right, bottom_pt) {
            split_edge(mesh, right, bottom, active.as_deref_mut(), c);
        } else if c.sweep_lt(right_bottom_pt, bottom_pt) && !mesh.is_left_of(edge, right_bottom_pt)
        {
            split_edge(mesh, edge, right_bottom, active, c);
        }
    }
}

/// Splits an edge at vertex `v`, or moves an endpoint when `v` is outside
/// the edge's sweep span.
pub(crate) fn split_edge(
    mesh: &mut Mesh,
    edge: EdgeId,
    v: VertexId,
    mut active: Option<&mut EdgeList>,
    c: &Comparator,
) {
    tess_log!(
        mesh,
        "splitting edge {} -> {} at vertex {}",
        mesh[edge].top.0,
        mesh[edge].bottom.0,
        v.0
    );
    let v_pt = mesh.point(v);
    if c.sweep_lt(v_pt, mesh.top_point(edge)) {
        set_top(mesh, edge, v, active, c);
    } else if c.sweep_lt(mesh.bottom_point(edge), v_pt) {
        set_bottom(mesh, edge, v, active, c);
    } else {
        let bottom = mesh[edge].bottom;
        let winding = mesh[edge].winding;
        let kind = mesh[edge].kind;
        let new_edge = mesh.alloc_edge(v, bottom, winding, kind);
        insert_edge_below(mesh, new_edge, v, c);
        insert_edge_above(mesh, new_edge, bottom, c);
        set_bottom(mesh, edge, v, active.as_deref_mut(), c);
        cleanup_active_edges(mesh, edge, active.as_deref_mut(), c);
        fix_active_state(mesh, new_edge, active.as_deref_mut(), c);
        merge_collinear_edges(mesh, new_edge, active, c);
    }
}

/// Builds an edge between two vertices and threads it into their edge
/// lists. `winding_scale` adjusts the winding the antialiased mesh uses for
/// its inner (-2) and connector (0) edges.
pub(crate) fn connect(
    mesh: &mut Mesh,
    prev: VertexId,
    next: VertexId,
    kind: EdgeKind,
    c: &Comparator,
    winding_scale: i16,
) -> EdgeId {
    let edge = new_edge(mesh, prev, next, kind, c);
    let top = mesh[edge].top;
    let bottom = mesh[edge].bottom;
    insert_edge_below(mesh, edge, top, c);
    insert_edge_above(mesh, edge, bottom, c);
    mesh[edge].winding *= winding_scale;
    merge_collinear_edges(mesh, edge, None, c);
    edge
}

fn merge_vertices(
    mesh: &mut Mesh,
    src: VertexId,
    dst: VertexId,
    mesh_list: &mut VertexList,
    c: &Comparator,
) {
    tess_log!(
        mesh,
        "coincident verts at ({}, {}); merging {} into {}",
        mesh[src].point.x,
        mesh[src].point.y,
        src.0,
        dst.0
    );
    let alpha = mesh[src].alpha;
    if alpha > mesh[dst].alpha {
        mesh[dst].alpha = alpha;
    }
    let mut e = mesh[src].first_edge_above;
    while e.is_valid() {
        let next = mesh[e].above_next;
        set_bottom(mesh, e, dst, None, c);
        e = next;
    }
    let mut e = mesh[src].first_edge_below;
    while e.is_valid() {
        let next = mesh[e].below_next;
        set_top(mesh, e, dst, None, c);
        e = next;
    }
    mesh_list.remove(mesh, src);
}

fn max_edge_alpha(mesh: &Mesh, a: EdgeId, b: EdgeId) -> u8 {
    if mesh[a].kind == EdgeKind::Inner || mesh[b].kind == EdgeKind::Inner {
        255
    } else if mesh[a].kind == EdgeKind::Outer && mesh[b].kind == EdgeKind::Outer {
        0
    } else {
        let a_alpha = mesh[mesh[a].top].alpha.max(mesh[mesh[a].bottom].alpha);
        let b_alpha = mesh[mesh[b].top].alpha.max(mesh[mesh[b].bottom].alpha);
        a_alpha.max(b_alpha)
    }
}

/// Confirms an intersection between two edges and repairs the mesh around
/// it: the intersection point either lands on an existing endpoint (the
/// other edge is split there), or on an existing coincident vertex, or a
/// new vertex is inserted in sweep order and both edges are split at it.
fn check_for_intersection(
    mesh: &mut Mesh,
    edge: EdgeId,
    other: EdgeId,
    active: &mut EdgeList,
    c: &Comparator,
) -> Option<VertexId> {
    if !edge.is_valid() || !other.is_valid() {
        return None;
    }
    let (p, alpha) = mesh.edge_intersect(edge, other)?;
    tess_log!(mesh, "found intersection at ({}, {})", p.x, p.y);
    let edge_top = mesh[edge].top;
    let edge_bottom = mesh[edge].bottom;
    let other_top = mesh[other].top;
    let other_bottom = mesh[other].bottom;
    let v;
    if coincident(p, mesh.point(edge_top)) || c.sweep_lt(p, mesh.point(edge_top)) {
        split_edge(mesh, other, edge_top, Some(active), c);
        v = edge_top;
    } else if coincident(p, mesh.point(edge_bottom)) || c.sweep_lt(mesh.point(edge_bottom), p) {
        split_edge(mesh, other, edge_bottom, Some(active), c);
        v = edge_bottom;
    } else if coincident(p, mesh.point(other_top)) || c.sweep_lt(p, mesh.point(other_top)) {
        split_edge(mesh, edge, other_top, Some(active), c);
        v = other_top;
    } else if coincident(p, mesh.point(other_bottom)) || c.sweep_lt(mesh.point(other_bottom), p) {
        split_edge(mesh, edge, other_bottom, Some(active), c);
        v = other_bottom;
    } else {
        // Find the position of p in the sorted vertex list, walking from a
        // vertex known to be nearby.
        let mut next_v = edge_top;
        while mesh[next_v].prev.is_valid() && c.sweep_lt(p, mesh.point(next_v)) {
            next_v = mesh[next_v].prev;
        }
        while mesh[next_v].next.is_valid() && c.sweep_lt(mesh.point(next_v), p) {
            next_v = mesh[next_v].next;
        }
        let prev_v = mesh[next_v].prev;
        if prev_v.is_valid() && coincident(mesh.point(prev_v), p) {
            v = prev_v;
        } else if coincident(mesh.point(next_v), p) {
            v = next_v;
        } else {
            v = mesh.alloc_vertex(p, alpha);
            mesh[v].prev = prev_v;
            mesh[v].next = next_v;
            if prev_v.is_valid() {
                mesh[prev_v].next = v;
            }
            mesh[next_v].prev = v;
        }
        split_edge(mesh, edge, v, Some(&mut *active), c);
        split_edge(mesh, other, v, Some(active), c);
    }
    if alpha > mesh[v].alpha {
        mesh[v].alpha = alpha;
    }
    Some(v)
}

/// Removes zero-length segments from the contours (and rounds the points to
/// quarter pixels first when snapping). A contour that collapses entirely
/// has its head invalidated.
pub(crate) fn sanitize_contours(mesh: &mut Mesh, contours: &mut [VertexId], snap: bool) {
    for contour in contours.iter_mut() {
        let head = *contour;
        debug_assert!(head.is_valid());
        if snap {
            let prev = mesh[head].prev;
            let rounded = snap_quarter(mesh.point(prev));
            mesh[prev].point = rounded;
        }
        let mut v = head;
        loop {
            if snap {
                let rounded = snap_quarter(mesh.point(v));
                mesh[v].point = rounded;
            }
            let prev = mesh[v].prev;
            if coincident(mesh.point(prev), mesh.point(v)) {
                tess_log!(mesh, "vertex {} is coincident; removing", v.0);
                if prev == v {
                    *contour = VertexId::INVALID;
                    break;
                }
                let next = mesh[v].next;
                mesh[prev].next = next;
                mesh[next].prev = prev;
                if *contour == v {
                    *contour = prev;
                }
                v = prev;
            } else {
                v = mesh[v].next;
                if v == *contour {
                    break;
                }
            }
        }
    }
}

/// Stage 2: build an edge for every pair of adjacent contour vertices, then
/// re-link all vertices into one flat list (the mesh).
pub(crate) fn build_edges(
    mesh: &mut Mesh,
    contours: &[VertexId],
    c: &Comparator,
    mesh_list: &mut VertexList,
) {
    let mut prev = VertexId::INVALID;
    for &head in contours {
        if !head.is_valid() {
            continue;
        }
        let mut v = head;
        loop {
            let v_next = mesh[v].next;
            let v_prev = mesh[v].prev;
            connect(mesh, v_prev, v, EdgeKind::Inner, c, 1);
            if prev.is_valid() {
                mesh[prev].next = v;
                mesh[v].prev = prev;
            } else {
                mesh_list.head = v;
            }
            prev = v;
            v = v_next;
            if v == head {
                break;
            }
        }
    }
    if prev.is_valid() {
        mesh[prev].next = VertexId::INVALID;
        let head = mesh_list.head;
        mesh[head].prev = VertexId::INVALID;
    }
    mesh_list.tail = prev;
}

/// Stage 3: in-place merge sort of the linked vertex list in sweep order.
pub(crate) fn merge_sort(mesh: &mut Mesh, vertices: &mut VertexList, c: &Comparator) {
    let mut slow = vertices.head;
    if !slow.is_valid() {
        return;
    }
    let mut fast = mesh[slow].next;
    if !fast.is_valid() {
        return;
    }
    loop {
        fast = mesh[fast].next;
        if fast.is_valid() {
            fast = mesh[fast].next;
            slow = mesh[slow].next;
        }
        if !fast.is_valid() {
            break;
        }
    }
    let mut front = VertexList {
        head: vertices.head,
        tail: slow,
    };
    let mut back = VertexList {
        head: mesh[slow].next,
        tail: vertices.tail,
    };
    let back_head = back.head;
    mesh[front.tail].next = VertexId::INVALID;
    mesh[back_head].prev = VertexId::INVALID;

    merge_sort(mesh, &mut front, c);
    merge_sort(mesh, &mut back, c);

    *vertices = VertexList::new();
    let mut a = front.head;
    let mut b = back.head;
    while a.is_valid() && b.is_valid() {
        if c.sweep_lt(mesh.point(a), mesh.point(b)) {
            let next = mesh[a].next;
            vertices.append(mesh, a);
            a = next;
        } else {
            let next = mesh[b].next;
            vertices.append(mesh, b);
            b = next;
        }
    }
    // The leftover chain is already linked; splice it on whole.
    let leftover = if a.is_valid() { a } else { b };
    if leftover.is_valid() {
        let leftover_next = mesh[leftover].next;
        let tail = vertices.tail;
        vertices.insert(mesh, leftover, tail, leftover_next);
        if !leftover_next.is_valid() {
            vertices.tail = leftover;
        } else {
            // Walk to the real tail so the list stays consistent.
            let mut t = leftover_next;
            while mesh[t].next.is_valid() {
                t = mesh[t].next;
            }
            vertices.tail = t;
        }
    }
}

/// After sorting, collapse positionally coincident neighbours: a vertex
/// that compares before its predecessor is first snapped onto it, then the
/// predecessor's edges are retargeted onto the survivor and the predecessor
/// is dropped from the list.
pub(crate) fn merge_coincident_vertices(mesh: &mut Mesh, list: &mut VertexList, c: &Comparator) {
    let mut v = mesh[list.head].next;
    while v.is_valid() {
        let prev = mesh[v].prev;
        if c.sweep_lt(mesh.point(v), mesh.point(prev)) {
            let p = mesh.point(prev);
            mesh[v].point = p;
        }
        if coincident(mesh.point(prev), mesh.point(v)) {
            merge_vertices(mesh, prev, v, list, c);
        }
        v = mesh[v].next;
    }
}

/// Stage 4: sweep the sorted vertices, inserting a vertex at every edge
/// crossing until the planar subdivision is consistent.
#[cfg_attr(feature = "profiling", inline(never))]
pub(crate) fn simplify(mesh: &mut Mesh, list: &VertexList, c: &Comparator) {
    tess_log!(mesh, "simplifying complex polygons");
    let mut active = EdgeList::new();
    let mut v = list.head;
    while v.is_valid() {
        if !mesh[v].first_edge_above.is_valid() && !mesh[v].first_edge_below.is_valid() {
            v = mesh[v].next;
            continue;
        }
        // An intersection can rewind the walk to a newly inserted vertex;
        // anything already swept on the way back forward stays untouched.
        if mesh[v].processed {
            v = mesh[v].next;
            continue;
        }
        let mut left_enclosing;
        let mut right_enclosing;
        loop {
            let (left, right) = find_enclosing_edges(mesh, v, &active);
            left_enclosing = left;
            right_enclosing = right;
            let mut restart = false;
            if mesh[v].first_edge_below.is_valid() {
                let mut edge = mesh[v].first_edge_below;
                while edge.is_valid() {
                    if check_for_intersection(mesh, edge, left_enclosing, &mut active, c).is_some()
                    {
                        restart = true;
                        break;
                    }
                    if check_for_intersection(mesh, edge, right_enclosing, &mut active, c).is_some()
                    {
                        restart = true;
                        break;
                    }
                    edge = mesh[edge].below_next;
                }
            } else if let Some(pv) =
                check_for_intersection(mesh, left_enclosing, right_enclosing, &mut active, c)
            {
                if c.sweep_lt(mesh.point(pv), mesh.point(v)) {
                    v = pv;
                }
                restart = true;
            }
            if !restart {
                break;
            }
        }
        if mesh[v].alpha == 0
            && left_enclosing.is_valid()
            && mesh[left_enclosing].winding < 0
            && right_enclosing.is_valid()
            && mesh[right_enclosing].winding > 0
        {
            let alpha = max_edge_alpha(mesh, left_enclosing, right_enclosing);
            mesh[v].alpha = alpha;
        }
        let mut e = mesh[v].first_edge_above;
        while e.is_valid() {
            remove_edge(mesh, e, &mut active);
            e = mesh[e].above_next;
        }
        let mut left_edge = left_enclosing;
        let mut e = mesh[v].first_edge_below;
        while e.is_valid() {
            insert_edge(mesh, e, left_edge, &mut active);
            left_edge = e;
            e = mesh[e].below_next;
        }
        mesh[v].processed = true;
        v = mesh[v].next;
    }
}

/// Stages 3 and 4 back to back, shared by the plain and the antialiased
/// pipelines.
pub(crate) fn sort_and_simplify(mesh: &mut Mesh, list: &mut VertexList, c: &Comparator) {
    if !list.head.is_valid() {
        return;
    }
    merge_sort(mesh, list, c);
    merge_coincident_vertices(mesh, list, c);
    simplify(mesh, list, c);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::point;

    #[test]
    fn comparator_orientation() {
        let tall = Box2D {
            min: point(0.0, 0.0),
            max: point(1.0, 10.0),
        };
        let c = Comparator::new(&tall);
        assert!(c.sweep_lt(point(5.0, 1.0), point(0.0, 2.0)));
        // Same primary coordinate: x ascending.
        assert!(c.sweep_lt(point(1.0, 3.0), point(2.0, 3.0)));

        let wide = Box2D {
            min: point(0.0, 0.0),
            max: point(10.0, 1.0),
        };
        let c = Comparator::new(&wide);
        assert!(c.sweep_lt(point(1.0, 9.0), point(2.0, 0.0)));
        // Same primary coordinate: y *descending*.
        assert!(c.sweep_lt(point(3.0, 2.0), point(3.0, 1.0)));
    }

    #[test]
    fn sort_orders_vertices() {
        let mut mesh = Mesh::new();
        let c = Comparator::new(&Box2D {
            min: point(0.0, 0.0),
            max: point(1.0, 10.0),
        });
        let mut list = VertexList::new();
        for p in [
            point(0.0, 3.0),
            point(1.0, 1.0),
            point(0.5, 2.0),
            point(0.0, 0.5),
            point(0.25, 2.0),
        ] {
            let v = mesh.alloc_vertex(p, 255);
            list.append(&mut mesh, v);
        }
        merge_sort(&mut mesh, &mut list, &c);
        let mut v = list.head;
        let mut prev = point(f32::MIN, f32::MIN);
        let mut count = 0;
        while v.is_valid() {
            let p = mesh.point(v);
            assert!(!c.sweep_lt(p, prev));
            prev = p;
            count += 1;
            v = mesh[v].next;
        }
        assert_eq!(count, 5);
        assert_eq!(mesh.point(list.head), point(0.0, 0.5));
        assert_eq!(mesh.point(list.tail), point(0.0, 3.0));
    }
}
