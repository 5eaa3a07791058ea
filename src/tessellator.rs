//! The public entry points and the driver that runs the pipeline stages in
//! order.

use crate::aa::extract_boundaries;
use crate::curve::{path_to_contours, worst_case_point_count};
use crate::math::Box2D;
use crate::mesh::{Mesh, PolyId, VertexList};
use crate::monotone::{count_points, polys_to_triangles, tessellate_mesh};
use crate::path::{FillRule, Path};
use crate::sweep::{build_edges, sanitize_contours, sort_and_simplify, Comparator};
use crate::vertex::{RawVertexWriter, VertexAllocator, VertexFormat, WindingSink, WindingVertex};
use crate::FillOptions;

use alloc::vec::Vec;

/// Upstream consumers index the output with 16 bits; anything that could
/// linearize to more vertices than that is rejected up front.
const MAX_WORST_CASE_VERTICES: u32 = u16::MAX as u32 + 1;

/// What `path_to_triangles` reports back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TessellationStats {
    /// Number of triangle vertices written to the allocator.
    pub vertex_count: usize,
    /// Whether the input path contained no curved segments.
    pub is_linear: bool,
}

impl TessellationStats {
    fn empty(is_linear: bool) -> Self {
        TessellationStats {
            vertex_count: 0,
            is_linear,
        }
    }
}

/// Runs stages 1 through 5 (and the antialiasing stages when requested),
/// leaving a list of monotone polygons in the mesh.
fn path_to_polys(
    mesh: &mut Mesh,
    path: &Path,
    options: &FillOptions,
    clip_bounds: &Box2D,
    antialias: bool,
) -> (PolyId, bool) {
    let c = Comparator::new(path.bounds());
    let snap = options.snapping.resolve(antialias);

    let (mut contours, is_linear) = path_to_contours(mesh, path, options.tolerance, clip_bounds);
    sanitize_contours(mesh, &mut contours, snap);
    let mut mesh_list = VertexList::new();
    build_edges(mesh, &contours, &c, &mut mesh_list);
    sort_and_simplify(mesh, &mut mesh_list, &c);

    let polys = if antialias {
        let mut aa_list = VertexList::new();
        extract_boundaries(mesh, &mesh_list, &mut aa_list, path.fill_rule(), &c, snap);
        sort_and_simplify(mesh, &mut aa_list, &c);
        tessellate_mesh(mesh, &aa_list)
    } else {
        tessellate_mesh(mesh, &mesh_list)
    };
    (polys, is_linear)
}

/// Tessellates a filled path into a triangle list written to `output`.
///
/// Every failure mode (no contours, a path too complex for 16-bit
/// indexing, nothing filled, an allocator refusal) degrades to zero
/// vertices written; nothing is reported beyond the count.
pub fn path_to_triangles(
    path: &Path,
    options: &FillOptions,
    clip_bounds: &Box2D,
    output: &mut dyn VertexAllocator,
) -> TessellationStats {
    let (max_points, contour_count) = worst_case_point_count(path, options.tolerance);
    if contour_count == 0 || max_points == 0 {
        return TessellationStats::empty(true);
    }
    if max_points > MAX_WORST_CASE_VERTICES {
        return TessellationStats::empty(true);
    }

    let mut mesh = Mesh::new();
    let (polys, is_linear) =
        path_to_polys(&mut mesh, path, options, clip_bounds, options.antialias);

    // The antialiased mesh encodes the fill in its own windings; it is
    // always emitted with the non-zero rule.
    let rule = if options.antialias {
        FillRule::NonZero
    } else {
        path.fill_rule()
    };
    let count = count_points(&mesh, polys, Some(rule), options.wireframe);
    if count == 0 {
        return TessellationStats::empty(is_linear);
    }

    let format = VertexFormat::select(options.antialias, options.tweak_alpha);
    debug_assert_eq!(output.stride(), format.stride());
    tess_log!(mesh, "emitting {} vertices", count);
    let actual = match output.lock(count) {
        Some(buf) => {
            let mut writer = RawVertexWriter::new(buf, format, options.color, options.wireframe);
            polys_to_triangles(&mut mesh, polys, Some(rule), &mut writer);
            writer.vertex_count()
        }
        None => {
            tess_log!(mesh, "could not allocate vertices");
            return TessellationStats::empty(is_linear);
        }
    };
    debug_assert!(actual <= count);
    output.unlock(actual);
    TessellationStats {
        vertex_count: actual,
        is_linear,
    }
}

/// Tessellates a path into `{position, winding}` triangle vertices.
///
/// Unlike [`path_to_triangles`] this does not apply the path's fill rule at
/// emission: every polygon is emitted with its winding number copied onto
/// its vertices, so the caller can re-fill the triangles under any rule.
pub fn path_to_vertices(path: &Path, tolerance: f32, clip_bounds: &Box2D) -> Vec<WindingVertex> {
    let (max_points, contour_count) = worst_case_point_count(path, tolerance);
    if contour_count == 0 || max_points == 0 || max_points > MAX_WORST_CASE_VERTICES {
        return Vec::new();
    }

    let mut mesh = Mesh::new();
    let options = FillOptions::tolerance(tolerance);
    let (polys, _is_linear) = path_to_polys(&mut mesh, path, &options, clip_bounds, false);

    let mut sink = WindingSink::default();
    polys_to_triangles(&mut mesh, polys, None, &mut sink);
    sink.vertices
}
