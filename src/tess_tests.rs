use crate::math::{point, Box2D, Point};
use crate::path::{FillRule, Path};
use crate::vertex::{BufferVertexAllocator, VertexAllocator, VertexFormat};
use crate::{path_to_triangles, path_to_vertices, FillOptions};

use alloc::vec::Vec;
use core::f32::consts::{FRAC_1_SQRT_2, PI};

fn clip() -> Box2D {
    Box2D {
        min: point(-100.0, -100.0),
        max: point(100.0, 100.0),
    }
}

fn square(rule: FillRule) -> Path {
    let mut builder = Path::builder().with_fill_rule(rule);
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.line_to(point(0.0, 10.0));
    builder.close();
    builder.build()
}

/// One conic per quadrant; exact unit circle around (5, 5).
fn circle(rule: FillRule) -> Path {
    let w = FRAC_1_SQRT_2;
    let mut builder = Path::builder().with_fill_rule(rule);
    builder.begin(point(6.0, 5.0));
    builder.conic_to(point(6.0, 6.0), point(5.0, 6.0), w);
    builder.conic_to(point(4.0, 6.0), point(4.0, 5.0), w);
    builder.conic_to(point(4.0, 4.0), point(5.0, 4.0), w);
    builder.conic_to(point(6.0, 4.0), point(6.0, 5.0), w);
    builder.close();
    builder.build()
}

/// Decoded output vertex: position and coverage (1.0 when the format has
/// no coverage information).
fn tessellate(path: &Path, options: &FillOptions) -> Vec<(Point, f32)> {
    let format = VertexFormat::select(options.antialias, options.tweak_alpha);
    let mut buffers = BufferVertexAllocator::new(format);
    let stats = path_to_triangles(path, options, &clip(), &mut buffers);
    let stride = format.stride();
    let mut vertices = Vec::new();
    for chunk in buffers.bytes().chunks_exact(stride) {
        let x = f32::from_ne_bytes(chunk[0..4].try_into().unwrap());
        let y = f32::from_ne_bytes(chunk[4..8].try_into().unwrap());
        let coverage = match format {
            VertexFormat::Position => 1.0,
            // The tests use an opaque white color, so the premultiplied
            // alpha byte is the coverage.
            VertexFormat::PositionColor => chunk[11] as f32 / 255.0,
            VertexFormat::PositionColorCoverage => {
                f32::from_ne_bytes(chunk[12..16].try_into().unwrap())
            }
        };
        vertices.push((point(x, y), coverage));
    }
    assert_eq!(vertices.len(), stats.vertex_count);
    assert_eq!(vertices.len() % 3, 0);
    vertices
}

fn triangle_area(a: Point, b: Point, c: Point) -> f32 {
    ((b - a).cross(c - a) * 0.5).abs()
}

fn total_area(vertices: &[(Point, f32)]) -> f32 {
    vertices
        .chunks_exact(3)
        .map(|t| triangle_area(t[0].0, t[1].0, t[2].0))
        .sum()
}

/// Integral of the linearly interpolated coverage over the mesh.
fn covered_area(vertices: &[(Point, f32)]) -> f32 {
    vertices
        .chunks_exact(3)
        .map(|t| {
            let area = triangle_area(t[0].0, t[1].0, t[2].0);
            area * (t[0].1 + t[1].1 + t[2].1) / 3.0
        })
        .sum()
}

fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected ~{}, got {}",
        expected,
        actual
    );
}

#[test]
fn fill_square_non_zero() {
    let vertices = tessellate(&square(FillRule::NonZero), &FillOptions::default());
    assert_eq!(vertices.len(), 6);
    assert_approx(total_area(&vertices), 100.0, 1e-3);
}

#[test]
fn fill_square_even_odd() {
    let vertices = tessellate(&square(FillRule::EvenOdd), &FillOptions::default());
    assert_eq!(vertices.len(), 6);
    assert_approx(total_area(&vertices), 100.0, 1e-3);
}

#[test]
fn fill_square_with_reverse_wound_hole() {
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.line_to(point(0.0, 10.0));
    builder.close();
    // Inner square, opposite winding.
    builder.begin(point(2.0, 2.0));
    builder.line_to(point(2.0, 8.0));
    builder.line_to(point(8.0, 8.0));
    builder.line_to(point(8.0, 2.0));
    builder.close();
    let path = builder.build();

    let vertices = tessellate(&path, &FillOptions::default());
    assert_eq!(vertices.len(), 8 * 3);
    assert_approx(total_area(&vertices), 64.0, 1e-3);
}

#[test]
fn self_intersecting_hourglass() {
    // One contour crossing itself at (5, 5): two triangles of opposite
    // winding.
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(0.0, 10.0));
    builder.line_to(point(10.0, 10.0));
    builder.close();
    let path = builder.build();

    let vertices = path_to_vertices(&path, 0.25, &clip());
    assert_eq!(vertices.len(), 6);

    let crossing = point(5.0, 5.0);
    let first = &vertices[0..3];
    let second = &vertices[3..6];
    assert!(first.iter().any(|v| v.position == crossing));
    assert!(second.iter().any(|v| v.position == crossing));
    // Opposite windings on the two lobes.
    assert!(first[0].winding != 0 && second[0].winding != 0);
    assert!(first[0].winding == -second[0].winding);

    let area: f32 = vertices
        .chunks_exact(3)
        .map(|t| triangle_area(t[0].position, t[1].position, t[2].position))
        .sum();
    assert_approx(area, 50.0, 1e-3);
}

#[test]
fn figure_8_even_odd_overlap_is_a_hole() {
    // Two overlapping triangles crossing at (5, 5).
    let triangles = [
        [point(0.0, 0.0), point(10.0, 0.0), point(10.0, 10.0)],
        [point(0.0, 0.0), point(10.0, 0.0), point(0.0, 10.0)],
    ];
    for rule in [FillRule::EvenOdd, FillRule::NonZero] {
        let mut builder = Path::builder().with_fill_rule(rule);
        for t in &triangles {
            builder.begin(t[0]);
            builder.line_to(t[1]);
            builder.line_to(t[2]);
            builder.close();
        }
        let vertices = tessellate(&builder.build(), &FillOptions::default());
        let expected = match rule {
            // The doubly covered lobe is a hole: 50 + 50 - 2 * 25.
            FillRule::EvenOdd => 50.0,
            // The union: 50 + 50 - 25.
            _ => 75.0,
        };
        assert_approx(total_area(&vertices), expected, 1e-3);
    }
}

#[test]
fn collinear_midpoint_is_collapsed() {
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(5.0, 0.0));
    builder.line_to(point(10.0, 0.0));
    builder.line_to(point(10.0, 10.0));
    builder.line_to(point(0.0, 10.0));
    builder.close();
    let path = builder.build();

    let vertices = tessellate(&path, &FillOptions::default());
    assert_eq!(vertices.len(), 6);
    assert_approx(total_area(&vertices), 100.0, 1e-3);
}

#[test]
fn empty_and_degenerate_paths() {
    let empty = Path::builder().build();
    assert!(tessellate(&empty, &FillOptions::default()).is_empty());

    let mut builder = Path::builder();
    builder.begin(point(1.0, 1.0));
    builder.end(false);
    let single_point = builder.build();
    assert!(tessellate(&single_point, &FillOptions::default()).is_empty());

    let mut builder = Path::builder();
    builder.begin(point(1.0, 1.0));
    builder.line_to(point(9.0, 3.0));
    builder.close();
    let single_segment = builder.build();
    assert!(tessellate(&single_segment, &FillOptions::default()).is_empty());
}

#[test]
fn too_complex_paths_are_rejected() {
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    builder.begin(point(0.0, 0.0));
    for i in 0..70_000u32 {
        builder.line_to(point((i % 100) as f32, (i / 100) as f32));
    }
    builder.close();
    let path = builder.build();

    let stats = path_to_triangles(
        &path,
        &FillOptions::default(),
        &clip(),
        &mut BufferVertexAllocator::new(VertexFormat::Position),
    );
    assert_eq!(stats.vertex_count, 0);
    assert!(path_to_vertices(&path, 0.25, &clip()).is_empty());
}

#[test]
fn convex_polygon_triangle_count_and_area() {
    let n = 8;
    let radius = 10.0f32;
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    for i in 0..n {
        let angle = i as f32 * 2.0 * PI / n as f32;
        let p = point(radius * angle.cos(), radius * angle.sin());
        if i == 0 {
            builder.begin(p);
        } else {
            builder.line_to(p);
        }
    }
    builder.close();
    let path = builder.build();

    let vertices = tessellate(&path, &FillOptions::default());
    assert_eq!(vertices.len(), (n - 2) * 3);
    // Regular octagon with circumradius r: 2 * sqrt(2) * r^2.
    let expected = 2.0 * 2.0f32.sqrt() * radius * radius;
    assert_approx(total_area(&vertices), expected, 0.05);
}

#[test]
fn retessellating_the_output_preserves_the_fill() {
    let vertices = tessellate(&square(FillRule::NonZero), &FillOptions::default());
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    for t in vertices.chunks_exact(3) {
        builder.begin(t[0].0);
        builder.line_to(t[1].0);
        builder.line_to(t[2].0);
        builder.close();
    }
    let rebuilt = tessellate(&builder.build(), &FillOptions::default());
    assert_approx(total_area(&rebuilt), 100.0, 1e-2);
}

#[test]
fn inverse_fill_covers_the_clip_complement() {
    let vertices = tessellate(&square(FillRule::InverseNonZero), &FillOptions::default());
    // The clip is 200x200; the square punches a 10x10 hole in it.
    assert_approx(total_area(&vertices), 200.0 * 200.0 - 100.0, 1e-2);
}

#[test]
fn winding_vertices_for_a_square() {
    let vertices = path_to_vertices(&square(FillRule::NonZero), 0.25, &clip());
    assert_eq!(vertices.len(), 6);
    let winding = vertices[0].winding;
    assert!(winding != 0);
    assert!(vertices.iter().all(|v| v.winding == winding));
}

#[test]
fn antialiased_square_band() {
    let options = FillOptions::default().with_antialias(true);
    let vertices = tessellate(&square(FillRule::NonZero), &options);
    assert!(!vertices.is_empty());

    let mut min = point(f32::MAX, f32::MAX);
    let mut max = point(f32::MIN, f32::MIN);
    let mut interior_min = point(f32::MAX, f32::MAX);
    let mut interior_max = point(f32::MIN, f32::MIN);
    for &(p, coverage) in &vertices {
        assert!((0.0..=1.0).contains(&coverage));
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        if coverage == 1.0 {
            interior_min.x = interior_min.x.min(p.x);
            interior_min.y = interior_min.y.min(p.y);
            interior_max.x = interior_max.x.max(p.x);
            interior_max.y = interior_max.y.max(p.y);
        }
    }
    // The boundary is extruded half a pixel on each side: the band is one
    // pixel wide, measured perpendicularly across any edge.
    assert_approx(min.x, -0.5, 1e-3);
    assert_approx(min.y, -0.5, 1e-3);
    assert_approx(max.x, 10.5, 1e-3);
    assert_approx(max.y, 10.5, 1e-3);
    assert_approx(interior_min.x, 0.5, 1e-3);
    assert_approx(interior_min.y, 0.5, 1e-3);
    assert_approx(interior_max.x, 9.5, 1e-3);
    assert_approx(interior_max.y, 9.5, 1e-3);

    // The coverage-weighted area converges on the true fill area.
    assert_approx(covered_area(&vertices), 100.0, 1.0);
}

#[test]
fn antialiased_square_with_tweaked_alpha() {
    let options = FillOptions::default()
        .with_antialias(true)
        .with_tweak_alpha(true);
    let vertices = tessellate(&square(FillRule::NonZero), &options);
    assert!(!vertices.is_empty());
    assert!(vertices.iter().any(|&(_, c)| c == 1.0));
    assert!(vertices.iter().any(|&(_, c)| c == 0.0));
}

#[test]
fn antialiased_circle_coverage_area() {
    let options = FillOptions::tolerance(0.25).with_antialias(true);
    let vertices = tessellate(&circle(FillRule::NonZero), &options);
    assert!(!vertices.is_empty());
    let covered = covered_area(&vertices);
    assert!(
        covered >= PI - 0.5 && covered <= PI + 0.5,
        "covered area {} out of range",
        covered
    );
}

#[test]
fn non_antialiased_circle_area() {
    let vertices = tessellate(&circle(FillRule::NonZero), &FillOptions::tolerance(0.01));
    // A fine flattening should get close to the true area.
    assert_approx(total_area(&vertices), PI, 0.1);
}

#[test]
fn wireframe_emits_edges() {
    let options = FillOptions::default().with_wireframe(true);
    let format = VertexFormat::select(false, false);
    let mut buffers = BufferVertexAllocator::new(format);
    let stats = path_to_triangles(
        &square(FillRule::NonZero),
        &options,
        &clip(),
        &mut buffers,
    );
    // Two triangles, six vertices each.
    assert_eq!(stats.vertex_count, 12);
}

/// An allocator that refuses to lock.
struct RefusingAllocator;

impl VertexAllocator for RefusingAllocator {
    fn lock(&mut self, _vertex_count: usize) -> Option<&mut [u8]> {
        None
    }

    fn unlock(&mut self, actual_count: usize) {
        assert_eq!(actual_count, 0, "unlock must not be called after a refusal");
    }

    fn stride(&self) -> usize {
        VertexFormat::Position.stride()
    }
}

#[test]
fn allocator_refusal_degrades_to_empty() {
    let stats = path_to_triangles(
        &square(FillRule::NonZero),
        &FillOptions::default(),
        &clip(),
        &mut RefusingAllocator,
    );
    assert_eq!(stats.vertex_count, 0);
    assert!(stats.is_linear);
}

#[test]
fn is_linear_reflects_curves() {
    let stats = path_to_triangles(
        &square(FillRule::NonZero),
        &FillOptions::default(),
        &clip(),
        &mut BufferVertexAllocator::new(VertexFormat::Position),
    );
    assert!(stats.is_linear);

    let stats = path_to_triangles(
        &circle(FillRule::NonZero),
        &FillOptions::default(),
        &clip(),
        &mut BufferVertexAllocator::new(VertexFormat::Position),
    );
    assert!(!stats.is_linear);
}

#[test]
fn wide_paths_sweep_horizontally() {
    // A 100x2 sliver exercises the horizontal comparator.
    let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
    builder.begin(point(0.0, 0.0));
    builder.line_to(point(100.0, 0.0));
    builder.line_to(point(100.0, 2.0));
    builder.line_to(point(0.0, 2.0));
    builder.close();
    let vertices = tessellate(&builder.build(), &FillOptions::default());
    assert_eq!(vertices.len(), 6);
    assert_approx(total_area(&vertices), 200.0, 1e-3);
}
