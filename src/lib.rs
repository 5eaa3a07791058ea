#![deny(bare_trait_objects)]
#![deny(unconditional_recursion)]
#![allow(clippy::float_cmp)]
#![allow(clippy::too_many_arguments)]
#![allow(dead_code)]
#![no_std]

//! Tessellation of filled 2D vector paths into triangle meshes for GPU
//! rasterization.
//!
//! ## Overview
//!
//! [`path_to_triangles`] converts a [`Path`] (closed contours of line,
//! quadratic, conic and cubic segments plus a fill rule) into a triangle
//! list written directly into a caller-supplied vertex buffer. The work is
//! a single pass of six stages:
//!
//! 1. curves are flattened into per-contour vertex chains to a caller
//!    supplied tolerance;
//! 2. edges are built between adjacent vertices;
//! 3. the vertices are merge-sorted in sweep order (the sweep axis is
//!    chosen from the path's aspect ratio) and coincident points fused;
//! 4. a line sweep inserts a vertex at every edge crossing, repairing the
//!    topology wherever floating-point intersections disagree with the
//!    combinatorics, until the planar subdivision is consistent;
//! 5. a second sweep decomposes the subdivision into monotone polygons
//!    with winding numbers;
//! 6. the monotone polygons kept by the fill rule are ear-clipped straight
//!    into the output buffer.
//!
//! With antialiasing enabled, the fill boundary is extracted after stage 4,
//! extruded by half a pixel on each side into a quad mesh carrying
//! per-vertex coverage, and that mesh is sent through stages 3 to 6 again.
//!
//! [`path_to_vertices`] is a second entry point that skips the fill rule at
//! emission and returns `{position, winding}` records instead, so the
//! caller can re-fill the triangles under arbitrary rules.
//!
//! All scratch data lives in one arena whose lifetime is the call; the
//! tessellator keeps no state between calls and never touches threads.
//!
//! ## Example
//!
//! ```
//! use trifill::math::{point, Box2D};
//! use trifill::{
//!     path_to_triangles, BufferVertexAllocator, FillOptions, FillRule, Path, VertexFormat,
//! };
//!
//! let mut builder = Path::builder().with_fill_rule(FillRule::NonZero);
//! builder.begin(point(0.0, 0.0));
//! builder.line_to(point(10.0, 0.0));
//! builder.line_to(point(10.0, 10.0));
//! builder.line_to(point(0.0, 10.0));
//! builder.close();
//! let path = builder.build();
//!
//! let clip = Box2D {
//!     min: point(0.0, 0.0),
//!     max: point(100.0, 100.0),
//! };
//! let mut buffers = BufferVertexAllocator::new(VertexFormat::Position);
//! let stats = path_to_triangles(&path, &FillOptions::default(), &clip, &mut buffers);
//!
//! assert_eq!(stats.vertex_count, 6); // two triangles
//! assert!(stats.is_linear);
//! ```

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(feature = "serialization")]
#[macro_use]
pub extern crate serde;

#[cfg(all(debug_assertions, feature = "std"))]
macro_rules! tess_log {
    ($obj:ident, $fmt:expr) => (
        if $obj.log {
            std::println!($fmt);
        }
    );
    ($obj:ident, $fmt:expr, $($arg:tt)*) => (
        if $obj.log {
            std::println!($fmt, $($arg)*);
        }
    );
}

#[cfg(not(all(debug_assertions, feature = "std")))]
macro_rules! tess_log {
    ($obj:ident, $fmt:expr) => {};
    ($obj:ident, $fmt:expr, $($arg:tt)*) => {};
}

mod aa;
mod curve;
pub mod math;
mod mesh;
mod monotone;
pub mod path;
mod sweep;
mod tessellator;
pub mod vertex;

#[cfg(test)]
mod tess_tests;

pub use crate::path::{FillRule, Path, PathEvent};
pub use crate::tessellator::{path_to_triangles, path_to_vertices, TessellationStats};
pub use crate::vertex::{
    BufferVertexAllocator, NullAllocator, VertexAllocator, VertexFormat, WindingVertex,
};

/// Controls quarter-pixel snapping of contour points and offset
/// intersections.
///
/// Historically snapping is applied in the antialiased pipeline only; the
/// non-antialiased path leaves intersections unsnapped. `Auto` preserves
/// that behaviour.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Snapping {
    /// Snap only when antialiasing.
    Auto,
    Always,
    Never,
}

impl Snapping {
    pub(crate) fn resolve(self, antialias: bool) -> bool {
        match self {
            Snapping::Auto => antialias,
            Snapping::Always => true,
            Snapping::Never => false,
        }
    }
}

/// Parameters for the fill tessellator.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub struct FillOptions {
    /// Maximum distance between a curve and its flattened approximation,
    /// in pixels.
    ///
    /// Default value: `FillOptions::DEFAULT_TOLERANCE`.
    pub tolerance: f32,

    /// Build the half-pixel antialiasing band around the fill boundary and
    /// emit per-vertex coverage.
    ///
    /// Default value: `false`.
    pub antialias: bool,

    /// RGBA color written with the color-carrying vertex formats.
    ///
    /// Default value: opaque white.
    pub color: [u8; 4],

    /// Whether coverage may be folded into the color (premultiplied)
    /// instead of occupying its own vertex channel. Only meaningful with
    /// `antialias`.
    ///
    /// Default value: `false`.
    pub tweak_alpha: bool,

    /// Emit the three edges of every triangle as six vertices instead of
    /// the filled triangle.
    ///
    /// Default value: `false`.
    pub wireframe: bool,

    /// See [`Snapping`].
    ///
    /// Default value: `Snapping::Auto`.
    pub snapping: Snapping,
}

impl FillOptions {
    /// Default flattening tolerance: a quarter of a pixel.
    pub const DEFAULT_TOLERANCE: f32 = 0.25;

    pub const DEFAULT: Self = FillOptions {
        tolerance: Self::DEFAULT_TOLERANCE,
        antialias: false,
        color: [255, 255, 255, 255],
        tweak_alpha: false,
        wireframe: false,
        snapping: Snapping::Auto,
    };

    #[inline]
    pub fn tolerance(tolerance: f32) -> Self {
        Self::DEFAULT.with_tolerance(tolerance)
    }

    #[inline]
    pub const fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[inline]
    pub const fn with_antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }

    #[inline]
    pub const fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    #[inline]
    pub const fn with_tweak_alpha(mut self, tweak_alpha: bool) -> Self {
        self.tweak_alpha = tweak_alpha;
        self
    }

    #[inline]
    pub const fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    #[inline]
    pub const fn with_snapping(mut self, snapping: Snapping) -> Self {
        self.snapping = snapping;
        self
    }
}

impl Default for FillOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[test]
fn default_options() {
    let options = FillOptions::default();
    assert_eq!(options.tolerance, 0.25);
    assert!(!options.antialias);
    assert_eq!(options.snapping, Snapping::Auto);
}

#[test]
fn option_builders() {
    let options = FillOptions::tolerance(0.1)
        .with_antialias(true)
        .with_snapping(Snapping::Never);
    assert_eq!(options.tolerance, 0.1);
    assert!(options.antialias);
    assert!(!options.snapping.resolve(true));
    assert!(Snapping::Auto.resolve(true));
    assert!(!Snapping::Auto.resolve(false));
    assert!(Snapping::Always.resolve(false));
}
