//! The output side of the tessellator: the caller-supplied vertex buffer
//! and the interleaved vertex encodings written into it.
//!
//! The tessellator produces raw triangle-list vertex data (no index
//! buffer): three vertices per triangle, written sequentially into a region
//! the caller hands out through [`VertexAllocator::lock`]. This keeps the
//! output compatible with directly-mapped GPU staging buffers; a growable
//! [`BufferVertexAllocator`] is provided for everything else.

use crate::math::Point;

use alloc::vec::Vec;

/// Layout of one output vertex.
///
/// Positions are two f32s. The color variant appends four color bytes with
/// the coverage pre-multiplied in; the coverage variant appends the
/// unmodified color and a separate coverage f32 for shaders that cannot
/// fold coverage into the color.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum VertexFormat {
    Position,
    PositionColor,
    PositionColorCoverage,
}

impl VertexFormat {
    /// Byte stride of one vertex.
    pub const fn stride(self) -> usize {
        match self {
            VertexFormat::Position => 8,
            VertexFormat::PositionColor => 12,
            VertexFormat::PositionColorCoverage => 16,
        }
    }

    /// The format the fill pipeline emits for a given configuration,
    /// matching what the shader side expects: plain positions without
    /// antialiasing, positions with coverage folded into the color when the
    /// paint allows it, and an explicit coverage channel otherwise.
    pub fn select(antialias: bool, tweak_alpha: bool) -> Self {
        if !antialias {
            VertexFormat::Position
        } else if tweak_alpha {
            VertexFormat::PositionColor
        } else {
            VertexFormat::PositionColorCoverage
        }
    }
}

/// The caller-owned output buffer.
///
/// `lock` reserves room for at most `vertex_count` vertices and returns the
/// writable bytes, or `None` to refuse (in which case the tessellation
/// returns zero triangles and writes nothing). `unlock` commits the number
/// of vertices actually written, which may be smaller. The tessellator
/// writes strictly sequentially and never reads the buffer back.
pub trait VertexAllocator {
    fn lock(&mut self, vertex_count: usize) -> Option<&mut [u8]>;
    fn unlock(&mut self, actual_count: usize);
    fn stride(&self) -> usize;
}

/// A `VertexAllocator` over a growable byte vector.
#[derive(Clone, Debug, Default)]
pub struct BufferVertexAllocator {
    bytes: Vec<u8>,
    stride: usize,
    count: usize,
}

impl BufferVertexAllocator {
    pub fn new(format: VertexFormat) -> Self {
        BufferVertexAllocator {
            bytes: Vec::new(),
            stride: format.stride(),
            count: 0,
        }
    }

    /// Number of committed vertices.
    pub fn vertex_count(&self) -> usize {
        self.count
    }

    /// The committed vertex data.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl VertexAllocator for BufferVertexAllocator {
    fn lock(&mut self, vertex_count: usize) -> Option<&mut [u8]> {
        self.bytes.clear();
        self.bytes.resize(vertex_count * self.stride, 0);
        Some(&mut self.bytes[..])
    }

    fn unlock(&mut self, actual_count: usize) {
        self.count = actual_count;
        self.bytes.truncate(actual_count * self.stride);
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

/// A `VertexAllocator` that discards everything. Useful for measuring.
#[derive(Clone, Debug, Default)]
pub struct NullAllocator {
    bytes: Vec<u8>,
    stride: usize,
}

impl NullAllocator {
    pub fn new(format: VertexFormat) -> Self {
        NullAllocator {
            bytes: Vec::new(),
            stride: format.stride(),
        }
    }
}

impl VertexAllocator for NullAllocator {
    fn lock(&mut self, vertex_count: usize) -> Option<&mut [u8]> {
        self.bytes.clear();
        self.bytes.resize(vertex_count * self.stride, 0);
        Some(&mut self.bytes[..])
    }

    fn unlock(&mut self, _actual_count: usize) {
        self.bytes.clear();
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

/// One triangle vertex of `path_to_vertices` output, carrying the winding
/// number of the polygon it came from so the caller can apply any fill rule
/// afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WindingVertex {
    pub position: Point,
    pub winding: i16,
}

/// Where the emission stage sends triangles.
pub(crate) trait TriangleSink {
    /// Called once per polygon before its triangles.
    fn begin_poly(&mut self, _winding: i16) {}
    fn triangle(&mut self, a: (Point, u8), b: (Point, u8), c: (Point, u8));
}

/// Multiplies the coverage into a premultiplied-alpha color.
pub(crate) fn premultiply_coverage(color: [u8; 4], alpha: u8) -> [u8; 4] {
    let scale = alpha as u32 + 1;
    let mul = |c: u8| ((c as u32 * scale) >> 8) as u8;
    [mul(color[0]), mul(color[1]), mul(color[2]), mul(color[3])]
}

/// Encodes triangles into a locked output region.
pub(crate) struct RawVertexWriter<'l> {
    buf: &'l mut [u8],
    cursor: usize,
    format: VertexFormat,
    color: [u8; 4],
    wireframe: bool,
}

impl<'l> RawVertexWriter<'l> {
    pub fn new(buf: &'l mut [u8], format: VertexFormat, color: [u8; 4], wireframe: bool) -> Self {
        RawVertexWriter {
            buf,
            cursor: 0,
            format,
            color,
            wireframe,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.cursor / self.format.stride()
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
    }

    fn vertex(&mut self, v: (Point, u8)) {
        let (p, alpha) = v;
        debug_assert!(self.cursor + self.format.stride() <= self.buf.len());
        if self.cursor + self.format.stride() > self.buf.len() {
            return;
        }
        self.put(bytemuck::bytes_of(&p.x));
        self.put(bytemuck::bytes_of(&p.y));
        match self.format {
            VertexFormat::Position => {}
            VertexFormat::PositionColor => {
                let color = premultiply_coverage(self.color, alpha);
                self.put(&color);
            }
            VertexFormat::PositionColorCoverage => {
                let color = self.color;
                self.put(&color);
                let coverage = alpha as f32 / 255.0;
                self.put(bytemuck::bytes_of(&coverage));
            }
        }
    }
}

impl TriangleSink for RawVertexWriter<'_> {
    fn triangle(&mut self, a: (Point, u8), b: (Point, u8), c: (Point, u8)) {
        if self.wireframe {
            // Three edges, six vertices.
            self.vertex(a);
            self.vertex(b);
            self.vertex(b);
            self.vertex(c);
            self.vertex(c);
            self.vertex(a);
        } else {
            self.vertex(a);
            self.vertex(b);
            self.vertex(c);
        }
    }
}

/// Collects `WindingVertex` records for `path_to_vertices`.
#[derive(Default)]
pub(crate) struct WindingSink {
    pub vertices: Vec<WindingVertex>,
    winding: i16,
}

impl TriangleSink for WindingSink {
    fn begin_poly(&mut self, winding: i16) {
        self.winding = winding;
    }

    fn triangle(&mut self, a: (Point, u8), b: (Point, u8), c: (Point, u8)) {
        for (position, _) in [a, b, c] {
            self.vertices.push(WindingVertex {
                position,
                winding: self.winding,
            });
        }
    }
}
