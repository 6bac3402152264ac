use super::backend::Primitive;

/// 48-byte vertex: position (12), normal (12), uv (8), color (16).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // color
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Indexed triangle-list geometry built up one primitive at a time.
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Append one primitive, converting fans and strips to a triangle list.
    /// Returns the number of triangles added.
    pub fn push(&mut self, primitive: Primitive, verts: &[Vertex]) -> usize {
        let base = self.vertices.len() as u32;
        let before = self.indices.len();
        let n = verts.len() as u32;
        if n >= 3 {
            match primitive {
                Primitive::Triangles => {
                    // trailing vertices that do not make a whole triangle are dropped
                    self.indices.extend(base..base + n - n % 3);
                }
                Primitive::TriangleFan => {
                    for i in 1..n - 1 {
                        self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
                    }
                }
                Primitive::TriangleStrip => {
                    // every other triangle is flipped to keep a consistent winding
                    for i in 0..n - 2 {
                        let (a, b) = if i % 2 == 0 { (i, i + 1) } else { (i + 1, i) };
                        self.indices.extend_from_slice(&[base + a, base + b, base + i + 2]);
                    }
                }
            }
            self.vertices.extend_from_slice(verts);
        }
        (self.indices.len() - before) / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verts(n: usize) -> Vec<Vertex> {
        (0..n)
            .map(|i| Vertex {
                position: [i as f32, 0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
                uv: [0.0, 0.0],
                color: [1.0; 4],
            })
            .collect()
    }

    #[test]
    fn vertex_is_48_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }

    #[test]
    fn fan_pivots_on_first_vertex() {
        let mut mesh = MeshBuilder::new();
        assert_eq!(mesh.push(Primitive::TriangleFan, &verts(5)), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn strip_alternates_winding() {
        let mut mesh = MeshBuilder::new();
        assert_eq!(mesh.push(Primitive::TriangleStrip, &verts(4)), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn indices_offset_by_existing_vertices() {
        let mut mesh = MeshBuilder::new();
        mesh.push(Primitive::Triangles, &verts(3));
        mesh.push(Primitive::TriangleFan, &verts(4));
        assert_eq!(mesh.vertices.len(), 7);
        assert_eq!(&mesh.indices[3..], &[3, 4, 5, 3, 5, 6]);
    }

    #[test]
    fn degenerate_primitives_add_nothing() {
        let mut mesh = MeshBuilder::new();
        assert_eq!(mesh.push(Primitive::TriangleStrip, &verts(2)), 0);
        assert_eq!(mesh.push(Primitive::Triangles, &verts(0)), 0);
        assert!(mesh.is_empty());
        assert!(mesh.vertices.is_empty());
        assert_eq!(mesh.push(Primitive::Triangles, &verts(7)), 2);
    }
}
