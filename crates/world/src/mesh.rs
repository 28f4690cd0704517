use blake3::Hasher;
use glam::Vec3;

use crate::heightfield::HeightGrid;

/// Hash of the combined vertex/index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHash(pub [u8; 32]);

impl MeshHash {
    /// Lowercase hex form for logs and metric files.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Packed vertex layout produced by the terrain mesher.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    /// Position in chunk-local coordinates (chunk centre at the origin).
    pub position: [f32; 3],
    /// Smoothed vertex normal (unit length).
    pub normal: [f32; 3],
}

/// Displaced grid mesh for one chunk.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    /// Vertex buffer, row-major with rows along +z and columns along +x.
    pub vertices: Vec<MeshVertex>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
    /// Stable hash of the vertex + index buffers for cache comparisons.
    pub hash: MeshHash,
    verts_x: usize,
}

impl TerrainMesh {
    /// Build a displaced plane from `grid`.
    ///
    /// Vertex (`row`, `col`) sits at `(col * cell - w/2, h * height_scale, row * cell - d/2)`.
    /// Normals are computed from the displaced positions.
    pub fn from_heights(grid: &HeightGrid, cell_size: f32, height_scale: f32) -> Self {
        let verts_x = grid.width();
        let verts_z = grid.height();
        let half_w = verts_x.saturating_sub(1) as f32 * cell_size * 0.5;
        let half_d = verts_z.saturating_sub(1) as f32 * cell_size * 0.5;

        let mut positions = Vec::with_capacity(verts_x * verts_z);
        for row in 0..verts_z {
            for col in 0..verts_x {
                positions.push(Vec3::new(
                    col as f32 * cell_size - half_w,
                    grid.get(col, row) * height_scale,
                    row as f32 * cell_size - half_d,
                ));
            }
        }

        let indices = grid_indices(verts_x, verts_z);
        let normals = vertex_normals(&positions, &indices);

        let vertices: Vec<MeshVertex> = positions
            .iter()
            .zip(&normals)
            .map(|(p, n)| MeshVertex {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect();

        let hash = hash_buffers(&vertices, &indices);
        Self {
            vertices,
            indices,
            hash,
            verts_x,
        }
    }

    pub fn vertex(&self, col: usize, row: usize) -> &MeshVertex {
        &self.vertices[row * self.verts_x + col]
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Two triangles per grid cell, counter-clockwise seen from +y.
fn grid_indices(verts_x: usize, verts_z: usize) -> Vec<u32> {
    let cells_x = verts_x.saturating_sub(1);
    let cells_z = verts_z.saturating_sub(1);
    let mut indices = Vec::with_capacity(cells_x * cells_z * 6);
    for row in 0..cells_z {
        for col in 0..cells_x {
            let a = (row * verts_x + col) as u32;
            let b = ((row + 1) * verts_x + col) as u32;
            let c = ((row + 1) * verts_x + col + 1) as u32;
            let d = (row * verts_x + col + 1) as u32;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    indices
}

/// Area-weighted average of incident face normals.
fn vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let face = (positions[ib] - positions[ia]).cross(positions[ic] - positions[ia]);
        normals[ia] += face;
        normals[ib] += face;
        normals[ic] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

fn hash_buffers(vertices: &[MeshVertex], indices: &[u32]) -> MeshHash {
    let mut hasher = Hasher::new();
    hasher.update(bytemuck::cast_slice(vertices));
    hasher.update(bytemuck::cast_slice(indices));
    MeshHash(*hasher.finalize().as_bytes())
}
