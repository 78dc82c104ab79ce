/// Which material group a range of triangles belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmeshKind {
    Facade,
    Roof,
    /// Reversed base caps, filled with a solid colour rather than sampled.
    Underside,
}

/// A contiguous range of `IndexedMesh::indices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshGroup {
    pub kind: SubmeshKind,
    /// First index (not triangle) of the group.
    pub start: usize,
    /// Number of indices in the group.
    pub count: usize,
}

/// The output geometry container.
///
/// All buffers are contiguous `Vec<f32>` / `Vec<u32>` for zero-copy interop
/// with meshoptimizer and glTF writers.
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved UVs: [u, v, u, v, ...], atlas space with v = 0 at the ground side
    pub uvs: Vec<f32>,
    /// Triangle indices into the vertex buffers
    pub indices: Vec<u32>,
    /// Index ranges per material group, in emission order
    pub groups: Vec<SubmeshGroup>,
}

impl IndexedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether UV coordinates are present.
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Whether the mesh contains no geometry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append vertices and triangles to the group of `kind`.
    ///
    /// `indices` are local to `positions`; they are offset by the current
    /// vertex count. Consecutive appends of the same kind extend one group.
    pub fn append(
        &mut self,
        kind: SubmeshKind,
        positions: &[[f32; 3]],
        uvs: &[[f32; 2]],
        indices: &[u32],
    ) {
        debug_assert_eq!(positions.len(), uvs.len());
        let base = self.vertex_count() as u32;
        let start = self.indices.len();

        for p in positions {
            self.positions.extend_from_slice(p);
        }
        for uv in uvs {
            self.uvs.extend_from_slice(uv);
        }
        self.indices.extend(indices.iter().map(|&i| i + base));

        match self.groups.last_mut() {
            Some(group) if group.kind == kind && group.start + group.count == start => {
                group.count += indices.len();
            }
            _ => self.groups.push(SubmeshGroup {
                kind,
                start,
                count: indices.len(),
            }),
        }
    }

    /// Indices belonging to `group`.
    pub fn group_indices(&self, group: &SubmeshGroup) -> &[u32] {
        &self.indices[group.start..group.start + group.count]
    }
}
