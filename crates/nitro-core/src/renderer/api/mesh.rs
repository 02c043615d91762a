// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GPU-side description of a mesh stored in the shared vertex/index buffers.

use super::command::IndexFormat;
use super::shader::{TextureHandle, TextureId, VertexArrayId, VertexLayout};

/// Number of texture slots a mesh carries.
pub const MESH_TEXTURE_SLOTS: usize = 8;

/// Identity of a mesh buffer; instances of the same mesh share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// A mesh already uploaded to the GPU.
///
/// Meshes live in shared vertex and index buffers grouped by vertex layout;
/// `base_vertex` and `first_index` locate this mesh inside them. Texture
/// slots are filled both as bindless handles and as plain texture ids so
/// either binding mode can be used.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMesh {
    /// The identity of the mesh buffer.
    pub id: MeshId,
    /// A debug name, usually the source file.
    pub name: String,
    /// The layout of the mesh's vertices.
    pub vertex_layout: VertexLayout,
    /// The vertex array owning this mesh alone, used when draws cannot start
    /// at a base instance.
    pub vertex_array: VertexArrayId,
    /// Number of indices.
    pub index_count: u32,
    /// First index inside the shared index buffer.
    pub first_index: u32,
    /// Offset of the first vertex inside the shared vertex buffer.
    pub base_vertex: i32,
    /// Width of the indices.
    pub index_format: IndexFormat,
    /// Texture ids per slot, `None` for unused slots.
    pub textures: [Option<TextureId>; MESH_TEXTURE_SLOTS],
    /// Bindless handles per slot, zero for unused slots.
    pub texture_handles: [TextureHandle; MESH_TEXTURE_SLOTS],
    /// The name of the first texture, reported in diagnostics.
    pub texture_name: Option<String>,
}

impl GpuMesh {
    /// Creates a mesh without textures.
    pub fn new(
        id: MeshId,
        name: impl Into<String>,
        vertex_layout: VertexLayout,
        index_count: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            vertex_layout,
            vertex_array: VertexArrayId(0),
            index_count,
            first_index: 0,
            base_vertex: 0,
            index_format: IndexFormat::Uint16,
            textures: [None; MESH_TEXTURE_SLOTS],
            texture_handles: [TextureHandle::default(); MESH_TEXTURE_SLOTS],
            texture_name: None,
        }
    }

    /// Sets the location inside the shared buffers.
    pub fn with_location(mut self, first_index: u32, base_vertex: i32) -> Self {
        self.first_index = first_index;
        self.base_vertex = base_vertex;
        self
    }

    /// Sets the width of the mesh's indices.
    pub fn with_index_format(mut self, index_format: IndexFormat) -> Self {
        self.index_format = index_format;
        self
    }

    /// Sets the texture in `slot`, both as an id and as a bindless handle.
    pub fn with_texture(mut self, slot: usize, texture: TextureId, handle: TextureHandle) -> Self {
        if slot < MESH_TEXTURE_SLOTS {
            self.textures[slot] = Some(texture);
            self.texture_handles[slot] = handle;
        }
        self
    }

    /// Sets the per-mesh vertex array.
    pub fn with_vertex_array(mut self, vertex_array: VertexArrayId) -> Self {
        self.vertex_array = vertex_array;
        self
    }

    /// Number of triangles in one instance of the mesh.
    #[inline]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Name used when reporting problems with this mesh.
    pub fn diagnostic_name(&self) -> &str {
        self.texture_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_location_and_textures() {
        let mesh = GpuMesh::new(MeshId(7), "kart.b3d", VertexLayout::Standard, 300)
            .with_location(120, 64)
            .with_texture(1, TextureId(3), TextureHandle(0xabc));
        assert_eq!(mesh.first_index, 120);
        assert_eq!(mesh.base_vertex, 64);
        assert_eq!(mesh.textures[1], Some(TextureId(3)));
        assert_eq!(mesh.texture_handles[1], TextureHandle(0xabc));
        assert_eq!(mesh.textures[0], None);
        assert_eq!(mesh.triangle_count(), 100);
    }

    #[test]
    fn test_out_of_range_slot_is_ignored() {
        let mesh = GpuMesh::new(MeshId(1), "m", VertexLayout::Standard, 3).with_texture(
            MESH_TEXTURE_SLOTS,
            TextureId(1),
            TextureHandle(1),
        );
        assert!(mesh.textures.iter().all(Option::is_none));
    }
}
