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

use crate::renderer::api::buffer::BufferId;
use crate::renderer::api::command::{FenceId, IndexFormat};
use crate::renderer::api::shader::{
    PassUniforms, ProgramId, TextureHandle, TextureId, VertexArrayId,
};

/// A trait for an object that records draw state changes and draw calls.
///
/// Draw policies and command buffers talk to the GPU only through this
/// trait. State is sticky: a bound program, vertex array or indirect buffer
/// stays bound until replaced.
pub trait DrawRecorder {
    /// Opens a named debug group, used to bracket passes in GPU captures.
    fn push_debug_marker(&mut self, label: &str);

    /// Closes the innermost debug group.
    fn pop_debug_marker(&mut self);

    /// Activates a shader program.
    fn use_program(&mut self, program: ProgramId);

    /// Sets pass-level uniforms on the active program.
    fn set_uniforms(&mut self, uniforms: &PassUniforms);

    /// Binds a vertex array object.
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Attaches the per-instance attribute buffer to the bound vertex array.
    fn set_instance_buffer(&mut self, buffer: BufferId, stride: u32);

    /// Binds the buffer indirect draws read their commands from.
    fn bind_indirect_buffer(&mut self, buffer: BufferId);

    /// Binds textures to consecutive texture units starting at unit 0.
    fn bind_textures(&mut self, textures: &[TextureId]);

    /// Passes resident bindless handles to the active program.
    fn bind_texture_handles(&mut self, handles: &[TextureHandle]);

    /// Records an ordinary indexed draw of one instance.
    fn draw_elements(
        &mut self,
        index_count: u32,
        index_format: IndexFormat,
        first_index: u32,
        base_vertex: i32,
    );

    /// Records one indexed draw whose parameters are read from the bound
    /// indirect buffer at `offset` bytes.
    fn draw_elements_indirect(&mut self, index_format: IndexFormat, offset: u64);

    /// Records `draw_count` consecutive indirect draws in one call.
    fn multi_draw_elements_indirect(
        &mut self,
        index_format: IndexFormat,
        offset: u64,
        draw_count: u32,
        stride: u32,
    );

    /// Inserts a fence signaled once every previously recorded command has
    /// completed, and returns a handle to poll it without blocking.
    fn fence_sync(&mut self) -> FenceId;
}
