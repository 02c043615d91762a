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

use crate::renderer::api::shader::{
    InstanceLayout, ProgramId, ShaderPass, ShaderType, VertexArrayId, VertexLayout,
};

/// Lookup of GPU objects owned by the shader and vertex-array managers.
///
/// The renderer never creates programs or vertex arrays itself; it asks for
/// the ones matching a material, pass and layout.
pub trait RenderResources {
    /// The vertex array sharing all meshes of `vertex` layout, without
    /// instance attributes. Used by explicit draws when base instance works.
    fn vertex_array(&self, vertex: VertexLayout) -> VertexArrayId;

    /// The vertex array combining `vertex` attributes with per-instance
    /// attributes of `instance` layout.
    fn instance_vertex_array(&self, vertex: VertexLayout, instance: InstanceLayout)
        -> VertexArrayId;

    /// The program rendering `material` during `pass`.
    ///
    /// `instanced` selects the variant reading transforms from instance
    /// attributes instead of a model-matrix uniform.
    fn program(&self, material: ShaderType, pass: ShaderPass, instanced: bool) -> ProgramId;
}
