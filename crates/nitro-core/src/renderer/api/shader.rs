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

//! Material classification, vertex/instance layouts and pass descriptions.
//!
//! A [`ShaderType`] decides which bucket a mesh lands in, which vertex
//! layout its program expects, and which of the mesh's textures each pass
//! samples.

use std::fmt;

/// Number of [`ShaderType`] variants. Shadow buckets are keyed by
/// `cascade * SHADERTYPE_COUNT + type`.
pub const SHADERTYPE_COUNT: usize = 8;

/// Number of shadow cascades rendered per frame.
pub const SHADOW_CASCADE_COUNT: usize = 4;

/// The material classification of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShaderType {
    /// Opaque lit geometry.
    Solid = 0,
    /// Alpha-tested geometry (fences, foliage cards).
    AlphaTest = 1,
    /// Opaque geometry that ignores lighting.
    SolidUnlit = 2,
    /// Environment-mapped geometry.
    SphereMap = 3,
    /// Wind-animated vegetation.
    Vegetation = 4,
    /// Geometry with a second, detail texture coordinate set.
    DetailMap = 5,
    /// Normal-mapped geometry.
    NormalMap = 6,
    /// Terrain blending several layers through a splat map.
    Splatting = 7,
}

impl ShaderType {
    /// All material types, ordered by id.
    pub const ALL: [ShaderType; SHADERTYPE_COUNT] = [
        ShaderType::Solid,
        ShaderType::AlphaTest,
        ShaderType::SolidUnlit,
        ShaderType::SphereMap,
        ShaderType::Vegetation,
        ShaderType::DetailMap,
        ShaderType::NormalMap,
        ShaderType::Splatting,
    ];

    /// The material id, used directly as the solid and RSM bucket id.
    #[inline]
    pub const fn id(self) -> usize {
        self as usize
    }

    /// The bucket id of this material inside the shadow buffer.
    #[inline]
    pub const fn shadow_bucket(self, cascade: usize) -> usize {
        cascade * SHADERTYPE_COUNT + self as usize
    }

    /// The vertex layout this material's programs expect.
    pub const fn vertex_layout(self) -> VertexLayout {
        match self {
            ShaderType::DetailMap | ShaderType::Splatting => VertexLayout::TwoTexCoords,
            ShaderType::NormalMap => VertexLayout::Tangents,
            _ => VertexLayout::Standard,
        }
    }

    /// Whether the material has an instanced program.
    #[inline]
    pub const fn is_instanced(self) -> bool {
        !matches!(self, ShaderType::Splatting)
    }

    /// Whether nodes of this material may carry a per-instance texture
    /// matrix, which instance records cannot express.
    #[inline]
    pub const fn supports_texture_matrix(self) -> bool {
        matches!(
            self,
            ShaderType::Solid | ShaderType::AlphaTest | ShaderType::SolidUnlit
        )
    }

    /// Indices into the mesh's texture array sampled during `pass`.
    pub const fn texture_slots(self, pass: ShaderPass) -> &'static [usize] {
        use ShaderPass::*;
        use ShaderType::*;
        match (self, pass) {
            (_, Glow | Normals) => &[],
            (Solid, FirstPass) => &[1],
            (Solid, SecondPass) => &[0, 1],
            (Solid, Shadow) => &[],
            (AlphaTest, FirstPass | SecondPass) => &[0, 1],
            (AlphaTest, Shadow) => &[0],
            (SolidUnlit, _) => &[0],
            (SphereMap, FirstPass) => &[1],
            (SphereMap, SecondPass) => &[0],
            (SphereMap, Shadow) => &[],
            (Vegetation, FirstPass | SecondPass) => &[0, 1],
            (Vegetation, Shadow) => &[0],
            (DetailMap, FirstPass) => &[1],
            (DetailMap, SecondPass) => &[0, 2, 1],
            (DetailMap, Shadow) => &[],
            (NormalMap, FirstPass) => &[2, 1],
            (NormalMap, SecondPass) => &[0, 1],
            (NormalMap, Shadow) => &[],
            (Splatting, FirstPass) => &[6],
            (Splatting, SecondPass | ReflectiveShadowMap) => &[1, 2, 3, 4, 5],
            (Splatting, Shadow) => &[],
            (_, ReflectiveShadowMap) => &[0],
        }
    }

    /// How many prefilled textures the second pass appends after the
    /// mesh's own textures.
    pub const fn prefilled_texture_count(self) -> usize {
        match self {
            ShaderType::Vegetation => 4,
            _ => 3,
        }
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Rendering passes a program can be specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    /// Writes normals and roughness into the geometry buffer.
    FirstPass,
    /// Shades using the accumulated light buffers.
    SecondPass,
    /// Depth-only rendering into a shadow cascade.
    Shadow,
    /// Flux and normal rendering from the sun's point of view.
    ReflectiveShadowMap,
    /// Flat colored rendering of glowing objects.
    Glow,
    /// Debug visualization of vertex normals.
    Normals,
}

impl ShaderPass {
    /// Every pass.
    pub const ALL: [ShaderPass; 6] = [
        ShaderPass::FirstPass,
        ShaderPass::SecondPass,
        ShaderPass::Shadow,
        ShaderPass::ReflectiveShadowMap,
        ShaderPass::Glow,
        ShaderPass::Normals,
    ];
}

impl fmt::Display for ShaderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-vertex attribute layouts of mesh vertex buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position, normal, color, one texture coordinate set.
    Standard,
    /// Standard plus a second texture coordinate set.
    TwoTexCoords,
    /// Standard plus tangent and bitangent.
    Tangents,
}

/// Per-instance attribute layouts; each has its own instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceLayout {
    /// Transform plus two texture handles (solid passes).
    DualTex,
    /// Transform plus three texture handles (solid passes).
    ThreeTex,
    /// Transform plus one texture handle (shadow cascades).
    Shadow,
    /// Transform plus one texture handle (reflective shadow map).
    ReflectiveShadowMap,
    /// Transform plus a color (glow).
    Glow,
}

/// An opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

/// An opaque handle to a vertex array object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub usize);

/// An opaque handle to a texture bound through texture units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// A resident bindless texture handle. `0` means "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct TextureHandle(pub u64);

/// Uniform state a pass sets on its program before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassUniforms {
    /// Nothing beyond the per-frame uniform block.
    None,
    /// The shadow cascade being rendered.
    Cascade(u32),
    /// The light-space matrix of the reflective shadow map.
    RsmMatrix(crate::math::Mat4),
    /// The model matrix of one explicitly drawn node.
    Model(crate::math::Mat4),
    /// The color of one explicitly drawn glowing node.
    GlowColor(crate::math::LinearRgba),
}
