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

//! Per-instance records read by the instanced vertex shaders.
//!
//! Records are tightly packed (`repr(C, packed)`) to match the instance
//! vertex attribute layout, which has no padding between the transform and
//! the 64-bit texture handles. Fields of a packed struct must be copied out
//! before being borrowed.

use bytemuck::{Pod, Zeroable};
use nitro_core::{
    math::Rgba8,
    renderer::api::{GpuMesh, InstanceLayout},
    scene::{HasGlowColor, SceneNode},
};

/// Origin, Euler orientation in degrees and scale of one instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// World-space translation.
    pub origin: [f32; 3],
    /// Euler angles in degrees, each in `[0, 360)`.
    pub orientation: [f32; 3],
    /// Per-axis scale.
    pub scale: [f32; 3],
}

impl InstanceTransform {
    /// Decomposes the node's world transform.
    #[inline]
    pub fn from_node<N: SceneNode + ?Sized>(node: &N) -> Self {
        let transform = node.absolute_transform();
        Self {
            origin: transform.translation().to_array(),
            orientation: transform.rotation_degrees().to_array(),
            scale: transform.scale().to_array(),
        }
    }
}

/// Instance record with one texture, used by shadow and RSM passes.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceDataSingleTex {
    /// The instance transform.
    pub transform: InstanceTransform,
    /// Bindless handle of the first texture.
    pub texture: u64,
}

/// Instance record with two textures, used by most solid materials.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceDataDualTex {
    /// The instance transform.
    pub transform: InstanceTransform,
    /// Bindless handle of the first texture.
    pub texture: u64,
    /// Bindless handle of the second texture.
    pub second_texture: u64,
}

/// Instance record with three textures, used by detail and normal maps.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceDataThreeTex {
    /// The instance transform.
    pub transform: InstanceTransform,
    /// Bindless handle of the first texture.
    pub texture: u64,
    /// Bindless handle of the second texture.
    pub second_texture: u64,
    /// Bindless handle of the third texture.
    pub third_texture: u64,
}

/// Instance record carrying a glow color instead of textures.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GlowInstanceData {
    /// The instance transform.
    pub transform: InstanceTransform,
    /// The glow color, 8 bits per channel.
    pub color: Rgba8,
}

/// A record type stored in an instance stream.
pub trait InstanceRecord: Pod {
    /// Stride of one record in bytes.
    const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
}

impl InstanceRecord for InstanceDataSingleTex {}
impl InstanceRecord for InstanceDataDualTex {}
impl InstanceRecord for InstanceDataThreeTex {}
impl InstanceRecord for GlowInstanceData {}

/// Packs one (mesh, node) pair into a record.
///
/// `N` is the node capability the record needs. Glow records are only
/// implemented for nodes with [`HasGlowColor`], so packing a glow record for
/// a node without a glow color does not compile.
pub trait PackInstance<N: ?Sized>: InstanceRecord {
    /// Builds the record.
    fn pack(mesh: &GpuMesh, node: &N) -> Self;
}

impl<N: SceneNode + ?Sized> PackInstance<N> for InstanceDataSingleTex {
    #[inline]
    fn pack(mesh: &GpuMesh, node: &N) -> Self {
        Self {
            transform: InstanceTransform::from_node(node),
            texture: mesh.texture_handles[0].0,
        }
    }
}

impl<N: SceneNode + ?Sized> PackInstance<N> for InstanceDataDualTex {
    #[inline]
    fn pack(mesh: &GpuMesh, node: &N) -> Self {
        Self {
            transform: InstanceTransform::from_node(node),
            texture: mesh.texture_handles[0].0,
            second_texture: mesh.texture_handles[1].0,
        }
    }
}

impl<N: SceneNode + ?Sized> PackInstance<N> for InstanceDataThreeTex {
    #[inline]
    fn pack(mesh: &GpuMesh, node: &N) -> Self {
        Self {
            transform: InstanceTransform::from_node(node),
            texture: mesh.texture_handles[0].0,
            second_texture: mesh.texture_handles[1].0,
            third_texture: mesh.texture_handles[2].0,
        }
    }
}

impl<N: HasGlowColor + ?Sized> PackInstance<N> for GlowInstanceData {
    #[inline]
    fn pack(_mesh: &GpuMesh, node: &N) -> Self {
        Self {
            transform: InstanceTransform::from_node(node),
            color: node.glow_color().to_rgba8(),
        }
    }
}

/// Returns the stride of the record type stored for `layout`.
pub fn stride_of(layout: InstanceLayout) -> u32 {
    match layout {
        InstanceLayout::DualTex => InstanceDataDualTex::STRIDE,
        InstanceLayout::ThreeTex => InstanceDataThreeTex::STRIDE,
        InstanceLayout::Shadow | InstanceLayout::ReflectiveShadowMap => {
            InstanceDataSingleTex::STRIDE
        }
        InstanceLayout::Glow => GlowInstanceData::STRIDE,
    }
}
