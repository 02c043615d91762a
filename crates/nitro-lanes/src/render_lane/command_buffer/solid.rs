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

use super::{
    begin_uploads, fill_outcome, CommandBuffer, CommandBufferError, CommandBufferKind,
    InstanceStream, PassSetup, StreamBinding, Submit,
};
use crate::render_lane::instance::{InstanceDataDualTex, InstanceDataThreeTex};
use crate::render_lane::textures::PrefilledTextures;
use nitro_core::{
    renderer::{
        api::{InstanceLayout, PassUniforms, RenderStrategy, ShaderPass, ShaderType},
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
    scene::MeshMap,
};
use std::ops::Deref;

/// Solid materials packed with two textures, in draw order.
pub const SOLID_DUAL_TEX_MATERIALS: [ShaderType; 5] = [
    ShaderType::Solid,
    ShaderType::AlphaTest,
    ShaderType::SolidUnlit,
    ShaderType::SphereMap,
    ShaderType::Vegetation,
];

/// Solid materials packed with three textures, in draw order.
pub const SOLID_THREE_TEX_MATERIALS: [ShaderType; 2] =
    [ShaderType::DetailMap, ShaderType::NormalMap];

/// Command buffer of the two solid passes and the normals visualization.
///
/// Bucket ids are material ids.
#[derive(Debug)]
pub struct SolidCommandBuffer {
    base: CommandBuffer,
    dual: InstanceStream<InstanceDataDualTex>,
    three: InstanceStream<InstanceDataThreeTex>,
}

impl SolidCommandBuffer {
    /// Allocates the command buffer and its two instance streams.
    pub fn new(
        device: &dyn GraphicsDevice,
        strategy: RenderStrategy,
    ) -> Result<Self, CommandBufferError> {
        Ok(Self {
            base: CommandBuffer::new(device, CommandBufferKind::Solid, strategy)?,
            dual: InstanceStream::new(device, InstanceLayout::DualTex, strategy.upload)?,
            three: InstanceStream::new(device, InstanceLayout::ThreeTex, strategy.upload)?,
        })
    }

    /// Rebuilds every bucket from `mesh_map`, keyed by material id.
    pub fn fill(
        &mut self,
        device: &dyn GraphicsDevice,
        mesh_map: &MeshMap,
    ) -> Result<(), CommandBufferError> {
        let upload = self.base.strategy.upload;
        self.base.reset();
        self.dual.reset();
        self.three.reset();
        begin_uploads(
            device,
            &[self.base.indirect_buffer, self.dual.buffer, self.three.buffer],
            upload,
        )?;

        let packed = self.pack(mesh_map);
        let uploads = [
            self.dual.finish(device, upload),
            self.three.finish(device, upload),
            self.base.finish_fill(device),
        ];
        fill_outcome(packed, uploads)
    }

    fn pack(&mut self, mesh_map: &MeshMap) -> Result<(), CommandBufferError> {
        for material in SOLID_DUAL_TEX_MATERIALS {
            self.base.fill_bucket(
                material.id(),
                material.vertex_layout(),
                mesh_map.instance_lists(material.id()),
                &mut self.dual,
            )?;
        }
        for material in SOLID_THREE_TEX_MATERIALS {
            self.base.fill_bucket(
                material.id(),
                material.vertex_layout(),
                mesh_map.instance_lists(material.id()),
                &mut self.three,
            )?;
        }
        Ok(())
    }

    /// The two-texture instance stream.
    pub fn dual_tex_stream(&self) -> &InstanceStream<InstanceDataDualTex> {
        &self.dual
    }

    /// The three-texture instance stream.
    pub fn three_tex_stream(&self) -> &InstanceStream<InstanceDataThreeTex> {
        &self.three
    }

    fn stream_for(&self, material: ShaderType) -> Option<StreamBinding> {
        if SOLID_DUAL_TEX_MATERIALS.contains(&material) {
            Some(self.dual.binding())
        } else if SOLID_THREE_TEX_MATERIALS.contains(&material) {
            Some(self.three.binding())
        } else {
            None
        }
    }

    /// Draws `pass` over the bucket of `material` with `submit`. The second
    /// pass samples `prefilled` after the mesh textures.
    pub fn draw(
        &self,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        material: ShaderType,
        pass: ShaderPass,
        prefilled: Option<&PrefilledTextures>,
        submit: Submit,
    ) {
        let Some(stream) = self.stream_for(material) else {
            log::warn!("{material} has no instanced solid bucket");
            return;
        };
        let setup = PassSetup {
            material,
            pass,
            bucket: material.id(),
            uniforms: PassUniforms::None,
            prefilled,
        };
        self.base.draw_pass(recorder, resources, stream, &setup, submit);
    }

    /// Destroys the GPU buffers.
    pub fn release(&self, device: &dyn GraphicsDevice) {
        self.base.release(device);
        self.dual.release(device);
        self.three.release(device);
    }
}

impl Deref for SolidCommandBuffer {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        &self.base
    }
}
