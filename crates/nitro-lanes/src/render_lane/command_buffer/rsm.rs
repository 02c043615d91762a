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
    InstanceStream, PassSetup, Submit,
};
use crate::render_lane::instance::InstanceDataSingleTex;
use nitro_core::{
    math::Mat4,
    renderer::{
        api::{InstanceLayout, PassUniforms, RenderStrategy, ShaderPass, ShaderType},
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
    scene::MeshMap,
};
use std::ops::Deref;

/// Materials rendered into the reflective shadow map, in draw order.
pub const RSM_MATERIALS: [ShaderType; 5] = [
    ShaderType::Solid,
    ShaderType::AlphaTest,
    ShaderType::SolidUnlit,
    ShaderType::DetailMap,
    ShaderType::NormalMap,
];

/// Command buffer of the reflective shadow map used by global illumination.
#[derive(Debug)]
pub struct RsmCommandBuffer {
    base: CommandBuffer,
    stream: InstanceStream<InstanceDataSingleTex>,
}

impl RsmCommandBuffer {
    /// Allocates the command buffer and its instance stream.
    pub fn new(
        device: &dyn GraphicsDevice,
        strategy: RenderStrategy,
    ) -> Result<Self, CommandBufferError> {
        Ok(Self {
            base: CommandBuffer::new(device, CommandBufferKind::ReflectiveShadowMap, strategy)?,
            stream: InstanceStream::new(
                device,
                InstanceLayout::ReflectiveShadowMap,
                strategy.upload,
            )?,
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
        self.stream.reset();
        begin_uploads(device, &[self.base.indirect_buffer, self.stream.buffer], upload)?;

        let packed = RSM_MATERIALS.iter().try_for_each(|material| {
            self.base.fill_bucket(
                material.id(),
                material.vertex_layout(),
                mesh_map.instance_lists(material.id()),
                &mut self.stream,
            )
        });
        let uploads = [
            self.stream.finish(device, upload),
            self.base.finish_fill(device),
        ];
        fill_outcome(packed, uploads)
    }

    /// The instance stream.
    pub fn stream(&self) -> &InstanceStream<InstanceDataSingleTex> {
        &self.stream
    }

    /// Renders `material` into the RSM with `submit`.
    pub fn draw(
        &self,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        material: ShaderType,
        rsm_matrix: Mat4,
        submit: Submit,
    ) {
        let setup = PassSetup {
            material,
            pass: ShaderPass::ReflectiveShadowMap,
            bucket: material.id(),
            uniforms: PassUniforms::RsmMatrix(rsm_matrix),
            prefilled: None,
        };
        self.base.draw_pass(recorder, resources, self.stream.binding(), &setup, submit);
    }

    /// Destroys the GPU buffers.
    pub fn release(&self, device: &dyn GraphicsDevice) {
        self.base.release(device);
        self.stream.release(device);
    }
}

impl Deref for RsmCommandBuffer {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        &self.base
    }
}
