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
    renderer::{
        api::{
            InstanceLayout, PassUniforms, RenderStrategy, ShaderPass, ShaderType,
            SHADOW_CASCADE_COUNT,
        },
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
    scene::MeshMap,
};
use std::ops::Deref;

/// Materials rendered into each shadow cascade, in draw order.
pub const SHADOW_MATERIALS: [ShaderType; 7] = [
    ShaderType::Solid,
    ShaderType::AlphaTest,
    ShaderType::SolidUnlit,
    ShaderType::NormalMap,
    ShaderType::SphereMap,
    ShaderType::DetailMap,
    ShaderType::Vegetation,
];

/// Command buffer of the shadow cascades.
///
/// Bucket ids are [`ShaderType::shadow_bucket`] ids.
#[derive(Debug)]
pub struct ShadowCommandBuffer {
    base: CommandBuffer,
    stream: InstanceStream<InstanceDataSingleTex>,
}

impl ShadowCommandBuffer {
    /// Allocates the command buffer and its instance stream.
    pub fn new(
        device: &dyn GraphicsDevice,
        strategy: RenderStrategy,
    ) -> Result<Self, CommandBufferError> {
        Ok(Self {
            base: CommandBuffer::new(device, CommandBufferKind::Shadow, strategy)?,
            stream: InstanceStream::new(device, InstanceLayout::Shadow, strategy.upload)?,
        })
    }

    /// Rebuilds every cascade from `mesh_map`, keyed by shadow bucket id.
    pub fn fill(
        &mut self,
        device: &dyn GraphicsDevice,
        mesh_map: &MeshMap,
    ) -> Result<(), CommandBufferError> {
        let upload = self.base.strategy.upload;
        self.base.reset();
        self.stream.reset();
        begin_uploads(device, &[self.base.indirect_buffer, self.stream.buffer], upload)?;

        let packed = self.pack(mesh_map);
        let uploads = [
            self.stream.finish(device, upload),
            self.base.finish_fill(device),
        ];
        fill_outcome(packed, uploads)
    }

    fn pack(&mut self, mesh_map: &MeshMap) -> Result<(), CommandBufferError> {
        for cascade in 0..SHADOW_CASCADE_COUNT {
            for material in SHADOW_MATERIALS {
                let bucket = material.shadow_bucket(cascade);
                self.base.fill_bucket(
                    bucket,
                    material.vertex_layout(),
                    mesh_map.instance_lists(bucket),
                    &mut self.stream,
                )?;
            }
        }
        Ok(())
    }

    /// Whether `material` has nothing to draw in `cascade`.
    pub fn is_cascade_empty(&self, material: ShaderType, cascade: usize) -> bool {
        self.base.is_empty(material.shadow_bucket(cascade))
    }

    /// The instance stream.
    pub fn stream(&self) -> &InstanceStream<InstanceDataSingleTex> {
        &self.stream
    }

    /// Renders `material` into `cascade` with `submit`.
    pub fn draw(
        &self,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        material: ShaderType,
        cascade: usize,
        submit: Submit,
    ) {
        let setup = PassSetup {
            material,
            pass: ShaderPass::Shadow,
            bucket: material.shadow_bucket(cascade),
            uniforms: PassUniforms::Cascade(cascade as u32),
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

impl Deref for ShadowCommandBuffer {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        &self.base
    }
}
