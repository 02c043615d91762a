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
use crate::render_lane::instance::GlowInstanceData;
use nitro_core::{
    renderer::{
        api::{InstanceLayout, PassUniforms, RenderStrategy, ShaderPass, ShaderType, VertexLayout},
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
    scene::{HasGlowColor, MeshMap},
};
use std::ops::Deref;

/// The only bucket of a glow buffer.
pub const GLOW_BUCKET: usize = 0;

/// Command buffer of glowing objects.
///
/// Its instance records carry a color instead of textures, so it is filled
/// from nodes exposing [`HasGlowColor`].
#[derive(Debug)]
pub struct GlowCommandBuffer {
    base: CommandBuffer,
    stream: InstanceStream<GlowInstanceData>,
}

impl GlowCommandBuffer {
    /// Allocates the command buffer and its instance stream.
    pub fn new(
        device: &dyn GraphicsDevice,
        strategy: RenderStrategy,
    ) -> Result<Self, CommandBufferError> {
        Ok(Self {
            base: CommandBuffer::new(device, CommandBufferKind::Glow, strategy)?,
            stream: InstanceStream::new(device, InstanceLayout::Glow, strategy.upload)?,
        })
    }

    /// Rebuilds the glow bucket from bucket 0 of `mesh_map`.
    pub fn fill(
        &mut self,
        device: &dyn GraphicsDevice,
        mesh_map: &MeshMap<dyn HasGlowColor>,
    ) -> Result<(), CommandBufferError> {
        let upload = self.base.strategy.upload;
        self.base.reset();
        self.stream.reset();
        begin_uploads(device, &[self.base.indirect_buffer, self.stream.buffer], upload)?;

        let packed = self.base.fill_bucket(
            GLOW_BUCKET,
            VertexLayout::Standard,
            mesh_map.instance_lists(GLOW_BUCKET),
            &mut self.stream,
        );
        let uploads = [
            self.stream.finish(device, upload),
            self.base.finish_fill(device),
        ];
        fill_outcome(packed, uploads)
    }

    /// The instance stream.
    pub fn stream(&self) -> &InstanceStream<GlowInstanceData> {
        &self.stream
    }

    /// Draws every glowing mesh with `submit`.
    pub fn draw(
        &self,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        submit: Submit,
    ) {
        let setup = PassSetup {
            material: ShaderType::Solid,
            pass: ShaderPass::Glow,
            bucket: GLOW_BUCKET,
            uniforms: PassUniforms::None,
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

impl Deref for GlowCommandBuffer {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        &self.base
    }
}
