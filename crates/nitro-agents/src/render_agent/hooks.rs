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

//! Extension points for the passes the instanced renderer does not draw.

use nitro_core::renderer::traits::DrawRecorder;

/// Passes supplied by the rest of the engine.
///
/// Each hook runs inside its own debug group, at a fixed point of the camera
/// sequence. The default implementations record nothing.
pub trait FrameHooks {
    /// Accumulates dynamic lights between the two solid passes.
    fn render_lights(
        &mut self,
        camera: usize,
        recorder: &mut dyn DrawRecorder,
    ) -> anyhow::Result<()> {
        let _ = (camera, recorder);
        Ok(())
    }

    /// Draws transparent geometry after the glow pass.
    fn render_transparent(
        &mut self,
        camera: usize,
        recorder: &mut dyn DrawRecorder,
    ) -> anyhow::Result<()> {
        let _ = (camera, recorder);
        Ok(())
    }

    /// Draws particles once the frame fence is recorded.
    fn render_particles(
        &mut self,
        camera: usize,
        recorder: &mut dyn DrawRecorder,
    ) -> anyhow::Result<()> {
        let _ = (camera, recorder);
        Ok(())
    }
}

/// Hooks that record nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl FrameHooks for NoHooks {}
