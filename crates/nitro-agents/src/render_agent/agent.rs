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

//! Defines the RenderAgent, the orchestrator of the instanced renderer.

use super::hooks::FrameHooks;
use anyhow::Context;
use nitro_core::{
    math::Mat4,
    renderer::{
        api::{RenderSettings, RenderStrategy, SHADOW_CASCADE_COUNT},
        error::RenderError,
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
};
use nitro_lanes::render_lane::{
    select_policy, CommandBufferError, DrawCallStats, DrawCalls, DrawContext, DrawPolicy,
    PrefilledTextures, VisibleScene,
};

/// Debug group of the shadow cascades.
pub const SHADOWS_MARKER: &str = "Shadows";
/// Debug group of the reflective shadow map.
pub const RSM_MARKER: &str = "ReflectiveShadowMap";
/// Debug group of the first solid pass.
pub const SOLID_FIRST_PASS_MARKER: &str = "SolidFirstPass";
/// Debug group of the lighting hook.
pub const LIGHTS_MARKER: &str = "Lights";
/// Debug group of the second solid pass.
pub const SOLID_SECOND_PASS_MARKER: &str = "SolidSecondPass";
/// Debug group of the normals visualization.
pub const NORMALS_MARKER: &str = "Normals";
/// Debug group of the glow pass.
pub const GLOW_MARKER: &str = "Glow";
/// Debug group of the transparency hook.
pub const TRANSPARENT_MARKER: &str = "Transparent";
/// Debug group of the particles hook.
pub const PARTICLES_MARKER: &str = "Particles";

/// Everything one frame renders.
#[derive(Debug, Clone)]
pub struct FrameInput<'a> {
    /// The visible scene of each camera, in camera order.
    pub cameras: &'a [VisibleScene],
    /// Whether the current track casts sun shadows at all.
    pub track_has_shadows: bool,
    /// The sun's view-projection used for the reflective shadow map.
    pub rsm_matrix: Mat4,
    /// Light and SSAO buffers sampled by the second solid pass.
    pub prefilled: &'a PrefilledTextures,
}

/// Counters of the last rendered frame, summed over its cameras.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Cameras rendered.
    pub cameras: usize,
    /// Triangles of one solid pass.
    pub solid_poly_count: u64,
    /// Triangles across all shadow cascades.
    pub shadow_poly_count: u64,
    /// Triangles of the reflective shadow map.
    pub rsm_poly_count: u64,
    /// Triangles of the glow pass.
    pub glow_poly_count: u64,
    /// Visible (mesh, node) pairs.
    pub visible_instances: usize,
    /// Submission calls the policy is expected to need for the solid passes.
    pub estimated_draw_calls: f32,
    /// Cameras whose command buffers overflowed and rendered truncated.
    pub truncated_fills: usize,
}

impl FrameStats {
    fn add_camera(&mut self, calls: &DrawCallStats, estimated_draw_calls: f32) {
        self.cameras += 1;
        self.solid_poly_count += calls.solid_poly_count;
        self.shadow_poly_count += calls.shadow_poly_count;
        self.rsm_poly_count += calls.rsm_poly_count;
        self.glow_poly_count += calls.glow_poly_count;
        self.visible_instances += calls.visible_instances;
        self.estimated_draw_calls += estimated_draw_calls;
    }

    /// Triangles across every pass.
    pub fn total_poly_count(&self) -> u64 {
        self.solid_poly_count + self.shadow_poly_count + self.rsm_poly_count + self.glow_poly_count
    }
}

/// The agent sequencing the passes of every frame.
///
/// The draw policy is resolved once in [`RenderAgent::new`] from the device
/// capabilities and never changes afterwards.
pub struct RenderAgent {
    strategy: RenderStrategy,
    policy: Box<dyn DrawPolicy>,
    draw_calls: DrawCalls,
    settings: RenderSettings,
    // --- Frame metrics ---
    stats: FrameStats,
    frame_count: u64,
}

impl RenderAgent {
    /// Resolves the render strategy and creates the draw policy.
    ///
    /// # Arguments
    ///
    /// * `device` - The device owning the command buffers.
    /// * `settings` - The renderer settings; `preferred_submission` forces a
    ///   policy.
    ///
    /// # Returns
    ///
    /// The agent, or a `RenderError` when the preferred policy needs a
    /// capability the device lacks or a buffer cannot be allocated.
    pub fn new(device: &dyn GraphicsDevice, settings: RenderSettings) -> Result<Self, RenderError> {
        let caps = device.capabilities();
        let strategy = RenderStrategy::resolve(&caps, settings.preferred_submission)?;
        let mut policy = select_policy(strategy);
        policy.on_initialize(&caps)?;
        let draw_calls = DrawCalls::new(device, strategy).map_err(into_render_error)?;

        log::info!(
            "RenderAgent: Selected {} draw policy ({:?} upload, {:?} textures)",
            policy.strategy_name(),
            strategy.upload,
            strategy.textures
        );

        Ok(Self {
            strategy,
            policy,
            draw_calls,
            settings,
            stats: FrameStats::default(),
            frame_count: 0,
        })
    }

    /// The strategy resolved at creation.
    pub fn strategy(&self) -> &RenderStrategy {
        &self.strategy
    }

    /// The name of the active draw policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.strategy_name()
    }

    /// The current settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replaces the settings from the next frame on.
    ///
    /// The draw policy stays the one selected at creation, whatever
    /// `preferred_submission` now says.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        if settings.preferred_submission != self.settings.preferred_submission {
            log::warn!(
                "RenderAgent: preferred submission changed to {:?}; keeping the {} policy until restart",
                settings.preferred_submission,
                self.policy.strategy_name()
            );
        }
        self.settings = settings;
    }

    /// The draw calls prepared for the last camera.
    pub fn draw_calls(&self) -> &DrawCalls {
        &self.draw_calls
    }

    /// Counters of the last frame.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Frames rendered since creation.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Expected submission calls of the active policy for the last prepared
    /// camera.
    pub fn estimate_cost(&self) -> f32 {
        self.policy.estimate_cost(&self.draw_calls.workload())
    }

    /// Forgets the cached reflective shadow map; call it when a track loads.
    pub fn on_track_load(&mut self) {
        self.draw_calls.reset_reflective_shadow_map();
    }

    /// Renders every camera of `frame`.
    ///
    /// A command buffer overflow does not abort the frame: the camera renders
    /// what fit, and the overflow is counted in
    /// [`FrameStats::truncated_fills`]. Errors returned by `hooks` stop the
    /// frame.
    pub fn render_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        frame: &FrameInput<'_>,
        hooks: &mut dyn FrameHooks,
    ) -> anyhow::Result<()> {
        self.stats = FrameStats::default();
        for (camera, scene) in frame.cameras.iter().enumerate() {
            self.render_camera(device, recorder, resources, frame, scene, camera, hooks)
                .with_context(|| format!("rendering camera {camera}"))?;
        }
        self.frame_count += 1;
        log::trace!(
            "RenderAgent: frame {} done, {} triangles",
            self.frame_count,
            self.stats.total_poly_count()
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn render_camera(
        &mut self,
        device: &dyn GraphicsDevice,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        frame: &FrameInput<'_>,
        scene: &VisibleScene,
        camera: usize,
        hooks: &mut dyn FrameHooks,
    ) -> anyhow::Result<()> {
        if let Err(e) = self
            .draw_calls
            .prepare_draw_calls(device, scene, &self.settings)
        {
            match e {
                CommandBufferError::CapacityExceeded { .. } => {
                    log::warn!("RenderAgent: camera {camera} renders a truncated frame: {e}");
                    self.stats.truncated_fills += 1;
                }
                CommandBufferError::Resource(_) => {
                    return Err(e).context("preparing draw calls");
                }
            }
        }
        let estimated = self.estimate_cost();
        self.stats.add_camera(self.draw_calls.stats(), estimated);

        let policy = self.policy.as_ref();
        let calls = &self.draw_calls;
        let settings = &self.settings;

        if settings.shadows_active() && frame.track_has_shadows {
            recorder.push_debug_marker(SHADOWS_MARKER);
            for cascade in 0..SHADOW_CASCADE_COUNT {
                recorder.push_debug_marker(&format!("Cascade {cascade}"));
                policy.draw_shadows(calls, &mut DrawContext::new(recorder, resources), cascade);
                recorder.pop_debug_marker();
            }
            recorder.pop_debug_marker();
        }

        if settings.global_illumination_active() && calls.has_fresh_reflective_shadow_map() {
            recorder.push_debug_marker(RSM_MARKER);
            policy.draw_reflective_shadow_map(
                calls,
                &mut DrawContext::new(recorder, resources),
                frame.rsm_matrix,
            );
            recorder.pop_debug_marker();
        }

        recorder.push_debug_marker(SOLID_FIRST_PASS_MARKER);
        policy.draw_solid_first_pass(calls, &mut DrawContext::new(recorder, resources));
        recorder.pop_debug_marker();

        recorder.push_debug_marker(LIGHTS_MARKER);
        let lights = hooks.render_lights(camera, recorder);
        recorder.pop_debug_marker();
        lights.context("lighting hook")?;

        recorder.push_debug_marker(SOLID_SECOND_PASS_MARKER);
        policy.draw_solid_second_pass(
            calls,
            &mut DrawContext::new(recorder, resources),
            frame.prefilled,
        );
        recorder.pop_debug_marker();

        if settings.show_normals {
            recorder.push_debug_marker(NORMALS_MARKER);
            policy.draw_normals(calls, &mut DrawContext::new(recorder, resources));
            recorder.pop_debug_marker();
        }

        if settings.glow_active() && calls.has_glowing_objects() {
            recorder.push_debug_marker(GLOW_MARKER);
            policy.draw_glow(calls, &mut DrawContext::new(recorder, resources));
            recorder.pop_debug_marker();
        }

        recorder.push_debug_marker(TRANSPARENT_MARKER);
        let transparent = hooks.render_transparent(camera, recorder);
        recorder.pop_debug_marker();
        transparent.context("transparency hook")?;

        let fence = recorder.fence_sync();
        self.draw_calls.set_fence(fence);

        recorder.push_debug_marker(PARTICLES_MARKER);
        let particles = hooks.render_particles(camera, recorder);
        recorder.pop_debug_marker();
        particles.context("particles hook")
    }

    /// Destroys the GPU buffers of the renderer.
    pub fn release(&self, device: &dyn GraphicsDevice) {
        self.draw_calls.release(device);
    }
}

fn into_render_error(e: CommandBufferError) -> RenderError {
    match e {
        CommandBufferError::Resource(e) => RenderError::Resource(e),
        other => RenderError::FillFailed(other.to_string()),
    }
}
