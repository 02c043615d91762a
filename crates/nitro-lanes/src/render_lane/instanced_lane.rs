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

//! Implements the instanced draw policies.
//!
//! The `InstancedDrawLane` draws the command buffers filled by [`DrawCalls`]
//! in one of two ways. Under indirect submission each distinct mesh of a
//! material bucket gets one indirect call covering all its instances. Under
//! hardware multidraw a whole bucket goes out in a single call; per-mesh
//! textures then travel inside the instance records as bindless handles, so
//! the only binding left per material is the set of prefilled textures of the
//! second pass.
//!
//! Nodes the instanced shaders cannot handle still go through explicit loops
//! first in both modes.

use super::command_buffer::{
    Submit, RSM_MATERIALS, SHADOW_MATERIALS, SOLID_DUAL_TEX_MATERIALS, SOLID_THREE_TEX_MATERIALS,
};
use super::draw_calls::DrawCalls;
use super::policy::{
    render_explicit_rsm, render_explicit_solid, DrawContext, DrawPolicy, EXPLICIT_SOLID_MATERIALS,
};
use super::textures::PrefilledTextures;
use nitro_core::{
    math::Mat4,
    renderer::api::{RenderStrategy, ShaderPass, ShaderType, SubmissionMode},
};

/// A draw policy submitting the command buffers per mesh or per bucket.
#[derive(Debug, Clone)]
pub struct InstancedDrawLane {
    strategy: RenderStrategy,
    submit: Submit,
}

impl InstancedDrawLane {
    /// Creates the lane for `strategy`.
    ///
    /// Returns `None` when the strategy draws explicitly.
    pub fn new(strategy: RenderStrategy) -> Option<Self> {
        let submit = Submit::for_mode(strategy.submission)?;
        Some(Self { strategy, submit })
    }

    /// How each bucket is submitted.
    pub fn submit(&self) -> Submit {
        self.submit
    }

    fn solid_pass(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        pass: ShaderPass,
        prefilled: Option<&PrefilledTextures>,
    ) {
        if let Some(solid) = calls.solid_buffer() {
            for material in SOLID_DUAL_TEX_MATERIALS.into_iter().chain(SOLID_THREE_TEX_MATERIALS) {
                solid.draw(ctx.recorder, ctx.resources, material, pass, prefilled, self.submit);
            }
        }
    }
}

impl nitro_core::lane::Lane for InstancedDrawLane {
    fn strategy_name(&self) -> &'static str {
        match self.submit {
            Submit::PerMesh => "Indirect",
            Submit::Multidraw => "Multidraw",
        }
    }

    fn submission_mode(&self) -> SubmissionMode {
        match self.submit {
            Submit::PerMesh => SubmissionMode::IndirectPerMesh,
            Submit::Multidraw => SubmissionMode::HardwareMultidraw,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl DrawPolicy for InstancedDrawLane {
    fn draw_solid_first_pass(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>) {
        render_explicit_solid(
            calls,
            ctx,
            &self.strategy,
            &EXPLICIT_SOLID_MATERIALS,
            ShaderPass::FirstPass,
            None,
        );
        self.solid_pass(calls, ctx, ShaderPass::FirstPass, None);
    }

    fn draw_solid_second_pass(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        prefilled: &PrefilledTextures,
    ) {
        render_explicit_solid(
            calls,
            ctx,
            &self.strategy,
            &EXPLICIT_SOLID_MATERIALS,
            ShaderPass::SecondPass,
            Some(prefilled),
        );
        self.solid_pass(calls, ctx, ShaderPass::SecondPass, Some(prefilled));
    }

    fn draw_normals(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>) {
        self.solid_pass(calls, ctx, ShaderPass::Normals, None);
    }

    fn draw_glow(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>) {
        if !calls.has_glowing_objects() {
            return;
        }
        if let Some(glow) = calls.glow_buffer() {
            glow.draw(ctx.recorder, ctx.resources, self.submit);
        }
    }

    fn draw_shadows(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>, cascade: usize) {
        if let Some(shadow) = calls.shadow_buffer() {
            for material in SHADOW_MATERIALS {
                shadow.draw(ctx.recorder, ctx.resources, material, cascade, self.submit);
            }
        }
    }

    fn draw_reflective_shadow_map(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        rsm_matrix: Mat4,
    ) {
        // No instanced splatting RSM program exists yet.
        render_explicit_rsm(
            calls,
            ctx,
            &self.strategy,
            &[ShaderType::Splatting],
            rsm_matrix,
        );
        if let Some(rsm) = calls.rsm_buffer() {
            for material in RSM_MATERIALS {
                rsm.draw(ctx.recorder, ctx.resources, material, rsm_matrix, self.submit);
            }
        }
    }
}
