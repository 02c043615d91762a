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

//! Implements the explicit draw policy.
//!
//! The `ExplicitDrawLane` draws every visible (mesh, node) pair with its own
//! draw call and a model-matrix uniform. It needs no optional GPU feature
//! and is the fallback when indirect drawing is unavailable. No command
//! buffer is filled under this policy; everything it draws comes from the
//! explicit lists of [`DrawCalls`].

use super::draw_calls::DrawCalls;
use super::policy::{
    render_explicit, render_explicit_rsm, render_explicit_solid, DrawContext, DrawPolicy,
    ExplicitPass,
};
use super::textures::PrefilledTextures;
use nitro_core::{
    math::Mat4,
    renderer::api::{
        PassUniforms, RenderStrategy, ShaderPass, ShaderType, SubmissionMode, VertexLayout,
    },
};

const FIRST_PASS_ORDER: [ShaderType; 8] = [
    ShaderType::Solid,
    ShaderType::Splatting,
    ShaderType::SolidUnlit,
    ShaderType::AlphaTest,
    ShaderType::Vegetation,
    ShaderType::NormalMap,
    ShaderType::SphereMap,
    ShaderType::DetailMap,
];

const SECOND_PASS_ORDER: [ShaderType; 8] = [
    ShaderType::Solid,
    ShaderType::AlphaTest,
    ShaderType::SolidUnlit,
    ShaderType::Splatting,
    ShaderType::SphereMap,
    ShaderType::DetailMap,
    ShaderType::Vegetation,
    ShaderType::NormalMap,
];

const SHADOW_ORDER: [ShaderType; 8] = [
    ShaderType::Solid,
    ShaderType::SphereMap,
    ShaderType::DetailMap,
    ShaderType::Splatting,
    ShaderType::NormalMap,
    ShaderType::AlphaTest,
    ShaderType::SolidUnlit,
    ShaderType::Vegetation,
];

const RSM_ORDER: [ShaderType; 6] = [
    ShaderType::Solid,
    ShaderType::AlphaTest,
    ShaderType::NormalMap,
    ShaderType::SolidUnlit,
    ShaderType::DetailMap,
    ShaderType::Splatting,
];

/// A draw policy issuing one draw call per visible node.
#[derive(Debug, Clone)]
pub struct ExplicitDrawLane {
    strategy: RenderStrategy,
}

impl ExplicitDrawLane {
    /// Creates the lane for `strategy`.
    pub fn new(strategy: RenderStrategy) -> Self {
        Self { strategy }
    }
}

impl nitro_core::lane::Lane for ExplicitDrawLane {
    fn strategy_name(&self) -> &'static str {
        "Explicit"
    }

    fn submission_mode(&self) -> SubmissionMode {
        SubmissionMode::PerMeshDraw
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl DrawPolicy for ExplicitDrawLane {
    fn draw_solid_first_pass(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>) {
        render_explicit_solid(
            calls,
            ctx,
            &self.strategy,
            &FIRST_PASS_ORDER,
            ShaderPass::FirstPass,
            None,
        );
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
            &SECOND_PASS_ORDER,
            ShaderPass::SecondPass,
            Some(prefilled),
        );
    }

    /// Normals are only visualized on the instanced path.
    fn draw_normals(&self, _calls: &DrawCalls, _ctx: &mut DrawContext<'_>) {}

    fn draw_glow(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>) {
        let glows = calls.explicit().glow();
        if glows.is_empty() {
            return;
        }
        ctx.recorder.use_program(
            ctx.resources
                .program(ShaderType::Solid, ShaderPass::Glow, false),
        );
        if self.strategy.base_instance {
            ctx.recorder
                .bind_vertex_array(ctx.resources.vertex_array(VertexLayout::Standard));
        }
        for glow in glows {
            let mesh = &glow.mesh;
            if mesh.vertex_layout != VertexLayout::Standard {
                log::error!(
                    "Wrong vertex layout {:?} associated to glow (hint texture: {})",
                    mesh.vertex_layout,
                    mesh.diagnostic_name()
                );
                continue;
            }
            if !self.strategy.base_instance {
                ctx.recorder.bind_vertex_array(mesh.vertex_array);
            }
            ctx.recorder.set_uniforms(&PassUniforms::Model(glow.model));
            ctx.recorder.set_uniforms(&PassUniforms::GlowColor(glow.color));
            ctx.recorder.draw_elements(
                mesh.index_count,
                mesh.index_format,
                mesh.first_index,
                mesh.base_vertex,
            );
        }
    }

    fn draw_shadows(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>, cascade: usize) {
        for material in SHADOW_ORDER {
            render_explicit(
                ctx,
                &self.strategy,
                calls.explicit().shadow(material, cascade),
                &ExplicitPass {
                    material,
                    pass: ShaderPass::Shadow,
                    uniforms: PassUniforms::Cascade(cascade as u32),
                    prefilled: None,
                },
            );
        }
    }

    fn draw_reflective_shadow_map(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        rsm_matrix: Mat4,
    ) {
        render_explicit_rsm(calls, ctx, &self.strategy, &RSM_ORDER, rsm_matrix);
    }
}
