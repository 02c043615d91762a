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

//! The draw-policy contract and the explicit render loops every policy shares.

use super::draw_calls::{DrawCalls, ExplicitDraw};
use super::explicit_lane::ExplicitDrawLane;
use super::instanced_lane::InstancedDrawLane;
use super::textures::{expand_textures, PrefilledTextures};
use nitro_core::{
    lane::Lane,
    math::Mat4,
    renderer::{
        api::{PassUniforms, RenderStrategy, ShaderPass, ShaderType},
        traits::{DrawRecorder, RenderResources},
    },
};

/// The recorder and resources a policy draws with.
pub struct DrawContext<'a> {
    /// Where draw calls are recorded.
    pub recorder: &'a mut dyn DrawRecorder,
    /// Programs and vertex arrays.
    pub resources: &'a dyn RenderResources,
}

impl<'a> DrawContext<'a> {
    /// Bundles a recorder and resources.
    pub fn new(recorder: &'a mut dyn DrawRecorder, resources: &'a dyn RenderResources) -> Self {
        Self {
            recorder,
            resources,
        }
    }
}

/// A strategy submitting the prepared draw calls of a frame.
///
/// The renderer selects one policy at startup from the GPU capabilities and
/// calls it for every pass of every camera. All policies draw the same
/// geometry; they differ in how many GPU calls they need to do it.
pub trait DrawPolicy: Lane {
    /// Writes the geometry buffer: normals and roughness.
    fn draw_solid_first_pass(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>);

    /// Shades solid geometry with the light buffers in `prefilled`.
    fn draw_solid_second_pass(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        prefilled: &PrefilledTextures,
    );

    /// Draws vertex normals for debugging.
    fn draw_normals(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>);

    /// Draws glowing objects with their flat glow color.
    fn draw_glow(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>);

    /// Renders shadow casters into `cascade`.
    fn draw_shadows(&self, calls: &DrawCalls, ctx: &mut DrawContext<'_>, cascade: usize);

    /// Renders the reflective shadow map seen through `rsm_matrix`.
    fn draw_reflective_shadow_map(
        &self,
        calls: &DrawCalls,
        ctx: &mut DrawContext<'_>,
        rsm_matrix: Mat4,
    );
}

/// Creates the policy matching `strategy.submission`.
///
/// The policy still has to be initialized against the GPU capabilities with
/// [`Lane::on_initialize`] before use.
pub fn select_policy(strategy: RenderStrategy) -> Box<dyn DrawPolicy> {
    match InstancedDrawLane::new(strategy) {
        Some(lane) => Box::new(lane),
        None => Box::new(ExplicitDrawLane::new(strategy)),
    }
}

/// A non-instanced render loop over one list.
pub(crate) struct ExplicitPass<'a> {
    pub material: ShaderType,
    pub pass: ShaderPass,
    pub uniforms: PassUniforms,
    pub prefilled: Option<&'a PrefilledTextures>,
}

/// Draws every entry of `draws` with the non-instanced program of the pass.
///
/// When base instance works every mesh of a vertex layout shares one vertex
/// array, bound once; otherwise each mesh binds its own. Meshes whose vertex
/// layout does not match the material are logged and skipped.
pub(crate) fn render_explicit(
    ctx: &mut DrawContext<'_>,
    strategy: &RenderStrategy,
    draws: &[ExplicitDraw],
    pass: &ExplicitPass<'_>,
) {
    if draws.is_empty() {
        return;
    }
    let material = pass.material;
    let layout = material.vertex_layout();
    ctx.recorder
        .use_program(ctx.resources.program(material, pass.pass, false));
    ctx.recorder.set_uniforms(&pass.uniforms);
    if strategy.base_instance {
        ctx.recorder
            .bind_vertex_array(ctx.resources.vertex_array(layout));
    }

    for draw in draws {
        let mesh = &draw.mesh;
        if mesh.vertex_layout != layout {
            log::error!(
                "Wrong vertex layout {:?} associated to {} {} (hint texture: {})",
                mesh.vertex_layout,
                material,
                pass.pass,
                mesh.diagnostic_name()
            );
            continue;
        }
        if !strategy.base_instance {
            ctx.recorder.bind_vertex_array(mesh.vertex_array);
        }
        expand_textures(
            ctx.recorder,
            strategy.textures,
            mesh,
            material,
            pass.pass,
            pass.prefilled,
        );
        ctx.recorder.set_uniforms(&PassUniforms::Model(draw.model));
        ctx.recorder.draw_elements(
            mesh.index_count,
            mesh.index_format,
            mesh.first_index,
            mesh.base_vertex,
        );
    }
}

/// Draws the explicit solid lists of `materials` for `pass`.
pub(crate) fn render_explicit_solid(
    calls: &DrawCalls,
    ctx: &mut DrawContext<'_>,
    strategy: &RenderStrategy,
    materials: &[ShaderType],
    pass: ShaderPass,
    prefilled: Option<&PrefilledTextures>,
) {
    for &material in materials {
        render_explicit(
            ctx,
            strategy,
            calls.explicit().solid(material),
            &ExplicitPass {
                material,
                pass,
                uniforms: PassUniforms::None,
                prefilled,
            },
        );
    }
}

/// Draws the explicit RSM lists of `materials`.
pub(crate) fn render_explicit_rsm(
    calls: &DrawCalls,
    ctx: &mut DrawContext<'_>,
    strategy: &RenderStrategy,
    materials: &[ShaderType],
    rsm_matrix: Mat4,
) {
    for &material in materials {
        render_explicit(
            ctx,
            strategy,
            calls.explicit().reflective_shadow_map(material),
            &ExplicitPass {
                material,
                pass: ShaderPass::ReflectiveShadowMap,
                uniforms: PassUniforms::RsmMatrix(rsm_matrix),
                prefilled: None,
            },
        );
    }
}

/// Materials the indirect policies still draw explicitly in the solid
/// passes: splatting, and the texture-matrix nodes of the materials that
/// support one.
pub(crate) const EXPLICIT_SOLID_MATERIALS: [ShaderType; 4] = [
    ShaderType::Solid,
    ShaderType::Splatting,
    ShaderType::SolidUnlit,
    ShaderType::AlphaTest,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::command_buffer::Submit;
    use crate::render_lane::draw_calls::{VisibleObject, VisibleScene};
    use nitro_core::{
        math::{AffineTransform, LinearRgba, Vec3},
        renderer::api::{
            GpuCapabilities, GpuMesh, MeshId, RenderSettings, SubmissionMode, TextureHandle,
            TextureId, VertexArrayId, VertexLayout,
        },
        scene::{GlowingNode, MeshNode},
    };
    use nitro_infra::{HeadlessDevice, HeadlessResources, RecordedCommand, RecordingRecorder};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn strategy(caps: &GpuCapabilities, mode: SubmissionMode) -> RenderStrategy {
        RenderStrategy::resolve(caps, Some(mode)).unwrap()
    }

    fn mesh(id: u64, layout: VertexLayout) -> Arc<GpuMesh> {
        Arc::new(
            GpuMesh::new(MeshId(id), format!("mesh{id}"), layout, 30)
                .with_location(id as u32 * 30, 0)
                .with_vertex_array(VertexArrayId(40 + id as usize))
                .with_texture(0, TextureId(id as usize), TextureHandle(id))
                .with_texture(1, TextureId(id as usize + 10), TextureHandle(id + 10)),
        )
    }

    fn node(x: f32) -> MeshNode {
        MeshNode::new("n", AffineTransform::from_translation(Vec3::new(x, 0.0, 0.0)))
    }

    /// Nine instances: two Solid meshes (3 + 2), a normal-mapped mesh (2), a
    /// splatted terrain and a Solid node with a texture matrix.
    fn scene() -> VisibleScene {
        let mut scene = VisibleScene::new();
        let (rock, tree, wall) = (
            mesh(1, VertexLayout::Standard),
            mesh(2, VertexLayout::Standard),
            mesh(3, VertexLayout::Tangents),
        );
        for x in 0..3 {
            scene.push(VisibleObject::new(rock.clone(), node(x as f32), ShaderType::Solid));
        }
        for x in 0..2 {
            scene.push(VisibleObject::new(tree.clone(), node(x as f32), ShaderType::Solid));
            scene.push(VisibleObject::new(wall.clone(), node(x as f32), ShaderType::NormalMap));
        }
        scene.push(VisibleObject::new(
            mesh(4, VertexLayout::TwoTexCoords),
            node(0.0),
            ShaderType::Splatting,
        ));
        scene.push(VisibleObject::new(
            mesh(5, VertexLayout::Standard),
            node(0.0).with_texture_matrix(),
            ShaderType::Solid,
        ));
        scene
    }

    fn prefilled() -> PrefilledTextures {
        PrefilledTextures::new(
            vec![TextureHandle(900), TextureHandle(901), TextureHandle(902)],
            vec![TextureId(90), TextureId(91), TextureId(92)],
        )
    }

    struct Frame {
        device: HeadlessDevice,
        calls: DrawCalls,
        policy: Box<dyn DrawPolicy>,
    }

    fn prepare(caps: GpuCapabilities, mode: SubmissionMode, settings: &RenderSettings) -> Frame {
        prepare_scene(caps, mode, settings, &scene())
    }

    fn prepare_scene(
        caps: GpuCapabilities,
        mode: SubmissionMode,
        settings: &RenderSettings,
        scene: &VisibleScene,
    ) -> Frame {
        let device = HeadlessDevice::new(caps);
        let strategy = strategy(&caps, mode);
        let mut calls = DrawCalls::new(&device, strategy).unwrap();
        calls.prepare_draw_calls(&device, scene, settings).unwrap();
        let mut policy = select_policy(strategy);
        policy.on_initialize(&caps).unwrap();
        Frame {
            device,
            calls,
            policy,
        }
    }

    fn first_pass(frame: &Frame) -> RecordingRecorder {
        let mut recorder = RecordingRecorder::new();
        let resources = HeadlessResources::new();
        let mut ctx = DrawContext::new(&mut recorder, &resources);
        frame.policy.draw_solid_first_pass(&frame.calls, &mut ctx);
        recorder
    }

    #[test]
    fn test_select_policy_follows_submission_mode() {
        let names: Vec<&str> = SubmissionMode::ALL
            .into_iter()
            .map(|mode| select_policy(strategy(&GpuCapabilities::FULL, mode)).strategy_name())
            .collect();
        assert_eq!(names, vec!["Explicit", "Indirect", "Multidraw"]);

        let policy = select_policy(strategy(
            &GpuCapabilities::FULL,
            SubmissionMode::HardwareMultidraw,
        ));
        assert_eq!(policy.submission_mode(), SubmissionMode::HardwareMultidraw);
    }

    #[test]
    fn test_instanced_lane_submits_by_strategy() {
        let caps = GpuCapabilities::FULL;
        assert!(InstancedDrawLane::new(strategy(&caps, SubmissionMode::PerMeshDraw)).is_none());

        for (mode, submit) in [
            (SubmissionMode::IndirectPerMesh, Submit::PerMesh),
            (SubmissionMode::HardwareMultidraw, Submit::Multidraw),
        ] {
            let lane = InstancedDrawLane::new(strategy(&caps, mode)).unwrap();
            assert_eq!(lane.submit(), submit);
            assert_eq!(lane.submission_mode(), mode);
        }
    }

    #[test]
    fn test_policy_rejects_missing_capability_on_initialize() {
        let mut policy = select_policy(strategy(
            &GpuCapabilities::FULL,
            SubmissionMode::HardwareMultidraw,
        ));
        assert!(policy.on_initialize(&GpuCapabilities::MINIMAL).is_err());
    }

    #[test]
    fn test_every_policy_draws_the_same_triangles() {
        let settings = RenderSettings::default();
        let mut call_counts = Vec::new();
        for mode in SubmissionMode::ALL {
            let frame = prepare(GpuCapabilities::FULL, mode, &settings);
            let recorder = first_pass(&frame);
            assert!(recorder.violations().is_empty(), "{mode}: {:?}", recorder.violations());

            let draws = recorder.resolve_draws(&frame.device).unwrap();
            let instances: u32 = draws.iter().map(|d| d.command.instance_count).sum();
            let triangles: u64 = draws.iter().map(|d| d.command.triangle_count()).sum();
            assert_eq!(instances, 9, "{mode}");
            assert_eq!(triangles, 90, "{mode}");
            assert_eq!(triangles, frame.calls.stats().solid_poly_count, "{mode}");
            call_counts.push(recorder.draw_call_count());
        }
        assert_eq!(call_counts, vec![9, 5, 4]);
    }

    /// Instances drawn per (pass slot, material, pass, first index, base
    /// vertex) over the first pass, every cascade and the glow pass. Slot 0 is
    /// the first pass, 1 to 4 the cascades, 5 the glow.
    fn drawn_pairs(frame: &Frame) -> BTreeMap<(usize, ShaderType, String, u32, i32), u32> {
        let resources = HeadlessResources::new();
        let mut recorders: Vec<RecordingRecorder> =
            (0..6).map(|_| RecordingRecorder::new()).collect();
        for (slot, recorder) in recorders.iter_mut().enumerate() {
            let mut ctx = DrawContext::new(recorder, &resources);
            match slot {
                0 => frame.policy.draw_solid_first_pass(&frame.calls, &mut ctx),
                5 => frame.policy.draw_glow(&frame.calls, &mut ctx),
                cascade => frame.policy.draw_shadows(&frame.calls, &mut ctx, cascade - 1),
            }
        }

        let mut drawn = BTreeMap::new();
        for (slot, recorder) in recorders.iter().enumerate() {
            assert!(recorder.violations().is_empty(), "{:?}", recorder.violations());
            for draw in recorder.resolve_draws(&frame.device).unwrap() {
                let (material, pass, _) = resources.describe_program(draw.program).unwrap();
                let key = (
                    slot,
                    material,
                    pass.to_string(),
                    draw.command.first_index,
                    draw.command.base_vertex,
                );
                *drawn.entry(key).or_insert(0) += draw.command.instance_count;
            }
        }
        drawn
    }

    #[test]
    fn test_every_policy_covers_the_same_mesh_material_pairs() {
        let mut scene = scene();
        // Splatting only casts shadows on the explicit path.
        for object in &mut scene.objects {
            if object.material == ShaderType::Splatting {
                object.cascades = 0;
            }
        }
        let rock = mesh(1, VertexLayout::Standard);
        let wall = mesh(3, VertexLayout::Tangents);
        scene.push(VisibleObject::new(
            rock.clone(),
            GlowingNode::new("gift", AffineTransform::IDENTITY, LinearRgba::RED),
            ShaderType::Solid,
        ));
        // Glow draws standard-layout meshes only; this one is skipped everywhere.
        scene.push(VisibleObject::new(
            wall,
            GlowingNode::new("sign", AffineTransform::IDENTITY, LinearRgba::BLUE),
            ShaderType::NormalMap,
        ));

        let settings = RenderSettings::default();
        let frames: Vec<_> = SubmissionMode::ALL
            .into_iter()
            .map(|mode| {
                drawn_pairs(&prepare_scene(GpuCapabilities::FULL, mode, &settings, &scene))
            })
            .collect();

        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[1], frames[2]);

        let glow: Vec<_> = frames[0]
            .iter()
            .filter(|(key, _)| key.0 == 5)
            .map(|(key, instances)| (key.1, key.3, *instances))
            .collect();
        assert_eq!(glow, vec![(ShaderType::Solid, rock.first_index, 1)]);
        for cascade in 1..=4 {
            let casters: u32 = frames[0]
                .iter()
                .filter(|(key, _)| key.0 == cascade)
                .map(|(_, instances)| instances)
                .sum();
            assert_eq!(casters, 10, "cascade {}", cascade - 1);
        }
    }

    #[test]
    fn test_explicit_draws_set_one_model_matrix_each() {
        let frame = prepare(
            GpuCapabilities::FULL,
            SubmissionMode::PerMeshDraw,
            &RenderSettings::default(),
        );
        let recorder = first_pass(&frame);
        let models = recorder
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetUniforms(PassUniforms::Model(_))))
            .count();
        assert_eq!(models, 9);
        // Shared vertex arrays: one bind per material list.
        let binds = recorder
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::BindVertexArray(_)))
            .count();
        assert_eq!(binds, 3);
    }

    #[test]
    fn test_explicit_without_base_instance_binds_each_mesh_array() {
        let frame = prepare(
            GpuCapabilities::MINIMAL,
            SubmissionMode::PerMeshDraw,
            &RenderSettings::default(),
        );
        let recorder = first_pass(&frame);
        let commands = recorder.commands();
        for (i, command) in commands.iter().enumerate() {
            if command.is_draw() {
                let bound = commands[..i].iter().rev().find_map(|c| match c {
                    RecordedCommand::BindVertexArray(v) => Some(*v),
                    _ => None,
                });
                assert!(bound.is_some_and(|v| v.0 > 40), "draw {i} uses a shared array");
            }
        }
        assert!(commands
            .iter()
            .any(|c| matches!(c, RecordedCommand::BindTextures(_))));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, RecordedCommand::BindTextureHandles(_))));
    }

    #[test]
    fn test_second_pass_appends_prefilled_textures() {
        let frame = prepare(
            GpuCapabilities::FULL,
            SubmissionMode::IndirectPerMesh,
            &RenderSettings::default(),
        );
        let mut recorder = RecordingRecorder::new();
        let resources = HeadlessResources::new();
        let textures = prefilled();
        let mut ctx = DrawContext::new(&mut recorder, &resources);
        frame
            .policy
            .draw_solid_second_pass(&frame.calls, &mut ctx, &textures);

        // Solid samples slots 0 and 1, then the three light buffers.
        assert!(recorder.commands().contains(&RecordedCommand::BindTextureHandles(vec![
            TextureHandle(1),
            TextureHandle(11),
            TextureHandle(900),
            TextureHandle(901),
            TextureHandle(902),
        ])));
    }

    #[test]
    fn test_indirect_rsm_draws_splatting_explicitly_first() {
        let settings = RenderSettings {
            global_illumination: true,
            ..RenderSettings::default()
        };
        let frame = prepare(GpuCapabilities::FULL, SubmissionMode::IndirectPerMesh, &settings);
        let mut recorder = RecordingRecorder::new();
        let resources = HeadlessResources::new();
        let mut ctx = DrawContext::new(&mut recorder, &resources);
        frame
            .policy
            .draw_reflective_shadow_map(&frame.calls, &mut ctx, Mat4::IDENTITY);

        let programs: Vec<_> = recorder
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::UseProgram(p) => resources.describe_program(*p),
                _ => None,
            })
            .collect();
        assert_eq!(
            programs,
            vec![
                (ShaderType::Splatting, ShaderPass::ReflectiveShadowMap, false),
                (ShaderType::Solid, ShaderPass::ReflectiveShadowMap, true),
                (ShaderType::NormalMap, ShaderPass::ReflectiveShadowMap, true),
            ]
        );
        assert!(recorder
            .commands()
            .contains(&RecordedCommand::SetUniforms(PassUniforms::RsmMatrix(Mat4::IDENTITY))));
    }

    #[test]
    fn test_shadow_pass_sets_cascade_uniform() {
        for mode in SubmissionMode::ALL {
            let frame = prepare(GpuCapabilities::FULL, mode, &RenderSettings::default());
            let mut recorder = RecordingRecorder::new();
            let resources = HeadlessResources::new();
            let mut ctx = DrawContext::new(&mut recorder, &resources);
            frame.policy.draw_shadows(&frame.calls, &mut ctx, 3);

            assert!(recorder.draw_call_count() > 0, "{mode}");
            assert!(recorder
                .commands()
                .iter()
                .filter(|c| matches!(c, RecordedCommand::SetUniforms(_)))
                .all(|c| matches!(
                    c,
                    RecordedCommand::SetUniforms(PassUniforms::Cascade(3) | PassUniforms::Model(_))
                )));
        }
    }

    #[test]
    fn test_explicit_glow_sets_color_per_node() {
        let device = HeadlessDevice::default();
        let strategy = strategy(&GpuCapabilities::FULL, SubmissionMode::PerMeshDraw);
        let mut calls = DrawCalls::new(&device, strategy).unwrap();
        let mut scene = VisibleScene::new();
        scene.push(VisibleObject::new(
            mesh(1, VertexLayout::Standard),
            GlowingNode::new("gift", AffineTransform::IDENTITY, LinearRgba::GREEN),
            ShaderType::Solid,
        ));
        calls
            .prepare_draw_calls(&device, &scene, &RenderSettings::default())
            .unwrap();

        let mut recorder = RecordingRecorder::new();
        let resources = HeadlessResources::new();
        let mut ctx = DrawContext::new(&mut recorder, &resources);
        select_policy(strategy).draw_glow(&calls, &mut ctx);

        assert_eq!(recorder.draw_call_count(), 1);
        assert!(recorder
            .commands()
            .contains(&RecordedCommand::SetUniforms(PassUniforms::GlowColor(LinearRgba::GREEN))));
    }

    #[test]
    fn test_instanced_glow_skips_frames_without_glowing_objects() {
        let device = HeadlessDevice::default();
        let strategy = strategy(&GpuCapabilities::FULL, SubmissionMode::IndirectPerMesh);
        let mut calls = DrawCalls::new(&device, strategy).unwrap();
        let mut glowing = VisibleScene::new();
        glowing.push(VisibleObject::new(
            mesh(1, VertexLayout::Standard),
            GlowingNode::new("gift", AffineTransform::IDENTITY, LinearRgba::GREEN),
            ShaderType::Solid,
        ));
        let settings = RenderSettings::default();
        let policy = select_policy(strategy);
        let resources = HeadlessResources::new();

        calls.prepare_draw_calls(&device, &glowing, &settings).unwrap();
        let mut recorder = RecordingRecorder::new();
        policy.draw_glow(&calls, &mut DrawContext::new(&mut recorder, &resources));
        assert_eq!(recorder.draw_call_count(), 1);

        calls.prepare_draw_calls(&device, &scene(), &settings).unwrap();
        let mut recorder = RecordingRecorder::new();
        policy.draw_glow(&calls, &mut DrawContext::new(&mut recorder, &resources));
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_normals_only_drawn_by_instanced_policies() {
        let counts: Vec<usize> = SubmissionMode::ALL
            .into_iter()
            .map(|mode| {
                let frame = prepare(GpuCapabilities::FULL, mode, &RenderSettings::default());
                let mut recorder = RecordingRecorder::new();
                let resources = HeadlessResources::new();
                let mut ctx = DrawContext::new(&mut recorder, &resources);
                frame.policy.draw_normals(&frame.calls, &mut ctx);
                recorder.draw_call_count()
            })
            .collect();
        assert_eq!(counts, vec![0, 3, 2]);
    }
}
