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

//! Per-frame preparation of every draw call.
//!
//! [`DrawCalls`] turns the visible scene into [`MeshMap`]s keyed by material
//! bucket, then fills the command buffers in a fixed order: solid, shadow,
//! reflective shadow map, glow. Objects the instanced path cannot draw are
//! collected into [`ExplicitLists`] instead.

use super::command_buffer::{
    CommandBufferError, GlowCommandBuffer, RsmCommandBuffer, ShadowCommandBuffer,
    SolidCommandBuffer, GLOW_BUCKET, RSM_MATERIALS, SHADOW_MATERIALS,
};
use nitro_core::{
    lane::DrawWorkload,
    math::{LinearRgba, Mat4},
    renderer::{
        api::{
            FenceId, GpuMesh, RenderSettings, RenderStrategy, ShaderType, SubmissionMode,
            SHADERTYPE_COUNT, SHADOW_CASCADE_COUNT,
        },
        traits::GraphicsDevice,
    },
    scene::{HasGlowColor, MeshMap, SceneNode, SceneObject},
};
use std::sync::Arc;

/// Bit set of the shadow cascades an object overlaps.
pub type CascadeMask = u8;

/// Mask with every cascade set.
pub const ALL_CASCADES: CascadeMask = (1 << SHADOW_CASCADE_COUNT) - 1;

/// One object the culling step found visible.
#[derive(Debug, Clone)]
pub struct VisibleObject {
    /// The mesh to draw.
    pub mesh: Arc<GpuMesh>,
    /// The node instancing it.
    pub object: SceneObject,
    /// The material the mesh is drawn with.
    pub material: ShaderType,
    /// Shadow cascades the object falls into.
    pub cascades: CascadeMask,
    /// Whether the object is rendered into the reflective shadow map.
    pub casts_rsm: bool,
}

impl VisibleObject {
    /// A visible object casting into every cascade and the RSM.
    pub fn new(mesh: Arc<GpuMesh>, object: impl Into<SceneObject>, material: ShaderType) -> Self {
        Self {
            mesh,
            object: object.into(),
            material,
            cascades: ALL_CASCADES,
            casts_rsm: true,
        }
    }

    /// Restricts the cascades the object is rendered into.
    pub fn with_cascades(mut self, cascades: CascadeMask) -> Self {
        self.cascades = cascades;
        self
    }

    /// Excludes the object from the reflective shadow map.
    pub fn without_rsm(mut self) -> Self {
        self.casts_rsm = false;
        self
    }

    fn in_cascade(&self, cascade: usize) -> bool {
        self.cascades & (1 << cascade) != 0
    }
}

/// The visible part of the scene for one camera.
#[derive(Debug, Clone, Default)]
pub struct VisibleScene {
    /// Visible objects in traversal order.
    pub objects: Vec<VisibleObject>,
}

impl VisibleScene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a visible object.
    pub fn push(&mut self, object: VisibleObject) {
        self.objects.push(object);
    }
}

/// One node drawn outside the instanced path.
#[derive(Debug, Clone)]
pub struct ExplicitDraw {
    /// The mesh to draw.
    pub mesh: Arc<GpuMesh>,
    /// The node's world matrix.
    pub model: Mat4,
}

impl ExplicitDraw {
    fn new(mesh: &Arc<GpuMesh>, node: &dyn SceneNode) -> Self {
        Self {
            mesh: mesh.clone(),
            model: node.absolute_transform().to_matrix(),
        }
    }
}

/// One glowing node drawn outside the instanced path.
#[derive(Debug, Clone)]
pub struct ExplicitGlowDraw {
    /// The mesh to draw.
    pub mesh: Arc<GpuMesh>,
    /// The node's world matrix.
    pub model: Mat4,
    /// The glow color.
    pub color: LinearRgba,
}

/// Per-material lists of nodes drawn one by one.
#[derive(Debug, Clone)]
pub struct ExplicitLists {
    solid: Vec<Vec<ExplicitDraw>>,
    shadow: Vec<Vec<ExplicitDraw>>,
    rsm: Vec<Vec<ExplicitDraw>>,
    glow: Vec<ExplicitGlowDraw>,
}

impl Default for ExplicitLists {
    fn default() -> Self {
        Self {
            solid: vec![Vec::new(); SHADERTYPE_COUNT],
            shadow: vec![Vec::new(); SHADERTYPE_COUNT * SHADOW_CASCADE_COUNT],
            rsm: vec![Vec::new(); SHADERTYPE_COUNT],
            glow: Vec::new(),
        }
    }
}

impl ExplicitLists {
    /// Draws of `material` in the solid passes.
    pub fn solid(&self, material: ShaderType) -> &[ExplicitDraw] {
        &self.solid[material.id()]
    }

    /// Draws of `material` in shadow cascade `cascade`.
    pub fn shadow(&self, material: ShaderType, cascade: usize) -> &[ExplicitDraw] {
        self.shadow
            .get(material.shadow_bucket(cascade))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Draws of `material` in the reflective shadow map.
    pub fn reflective_shadow_map(&self, material: ShaderType) -> &[ExplicitDraw] {
        &self.rsm[material.id()]
    }

    /// Glowing nodes, only filled under the explicit policy.
    pub fn glow(&self) -> &[ExplicitGlowDraw] {
        &self.glow
    }

    /// Number of explicit solid draws.
    pub fn solid_draw_count(&self) -> usize {
        self.solid.iter().map(Vec::len).sum()
    }

    fn clear(&mut self, keep_rsm: bool) {
        self.solid.iter_mut().for_each(Vec::clear);
        self.shadow.iter_mut().for_each(Vec::clear);
        if !keep_rsm {
            self.rsm.iter_mut().for_each(Vec::clear);
        }
        self.glow.clear();
    }
}

/// Counters of the last prepared frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCallStats {
    /// Triangles of one solid pass.
    pub solid_poly_count: u64,
    /// Triangles across all shadow cascades.
    pub shadow_poly_count: u64,
    /// Triangles of the reflective shadow map, when it was filled this frame.
    pub rsm_poly_count: u64,
    /// Triangles of the glow pass.
    pub glow_poly_count: u64,
    /// Visible (mesh, node) pairs.
    pub visible_instances: usize,
    /// Instances packed into solid instance streams.
    pub instanced_solid: usize,
    /// Solid draws going through the explicit path.
    pub explicit_solid: usize,
    /// Meshes dropped because of a vertex-layout mismatch.
    pub skipped_meshes: usize,
}

/// The command buffers of the indirect and multidraw policies.
#[derive(Debug)]
struct CommandBuffers {
    solid: SolidCommandBuffer,
    shadow: ShadowCommandBuffer,
    rsm: RsmCommandBuffer,
    glow: GlowCommandBuffer,
}

impl CommandBuffers {
    fn new(device: &dyn GraphicsDevice, strategy: RenderStrategy) -> Result<Self, CommandBufferError> {
        Ok(Self {
            solid: SolidCommandBuffer::new(device, strategy)?,
            shadow: ShadowCommandBuffer::new(device, strategy)?,
            rsm: RsmCommandBuffer::new(device, strategy)?,
            glow: GlowCommandBuffer::new(device, strategy)?,
        })
    }

    fn release(&self, device: &dyn GraphicsDevice) {
        self.solid.release(device);
        self.shadow.release(device);
        self.rsm.release(device);
        self.glow.release(device);
    }
}

/// Gathers the visible scene and fills the command buffers every frame.
#[derive(Debug)]
pub struct DrawCalls {
    strategy: RenderStrategy,
    buffers: Option<CommandBuffers>,
    solid_map: MeshMap,
    shadow_map: MeshMap,
    rsm_map: MeshMap,
    glow_map: MeshMap<dyn HasGlowColor>,
    explicit: ExplicitLists,
    rsm_filled: bool,
    rsm_fresh: bool,
    glowing_objects: usize,
    stats: DrawCallStats,
    last_fence: Option<FenceId>,
}

impl DrawCalls {
    /// Creates the orchestrator. Command buffers are only allocated when the
    /// strategy submits through the indirect path.
    pub fn new(
        device: &dyn GraphicsDevice,
        strategy: RenderStrategy,
    ) -> Result<Self, CommandBufferError> {
        let buffers = match strategy.submission {
            SubmissionMode::PerMeshDraw => None,
            SubmissionMode::IndirectPerMesh | SubmissionMode::HardwareMultidraw => {
                Some(CommandBuffers::new(device, strategy)?)
            }
        };
        Ok(Self {
            strategy,
            buffers,
            solid_map: MeshMap::new(SHADERTYPE_COUNT),
            shadow_map: MeshMap::new(SHADERTYPE_COUNT * SHADOW_CASCADE_COUNT),
            rsm_map: MeshMap::new(SHADERTYPE_COUNT),
            glow_map: MeshMap::new(1),
            explicit: ExplicitLists::default(),
            rsm_filled: false,
            rsm_fresh: false,
            glowing_objects: 0,
            stats: DrawCallStats::default(),
            last_fence: None,
        })
    }

    /// The strategy in use.
    pub fn strategy(&self) -> &RenderStrategy {
        &self.strategy
    }

    /// Classifies `scene` and fills every command buffer the frame needs.
    ///
    /// Fills run in the order solid, shadow (when shadows are active),
    /// reflective shadow map (once until
    /// [`reset_reflective_shadow_map`](Self::reset_reflective_shadow_map)),
    /// glow. A failing fill does not stop the ones after it; the first error
    /// is returned once all have run, and the buffers hold what was packed
    /// before the failure.
    pub fn prepare_draw_calls(
        &mut self,
        device: &dyn GraphicsDevice,
        scene: &VisibleScene,
        settings: &RenderSettings,
    ) -> Result<(), CommandBufferError> {
        let shadows = settings.shadows_active();
        let fill_rsm = settings.global_illumination_active() && !self.rsm_filled;
        let glow = settings.glow_active();

        self.clear(fill_rsm);
        self.classify(scene, shadows, fill_rsm, glow);

        let mut first_error = None;
        let mut record = |result: Result<(), CommandBufferError>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        if let Some(buffers) = self.buffers.as_mut() {
            record(buffers.solid.fill(device, &self.solid_map));
            if shadows {
                record(buffers.shadow.fill(device, &self.shadow_map));
            }
            if fill_rsm {
                record(buffers.rsm.fill(device, &self.rsm_map));
            }
            if glow && !self.glow_map.is_empty() {
                record(buffers.glow.fill(device, &self.glow_map));
            }
        }
        if fill_rsm {
            self.rsm_filled = true;
            self.rsm_fresh = true;
        }

        self.update_stats(shadows, fill_rsm, glow);
        log::debug!(
            "Prepared draw calls: {} instances, {} explicit solid draws, {} solid triangles",
            self.stats.visible_instances,
            self.stats.explicit_solid,
            self.stats.solid_poly_count
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn clear(&mut self, fill_rsm: bool) {
        self.solid_map.clear();
        self.shadow_map.clear();
        self.glow_map.clear();
        self.explicit.clear(!fill_rsm);
        if fill_rsm {
            self.rsm_map.clear();
        }
        self.rsm_fresh = false;
        self.glowing_objects = 0;
        self.stats = DrawCallStats::default();
    }

    /// Whether `object` must be drawn one by one under the current strategy.
    fn is_explicit(&self, object: &VisibleObject, node: &dyn SceneNode) -> bool {
        self.buffers.is_none()
            || !object.material.is_instanced()
            || (object.material.supports_texture_matrix() && node.has_texture_matrix())
    }

    fn classify(&mut self, scene: &VisibleScene, shadows: bool, fill_rsm: bool, glow: bool) {
        for object in &scene.objects {
            let node = object.object.node();
            let material = object.material;
            let explicit = self.is_explicit(object, node.as_ref());
            self.stats.visible_instances += 1;

            if explicit {
                self.explicit.solid[material.id()].push(ExplicitDraw::new(&object.mesh, node.as_ref()));
            } else {
                self.solid_map.push(material.id(), &object.mesh, node.clone());
            }

            if shadows {
                self.classify_shadow(object, &node);
            }

            if fill_rsm && object.casts_rsm {
                self.classify_rsm(object, &node);
            }

            if glow {
                if let Some(glowing) = object.object.glow() {
                    self.glowing_objects += 1;
                    if self.buffers.is_none() {
                        self.explicit.glow.push(ExplicitGlowDraw {
                            mesh: object.mesh.clone(),
                            model: glowing.absolute_transform().to_matrix(),
                            color: glowing.glow_color(),
                        });
                    } else {
                        self.glow_map.push(GLOW_BUCKET, &object.mesh, glowing);
                    }
                }
            }
        }
    }

    /// Texture matrices do not matter for depth-only rendering, so under the
    /// indirect path every instanced material goes through the shadow
    /// buffer. Splatting casts no shadow there.
    fn classify_shadow(&mut self, object: &VisibleObject, node: &Arc<dyn SceneNode>) {
        let material = object.material;
        let instanced = self.buffers.is_some();
        if instanced && !SHADOW_MATERIALS.contains(&material) {
            return;
        }
        for cascade in (0..SHADOW_CASCADE_COUNT).filter(|&c| object.in_cascade(c)) {
            let bucket = material.shadow_bucket(cascade);
            if instanced {
                self.shadow_map.push(bucket, &object.mesh, node.clone());
            } else {
                self.explicit.shadow[bucket].push(ExplicitDraw::new(&object.mesh, node.as_ref()));
            }
        }
    }

    /// Splatting has no instanced RSM program and is always drawn explicitly.
    fn classify_rsm(&mut self, object: &VisibleObject, node: &Arc<dyn SceneNode>) {
        let material = object.material;
        if material == ShaderType::Splatting || self.buffers.is_none() {
            if material == ShaderType::Splatting || RSM_MATERIALS.contains(&material) {
                self.explicit.rsm[material.id()]
                    .push(ExplicitDraw::new(&object.mesh, node.as_ref()));
            }
        } else if RSM_MATERIALS.contains(&material) {
            self.rsm_map.push(material.id(), &object.mesh, node.clone());
        }
    }

    fn update_stats(&mut self, shadows: bool, fill_rsm: bool, glow: bool) {
        let explicit_polys = |draws: &[Vec<ExplicitDraw>]| -> u64 {
            draws
                .iter()
                .flatten()
                .map(|draw| u64::from(draw.mesh.triangle_count()))
                .sum()
        };

        let stats = &mut self.stats;
        stats.explicit_solid = self.explicit.solid_draw_count();
        stats.solid_poly_count = explicit_polys(&self.explicit.solid);
        if shadows {
            stats.shadow_poly_count = explicit_polys(&self.explicit.shadow);
        }
        if fill_rsm {
            stats.rsm_poly_count = explicit_polys(&self.explicit.rsm);
        }
        stats.glow_poly_count = self
            .explicit
            .glow
            .iter()
            .map(|draw| u64::from(draw.mesh.triangle_count()))
            .sum();

        if let Some(buffers) = &self.buffers {
            stats.solid_poly_count += buffers.solid.poly_count();
            stats.instanced_solid = buffers.solid.instance_count();
            stats.skipped_meshes = buffers.solid.skipped_meshes();
            if shadows {
                stats.shadow_poly_count += buffers.shadow.poly_count();
                stats.skipped_meshes += buffers.shadow.skipped_meshes();
            }
            if fill_rsm {
                stats.rsm_poly_count += buffers.rsm.poly_count();
                stats.skipped_meshes += buffers.rsm.skipped_meshes();
            }
            if glow && self.glowing_objects > 0 {
                stats.glow_poly_count += buffers.glow.poly_count();
                stats.skipped_meshes += buffers.glow.skipped_meshes();
            }
        }
    }

    /// Re-arms the one-shot reflective shadow map fill, on track load.
    pub fn reset_reflective_shadow_map(&mut self) {
        self.rsm_filled = false;
        self.rsm_fresh = false;
    }

    /// Whether the reflective shadow map was filled and not reset since.
    pub fn is_reflective_shadow_map_filled(&self) -> bool {
        self.rsm_filled
    }

    /// Whether the last [`prepare_draw_calls`](Self::prepare_draw_calls)
    /// filled the reflective shadow map, so it must be rendered this frame.
    pub fn has_fresh_reflective_shadow_map(&self) -> bool {
        self.rsm_fresh
    }

    /// Whether the last frame had glowing objects to draw.
    pub fn has_glowing_objects(&self) -> bool {
        self.glowing_objects > 0
    }

    /// The nodes drawn one by one.
    pub fn explicit(&self) -> &ExplicitLists {
        &self.explicit
    }

    /// The solid command buffer, absent under the explicit policy.
    pub fn solid_buffer(&self) -> Option<&SolidCommandBuffer> {
        self.buffers.as_ref().map(|b| &b.solid)
    }

    /// The shadow command buffer, absent under the explicit policy.
    pub fn shadow_buffer(&self) -> Option<&ShadowCommandBuffer> {
        self.buffers.as_ref().map(|b| &b.shadow)
    }

    /// The RSM command buffer, absent under the explicit policy.
    pub fn rsm_buffer(&self) -> Option<&RsmCommandBuffer> {
        self.buffers.as_ref().map(|b| &b.rsm)
    }

    /// The glow command buffer, absent under the explicit policy.
    pub fn glow_buffer(&self) -> Option<&GlowCommandBuffer> {
        self.buffers.as_ref().map(|b| &b.glow)
    }

    /// Counters of the last prepared frame.
    pub fn stats(&self) -> &DrawCallStats {
        &self.stats
    }

    /// The solid workload of the last frame, for cost estimation.
    pub fn workload(&self) -> DrawWorkload {
        match self.solid_buffer() {
            Some(solid) => DrawWorkload {
                buckets: solid.active_buckets()
                    + self.explicit.solid.iter().filter(|l| !l.is_empty()).count(),
                commands: solid.commands().len() + self.stats.explicit_solid,
                instances: self.stats.visible_instances,
            },
            None => DrawWorkload {
                buckets: self.explicit.solid.iter().filter(|l| !l.is_empty()).count(),
                commands: self.stats.explicit_solid,
                instances: self.stats.visible_instances,
            },
        }
    }

    /// Stores the fence of the frame just submitted.
    pub fn set_fence(&mut self, fence: FenceId) {
        self.last_fence = Some(fence);
    }

    /// The fence of the last submitted frame, polled before reusing its
    /// buffers.
    pub fn last_fence(&self) -> Option<FenceId> {
        self.last_fence
    }

    /// Destroys the GPU buffers.
    pub fn release(&self, device: &dyn GraphicsDevice) {
        if let Some(buffers) = &self.buffers {
            buffers.release(device);
        }
    }
}
