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

// Nitro Sandbox
// Renders a synthetic track on the headless device through every draw
// policy the selected hardware profile supports.
//
// Usage: sandbox [capability profile] [settings]

use anyhow::{Context, Result};
use nitro_agents::render_agent::{FrameInput, NoHooks, RenderAgent};
use nitro_core::{
    math::{AffineTransform, LinearRgba, Mat4, Vec3},
    renderer::{
        GpuCapabilities, GpuMesh, MeshId, RenderSettings, ShaderType, SubmissionMode,
        VertexLayout,
    },
    scene::{GlowingNode, MeshNode},
};
use nitro_infra::{profile, HeadlessDevice, HeadlessResources, RecordingRecorder};
use nitro_lanes::render_lane::{PrefilledTextures, VisibleObject, VisibleScene};
use std::sync::Arc;

const DEFAULT_PROFILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/profiles/desktop.ron");
const DEFAULT_SETTINGS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/settings.ron");
const FRAMES: usize = 3;

/// Meshes of the synthetic track, packed back to back in shared buffers.
struct TrackMeshes {
    rock: Arc<GpuMesh>,
    tree: Arc<GpuMesh>,
    wall: Arc<GpuMesh>,
    terrain: Arc<GpuMesh>,
    water: Arc<GpuMesh>,
    kart: Arc<GpuMesh>,
}

impl TrackMeshes {
    fn new() -> Self {
        let mut next_index = 0;
        let mut mesh = |id: u64, name: &str, layout: VertexLayout, index_count: u32| {
            let mesh = GpuMesh::new(MeshId(id), name, layout, index_count)
                .with_location(next_index, 0);
            next_index += index_count;
            Arc::new(mesh)
        };
        Self {
            rock: mesh(1, "rock", VertexLayout::Standard, 300),
            tree: mesh(2, "tree", VertexLayout::Standard, 960),
            wall: mesh(3, "wall", VertexLayout::Tangents, 36),
            terrain: mesh(4, "terrain", VertexLayout::TwoTexCoords, 6000),
            water: mesh(5, "water", VertexLayout::Standard, 600),
            kart: mesh(6, "kart", VertexLayout::Standard, 1800),
        }
    }
}

fn node(name: &str, x: f32, z: f32) -> MeshNode {
    MeshNode::new(name, AffineTransform::from_translation(Vec3::new(x, 0.0, z)))
}

/// What `camera` sees: the shared scenery and the karts around it.
fn visible_scene(meshes: &TrackMeshes, camera: usize) -> VisibleScene {
    let mut scene = VisibleScene::new();
    let offset = camera as f32 * 50.0;

    scene.push(VisibleObject::new(
        meshes.terrain.clone(),
        node("terrain", 0.0, 0.0),
        ShaderType::Splatting,
    ));
    for i in 0..40 {
        let x = (i % 8) as f32 * 12.0 + offset;
        scene.push(VisibleObject::new(
            meshes.rock.clone(),
            node("rock", x, (i / 8) as f32 * 9.0),
            ShaderType::Solid,
        ));
    }
    for i in 0..120 {
        let tree = VisibleObject::new(
            meshes.tree.clone(),
            node("tree", i as f32 * 3.0 + offset, 40.0),
            ShaderType::Vegetation,
        );
        // Distant trees only reach the outer cascades.
        let tree = if i >= 60 {
            tree.with_cascades(0b1100)
        } else {
            tree
        };
        scene.push(tree);
    }
    for i in 0..16 {
        scene.push(VisibleObject::new(
            meshes.wall.clone(),
            node("wall", i as f32 * 4.0, -10.0),
            ShaderType::NormalMap,
        ));
    }
    scene.push(
        VisibleObject::new(
            meshes.water.clone(),
            node("water", 0.0, 80.0).with_texture_matrix(),
            ShaderType::Solid,
        )
        .without_rsm(),
    );
    let kart_colors = [LinearRgba::RED, LinearRgba::GREEN, LinearRgba::BLUE];
    for (i, color) in kart_colors.into_iter().enumerate() {
        let position = Vec3::new(i as f32 * 2.0 + offset, 0.0, 5.0);
        let transform = AffineTransform::from_translation(position);
        scene.push(VisibleObject::new(
            meshes.kart.clone(),
            GlowingNode::new("kart", transform, color),
            ShaderType::Solid,
        ));
    }
    scene
}

fn load_inputs() -> Result<(GpuCapabilities, RenderSettings)> {
    let mut args = std::env::args().skip(1);
    let profile_path = args.next().unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let settings_path = args.next().unwrap_or_else(|| DEFAULT_SETTINGS.to_string());

    let caps = profile::load_capabilities(&profile_path)?;
    let settings = profile::load_settings(&settings_path)?;
    Ok((caps, settings))
}

fn run_policy(
    caps: GpuCapabilities,
    settings: &RenderSettings,
    mode: SubmissionMode,
    cameras: &[VisibleScene],
) -> Result<()> {
    let device = HeadlessDevice::new(caps);
    let resources = HeadlessResources::new();
    let settings = RenderSettings {
        preferred_submission: Some(mode),
        ..settings.clone()
    };
    let mut agent = RenderAgent::new(&device, settings)
        .with_context(|| format!("creating the {mode} renderer"))?;
    agent.on_track_load();

    let prefilled = PrefilledTextures::default();
    let frame = FrameInput {
        cameras,
        track_has_shadows: true,
        rsm_matrix: Mat4::IDENTITY,
        prefilled: &prefilled,
    };

    let mut recorder = RecordingRecorder::new();
    for _ in 0..FRAMES {
        recorder.clear();
        agent.render_frame(&device, &mut recorder, &resources, &frame, &mut NoHooks)?;

        let stats = agent.stats();
        log::info!(
            "[{}] frame {}: {} draw calls, {} triangles (solid {}, shadows {}, rsm {}, glow {})",
            agent.policy_name(),
            agent.frame_count(),
            recorder.draw_call_count(),
            stats.total_poly_count(),
            stats.solid_poly_count,
            stats.shadow_poly_count,
            stats.rsm_poly_count,
            stats.glow_poly_count,
        );
        if stats.truncated_fills > 0 {
            log::warn!("[{}] {} truncated cameras", agent.policy_name(), stats.truncated_fills);
        }
        for violation in recorder.violations() {
            log::error!("[{}] {violation}", agent.policy_name());
        }
    }

    log::info!(
        "[{}] estimated cost {:.0}, {} buffers, {} bytes",
        agent.policy_name(),
        agent.estimate_cost(),
        device.live_buffers(),
        device.allocated_bytes()
    );
    agent.release(&device);
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let (caps, settings) = load_inputs()?;
    let meshes = TrackMeshes::new();
    let cameras: Vec<VisibleScene> = (0..settings.camera_count.max(1))
        .map(|camera| visible_scene(&meshes, camera))
        .collect();

    for mode in SubmissionMode::ALL {
        if let Err(e) = mode.check(&caps) {
            log::info!("Skipping {mode}: {e}");
            continue;
        }
        run_policy(caps, &settings, mode, &cameras)?;
    }
    Ok(())
}
