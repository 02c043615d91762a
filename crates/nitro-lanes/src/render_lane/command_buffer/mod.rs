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

//! Indirect command buffers and their material buckets.
//!
//! A [`CommandBuffer`] owns one GPU buffer of indirect draw commands and a
//! fixed set of material buckets, each a contiguous run of commands. Every
//! frame it is filled from a [`MeshMap`]: for each bucket, in a fixed material
//! order, every distinct mesh gets one command covering all the nodes
//! instancing it, whose records are packed contiguously into an
//! [`InstanceStream`].
//!
//! The four concrete buffers ([`SolidCommandBuffer`], [`ShadowCommandBuffer`],
//! [`RsmCommandBuffer`], [`GlowCommandBuffer`]) own the instance streams of
//! their record types and expose the draw helpers of their passes.
//!
//! Upload follows the [`UploadStrategy`]: persistently mapped buffers are
//! mapped once at creation and written in place, streamed buffers are mapped
//! with discard semantics at the start of each fill and unmapped at its end,
//! before any draw reads them.

mod glow;
mod rsm;
mod shadow;
mod solid;

pub use glow::{GlowCommandBuffer, GLOW_BUCKET};
pub use rsm::{RsmCommandBuffer, RSM_MATERIALS};
pub use shadow::{ShadowCommandBuffer, SHADOW_MATERIALS};
pub use solid::{SolidCommandBuffer, SOLID_DUAL_TEX_MATERIALS, SOLID_THREE_TEX_MATERIALS};

use super::arena::{Arena, CapacityExceeded, MAX_DRAW_CALLS};
use super::instance::{InstanceRecord, PackInstance};
use super::textures::{expand_textures, PrefilledTextures};
use nitro_core::{
    renderer::{
        api::{
            BufferDescriptor, BufferId, BufferStorage, BufferUsage, DrawElementsIndirectCommand,
            GpuMesh, IndexFormat, InstanceLayout, MapAccess, PassUniforms, RenderStrategy,
            ShaderPass, ShaderType, SubmissionMode, TextureBinding, UploadStrategy, VertexLayout,
            SHADERTYPE_COUNT, SHADOW_CASCADE_COUNT,
        },
        error::ResourceError,
        traits::{DrawRecorder, GraphicsDevice, RenderResources},
    },
    scene::InstanceList,
};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// The kind of a command buffer, which fixes its bucket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferKind {
    /// Solid geometry, one bucket per material.
    Solid,
    /// Shadow cascades, one bucket per (cascade, material).
    Shadow,
    /// Reflective shadow map, one bucket per material.
    ReflectiveShadowMap,
    /// Glowing objects, a single bucket.
    Glow,
}

impl CommandBufferKind {
    /// Number of material buckets.
    pub const fn bucket_count(self) -> usize {
        match self {
            CommandBufferKind::Solid | CommandBufferKind::ReflectiveShadowMap => SHADERTYPE_COUNT,
            CommandBufferKind::Shadow => SHADOW_CASCADE_COUNT * SHADERTYPE_COUNT,
            CommandBufferKind::Glow => 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CommandBufferKind::Solid => "solid_indirect_commands",
            CommandBufferKind::Shadow => "shadow_indirect_commands",
            CommandBufferKind::ReflectiveShadowMap => "rsm_indirect_commands",
            CommandBufferKind::Glow => "glow_indirect_commands",
        }
    }
}

impl fmt::Display for CommandBufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandBufferKind::Solid => write!(f, "Solid"),
            CommandBufferKind::Shadow => write!(f, "Shadow"),
            CommandBufferKind::ReflectiveShadowMap => write!(f, "ReflectiveShadowMap"),
            CommandBufferKind::Glow => write!(f, "Glow"),
        }
    }
}

/// Errors raised while filling a command buffer.
#[derive(Debug, thiserror::Error)]
pub enum CommandBufferError {
    /// The frame has more meshes or instances than the buffer can hold.
    /// Buckets filled before the overflow stay valid.
    #[error("{kind} command buffer overflow: {requested} more {what} requested with {used}/{capacity} used")]
    CapacityExceeded {
        /// The overflowing buffer.
        kind: CommandBufferKind,
        /// `"commands"` or `"instances"`.
        what: &'static str,
        /// Records already written.
        used: usize,
        /// Records the failed write asked for.
        requested: usize,
        /// The fixed capacity.
        capacity: usize,
    },
    /// The device refused a buffer operation.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl CommandBufferError {
    fn overflow(kind: CommandBufferKind, what: &'static str, e: CapacityExceeded) -> Self {
        CommandBufferError::CapacityExceeded {
            kind,
            what,
            used: e.used,
            requested: e.requested,
            capacity: e.capacity,
        }
    }
}

/// A run of commands sharing one material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialBucket {
    /// Index of the first command of the bucket.
    pub offset: usize,
    /// Number of commands.
    pub size: usize,
    /// The mesh of each command, in command order. Left empty under hardware
    /// multidraw, which never draws meshes one by one.
    pub meshes: Vec<Arc<GpuMesh>>,
    /// Index width of the bucket's first mesh. Under hardware multidraw every
    /// command of the bucket shares it.
    pub index_format: IndexFormat,
}

impl MaterialBucket {
    fn reset(&mut self, offset: usize) {
        self.offset = offset;
        self.size = 0;
        self.meshes.clear();
        self.index_format = IndexFormat::default();
    }
}

/// A GPU buffer of instance records of type `T`, staged in an arena.
#[derive(Debug)]
pub struct InstanceStream<T: InstanceRecord> {
    layout: InstanceLayout,
    buffer: BufferId,
    arena: Arena<T>,
}

impl<T: InstanceRecord> InstanceStream<T> {
    /// Allocates the stream's GPU buffer, sized for [`MAX_DRAW_CALLS`]
    /// records of `T`.
    pub fn new(
        device: &dyn GraphicsDevice,
        layout: InstanceLayout,
        upload: UploadStrategy,
    ) -> Result<Self, ResourceError> {
        let arena = Arena::with_capacity(MAX_DRAW_CALLS);
        let buffer = create_mapped_buffer(
            device,
            format!("{layout:?}_instances"),
            arena.byte_capacity(),
            BufferUsage::INSTANCE | BufferUsage::VERTEX | BufferUsage::MAP_WRITE,
            upload,
        )?;
        Ok(Self {
            layout,
            buffer,
            arena,
        })
    }

    /// The instance layout of the records.
    pub fn layout(&self) -> InstanceLayout {
        self.layout
    }

    /// The GPU buffer holding the records.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Records written during the last fill.
    pub fn records(&self) -> &[T] {
        self.arena.as_slice()
    }

    fn reset(&mut self) {
        self.arena.reset();
    }

    fn finish(
        &self,
        device: &dyn GraphicsDevice,
        upload: UploadStrategy,
    ) -> Result<(), ResourceError> {
        finish_upload(device, self.buffer, self.arena.as_bytes(), upload)
    }

    fn binding(&self) -> StreamBinding {
        StreamBinding {
            layout: self.layout,
            buffer: self.buffer,
            stride: T::STRIDE,
        }
    }

    fn release(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.buffer) {
            log::warn!(
                "InstanceStream({:?}): Failed to destroy buffer {:?}: {:?}",
                self.layout,
                self.buffer,
                e
            );
        }
    }
}

/// What a draw needs to read one instance stream.
#[derive(Debug, Clone, Copy)]
struct StreamBinding {
    layout: InstanceLayout,
    buffer: BufferId,
    stride: u32,
}

/// How one pass over a bucket is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// One indirect draw per mesh, binding each mesh's textures.
    PerMesh,
    /// One multidraw call for the whole bucket.
    Multidraw,
}

impl Submit {
    /// The instanced submission of `mode`; `None` for explicit draws.
    pub fn for_mode(mode: SubmissionMode) -> Option<Self> {
        match mode {
            SubmissionMode::PerMeshDraw => None,
            SubmissionMode::IndirectPerMesh => Some(Submit::PerMesh),
            SubmissionMode::HardwareMultidraw => Some(Submit::Multidraw),
        }
    }
}

/// Parameters of one pass over one material bucket.
struct PassSetup<'a> {
    material: ShaderType,
    pass: ShaderPass,
    bucket: usize,
    uniforms: PassUniforms,
    prefilled: Option<&'a PrefilledTextures>,
}

/// The shared part of every command buffer: the indirect-command buffer, its
/// buckets and the per-frame counters.
#[derive(Debug)]
pub struct CommandBuffer {
    kind: CommandBufferKind,
    strategy: RenderStrategy,
    indirect_buffer: BufferId,
    commands: Arena<DrawElementsIndirectCommand>,
    buckets: Vec<MaterialBucket>,
    poly_count: u64,
    instance_count: usize,
    skipped_meshes: usize,
}

impl CommandBuffer {
    /// Allocates storage for [`MAX_DRAW_CALLS`] commands.
    pub fn new(
        device: &dyn GraphicsDevice,
        kind: CommandBufferKind,
        strategy: RenderStrategy,
    ) -> Result<Self, ResourceError> {
        let commands = Arena::with_capacity(MAX_DRAW_CALLS);
        let indirect_buffer = create_mapped_buffer(
            device,
            kind.label().to_string(),
            commands.byte_capacity(),
            BufferUsage::INDIRECT | BufferUsage::MAP_WRITE,
            strategy.upload,
        )?;
        Ok(Self {
            kind,
            strategy,
            indirect_buffer,
            commands,
            buckets: vec![MaterialBucket::default(); kind.bucket_count()],
            poly_count: 0,
            instance_count: 0,
            skipped_meshes: 0,
        })
    }

    /// The kind of the buffer.
    pub fn kind(&self) -> CommandBufferKind {
        self.kind
    }

    /// The strategy the buffer was created with.
    pub fn strategy(&self) -> &RenderStrategy {
        &self.strategy
    }

    /// The GPU buffer the commands are uploaded to.
    pub fn indirect_buffer(&self) -> BufferId {
        self.indirect_buffer
    }

    /// The bucket with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not below the kind's bucket count.
    pub fn bucket(&self, id: usize) -> &MaterialBucket {
        &self.buckets[id]
    }

    /// All buckets, indexed by bucket id.
    pub fn buckets(&self) -> &[MaterialBucket] {
        &self.buckets
    }

    /// Whether the bucket received no command during the last fill. Unknown
    /// bucket ids are empty.
    pub fn is_empty(&self, id: usize) -> bool {
        self.buckets.get(id).map_or(true, |bucket| bucket.size == 0)
    }

    /// Triangles drawn by all commands of the last fill.
    pub fn poly_count(&self) -> u64 {
        self.poly_count
    }

    /// Instances covered by all commands of the last fill.
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Meshes skipped during the last fill because of a vertex-layout
    /// mismatch, or an index width a multidraw bucket cannot mix.
    pub fn skipped_meshes(&self) -> usize {
        self.skipped_meshes
    }

    /// The commands written during the last fill.
    pub fn commands(&self) -> &[DrawElementsIndirectCommand] {
        self.commands.as_slice()
    }

    /// Number of non-empty buckets.
    pub fn active_buckets(&self) -> usize {
        self.buckets.iter().filter(|b| b.size > 0).count()
    }

    /// Binds the indirect buffer for the draws that follow.
    pub fn bind(&self, recorder: &mut dyn DrawRecorder) {
        recorder.bind_indirect_buffer(self.indirect_buffer);
    }

    /// Draws command `index` of bucket `bucket` with one indirect call.
    pub fn draw_indirect(&self, recorder: &mut dyn DrawRecorder, bucket: usize, index: usize) {
        let Some(b) = self.buckets.get(bucket) else {
            return;
        };
        if index >= b.size {
            log::error!(
                "{} buffer: command {} out of range for bucket {} of size {}",
                self.kind,
                index,
                bucket,
                b.size
            );
            return;
        }
        let format = b
            .meshes
            .get(index)
            .map(|mesh| mesh.index_format)
            .unwrap_or_default();
        let offset = ((b.offset + index) * DrawElementsIndirectCommand::SIZE) as u64;
        recorder.draw_elements_indirect(format, offset);
    }

    /// Draws every command of bucket `bucket` with one multidraw call.
    pub fn multidraw_indirect(&self, recorder: &mut dyn DrawRecorder, bucket: usize) {
        if self.is_empty(bucket) {
            return;
        }
        let b = &self.buckets[bucket];
        recorder.multi_draw_elements_indirect(
            b.index_format,
            (b.offset * DrawElementsIndirectCommand::SIZE) as u64,
            b.size as u32,
            DrawElementsIndirectCommand::SIZE as u32,
        );
    }

    fn reset(&mut self) {
        self.commands.reset();
        self.poly_count = 0;
        self.instance_count = 0;
        self.skipped_meshes = 0;
        for bucket in &mut self.buckets {
            bucket.reset(0);
        }
    }

    fn finish_fill(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        finish_upload(
            device,
            self.indirect_buffer,
            self.commands.as_bytes(),
            self.strategy.upload,
        )
    }

    /// Fills bucket `bucket_id` from `lists`, packing records into `stream`.
    ///
    /// Meshes whose vertex layout differs from `expected_layout` are logged
    /// and skipped, and so are meshes whose index width differs from the
    /// bucket's when the bucket is drawn with one multidraw call. On overflow
    /// the bucket keeps the commands written so far.
    fn fill_bucket<T, N>(
        &mut self,
        bucket_id: usize,
        expected_layout: VertexLayout,
        lists: &[InstanceList<N>],
        stream: &mut InstanceStream<T>,
    ) -> Result<(), CommandBufferError>
    where
        T: PackInstance<N>,
        N: ?Sized,
    {
        let kind = self.kind;
        let records_meshes = self.strategy.records_bucket_meshes();
        let offset = self.commands.cursor();
        let bucket = &mut self.buckets[bucket_id];
        bucket.reset(offset);

        for list in lists {
            let mesh = &list.mesh;
            if list.nodes.is_empty() {
                continue;
            }
            if mesh.vertex_layout != expected_layout {
                log::error!(
                    "Wrong vertex layout {:?} for '{}' in {} bucket {} (expected {:?}), skipping",
                    mesh.vertex_layout,
                    mesh.diagnostic_name(),
                    kind,
                    bucket_id,
                    expected_layout
                );
                self.skipped_meshes += 1;
                continue;
            }
            if bucket.size == 0 {
                bucket.index_format = mesh.index_format;
            } else if !records_meshes && mesh.index_format != bucket.index_format {
                log::error!(
                    "Index format {:?} of '{}' differs from {:?} in multidraw {} bucket {}, skipping",
                    mesh.index_format,
                    mesh.diagnostic_name(),
                    bucket.index_format,
                    kind,
                    bucket_id
                );
                self.skipped_meshes += 1;
                continue;
            }

            let instances = list.nodes.len();
            self.commands
                .ensure(1)
                .map_err(|e| CommandBufferError::overflow(kind, "commands", e))?;
            stream
                .arena
                .ensure(instances)
                .map_err(|e| CommandBufferError::overflow(kind, "instances", e))?;

            let base_instance = stream.arena.cursor();
            for node in &list.nodes {
                stream
                    .arena
                    .push(T::pack(mesh, node.as_ref()))
                    .map_err(|e| CommandBufferError::overflow(kind, "instances", e))?;
            }
            self.commands
                .push(DrawElementsIndirectCommand {
                    count: mesh.index_count,
                    instance_count: instances as u32,
                    first_index: mesh.first_index,
                    base_vertex: mesh.base_vertex,
                    base_instance: base_instance as u32,
                })
                .map_err(|e| CommandBufferError::overflow(kind, "commands", e))?;

            self.poly_count += u64::from(mesh.triangle_count()) * instances as u64;
            self.instance_count += instances;
            if records_meshes {
                bucket.meshes.push(mesh.clone());
            }
            bucket.size = self.commands.cursor() - bucket.offset;
        }
        Ok(())
    }

    /// Issues one pass over one bucket.
    fn draw_pass(
        &self,
        recorder: &mut dyn DrawRecorder,
        resources: &dyn RenderResources,
        stream: StreamBinding,
        setup: &PassSetup<'_>,
        submit: Submit,
    ) {
        if self.is_empty(setup.bucket) {
            return;
        }
        let material = setup.material;
        recorder.use_program(resources.program(material, setup.pass, true));
        recorder.set_uniforms(&setup.uniforms);
        recorder.bind_vertex_array(
            resources.instance_vertex_array(material.vertex_layout(), stream.layout),
        );
        recorder.set_instance_buffer(stream.buffer, stream.stride);
        self.bind(recorder);

        match submit {
            Submit::PerMesh => {
                let bucket = &self.buckets[setup.bucket];
                for (index, mesh) in bucket.meshes.iter().enumerate() {
                    expand_textures(
                        recorder,
                        self.strategy.textures,
                        mesh,
                        material,
                        setup.pass,
                        setup.prefilled,
                    );
                    self.draw_indirect(recorder, setup.bucket, index);
                }
            }
            Submit::Multidraw => {
                // Mesh textures travel in the instance records; only the
                // frame-wide textures are bound, once for the whole bucket.
                if let (Some(prefilled), TextureBinding::Bindless) =
                    (setup.prefilled, self.strategy.textures)
                {
                    let count = material.prefilled_texture_count().min(prefilled.handles.len());
                    recorder.bind_texture_handles(&prefilled.handles[..count]);
                }
                self.multidraw_indirect(recorder, setup.bucket);
            }
        }
    }

    fn release(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.indirect_buffer) {
            log::warn!(
                "CommandBuffer({}): Failed to destroy indirect buffer {:?}: {:?}",
                self.kind,
                self.indirect_buffer,
                e
            );
        }
    }
}

/// Creates a CPU-writable buffer following `upload`; persistent buffers are
/// mapped here for their whole lifetime.
fn create_mapped_buffer(
    device: &dyn GraphicsDevice,
    label: String,
    size: u64,
    usage: BufferUsage,
    upload: UploadStrategy,
) -> Result<BufferId, ResourceError> {
    let storage = match upload {
        UploadStrategy::PersistentMapped => BufferStorage::Persistent,
        UploadStrategy::StreamedDiscard => BufferStorage::Stream,
    };
    let id = device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Owned(label)),
        size,
        usage,
        storage,
    })?;
    if upload == UploadStrategy::PersistentMapped {
        device.map_buffer(id, MapAccess::PERSISTENT_WRITE)?;
    }
    Ok(id)
}

/// Maps the buffers of one fill, in order. When a map fails, the buffers
/// mapped before it are unmapped again so none is left mapped.
fn begin_uploads(
    device: &dyn GraphicsDevice,
    buffers: &[BufferId],
    upload: UploadStrategy,
) -> Result<(), ResourceError> {
    if upload == UploadStrategy::PersistentMapped {
        return Ok(());
    }
    for (mapped, &buffer) in buffers.iter().enumerate() {
        if let Err(e) = device.map_buffer(buffer, MapAccess::STREAM_DISCARD) {
            for &earlier in buffers[..mapped].iter().rev() {
                if let Err(unmap) = device.unmap_buffer(earlier) {
                    log::warn!("Failed to unmap buffer {earlier:?} after a failed map: {unmap}");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Writes the staged bytes and, for streamed buffers, unmaps. The unmap is
/// attempted even when the write failed so the buffer is never left mapped.
fn finish_upload(
    device: &dyn GraphicsDevice,
    buffer: BufferId,
    bytes: &[u8],
    upload: UploadStrategy,
) -> Result<(), ResourceError> {
    let written = if bytes.is_empty() {
        Ok(())
    } else {
        device.write_mapped(buffer, 0, bytes)
    };
    let unmapped = match upload {
        UploadStrategy::PersistentMapped => Ok(()),
        UploadStrategy::StreamedDiscard => device.unmap_buffer(buffer),
    };
    written.and(unmapped)
}

/// Collapses the outcome of a fill: packing errors win over upload errors.
fn fill_outcome(
    packed: Result<(), CommandBufferError>,
    uploads: impl IntoIterator<Item = Result<(), ResourceError>>,
) -> Result<(), CommandBufferError> {
    let mut upload_result = Ok(());
    for result in uploads {
        if upload_result.is_ok() {
            upload_result = result;
        }
    }
    if let Err(e) = &packed {
        log::error!("{e}");
    }
    packed?;
    upload_result.map_err(CommandBufferError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::instance::{
        GlowInstanceData, InstanceDataDualTex, InstanceDataThreeTex,
    };
    use nitro_core::{
        math::{AffineTransform, LinearRgba, Rgba8, Vec3},
        renderer::api::{GpuCapabilities, MeshId, SubmissionMode},
        scene::{GlowingNode, HasGlowColor, MeshMap, MeshNode, SceneNode},
    };
    use nitro_infra::{
        BufferEvent, HeadlessDevice, HeadlessResources, RecordedCommand, RecordingRecorder,
    };

    fn strategy(mode: SubmissionMode) -> RenderStrategy {
        RenderStrategy::resolve(&GpuCapabilities::FULL, Some(mode)).unwrap()
    }

    fn streamed_strategy() -> RenderStrategy {
        let caps = GpuCapabilities {
            async_instance_upload: false,
            ..GpuCapabilities::FULL
        };
        RenderStrategy::resolve(&caps, Some(SubmissionMode::IndirectPerMesh)).unwrap()
    }

    fn mesh(id: u64, layout: VertexLayout, index_count: u32) -> Arc<GpuMesh> {
        Arc::new(
            GpuMesh::new(MeshId(id), format!("mesh{id}.b3d"), layout, index_count)
                .with_location(id as u32 * 1000, id as i32 * 100),
        )
    }

    fn node_at(x: f32) -> Arc<dyn SceneNode> {
        Arc::new(MeshNode::new(
            "node",
            AffineTransform::from_translation(Vec3::new(x, 0.0, 0.0)),
        ))
    }

    /// Three Solid meshes instanced {2, 5, 1} times, then one AlphaTest mesh.
    fn track_map() -> MeshMap {
        let (a, b, c) = (
            mesh(1, VertexLayout::Standard, 30),
            mesh(2, VertexLayout::Standard, 300),
            mesh(3, VertexLayout::Standard, 6),
        );
        let mut map = MeshMap::new(SHADERTYPE_COUNT);
        let mut x = 0.0;
        for (m, count) in [(&a, 2), (&b, 5), (&c, 1)] {
            for _ in 0..count {
                map.push(ShaderType::Solid.id(), m, node_at(x));
                x += 1.0;
            }
        }
        map.push(
            ShaderType::AlphaTest.id(),
            &mesh(4, VertexLayout::Standard, 12),
            node_at(100.0),
        );
        map
    }

    #[test]
    fn test_bucket_counts_per_kind() {
        assert_eq!(CommandBufferKind::Solid.bucket_count(), 8);
        assert_eq!(CommandBufferKind::Shadow.bucket_count(), 32);
        assert_eq!(CommandBufferKind::ReflectiveShadowMap.bucket_count(), 8);
        assert_eq!(CommandBufferKind::Glow.bucket_count(), 1);
    }

    #[test]
    fn test_empty_map_leaves_every_bucket_empty() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        solid.fill(&device, &MeshMap::new(SHADERTYPE_COUNT)).unwrap();

        assert!((0..SHADERTYPE_COUNT).all(|id| solid.is_empty(id)));
        assert!(solid.commands().is_empty());
        assert_eq!(solid.poly_count(), 0);
        assert_eq!(solid.active_buckets(), 0);
        assert!(solid.dual_tex_stream().records().is_empty());
    }

    #[test]
    fn test_one_command_per_mesh_with_contiguous_instances() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        let bucket = solid.bucket(ShaderType::Solid.id());
        assert_eq!((bucket.offset, bucket.size), (0, 3));
        assert_eq!(bucket.meshes.len(), 3);

        let commands = solid.commands();
        let counts: Vec<u32> = commands.iter().map(|c| c.instance_count).collect();
        let bases: Vec<u32> = commands.iter().map(|c| c.base_instance).collect();
        assert_eq!(counts, vec![2, 5, 1, 1]);
        assert_eq!(bases, vec![0, 2, 7, 8]);
        assert_eq!(commands[1].count, 300);
        assert_eq!(commands[1].first_index, 2000);
        assert_eq!(commands[1].base_vertex, 200);

        let alpha = solid.bucket(ShaderType::AlphaTest.id());
        assert_eq!((alpha.offset, alpha.size), (3, 1));

        // Records of mesh 2 start with the third node pushed.
        let records = solid.dual_tex_stream().records();
        assert_eq!(records.len(), 9);
        let transform = { records[2].transform };
        assert_eq!(transform.origin, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_counters_add_up_over_commands() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let map = track_map();
        solid.fill(&device, &map).unwrap();

        let instances: u32 = solid.commands().iter().map(|c| c.instance_count).sum();
        assert_eq!(instances as usize, map.total_instances());
        assert_eq!(solid.instance_count(), map.total_instances());

        let polys: u64 = solid.commands().iter().map(|c| c.triangle_count()).sum();
        assert_eq!(solid.poly_count(), polys);
        assert_eq!(solid.poly_count(), 10 * 2 + 100 * 5 + 2 + 4);
    }

    #[test]
    fn test_refill_with_same_map_is_identical() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let map = track_map();

        solid.fill(&device, &map).unwrap();
        let commands = solid.commands().to_vec();
        let buckets = solid.buckets().to_vec();
        solid.fill(&device, &map).unwrap();

        assert_eq!(solid.commands(), commands.as_slice());
        assert_eq!(solid.buckets(), buckets.as_slice());
        assert_eq!(solid.dual_tex_stream().records().len(), 9);
    }

    #[test]
    fn test_three_texture_materials_pack_into_their_own_stream() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let mut map = track_map();
        map.push(
            ShaderType::DetailMap.id(),
            &mesh(5, VertexLayout::TwoTexCoords, 9),
            node_at(0.0),
        );
        solid.fill(&device, &map).unwrap();

        assert_eq!(solid.three_tex_stream().records().len(), 1);
        assert_eq!(solid.dual_tex_stream().records().len(), 9);
        let detail = solid.bucket(ShaderType::DetailMap.id());
        assert_eq!((detail.offset, detail.size), (4, 1));
        assert_eq!(solid.commands()[4].base_instance, 0);
    }

    #[test]
    fn test_mesh_with_wrong_layout_is_skipped() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let mut map = MeshMap::new(SHADERTYPE_COUNT);
        map.push(ShaderType::NormalMap.id(), &mesh(1, VertexLayout::Standard, 3), node_at(0.0));
        map.push(ShaderType::NormalMap.id(), &mesh(2, VertexLayout::Tangents, 3), node_at(1.0));
        solid.fill(&device, &map).unwrap();

        assert_eq!(solid.skipped_meshes(), 1);
        assert_eq!(solid.bucket(ShaderType::NormalMap.id()).size, 1);
        assert_eq!(solid.instance_count(), 1);
    }

    #[test]
    fn test_shadow_cascades_are_separate_buckets() {
        let device = HeadlessDevice::default();
        let mut shadow =
            ShadowCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let mut map = MeshMap::new(SHADERTYPE_COUNT * SHADOW_CASCADE_COUNT);
        map.push(
            ShaderType::Solid.shadow_bucket(2),
            &mesh(1, VertexLayout::Standard, 3),
            node_at(0.0),
        );
        shadow.fill(&device, &map).unwrap();

        assert_eq!(shadow.buckets().len(), 32);
        for cascade in [0, 1, 3] {
            assert!(shadow.is_cascade_empty(ShaderType::Solid, cascade));
        }
        assert!(!shadow.is_cascade_empty(ShaderType::Solid, 2));
        assert_eq!(shadow.active_buckets(), 1);
        assert_eq!(shadow.stream().records().len(), 1);
    }

    #[test]
    fn test_glow_records_carry_node_color() {
        let device = HeadlessDevice::default();
        let mut glow =
            GlowCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let mut map: MeshMap<dyn HasGlowColor> = MeshMap::new(1);
        let node: Arc<dyn HasGlowColor> = Arc::new(GlowingNode::new(
            "nitro",
            AffineTransform::IDENTITY,
            LinearRgba::RED,
        ));
        map.push(GLOW_BUCKET, &mesh(1, VertexLayout::Standard, 3), node);
        glow.fill(&device, &map).unwrap();

        let records: &[GlowInstanceData] = glow.stream().records();
        assert_eq!(records.len(), 1);
        let color = { records[0].color };
        assert_eq!(color, Rgba8([255, 0, 0, 255]));
    }

    #[test]
    fn test_multidraw_buckets_keep_no_mesh_list() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::HardwareMultidraw)).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        let bucket = solid.bucket(ShaderType::Solid.id());
        assert_eq!(bucket.size, 3);
        assert!(bucket.meshes.is_empty());
    }

    #[test]
    fn test_streamed_buffers_are_unmapped_after_each_fill() {
        let device = HeadlessDevice::default();
        let mut solid = SolidCommandBuffer::new(&device, streamed_strategy()).unwrap();
        let indirect = solid.indirect_buffer();
        assert!(!device.is_mapped(indirect));

        device.clear_events();
        solid.fill(&device, &track_map()).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        assert!(!device.is_mapped(indirect));
        assert!(!device.is_mapped(solid.dual_tex_stream().buffer()));
        let indirect_events: Vec<BufferEvent> = device
            .events()
            .into_iter()
            .filter(|e| match e {
                BufferEvent::Mapped { id, .. }
                | BufferEvent::Written { id, .. }
                | BufferEvent::Unmapped { id } => *id == indirect,
                _ => false,
            })
            .collect();
        let expected_len = (4 * DrawElementsIndirectCommand::SIZE) as u64;
        let one_fill = [
            BufferEvent::Mapped {
                id: indirect,
                access: MapAccess::STREAM_DISCARD,
            },
            BufferEvent::Written {
                id: indirect,
                offset: 0,
                len: expected_len,
            },
            BufferEvent::Unmapped { id: indirect },
        ];
        assert_eq!(indirect_events, [one_fill.clone(), one_fill].concat());
    }

    #[test]
    fn test_persistent_buffers_are_mapped_once() {
        let device = HeadlessDevice::default();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        let indirect = solid.indirect_buffer();
        assert_eq!(device.map_access(indirect), Some(MapAccess::PERSISTENT_WRITE));

        device.clear_events();
        solid.fill(&device, &track_map()).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        let events = device.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, BufferEvent::Mapped { .. } | BufferEvent::Unmapped { .. })));
        assert!(device.is_mapped(indirect));
    }

    #[test]
    fn test_overflow_keeps_buckets_filled_before_it() {
        let device = HeadlessDevice::default();
        let mut solid = SolidCommandBuffer::new(&device, streamed_strategy()).unwrap();
        let crowd = mesh(1, VertexLayout::Standard, 3);
        let extra = mesh(2, VertexLayout::Standard, 3);
        let node = node_at(0.0);
        let mut map = MeshMap::new(SHADERTYPE_COUNT);
        for _ in 0..MAX_DRAW_CALLS - 1 {
            map.push(ShaderType::Solid.id(), &crowd, node.clone());
        }
        for _ in 0..5 {
            map.push(ShaderType::AlphaTest.id(), &extra, node.clone());
        }

        let err = solid.fill(&device, &map).unwrap_err();
        match err {
            CommandBufferError::CapacityExceeded {
                kind,
                what,
                used,
                requested,
                capacity,
            } => {
                assert_eq!(kind, CommandBufferKind::Solid);
                assert_eq!(what, "instances");
                assert_eq!((used, requested, capacity), (MAX_DRAW_CALLS - 1, 5, MAX_DRAW_CALLS));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(solid.bucket(ShaderType::Solid.id()).size, 1);
        assert!(solid.is_empty(ShaderType::AlphaTest.id()));
        assert_eq!(solid.commands().len(), 1);
        assert!(!device.is_mapped(solid.indirect_buffer()));
    }

    fn first_pass(
        solid: &SolidCommandBuffer,
        recorder: &mut RecordingRecorder,
        resources: &HeadlessResources,
        material: ShaderType,
        submit: Submit,
    ) {
        solid.draw(recorder, resources, material, ShaderPass::FirstPass, None, submit);
    }

    #[test]
    fn test_per_mesh_draws_read_uploaded_commands() {
        let device = HeadlessDevice::default();
        let resources = HeadlessResources::new();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        let mut recorder = RecordingRecorder::new();
        first_pass(&solid, &mut recorder, &resources, ShaderType::Solid, Submit::PerMesh);

        assert!(recorder.violations().is_empty());
        assert_eq!(recorder.draw_call_count(), 3);
        assert!(recorder.commands().contains(&RecordedCommand::SetInstanceBuffer {
            buffer: solid.dual_tex_stream().buffer(),
            stride: InstanceDataDualTex::STRIDE,
        }));

        let draws = recorder.resolve_draws(&device).unwrap();
        let commands: Vec<DrawElementsIndirectCommand> = draws.iter().map(|d| d.command).collect();
        assert_eq!(commands.as_slice(), &solid.commands()[..3]);
        assert_eq!(
            resources.describe_program(draws[0].program),
            Some((ShaderType::Solid, ShaderPass::FirstPass, true))
        );
    }

    #[test]
    fn test_multidraw_issues_one_call_per_bucket() {
        let device = HeadlessDevice::default();
        let resources = HeadlessResources::new();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::HardwareMultidraw)).unwrap();
        let mut map = track_map();
        map.push(
            ShaderType::NormalMap.id(),
            &mesh(6, VertexLayout::Tangents, 3),
            node_at(0.0),
        );
        solid.fill(&device, &map).unwrap();

        let mut recorder = RecordingRecorder::new();
        first_pass(&solid, &mut recorder, &resources, ShaderType::Solid, Submit::Multidraw);
        first_pass(&solid, &mut recorder, &resources, ShaderType::NormalMap, Submit::Multidraw);

        assert_eq!(recorder.draw_call_count(), 2);
        assert!(recorder.commands().contains(&RecordedCommand::MultiDrawElementsIndirect {
            index_format: IndexFormat::Uint16,
            offset: 0,
            draw_count: 3,
            stride: DrawElementsIndirectCommand::SIZE as u32,
        }));
        assert!(recorder.commands().contains(&RecordedCommand::SetInstanceBuffer {
            buffer: solid.three_tex_stream().buffer(),
            stride: InstanceDataThreeTex::STRIDE,
        }));
        assert_eq!(recorder.resolve_draws(&device).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_bucket_records_nothing() {
        let device = HeadlessDevice::default();
        let resources = HeadlessResources::new();
        let mut solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        solid.fill(&device, &track_map()).unwrap();

        let mut recorder = RecordingRecorder::new();
        first_pass(&solid, &mut recorder, &resources, ShaderType::Vegetation, Submit::PerMesh);
        assert!(recorder.commands().is_empty());
    }

    fn wide_mesh(id: u64) -> Arc<GpuMesh> {
        Arc::new(
            GpuMesh::new(MeshId(id), format!("wide{id}.b3d"), VertexLayout::Standard, 60)
                .with_location(id as u32 * 1000, 0)
                .with_index_format(IndexFormat::Uint32),
        )
    }

    #[test]
    fn test_draws_use_the_mesh_index_format() {
        let device = HeadlessDevice::default();
        let resources = HeadlessResources::new();
        let mut map = MeshMap::new(SHADERTYPE_COUNT);
        map.push(ShaderType::Solid.id(), &wide_mesh(7), node_at(0.0));

        let mut formats = Vec::new();
        for mode in [SubmissionMode::IndirectPerMesh, SubmissionMode::HardwareMultidraw] {
            let mut solid = SolidCommandBuffer::new(&device, strategy(mode)).unwrap();
            solid.fill(&device, &map).unwrap();
            assert_eq!(solid.bucket(ShaderType::Solid.id()).index_format, IndexFormat::Uint32);

            let mut recorder = RecordingRecorder::new();
            first_pass(&solid, &mut recorder, &resources, ShaderType::Solid, Submit::PerMesh);
            first_pass(&solid, &mut recorder, &resources, ShaderType::Solid, Submit::Multidraw);
            formats.extend(recorder.commands().iter().filter_map(|c| match c {
                RecordedCommand::DrawElementsIndirect { index_format, .. }
                | RecordedCommand::MultiDrawElementsIndirect { index_format, .. } => {
                    Some(*index_format)
                }
                _ => None,
            }));
        }
        assert!(!formats.is_empty());
        assert!(formats.iter().all(|f| *f == IndexFormat::Uint32), "{formats:?}");
    }

    #[test]
    fn test_multidraw_bucket_skips_meshes_of_another_index_width() {
        let device = HeadlessDevice::default();
        let mut map = MeshMap::new(SHADERTYPE_COUNT);
        map.push(ShaderType::Solid.id(), &mesh(1, VertexLayout::Standard, 30), node_at(0.0));
        map.push(ShaderType::Solid.id(), &wide_mesh(7), node_at(1.0));

        let mut multidraw =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::HardwareMultidraw)).unwrap();
        multidraw.fill(&device, &map).unwrap();
        let bucket = multidraw.bucket(ShaderType::Solid.id());
        assert_eq!(bucket.size, 1);
        assert_eq!(bucket.index_format, IndexFormat::Uint16);
        assert_eq!(multidraw.skipped_meshes(), 1);

        // Per-mesh draws carry their own width, so mixing is fine there.
        let mut indirect =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        indirect.fill(&device, &map).unwrap();
        assert_eq!(indirect.bucket(ShaderType::Solid.id()).size, 2);
        assert_eq!(indirect.skipped_meshes(), 0);
    }

    #[test]
    fn test_failed_map_leaves_no_buffer_mapped() {
        let device = HeadlessDevice::default();
        let mut solid = SolidCommandBuffer::new(&device, streamed_strategy()).unwrap();
        let indirect = solid.indirect_buffer();
        let dual = solid.dual_tex_stream().buffer();
        let three = solid.three_tex_stream().buffer();

        device.fail_next_map(dual);
        let err = solid.fill(&device, &track_map()).unwrap_err();
        assert!(matches!(
            err,
            CommandBufferError::Resource(ResourceError::MapFailed(id)) if id == dual
        ));
        for buffer in [indirect, dual, three] {
            assert!(!device.is_mapped(buffer), "{buffer:?} left mapped");
        }

        // The next frame fills normally.
        solid.fill(&device, &track_map()).unwrap();
        assert_eq!(solid.commands().len(), 4);
        assert!(!device.is_mapped(indirect));
    }

    #[test]
    fn test_release_destroys_every_buffer() {
        let device = HeadlessDevice::default();
        let solid =
            SolidCommandBuffer::new(&device, strategy(SubmissionMode::IndirectPerMesh)).unwrap();
        assert_eq!(device.live_buffers(), 3);
        solid.release(&device);
        assert_eq!(device.live_buffers(), 0);
    }
}
