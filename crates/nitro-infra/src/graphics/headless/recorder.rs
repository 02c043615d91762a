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

use super::device::HeadlessDevice;
use anyhow::{anyhow, bail, Context};
use nitro_core::renderer::{
    BufferId, DrawElementsIndirectCommand, DrawRecorder, FenceId, IndexFormat, MapAccess,
    PassUniforms, ProgramId, TextureHandle, TextureId, VertexArrayId,
};

/// One call made on a [`RecordingRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `push_debug_marker`.
    PushDebugMarker(String),
    /// `pop_debug_marker`.
    PopDebugMarker,
    /// `use_program`.
    UseProgram(ProgramId),
    /// `set_uniforms`.
    SetUniforms(PassUniforms),
    /// `bind_vertex_array`.
    BindVertexArray(VertexArrayId),
    /// `set_instance_buffer`.
    SetInstanceBuffer {
        /// The instance buffer.
        buffer: BufferId,
        /// Record stride in bytes.
        stride: u32,
    },
    /// `bind_indirect_buffer`.
    BindIndirectBuffer(BufferId),
    /// `bind_textures`.
    BindTextures(Vec<TextureId>),
    /// `bind_texture_handles`.
    BindTextureHandles(Vec<TextureHandle>),
    /// `draw_elements`.
    DrawElements {
        /// Number of indices.
        index_count: u32,
        /// Index width.
        index_format: IndexFormat,
        /// First index.
        first_index: u32,
        /// Base vertex.
        base_vertex: i32,
    },
    /// `draw_elements_indirect`.
    DrawElementsIndirect {
        /// Index width.
        index_format: IndexFormat,
        /// Byte offset into the indirect buffer.
        offset: u64,
    },
    /// `multi_draw_elements_indirect`.
    MultiDrawElementsIndirect {
        /// Index width.
        index_format: IndexFormat,
        /// Byte offset of the first command.
        offset: u64,
        /// Number of commands.
        draw_count: u32,
        /// Byte distance between commands.
        stride: u32,
    },
    /// `fence_sync`.
    FenceSync(FenceId),
}

impl RecordedCommand {
    /// Whether this command submits geometry to the GPU.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RecordedCommand::DrawElements { .. }
                | RecordedCommand::DrawElementsIndirect { .. }
                | RecordedCommand::MultiDrawElementsIndirect { .. }
        )
    }
}

/// One draw with its indirect parameters read back from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDraw {
    /// The program active at draw time.
    pub program: ProgramId,
    /// The vertex array bound at draw time.
    pub vertex_array: Option<VertexArrayId>,
    /// The instance buffer attached at draw time, with its stride.
    pub instance_buffer: Option<(BufferId, u32)>,
    /// The draw parameters; explicit draws have one instance at base 0.
    pub command: DrawElementsIndirectCommand,
}

/// A [`DrawRecorder`] storing every call for later inspection.
///
/// Misuse that a driver would silently accept or crash on (drawing without
/// a program, indirect draws without an indirect buffer, unbalanced debug
/// markers) is collected in [`violations`](Self::violations).
#[derive(Debug, Default)]
pub struct RecordingRecorder {
    commands: Vec<RecordedCommand>,
    violations: Vec<String>,
    marker_depth: usize,
    program: Option<ProgramId>,
    indirect_buffer: Option<BufferId>,
    next_fence: u64,
}

impl RecordingRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call, in order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Protocol violations noticed while recording.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Number of GPU submission calls.
    pub fn draw_call_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Labels of the outermost debug groups, in order.
    pub fn top_level_markers(&self) -> Vec<String> {
        let mut depth = 0usize;
        let mut markers = Vec::new();
        for command in &self.commands {
            match command {
                RecordedCommand::PushDebugMarker(label) => {
                    if depth == 0 {
                        markers.push(label.clone());
                    }
                    depth += 1;
                }
                RecordedCommand::PopDebugMarker => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        markers
    }

    /// The commands recorded inside the first top-level group named `label`.
    pub fn commands_in_marker(&self, label: &str) -> &[RecordedCommand] {
        let Some(start) = self
            .commands
            .iter()
            .position(|c| matches!(c, RecordedCommand::PushDebugMarker(l) if l == label))
        else {
            return &[];
        };
        let mut depth = 0usize;
        for (i, command) in self.commands[start..].iter().enumerate() {
            match command {
                RecordedCommand::PushDebugMarker(_) => depth += 1,
                RecordedCommand::PopDebugMarker => {
                    depth -= 1;
                    if depth == 0 {
                        return &self.commands[start + 1..start + i];
                    }
                }
                _ => {}
            }
        }
        &self.commands[start + 1..]
    }

    /// Forgets everything recorded so far. Fence ids keep increasing.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.violations.clear();
        self.marker_depth = 0;
        self.program = None;
        self.indirect_buffer = None;
    }

    /// Replays the recorded calls and reads every indirect command back from
    /// `device`, expanding multidraws into their individual draws.
    ///
    /// Fails if an indirect draw reads a buffer that is missing, still
    /// mapped without persistence, or too short.
    pub fn resolve_draws(&self, device: &HeadlessDevice) -> anyhow::Result<Vec<ResolvedDraw>> {
        let mut program = None;
        let mut vertex_array = None;
        let mut instance_buffer = None;
        let mut indirect = None;
        let mut draws = Vec::new();

        for (index, command) in self.commands.iter().enumerate() {
            match command {
                RecordedCommand::UseProgram(p) => program = Some(*p),
                RecordedCommand::BindVertexArray(v) => vertex_array = Some(*v),
                RecordedCommand::SetInstanceBuffer { buffer, stride } => {
                    instance_buffer = Some((*buffer, *stride))
                }
                RecordedCommand::BindIndirectBuffer(b) => indirect = Some(*b),
                RecordedCommand::DrawElements {
                    index_count,
                    first_index,
                    base_vertex,
                    ..
                } => draws.push(ResolvedDraw {
                    program: program.ok_or_else(|| anyhow!("draw {index} without a program"))?,
                    vertex_array,
                    instance_buffer: None,
                    command: DrawElementsIndirectCommand {
                        count: *index_count,
                        instance_count: 1,
                        first_index: *first_index,
                        base_vertex: *base_vertex,
                        base_instance: 0,
                    },
                }),
                RecordedCommand::DrawElementsIndirect { offset, .. } => {
                    let program =
                        program.ok_or_else(|| anyhow!("draw {index} without a program"))?;
                    let command = read_command(device, indirect, *offset)
                        .with_context(|| format!("resolving indirect draw {index}"))?;
                    draws.push(ResolvedDraw {
                        program,
                        vertex_array,
                        instance_buffer,
                        command,
                    });
                }
                RecordedCommand::MultiDrawElementsIndirect {
                    offset,
                    draw_count,
                    stride,
                    ..
                } => {
                    let program =
                        program.ok_or_else(|| anyhow!("draw {index} without a program"))?;
                    for i in 0..u64::from(*draw_count) {
                        let command = read_command(device, indirect, offset + i * u64::from(*stride))
                            .with_context(|| format!("resolving multidraw {index}, draw {i}"))?;
                        draws.push(ResolvedDraw {
                            program,
                            vertex_array,
                            instance_buffer,
                            command,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(draws)
    }

    fn record(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }

    fn check_draw(&mut self, indirect: bool) {
        if self.program.is_none() {
            self.violations
                .push(format!("draw call {} without a program", self.commands.len()));
        }
        if indirect && self.indirect_buffer.is_none() {
            self.violations.push(format!(
                "indirect draw call {} without an indirect buffer",
                self.commands.len()
            ));
        }
    }
}

fn read_command(
    device: &HeadlessDevice,
    buffer: Option<BufferId>,
    offset: u64,
) -> anyhow::Result<DrawElementsIndirectCommand> {
    let Some(buffer) = buffer else {
        bail!("no indirect buffer bound");
    };
    if let Some(access) = device.map_access(buffer) {
        if !access.contains(MapAccess::PERSISTENT) {
            bail!("indirect buffer {buffer:?} is still mapped for streaming");
        }
    }
    let size = DrawElementsIndirectCommand::SIZE as u64;
    let bytes = device
        .read_buffer(buffer, offset, size)
        .ok_or_else(|| anyhow!("{size} bytes at offset {offset} are outside buffer {buffer:?}"))?;
    Ok(bytemuck::pod_read_unaligned(&bytes))
}

impl DrawRecorder for RecordingRecorder {
    fn push_debug_marker(&mut self, label: &str) {
        self.marker_depth += 1;
        self.record(RecordedCommand::PushDebugMarker(label.to_owned()));
    }

    fn pop_debug_marker(&mut self) {
        if self.marker_depth == 0 {
            self.violations
                .push("debug marker popped without a matching push".to_owned());
        } else {
            self.marker_depth -= 1;
        }
        self.record(RecordedCommand::PopDebugMarker);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
        self.record(RecordedCommand::UseProgram(program));
    }

    fn set_uniforms(&mut self, uniforms: &PassUniforms) {
        self.record(RecordedCommand::SetUniforms(*uniforms));
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.record(RecordedCommand::BindVertexArray(vertex_array));
    }

    fn set_instance_buffer(&mut self, buffer: BufferId, stride: u32) {
        self.record(RecordedCommand::SetInstanceBuffer { buffer, stride });
    }

    fn bind_indirect_buffer(&mut self, buffer: BufferId) {
        self.indirect_buffer = Some(buffer);
        self.record(RecordedCommand::BindIndirectBuffer(buffer));
    }

    fn bind_textures(&mut self, textures: &[TextureId]) {
        self.record(RecordedCommand::BindTextures(textures.to_vec()));
    }

    fn bind_texture_handles(&mut self, handles: &[TextureHandle]) {
        self.record(RecordedCommand::BindTextureHandles(handles.to_vec()));
    }

    fn draw_elements(
        &mut self,
        index_count: u32,
        index_format: IndexFormat,
        first_index: u32,
        base_vertex: i32,
    ) {
        self.check_draw(false);
        self.record(RecordedCommand::DrawElements {
            index_count,
            index_format,
            first_index,
            base_vertex,
        });
    }

    fn draw_elements_indirect(&mut self, index_format: IndexFormat, offset: u64) {
        self.check_draw(true);
        self.record(RecordedCommand::DrawElementsIndirect {
            index_format,
            offset,
        });
    }

    fn multi_draw_elements_indirect(
        &mut self,
        index_format: IndexFormat,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        self.check_draw(true);
        self.record(RecordedCommand::MultiDrawElementsIndirect {
            index_format,
            offset,
            draw_count,
            stride,
        });
    }

    fn fence_sync(&mut self) -> FenceId {
        self.next_fence += 1;
        let fence = FenceId(self.next_fence);
        self.record(RecordedCommand::FenceSync(fence));
        fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nitro_core::renderer::{BufferDescriptor, BufferStorage, BufferUsage, GraphicsDevice};

    #[test]
    fn test_markers_and_nested_commands() {
        let mut recorder = RecordingRecorder::new();
        recorder.push_debug_marker("Shadows");
        recorder.push_debug_marker("Cascade 0");
        recorder.use_program(ProgramId(3));
        recorder.pop_debug_marker();
        recorder.pop_debug_marker();
        recorder.push_debug_marker("Solid");
        recorder.pop_debug_marker();

        assert_eq!(recorder.top_level_markers(), vec!["Shadows", "Solid"]);
        assert_eq!(recorder.commands_in_marker("Shadows").len(), 3);
        assert!(recorder.commands_in_marker("Solid").is_empty());
        assert!(recorder.violations().is_empty());
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut recorder = RecordingRecorder::new();
        recorder.pop_debug_marker();
        recorder.draw_elements_indirect(IndexFormat::Uint16, 0);
        assert_eq!(recorder.violations().len(), 3);
    }

    #[test]
    fn test_fences_are_unique() {
        let mut recorder = RecordingRecorder::new();
        let a = recorder.fence_sync();
        recorder.clear();
        let b = recorder.fence_sync();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_reads_commands_back() {
        let device = HeadlessDevice::default();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 40,
                usage: BufferUsage::INDIRECT | BufferUsage::MAP_WRITE,
                storage: BufferStorage::Stream,
            })
            .unwrap();
        let commands = [
            DrawElementsIndirectCommand {
                count: 36,
                instance_count: 2,
                first_index: 0,
                base_vertex: 0,
                base_instance: 0,
            },
            DrawElementsIndirectCommand {
                count: 6,
                instance_count: 5,
                first_index: 36,
                base_vertex: 24,
                base_instance: 2,
            },
        ];
        device.map_buffer(buffer, MapAccess::STREAM_DISCARD).unwrap();
        device
            .write_mapped(buffer, 0, bytemuck::cast_slice(&commands))
            .unwrap();

        let mut recorder = RecordingRecorder::new();
        recorder.use_program(ProgramId(1));
        recorder.bind_indirect_buffer(buffer);
        recorder.multi_draw_elements_indirect(IndexFormat::Uint16, 0, 2, 20);

        // Still mapped for streaming: the GPU would read stale memory.
        assert!(recorder.resolve_draws(&device).is_err());

        device.unmap_buffer(buffer).unwrap();
        let draws = recorder.resolve_draws(&device).unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].command, commands[1]);
        assert_eq!(draws[0].program, ProgramId(1));
    }
}
