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

//! GPU-resident draw descriptors.

use bytemuck::{Pod, Zeroable};

/// One indexed indirect draw, laid out exactly as the GPU reads it.
///
/// A command covers a contiguous run of instance records starting at
/// `base_instance`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawElementsIndirectCommand {
    /// Number of indices to draw.
    pub count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// First index inside the shared index buffer.
    pub first_index: u32,
    /// Value added to each index before fetching vertices.
    pub base_vertex: i32,
    /// First instance record read from the instance buffer.
    pub base_instance: u32,
}

impl DrawElementsIndirectCommand {
    /// Size of one command in bytes, also the multidraw stride.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Triangles drawn by this command.
    #[inline]
    pub fn triangle_count(&self) -> u64 {
        u64::from(self.instance_count) * u64::from(self.count) / 3
    }
}

/// Width of the indices stored in index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    #[default]
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A handle to a GPU fence recorded with `DrawRecorder::fence_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_matches_gpu_layout() {
        assert_eq!(DrawElementsIndirectCommand::SIZE, 20);
        assert_eq!(std::mem::align_of::<DrawElementsIndirectCommand>(), 4);
    }

    #[test]
    fn test_triangle_count_scales_with_instances() {
        let cmd = DrawElementsIndirectCommand {
            count: 36,
            instance_count: 5,
            ..Default::default()
        };
        assert_eq!(cmd.triangle_count(), 60);
    }
}
