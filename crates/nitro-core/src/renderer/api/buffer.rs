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

//! Defines data structures related to GPU buffer resources.

use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 0;
        /// The buffer holds per-instance vertex attributes.
        const INSTANCE = 1 << 1;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 2;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// The buffer can be used as the source of indirect draw commands.
        const INDIRECT = 1 << 4;
    }
}

bitflags! {
    /// Access flags used when mapping a buffer range for CPU writes.
    ///
    /// `UNSYNCHRONIZED` together with `INVALIDATE_BUFFER` gives the
    /// "discard and map" behavior: the driver hands out fresh memory instead
    /// of waiting for the GPU to finish reading the previous contents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapAccess: u32 {
        /// The mapping is written by the CPU.
        const WRITE = 1 << 0;
        /// The mapping stays valid while the GPU uses the buffer.
        const PERSISTENT = 1 << 1;
        /// Writes become visible to the GPU without an explicit flush.
        const COHERENT = 1 << 2;
        /// Previous contents of the whole buffer may be discarded.
        const INVALIDATE_BUFFER = 1 << 3;
        /// Do not synchronize with pending GPU work on this buffer.
        const UNSYNCHRONIZED = 1 << 4;
    }
}

impl MapAccess {
    /// Access used once at creation for persistently mapped buffers.
    pub const PERSISTENT_WRITE: Self = Self::WRITE
        .union(Self::PERSISTENT)
        .union(Self::COHERENT);

    /// Access used every frame for streamed buffers.
    pub const STREAM_DISCARD: Self = Self::WRITE
        .union(Self::INVALIDATE_BUFFER)
        .union(Self::UNSYNCHRONIZED);
}

/// How the storage backing a buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferStorage {
    /// Immutable storage that can be mapped once for the buffer's lifetime.
    Persistent,
    /// Mutable storage hinted for "written once per frame, drawn once".
    Stream,
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// How the buffer will be used.
    pub usage: BufferUsage,
    /// How the storage is allocated.
    pub storage: BufferStorage,
}

/// An opaque handle to a GPU buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_access_presets() {
        assert!(MapAccess::PERSISTENT_WRITE.contains(MapAccess::PERSISTENT));
        assert!(!MapAccess::PERSISTENT_WRITE.contains(MapAccess::INVALIDATE_BUFFER));
        assert!(MapAccess::STREAM_DISCARD
            .contains(MapAccess::UNSYNCHRONIZED | MapAccess::INVALIDATE_BUFFER));
        assert!(!MapAccess::STREAM_DISCARD.contains(MapAccess::PERSISTENT));
    }
}
