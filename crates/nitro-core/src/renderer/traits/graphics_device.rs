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

use crate::renderer::api::buffer::{BufferDescriptor, BufferId, MapAccess};
use crate::renderer::api::capabilities::GpuCapabilities;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// Defines the interface to the graphics backend for buffer management.
///
/// This is the abstraction over the driver that command buffers talk to. It
/// only covers what the instanced renderer needs: capability queries, buffer
/// lifetime, and the map / write / unmap protocol used to upload instance
/// records and indirect commands.
///
/// Implementations use interior mutability so a shared reference can be
/// handed to every command buffer.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the capability flags of the active GPU.
    fn capabilities(&self) -> GpuCapabilities;

    /// Creates a new GPU buffer.
    ///
    /// ## Arguments
    /// * `descriptor` - The size, usage and storage kind of the buffer.
    ///
    /// ## Returns
    /// A `Result` containing the `BufferId` of the new buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer, unmapping it first if needed.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Maps the whole buffer for CPU writes.
    ///
    /// Persistent buffers are mapped once with [`MapAccess::PERSISTENT_WRITE`]
    /// and stay mapped. Streamed buffers are mapped every frame with
    /// [`MapAccess::STREAM_DISCARD`] and must be unmapped before any draw
    /// reads them.
    fn map_buffer(&self, id: BufferId, access: MapAccess) -> Result<(), ResourceError>;

    /// Writes `data` into the mapped range of a buffer at `offset` bytes.
    ///
    /// ## Returns
    /// `ResourceError::NotMapped` if the buffer is not mapped.
    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Unmaps a buffer mapped with [`GraphicsDevice::map_buffer`].
    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError>;
}
