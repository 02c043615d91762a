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

use nitro_core::renderer::{
    BufferDescriptor, BufferId, BufferStorage, BufferUsage, GpuCapabilities, GraphicsDevice,
    MapAccess, ResourceError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One buffer operation, in the order the device saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// A buffer was created.
    Created {
        /// The new buffer.
        id: BufferId,
        /// Its debug label.
        label: Option<String>,
        /// Its size in bytes.
        size: u64,
        /// Its storage kind.
        storage: BufferStorage,
    },
    /// A buffer was mapped.
    Mapped {
        /// The buffer.
        id: BufferId,
        /// The access requested.
        access: MapAccess,
    },
    /// Bytes were written through a mapping.
    Written {
        /// The buffer.
        id: BufferId,
        /// Offset of the write in bytes.
        offset: u64,
        /// Length of the write in bytes.
        len: u64,
    },
    /// A buffer was unmapped.
    Unmapped {
        /// The buffer.
        id: BufferId,
    },
    /// A buffer was destroyed.
    Destroyed {
        /// The buffer.
        id: BufferId,
    },
}

#[derive(Debug)]
struct HeadlessBufferEntry {
    label: Option<String>,
    usage: BufferUsage,
    storage: BufferStorage,
    mapped: Option<MapAccess>,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessDeviceState {
    buffers: HashMap<BufferId, HeadlessBufferEntry>,
    events: Vec<BufferEvent>,
    failing_maps: HashSet<BufferId>,
}

/// A [`GraphicsDevice`] keeping buffers in host memory.
///
/// The device enforces the mapping protocol the command buffers rely on:
/// writes need a live mapping, a buffer cannot be mapped twice, persistent
/// mappings need persistent storage. Every operation is logged as a
/// [`BufferEvent`] so tests can assert on the exact sequence.
#[derive(Debug)]
pub struct HeadlessDevice {
    capabilities: GpuCapabilities,
    state: Mutex<HeadlessDeviceState>,
    next_buffer_id: AtomicUsize,
    allocated_bytes: AtomicUsize,
    /// Allocations beyond this many bytes fail, to exercise error paths.
    allocation_limit: Option<u64>,
}

impl HeadlessDevice {
    /// Creates a device reporting `capabilities`.
    pub fn new(capabilities: GpuCapabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(HeadlessDeviceState::default()),
            next_buffer_id: AtomicUsize::new(1),
            allocated_bytes: AtomicUsize::new(0),
            allocation_limit: None,
        }
    }

    /// Makes every allocation pushing the total past `bytes` fail.
    pub fn with_allocation_limit(mut self, bytes: u64) -> Self {
        self.allocation_limit = Some(bytes);
        self
    }

    /// Makes the next map of `id` fail with [`ResourceError::MapFailed`].
    pub fn fail_next_map(&self, id: BufferId) {
        self.state().failing_maps.insert(id);
    }

    fn state(&self) -> MutexGuard<'_, HeadlessDeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the bytes written to `id`, or `None` if it does not exist.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id).map(|b| b.data.clone())
    }

    /// Reads `len` bytes of `id` starting at `offset`.
    pub fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Option<Vec<u8>> {
        let state = self.state();
        let buffer = state.buffers.get(&id)?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        buffer.data.get(start..end).map(<[u8]>::to_vec)
    }

    /// The access `id` is currently mapped with.
    pub fn map_access(&self, id: BufferId) -> Option<MapAccess> {
        self.state().buffers.get(&id).and_then(|b| b.mapped)
    }

    /// Whether `id` is currently mapped.
    pub fn is_mapped(&self, id: BufferId) -> bool {
        self.map_access(id).is_some()
    }

    /// The debug label of `id`.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        self.state().buffers.get(&id).and_then(|b| b.label.clone())
    }

    /// The usage flags of `id`.
    pub fn buffer_usage(&self, id: BufferId) -> Option<BufferUsage> {
        self.state().buffers.get(&id).map(|b| b.usage)
    }

    /// Number of buffers alive.
    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    /// Total bytes allocated by live buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Every buffer operation since creation or the last [`clear_events`](Self::clear_events).
    pub fn events(&self) -> Vec<BufferEvent> {
        self.state().events.clone()
    }

    /// Forgets the recorded events.
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(GpuCapabilities::FULL)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> GpuCapabilities {
        self.capabilities
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let label = descriptor.label.as_deref().map(str::to_owned);
        let size = usize::try_from(descriptor.size).map_err(|_| ResourceError::AllocationFailed {
            label: label.clone(),
            details: format!("{} bytes do not fit in host memory", descriptor.size),
        })?;
        if let Some(limit) = self.allocation_limit {
            let total = self.allocated_bytes() as u64 + descriptor.size;
            if total > limit {
                return Err(ResourceError::AllocationFailed {
                    label,
                    details: format!("allocation limit of {limit} bytes reached"),
                });
            }
        }

        let id = self.generate_buffer_id();
        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        let mut state = self.state();
        state.buffers.insert(
            id,
            HeadlessBufferEntry {
                label: label.clone(),
                usage: descriptor.usage,
                storage: descriptor.storage,
                mapped: None,
                data: vec![0; size],
            },
        );
        state.events.push(BufferEvent::Created {
            id,
            label: label.clone(),
            size: descriptor.size,
            storage: descriptor.storage,
        });

        log::debug!(
            "HeadlessDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            label.as_deref().unwrap_or("unlabeled"),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .remove(&id)
            .ok_or(ResourceError::InvalidBuffer(id))?;
        self.allocated_bytes
            .fetch_sub(entry.data.len(), Ordering::Relaxed);
        state.events.push(BufferEvent::Destroyed { id });
        log::debug!("HeadlessDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn map_buffer(&self, id: BufferId, access: MapAccess) -> Result<(), ResourceError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let entry = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidBuffer(id))?;
        if entry.mapped.is_some() {
            return Err(ResourceError::AlreadyMapped(id));
        }
        if state.failing_maps.remove(&id) {
            return Err(ResourceError::MapFailed(id));
        }
        if !entry.usage.contains(BufferUsage::MAP_WRITE) {
            return Err(ResourceError::InvalidBuffer(id));
        }
        if access.contains(MapAccess::PERSISTENT) && entry.storage != BufferStorage::Persistent {
            log::error!("HeadlessDevice: Persistent map of non-persistent buffer {id:?}");
            return Err(ResourceError::InvalidBuffer(id));
        }
        entry.mapped = Some(access);
        state.events.push(BufferEvent::Mapped { id, access });
        Ok(())
    }

    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidBuffer(id))?;
        if entry.mapped.is_none() {
            return Err(ResourceError::NotMapped(id));
        }
        let size = entry.data.len() as u64;
        let len = data.len() as u64;
        let out_of_bounds = ResourceError::OutOfBounds {
            id,
            offset,
            len,
            size,
        };
        let end = offset.checked_add(len).ok_or_else(|| out_of_bounds.clone())?;
        if end > size {
            return Err(out_of_bounds);
        }
        // Both bounds fit in the host buffer length checked above.
        entry.data[offset as usize..end as usize].copy_from_slice(data);
        state.events.push(BufferEvent::Written { id, offset, len });
        Ok(())
    }

    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidBuffer(id))?;
        if entry.mapped.take().is_none() {
            return Err(ResourceError::NotMapped(id));
        }
        state.events.push(BufferEvent::Unmapped { id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn descriptor(storage: BufferStorage) -> BufferDescriptor<'static> {
        BufferDescriptor {
            label: Some(Cow::Borrowed("test")),
            size: 16,
            usage: BufferUsage::INDIRECT | BufferUsage::MAP_WRITE,
            storage,
        }
    }

    #[test]
    fn test_write_requires_mapping() {
        let device = HeadlessDevice::default();
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        assert_eq!(
            device.write_mapped(id, 0, &[1, 2]),
            Err(ResourceError::NotMapped(id))
        );

        device.map_buffer(id, MapAccess::STREAM_DISCARD).unwrap();
        device.write_mapped(id, 4, &[7, 8]).unwrap();
        device.unmap_buffer(id).unwrap();
        assert_eq!(device.read_buffer(id, 4, 2), Some(vec![7, 8]));
    }

    #[test]
    fn test_double_map_is_rejected() {
        let device = HeadlessDevice::default();
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        device.map_buffer(id, MapAccess::STREAM_DISCARD).unwrap();
        assert_eq!(
            device.map_buffer(id, MapAccess::STREAM_DISCARD),
            Err(ResourceError::AlreadyMapped(id))
        );
    }

    #[test]
    fn test_persistent_map_needs_persistent_storage() {
        let device = HeadlessDevice::default();
        let stream = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        let persistent = device
            .create_buffer(&descriptor(BufferStorage::Persistent))
            .unwrap();
        assert!(device.map_buffer(stream, MapAccess::PERSISTENT_WRITE).is_err());
        assert!(device
            .map_buffer(persistent, MapAccess::PERSISTENT_WRITE)
            .is_ok());
        assert_eq!(
            device.map_access(persistent),
            Some(MapAccess::PERSISTENT_WRITE)
        );
    }

    #[test]
    fn test_out_of_bounds_write() {
        let device = HeadlessDevice::default();
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        device.map_buffer(id, MapAccess::STREAM_DISCARD).unwrap();
        assert!(matches!(
            device.write_mapped(id, 12, &[0; 8]),
            Err(ResourceError::OutOfBounds { size: 16, .. })
        ));
    }

    #[test]
    fn test_allocation_tracking_and_limit() {
        let device = HeadlessDevice::default().with_allocation_limit(24);
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        assert_eq!(device.allocated_bytes(), 16);
        assert!(matches!(
            device.create_buffer(&descriptor(BufferStorage::Stream)),
            Err(ResourceError::AllocationFailed { .. })
        ));
        device.destroy_buffer(id).unwrap();
        assert_eq!(device.allocated_bytes(), 0);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(
            device.destroy_buffer(id),
            Err(ResourceError::InvalidBuffer(id))
        );
    }

    #[test]
    fn test_injected_map_failure_fires_once() {
        let device = HeadlessDevice::default();
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        device.fail_next_map(id);
        assert_eq!(
            device.map_buffer(id, MapAccess::STREAM_DISCARD),
            Err(ResourceError::MapFailed(id))
        );
        assert!(!device.is_mapped(id));
        device.map_buffer(id, MapAccess::STREAM_DISCARD).unwrap();
        assert!(device.is_mapped(id));
    }

    #[test]
    fn test_events_follow_call_order() {
        let device = HeadlessDevice::default();
        let id = device.create_buffer(&descriptor(BufferStorage::Stream)).unwrap();
        device.map_buffer(id, MapAccess::STREAM_DISCARD).unwrap();
        device.write_mapped(id, 0, &[1]).unwrap();
        device.unmap_buffer(id).unwrap();
        let events = device.events();
        assert!(matches!(events[0], BufferEvent::Created { .. }));
        assert_eq!(
            &events[1..],
            &[
                BufferEvent::Mapped {
                    id,
                    access: MapAccess::STREAM_DISCARD
                },
                BufferEvent::Written {
                    id,
                    offset: 0,
                    len: 1
                },
                BufferEvent::Unmapped { id },
            ]
        );
    }
}
