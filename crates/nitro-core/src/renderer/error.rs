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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::lane::LaneError;
use crate::renderer::api::buffer::BufferId;
use crate::renderer::api::capabilities::SubmissionMode;
use std::fmt;

/// An error related to the creation or mapping of GPU resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The backend failed to allocate a buffer.
    AllocationFailed {
        /// The label of the buffer, if any.
        label: Option<String>,
        /// Backend-specific details.
        details: String,
    },
    /// A buffer ID was not valid for the operation.
    InvalidBuffer(BufferId),
    /// A write targeted a buffer that is not currently mapped.
    NotMapped(BufferId),
    /// A map was requested on a buffer that is already mapped.
    AlreadyMapped(BufferId),
    /// The backend could not map the buffer.
    MapFailed(BufferId),
    /// A write would go past the end of the buffer.
    OutOfBounds {
        /// The buffer written to.
        id: BufferId,
        /// The offset of the write in bytes.
        offset: u64,
        /// The length of the write in bytes.
        len: u64,
        /// The size of the buffer in bytes.
        size: u64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::AllocationFailed { label, details } => write!(
                f,
                "Failed to allocate buffer '{}': {details}",
                label.as_deref().unwrap_or("unlabeled")
            ),
            ResourceError::InvalidBuffer(id) => write!(f, "Invalid buffer: {id:?}"),
            ResourceError::NotMapped(id) => write!(f, "Buffer {id:?} is not mapped"),
            ResourceError::AlreadyMapped(id) => write!(f, "Buffer {id:?} is already mapped"),
            ResourceError::MapFailed(id) => write!(f, "Failed to map buffer {id:?}"),
            ResourceError::OutOfBounds {
                id,
                offset,
                len,
                size,
            } => write!(
                f,
                "Write of {len} bytes at offset {offset} overflows buffer {id:?} of {size} bytes"
            ),
        }
    }
}

impl std::error::Error for ResourceError {}

/// A configuration that asks for something the hardware cannot do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// A submission mode was selected without one of its required capabilities.
    MissingCapability {
        /// The requested mode.
        mode: SubmissionMode,
        /// The name of the missing capability flag.
        capability: &'static str,
    },
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::MissingCapability { mode, capability } => write!(
                f,
                "Submission mode {mode} requires the '{capability}' capability"
            ),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// A high-level error that can occur while setting up or rendering a frame.
#[derive(Debug)]
pub enum RenderError {
    /// The selected strategy is not supported by the device.
    Capability(CapabilityError),
    /// A GPU resource operation failed.
    Resource(ResourceError),
    /// A command buffer could not be filled.
    FillFailed(String),
    /// The selected draw lane refused to initialize.
    Lane(LaneError),
    /// The renderer was used before initialization.
    NotInitialized,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Capability(e) => write!(f, "Capability error: {e}"),
            RenderError::Resource(e) => write!(f, "Resource error: {e}"),
            RenderError::FillFailed(msg) => write!(f, "Failed to fill draw calls: {msg}"),
            RenderError::Lane(e) => write!(f, "Lane error: {e}"),
            RenderError::NotInitialized => write!(f, "Renderer is not initialized"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Capability(e) => Some(e),
            RenderError::Resource(e) => Some(e),
            RenderError::Lane(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CapabilityError> for RenderError {
    fn from(e: CapabilityError) -> Self {
        RenderError::Capability(e)
    }
}

impl From<LaneError> for RenderError {
    fn from(e: LaneError) -> Self {
        RenderError::Lane(e)
    }
}

impl From<ResourceError> for RenderError {
    fn from(e: ResourceError) -> Self {
        RenderError::Resource(e)
    }
}
