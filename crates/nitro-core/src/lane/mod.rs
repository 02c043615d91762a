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

//! # Lane Abstraction
//!
//! A **Lane** is a swappable processing strategy driven by an agent. In the
//! renderer each draw policy is a lane: the agent picks one at startup from
//! the GPU capabilities and keeps it for the lifetime of the renderer.
//!
//! The hierarchy has two levels:
//!
//! 1. **`Lane`** (this trait): identity, capability validation and cost
//!    estimation, shared by all lanes.
//! 2. **Domain traits** extending `Lane` with the actual work, such as
//!    `DrawPolicy` in `nitro-lanes`.
//!
//! ```rust,ignore
//! use nitro_core::lane::{Lane, LaneError, DrawWorkload};
//!
//! struct MyPolicy;
//!
//! impl Lane for MyPolicy {
//!     fn strategy_name(&self) -> &'static str { "MyPolicy" }
//!     fn submission_mode(&self) -> SubmissionMode { SubmissionMode::PerMeshDraw }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//! ```

use crate::renderer::api::capabilities::{GpuCapabilities, SubmissionMode};
use std::any::Any;
use std::fmt;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// The lane has not been initialized yet.
    NotInitialized,
    /// A domain-specific error occurred during initialization.
    InitializationFailed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotInitialized => write!(f, "Lane not initialized"),
            LaneError::InitializationFailed(e) => write!(f, "Lane initialization failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::InitializationFailed(e) => Some(e.as_ref()),
            LaneError::NotInitialized => None,
        }
    }
}

/// The amount of work a frame asks a draw lane to submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawWorkload {
    /// Non-empty material buckets across all filled command buffers.
    pub buckets: usize,
    /// Indirect commands, one per distinct mesh in a bucket.
    pub commands: usize,
    /// Mesh instances, one per (mesh, node) pair.
    pub instances: usize,
}

/// The unified base trait for all lanes.
pub trait Lane: Send + Sync {
    /// A stable name for logging and diagnostics.
    fn strategy_name(&self) -> &'static str;

    /// The GPU submission granularity of this lane.
    fn submission_mode(&self) -> SubmissionMode;

    /// Validates that the lane can run on `caps`.
    ///
    /// Called once when the lane is selected; a lane must never discover a
    /// missing capability in the middle of a frame.
    fn on_initialize(&mut self, caps: &GpuCapabilities) -> Result<(), LaneError> {
        self.submission_mode()
            .check(caps)
            .map_err(|e| LaneError::InitializationFailed(Box::new(e)))
    }

    /// Estimates the number of GPU submission calls for `workload`.
    fn estimate_cost(&self, workload: &DrawWorkload) -> f32 {
        match self.submission_mode() {
            SubmissionMode::PerMeshDraw => workload.instances as f32,
            SubmissionMode::IndirectPerMesh => workload.commands as f32,
            SubmissionMode::HardwareMultidraw => workload.buckets as f32,
        }
    }

    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}
