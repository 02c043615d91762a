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

//! GPU capability flags and the render strategy derived from them.
//!
//! Capabilities are queried once from the device. [`RenderStrategy::resolve`]
//! turns them into a small set of tagged choices that command buffers and
//! draw policies receive at construction, so nothing downstream has to query
//! the hardware again.

use crate::renderer::error::CapabilityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean capability flags reported by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuCapabilities {
    /// Buffers can be persistently mapped and written while the GPU reads them.
    pub async_instance_upload: bool,
    /// Textures can be referenced from shaders through bindless handles ("AZDO").
    pub bindless_textures: bool,
    /// Draws can start reading instance attributes at an arbitrary base instance.
    pub base_instance: bool,
    /// Indexed draws can source their parameters from a GPU buffer.
    pub draw_indirect: bool,
    /// Many indirect draws can be issued with a single call.
    pub multi_draw_indirect: bool,
}

impl GpuCapabilities {
    /// Every capability enabled, as on a modern desktop driver.
    pub const FULL: Self = Self {
        async_instance_upload: true,
        bindless_textures: true,
        base_instance: true,
        draw_indirect: true,
        multi_draw_indirect: true,
    };

    /// No optional capability, as on an old or embedded driver.
    pub const MINIMAL: Self = Self {
        async_instance_upload: false,
        bindless_textures: false,
        base_instance: false,
        draw_indirect: false,
        multi_draw_indirect: false,
    };
}

/// How instance and command data reach the GPU each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStrategy {
    /// Mapped once at creation and written in place every frame.
    PersistentMapped,
    /// Re-mapped every frame with discard semantics, unmapped before drawing.
    StreamedDiscard,
}

/// How per-mesh textures are handed to shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    /// Bindless handles passed as uniforms or instance attributes.
    Bindless,
    /// Classic texture units bound before each draw.
    BoundTextureUnits,
}

/// The GPU submission granularity, one per draw policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionMode {
    /// One ordinary draw call per mesh instance.
    PerMeshDraw,
    /// One indirect draw call per distinct mesh in a material bucket.
    IndirectPerMesh,
    /// One multidraw call per material bucket.
    HardwareMultidraw,
}

impl SubmissionMode {
    /// All modes, from the least to the most demanding.
    pub const ALL: [SubmissionMode; 3] = [
        SubmissionMode::PerMeshDraw,
        SubmissionMode::IndirectPerMesh,
        SubmissionMode::HardwareMultidraw,
    ];

    /// Checks that `caps` can run this mode.
    pub fn check(self, caps: &GpuCapabilities) -> Result<(), CapabilityError> {
        let missing = match self {
            SubmissionMode::PerMeshDraw => None,
            SubmissionMode::IndirectPerMesh => {
                if !caps.draw_indirect {
                    Some("draw_indirect")
                } else if !caps.base_instance {
                    Some("base_instance")
                } else {
                    None
                }
            }
            SubmissionMode::HardwareMultidraw => {
                if !caps.multi_draw_indirect {
                    Some("multi_draw_indirect")
                } else if !caps.base_instance {
                    Some("base_instance")
                } else if !caps.bindless_textures {
                    // Per-mesh textures cannot change inside one multidraw call.
                    Some("bindless_textures")
                } else {
                    None
                }
            }
        };
        match missing {
            Some(capability) => Err(CapabilityError::MissingCapability {
                mode: self,
                capability,
            }),
            None => Ok(()),
        }
    }

    /// The most efficient mode `caps` supports.
    pub fn best_for(caps: &GpuCapabilities) -> SubmissionMode {
        Self::ALL
            .into_iter()
            .rev()
            .find(|mode| mode.check(caps).is_ok())
            .unwrap_or(SubmissionMode::PerMeshDraw)
    }
}

impl fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionMode::PerMeshDraw => write!(f, "PerMeshDraw"),
            SubmissionMode::IndirectPerMesh => write!(f, "IndirectPerMesh"),
            SubmissionMode::HardwareMultidraw => write!(f, "HardwareMultidraw"),
        }
    }
}

/// The strategy object injected into command buffers and draw policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderStrategy {
    /// How buffers are written.
    pub upload: UploadStrategy,
    /// How textures are bound.
    pub textures: TextureBinding,
    /// How draws are submitted.
    pub submission: SubmissionMode,
    /// Whether draws may start at a non-zero base instance. Without it the
    /// per-draw path binds each mesh's own vertex array.
    pub base_instance: bool,
}

impl RenderStrategy {
    /// Resolves the strategy once from the detected capabilities.
    ///
    /// # Arguments
    ///
    /// * `caps` - The capabilities reported by the device.
    /// * `preferred` - A submission mode forced by configuration, if any.
    ///
    /// # Returns
    ///
    /// The resolved strategy, or a `CapabilityError` when `preferred` names a
    /// mode the hardware cannot run.
    pub fn resolve(
        caps: &GpuCapabilities,
        preferred: Option<SubmissionMode>,
    ) -> Result<Self, CapabilityError> {
        let submission = match preferred {
            Some(mode) => {
                mode.check(caps)?;
                mode
            }
            None => SubmissionMode::best_for(caps),
        };
        let strategy = Self {
            upload: if caps.async_instance_upload {
                UploadStrategy::PersistentMapped
            } else {
                UploadStrategy::StreamedDiscard
            },
            textures: if caps.bindless_textures {
                TextureBinding::Bindless
            } else {
                TextureBinding::BoundTextureUnits
            },
            submission,
            base_instance: caps.base_instance,
        };
        log::debug!("Resolved render strategy {:?} from {:?}", strategy, caps);
        Ok(strategy)
    }

    /// Whether material buckets keep the list of meshes they drew.
    /// Only per-mesh submission needs it.
    #[inline]
    pub fn records_bucket_meshes(&self) -> bool {
        self.submission != SubmissionMode::HardwareMultidraw
    }
}
