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

//! Global settings for the rendering system.

use crate::renderer::api::capabilities::SubmissionMode;
use serde::{Deserialize, Serialize};

/// A collection of global settings that can affect the rendering process.
///
/// Missing fields fall back to [`RenderSettings::default`] when parsed, so a
/// settings file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Deferred shading with dynamic lights. Shadows and global illumination
    /// need it.
    pub dynamic_lights: bool,
    /// Cascaded sun shadows.
    pub shadows: bool,
    /// Indirect lighting from the reflective shadow map.
    pub global_illumination: bool,
    /// Glow outlines around glowing objects.
    pub glow: bool,
    /// Draws vertex normals on top of the scene.
    pub show_normals: bool,
    /// Wireframe debug view. Glow is skipped while it is on.
    pub show_wireframe: bool,
    /// Forces a submission mode instead of picking the best one the GPU
    /// supports. Rejected at startup if the GPU lacks a needed capability.
    pub preferred_submission: Option<SubmissionMode>,
    /// Number of cameras rendered each frame (split screen).
    pub camera_count: usize,
}

impl RenderSettings {
    /// Parses settings from a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Whether shadow cascades are rendered this frame.
    #[inline]
    pub fn shadows_active(&self) -> bool {
        self.dynamic_lights && self.shadows
    }

    /// Whether the reflective shadow map is needed.
    #[inline]
    pub fn global_illumination_active(&self) -> bool {
        self.dynamic_lights && self.global_illumination
    }

    /// Whether the glow pass runs.
    #[inline]
    pub fn glow_active(&self) -> bool {
        self.glow && !self.show_wireframe
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dynamic_lights: true,
            shadows: true,
            global_illumination: false,
            glow: true,
            show_normals: false,
            show_wireframe: false,
            preferred_submission: None,
            camera_count: 1,
        }
    }
}
