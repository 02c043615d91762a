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

//! Loading of hardware capability profiles and render settings from RON.
//!
//! A profile lists the capability flags of a GPU, so the headless device can
//! stand in for a specific class of hardware:
//!
//! ```ron
//! (
//!     async_instance_upload: false,
//!     bindless_textures: false,
//!     base_instance: true,
//!     draw_indirect: true,
//!     multi_draw_indirect: false,
//! )
//! ```
//!
//! Missing flags default to `false`.

use anyhow::Context;
use nitro_core::renderer::{GpuCapabilities, RenderSettings};
use std::path::Path;

/// Parses a capability profile.
pub fn parse_capabilities(source: &str) -> anyhow::Result<GpuCapabilities> {
    ron::from_str(source).context("Invalid GPU capability profile")
}

/// Reads and parses the capability profile at `path`.
pub fn load_capabilities(path: impl AsRef<Path>) -> anyhow::Result<GpuCapabilities> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read capability profile {}", path.display()))?;
    let caps = parse_capabilities(&source).with_context(|| format!("In {}", path.display()))?;
    log::info!("Loaded GPU capability profile {}: {:?}", path.display(), caps);
    Ok(caps)
}

/// Reads and parses the render settings at `path`.
pub fn load_settings(path: impl AsRef<Path>) -> anyhow::Result<RenderSettings> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read render settings {}", path.display()))?;
    RenderSettings::from_ron_str(&source)
        .with_context(|| format!("Invalid render settings in {}", path.display()))
}
