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

//! Expansion of per-mesh texture bindings.

use nitro_core::renderer::{
    api::{GpuMesh, ShaderPass, ShaderType, TextureBinding, TextureHandle, TextureId},
    traits::DrawRecorder,
};

/// Most textures a single draw can bind: mesh slots plus prefilled ones.
const MAX_BOUND_TEXTURES: usize = 12;

/// Texture unit 0 holds the engine's null texture; missing slots point at it.
pub const NULL_TEXTURE: TextureId = TextureId(0);

/// Frame-wide textures the second pass samples after the mesh's own ones:
/// diffuse light, specular light, SSAO, and the depth buffer for vegetation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefilledTextures {
    /// Bindless handles, used when textures are bindless.
    pub handles: Vec<TextureHandle>,
    /// Texture ids, used with bound texture units.
    pub textures: Vec<TextureId>,
}

impl PrefilledTextures {
    /// Creates the prefilled set from parallel handle and id lists.
    pub fn new(handles: Vec<TextureHandle>, textures: Vec<TextureId>) -> Self {
        Self { handles, textures }
    }
}

/// Binds the textures `material` samples during `pass` for one mesh.
///
/// Under [`TextureBinding::Bindless`] the handles are passed to the program;
/// otherwise each texture is bound to consecutive units. `prefilled` is
/// appended for the second pass, truncated to what the material samples.
pub fn expand_textures(
    recorder: &mut dyn DrawRecorder,
    binding: TextureBinding,
    mesh: &GpuMesh,
    material: ShaderType,
    pass: ShaderPass,
    prefilled: Option<&PrefilledTextures>,
) {
    let slots = material.texture_slots(pass);
    let extra = material.prefilled_texture_count();
    match binding {
        TextureBinding::Bindless => {
            let mut handles = [TextureHandle::default(); MAX_BOUND_TEXTURES];
            let mut count = 0;
            for &slot in slots {
                handles[count] = mesh.texture_handles[slot];
                count += 1;
            }
            if let Some(prefilled) = prefilled {
                for handle in prefilled.handles.iter().take(extra) {
                    handles[count] = *handle;
                    count += 1;
                }
            }
            if count > 0 {
                recorder.bind_texture_handles(&handles[..count]);
            }
        }
        TextureBinding::BoundTextureUnits => {
            let mut textures = [NULL_TEXTURE; MAX_BOUND_TEXTURES];
            let mut count = 0;
            for &slot in slots {
                textures[count] = mesh.textures[slot].unwrap_or(NULL_TEXTURE);
                count += 1;
            }
            if let Some(prefilled) = prefilled {
                for texture in prefilled.textures.iter().take(extra) {
                    textures[count] = *texture;
                    count += 1;
                }
            }
            if count > 0 {
                recorder.bind_textures(&textures[..count]);
            }
        }
    }
}
