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
    InstanceLayout, ProgramId, RenderResources, ShaderPass, ShaderType, VertexArrayId,
    VertexLayout,
};

const VERTEX_LAYOUTS: [VertexLayout; 3] = [
    VertexLayout::Standard,
    VertexLayout::TwoTexCoords,
    VertexLayout::Tangents,
];

const INSTANCE_LAYOUTS: [InstanceLayout; 5] = [
    InstanceLayout::DualTex,
    InstanceLayout::ThreeTex,
    InstanceLayout::Shadow,
    InstanceLayout::ReflectiveShadowMap,
    InstanceLayout::Glow,
];

/// First id of the instanced vertex arrays; plain ones are below it.
const INSTANCE_VAO_BASE: usize = 100;

/// [`RenderResources`] handing out ids derived from their key.
///
/// The ids are stable across runs, and [`describe_program`](Self::describe_program)
/// turns a recorded program id back into the material and pass it was
/// requested for.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessResources;

impl HeadlessResources {
    /// Creates the resource table.
    pub fn new() -> Self {
        Self
    }

    /// The (material, pass, instanced) key a program id was created from.
    pub fn describe_program(&self, program: ProgramId) -> Option<(ShaderType, ShaderPass, bool)> {
        let instanced = program.0 % 2 == 1;
        let rest = program.0 / 2;
        let pass = ShaderPass::ALL.get(rest % ShaderPass::ALL.len())?;
        let material = ShaderType::ALL.get(rest / ShaderPass::ALL.len())?;
        Some((*material, *pass, instanced))
    }

    /// The (vertex, instance) layouts an instanced vertex array id encodes.
    pub fn describe_instance_vertex_array(
        &self,
        vertex_array: VertexArrayId,
    ) -> Option<(VertexLayout, InstanceLayout)> {
        let rest = vertex_array.0.checked_sub(INSTANCE_VAO_BASE)?;
        let vertex = VERTEX_LAYOUTS.get(rest / INSTANCE_LAYOUTS.len())?;
        let instance = INSTANCE_LAYOUTS.get(rest % INSTANCE_LAYOUTS.len())?;
        Some((*vertex, *instance))
    }
}

fn position<T: PartialEq>(items: &[T], item: &T) -> usize {
    items.iter().position(|i| i == item).unwrap_or_default()
}

impl RenderResources for HeadlessResources {
    fn vertex_array(&self, vertex: VertexLayout) -> VertexArrayId {
        VertexArrayId(1 + position(&VERTEX_LAYOUTS, &vertex))
    }

    fn instance_vertex_array(&self, vertex: VertexLayout, instance: InstanceLayout) -> VertexArrayId {
        VertexArrayId(
            INSTANCE_VAO_BASE
                + position(&VERTEX_LAYOUTS, &vertex) * INSTANCE_LAYOUTS.len()
                + position(&INSTANCE_LAYOUTS, &instance),
        )
    }

    fn program(&self, material: ShaderType, pass: ShaderPass, instanced: bool) -> ProgramId {
        let pass = position(&ShaderPass::ALL, &pass);
        let key = material.id() * ShaderPass::ALL.len() + pass;
        ProgramId(key * 2 + usize::from(instanced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_ids_round_trip_through_describe() {
        let resources = HeadlessResources::new();
        let id = resources.program(ShaderType::NormalMap, ShaderPass::Shadow, true);
        assert_eq!(
            resources.describe_program(id),
            Some((ShaderType::NormalMap, ShaderPass::Shadow, true))
        );
    }

    #[test]
    fn test_program_ids_are_distinct() {
        let resources = HeadlessResources::new();
        let mut ids = std::collections::HashSet::new();
        for material in ShaderType::ALL {
            for pass in ShaderPass::ALL {
                assert!(ids.insert(resources.program(material, pass, false)));
                assert!(ids.insert(resources.program(material, pass, true)));
            }
        }
    }

    #[test]
    fn test_instance_vertex_arrays_do_not_collide_with_plain_ones() {
        let resources = HeadlessResources::new();
        let plain = resources.vertex_array(VertexLayout::Tangents);
        let instanced =
            resources.instance_vertex_array(VertexLayout::Standard, InstanceLayout::DualTex);
        assert_ne!(plain, instanced);
        assert_eq!(
            resources.describe_instance_vertex_array(instanced),
            Some((VertexLayout::Standard, InstanceLayout::DualTex))
        );
        assert_eq!(resources.describe_instance_vertex_array(plain), None);
    }
}
