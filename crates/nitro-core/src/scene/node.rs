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

//! Scene-node capabilities consumed by the renderer.

use crate::math::{AffineTransform, LinearRgba};
use std::fmt::Debug;
use std::sync::Arc;

/// A scene node instancing a mesh.
///
/// World transforms are computed by the scene graph; the renderer only reads
/// the result.
pub trait SceneNode: Send + Sync + Debug {
    /// The node's world-space transform.
    fn absolute_transform(&self) -> AffineTransform;

    /// A debug name.
    fn name(&self) -> &str {
        ""
    }

    /// Whether the node animates its texture coordinates through a texture
    /// matrix. Such nodes cannot be packed into instance records.
    fn has_texture_matrix(&self) -> bool {
        false
    }
}

/// A node that glows. Only types implementing this can be packed into glow
/// instance records.
pub trait HasGlowColor: SceneNode {
    /// The glow color.
    fn glow_color(&self) -> LinearRgba;
}

/// A plain mesh node.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    /// Debug name.
    pub name: String,
    /// World-space transform.
    pub transform: AffineTransform,
    /// Whether the node carries a texture matrix.
    pub texture_matrix: bool,
}

impl MeshNode {
    /// Creates a mesh node at `transform`.
    pub fn new(name: impl Into<String>, transform: AffineTransform) -> Self {
        Self {
            name: name.into(),
            transform,
            texture_matrix: false,
        }
    }

    /// Marks the node as animating its texture coordinates.
    pub fn with_texture_matrix(mut self) -> Self {
        self.texture_matrix = true;
        self
    }
}

impl SceneNode for MeshNode {
    fn absolute_transform(&self) -> AffineTransform {
        self.transform
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_texture_matrix(&self) -> bool {
        self.texture_matrix
    }
}

/// A mesh node outlined by the glow pass (items, nitro boxes, karts under
/// a powerup).
#[derive(Debug, Clone, PartialEq)]
pub struct GlowingNode {
    /// Debug name.
    pub name: String,
    /// World-space transform.
    pub transform: AffineTransform,
    /// The outline color.
    pub color: LinearRgba,
}

impl GlowingNode {
    /// Creates a glowing node.
    pub fn new(name: impl Into<String>, transform: AffineTransform, color: LinearRgba) -> Self {
        Self {
            name: name.into(),
            transform,
            color,
        }
    }
}

impl SceneNode for GlowingNode {
    fn absolute_transform(&self) -> AffineTransform {
        self.transform
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl HasGlowColor for GlowingNode {
    fn glow_color(&self) -> LinearRgba {
        self.color
    }
}

/// A visible scene object, tagged by the capabilities its node has.
///
/// Matching on the variant replaces any runtime type inspection: only the
/// `Glowing` variant can ever reach glow packing.
#[derive(Debug, Clone)]
pub enum SceneObject {
    /// A node without glow.
    Mesh(Arc<MeshNode>),
    /// A node with a glow color.
    Glowing(Arc<GlowingNode>),
}

impl SceneObject {
    /// The node as a plain scene node.
    pub fn node(&self) -> Arc<dyn SceneNode> {
        match self {
            SceneObject::Mesh(node) => node.clone() as Arc<dyn SceneNode>,
            SceneObject::Glowing(node) => node.clone() as Arc<dyn SceneNode>,
        }
    }

    /// The node's glow capability, if it has one.
    pub fn glow(&self) -> Option<Arc<dyn HasGlowColor>> {
        match self {
            SceneObject::Mesh(_) => None,
            SceneObject::Glowing(node) => Some(node.clone() as Arc<dyn HasGlowColor>),
        }
    }
}

impl From<MeshNode> for SceneObject {
    fn from(node: MeshNode) -> Self {
        SceneObject::Mesh(Arc::new(node))
    }
}

impl From<GlowingNode> for SceneObject {
    fn from(node: GlowingNode) -> Self {
        SceneObject::Glowing(Arc::new(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn test_only_glowing_objects_expose_glow() {
        let plain: SceneObject = MeshNode::new("tree", AffineTransform::IDENTITY).into();
        let glowing: SceneObject =
            GlowingNode::new("item", AffineTransform::IDENTITY, LinearRgba::RED).into();
        assert!(plain.glow().is_none());
        assert_eq!(glowing.glow().map(|g| g.glow_color()), Some(LinearRgba::RED));
    }

    #[test]
    fn test_node_view_keeps_transform() {
        let t = AffineTransform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let obj: SceneObject = GlowingNode::new("item", t, LinearRgba::BLUE).into();
        assert_eq!(obj.node().absolute_transform(), t);
        assert_eq!(obj.node().name(), "item");
    }
}
