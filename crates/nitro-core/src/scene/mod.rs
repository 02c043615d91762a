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

//! Scene-side collaborator types.
//!
//! Scene traversal and transform computation happen elsewhere. The renderer
//! consumes nodes through the [`SceneNode`] and [`HasGlowColor`] traits and
//! receives them grouped by material in a [`MeshMap`].

pub mod mesh_map;
pub mod node;

pub use self::mesh_map::{InstanceList, MeshMap};
pub use self::node::{GlowingNode, HasGlowColor, MeshNode, SceneNode, SceneObject};
