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

//! Per-frame grouping of visible (mesh, node) pairs by material bucket.

use super::node::SceneNode;
use crate::renderer::api::mesh::{GpuMesh, MeshId};
use ahash::AHashMap;
use std::sync::Arc;

/// One mesh and every node instancing it, in insertion order.
#[derive(Debug)]
pub struct InstanceList<N: ?Sized> {
    /// The shared mesh.
    pub mesh: Arc<GpuMesh>,
    /// The nodes drawing it.
    pub nodes: Vec<Arc<N>>,
}

impl<N: ?Sized> Clone for InstanceList<N> {
    fn clone(&self) -> Self {
        Self {
            mesh: self.mesh.clone(),
            nodes: self.nodes.clone(),
        }
    }
}

/// Maps a material bucket id to the instance lists assigned to it.
///
/// Meshes keep the order in which they were first seen so that draw order is
/// stable from one frame to the next. `N` is the node capability the buffer
/// consuming this map needs, usually `dyn SceneNode`, or `dyn HasGlowColor`
/// for the glow buffer.
#[derive(Debug)]
pub struct MeshMap<N: ?Sized = dyn SceneNode> {
    buckets: Vec<Vec<InstanceList<N>>>,
    index: Vec<AHashMap<MeshId, usize>>,
}

impl<N: ?Sized> MeshMap<N> {
    /// Creates an empty map with room for `bucket_count` buckets.
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| Vec::new()).collect(),
            index: (0..bucket_count).map(|_| AHashMap::new()).collect(),
        }
    }

    /// Adds `node` as an instance of `mesh` in `bucket`. Buckets past the
    /// current count are created on demand.
    pub fn push(&mut self, bucket: usize, mesh: &Arc<GpuMesh>, node: Arc<N>) {
        if bucket >= self.buckets.len() {
            self.buckets.resize_with(bucket + 1, Vec::new);
            self.index.resize_with(bucket + 1, AHashMap::new);
        }
        let existing = self.index[bucket].get(&mesh.id).copied();
        let lists = &mut self.buckets[bucket];
        match existing {
            Some(slot) => lists[slot].nodes.push(node),
            None => {
                self.index[bucket].insert(mesh.id, lists.len());
                lists.push(InstanceList {
                    mesh: mesh.clone(),
                    nodes: vec![node],
                });
            }
        }
    }

    /// The instance lists of `bucket`, empty when nothing was pushed.
    pub fn instance_lists(&self, bucket: usize) -> &[InstanceList<N>] {
        self.buckets.get(bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total (mesh, node) pairs in `bucket`.
    pub fn instance_count(&self, bucket: usize) -> usize {
        self.instance_lists(bucket)
            .iter()
            .map(|list| list.nodes.len())
            .sum()
    }

    /// Total (mesh, node) pairs in the whole map.
    pub fn total_instances(&self) -> usize {
        (0..self.buckets.len()).map(|b| self.instance_count(b)).sum()
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no instance was pushed.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Empties every bucket, keeping allocations for the next frame.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
        self.index.iter_mut().for_each(|index| index.clear());
    }
}

impl<N: ?Sized> Default for MeshMap<N> {
    fn default() -> Self {
        Self::new(0)
    }
}
