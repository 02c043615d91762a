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

//! Rendering lane - hot path of the instanced renderer.
//!
//! Per frame, [`DrawCalls`] packs the visible scene into command buffers and
//! a [`DrawPolicy`] submits them pass by pass. The policy is chosen once from
//! the GPU capabilities with [`select_policy`].

pub mod arena;
pub mod command_buffer;
mod draw_calls;
mod explicit_lane;
pub mod instance;
mod instanced_lane;
mod policy;
pub mod textures;

pub use command_buffer::{
    CommandBuffer, CommandBufferError, CommandBufferKind, GlowCommandBuffer, InstanceStream,
    MaterialBucket, RsmCommandBuffer, ShadowCommandBuffer, SolidCommandBuffer, Submit,
};
pub use draw_calls::*;
pub use explicit_lane::*;
pub use instanced_lane::*;
pub use policy::{select_policy, DrawContext, DrawPolicy};
pub use textures::PrefilledTextures;
