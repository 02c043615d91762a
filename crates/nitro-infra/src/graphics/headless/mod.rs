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

//! A headless backend that records instead of rendering.
//!
//! [`HeadlessDevice`] keeps buffer contents in memory and enforces the
//! map / write / unmap protocol, [`RecordingRecorder`] stores every draw
//! call, and [`HeadlessResources`] hands out deterministic program and
//! vertex-array ids.

mod device;
mod recorder;
mod resources;

pub use device::{BufferEvent, HeadlessDevice};
pub use recorder::{RecordedCommand, RecordingRecorder, ResolvedDraw};
pub use resources::HeadlessResources;
