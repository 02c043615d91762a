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

//! Fixed-capacity staging arena for GPU records.

use bytemuck::Pod;

/// Upper bound on draw commands per command buffer and on instance records
/// per instance stream.
pub const MAX_DRAW_CALLS: usize = 10_000;

/// Returned when a write would go past an arena's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    /// Records already written.
    pub used: usize,
    /// Records the failed write asked for.
    pub requested: usize,
    /// The fixed capacity.
    pub capacity: usize,
}

/// A write cursor over a fixed number of `T` records.
///
/// The backing storage is allocated once at creation and never grows, so
/// filling a frame costs no allocation. Every write is checked against the
/// capacity; a failed write leaves the arena unchanged.
#[derive(Debug)]
pub struct Arena<T: Pod> {
    data: Vec<T>,
    capacity: usize,
}

impl<T: Pod> Arena<T> {
    /// Creates an empty arena holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Index the next record will be written at.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.data.len()
    }

    /// The fixed capacity in records.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records that can still be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Whether nothing was written since the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the full arena in bytes, the size of the GPU buffer it mirrors.
    #[inline]
    pub fn byte_capacity(&self) -> u64 {
        (self.capacity * std::mem::size_of::<T>()) as u64
    }

    /// Checks that `count` more records fit.
    #[inline]
    pub fn ensure(&self, count: usize) -> Result<(), CapacityExceeded> {
        if count > self.remaining() {
            return Err(CapacityExceeded {
                used: self.data.len(),
                requested: count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Writes one record and returns its index.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<usize, CapacityExceeded> {
        self.ensure(1)?;
        let index = self.data.len();
        self.data.push(value);
        Ok(index)
    }

    /// Rewinds the cursor to zero.
    #[inline]
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// The records written since the last reset.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The written records as raw bytes, ready for upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_advances_cursor() {
        let mut arena = Arena::<u32>::with_capacity(4);
        assert_eq!(arena.push(7), Ok(0));
        assert_eq!(arena.push(9), Ok(1));
        assert_eq!(arena.cursor(), 2);
        assert_eq!(arena.remaining(), 2);
        assert_eq!(arena.as_slice(), &[7, 9]);
        assert_eq!(arena.as_bytes().len(), 8);
    }

    #[test]
    fn test_overflow_is_refused_without_side_effects() {
        let mut arena = Arena::<u32>::with_capacity(2);
        arena.push(1).unwrap();
        arena.push(2).unwrap();
        let err = arena.push(3).unwrap_err();
        assert_eq!(
            err,
            CapacityExceeded {
                used: 2,
                requested: 1,
                capacity: 2
            }
        );
        assert_eq!(arena.cursor(), 2);
    }

    #[test]
    fn test_ensure_checks_whole_runs() {
        let mut arena = Arena::<u32>::with_capacity(10);
        arena.push(0).unwrap();
        assert!(arena.ensure(9).is_ok());
        assert!(arena.ensure(10).is_err());
    }

    #[test]
    fn test_reset_rewinds() {
        let mut arena = Arena::<u32>::with_capacity(MAX_DRAW_CALLS);
        for i in 0..100 {
            arena.push(i).unwrap();
        }
        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.remaining(), MAX_DRAW_CALLS);
        assert_eq!(arena.byte_capacity(), (MAX_DRAW_CALLS * 4) as u64);
    }
}
