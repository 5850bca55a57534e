// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pre-allocated point accumulation buffer.
//!
//! The frame builder copies every accepted packet into a [`PointBuffer`]
//! sized to the frame point ceiling, so steady-state accumulation never
//! reallocates. When a frame closes, [`PointBuffer::take`] copies the filled
//! points into an exact-size vector owned by the frame and clears the
//! buffer, keeping its allocation for the next frame.
//!
//! ```text
//! ┌──────────────────────────────┐  take()  ┌──────────────────────┐
//! │ PointBuffer (filling)        │ ───────► │ Frame.xyz (owned)    │
//! │ [x,y,z][x,y,z]...  capacity N│          │ capacity = len       │
//! └──────────────────────────────┘          └──────────────────────┘
//!          ▲ cleared, allocation reused
//! ```
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarrx::buffer::PointBuffer;
//!
//! let mut buf = PointBuffer::with_capacity(1_000);
//! buf.extend_from_slice(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
//! assert_eq!(buf.len(), 2);
//!
//! let points = buf.take();
//! assert_eq!(points.len(), 2);
//! assert!(buf.is_empty());
//! assert_eq!(buf.capacity(), 1_000);
//! ```

use crate::lidar::Xyz;

/// Growable point storage with a reserved capacity.
///
/// Capacity is a reservation, not a limit: appending past it grows the
/// allocation. The frame builder enforces its own ceiling before appending.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    points: Vec<Xyz>,
    reserve: usize,
}

impl PointBuffer {
    /// Create a buffer with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            reserve: capacity,
        }
    }

    /// Returns the number of points in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the buffer contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the reserved capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.reserve
    }

    /// Append a batch of points, copying them out of the caller's slice.
    #[inline]
    pub fn extend_from_slice(&mut self, points: &[Xyz]) {
        self.points.extend_from_slice(points);
    }

    /// Returns the accumulated points.
    #[inline]
    pub fn as_slice(&self) -> &[Xyz] {
        &self.points
    }

    /// Drop all points, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Copy the accumulated points out and clear the buffer.
    ///
    /// The returned vector holds exactly the accumulated points, with no
    /// spare capacity. The buffer keeps its allocation, so closing a frame
    /// never allocates the full reservation again.
    pub fn take(&mut self) -> Vec<Xyz> {
        let points = self.points.to_vec();
        self.points.clear();
        points
    }
}

impl Default for PointBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
