// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Time-windowed frame builder.
//!
//! Groups a stream of `(timestamp, points, sequence)` packets into frames
//! covering at most `frame_period` of device time each.
//!
//! # State machine
//!
//! ```text
//!            add (first packet)             add: ts >= start + period
//!   ┌───────┐ ─────────────────► ┌──────────────┐ ──────────┐
//!   │ Empty │                    │ Accumulating │           │ close, then open
//!   └───────┘ ◄───────────────── └──────────────┘ ◄─────────┘ with the same packet
//!            flush / reset            │   ▲
//!                                     └───┘ add: start <= ts < start + period
//!                                           (overflow closes early and reopens)
//! ```
//!
//! - The first packet after Empty defines the window start. Windows are not
//!   aligned to multiples of the period; each new window starts at the
//!   timestamp of the packet that opened it.
//! - Packets timestamped before the window start are late and dropped.
//! - If appending a packet would push the frame above `max_frame_points`,
//!   the frame is closed early and the packet opens the next one.
//! - A frame with no points is never emitted.
//!
//! Points are copied out of the caller's slice on `add`, and a completed
//! [`Frame`] owns its point storage outright.

use crate::{
    buffer::PointBuffer,
    lidar::{Error, Xyz},
    sequence::{SequenceEvent, SequenceTracker},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Default frame period (20 Hz)
pub const DEFAULT_FRAME_PERIOD_S: f64 = 0.05;

/// Default per-frame point ceiling
pub const DEFAULT_MAX_FRAME_POINTS: usize = 120_000;

/// Largest accepted per-frame point ceiling (192 MiB of coordinates)
pub const MAX_FRAME_POINTS_LIMIT: usize = 1 << 24;

/// Completed point cloud frame.
///
/// Immutable once handed out; the builder keeps no reference to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Points of every contributing packet, in arrival order
    pub xyz: Vec<Xyz>,
    /// Timestamp of the packet that opened the frame (ns)
    pub start_ts_ns: u64,
    /// Timestamp of the last contributing packet (ns)
    pub end_ts_ns: u64,
    pub seq_first: u32,
    pub seq_last: u32,
    pub packet_count: usize,
    pub point_count: usize,
}

impl Frame {
    /// Span between the first and last contributing packet, in seconds.
    pub fn duration_s(&self) -> f64 {
        self.end_ts_ns.saturating_sub(self.start_ts_ns) as f64 / 1e9
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Frame(pts={}, pkts={}, dur={:.3}s, seq={}-{})",
            self.point_count,
            self.packet_count,
            self.duration_s(),
            self.seq_first,
            self.seq_last
        )
    }
}

/// Frame builder configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBuilderConfig {
    /// Frame window length in seconds
    pub frame_period_s: f64,
    /// Point ceiling per frame
    pub max_frame_points: usize,
}

impl FrameBuilderConfig {
    /// Configuration for a target frame rate in Hz.
    pub fn from_frame_rate(hz: f64, max_frame_points: usize) -> Self {
        Self {
            frame_period_s: 1.0 / hz,
            max_frame_points,
        }
    }

    /// Check the configuration and return the frame period in nanoseconds.
    pub fn validate(&self) -> Result<u64, Error> {
        if !self.frame_period_s.is_finite() || self.frame_period_s <= 0.0 {
            return Err(Error::Config(format!(
                "frame period must be a positive number of seconds, got {}",
                self.frame_period_s
            )));
        }

        let period_ns = self.frame_period_s * 1e9;
        if period_ns < 1.0 || period_ns > u64::MAX as f64 {
            return Err(Error::Config(format!(
                "frame period out of range: {} s",
                self.frame_period_s
            )));
        }

        if self.max_frame_points == 0 {
            return Err(Error::Config(
                "max frame points must be at least 1".to_string(),
            ));
        }

        if self.max_frame_points > MAX_FRAME_POINTS_LIMIT {
            return Err(Error::Config(format!(
                "max frame points must be at most {}, got {}",
                MAX_FRAME_POINTS_LIMIT, self.max_frame_points
            )));
        }

        Ok(period_ns as u64)
    }
}

impl Default for FrameBuilderConfig {
    fn default() -> Self {
        Self {
            frame_period_s: DEFAULT_FRAME_PERIOD_S,
            max_frame_points: DEFAULT_MAX_FRAME_POINTS,
        }
    }
}

/// Frame building counters.
///
/// Counters only ever increase until [`FrameBuilderStats::reset`] is called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameBuilderStats {
    pub frames_built: u64,
    pub packets_added: u64,
    pub points_added: u64,
    /// Packets dropped for arriving before the open window
    pub late_packets: u64,
    /// Sequence gap events (one per jump, not per missing packet)
    pub seq_gaps: u64,
    pub seq_reorders: u64,
    /// Frames closed early by the point ceiling
    pub overflow_frames: u64,
}

impl FrameBuilderStats {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Average points per built frame.
    pub fn avg_points_per_frame(&self) -> f64 {
        self.points_added as f64 / self.frames_built.max(1) as f64
    }
}

impl fmt::Display for FrameBuilderStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "FrameBuilderStats(frames={}, pkts={}, pts={}, late={}, gaps={}, reorder={}, overflow={})",
            self.frames_built,
            self.packets_added,
            self.points_added,
            self.late_packets,
            self.seq_gaps,
            self.seq_reorders,
            self.overflow_frames
        )
    }
}

/// Metadata of the frame being accumulated.
#[derive(Clone, Copy, Debug)]
struct OpenFrame {
    start_ts_ns: u64,
    end_ts_ns: u64,
    seq_first: u32,
    seq_last: u32,
    packet_count: usize,
}

impl OpenFrame {
    fn new(ts: u64, seq: u32) -> Self {
        Self {
            start_ts_ns: ts,
            end_ts_ns: ts,
            seq_first: seq,
            seq_last: seq,
            packet_count: 0,
        }
    }
}

/// Time-based frame accumulator.
///
/// Single-threaded: every call runs to completion without blocking. Give
/// each concurrent stream its own builder.
#[derive(Debug)]
pub struct FrameBuilder {
    period_ns: u64,
    max_frame_points: usize,
    buffer: PointBuffer,
    current: Option<OpenFrame>,
    sequence: SequenceTracker,
    stats: FrameBuilderStats,
}

impl FrameBuilder {
    /// Create a builder, rejecting an invalid configuration up front.
    pub fn new(config: FrameBuilderConfig) -> Result<Self, Error> {
        let period_ns = config.validate()?;

        Ok(Self {
            period_ns,
            max_frame_points: config.max_frame_points,
            buffer: PointBuffer::with_capacity(config.max_frame_points),
            current: None,
            sequence: SequenceTracker::new(),
            stats: FrameBuilderStats::default(),
        })
    }

    /// Frame period in nanoseconds.
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Point ceiling per frame.
    pub fn max_frame_points(&self) -> usize {
        self.max_frame_points
    }

    /// Get the frame building counters.
    pub fn stats(&self) -> &FrameBuilderStats {
        &self.stats
    }

    /// Zero the counters without touching the open frame.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// True while a frame window is open.
    pub fn is_accumulating(&self) -> bool {
        self.current.is_some()
    }

    /// Start timestamp of the open window.
    pub fn frame_start(&self) -> Option<u64> {
        self.current.map(|open| open.start_ts_ns)
    }

    /// Points accumulated in the open frame.
    pub fn pending_points(&self) -> usize {
        self.buffer.len()
    }

    /// Packets accumulated in the open frame.
    pub fn pending_packets(&self) -> usize {
        self.current.map_or(0, |open| open.packet_count)
    }

    /// Add one packet's points.
    ///
    /// Returns the frame completed by this packet, if any. When a frame is
    /// returned, the packet itself has already been placed in the next frame.
    pub fn add(&mut self, timestamp_ns: u64, xyz: &[Xyz], seq: u32) -> Option<Frame> {
        let start = self
            .current
            .get_or_insert_with(|| OpenFrame::new(timestamp_ns, seq))
            .start_ts_ns;

        if timestamp_ns < start {
            self.stats.late_packets += 1;
            debug!(
                seq,
                late_ms = (start - timestamp_ns) as f64 / 1e6,
                "late packet discarded"
            );
            return None;
        }

        if timestamp_ns - start >= self.period_ns {
            let completed = self.close();
            self.append(timestamp_ns, xyz, seq);
            return completed;
        }

        self.append(timestamp_ns, xyz, seq)
    }

    /// Add a batch of packets, returning every frame they complete in order.
    pub fn add_batch<'a, I>(&mut self, packets: I) -> Vec<Frame>
    where
        I: IntoIterator<Item = (u64, &'a [Xyz], u32)>,
    {
        packets
            .into_iter()
            .filter_map(|(ts, xyz, seq)| self.add(ts, xyz, seq))
            .collect()
    }

    /// Close the open frame, typically at shutdown.
    ///
    /// Returns `None` if no points have been accumulated. The builder is
    /// Empty afterwards, so a second flush returns `None`.
    pub fn flush(&mut self) -> Option<Frame> {
        let frame = self.close();
        if let Some(frame) = &frame {
            debug!("flushed final frame: {}", frame);
        }
        frame
    }

    /// Discard the open frame and sequence history, keeping statistics.
    pub fn reset(&mut self) {
        self.current = None;
        self.buffer.clear();
        self.sequence.reset();
    }

    /// Append to the open frame, opening one if needed. May close the
    /// current frame first when the point ceiling would be exceeded.
    fn append(&mut self, timestamp_ns: u64, xyz: &[Xyz], seq: u32) -> Option<Frame> {
        match self.sequence.observe(seq) {
            SequenceEvent::Gap(missing) => {
                self.stats.seq_gaps += 1;
                debug!(seq, missing, "sequence gap");
            }
            SequenceEvent::Reorder => {
                self.stats.seq_reorders += 1;
                debug!(seq, "reordered packet");
            }
            SequenceEvent::First | SequenceEvent::InOrder => {}
        }

        let mut completed = None;
        if !self.buffer.is_empty() && self.buffer.len() + xyz.len() > self.max_frame_points {
            self.stats.overflow_frames += 1;
            debug!(
                pending = self.buffer.len(),
                incoming = xyz.len(),
                max = self.max_frame_points,
                "frame overflow, closing early"
            );
            completed = self.close();
        }

        let open = self
            .current
            .get_or_insert_with(|| OpenFrame::new(timestamp_ns, seq));
        open.end_ts_ns = timestamp_ns;
        open.seq_last = seq;
        open.packet_count += 1;

        self.buffer.extend_from_slice(xyz);
        self.stats.packets_added += 1;
        self.stats.points_added += xyz.len() as u64;

        completed
    }

    /// Finalize the open frame and return to Empty.
    fn close(&mut self) -> Option<Frame> {
        let open = self.current.take()?;
        if self.buffer.is_empty() {
            return None;
        }

        let xyz = self.buffer.take();
        let frame = Frame {
            point_count: xyz.len(),
            xyz,
            start_ts_ns: open.start_ts_ns,
            end_ts_ns: open.end_ts_ns,
            seq_first: open.seq_first,
            seq_last: open.seq_last,
            packet_count: open.packet_count,
        };

        self.stats.frames_built += 1;
        debug!("frame closed: {}", frame);

        Some(frame)
    }
}
