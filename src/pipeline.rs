// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Parser plus frame builder for a single stream.
//!
//! [`Pipeline::process`] takes one raw datagram and returns a frame whenever
//! that datagram completes one. Rejected datagrams only bump the protocol
//! counters.

use crate::{
    frame::{Frame, FrameBuilder, FrameBuilderConfig, FrameBuilderStats},
    lidar::Error,
    protocol::{LidarProtocol, ProtocolStats},
};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Serializable snapshot of both stages' counters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub protocol: ProtocolStats,
    pub frames: FrameBuilderStats,
    pub avg_points_per_frame: f64,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} avg_pts={:.0}",
            self.protocol, self.frames, self.avg_points_per_frame
        )
    }
}

/// Protocol parser feeding a frame builder.
///
/// Owns both stages and their statistics. One pipeline serves one stream.
#[derive(Debug)]
pub struct Pipeline {
    protocol: LidarProtocol,
    builder: FrameBuilder,
}

impl Pipeline {
    /// Create a pipeline.
    ///
    /// Fails with [`Error::Config`] if `config` is invalid.
    pub fn new(validate_crc: bool, config: FrameBuilderConfig) -> Result<Self, Error> {
        Ok(Self {
            protocol: LidarProtocol::new(validate_crc),
            builder: FrameBuilder::new(config)?,
        })
    }

    /// Parse one datagram and feed its points to the frame builder.
    pub fn process(&mut self, data: &[u8]) -> Option<Frame> {
        let packet = match self.protocol.parse(data) {
            Ok(packet) => packet,
            Err(reason) => {
                debug!("dropped datagram: {}", reason);
                return None;
            }
        };

        self.builder
            .add(packet.timestamp_ns, &packet.xyz, packet.sequence)
    }

    /// Emit whatever frame is still open.
    pub fn flush(&mut self) -> Option<Frame> {
        self.builder.flush()
    }

    /// Get the parser counters.
    pub fn protocol_stats(&self) -> &ProtocolStats {
        self.protocol.stats()
    }

    /// Get the frame builder counters.
    pub fn frame_stats(&self) -> &FrameBuilderStats {
        self.builder.stats()
    }

    /// Get the frame builder, e.g. to inspect the open frame.
    pub fn builder(&self) -> &FrameBuilder {
        &self.builder
    }

    /// Snapshot of both stages' counters.
    pub fn summary(&self) -> PipelineSummary {
        let frames = *self.builder.stats();
        PipelineSummary {
            protocol: *self.protocol.stats(),
            avg_points_per_frame: frames.avg_points_per_frame(),
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoder::PacketEncoder, lidar::Point};

    const MS: u64 = 1_000_000;

    fn cloud(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f32, 0.0, 0.0, 10))
            .collect()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            true,
            FrameBuilderConfig {
                frame_period_s: 0.1,
                max_frame_points: 10_000,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_process_builds_frames() {
        let mut pipeline = pipeline();
        let mut encoder = PacketEncoder::new(0, true);

        let mut frames = Vec::new();
        for i in 0..4u64 {
            for packet in encoder.encode_segmented(i * 60 * MS, &cloud(200)) {
                frames.extend(pipeline.process(&packet));
            }
        }
        frames.extend(pipeline.flush());

        // Windows: [0, 60ms], [120ms, 180ms]
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].point_count, 400);
        assert_eq!(frames[0].packet_count, 4);
        assert_eq!(frames[1].start_ts_ns, 120 * MS);

        let summary = pipeline.summary();
        assert_eq!(summary.protocol.valid_packets, 8);
        assert_eq!(summary.frames.frames_built, 2);
        assert_eq!(summary.frames.seq_gaps, 0);
        assert_eq!(summary.avg_points_per_frame, 400.0);
    }

    #[test]
    fn test_rejected_datagrams_are_counted_only() {
        let mut pipeline = pipeline();
        let mut encoder = PacketEncoder::new(0, true);

        let mut corrupt = encoder.encode(0, &cloud(5)).unwrap();
        corrupt[30] ^= 0xff;
        assert!(pipeline.process(&corrupt).is_none());
        assert!(pipeline.process(&[0u8; 10]).is_none());

        assert_eq!(pipeline.protocol_stats().total_packets, 2);
        assert_eq!(pipeline.protocol_stats().crc_failures, 1);
        assert_eq!(pipeline.protocol_stats().len_mismatch, 1);
        assert_eq!(pipeline.frame_stats().packets_added, 0);
        assert!(!pipeline.builder().is_accumulating());
    }

    #[test]
    fn test_summary_json() {
        let mut pipeline = pipeline();
        let packet = PacketEncoder::new(0, false).encode(0, &cloud(3)).unwrap();
        pipeline.process(&packet);
        pipeline.flush().unwrap();

        let json = serde_json::to_value(pipeline.summary()).unwrap();
        assert_eq!(json["protocol"]["valid_packets"], 1);
        assert_eq!(json["frames"]["frames_built"], 1);
        assert_eq!(json["avg_points_per_frame"], 3.0);
    }

    #[test]
    fn test_invalid_config() {
        let config = FrameBuilderConfig {
            frame_period_s: 0.0,
            ..Default::default()
        };
        assert!(matches!(Pipeline::new(true, config), Err(Error::Config(_))));
    }
}
