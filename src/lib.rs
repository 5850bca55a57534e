// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst LiDAR Stream Receiver Library
//!
//! Ingestion core for LiDAR point streams carried over UDP in the LIVR
//! packet format: validates and decodes datagrams, then groups their points
//! into time-windowed frames for downstream consumers such as SLAM.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │ LidarProtocol │ ──► │  FrameBuilder   │ ──► Frame
//! │  (UDP/test)     │     │ (validate +   │     │  (time window + │
//! └─────────────────┘     │  decode)      │     │   point ceiling)│
//!                         └───────────────┘     └─────────────────┘
//!                                │                      │
//!                                ▼                      ▼
//!                          ProtocolStats         FrameBuilderStats
//! ```
//!
//! Both stages are synchronous and single-threaded. Malformed datagrams are
//! counted and dropped, never surfaced as errors; the only fallible
//! operations are configuration and I/O.
//!
//! # Modules
//!
//! - [`protocol`]: LIVR wire format, validation and decoding
//! - [`encoder`]: LIVR packet encoding and segmentation
//! - [`frame`]: Time-windowed frame builder
//! - [`sequence`]: Sequence gap and reorder tracking
//! - [`buffer`]: Pre-allocated point accumulation storage
//! - [`pipeline`]: Parser and frame builder wired together
//! - [`packet_source`]: Datagram source abstraction for live and test input
//! - [`lidar`]: Common point types and error handling
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarrx::{
//!     encoder::PacketEncoder,
//!     frame::FrameBuilderConfig,
//!     lidar::Point,
//!     pipeline::Pipeline,
//! };
//!
//! let mut pipeline = Pipeline::new(true, FrameBuilderConfig::default()).unwrap();
//! let mut encoder = PacketEncoder::new(0, true);
//!
//! let scan = vec![Point::new(1.0, 0.0, 0.5, 80); 500];
//! let mut frames = Vec::new();
//! for ts in [0, 20_000_000, 40_000_000, 60_000_000] {
//!     for packet in encoder.encode_segmented(ts, &scan) {
//!         frames.extend(pipeline.process(&packet));
//!     }
//! }
//! frames.extend(pipeline.flush());
//!
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[0].point_count, 1_500);
//! ```

pub mod buffer;
pub mod encoder;
pub mod frame;
pub mod lidar;
pub mod packet_source;
pub mod pipeline;
pub mod protocol;
pub mod sequence;

// Re-exports for convenience
pub use frame::{Frame, FrameBuilder, FrameBuilderConfig, FrameBuilderStats};
pub use lidar::{Error, Point, Xyz};
pub use pipeline::{Pipeline, PipelineSummary};
pub use protocol::{InvalidReason, LidarProtocol, ParsedPacket, ProtocolStats};
