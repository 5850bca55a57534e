// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! LIVR stream protocol parser.
//!
//! Each UDP datagram carries one batch of points from the sensor bridge.
//!
//! # Packet Structure (little-endian)
//!
//! ## Header - 27 bytes
//! - magic: 4 bytes, `0x4C495652` ("LIVR")
//! - version: 1 byte, currently 1
//! - device_timestamp: 8 bytes, nanoseconds (device monotonic)
//! - sequence: 4 bytes, wraps at 2^32
//! - point_count: 2 bytes, 1-105
//! - flags: 2 bytes, reserved
//! - sensor_id: 2 bytes
//! - crc32: 4 bytes, IEEE 802.3 over `header[0..23]` + payload
//!
//! ## Payload - 13 bytes × point_count
//! - x, y, z: 3 × f32 meters
//! - intensity: u8
//!
//! A zero `crc32` field disables checksum validation for that packet. This is
//! a protocol leniency used by synthetic traffic and by bridges running with
//! CRC generation turned off. It means a sender on an untrusted network can
//! bypass integrity checking by zeroing the field.

use crate::lidar::{Point, Xyz};
use serde::Serialize;
use std::fmt;
use tracing::trace;

/// Protocol magic, "LIVR" when read as a little-endian u32.
pub const MAGIC: u32 = 0x4C49_5652;

/// Supported protocol version
pub const VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 27;

/// Size of one point record in bytes
pub const POINT_SIZE: usize = 13;

/// Largest point count that fits a 1400 byte UDP payload
pub const MAX_POINTS_PER_PACKET: usize = 105;

/// Byte offset of the crc32 field; the checksum covers everything before it.
pub const CRC_OFFSET: usize = 23;

/// Largest valid datagram
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_POINTS_PER_PACKET * POINT_SIZE;

/// Compute the packet checksum over `header[0..23]` followed by the payload.
///
/// Standard CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`), fed
/// incrementally so the crc32 field never needs to be cut out of a copy.
pub fn crc32(header_prefix: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(header_prefix);
    hasher.update(payload);
    hasher.finalize()
}

/// Decoded packet header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u8,
    /// Device timestamp in nanoseconds
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub point_count: u16,
    pub flags: u16,
    pub sensor_id: u16,
    pub crc32: u32,
}

impl PacketHeader {
    /// Decode the fixed 27 byte header. Returns `None` if `data` is shorter
    /// than [`HEADER_SIZE`]; no field is validated here.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }

        Some(Self {
            magic: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            version: data[4],
            timestamp_ns: u64::from_le_bytes([
                data[5], data[6], data[7], data[8], data[9], data[10], data[11], data[12],
            ]),
            sequence: u32::from_le_bytes([data[13], data[14], data[15], data[16]]),
            point_count: u16::from_le_bytes([data[17], data[18]]),
            flags: u16::from_le_bytes([data[19], data[20]]),
            sensor_id: u16::from_le_bytes([data[21], data[22]]),
            crc32: u32::from_le_bytes([data[23], data[24], data[25], data[26]]),
        })
    }

    /// Write the header into the first [`HEADER_SIZE`] bytes of `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than [`HEADER_SIZE`].
    pub fn encode_into(&self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&self.magic.to_le_bytes());
        dst[4] = self.version;
        dst[5..13].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        dst[13..17].copy_from_slice(&self.sequence.to_le_bytes());
        dst[17..19].copy_from_slice(&self.point_count.to_le_bytes());
        dst[19..21].copy_from_slice(&self.flags.to_le_bytes());
        dst[21..23].copy_from_slice(&self.sensor_id.to_le_bytes());
        dst[23..27].copy_from_slice(&self.crc32.to_le_bytes());
    }

    /// Total datagram length implied by `point_count`.
    #[inline]
    pub fn packet_len(&self) -> usize {
        HEADER_SIZE + self.point_count as usize * POINT_SIZE
    }
}

/// Reason a datagram was rejected.
///
/// Rejection is an expected steady-state condition on an unreliable
/// transport; each variant maps to exactly one [`ProtocolStats`] counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    /// Shorter than the header (counted as a length mismatch)
    TooShort(usize),
    /// Magic field did not match [`MAGIC`]
    BadMagic(u32),
    /// Version field did not match [`VERSION`]
    BadVersion(u8),
    /// Point count outside `1..=105`
    InvalidPointCount(u16),
    /// Datagram length disagrees with the header's point count
    LengthMismatch { expected: usize, actual: usize },
    /// Checksum mismatch
    CrcMismatch { expected: u32, computed: u32 },
}

impl std::error::Error for InvalidReason {}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidReason::TooShort(len) => {
                write!(f, "datagram too short: {} < {} bytes", len, HEADER_SIZE)
            }
            InvalidReason::BadMagic(magic) => {
                write!(f, "bad magic: 0x{:08X} != 0x{:08X}", magic, MAGIC)
            }
            InvalidReason::BadVersion(version) => {
                write!(f, "bad version: {} != {}", version, VERSION)
            }
            InvalidReason::InvalidPointCount(count) => write!(
                f,
                "invalid point count: {} (valid: 1-{})",
                count, MAX_POINTS_PER_PACKET
            ),
            InvalidReason::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: {} != {} bytes", actual, expected)
            }
            InvalidReason::CrcMismatch { expected, computed } => write!(
                f,
                "crc mismatch: computed 0x{:08X} != received 0x{:08X}",
                computed, expected
            ),
        }
    }
}

/// Successfully decoded datagram.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedPacket {
    /// Device timestamp in nanoseconds
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub point_count: u16,
    pub sensor_id: u16,
    pub flags: u16,
    /// Checksum as received (0 when the sender disabled it)
    pub crc32: u32,
    /// Full point records including intensity
    pub points: Vec<Point>,
    /// Coordinates only, same order as `points`
    pub xyz: Vec<Xyz>,
}

impl ParsedPacket {
    /// Intensity values in point order.
    pub fn intensity(&self) -> impl Iterator<Item = u8> + '_ {
        self.points.iter().map(|pt| pt.intensity)
    }
}

/// Protocol error counters.
///
/// Counters only ever increase until [`ProtocolStats::reset`] is called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolStats {
    pub total_packets: u64,
    pub valid_packets: u64,
    pub crc_failures: u64,
    pub bad_magic: u64,
    pub bad_version: u64,
    pub len_mismatch: u64,
    pub invalid_count: u64,
}

impl ProtocolStats {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of rejected datagrams.
    pub fn rejected(&self) -> u64 {
        self.total_packets - self.valid_packets
    }

    fn record(&mut self, reason: &InvalidReason) {
        match reason {
            InvalidReason::TooShort(_) | InvalidReason::LengthMismatch { .. } => {
                self.len_mismatch += 1
            }
            InvalidReason::BadMagic(_) => self.bad_magic += 1,
            InvalidReason::BadVersion(_) => self.bad_version += 1,
            InvalidReason::InvalidPointCount(_) => self.invalid_count += 1,
            InvalidReason::CrcMismatch { .. } => self.crc_failures += 1,
        }
    }
}

impl fmt::Display for ProtocolStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ProtocolStats(total={}, valid={}, crc_fail={}, bad_magic={}, bad_ver={}, len_err={}, count_err={})",
            self.total_packets,
            self.valid_packets,
            self.crc_failures,
            self.bad_magic,
            self.bad_version,
            self.len_mismatch,
            self.invalid_count
        )
    }
}

/// LIVR datagram parser.
///
/// Holds no state about previous datagrams beyond its counters, so decoding
/// is deterministic: the same bytes always produce the same result.
#[derive(Debug)]
pub struct LidarProtocol {
    validate_crc: bool,
    stats: ProtocolStats,
}

impl LidarProtocol {
    /// Create a parser. `validate_crc` is fixed for the parser's lifetime.
    pub fn new(validate_crc: bool) -> Self {
        Self {
            validate_crc,
            stats: ProtocolStats::default(),
        }
    }

    /// True if checksums are verified.
    pub fn validate_crc(&self) -> bool {
        self.validate_crc
    }

    /// Get the protocol counters.
    pub fn stats(&self) -> &ProtocolStats {
        &self.stats
    }

    /// Zero the protocol counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Parse one datagram.
    ///
    /// Every call increments `total_packets` once. On success
    /// `valid_packets` increments; on rejection exactly one error counter
    /// increments and no partially decoded data is returned.
    pub fn parse(&mut self, data: &[u8]) -> Result<ParsedPacket, InvalidReason> {
        self.stats.total_packets += 1;

        match decode(data, self.validate_crc) {
            Ok(packet) => {
                self.stats.valid_packets += 1;
                trace!(
                    seq = packet.sequence,
                    ts = packet.timestamp_ns,
                    points = packet.point_count,
                    "valid packet"
                );
                Ok(packet)
            }
            Err(reason) => {
                self.stats.record(&reason);
                trace!(len = data.len(), "rejected packet: {}", reason);
                Err(reason)
            }
        }
    }
}

impl Default for LidarProtocol {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Validate and decode a datagram without touching any counters.
pub fn decode(data: &[u8], validate_crc: bool) -> Result<ParsedPacket, InvalidReason> {
    let header = PacketHeader::decode(data).ok_or(InvalidReason::TooShort(data.len()))?;

    if header.magic != MAGIC {
        return Err(InvalidReason::BadMagic(header.magic));
    }

    if header.version != VERSION {
        return Err(InvalidReason::BadVersion(header.version));
    }

    let n_points = header.point_count as usize;
    if !(1..=MAX_POINTS_PER_PACKET).contains(&n_points) {
        return Err(InvalidReason::InvalidPointCount(header.point_count));
    }

    let expected = header.packet_len();
    if data.len() != expected {
        return Err(InvalidReason::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }

    let payload = &data[HEADER_SIZE..];

    if validate_crc && header.crc32 != 0 {
        let computed = crc32(&data[..CRC_OFFSET], payload);
        if computed != header.crc32 {
            return Err(InvalidReason::CrcMismatch {
                expected: header.crc32,
                computed,
            });
        }
    }

    let mut points = Vec::with_capacity(n_points);
    let mut xyz = Vec::with_capacity(n_points);
    for record in payload.chunks_exact(POINT_SIZE) {
        let pt = Point {
            x: f32::from_le_bytes([record[0], record[1], record[2], record[3]]),
            y: f32::from_le_bytes([record[4], record[5], record[6], record[7]]),
            z: f32::from_le_bytes([record[8], record[9], record[10], record[11]]),
            intensity: record[12],
        };
        xyz.push(pt.xyz());
        points.push(pt);
    }

    Ok(ParsedPacket {
        timestamp_ns: header.timestamp_ns,
        sequence: header.sequence,
        point_count: header.point_count,
        sensor_id: header.sensor_id,
        flags: header.flags,
        crc32: header.crc32,
        points,
        xyz,
    })
}
