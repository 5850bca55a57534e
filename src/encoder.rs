// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! LIVR packet encoder.
//!
//! Sender side of the wire format in [`crate::protocol`]. Large point clouds
//! are segmented into packets of at most [`MAX_POINTS_PER_PACKET`] points,
//! each stamped with the same device timestamp and a consecutive sequence
//! number. Used by the synthetic sender, the benchmarks and the tests.

use crate::{
    lidar::{Error, Point},
    protocol::{
        CRC_OFFSET, HEADER_SIZE, MAGIC, MAX_POINTS_PER_PACKET, POINT_SIZE, PacketHeader, VERSION,
        crc32,
    },
};
use serde::Serialize;
use std::fmt;

/// Transmit counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EncoderStats {
    pub packets: u64,
    pub points: u64,
    pub bytes: u64,
    /// Packets produced by splitting a cloud larger than one packet
    pub segmented_packets: u64,
    /// Times the sequence counter wrapped from `u32::MAX` to 0
    pub sequence_wraps: u64,
}

impl fmt::Display for EncoderStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "EncoderStats(pkts={}, pts={}, bytes={}, segmented={}, wraps={})",
            self.packets, self.points, self.bytes, self.segmented_packets, self.sequence_wraps
        )
    }
}

/// Stateful packet encoder owning the outgoing sequence counter.
#[derive(Debug)]
pub struct PacketEncoder {
    sensor_id: u16,
    flags: u16,
    crc_enabled: bool,
    next_seq: u32,
    stats: EncoderStats,
}

impl PacketEncoder {
    /// Create an encoder starting at sequence 0.
    ///
    /// With `crc_enabled` false the crc32 field is written as 0, which
    /// receivers treat as "checksum disabled".
    pub fn new(sensor_id: u16, crc_enabled: bool) -> Self {
        Self {
            sensor_id,
            flags: 0,
            crc_enabled,
            next_seq: 0,
            stats: EncoderStats::default(),
        }
    }

    /// Start the sequence counter at `seq` instead of 0.
    pub fn with_sequence(mut self, seq: u32) -> Self {
        self.next_seq = seq;
        self
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_seq
    }

    /// Get the transmit counters.
    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Encode one packet carrying all of `points`.
    ///
    /// Fails with [`Error::InvalidPointCount`] for 0 or more than
    /// [`MAX_POINTS_PER_PACKET`] points; the sequence counter only advances
    /// on success.
    pub fn encode(&mut self, timestamp_ns: u64, points: &[Point]) -> Result<Vec<u8>, Error> {
        if points.is_empty() || points.len() > MAX_POINTS_PER_PACKET {
            return Err(Error::InvalidPointCount(points.len()));
        }

        let seq = self.advance_sequence();
        let mut data = vec![0u8; HEADER_SIZE + points.len() * POINT_SIZE];

        let header = PacketHeader {
            magic: MAGIC,
            version: VERSION,
            timestamp_ns,
            sequence: seq,
            point_count: points.len() as u16,
            flags: self.flags,
            sensor_id: self.sensor_id,
            crc32: 0,
        };
        header.encode_into(&mut data);

        for (pt, record) in points
            .iter()
            .zip(data[HEADER_SIZE..].chunks_exact_mut(POINT_SIZE))
        {
            record[0..4].copy_from_slice(&pt.x.to_le_bytes());
            record[4..8].copy_from_slice(&pt.y.to_le_bytes());
            record[8..12].copy_from_slice(&pt.z.to_le_bytes());
            record[12] = pt.intensity;
        }

        if self.crc_enabled {
            let crc = crc32(&data[..CRC_OFFSET], &data[HEADER_SIZE..]);
            data[CRC_OFFSET..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
        }

        self.stats.packets += 1;
        self.stats.points += points.len() as u64;
        self.stats.bytes += data.len() as u64;

        Ok(data)
    }

    /// Encode an arbitrarily large point cloud as consecutive packets.
    ///
    /// Returns an empty vector for an empty cloud.
    pub fn encode_segmented(&mut self, timestamp_ns: u64, points: &[Point]) -> Vec<Vec<u8>> {
        let segmented = points.len() > MAX_POINTS_PER_PACKET;
        let mut packets = Vec::with_capacity(points.len().div_ceil(MAX_POINTS_PER_PACKET));

        for chunk in points.chunks(MAX_POINTS_PER_PACKET) {
            // chunks() never yields an empty or oversized slice
            if let Ok(packet) = self.encode(timestamp_ns, chunk) {
                if segmented {
                    self.stats.segmented_packets += 1;
                }
                packets.push(packet);
            }
        }

        packets
    }

    fn advance_sequence(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = seq.wrapping_add(1);
        if self.next_seq == 0 {
            self.stats.sequence_wraps += 1;
        }
        seq
    }
}
