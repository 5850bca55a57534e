// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Property tests for the LIVR wire format and the frame builder.

use edgefirst_lidarrx::{
    encoder::PacketEncoder,
    frame::{FrameBuilder, FrameBuilderConfig},
    lidar::{Point, Xyz},
    protocol::{
        CRC_OFFSET, HEADER_SIZE, InvalidReason, LidarProtocol, MAX_POINTS_PER_PACKET, POINT_SIZE,
        decode,
    },
};
use proptest::prelude::*;

fn arb_point() -> impl Strategy<Value = Point> {
    // Finite coordinates only: NaN never compares equal
    (-500.0f32..500.0, -500.0f32..500.0, -50.0f32..50.0, any::<u8>())
        .prop_map(|(x, y, z, intensity)| Point::new(x, y, z, intensity))
}

fn arb_points() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(arb_point(), 1..=MAX_POINTS_PER_PACKET)
}

proptest! {
    #[test]
    fn prop_encode_decode_round_trip(
        points in arb_points(),
        ts in any::<u64>(),
        seq in any::<u32>(),
        sensor_id in any::<u16>(),
        crc in any::<bool>(),
    ) {
        let mut encoder = PacketEncoder::new(sensor_id, crc).with_sequence(seq);
        let data = encoder.encode(ts, &points).unwrap();

        let mut parser = LidarProtocol::new(true);
        let packet = parser.parse(&data).unwrap();

        prop_assert_eq!(packet.timestamp_ns, ts);
        prop_assert_eq!(packet.sequence, seq);
        prop_assert_eq!(packet.sensor_id, sensor_id);
        prop_assert_eq!(packet.point_count as usize, points.len());
        prop_assert_eq!(&packet.points, &points);
        prop_assert_eq!(parser.stats().valid_packets, 1);
    }

    #[test]
    fn prop_single_byte_corruption_detected(
        points in arb_points(),
        offset in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut data = PacketEncoder::new(0, true).encode(0, &points).unwrap();

        // Bytes only the checksum guards: timestamp, sequence, flags,
        // sensor_id and the payload. Magic, version and point_count have
        // their own checks.
        let mut offsets: Vec<usize> = (5..17).chain(19..CRC_OFFSET).collect();
        offsets.extend(HEADER_SIZE..data.len());
        let at = offsets[offset.index(offsets.len())];
        data[at] ^= flip;

        let mut parser = LidarProtocol::new(true);
        let result = parser.parse(&data);
        prop_assert!(matches!(result, Err(InvalidReason::CrcMismatch { .. })), "expected CrcMismatch, got {:?}", result);
        prop_assert_eq!(parser.stats().crc_failures, 1);
        prop_assert_eq!(parser.stats().valid_packets, 0);
        prop_assert_eq!(parser.stats().rejected(), 1);

        // The same bytes pass when checksum validation is off
        let mut lenient = LidarProtocol::new(false);
        prop_assert!(lenient.parse(&data).is_ok());
        prop_assert_eq!(lenient.stats().valid_packets, 1);
        prop_assert_eq!(lenient.stats().crc_failures, 0);
    }

    #[test]
    fn prop_counters_partition_total(
        datagrams in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 0..50),
    ) {
        let mut parser = LidarProtocol::new(true);
        for data in &datagrams {
            let _ = parser.parse(data);
        }

        let s = parser.stats();
        prop_assert_eq!(s.total_packets, datagrams.len() as u64);
        prop_assert_eq!(
            s.valid_packets + s.crc_failures + s.bad_magic + s.bad_version
                + s.len_mismatch + s.invalid_count,
            s.total_packets
        );
    }

    #[test]
    fn prop_decode_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..300)) {
        prop_assert_eq!(decode(&data, true), decode(&data, true));
    }

    #[test]
    fn prop_length_must_match_point_count(points in arb_points(), extra in 1usize..16) {
        let mut data = PacketEncoder::new(0, false).encode(0, &points).unwrap();
        data.extend(std::iter::repeat_n(0u8, extra));

        let expected = HEADER_SIZE + points.len() * POINT_SIZE;
        prop_assert_eq!(
            decode(&data, true),
            Err(InvalidReason::LengthMismatch { expected, actual: expected + extra })
        );
    }

    #[test]
    fn prop_frames_conserve_points(
        packets in prop::collection::vec((0u64..50_000_000, 1usize..=MAX_POINTS_PER_PACKET), 1..200),
        max_points in MAX_POINTS_PER_PACKET..2_000,
    ) {
        let mut builder = FrameBuilder::new(FrameBuilderConfig {
            frame_period_s: 0.01,
            max_frame_points: max_points,
        }).unwrap();

        // Monotonic timestamps: nothing is late
        let mut ts = 0u64;
        let mut frames = Vec::new();
        let mut total = 0usize;
        for (seq, (step, n)) in packets.iter().enumerate() {
            ts += step / 100;
            let xyz: Vec<Xyz> = vec![[seq as f32, 0.0, 0.0]; *n];
            total += n;
            frames.extend(builder.add(ts, &xyz, seq as u32));
        }
        frames.extend(builder.flush());

        prop_assert_eq!(frames.iter().map(|f| f.point_count).sum::<usize>(), total);
        prop_assert_eq!(builder.stats().late_packets, 0);
        prop_assert_eq!(builder.stats().frames_built, frames.len() as u64);
        for frame in &frames {
            prop_assert!(frame.point_count > 0);
            prop_assert!(frame.point_count <= max_points);
            prop_assert_eq!(frame.point_count, frame.xyz.len());
            prop_assert!(frame.end_ts_ns - frame.start_ts_ns < 10_000_000);
        }
    }
}
