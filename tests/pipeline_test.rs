// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end tests: encoded LIVR datagrams through a packet source, the
//! parser and the frame builder.

use edgefirst_lidarrx::{
    encoder::PacketEncoder,
    frame::{Frame, FrameBuilderConfig},
    lidar::Point,
    packet_source::{PacketSource, TestSource, UdpSource},
    pipeline::Pipeline,
    protocol::{HEADER_SIZE, MAX_PACKET_SIZE},
};
use tokio::net::UdpSocket;

const MS: u64 = 1_000_000;

fn scan(n: usize, tag: f32) -> Vec<Point> {
    (0..n)
        .map(|i| Point::new(tag, i as f32 * 0.01, 0.0, (i % 256) as u8))
        .collect()
}

fn config(period_s: f64, max_points: usize) -> FrameBuilderConfig {
    FrameBuilderConfig {
        frame_period_s: period_s,
        max_frame_points: max_points,
    }
}

/// Drain a finite source through the pipeline, flushing at the end.
async fn run(source: &mut impl PacketSource, pipeline: &mut Pipeline) -> Vec<Frame> {
    let mut buf = [0u8; 2048];
    let mut frames = Vec::new();

    while source.has_more() {
        let len = source.recv(&mut buf).await.expect("Failed to read packet");
        frames.extend(pipeline.process(&buf[..len]));
    }
    frames.extend(pipeline.flush());

    frames
}

#[tokio::test]
async fn test_scan_stream_to_frames() {
    let mut encoder = PacketEncoder::new(7, true);
    let mut source = TestSource::empty();

    // 10 scans, 25 ms apart, 1000 points each
    for i in 0..10u64 {
        for packet in encoder.encode_segmented(i * 25 * MS, &scan(1000, i as f32)) {
            source.push(packet);
        }
    }

    let mut pipeline = Pipeline::new(true, config(0.1, 120_000)).unwrap();
    let frames = run(&mut source, &mut pipeline).await;

    // Windows open at 0, 100 and 200 ms
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].point_count, 4000);
    assert_eq!(frames[1].point_count, 4000);
    assert_eq!(frames[2].point_count, 2000);
    assert_eq!(frames[1].start_ts_ns, 100 * MS);
    assert_eq!(frames[1].end_ts_ns, 175 * MS);

    // Every point arrives exactly once, in order
    let total: usize = frames.iter().map(|f| f.xyz.len()).sum();
    assert_eq!(total, 10_000);
    assert_eq!(frames[0].xyz[0], [0.0, 0.0, 0.0]);
    assert_eq!(frames[0].xyz[1000][0], 1.0);

    // Sequence ranges are contiguous across frames
    for pair in frames.windows(2) {
        assert_eq!(pair[0].seq_last.wrapping_add(1), pair[1].seq_first);
    }

    let summary = pipeline.summary();
    assert_eq!(summary.protocol.valid_packets, summary.protocol.total_packets);
    assert_eq!(summary.frames.seq_gaps, 0);
    assert_eq!(summary.frames.late_packets, 0);
    assert_eq!(summary.frames.frames_built, 3);
}

#[tokio::test]
async fn test_hostile_stream() {
    let mut encoder = PacketEncoder::new(0, true);
    let mut source = TestSource::empty();

    source.push(encoder.encode(0, &scan(10, 0.0)).unwrap());

    // Corrupted payload
    let mut corrupt = encoder.encode(MS, &scan(10, 0.0)).unwrap();
    corrupt[HEADER_SIZE] ^= 0x01;
    source.push(corrupt);

    // Truncated and garbage datagrams
    let truncated = encoder.encode(2 * MS, &scan(10, 0.0)).unwrap();
    source.push(truncated[..truncated.len() - 1].to_vec());
    source.push(b"not a lidar packet at all, definitely not".to_vec());
    source.push(Vec::new());

    source.push(encoder.encode(3 * MS, &scan(10, 0.0)).unwrap());

    let mut pipeline = Pipeline::new(true, config(0.1, 120_000)).unwrap();
    let frames = run(&mut source, &mut pipeline).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].packet_count, 2);
    assert_eq!(frames[0].point_count, 20);

    let stats = pipeline.protocol_stats();
    assert_eq!(stats.total_packets, 6);
    assert_eq!(stats.valid_packets, 2);
    assert_eq!(stats.crc_failures, 1);
    assert_eq!(stats.bad_magic, 1);
    assert_eq!(stats.len_mismatch, 2);

    // Rejected packets consumed sequence numbers 1 and 2
    assert_eq!(pipeline.frame_stats().seq_gaps, 1);
}

#[tokio::test]
async fn test_crc_disabled_accepts_corruption() {
    let mut encoder = PacketEncoder::new(0, true);
    let mut corrupt = encoder.encode(0, &scan(4, 0.0)).unwrap();
    corrupt[HEADER_SIZE] ^= 0x01;

    let mut source = TestSource::new(vec![corrupt]);
    let mut pipeline = Pipeline::new(false, config(0.1, 120_000)).unwrap();
    let frames = run(&mut source, &mut pipeline).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(pipeline.protocol_stats().crc_failures, 0);
}

#[tokio::test]
async fn test_late_and_overflow() {
    let mut encoder = PacketEncoder::new(0, false);
    let mut source = TestSource::empty();

    source.push(encoder.encode(0, &scan(100, 0.0)).unwrap());
    source.push(encoder.encode(10 * MS, &scan(100, 1.0)).unwrap());
    // Exceeds the 150-point ceiling
    source.push(encoder.encode(20 * MS, &scan(100, 2.0)).unwrap());
    // Older than the window opened by the overflow
    source.push(encoder.encode(15 * MS, &scan(100, 3.0)).unwrap());

    let mut pipeline = Pipeline::new(true, config(1.0, 150)).unwrap();
    let frames = run(&mut source, &mut pipeline).await;

    let counts: Vec<_> = frames.iter().map(|f| f.point_count).collect();
    assert_eq!(counts, vec![100, 100, 100]);
    assert_eq!(pipeline.frame_stats().overflow_frames, 2);
    assert_eq!(pipeline.frame_stats().late_packets, 1);
    assert_eq!(frames[2].start_ts_ns, 20 * MS);
}

#[tokio::test]
async fn test_udp_end_to_end() {
    let mut source = UdpSource::bind("127.0.0.1:0").await.unwrap();
    let addr = source.local_addr().unwrap();

    let mut encoder = PacketEncoder::new(2, true);
    let packets = encoder.encode_segmented(0, &scan(300, 0.0));
    let sent = packets.len();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for packet in &packets {
        sender.send_to(packet, addr).await.unwrap();
    }

    let mut pipeline = Pipeline::new(true, config(0.1, 120_000)).unwrap();
    let mut buf = [0u8; MAX_PACKET_SIZE];
    for _ in 0..sent {
        let len = tokio::time::timeout(std::time::Duration::from_secs(5), source.recv(&mut buf))
            .await
            .expect("Timed out waiting for datagram")
            .unwrap();
        assert!(pipeline.process(&buf[..len]).is_none());
    }

    let frame = pipeline.flush().unwrap();
    assert_eq!(frame.point_count, 300);
    assert_eq!(frame.packet_count, 3);
}
