// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_lidarrx::{
    lidar::Error,
    packet_source::{PacketSource, UdpSource},
    pipeline::{Pipeline, PipelineSummary},
};
use std::{
    fs::File,
    io::BufWriter,
    time::{Duration, Instant},
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Large enough for any UDP payload, so oversized datagrams are seen whole
/// and rejected by length instead of being silently truncated.
const RECV_BUFFER_SIZE: usize = 65_536;

/// Back-to-back receive failures tolerated before the loop gives up
const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 100;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.rust_log.into())
                .from_env_lossy(),
        )
        .init();

    let stats_interval = Duration::try_from_secs_f64(args.stats_interval)
        .ok()
        .filter(|interval| !interval.is_zero())
        .ok_or_else(|| {
            Error::Config(format!(
                "stats interval must be a positive number of seconds, got {}",
                args.stats_interval
            ))
        })?;

    let mut pipeline = Pipeline::new(!args.no_crc, args.frame_config())?;
    info!(
        "frame period {:.3}s, max {} points per frame, crc validation {}",
        pipeline.builder().period_ns() as f64 / 1e9,
        pipeline.builder().max_frame_points(),
        if args.no_crc { "off" } else { "on" }
    );

    let mut source = UdpSource::bind(args.listen.as_str()).await?;
    // Flush and summarise even when the socket fails
    let received = receive(&mut source, &mut pipeline, stats_interval).await;

    if let Some(frame) = pipeline.flush() {
        info!("final {}", frame);
    }

    let summary = pipeline.summary();
    info!("{}", summary.protocol);
    info!("{}", summary.frames);
    info!("avg points per frame: {:.0}", summary.avg_points_per_frame);

    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
        info!("summary written to {}", path.display());
    }

    received
}

/// Receive until Ctrl-C, logging statistics every `stats_interval`.
async fn receive(
    source: &mut impl PacketSource,
    pipeline: &mut Pipeline,
    stats_interval: Duration,
) -> Result<(), Error> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    let mut ticker = tokio::time::interval(stats_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut report = RateReport::new();
    let mut errors = RecvErrors::default();

    loop {
        tokio::select! {
            res = source.recv(&mut buf) => match res {
                Ok(len) => {
                    errors.clear();
                    if let Some(frame) = pipeline.process(&buf[..len]) {
                        debug!("{}", frame);
                    }
                }
                Err(err) => errors.record(err)?,
            },
            _ = ticker.tick() => report.log(pipeline),
            res = &mut shutdown => {
                res?;
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Streak of receive failures.
///
/// Only the first failure of a streak is logged. A streak reaching
/// [`MAX_CONSECUTIVE_RECV_ERRORS`] is returned as the loop's error.
#[derive(Debug, Default)]
struct RecvErrors {
    consecutive: u32,
}

impl RecvErrors {
    fn record(&mut self, err: Error) -> Result<(), Error> {
        self.consecutive += 1;
        if self.consecutive >= MAX_CONSECUTIVE_RECV_ERRORS {
            return Err(err);
        }
        if self.consecutive == 1 {
            warn!("receive error: {}", err);
        }
        Ok(())
    }

    fn clear(&mut self) {
        if self.consecutive > 1 {
            info!("receive recovered after {} errors", self.consecutive);
        }
        self.consecutive = 0;
    }
}

/// Tracks packet counts between reports to derive a receive rate.
struct RateReport {
    last_time: Instant,
    last_total: u64,
}

impl RateReport {
    fn new() -> Self {
        Self {
            last_time: Instant::now(),
            last_total: 0,
        }
    }

    fn log(&mut self, pipeline: &Pipeline) {
        let now = Instant::now();
        let protocol = pipeline.protocol_stats();
        let frames = pipeline.frame_stats();

        let elapsed = now.duration_since(self.last_time).as_secs_f64();
        let rate = (protocol.total_packets - self.last_total) as f64 / elapsed.max(1e-9);
        self.last_time = now;
        self.last_total = protocol.total_packets;

        info!(
            "{:.0} pkt/s | valid {} crc {} magic {} ver {} len {} count {} | frames {} avg_pts {:.0} | late {} gaps {} reorder {} overflow {}",
            rate,
            protocol.valid_packets,
            protocol.crc_failures,
            protocol.bad_magic,
            protocol.bad_version,
            protocol.len_mismatch,
            protocol.invalid_count,
            frames.frames_built,
            frames.avg_points_per_frame(),
            frames.late_packets,
            frames.seq_gaps,
            frames.seq_reorders,
            frames.overflow_frames
        );
    }
}

fn write_summary(path: &std::path::Path, summary: &PipelineSummary) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}
