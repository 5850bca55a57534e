// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_lidarrx::frame::FrameBuilderConfig;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// UDP address to receive LIVR packets on
    #[arg(long, env, default_value = "0.0.0.0:9999")]
    pub listen: String,

    /// Target frame rate in Hz.  Each frame covers 1/frame_rate seconds of
    /// device time.
    #[arg(long, env, default_value = "4")]
    pub frame_rate: f64,

    /// Point ceiling per frame.  A frame reaching it is closed early.
    #[arg(long, env, default_value = "120000")]
    pub max_frame_points: usize,

    /// Accept packets without verifying their CRC32
    #[arg(long, env)]
    pub no_crc: bool,

    /// Seconds between statistics reports
    #[arg(long, env, default_value = "1.0")]
    pub stats_interval: f64,

    /// Write a JSON summary of the session to this file at shutdown
    #[arg(long, env)]
    pub summary: Option<PathBuf>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl Args {
    /// Frame builder configuration from the frame rate and point ceiling.
    pub fn frame_config(&self) -> FrameBuilderConfig {
        FrameBuilderConfig::from_frame_rate(self.frame_rate, self.max_frame_points)
    }
}
