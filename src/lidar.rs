// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR types and error handling.
//!
//! These types are shared by the protocol parser, the packet encoder and the
//! frame builder. Per-packet conditions (malformed datagrams, late packets,
//! overflow) are not errors and never appear in [`Error`]; they are reported
//! through return values and statistics counters instead.

use std::fmt;

/// Coordinate-only point, `[x, y, z]` in meters.
///
/// This is the layout handed to the frame builder and to downstream
/// registration consumers which ignore intensity.
pub type Xyz = [f32; 3];

/// Single decoded point record.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Z coordinate in meters
    pub z: f32,
    /// Reflectivity (0-255)
    pub intensity: u8,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f32, y: f32, z: f32, intensity: u8) -> Self {
        Self { x, y, z, intensity }
    }

    /// Coordinates without intensity.
    #[inline]
    pub fn xyz(&self) -> Xyz {
        [self.x, self.y, self.z]
    }
}

/// Common error type for setup and I/O operations.
///
/// Construction-time misconfiguration is rejected here so that the per-packet
/// hot path never has to fail.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Configuration error
    Config(String),
    /// Point count outside the range one packet can carry
    InvalidPointCount(usize),
    /// JSON serialization error
    Json(serde_json::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::InvalidPointCount(count) => write!(f, "invalid point count: {}", count),
            Error::Json(err) => write!(f, "json error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
