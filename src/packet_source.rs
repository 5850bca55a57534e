// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Datagram sources feeding the ingestion pipeline.
//!
//! The receive loop only sees the [`PacketSource`] trait, so the same loop
//! runs against a live UDP socket or a scripted list of datagrams.
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarrx::{
//!     encoder::PacketEncoder,
//!     lidar::Point,
//!     packet_source::{PacketSource, TestSource},
//!     protocol::MAX_PACKET_SIZE,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut encoder = PacketEncoder::new(0, true);
//! let cloud = vec![Point::new(1.0, 2.0, 3.0, 40); 300];
//! let mut source = TestSource::new(encoder.encode_segmented(0, &cloud));
//!
//! let mut buf = [0u8; MAX_PACKET_SIZE];
//! let mut received = 0;
//! while source.has_more() {
//!     source.recv(&mut buf).await.unwrap();
//!     received += 1;
//! }
//! assert_eq!(received, 3);
//! # });
//! ```

use crate::lidar::Error;
use std::{collections::VecDeque, future::Future, net::SocketAddr, pin::Pin};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::info;

/// Source of raw datagrams.
pub trait PacketSource: Send {
    /// Receive the next datagram into `buf`, returning its length.
    ///
    /// Datagrams longer than `buf` are truncated to `buf.len()`.
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

    /// False once a finite source is exhausted. Live sockets never are.
    fn has_more(&self) -> bool;
}

/// Live UDP socket.
pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    /// Wrap an already bound socket.
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Bind a socket on `addr`, e.g. `0.0.0.0:9999`.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        info!("listening for LIVR packets on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    /// Address the socket is bound to; useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move { Ok(self.socket.recv(buf).await?) })
    }

    fn has_more(&self) -> bool {
        true
    }
}

/// Scripted datagrams delivered in order, for tests and offline replay.
#[derive(Debug, Default)]
pub struct TestSource {
    packets: VecDeque<Vec<u8>>,
    delivered: usize,
}

impl TestSource {
    /// Create a source delivering `packets` in order.
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self {
            packets: packets.into(),
            delivered: 0,
        }
    }

    /// Create a source with nothing queued.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queue another datagram behind the pending ones.
    pub fn push(&mut self, packet: Vec<u8>) {
        self.packets.push_back(packet);
    }

    /// Datagrams not yet delivered.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// True once every queued datagram has been delivered.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Datagrams delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let packet = self.packets.pop_front().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "test source exhausted",
                ))
            })?;

            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.delivered += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        !self.packets.is_empty()
    }
}
