//! scanner.rs
//! Passive listener for telemetry advertisements.
//!
//! Datagrams are parsed as advertisements. Anything not named like the telemetry device
//! is ignored outright; for the rest a `ScanEntry` records whether the manufacturer
//! structure carries our source identifier. Only matching entries go on to the decoder.

use std::{
    net::SocketAddr,
    time::Instant,
};

use log::trace;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::codec::{advertisement::parse_advertisement, frame::DecodedFrame, to_hex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub timestamp: Instant,
    pub source_match: bool,
    /// Manufacturer data for our source id; empty when `source_match` is false.
    pub payload: Vec<u8>,
}

/// Which advertisements belong to the telemetry sender.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    device_name: String,
    source_id: u16,
}

impl SourceFilter {
    pub fn new(device_name: &str, source_id: u16) -> Self {
        Self {
            device_name: device_name.to_lowercase(),
            source_id,
        }
    }

    pub fn source_id(&self) -> u16 {
        self.source_id
    }

    /// `None` when the advertisement is not from a telemetry device at all.
    pub fn classify(&self, timestamp: Instant, datagram: &[u8]) -> Option<ScanEntry> {
        let parsed = parse_advertisement(datagram);
        let name = parsed.local_name.as_deref().unwrap_or_default().to_lowercase();
        if !name.contains(&self.device_name) {
            return None;
        }

        let data = parsed.manufacturer_data(self.source_id);
        Some(ScanEntry {
            timestamp,
            source_match: data.is_some(),
            payload: data.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    Raw,
    #[default]
    Decoded,
}

impl DisplayMode {
    pub fn render(&self, source_id: u16, payload: &[u8], decoded: &DecodedFrame) -> String {
        match self {
            DisplayMode::Raw => format!("{:04x}:{}", source_id, to_hex(payload)),
            DisplayMode::Decoded => decoded.to_string(),
        }
    }
}

/// Async UDP listener yielding `ScanEntry`s.
pub struct UdpScanner {
    socket: UdpSocket,
    filter: SourceFilter,
    buf: Vec<u8>,
}

impl UdpScanner {
    /// Bind with address reuse so several listeners can share a port on one host.
    pub fn bind(addr: SocketAddr, filter: SourceFilter) -> std::io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        let std_socket: std::net::UdpSocket = socket.into();

        Ok(Self {
            socket: UdpSocket::from_std(std_socket)?,
            filter,
            buf: vec![0u8; 256],
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next telemetry-device datagram.
    pub async fn next_entry(&mut self) -> std::io::Result<ScanEntry> {
        loop {
            let (n, peer) = self.socket.recv_from(&mut self.buf).await?;
            let now = Instant::now();
            match self.filter.classify(now, &self.buf[..n]) {
                Some(entry) => return Ok(entry),
                None => trace!("[Scanner] ignored {} bytes from {}", n, peer),
            }
        }
    }
}
