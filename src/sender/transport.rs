//! transport.rs
//! Broadcast transports driven by the scheduler.
//!
//! A transport exposes the two calls the broadcast medium needs each tick: publish the
//! payload, then enable broadcasting. Both must return within a bounded time; a call
//! that runs out of time reports `TransportError::Timeout`.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use log::{debug, info};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::codec::{advertisement::AdvertisementLayout, to_hex};
use crate::utils::error::TransportError;

pub trait Transport: Send + Sync {
    /// Replace the payload carried by subsequent broadcasts.
    fn publish_payload(&self, payload: &[u8]) -> Result<(), TransportError>;

    fn set_broadcast_enabled(&self, enabled: bool) -> Result<(), TransportError>;
}

/// Emits advertisements as UDP broadcast datagrams.
///
/// `publish_payload` only stores the wrapped advertisement. Each
/// `set_broadcast_enabled(true)` sends the stored advertisement once, so the scheduler's
/// publish/enable pair produces one datagram per tick.
pub struct UdpBroadcastTransport {
    socket: Socket,
    target: SockAddr,
    layout: AdvertisementLayout,
    current: Mutex<Vec<u8>>,
    enabled: AtomicBool,
}

impl UdpBroadcastTransport {
    /// Open a broadcast-capable socket. `timeout` bounds every send.
    pub fn open(
        target: SocketAddr,
        layout: AdvertisementLayout,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let unavailable = |what: &str, e: std::io::Error| {
            TransportError::Unavailable(format!("{} failed: {}", what, e))
        };

        let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| unavailable("socket", e))?;
        socket
            .set_broadcast(true)
            .map_err(|e| unavailable("SO_BROADCAST", e))?;
        socket
            .set_write_timeout(Some(timeout))
            .map_err(|e| unavailable("write timeout", e))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        socket
            .bind(&local.into())
            .map_err(|e| unavailable("bind", e))?;

        info!("[Transport] UDP broadcast to {} (timeout {:?})", target, timeout);
        Ok(Self {
            socket,
            target: target.into(),
            layout,
            current: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(false),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Transport for UdpBroadcastTransport {
    fn publish_payload(&self, payload: &[u8]) -> Result<(), TransportError> {
        let adv = self
            .layout
            .build(payload)
            .ok_or(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: self.layout.max_payload(),
            })?;
        *self.current.lock() = adv;
        Ok(())
    }

    fn set_broadcast_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            return Ok(());
        }

        let adv = self.current.lock().clone();
        if adv.is_empty() {
            return Ok(());
        }
        self.socket.send_to(&adv, &self.target)?;
        Ok(())
    }
}

/// Dry-run transport: logs every payload and never fails.
#[derive(Default)]
pub struct LogTransport {
    published: AtomicU64,
    enabled: AtomicBool,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Transport for LogTransport {
    fn publish_payload(&self, payload: &[u8]) -> Result<(), TransportError> {
        let n = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("[LogTransport] #{} payload={}", n, to_hex(payload));
        Ok(())
    }

    fn set_broadcast_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        if self.enabled.swap(enabled, Ordering::Relaxed) != enabled {
            info!("[LogTransport] broadcasting {}", if enabled { "enabled" } else { "disabled" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    #[test]
    fn log_transport_counts_publishes() {
        let t = LogTransport::new();
        t.publish_payload(&[1, 2]).unwrap();
        t.set_broadcast_enabled(true).unwrap();
        t.publish_payload(&[3]).unwrap();
        assert_eq!(t.published(), 2);
    }

    #[test]
    fn udp_transport_sends_wrapped_payload_on_enable() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let target = rx.local_addr().unwrap();

        let layout = AdvertisementLayout::new("kikicker", 0x1337);
        let tx = UdpBroadcastTransport::open(target, layout.clone(), Duration::from_millis(50)).unwrap();
        tx.publish_payload(&[0x60, 0xBD]).unwrap();
        tx.set_broadcast_enabled(true).unwrap();
        assert!(tx.is_enabled());

        let mut buf = [0u8; 64];
        let n = rx.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], layout.build(&[0x60, 0xBD]).unwrap().as_slice());
    }

    #[test]
    fn udp_transport_rejects_oversized_payload() {
        let layout = AdvertisementLayout::new("kikicker", 0x1337);
        let tx = UdpBroadcastTransport::open(
            "127.0.0.1:9".parse().unwrap(),
            layout,
            Duration::from_millis(50),
        )
        .unwrap();
        let err = tx.publish_payload(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, TransportError::PayloadTooLarge { size: 20, max: 14 }));
        assert!(!err.is_timeout());
    }
}
