// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of syslog-udp.
//
// syslog-udp is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// syslog-udp is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with syslog-udp.  If not,
// see <http://www.gnu.org/licenses/>.

//! The syslog transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the UDP implementation.
//!
//! # Examples
//!
//! To send syslog messages over UDP to a daemon listening on port 514 (the default) on localhost:
//!
//! ```rust
//! use syslog_udp::transport::{Transport, UdpTransport};
//! let mut transpo = UdpTransport::with_host("$loopback");
//! transpo.open().unwrap();
//! ```
//!
//! Configuration problems surface on [`open`](Transport::open), not at construction:
//!
//! ```rust
//! use syslog_udp::transport::{Transport, UdpTransport};
//! let mut transpo = UdpTransport::new("some-host.domain.io", 70000);
//! assert!(transpo.open().is_err()); // no such port, after all
//! ```

use crate::{error::TransportError, net};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

type StdResult<T, E> = std::result::Result<T, E>;

/// The well-known syslog port (RFC [5426])
///
/// [5426]: https://datatracker.ietf.org/doc/html/rfc5426
pub const SYSLOG_UDP_PORT: i32 = 514;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
///
/// A transport is driven by a single owner (the [`BufferedSender`](crate::sender::BufferedSender)
/// worker, typically), hence the `&mut self` receivers.
pub trait Transport {
    /// Connect to the remote end; a no-op if already connected.
    fn open(&mut self) -> StdResult<(), TransportError>;
    /// Send one payload. An empty payload is silently ignored.
    fn send(&mut self, buf: &[u8]) -> StdResult<usize, TransportError>;
    /// Release the connection; a no-op if not connected.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> StdResult<(), TransportError> {
        (**self).open()
    }
    fn send(&mut self, buf: &[u8]) -> StdResult<usize, TransportError> {
        (**self).send(buf)
    }
    fn close(&mut self) {
        (**self).close()
    }
}

/// Sending syslog messages via UDP datagrams.
///
/// The remote host may be a literal address, a DNS name, or one of the sentinels understood by
/// [`net::resolve`].
#[derive(Debug)]
pub struct UdpTransport {
    remote_host: String,
    remote_port: i32,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP to `host`:`port`; nothing is validated
    /// until [`open`](Transport::open).
    pub fn new(host: impl Into<String>, port: i32) -> UdpTransport {
        UdpTransport {
            remote_host: host.into(),
            remote_port: port,
            socket: None,
        }
    }
    /// Construct a [`Transport`] implementation via UDP to `host`:514
    pub fn with_host(host: impl Into<String>) -> UdpTransport {
        UdpTransport::new(host, SYSLOG_UDP_PORT)
    }
    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }
    pub fn remote_port(&self) -> i32 {
        self.remote_port
    }
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> StdResult<(), TransportError> {
        if self.socket.is_some() {
            return Ok(());
        }
        if self.remote_host.trim().is_empty() {
            return Err(TransportError::remote_host_empty());
        }
        let port = u16::try_from(self.remote_port)
            .map_err(|_| TransportError::port_out_of_range(self.remote_port))?;
        let addr = net::resolve(&self.remote_host)
            .ok_or_else(|| TransportError::address_unresolvable(&self.remote_host))?;
        // Bind to any available port on the matching address family...
        let socket = match addr {
            IpAddr::V4(_) => {
                let socket = UdpSocket::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0))?;
                // Required for either of the broadcast sentinels.
                socket.set_broadcast(true)?;
                socket
            }
            IpAddr::V6(_) => UdpSocket::bind(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0))?,
        };
        // and connect to the syslog daemon:
        socket.connect(SocketAddr::new(addr, port))?;
        self.socket = Some(socket);
        Ok(())
    }
    fn send(&mut self, buf: &[u8]) -> StdResult<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        match &self.socket {
            Some(socket) => Ok(socket.send(buf)?),
            None => Err(TransportError::not_connected()),
        }
    }
    fn close(&mut self) {
        self.socket = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::time::Duration;

    #[test]
    fn bad_configuration() {
        let mut t = UdpTransport::new("", 514);
        assert!(matches!(
            t.open(),
            Err(TransportError::RemoteHostEmpty { .. })
        ));
        let mut t = UdpTransport::new("  ", 514);
        assert!(matches!(
            t.open(),
            Err(TransportError::RemoteHostEmpty { .. })
        ));
        let mut t = UdpTransport::new("$loopback", 65536);
        assert!(matches!(
            t.open(),
            Err(TransportError::PortOutOfRange { port: 65536, .. })
        ));
        let mut t = UdpTransport::new("$loopback", -1);
        assert!(matches!(
            t.open(),
            Err(TransportError::PortOutOfRange { port: -1, .. })
        ));
        assert!(!t.is_connected());
    }

    #[test]
    fn not_connected() {
        let mut t = UdpTransport::with_host("$loopback");
        assert_eq!(t.remote_port(), 514);
        assert!(matches!(
            t.send(b"hello"),
            Err(TransportError::NotConnected { .. })
        ));
        // empty payloads are never an error
        assert_eq!(t.send(b"").unwrap(), 0);
        // nor is closing an unopened transport
        t.close();
        t.close();
    }

    #[test]
    fn loopback() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = server.local_addr().unwrap().port() as i32;

        let mut t = UdpTransport::new("$loopback", port);
        t.open().unwrap();
        t.open().unwrap(); // idempotent
        assert!(t.is_connected());
        assert_eq!(t.send(b"<14>1 - - - - - - hi").unwrap(), 20);

        let mut buf = [0u8; 64];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"<14>1 - - - - - - hi");

        t.close();
        assert!(!t.is_connected());
        assert!(matches!(
            t.send(b"again"),
            Err(TransportError::NotConnected { .. })
        ));
    }
}
