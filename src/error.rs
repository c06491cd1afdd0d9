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

//! [syslog-udp](crate) errors
//!
//! Each layer of the crate fails in its own, closed set of ways: the grammar engine with a
//! [`GrammarError`], the datagram transport with a [`TransportError`]. Neither is ever raised
//! across the sending API: parse failures are returned to the reader's caller & transport failures
//! go to the sender's error callback. [`Error`] covers what can go wrong while setting up a
//! client: discovering or validating this host's identity & starting the delivery thread.

use backtrace::Backtrace;

/// Failures of the RFC 5424 grammar engine.
///
/// Both variants carry the 0-based byte offset of the cursor at the point of failure. Parsing is
/// all-or-nothing; there is no partial result to go along with either.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError {
    /// The input ran out in the middle of a production
    UnexpectedEnd { index: usize },
    /// The character at `index` is not in the set the current production expects
    UnexpectedToken { token: char, index: usize },
}

impl GrammarError {
    /// The cursor offset at which the grammar gave up.
    pub fn index(&self) -> usize {
        match self {
            GrammarError::UnexpectedEnd { index } => *index,
            GrammarError::UnexpectedToken { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GrammarError::UnexpectedEnd { index } => write!(f, "Unexpected end at index {}", index),
            GrammarError::UnexpectedToken { token, index } => {
                write!(f, "Unexpected token {:?} at index {}", token, index)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// Failures of the datagram transport.
pub enum TransportError {
    /// No remote host was configured
    RemoteHostEmpty { back: Backtrace },
    /// The remote port is outside 0-65535
    PortOutOfRange { port: i32, back: Backtrace },
    /// The remote host could not be resolved to an address
    AddressUnresolvable { host: String, back: Backtrace },
    /// A send was attempted before a successful open
    NotConnected { back: Backtrace },
    /// The underlying socket failed
    Io {
        source: std::io::Error,
        back: Backtrace,
    },
}

impl TransportError {
    pub(crate) fn remote_host_empty() -> TransportError {
        TransportError::RemoteHostEmpty {
            back: Backtrace::new(),
        }
    }
    pub(crate) fn port_out_of_range(port: i32) -> TransportError {
        TransportError::PortOutOfRange {
            port,
            back: Backtrace::new(),
        }
    }
    pub(crate) fn address_unresolvable(host: &str) -> TransportError {
        TransportError::AddressUnresolvable {
            host: host.to_string(),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn not_connected() -> TransportError {
        TransportError::NotConnected {
            back: Backtrace::new(),
        }
    }
}

impl std::convert::From<std::io::Error> for TransportError {
    fn from(source: std::io::Error) -> Self {
        TransportError::Io {
            source,
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::RemoteHostEmpty { .. } => write!(f, "The remote hostname is empty"),
            TransportError::PortOutOfRange { port, .. } => {
                write!(f, "Port {} is out of range", port)
            }
            TransportError::AddressUnresolvable { host, .. } => {
                write!(f, "Unable to resolve '{}'", host)
            }
            TransportError::NotConnected { .. } => {
                write!(f, "The transport is not connected to the remote host")
            }
            TransportError::Io { source, .. } => write!(f, "Socket error: {}", source),
        }
    }
}

impl std::fmt::Debug for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::RemoteHostEmpty { back }
            | TransportError::PortOutOfRange { back, .. }
            | TransportError::AddressUnresolvable { back, .. }
            | TransportError::NotConnected { back }
            | TransportError::Io { back, .. } => write!(f, "{}\n{:?}", self, back),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// [syslog-udp](crate) error type
///
/// Like the rest of this crate, this eschews libraries like [thiserror] & [anyhow] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis of what the caller will
/// need to respond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
#[non_exhaustive]
pub enum Error {
    /// A HOSTNAME, APP-NAME or PROCID supplied for this host's identity is not RFC 5424-compliant
    BadIdentity {
        field: &'static str,
        name: Vec<u8>,
        back: Backtrace,
    },
    /// Failed to fetch the current executable (via std::env)
    NoExecutable {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// Failed to fetch hostname (via libc)
    NoHostname {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// Failed to spawn a sender's delivery thread
    NoWorker {
        source: std::io::Error,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadIdentity { field, .. } => write!(
                f,
                "The provided or discovered {} is not compliant with RFC 5424",
                field
            ),
            Error::NoExecutable { source, .. } => {
                write!(f, "Couldn't determine the current executable: {}", source)
            }
            Error::NoHostname { source, .. } => {
                write!(f, "Couldn't determine the hostname: {}", source)
            }
            Error::NoWorker { source, .. } => {
                write!(f, "Couldn't start the delivery thread: {}", source)
            }
            _ => write!(f, "Other syslog-udp error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadIdentity { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::NoExecutable { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::NoHostname { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::NoWorker { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "syslog-udp error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    #[allow(unreachable_patterns)]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NoWorker { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
