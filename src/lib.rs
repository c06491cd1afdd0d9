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

//! Reading, writing & sending RFC [5424] [`syslog`] messages over UDP
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//! [`syslog`]: https://en.wikipedia.org/wiki/Syslog
//!
//! # Introduction
//!
//! RFC 5424 defines a syslog message as a small, strictly-specified header (priority, version,
//! timestamp, host, application, process & message IDs), optional "structured data" (bracketed
//! sets of key/value pairs) and a free-form message body. RFC [5426] sends each such message as
//! a single UDP datagram, no framing required.
//!
//! [5426]: https://datatracker.ietf.org/doc/html/rfc5426
//!
//! This crate provides both ends of that exchange:
//!
//! - [`reader::from_payload`] parses a datagram into a [`SyslogMessage`](message::SyslogMessage)
//!   by way of a hand-coded recursive descent [grammar engine](lexer), rejecting anything that
//!   doesn't match the RFC's ABNF & reporting where it went wrong
//!
//! - [`rfc5424::to_payload`] renders a message, coercing non-compliant fields rather than failing
//!
//! - [`sender::BufferedSender`] queues payloads & delivers them over a [`Transport`] on a
//!   background thread, so that logging never blocks (or fails) the caller
//!
//! - [`client::SyslogClient`] wraps all that up behind `send_text()`, `send_warning()` &
//!   `send_error()`
//!
//! [`Transport`]: transport::Transport
//!
//! # Usage
//!
//! Parsing:
//!
//! ```rust
//! use syslog_udp::{facility::Severity, message::SyslogMessage};
//! let msg: SyslogMessage = "<27>1 - web1 svc 42 - - disk full".parse().unwrap();
//! assert_eq!(msg.severity, Severity::LOG_ERR);
//! assert_eq!(msg.hostname.as_deref(), Some("web1"));
//! assert_eq!(msg.msg.as_deref(), Some("disk full"));
//! ```
//!
//! Sending:
//!
//! ```rust
//! use syslog_udp::client::{ClientConfig, SyslogClient};
//! // `$loopback`, `$broadcast` & `$subnet` are understood, too
//! let client = SyslogClient::udp("localhost", 514, ClientConfig::default()).unwrap();
//! client.open();
//! client.send_warning("Hello, world!");
//! client.close();
//! ```
//!
//! [`tracing`] users can route events to syslog through [`adapter::Layer`]:
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//!
//! ```no_run
//! use syslog_udp::{adapter::Layer, client::{ClientConfig, SyslogClient}};
//! use tracing::info;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let client = SyslogClient::udp("some.other.host", 5514, ClientConfig::default()).unwrap();
//! let subscriber = tracing_subscriber::registry().with(Layer::new(client));
//! tracing::subscriber::set_global_default(subscriber).unwrap();
//!
//! info!("Hello, world!");
//! ```

pub mod adapter;
pub mod client;
pub mod error;
pub mod facility;
pub mod grammar;
pub mod lexer;
pub mod message;
pub mod net;
pub mod reader;
pub mod rfc5424;
pub mod sender;
pub mod transport;

pub use error::{Error, GrammarError, Result, TransportError};
pub use message::SyslogMessage;
