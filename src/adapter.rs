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

//! Routing trace output to syslog.
//!
//! [`TraceAdapter`] is the boundary between a tracing framework & a syslog sink: a line of text at
//! some severity in, nothing out. [`SyslogClient`] implements it, & [`Layer`] is a
//! [`tracing-subscriber`] layer that feeds any [`TraceAdapter`] with the "message" field of each
//! [`Event`].
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! # Examples
//!
//! ```rust
//! use syslog_udp::{adapter::Layer, client::{ClientConfig, SyslogClient}};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let client = SyslogClient::udp("$loopback", 514, ClientConfig::default()).unwrap();
//! let subscriber = tracing_subscriber::registry().with(Layer::new(client));
//! ```
//!
//! Since the layer does no I/O of its own (the client queues each line for its delivery thread),
//! it is safe to install in the same process as the client's own diagnostics.

use crate::{client::SyslogClient, facility::Severity};

use tracing::Event;
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent so that events bridged from the
// `log` crate are mapped on their original metadata
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

/// A sink for lines of trace output.
pub trait TraceAdapter {
    fn write_line(&self, severity: Severity, message: &str);
    /// Flush & release the sink; later lines may be dropped.
    fn close(&self);
}

/// `LOG_EMERG` through `LOG_ERR` go out via [`send_error`](SyslogClient::send_error),
/// `LOG_WARNING` via [`send_warning`](SyslogClient::send_warning), everything else via
/// [`send_text`](SyslogClient::send_text).
impl TraceAdapter for SyslogClient {
    fn write_line(&self, severity: Severity, message: &str) {
        if severity <= Severity::LOG_ERR {
            self.send_error(message)
        } else if severity == Severity::LOG_WARNING {
            self.send_warning(message)
        } else {
            self.send_text(message)
        }
    }
    fn close(&self) {
        SyslogClient::close(self)
    }
}

fn default_level_mapping(level: &tracing::Level) -> Severity {
    match *level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Severity::LOG_DEBUG,
        tracing::Level::INFO => Severity::LOG_INFO,
        tracing::Level::WARN => Severity::LOG_WARNING,
        tracing::Level::ERROR => Severity::LOG_ERR,
    }
}

struct MessageEventVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageEventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // The tracing macros "pre-format" the `message` field, so `value` is really a
            // `std::fmt::Arguments`, which debug-prints without enclosing double-quotes.
            self.message = Some(format!("{:?}", value));
        }
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that forwards each [`Event`]'s
/// "message" field to a [`TraceAdapter`]. Events without one are ignored.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer<A: TraceAdapter> {
    adapter: A,
    map_level: Box<dyn Fn(&tracing::Level) -> Severity + Send + Sync>,
}

impl<A: TraceAdapter> Layer<A> {
    pub fn new(adapter: A) -> Self {
        Layer {
            adapter,
            map_level: Box::new(default_level_mapping),
        }
    }
    /// Replace the default mapping from [`tracing::Level`] to [`Severity`].
    pub fn with_level_mapping(
        mut self,
        map_level: impl Fn(&tracing::Level) -> Severity + Send + Sync + 'static,
    ) -> Self {
        self.map_level = Box::new(map_level);
        self
    }
    pub fn adapter(&self) -> &A {
        &self.adapter
    }
    pub fn close(&self) {
        self.adapter.close()
    }
}

impl<S, A> tracing_subscriber::layer::Layer<S> for Layer<A>
where
    S: tracing::Subscriber,
    A: TraceAdapter + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        let mut visitor = MessageEventVisitor { message: None };
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            self.adapter
                .write_line((*self.map_level)(meta.level()), &message);
        }
    }
}
