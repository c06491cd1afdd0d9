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

//! A simple syslog client.
//!
//! [`SyslogClient`] pairs a [`BufferedSender`] with an [`Identity`] (the facility, HOSTNAME,
//! APP-NAME & PROCID to stamp on each message) so that callers can just say
//! [`send_text`](SyslogClient::send_text), [`send_warning`](SyslogClient::send_warning) or
//! [`send_error`](SyslogClient::send_error).
//!
//! On the first transport failure the client closes itself; from then on sends are silently
//! dropped until it is [`reset`](SyslogClient::reset). If [`ClientConfig::rearm_after`] is set,
//! the client resets itself after that delay.
//!
//! # Examples
//!
//! ```rust
//! use syslog_udp::{client::{ClientConfig, Identity, SyslogClient}, facility::Facility};
//!
//! let identity = Identity::builder()
//!     .facility(Facility::LOG_DAEMON)
//!     .appname_as_string("my-daemon".to_string())
//!     .unwrap()
//!     .build();
//! let client = SyslogClient::udp(
//!     "$loopback",
//!     514,
//!     ClientConfig {
//!         identity,
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//! client.open();
//! client.send_text("Hello, world!");
//! client.close();
//! ```

use crate::{
    error::{Result, TransportError},
    facility::{Facility, Severity},
    grammar,
    message::SyslogMessage,
    rfc5424::{to_payload, AppName, Hostname, ProcId},
    sender::{
        BufferedSender, ErrorHandler, SenderConfig, SenderState, DEFAULT_CLOSE_TIMEOUT,
        DEFAULT_PENDING_LIMIT,
    },
    transport::{Transport, UdpTransport, SYSLOG_UDP_PORT},
};

use chrono::Utc;
use tracing::{error, warn};

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock, Weak,
    },
    thread,
    time::Duration,
};

/// Cool-down before a failed client re-arms itself, when asked to
pub const REARM_DELAY: Duration = Duration::from_secs(15 * 60);

/// Who's talking: the fields stamped on each message a [`SyslogClient`] sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    facility: Facility,
    hostname: Hostname,
    appname: AppName,
    procid: ProcId,
    with_bom: bool,
}

impl std::default::Default for Identity {
    /// `LOG_USER`, with HOSTNAME, APP-NAME & PROCID discovered from the running process.
    fn default() -> Self {
        Identity {
            facility: Facility::LOG_USER,
            hostname: Hostname::default(),
            appname: AppName::default(),
            procid: ProcId::default(),
            with_bom: false,
        }
    }
}

pub struct IdentityBuilder {
    imp: Identity,
}

impl IdentityBuilder {
    pub fn facility(mut self, facility: Facility) -> Self {
        self.imp.facility = facility;
        self
    }
    pub fn hostname(mut self, hostname: Hostname) -> Self {
        self.imp.hostname = hostname;
        self
    }
    pub fn hostname_as_string(mut self, hostname: String) -> Result<Self> {
        self.imp.hostname = Hostname::try_from(hostname)?;
        Ok(self)
    }
    pub fn appname(mut self, appname: AppName) -> Self {
        self.imp.appname = appname;
        self
    }
    pub fn appname_as_string(mut self, appname: String) -> Result<Self> {
        self.imp.appname = AppName::try_from(appname)?;
        Ok(self)
    }
    pub fn procid(mut self, procid: ProcId) -> Self {
        self.imp.procid = procid;
        self
    }
    pub fn procid_as_string(mut self, procid: String) -> Result<Self> {
        self.imp.procid = ProcId::try_from(procid)?;
        Ok(self)
    }
    /// Prefix each MSG with a UTF-8 byte-order mark.
    pub fn with_bom(mut self, with_bom: bool) -> Self {
        self.imp.with_bom = with_bom;
        self
    }
    pub fn build(self) -> Identity {
        self.imp
    }
}

impl Identity {
    pub fn builder() -> IdentityBuilder {
        IdentityBuilder {
            imp: Identity::default(),
        }
    }
    pub fn facility(&self) -> Facility {
        self.facility
    }
    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }
    pub fn appname(&self) -> &AppName {
        &self.appname
    }
    pub fn procid(&self) -> &ProcId {
        &self.procid
    }
    /// A message from this identity, stamped with the current time.
    pub fn message(&self, severity: Severity, text: &str) -> SyslogMessage {
        // From the RFC: "If a syslog application encodes MSG in UTF-8, the string MUST start
        // with the Unicode byte order mask (BOM)"
        let text = if self.with_bom {
            format!("{}{}", grammar::BOM, text)
        } else {
            text.to_string()
        };
        SyslogMessage::new(self.facility, severity)
            .with_timestamp(Utc::now())
            .with_hostname(self.hostname.as_str())
            .with_appname(self.appname.as_str())
            .with_procid(self.procid.as_str())
            .with_msg(text)
    }
}

/// [`SyslogClient`] configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub identity: Identity,
    pub pending_limit: usize,
    pub close_timeout: Duration,
    /// If set, a client closed by a transport failure resets itself after this long
    /// ([`REARM_DELAY`] is a reasonable choice; re-arming quickly against a dead network is
    /// pointless).
    pub rearm_after: Option<Duration>,
}

impl std::default::Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            identity: Identity::default(),
            pending_limit: DEFAULT_PENDING_LIMIT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            rearm_after: None,
        }
    }
}

struct ClientInner {
    closed: AtomicBool,
    sender: BufferedSender,
    identity: Identity,
    on_error: Option<ErrorHandler>,
    rearm_after: Option<Duration>,
}

impl ClientInner {
    /// Invoked on the sender's worker thread
    fn on_sender_error(self: &Arc<Self>, err: &TransportError) {
        self.closed.store(true, Ordering::SeqCst);
        self.sender.close();
        error!("syslog client closed: {}", err);
        if let Some(handler) = &self.on_error {
            handler(err);
        }
        if let Some(delay) = self.rearm_after {
            let weak = Arc::downgrade(self);
            let spawned = thread::Builder::new()
                .name("syslog-udp-rearm".to_string())
                .spawn(move || {
                    thread::sleep(delay);
                    if let Some(inner) = weak.upgrade() {
                        inner.reset();
                    }
                });
            if let Err(err) = spawned {
                warn!("Failed to schedule the syslog client's re-arm: {}", err);
            }
        }
    }
    fn reset(&self) {
        self.sender.reset();
        self.closed.store(false, Ordering::SeqCst);
    }
}

/// Builder for [`SyslogClient`], for when an error callback is wanted
pub struct ClientBuilder {
    config: ClientConfig,
    on_error: Option<ErrorHandler>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }
    /// Called (on the delivery thread) after the client has closed itself on a transport failure.
    pub fn on_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
    pub fn build<T: Transport + Send + 'static>(self, transport: T) -> Result<SyslogClient> {
        let slot: Arc<OnceLock<Weak<ClientInner>>> = Arc::new(OnceLock::new());
        let handler_slot = slot.clone();
        let sender = BufferedSender::builder()
            .config(SenderConfig {
                pending_limit: self.config.pending_limit,
                close_timeout: self.config.close_timeout,
            })
            .on_error(move |err| {
                if let Some(inner) = handler_slot.get().and_then(Weak::upgrade) {
                    inner.on_sender_error(err);
                }
            })
            .build(transport)?;
        let inner = Arc::new(ClientInner {
            closed: AtomicBool::new(false),
            sender,
            identity: self.config.identity,
            on_error: self.on_error,
            rearm_after: self.config.rearm_after,
        });
        // Nothing has been submitted yet, so the sender can't have failed before this.
        let _ = slot.set(Arc::downgrade(&inner));
        Ok(SyslogClient { inner })
    }
}

/// Sends RFC 5424 messages on behalf of an [`Identity`].
///
/// Cloning a client yields another handle on the same sender.
#[derive(Clone)]
pub struct SyslogClient {
    inner: Arc<ClientInner>,
}

impl SyslogClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder {
            config: ClientConfig::default(),
            on_error: None,
        }
    }
    pub fn new<T: Transport + Send + 'static>(
        transport: T,
        config: ClientConfig,
    ) -> Result<SyslogClient> {
        SyslogClient::builder().config(config).build(transport)
    }
    /// A client sending via UDP to `host`:`port`
    pub fn udp(host: &str, port: i32, config: ClientConfig) -> Result<SyslogClient> {
        SyslogClient::new(UdpTransport::new(host, port), config)
    }
    /// One client per whitespace-separated host in `hosts`, each sending via UDP to port 514.
    ///
    /// The clients are opened once all have been created.
    pub fn for_hosts(hosts: &str, config: &ClientConfig) -> Result<Vec<SyslogClient>> {
        let clients = hosts
            .split_whitespace()
            .map(|host| SyslogClient::udp(host, SYSLOG_UDP_PORT, config.clone()))
            .collect::<Result<Vec<SyslogClient>>>()?;
        clients.iter().for_each(SyslogClient::open);
        Ok(clients)
    }

    /// Connect now, so that network problems are reported at once rather than on the first send.
    pub fn open(&self) {
        self.inner.sender.try_open();
    }
    /// Stop sending; subsequent sends are dropped until [`reset`](SyslogClient::reset).
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.sender.close();
    }
    pub fn reset(&self) {
        self.inner.reset();
    }
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
    pub fn state(&self) -> SenderState {
        self.inner.sender.state()
    }
    pub fn pending_limit(&self) -> usize {
        self.inner.sender.pending_limit()
    }
    pub fn set_pending_limit(&self, pending_limit: usize) {
        self.inner.sender.set_pending_limit(pending_limit)
    }
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Send `msg` as-is.
    pub fn send(&self, msg: &SyslogMessage) {
        if self.is_closed() {
            return;
        }
        let payload = to_payload(msg);
        if payload.trim().is_empty() {
            return;
        }
        self.inner.sender.submit(payload);
    }
    pub fn send_with_severity(&self, severity: Severity, text: &str) {
        if self.is_closed() {
            return;
        }
        self.send(&self.inner.identity.message(severity, text));
    }
    /// Send an informational message.
    pub fn send_text(&self, text: &str) {
        self.send_with_severity(Severity::LOG_INFO, text)
    }
    pub fn send_warning(&self, text: &str) {
        self.send_with_severity(Severity::LOG_WARNING, text)
    }
    pub fn send_error(&self, text: &str) {
        self.send_with_severity(Severity::LOG_ERR, text)
    }
}

impl std::fmt::Debug for SyslogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyslogClient")
            .field("closed", &self.is_closed())
            .field("identity", &self.inner.identity)
            .field("sender", &self.inner.sender)
            .finish()
    }
}
