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

//! Buffered, non-blocking delivery of syslog payloads.
//!
//! A [`BufferedSender`] owns one dedicated worker thread, which in turn owns the [`Transport`].
//! Callers hand payloads to [`submit`](BufferedSender::submit), which appends them to a bounded
//! queue & wakes the worker; it never blocks on the network & never fails. The worker drains the
//! queue in FIFO order, removing each payload only once it has been sent.
//!
//! # Backpressure
//!
//! The queue holds at most `pending_limit + 1` payloads. When it is full, the *oldest* payload is
//! dropped to make room: the newest messages are assumed to be the most relevant.
//!
//! # States
//!
//! A sender starts [`Uninitialized`](SenderState::Uninitialized), moves to
//! [`Opened`](SenderState::Opened) once the worker has connected the transport, and to
//! [`Error`](SenderState::Error) on the first transport failure. [`close`](BufferedSender::close)
//! moves it to [`Closed`](SenderState::Closed). `Error` & `Closed` are terminal until
//! [`reset`](BufferedSender::reset): payloads submitted in either state are queued, but nothing is
//! sent.
//!
//! Transport failures are reported to an optional callback, invoked on the worker thread with no
//! locks held; the callback may call back into the sender (to close it, say).
//!
//! # Examples
//!
//! ```rust
//! use syslog_udp::{sender::BufferedSender, transport::UdpTransport};
//! use std::time::Duration;
//!
//! let sender = BufferedSender::builder()
//!     .pending_limit(100)
//!     .close_timeout(Duration::from_millis(500))
//!     .on_error(|err| eprintln!("syslog delivery failed: {}", err))
//!     .build(UdpTransport::with_host("$loopback"))
//!     .unwrap();
//! sender.submit("<14>1 - - - - - - hello");
//! sender.close();
//! ```

use crate::{
    error::{Error, Result, TransportError},
    transport::Transport,
};

use backtrace::Backtrace;
use bytes::Bytes;
use tracing::{debug, warn};

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError},
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

/// Default bound on the pending queue
pub const DEFAULT_PENDING_LIMIT: usize = 50;
/// Default bound on the time [`BufferedSender::close`] will wait for the worker
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The operational state of a [`BufferedSender`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SenderState {
    Uninitialized,
    Opened,
    Closed,
    Error,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SenderState::Uninitialized => "uninitialized",
                SenderState::Opened => "opened",
                SenderState::Closed => "closed",
                SenderState::Error => "error",
            }
        )
    }
}

/// [`BufferedSender`] tunables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderConfig {
    /// The queue is trimmed back to this many payloads before each new one is appended
    pub pending_limit: usize,
    /// The longest [`BufferedSender::close`] will wait for an in-flight send to finish
    pub close_timeout: Duration,
}

impl std::default::Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            pending_limit: DEFAULT_PENDING_LIMIT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Transport failure callback
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync + 'static>;

struct Inner {
    /// Undelivered payloads, each tagged with a sequence number
    pending: VecDeque<(u64, Bytes)>,
    next_seq: u64,
    pending_limit: usize,
    evicted: u64,
    evicted_reported: u64,
    state: SenderState,
    flush_requested: bool,
    open_requested: bool,
    /// Set while a `close()` is in progress; no new delivery work is started
    closing: bool,
    /// The worker should close the transport
    close_pending: bool,
    /// Incremented by the worker each time it closes the transport on request
    closes_done: u64,
    shutdown: bool,
    exited: bool,
}

impl Inner {
    fn may_deliver(&self) -> bool {
        matches!(
            self.state,
            SenderState::Uninitialized | SenderState::Opened
        ) && !self.closing
            && !self.shutdown
    }
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled when the worker has something to do
    work: Condvar,
    /// Signalled by the worker on close acknowledgement & on exit
    quiet: Condvar,
    on_error: Option<ErrorHandler>,
}

impl Shared {
    // A panicking callback mustn't render the sender unusable, hence the poison recovery.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Wait on `cv` until `done` or `deadline`; returns the guard & whether `done` was satisfied.
    fn wait_until<'a>(
        &self,
        cv: &Condvar,
        mut inner: MutexGuard<'a, Inner>,
        deadline: Instant,
        done: impl Fn(&Inner) -> bool,
    ) -> (MutexGuard<'a, Inner>, bool) {
        while !done(&inner) {
            let now = Instant::now();
            if now >= deadline {
                return (inner, false);
            }
            inner = cv
                .wait_timeout(inner, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|err| err.into_inner().0);
        }
        (inner, true)
    }
}

/// Builder for [`BufferedSender`]
pub struct SenderBuilder {
    config: SenderConfig,
    on_error: Option<ErrorHandler>,
}

impl SenderBuilder {
    pub fn config(mut self, config: SenderConfig) -> Self {
        self.config = config;
        self
    }
    pub fn pending_limit(mut self, pending_limit: usize) -> Self {
        self.config.pending_limit = pending_limit;
        self
    }
    pub fn close_timeout(mut self, close_timeout: Duration) -> Self {
        self.config.close_timeout = close_timeout;
        self
    }
    /// Register a callback for transport failures.
    pub fn on_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
    pub fn on_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }
    /// Start the worker thread; `transport` is moved onto it.
    pub fn build<T: Transport + Send + 'static>(self, transport: T) -> Result<BufferedSender> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                next_seq: 0,
                pending_limit: self.config.pending_limit,
                evicted: 0,
                evicted_reported: 0,
                state: SenderState::Uninitialized,
                flush_requested: false,
                open_requested: false,
                closing: false,
                close_pending: false,
                closes_done: 0,
                shutdown: false,
                exited: false,
            }),
            work: Condvar::new(),
            quiet: Condvar::new(),
            on_error: self.on_error,
        });
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("syslog-udp-sender".to_string())
            .spawn(move || run(worker_shared, transport))
            .map_err(|source| Error::NoWorker {
                source,
                back: Backtrace::new(),
            })?;
        Ok(BufferedSender {
            shared,
            worker_id: worker.thread().id(),
            worker: Some(worker),
            close_lock: Mutex::new(()),
            close_timeout: self.config.close_timeout,
        })
    }
}

/// Queues syslog payloads & delivers them on a background thread.
pub struct BufferedSender {
    shared: Arc<Shared>,
    worker_id: ThreadId,
    worker: Option<JoinHandle<()>>,
    close_lock: Mutex<()>,
    close_timeout: Duration,
}

impl BufferedSender {
    pub fn builder() -> SenderBuilder {
        SenderBuilder {
            config: SenderConfig::default(),
            on_error: None,
        }
    }

    /// Queue `payload` for delivery.
    ///
    /// Never blocks on the transport & never fails. Empty payloads are ignored. In the `Error` &
    /// `Closed` states the payload is queued but no delivery is attempted.
    pub fn submit(&self, payload: impl Into<Bytes>) {
        let payload = payload.into();
        if payload.is_empty() {
            return;
        }
        let mut inner = self.shared.lock();
        while inner.pending.len() > inner.pending_limit {
            inner.pending.pop_front();
            inner.evicted += 1;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.push_back((seq, payload));
        if inner.may_deliver() {
            inner.flush_requested = true;
            drop(inner);
            self.shared.work.notify_one();
        }
    }

    /// Ask the worker to connect the transport now, rather than on first delivery.
    ///
    /// Failures are reported through the error callback, not returned.
    pub fn try_open(&self) {
        let mut inner = self.shared.lock();
        if inner.state == SenderState::Uninitialized && inner.may_deliver() {
            inner.open_requested = true;
            drop(inner);
            self.shared.work.notify_one();
        }
    }

    /// Stop delivery, close the transport & move to [`SenderState::Closed`].
    ///
    /// Waits at most the configured close timeout for an in-flight send to complete; past that,
    /// the sender is marked closed regardless & the worker closes the transport once the send
    /// returns. If another thread is already closing this sender, returns immediately. When
    /// invoked from the error callback, does not wait at all.
    ///
    /// Undelivered payloads are kept.
    pub fn close(&self) {
        let _close_guard = match self.close_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
        };
        self.close_holding_lock();
    }

    /// [`close`](BufferedSender::close), then return to [`SenderState::Uninitialized`] so that
    /// delivery can begin again.
    ///
    /// Unlike `close`, this waits for any close already in progress on another thread, so that
    /// close can't land after the reset.
    pub fn reset(&self) {
        let _close_guard = self
            .close_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.close_holding_lock();
        self.shared.lock().state = SenderState::Uninitialized;
    }

    // Callers hold `close_lock`
    fn close_holding_lock(&self) {
        let on_worker = self.on_worker();
        let mut inner = self.shared.lock();
        inner.closing = true;
        inner.close_pending = true;
        let seen = inner.closes_done;
        self.shared.work.notify_one();
        let mut quiesced = true;
        if !on_worker {
            let deadline = Instant::now() + self.close_timeout;
            let (guard, done) =
                self.shared
                    .wait_until(&self.shared.quiet, inner, deadline, |inner| {
                        inner.closes_done != seen || inner.exited
                    });
            inner = guard;
            quiesced = done;
        }
        inner.state = SenderState::Closed;
        inner.closing = false;
        drop(inner);
        if !quiesced {
            warn!(
                "Timed out after {:?} waiting for the syslog transport to close",
                self.close_timeout
            );
        }
    }

    pub fn state(&self) -> SenderState {
        self.shared.lock().state
    }
    /// The number of payloads awaiting delivery
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }
    /// A snapshot of the payloads awaiting delivery, oldest first
    pub fn pending_payloads(&self) -> Vec<Bytes> {
        self.shared
            .lock()
            .pending
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
    pub fn pending_limit(&self) -> usize {
        self.shared.lock().pending_limit
    }
    /// Takes effect at the next [`submit`](BufferedSender::submit).
    pub fn set_pending_limit(&self, pending_limit: usize) {
        self.shared.lock().pending_limit = pending_limit;
    }
    /// The number of payloads dropped to backpressure over this sender's lifetime
    pub fn evicted(&self) -> u64 {
        self.shared.lock().evicted
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl std::fmt::Debug for BufferedSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("BufferedSender")
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .field("pending_limit", &inner.pending_limit)
            .field("evicted", &inner.evicted)
            .finish()
    }
}

impl Drop for BufferedSender {
    /// Ask the worker to exit & wait (bounded by the close timeout) for it to do so. A worker
    /// stuck in a send is detached.
    fn drop(&mut self) {
        let on_worker = self.on_worker();
        let mut inner = self.shared.lock();
        inner.shutdown = true;
        self.shared.work.notify_one();
        let mut exited = inner.exited;
        if !on_worker {
            let deadline = Instant::now() + self.close_timeout;
            let (guard, done) =
                self.shared
                    .wait_until(&self.shared.quiet, inner, deadline, |inner| inner.exited);
            inner = guard;
            exited = done;
        }
        drop(inner);
        if let Some(worker) = self.worker.take() {
            if exited && !on_worker {
                let _ = worker.join();
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         the worker                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

// Nothing here logs while holding the lock: an event may well be routed right back into
// `submit` on this very sender.

fn run<T: Transport>(shared: Arc<Shared>, mut transport: T) {
    let mut inner = shared.lock();
    loop {
        if inner.shutdown {
            drop(inner);
            transport.close();
            debug!("syslog sender shutting down");
            let mut inner = shared.lock();
            inner.exited = true;
            shared.quiet.notify_all();
            return;
        }
        if inner.close_pending {
            inner.close_pending = false;
            drop(inner);
            transport.close();
            debug!("syslog transport closed");
            inner = shared.lock();
            inner.closes_done += 1;
            shared.quiet.notify_all();
            continue;
        }
        if inner.flush_requested || inner.open_requested {
            inner.flush_requested = false;
            inner.open_requested = false;
            inner = deliver(&shared, &mut transport, inner);
            continue;
        }
        inner = shared
            .work
            .wait(inner)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Open the transport if need be, then send until the queue is empty, a send fails, or someone
/// starts closing the sender.
fn deliver<'a, T: Transport>(
    shared: &'a Shared,
    transport: &mut T,
    mut inner: MutexGuard<'a, Inner>,
) -> MutexGuard<'a, Inner> {
    if !inner.may_deliver() {
        return inner;
    }
    if inner.state == SenderState::Uninitialized {
        drop(inner);
        if let Err(err) = transport.open() {
            return fail(shared, transport, err);
        }
        debug!("syslog transport opened");
        inner = shared.lock();
        if inner.state != SenderState::Uninitialized || !inner.may_deliver() {
            return inner;
        }
        inner.state = SenderState::Opened;
    }
    loop {
        if inner.state != SenderState::Opened || !inner.may_deliver() {
            return inner;
        }
        let (seq, payload) = match inner.pending.front() {
            Some((seq, payload)) => (*seq, payload.clone()),
            None => return inner,
        };
        let newly_evicted = inner.evicted - inner.evicted_reported;
        inner.evicted_reported = inner.evicted;
        drop(inner);
        if newly_evicted > 0 {
            debug!(
                "syslog queue overflowed; dropped the {} oldest payload(s)",
                newly_evicted
            );
        }
        let sent = transport.send(&payload);
        inner = shared.lock();
        match sent {
            Ok(_) => {
                // The head may have been evicted while we were sending.
                if inner.pending.front().map(|(s, _)| *s) == Some(seq) {
                    inner.pending.pop_front();
                }
            }
            Err(err) => {
                drop(inner);
                return fail(shared, transport, err);
            }
        }
    }
}

/// Move to `Error` (unless closed in the meantime), close the transport & report `err`. The
/// failed payload, if any, stays at the head of the queue.
fn fail<'a, T: Transport>(
    shared: &'a Shared,
    transport: &mut T,
    err: TransportError,
) -> MutexGuard<'a, Inner> {
    {
        let mut inner = shared.lock();
        if inner.state != SenderState::Closed {
            inner.state = SenderState::Error;
        }
    }
    transport.close();
    debug!("syslog delivery failed: {}", err);
    if let Some(handler) = &shared.on_error {
        handler(&err);
    }
    shared.lock()
}
