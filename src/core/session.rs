//! Session management
//!
//! Owns the serial connection and moves data both ways: a reader thread
//! frames and interprets incoming bytes, a writer thread drains an ordered
//! queue of outbound payloads. The shell only sees the `Session` API and the
//! `SessionEvent` channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{ConnectError, EngineError};
use super::framer::LineFramer;
use super::log_sink::LogSink;
use super::sgr::{self, DisplayRecord};
use super::transport::{Transport, TransportOpener};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Valid lifecycle edges; Connecting→Disconnected is an aborted open
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Disconnected)
        )
    }
}

/// Session events
#[derive(Debug)]
pub enum SessionEvent {
    /// A received line, ready to render
    Line(DisplayRecord),
    /// Connection state changed
    StateChanged(ConnectionState),
    /// Port opened; follows `StateChanged(Connected)`
    Opened { port: String, baud: u32 },
    /// A payload was written to the port
    Sent(String),
    /// Error occurred
    Error(EngineError),
}

/// Line endings appended to outbound text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPolicy {
    pub append_cr: bool,
    pub append_lf: bool,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            append_cr: false,
            append_lf: true,
        }
    }
}

impl SendPolicy {
    pub fn apply(&self, text: &str) -> String {
        let mut payload = String::with_capacity(text.len() + 2);
        payload.push_str(text);
        if self.append_cr {
            payload.push('\r');
        }
        if self.append_lf {
            payload.push('\n');
        }
        payload
    }
}

/// Timing and queue settings
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Transport read timeout
    pub read_timeout: Duration,
    /// Sleep between polls when no bytes are waiting
    pub poll_interval: Duration,
    /// Outbound payloads queued before `send` blocks
    pub write_queue_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(5),
            write_queue_depth: 64,
        }
    }
}

/// One live connection and its two threads
struct Link {
    port: String,
    /// Cleared to stop both threads
    running: Arc<AtomicBool>,
    writer_tx: Option<SyncSender<String>>,
    reader_thread: Option<JoinHandle<()>>,
    writer_thread: Option<JoinHandle<()>>,
}

impl Link {
    fn join(&mut self) {
        self.writer_tx.take();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

/// State shared with the link threads
struct Shared {
    state: Mutex<ConnectionState>,
    log: Arc<LogSink>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            *state,
            next
        );
        *state = next;
    }
}

/// A serial terminal session
pub struct Session {
    shared: Arc<Shared>,
    opener: Box<dyn TransportOpener>,
    options: SessionOptions,
    policy: SendPolicy,
    events: Sender<SessionEvent>,
    link: Option<Link>,
    /// Disconnected links whose threads have not been joined yet
    retired: Vec<Link>,
}

impl Session {
    /// Create a disconnected session reporting to `events`
    pub fn new(
        opener: Box<dyn TransportOpener>,
        options: SessionOptions,
        log: Arc<LogSink>,
        events: Sender<SessionEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                log,
            }),
            opener,
            options,
            policy: SendPolicy::default(),
            events,
            link: None,
            retired: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Port of the current connection
    pub fn port(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.port.as_str())
    }

    pub fn send_policy(&self) -> SendPolicy {
        self.policy
    }

    pub fn set_send_policy(&mut self, policy: SendPolicy) {
        self.policy = policy;
    }

    /// Enable or disable the traffic log; `None` keeps the current path
    pub fn set_logging(&self, enabled: bool, path: Option<PathBuf>) {
        self.shared.log.configure(enabled, path);
    }

    pub fn log_sink(&self) -> &Arc<LogSink> {
        &self.shared.log
    }

    /// Open `port` and start the reader and writer threads
    ///
    /// Failures are both returned and reported as `SessionEvent::Error`.
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<(), EngineError> {
        match self.try_connect(port, baud) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Connect to {} failed: {}", port, e);
                let err = EngineError::Connect(e);
                let _ = self.events.send(SessionEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn try_connect(&mut self, port: &str, baud: u32) -> Result<(), ConnectError> {
        if port.trim().is_empty() {
            return Err(ConnectError::InvalidPort);
        }
        if baud == 0 {
            return Err(ConnectError::InvalidBaud(baud));
        }
        if self.is_connected() {
            let current = self.port().unwrap_or_default().to_string();
            return Err(ConnectError::AlreadyConnected(current));
        }

        // A link that died on a read error still has threads to reap
        if let Some(link) = self.link.take() {
            self.retired.push(link);
        }
        self.reap();

        self.transition(ConnectionState::Connecting);

        let opened = self
            .opener
            .open(port, baud, self.options.read_timeout)
            .and_then(|reader| {
                let writer = reader.try_clone()?;
                Ok((reader, writer))
            });
        let (reader, writer) = match opened {
            Ok(pair) => pair,
            Err(source) => {
                self.transition(ConnectionState::Disconnected);
                return Err(ConnectError::Open {
                    port: port.to_string(),
                    source,
                });
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let (writer_tx, writer_rx) = mpsc::sync_channel::<String>(self.options.write_queue_depth.max(1));

        // Connected before the reader starts, so the loop never sees Connecting
        self.transition(ConnectionState::Connected);
        let _ = self.events.send(SessionEvent::Opened {
            port: port.to_string(),
            baud,
        });

        let reader_thread = {
            let running = running.clone();
            let shared = self.shared.clone();
            let events = self.events.clone();
            let poll = self.options.poll_interval;
            thread::spawn(move || read_loop(reader, running, shared, events, poll))
        };

        let writer_thread = {
            let running = running.clone();
            let shared = self.shared.clone();
            let events = self.events.clone();
            let poll = self.options.poll_interval;
            thread::spawn(move || write_loop(writer, writer_rx, running, shared, events, poll))
        };

        info!("Connected to {} at {} baud", port, baud);
        self.link = Some(Link {
            port: port.to_string(),
            running,
            writer_tx: Some(writer_tx),
            reader_thread: Some(reader_thread),
            writer_thread: Some(writer_thread),
        });
        Ok(())
    }

    /// Queue `text` for writing, with the current send policy applied
    ///
    /// Payloads reach the port in call order. Blocks while the queue is
    /// full. Write failures arrive later as `SessionEvent::Error`.
    pub fn send(&self, text: &str) -> Result<(), EngineError> {
        let tx = match &self.link {
            Some(link) if self.is_connected() => link.writer_tx.as_ref(),
            _ => None,
        };
        let Some(tx) = tx else {
            return Err(EngineError::NotConnected);
        };

        let payload = self.policy.apply(text);
        debug!("Queueing {} bytes", payload.len());
        tx.send(payload).map_err(|_| EngineError::NotConnected)
    }

    /// Stop the link threads and close the port
    ///
    /// The reader notices within one poll interval; a read already in
    /// progress may still deliver its lines. Payloads `send` already
    /// accepted are written before the port closes. Calling this while
    /// disconnected does nothing.
    pub fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };

        link.writer_tx.take();
        if link.running.swap(false, Ordering::SeqCst) {
            self.transition(ConnectionState::Disconnected);
            info!("Disconnected from {}", link.port);
        }
        self.retired.push(link);
    }

    /// Join the threads of disconnected links
    fn reap(&mut self) {
        for mut link in self.retired.drain(..) {
            link.join();
        }
    }

    fn transition(&self, next: ConnectionState) {
        self.shared.set_state(next);
        let _ = self.events.send(SessionEvent::StateChanged(next));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
        self.reap();
    }
}

fn read_loop(
    mut transport: Box<dyn Transport>,
    running: Arc<AtomicBool>,
    shared: Arc<Shared>,
    events: Sender<SessionEvent>,
    poll: Duration,
) {
    let mut framer = LineFramer::new();

    while running.load(Ordering::SeqCst) {
        let chunk = match transport.bytes_available() {
            Ok(0) => {
                thread::sleep(poll);
                continue;
            }
            Ok(_) => transport.read_available(),
            Err(e) => Err(e),
        };

        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                // Only report if nobody asked us to stop in the meantime
                if running.swap(false, Ordering::SeqCst) {
                    warn!("Read failed, dropping connection: {}", e);
                    shared.set_state(ConnectionState::Disconnected);
                    let _ = events.send(SessionEvent::Error(EngineError::Read(e)));
                    let _ = events.send(SessionEvent::StateChanged(ConnectionState::Disconnected));
                }
                break;
            }
        };

        for line in framer.feed(&chunk) {
            let record = sgr::interpret(&line.to_text());
            debug!("Line [{}]: {}", record.tag.name(), record.text);
            let clean = record.text.clone();

            if events.send(SessionEvent::Line(record)).is_err() {
                // Shell went away; nobody is left to tell
                if running.swap(false, Ordering::SeqCst) {
                    shared.set_state(ConnectionState::Disconnected);
                }
                break;
            }
            if let Err(e) = shared.log.append(&clean) {
                let _ = events.send(SessionEvent::Error(e.into()));
            }
        }
    }

    if !framer.pending().is_empty() {
        debug!("Discarding {} unterminated bytes", framer.pending().len());
    }
}

fn write_loop(
    mut transport: Box<dyn Transport>,
    queue: Receiver<String>,
    running: Arc<AtomicBool>,
    shared: Arc<Shared>,
    events: Sender<SessionEvent>,
    poll: Duration,
) {
    // Every payload `send` accepted is written, including those still
    // queued when the link stops
    loop {
        match queue.recv_timeout(poll) {
            Ok(payload) => write_payload(&mut *transport, payload, &shared, &events),
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The sender outlives a read-error stop; take what raced in
    for payload in queue.try_iter() {
        write_payload(&mut *transport, payload, &shared, &events);
    }

    if let Err(e) = transport.close() {
        debug!("Close failed: {}", e);
    }
}

fn write_payload(
    transport: &mut dyn Transport,
    payload: String,
    shared: &Shared,
    events: &Sender<SessionEvent>,
) {
    match transport.write(payload.as_bytes()) {
        Ok(()) => {
            if let Err(e) = shared.log.append_sent(&payload) {
                let _ = events.send(SessionEvent::Error(e.into()));
            }
            let _ = events.send(SessionEvent::Sent(payload));
        }
        Err(e) => {
            warn!("Write failed: {}", e);
            let _ = events.send(SessionEvent::Error(EngineError::Write(e)));
        }
    }
}
