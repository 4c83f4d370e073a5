//! Resilient event-feed connection manager.
//!
//! One logical connection to the attack feed, chosen from an ordered list
//! of candidate endpoints. Candidates are probed in order, each raced
//! against a fixed open timeout; the first to open wins and the rest are
//! never tried. Any failure after that (or a fully failed cycle) schedules
//! an unconditional fixed-delay retry -- no backoff growth, no retry
//! ceiling. A long-lived dashboard keeps trying forever; thrashing against
//! a permanently dead endpoint is the accepted cost.
//!
//! The transport sits behind a trait so the whole state machine runs in
//! tests against a scripted fake, with no sockets involved.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::config::StreamTuning;
use crate::event::{is_heartbeat, AttackEvent};

macro_rules! debug_log {
    ($($arg:tt)*) => {{
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/netglobe.log")
        {
            let _ = writeln!(f, $($arg)*);
        }
    }};
}

// ============================================================================
// Transport seam
// ============================================================================

/// What a transport reports on each poll.
///
/// A transport must report `Opened` exactly once before any `Message`;
/// after `Closed` it stays closed.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Still trying to open.
    Pending,
    /// Handshake complete; messages may follow.
    Opened,
    /// One text payload from the feed.
    Message(String),
    /// Open, nothing to read right now.
    Idle,
    /// Gone, with a reason. Terminal.
    Closed(String),
}

pub trait Transport {
    fn poll(&mut self, now: Instant) -> TransportEvent;
    fn close(&mut self);
}

/// Opens transports. Split from the manager so tests can inject fakes.
pub trait Dialer {
    fn dial(&mut self, url: &str, open_timeout: Duration) -> Box<dyn Transport>;
}

// ============================================================================
// Connection state machine
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Probing,
    Open,
    Reconnecting,
    /// Every candidate failed this cycle. Transient: a retry is always
    /// scheduled, so the machine leaves this state on its own.
    Failed,
}

/// Caller-facing projection of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnStatus {
    Idle,
    Connected,
    Reconnecting,
    Unable,
}

impl ConnStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnStatus::Idle => "idle",
            ConnStatus::Connected => "connected",
            ConnStatus::Reconnecting => "reconnecting",
            ConnStatus::Unable => "unable to connect",
        }
    }
}

pub struct StreamConnectionManager<D: Dialer> {
    dialer: D,
    tuning: StreamTuning,
    candidates: Vec<String>,
    state: ConnState,
    transport: Option<Box<dyn Transport>>,
    active_url: Option<String>,
    probe_idx: usize,
    probe_deadline: Option<Instant>,
    retry_at: Option<Instant>,
}

impl<D: Dialer> StreamConnectionManager<D> {
    pub fn new(dialer: D, tuning: StreamTuning) -> Self {
        Self {
            dialer,
            tuning,
            candidates: Vec::new(),
            state: ConnState::Idle,
            transport: None,
            active_url: None,
            probe_idx: 0,
            probe_deadline: None,
            retry_at: None,
        }
    }

    #[allow(dead_code)] // status() is the caller-facing projection
    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn status(&self) -> ConnStatus {
        match self.state {
            ConnState::Idle => ConnStatus::Idle,
            ConnState::Open => ConnStatus::Connected,
            ConnState::Probing | ConnState::Reconnecting => ConnStatus::Reconnecting,
            ConnState::Failed => ConnStatus::Unable,
        }
    }

    /// URL of the adopted endpoint, while Open.
    pub fn active_url(&self) -> Option<&str> {
        self.active_url.as_deref()
    }

    /// Begin (or restart) connecting. Supersedes any in-flight probe or
    /// live transport, closing it before anything new is dialed -- there
    /// is never more than one live transport.
    pub fn connect(&mut self, candidates: Vec<String>, now: Instant) {
        self.teardown();
        self.candidates = candidates;
        self.probe_idx = 0;
        self.retry_at = None;
        if self.candidates.is_empty() {
            self.state = ConnState::Failed;
            return;
        }
        self.state = ConnState::Probing;
        self.start_probe(now);
    }

    /// Close everything and go quiet. Drop does the same; this exists for
    /// callers that want to park the manager and reconnect later.
    #[allow(dead_code)]
    pub fn shutdown(&mut self) {
        self.teardown();
        self.retry_at = None;
        self.state = ConnState::Idle;
    }

    /// Drive the state machine one turn. Accepted events are handed to
    /// `sink`; at most `max_drain` messages are consumed per call so a
    /// burst cannot starve the frame loop.
    pub fn poll(&mut self, now: Instant, sink: &mut dyn FnMut(AttackEvent)) {
        match self.state {
            ConnState::Idle => {}
            ConnState::Failed | ConnState::Reconnecting => {
                if self.retry_at.is_some_and(|at| now >= at) {
                    self.retry_at = None;
                    self.probe_idx = 0;
                    self.state = ConnState::Probing;
                    self.start_probe(now);
                }
            }
            ConnState::Probing => self.poll_probe(now, sink),
            ConnState::Open => self.poll_open(now, sink),
        }
    }

    fn poll_probe(&mut self, now: Instant, sink: &mut dyn FnMut(AttackEvent)) {
        let Some(transport) = self.transport.as_mut() else {
            self.advance_probe(now);
            return;
        };
        match transport.poll(now) {
            TransportEvent::Opened => self.adopt(now),
            TransportEvent::Message(payload) => {
                // Transport skipped straight to traffic; treat as opened.
                self.adopt(now);
                self.handle_payload(&payload, sink);
            }
            TransportEvent::Pending | TransportEvent::Idle => {
                if self.probe_deadline.is_some_and(|deadline| now >= deadline) {
                    debug_log!(
                        "[stream] open timeout for {}",
                        self.candidates[self.probe_idx]
                    );
                    self.advance_probe(now);
                }
            }
            TransportEvent::Closed(reason) => {
                debug_log!(
                    "[stream] probe failed for {}: {}",
                    self.candidates[self.probe_idx],
                    reason
                );
                self.advance_probe(now);
            }
        }
    }

    fn poll_open(&mut self, now: Instant, sink: &mut dyn FnMut(AttackEvent)) {
        for _ in 0..self.tuning.max_drain {
            let Some(transport) = self.transport.as_mut() else {
                break;
            };
            match transport.poll(now) {
                TransportEvent::Message(payload) => self.handle_payload(&payload, sink),
                TransportEvent::Idle | TransportEvent::Pending | TransportEvent::Opened => break,
                TransportEvent::Closed(reason) => {
                    debug_log!("[stream] transport error: {}; reconnecting", reason);
                    self.teardown();
                    self.state = ConnState::Reconnecting;
                    self.retry_at = Some(now + self.tuning.retry_delay);
                    break;
                }
            }
        }
    }

    /// Parse one payload; malformed ones are logged and dropped without
    /// touching connection state.
    fn handle_payload(&mut self, payload: &str, sink: &mut dyn FnMut(AttackEvent)) {
        if is_heartbeat(payload) {
            return;
        }
        let recv_ms = chrono::Utc::now().timestamp_millis();
        match AttackEvent::parse(payload, recv_ms) {
            Ok(event) => sink(event),
            Err(e) => debug_log!("[stream] dropped malformed payload: {}", e),
        }
    }

    fn adopt(&mut self, _now: Instant) {
        self.active_url = Some(self.candidates[self.probe_idx].clone());
        self.probe_deadline = None;
        self.state = ConnState::Open;
        debug_log!("[stream] connected to {}", self.candidates[self.probe_idx]);
    }

    /// Abandon the current probe and move to the next candidate; after the
    /// last one, park in Failed with a retry scheduled.
    fn advance_probe(&mut self, now: Instant) {
        if let Some(mut t) = self.transport.take() {
            t.close();
        }
        self.probe_idx += 1;
        if self.probe_idx < self.candidates.len() {
            self.start_probe(now);
        } else {
            self.probe_deadline = None;
            self.state = ConnState::Failed;
            self.retry_at = Some(now + self.tuning.retry_delay);
            debug_log!("[stream] all candidates failed; retrying");
        }
    }

    fn start_probe(&mut self, now: Instant) {
        let url = &self.candidates[self.probe_idx];
        self.transport = Some(self.dialer.dial(url, self.tuning.open_timeout));
        self.probe_deadline = Some(now + self.tuning.open_timeout);
    }

    fn teardown(&mut self) {
        if let Some(mut t) = self.transport.take() {
            t.close();
        }
        self.active_url = None;
        self.probe_deadline = None;
    }
}

impl<D: Dialer> Drop for StreamConnectionManager<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// WebSocket transport
// ============================================================================

/// Production dialer over `tungstenite`.
pub struct WsDialer;

impl Dialer for WsDialer {
    fn dial(&mut self, url: &str, open_timeout: Duration) -> Box<dyn Transport> {
        Box::new(WsTransport {
            url: url.to_string(),
            open_timeout,
            phase: WsPhase::Unopened,
        })
    }
}

enum WsPhase {
    Unopened,
    Live(WebSocket<MaybeTlsStream<TcpStream>>),
    Dead,
}

/// WebSocket transport. The TCP connect and handshake happen on the first
/// poll, bounded by the open timeout; after that the socket is switched to
/// non-blocking and reads map `WouldBlock` to `Idle`.
pub struct WsTransport {
    url: String,
    open_timeout: Duration,
    phase: WsPhase,
}

impl Transport for WsTransport {
    fn poll(&mut self, _now: Instant) -> TransportEvent {
        match &mut self.phase {
            WsPhase::Unopened => match open_websocket(&self.url, self.open_timeout) {
                Ok(ws) => {
                    self.phase = WsPhase::Live(ws);
                    TransportEvent::Opened
                }
                Err(reason) => {
                    self.phase = WsPhase::Dead;
                    TransportEvent::Closed(reason)
                }
            },
            WsPhase::Live(ws) => match ws.read() {
                Ok(Message::Text(text)) => TransportEvent::Message(text),
                Ok(Message::Close(_)) => {
                    self.phase = WsPhase::Dead;
                    TransportEvent::Closed("closed by peer".to_string())
                }
                Ok(_) => TransportEvent::Idle, // ping/pong/binary keep us alive
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    TransportEvent::Idle
                }
                Err(e) => {
                    self.phase = WsPhase::Dead;
                    TransportEvent::Closed(e.to_string())
                }
            },
            WsPhase::Dead => TransportEvent::Closed("transport closed".to_string()),
        }
    }

    fn close(&mut self) {
        if let WsPhase::Live(ws) = &mut self.phase {
            let _ = ws.close(None);
        }
        self.phase = WsPhase::Dead;
    }
}

fn open_websocket(
    url_str: &str,
    timeout: Duration,
) -> Result<WebSocket<MaybeTlsStream<TcpStream>>, String> {
    let url = Url::parse(url_str).map_err(|e| format!("bad url: {}", e))?;
    let host = url.host_str().ok_or("url has no host")?.to_string();
    let port = url
        .port_or_known_default()
        .unwrap_or(if url.scheme() == "wss" { 443 } else { 80 });

    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| format!("resolve {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("no address for {}", host))?;

    let stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|e| format!("connect: {}", e))?;
    // Bound the handshake too, then hand a non-blocking socket to reads.
    let _ = stream.set_read_timeout(Some(timeout));
    let (mut ws, _response) =
        tungstenite::client_tls(url_str, stream).map_err(|e| format!("handshake: {}", e))?;

    match ws.get_mut() {
        MaybeTlsStream::Plain(s) => {
            let _ = s.set_read_timeout(None);
            let _ = s.set_nonblocking(true);
        }
        MaybeTlsStream::NativeTls(t) => {
            let _ = t.get_mut().set_read_timeout(None);
            let _ = t.get_mut().set_nonblocking(true);
        }
        _ => {}
    }

    Ok(ws)
}
