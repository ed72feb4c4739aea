//! Update stream client: connection state machine plus packet decoding.
//!
//! The client never touches sockets. A [`Transport`] starts connections and
//! carries outbound text; the host reports `open`, `frame` and `closed` back
//! through the `handle_*` methods and drives the reconnect timer with
//! [`StreamClient::poll`].

use std::{
    fmt,
    time::{Duration, Instant},
};

use canvas_proto::{
    decode_server_frame, encode_client_packet_json, BatchUpdate, ClientPacket, Pixel,
    ServerPacket, WireColor,
};
use thiserror::Error;

use crate::config::CanvasConfig;
use crate::timer::TimerSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `attempt` is the number of consecutive failures before this try.
    Connecting { attempt: u32 },
    Open,
    /// Waiting out the backoff before retry number `attempt`.
    Closed { attempt: u32 },
    /// Retries exhausted.
    Disconnected,
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting { attempt: 0 } => write!(f, "connecting"),
            ConnectionState::Connecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            ConnectionState::Open => write!(f, "connected"),
            ConnectionState::Closed { attempt } => write!(f, "retrying (attempt {attempt})"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport worker has shut down")]
    WorkerGone,
}

/// Byte pipe to the server, owned by the stream client.
pub trait Transport {
    /// Begins a connection attempt. Completion is reported asynchronously
    /// through [`StreamClient::handle_open`] / [`StreamClient::handle_closed`].
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError>;
    /// Sends one text message. Fire-and-forget.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        (**self).connect(endpoint)
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Decoded inbound change, applied to the grid in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    Pixels(Vec<Pixel>),
    Batch(BatchUpdate),
    Snapshot(Vec<Vec<WireColor>>),
}

impl From<ServerPacket> for GridEvent {
    fn from(packet: ServerPacket) -> Self {
        match packet {
            ServerPacket::PixelUpdate(pixels) => GridEvent::Pixels(pixels),
            ServerPacket::BatchUpdate(batch) => GridEvent::Batch(batch),
            ServerPacket::GridRefresh(rows) => GridEvent::Snapshot(rows),
        }
    }
}

/// Linear backoff: retry `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &CanvasConfig) -> Self {
        Self {
            base_delay: config.reconnect_delay(),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_attempts: 5,
        }
    }
}

pub struct StreamClient<T> {
    transport: T,
    endpoint: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
    retry: TimerSlot,
    frames_dropped: u64,
}

impl<T: Transport> StreamClient<T> {
    pub fn new(transport: T, endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            policy,
            state: ConnectionState::Stopped,
            failures: 0,
            retry: TimerSlot::default(),
            frames_dropped: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.retry.deadline()
    }

    /// Opens the first connection. Returns every state passed through.
    pub fn start(&mut self, now: Instant) -> Vec<ConnectionState> {
        self.retry.cancel();
        self.failures = 0;
        self.attempt(now)
    }

    pub fn handle_open(&mut self) -> Option<ConnectionState> {
        match self.state {
            ConnectionState::Connecting { .. } => {
                self.failures = 0;
                Some(self.transition(ConnectionState::Open))
            }
            state => {
                tracing::debug!(target: "pixel_canvas::stream", %state, "stream.open_ignored");
                None
            }
        }
    }

    /// Decodes one frame. Malformed frames are logged and dropped.
    pub fn handle_frame(&mut self, payload: &[u8]) -> Option<GridEvent> {
        if matches!(self.state, ConnectionState::Stopped) {
            return None;
        }
        match decode_server_frame(payload) {
            Ok(packet) => Some(packet.into()),
            Err(err) => {
                self.frames_dropped += 1;
                tracing::warn!(
                    target: "pixel_canvas::stream",
                    error = %err,
                    len = payload.len(),
                    "stream.frame_dropped"
                );
                None
            }
        }
    }

    /// Connection lost or attempt failed: schedule a retry or give up.
    pub fn handle_closed(&mut self, now: Instant) -> Option<ConnectionState> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting { .. } => Some(self.schedule_retry(now)),
            _ => None,
        }
    }

    /// Fires the reconnect timer when due.
    pub fn poll(&mut self, now: Instant) -> Vec<ConnectionState> {
        if !self.retry.fire_if_due(now) {
            return Vec::new();
        }
        match self.state {
            ConnectionState::Closed { .. } => self.attempt(now),
            _ => Vec::new(),
        }
    }

    /// Sends a placement when the connection is open; otherwise a no-op.
    pub fn send_placement(&mut self, pixel: Pixel) -> bool {
        if self.state != ConnectionState::Open {
            tracing::debug!(
                target: "pixel_canvas::stream",
                state = %self.state,
                x = pixel.x,
                y = pixel.y,
                "stream.placement_not_sent"
            );
            return false;
        }
        let text = match encode_client_packet_json(&ClientPacket::Update(pixel)) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(target: "pixel_canvas::stream", error = %err, "stream.encode_failed");
                return false;
            }
        };
        match self.transport.send(&text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(target: "pixel_canvas::stream", error = %err, "stream.send_failed");
                false
            }
        }
    }

    /// Cancels the retry timer and closes the transport.
    pub fn shutdown(&mut self) -> Option<ConnectionState> {
        self.retry.cancel();
        if self.state == ConnectionState::Stopped {
            return None;
        }
        self.transport.close();
        Some(self.transition(ConnectionState::Stopped))
    }

    fn attempt(&mut self, now: Instant) -> Vec<ConnectionState> {
        let mut states = vec![self.transition(ConnectionState::Connecting {
            attempt: self.failures,
        })];
        if let Err(err) = self.transport.connect(&self.endpoint) {
            tracing::warn!(
                target: "pixel_canvas::stream",
                error = %err,
                endpoint = %self.endpoint,
                "stream.connect_failed"
            );
            states.push(self.schedule_retry(now));
        }
        states
    }

    fn schedule_retry(&mut self, now: Instant) -> ConnectionState {
        let failures = self.failures.saturating_add(1);
        if failures > self.policy.max_attempts {
            self.retry.cancel();
            tracing::error!(
                target: "pixel_canvas::stream",
                attempts = self.failures,
                endpoint = %self.endpoint,
                "stream.gave_up"
            );
            return self.transition(ConnectionState::Disconnected);
        }
        self.failures = failures;
        let delay = self.policy.delay_for(failures);
        self.retry.arm(now + delay);
        tracing::info!(
            target: "pixel_canvas::stream",
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            "stream.retry_scheduled"
        );
        self.transition(ConnectionState::Closed { attempt: failures })
    }

    fn transition(&mut self, next: ConnectionState) -> ConnectionState {
        if self.state != next {
            tracing::info!(
                target: "pixel_canvas::stream",
                from = %self.state,
                to = %next,
                "stream.state"
            );
        }
        self.state = next;
        next
    }
}

impl<T> fmt::Debug for StreamClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("failures", &self.failures)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTransport {
        connects: u32,
        sent: Vec<String>,
        closed: u32,
        refuse: bool,
    }

    impl Transport for FakeTransport {
        fn connect(&mut self, _endpoint: &str) -> Result<(), TransportError> {
            self.connects += 1;
            if self.refuse {
                Err(TransportError::NotConnected)
            } else {
                Ok(())
            }
        }

        fn send(&mut self, text: &str) -> Result<(), TransportError> {
            self.sent.push(text.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn client() -> StreamClient<FakeTransport> {
        StreamClient::new(FakeTransport::default(), "test", ReconnectPolicy::default())
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn open_then_frames_decode_in_order() {
        let t0 = Instant::now();
        let mut client = client();
        assert_eq!(client.start(t0), vec![ConnectionState::Connecting { attempt: 0 }]);
        assert_eq!(client.handle_open(), Some(ConnectionState::Open));

        let event = client.handle_frame(br#"{"type":"PIXEL_UPDATE","data":[{"x":1,"y":1,"color":2}]}"#);
        assert_eq!(event, Some(GridEvent::Pixels(vec![Pixel::new(1, 1, 2)])));
        let event = client.handle_frame(br#"{"type":"GRID_REFRESH","data":[[0]]}"#);
        assert_eq!(event, Some(GridEvent::Snapshot(vec![vec![0]])));
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let t0 = Instant::now();
        let mut client = client();
        client.start(t0);
        client.handle_open();
        assert_eq!(client.handle_frame(b"{not json"), None);
        assert_eq!(client.handle_frame(br#"{"type":"NOPE","data":1}"#), None);
        assert_eq!(client.frames_dropped(), 2);
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[test]
    fn backoff_grows_linearly_then_gives_up() {
        let t0 = Instant::now();
        let mut client = client();
        client.start(t0);
        client.handle_open();

        let mut now = t0;
        for attempt in 1..=5 {
            assert_eq!(
                client.handle_closed(now),
                Some(ConnectionState::Closed { attempt })
            );
            let deadline = client.next_deadline().unwrap();
            assert_eq!(deadline - now, secs(attempt as u64));
            assert!(client.poll(deadline - Duration::from_millis(1)).is_empty());
            now = deadline;
            assert_eq!(client.poll(now), vec![ConnectionState::Connecting { attempt }]);
        }
        assert_eq!(client.handle_closed(now), Some(ConnectionState::Disconnected));
        assert_eq!(client.next_deadline(), None);
        assert_eq!(client.transport().connects, 6);
        assert_eq!(client.handle_closed(now), None);
    }

    #[test]
    fn successful_open_resets_attempts() {
        let t0 = Instant::now();
        let mut client = client();
        client.start(t0);
        client.handle_closed(t0);
        client.handle_closed(t0);
        let _ = client.poll(t0 + secs(1));
        client.handle_closed(t0 + secs(1));
        let deadline = client.next_deadline().unwrap();
        assert_eq!(deadline - (t0 + secs(1)), secs(2));
        client.poll(deadline);
        client.handle_open();
        assert_eq!(
            client.handle_closed(deadline),
            Some(ConnectionState::Closed { attempt: 1 })
        );
    }

    #[test]
    fn refused_connect_schedules_retry_immediately() {
        let t0 = Instant::now();
        let mut client = StreamClient::new(
            FakeTransport {
                refuse: true,
                ..FakeTransport::default()
            },
            "test",
            ReconnectPolicy::default(),
        );
        assert_eq!(
            client.start(t0),
            vec![
                ConnectionState::Connecting { attempt: 0 },
                ConnectionState::Closed { attempt: 1 },
            ]
        );
        assert_eq!(client.next_deadline(), Some(t0 + secs(1)));
    }

    #[test]
    fn placement_only_sent_while_open() {
        let t0 = Instant::now();
        let mut client = client();
        assert!(!client.send_placement(Pixel::new(0, 0, 1)));
        client.start(t0);
        assert!(!client.send_placement(Pixel::new(0, 0, 1)));
        client.handle_open();
        assert!(client.send_placement(Pixel::new(4, 7, 2)));
        assert_eq!(
            client.transport().sent,
            vec![r#"{"type":"UPDATE","data":{"x":4,"y":7,"color":2}}"#.to_string()]
        );
    }

    #[test]
    fn shutdown_cancels_retry_and_closes_once() {
        let t0 = Instant::now();
        let mut client = client();
        client.start(t0);
        client.handle_closed(t0);
        assert!(client.next_deadline().is_some());
        assert_eq!(client.shutdown(), Some(ConnectionState::Stopped));
        assert_eq!(client.shutdown(), None);
        assert_eq!(client.next_deadline(), None);
        assert!(client.poll(t0 + secs(60)).is_empty());
        assert_eq!(client.transport().closed, 1);
        assert_eq!(client.handle_frame(br#"{"type":"GRID_REFRESH","data":[]}"#), None);
    }
}
