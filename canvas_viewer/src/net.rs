use canvas_core::{Transport, TransportError};
use canvas_proto::{encode_frame, FrameDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCommand {
    Connect(String),
    Send(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Opened,
    Frame(Vec<u8>),
    Closed { reason: String },
}

/// [`Transport`] that forwards requests to the connection manager task.
pub struct ChannelTransport {
    commands: UnboundedSender<NetCommand>,
}

impl ChannelTransport {
    pub fn new(commands: UnboundedSender<NetCommand>) -> Self {
        Self { commands }
    }
}

impl Transport for ChannelTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.commands
            .send(NetCommand::Connect(endpoint.to_string()))
            .map_err(|_| TransportError::WorkerGone)
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.commands
            .send(NetCommand::Send(text.to_string()))
            .map_err(|_| TransportError::WorkerGone)
    }

    fn close(&mut self) {
        let _ = self.commands.send(NetCommand::Close);
    }
}

/// Owns the TCP socket. Runs until every command sender is dropped.
pub async fn run_connection_manager(
    mut commands: UnboundedReceiver<NetCommand>,
    events: UnboundedSender<NetEvent>,
) {
    let (closed_tx, mut closed_rx) = unbounded_channel::<(u64, String)>();
    let mut generation = 0u64;
    let mut writer: Option<OwnedWriteHalf> = None;
    let mut reader: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    NetCommand::Connect(endpoint) => {
                        drop_connection(&mut writer, &mut reader);
                        generation += 1;
                        match TcpStream::connect(&endpoint).await {
                            Ok(stream) => {
                                info!(%endpoint, "net.connected");
                                let _ = stream.set_nodelay(true);
                                let (read_half, write_half) = stream.into_split();
                                writer = Some(write_half);
                                let _ = events.send(NetEvent::Opened);
                                reader = Some(tokio::spawn(pump_frames(
                                    read_half,
                                    generation,
                                    events.clone(),
                                    closed_tx.clone(),
                                )));
                            }
                            Err(err) => {
                                warn!(%endpoint, error = %err, "net.connect_failed");
                                let _ = events.send(NetEvent::Closed { reason: err.to_string() });
                            }
                        }
                    }
                    NetCommand::Send(text) => {
                        let Some(stream) = writer.as_mut() else {
                            debug!("net.send_without_connection");
                            continue;
                        };
                        if let Err(err) = stream.write_all(&encode_frame(text.as_bytes())).await {
                            warn!(error = %err, "net.send_failed");
                            drop_connection(&mut writer, &mut reader);
                            let _ = events.send(NetEvent::Closed { reason: err.to_string() });
                        }
                    }
                    NetCommand::Close => drop_connection(&mut writer, &mut reader),
                }
            }
            Some((closed_generation, reason)) = closed_rx.recv() => {
                if closed_generation == generation && writer.is_some() {
                    drop_connection(&mut writer, &mut reader);
                    let _ = events.send(NetEvent::Closed { reason });
                }
            }
        }
    }

    drop_connection(&mut writer, &mut reader);
    debug!("net.manager_stopped");
}

fn drop_connection(writer: &mut Option<OwnedWriteHalf>, reader: &mut Option<JoinHandle<()>>) {
    writer.take();
    if let Some(handle) = reader.take() {
        handle.abort();
    }
}

async fn pump_frames(
    mut stream: OwnedReadHalf,
    generation: u64,
    events: UnboundedSender<NetEvent>,
    closed: UnboundedSender<(u64, String)>,
) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let reason = 'read: loop {
        let read = match stream.read(&mut chunk).await {
            Ok(0) => break 'read "server closed the connection".to_string(),
            Ok(read) => read,
            Err(err) => break 'read err.to_string(),
        };
        decoder.push(&chunk[..read]);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    trace!(len = frame.len(), "net.frame");
                    if events.send(NetEvent::Frame(frame)).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => break 'read err.to_string(),
            }
        }
    };
    let _ = closed.send((generation, reason));
}
