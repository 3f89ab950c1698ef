// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

//! Async emulator network access client
//!
//! One TCP connection per client. Commands are written in order; a reader
//! task decodes replies and tags each one with the oldest pending command,
//! since the server answers strictly in order. Replies and the final
//! disconnect are delivered through [`EmuClient::next_event`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::{check_binary_len, ClientCodec};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::memory::{parse_regions, Address, MemoryRegion};
use crate::network::format_host_port;
use crate::protocol::{Command, CommandKind, Reply};

/// Something that happened on the connection
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A reply, tagged with the command it answers
    Reply(Reply),
    /// The connection ended; `error` is `None` only for a local disconnect
    Disconnected { error: Option<String> },
}

type PendingQueue = Arc<Mutex<VecDeque<CommandKind>>>;

struct Connection {
    writer: FramedWrite<OwnedWriteHalf, ClientCodec>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    reader: JoinHandle<()>,
    peer: String,
}

/// Client for one emulator connection
pub struct EmuClient {
    config: ClientConfig,
    connection: Option<Connection>,
    pending: PendingQueue,
    last_error: Option<String>,
}

impl EmuClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            last_error: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Last connection error, cleared by a successful connect
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Address of the connected emulator
    pub fn peer(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.peer.as_str())
    }

    /// Commands sent whose reply hasn't arrived yet
    pub fn pending_replies(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Connect, waiting at most the configured connect timeout
    pub async fn connect_to_host(&mut self, host: &str, port: u16) -> Result<()> {
        if self.is_connected() {
            self.disconnect_from_host().await;
        }

        let address = format_host_port(host, port);
        info!("Connecting to emulator at {}", address);

        let stream = match timeout(self.config.connect_timeout(), TcpStream::connect(&address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.remember(Error::Io(e))),
            Err(_) => return Err(self.remember(Error::ConnectTimeout(address))),
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        lock(&self.pending).clear();
        let reader = tokio::spawn(read_replies(read_half, self.pending.clone(), event_tx));

        self.connection = Some(Connection {
            writer: FramedWrite::new(write_half, ClientCodec),
            events: event_rx,
            reader,
            peer: address.clone(),
        });
        self.last_error = None;
        info!("Connected to emulator at {}", address);
        Ok(())
    }

    /// Close the connection; no `Disconnected` event is produced
    pub async fn disconnect_from_host(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.writer.close().await {
                debug!("Error while closing connection: {}", e);
            }
            connection.reader.abort();
            info!("Disconnected from {}", connection.peer);
        }
        lock(&self.pending).clear();
        self.last_error = None;
    }

    /// Queue a command; its reply arrives later through [`next_event`](Self::next_event)
    pub async fn send(&mut self, command: Command) -> Result<()> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(Error::NotConnected);
        };

        if let Some(data) = &command.data {
            check_binary_len(data.len())?;
        }

        debug!("Sending command: {}", command.line());
        lock(&self.pending).push_back(command.kind);

        if let Err(e) = connection.writer.send(command).await {
            let message = error_message(&e);
            warn!("Failed to send command: {}", message);
            self.teardown(Some(message));
            return Err(e);
        }
        Ok(())
    }

    /// Wait for the next event; `None` when not connected
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        let connection = self.connection.as_mut()?;
        let event = connection.events.recv().await.unwrap_or(ClientEvent::Disconnected {
            error: Some("reply reader stopped".to_string()),
        });

        if let ClientEvent::Disconnected { error } = &event {
            self.teardown(error.clone());
        }
        Some(event)
    }

    /// Wait for the next reply
    pub async fn read_reply(&mut self) -> Result<Reply> {
        match self.next_event().await {
            Some(ClientEvent::Reply(reply)) => Ok(reply),
            Some(ClientEvent::Disconnected { error }) => Err(Error::Closed(
                error.unwrap_or_else(|| "connection closed".to_string()),
            )),
            None => Err(Error::NotConnected),
        }
    }

    /// Send a command and wait for its reply, skipping replies to earlier commands
    pub async fn request(&mut self, command: Command) -> Result<Reply> {
        let kind = command.kind;
        self.send(command).await?;

        let reply_timeout = self.config.reply_timeout();
        loop {
            let reply = match timeout(reply_timeout, self.read_reply()).await {
                Ok(reply) => reply?,
                Err(_) => return Err(Error::ReplyTimeout(kind.to_string())),
            };
            if reply.command == Some(kind) && self.pending_replies() == 0 {
                return Ok(reply);
            }
            debug!("Skipping reply to earlier command {:?}", reply.command);
        }
    }

    pub async fn cmd_emu_info(&mut self) -> Result<()> {
        self.send(Command::emu_info()).await
    }

    pub async fn cmd_emu_status(&mut self) -> Result<()> {
        self.send(Command::emu_status()).await
    }

    pub async fn cmd_emu_reset(&mut self) -> Result<()> {
        self.send(Command::emu_reset()).await
    }

    pub async fn cmd_emu_stop(&mut self) -> Result<()> {
        self.send(Command::emu_stop()).await
    }

    pub async fn cmd_emu_pause(&mut self) -> Result<()> {
        self.send(Command::emu_pause()).await
    }

    pub async fn cmd_emu_resume(&mut self) -> Result<()> {
        self.send(Command::emu_resume()).await
    }

    pub async fn cmd_emu_reload(&mut self) -> Result<()> {
        self.send(Command::emu_reload()).await
    }

    pub async fn cmd_load_game(&mut self, path: &str) -> Result<()> {
        self.send(Command::load_game(path)).await
    }

    pub async fn cmd_game_info(&mut self) -> Result<()> {
        self.send(Command::game_info()).await
    }

    pub async fn cmd_cores_list(&mut self, platform: Option<&str>) -> Result<()> {
        self.send(Command::cores_list(platform)).await
    }

    pub async fn cmd_core_info(&mut self, core: &str) -> Result<()> {
        self.send(Command::core_info(core)).await
    }

    pub async fn cmd_core_current_info(&mut self) -> Result<()> {
        self.send(Command::core_current_info()).await
    }

    /// An empty name unloads the current core
    pub async fn cmd_load_core(&mut self, core: &str) -> Result<()> {
        self.send(Command::load_core(core)).await
    }

    pub async fn cmd_core_memories(&mut self) -> Result<()> {
        self.send(Command::core_memories()).await
    }

    pub async fn cmd_core_reset(&mut self) -> Result<()> {
        self.send(Command::core_reset()).await
    }

    pub async fn cmd_debug_break(&mut self) -> Result<()> {
        self.send(Command::debug_break()).await
    }

    pub async fn cmd_debug_continue(&mut self) -> Result<()> {
        self.send(Command::debug_continue()).await
    }

    pub async fn cmd_my_name_is(&mut self, name: &str) -> Result<()> {
        self.send(Command::my_name_is(name)).await
    }

    /// Read any number of regions in one request
    pub async fn cmd_core_read_memory(&mut self, memory: &str, regions: &[MemoryRegion]) -> Result<()> {
        self.send(Command::core_read(memory, regions)).await
    }

    /// Read a single region; `None` offset starts at 0, `None` length reads to the end
    pub async fn cmd_core_read_range(
        &mut self,
        memory: &str,
        offset: Option<Address>,
        length: Option<u32>,
    ) -> Result<()> {
        self.cmd_core_read_memory(memory, &[MemoryRegion::new(offset, length)])
            .await
    }

    /// Read regions given as text, e.g. `$231c;1;$231b;2`
    pub async fn cmd_core_read_memory_text(&mut self, memory: &str, addresses: &str) -> Result<()> {
        let regions = parse_regions(addresses)?;
        self.cmd_core_read_memory(memory, &regions).await
    }

    /// Write `data` across `regions`, consumed in order
    pub async fn cmd_core_write_memory(
        &mut self,
        memory: &str,
        data: Vec<u8>,
        regions: &[MemoryRegion],
    ) -> Result<()> {
        self.send(Command::core_write(memory, regions, data)).await
    }

    /// Write `data` at one offset (`None` writes from the start)
    pub async fn cmd_core_write_at(
        &mut self,
        memory: &str,
        data: Vec<u8>,
        offset: Option<Address>,
    ) -> Result<()> {
        let regions = match offset {
            Some(offset) => vec![MemoryRegion::new(Some(offset), None)],
            None => Vec::new(),
        };
        self.cmd_core_write_memory(memory, data, &regions).await
    }

    /// Write several `(offset, bytes)` chunks in one request, in the given order
    pub async fn cmd_core_write_chunks(&mut self, memory: &str, chunks: &[(u32, Vec<u8>)]) -> Result<()> {
        let regions: Vec<MemoryRegion> = chunks
            .iter()
            .map(|(offset, bytes)| MemoryRegion::at(*offset, bytes.len() as u32))
            .collect();
        let data: Vec<u8> = chunks.iter().flat_map(|(_, bytes)| bytes.iter().copied()).collect();
        self.cmd_core_write_memory(memory, data, &regions).await
    }

    /// Write with regions given as text, e.g. `$231c;1;$231b;3`
    pub async fn cmd_core_write_memory_text(
        &mut self,
        memory: &str,
        data: Vec<u8>,
        addresses: &str,
    ) -> Result<()> {
        let regions = parse_regions(addresses)?;
        self.cmd_core_write_memory(memory, data, &regions).await
    }

    fn remember(&mut self, err: Error) -> Error {
        let message = error_message(&err);
        warn!("Connection error: {}", message);
        self.last_error = Some(message);
        err
    }

    fn teardown(&mut self, error: Option<String>) {
        if let Some(connection) = self.connection.take() {
            connection.reader.abort();
            match &error {
                Some(e) => info!("Connection to {} lost: {}", connection.peer, e),
                None => info!("Connection to {} closed", connection.peer),
            }
        }
        lock(&self.pending).clear();
        self.last_error = error;
    }
}

/// Error text for the status line; IO errors are shown without the wrapper prefix
fn error_message(err: &Error) -> String {
    match err {
        Error::Io(e) => e.to_string(),
        other => other.to_string(),
    }
}

fn lock(pending: &PendingQueue) -> MutexGuard<'_, VecDeque<CommandKind>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_replies(
    read_half: OwnedReadHalf,
    pending: PendingQueue,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut frames = FramedRead::new(read_half, ClientCodec);

    let error = loop {
        match frames.next().await {
            Some(Ok(frame)) => {
                let command = lock(&pending).pop_front();
                if command.is_none() {
                    warn!("Received a reply with no command pending");
                }
                let reply = Reply::from_frame(command, frame);
                debug!("Reply: {:?}", reply);
                if events.send(ClientEvent::Reply(reply)).is_err() {
                    return;
                }
            }
            Some(Err(e)) => break error_message(&e),
            None => break "remote host closed the connection".to_string(),
        }
    };

    let _ = events.send(ClientEvent::Disconnected { error: Some(error) });
}
