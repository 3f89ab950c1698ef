// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

// emunwa mock server - TCP listener
// Accepts connections and answers each request from the shared emulator

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use emunwa_common::{ErrorKind, ReplyFrame, ServerCodec};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::emulator::MockEmulator;

pub type SharedEmulator = Arc<Mutex<MockEmulator>>;

pub struct MockServer {
    listener: TcpListener,
    emulator: SharedEmulator,
}

impl MockServer {
    /// Bind the listener; use port 0 to let the OS pick one
    pub async fn bind(address: &str, emulator: MockEmulator) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind to {}", address))?;
        Ok(Self {
            listener,
            emulator: Arc::new(Mutex::new(emulator)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn emulator(&self) -> SharedEmulator {
        self.emulator.clone()
    }

    /// Serve until the task is dropped
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Mock emulator listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let emulator = self.emulator.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, emulator).await {
                                    warn!("Connection {} ended with error: {:#}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    emulator: SharedEmulator,
) -> Result<()> {
    info!("Client connected: {}", peer);
    let mut framed = Framed::new(stream, ServerCodec);

    while let Some(request) = framed.next().await {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                // The stream can't be resynchronized after a framing error
                warn!("Protocol error from {}: {}", peer, e);
                framed
                    .send(ReplyFrame::error(ErrorKind::ProtocolError, e.to_string()))
                    .await?;
                break;
            }
        };

        let reply = emulator.lock().await.execute(&request);
        if let ReplyFrame::Ascii(lines) = &reply {
            if lines.first().is_some_and(|l| l.starts_with("error:")) {
                debug!("{} -> {:?}", request.keyword, lines);
            }
        }
        framed.send(reply).await?;
    }

    info!("Client disconnected: {}", peer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_raw_exchange() {
        let server = MockServer::bind("127.0.0.1:0", MockEmulator::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"EMU_STATUS\n").await.unwrap();

        let expected = b"\nstate:stopped\n\n";
        let mut buf = vec![0u8; expected.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_framing_error_closes_connection() {
        let server = MockServer::bind("127.0.0.1:0", MockEmulator::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"bCORE_WRITE WRAM\nXXXXX")
            .await
            .unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        assert!(reply.starts_with(b"\nerror:protocol_error\n"));
    }
}
