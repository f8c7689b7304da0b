//! TCP connection loop: accept, frame-decode, dispatch, frame-encode.
//!
//! All command state lives in a single `tokio::sync::Mutex<Engine>` shared
//! by every connection. Handlers in `dispatch` are synchronous, so the lock
//! is never held across an `.await` — one connection's command never blocks
//! on another connection's I/O.

use crate::dispatch::{Dispatcher, Engine, Outcome};
use crate::protocol::{Frame, FrameCodec, FrameError, ProtocolError};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to, e.g. `"127.0.0.1:31337"`.
    pub bind_addr: String,
    /// Maximum number of concurrent client connections; beyond this, new
    /// connections wait for a slot rather than being rejected.
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:31337".to_string(), max_clients: 1024 }
    }
}

/// How often the background task sweeps keys past their expiry deadline,
/// independent of the lazy per-access expiry check every read/write already
/// performs.
const EXPIRY_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// A running server handle. Cloning shares the same engine, dispatcher, and
/// shutdown channel.
#[derive(Clone)]
pub struct Server {
    config: ServerConfig,
    engine: Arc<Mutex<Engine>>,
    dispatcher: Arc<Dispatcher>,
    client_slots: Arc<Semaphore>,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown, _) = tokio::sync::broadcast::channel(1);
        let client_slots = Arc::new(Semaphore::new(config.max_clients));
        Self {
            config,
            engine: Arc::new(Mutex::new(Engine::default())),
            dispatcher: Arc::new(Dispatcher::new()),
            client_slots,
            shutdown,
        }
    }

    /// Register an additional command at runtime, before or after `run()`
    /// is called — existing connections see it on their next dispatch.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn engine(&self) -> Arc<Mutex<Engine>> {
        self.engine.clone()
    }

    /// Bind and serve until a shutdown is requested (via `SHUTDOWN` command
    /// or [`Server::shutdown`]).
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("kvault listening on {}", self.config.bind_addr);

        let sweep_engine = self.engine.clone();
        let mut sweep_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = sweep_engine.lock().await.store.sweep_expired();
                        if removed > 0 {
                            debug!("swept {removed} expired key(s)");
                        }
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let engine = self.engine.clone();
                            let dispatcher = self.dispatcher.clone();
                            let client_slots = self.client_slots.clone();
                            let shutdown_tx = self.shutdown.clone();

                            tokio::spawn(async move {
                                let _permit = client_slots.acquire().await;
                                {
                                    let mut e = engine.lock().await;
                                    e.stats.active_connections += 1;
                                    e.stats.connections += 1;
                                }
                                info!("connection received: {peer_addr}");

                                match handle_connection(stream, engine.clone(), dispatcher).await {
                                    Ok(ConnectionEnd::ClientQuit) => info!("client exited: {peer_addr}"),
                                    Ok(ConnectionEnd::Eof) => info!("client went away: {peer_addr}"),
                                    Ok(ConnectionEnd::Shutdown) => {
                                        info!("shutdown requested by {peer_addr}");
                                        let _ = shutdown_tx.send(());
                                    }
                                    Err(e) => error!("connection {peer_addr} error: {e}"),
                                }

                                let mut e = engine.lock().await;
                                e.stats.active_connections -= 1;
                            });
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

enum ConnectionEnd {
    Eof,
    ClientQuit,
    Shutdown,
}

/// Read-decode-dispatch-encode loop for one client connection.
async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    engine: Arc<Mutex<Engine>>,
    dispatcher: Arc<Dispatcher>,
) -> Result<ConnectionEnd, ProtocolError> {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    debug!("received frame: {frame:?}");
                    let outcome = {
                        let mut e = engine.lock().await;
                        dispatcher.dispatch(&mut e, frame)
                    };

                    let (reply, end) = match outcome {
                        Outcome::Reply(f) => (f, None),
                        Outcome::Quit(f) => (f, Some(ConnectionEnd::ClientQuit)),
                        Outcome::Shutdown(f) => (f, Some(ConnectionEnd::Shutdown)),
                    };

                    let mut out = BytesMut::new();
                    codec.encode(reply, &mut out)?;
                    stream.write_all(&out).await?;
                    stream.flush().await?;

                    if let Some(end) = end {
                        return Ok(end);
                    }
                }
                Ok(None) => break,
                Err(err @ FrameError::InvalidUtf8(_))
                | Err(err @ FrameError::InvalidJson(_))
                | Err(err @ FrameError::BadInteger(_))
                | Err(err @ FrameError::BadLength(_))
                | Err(err @ FrameError::EmbeddedNewline) => {
                    warn!("malformed frame from client, closing connection: {err}");
                    {
                        let mut e = engine.lock().await;
                        e.stats.command_errors += 1;
                    }
                    let mut out = BytesMut::new();
                    codec.encode(Frame::error(err.to_string()), &mut out)?;
                    stream.write_all(&out).await?;
                    stream.flush().await?;
                    return Ok(ConnectionEnd::Eof);
                }
                Err(FrameError::Io(e)) => return Err(ProtocolError::Io(e)),
            }
        }

        match stream.read_buf(&mut buf).await {
            Ok(0) => return Ok(ConnectionEnd::Eof),
            Ok(_) => {}
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default_matches_documented_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_clients, 1024);
        assert_eq!(config.bind_addr, "127.0.0.1:31337");
    }

    #[tokio::test]
    async fn end_to_end_set_get_over_tcp() {
        let server = Server::new(ServerConfig { bind_addr: "127.0.0.1:0".to_string(), max_clients: 8 });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ServerConfig::default();
        config.bind_addr = addr.to_string();
        config.max_clients = 8;
        let server = Server::new(config);
        let running = server.clone();
        let handle = tokio::spawn(async move {
            let _ = running.run().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n:5\r\n").await.unwrap();
        let mut resp = [0u8; 64];
        let n = client.read(&mut resp).await.unwrap();
        assert_eq!(&resp[..n], b":1\r\n");

        client.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();
        let n = client.read(&mut resp).await.unwrap();
        assert_eq!(&resp[..n], b":5\r\n");

        server.shutdown();
        let _ = handle.await;
        let _ = server;
    }

    #[tokio::test]
    async fn add_command_is_reachable_after_a_client_has_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ServerConfig::default();
        config.bind_addr = addr.to_string();
        let server = Server::new(config);
        let running = server.clone();
        let handle = tokio::spawn(async move {
            let _ = running.run().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Force the dispatcher's Arc to be cloned into a connection task
        // before registering the extension command.
        let mut warm_up = tokio::net::TcpStream::connect(addr).await.unwrap();
        warm_up.write_all(b"*1\r\n$4\r\nINFO\r\n").await.unwrap();
        let mut scratch = [0u8; 256];
        let _ = warm_up.read(&mut scratch).await.unwrap();

        server.dispatcher().add_command("PING", |_e, _a| Ok(Outcome::Reply(Frame::Simple("PONG".into()))));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut resp = [0u8; 64];
        let n = client.read(&mut resp).await.unwrap();
        assert_eq!(&resp[..n], b"+PONG\r\n");

        server.shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn malformed_frame_gets_an_error_reply_before_the_connection_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ServerConfig::default();
        config.bind_addr = addr.to_string();
        let server = Server::new(config);
        let running = server.clone();
        let handle = tokio::spawn(async move {
            let _ = running.run().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"$abc\r\nxyz\r\n").await.unwrap();
        let mut resp = [0u8; 128];
        let n = client.read(&mut resp).await.unwrap();
        assert_eq!(resp[0], b'-');

        let n2 = client.read(&mut resp).await.unwrap_or(0);
        assert_eq!(n2, 0, "connection should be closed after the error reply");
        let _ = n;

        server.shutdown();
        let _ = handle.await;
    }
}
