//! Line-socket listener
//!
//! Request/reply over TCP with newline framing: each request is one line
//! and each reply is one line. Connections are served concurrently, but
//! every connection is strictly synchronous; see [`Session`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use super::connection::{ConnectionConfig, ConnectionManager};
use super::error::NetworkError;
use super::session::Session;
use crate::context::ServiceContext;
use crate::protocol::{self, Reply};

/// TCP listener for period and JSON-RPC requests
///
/// # Example
///
/// ```rust,no_run
/// use lumen_tsdb::network::{ConnectionConfig, SocketListener};
/// use std::net::SocketAddr;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let addr: SocketAddr = "0.0.0.0:5555".parse()?;
/// let listener = SocketListener::bind(addr, ConnectionConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct SocketListener {
    /// Underlying tokio TCP listener
    listener: TokioTcpListener,
    /// Local address the listener is bound to
    local_addr: SocketAddr,
    /// Connection configuration
    config: ConnectionConfig,
}

#[derive(Serialize)]
struct ViolationFrame<'a> {
    error: &'a str,
    kind: &'a str,
}

fn violation_frame(kind: &str, message: &str) -> Vec<u8> {
    let mut frame = serde_json::to_vec(&ViolationFrame {
        error: message,
        kind,
    })
    .unwrap_or_else(|_| br#"{"error":"connection closed","kind":"Internal"}"#.to_vec());
    frame.push(b'\n');
    frame
}

impl SocketListener {
    /// Bind a new listener to the specified address
    ///
    /// # Socket Options
    ///
    /// - `SO_REUSEADDR`: Allow quick restart after crash
    /// - `SO_REUSEPORT`: Allow multiple listeners on same port (if enabled)
    pub async fn bind(addr: SocketAddr, config: ConnectionConfig) -> Result<Self, NetworkError> {
        config.validate()?;
        let socket = Self::create_socket(addr, &config)?;

        let std_listener: std::net::TcpListener = socket.into();
        std_listener.set_nonblocking(true)?;

        let listener =
            TokioTcpListener::from_std(std_listener).map_err(|e| NetworkError::BindFailed {
                addr,
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Line socket bound");

        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    fn create_socket(addr: SocketAddr, config: &ConnectionConfig) -> Result<Socket, NetworkError> {
        let bind_failed = |what: &str, e: io::Error| NetworkError::BindFailed {
            addr,
            reason: format!("{}: {}", what, e),
        };

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| bind_failed("Failed to create socket", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| bind_failed("Failed to set SO_REUSEADDR", e))?;

        #[cfg(unix)]
        if config.so_reuseport {
            socket
                .set_reuse_port(true)
                .map_err(|e| bind_failed("Failed to set SO_REUSEPORT", e))?;
        }
        #[cfg(not(unix))]
        let _ = config;

        socket
            .bind(&addr.into())
            .map_err(|e| bind_failed("Failed to bind", e))?;
        socket
            .listen(1024)
            .map_err(|e| bind_failed("Failed to listen", e))?;

        Ok(socket)
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop until a shutdown signal arrives
    ///
    /// In-flight connections are allowed to finish their current request.
    pub async fn run(
        self,
        ctx: Arc<ServiceContext>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), NetworkError> {
        info!(addr = %self.local_addr, "Starting line socket accept loop");

        let conn_manager = Arc::new(ConnectionManager::new(&self.config));
        let config = Arc::new(self.config);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(addr = %self.local_addr, "Line socket shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // EMFILE, ENOMEM and friends: back off briefly
                            error!(error = %e, "Accept error");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            continue;
                        }
                    };

                    let slot = match conn_manager.try_acquire(peer_addr.ip()) {
                        Ok(slot) => slot,
                        Err(e) => {
                            debug!(peer = %peer_addr, error = %e, "Connection rejected");
                            let _ = stream.try_write(&violation_frame("ConnectionLimit", &e.to_string()));
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(config.tcp_nodelay) {
                        warn!(peer = %peer_addr, error = %e, "Failed to configure socket");
                    }

                    let ctx = Arc::clone(&ctx);
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        let result = handle_connection(stream, peer_addr, ctx, &config).await;
                        match result {
                            Err(e) if !e.is_normal_close() => {
                                debug!(peer = %peer_addr, error = %e, "Connection ended");
                            }
                            _ => trace!(peer = %peer_addr, "Connection closed"),
                        }
                        drop(slot);
                    });
                }
            }
        }

        Ok(())
    }
}

/// Serve one connection until it closes
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServiceContext>,
    config: &ConnectionConfig,
) -> Result<(), NetworkError> {
    trace!(peer = %peer_addr, "Handling connection");

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut session = Session::new(peer_addr);
    let mut buf = Vec::new();
    let limit = config.max_line_length as u64 + 1;

    while session.is_open() {
        buf.clear();
        let read = timeout(
            config.idle_timeout,
            (&mut reader).take(limit).read_until(b'\n', &mut buf),
        )
        .await;

        match read {
            Ok(Ok(0)) => {
                session.close();
                return Err(NetworkError::ConnectionClosed { peer: peer_addr });
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(NetworkError::Io(e)),
            Err(_) => {
                debug!(peer = %peer_addr, "Connection idle timeout");
                return Err(NetworkError::Timeout {
                    duration_ms: config.idle_timeout.as_millis() as u64,
                });
            }
        }

        if !buf.ends_with(b"\n") && buf.len() > config.max_line_length {
            let err = NetworkError::LineTooLong {
                length: buf.len(),
                max: config.max_line_length,
            };
            warn!(peer = %peer_addr, error = %err, "Closing connection");
            send_frame(&mut writer, &violation_frame("LineTooLong", &err.to_string())).await?;
            return Err(err);
        }

        session.begin_request()?;
        let line = String::from_utf8_lossy(&buf).into_owned();

        let reply = {
            let respond = protocol::respond(&ctx, &line);
            tokio::pin!(respond);

            tokio::select! {
                biased;

                pending = reader.fill_buf() => match pending {
                    Ok(bytes) if !bytes.is_empty() => None,
                    _ => Some(respond.await),
                },
                reply = &mut respond => Some(reply),
            }
        };

        let Some(reply) = reply else {
            let err = session
                .begin_request()
                .err()
                .unwrap_or_else(|| NetworkError::ProtocolViolation {
                    peer: peer_addr,
                    reason: "pipelined request".to_string(),
                });
            warn!(peer = %peer_addr, error = %err, "Protocol violation, closing connection");
            send_frame(
                &mut writer,
                &violation_frame("ProtocolViolation", &err.to_string()),
            )
            .await?;
            return Err(err);
        };

        write_reply(&mut writer, &reply).await?;
        session.finish_reply()?;
        trace!(
            peer = %peer_addr,
            kind = ?reply.kind,
            success = reply.success,
            "Reply sent"
        );
    }

    Ok(())
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    writer.write_all(reply.line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn send_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ReducerRegistry;
    use crate::context::FixedClock;
    use crate::query::QueryService;
    use crate::storage::InMemoryStore;
    use crate::types::Device;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpStream as TokioTcpStream;

    fn context() -> Arc<ServiceContext> {
        let store = InMemoryStore::new();
        store.register_device(Device::new("lamp", 0.0, 0.0)).unwrap();
        let query = QueryService::new(Arc::new(store), ReducerRegistry::builtin());
        Arc::new(ServiceContext::new(
            query,
            Arc::new(FixedClock::new(7 * 86_400)),
        ))
    }

    async fn start(config: ConnectionConfig) -> (SocketAddr, broadcast::Sender<()>) {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = SocketListener::bind(addr, config).await.unwrap();
        let bound = listener.local_addr();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(listener.run(context(), shutdown_rx));
        (bound, shutdown_tx)
    }

    #[tokio::test]
    async fn test_listener_bind() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = SocketListener::bind(addr, ConnectionConfig::default())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ConnectionConfig {
            max_line_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            SocketListener::bind(addr, config).await,
            Err(NetworkError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (addr, shutdown_tx) = start(ConnectionConfig::default()).await;

        let stream = TokioTcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"lamp/weekly\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(reply, "[0.0,0.0,0.0,0.0,0.0,0.0,0.0]");

        writer.write_all(b"ghost/daily\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert!(reply.contains("UnknownDevice"));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_line_too_long_closes() {
        let config = ConnectionConfig {
            max_line_length: 16,
            ..Default::default()
        };
        let (addr, shutdown_tx) = start(config).await;

        let stream = TokioTcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"a-very-long-device-identifier/daily\n")
            .await
            .unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert!(reply.contains("LineTooLong"));
        assert!(!matches!(lines.next_line().await, Ok(Some(_))));

        let _ = shutdown_tx.send(());
    }
}
