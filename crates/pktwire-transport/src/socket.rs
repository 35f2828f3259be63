//! TCP and UDP socket transport.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::registry::{HandleRegistry, HandleSlot, lock, new_slot};
use crate::{SocketConfig, Transport, TransportError};

/// Open sockets, keyed by `"<mode>:<address>"`.
static SOCKETS: Lazy<HandleRegistry<Session>> = Lazy::new(|| HandleRegistry::new("socket"));

/// How often a TCP server polls its listener while waiting for a client.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Largest UDP payload we accept.
const MAX_DATAGRAM: usize = 65_536;

/// Keys of every socket currently owned by a transport.
pub fn open_sockets() -> Vec<String> {
    SOCKETS.keys()
}

/// Which socket role a [`SocketTransport`] plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    Udp,
    TcpServer,
    TcpClient,
}

impl SocketMode {
    /// Picks the mode from which addresses are configured.
    pub fn select(config: &SocketConfig) -> Result<Self, TransportError> {
        match (&config.target, &config.host) {
            (Some(_), Some(_)) => Ok(Self::Udp),
            (None, Some(_)) => Ok(Self::TcpServer),
            (Some(_), None) => Ok(Self::TcpClient),
            (None, None) => Err(TransportError::InvalidOperation(
                "socket transport needs a target, a host, or both".to_string(),
            )),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::TcpServer => "tcp-server",
            Self::TcpClient => "tcp",
        }
    }
}

/// An open socket session.
#[derive(Debug)]
enum Session {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Session {
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.read(buf)
            }
            Self::Udp(socket) => {
                socket.set_read_timeout(Some(timeout))?;
                socket.recv(buf)
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.write_all(data),
            Self::Udp(socket) => {
                let sent = socket.send(data)?;
                if sent == data.len() {
                    Ok(())
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("datagram truncated to {sent} of {} bytes", data.len()),
                    ))
                }
            }
        }
    }

    /// Reads and discards whatever the OS has already buffered.
    fn drain(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 4096];
        self.set_nonblocking(true)?;
        let result = loop {
            let read = match self {
                Self::Tcp(stream) => stream.read(&mut scratch),
                Self::Udp(socket) => socket.recv(&mut scratch),
            };
            match read {
                Ok(0) if matches!(self, Self::Tcp(_)) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.set_nonblocking(false)?;
        result
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_nonblocking(nonblocking),
            Self::Udp(socket) => socket.set_nonblocking(nonblocking),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Tcp(stream) => stream.local_addr(),
            Self::Udp(socket) => socket.local_addr(),
        }
    }
}

fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    let connect_failed = |source| TransportError::ConnectFailed {
        addr: addr.to_string(),
        source,
    };
    addr.to_socket_addrs()
        .map_err(connect_failed)?
        .next()
        .ok_or_else(|| {
            connect_failed(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            ))
        })
}

// ---------------------------------------------------------------------------
// SocketTransport
// ---------------------------------------------------------------------------

/// A socket-backed [`Transport`].
///
/// - **UDP**: binds `host` on `connect` and exchanges datagrams with
///   `target` only.
/// - **TCP server**: binds and listens on `host` when created; `connect`
///   (or `accept`) waits up to the timeout for one client. One client is
///   served at a time.
/// - **TCP client**: `connect` opens a stream to `target`.
///
/// A read that times out closes the session.
#[derive(Debug)]
pub struct SocketTransport {
    mode: SocketMode,
    target: Option<SocketAddr>,
    host: Option<SocketAddr>,
    listener: Option<TcpListener>,
    slot: HandleSlot<Session>,
    key: Option<String>,
    peer: Option<SocketAddr>,
    rx: Vec<u8>,
    timeout: Duration,
}

impl SocketTransport {
    /// Resolves the configured addresses. A TCP server binds its listener
    /// here so its local address is known before the first client.
    pub fn new(config: SocketConfig) -> Result<Self, TransportError> {
        let mode = SocketMode::select(&config)?;
        let target = config.target.as_deref().map(resolve).transpose()?;
        let host = config.host.as_deref().map(resolve).transpose()?;

        let listener = if mode == SocketMode::TcpServer {
            let addr = host.ok_or_else(|| {
                TransportError::InvalidOperation("TCP server needs a host address".to_string())
            })?;
            let listener = TcpListener::bind(addr).map_err(TransportError::AcceptFailed)?;
            listener
                .set_nonblocking(true)
                .map_err(TransportError::AcceptFailed)?;
            let local = listener.local_addr().map_err(TransportError::AcceptFailed)?;
            tracing::info!(addr = %local, "socket transport listening");
            Some(listener)
        } else {
            None
        };

        Ok(Self {
            mode,
            target,
            host,
            listener,
            slot: new_slot(),
            key: None,
            peer: None,
            rx: Vec::new(),
            timeout: config.timeout,
        })
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// The bound address: the listener for a TCP server, the open session
    /// otherwise.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Some(listener) => listener.local_addr().ok(),
            None => lock(&self.slot).as_ref().and_then(|s| s.local_addr().ok()),
        }
    }

    /// The connected peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn claim(&mut self, addr: SocketAddr) {
        let key = format!("{}:{addr}", self.mode.prefix());
        SOCKETS.claim(&key, &self.slot);
        self.key = Some(key);
    }

    fn target(&self) -> Result<SocketAddr, TransportError> {
        self.target.ok_or_else(|| {
            TransportError::InvalidOperation(format!("{:?} socket has no target", self.mode))
        })
    }

    fn accept_next(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            self.close()?;
        }
        let listener = self.listener.as_ref().ok_or_else(|| {
            TransportError::InvalidOperation("socket is not listening".to_string())
        })?;
        let local = listener.local_addr().map_err(TransportError::AcceptFailed)?;

        let deadline = Instant::now() + self.timeout;
        let (stream, peer) = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout {
                            requested: 0,
                            received: Vec::new(),
                            timeout: self.timeout,
                        });
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(TransportError::AcceptFailed(e)),
            }
        };
        stream
            .set_nonblocking(false)
            .map_err(TransportError::AcceptFailed)?;
        stream.set_nodelay(true).map_err(TransportError::AcceptFailed)?;

        self.claim(local);
        *lock(&self.slot) = Some(Session::Tcp(stream));
        self.peer = Some(peer);
        tracing::debug!(%peer, "accepted connection");
        Ok(())
    }

    /// Closes the session and reports what was received before the timeout.
    fn timed_out(&mut self, requested: usize) -> TransportError {
        let received = std::mem::take(&mut self.rx);
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "close after timeout failed");
        }
        TransportError::Timeout {
            requested,
            received,
            timeout: self.timeout,
        }
    }
}

impl Transport for SocketTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        match self.mode {
            SocketMode::TcpServer => return self.accept_next(),
            _ if self.is_connected() => return Ok(()),
            _ => {}
        }

        let target = self.target()?;
        let session = match self.mode {
            SocketMode::TcpClient => {
                self.claim(target);
                let stream = TcpStream::connect_timeout(&target, self.timeout).map_err(|source| {
                    TransportError::ConnectFailed {
                        addr: target.to_string(),
                        source,
                    }
                })?;
                stream.set_nodelay(true).map_err(TransportError::SendFailed)?;
                Session::Tcp(stream)
            }
            SocketMode::Udp => {
                let host = self.host.ok_or_else(|| {
                    TransportError::InvalidOperation("UDP socket has no host".to_string())
                })?;
                if host.port() != 0 {
                    self.claim(host);
                }
                let connect_failed = |source| TransportError::ConnectFailed {
                    addr: host.to_string(),
                    source,
                };
                let socket = UdpSocket::bind(host).map_err(connect_failed)?;
                socket.connect(target).map_err(connect_failed)?;
                if host.port() == 0 {
                    let bound = socket.local_addr().map_err(connect_failed)?;
                    self.claim(bound);
                }
                Session::Udp(socket)
            }
            SocketMode::TcpServer => unreachable!("handled above"),
        };

        *lock(&self.slot) = Some(session);
        self.peer = Some(target);
        tracing::debug!(mode = ?self.mode, %target, "socket connected");
        Ok(())
    }

    fn accept(&mut self) -> Result<(), TransportError> {
        match self.mode {
            SocketMode::TcpServer => self.accept_next(),
            mode => Err(TransportError::InvalidOperation(format!(
                "accept is only valid on a TCP server, not {mode:?}"
            ))),
        }
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = vec![0u8; MAX_DATAGRAM];
        loop {
            if self.rx.len() >= n {
                return Ok(self.rx.drain(..n).collect());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(n));
            }

            let (received, is_stream) = {
                let mut slot = lock(&self.slot);
                let session = slot.as_mut().ok_or_else(|| {
                    TransportError::NotConnected(format!("{:?} socket has no session", self.mode))
                })?;
                let is_stream = matches!(session, Session::Tcp(_));
                (session.recv(&mut chunk, deadline - now), is_stream)
            };

            match received {
                Ok(0) if is_stream => {
                    let peer = self.peer.map(|p| p.to_string()).unwrap_or_default();
                    self.close()?;
                    return Err(TransportError::ConnectionClosed(peer));
                }
                Ok(count) => self.rx.extend_from_slice(&chunk[..count]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => {
                    self.close()?;
                    return Err(TransportError::ReceiveFailed(e));
                }
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut slot = lock(&self.slot);
        let session = slot.as_mut().ok_or_else(|| {
            TransportError::NotConnected(format!("{:?} socket has no session", self.mode))
        })?;
        session.send(data).map_err(TransportError::SendFailed)
    }

    /// Writes go straight to the socket, so `reset_tx` has nothing to drop.
    fn flush(&mut self, _reset_tx: bool) -> Result<(), TransportError> {
        self.rx.clear();
        if let Some(session) = lock(&self.slot).as_mut() {
            session.drain().map_err(TransportError::ReceiveFailed)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let session = lock(&self.slot).take();
        if let Some(key) = self.key.take() {
            SOCKETS.release(&key, &self.slot);
        }
        self.rx.clear();
        let peer = self.peer.take();
        if let Some(session) = session {
            if let Session::Tcp(stream) = &session {
                // The peer may already be gone.
                let _ = stream.shutdown(Shutdown::Both);
            }
            tracing::debug!(mode = ?self.mode, peer = ?peer, "socket closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.slot).is_some()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection() {
        assert_eq!(
            SocketMode::select(&SocketConfig::udp("127.0.0.1:0", "127.0.0.1:9")).unwrap(),
            SocketMode::Udp
        );
        assert_eq!(
            SocketMode::select(&SocketConfig::server("127.0.0.1:0")).unwrap(),
            SocketMode::TcpServer
        );
        assert_eq!(
            SocketMode::select(&SocketConfig::client("127.0.0.1:9")).unwrap(),
            SocketMode::TcpClient
        );
        assert!(matches!(
            SocketMode::select(&SocketConfig::default()),
            Err(TransportError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_accept_rejected_on_client() {
        let mut client = SocketTransport::new(SocketConfig::client("127.0.0.1:9")).unwrap();
        assert!(matches!(client.accept(), Err(TransportError::InvalidOperation(_))));
    }

    #[test]
    fn test_write_without_session_is_not_connected() {
        let mut client = SocketTransport::new(SocketConfig::client("127.0.0.1:9")).unwrap();
        assert!(matches!(client.write(&[1]), Err(TransportError::NotConnected(_))));
        assert!(matches!(client.read(1), Err(TransportError::NotConnected(_))));
    }

    #[test]
    fn test_server_accept_times_out() {
        let mut server = SocketTransport::new(
            SocketConfig::server("127.0.0.1:0").with_timeout(Duration::from_millis(30)),
        )
        .unwrap();
        assert!(server.local_addr().is_some());
        let err = server.connect().unwrap_err();
        assert!(err.is_timeout());
        assert!(!server.is_connected());
    }
}
