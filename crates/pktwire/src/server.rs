//! `PacketServer` builder and accept loop.
//!
//! The server owns one transport and runs on a dedicated thread. Each pass
//! of the loop connects (a TCP server waits for the next client, bounded by
//! its timeout), reads one packet, hands it to the handler, sends the
//! response back, and closes the connection. The only state shared with
//! the caller is the stop flag and the join handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use pktwire_protocol::{
    ChannelConfig, HeaderParams, PacketChannel, PacketTypeRegistry, ProtocolError,
};
use pktwire_record::ByteOrder;
use pktwire_transport::Transport;

use crate::{EchoHandler, PacketHandler, PktwireError};

/// Counters collected by the worker thread, returned by
/// [`PacketServer::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerReport {
    /// Sessions opened (accepted clients for a TCP server).
    pub connections: u64,
    /// Packets received and handed to the handler.
    pub packets: u64,
    /// Responses written back.
    pub responses: u64,
    /// Failed connects, receives, and sends. Idle timeouts are not counted.
    pub errors: u64,
}

/// Builder for configuring and starting a [`PacketServer`].
///
/// # Example
///
/// ```rust,ignore
/// let server = PacketServer::builder(transport, registry)
///     .byte_order(ByteOrder::Big)
///     .handler(|packet| Some(packet))
///     .start()?;
/// // ...
/// let report = server.stop()?;
/// ```
pub struct PacketServerBuilder<T: Transport + 'static> {
    transport: T,
    registry: Arc<PacketTypeRegistry>,
    config: ChannelConfig,
    handler: Box<dyn PacketHandler>,
    name: String,
}

impl<T: Transport + 'static> PacketServerBuilder<T> {
    pub fn new(transport: T, registry: Arc<PacketTypeRegistry>) -> Self {
        Self {
            transport,
            registry,
            config: ChannelConfig::default(),
            handler: Box::new(EchoHandler),
            name: "pktwire-server".to_string(),
        }
    }

    /// Sets the channel configuration (byte order and header params).
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = order;
        self
    }

    /// Header params for every receive and send, e.g. the server's own
    /// `addr`.
    pub fn params(mut self, params: HeaderParams) -> Self {
        self.config.params = params;
        self
    }

    /// Sets the packet handler. Defaults to [`EchoHandler`].
    pub fn handler(mut self, handler: impl PacketHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Names the worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Spawns the worker thread.
    pub fn start(self) -> Result<PacketServer, PktwireError> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            transport: self.transport,
            registry: self.registry,
            config: self.config,
            handler: self.handler,
            stop: Arc::clone(&stop),
            report: ServerReport::default(),
        };
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name)
            .spawn(move || worker.run())
            .map_err(PktwireError::Spawn)?;
        tracing::info!(server = %name, "packet server started");
        Ok(PacketServer {
            name,
            stop,
            handle: Some(handle),
        })
    }
}

/// A packet server running on its own thread.
///
/// Dropping the server stops it the same way [`stop`](Self::stop) does,
/// discarding the report.
pub struct PacketServer {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<ServerReport>>,
}

impl PacketServer {
    pub fn builder<T: Transport + 'static>(
        transport: T,
        registry: Arc<PacketTypeRegistry>,
    ) -> PacketServerBuilder<T> {
        PacketServerBuilder::new(transport, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the worker and waits for it to exit.
    ///
    /// The worker checks the flag between connections, so this returns
    /// within about one transport timeout.
    pub fn stop(mut self) -> Result<ServerReport, PktwireError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<ServerReport, PktwireError> {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(ServerReport::default());
        };
        let report = handle.join().map_err(|_| PktwireError::ServerPanicked)?;
        tracing::info!(
            server = %self.name,
            connections = report.connections,
            packets = report.packets,
            errors = report.errors,
            "packet server stopped"
        );
        Ok(report)
    }
}

impl Drop for PacketServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.shutdown() {
                tracing::error!(server = %self.name, error = %e, "server did not stop cleanly");
            }
        }
    }
}

impl std::fmt::Debug for PacketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketServer")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker<T: Transport> {
    transport: T,
    registry: Arc<PacketTypeRegistry>,
    config: ChannelConfig,
    handler: Box<dyn PacketHandler>,
    stop: Arc<AtomicBool>,
    report: ServerReport,
}

impl<T: Transport> Worker<T> {
    fn run(mut self) -> ServerReport {
        while !self.stop.load(Ordering::Acquire) {
            match self.transport.connect() {
                Ok(()) => {
                    self.report.connections += 1;
                    self.serve_connection();
                }
                Err(e) if e.is_timeout() => {}
                Err(e) => {
                    self.report.errors += 1;
                    tracing::warn!(error = %e, "connect failed");
                    // Keep a persistent failure from spinning.
                    thread::sleep(self.transport.timeout());
                }
            }
            if let Err(e) = self.transport.close() {
                tracing::debug!(error = %e, "close failed");
            }
        }
        self.report
    }

    /// Serves one packet on a channel of its own, so no header state
    /// outlives the connection.
    fn serve_connection(&mut self) {
        let mut channel = PacketChannel::with_config(
            &mut self.transport,
            Arc::clone(&self.registry),
            self.config.clone(),
        );
        let packet = match channel.receive() {
            Ok(Some(packet)) => packet,
            Ok(None) => return,
            Err(e) => {
                count_receive_error(&mut self.report, &e);
                return;
            }
        };
        self.report.packets += 1;
        tracing::debug!(packet = packet.name(), "dispatching packet");

        let Some(mut response) = self.handler.handle(packet) else {
            return;
        };
        match channel.send(&mut response, &HeaderParams::new()) {
            Ok(()) => self.report.responses += 1,
            Err(e) => {
                self.report.errors += 1;
                tracing::warn!(error = %e, "failed to send response");
            }
        }
    }
}

fn count_receive_error(report: &mut ServerReport, e: &ProtocolError) {
    if e.is_timeout() {
        tracing::trace!("no packet before timeout");
        return;
    }
    report.errors += 1;
    tracing::warn!(error = %e, "failed to receive packet");
}
