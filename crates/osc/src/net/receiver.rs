use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::capsule::Capsule;
use super::diagnostics::DiagnosticSink;
use super::handlers::{HandlerId, HandlerRegistry};
use super::reader::{join_worker, spawn_reader};
use super::socket::OscSocket;
use crate::codec::Parser;
use crate::config::ReceiverConfig;
use crate::error::{OscError, Result};

/// Listens on a local port and calls every receive handler, on the reader
/// thread, for each message that arrives.
pub struct OscReceiver {
    socket: OscSocket,
    receivers: Arc<HandlerRegistry<Capsule>>,
    buffer_size: Arc<AtomicUsize>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl OscReceiver {
    pub fn bind(local_port: u16) -> Result<Self> {
        Self::with_config(ReceiverConfig::on_port(local_port))
    }

    pub fn with_config(config: ReceiverConfig) -> Result<Self> {
        let socket = OscSocket::bind(SocketAddrV4::new(config.bind_address, config.local_port))?;
        let receivers = Arc::new(HandlerRegistry::new());
        let buffer_size = Arc::new(AtomicUsize::new(config.buffer_size));

        let dispatch = Arc::clone(&receivers);
        let reader = spawn_reader(
            format!("osc-recv-{}", socket.local_addr().port()),
            socket.clone(),
            Parser::with_config(&config.parser),
            Arc::clone(&buffer_size),
            move |capsule| {
                dispatch.emit(&capsule);
            },
        )?;
        log::info!("osc receiver listening on {}", socket.local_addr());

        Ok(Self {
            socket,
            receivers,
            buffer_size,
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn add_receiver<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Capsule) + Send + Sync + 'static,
    {
        self.receivers.add(handler)
    }

    pub fn remove_receiver(&self, id: HandlerId) -> bool {
        self.receivers.remove(id)
    }

    pub fn add_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&OscError) + Send + Sync + 'static,
    {
        self.socket.add_error(handler)
    }

    pub fn remove_error(&self, id: HandlerId) -> bool {
        self.socket.remove_error(id)
    }

    pub fn set_diagnostic_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.socket.set_diagnostic_sink(sink);
    }

    pub fn socket(&self) -> &OscSocket {
        &self.socket
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn receive_buffer_size(&self) -> Result<usize> {
        self.socket.receive_buffer_size()
    }

    /// Sets SO_RCVBUF and the reader's datagram buffer together.
    pub fn set_receive_buffer_size(&self, size: usize) -> Result<()> {
        self.socket.set_receive_buffer_size(size)?;
        self.buffer_size.store(size, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.socket.is_disposed()
    }

    /// Stops the reader and releases the socket. Safe to call more than once
    /// and from inside a receive handler.
    pub fn dispose(&self) {
        self.socket.dispose();
        if let Some(reader) = self.reader.lock().take() {
            join_worker(reader);
        }
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    #[test]
    fn ephemeral_port_is_reported() {
        let receiver = OscReceiver::with_config(ReceiverConfig {
            bind_address: std::net::Ipv4Addr::LOCALHOST,
            parser: ParserConfig::uncached(),
            ..Default::default()
        })
        .unwrap();
        assert_ne!(receiver.local_addr().port(), 0);
        receiver.dispose();
        assert!(receiver.is_disposed());
        assert!(matches!(
            receiver.receive_buffer_size(),
            Err(OscError::Disposed)
        ));
    }
}
