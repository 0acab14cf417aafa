use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use super::diagnostics::DiagnosticSink;
use super::handlers::HandlerId;
use super::resolve::resolve_endpoint;
use super::socket::OscSocket;
use super::writer::SendQueue;
use crate::codec::Message;
use crate::config::SenderConfig;
use crate::error::{OscError, Result};

/// Writes datagrams either synchronously or through a background FIFO.
pub struct OscSender {
    socket: OscSocket,
    default_remote: Option<SocketAddr>,
    queue: SendQueue,
}

impl OscSender {
    /// Binds an ephemeral local port.
    pub fn new(default_remote: Option<SocketAddr>) -> Result<Self> {
        Self::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0), default_remote)
    }

    pub fn to_host(host: &str, port: u16) -> Result<Self> {
        Self::new(Some(resolve_endpoint(host, port)?))
    }

    pub fn with_config(config: SenderConfig) -> Result<Self> {
        let default_remote = match &config.default_remote_host {
            Some(host) => Some(resolve_endpoint(host, config.default_remote_port)?),
            None => None,
        };
        Self::bind(
            SocketAddrV4::new(config.bind_address, config.local_port),
            default_remote,
        )
    }

    fn bind(local: SocketAddrV4, default_remote: Option<SocketAddr>) -> Result<Self> {
        let socket = OscSocket::bind(local)?;
        let queue = SendQueue::new(
            format!("osc-send-{}", socket.local_addr().port()),
            socket.clone(),
        );
        Ok(Self {
            socket,
            default_remote,
            queue,
        })
    }

    pub fn default_remote(&self) -> Option<SocketAddr> {
        self.default_remote
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn socket(&self) -> &OscSocket {
        &self.socket
    }

    pub fn send(&self, bytes: &[u8]) -> Result<usize> {
        let remote = self.default_remote.ok_or(OscError::NoDefaultRemote)?;
        self.send_to(bytes, remote)
    }

    pub fn send_to(&self, bytes: &[u8], remote: SocketAddr) -> Result<usize> {
        self.socket.send_to(bytes, remote)
    }

    pub fn send_message(&self, message: &Message) -> Result<usize> {
        self.send(&message.encode()?)
    }

    pub fn send_message_to(&self, message: &Message, remote: SocketAddr) -> Result<usize> {
        self.send_to(&message.encode()?, remote)
    }

    /// Queues `bytes` for the default remote. Write failures are reported to
    /// the error handlers.
    pub fn send_async(&self, bytes: Vec<u8>) -> Result<()> {
        let remote = self.default_remote.ok_or(OscError::NoDefaultRemote)?;
        self.send_async_to(bytes, remote)
    }

    pub fn send_async_to(&self, bytes: Vec<u8>, remote: SocketAddr) -> Result<()> {
        if self.socket.is_disposed() {
            return Err(OscError::Disposed);
        }
        self.queue.enqueue(bytes, remote)
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

    pub fn is_disposed(&self) -> bool {
        self.socket.is_disposed()
    }

    /// Flushes the async queue, then releases the socket.
    pub fn dispose(&self) {
        self.queue.close();
        self.socket.dispose();
    }
}

impl Drop for OscSender {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_without_default_remote_fails_before_io() {
        let sender = OscSender::new(None).unwrap();
        assert!(matches!(sender.send(b"/x\0\0"), Err(OscError::NoDefaultRemote)));
        assert!(matches!(
            sender.send_async(b"/x\0\0".to_vec()),
            Err(OscError::NoDefaultRemote)
        ));
        assert_eq!(sender.socket().stats().datagrams_sent, 0);
    }

    #[test]
    fn invalid_message_is_an_encode_error() {
        let sender = OscSender::to_host("127.0.0.1", 9).unwrap();
        let err = sender.send_message(&Message::new("bad")).unwrap_err();
        assert!(matches!(err, OscError::Encode(_)));
    }

    #[test]
    fn operations_fail_after_dispose() {
        let sender = OscSender::to_host("127.0.0.1", 9).unwrap();
        sender.dispose();
        sender.dispose();
        assert!(matches!(sender.send(b"/x\0\0"), Err(OscError::Disposed)));
        assert!(matches!(
            sender.send_async(b"/x\0\0".to_vec()),
            Err(OscError::Disposed)
        ));
    }
}
