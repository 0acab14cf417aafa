use std::collections::VecDeque;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};

use super::capsule::Capsule;
use super::diagnostics::{DiagnosticSink, ErrorChannel};
use super::handlers::{HandlerId, HandlerRegistry, PathHandlers};
use super::reader::{join_worker, spawn_reader};
use super::resolve::resolve_endpoint;
use super::socket::OscSocket;
use super::stats::{Diagnostics, RateMeter};
use super::writer::SendQueue;
use crate::codec::{Message, Parser};
use crate::config::{PortConfig, ReceiveMode};
use crate::error::{OscError, Result};

/// Received capsules and errors waiting for the host to collect them.
struct Inbox {
    capsules: Mutex<VecDeque<Capsule>>,
    errors: Mutex<VecDeque<OscError>>,
    limit: usize,
}

impl Inbox {
    /// Returns false when the capsule was dropped because the queue is full.
    fn push_capsule(&self, capsule: Capsule) -> bool {
        let mut capsules = self.capsules.lock();
        if self.limit > 0 && capsules.len() >= self.limit {
            return false;
        }
        capsules.push_back(capsule);
        true
    }

    /// Errors share the capsule limit; past it the newest error is dropped.
    fn push_error(&self, error: OscError) -> bool {
        let mut errors = self.errors.lock();
        if self.limit > 0 && errors.len() >= self.limit {
            return false;
        }
        errors.push_back(error);
        true
    }

    fn take_capsules(&self) -> Vec<Capsule> {
        self.capsules.lock().drain(..).collect()
    }

    fn take_errors(&self) -> Vec<OscError> {
        self.errors.lock().drain(..).collect()
    }
}

/// A bidirectional endpoint: one socket, a reader thread filling a bounded
/// inbox, and a queued sender. The host collects received traffic either by
/// polling or by calling [`OscPort::drain_pending`] at its own cadence.
pub struct OscPort {
    socket: OscSocket,
    mode: ReceiveMode,
    default_remote: RwLock<Option<SocketAddr>>,
    inbox: Arc<Inbox>,
    receivers: HandlerRegistry<Capsule>,
    paths: PathHandlers,
    errors: ErrorChannel,
    queue: SendQueue,
    reader: Mutex<Option<JoinHandle<()>>>,
    meter: Mutex<RateMeter>,
}

impl OscPort {
    pub fn start(config: PortConfig) -> Result<Self> {
        let socket = OscSocket::bind(SocketAddrV4::new(config.bind_address, config.local_port))?;
        let port = socket.local_addr().port();

        let inbox = Arc::new(Inbox {
            capsules: Mutex::new(VecDeque::new()),
            errors: Mutex::new(VecDeque::new()),
            limit: config.limit_receive_buffer,
        });

        // Errors from both background threads land in the inbox.
        let errors_inbox = Arc::clone(&inbox);
        socket.add_error(move |e| {
            if !errors_inbox.push_error(e.clone()) {
                log::debug!("error queue full, dropping: {}", e);
            }
        });

        let capsule_inbox = Arc::clone(&inbox);
        let counters_socket = socket.clone();
        let reader = spawn_reader(
            format!("osc-port-recv-{}", port),
            socket.clone(),
            Parser::with_config(&config.parser),
            Arc::new(AtomicUsize::new(config.buffer_size)),
            move |capsule| {
                if !capsule_inbox.push_capsule(capsule) {
                    counters_socket.counters().record_dropped();
                    log::debug!("receive queue full, dropping capsule");
                }
            },
        )?;

        let default_remote =
            match resolve_endpoint(&config.default_remote_host, config.default_remote_port) {
                Ok(remote) => {
                    log::info!("default remote set to {}", remote);
                    Some(remote)
                }
                Err(e) => {
                    log::warn!("no default remote: {}", e);
                    None
                }
            };

        log::info!(
            "osc port started on {} ({:?} mode)",
            socket.local_addr(),
            config.receive_mode
        );
        Ok(Self {
            queue: SendQueue::new(format!("osc-port-send-{}", port), socket.clone()),
            socket,
            mode: config.receive_mode,
            default_remote: RwLock::new(default_remote),
            inbox,
            receivers: HandlerRegistry::new(),
            paths: PathHandlers::default(),
            errors: ErrorChannel::new(),
            reader: Mutex::new(Some(reader)),
            meter: Mutex::new(RateMeter::new()),
        })
    }

    pub fn receive_mode(&self) -> ReceiveMode {
        self.mode
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn socket(&self) -> &OscSocket {
        &self.socket
    }

    pub fn default_remote(&self) -> Option<SocketAddr> {
        *self.default_remote.read()
    }

    /// Re-resolves the default remote. On failure the previous default is
    /// cleared and the error returned.
    pub fn update_default_remote(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let resolved = resolve_endpoint(host, port);
        *self.default_remote.write() = resolved.as_ref().ok().copied();
        let remote = resolved?;
        log::info!("default remote set to {}", remote);
        Ok(remote)
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

    /// Registers a handler for messages whose address equals `path`. When
    /// several handlers share a path only the earliest registered one runs.
    /// Called from [`OscPort::drain_pending`] after the capsule handlers.
    pub fn add_path_receiver<F>(&self, path: &str, handler: F) -> HandlerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.paths.add(path, handler)
    }

    pub fn remove_path_receiver(&self, id: HandlerId) -> bool {
        self.paths.remove(id)
    }

    pub fn add_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&OscError) + Send + Sync + 'static,
    {
        self.errors.add(handler)
    }

    pub fn remove_error(&self, id: HandlerId) -> bool {
        self.errors.remove(id)
    }

    pub fn set_diagnostic_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.errors.set_sink(sink);
    }

    pub fn poll_received(&self) -> Vec<Capsule> {
        self.inbox.take_capsules()
    }

    pub fn poll_errors(&self) -> Vec<OscError> {
        self.inbox.take_errors()
    }

    /// Dispatches queued capsules and errors to the handlers on the calling
    /// thread and returns how many capsules were delivered. Does nothing in
    /// poll mode.
    pub fn drain_pending(&self) -> usize {
        if self.mode != ReceiveMode::Event {
            return 0;
        }

        let capsules = self.inbox.take_capsules();
        for capsule in &capsules {
            self.receivers.emit(capsule);
            self.paths.dispatch(&capsule.message);
        }
        for error in self.inbox.take_errors() {
            self.errors.report(&error);
        }
        capsules.len()
    }

    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        let remote = self.default_remote().ok_or(OscError::NoDefaultRemote)?;
        self.send_to(bytes, remote)
    }

    pub fn send_to(&self, bytes: Vec<u8>, remote: SocketAddr) -> Result<()> {
        if self.socket.is_disposed() {
            return Err(OscError::Disposed);
        }
        self.queue.enqueue(bytes, remote)
    }

    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.send(message.encode()?)
    }

    pub fn send_message_to(&self, message: &Message, remote: SocketAddr) -> Result<()> {
        self.send_to(message.encode()?, remote)
    }

    /// Datagram rates since the previous call plus cumulative counters.
    pub fn diagnostics(&self) -> Diagnostics {
        self.meter.lock().sample(self.socket.stats())
    }

    pub fn is_disposed(&self) -> bool {
        self.socket.is_disposed()
    }

    pub fn dispose(&self) {
        self.queue.close();
        self.socket.dispose();
        if let Some(reader) = self.reader.lock().take() {
            join_worker(reader);
        }
    }

    pub fn stop(&self) {
        self.dispose();
    }
}

impl Drop for OscPort {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TimeTag;
    use crate::net::stats::TransportStats;
    use std::net::Ipv4Addr;

    fn capsule(path: &str) -> Capsule {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 1));
        Capsule::new(Message::new(path), addr, addr)
    }

    #[test]
    fn inbox_respects_limit() {
        let inbox = Inbox {
            capsules: Mutex::new(VecDeque::new()),
            errors: Mutex::new(VecDeque::new()),
            limit: 2,
        };
        assert!(inbox.push_capsule(capsule("/a")));
        assert!(inbox.push_capsule(capsule("/b")));
        assert!(!inbox.push_capsule(capsule("/c")));

        let taken: Vec<_> = inbox
            .take_capsules()
            .into_iter()
            .map(|c| c.message.path.to_string())
            .collect();
        assert_eq!(taken, ["/a", "/b"]);
        assert!(inbox.push_capsule(capsule("/d")));
    }

    #[test]
    fn error_queue_shares_limit() {
        let inbox = Inbox {
            capsules: Mutex::new(VecDeque::new()),
            errors: Mutex::new(VecDeque::new()),
            limit: 2,
        };
        assert!(inbox.push_error(OscError::Disposed));
        assert!(inbox.push_error(OscError::NoDefaultRemote));
        assert!(!inbox.push_error(OscError::Disposed));

        let errors = inbox.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[1], OscError::NoDefaultRemote));
        assert!(inbox.push_error(OscError::Disposed));
    }

    #[test]
    fn unbounded_inbox() {
        let inbox = Inbox {
            capsules: Mutex::new(VecDeque::new()),
            errors: Mutex::new(VecDeque::new()),
            limit: 0,
        };
        for _ in 0..100 {
            assert!(inbox.push_capsule(capsule("/x")));
            assert!(inbox.push_error(OscError::Disposed));
        }
        assert_eq!(inbox.take_capsules().len(), 100);
        assert_eq!(inbox.take_errors().len(), 100);
    }

    #[test]
    fn unresolvable_default_remote_is_not_fatal() {
        let port = OscPort::start(PortConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            default_remote_host: "no-such-host.invalid".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(port.default_remote(), None);
        assert!(matches!(
            port.send_message(&Message::new("/x").arg(TimeTag::IMMEDIATELY)),
            Err(OscError::NoDefaultRemote)
        ));

        let remote = port.update_default_remote("127.0.0.1", 9).unwrap();
        assert_eq!(port.default_remote(), Some(remote));
        assert_eq!(port.diagnostics().stats, TransportStats::default());
        port.dispose();
    }
}
