use std::net::SocketAddr;
use std::thread;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;

use super::reader::join_worker;
use super::socket::OscSocket;
use crate::error::{OscError, Result};

struct Datagram {
    bytes: Vec<u8>,
    remote: SocketAddr,
}

enum QueueState {
    Idle,
    Running {
        tx: Sender<Datagram>,
        worker: thread::JoinHandle<()>,
    },
    Closed,
}

/// FIFO of outgoing datagrams drained by one background thread, which is
/// started by the first enqueue.
pub(crate) struct SendQueue {
    name: String,
    socket: OscSocket,
    state: Mutex<QueueState>,
}

impl SendQueue {
    pub fn new(name: String, socket: OscSocket) -> Self {
        Self {
            name,
            socket,
            state: Mutex::new(QueueState::Idle),
        }
    }

    pub fn enqueue(&self, bytes: Vec<u8>, remote: SocketAddr) -> Result<()> {
        let mut state = self.state.lock();
        if let QueueState::Idle = *state {
            *state = self.start()?;
        }
        match &*state {
            QueueState::Running { tx, .. } => tx
                .send(Datagram { bytes, remote })
                .map_err(|_| OscError::Disposed),
            _ => Err(OscError::Disposed),
        }
    }

    fn start(&self) -> Result<QueueState> {
        let (tx, rx) = unbounded::<Datagram>();
        let socket = self.socket.clone();
        let worker = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                for datagram in rx {
                    match socket.send_to(&datagram.bytes, datagram.remote) {
                        Ok(_) => {}
                        Err(OscError::Disposed) => break,
                        Err(e) => socket.report(&e),
                    }
                }
                log::debug!("send queue on {} stopped", socket.local_addr());
            })?;
        Ok(QueueState::Running { tx, worker })
    }

    /// Disconnects the queue and waits for already queued datagrams to be
    /// written. Enqueueing afterwards fails with `Disposed`.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), QueueState::Closed);
        if let QueueState::Running { tx, worker } = previous {
            drop(tx);
            join_worker(worker);
        }
    }
}
