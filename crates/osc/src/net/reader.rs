use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use super::capsule::Capsule;
use super::socket::OscSocket;
use crate::codec::Parser;
use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{OscError, Result, is_cancellation, is_timeout};

/// Largest buffer the reader grows to when a datagram does not fit.
pub(crate) const MAX_DATAGRAM_SIZE: usize = DEFAULT_BUFFER_SIZE;

/// Starts the background loop that decodes every datagram arriving on
/// `socket` and hands each message to `deliver`, in arrival order.
pub(crate) fn spawn_reader<F>(
    name: String,
    socket: OscSocket,
    mut parser: Parser,
    buffer_size: Arc<AtomicUsize>,
    mut deliver: F,
) -> Result<JoinHandle<()>>
where
    F: FnMut(Capsule) + Send + 'static,
{
    let handle = socket.handle()?;
    let thread = thread::Builder::new().name(name).spawn(move || {
        let local = socket.local_addr();
        let mut buffer = vec![0u8; buffer_size.load(Ordering::Relaxed).max(1)];
        log::debug!("reader started on {}", local);

        while !socket.is_disposed() {
            let configured = buffer_size.load(Ordering::Relaxed).max(1);
            if buffer.len() < configured {
                buffer.resize(configured, 0);
            }

            // A peek that fills the buffer may have cut the datagram short.
            match handle.peek_from(&mut buffer) {
                Ok((peeked, _)) if peeked == buffer.len() && buffer.len() < MAX_DATAGRAM_SIZE => {
                    log::debug!("growing receive buffer from {} bytes", buffer.len());
                    buffer.resize(MAX_DATAGRAM_SIZE, 0);
                }
                Ok(_) => {}
                Err(e) if is_timeout(&e) => continue,
                // Reported by the receive below.
                Err(_) => {}
            }

            let (len, remote) = match handle.recv_from(&mut buffer) {
                Ok(read) => read,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => {
                    if socket.is_disposed() {
                        break;
                    }
                    if is_cancellation(&e) {
                        log::debug!("receive interrupted on {}: {}", local, e);
                        continue;
                    }
                    socket.report(&OscError::from(e));
                    continue;
                }
            };
            if len == 0 {
                continue;
            }
            socket.counters().record_received(len);

            match parser.feed(&buffer[..len]) {
                Ok(_) => {
                    for message in parser.drain() {
                        deliver(Capsule::new(message, local, remote));
                    }
                }
                Err(e) => {
                    socket.counters().record_malformed();
                    log::debug!("dropping malformed datagram from {}: {}", remote, e);
                    socket.report(&OscError::Decode(e));
                }
            }
        }

        log::debug!("reader on {} stopped", local);
    })?;
    Ok(thread)
}

/// Waits for a background thread unless it is the calling thread, which
/// happens when a handler disposes its own receiver.
pub(crate) fn join_worker(worker: JoinHandle<()>) {
    if worker.thread().id() == thread::current().id() {
        return;
    }
    let name = worker.thread().name().unwrap_or("osc worker").to_string();
    if worker.join().is_err() {
        log::warn!("{} panicked", name);
    }
}
