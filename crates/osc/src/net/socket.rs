use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use super::diagnostics::{DiagnosticSink, ErrorChannel};
use super::handlers::HandlerId;
use super::stats::{StatsCounters, TransportStats};
use crate::error::{OscError, Result};

/// Upper bound on how long a parked reader takes to notice disposal when the
/// wake-up datagram is lost.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One IPv4 UDP socket shared by the owning receiver/sender and its
/// background threads. Cloning yields another handle to the same socket.
#[derive(Clone)]
pub struct OscSocket {
    shared: Arc<SocketShared>,
}

struct SocketShared {
    handle: RwLock<Option<Arc<UdpSocket>>>,
    local_addr: SocketAddr,
    disposed: AtomicBool,
    errors: ErrorChannel,
    stats: StatsCounters,
}

impl OscSocket {
    pub fn bind(addr: SocketAddrV4) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        log::debug!("bound osc socket on {}", local_addr);

        Ok(Self {
            shared: Arc::new(SocketShared {
                handle: RwLock::new(Some(Arc::new(socket))),
                local_addr,
                disposed: AtomicBool::new(false),
                errors: ErrorChannel::new(),
                stats: StatsCounters::default(),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn handle(&self) -> Result<Arc<UdpSocket>> {
        self.shared
            .handle
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(OscError::Disposed)
    }

    /// Synchronous write on the calling thread.
    pub fn send_to(&self, bytes: &[u8], remote: SocketAddr) -> Result<usize> {
        let handle = self.handle()?;
        match handle.send_to(bytes, remote) {
            Ok(sent) => {
                self.shared.stats.record_sent(sent);
                Ok(sent)
            }
            Err(e) => {
                self.shared.stats.record_send_error();
                Err(e.into())
            }
        }
    }

    pub fn receive_buffer_size(&self) -> Result<usize> {
        Ok(sockopt::get(&*self.handle()?, sockopt::RECEIVE)?)
    }

    pub fn set_receive_buffer_size(&self, size: usize) -> Result<()> {
        Ok(sockopt::set(&*self.handle()?, sockopt::RECEIVE, size)?)
    }

    pub fn send_buffer_size(&self) -> Result<usize> {
        Ok(sockopt::get(&*self.handle()?, sockopt::SEND)?)
    }

    pub fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        Ok(sockopt::set(&*self.handle()?, sockopt::SEND, size)?)
    }

    pub fn add_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&OscError) + Send + Sync + 'static,
    {
        self.shared.errors.add(handler)
    }

    pub fn remove_error(&self, id: HandlerId) -> bool {
        self.shared.errors.remove(id)
    }

    /// Replaces the destination for errors reported while no error handler
    /// is registered.
    pub fn set_diagnostic_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.shared.errors.set_sink(sink);
    }

    pub fn report(&self, error: &OscError) {
        self.shared.errors.report(error);
    }

    pub fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.shared.stats
    }

    /// Releases the handle and wakes a reader blocked on it. Later calls do
    /// nothing.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(handle) = self.shared.handle.write().take() else {
            return;
        };

        let wake = wake_addr(self.shared.local_addr);
        if let Err(e) = handle.send_to(&[], wake) {
            log::debug!("wake-up datagram to {} failed: {}", wake, e);
        }
        log::debug!("disposed osc socket on {}", self.shared.local_addr);
    }
}

impl std::fmt::Debug for OscSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscSocket")
            .field("local_addr", &self.shared.local_addr)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn wake_addr(local: SocketAddr) -> SocketAddr {
    if local.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, local.port()))
    } else {
        local
    }
}

#[cfg(unix)]
mod sockopt {
    use std::io;
    use std::mem;
    use std::net::UdpSocket;
    use std::os::unix::io::AsRawFd;

    pub const RECEIVE: libc::c_int = libc::SO_RCVBUF;
    pub const SEND: libc::c_int = libc::SO_SNDBUF;

    pub fn get(socket: &UdpSocket, option: libc::c_int) -> io::Result<usize> {
        let mut value: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        // SAFETY: value and len point to live stack slots of the sizes passed.
        let rc = unsafe {
            libc::getsockopt(
                socket.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                &mut value as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(value.max(0) as usize)
    }

    pub fn set(socket: &UdpSocket, option: libc::c_int, size: usize) -> io::Result<()> {
        let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
        // SAFETY: value outlives the call and the length matches its type.
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                &value as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod sockopt {
    use std::io;
    use std::net::UdpSocket;

    pub const RECEIVE: i32 = 0;
    pub const SEND: i32 = 1;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "socket buffer sizes are only available on unix",
        )
    }

    pub fn get(_: &UdpSocket, _: i32) -> io::Result<usize> {
        Err(unsupported())
    }

    pub fn set(_: &UdpSocket, _: i32, _: usize) -> io::Result<()> {
        Err(unsupported())
    }
}
