use std::io;
use std::sync::Arc;

use crate::codec::{DecodeError, EncodeError};

/// Errors are cheap to clone so that one report can be queued and handed to
/// several handlers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OscError {
    #[error("socket error: {0}")]
    Io(Arc<io::Error>),
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),
    #[error("cannot encode message: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to resolve host {host:?}")]
    Resolve {
        host: String,
        #[source]
        source: Option<Arc<io::Error>>,
    },
    #[error("no default remote endpoint configured")]
    NoDefaultRemote,
    #[error("already disposed")]
    Disposed,
}

impl From<io::Error> for OscError {
    fn from(e: io::Error) -> Self {
        OscError::Io(Arc::new(e))
    }
}

impl OscError {
    /// True for socket errors raised because the handle was closed or the
    /// blocking call was interrupted during shutdown.
    pub fn is_cancellation(&self) -> bool {
        match self {
            OscError::Io(e) => is_cancellation(e),
            _ => false,
        }
    }

    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            OscError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

pub(crate) fn is_cancellation(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted | io::ErrorKind::NotConnected
    )
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

pub type Result<T, E = OscError> = std::result::Result<T, E>;
