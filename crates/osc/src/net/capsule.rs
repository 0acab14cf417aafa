use std::fmt;
use std::net::SocketAddr;

use crate::codec::Message;

/// A decoded message together with the endpoints it travelled between.
#[derive(Debug, Clone, PartialEq)]
pub struct Capsule {
    pub message: Message,
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

impl Capsule {
    pub fn new(message: Message, local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            message,
            local,
            remote,
        }
    }
}

impl fmt::Display for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}\n{}", self.remote, self.local, self.message)
    }
}
