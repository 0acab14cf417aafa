mod capsule;
mod diagnostics;
mod handlers;
mod port;
mod reader;
mod receiver;
mod resolve;
mod sender;
mod socket;
mod stats;
mod writer;

pub use capsule::Capsule;
pub use diagnostics::{DiagnosticSink, LogSink, StderrSink};
pub use handlers::HandlerId;
pub use port::OscPort;
pub use receiver::OscReceiver;
pub use resolve::{resolve_endpoint, resolve_ipv4};
pub use sender::OscSender;
pub use socket::OscSocket;
pub use stats::{Diagnostics, TransportStats};
