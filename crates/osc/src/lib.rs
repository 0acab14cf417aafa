//! Open Sound Control over UDP.
//!
//! [`Encoder`] and [`Parser`] convert between [`Message`]s and OSC 1.0 wire
//! bytes. [`OscReceiver`], [`OscSender`] and [`OscPort`] move those bytes
//! over IPv4 UDP on background threads.

pub mod codec;
pub mod config;
pub mod error;
pub mod net;

pub use codec::{
    Argument, Bundle, DecodeError, EncodeError, Encoder, Message, Packet, Parser, StringCache,
    TimeTag, decode_packet,
};
pub use config::{
    DEFAULT_BUFFER_SIZE, MTU_SIZE, ParserConfig, PortConfig, ReceiveMode, ReceiverConfig,
    SenderConfig,
};
pub use error::{OscError, Result};
pub use net::{
    Capsule, DiagnosticSink, Diagnostics, HandlerId, LogSink, OscPort, OscReceiver, OscSender,
    OscSocket, StderrSink, TransportStats,
};
