//! OSC 1.0 wire codec. Pure byte transformations, no I/O.

mod decoder;
mod encoder;
mod error;
mod string_cache;
mod types;

pub use decoder::{MAX_BUNDLE_DEPTH, Parser, decode_packet};
pub use encoder::{Encoder, pad4, string_len};
pub use error::{DecodeError, EncodeError};
pub use string_cache::StringCache;
pub use types::{Argument, BUNDLE_TAG, Bundle, Message, Packet, TimeTag};
