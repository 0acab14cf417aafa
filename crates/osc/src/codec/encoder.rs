use std::sync::Arc;

use super::error::EncodeError;
use super::types::{Argument, BUNDLE_TAG, Bundle, Message, Packet, TimeTag};

/// Length of an OSC-string holding `len` bytes: terminator plus padding.
#[inline]
pub fn string_len(len: usize) -> usize {
    (len + 4) & !3
}

#[inline]
pub fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Fluent message builder.
///
/// ```
/// use oscport::Encoder;
///
/// let bytes = Encoder::new("/test").add(1).add("hello").add(3.14f32).encode().unwrap();
/// assert_eq!(bytes.len() % 4, 0);
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    message: Message,
}

impl Encoder {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            message: Message::new(path),
        }
    }

    pub fn add(mut self, arg: impl Into<Argument>) -> Self {
        self.message.args.push(arg.into());
        self
    }

    pub fn add_time(self, seconds: u32, fraction: u32) -> Self {
        self.add(TimeTag::new(seconds, fraction))
    }

    pub fn path(&self) -> &str {
        &self.message.path
    }

    pub fn args(&self) -> &[Argument] {
        &self.message.args
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.message.encode()
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<Encoder> for Message {
    fn from(encoder: Encoder) -> Self {
        encoder.message
    }
}

impl Message {
    pub fn encoded_len(&self) -> Result<usize, EncodeError> {
        if !self.path.starts_with('/') {
            return Err(EncodeError::InvalidAddress(self.path.to_string()));
        }
        check_nul(&self.path)?;

        let mut len = string_len(self.path.len()) + string_len(self.args.len() + 1);
        for arg in &self.args {
            len += arg_len(arg)?;
        }
        Ok(len)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let len = self.encoded_len()?;
        let mut buf = Vec::with_capacity(len);
        self.write_to(&mut buf);
        debug_assert_eq!(buf.len(), len);
        Ok(buf)
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        write_string(buf, self.path.as_bytes());

        let tags_start = buf.len();
        buf.push(b',');
        buf.extend(self.args.iter().map(Argument::tag));
        pad_from(buf, tags_start);

        for arg in &self.args {
            match arg {
                Argument::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                Argument::Float(v) => buf.extend_from_slice(&v.to_bits().to_be_bytes()),
                Argument::String(v) => write_string(buf, v.as_bytes()),
                Argument::Blob(v) => {
                    let start = buf.len();
                    buf.extend_from_slice(&(v.len() as i32).to_be_bytes());
                    buf.extend_from_slice(v);
                    pad_to_boundary(buf, start);
                }
                Argument::Time(t) => write_timetag(buf, *t),
            }
        }
    }
}

impl Bundle {
    pub fn encoded_len(&self) -> Result<usize, EncodeError> {
        let mut len = string_len(BUNDLE_TAG.len()) + 8;
        for element in &self.elements {
            len += 4 + element.encoded_len()?;
        }
        Ok(len)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let len = self.encoded_len()?;
        let mut buf = Vec::with_capacity(len);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_string(buf, BUNDLE_TAG.as_bytes());
        write_timetag(buf, self.timetag);
        for element in &self.elements {
            let size = element.encoded_len()?;
            buf.extend_from_slice(&(size as i32).to_be_bytes());
            element.write_to(buf)?;
        }
        Ok(())
    }
}

impl Packet {
    pub fn encoded_len(&self) -> Result<usize, EncodeError> {
        match self {
            Packet::Message(m) => m.encoded_len(),
            Packet::Bundle(b) => b.encoded_len(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Packet::Message(m) => m.encode(),
            Packet::Bundle(b) => b.encode(),
        }
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Packet::Message(m) => {
                m.write_to(buf);
                Ok(())
            }
            Packet::Bundle(b) => b.write_to(buf),
        }
    }
}

fn arg_len(arg: &Argument) -> Result<usize, EncodeError> {
    Ok(match arg {
        Argument::Int(_) | Argument::Float(_) => 4,
        Argument::String(s) => {
            check_nul(s)?;
            string_len(s.len())
        }
        Argument::Blob(b) => {
            if b.len() > i32::MAX as usize {
                return Err(EncodeError::BlobTooLarge(b.len()));
            }
            4 + pad4(b.len())
        }
        Argument::Time(_) => 8,
    })
}

fn check_nul(s: &str) -> Result<(), EncodeError> {
    if s.as_bytes().contains(&0) {
        Err(EncodeError::InteriorNul)
    } else {
        Ok(())
    }
}

fn write_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    let start = buf.len();
    buf.extend_from_slice(bytes);
    pad_from(buf, start);
}

fn write_timetag(buf: &mut Vec<u8>, tag: TimeTag) {
    buf.extend_from_slice(&tag.seconds.to_be_bytes());
    buf.extend_from_slice(&tag.fraction.to_be_bytes());
}

// Terminates and pads an OSC-string that began at `start`.
fn pad_from(buf: &mut Vec<u8>, start: usize) {
    let end = start + string_len(buf.len() - start);
    buf.resize(end, 0);
}

fn pad_to_boundary(buf: &mut Vec<u8>, start: usize) {
    let end = start + pad4(buf.len() - start);
    buf.resize(end, 0);
}
