use std::collections::VecDeque;
use std::sync::Arc;

use super::encoder::{pad4, string_len};
use super::error::DecodeError;
use super::string_cache::StringCache;
use super::types::{Argument, BUNDLE_TAG, Bundle, Message, Packet, TimeTag};
use crate::config::ParserConfig;

pub const MAX_BUNDLE_DEPTH: usize = 1024;

/// Bounds-checked cursor over `data[pos..end]`. Offsets stay absolute so
/// errors point into the original datagram.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    fn remaining(&self) -> usize {
        self.end - self.pos
    }

    fn peek(&self) -> Option<u8> {
        (self.pos < self.end).then(|| self.data[self.pos])
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn sub_reader(&mut self, n: usize) -> Result<Reader<'a>, DecodeError> {
        let start = self.pos;
        self.take(n)?;
        Ok(Reader {
            data: self.data,
            pos: start,
            end: start + n,
        })
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read_u32().map(|v| v as i32)
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.read_u32().map(f32::from_bits)
    }

    fn read_timetag(&mut self) -> Result<TimeTag, DecodeError> {
        let seconds = self.read_u32()?;
        let fraction = self.read_u32()?;
        Ok(TimeTag::new(seconds, fraction))
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let length = self.read_i32()?;
        if length < 0 || length as usize > self.remaining() {
            return Err(DecodeError::InvalidLength { offset, length });
        }
        Ok(length as usize)
    }

    /// Raw OSC-string bytes without the terminator; consumes the padding.
    fn read_string_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let window = &self.data[start..self.end];
        let count = window
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::MissingTerminator(start))?;
        // The final string of a datagram may omit trailing pad bytes.
        let padded = string_len(count).min(window.len());
        self.pos += padded;
        Ok(&window[..count])
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let length = self.read_length()?;
        let bytes = self.take(length)?;
        let padding = pad4(length) - length;
        self.pos += padding.min(self.remaining());
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Default)]
struct Caches {
    path: Option<StringCache>,
    type_tag: Option<StringCache>,
    string_arg: Option<StringCache>,
}

impl Caches {
    fn from_config(config: &ParserConfig) -> Self {
        let make = |capacity: usize, max_key_len: usize| {
            (capacity > 0).then(|| StringCache::new(capacity, max_key_len))
        };
        Self {
            path: make(config.path_cache_capacity, 0),
            type_tag: make(config.type_tag_cache_capacity, 0),
            string_arg: make(config.string_cache_capacity, config.string_cache_max_key_len),
        }
    }
}

fn decode_str(
    bytes: &[u8],
    offset: usize,
    cache: Option<&mut StringCache>,
) -> Result<Arc<str>, DecodeError> {
    let decoded = match cache {
        Some(cache) => cache.get_or_insert(bytes),
        None => std::str::from_utf8(bytes).map(Arc::from),
    };
    decoded.map_err(|_| DecodeError::InvalidUtf8(offset))
}

fn read_message(
    reader: &mut Reader<'_>,
    address: &[u8],
    address_offset: usize,
    caches: &mut Caches,
) -> Result<Message, DecodeError> {
    if address.first() != Some(&b'/') {
        return Err(DecodeError::InvalidAddress(address_offset));
    }
    let path = decode_str(address, address_offset, caches.path.as_mut())?;

    // Pre-1.0 senders may omit the type tag string entirely.
    if reader.remaining() == 0 {
        return Ok(Message::new(path));
    }

    let tags_offset = reader.pos;
    let raw_tags = reader.read_string_bytes()?;
    if raw_tags.first() != Some(&b',') {
        return Err(DecodeError::MissingTypeTagComma(tags_offset));
    }
    let tags = decode_str(raw_tags, tags_offset, caches.type_tag.as_mut())?;

    let mut args = Vec::with_capacity(tags.len() - 1);
    for (index, tag) in tags.bytes().skip(1).enumerate() {
        let arg = match tag {
            b'i' => Argument::Int(reader.read_i32()?),
            b'f' => Argument::Float(reader.read_f32()?),
            b's' => {
                let offset = reader.pos;
                let bytes = reader.read_string_bytes()?;
                Argument::String(decode_str(bytes, offset, caches.string_arg.as_mut())?)
            }
            b'b' => Argument::Blob(reader.read_blob()?),
            b't' => Argument::Time(reader.read_timetag()?),
            other => {
                return Err(DecodeError::UnsupportedTag {
                    tag: other as char,
                    index,
                })
            }
        };
        args.push(arg);
    }

    Ok(Message::with_args(path, args))
}

/// Receives the pieces of a packet in wire order, so callers can either
/// flatten bundles or rebuild the tree.
trait PacketVisitor {
    fn message(&mut self, message: Message);
    fn enter_bundle(&mut self, _timetag: TimeTag) {}
    fn leave_bundle(&mut self) {}
}

fn read_packet(
    reader: &mut Reader<'_>,
    caches: &mut Caches,
    visitor: &mut dyn PacketVisitor,
    depth: usize,
) -> Result<(), DecodeError> {
    if reader.remaining() == 0 {
        return Err(DecodeError::Empty);
    }
    let address_offset = reader.pos;
    let address = reader.read_string_bytes()?;

    if address != BUNDLE_TAG.as_bytes() {
        let message = read_message(reader, address, address_offset, caches)?;
        visitor.message(message);
        return Ok(());
    }

    if depth >= MAX_BUNDLE_DEPTH {
        return Err(DecodeError::TooDeep(MAX_BUNDLE_DEPTH));
    }
    let timetag = reader.read_timetag()?;
    visitor.enter_bundle(timetag);

    while let Some(first) = reader.peek() {
        if first == b'/' || first == b'#' {
            // No size prefix: the packet ends where its own encoding ends.
            read_packet(reader, caches, visitor, depth + 1)?;
        } else {
            let size = reader.read_length()?;
            let mut element = reader.sub_reader(size)?;
            read_element(&mut element, caches, visitor, depth + 1)?;
        }
    }

    visitor.leave_bundle();
    Ok(())
}

/// Decodes packets until the sized element is used up.
fn read_element(
    element: &mut Reader<'_>,
    caches: &mut Caches,
    visitor: &mut dyn PacketVisitor,
    depth: usize,
) -> Result<(), DecodeError> {
    while element.remaining() > 0 {
        read_packet(element, caches, visitor, depth)?;
    }
    Ok(())
}

struct QueueVisitor<'q> {
    queue: &'q mut VecDeque<Message>,
}

impl PacketVisitor for QueueVisitor<'_> {
    fn message(&mut self, message: Message) {
        self.queue.push_back(message);
    }
}

/// Streaming decoder. Every fed datagram appends its messages, flattened out of
/// any bundles, to an internal queue drained with [`Parser::pop_message`].
///
/// A parser is single-owner state; share decoded messages, not the parser.
#[derive(Debug, Default)]
pub struct Parser {
    messages: VecDeque<Message>,
    caches: Caches,
}

impl Parser {
    /// Parser without string caches.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ParserConfig) -> Self {
        Self {
            messages: VecDeque::new(),
            caches: Caches::from_config(config),
        }
    }

    /// Decodes one datagram and returns how many messages it queued.
    ///
    /// On error nothing from `data` stays queued.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, DecodeError> {
        let before = self.messages.len();
        let mut reader = Reader::new(data);
        let mut visitor = QueueVisitor {
            queue: &mut self.messages,
        };
        match read_packet(&mut reader, &mut self.caches, &mut visitor, 0) {
            Ok(()) => Ok(self.messages.len() - before),
            Err(e) => {
                self.messages.truncate(before);
                Err(e)
            }
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn pop_message(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.messages.drain(..)
    }

    pub fn path_cache(&self) -> Option<&StringCache> {
        self.caches.path.as_ref()
    }

    pub fn type_tag_cache(&self) -> Option<&StringCache> {
        self.caches.type_tag.as_ref()
    }

    pub fn string_cache(&self) -> Option<&StringCache> {
        self.caches.string_arg.as_ref()
    }
}

#[derive(Default)]
struct TreeVisitor {
    stack: Vec<Bundle>,
    root: Option<Packet>,
}

impl TreeVisitor {
    fn attach(&mut self, packet: Packet) {
        match self.stack.last_mut() {
            Some(parent) => parent.elements.push(packet),
            None => self.root = Some(packet),
        }
    }
}

impl PacketVisitor for TreeVisitor {
    fn message(&mut self, message: Message) {
        self.attach(Packet::Message(message));
    }

    fn enter_bundle(&mut self, timetag: TimeTag) {
        self.stack.push(Bundle::new(timetag));
    }

    fn leave_bundle(&mut self) {
        if let Some(bundle) = self.stack.pop() {
            self.attach(Packet::Bundle(bundle));
        }
    }
}

/// Decodes one packet keeping bundle structure and timetags.
pub fn decode_packet(data: &[u8]) -> Result<Packet, DecodeError> {
    let mut reader = Reader::new(data);
    let mut visitor = TreeVisitor::default();
    read_packet(&mut reader, &mut Caches::default(), &mut visitor, 0)?;
    visitor.root.ok_or(DecodeError::Empty)
}
