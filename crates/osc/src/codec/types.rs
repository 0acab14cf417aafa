use std::fmt;
use std::sync::Arc;

pub const BUNDLE_TAG: &str = "#bundle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl TimeTag {
    pub const ZERO: TimeTag = TimeTag::new(0, 0);
    /// The OSC "execute immediately" value.
    pub const IMMEDIATELY: TimeTag = TimeTag::new(0, 1);

    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    pub fn to_bits(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        Self::new((bits >> 32) as u32, bits as u32)
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08x}", self.seconds, self.fraction)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Int(i32),
    Float(f32),
    String(Arc<str>),
    Blob(Vec<u8>),
    Time(TimeTag),
}

impl Argument {
    pub fn tag(&self) -> u8 {
        match self {
            Argument::Int(_) => b'i',
            Argument::Float(_) => b'f',
            Argument::String(_) => b's',
            Argument::Blob(_) => b'b',
            Argument::Time(_) => b't',
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Int(_) => "i32",
            Argument::Float(_) => "f32",
            Argument::String(_) => "string",
            Argument::Blob(_) => "blob",
            Argument::Time(_) => "timetag",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Argument::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<TimeTag> {
        match self {
            Argument::Time(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(v) => write!(f, "{}", v),
            Argument::Float(v) => write!(f, "{}", v),
            Argument::String(v) => write!(f, "{}", v),
            Argument::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Argument::Time(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Int(value)
    }
}

impl From<f32> for Argument {
    fn from(value: f32) -> Self {
        Argument::Float(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(Arc::from(value))
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(Arc::from(value))
    }
}

impl From<Arc<str>> for Argument {
    fn from(value: Arc<str>) -> Self {
        Argument::String(value)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(value: Vec<u8>) -> Self {
        Argument::Blob(value)
    }
}

impl From<&[u8]> for Argument {
    fn from(value: &[u8]) -> Self {
        Argument::Blob(value.to_vec())
    }
}

impl From<TimeTag> for Argument {
    fn from(value: TimeTag) -> Self {
        Argument::Time(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub path: Arc<str>,
    pub args: Vec<Argument>,
}

impl Message {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(path: impl Into<Arc<str>>, args: Vec<Argument>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(|a| a.tag() as char));
        tags
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for arg in &self.args {
            write!(f, ", {} ({})", arg, arg.type_name())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub timetag: TimeTag,
    pub elements: Vec<Packet>,
}

impl Bundle {
    pub fn new(timetag: TimeTag) -> Self {
        Self {
            timetag,
            elements: Vec::new(),
        }
    }

    pub fn push(mut self, packet: impl Into<Packet>) -> Self {
        self.elements.push(packet.into());
        self
    }

    /// All messages in depth-first order.
    pub fn messages(&self) -> Vec<&Message> {
        let mut out = Vec::new();
        collect_messages(&self.elements, &mut out);
        out
    }
}

fn collect_messages<'a>(elements: &'a [Packet], out: &mut Vec<&'a Message>) {
    for element in elements {
        match element {
            Packet::Message(m) => out.push(m),
            Packet::Bundle(b) => collect_messages(&b.elements, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl From<Message> for Packet {
    fn from(message: Message) -> Self {
        Packet::Message(message)
    }
}

impl From<Bundle> for Packet {
    fn from(bundle: Bundle) -> Self {
        Packet::Bundle(bundle)
    }
}
