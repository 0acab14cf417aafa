#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated packet: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("unterminated string at offset {0}")]
    MissingTerminator(usize),
    #[error("invalid UTF-8 in string at offset {0}")]
    InvalidUtf8(usize),
    #[error("type tag string at offset {0} does not start with ','")]
    MissingTypeTagComma(usize),
    #[error("unsupported type tag '{tag}' at argument {index}")]
    UnsupportedTag { tag: char, index: usize },
    #[error("invalid length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: i32 },
    #[error("address at offset {0} is neither a path nor #bundle")]
    InvalidAddress(usize),
    #[error("bundles nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("empty packet")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("address must start with '/': {0:?}")]
    InvalidAddress(String),
    #[error("string contains an interior NUL byte")]
    InteriorNul,
    #[error("blob of {0} bytes exceeds the i32 length prefix")]
    BlobTooLarge(usize),
}
