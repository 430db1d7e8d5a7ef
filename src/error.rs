use thiserror::Error;

/// Errors raised while reading class file bytes or decoding a persisted index.
///
/// Every variant is fatal to the single parse or decode call that produced it,
/// never to the indexing session as a whole; callers indexing many files are
/// expected to catch per file and continue. Lookup misses on the finished
/// index are not errors and are reported as `None` or empty slices instead.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unexpected end of stream at offset {offset}")]
    Truncated { offset: usize },
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstantTag { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid UTF-8 string in constant pool: {0}")]
    Utf8Decode(#[from] std::string::FromUtf8Error),
    #[error("malformed descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("unknown annotation element tag {tag:#04x}")]
    UnknownElementTag { tag: u8 },
    #[error("annotation nesting depth exceeds limit")]
    NestingTooDeep,
    #[error("attribute {name} does not match its declared length")]
    AttributeLength { name: &'static str },
    #[error("unrecognized index magic header")]
    BadIndexMagic,
    #[error("unsupported index format version {version}")]
    UnsupportedIndexVersion { version: u8 },
    #[error("corrupted index stream at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
