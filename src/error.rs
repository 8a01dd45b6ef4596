use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::value::Value;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Buffer error: {0}")]
    Buffer(String),

    #[error("Server failure: {}", failure_summary(.metadata))]
    ServerFailed { metadata: Vec<(String, Value)> },

    #[error("Server ignored the request")]
    ServerIgnored,

    #[error("Client error: {0}")]
    Client(String),

    #[error("Bad config error: {0}")]
    BadConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A bug in zero-bolt: {0}")]
    LibraryBug(color_eyre::Report),
}

impl From<core::convert::Infallible> for Error {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}

impl<Src, Dst: ?Sized> From<zerocopy::CastError<Src, Dst>> for Error {
    fn from(err: zerocopy::CastError<Src, Dst>) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!("{:#?}", err))
    }
}

impl Error {
    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!(format!("{:#?}", err)))
    }

    /// The `code` field of a FAILURE metadata map, if this is a server failure.
    pub fn failure_code(&self) -> Option<&str> {
        match self {
            Self::ServerFailed { metadata } => metadata_str(metadata, "code"),
            _ => None,
        }
    }

    /// The `message` field of a FAILURE metadata map, if this is a server failure.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::ServerFailed { metadata } => metadata_str(metadata, "message"),
            _ => None,
        }
    }
}

fn metadata_str<'a>(metadata: &'a [(String, Value)], key: &str) -> Option<&'a str> {
    metadata.iter().find_map(|(k, v)| match v {
        Value::String(s) if k == key => Some(s.as_str()),
        _ => None,
    })
}

/// Human-readable `code: message` summary of a FAILURE metadata map.
fn failure_summary(metadata: &[(String, Value)]) -> String {
    let code = metadata_str(metadata, "code").unwrap_or("unknown");
    match metadata_str(metadata, "message") {
        Some(message) => format!("{}: {}", code, message),
        None => code.to_string(),
    }
}
