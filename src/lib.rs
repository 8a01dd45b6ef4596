//! A Bolt v1 protocol client and server.
//!
//! The crate core is sans-io: chunked message framing ([`ChunkedWriteBuffer`],
//! [`ChunkedReadBuffer`], [`BoltParser`]), the PackStream codec and message
//! envelopes ([`protocol`]), and the server session state machine. The
//! `tokio` feature adds the async client session and server on top.

mod buffer;
pub mod constant;
pub mod error;
mod opts;
mod parser;
pub mod protocol;
pub mod value;

pub use buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
pub use error::{Error, Result};
pub use opts::{OnFailure, Opts};
pub use parser::{BoltParser, FrameHandler};
pub use value::{Map, Structure, Value};

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(test)]
mod buffer_test;
#[cfg(test)]
mod opts_test;
#[cfg(test)]
mod parser_test;
