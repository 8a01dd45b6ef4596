//! Wire protocol: primitives, the PackStream codec, message envelopes,
//! the connection handshake, and the server session state machine.

pub mod handshake;
pub mod message;
pub mod primitive;
pub mod session;
pub mod value;

pub use message::{Message, deserialize_message, serialize_message};
pub use session::{Session, SessionAction, SessionState, StreamMode};

#[cfg(test)]
mod value_test;
