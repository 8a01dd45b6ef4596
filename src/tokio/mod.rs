//! Async client and server over tokio TCP.

mod client;
mod server;
mod stream;

pub use client::{ClientResponse, ClientSession, ResponseStream, connect};
pub use server::{BoltServer, RunOutput, SessionHooks, create_server};
#[cfg(feature = "tls")]
pub use server::create_server_tls;
pub use stream::Stream;
