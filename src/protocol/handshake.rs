//! Connection handshake: magic preamble and version negotiation.
//!
//! The client opens with the 4-byte magic followed by four 32-bit big-endian
//! preferred versions, most preferred first and unused slots zero. The
//! server replies with the single selected version, or closes the
//! connection without replying when nothing matches.

use zerocopy::byteorder::big_endian::U32 as U32BE;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::constant::{BOLT_VERSION_1, MAGIC};
use crate::error::{Error, Result};

/// Byte length of the client hello.
pub const HANDSHAKE_REQUEST_LEN: usize = 20;

/// Byte length of the server reply.
pub const HANDSHAKE_REPLY_LEN: usize = 4;

/// Client hello (zero-copy).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct HandshakeRequest {
    pub magic: [u8; 4],
    pub versions: [U32BE; 4],
}

impl HandshakeRequest {
    /// The hello this crate sends: version 1 first, remaining slots zero.
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            versions: [
                U32BE::new(BOLT_VERSION_1),
                U32BE::new(0),
                U32BE::new(0),
                U32BE::new(0),
            ],
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(data)
            .map_err(|_| Error::Handshake("truncated handshake request".to_string()))
    }

    /// Verify the magic and select the first mutually supported version.
    pub fn negotiate(&self) -> Result<u32> {
        if self.magic != MAGIC {
            return Err(Error::Handshake(
                "incorrect magic byte sequence".to_string(),
            ));
        }
        self.versions
            .iter()
            .map(|version| U32BE::get(*version))
            .find(|version| *version == BOLT_VERSION_1)
            .ok_or_else(|| Error::Handshake("no mutually supported protocol version".to_string()))
    }
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode the server's 4-byte big-endian version reply.
pub fn encode_reply(version: u32) -> [u8; HANDSHAKE_REPLY_LEN] {
    version.to_be_bytes()
}

/// Verify the server's version reply on the client side.
pub fn verify_reply(data: &[u8; HANDSHAKE_REPLY_LEN]) -> Result<u32> {
    let version = u32::from_be_bytes(*data);
    if version != BOLT_VERSION_1 {
        return Err(Error::Handshake(format!(
            "server selected unsupported protocol version {}",
            version
        )));
    }
    Ok(version)
}
