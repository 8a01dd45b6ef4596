//! Bolt message envelopes.
//!
//! A message is a structure whose signature identifies the message kind and
//! whose field count is fixed per signature. Serializing a message also
//! seals it on the write buffer, emitting the terminal `0x0000` chunk.

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::constant::{MessageSignature, marker};
use crate::error::{Error, Result};
use crate::protocol::primitive::{read_u8, read_u16, write_u8};
use crate::protocol::value::{pack_list, pack_map, pack_str, unpack_structure};
use crate::value::{Map, Structure, Value};

/// One Bolt v1 message, client- or server-originated.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Init { client_name: String, auth_token: Map },
    Run { statement: String, parameters: Map },
    DiscardAll,
    PullAll,
    AckFailure,
    Reset,
    Record { fields: Vec<Value> },
    Success { metadata: Map },
    Failure { metadata: Map },
    Ignored { metadata: Map },
}

impl Message {
    pub fn signature(&self) -> MessageSignature {
        match self {
            Self::Init { .. } => MessageSignature::Init,
            Self::Run { .. } => MessageSignature::Run,
            Self::DiscardAll => MessageSignature::DiscardAll,
            Self::PullAll => MessageSignature::PullAll,
            Self::AckFailure => MessageSignature::AckFailure,
            Self::Reset => MessageSignature::Reset,
            Self::Record { .. } => MessageSignature::Record,
            Self::Success { .. } => MessageSignature::Success,
            Self::Failure { .. } => MessageSignature::Failure,
            Self::Ignored { .. } => MessageSignature::Ignored,
        }
    }
}

/// Serialize `message` as a structure and seal it as one logical message.
pub fn serialize_message(message: &Message, buf: &mut ChunkedWriteBuffer) -> Result<()> {
    let signature = message.signature();
    // Message arity never exceeds 2, so the tiny structure header always fits.
    write_u8(buf, marker::TINY_STRUCT | signature.arity() as u8);
    write_u8(buf, signature as u8);
    match message {
        Message::Init {
            client_name,
            auth_token,
        } => {
            pack_str(client_name, buf)?;
            pack_map(auth_token, buf)?;
        }
        Message::Run {
            statement,
            parameters,
        } => {
            pack_str(statement, buf)?;
            pack_map(parameters, buf)?;
        }
        Message::Record { fields } => pack_list(fields, buf)?,
        Message::Success { metadata }
        | Message::Failure { metadata }
        | Message::Ignored { metadata } => pack_map(metadata, buf)?,
        Message::DiscardAll | Message::PullAll | Message::AckFailure | Message::Reset => {}
    }
    buf.write_eof();
    Ok(())
}

/// Deserialize the next whole message from the read buffer.
pub fn deserialize_message(buf: &mut ChunkedReadBuffer) -> Result<Message> {
    let m = read_u8(buf)?;
    let size = match m {
        _ if m & 0xF0 == marker::TINY_STRUCT => (m & 0x0F) as usize,
        marker::STRUCT_8 => read_u8(buf)? as usize,
        marker::STRUCT_16 => read_u16(buf)? as usize,
        _ => {
            return Err(Error::Protocol(
                "messages must be wrapped in a structure".to_string(),
            ));
        }
    };
    let structure = unpack_structure(size, buf)?;
    from_structure(structure)
}

fn from_structure(structure: Structure) -> Result<Message> {
    let Structure { signature, fields } = structure;
    let Some(signature) = MessageSignature::from_u8(signature) else {
        return Err(Error::Protocol(format!(
            "structure signature '0x{:02X}' is not a message",
            signature
        )));
    };
    let mut fields = fields.into_iter();
    Ok(match signature {
        MessageSignature::Init => {
            let client_name = expect_string(fields.next())?;
            let auth_token = expect_map(fields.next())?;
            Message::Init {
                client_name,
                auth_token,
            }
        }
        MessageSignature::Run => {
            let statement = expect_string(fields.next())?;
            let parameters = expect_map(fields.next())?;
            Message::Run {
                statement,
                parameters,
            }
        }
        MessageSignature::DiscardAll => Message::DiscardAll,
        MessageSignature::PullAll => Message::PullAll,
        MessageSignature::AckFailure => Message::AckFailure,
        MessageSignature::Reset => Message::Reset,
        MessageSignature::Record => Message::Record {
            fields: expect_list(fields.next())?,
        },
        MessageSignature::Success => Message::Success {
            metadata: expect_map(fields.next())?,
        },
        MessageSignature::Failure => Message::Failure {
            metadata: expect_map(fields.next())?,
        },
        MessageSignature::Ignored => Message::Ignored {
            metadata: expect_map(fields.next())?,
        },
    })
}

fn expect_string(field: Option<Value>) -> Result<String> {
    match field {
        Some(Value::String(s)) => Ok(s),
        other => Err(Error::Protocol(format!(
            "expected a string field, got {:?}",
            other
        ))),
    }
}

fn expect_map(field: Option<Value>) -> Result<Map> {
    match field {
        Some(Value::Map(entries)) => Ok(entries),
        other => Err(Error::Protocol(format!(
            "expected a map field, got {:?}",
            other
        ))),
    }
}

fn expect_list(field: Option<Value>) -> Result<Vec<Value>> {
    match field {
        Some(Value::List(items)) => Ok(items),
        other => Err(Error::Protocol(format!(
            "expected a list field, got {:?}",
            other
        ))),
    }
}
