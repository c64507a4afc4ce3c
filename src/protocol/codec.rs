//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol described in
//! the module-level docs: `[tag:1][len:4 big-endian][payload]` framing
//! for both commands and responses.

use std::io::{Read, Write};

use crate::error::{RidgeError, Result};

use super::{Command, CommandType, Response, Status};

/// Size of the fixed `tag + len` header on the wire.
const HEADER_SIZE: usize = 5;

// =============================================================================
// Commands
// =============================================================================

/// Encode a command to bytes.
pub fn encode_command(command: &Command) -> Vec<u8> {
    let payload = command_payload(command);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(command.command_type() as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    buf
}

/// Decode a command from a complete, in-memory buffer.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    if bytes.len() < HEADER_SIZE {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete header: need {HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }

    let tag = bytes[0];
    let payload_len = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;

    if bytes.len() < HEADER_SIZE + payload_len {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete payload: need {payload_len} bytes, got {}",
            bytes.len() - HEADER_SIZE
        )));
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];
    parse_command(tag, payload)
}

/// Write a command to any `Write` stream, framed the same way as [`encode_command`].
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    Ok(())
}

/// Read a single framed command from any `Read` stream.
///
/// IO errors (including a clean EOF at the start of a header, which
/// signals the peer closing the connection) are propagated as-is so
/// callers can distinguish disconnects from malformed frames.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let tag = header[0];
    let payload_len = u32::from_be_bytes(header[1..5].try_into().unwrap()) as usize;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    parse_command(tag, &payload)
}

fn command_payload(command: &Command) -> Vec<u8> {
    match command {
        Command::Get { key } | Command::Delete { key } => {
            let mut payload = Vec::with_capacity(4 + key.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key);
            payload
        }
        Command::Put { key, value } => {
            let mut payload = Vec::with_capacity(4 + key.len() + value.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key);
            payload.extend_from_slice(value);
            payload
        }
        Command::Ping => Vec::new(),
    }
}

fn parse_command(tag: u8, payload: &[u8]) -> Result<Command> {
    match tag {
        t if t == CommandType::Get as u8 => Ok(Command::Get {
            key: parse_keyed_payload(payload)?.0,
        }),
        t if t == CommandType::Delete as u8 => Ok(Command::Delete {
            key: parse_keyed_payload(payload)?.0,
        }),
        t if t == CommandType::Put as u8 => {
            let (key, rest) = parse_keyed_payload(payload)?;
            Ok(Command::Put {
                key,
                value: rest.to_vec(),
            })
        }
        t if t == CommandType::Ping as u8 => {
            if !payload.is_empty() {
                return Err(RidgeError::DecodeError(
                    "PING command has unexpected payload".into(),
                ));
            }
            Ok(Command::Ping)
        }
        other => Err(RidgeError::DecodeError(format!(
            "Unknown command type: {other:#04x}"
        ))),
    }
}

/// Split a `key_len(4) | key | ...` payload into the key and whatever
/// bytes remain (the value, for PUT; empty, for GET/DELETE).
fn parse_keyed_payload(payload: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    if payload.len() < 4 {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete key length: need 4 bytes, got {}",
            payload.len()
        )));
    }
    let key_len = u32::from_be_bytes(payload[0..4].try_into().unwrap()) as usize;
    if payload.len() < 4 + key_len {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete key: need {key_len} bytes, got {}",
            payload.len() - 4
        )));
    }
    let key = payload[4..4 + key_len].to_vec();
    let rest = &payload[4 + key_len..];
    Ok((key, rest))
}

// =============================================================================
// Responses
// =============================================================================

/// Encode a response to bytes.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(response.status as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decode a response from a complete, in-memory buffer.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.len() < HEADER_SIZE {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete header: need {HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }

    let tag = bytes[0];
    let payload_len = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;

    if bytes.len() < HEADER_SIZE + payload_len {
        return Err(RidgeError::DecodeError(format!(
            "Incomplete payload: need {payload_len} bytes, got {}",
            bytes.len() - HEADER_SIZE
        )));
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];
    parse_response(tag, payload)
}

/// Write a response to any `Write` stream, framed the same way as [`encode_response`].
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    Ok(())
}

/// Read a single framed response from any `Read` stream.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let tag = header[0];
    let payload_len = u32::from_be_bytes(header[1..5].try_into().unwrap()) as usize;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    parse_response(tag, &payload)
}

fn parse_response(tag: u8, payload: &[u8]) -> Result<Response> {
    match tag {
        t if t == Status::Ok as u8 => Ok(Response {
            status: Status::Ok,
            payload: if payload.is_empty() {
                None
            } else {
                Some(payload.to_vec())
            },
        }),
        t if t == Status::NotFound as u8 => Ok(Response {
            status: Status::NotFound,
            payload: None,
        }),
        t if t == Status::Error as u8 => Ok(Response {
            status: Status::Error,
            payload: Some(payload.to_vec()),
        }),
        other => Err(RidgeError::DecodeError(format!(
            "Unknown response status: {other:#04x}"
        ))),
    }
}
