//! Message framing: the fixed 24-byte header and whole-message I/O.
//!
//! Frame layout:
//!
//! ```text
//! +------------+--------------+---------------+-------------+
//! | magic (4)  | command (12) | length (4 LE) | checksum (4)|
//! +------------+--------------+---------------+-------------+
//! | payload (variable, up to 32 MiB)                    ... |
//! +---------------------------------------------------------+
//! ```
//!
//! The checksum is the first 4 bytes of SHA256(SHA256(payload)). It is
//! computed on every outbound frame; on inbound frames it is carried but
//! not verified, as with the network magic.
//!
//! https://developer.bitcoin.org/reference/p2p_networking.html#message-headers

use byteorder::{ByteOrder, LittleEndian};
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::wire::constants::{MAIN_NET_MAGIC, MAX_PAYLOAD_SIZE};
use crate::wire::error::WireError;
use crate::wire::message::{Command, Payload};
use crate::wire::transport::{StreamTransport, Transport};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Decoded frame header.
///
/// Built immediately before a payload is written and discarded right
/// after the payload it announces has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub command: Command,
    pub length: u32,
    pub checksum: [u8; 4],
}

impl Header {
    /// Builds the header announcing `payload` under `command`.
    pub fn build(command: Command, payload: &[u8]) -> Self {
        Self {
            magic: MAIN_NET_MAGIC.to_le_bytes(),
            command,
            length: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn write<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..16].copy_from_slice(&self.command.as_bytes());
        LittleEndian::write_u32(&mut buf[16..20], self.length);
        buf[20..24].copy_from_slice(&self.checksum);
        t.write_bytes(&buf)
    }

    /// Reads and parses the next header, rejecting payload lengths above
    /// [`MAX_PAYLOAD_SIZE`] before anything is allocated for them.
    pub fn read<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError> {
        let mut buf = [0u8; HEADER_SIZE];
        t.read_bytes(&mut buf).map_err(|e| e.for_field("header"))?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);

        let mut cmd = [0u8; 12];
        cmd.copy_from_slice(&buf[4..16]);
        let command = Command::from(&cmd);

        let length = LittleEndian::read_u32(&buf[16..20]);
        if length > MAX_PAYLOAD_SIZE {
            return Err(WireError::LengthOutOfBounds {
                context: "payload",
                len: length as u64,
                max: MAX_PAYLOAD_SIZE as u64,
            });
        }

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&buf[20..24]);

        Ok(Self {
            magic,
            command,
            length,
            checksum,
        })
    }
}

/// A frame read off the wire with its payload still undecoded.
#[derive(Debug)]
pub struct RawMessage {
    pub command: Command,
    pub payload: Vec<u8>,
    pub magic: [u8; 4],
    pub checksum: [u8; 4],
}

/// Writes a complete frame: header, then payload.
pub fn write_message<T, P>(t: &mut T, message: &P) -> Result<(), WireError>
where
    T: Transport + ?Sized,
    P: Payload,
{
    let mut body = Vec::new();
    message.encode_payload(&mut StreamTransport::new(Cursor::new(&mut body)))?;

    Header::build(P::COMMAND, &body).write(t)?;
    t.write_bytes(&body)
}

/// Reads the next frame without interpreting its payload.
///
/// For callers that dispatch on the command themselves; see
/// [`Message::try_from`](crate::wire::message::Message).
pub fn read_raw<T: Transport + ?Sized>(t: &mut T) -> Result<RawMessage, WireError> {
    let header = Header::read(t)?;
    let mut payload = vec![0u8; header.length as usize];
    t.read_bytes(&mut payload).map_err(|e| e.for_field("payload"))?;

    Ok(RawMessage {
        command: header.command,
        payload,
        magic: header.magic,
        checksum: header.checksum,
    })
}

/// Reads the next frame, requiring it to carry a `P` payload.
///
/// The payload is drained from the transport before the command check
/// resolves, so a mismatch leaves the stream aligned on the following
/// frame; the caller gets [`WireError::UnexpectedCommand`] and no
/// partially-decoded value.
pub fn read_message<T, P>(t: &mut T) -> Result<P, WireError>
where
    T: Transport + ?Sized,
    P: Payload,
{
    let header = Header::read(t)?;
    let mut payload = vec![0u8; header.length as usize];
    t.read_bytes(&mut payload).map_err(|e| e.for_field("payload"))?;

    if header.command != P::COMMAND {
        return Err(WireError::UnexpectedCommand {
            expected: P::COMMAND,
            actual: header.command,
        });
    }

    P::decode_payload(&mut StreamTransport::new(Cursor::new(payload)))
}

/// First 4 bytes of SHA256(SHA256(payload)).
fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}
