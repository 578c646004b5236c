use std::fmt::{self, Debug, Formatter};
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::wire::codec::RawMessage;
use crate::wire::constants::PROTOCOL_VERSION;
use crate::wire::error::WireError;
use crate::wire::reflect::{self, Field, FieldMut, Reflect};
use crate::wire::transport::{StreamTransport, Transport};
use crate::wire::tx::Transaction;

/// Commands this crate can frame and dispatch.
///
/// The command travels as a 12-byte ASCII field, zero-padded, inside the
/// message header. Anything the parser does not recognize maps to
/// [`Command::Unknown`] rather than failing the frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    Tx,
    Unknown,
}

impl From<&[u8; 12]> for Command {
    fn from(bytes: &[u8; 12]) -> Self {
        let cmd = std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_matches(char::from(0));

        match cmd {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "tx" => Command::Tx,
            _ => Command::Unknown,
        }
    }
}

impl Command {
    /// Returns the zero-padded 12-byte command field.
    pub fn as_bytes(&self) -> [u8; 12] {
        let name: &[u8] = match self {
            Command::Version => b"version",
            Command::Verack => b"verack",
            Command::Ping => b"ping",
            Command::Pong => b"pong",
            Command::Tx => b"tx",
            Command::Unknown => b"",
        };

        let mut padded = [0u8; 12];
        padded[..name.len()].copy_from_slice(name);
        padded
    }
}

/// A message payload bound to its command.
///
/// This is the codec-selection seam: generic-path types delegate both
/// methods to the composite codec over their [`Reflect`] declaration,
/// while types whose layout depends on runtime content (the transaction)
/// supply their own encode/decode. Selection is always an explicit impl,
/// never inferred from the bytes.
pub trait Payload: Sized {
    const COMMAND: Command;

    fn encode_payload<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError>;

    fn decode_payload<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError>;
}

/// Service flags advertised in the `version` message.
///
/// A `u64` bitfield on the wire; unknown bits are preserved.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Services(u64);

impl Services {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Not a full node; may only relay transactions it originates.
    pub const NONE: Services = Services(0x00);

    /// Full node, can be asked for full blocks.
    pub const NODE_NETWORK: Services = Services(0x01);

    /// Supports bloom-filtered connections (BIP111).
    pub const NODE_BLOOM: Services = Services(0x04);

    /// Can provide blocks and transactions with witness data (BIP144).
    pub const NODE_WITNESS: Services = Services(0x08);

    /// Full node limited to the most recent 288 blocks (BIP159).
    pub const NODE_NETWORK_LIMITED: Services = Services(0x0400);

    pub fn names(self) -> Vec<&'static str> {
        if self.is_empty() {
            return vec!["NONE"];
        }

        let mut names = Vec::new();
        if self.contains(Self::NODE_NETWORK) {
            names.push("NODE_NETWORK");
        }
        if self.contains(Self::NODE_BLOOM) {
            names.push("NODE_BLOOM");
        }
        if self.contains(Self::NODE_WITNESS) {
            names.push("NODE_WITNESS");
        }
        if self.contains(Self::NODE_NETWORK_LIMITED) {
            names.push("NODE_NETWORK_LIMITED");
        }
        names
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }
        write!(f, "Services({}) [0x{:016x}]", self.names().join(" | "), self.bits())
    }
}

/// Network address as embedded in `version` payloads: an 8-byte service
/// bitfield, a 16-byte address and a big-endian port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAddr {
    pub services: u64,
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for NetAddr {
    fn default() -> Self {
        Self {
            services: 0,
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl Reflect for NetAddr {
    fn field_names(&self) -> &'static [&'static str] {
        &["services", "ip", "port"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::U64(&self.services),
            Field::Ip(&self.ip),
            Field::U16Be(&self.port),
        ]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![
            FieldMut::U64(&mut self.services),
            FieldMut::Ip(&mut self.ip),
            FieldMut::U16Be(&mut self.port),
        ]
    }
}

/// The `version` handshake message.
///
/// Payload layout:
///
/// ```text
/// int32    version
/// uint64   services
/// int64    timestamp
/// net_addr addr_recv
/// net_addr addr_from
/// uint64   nonce
/// var_str  user_agent
/// int32    start_height
/// bool     relay
/// ```
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionMessage {
    pub version: i32,
    pub services: Services,
    pub timestamp: i64,
    pub addr_recv: NetAddr,
    pub addr_from: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

impl VersionMessage {
    /// Builds the version message this node announces when dialing out:
    /// current timestamp, random nonce, zeroed addresses, height 0.
    pub fn outbound(services: Services) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0); // clock before epoch

        Self {
            version: PROTOCOL_VERSION,
            services,
            timestamp,
            addr_recv: NetAddr::default(),
            addr_from: NetAddr::default(),
            nonce: rand::thread_rng().gen(),
            user_agent: format!("/peerwire:{}/", env!("CARGO_PKG_VERSION")),
            start_height: 0,
            relay: false,
        }
    }
}

impl Reflect for VersionMessage {
    fn field_names(&self) -> &'static [&'static str] {
        &[
            "version",
            "services",
            "timestamp",
            "addr_recv",
            "addr_from",
            "nonce",
            "user_agent",
            "start_height",
            "relay",
        ]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::I32(&self.version),
            Field::Services(&self.services),
            Field::I64(&self.timestamp),
            Field::Nested(&self.addr_recv),
            Field::Nested(&self.addr_from),
            Field::U64(&self.nonce),
            Field::VarString(&self.user_agent),
            Field::I32(&self.start_height),
            Field::Bool(&self.relay),
        ]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![
            FieldMut::I32(&mut self.version),
            FieldMut::Services(&mut self.services),
            FieldMut::I64(&mut self.timestamp),
            FieldMut::Nested(&mut self.addr_recv),
            FieldMut::Nested(&mut self.addr_from),
            FieldMut::U64(&mut self.nonce),
            FieldMut::VarString(&mut self.user_agent),
            FieldMut::I32(&mut self.start_height),
            FieldMut::Bool(&mut self.relay),
        ]
    }
}

impl Payload for VersionMessage {
    const COMMAND: Command = Command::Version;

    fn encode_payload<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError> {
        reflect::write_value(t, self)
    }

    fn decode_payload<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError> {
        reflect::decode(t)
    }
}

/// Handshake acknowledgement; the payload is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verack;

impl Payload for Verack {
    const COMMAND: Command = Command::Verack;

    fn encode_payload<T: Transport + ?Sized>(&self, _t: &mut T) -> Result<(), WireError> {
        Ok(())
    }

    fn decode_payload<T: Transport + ?Sized>(_t: &mut T) -> Result<Self, WireError> {
        Ok(Verack)
    }
}

/// Keepalive probe carrying a nonce the peer must echo back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ping {
    pub nonce: u64,
}

impl Reflect for Ping {
    fn field_names(&self) -> &'static [&'static str] {
        &["nonce"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::U64(&self.nonce)]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![FieldMut::U64(&mut self.nonce)]
    }
}

impl Payload for Ping {
    const COMMAND: Command = Command::Ping;

    fn encode_payload<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError> {
        reflect::write_value(t, self)
    }

    fn decode_payload<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError> {
        reflect::decode(t)
    }
}

/// Reply to a [`Ping`], echoing its nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pong {
    pub nonce: u64,
}

impl Reflect for Pong {
    fn field_names(&self) -> &'static [&'static str] {
        &["nonce"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::U64(&self.nonce)]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![FieldMut::U64(&mut self.nonce)]
    }
}

impl Payload for Pong {
    const COMMAND: Command = Command::Pong;

    fn encode_payload<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError> {
        reflect::write_value(t, self)
    }

    fn decode_payload<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError> {
        reflect::decode(t)
    }
}

/// A fully-decoded message, dispatched from a raw frame by command.
///
/// Callers that already know which message they expect should use
/// [`read_message`](crate::wire::codec::read_message) instead; this enum
/// is for sequential peer traffic where the next command is unknown.
#[derive(Debug)]
pub enum Message {
    Version(VersionMessage),
    Verack,
    Ping(Ping),
    Pong(Pong),
    Tx(Transaction),
    Unknown { payload: Vec<u8> },
}

impl TryFrom<RawMessage> for Message {
    type Error = WireError;

    fn try_from(raw: RawMessage) -> Result<Self, WireError> {
        let mut t = StreamTransport::new(Cursor::new(raw.payload));
        Ok(match raw.command {
            Command::Version => Message::Version(VersionMessage::decode_payload(&mut t)?),
            Command::Verack => Message::Verack,
            Command::Ping => Message::Ping(Ping::decode_payload(&mut t)?),
            Command::Pong => Message::Pong(Pong::decode_payload(&mut t)?),
            Command::Tx => Message::Tx(Transaction::decode_payload(&mut t)?),
            Command::Unknown => Message::Unknown {
                payload: t.into_inner().into_inner(),
            },
        })
    }
}
