//! Peer-to-peer wire protocol serialization core.
//!
//! The layers, bottom up:
//!
//! - [`transport`]: the byte channel behind every codec (generic stream
//!   or live socket), with an exact-read-or-fail contract
//! - [`primitive`]: per-primitive encode/decode rules (LE/BE integers,
//!   fixed arrays, canonical CompactSize, bounded byte strings)
//! - [`reflect`]: ordered named field sequences and the generic
//!   composite codec that walks them
//! - [`message`]: message schemas riding the generic path, the
//!   [`Payload`] seam, and command dispatch
//! - [`tx`]: the transaction message, whose content-dependent layout
//!   needs its own codec
//! - [`codec`]: frame header handling and whole-message read/write
//!
//! Socket setup, peer discovery and semantic validation of message
//! contents live outside this module; everything here is byte-level
//! round-tripping.

pub mod codec;
pub mod constants;
pub mod error;
pub mod message;
pub mod primitive;
pub mod reflect;
pub mod transport;
pub mod tx;

pub use codec::{read_message, read_raw, write_message, Header, RawMessage};
pub use error::WireError;
pub use message::{Command, Message, Payload, Ping, Pong, Services, Verack, VersionMessage};
pub use reflect::{Field, FieldMut, Reflect};
pub use transport::{SocketTransport, StreamTransport, Transport};
pub use tx::{OutPoint, Transaction, TxIn, TxOut, Witness};
