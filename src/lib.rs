//! Binary serialization framework for peer-to-peer wire protocols,
//! exemplified by a subset of the Bitcoin peer protocol.
//!
//! Message types declare their wire layout once, as an ordered sequence
//! of named fields ([`wire::Reflect`]); a generic codec walks that
//! declaration for encoding and decoding. Messages whose byte layout
//! depends on their content (the transaction with its witness marker)
//! override the generic path with their own [`wire::Payload`]
//! implementation. Framing, transports and a blocking peer session sit
//! on top.

pub mod session;
pub mod wire;
