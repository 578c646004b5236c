/// Network magic value used in the message header.
///
/// The first 4 bytes of every message identify the network (mainnet,
/// testnet, regtest, signet) and act as a message boundary marker in the
/// TCP stream.
///
/// For mainnet, the magic value is `0xD9B4BEF9` (F9 BE B4 D9 in bytes).
///
/// Other network magic values:
/// - Mainnet:  0xD9B4BEF9
/// - Testnet3: 0x0709110B
/// - Regtest:  0xDAB5BFFA
/// - Signet:   0x40CF030A
pub const MAIN_NET_MAGIC: u32 = 0xD9B4BEF9;

/// Current P2P protocol version.
///
/// Sent in the `version` message during handshake and used for peer
/// capability negotiation. Serialized on the wire as a signed 32-bit
/// little-endian integer.
///
/// Notable versions: https://developer.bitcoin.org/reference/p2p_networking.html#protocol-versions
pub const PROTOCOL_VERSION: i32 = 70016;

/// Maximum accepted payload length in a message frame (32 MiB).
///
/// A peer declaring a longer payload is either broken or hostile; the
/// frame is rejected before any allocation happens.
pub const MAX_PAYLOAD_SIZE: u32 = 32 * 1024 * 1024;

/// Ceiling for var_int-prefixed byte strings and script fields.
///
/// Shares the frame bound: no single variable-length field can be larger
/// than the payload that carries it.
pub const MAX_VAR_LEN: u64 = MAX_PAYLOAD_SIZE as u64;

/// Ceiling for transaction input, output and witness item counts.
///
/// Far above anything a valid transaction can hold (a 32 MiB payload fits
/// fewer than a million minimal inputs), low enough to stop a declared
/// count from driving an unbounded allocation.
pub const MAX_TX_ITEMS: u64 = 100_000;
