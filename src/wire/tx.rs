//! Transaction message and its content-dependent codec.
//!
//! The raw transaction format overloads one byte position: the var_int
//! right after `version` is either the input count or, when zero, the
//! first byte of a two-byte marker announcing that witness data follows
//! (BIP144). A zero input count is structurally impossible, since every
//! transaction spends at least one input, and that is what makes the
//! sentinel unambiguous. The generic field walk cannot express that, so
//! this type carries its own [`Payload`] implementation; any future
//! message with a similar overloaded sentinel gets its own override in
//! the same way rather than a generalized mechanism.
//!
//! https://developer.bitcoin.org/reference/transactions.html#raw-transaction-format

use crate::wire::constants::MAX_TX_ITEMS;
use crate::wire::error::WireError;
use crate::wire::message::{Command, Payload};
use crate::wire::primitive;
use crate::wire::reflect::{self, Field, FieldMut, Reflect};
use crate::wire::transport::Transport;

/// Reference to the output being spent: the funding transaction id and
/// the index of the output within it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl Reflect for OutPoint {
    fn field_names(&self) -> &'static [&'static str] {
        &["txid", "vout"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::Bytes32(&self.txid), Field::U32(&self.vout)]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![FieldMut::Bytes32(&mut self.txid), FieldMut::U32(&mut self.vout)]
    }
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl Reflect for TxIn {
    fn field_names(&self) -> &'static [&'static str] {
        &["previous_output", "script_sig", "sequence"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::Nested(&self.previous_output),
            Field::VarBytes(&self.script_sig),
            Field::U32(&self.sequence),
        ]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![
            FieldMut::Nested(&mut self.previous_output),
            FieldMut::VarBytes(&mut self.script_sig),
            FieldMut::U32(&mut self.sequence),
        ]
    }
}

/// Transaction output: amount in satoshis and the locking script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}

impl Reflect for TxOut {
    fn field_names(&self) -> &'static [&'static str] {
        &["value", "script_pubkey"]
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::I64(&self.value), Field::VarBytes(&self.script_pubkey)]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        vec![
            FieldMut::I64(&mut self.value),
            FieldMut::VarBytes(&mut self.script_pubkey),
        ]
    }
}

/// Witness stack for one input: a var_int item count followed by that
/// many var_bytes items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Witness {
    pub items: Vec<Vec<u8>>,
}

/// A wire-format transaction.
///
/// `witnesses` is either empty (legacy serialization, no marker bytes on
/// the wire at all) or holds exactly one stack per input, in input
/// order. Encoding derives witness presence from that emptiness; there
/// is no separate flag to keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub witnesses: Vec<Witness>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        !self.witnesses.is_empty()
    }
}

impl Payload for Transaction {
    const COMMAND: Command = Command::Tx;

    fn encode_payload<T: Transport + ?Sized>(&self, t: &mut T) -> Result<(), WireError> {
        primitive::write_i32(t, self.version)?;
        if self.has_witness() {
            // marker: a zero where the input count would be, then the flag
            primitive::write_u8(t, 0x00)?;
            primitive::write_u8(t, 0x01)?;
        }
        reflect::write_list(t, &self.inputs)?;
        reflect::write_list(t, &self.outputs)?;
        if self.has_witness() {
            for witness in &self.witnesses {
                write_witness(t, witness)?;
            }
        }
        primitive::write_u32(t, self.lock_time)
    }

    fn decode_payload<T: Transport + ?Sized>(t: &mut T) -> Result<Self, WireError> {
        let version = primitive::read_i32(t, "tx.version")?;

        let mut input_count = primitive::read_var_int(t, "tx.inputs")?;
        let mut segwit = false;
        if input_count == 0 {
            // A transaction always has at least one input, so a zero here
            // can only be the first marker byte. The flag byte that
            // follows carries nothing this codec uses.
            let _flag = primitive::read_u8(t, "tx.witness_flag")?;
            segwit = true;
            input_count = primitive::read_var_int(t, "tx.inputs")?;
        }
        if input_count > MAX_TX_ITEMS {
            return Err(WireError::LengthOutOfBounds {
                context: "tx.inputs",
                len: input_count,
                max: MAX_TX_ITEMS,
            });
        }

        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(reflect::decode(t)?);
        }

        let outputs = reflect::read_list(t, "tx.outputs", MAX_TX_ITEMS)?;

        // One stack per input, in input order. Without the marker the
        // witness section is wholly absent from the stream, not empty.
        let witnesses = if segwit {
            let mut stacks = Vec::with_capacity(inputs.len());
            for _ in 0..inputs.len() {
                stacks.push(read_witness(t)?);
            }
            stacks
        } else {
            Vec::new()
        };

        let lock_time = primitive::read_u32(t, "tx.lock_time")?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            witnesses,
            lock_time,
        })
    }
}

fn write_witness<T: Transport + ?Sized>(t: &mut T, witness: &Witness) -> Result<(), WireError> {
    primitive::write_var_int(t, witness.items.len() as u64)?;
    for item in &witness.items {
        primitive::write_var_bytes(t, item)?;
    }
    Ok(())
}

fn read_witness<T: Transport + ?Sized>(t: &mut T) -> Result<Witness, WireError> {
    let count = primitive::read_var_int(t, "tx.witness")?;
    if count > MAX_TX_ITEMS {
        return Err(WireError::LengthOutOfBounds {
            context: "tx.witness",
            len: count,
            max: MAX_TX_ITEMS,
        });
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(primitive::read_var_bytes(t, "tx.witness")?);
    }
    Ok(Witness { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::transport::StreamTransport;
    use std::io::Cursor;

    fn encode(tx: &Transaction) -> Vec<u8> {
        let mut t = StreamTransport::new(Cursor::new(Vec::new()));
        tx.encode_payload(&mut t).unwrap();
        t.into_inner().into_inner()
    }

    fn decode(bytes: Vec<u8>) -> Result<Transaction, WireError> {
        Transaction::decode_payload(&mut StreamTransport::new(Cursor::new(bytes)))
    }

    fn sample_input() -> TxIn {
        TxIn {
            previous_output: OutPoint {
                txid: [0x11; 32],
                vout: 0,
            },
            script_sig: vec![0xAB, 0xCD],
            sequence: 0xFFFF_FFFF,
        }
    }

    fn sample_output() -> TxOut {
        TxOut {
            value: 50_000,
            script_pubkey: vec![0x76, 0xA9, 0x14],
        }
    }

    fn legacy_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![sample_input()],
            outputs: vec![sample_output()],
            witnesses: vec![],
            lock_time: 820000,
        }
    }

    fn segwit_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![sample_input(), sample_input()],
            outputs: vec![sample_output()],
            witnesses: vec![
                Witness {
                    items: vec![vec![0x30, 0x45], vec![0x02, 0x21]],
                },
                Witness { items: vec![] },
            ],
            lock_time: 0,
        }
    }

    /// Hand-built legacy serialization of `legacy_tx()`.
    fn legacy_tx_bytes() -> Vec<u8> {
        let mut p = vec![];
        p.extend_from_slice(&2i32.to_le_bytes()); // version
        p.push(1); // input count
        p.extend_from_slice(&[0x11; 32]); // txid
        p.extend_from_slice(&0u32.to_le_bytes()); // vout
        p.push(2); // script_sig length
        p.extend_from_slice(&[0xAB, 0xCD]);
        p.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // sequence
        p.push(1); // output count
        p.extend_from_slice(&50_000i64.to_le_bytes()); // value
        p.push(3); // script_pubkey length
        p.extend_from_slice(&[0x76, 0xA9, 0x14]);
        p.extend_from_slice(&820000u32.to_le_bytes()); // lock_time
        p
    }

    #[test]
    fn legacy_layout_matches_hand_built_bytes() {
        assert_eq!(encode(&legacy_tx()), legacy_tx_bytes());
    }

    #[test]
    fn legacy_round_trips() {
        let tx = legacy_tx();
        let decoded = decode(encode(&tx)).unwrap();
        assert_eq!(decoded, tx);
        assert!(!decoded.has_witness());
    }

    #[test]
    fn empty_witness_list_omits_the_marker_entirely() {
        let bytes = encode(&legacy_tx());
        // byte 4 is the input count; with a marker it would be zero
        assert_eq!(bytes[4], 1);
    }

    #[test]
    fn segwit_encode_places_marker_after_version() {
        let bytes = encode(&segwit_tx());
        assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
        assert_eq!(bytes[4], 0x00); // marker
        assert_eq!(bytes[5], 0x01); // flag
        assert_eq!(bytes[6], 2); // true input count
    }

    #[test]
    fn segwit_round_trips_with_witness_stacks_intact() {
        let tx = segwit_tx();
        let decoded = decode(encode(&tx)).unwrap();
        assert!(decoded.has_witness());
        assert_eq!(decoded, tx);
    }

    #[test]
    fn zero_sentinel_switches_to_witness_decoding() {
        let decoded = decode(encode(&segwit_tx())).unwrap();
        assert_eq!(decoded.witnesses.len(), decoded.inputs.len());
        assert_eq!(decoded.witnesses[0].items.len(), 2);
        assert!(decoded.witnesses[1].items.is_empty());
    }

    #[test]
    fn all_empty_witness_stacks_still_round_trip() {
        // Distinct from the legacy form: the marker is on the wire and
        // each input has an empty stack.
        let tx = Transaction {
            witnesses: vec![Witness { items: vec![] }],
            ..legacy_tx()
        };
        let bytes = encode(&tx);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(decode(bytes).unwrap(), tx);
    }

    #[test]
    fn truncated_input_list_reports_end_of_input() {
        let mut bytes = legacy_tx_bytes();
        bytes.truncate(20); // cut inside the outpoint txid
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEndOfInput(_)));
    }

    #[test]
    fn missing_lock_time_reports_end_of_input() {
        let mut bytes = legacy_tx_bytes();
        bytes.truncate(bytes.len() - 4);
        let err = decode(bytes).unwrap_err();
        assert!(matches!(
            err,
            WireError::UnexpectedEndOfInput("tx.lock_time")
        ));
    }

    #[test]
    fn input_count_above_ceiling_is_rejected() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(0xFE);
        bytes.extend_from_slice(&1_000_000u32.to_le_bytes());
        let err = decode(bytes).unwrap_err();
        assert!(matches!(
            err,
            WireError::LengthOutOfBounds {
                context: "tx.inputs",
                ..
            }
        ));
    }

    #[test]
    fn non_minimal_input_count_is_malformed() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&[0xFD, 0x01, 0x00]); // 1 in escaped form
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, WireError::MalformedEncoding("tx.inputs")));
    }
}
