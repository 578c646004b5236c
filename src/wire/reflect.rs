//! Field reflection and the generic composite codec.
//!
//! A message type becomes serializable by implementing [`Reflect`]: an
//! explicit, ordered declaration of its wire fields. The generic codec
//! walks that declaration, dispatching each accessor to the primitive
//! table and recursing into nested composites. Types whose wire layout is
//! not a fixed field sequence (the transaction) bypass this path with
//! their own [`Payload`](crate::wire::message::Payload) implementation.

use std::net::IpAddr;

use crate::wire::error::WireError;
use crate::wire::message::Services;
use crate::wire::primitive;
use crate::wire::transport::Transport;

/// Read-only accessor to one wire field of a composite.
pub enum Field<'a> {
    /// Explicitly big-endian 16-bit field (ports).
    U16Be(&'a u16),
    U32(&'a u32),
    U64(&'a u64),
    I32(&'a i32),
    I64(&'a i64),
    /// Single-byte boolean.
    Bool(&'a bool),
    /// Exact 32 bytes, no delimiter.
    Bytes32(&'a [u8; 32]),
    /// var_int length prefix + raw bytes.
    VarBytes(&'a [u8]),
    /// var_int length prefix + UTF-8 bytes.
    VarString(&'a str),
    /// 16-byte address field, IPv4 carried as `::ffff:a.b.c.d`.
    Ip(&'a IpAddr),
    /// Service-flag bitfield, u64 little-endian on the wire.
    Services(&'a Services),
    /// Nested composite, fields spliced in place.
    Nested(&'a dyn Reflect),
}

/// Mutable accessor to one wire field of a composite.
pub enum FieldMut<'a> {
    U16Be(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Bool(&'a mut bool),
    Bytes32(&'a mut [u8; 32]),
    VarBytes(&'a mut Vec<u8>),
    VarString(&'a mut String),
    Ip(&'a mut IpAddr),
    Services(&'a mut Services),
    Nested(&'a mut dyn Reflect),
}

/// Ordered, named field sequence of a serializable composite type.
///
/// The three methods must agree: same length, same order, and that order
/// is the wire contract. Encode order, decode order and declaration
/// order are one and the same, always. Names are used for error context
/// when a decode fails mid-field.
///
/// A type without this impl is simply not serializable via the generic
/// path; the capability check happens at compile time through the trait
/// bound, never as a runtime error.
pub trait Reflect {
    /// Field names, index-aligned with [`fields`](Reflect::fields) and
    /// [`fields_mut`](Reflect::fields_mut).
    fn field_names(&self) -> &'static [&'static str];

    /// Accessors for encoding, in wire order.
    fn fields(&self) -> Vec<Field<'_>>;

    /// Accessors for decoding, in wire order.
    fn fields_mut(&mut self) -> Vec<FieldMut<'_>>;
}

/// Encodes a composite by walking its declared field sequence.
pub fn write_value<T: Transport + ?Sized>(
    t: &mut T,
    value: &dyn Reflect,
) -> Result<(), WireError> {
    for field in value.fields() {
        write_field(t, field)?;
    }
    Ok(())
}

/// Decodes into an existing composite, field by field in declared order.
pub fn read_value<T: Transport + ?Sized>(
    t: &mut T,
    value: &mut dyn Reflect,
) -> Result<(), WireError> {
    let names = value.field_names();
    let fields = value.fields_mut();
    debug_assert_eq!(names.len(), fields.len());
    for (field, name) in fields.into_iter().zip(names.iter().copied()) {
        read_field(t, field, name)?;
    }
    Ok(())
}

/// Decodes a fresh composite from the transport.
pub fn decode<T, R>(t: &mut T) -> Result<R, WireError>
where
    T: Transport + ?Sized,
    R: Reflect + Default,
{
    let mut value = R::default();
    read_value(t, &mut value)?;
    Ok(value)
}

/// Writes a var_int element count followed by each element.
pub fn write_list<T, E>(t: &mut T, items: &[E]) -> Result<(), WireError>
where
    T: Transport + ?Sized,
    E: Reflect,
{
    primitive::write_var_int(t, items.len() as u64)?;
    for item in items {
        write_value(t, item)?;
    }
    Ok(())
}

/// Reads a var_int-prefixed element list, bounding the declared count.
pub fn read_list<T, E>(t: &mut T, field: &'static str, max: u64) -> Result<Vec<E>, WireError>
where
    T: Transport + ?Sized,
    E: Reflect + Default,
{
    let count = primitive::read_var_int(t, field)?;
    if count > max {
        return Err(WireError::LengthOutOfBounds {
            context: field,
            len: count,
            max,
        });
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(decode(t)?);
    }
    Ok(items)
}

fn write_field<T: Transport + ?Sized>(t: &mut T, field: Field<'_>) -> Result<(), WireError> {
    match field {
        Field::U16Be(v) => primitive::write_u16_be(t, *v),
        Field::U32(v) => primitive::write_u32(t, *v),
        Field::U64(v) => primitive::write_u64(t, *v),
        Field::I32(v) => primitive::write_i32(t, *v),
        Field::I64(v) => primitive::write_i64(t, *v),
        Field::Bool(v) => primitive::write_bool(t, *v),
        Field::Bytes32(v) => primitive::write_array(t, v),
        Field::VarBytes(v) => primitive::write_var_bytes(t, v),
        Field::VarString(v) => primitive::write_var_string(t, v),
        Field::Ip(v) => primitive::write_ip(t, v),
        Field::Services(v) => primitive::write_u64(t, v.bits()),
        Field::Nested(inner) => write_value(t, inner),
    }
}

fn read_field<T: Transport + ?Sized>(
    t: &mut T,
    field: FieldMut<'_>,
    name: &'static str,
) -> Result<(), WireError> {
    match field {
        FieldMut::U16Be(v) => *v = primitive::read_u16_be(t, name)?,
        FieldMut::U32(v) => *v = primitive::read_u32(t, name)?,
        FieldMut::U64(v) => *v = primitive::read_u64(t, name)?,
        FieldMut::I32(v) => *v = primitive::read_i32(t, name)?,
        FieldMut::I64(v) => *v = primitive::read_i64(t, name)?,
        FieldMut::Bool(v) => *v = primitive::read_bool(t, name)?,
        FieldMut::Bytes32(v) => *v = primitive::read_array(t, name)?,
        FieldMut::VarBytes(v) => *v = primitive::read_var_bytes(t, name)?,
        FieldMut::VarString(v) => *v = primitive::read_var_string(t, name)?,
        FieldMut::Ip(v) => *v = primitive::read_ip(t, name)?,
        FieldMut::Services(v) => *v = Services::new(primitive::read_u64(t, name)?),
        FieldMut::Nested(inner) => read_value(t, inner)?,
    }
    Ok(())
}
