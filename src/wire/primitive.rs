//! Per-primitive encode/decode rules shared by every codec in the crate.
//!
//! All multi-byte integers are little-endian on the wire unless a field is
//! explicitly tagged big-endian (ports). Variable-length integers use the
//! CompactSize scheme:
//!
//! ```text
//! value < 0xFD           1 byte, the value itself
//! value <= 0xFFFF        0xFD + uint16 LE
//! value <= 0xFFFFFFFF    0xFE + uint32 LE
//! otherwise              0xFF + uint64 LE
//! ```
//!
//! Decoding rejects non-minimal CompactSize forms: a value has exactly one
//! canonical encoding, so `0xFD 0x01 0x00` is malformed, not the number 1.
//!
//! https://developer.bitcoin.org/reference/p2p_networking.html#compactsize-unsigned-integers

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::net::{IpAddr, Ipv6Addr};

use crate::wire::constants::MAX_VAR_LEN;
use crate::wire::error::WireError;
use crate::wire::transport::Transport;

/// Escape prefix introducing a uint16 CompactSize.
const VAR_INT_U16: u8 = 0xFD;
/// Escape prefix introducing a uint32 CompactSize.
const VAR_INT_U32: u8 = 0xFE;
/// Escape prefix introducing a uint64 CompactSize.
const VAR_INT_U64: u8 = 0xFF;

pub fn read_u8<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<u8, WireError> {
    let mut buf = [0u8; 1];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(buf[0])
}

pub fn write_u8<T: Transport + ?Sized>(t: &mut T, v: u8) -> Result<(), WireError> {
    t.write_bytes(&[v])
}

pub fn read_u16_be<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<u16, WireError> {
    let mut buf = [0u8; 2];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(BigEndian::read_u16(&buf))
}

pub fn write_u16_be<T: Transport + ?Sized>(t: &mut T, v: u16) -> Result<(), WireError> {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, v);
    t.write_bytes(&buf)
}

pub fn read_u16<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<u16, WireError> {
    let mut buf = [0u8; 2];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(LittleEndian::read_u16(&buf))
}

pub fn read_u32<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<u32, WireError> {
    let mut buf = [0u8; 4];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(LittleEndian::read_u32(&buf))
}

pub fn write_u32<T: Transport + ?Sized>(t: &mut T, v: u32) -> Result<(), WireError> {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, v);
    t.write_bytes(&buf)
}

pub fn read_u64<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<u64, WireError> {
    let mut buf = [0u8; 8];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(LittleEndian::read_u64(&buf))
}

pub fn write_u64<T: Transport + ?Sized>(t: &mut T, v: u64) -> Result<(), WireError> {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, v);
    t.write_bytes(&buf)
}

pub fn read_i32<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<i32, WireError> {
    let mut buf = [0u8; 4];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(LittleEndian::read_i32(&buf))
}

pub fn write_i32<T: Transport + ?Sized>(t: &mut T, v: i32) -> Result<(), WireError> {
    let mut buf = [0u8; 4];
    LittleEndian::write_i32(&mut buf, v);
    t.write_bytes(&buf)
}

pub fn read_i64<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<i64, WireError> {
    let mut buf = [0u8; 8];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(LittleEndian::read_i64(&buf))
}

pub fn write_i64<T: Transport + ?Sized>(t: &mut T, v: i64) -> Result<(), WireError> {
    let mut buf = [0u8; 8];
    LittleEndian::write_i64(&mut buf, v);
    t.write_bytes(&buf)
}

/// Reads a single-byte boolean (any nonzero byte is true).
pub fn read_bool<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<bool, WireError> {
    Ok(read_u8(t, field)? != 0)
}

pub fn write_bool<T: Transport + ?Sized>(t: &mut T, v: bool) -> Result<(), WireError> {
    write_u8(t, v as u8)
}

/// Reads an exact-length byte array, no delimiter.
pub fn read_array<T: Transport + ?Sized, const N: usize>(
    t: &mut T,
    field: &'static str,
) -> Result<[u8; N], WireError> {
    let mut buf = [0u8; N];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(buf)
}

pub fn write_array<T: Transport + ?Sized, const N: usize>(
    t: &mut T,
    v: &[u8; N],
) -> Result<(), WireError> {
    t.write_bytes(v)
}

/// Reads the protocol's 16-byte address field.
///
/// IPv4 addresses travel as the standard `::ffff:a.b.c.d` mapping inside
/// the 16-byte field; anything else is native IPv6.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#addr
pub fn read_ip<T: Transport + ?Sized>(t: &mut T, field: &'static str) -> Result<IpAddr, WireError> {
    let octets: [u8; 16] = read_array(t, field)?;
    let v6 = Ipv6Addr::from(octets);
    Ok(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}

pub fn write_ip<T: Transport + ?Sized>(t: &mut T, ip: &IpAddr) -> Result<(), WireError> {
    let octets = match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    t.write_bytes(&octets)
}

/// Decodes a CompactSize integer, rejecting non-minimal forms.
pub fn read_var_int<T: Transport + ?Sized>(
    t: &mut T,
    field: &'static str,
) -> Result<u64, WireError> {
    let first = read_u8(t, field)?;
    match first {
        VAR_INT_U16 => {
            let v = read_u16(t, field)? as u64;
            if v < VAR_INT_U16 as u64 {
                return Err(WireError::MalformedEncoding(field));
            }
            Ok(v)
        }
        VAR_INT_U32 => {
            let v = read_u32(t, field)? as u64;
            if v <= u16::MAX as u64 {
                return Err(WireError::MalformedEncoding(field));
            }
            Ok(v)
        }
        VAR_INT_U64 => {
            let v = read_u64(t, field)?;
            if v <= u32::MAX as u64 {
                return Err(WireError::MalformedEncoding(field));
            }
            Ok(v)
        }
        n => Ok(n as u64),
    }
}

/// Encodes a CompactSize integer in its single canonical form.
pub fn write_var_int<T: Transport + ?Sized>(t: &mut T, v: u64) -> Result<(), WireError> {
    match v {
        0..=0xFC => write_u8(t, v as u8),
        0xFD..=0xFFFF => {
            write_u8(t, VAR_INT_U16)?;
            let mut buf = [0u8; 2];
            LittleEndian::write_u16(&mut buf, v as u16);
            t.write_bytes(&buf)
        }
        0x1_0000..=0xFFFF_FFFF => {
            write_u8(t, VAR_INT_U32)?;
            write_u32(t, v as u32)
        }
        _ => {
            write_u8(t, VAR_INT_U64)?;
            write_u64(t, v)
        }
    }
}

/// Reads a var_int length prefix followed by exactly that many bytes.
///
/// The declared length is checked against [`MAX_VAR_LEN`] before any
/// allocation happens.
pub fn read_var_bytes<T: Transport + ?Sized>(
    t: &mut T,
    field: &'static str,
) -> Result<Vec<u8>, WireError> {
    let len = read_var_int(t, field)?;
    if len > MAX_VAR_LEN {
        return Err(WireError::LengthOutOfBounds {
            context: field,
            len,
            max: MAX_VAR_LEN,
        });
    }
    let mut buf = vec![0u8; len as usize];
    t.read_bytes(&mut buf).map_err(|e| e.for_field(field))?;
    Ok(buf)
}

pub fn write_var_bytes<T: Transport + ?Sized>(t: &mut T, v: &[u8]) -> Result<(), WireError> {
    write_var_int(t, v.len() as u64)?;
    t.write_bytes(v)
}

/// Reads a var_int-prefixed UTF-8 string (e.g. the version user agent).
pub fn read_var_string<T: Transport + ?Sized>(
    t: &mut T,
    field: &'static str,
) -> Result<String, WireError> {
    let bytes = read_var_bytes(t, field)?;
    String::from_utf8(bytes).map_err(|_| WireError::MalformedEncoding(field))
}

pub fn write_var_string<T: Transport + ?Sized>(t: &mut T, v: &str) -> Result<(), WireError> {
    write_var_bytes(t, v.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::transport::StreamTransport;
    use std::io::Cursor;
    use std::net::Ipv4Addr;

    fn src(bytes: Vec<u8>) -> StreamTransport<Cursor<Vec<u8>>> {
        StreamTransport::new(Cursor::new(bytes))
    }

    fn encode<F>(f: F) -> Vec<u8>
    where
        F: FnOnce(&mut StreamTransport<Cursor<Vec<u8>>>),
    {
        let mut t = StreamTransport::new(Cursor::new(Vec::new()));
        f(&mut t);
        t.into_inner().into_inner()
    }

    #[test]
    fn var_int_zero_is_a_single_zero_byte() {
        assert_eq!(encode(|t| write_var_int(t, 0).unwrap()), vec![0x00]);
    }

    #[test]
    fn var_int_252_fits_in_one_byte() {
        assert_eq!(encode(|t| write_var_int(t, 252).unwrap()), vec![0xFC]);
    }

    #[test]
    fn var_int_253_takes_the_three_byte_escape() {
        assert_eq!(
            encode(|t| write_var_int(t, 253).unwrap()),
            vec![0xFD, 0xFD, 0x00]
        );
    }

    #[test]
    fn var_int_escape_thresholds_round_trip() {
        for v in [0u64, 1, 252, 253, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000] {
            let bytes = encode(|t| write_var_int(t, v).unwrap());
            assert_eq!(read_var_int(&mut src(bytes), "n").unwrap(), v);
        }
    }

    #[test]
    fn var_int_rejects_non_minimal_u16_form() {
        // 1 encoded with the 0xFD escape instead of a bare byte
        let err = read_var_int(&mut src(vec![0xFD, 0x01, 0x00]), "n").unwrap_err();
        assert!(matches!(err, WireError::MalformedEncoding("n")));
    }

    #[test]
    fn var_int_rejects_non_minimal_u32_form() {
        // 0xFFFF must use the 0xFD escape, not 0xFE
        let err = read_var_int(&mut src(vec![0xFE, 0xFF, 0xFF, 0x00, 0x00]), "n").unwrap_err();
        assert!(matches!(err, WireError::MalformedEncoding(_)));
    }

    #[test]
    fn var_int_rejects_non_minimal_u64_form() {
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&(u32::MAX as u64).to_le_bytes());
        let err = read_var_int(&mut src(bytes), "n").unwrap_err();
        assert!(matches!(err, WireError::MalformedEncoding(_)));
    }

    #[test]
    fn var_int_truncated_escape_reports_end_of_input() {
        let err = read_var_int(&mut src(vec![0xFD, 0x01]), "count").unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEndOfInput("count")));
    }

    #[test]
    fn truncated_u32_is_an_error_not_a_padded_value() {
        let err = read_u32(&mut src(vec![0xAA, 0xBB]), "lock_time").unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEndOfInput("lock_time")));
    }

    #[test]
    fn u16_be_round_trips_port_values() {
        let bytes = encode(|t| write_u16_be(t, 8333).unwrap());
        assert_eq!(bytes, vec![0x20, 0x8D]); // 8333 = 0x208D, network byte order
        assert_eq!(read_u16_be(&mut src(bytes), "port").unwrap(), 8333);
    }

    #[test]
    fn var_bytes_empty_round_trips() {
        let bytes = encode(|t| write_var_bytes(t, &[]).unwrap());
        assert_eq!(bytes, vec![0x00]);
        assert!(read_var_bytes(&mut src(bytes), "s").unwrap().is_empty());
    }

    #[test]
    fn var_bytes_rejects_length_above_ceiling() {
        // declares u64::MAX bytes, provides none
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = read_var_bytes(&mut src(bytes), "script").unwrap_err();
        assert!(matches!(
            err,
            WireError::LengthOutOfBounds {
                context: "script",
                ..
            }
        ));
    }

    #[test]
    fn var_string_rejects_invalid_utf8() {
        let err = read_var_string(&mut src(vec![0x02, 0xFF, 0xFE]), "user_agent").unwrap_err();
        assert!(matches!(err, WireError::MalformedEncoding("user_agent")));
    }

    #[test]
    fn ip_v4_uses_the_standard_ffff_mapping() {
        let ip = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));
        let bytes = encode(|t| write_ip(t, &ip).unwrap());

        let mut expected = [0u8; 16];
        expected[10] = 0xFF;
        expected[11] = 0xFF;
        expected[12..].copy_from_slice(&[8, 8, 8, 8]);
        assert_eq!(bytes, expected.to_vec());

        assert_eq!(read_ip(&mut src(bytes), "ip").unwrap(), ip);
    }

    #[test]
    fn ip_v6_passes_through_natively() {
        // 2001:db8::1 — documentation prefix (RFC 3849)
        let octets: [u8; 16] = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let ip = IpAddr::V6(Ipv6Addr::from(octets));
        let bytes = encode(|t| write_ip(t, &ip).unwrap());
        assert_eq!(bytes, octets.to_vec());
        assert_eq!(read_ip(&mut src(bytes), "ip").unwrap(), ip);
    }
}
