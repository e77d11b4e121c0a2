//! Variable-length integers for the packed layout.
//!
//! Unsigned ints are 7 bits per byte, low bits first, with the high bit of
//! each byte set if more bytes follow. Signed ints are the same except the
//! first byte carries only 6 value bits, with bit 6 marking a negative
//! number stored as its bitwise complement.

use crate::error::*;


const MORE_BIT: u8  = 0b10000000;
const LO_7_BITS: u8 = 0b01111111;

const ENCODED_SIGN_BIT: u8 = 0b01000000;
const LO_6_BITS: u8        = 0b00111111;


/// Append an unsigned varint.
pub fn write_var_len_uint(buf: &mut Vec<u8>, mut n: u64) {
    let mut more = true;
    while more {
        let curr_7_bits = (n & (LO_7_BITS as u64)) as u8;
        n >>= 7;
        more = n != 0;
        buf.push(((more as u8) << 7) | curr_7_bits);
    }
}

/// Append a signed varint.
pub fn write_var_len_sint(buf: &mut Vec<u8>, mut n: i64) {
    let neg = n < 0;
    if neg {
        n = !n;
    }
    let curr_7_bits = ((neg as u8) << 6) | (n & (LO_6_BITS as i64)) as u8;
    n >>= 6;
    let mut more = n != 0;
    buf.push(((more as u8) << 7) | curr_7_bits);

    while more {
        let curr_7_bits = (n & (LO_7_BITS as i64)) as u8;
        n >>= 7;
        more = n != 0;
        buf.push(((more as u8) << 7) | curr_7_bits);
    }
}

/// Read a variable length unsigned int, advancing `read` past it.
pub fn read_var_len_uint(read: &mut &[u8]) -> Result<u64> {
    let mut n: u64 = 0;
    let mut shift = 0;
    let mut more = true;
    while more {
        ensure!(shift < 64, MalformedPacket, "too many bytes in var len uint");
        let (&curr_byte, rest) = read.split_first()
            .ok_or_else(|| err!(MalformedPacket, "var len uint cut off"))?;
        *read = rest;

        n |= ((curr_byte & LO_7_BITS) as u64) << shift;
        shift += 7;
        more = (curr_byte & MORE_BIT) != 0;
    }
    Ok(n)
}

/// Read a variable length signed int, advancing `read` past it.
pub fn read_var_len_sint(read: &mut &[u8]) -> Result<i64> {
    let (&curr_byte, rest) = read.split_first()
        .ok_or_else(|| err!(MalformedPacket, "var len sint cut off"))?;
    *read = rest;

    let neg = (curr_byte & ENCODED_SIGN_BIT) != 0;
    let mut n = (curr_byte & LO_6_BITS) as i64;
    let mut more = (curr_byte & MORE_BIT) != 0;
    let mut shift = 6;

    while more {
        ensure!(shift < 64, MalformedPacket, "too many bytes in var len sint");
        let (&curr_byte, rest) = read.split_first()
            .ok_or_else(|| err!(MalformedPacket, "var len sint cut off"))?;
        *read = rest;

        n |= ((curr_byte & LO_7_BITS) as i64) << shift;
        shift += 7;
        more = (curr_byte & MORE_BIT) != 0;
    }

    if neg {
        n = !n;
    }
    Ok(n)
}


#[test]
fn test_var_len_small_values_are_one_byte() {
    let mut buf = Vec::new();
    write_var_len_uint(&mut buf, 127);
    assert_eq!(buf, [0x7f]);
    buf.clear();
    write_var_len_uint(&mut buf, 128);
    assert_eq!(buf, [0x80, 0x01]);
    buf.clear();
    write_var_len_sint(&mut buf, -1);
    assert_eq!(buf, [0x40]);
    buf.clear();
    write_var_len_sint(&mut buf, 63);
    assert_eq!(buf, [0x3f]);
}

#[test]
fn test_var_len_extremes() {
    let mut buf = Vec::new();
    for n in [i64::MIN, i64::MIN + 1, -65, -64, 0, 64, i64::MAX] {
        buf.clear();
        write_var_len_sint(&mut buf, n);
        let mut read = buf.as_slice();
        assert_eq!(read_var_len_sint(&mut read).unwrap(), n);
        assert!(read.is_empty());
    }
    buf.clear();
    write_var_len_uint(&mut buf, u64::MAX);
    assert_eq!(read_var_len_uint(&mut buf.as_slice()).unwrap(), u64::MAX);
}

#[test]
fn test_var_len_truncated_is_error() {
    assert!(read_var_len_uint(&mut &[0x80][..]).is_err());
    assert!(read_var_len_sint(&mut &[][..]).is_err());
}
