//! The legacy text layout format.

use super::*;
use std::fmt::Write as _;


/// Writes `{ keyword args... }` tokens as ASCII text and strings as UTF-16.
#[derive(Debug, Default)]
pub struct FastBackend {
    layout: String,
}

impl Backend for FastBackend {
    fn encoding(&self) -> Encoding {
        Encoding::Fast
    }

    fn write_token(&mut self, token: &Token) {
        // writing to a String can't fail
        let _ = write!(self.layout, "{}", token);
    }

    fn finish(self, header: &Header, strings: &StringTable) -> Result<Vec<u8>> {
        let layout_len = self.layout.len() + 1;
        ensure!(layout_len <= MAX_U16, Capacity, "layout is {} bytes", layout_len);

        let mut buf = begin_packet(FAST_PACKET_ID);
        header.write(&mut buf);
        buf.extend_from_slice(&(layout_len as u16).to_be_bytes());
        buf.extend_from_slice(self.layout.as_bytes());
        buf.push(0);

        buf.extend_from_slice(&(strings.len() as u16).to_be_bytes());
        for string in strings.iter() {
            let units = string.encode_utf16().collect::<Vec<_>>();
            buf.extend_from_slice(&(units.len() as u16).to_be_bytes());
            for unit in units {
                buf.extend_from_slice(&unit.to_be_bytes());
            }
        }
        end_packet(buf)
    }
}

/// Decode a fast packet back into its layout text and strings.
pub fn read_fast(bytes: &[u8]) -> Result<(String, Vec<String>)> {
    let mut read = bytes;
    let packet_id = take::<1>(&mut read)?[0];
    ensure!(
        packet_id == FAST_PACKET_ID,
        MalformedPacket,
        "not a fast layout packet (id {:#04x})",
        packet_id,
    );
    // length, serial, type id, x, y, switch count, text count
    take::<22>(&mut read)?;
    let layout_len = u16::from_be_bytes(take::<2>(&mut read)?) as usize;
    ensure!(layout_len >= 1, MalformedPacket, "layout has no terminator");
    ensure!(layout_len <= read.len(), MalformedPacket, "layout runs past end of packet");
    let (layout, rest) = read.split_at(layout_len);
    read = rest;
    ensure!(layout[layout_len - 1] == 0, MalformedPacket, "layout has no terminator");
    let layout = String::from_utf8(layout[..layout_len - 1].to_vec())
        .map_err(|_| err!(MalformedPacket, "layout is not text"))?;

    let num_strings = u16::from_be_bytes(take::<2>(&mut read)?);
    let mut strings = Vec::new();
    for _ in 0..num_strings {
        let units = u16::from_be_bytes(take::<2>(&mut read)?) as usize;
        ensure!(units * 2 <= read.len(), MalformedPacket, "string runs past end of packet");
        let (string, rest) = read.split_at(units * 2);
        read = rest;
        let string = string
            .chunks(2)
            .map(|unit| u16::from_be_bytes([unit[0], unit[1]]))
            .collect::<Vec<_>>();
        strings.push(String::from_utf16(&string)
            .map_err(|_| err!(MalformedPacket, "string is not UTF-16"))?);
    }
    ensure!(read.is_empty(), MalformedPacket, "{} trailing bytes", read.len());
    Ok((layout, strings))
}


#[test]
fn test_read_fast_rejects_garbage() {
    assert!(read_fast(&[]).is_err());
    assert!(read_fast(&[PACKED_PACKET_ID, 0, 3]).is_err());
    let mut no_terminator = vec![FAST_PACKET_ID];
    no_terminator.extend_from_slice(&[0; 22]);
    no_terminator.extend_from_slice(&[0, 1, b'x', 0, 0]);
    assert!(read_fast(&no_terminator).is_err());
}
