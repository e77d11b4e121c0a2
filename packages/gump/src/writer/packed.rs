//! The packed binary layout format.
//!
//! Each token is its keyword's opcode (position in `KEYWORDS`), an argument
//! count, and per argument a tag byte followed by the value:
//!
//! - `TAG_INT`: signed varint
//! - `TAG_TEXT`: unsigned varint string index
//! - `TAG_ATTR`: attribute opcode byte, then signed varint
//!
//! Strings are UTF-8 with a varint byte length.
//!
//! The token stream and the string section are each zlib-compressed. A
//! compressed block is its decompressed length and compressed length as u32s,
//! then the zlib bytes. The string section's block is preceded by the string
//! count.

use super::{
    *,
    var_len::*,
};
use crate::token::{
    Arg,
    KEYWORDS,
    ATTRIBUTES,
    attribute_opcode,
};
use std::{
    fmt::Write as _,
    io::{
        Read,
        Write,
    },
};
use flate2::{
    read::ZlibDecoder,
    write::ZlibEncoder,
    Compression,
};


const TAG_INT: u8 = 0;
const TAG_TEXT: u8 = 1;
const TAG_ATTR: u8 = 2;

// largest decompressed block either side will handle
const MAX_BLOCK: usize = MAX_U16 * 16;


/// Writes tokens as opcodes and varints.
#[derive(Debug, Default)]
pub struct PackedBackend {
    layout: Vec<u8>,
}

impl Backend for PackedBackend {
    fn encoding(&self) -> Encoding {
        Encoding::Packed
    }

    fn write_token(&mut self, token: &Token) {
        self.layout.push(token.opcode());
        write_var_len_uint(&mut self.layout, token.args.len() as u64);
        for arg in &token.args {
            match *arg {
                Arg::Int(n) => {
                    self.layout.push(TAG_INT);
                    write_var_len_sint(&mut self.layout, n);
                }
                Arg::Text(idx) => {
                    self.layout.push(TAG_TEXT);
                    write_var_len_uint(&mut self.layout, idx as u64);
                }
                Arg::Attr(name, n) => {
                    self.layout.push(TAG_ATTR);
                    self.layout.push(attribute_opcode(name));
                    write_var_len_sint(&mut self.layout, n);
                }
            }
        }
    }

    fn finish(self, header: &Header, strings: &StringTable) -> Result<Vec<u8>> {
        let mut buf = begin_packet(PACKED_PACKET_ID);
        header.write(&mut buf);
        write_block(&mut buf, &self.layout)?;
        let mut section = Vec::new();
        for string in strings.iter() {
            write_var_len_uint(&mut section, string.len() as u64);
            section.extend_from_slice(string.as_bytes());
        }
        buf.extend_from_slice(&(strings.len() as u32).to_be_bytes());
        write_block(&mut buf, &section)?;
        end_packet(buf)
    }
}

fn write_block(buf: &mut Vec<u8>, raw: &[u8]) -> Result<()> {
    ensure!(raw.len() <= MAX_BLOCK, Capacity, "block is {} bytes decompressed", raw.len());
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    let compressed = encoder.write_all(raw)
        .and_then(|()| encoder.finish())
        .map_err(|e| err!(Capacity, "failed to compress {} bytes: {}", raw.len(), e))?;
    buf.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    buf.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    buf.extend_from_slice(&compressed);
    Ok(())
}

fn read_block(read: &mut &[u8]) -> Result<Vec<u8>> {
    let raw_len = u32::from_be_bytes(take::<4>(read)?) as usize;
    let compressed_len = u32::from_be_bytes(take::<4>(read)?) as usize;
    ensure!(
        raw_len <= MAX_BLOCK,
        MalformedPacket,
        "block claims {} bytes decompressed",
        raw_len,
    );
    ensure!(compressed_len <= read.len(), MalformedPacket, "block runs past end of packet");
    let (compressed, rest) = read.split_at(compressed_len);
    *read = rest;

    let mut raw = Vec::with_capacity(raw_len);
    ZlibDecoder::new(compressed)
        .take(raw_len as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| err!(MalformedPacket, "bad compressed block: {}", e))?;
    ensure!(
        raw.len() == raw_len,
        MalformedPacket,
        "block decompressed to {} bytes, expected {}",
        raw.len(),
        raw_len,
    );
    Ok(raw)
}

/// Decode a packed packet back into its text layout and strings, the same
/// text the fast format would carry.
pub fn read_packed(bytes: &[u8]) -> Result<(String, Vec<String>)> {
    let mut read = bytes;
    let packet_id = take::<1>(&mut read)?[0];
    ensure!(
        packet_id == PACKED_PACKET_ID,
        MalformedPacket,
        "not a packed layout packet (id {:#04x})",
        packet_id,
    );
    // length, serial, type id, x, y, switch count, text count
    take::<22>(&mut read)?;
    let layout_block = read_block(&mut read)?;
    let mut layout = layout_block.as_slice();

    let mut text = String::new();
    while !layout.is_empty() {
        let opcode = take::<1>(&mut layout)?[0] as usize;
        let keyword = KEYWORDS.get(opcode)
            .ok_or_else(|| err!(MalformedPacket, "unknown keyword opcode {}", opcode))?;
        let _ = write!(text, "{{ {}", keyword);
        let num_args = read_var_len_uint(&mut layout)?;
        for _ in 0..num_args {
            match take::<1>(&mut layout)?[0] {
                TAG_INT => {
                    let _ = write!(text, " {}", read_var_len_sint(&mut layout)?);
                }
                TAG_TEXT => {
                    let _ = write!(text, " {}", read_var_len_uint(&mut layout)?);
                }
                TAG_ATTR => {
                    let opcode = take::<1>(&mut layout)?[0] as usize;
                    let name = ATTRIBUTES.get(opcode)
                        .ok_or_else(|| err!(MalformedPacket, "unknown attribute opcode {}", opcode))?;
                    let _ = write!(text, " {}={}", name, read_var_len_sint(&mut layout)?);
                }
                tag => bail!(MalformedPacket, "unknown argument tag {}", tag),
            }
        }
        text.push_str(" }");
    }

    let num_strings = u32::from_be_bytes(take::<4>(&mut read)?);
    let section = read_block(&mut read)?;
    ensure!(read.is_empty(), MalformedPacket, "{} trailing bytes", read.len());
    let mut section = section.as_slice();
    let mut strings = Vec::new();
    for _ in 0..num_strings {
        let len = read_var_len_uint(&mut section)? as usize;
        ensure!(len <= section.len(), MalformedPacket, "string runs past end of section");
        let (string, rest) = section.split_at(len);
        section = rest;
        strings.push(String::from_utf8(string.to_vec())
            .map_err(|_| err!(MalformedPacket, "string is not UTF-8"))?);
    }
    ensure!(section.is_empty(), MalformedPacket, "{} trailing string bytes", section.len());
    Ok((text, strings))
}


#[test]
fn test_packed_token_bytes() {
    let mut backend = PackedBackend::default();
    backend.write_token(&Token::new("gumppic").int(10).int(-1).text(2).attr("hue", 5));
    assert_eq!(
        backend.layout,
        [
            crate::token::keyword_opcode("gumppic"), 4,
            TAG_INT, 10,
            TAG_INT, 0x40,
            TAG_TEXT, 2,
            TAG_ATTR, 0, 5,
        ],
    );
}

#[test]
fn test_read_packed_rejects_garbage() {
    assert!(read_packed(&[]).is_err());
    assert!(read_packed(&[FAST_PACKET_ID, 0, 3]).is_err());
    let mut truncated = vec![PACKED_PACKET_ID];
    truncated.extend_from_slice(&[0; 22]);
    truncated.extend_from_slice(&100u32.to_be_bytes());
    assert!(read_packed(&truncated).is_err());

    let mut bad_block = vec![PACKED_PACKET_ID];
    bad_block.extend_from_slice(&[0; 22]);
    bad_block.extend_from_slice(&5u32.to_be_bytes());
    bad_block.extend_from_slice(&3u32.to_be_bytes());
    bad_block.extend_from_slice(&[1, 2, 3]);
    let e = read_packed(&bad_block).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::MalformedPacket);
}

#[test]
fn test_repeated_tokens_compress() {
    let mut gump = crate::Gump::new("test.compress");
    for _ in 0..40 {
        gump.add_image(10, 10, 0x15a4);
        gump.add_label(40, 10, 0x481, "A line of the same text");
    }
    let packet = compile(&gump, RenderMode::Interactive, Encoding::Packed).unwrap();
    let bytes = &packet.bytes;
    let raw_len = u32::from_be_bytes([bytes[23], bytes[24], bytes[25], bytes[26]]) as usize;
    let compressed_len = u32::from_be_bytes([bytes[27], bytes[28], bytes[29], bytes[30]]) as usize;
    assert!(compressed_len * 4 < raw_len);

    let mut backend = PackedBackend::default();
    let mut strings = StringTable::default();
    for placed in gump.walk() {
        let token = placed.entry.token(placed.origin, &mut strings, RenderMode::Interactive).unwrap();
        backend.write_token(&token.unwrap());
    }
    assert_eq!(backend.layout.len(), raw_len);

    let fast = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap();
    assert_eq!(read_layout(bytes).unwrap(), read_layout(&fast.bytes).unwrap());
    assert!(bytes.len() * 4 < fast.bytes.len());
}
