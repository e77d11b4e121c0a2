//! Compiling a gump into a wire packet.
//!
//! The driver here is format-independent: it walks the tree, builds every
//! token, resolves string references, and checks the protocol limits, and
//! only then hands the finished tokens to a `Backend` to be encoded. A
//! malformed entry therefore fails the compile before a single byte of the
//! packet exists.

mod fast;
mod packed;
mod var_len;

pub use self::{
    fast::{
        FastBackend,
        read_fast,
    },
    packed::{
        PackedBackend,
        read_packed,
    },
};

use crate::{
    entry::{
        Entry,
        RenderMode,
    },
    error::*,
    gump::{
        Gump,
        GumpSerial,
        GumpTypeId,
    },
    strings::StringTable,
    token::Token,
};


/// Largest value any u16 length or count field can hold.
pub const MAX_U16: usize = u16::MAX as usize;

/// Packet id of the legacy text layout format.
pub const FAST_PACKET_ID: u8 = 0xB0;
/// Packet id of the packed binary layout format.
pub const PACKED_PACKET_ID: u8 = 0xDD;
/// Packet id of the general-information packet used to close a dialog.
pub const CLOSE_PACKET_ID: u8 = 0xBF;
/// Sub-command of `CLOSE_PACKET_ID` for closing a dialog.
pub const CLOSE_SUBCOMMAND: u16 = 0x0004;


/// Wire format of a compiled dialog.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Encoding {
    /// Text layout, understood by every client.
    Fast,
    /// Binary token layout, for clients that advertise support.
    Packed,
}

/// A compiled dialog, ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub encoding: Encoding,
    pub mode: RenderMode,
    pub bytes: Vec<u8>,
    /// Number of switches the client will report on.
    pub switches: u16,
    /// Number of text fields the client will report on.
    pub texts: u16,
}

/// Fixed header fields shared by both formats.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub serial: GumpSerial,
    pub type_id: GumpTypeId,
    pub x: i32,
    pub y: i32,
    pub switches: u16,
    pub texts: u16,
}

impl Header {
    /// Append the header fields after the packet id and length.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.serial.0.to_be_bytes());
        buf.extend_from_slice(&self.type_id.0.to_be_bytes());
        buf.extend_from_slice(&self.x.to_be_bytes());
        buf.extend_from_slice(&self.y.to_be_bytes());
        buf.extend_from_slice(&self.switches.to_be_bytes());
        buf.extend_from_slice(&self.texts.to_be_bytes());
    }
}

/// An output format. Receives already-validated tokens in render order, then
/// assembles the packet around them.
pub trait Backend {
    fn encoding(&self) -> Encoding;

    /// Append one token to the layout.
    fn write_token(&mut self, token: &Token);

    /// Build the complete packet.
    fn finish(self, header: &Header, strings: &StringTable) -> Result<Vec<u8>>;
}


/// Compile a gump in the given mode and encoding.
pub fn compile(gump: &Gump, mode: RenderMode, encoding: Encoding) -> Result<Packet> {
    match encoding {
        Encoding::Fast => compile_with(gump, mode, FastBackend::default()),
        Encoding::Packed => compile_with(gump, mode, PackedBackend::default()),
    }
}

/// Compile a gump through an arbitrary backend.
pub fn compile_with<B: Backend>(gump: &Gump, mode: RenderMode, mut backend: B) -> Result<Packet> {
    let mut strings = gump.strings().clone();
    let mut tokens = Vec::new();

    let flags = gump.flags();
    for (allowed, keyword) in [
        (flags.draggable, "nomove"),
        (flags.closable, "noclose"),
        (flags.disposable, "nodispose"),
        (flags.resizable, "noresize"),
    ] {
        if !allowed {
            tokens.push(Token::new(keyword));
        }
    }

    let mut switches = 0;
    let mut texts = 0;
    // a tooltip describes the entry before it, so goes when that entry does
    let mut omitted = false;
    for placed in gump.walk() {
        if omitted && matches!(placed.entry, Entry::Tooltip(_)) {
            continue;
        }
        let Some(token) = placed.entry.token(placed.origin, &mut strings, mode)? else {
            omitted = true;
            continue;
        };
        omitted = false;
        match token.keyword {
            "checkbox" | "radio" => switches += 1,
            "textentry" | "textentrylimited" => texts += 1,
            _ => (),
        }
        tokens.push(token);
    }

    ensure!(switches <= MAX_U16, Capacity, "{} switches", switches);
    ensure!(texts <= MAX_U16, Capacity, "{} text fields", texts);
    ensure!(strings.len() <= MAX_U16, Capacity, "{} strings", strings.len());
    for (idx, string) in strings.iter().enumerate() {
        let units = string.encode_utf16().count();
        ensure!(units <= MAX_U16, Capacity, "string {} is {} UTF-16 units long", idx, units);
    }

    let header = Header {
        serial: gump.serial(),
        type_id: gump.type_id(),
        x: gump.location().0,
        y: gump.location().1,
        switches: switches as u16,
        texts: texts as u16,
    };
    let encoding = backend.encoding();
    for token in &tokens {
        backend.write_token(token);
    }
    let bytes = backend.finish(&header, &strings)?;
    trace!(
        ?encoding,
        ?mode,
        serial = gump.serial().0,
        tokens = tokens.len(),
        strings = strings.len(),
        bytes = bytes.len(),
        "compiled gump",
    );
    Ok(Packet {
        encoding,
        mode,
        bytes,
        switches: header.switches,
        texts: header.texts,
    })
}

/// Start a packet: id byte and a length placeholder.
pub(crate) fn begin_packet(packet_id: u8) -> Vec<u8> {
    vec![packet_id, 0, 0]
}

/// Fill in the length placeholder of a packet started by `begin_packet`.
pub(crate) fn end_packet(mut buf: Vec<u8>) -> Result<Vec<u8>> {
    ensure!(buf.len() <= MAX_U16, Capacity, "packet is {} bytes", buf.len());
    let len = (buf.len() as u16).to_be_bytes();
    buf[1..3].copy_from_slice(&len);
    Ok(buf)
}

// take the next N bytes
pub(crate) fn take<const N: usize>(read: &mut &[u8]) -> Result<[u8; N]> {
    ensure!(read.len() >= N, MalformedPacket, "packet cut off");
    let mut out = [0; N];
    out.copy_from_slice(&read[..N]);
    *read = &read[N..];
    Ok(out)
}

/// Decode a compiled packet of either format back into its text layout and
/// strings.
pub fn read_layout(bytes: &[u8]) -> Result<(String, Vec<String>)> {
    match bytes.first() {
        Some(&FAST_PACKET_ID) => read_fast(bytes),
        Some(&PACKED_PACKET_ID) => read_packed(bytes),
        _ => Err(err!(MalformedPacket, "not a layout packet")),
    }
}

/// Serial and type id from the header of a compiled packet of either format.
pub fn read_header(bytes: &[u8]) -> Result<(GumpSerial, GumpTypeId)> {
    ensure!(
        matches!(bytes.first(), Some(&FAST_PACKET_ID) | Some(&PACKED_PACKET_ID)),
        MalformedPacket,
        "not a layout packet",
    );
    let mut read = bytes.get(3..).unwrap_or_default();
    let serial = u32::from_be_bytes(take::<4>(&mut read)?);
    let type_id = u32::from_be_bytes(take::<4>(&mut read)?);
    Ok((GumpSerial(serial), GumpTypeId(type_id)))
}

/// Packet telling a client to close its dialog of the given type.
pub fn close_packet(type_id: GumpTypeId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13);
    buf.push(CLOSE_PACKET_ID);
    buf.extend_from_slice(&13u16.to_be_bytes());
    buf.extend_from_slice(&CLOSE_SUBCOMMAND.to_be_bytes());
    buf.extend_from_slice(&type_id.0.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf
}


#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Layout text and strings of a fast packet, checking its length field.
    pub fn parse_fast(bytes: &[u8]) -> (String, Vec<String>) {
        assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]) as usize, bytes.len());
        read_fast(bytes).unwrap()
    }

    /// Header switch and text counts.
    pub fn counts(bytes: &[u8]) -> (u16, u16) {
        (
            u16::from_be_bytes([bytes[19], bytes[20]]),
            u16::from_be_bytes([bytes[21], bytes[22]]),
        )
    }
}

#[cfg(test)]
use self::test_util::*;
#[cfg(test)]
use crate::ids::EntryId;

#[test]
fn test_flags_emitted_in_order() {
    let mut gump = Gump::new("test.flags");
    gump.set_resizable(false);
    gump.set_closable(false);
    gump.set_draggable(false);
    gump.add_label(0, 0, 0, "x");
    let packet = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap();
    let (layout, strings) = parse_fast(&packet.bytes);
    assert_eq!(layout, "{ nomove }{ noclose }{ noresize }{ text 0 0 0 0 }");
    assert_eq!(strings, vec!["x"]);
}

#[test]
fn test_fast_header() {
    let mut gump = Gump::new("test.header");
    gump.set_location(50, -10);
    gump.add_checkbox(0, 0, 210, 211, true, EntryId(4)).unwrap();
    gump.add_text_entry(0, 20, 100, 20, 0, "name", EntryId(5)).unwrap();
    let packet = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap();
    let bytes = &packet.bytes;
    assert_eq!(&bytes[7..11], &gump.type_id().0.to_be_bytes());
    assert_eq!(&bytes[11..15], &50i32.to_be_bytes());
    assert_eq!(&bytes[15..19], &(-10i32).to_be_bytes());
    assert_eq!(counts(bytes), (1, 1));
    assert_eq!((packet.switches, packet.texts), (1, 1));
}

#[test]
fn test_viewer_isolation() {
    let mut gump = Gump::new("test.viewer");
    gump.add_background(0, 0, 300, 200, 9200);
    gump.add_button(10, 10, 4005, 4007, EntryId(1)).unwrap();
    gump.add_checkbox(10, 40, 210, 211, true, EntryId(2)).unwrap();
    gump.add_radio(10, 70, 208, 209, false, EntryId(3)).unwrap();
    gump.add_text_entry(10, 100, 200, 20, 0, "secret", EntryId(4)).unwrap();
    gump.add_page_button(10, 130, 4005, 4007, 2);

    let packet = compile(&gump, RenderMode::Inert, Encoding::Fast).unwrap();
    let (layout, strings) = parse_fast(&packet.bytes);
    assert_eq!(
        layout,
        "{ resizepic 0 0 9200 300 200 }\
         { gumppic 10 10 4005 }\
         { gumppic 10 40 211 }\
         { gumppic 10 70 208 }\
         { button 10 130 4005 4007 0 2 0 }",
    );
    assert!(strings.is_empty());
    assert_eq!(counts(&packet.bytes), (0, 0));

    let packet = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap();
    let (layout, _) = parse_fast(&packet.bytes);
    assert!(layout.contains("{ button 10 10 4005 4007 1 0 1 }"));
    assert!(layout.contains("{ checkbox 10 40 210 211 1 2 }"));
    assert!(layout.contains("{ textentry 10 100 200 20 0 4 0 }"));
}

#[test]
fn test_viewer_drops_tooltip_of_omitted_field() {
    let mut gump = Gump::new("test.tooltips");
    gump.add_button(10, 10, 4005, 4007, EntryId(1)).unwrap();
    gump.add_tooltip(1011012);
    gump.add_text_entry(10, 40, 200, 20, 0, "", EntryId(2)).unwrap();
    gump.add_tooltip(1062561);
    gump.add_label(10, 70, 0, "after");
    gump.add_tooltip(1072207);

    let packet = compile(&gump, RenderMode::Inert, Encoding::Fast).unwrap();
    let (layout, _) = parse_fast(&packet.bytes);
    assert_eq!(
        layout,
        "{ gumppic 10 10 4005 }{ tooltip 1011012 }{ text 10 70 0 0 }{ tooltip 1072207 }",
    );

    let packet = compile(&gump, RenderMode::Interactive, Encoding::Packed).unwrap();
    let (layout, _) = read_layout(&packet.bytes).unwrap();
    assert!(layout.contains("{ tooltip 1062561 }"));
}

#[test]
fn test_malformed_fails_whole_compile() {
    let mut gump = Gump::new("test.malformed");
    gump.add_label(0, 0, 0, "before");
    let key = gump.add_button(0, 0, 1, 2, None).unwrap();
    gump.add_label(0, 0, 0, "after");
    gump.entry_mut(key).unwrap().set_id(EntryId(-3));
    for encoding in [Encoding::Fast, Encoding::Packed] {
        let e = compile(&gump, RenderMode::Interactive, encoding).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MalformedEntry);
    }
}

#[test]
fn test_oversized_string_is_capacity_error() {
    let mut gump = Gump::new("test.capacity");
    gump.add_html(0, 0, 100, 100, "a".repeat(MAX_U16 + 1), false, false);
    let e = compile(&gump, RenderMode::Interactive, Encoding::Packed).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Capacity);
}

#[test]
fn test_reply_counts_are_capacity_checked() {
    let mut switches = Gump::new("test.switches");
    for i in 0..=MAX_U16 as i32 {
        switches.add_checkbox(0, 0, 210, 211, false, EntryId(i + 1)).unwrap();
    }
    let e = compile(&switches, RenderMode::Interactive, Encoding::Fast).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Capacity);
    assert!(e.message().contains("switches"));

    let mut texts = Gump::new("test.texts");
    for i in 0..=MAX_U16 as i32 {
        texts.add_text_entry(0, 0, 10, 10, 0, "", EntryId(i + 1)).unwrap();
    }
    let e = compile(&texts, RenderMode::Interactive, Encoding::Packed).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Capacity);
    assert!(e.message().contains("text fields"));
}

#[test]
fn test_oversized_packet_is_capacity_error() {
    let mut gump = Gump::new("test.capacity");
    for i in 0..2000 {
        gump.add_label(0, 0, 0, format!("line number {} of far too many", i));
    }
    let e = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Capacity);
}

#[test]
fn test_encodings_agree_on_layout() {
    let mut gump = Gump::new("test.agree");
    gump.set_draggable(false);
    let panel = gump.add_container(gump.root(), 30, 40).unwrap();
    gump.add_to(panel, crate::entry::Entry::Image(crate::entry::Image {
        x: -5, y: 2, gump_id: 0x15a4, hue: 0x21,
    })).unwrap();
    gump.add_localized_html_color(0, 0, 200, 40, 1011036, 0x7fff, true, false);
    gump.add_text_entry_limited(0, 0, 100, 20, 0x481, "Ünïcödé", 10, EntryId(9)).unwrap();
    gump.add_tooltip(1061114);

    let fast = compile(&gump, RenderMode::Interactive, Encoding::Fast).unwrap();
    let packed = compile(&gump, RenderMode::Interactive, Encoding::Packed).unwrap();
    let (fast_layout, fast_strings) = parse_fast(&fast.bytes);
    let (packed_layout, packed_strings) = read_layout(&packed.bytes).unwrap();
    assert_eq!(fast_layout, packed_layout);
    assert_eq!(fast_strings, packed_strings);
    assert!(fast_layout.starts_with("{ nomove }{ gumppic 25 42 5540 hue=33 }"));
    assert_eq!(packed.bytes[0], PACKED_PACKET_ID);
    assert_eq!(u16::from_be_bytes([packed.bytes[1], packed.bytes[2]]) as usize, packed.bytes.len());
    assert!(packed.bytes.len() < fast.bytes.len());
}

#[test]
fn test_read_header() {
    let mut gump = Gump::new("test.header");
    gump.set_serial(GumpSerial(77));
    for encoding in [Encoding::Fast, Encoding::Packed] {
        let packet = compile(&gump, RenderMode::Inert, encoding).unwrap();
        assert_eq!(read_header(&packet.bytes).unwrap(), (GumpSerial(77), gump.type_id()));
    }
    assert!(read_header(&close_packet(gump.type_id())).is_err());
    assert!(read_header(&[FAST_PACKET_ID, 0]).is_err());
}

#[test]
fn test_close_packet() {
    let bytes = close_packet(GumpTypeId(0x01020304));
    assert_eq!(bytes, [0xBF, 0, 13, 0, 4, 1, 2, 3, 4, 0, 0, 0, 0]);
}
