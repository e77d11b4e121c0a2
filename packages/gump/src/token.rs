//! Layout tokens, the format-independent form of one compiled entry.
//!
//! Every entry compiles to exactly one token. Writer backends only ever see
//! fully-built tokens, which is what keeps a malformed entry from being
//! partially emitted.

use std::fmt::{self, Formatter, Display};


/// Every keyword a token may carry. The position in this list is the opcode
/// used by the packed encoding, so it must only ever be appended to.
pub const KEYWORDS: &[&str] = &[
    "nomove",
    "noclose",
    "nodispose",
    "noresize",
    "page",
    "group",
    "tooltip",
    "resizepic",
    "text",
    "croppedtext",
    "htmlgump",
    "xmfhtmlgump",
    "xmfhtmlgumpcolor",
    "gumppic",
    "gumppictiled",
    "tilepic",
    "tilepichue",
    "checkertrans",
    "button",
    "checkbox",
    "radio",
    "textentry",
    "textentrylimited",
];

/// Named attribute keys, packed the same way as `KEYWORDS`.
pub const ATTRIBUTES: &[&str] = &[
    "hue",
];


/// One token argument.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Arg {
    /// Plain integer.
    Int(i64),
    /// Index into the string table.
    Text(usize),
    /// Named integer attribute, rendered as `name=value`.
    Attr(&'static str, i64),
}

/// One compiled layout element: `{ keyword args... }`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Token {
    pub keyword: &'static str,
    pub args: Vec<Arg>,
}

impl Token {
    pub fn new(keyword: &'static str) -> Self {
        debug_assert!(KEYWORDS.contains(&keyword), "unknown keyword {:?}", keyword);
        Token {
            keyword,
            args: Vec::new(),
        }
    }

    /// Builder-style append of an integer argument.
    pub fn int(mut self, n: impl Into<i64>) -> Self {
        self.args.push(Arg::Int(n.into()));
        self
    }

    /// Builder-style append of a string table reference.
    pub fn text(mut self, idx: usize) -> Self {
        self.args.push(Arg::Text(idx));
        self
    }

    /// Builder-style append of a named attribute.
    pub fn attr(mut self, name: &'static str, n: impl Into<i64>) -> Self {
        debug_assert!(ATTRIBUTES.contains(&name), "unknown attribute {:?}", name);
        self.args.push(Arg::Attr(name, n.into()));
        self
    }

    /// Packed opcode of the keyword.
    pub fn opcode(&self) -> u8 {
        keyword_opcode(self.keyword)
    }
}

pub(crate) fn keyword_opcode(keyword: &str) -> u8 {
    KEYWORDS.iter().position(|&k| k == keyword).expect("unregistered keyword") as u8
}

pub(crate) fn attribute_opcode(name: &str) -> u8 {
    ATTRIBUTES.iter().position(|&k| k == name).expect("unregistered attribute") as u8
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{ {}", self.keyword)?;
        for arg in &self.args {
            match *arg {
                Arg::Int(n) => write!(f, " {}", n)?,
                Arg::Text(idx) => write!(f, " {}", idx)?,
                Arg::Attr(name, n) => write!(f, " {}={}", name, n)?,
            }
        }
        f.write_str(" }")
    }
}


#[test]
fn test_token_display() {
    let token = Token::new("gumppic").int(10).int(-4).int(5100).attr("hue", 33);
    assert_eq!(token.to_string(), "{ gumppic 10 -4 5100 hue=33 }");
    assert_eq!(Token::new("noclose").to_string(), "{ noclose }");
}

#[test]
fn test_opcodes_are_stable() {
    assert_eq!(keyword_opcode("nomove"), 0);
    assert_eq!(keyword_opcode("textentrylimited") as usize, KEYWORDS.len() - 1);
    assert_eq!(attribute_opcode("hue"), 0);
}
