//! Gump entries: the closed set of visual and interactive elements.
//!
//! Entries are pure data. Positions are local to the owning container; the
//! absolute origin is supplied when compiling. See `Entry::token`.

use crate::{
    error::*,
    ids::EntryId,
    strings::StringTable,
    token::Token,
};


/// Whether a compile is for someone who may interact with the dialog or for
/// someone who may only look at it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RenderMode {
    /// Owner or user of the instance. Interactive entries render as such.
    Interactive,
    /// Viewer of a shared instance. Interactive entries render as their inert
    /// visual equivalent, or not at all.
    Inert,
}


/// Resizable background built from a 9-piece gump art set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Background {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub gump_id: u32,
}

/// Single line of plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub x: i32,
    pub y: i32,
    pub hue: u32,
    pub text: String,
}

/// Plain text clipped to a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedLabel {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub hue: u32,
    pub text: String,
}

/// Block of client-rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub text: String,
    pub background: bool,
    pub scrollbar: bool,
}

/// Block of HTML looked up by the client in its localization tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedHtml {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub number: u32,
    pub color: Option<u32>,
    pub background: bool,
    pub scrollbar: bool,
}

/// Gump art image, optionally hued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub x: i32,
    pub y: i32,
    pub gump_id: u32,
    pub hue: u32,
}

/// Gump art tiled over a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTiled {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub gump_id: u32,
}

/// Item art, optionally hued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIcon {
    pub x: i32,
    pub y: i32,
    pub item_id: u32,
    pub hue: u32,
}

/// Semi-transparent checkered region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// What pressing a button does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    /// Close the dialog and send a reply naming this button's id.
    Reply,
    /// Switch the client to the given page. Never reaches the server.
    Page(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub x: i32,
    pub y: i32,
    pub normal: u32,
    pub pressed: u32,
    pub action: ButtonAction,
    /// Only meaningful for `ButtonAction::Reply`.
    pub id: Option<EntryId>,
}

/// Checkbox or radio button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub x: i32,
    pub y: i32,
    /// Art when off.
    pub off: u32,
    /// Art when on.
    pub on: u32,
    pub checked: bool,
    pub id: Option<EntryId>,
}

/// Editable text field. `limit` caps the number of characters the client lets
/// the player type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub hue: u32,
    pub text: String,
    pub limit: Option<u32>,
    pub id: Option<EntryId>,
}

/// One element of a gump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Background(Background),
    Label(Label),
    CroppedLabel(CroppedLabel),
    Html(Html),
    LocalizedHtml(LocalizedHtml),
    Image(Image),
    ImageTiled(ImageTiled),
    ItemIcon(ItemIcon),
    AlphaRegion(AlphaRegion),
    Button(Button),
    Checkbox(Switch),
    Radio(Switch),
    TextEntry(TextEntry),
    /// Entries after this belong to the given page, until the next page
    /// marker. Page 0 is always visible.
    Page(u32),
    /// Radios after this belong to the given mutually exclusive group.
    Group(u32),
    /// Localized tooltip for the preceding entry.
    Tooltip(u32),
}

impl Entry {
    /// Local position, if this kind of entry has one.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            Entry::Background(e) => Some((e.x, e.y)),
            Entry::Label(e) => Some((e.x, e.y)),
            Entry::CroppedLabel(e) => Some((e.x, e.y)),
            Entry::Html(e) => Some((e.x, e.y)),
            Entry::LocalizedHtml(e) => Some((e.x, e.y)),
            Entry::Image(e) => Some((e.x, e.y)),
            Entry::ImageTiled(e) => Some((e.x, e.y)),
            Entry::ItemIcon(e) => Some((e.x, e.y)),
            Entry::AlphaRegion(e) => Some((e.x, e.y)),
            Entry::Button(e) => Some((e.x, e.y)),
            Entry::Checkbox(e) | Entry::Radio(e) => Some((e.x, e.y)),
            Entry::TextEntry(e) => Some((e.x, e.y)),
            Entry::Page(_) | Entry::Group(_) | Entry::Tooltip(_) => None,
        }
    }

    /// Set local position. Does nothing for markers, which have none.
    pub fn set_position(&mut self, x: i32, y: i32) {
        let (ex, ey) = match self {
            Entry::Background(e) => (&mut e.x, &mut e.y),
            Entry::Label(e) => (&mut e.x, &mut e.y),
            Entry::CroppedLabel(e) => (&mut e.x, &mut e.y),
            Entry::Html(e) => (&mut e.x, &mut e.y),
            Entry::LocalizedHtml(e) => (&mut e.x, &mut e.y),
            Entry::Image(e) => (&mut e.x, &mut e.y),
            Entry::ImageTiled(e) => (&mut e.x, &mut e.y),
            Entry::ItemIcon(e) => (&mut e.x, &mut e.y),
            Entry::AlphaRegion(e) => (&mut e.x, &mut e.y),
            Entry::Button(e) => (&mut e.x, &mut e.y),
            Entry::Checkbox(e) | Entry::Radio(e) => (&mut e.x, &mut e.y),
            Entry::TextEntry(e) => (&mut e.x, &mut e.y),
            Entry::Page(_) | Entry::Group(_) | Entry::Tooltip(_) => return,
        };
        *ex = x;
        *ey = y;
    }

    /// Whether this entry takes part in replies and so needs an entry id.
    pub fn is_interactive(&self) -> bool {
        match self {
            Entry::Button(e) => e.action == ButtonAction::Reply,
            Entry::Checkbox(_) | Entry::Radio(_) | Entry::TextEntry(_) => true,
            _ => false,
        }
    }

    /// Entry id, for interactive entries which have one.
    pub fn id(&self) -> Option<EntryId> {
        match self {
            Entry::Button(e) if e.action == ButtonAction::Reply => e.id,
            Entry::Checkbox(e) | Entry::Radio(e) => e.id,
            Entry::TextEntry(e) => e.id,
            _ => None,
        }
    }

    /// Set the entry id. Does nothing for entries that aren't interactive.
    pub fn set_id(&mut self, id: EntryId) {
        match self {
            Entry::Button(e) if e.action == ButtonAction::Reply => e.id = Some(id),
            Entry::Checkbox(e) | Entry::Radio(e) => e.id = Some(id),
            Entry::TextEntry(e) => e.id = Some(id),
            _ => (),
        }
    }

    /// Whether this is a checkbox or radio.
    pub fn is_switch(&self) -> bool {
        matches!(self, Entry::Checkbox(_) | Entry::Radio(_))
    }

    pub fn is_text_entry(&self) -> bool {
        matches!(self, Entry::TextEntry(_))
    }

    /// Compile to a layout token, relative to the absolute `origin` of the
    /// owning container. Text goes into `strings`.
    ///
    /// Returns `None` if the entry renders as nothing in this mode. Fails
    /// without touching `strings` if the payload can't be represented.
    pub fn token(
        &self,
        origin: (i32, i32),
        strings: &mut StringTable,
        mode: RenderMode,
    ) -> Result<Option<Token>> {
        let (ox, oy) = origin;
        let abs = |x: i32, y: i32| (ox as i64 + x as i64, oy as i64 + y as i64);
        let inert = mode == RenderMode::Inert;

        let token = match self {
            &Entry::Background(Background { x, y, width, height, gump_id }) => {
                let (x, y) = abs(x, y);
                Token::new("resizepic").int(x).int(y).int(gump_id).int(width).int(height)
            }
            Entry::Label(e) => {
                let (x, y) = abs(e.x, e.y);
                Token::new("text").int(x).int(y).int(e.hue).text(strings.intern(&e.text))
            }
            Entry::CroppedLabel(e) => {
                let (x, y) = abs(e.x, e.y);
                Token::new("croppedtext")
                    .int(x).int(y).int(e.width).int(e.height).int(e.hue)
                    .text(strings.intern(&e.text))
            }
            Entry::Html(e) => {
                let (x, y) = abs(e.x, e.y);
                Token::new("htmlgump")
                    .int(x).int(y).int(e.width).int(e.height)
                    .text(strings.intern(&e.text))
                    .int(e.background).int(e.scrollbar)
            }
            Entry::LocalizedHtml(e) => {
                let (x, y) = abs(e.x, e.y);
                let keyword = if e.color.is_some() { "xmfhtmlgumpcolor" } else { "xmfhtmlgump" };
                let token = Token::new(keyword)
                    .int(x).int(y).int(e.width).int(e.height)
                    .int(e.number).int(e.background).int(e.scrollbar);
                match e.color {
                    Some(color) => token.int(color),
                    None => token,
                }
            }
            &Entry::Image(Image { x, y, gump_id, hue }) => image_token(abs(x, y), gump_id, hue),
            &Entry::ImageTiled(ImageTiled { x, y, width, height, gump_id }) => {
                let (x, y) = abs(x, y);
                Token::new("gumppictiled").int(x).int(y).int(width).int(height).int(gump_id)
            }
            &Entry::ItemIcon(ItemIcon { x, y, item_id, hue }) => {
                let (x, y) = abs(x, y);
                if hue == 0 {
                    Token::new("tilepic").int(x).int(y).int(item_id)
                } else {
                    Token::new("tilepichue").int(x).int(y).int(item_id).int(hue)
                }
            }
            &Entry::AlphaRegion(AlphaRegion { x, y, width, height }) => {
                let (x, y) = abs(x, y);
                Token::new("checkertrans").int(x).int(y).int(width).int(height)
            }
            Entry::Button(e) => match e.action {
                ButtonAction::Page(page) => {
                    let (x, y) = abs(e.x, e.y);
                    Token::new("button")
                        .int(x).int(y).int(e.normal).int(e.pressed)
                        .int(0).int(page).int(0)
                }
                ButtonAction::Reply => {
                    let id = wire_id(e.id, "button")?;
                    if inert {
                        image_token(abs(e.x, e.y), e.normal, 0)
                    } else {
                        let (x, y) = abs(e.x, e.y);
                        Token::new("button")
                            .int(x).int(y).int(e.normal).int(e.pressed)
                            .int(1).int(0).int(id)
                    }
                }
            },
            Entry::Checkbox(e) => switch_token("checkbox", e, abs(e.x, e.y), inert)?,
            Entry::Radio(e) => switch_token("radio", e, abs(e.x, e.y), inert)?,
            Entry::TextEntry(e) => {
                let id = wire_id(e.id, "text entry")?;
                if inert {
                    return Ok(None);
                }
                let (x, y) = abs(e.x, e.y);
                let keyword = if e.limit.is_some() { "textentrylimited" } else { "textentry" };
                let token = Token::new(keyword)
                    .int(x).int(y).int(e.width).int(e.height).int(e.hue).int(id)
                    .text(strings.intern(&e.text));
                match e.limit {
                    Some(limit) => token.int(limit),
                    None => token,
                }
            }
            &Entry::Page(page) => Token::new("page").int(page),
            &Entry::Group(group) => Token::new("group").int(group),
            &Entry::Tooltip(number) => Token::new("tooltip").int(number),
        };
        Ok(Some(token))
    }
}

fn image_token((x, y): (i64, i64), gump_id: u32, hue: u32) -> Token {
    let token = Token::new("gumppic").int(x).int(y).int(gump_id);
    if hue == 0 {
        token
    } else {
        token.attr("hue", hue)
    }
}

fn switch_token(
    keyword: &'static str,
    e: &Switch,
    (x, y): (i64, i64),
    inert: bool,
) -> Result<Token> {
    let id = wire_id(e.id, keyword)?;
    Ok(if inert {
        image_token((x, y), if e.checked { e.on } else { e.off }, 0)
    } else {
        Token::new(keyword)
            .int(x).int(y).int(e.off).int(e.on).int(e.checked).int(id)
    })
}

// validate an interactive entry's id for the wire
fn wire_id(id: Option<EntryId>, what: &str) -> Result<i32> {
    let id = id.ok_or_else(|| err!(MalformedEntry, "{} has no entry id", what))?;
    ensure!(id.0 >= 0, MalformedEntry, "{} has negative entry id {}", what, id.0);
    Ok(id.0)
}


#[cfg(test)]
fn checkbox(id: i32, checked: bool) -> Entry {
    Entry::Checkbox(Switch { x: 5, y: 6, off: 210, on: 211, checked, id: Some(EntryId(id)) })
}

#[test]
fn test_token_applies_origin() {
    let mut strings = StringTable::new();
    let entry = Entry::Label(Label { x: 10, y: 20, hue: 0x481, text: "Hello".into() });
    let token = entry.token((100, 200), &mut strings, RenderMode::Interactive).unwrap().unwrap();
    assert_eq!(token.to_string(), "{ text 110 220 1153 0 }");
    assert_eq!(strings.get(0), Some("Hello"));
}

#[test]
fn test_inert_switch_renders_state_image() {
    let mut strings = StringTable::new();
    let on = checkbox(5, true).token((0, 0), &mut strings, RenderMode::Inert).unwrap().unwrap();
    let off = checkbox(5, false).token((0, 0), &mut strings, RenderMode::Inert).unwrap().unwrap();
    assert_eq!(on.to_string(), "{ gumppic 5 6 211 }");
    assert_eq!(off.to_string(), "{ gumppic 5 6 210 }");
}

#[test]
fn test_inert_text_entry_omitted() {
    let mut strings = StringTable::new();
    let entry = Entry::TextEntry(TextEntry {
        x: 0, y: 0, width: 100, height: 20, hue: 0,
        text: "secret".into(), limit: Some(12), id: Some(EntryId(3)),
    });
    assert!(entry.token((0, 0), &mut strings, RenderMode::Inert).unwrap().is_none());
    assert!(strings.is_empty());
    let token = entry.token((0, 0), &mut strings, RenderMode::Interactive).unwrap().unwrap();
    assert_eq!(token.to_string(), "{ textentrylimited 0 0 100 20 0 3 0 12 }");
}

#[test]
fn test_negative_id_is_malformed() {
    let mut strings = StringTable::new();
    let e = checkbox(-1, false)
        .token((0, 0), &mut strings, RenderMode::Interactive)
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::MalformedEntry);
}

#[test]
fn test_page_button_has_no_id() {
    let button = Entry::Button(Button {
        x: 0, y: 0, normal: 4005, pressed: 4007, action: ButtonAction::Page(2), id: None,
    });
    assert!(!button.is_interactive());
    assert_eq!(button.id(), None);
    let mut strings = StringTable::new();
    let token = button.token((0, 0), &mut strings, RenderMode::Inert).unwrap().unwrap();
    assert_eq!(token.to_string(), "{ button 0 0 4005 4007 0 2 0 }");
}
