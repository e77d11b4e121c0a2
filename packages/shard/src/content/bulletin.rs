//! The town bulletin board.

use super::*;
use gump::{
    Gump,
    Interaction,
};
use std::{
    collections::VecDeque,
    fmt::Write as _,
};
use anyhow::*;


/// Dialog kind, from which its type id is derived.
pub const KIND: &'static str = "shard.bulletin";

/// Longest post a player can type.
pub const POST_LIMIT: u32 = 120;

/// Cliloc for "Post".
const POST_TOOLTIP: u32 = 1062561;


/// One message on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub text: String,
}

/// Contents of the board, independent of any dialog showing it.
#[derive(Debug, Clone)]
pub struct Board {
    title: String,
    posts: VecDeque<Post>,
    max_posts: usize,
}

impl Board {
    pub fn new(title: impl Into<String>, max_posts: usize) -> Self {
        Board {
            title: title.into(),
            posts: VecDeque::new(),
            max_posts,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Posts, newest first.
    pub fn posts(&self) -> impl Iterator<Item=&Post> + '_ {
        self.posts.iter()
    }

    /// Add a post, dropping the oldest beyond the limit.
    pub fn add_post(&mut self, author: impl Into<String>, text: impl Into<String>) {
        self.posts.push_front(Post {
            author: author.into(),
            text: text.into(),
        });
        self.posts.truncate(self.max_posts);
    }

    /// Posts rendered as client HTML.
    pub fn html(&self) -> String {
        let mut html = String::from("<BASEFONT COLOR=#FFFFFF>");
        if self.posts.is_empty() {
            html.push_str("<I>Nothing has been posted yet.</I>");
        }
        for post in &self.posts {
            let _ = write!(html, "<B>{}</B>: {}<BR>", escape(&post.author), escape(&post.text));
        }
        html.push_str("</BASEFONT>");
        html
    }
}

// keep players from injecting markup
fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}


/// Build a dialog showing the board. With `posting`, it has a field and button for writing a
/// post, which pushes `Action::Posted`. Closing it pushes `Action::LeftBoard`.
///
/// The posts are in the node named "posts" and the field in the node named "draft".
pub fn build(board: &Board, posting: bool, actions: &Actions, macro_protection: bool) -> Result<Gump> {
    let mut gump = Gump::new(KIND);
    gump.set_macro_protected(macro_protection);
    gump.set_location(560, 80);

    gump.add_background(0, 0, 360, 400, art::BACKGROUND);
    gump.add_label(20, 15, TEXT_HUE, board.title());
    let posts = gump.add_html(20, 45, 320, 280, board.html(), true, true);
    gump.set_name(posts, "posts")?;

    if posting {
        let form = gump.add_container(gump.root(), 20, 340)?;
        gump.add_to(form, gump::Entry::ImageTiled(gump::entry::ImageTiled {
            x: 0, y: 0, width: 250, height: 22, gump_id: art::TEXT_BACKGROUND,
        }))?;
        let draft = gump.add_to(form, gump::Entry::TextEntry(gump::entry::TextEntry {
            x: 5, y: 1, width: 240, height: 20, hue: 0,
            text: String::new(),
            limit: Some(POST_LIMIT),
            id: None,
        }))?;
        let post = gump.add_to(form, gump::Entry::Button(gump::entry::Button {
            x: 260, y: 0, normal: art::OK, pressed: art::OK + 1,
            action: gump::entry::ButtonAction::Reply,
            id: None,
        }))?;
        gump.add_to(form, gump::Entry::Tooltip(POST_TOOLTIP))?;
        gump.set_name(draft, "draft")?;
        gump.set_name(post, "post")?;

        gump.on(post, {
            let actions = Arc::clone(actions);
            move |gump: &Gump, _: &Interaction| {
                let text = gump.text(draft).unwrap_or_default().trim();
                if !text.is_empty() {
                    actions.push(Action::Posted { text: text.to_owned() });
                }
                Ok(())
            }
        })?;
    }

    let root = gump.root();
    gump.on(root, {
        let actions = Arc::clone(actions);
        move |_: &Gump, _: &Interaction| {
            actions.push(Action::LeftBoard);
            Ok(())
        }
    })?;

    Ok(gump)
}

/// Refresh a live board dialog after a post, clearing the field of whoever posted.
pub fn refresh(gump: &mut Gump, board: &Board) -> Result<()> {
    let posts = gump.find("posts").ok_or_else(|| anyhow!("board dialog has no posts"))?;
    gump.set_text(posts, board.html())?;
    if let Some(draft) = gump.find("draft") {
        gump.set_text(draft, "")?;
    }
    Ok(())
}


#[test]
fn test_board_keeps_newest() {
    let mut board = Board::new("Town Crier", 2);
    board.add_post("a", "first");
    board.add_post("b", "second");
    board.add_post("c", "third");
    let authors = board.posts().map(|post| post.author.as_str()).collect::<Vec<_>>();
    assert_eq!(authors, ["c", "b"]);
}

#[test]
fn test_html_escapes_posts() {
    let mut board = Board::new("Town Crier", 5);
    assert!(board.html().contains("Nothing has been posted yet."));
    board.add_post("Iolo", "<B>loud</B> & proud");
    let html = board.html();
    assert!(html.contains("<B>Iolo</B>: &lt;B&gt;loud&lt;/B&gt; &amp; proud<BR>"));
    assert!(!html.contains("Nothing"));
}

#[test]
fn test_post_and_refresh() {
    let actions = Actions::default();
    let mut board = Board::new("Town Crier", 5);
    let mut gump = build(&board, true, &actions, true).unwrap();
    let id = |name: &str| gump.entry(gump.find(name).unwrap()).unwrap().id().unwrap();
    let mut reply = gump::Reply {
        serial: gump.serial(),
        type_id: gump.type_id(),
        button_id: id("post").0,
        ..Default::default()
    };
    reply.texts.insert(id("draft"), " Hear ye ".into());
    gump.dispatch(&reply);
    assert_eq!(actions.pop(), Some(Action::Posted { text: "Hear ye".into() }));
    assert_eq!(actions.pop(), None);

    let revision = gump.revision();
    board.add_post("Iolo", "Hear ye");
    refresh(&mut gump, &board).unwrap();
    assert!(gump.revision() > revision);
    assert_eq!(gump.text(gump.find("draft").unwrap()), Some(""));
    assert!(gump.text(gump.find("posts").unwrap()).unwrap().contains("Hear ye"));
}

#[test]
fn test_blank_post_ignored() {
    let actions = Actions::default();
    let board = Board::new("Town Crier", 5);
    let mut gump = build(&board, true, &actions, false).unwrap();
    let button_id = gump.entry(gump.find("post").unwrap()).unwrap().id().unwrap().0;
    let reply = gump::Reply {
        serial: gump.serial(),
        type_id: gump.type_id(),
        button_id,
        ..Default::default()
    };
    let dispatch = gump.dispatch(&reply);
    assert_eq!(dispatch.texts, 1);
    assert!(actions.is_empty());
}

#[test]
fn test_read_only_board() {
    let actions = Actions::default();
    let board = Board::new("Town Crier", 5);
    let mut gump = build(&board, false, &actions, false).unwrap();
    assert!(gump.find("draft").is_none());
    assert_eq!(gump.entries().filter(|(_, entry)| entry.is_interactive()).count(), 0);
    let reply = gump::Reply {
        serial: gump.serial(),
        type_id: gump.type_id(),
        button_id: gump::reply::CLOSED_BUTTON_ID,
        ..Default::default()
    };
    assert!(gump.dispatch(&reply).closed);
    assert_eq!(actions.pop(), Some(Action::LeftBoard));
}

#[test]
fn test_viewer_rendering_has_no_field() {
    let board = Board::new("Town Crier", 5);
    let gump = build(&board, true, &Actions::default(), false).unwrap();
    let packet = gump.compile(gump::RenderMode::Inert, gump::Encoding::Fast).unwrap();
    let (layout, _) = gump::writer::read_layout(&packet.bytes).unwrap();
    assert!(!layout.contains("textentry"));
    assert!(!layout.contains("{ button"));
    assert_eq!(packet.texts, 0);
}
