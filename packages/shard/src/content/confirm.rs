//! Welcome dialog shown to every player on connect.
//!
//! Page 1 is an introduction, page 2 asks for a name and whether the player wants to post on the
//! bulletin board or only read it. Cancel is on page 0 so it's reachable from both.

use super::*;
use gump::{
    Gump,
    Interaction,
};
use anyhow::*;


/// Dialog kind, from which its type id is derived.
pub const KIND: &'static str = "shard.confirm";

/// Longest name a player can type.
pub const NAME_LIMIT: u32 = 16;

/// Name used when a player leaves the field empty.
pub const ANONYMOUS: &'static str = "Anonymous";

const INTRO: &'static str = "<BASEFONT COLOR=#FFFFFF>Hail, traveller!<BR><BR>\
    This shard keeps a bulletin board in the town square. Everyone who joins can read it, \
    and anyone who asks may post to it.<BR><BR>\
    Press the arrow to continue.</BASEFONT>";

/// Cliloc for "CANCEL".
const CANCEL_TOOLTIP: u32 = 1011012;
/// Cliloc for the board's rules of conduct.
const RULES_CLILOC: u32 = 1072207;


/// Build the welcome dialog. Accepting pushes `Action::Joined`, cancelling or closing it pushes
/// `Action::Declined`.
pub fn build(actions: &Actions, macro_protection: bool) -> Result<Gump> {
    let mut gump = Gump::new(KIND);
    gump.set_macro_protected(macro_protection);
    gump.set_location(120, 80);
    gump.set_resizable(false);

    gump.add_page(0);
    gump.add_background(0, 0, 420, 320, art::BACKGROUND);
    gump.add_alpha_region(10, 10, 400, 300);
    gump.add_label(20, 15, TEXT_HUE, "Welcome to the shard");
    let cancel = gump.add_button(330, 275, art::CANCEL, art::CANCEL + 1, None)?;
    gump.add_tooltip(CANCEL_TOOLTIP);

    gump.add_page(1);
    gump.add_html(20, 45, 380, 160, INTRO, false, true);
    gump.add_item(30, 220, art::SCROLL_ITEM);
    gump.add_page_button(370, 220, art::NEXT_PAGE, art::NEXT_PAGE + 2, 2);

    gump.add_page(2);
    let form = gump.add_container(gump.root(), 20, 45)?;
    gump.add_to(form, gump::Entry::CroppedLabel(gump::entry::CroppedLabel {
        x: 0, y: 0, width: 80, height: 20, hue: TEXT_HUE, text: "Your name".into(),
    }))?;
    gump.add_to(form, gump::Entry::ImageTiled(gump::entry::ImageTiled {
        x: 90, y: 0, width: 200, height: 22, gump_id: art::TEXT_BACKGROUND,
    }))?;
    let name = gump.add_to(form, gump::Entry::TextEntry(gump::entry::TextEntry {
        x: 95, y: 1, width: 190, height: 20, hue: 0,
        text: String::new(),
        limit: Some(NAME_LIMIT),
        id: None,
    }))?;
    let notify = gump.add_to(form, gump::Entry::Checkbox(gump::entry::Switch {
        x: 0, y: 40, off: art::CHECKBOX_OFF, on: art::CHECKBOX_ON, checked: true, id: None,
    }))?;
    gump.add_to(form, label(30, 40, "Tell me about new posts"))?;
    gump.add_to(form, gump::Entry::Group(1))?;
    let read = gump.add_to(form, gump::Entry::Radio(gump::entry::Switch {
        x: 0, y: 80, off: art::RADIO_OFF, on: art::RADIO_ON, checked: true, id: None,
    }))?;
    gump.add_to(form, label(30, 80, "I only want to read the board"))?;
    let post = gump.add_to(form, gump::Entry::Radio(gump::entry::Switch {
        x: 0, y: 110, off: art::RADIO_OFF, on: art::RADIO_ON, checked: false, id: None,
    }))?;
    gump.add_to(form, label(30, 110, "I want to post too"))?;
    gump.add_localized_html_color(20, 205, 380, 40, RULES_CLILOC, 0x7fff, false, false);
    gump.add_page_button(20, 275, art::PREV_PAGE, art::PREV_PAGE + 2, 1);
    let ok = gump.add_button(260, 275, art::OK, art::OK + 1, None)?;

    for (key, node_name) in [
        (name, "name"),
        (notify, "notify"),
        (read, "read"),
        (post, "post"),
        (ok, "ok"),
        (cancel, "cancel"),
    ] {
        gump.set_name(key, node_name)?;
    }

    gump.on(ok, {
        let actions = Arc::clone(actions);
        move |gump: &Gump, _: &Interaction| {
            let typed = gump.text(name).unwrap_or_default().trim();
            actions.push(Action::Joined {
                name: if typed.is_empty() { ANONYMOUS } else { typed }.to_owned(),
                post: gump.switch_state(post) == Some(true),
                notify: gump.switch_state(notify) == Some(true),
            });
            Ok(())
        }
    })?;
    gump.on(cancel, {
        let actions = Arc::clone(actions);
        move |_: &Gump, _: &Interaction| {
            actions.push(Action::Declined);
            Ok(())
        }
    })?;
    let root = gump.root();
    gump.on(root, {
        let actions = Arc::clone(actions);
        move |_: &Gump, interaction: &Interaction| {
            ensure!(*interaction == Interaction::Closed, "unexpected {:?} at root", interaction);
            actions.push(Action::Declined);
            Ok(())
        }
    })?;

    Ok(gump)
}

fn label(x: i32, y: i32, text: &str) -> gump::Entry {
    gump::Entry::Label(gump::entry::Label {
        x,
        y,
        hue: TEXT_HUE,
        text: text.to_owned(),
    })
}


#[cfg(test)]
fn reply_for(gump: &Gump, button: &str) -> gump::Reply {
    let id = |name: &str| gump.entry(gump.find(name).unwrap()).unwrap().id().unwrap();
    gump::Reply {
        serial: gump.serial(),
        type_id: gump.type_id(),
        button_id: id(button).0,
        ..Default::default()
    }
}

#[test]
fn test_pages() {
    let gump = build(&Actions::default(), false).unwrap();
    assert_eq!(gump.page_of(gump.find("cancel").unwrap()), Some(0));
    assert_eq!(gump.page_of(gump.find("ok").unwrap()), Some(2));
    assert_eq!(gump.page_of(gump.find("post").unwrap()), Some(2));
    assert_eq!(gump.switch_count(), 3);
    assert_eq!(gump.text_entry_count(), 1);
    assert_eq!(gump.absolute_position(gump.find("name").unwrap()), Some((115, 46)));
}

#[test]
fn test_accept() {
    let actions = Actions::default();
    let mut gump = build(&actions, true).unwrap();
    let mut reply = reply_for(&gump, "ok");
    let id = |name: &str| gump.entry(gump.find(name).unwrap()).unwrap().id().unwrap();
    reply.switches.insert(id("post"));
    reply.texts.insert(id("name"), "  Iolo ".into());
    gump.dispatch(&reply);
    assert_eq!(actions.pop(), Some(Action::Joined { name: "Iolo".into(), post: true, notify: false }));
    assert_eq!(actions.pop(), None);
}

#[test]
fn test_empty_name_is_anonymous() {
    let actions = Actions::default();
    let mut gump = build(&actions, false).unwrap();
    let reply = reply_for(&gump, "ok");
    gump.dispatch(&reply);
    assert!(matches!(actions.pop(), Some(Action::Joined { name, .. }) if name == ANONYMOUS));
}

#[test]
fn test_cancel_and_close_decline() {
    let actions = Actions::default();
    let mut gump = build(&actions, false).unwrap();
    let reply = reply_for(&gump, "cancel");
    gump.dispatch(&reply);
    assert_eq!(actions.pop(), Some(Action::Declined));

    let mut reply = reply_for(&gump, "cancel");
    reply.button_id = gump::reply::CLOSED_BUTTON_ID;
    let dispatch = gump.dispatch(&reply);
    assert!(dispatch.closed);
    assert_eq!(actions.pop(), Some(Action::Declined));
}

#[test]
fn test_compiles_in_every_form() {
    let gump = build(&Actions::default(), true).unwrap();
    for mode in [gump::RenderMode::Interactive, gump::RenderMode::Inert] {
        for encoding in [gump::Encoding::Fast, gump::Encoding::Packed] {
            let packet = gump.compile(mode, encoding).unwrap();
            let (layout, _) = gump::writer::read_layout(&packet.bytes).unwrap();
            assert!(layout.starts_with("{ noresize }{ page 0 }"));
        }
    }
}
