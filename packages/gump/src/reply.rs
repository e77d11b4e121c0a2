//! Client replies and their dispatch to responders.
//!
//! When the player presses a reply button (or closes the dialog) the client
//! sends back which button it was, which switches are on, and the contents of
//! every text field. Dispatch first finalizes the state of every switch and
//! text field in the tree, then fires responders in a fixed order:
//!
//! 1. every checkbox and radio, in tree order, with its resolved state
//! 2. every text field, in tree order, with its new text
//! 3. the one reply button whose id matches, if any
//!
//! so that a button's responder always sees the final state of the rest of
//! the dialog.

use crate::{
    entry::{
        Entry,
        ButtonAction,
    },
    gump::{
        Gump,
        GumpSerial,
        GumpTypeId,
    },
    ids::EntryId,
    node::NodeKey,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    mem::take,
};


/// Button id the client reports when the dialog was closed without pressing
/// a reply button.
pub const CLOSED_BUTTON_ID: i32 = 0;


/// Reply from a client, already parsed from the wire by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Serial of the instance being replied to.
    pub serial: GumpSerial,
    /// Type id of the instance being replied to.
    pub type_id: GumpTypeId,
    /// Id of the pressed reply button, or `CLOSED_BUTTON_ID`.
    pub button_id: i32,
    /// Ids of switches that are on.
    pub switches: HashSet<EntryId>,
    /// Text of each text field, by id.
    pub texts: HashMap<EntryId, String>,
}

/// Something a responder is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// A checkbox or radio's resolved state. Fired for every switch on every
    /// reply, whether or not it changed.
    Switch {
        id: EntryId,
        on: bool,
    },
    /// A text field's new contents. Empty if the reply omitted it.
    Text {
        id: EntryId,
        text: String,
    },
    /// The reply button was pressed.
    Button {
        id: EntryId,
    },
    /// The dialog was closed without pressing any button that exists. Only
    /// delivered to the responder bound to the gump's root.
    Closed,
}

/// Callback bound to one node of a gump.
///
/// Responders get shared access to the gump after all reply state has been
/// applied. Errors are logged by the dispatcher and don't stop other
/// responders from running.
pub trait Responder: Send {
    fn respond(&mut self, gump: &Gump, interaction: &Interaction) -> anyhow::Result<()>;
}

impl<F> Responder for F
where
    F: FnMut(&Gump, &Interaction) -> anyhow::Result<()> + Send,
{
    fn respond(&mut self, gump: &Gump, interaction: &Interaction) -> anyhow::Result<()> {
        self(gump, interaction)
    }
}

/// Summary of one dispatched reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Number of switches resolved.
    pub switches: usize,
    /// Number of text fields resolved.
    pub texts: usize,
    /// The reply button that matched the pressed button id.
    pub button: Option<NodeKey>,
    /// Whether the reply was a close without a matching button.
    pub closed: bool,
    /// Number of responders that ran successfully.
    pub invoked: usize,
    /// Number of responders that returned an error.
    pub failed: usize,
}

impl Gump {
    /// Apply a reply to the entry tree and fire responders.
    ///
    /// Only entries currently attached to the tree take part. Never fails:
    /// unknown ids in the reply are ignored, missing text fields read as
    /// empty, and a pressed button id matching nothing fires no button.
    pub fn dispatch(&mut self, reply: &Reply) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let keys = self.walk()
            .into_iter()
            .map(|placed| placed.key)
            .collect::<Vec<_>>();
        let mut fired = Vec::new();

        // finalize switches
        for &key in &keys {
            let changed = match self.entry_mut_untracked(key) {
                Some(Entry::Checkbox(switch)) | Some(Entry::Radio(switch)) => {
                    let Some(id) = switch.id else { continue };
                    let on = reply.switches.contains(&id);
                    fired.push((key, Interaction::Switch { id, on }));
                    dispatch.switches += 1;
                    let changed = switch.checked != on;
                    switch.checked = on;
                    changed
                }
                _ => false,
            };
            if changed {
                self.touch();
            }
        }

        // finalize text fields
        for &key in &keys {
            let changed = match self.entry_mut_untracked(key) {
                Some(Entry::TextEntry(field)) => {
                    let Some(id) = field.id else { continue };
                    let text = reply.texts.get(&id).cloned().unwrap_or_default();
                    dispatch.texts += 1;
                    let changed = field.text != text;
                    if changed {
                        field.text = text.clone();
                    }
                    fired.push((key, Interaction::Text { id, text }));
                    changed
                }
                _ => false,
            };
            if changed {
                self.touch();
            }
        }

        // the pressed button
        let pressed = keys.iter().copied().find(|&key| match self.entry(key) {
            Some(Entry::Button(button)) => {
                button.action == ButtonAction::Reply
                    && button.id == Some(EntryId(reply.button_id))
            }
            _ => false,
        });
        if let Some(key) = pressed {
            fired.push((key, Interaction::Button { id: EntryId(reply.button_id) }));
            dispatch.button = Some(key);
        } else if reply.button_id == CLOSED_BUTTON_ID {
            fired.push((self.root(), Interaction::Closed));
            dispatch.closed = true;
        } else {
            warn!(
                serial = reply.serial.0,
                button_id = reply.button_id,
                "reply names a button that doesn't exist",
            );
        }

        // fire responders
        let mut responders = take(&mut self.responders);
        for (key, interaction) in &fired {
            if let Some(responder) = responders.get_mut(key) {
                match responder.respond(self, interaction) {
                    Ok(()) => dispatch.invoked += 1,
                    Err(e) => {
                        error!(%e, ?interaction, "gump responder failed");
                        dispatch.failed += 1;
                    }
                }
            }
        }
        self.responders = responders;

        trace!(?dispatch, serial = self.serial().0, "dispatched reply");
        dispatch
    }
}


#[cfg(test)]
mod test_util {
    use super::*;
    pub use std::sync::Arc;
    pub use parking_lot::Mutex;

    /// Record of fired interactions, shared with responders.
    pub type Log = Arc<Mutex<Vec<(&'static str, Interaction)>>>;

    /// Bind a responder that records interactions under `label`.
    pub fn record(gump: &mut Gump, key: NodeKey, label: &'static str, log: &Log) {
        let log = Arc::clone(log);
        gump.on(key, move |_: &Gump, interaction: &Interaction| {
            log.lock().push((label, interaction.clone()));
            Ok(())
        }).unwrap();
    }

    pub fn reply_to(gump: &Gump, button_id: i32) -> Reply {
        Reply {
            serial: gump.serial(),
            type_id: gump.type_id(),
            button_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
use self::test_util::*;

#[test]
fn test_checkbox_round_trip() {
    let log = Log::default();
    let mut gump = Gump::new("test.checkbox");
    let key = gump.add_checkbox(20, 20, 210, 211, false, EntryId(5)).unwrap();
    record(&mut gump, key, "box", &log);
    gump.compile(crate::RenderMode::Interactive, crate::Encoding::Fast).unwrap();

    let mut reply = reply_to(&gump, CLOSED_BUTTON_ID);
    reply.switches.insert(EntryId(5));
    let dispatch = gump.dispatch(&reply);

    assert_eq!(gump.switch_state(key), Some(true));
    assert_eq!(dispatch.switches, 1);
    assert_eq!(
        *log.lock(),
        vec![("box", Interaction::Switch { id: EntryId(5), on: true })],
    );
}

#[test]
fn test_switch_callbacks_fire_even_when_unchanged() {
    let log = Log::default();
    let mut gump = Gump::new("test.unchanged");
    let key = gump.add_radio(0, 0, 208, 209, false, None).unwrap();
    record(&mut gump, key, "radio", &log);
    let id = gump.entry(key).unwrap().id().unwrap();

    let revision = gump.revision();
    gump.dispatch(&reply_to(&gump, CLOSED_BUTTON_ID));
    assert_eq!(gump.revision(), revision);
    assert_eq!(*log.lock(), vec![("radio", Interaction::Switch { id, on: false })]);
}

#[test]
fn test_missing_text_reads_as_empty() {
    let log = Log::default();
    let mut gump = Gump::new("test.text");
    let key = gump.add_text_entry(0, 0, 200, 20, 0, "initial", None).unwrap();
    record(&mut gump, key, "field", &log);
    let id = gump.entry(key).unwrap().id().unwrap();

    gump.dispatch(&reply_to(&gump, CLOSED_BUTTON_ID));
    assert_eq!(gump.text(key), Some(""));
    assert_eq!(*log.lock(), vec![("field", Interaction::Text { id, text: String::new() })]);
}

#[test]
fn test_dispatch_order_and_final_state_visible_to_button() {
    let log = Log::default();
    let mut gump = Gump::new("test.order");
    let ok = gump.add_button(10, 100, 4005, 4007, EntryId(1)).unwrap();
    let name = gump.add_text_entry(10, 40, 200, 20, 0, "", EntryId(2)).unwrap();
    let agree = gump.add_checkbox(10, 70, 210, 211, false, EntryId(3)).unwrap();
    record(&mut gump, ok, "ok", &log);
    record(&mut gump, name, "name", &log);
    record(&mut gump, agree, "agree", &log);

    let seen = Arc::new(Mutex::new(None));
    gump.on(ok, {
        let seen = Arc::clone(&seen);
        move |gump: &Gump, _: &Interaction| {
            *seen.lock() = Some((gump.switch_state(agree), gump.text(name).map(str::to_owned)));
            Ok(())
        }
    }).unwrap();

    let mut reply = reply_to(&gump, 1);
    reply.switches.insert(EntryId(3));
    reply.texts.insert(EntryId(2), "Lord British".into());
    let dispatch = gump.dispatch(&reply);

    let labels = log.lock().iter().map(|&(label, _)| label).collect::<Vec<_>>();
    // `ok` was rebound, so only the switch and text recorders remain
    assert_eq!(labels, vec!["agree", "name"]);
    assert_eq!(dispatch.button, Some(ok));
    assert_eq!(*seen.lock(), Some((Some(true), Some("Lord British".to_owned()))));
}

#[test]
fn test_unmatched_button_fires_nothing() {
    let log = Log::default();
    let mut gump = Gump::new("test.unmatched");
    let ok = gump.add_button(0, 0, 4005, 4007, EntryId(1)).unwrap();
    let root = gump.root();
    record(&mut gump, ok, "ok", &log);
    record(&mut gump, root, "root", &log);

    let dispatch = gump.dispatch(&reply_to(&gump, 77));
    assert_eq!(dispatch.button, None);
    assert!(!dispatch.closed);
    assert!(log.lock().is_empty());
}

#[test]
fn test_close_goes_to_root_responder() {
    let log = Log::default();
    let mut gump = Gump::new("test.close");
    let ok = gump.add_button(0, 0, 4005, 4007, EntryId(1)).unwrap();
    let root = gump.root();
    record(&mut gump, ok, "ok", &log);
    record(&mut gump, root, "root", &log);

    let dispatch = gump.dispatch(&reply_to(&gump, CLOSED_BUTTON_ID));
    assert!(dispatch.closed);
    assert_eq!(*log.lock(), vec![("root", Interaction::Closed)]);
}

#[test]
fn test_failing_responder_does_not_stop_dispatch() {
    let log = Log::default();
    let mut gump = Gump::new("test.fail");
    let a = gump.add_checkbox(0, 0, 210, 211, false, None).unwrap();
    let ok = gump.add_button(0, 30, 4005, 4007, None).unwrap();
    gump.on(a, |_: &Gump, _: &Interaction| Err(anyhow::anyhow!("boom"))).unwrap();
    record(&mut gump, ok, "ok", &log);
    let ok_id = gump.entry(ok).unwrap().id().unwrap();

    let dispatch = gump.dispatch(&reply_to(&gump, ok_id.0));
    assert_eq!(dispatch.failed, 1);
    assert_eq!(dispatch.invoked, 1);
    assert_eq!(*log.lock(), vec![("ok", Interaction::Button { id: ok_id })]);
}

#[test]
fn test_paginated_end_to_end() {
    let log = Log::default();
    let mut gump = Gump::new("test.pages");
    gump.add_page(0);
    let cancel = gump.add_button(200, 250, 4017, 4019, EntryId(0)).unwrap();
    record(&mut gump, cancel, "cancel", &log);
    let mut page_buttons = Vec::new();
    for page in 1..=3u32 {
        gump.add_page(page);
        let key = gump.add_button(20, 20, 4005, 4007, EntryId(page as i32)).unwrap();
        record(&mut gump, key, ["one", "two", "three"][page as usize - 1], &log);
        if page < 3 {
            gump.add_page_button(200, 20, 4005, 4007, page + 1);
        }
        page_buttons.push(key);
    }
    assert_eq!(gump.page_of(cancel), Some(0));
    assert_eq!(gump.page_of(page_buttons[1]), Some(2));

    gump.dispatch(&reply_to(&gump, 2));
    assert_eq!(*log.lock(), vec![("two", Interaction::Button { id: EntryId(2) })]);

    log.lock().clear();
    gump.dispatch(&reply_to(&gump, 0));
    assert_eq!(*log.lock(), vec![("cancel", Interaction::Button { id: EntryId(0) })]);
}
