//! Scripted clients which play through the shard's dialogs against a running shard loop.
//!
//! Stands in for a real transport: it feeds network events into the shard's channel, decodes the
//! packets the shard queues, and answers them the way a player would.

use crate::{
    channel::{
        ShardReceiver,
        ShardSender,
    },
    content::{
        art,
        bulletin,
        confirm,
    },
    event::NetworkEvent,
    runner::{
        self,
        RunStats,
    },
    settings::Settings,
    sink::Outbound,
};
use gump::{
    writer::{
        read_header,
        read_layout,
        CLOSE_PACKET_ID,
    },
    reply::CLOSED_BUTTON_ID,
    EntryId,
    GumpSerial,
    GumpTypeId,
    Reply,
};
use std::{
    collections::HashMap,
    sync::Arc,
    thread,
    time::{
        Duration,
        Instant,
    },
};
use crossbeam::queue::SegQueue;
use anyhow::*;


/// How long to wait for the shard to send something before giving up.
pub const TIMEOUT: Duration = Duration::from_secs(10);

const FAST: usize = 0;
const PACKED: usize = 1;
const READER: usize = 2;


/// What happened during a demo run.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub stats: RunStats,
    /// Packets the clients received, by connection.
    pub received: HashMap<usize, usize>,
    /// The posts on the board, as the reader last saw them.
    pub board: String,
}

/// Run the shard in a new thread and play three clients through it: one which owns the bulletin
/// board, one on a packed-capable client which joins to post, and one which only reads.
///
/// Stops the shard before returning.
pub fn run_demo(settings: Settings, send: ShardSender, recv: ShardReceiver) -> Result<DemoReport> {
    let outbound = Arc::new(SegQueue::new());
    let thread = thread::Builder::new()
        .name("shard".into())
        .spawn({
            let outbound = Arc::clone(&outbound);
            move || runner::run(settings, recv, outbound)
        })?;

    let mut clients = Clients::new(outbound);
    let played = play(&send, &mut clients);
    send.send_stop();
    let stats = thread.join().map_err(|_| anyhow!("shard thread panicked"))?;
    let board = played?;
    info!(?stats, "demo finished");
    Ok(DemoReport {
        stats,
        received: clients.received,
        board,
    })
}

fn play(send: &ShardSender, clients: &mut Clients) -> Result<String> {
    let confirm_type = GumpTypeId::of_kind(confirm::KIND);
    let board_type = GumpTypeId::of_kind(bulletin::KIND);

    send.send_network(NetworkEvent::Connected { conn: FAST, packed: false });
    send.send_network(NetworkEvent::Connected { conn: PACKED, packed: true });
    send.send_network(NetworkEvent::Connected { conn: READER, packed: false });
    clients.wait("welcome dialogs", |c| {
        [FAST, PACKED, READER].iter().all(|&conn| c.dialog(conn, confirm_type).is_some())
    })?;
    let first_welcome = clients.expect(FAST, confirm_type)?.serial;

    // the first to join owns the board
    send.send_network(accept(clients.expect(FAST, confirm_type)?, "Iolo", true, false)?);
    clients.wait("board for its owner", |c| c.dialog(FAST, board_type).is_some())?;
    send.send_network(accept(clients.expect(PACKED, confirm_type)?, "Shamino", true, false)?);
    clients.wait("board for a poster", |c| c.dialog(PACKED, board_type).is_some())?;
    send.send_network(accept(clients.expect(READER, confirm_type)?, "", false, true)?);
    clients.wait("board for a reader", |c| c.dialog(READER, board_type).is_some())?;
    ensure!(
        clients.expect(READER, board_type)?.find("textentrylimited").is_empty(),
        "reader was sent a board they can post on",
    );

    // the reader wanders off, and is brought back by the next post
    let board = clients.expect(READER, board_type)?;
    send.send_network(NetworkEvent::Reply {
        conn: READER,
        reply: reply_to(board, CLOSED_BUTTON_ID),
    });
    clients.forget(READER, board_type);

    let board = clients.expect(PACKED, board_type)?;
    let mut reply = reply_to(board, button(board, art::OK)?);
    reply.texts.insert(text_entries(board)?[0], "Hear ye, hear ye!".into());
    send.send_network(NetworkEvent::Reply { conn: PACKED, reply });
    clients.wait("post to reach the reader", |c| {
        c.dialog(READER, board_type)
            .map(|board| board.strings.iter().any(|s| s.contains("Hear ye")))
            .unwrap_or(false)
    })?;
    let seen = clients.expect(READER, board_type)?.strings.iter()
        .find(|s| s.contains("Hear ye"))
        .cloned()
        .unwrap_or_default();

    // a reply to a dialog that's long gone does nothing
    send.send_network(NetworkEvent::Reply {
        conn: FAST,
        reply: Reply {
            serial: first_welcome,
            type_id: confirm_type,
            button_id: CLOSED_BUTTON_ID,
            ..Default::default()
        },
    });

    // the owner leaving takes the board down for everyone
    let board = clients.expect(FAST, board_type)?;
    send.send_network(NetworkEvent::Reply {
        conn: FAST,
        reply: reply_to(board, CLOSED_BUTTON_ID),
    });
    clients.forget(FAST, board_type);
    clients.wait("board to close", |c| {
        c.dialog(PACKED, board_type).is_none() && c.dialog(READER, board_type).is_none()
    })?;

    for conn in [FAST, PACKED, READER] {
        send.send_network(NetworkEvent::Disconnected { conn });
    }
    clients.wait("disconnects", |_| send.pending() == 0)?;
    Ok(seen)
}


// dialog as a client sees it
#[derive(Debug, Clone)]
struct Dialog {
    conn: usize,
    serial: GumpSerial,
    type_id: GumpTypeId,
    layout: String,
    strings: Vec<String>,
}

impl Dialog {
    // args of every token with the given keyword
    fn find(&self, keyword: &str) -> Vec<Vec<i64>> {
        self.layout
            .split('}')
            .filter_map(|token| {
                let mut parts = token.trim().trim_start_matches('{').split_whitespace();
                if parts.next() != Some(keyword) {
                    return None;
                }
                Some(parts.filter_map(|arg| arg.parse().ok()).collect())
            })
            .collect()
    }
}

fn entry_id(n: i64) -> Result<EntryId> {
    Ok(EntryId(i32::try_from(n)?))
}

// id of the reply button drawn with the given art
fn button(dialog: &Dialog, normal: u32) -> Result<i32> {
    dialog.find("button")
        .into_iter()
        .find(|args| args.len() == 7 && args[2] == normal as i64 && args[4] == 1)
        .map(|args| args[6] as i32)
        .ok_or_else(|| anyhow!("dialog {} has no button {}", dialog.serial.0, normal))
}

fn switches(dialog: &Dialog, keyword: &str) -> Result<Vec<EntryId>> {
    dialog.find(keyword)
        .into_iter()
        .map(|args| entry_id(args.get(5).copied().unwrap_or(-1)))
        .collect()
}

fn text_entries(dialog: &Dialog) -> Result<Vec<EntryId>> {
    let ids = dialog.find("textentrylimited")
        .into_iter()
        .map(|args| entry_id(args.get(5).copied().unwrap_or(-1)))
        .collect::<Result<Vec<_>>>()?;
    ensure!(!ids.is_empty(), "dialog {} has no text fields", dialog.serial.0);
    Ok(ids)
}

fn reply_to(dialog: &Dialog, button_id: i32) -> Reply {
    Reply {
        serial: dialog.serial,
        type_id: dialog.type_id,
        button_id,
        ..Default::default()
    }
}

// fill in and accept the welcome dialog
fn accept(dialog: &Dialog, name: &str, post: bool, notify: bool) -> Result<NetworkEvent> {
    let mut reply = reply_to(dialog, button(dialog, art::OK)?);
    let radios = switches(dialog, "radio")?;
    ensure!(radios.len() == 2, "expected 2 radios, found {}", radios.len());
    reply.switches.insert(radios[if post { 1 } else { 0 }]);
    if notify {
        let checkboxes = switches(dialog, "checkbox")?;
        reply.switches.extend(checkboxes);
    }
    reply.texts.insert(text_entries(dialog)?[0], name.to_owned());
    let conn = dialog.conn;
    Ok(NetworkEvent::Reply { conn, reply })
}


// the clients' side of the connection
struct Clients {
    outbound: Arc<SegQueue<Outbound>>,
    open: HashMap<(usize, GumpTypeId), Dialog>,
    received: HashMap<usize, usize>,
}

impl Clients {
    fn new(outbound: Arc<SegQueue<Outbound>>) -> Self {
        Clients {
            outbound,
            open: HashMap::new(),
            received: HashMap::new(),
        }
    }

    fn dialog(&self, conn: usize, type_id: GumpTypeId) -> Option<&Dialog> {
        self.open.get(&(conn, type_id))
    }

    fn expect(&self, conn: usize, type_id: GumpTypeId) -> Result<&Dialog> {
        self.dialog(conn, type_id)
            .ok_or_else(|| anyhow!("connection {} has no dialog of type {:#x}", conn, type_id.0))
    }

    // the client closes its dialog itself when it replies
    fn forget(&mut self, conn: usize, type_id: GumpTypeId) {
        self.open.remove(&(conn, type_id));
    }

    // take packets until the condition holds
    fn wait(&mut self, what: &str, mut done: impl FnMut(&Self) -> bool) -> Result<()> {
        let deadline = Instant::now() + TIMEOUT;
        while !done(self) {
            ensure!(Instant::now() < deadline, "timed out waiting for {}", what);
            match self.outbound.pop() {
                Some(out) => self.on_packet(out)?,
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        debug!(what, "demo step done");
        Ok(())
    }

    fn on_packet(&mut self, out: Outbound) -> Result<()> {
        *self.received.entry(out.conn).or_default() += 1;
        if out.bytes.first() == Some(&CLOSE_PACKET_ID) {
            let type_id = out.bytes.get(5..9)
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(|bytes| GumpTypeId(u32::from_be_bytes(bytes)))
                .ok_or_else(|| anyhow!("close packet cut off"))?;
            trace!(conn = out.conn, type_id = type_id.0, "client closed dialog");
            self.forget(out.conn, type_id);
            return Ok(());
        }
        let (serial, type_id) = read_header(&out.bytes)?;
        let (layout, strings) = read_layout(&out.bytes)?;
        trace!(conn = out.conn, serial = serial.0, %layout, "client opened dialog");
        self.open.insert((out.conn, type_id), Dialog {
            conn: out.conn,
            serial,
            type_id,
            layout,
            strings,
        });
        Ok(())
    }
}


#[test]
fn test_demo_plays_through() {
    let (send, recv) = crate::channel::channel();
    let report = run_demo(Settings::default(), send, recv).unwrap();
    assert_eq!(report.board, "<BASEFONT COLOR=#FFFFFF><B>Shamino</B>: Hear ye, hear ye!<BR></BASEFONT>");
    assert_eq!(report.stats.connections, 3);
    assert_eq!(report.stats.posts, 1);
    assert_eq!(report.stats.stale, 1);
    assert_eq!(report.stats.from_viewers, 1);
    assert_eq!(report.stats.replies, 7);
    let received = report.received.values().sum::<usize>() as u64;
    assert_eq!(received, report.stats.packets_sent);
}

#[test]
fn test_demo_without_macro_protection() {
    let (send, recv) = crate::channel::channel();
    let settings = Settings {
        macro_protection: false,
        ..Default::default()
    };
    let report = run_demo(settings, send, recv).unwrap();
    assert_eq!(report.stats.posts, 1);
}
