//! Running the shard.
//!
//! This is the top-level integration layer between the transport, the gump manager, and the
//! shard's dialogs.

use crate::{
    channel::ShardReceiver,
    content::{
        bulletin::{
            self,
            Board,
        },
        confirm,
        Action,
        Actions,
    },
    event::*,
    settings::Settings,
    sink::{
        Outbound,
        QueueSink,
    },
};
use gump::{
    Capabilities,
    GumpManager,
    GumpSerial,
    GumpTypeId,
    RenderMode,
    ReplyOutcome,
    SessionKey,
    Encoding,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use crossbeam::queue::SegQueue;
use anyhow::*;
use std::result::Result::Ok;


/// How long the loop waits for an event before logging that it's idle.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(5);


/// Counters reported when the shard stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub connections: u64,
    pub replies: u64,
    /// Replies to dialogs the player no longer had open.
    pub stale: u64,
    /// Replies from players only viewing a dialog.
    pub from_viewers: u64,
    pub posts: u64,
    pub packets_sent: u64,
}

/// Run the shard in this thread until it's asked to stop. Packets for clients are pushed onto
/// `outbound` for the transport to deliver.
pub fn run(settings: Settings, recv: ShardReceiver, outbound: Arc<SegQueue<Outbound>>) -> RunStats {
    let mut shard = Shard::new(settings, outbound);
    loop {
        let Some(event) = recv.recv(Some(Instant::now() + IDLE_INTERVAL), None) else {
            trace!(players = shard.players.len(), "shard idle");
            continue;
        };
        match event {
            ShardEvent::Stop => {
                info!("shard stopping (stop requested)");
                return shard.finish();
            }
            ShardEvent::Network(event) => shard.on_network_event(event),
        }
    }
}


struct Shard {
    settings: Settings,
    manager: GumpManager<QueueSink>,
    players: HashMap<usize, Player>,
    actions: Actions,
    board: Board,
    // the shared board dialog posters are added to, if one is open
    board_serial: Option<GumpSerial>,
    stats: RunStats,
}

struct Player {
    session: SessionKey,
    // none until they accept the welcome dialog
    name: Option<String>,
    post: bool,
    notify: bool,
}

impl Shard {
    fn new(settings: Settings, outbound: Arc<SegQueue<Outbound>>) -> Self {
        Shard {
            manager: GumpManager::new(settings.manager.clone(), QueueSink::new(outbound)),
            players: HashMap::new(),
            actions: Actions::default(),
            board: Board::new(settings.board_title.clone(), settings.max_posts),
            board_serial: None,
            stats: RunStats::default(),
            settings,
        }
    }

    fn finish(mut self) -> RunStats {
        self.stats.packets_sent = self.manager.sink().sent();
        info!(stats = ?self.stats, "shard stopped");
        self.stats
    }

    fn on_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected { conn, packed } => self.on_connected(conn, packed),
            NetworkEvent::Reply { conn, reply } => self.on_reply(conn, &reply),
            NetworkEvent::Disconnected { conn } => self.on_disconnected(conn),
        }
    }

    fn on_connected(&mut self, conn: usize, packed: bool) {
        if self.players.contains_key(&conn) {
            warn!(conn, "connection connected twice");
            return;
        }
        let session = self.manager.connect(Capabilities { packed });
        self.manager.sink_mut().bind(session, conn);
        self.players.insert(conn, Player {
            session,
            name: None,
            post: false,
            notify: false,
        });
        self.stats.connections += 1;
        info!(conn, packed, "player connected");

        let opened = confirm::build(&self.actions, self.settings.macro_protection)
            .and_then(|gump| Ok(self.manager.open(session, gump)?));
        match opened {
            Ok(serial) => self.log_layout(serial),
            Err(e) => error!(%e, conn, "failed to open welcome dialog"),
        }
    }

    fn on_reply(&mut self, conn: usize, reply: &gump::Reply) {
        let Some(player) = self.players.get(&conn) else {
            warn!(conn, "reply from unknown connection");
            return;
        };
        let session = player.session;
        let author = player.name.clone().unwrap_or_else(|| confirm::ANONYMOUS.to_owned());
        self.stats.replies += 1;

        // take posts onto the board before the manager resends it, so members get one
        // up-to-date copy
        let mut taken = Vec::new();
        let actions = &self.actions;
        let board = &mut self.board;
        let outcome = self.manager.on_reply_with(session, reply, |gump| {
            let mut posted = false;
            while let Some(action) = actions.pop() {
                if let Action::Posted { ref text } = action {
                    board.add_post(author.clone(), text.clone());
                    posted = true;
                }
                taken.push(action);
            }
            if posted && gump.type_id() == GumpTypeId::of_kind(bulletin::KIND) {
                if let Err(e) = bulletin::refresh(gump, board) {
                    error!(%e, "failed to refresh board dialog");
                }
            }
        });
        match outcome {
            ReplyOutcome::Dispatched(dispatch) => {
                if dispatch.failed > 0 {
                    warn!(conn, failed = dispatch.failed, "some dialog responders failed");
                }
            }
            ReplyOutcome::Stale => self.stats.stale += 1,
            ReplyOutcome::FromViewer => self.stats.from_viewers += 1,
        }
        self.check_board();

        for action in taken {
            if let Err(e) = self.on_action(conn, action) {
                error!(%e, conn, "failed to handle dialog action");
            }
        }
    }

    fn on_disconnected(&mut self, conn: usize) {
        let Some(player) = self.players.remove(&conn) else {
            warn!(conn, "unknown connection disconnected");
            return;
        };
        self.manager.disconnect(player.session);
        self.manager.sink_mut().unbind(player.session);
        self.check_board();
        info!(conn, "player disconnected");
    }

    fn on_action(&mut self, conn: usize, action: Action) -> Result<()> {
        match action {
            Action::Joined { name, post, notify } => {
                let player = self.players.get_mut(&conn)
                    .ok_or_else(|| anyhow!("no player on connection {}", conn))?;
                info!(conn, %name, post, notify, "player joined");
                player.name = Some(name);
                player.post = post;
                player.notify = notify;
                self.show_board(conn)?;
            }
            Action::Declined => info!(conn, "player declined to join"),
            Action::Posted { text } => {
                info!(conn, %text, "player posted");
                self.stats.posts += 1;
                let session = self.players.get(&conn)
                    .ok_or_else(|| anyhow!("no player on connection {}", conn))?
                    .session;
                match self.board_serial {
                    // resent with the post already on it
                    Some(serial) if self.manager.role(serial, session).is_some() => (),
                    // their reply took them off the board
                    Some(serial) => {
                        self.manager.broadcast(serial)?;
                        self.show_board(conn)?;
                    }
                    // their reply finished the only copy
                    None => self.show_board(conn)?,
                }
                self.notify_players(conn);
            }
            Action::LeftBoard => debug!(conn, "player left the board"),
        }
        Ok(())
    }

    // show the board to a player who has joined
    fn show_board(&mut self, conn: usize) -> Result<()> {
        let player = self.players.get(&conn)
            .ok_or_else(|| anyhow!("no player on connection {}", conn))?;
        let session = player.session;
        let post = player.post;

        if let Some(serial) = self.board_serial {
            if self.manager.role(serial, session).is_some() {
                self.manager.send_to(serial, session)?;
            } else if post {
                self.manager.add_user(serial, session)?;
            } else {
                self.manager.add_viewer(serial, session)?;
            }
            return Ok(());
        }

        let gump = bulletin::build(&self.board, post, &self.actions, self.settings.macro_protection)?;
        let serial = self.manager.open(session, gump)?;
        if post {
            self.board_serial = Some(serial);
        }
        self.log_layout(serial);
        Ok(())
    }

    // show the board to everyone who asked to hear about new posts and isn't already looking
    fn notify_players(&mut self, poster: usize) {
        let board_type = GumpTypeId::of_kind(bulletin::KIND);
        let mut waiting = self.players.iter()
            .filter(|&(&conn, player)| {
                conn != poster
                    && player.notify
                    && player.name.is_some()
                    && self.manager.tracked(player.session, board_type).is_none()
            })
            .map(|(&conn, _)| conn)
            .collect::<Vec<_>>();
        waiting.sort();
        for conn in waiting {
            if let Err(e) = self.show_board(conn) {
                error!(%e, conn, "failed to show board to notified player");
            }
        }
    }

    // forget the shared board once the manager has dropped it
    fn check_board(&mut self) {
        if let Some(serial) = self.board_serial {
            if self.manager.gump(serial).is_none() {
                debug!(serial = serial.0, "shared board closed");
                self.board_serial = None;
            }
        }
    }

    fn log_layout(&self, serial: GumpSerial) {
        if !self.settings.log_layouts {
            return;
        }
        let Some(gump) = self.manager.gump(serial) else { return };
        let layout = gump.compile(RenderMode::Interactive, Encoding::Fast)
            .and_then(|packet| gump::writer::read_layout(&packet.bytes));
        match layout {
            Ok((layout, strings)) => info!(serial = serial.0, %layout, ?strings, "opened dialog"),
            Err(e) => warn!(%e, serial = serial.0, "failed to render dialog layout"),
        }
    }
}


#[cfg(test)]
fn run_script(settings: Settings, events: Vec<NetworkEvent>) -> (RunStats, Vec<Outbound>) {
    let (send, recv) = crate::channel::channel();
    let outbound = Arc::new(SegQueue::new());
    for event in events {
        send.send_network(event);
    }
    // stop overtakes network events, so only send it once they're all taken
    let thread = std::thread::spawn({
        let outbound = Arc::clone(&outbound);
        move || run(settings, recv, outbound)
    });
    while send.pending() > 0 {
        std::thread::sleep(Duration::from_millis(1));
    }
    send.send_stop();
    let stats = thread.join().unwrap();
    let mut sent = Vec::new();
    while let Some(out) = outbound.pop() {
        sent.push(out);
    }
    (stats, sent)
}

#[test]
fn test_connect_opens_welcome() {
    let (stats, sent) = run_script(Settings::default(), vec![
        NetworkEvent::Connected { conn: 3, packed: false },
        NetworkEvent::Connected { conn: 4, packed: true },
        NetworkEvent::Connected { conn: 3, packed: true },
    ]);
    assert_eq!(stats.connections, 2);
    assert_eq!(sent.len(), 2);
    let confirm_type = GumpTypeId::of_kind(confirm::KIND);
    assert_eq!(sent[0].conn, 3);
    assert_eq!(sent[0].bytes[0], gump::writer::FAST_PACKET_ID);
    assert_eq!(sent[1].conn, 4);
    assert_eq!(sent[1].bytes[0], gump::writer::PACKED_PACKET_ID);
    for out in &sent {
        assert_eq!(gump::writer::read_header(&out.bytes).unwrap().1, confirm_type);
    }
}

#[test]
fn test_unknown_connections_ignored() {
    let (stats, sent) = run_script(Settings::default(), vec![
        NetworkEvent::Reply { conn: 9, reply: Default::default() },
        NetworkEvent::Disconnected { conn: 9 },
    ]);
    assert_eq!(stats, RunStats::default());
    assert!(sent.is_empty());
}

#[test]
fn test_stale_reply_counted() {
    let (stats, _) = run_script(Settings::default(), vec![
        NetworkEvent::Connected { conn: 0, packed: false },
        NetworkEvent::Reply {
            conn: 0,
            reply: gump::Reply {
                serial: GumpSerial(999),
                type_id: GumpTypeId::of_kind(confirm::KIND),
                ..Default::default()
            },
        },
        NetworkEvent::Disconnected { conn: 0 },
    ]);
    assert_eq!(stats.replies, 1);
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.packets_sent, 1);
}

#[cfg(test)]
fn welcome_reply(serial: u32, name: &str, post: bool) -> gump::Reply {
    let gump = confirm::build(&Actions::default(), false).unwrap();
    let id = |name: &str| gump.entry(gump.find(name).unwrap()).unwrap().id().unwrap();
    let mut reply = gump::Reply {
        serial: GumpSerial(serial),
        type_id: gump.type_id(),
        button_id: id("ok").0,
        ..Default::default()
    };
    if post {
        reply.switches.insert(id("post"));
    }
    reply.texts.insert(id("name"), name.to_owned());
    reply
}

#[test]
fn test_post_sends_board_once() {
    let board = bulletin::build(&Board::new("", 1), true, &Actions::default(), false).unwrap();
    let id = |name: &str| board.entry(board.find(name).unwrap()).unwrap().id().unwrap();
    // welcomes are 1 and 2, the shared board 3
    let mut post = gump::Reply {
        serial: GumpSerial(3),
        type_id: board.type_id(),
        button_id: id("post").0,
        ..Default::default()
    };
    post.texts.insert(id("draft"), "Hear ye".into());

    let settings = Settings {
        macro_protection: false,
        ..Default::default()
    };
    let (stats, sent) = run_script(settings, vec![
        NetworkEvent::Connected { conn: 0, packed: false },
        NetworkEvent::Connected { conn: 1, packed: true },
        NetworkEvent::Reply { conn: 0, reply: welcome_reply(1, "Iolo", true) },
        NetworkEvent::Reply { conn: 1, reply: welcome_reply(2, "Shamino", true) },
        NetworkEvent::Reply { conn: 1, reply: post },
    ]);
    assert_eq!(stats.posts, 1);
    assert_eq!(stats.stale, 0);
    for conn in [0, 1] {
        let boards = sent.iter()
            .filter(|out| out.conn == conn)
            .filter(|out| gump::writer::read_header(&out.bytes)
                .map(|(_, type_id)| type_id == board.type_id())
                .unwrap_or(false))
            .map(|out| gump::writer::read_layout(&out.bytes).unwrap().1)
            .collect::<Vec<_>>();
        assert_eq!(boards.len(), 2, "connection {}", conn);
        assert!(!boards[0].iter().any(|s| s.contains("Hear ye")));
        assert!(boards[1].iter().any(|s| s.contains("<B>Shamino</B>: Hear ye")));
        assert!(!boards[1].iter().any(|s| s == "Hear ye"));
    }
}
