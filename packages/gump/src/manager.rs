//! See `GumpManager`.

use crate::{
    config::ManagerConfig,
    entry::RenderMode,
    error::*,
    gump::{
        Gump,
        GumpSerial,
        GumpTypeId,
    },
    reply::{
        Dispatch,
        Reply,
    },
    session::*,
    writer::{
        close_packet,
        Encoding,
        Packet,
    },
};
use std::collections::{
    hash_map,
    BTreeMap,
    BTreeSet,
    HashMap,
};


/// Tracks which gump instances each session has open, routes replies to
/// them, and sends compiled packets out through a `PacketSink`.
///
/// Each instance has an owner, and may be shared with any number of users,
/// who interact with it just like the owner, and viewers, who only see an
/// inert rendering of it. No session is ever both a user and a viewer of the
/// same instance.
///
/// A session has at most one instance of each dialog type open. Opening
/// another of the same type replaces the old one. Replies are matched only
/// against what the replying session currently has open, so a reply to an
/// instance that has since been replaced, closed, or finished is discarded.
///
/// Compiled packets are cached per instance for each combination of render
/// mode and encoding, and reused until the gump changes. Broadcasting to many
/// members compiles at most once per combination.
pub struct GumpManager<S> {
    config: ManagerConfig,
    sink: S,
    sessions: Sessions,
    instances: BTreeMap<GumpSerial, Instance>,
    next_serial: u32,
}

/// Result of handing a reply to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was applied to a tracked instance.
    Dispatched(Dispatch),
    /// The session doesn't have that instance open. Nothing happened.
    Stale,
    /// The session only views that instance. Nothing was applied, and the
    /// session no longer views it.
    FromViewer,
}

struct Instance {
    gump: Gump,
    owner: SessionKey,
    users: BTreeSet<SessionKey>,
    viewers: BTreeSet<SessionKey>,
    cache: HashMap<(RenderMode, Encoding), CachedPacket>,
    compilations: u64,
}

struct CachedPacket {
    revision: u64,
    packet: Packet,
}

impl Instance {
    fn new(gump: Gump, owner: SessionKey) -> Self {
        Instance {
            gump,
            owner,
            users: BTreeSet::new(),
            viewers: BTreeSet::new(),
            cache: HashMap::new(),
            compilations: 0,
        }
    }

    fn role(&self, session: SessionKey) -> Option<Role> {
        if session == self.owner {
            Some(Role::Owner)
        } else if self.users.contains(&session) {
            Some(Role::User)
        } else if self.viewers.contains(&session) {
            Some(Role::Viewer)
        } else {
            None
        }
    }

    fn is_shared(&self) -> bool {
        !self.users.is_empty() || !self.viewers.is_empty()
    }

    fn members(&self) -> Vec<(SessionKey, Role)> {
        let mut members = vec![(self.owner, Role::Owner)];
        members.extend(self.users.iter().map(|&session| (session, Role::User)));
        members.extend(self.viewers.iter().map(|&session| (session, Role::Viewer)));
        members
    }

    // get the compiled packet, compiling only if the gump changed since
    fn packet(&mut self, mode: RenderMode, encoding: Encoding) -> Result<&Packet> {
        let revision = self.gump.revision();
        match self.cache.entry((mode, encoding)) {
            hash_map::Entry::Occupied(mut occupied) => {
                if occupied.get().revision != revision {
                    let packet = self.gump.compile(mode, encoding)?;
                    self.compilations += 1;
                    occupied.insert(CachedPacket { revision, packet });
                }
                Ok(&occupied.into_mut().packet)
            }
            hash_map::Entry::Vacant(vacant) => {
                let packet = self.gump.compile(mode, encoding)?;
                self.compilations += 1;
                Ok(&vacant.insert(CachedPacket { revision, packet }).packet)
            }
        }
    }
}

// forget that a session has an instance open, if it still does
fn untrack(sessions: &mut Sessions, session: SessionKey, type_id: GumpTypeId, serial: GumpSerial) {
    if let Some(session) = sessions.get_mut(session) {
        if session.tracked.get(&type_id) == Some(&serial) {
            session.tracked.remove(&type_id);
        }
    }
}

impl<S: PacketSink> GumpManager<S> {
    pub fn new(config: ManagerConfig, sink: S) -> Self {
        GumpManager {
            config,
            sink,
            sessions: Sessions::default(),
            instances: BTreeMap::new(),
            next_serial: 1,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ==== sessions ====

    /// Register a newly connected session.
    pub fn connect(&mut self, caps: Capabilities) -> SessionKey {
        let session = self.sessions.insert(caps);
        debug!(?session, ?caps, "gump session connected");
        session
    }

    /// Forget a session. Instances it owns are closed for everyone else;
    /// instances it's a member of just lose it. Returns false if the session
    /// was unknown.
    pub fn disconnect(&mut self, session: SessionKey) -> bool {
        let Some(removed) = self.sessions.remove(session) else {
            return false;
        };
        for serial in removed.tracked.into_values() {
            let Some(instance) = self.instances.get_mut(&serial) else { continue };
            if instance.owner == session {
                self.remove_instance(serial, Some(session));
            } else {
                instance.users.remove(&session);
                instance.viewers.remove(&session);
            }
        }
        debug!(?session, "gump session disconnected");
        true
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Instance the session has open of the given type.
    pub fn tracked(&self, session: SessionKey, type_id: GumpTypeId) -> Option<GumpSerial> {
        self.sessions.get(session)?.tracked.get(&type_id).copied()
    }

    // ==== instances ====

    /// Give a gump a serial and send it to `owner`. Replaces any instance of
    /// the same type `owner` already has open.
    ///
    /// If the gump fails to compile, nothing changes and no packet is sent.
    pub fn open(&mut self, owner: SessionKey, mut gump: Gump) -> Result<GumpSerial> {
        let caps = self.sessions.get(owner)
            .ok_or_else(|| err!(Membership, "unknown session {:?}", owner))?
            .caps;
        let serial = GumpSerial(self.next_serial);
        self.next_serial = self.next_serial.checked_add(1)
            .ok_or_else(|| err!(Capacity, "gump serials exhausted"))?;
        gump.set_serial(serial);

        let mut instance = Instance::new(gump, owner);
        instance.packet(RenderMode::Interactive, caps.encoding())?;

        let type_id = instance.gump.type_id();
        self.vacate(owner, type_id);
        self.instances.insert(serial, instance);
        if let Some(session) = self.sessions.get_mut(owner) {
            session.tracked.insert(type_id, serial);
        }
        debug!(session = ?owner, serial = serial.0, type_id = type_id.0, "opened gump");
        self.send_to(serial, owner)?;
        Ok(serial)
    }

    /// Close an instance for every member. Returns false if there was no
    /// such instance.
    pub fn close(&mut self, serial: GumpSerial) -> bool {
        let closed = self.remove_instance(serial, None).is_some();
        if closed {
            debug!(serial = serial.0, "closed gump");
        }
        closed
    }

    pub fn gump(&self, serial: GumpSerial) -> Option<&Gump> {
        self.instances.get(&serial).map(|instance| &instance.gump)
    }

    /// Mutable access to a live gump. Changes are picked up by the next send.
    pub fn gump_mut(&mut self, serial: GumpSerial) -> Option<&mut Gump> {
        self.instances.get_mut(&serial).map(|instance| &mut instance.gump)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of times an instance has actually been compiled.
    pub fn compilations(&self, serial: GumpSerial) -> Option<u64> {
        self.instances.get(&serial).map(|instance| instance.compilations)
    }

    pub fn owner(&self, serial: GumpSerial) -> Option<SessionKey> {
        self.instances.get(&serial).map(|instance| instance.owner)
    }

    pub fn role(&self, serial: GumpSerial, session: SessionKey) -> Option<Role> {
        self.instances.get(&serial)?.role(session)
    }

    /// Whether an instance has any users or viewers.
    pub fn is_shared(&self, serial: GumpSerial) -> bool {
        self.instances.get(&serial).map(Instance::is_shared).unwrap_or(false)
    }

    // ==== membership ====

    /// Let a session interact with an instance, and send it to them.
    pub fn add_user(&mut self, serial: GumpSerial, session: SessionKey) -> Result<()> {
        self.add_member(serial, session, Role::User)
    }

    /// Let a session see an inert rendering of an instance, and send it to
    /// them.
    pub fn add_viewer(&mut self, serial: GumpSerial, session: SessionKey) -> Result<()> {
        self.add_member(serial, session, Role::Viewer)
    }

    /// Returns false if the session wasn't a user.
    pub fn remove_user(&mut self, serial: GumpSerial, session: SessionKey) -> bool {
        self.remove_member(serial, session, Role::User)
    }

    /// Returns false if the session wasn't a viewer.
    pub fn remove_viewer(&mut self, serial: GumpSerial, session: SessionKey) -> bool {
        self.remove_member(serial, session, Role::Viewer)
    }

    fn add_member(&mut self, serial: GumpSerial, session: SessionKey, role: Role) -> Result<()> {
        let encoding = self.sessions.get(session)
            .ok_or_else(|| err!(Membership, "unknown session {:?}", session))?
            .caps
            .encoding();
        let instance = self.instances.get_mut(&serial)
            .ok_or_else(|| err!(Membership, "no gump with serial {}", serial.0))?;
        match instance.role(session) {
            Some(current) if current == role => return Ok(()),
            Some(current) => bail!(
                Membership,
                "{:?} is already {:?} of gump {}, can't also be {:?}",
                session,
                current,
                serial.0,
                role,
            ),
            None => (),
        }
        ensure!(role != Role::Owner, ApiUsage, "instances can't gain owners");
        instance.packet(role.render_mode(), encoding)?;

        let type_id = instance.gump.type_id();
        self.vacate(session, type_id);
        let instance = self.instances.get_mut(&serial)
            .ok_or_else(|| err!(Membership, "gump {} closed while adding member", serial.0))?;
        match role {
            Role::User => instance.users.insert(session),
            _ => instance.viewers.insert(session),
        };
        if let Some(tracking) = self.sessions.get_mut(session) {
            tracking.tracked.insert(type_id, serial);
        }
        info!(?session, serial = serial.0, ?role, "added gump member");
        self.send_to(serial, session)
    }

    fn remove_member(&mut self, serial: GumpSerial, session: SessionKey, role: Role) -> bool {
        let Some(instance) = self.instances.get_mut(&serial) else {
            return false;
        };
        let removed = match role {
            Role::User => instance.users.remove(&session),
            Role::Viewer => instance.viewers.remove(&session),
            Role::Owner => false,
        };
        if !removed {
            return false;
        }
        let type_id = instance.gump.type_id();
        untrack(&mut self.sessions, session, type_id, serial);
        info!(?session, serial = serial.0, ?role, "removed gump member");
        self.sink.send(session, &close_packet(type_id));
        true
    }

    // ==== sending ====

    /// Send an instance to one of its members, rendered for their role.
    pub fn send_to(&mut self, serial: GumpSerial, session: SessionKey) -> Result<()> {
        let encoding = self.sessions.get(session)
            .ok_or_else(|| err!(Membership, "unknown session {:?}", session))?
            .caps
            .encoding();
        let instance = self.instances.get_mut(&serial)
            .ok_or_else(|| err!(Membership, "no gump with serial {}", serial.0))?;
        let role = instance.role(session)
            .ok_or_else(|| err!(Membership, "{:?} is not a member of gump {}", session, serial.0))?;
        let packet = instance.packet(role.render_mode(), encoding)?;
        self.sink.send(session, &packet.bytes);
        Ok(())
    }

    /// Send an instance to every member. Compiles at most once per render
    /// mode and encoding in use, and sends nothing if any compile fails.
    /// Returns the number of sessions sent to.
    pub fn broadcast(&mut self, serial: GumpSerial) -> Result<usize> {
        let instance = self.instances.get_mut(&serial)
            .ok_or_else(|| err!(Membership, "no gump with serial {}", serial.0))?;
        let mut targets = Vec::new();
        for (session, role) in instance.members() {
            let Some(tracking) = self.sessions.get(session) else { continue };
            targets.push((session, role.render_mode(), tracking.caps.encoding()));
        }
        for &(_, mode, encoding) in &targets {
            instance.packet(mode, encoding)?;
        }
        for &(session, mode, encoding) in &targets {
            let packet = instance.packet(mode, encoding)?;
            self.sink.send(session, &packet.bytes);
        }
        trace!(serial = serial.0, sessions = targets.len(), "broadcast gump");
        Ok(targets.len())
    }

    // ==== replies ====

    /// Route a reply from a session to the instance it names.
    ///
    /// The client closes its dialog whenever it replies, so a reply also ends
    /// the session's view of the instance. An unshared instance is finished
    /// and dropped. A shared one is sent again to everyone, unless the member
    /// closed it without pressing a button (or resending is turned off), in
    /// which case the member leaves. An owner leaving closes it for everyone.
    pub fn on_reply(&mut self, session: SessionKey, reply: &Reply) -> ReplyOutcome {
        self.on_reply_with(session, reply, |_| ())
    }

    /// Like `on_reply`, but `update` gets the instance right after its
    /// responders ran, before it's resent or dropped. Changes made there reach
    /// every member in the resend.
    pub fn on_reply_with(
        &mut self,
        session: SessionKey,
        reply: &Reply,
        update: impl FnOnce(&mut Gump),
    ) -> ReplyOutcome {
        let serial = reply.serial;
        if self.tracked(session, reply.type_id) != Some(serial) {
            debug!(?session, serial = serial.0, type_id = reply.type_id.0, "discarding stale gump reply");
            return ReplyOutcome::Stale;
        }
        let Some(instance) = self.instances.get_mut(&serial) else {
            return ReplyOutcome::Stale;
        };
        let Some(role) = instance.role(session) else {
            return ReplyOutcome::Stale;
        };
        let type_id = instance.gump.type_id();

        if role == Role::Viewer {
            debug!(?session, serial = serial.0, "discarding gump reply from viewer");
            instance.viewers.remove(&session);
            untrack(&mut self.sessions, session, type_id, serial);
            return ReplyOutcome::FromViewer;
        }

        let dispatch = instance.gump.dispatch(reply);
        update(&mut instance.gump);
        let leaving = dispatch.closed || !self.config.resend_shared_after_reply;
        if !instance.is_shared() || (leaving && role == Role::Owner) {
            self.remove_instance(serial, Some(session));
        } else if leaving {
            instance.users.remove(&session);
            untrack(&mut self.sessions, session, type_id, serial);
            info!(?session, serial = serial.0, "gump member left");
        } else if let Err(e) = self.broadcast(serial) {
            error!(%e, serial = serial.0, "failed to resend shared gump");
        }
        ReplyOutcome::Dispatched(dispatch)
    }

    // ==== internal ====

    // make room for a session to open an instance of the given type
    fn vacate(&mut self, session: SessionKey, type_id: GumpTypeId) {
        let Some(old) = self.sessions.get_mut(session).and_then(|s| s.tracked.remove(&type_id)) else {
            return;
        };
        debug!(?session, serial = old.0, "replacing open gump");
        if self.config.close_replaced {
            self.sink.send(session, &close_packet(type_id));
        }
        let Some(instance) = self.instances.get_mut(&old) else { return };
        if instance.owner == session {
            self.remove_instance(old, Some(session));
        } else {
            instance.users.remove(&session);
            instance.viewers.remove(&session);
        }
    }

    // drop an instance, untracking it for every member and sending a close
    // packet to every member except `skip`
    fn remove_instance(&mut self, serial: GumpSerial, skip: Option<SessionKey>) -> Option<Instance> {
        let instance = self.instances.remove(&serial)?;
        let type_id = instance.gump.type_id();
        for (member, _) in instance.members() {
            if !self.sessions.contains(member) {
                continue;
            }
            untrack(&mut self.sessions, member, type_id, serial);
            if Some(member) != skip {
                self.sink.send(member, &close_packet(type_id));
            }
        }
        Some(instance)
    }
}


#[cfg(test)]
mod test_util {
    use super::*;
    use crate::{
        ids::EntryId,
        reply::Interaction,
    };
    pub use std::sync::Arc;
    pub use parking_lot::Mutex;

    pub type Manager = GumpManager<Vec<(SessionKey, Vec<u8>)>>;
    pub type Fired = Arc<Mutex<Vec<Interaction>>>;

    pub fn manager() -> Manager {
        GumpManager::new(ManagerConfig::default(), Vec::new())
    }

    /// A poll with one checkbox (id 2), a vote button (id 1), and a note
    /// field (id 3). Every interaction is recorded.
    pub fn poll(fired: &Fired) -> Gump {
        let mut gump = Gump::new("test.poll");
        gump.add_background(0, 0, 300, 200, 9200);
        let agree = gump.add_checkbox(20, 20, 210, 211, false, EntryId(2)).unwrap();
        let vote = gump.add_button(20, 150, 4005, 4007, EntryId(1)).unwrap();
        let note = gump.add_text_entry(20, 60, 200, 20, 0, "", EntryId(3)).unwrap();
        for key in [agree, vote, note] {
            let fired = Arc::clone(fired);
            gump.on(key, move |_: &Gump, interaction: &Interaction| {
                fired.lock().push(interaction.clone());
                Ok(())
            }).unwrap();
        }
        gump
    }

    pub fn vote(manager: &Manager, serial: GumpSerial) -> Reply {
        Reply {
            serial,
            type_id: manager.gump(serial).unwrap().type_id(),
            button_id: 1,
            ..Default::default()
        }
    }

    /// Packets sent to one session.
    pub fn sent_to(manager: &Manager, session: SessionKey) -> Vec<Vec<u8>> {
        manager.sink()
            .iter()
            .filter(|&&(to, _)| to == session)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }
}

#[cfg(test)]
use self::test_util::*;
#[cfg(test)]
use crate::writer::{
    test_util::parse_fast,
    CLOSE_PACKET_ID,
    FAST_PACKET_ID,
    PACKED_PACKET_ID,
};

#[test]
fn test_serials_increase_and_open_sends() {
    let mut manager = manager();
    let fired = Fired::default();
    let a = manager.connect(Capabilities::default());
    let b = manager.connect(Capabilities { packed: true });
    let s1 = manager.open(a, poll(&fired)).unwrap();
    let s2 = manager.open(b, poll(&fired)).unwrap();
    assert!(s2 > s1);
    assert_eq!(manager.gump(s1).unwrap().serial(), s1);
    assert_eq!(sent_to(&manager, a)[0][0], FAST_PACKET_ID);
    assert_eq!(sent_to(&manager, b)[0][0], PACKED_PACKET_ID);
    assert_eq!(manager.tracked(a, GumpTypeId::of_kind("test.poll")), Some(s1));
}

#[test]
fn test_replaced_instance_reply_is_stale() {
    let mut manager = manager();
    let fired = Fired::default();
    let session = manager.connect(Capabilities::default());
    let old = manager.open(session, poll(&fired)).unwrap();
    let stale_reply = vote(&manager, old);
    let new = manager.open(session, poll(&fired)).unwrap();

    assert!(manager.gump(old).is_none());
    let sent = sent_to(&manager, session);
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1][0], CLOSE_PACKET_ID);

    assert_eq!(manager.on_reply(session, &stale_reply), ReplyOutcome::Stale);
    assert!(fired.lock().is_empty());

    let outcome = manager.on_reply(session, &vote(&manager, new));
    assert!(matches!(outcome, ReplyOutcome::Dispatched(ref d) if d.button.is_some()));
    // checkbox, text field, button
    assert_eq!(fired.lock().len(), 3);
    // unshared instances finish on reply
    assert!(manager.gump(new).is_none());
    assert_eq!(manager.on_reply(session, &stale_reply), ReplyOutcome::Stale);
}

#[test]
fn test_reply_from_other_session_is_stale() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let stranger = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    assert_eq!(manager.on_reply(stranger, &vote(&manager, serial)), ReplyOutcome::Stale);
    assert!(fired.lock().is_empty());
    assert!(manager.gump(serial).is_some());
}

#[test]
fn test_broadcast_compiles_once_per_mode_and_encoding() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    let users = [
        manager.connect(Capabilities::default()),
        manager.connect(Capabilities::default()),
        manager.connect(Capabilities { packed: true }),
    ];
    let viewers = [
        manager.connect(Capabilities::default()),
        manager.connect(Capabilities::default()),
    ];
    for &user in &users {
        manager.add_user(serial, user).unwrap();
    }
    for &viewer in &viewers {
        manager.add_viewer(serial, viewer).unwrap();
    }
    assert!(manager.is_shared(serial));
    assert_eq!(manager.compilations(serial), Some(3));

    manager.sink_mut().clear();
    assert_eq!(manager.broadcast(serial).unwrap(), 6);
    assert_eq!(manager.compilations(serial), Some(3));
    assert_eq!(manager.sink().len(), 6);

    let (viewer_layout, _) = parse_fast(&sent_to(&manager, viewers[0])[0]);
    let (user_layout, _) = parse_fast(&sent_to(&manager, users[0])[0]);
    assert!(!viewer_layout.contains("checkbox"));
    assert!(!viewer_layout.contains("textentry"));
    assert!(user_layout.contains("{ checkbox 20 20 210 211 0 2 }"));

    manager.gump_mut(serial).unwrap().set_location(40, 40);
    manager.broadcast(serial).unwrap();
    assert_eq!(manager.compilations(serial), Some(6));
}

#[test]
fn test_membership_is_exclusive() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let other = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();

    manager.add_user(serial, other).unwrap();
    manager.add_user(serial, other).unwrap();
    assert_eq!(manager.add_viewer(serial, other).unwrap_err().kind(), ErrorKind::Membership);
    assert_eq!(manager.add_user(serial, owner).unwrap_err().kind(), ErrorKind::Membership);
    assert_eq!(manager.role(serial, other), Some(Role::User));

    assert!(manager.remove_user(serial, other));
    assert!(!manager.remove_user(serial, other));
    assert_eq!(sent_to(&manager, other).last().unwrap()[0], CLOSE_PACKET_ID);
    manager.add_viewer(serial, other).unwrap();
    assert_eq!(manager.role(serial, other), Some(Role::Viewer));
    assert!(!manager.remove_user(serial, other));
    assert!(manager.remove_viewer(serial, other));
    assert!(!manager.is_shared(serial));
}

#[test]
fn test_viewer_reply_is_discarded() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let viewer = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_viewer(serial, viewer).unwrap();

    let mut reply = vote(&manager, serial);
    reply.switches.insert(crate::ids::EntryId(2));
    assert_eq!(manager.on_reply(viewer, &reply), ReplyOutcome::FromViewer);
    assert!(fired.lock().is_empty());
    assert_eq!(manager.role(serial, viewer), None);
    assert_eq!(manager.on_reply(viewer, &reply), ReplyOutcome::Stale);
}

#[test]
fn test_shared_reply_resends_to_members() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let user = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_user(serial, user).unwrap();
    manager.sink_mut().clear();

    let mut reply = vote(&manager, serial);
    reply.switches.insert(crate::ids::EntryId(2));
    assert!(matches!(manager.on_reply(user, &reply), ReplyOutcome::Dispatched(_)));
    assert!(manager.gump(serial).is_some());
    let (layout, _) = parse_fast(&sent_to(&manager, owner)[0]);
    assert!(layout.contains("{ checkbox 20 20 210 211 1 2 }"));
    assert_eq!(sent_to(&manager, user).len(), 1);
}

#[test]
fn test_update_before_resend() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let user = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_user(serial, user).unwrap();
    manager.sink_mut().clear();

    let reply = vote(&manager, serial);
    let outcome = manager.on_reply_with(user, &reply, |gump| {
        gump.add_label(0, 0, 0, "tally: 1");
    });
    assert!(matches!(outcome, ReplyOutcome::Dispatched(_)));
    for session in [owner, user] {
        let sent = sent_to(&manager, session);
        assert_eq!(sent.len(), 1);
        let (_, strings) = parse_fast(&sent[0]);
        assert!(strings.iter().any(|s| s == "tally: 1"));
    }
}

#[test]
fn test_shared_reply_without_resend_drops_member() {
    let mut manager: Manager = GumpManager::new(
        ManagerConfig {
            resend_shared_after_reply: false,
            ..Default::default()
        },
        Vec::new(),
    );
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let user = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_user(serial, user).unwrap();

    let reply = vote(&manager, serial);
    assert!(matches!(manager.on_reply(user, &reply), ReplyOutcome::Dispatched(_)));
    assert_eq!(manager.role(serial, user), None);
    assert_eq!(manager.role(serial, owner), Some(Role::Owner));
}

#[test]
fn test_shared_close_by_user_leaves() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let user = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_user(serial, user).unwrap();
    manager.sink_mut().clear();

    let mut reply = vote(&manager, serial);
    reply.button_id = crate::reply::CLOSED_BUTTON_ID;
    assert!(matches!(manager.on_reply(user, &reply), ReplyOutcome::Dispatched(ref d) if d.closed));
    assert_eq!(manager.role(serial, user), None);
    assert!(manager.sink().is_empty());

    manager.add_user(serial, user).unwrap();
    assert!(matches!(manager.on_reply(owner, &reply), ReplyOutcome::Dispatched(_)));
    assert!(manager.gump(serial).is_none());
    assert_eq!(sent_to(&manager, user).last().unwrap()[0], CLOSE_PACKET_ID);
}

#[test]
fn test_disconnect_owner_closes_for_members() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let user = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_user(serial, user).unwrap();

    assert!(manager.disconnect(owner));
    assert!(!manager.disconnect(owner));
    assert!(manager.gump(serial).is_none());
    assert_eq!(sent_to(&manager, user).last().unwrap()[0], CLOSE_PACKET_ID);
    assert_eq!(manager.tracked(user, GumpTypeId::of_kind("test.poll")), None);
    assert_eq!(manager.session_count(), 1);
    assert_eq!(manager.instance_count(), 0);
}

#[test]
fn test_disconnect_member_keeps_instance() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let viewer = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_viewer(serial, viewer).unwrap();
    manager.disconnect(viewer);
    assert!(!manager.is_shared(serial));
    assert!(manager.gump(serial).is_some());
}

#[test]
fn test_failed_open_changes_nothing() {
    let mut manager = manager();
    let fired = Fired::default();
    let session = manager.connect(Capabilities::default());
    let serial = manager.open(session, poll(&fired)).unwrap();

    let mut bad = poll(&fired);
    let key = bad.add_button(0, 0, 1, 2, None).unwrap();
    bad.entry_mut(key).unwrap().set_id(crate::ids::EntryId(-1));
    let e = manager.open(session, bad).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::MalformedEntry);
    assert_eq!(manager.tracked(session, GumpTypeId::of_kind("test.poll")), Some(serial));
    assert_eq!(sent_to(&manager, session).len(), 1);
}

#[test]
fn test_close_sends_close_to_everyone() {
    let mut manager = manager();
    let fired = Fired::default();
    let owner = manager.connect(Capabilities::default());
    let viewer = manager.connect(Capabilities::default());
    let serial = manager.open(owner, poll(&fired)).unwrap();
    manager.add_viewer(serial, viewer).unwrap();
    assert!(manager.close(serial));
    assert!(!manager.close(serial));
    for session in [owner, viewer] {
        assert_eq!(sent_to(&manager, session).last().unwrap()[0], CLOSE_PACKET_ID);
    }
}
