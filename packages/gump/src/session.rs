//! Client sessions, as seen by the gump manager.

use crate::{
    entry::RenderMode,
    gump::{
        GumpSerial,
        GumpTypeId,
    },
    writer::Encoding,
};
use std::collections::HashMap;
use slab::Slab;


/// Key to a connected session within a `GumpManager`. Keys of disconnected
/// sessions never resolve again, even if the slot is reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionKey {
    idx: usize,
    ctr: u64,
}

/// What a session's client supports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Capabilities {
    /// Client understands the packed layout format.
    pub packed: bool,
}

impl Capabilities {
    pub fn encoding(&self) -> Encoding {
        if self.packed {
            Encoding::Packed
        } else {
            Encoding::Fast
        }
    }
}

/// A session's relation to a gump instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Owner,
    User,
    Viewer,
}

impl Role {
    pub fn render_mode(self) -> RenderMode {
        match self {
            Role::Owner | Role::User => RenderMode::Interactive,
            Role::Viewer => RenderMode::Inert,
        }
    }
}

/// Where compiled packets go. Implemented by the transport.
///
/// Sending is fire-and-forget; delivery failures are the transport's
/// problem.
pub trait PacketSink {
    fn send(&mut self, session: SessionKey, bytes: &[u8]);
}

/// Records sent packets in memory.
impl PacketSink for Vec<(SessionKey, Vec<u8>)> {
    fn send(&mut self, session: SessionKey, bytes: &[u8]) {
        self.push((session, bytes.to_vec()));
    }
}

#[derive(Debug)]
pub(crate) struct Session {
    ctr: u64,
    pub caps: Capabilities,
    // instance this session currently has open, per dialog type
    pub tracked: HashMap<GumpTypeId, GumpSerial>,
}

#[derive(Debug, Default)]
pub(crate) struct Sessions {
    slab: Slab<Session>,
    ctr: u64,
}

impl Sessions {
    pub fn insert(&mut self, caps: Capabilities) -> SessionKey {
        let ctr = self.ctr;
        self.ctr = self.ctr.wrapping_add(1);
        let idx = self.slab.insert(Session {
            ctr,
            caps,
            tracked: HashMap::new(),
        });
        SessionKey { idx, ctr }
    }

    pub fn remove(&mut self, key: SessionKey) -> Option<Session> {
        if self.contains(key) {
            Some(self.slab.remove(key.idx))
        } else {
            None
        }
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: SessionKey) -> Option<&Session> {
        self.slab.get(key.idx).filter(|session| session.ctr == key.ctr)
    }

    pub fn get_mut(&mut self, key: SessionKey) -> Option<&mut Session> {
        self.slab.get_mut(key.idx).filter(|session| session.ctr == key.ctr)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }
}
