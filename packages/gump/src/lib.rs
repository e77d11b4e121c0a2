//! Server-side dialogs ("gumps") for an Ultima Online style shard.
//!
//! Content code builds a `Gump` out of entries arranged in nested containers
//! and binds responders to the interactive ones. A `GumpManager` gives it a
//! serial, compiles it for each session that should see it, and hands the
//! packets to the transport. When a client replies, the manager checks the
//! reply against what that session actually has open and dispatches it to
//! the gump, which updates its entries and fires responders.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod ids;
pub mod strings;
pub mod token;
pub mod entry;
pub mod node;
pub mod gump;
pub mod reply;
pub mod writer;
pub mod session;
pub mod config;
pub mod manager;

pub use crate::{
    config::ManagerConfig,
    entry::{
        Entry,
        RenderMode,
    },
    error::{
        Error,
        ErrorKind,
        Result,
    },
    gump::{
        Gump,
        GumpFlags,
        GumpSerial,
        GumpTypeId,
    },
    ids::EntryId,
    manager::{
        GumpManager,
        ReplyOutcome,
    },
    node::NodeKey,
    reply::{
        Interaction,
        Reply,
        Responder,
    },
    session::{
        Capabilities,
        PacketSink,
        Role,
        SessionKey,
    },
    writer::{
        Encoding,
        Packet,
    },
};
