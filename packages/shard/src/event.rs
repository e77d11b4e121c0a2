//! Events processed by the shard loop.

use gump::Reply;


/// Event sent to the shard loop.
#[derive(Debug)]
pub enum ShardEvent {
    /// Stop the loop.
    Stop,
    /// Something happened on the network.
    Network(NetworkEvent),
}

/// Event from the transport. Connections are identified by whatever index the transport gave
/// them.
#[derive(Debug)]
pub enum NetworkEvent {
    /// A client connected. `packed` is whether it understands packed dialog layouts.
    Connected {
        conn: usize,
        packed: bool,
    },
    /// A client replied to a dialog.
    Reply {
        conn: usize,
        reply: Reply,
    },
    /// A client went away.
    Disconnected {
        conn: usize,
    },
}
