//! Outbound packet queue the transport drains.

use gump::{
    PacketSink,
    SessionKey,
};
use std::{
    collections::HashMap,
    sync::Arc,
};
use crossbeam::queue::SegQueue;


/// Packet addressed to a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub conn: usize,
    pub bytes: Vec<u8>,
}

/// `PacketSink` which translates sessions back into connection indices and pushes onto a queue
/// shared with the transport.
#[derive(Debug)]
pub struct QueueSink {
    queue: Arc<SegQueue<Outbound>>,
    conns: HashMap<SessionKey, usize>,
    sent: u64,
}

impl QueueSink {
    pub fn new(queue: Arc<SegQueue<Outbound>>) -> Self {
        QueueSink {
            queue,
            conns: HashMap::new(),
            sent: 0,
        }
    }

    /// Route packets for `session` to `conn`.
    pub fn bind(&mut self, session: SessionKey, conn: usize) {
        self.conns.insert(session, conn);
    }

    pub fn unbind(&mut self, session: SessionKey) {
        self.conns.remove(&session);
    }

    /// Number of packets queued so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl PacketSink for QueueSink {
    fn send(&mut self, session: SessionKey, bytes: &[u8]) {
        let Some(&conn) = self.conns.get(&session) else {
            warn!(?session, "dropping packet for session with no connection");
            return;
        };
        self.queue.push(Outbound {
            conn,
            bytes: bytes.to_vec(),
        });
        self.sent += 1;
    }
}


#[test]
fn test_routes_by_connection() {
    use gump::{Capabilities, Gump, GumpManager, ManagerConfig};

    let queue = Arc::new(SegQueue::new());
    let mut manager = GumpManager::new(ManagerConfig::default(), QueueSink::new(Arc::clone(&queue)));
    let a = manager.connect(Capabilities::default());
    let b = manager.connect(Capabilities::default());
    manager.sink_mut().bind(a, 40);

    manager.open(a, Gump::new("test.sink")).unwrap();
    manager.open(b, Gump::new("test.sink")).unwrap();
    assert_eq!(manager.sink().sent(), 1);
    assert_eq!(queue.pop().map(|out| out.conn), Some(40));
    assert!(queue.pop().is_none());
}
