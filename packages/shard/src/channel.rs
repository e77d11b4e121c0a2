//! Event queue feeding the shard loop, with stop requests jumping the line.

use crate::event::*;
use std::{
    time::Instant,
    sync::Arc,
};
use parking_lot::{Mutex, Condvar};
use crossbeam::queue::SegQueue;


/// Which queue an event waits in. Lower values are taken first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(usize)]
pub enum EventPriority {
    /// Stop requests and other operator commands.
    Control = 0,
    /// Connections coming and going, and gump replies.
    Network = 1,
}

// one queue per EventPriority
const LEVELS: usize = 2;


/// Create the channel for sending events to the shard loop.
///
/// Events of a higher priority are always received before events of a lower priority, and within
/// a priority level delivery is FIFO. This lets a stop request overtake a backlog of network
/// traffic.
pub fn channel() -> (ShardSender, ShardReceiver) {
    let state_0 = Arc::new(State::default());
    let state_1 = Arc::clone(&state_0);
    (ShardSender(state_0), ShardReceiver(state_1))
}

/// Handle for the transport and operator side to queue events with.
#[derive(Clone)]
pub struct ShardSender(Arc<State>);

/// Handle the shard loop takes events from.
#[derive(Clone)]
pub struct ShardReceiver(Arc<State>);

#[derive(Default)]
struct State {
    // indexed by EventPriority
    queues: [SegQueue<ShardEvent>; LEVELS],
    // events pushed but not yet taken, per queue
    sizes: Mutex<[usize; LEVELS]>,
    // signalled on every send
    sizes_cvar: Condvar,
}

impl ShardSender {
    /// Queue an event behind others of the same priority.
    pub fn send(&self, event: ShardEvent, priority: EventPriority) {
        // push before counting, so a counted event is always there to pop
        self.0.queues[priority as usize].push(event);
        self.0.sizes.lock()[priority as usize] += 1;
        self.0.sizes_cvar.notify_one();
    }

    /// Ask the shard loop to stop.
    pub fn send_stop(&self) {
        self.send(ShardEvent::Stop, EventPriority::Control);
    }

    pub fn send_network(&self, event: NetworkEvent) {
        self.send(ShardEvent::Network(event), EventPriority::Network);
    }

    /// Number of events sent but not yet received.
    pub fn pending(&self) -> usize {
        self.0.sizes.lock().iter().sum()
    }
}

impl ShardReceiver {
    /// Take the next event, draining control events before network ones.
    ///
    /// With `block_until`, waits up to that deadline for something to arrive, otherwise returns
    /// `None` right away when nothing is queued. With `priority_lteq`, events in queues after
    /// that one are left alone, so `Some(EventPriority::Control)` only ever yields control
    /// events.
    pub fn recv(
        &self,
        block_until: Option<Instant>,
        priority_lteq: Option<EventPriority>,
    ) -> Option<ShardEvent> {
        let bound = priority_lteq.map(|p| p as usize + 1).unwrap_or(LEVELS);
        let mut sizes = self.0.sizes.lock();
        let found = loop {
            if let Some(found) = (0..bound).find(|&i| sizes[i] > 0) {
                break found;
            }
            let deadline = block_until?;
            if self.0.sizes_cvar.wait_until(&mut sizes, deadline).timed_out() {
                return None;
            }
        };
        sizes[found] -= 1;
        drop(sizes);
        self.0.queues[found].pop()
    }
}


#[cfg(test)]
fn conn_of(event: Option<ShardEvent>) -> Option<usize> {
    match event {
        Some(ShardEvent::Network(NetworkEvent::Connected { conn, .. })) => Some(conn),
        Some(ShardEvent::Network(NetworkEvent::Disconnected { conn })) => Some(conn),
        _ => None,
    }
}

#[test]
fn test_control_overtakes_network() {
    let (send, recv) = channel();
    for conn in 0..3 {
        send.send_network(NetworkEvent::Connected { conn, packed: false });
    }
    send.send_stop();
    assert!(matches!(recv.recv(None, None), Some(ShardEvent::Stop)));
    for conn in 0..3 {
        assert_eq!(conn_of(recv.recv(None, None)), Some(conn));
    }
    assert!(recv.recv(None, None).is_none());
    assert_eq!(send.pending(), 0);
}

#[test]
fn test_priority_filter() {
    let (send, recv) = channel();
    send.send_network(NetworkEvent::Disconnected { conn: 7 });
    assert_eq!(send.pending(), 1);
    assert!(recv.recv(None, Some(EventPriority::Control)).is_none());
    assert_eq!(conn_of(recv.recv(None, Some(EventPriority::Network))), Some(7));
}

#[test]
fn test_recv_times_out() {
    let (_send, recv) = channel();
    let deadline = Instant::now() + std::time::Duration::from_millis(20);
    assert!(recv.recv(Some(deadline), None).is_none());
    assert!(Instant::now() >= deadline);
}

#[test]
fn test_recv_wakes_on_send() {
    let (send, recv) = channel();
    let thread = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(10));
        send.send_stop();
    });
    let deadline = Instant::now() + std::time::Duration::from_secs(10);
    assert!(matches!(recv.recv(Some(deadline), None), Some(ShardEvent::Stop)));
    thread.join().unwrap();
}
