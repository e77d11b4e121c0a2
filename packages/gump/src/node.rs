//! Arena storage for a gump's component tree.
//!
//! Nodes are allocated in a slab pattern. Each slot also remembers a counter
//! value taken when it was allocated, so a `NodeKey` whose slot has since been
//! freed and reused simply fails to resolve instead of aliasing a different
//! node.

use crate::entry::Entry;
use slab::Slab;


/// Key to an entry or container within one gump.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeKey {
    idx: usize,
    ctr: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    // counter value this slot was allocated with
    ctr: u64,
    pub parent: Option<NodeKey>,
    pub name: Option<String>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Container(Container),
    Entry(Entry),
}

/// Positioned group of child nodes. Children are in render order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Container {
    pub x: i32,
    pub y: i32,
    pub children: Vec<NodeKey>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Nodes {
    slab: Slab<Node>,
    ctr: u64,
}

impl Node {
    pub fn entry(&self) -> Option<&Entry> {
        match &self.kind {
            NodeKind::Entry(entry) => Some(entry),
            NodeKind::Container(_) => None,
        }
    }

    pub fn container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(container) => Some(container),
            NodeKind::Entry(_) => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.kind {
            NodeKind::Container(container) => Some(container),
            NodeKind::Entry(_) => None,
        }
    }

    /// Local position, relative to the parent's origin.
    pub fn local_position(&self) -> (i32, i32) {
        match &self.kind {
            NodeKind::Container(container) => (container.x, container.y),
            NodeKind::Entry(entry) => entry.position().unwrap_or((0, 0)),
        }
    }
}

impl Nodes {
    pub fn insert(&mut self, kind: NodeKind) -> NodeKey {
        let ctr = self.ctr;
        self.ctr = self.ctr.wrapping_add(1);
        let idx = self.slab.insert(Node {
            ctr,
            parent: None,
            name: None,
            kind,
        });
        NodeKey { idx, ctr }
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<Node> {
        if self.contains(key) {
            Some(self.slab.remove(key.idx))
        } else {
            None
        }
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.slab.get(key.idx).filter(|node| node.ctr == key.ctr)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.slab.get_mut(key.idx).filter(|node| node.ctr == key.ctr)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }
}


#[test]
fn test_stale_key_does_not_resolve() {
    let mut nodes = Nodes::default();
    let a = nodes.insert(NodeKind::Entry(Entry::Page(1)));
    nodes.remove(a).unwrap();
    let b = nodes.insert(NodeKind::Entry(Entry::Page(2)));
    // same slot, different generation
    assert!(nodes.get(a).is_none());
    assert!(nodes.remove(a).is_none());
    assert_eq!(nodes.get(b).and_then(Node::entry), Some(&Entry::Page(2)));
    assert_eq!(nodes.len(), 1);
}
