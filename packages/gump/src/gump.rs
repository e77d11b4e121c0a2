//! The gump: root container of a dialog's component tree.
//!
//! A gump owns an arena of nodes. Each node is either an entry or a container
//! of further nodes, and each container has an offset relative to its own
//! parent. Only local positions are stored, so an entry's absolute position is
//! always its local position plus the offsets of every ancestor, and moving a
//! container moves everything inside it at once.
//!
//! Every change that affects what a compile would produce bumps the gump's
//! revision, which is what cached compiles are checked against.

use crate::{
    entry::*,
    error::*,
    ids::{
        EntryId,
        IdAllocator,
        IdPolicy,
    },
    node::{
        Container,
        Node,
        NodeKey,
        NodeKind,
        Nodes,
    },
    reply::Responder,
    strings::StringTable,
    writer::{
        self,
        Encoding,
        Packet,
    },
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    fmt::{self, Formatter, Debug},
};


/// Numeric identifier of a kind of dialog. The client uses it to recognize a
/// dialog of the same kind being reopened.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct GumpTypeId(pub u32);

impl GumpTypeId {
    /// Stable hash of a dialog kind name. The same name gives the same type id
    /// across runs and builds.
    pub fn of_kind(kind: &str) -> Self {
        let digest = hmac_sha256::Hash::hash(kind.as_bytes());
        GumpTypeId(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }
}

/// Server-assigned serial of one live gump instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct GumpSerial(pub u32);

/// Dialog-wide behavior flags. All default to allowed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GumpFlags {
    pub closable: bool,
    pub resizable: bool,
    pub draggable: bool,
    pub disposable: bool,
}

impl Default for GumpFlags {
    fn default() -> Self {
        GumpFlags {
            closable: true,
            resizable: true,
            draggable: true,
            disposable: true,
        }
    }
}

/// An attached entry together with the absolute origin of its container.
#[derive(Debug, Copy, Clone)]
pub struct Placed<'a> {
    pub key: NodeKey,
    pub origin: (i32, i32),
    pub entry: &'a Entry,
}

/// A dialog. See module docs.
pub struct Gump {
    type_id: GumpTypeId,
    serial: GumpSerial,
    location: (i32, i32),
    flags: GumpFlags,
    nodes: Nodes,
    root: NodeKey,
    names: HashMap<String, NodeKey>,
    strings: StringTable,
    ids: IdAllocator,
    // ids handed out by new_id which no entry has claimed yet
    pending_ids: HashSet<EntryId>,
    revision: u64,
    pub(crate) responders: HashMap<NodeKey, Box<dyn Responder>>,
}

impl Gump {
    /// Construct empty, with the type id derived from a kind name.
    pub fn new(kind: &str) -> Self {
        Self::with_type_id(GumpTypeId::of_kind(kind))
    }

    /// Construct empty with an explicit type id.
    pub fn with_type_id(type_id: GumpTypeId) -> Self {
        let mut nodes = Nodes::default();
        let root = nodes.insert(NodeKind::Container(Container::default()));
        Gump {
            type_id,
            serial: GumpSerial::default(),
            location: (0, 0),
            flags: GumpFlags::default(),
            nodes,
            root,
            names: HashMap::new(),
            strings: StringTable::new(),
            ids: IdAllocator::new(IdPolicy::Sequential, rand::random()),
            pending_ids: HashSet::new(),
            revision: 0,
            responders: HashMap::new(),
        }
    }

    /// Reseed the id allocator. Must be done before any ids are allocated.
    pub fn with_seed(mut self, seed: u128) -> Self {
        debug_assert_eq!(self.ids.live_count(), 0, "reseeding a gump with live ids");
        self.ids = IdAllocator::new(self.ids.policy(), seed);
        self
    }

    pub fn type_id(&self) -> GumpTypeId {
        self.type_id
    }

    pub fn serial(&self) -> GumpSerial {
        self.serial
    }

    pub(crate) fn set_serial(&mut self, serial: GumpSerial) {
        if self.serial != serial {
            self.serial = serial;
            self.touch();
        }
    }

    /// Counter bumped by every change that affects compiled output.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    /// Key of the root container.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Screen position of the dialog.
    pub fn location(&self) -> (i32, i32) {
        self.location
    }

    pub fn set_location(&mut self, x: i32, y: i32) {
        self.location = (x, y);
        self.touch();
    }

    pub fn flags(&self) -> GumpFlags {
        self.flags
    }

    pub fn set_closable(&mut self, closable: bool) {
        self.flags.closable = closable;
        self.touch();
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.flags.resizable = resizable;
        self.touch();
    }

    pub fn set_draggable(&mut self, draggable: bool) {
        self.flags.draggable = draggable;
        self.touch();
    }

    pub fn set_disposable(&mut self, disposable: bool) {
        self.flags.disposable = disposable;
        self.touch();
    }

    pub fn is_macro_protected(&self) -> bool {
        self.ids.policy() == IdPolicy::MacroProtected
    }

    /// Switch id allocation policy. Ids already handed out are kept.
    pub fn set_macro_protected(&mut self, protected: bool) {
        self.ids.set_policy(match protected {
            true => IdPolicy::MacroProtected,
            false => IdPolicy::Sequential,
        });
    }

    /// Allocate an unused entry id for content code to put on an entry
    /// itself. The id stays reserved.
    pub fn new_id(&mut self) -> Result<EntryId> {
        let id = self.ids.allocate()?;
        self.pending_ids.insert(id);
        Ok(id)
    }

    /// Number of entry ids ever allocated or reserved by this gump.
    pub fn ids_allocated(&self) -> u64 {
        self.ids.allocated()
    }

    /// Intern a string into the gump's own string table. Strings interned
    /// this way keep their index in every compile.
    pub fn intern(&mut self, text: &str) -> usize {
        let before = self.strings.len();
        let idx = self.strings.intern(text);
        if self.strings.len() != before {
            self.touch();
        }
        idx
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    // ==== tree ====

    /// Add an entry to the root container.
    pub fn add(&mut self, entry: Entry) -> Result<NodeKey> {
        self.add_to(self.root, entry)
    }

    /// Add an entry to the end of a container. Interactive entries without an
    /// id are given one; explicit ids must not already be in use.
    pub fn add_to(&mut self, container: NodeKey, mut entry: Entry) -> Result<NodeKey> {
        self.check_container(container)?;
        if entry.is_interactive() {
            match entry.id() {
                Some(id) => {
                    if !self.pending_ids.remove(&id) {
                        self.ids.reserve(id)?;
                    }
                }
                None => entry.set_id(self.ids.allocate()?),
            }
        }
        let key = self.nodes.insert(NodeKind::Entry(entry));
        self.link(container, key);
        Ok(key)
    }

    /// Add an empty nested container at an offset within `parent`.
    pub fn add_container(&mut self, parent: NodeKey, x: i32, y: i32) -> Result<NodeKey> {
        self.check_container(parent)?;
        let key = self.nodes.insert(NodeKind::Container(Container {
            x,
            y,
            children: Vec::new(),
        }));
        self.link(parent, key);
        Ok(key)
    }

    /// Attach a node to the end of a container. If it's already in that
    /// container this does nothing. If it's in a different container it's
    /// moved.
    pub fn attach(&mut self, container: NodeKey, key: NodeKey) -> Result<()> {
        self.check_container(container)?;
        let node = self.nodes.get(key).ok_or_else(|| err!(ApiUsage, "no node {:?}", key))?;
        ensure!(key != self.root, ApiUsage, "the root container can't be attached");
        if node.parent == Some(container) {
            return Ok(());
        }
        ensure!(
            !self.is_ancestor_or_self(key, container),
            ApiUsage,
            "attaching {:?} to {:?} would make a cycle",
            key,
            container,
        );
        self.detach(key);
        self.link(container, key);
        Ok(())
    }

    /// Detach a node from its container. The node and its id stay allocated,
    /// so it can be attached again. Returns false if there was nothing to
    /// detach.
    pub fn detach(&mut self, key: NodeKey) -> bool {
        if key == self.root {
            return false;
        }
        let Some(parent) = self.nodes.get(key).and_then(|node| node.parent) else {
            return false;
        };
        if let Some(container) = self.nodes.get_mut(parent).and_then(Node::container_mut) {
            container.children.retain(|&child| child != key);
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = None;
        }
        self.touch();
        true
    }

    /// Remove a node and everything under it for good, releasing entry ids,
    /// names, and responders. Returns false if there was no such node.
    pub fn delete(&mut self, key: NodeKey) -> bool {
        if key == self.root || !self.nodes.contains(key) {
            return false;
        }
        self.detach(key);
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.remove(key) else { continue };
            if let Some(id) = node.entry().and_then(Entry::id) {
                self.ids.release(id);
            }
            if let Some(name) = &node.name {
                if self.names.get(name) == Some(&key) {
                    self.names.remove(name);
                }
            }
            self.responders.remove(&key);
            if let NodeKind::Container(container) = node.kind {
                stack.extend(container.children);
            }
        }
        self.touch();
        true
    }

    /// Whether the node is reachable from the root.
    pub fn is_attached(&self, key: NodeKey) -> bool {
        self.absolute_position(key).is_some()
    }

    /// Position of a node relative to its container.
    pub fn local_position(&self, key: NodeKey) -> Option<(i32, i32)> {
        self.nodes.get(key).map(Node::local_position)
    }

    /// Position of a node relative to the gump's origin. `None` if the node
    /// doesn't exist or isn't attached.
    pub fn absolute_position(&self, key: NodeKey) -> Option<(i32, i32)> {
        let (mut x, mut y) = self.nodes.get(key)?.local_position();
        let mut curr = key;
        while curr != self.root {
            let parent = self.nodes.get(curr)?.parent?;
            let (px, py) = self.nodes.get(parent)?.local_position();
            x = x.saturating_add(px);
            y = y.saturating_add(py);
            curr = parent;
        }
        Some((x, y))
    }

    /// Set a node's local position. For a container this is its offset, and
    /// moves everything in it.
    pub fn set_position(&mut self, key: NodeKey, x: i32, y: i32) -> Result<()> {
        let node = self.nodes.get_mut(key).ok_or_else(|| err!(ApiUsage, "no node {:?}", key))?;
        match &mut node.kind {
            NodeKind::Container(container) => {
                container.x = x;
                container.y = y;
            }
            NodeKind::Entry(entry) => entry.set_position(x, y),
        }
        self.touch();
        Ok(())
    }

    /// Give a node a name to look it up by.
    pub fn set_name(&mut self, key: NodeKey, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let node = self.nodes.get_mut(key).ok_or_else(|| err!(ApiUsage, "no node {:?}", key))?;
        if let Some(old) = node.name.replace(name.clone()) {
            self.names.remove(&old);
        }
        if let Some(other) = self.names.insert(name, key) {
            if other != key {
                if let Some(other) = self.nodes.get_mut(other) {
                    other.name = None;
                }
            }
        }
        Ok(())
    }

    pub fn name(&self, key: NodeKey) -> Option<&str> {
        self.nodes.get(key)?.name.as_deref()
    }

    /// Look a node up by name.
    pub fn find(&self, name: &str) -> Option<NodeKey> {
        self.names.get(name).copied().filter(|&key| self.nodes.contains(key))
    }

    /// Look up the attached interactive entry with the given id.
    pub fn find_id(&self, id: EntryId) -> Option<NodeKey> {
        self.walk()
            .into_iter()
            .find(|placed| placed.entry.id() == Some(id))
            .map(|placed| placed.key)
    }

    // ==== entries ====

    pub fn entry(&self, key: NodeKey) -> Option<&Entry> {
        self.nodes.get(key)?.entry()
    }

    /// Mutable access to an entry. Marks the gump as changed.
    ///
    /// Ids of interactive entries should be changed through `set_id` rather
    /// than through this, so the allocator knows about them.
    pub fn entry_mut(&mut self, key: NodeKey) -> Option<&mut Entry> {
        if self.entry(key).is_some() {
            self.touch();
        }
        self.entry_mut_untracked(key)
    }

    pub(crate) fn entry_mut_untracked(&mut self, key: NodeKey) -> Option<&mut Entry> {
        match &mut self.nodes.get_mut(key)?.kind {
            NodeKind::Entry(entry) => Some(entry),
            NodeKind::Container(_) => None,
        }
    }

    /// Change an interactive entry's id.
    pub fn set_id(&mut self, key: NodeKey, id: EntryId) -> Result<()> {
        let entry = self.entry(key).ok_or_else(|| err!(ApiUsage, "no entry {:?}", key))?;
        ensure!(entry.is_interactive(), ApiUsage, "entry {:?} has no id", key);
        let old = entry.id();
        if old == Some(id) {
            return Ok(());
        }
        if !self.pending_ids.remove(&id) {
            self.ids.reserve(id)?;
        }
        if let Some(old) = old {
            self.ids.release(old);
        }
        if let Some(entry) = self.entry_mut(key) {
            entry.set_id(id);
        }
        Ok(())
    }

    /// Current state of a checkbox or radio.
    pub fn switch_state(&self, key: NodeKey) -> Option<bool> {
        match self.entry(key)? {
            Entry::Checkbox(switch) | Entry::Radio(switch) => Some(switch.checked),
            _ => None,
        }
    }

    pub fn set_switch(&mut self, key: NodeKey, on: bool) -> Result<()> {
        match self.entry_mut_untracked(key) {
            Some(Entry::Checkbox(switch)) | Some(Entry::Radio(switch)) => {
                if switch.checked != on {
                    switch.checked = on;
                    self.touch();
                }
                Ok(())
            }
            _ => Err(err!(ApiUsage, "{:?} is not a switch", key)),
        }
    }

    /// Text of a label, html block, or text field.
    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.entry(key)? {
            Entry::Label(Label { text, .. })
            | Entry::CroppedLabel(CroppedLabel { text, .. })
            | Entry::Html(Html { text, .. })
            | Entry::TextEntry(TextEntry { text, .. }) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, key: NodeKey, new: impl Into<String>) -> Result<()> {
        let new = new.into();
        match self.entry_mut_untracked(key) {
            Some(Entry::Label(Label { text, .. }))
            | Some(Entry::CroppedLabel(CroppedLabel { text, .. }))
            | Some(Entry::Html(Html { text, .. }))
            | Some(Entry::TextEntry(TextEntry { text, .. })) => {
                if *text != new {
                    *text = new;
                    self.touch();
                }
                Ok(())
            }
            _ => Err(err!(ApiUsage, "{:?} has no text", key)),
        }
    }

    /// Attached entries in render order, each with its container's absolute
    /// origin.
    pub fn walk(&self) -> Vec<Placed<'_>> {
        let mut placed = Vec::new();
        self.walk_container(self.root, (0, 0), &mut placed);
        placed
    }

    fn walk_container<'a>(
        &'a self,
        key: NodeKey,
        (px, py): (i32, i32),
        placed: &mut Vec<Placed<'a>>,
    ) {
        let Some(container) = self.nodes.get(key).and_then(Node::container) else { return };
        let origin = (px.saturating_add(container.x), py.saturating_add(container.y));
        for &child in &container.children {
            match self.nodes.get(child).map(|node| &node.kind) {
                Some(NodeKind::Entry(entry)) => placed.push(Placed { key: child, origin, entry }),
                Some(NodeKind::Container(_)) => self.walk_container(child, origin, placed),
                None => (),
            }
        }
    }

    /// Attached entries in render order.
    pub fn entries(&self) -> impl Iterator<Item=(NodeKey, &Entry)> + '_ {
        self.walk().into_iter().map(|placed| (placed.key, placed.entry))
    }

    /// Number of attached checkboxes and radios.
    pub fn switch_count(&self) -> usize {
        self.walk().iter().filter(|placed| placed.entry.is_switch()).count()
    }

    /// Number of attached text fields.
    pub fn text_entry_count(&self) -> usize {
        self.walk().iter().filter(|placed| placed.entry.is_text_entry()).count()
    }

    /// Page an attached entry renders on. Page markers belong to the page
    /// they open.
    pub fn page_of(&self, key: NodeKey) -> Option<u32> {
        let mut page = 0;
        for placed in self.walk() {
            if let &Entry::Page(n) = placed.entry {
                page = n;
            }
            if placed.key == key {
                return Some(page);
            }
        }
        None
    }

    // ==== compiling ====

    /// Compile the whole gump into a packet.
    pub fn compile(&self, mode: RenderMode, encoding: Encoding) -> Result<Packet> {
        writer::compile(self, mode, encoding)
    }

    /// Human-readable layout token of one entry, as it would appear in a
    /// compile. String references index into a copy of the gump's own table.
    pub fn compile_entry(&self, key: NodeKey, mode: RenderMode) -> Result<String> {
        let entry = self.entry(key).ok_or_else(|| err!(ApiUsage, "{:?} is not an entry", key))?;
        let origin = self.nodes.get(key)
            .and_then(|node| node.parent)
            .and_then(|parent| self.absolute_position(parent))
            .ok_or_else(|| err!(ApiUsage, "entry {:?} is not attached", key))?;
        let mut strings = self.strings.clone();
        Ok(entry.token(origin, &mut strings, mode)?
            .map(|token| token.to_string())
            .unwrap_or_default())
    }

    // ==== responders ====

    /// Bind a closure to a node, replacing any previous responder. Bind to
    /// the root to hear about the dialog being closed.
    pub fn on<F>(&mut self, key: NodeKey, responder: F) -> Result<()>
    where
        F: FnMut(&Gump, &crate::reply::Interaction) -> anyhow::Result<()> + Send + 'static,
    {
        self.respond_with(key, responder)
    }

    /// Bind a responder to a node, replacing any previous responder.
    pub fn respond_with<R: Responder + 'static>(&mut self, key: NodeKey, responder: R) -> Result<()> {
        ensure!(self.nodes.contains(key), ApiUsage, "no node {:?}", key);
        self.responders.insert(key, Box::new(responder));
        Ok(())
    }

    /// Remove a node's responder. Returns whether there was one.
    pub fn unbind(&mut self, key: NodeKey) -> bool {
        self.responders.remove(&key).is_some()
    }

    // ==== builders ====

    // add to root, which can't fail for non-interactive entries
    fn push(&mut self, entry: Entry) -> NodeKey {
        debug_assert!(!entry.is_interactive());
        let key = self.nodes.insert(NodeKind::Entry(entry));
        self.link(self.root, key);
        key
    }

    pub fn add_background(&mut self, x: i32, y: i32, width: i32, height: i32, gump_id: u32) -> NodeKey {
        self.push(Entry::Background(Background { x, y, width, height, gump_id }))
    }

    pub fn add_label(&mut self, x: i32, y: i32, hue: u32, text: impl Into<String>) -> NodeKey {
        self.push(Entry::Label(Label { x, y, hue, text: text.into() }))
    }

    pub fn add_cropped_label(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        hue: u32,
        text: impl Into<String>,
    ) -> NodeKey {
        self.push(Entry::CroppedLabel(CroppedLabel { x, y, width, height, hue, text: text.into() }))
    }

    pub fn add_html(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        text: impl Into<String>,
        background: bool,
        scrollbar: bool,
    ) -> NodeKey {
        self.push(Entry::Html(Html {
            x, y, width, height,
            text: text.into(),
            background,
            scrollbar,
        }))
    }

    pub fn add_localized_html(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        number: u32,
        background: bool,
        scrollbar: bool,
    ) -> NodeKey {
        self.push(Entry::LocalizedHtml(LocalizedHtml {
            x, y, width, height,
            number,
            color: None,
            background,
            scrollbar,
        }))
    }

    pub fn add_localized_html_color(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        number: u32,
        color: u32,
        background: bool,
        scrollbar: bool,
    ) -> NodeKey {
        self.push(Entry::LocalizedHtml(LocalizedHtml {
            x, y, width, height,
            number,
            color: Some(color),
            background,
            scrollbar,
        }))
    }

    pub fn add_image(&mut self, x: i32, y: i32, gump_id: u32) -> NodeKey {
        self.add_image_hued(x, y, gump_id, 0)
    }

    pub fn add_image_hued(&mut self, x: i32, y: i32, gump_id: u32, hue: u32) -> NodeKey {
        self.push(Entry::Image(Image { x, y, gump_id, hue }))
    }

    pub fn add_image_tiled(&mut self, x: i32, y: i32, width: i32, height: i32, gump_id: u32) -> NodeKey {
        self.push(Entry::ImageTiled(ImageTiled { x, y, width, height, gump_id }))
    }

    pub fn add_item(&mut self, x: i32, y: i32, item_id: u32) -> NodeKey {
        self.add_item_hued(x, y, item_id, 0)
    }

    pub fn add_item_hued(&mut self, x: i32, y: i32, item_id: u32, hue: u32) -> NodeKey {
        self.push(Entry::ItemIcon(ItemIcon { x, y, item_id, hue }))
    }

    pub fn add_alpha_region(&mut self, x: i32, y: i32, width: i32, height: i32) -> NodeKey {
        self.push(Entry::AlphaRegion(AlphaRegion { x, y, width, height }))
    }

    /// Add a reply button. With no explicit id, one is allocated.
    pub fn add_button(
        &mut self,
        x: i32,
        y: i32,
        normal: u32,
        pressed: u32,
        id: impl Into<Option<EntryId>>,
    ) -> Result<NodeKey> {
        self.add(Entry::Button(Button {
            x, y, normal, pressed,
            action: ButtonAction::Reply,
            id: id.into(),
        }))
    }

    /// Add a button that switches the client to another page.
    pub fn add_page_button(&mut self, x: i32, y: i32, normal: u32, pressed: u32, page: u32) -> NodeKey {
        self.push(Entry::Button(Button {
            x, y, normal, pressed,
            action: ButtonAction::Page(page),
            id: None,
        }))
    }

    pub fn add_checkbox(
        &mut self,
        x: i32,
        y: i32,
        off: u32,
        on: u32,
        checked: bool,
        id: impl Into<Option<EntryId>>,
    ) -> Result<NodeKey> {
        self.add(Entry::Checkbox(Switch { x, y, off, on, checked, id: id.into() }))
    }

    pub fn add_radio(
        &mut self,
        x: i32,
        y: i32,
        off: u32,
        on: u32,
        checked: bool,
        id: impl Into<Option<EntryId>>,
    ) -> Result<NodeKey> {
        self.add(Entry::Radio(Switch { x, y, off, on, checked, id: id.into() }))
    }

    pub fn add_text_entry(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        hue: u32,
        text: impl Into<String>,
        id: impl Into<Option<EntryId>>,
    ) -> Result<NodeKey> {
        self.add(Entry::TextEntry(TextEntry {
            x, y, width, height, hue,
            text: text.into(),
            limit: None,
            id: id.into(),
        }))
    }

    pub fn add_text_entry_limited(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        hue: u32,
        text: impl Into<String>,
        limit: u32,
        id: impl Into<Option<EntryId>>,
    ) -> Result<NodeKey> {
        self.add(Entry::TextEntry(TextEntry {
            x, y, width, height, hue,
            text: text.into(),
            limit: Some(limit),
            id: id.into(),
        }))
    }

    pub fn add_page(&mut self, page: u32) -> NodeKey {
        self.push(Entry::Page(page))
    }

    pub fn add_group(&mut self, group: u32) -> NodeKey {
        self.push(Entry::Group(group))
    }

    pub fn add_tooltip(&mut self, number: u32) -> NodeKey {
        self.push(Entry::Tooltip(number))
    }

    // ==== internal ====

    fn check_container(&self, key: NodeKey) -> Result<()> {
        let node = self.nodes.get(key).ok_or_else(|| err!(ApiUsage, "no node {:?}", key))?;
        ensure!(node.container().is_some(), ApiUsage, "{:?} is not a container", key);
        Ok(())
    }

    // append key to container's children. both must exist, key must be detached.
    fn link(&mut self, container: NodeKey, key: NodeKey) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = Some(container);
        }
        if let Some(container) = self.nodes.get_mut(container).and_then(Node::container_mut) {
            container.children.push(key);
        }
        self.touch();
    }

    fn is_ancestor_or_self(&self, ancestor: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == ancestor {
                return true;
            }
            match self.nodes.get(key).and_then(|node| node.parent) {
                Some(parent) => key = parent,
                None => return false,
            }
        }
    }
}

impl Debug for Gump {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Gump")
            .field("type_id", &self.type_id)
            .field("serial", &self.serial)
            .field("location", &self.location)
            .field("flags", &self.flags)
            .field("nodes", &self.nodes.len())
            .field("revision", &self.revision)
            .field("responders", &self.responders.len())
            .finish()
    }
}


#[test]
fn test_type_id_is_stable() {
    assert_eq!(GumpTypeId::of_kind("bank.confirm"), GumpTypeId::of_kind("bank.confirm"));
    assert_ne!(GumpTypeId::of_kind("bank.confirm"), GumpTypeId::of_kind("bank.deposit"));
}

#[test]
fn test_absolute_positions_nest() {
    let mut gump = Gump::new("test.nest");
    let mut parent = gump.root();
    let mut expected = (0, 0);
    let mut labels = Vec::new();
    for depth in 1..=6 {
        parent = gump.add_container(parent, depth * 10, depth * 3).unwrap();
        expected = (expected.0 + depth * 10, expected.1 + depth * 3);
        let label = gump.add_to(parent, Entry::Label(Label {
            x: 1, y: 2, hue: 0, text: format!("depth {}", depth),
        })).unwrap();
        labels.push((label, (expected.0 + 1, expected.1 + 2)));
    }
    for &(label, abs) in &labels {
        assert_eq!(gump.absolute_position(label), Some(abs));
    }
    let placed = gump.walk();
    for (placed, &(label, abs)) in placed.iter().zip(&labels) {
        assert_eq!(placed.key, label);
        let (lx, ly) = placed.entry.position().unwrap();
        assert_eq!((placed.origin.0 + lx, placed.origin.1 + ly), abs);
    }
}

#[test]
fn test_moving_container_moves_descendants() {
    let mut gump = Gump::new("test.move");
    let outer = gump.add_container(gump.root(), 10, 10).unwrap();
    let inner = gump.add_container(outer, 5, 5).unwrap();
    let image = gump.add_to(inner, Entry::Image(Image { x: 1, y: 1, gump_id: 1, hue: 0 })).unwrap();
    assert_eq!(gump.absolute_position(image), Some((16, 16)));
    let revision = gump.revision();
    gump.set_position(outer, 100, 200).unwrap();
    assert!(gump.revision() > revision);
    assert_eq!(gump.absolute_position(image), Some((106, 206)));
}

#[test]
fn test_reattach_reparents_and_readd_is_noop() {
    let mut gump = Gump::new("test.reparent");
    let a = gump.add_container(gump.root(), 0, 0).unwrap();
    let b = gump.add_container(gump.root(), 50, 0).unwrap();
    let label = gump.add_to(a, Entry::Label(Label { x: 0, y: 0, hue: 0, text: "x".into() })).unwrap();

    let revision = gump.revision();
    gump.attach(a, label).unwrap();
    assert_eq!(gump.revision(), revision);
    assert_eq!(gump.walk().len(), 1);

    gump.attach(b, label).unwrap();
    assert_eq!(gump.walk().len(), 1);
    assert_eq!(gump.absolute_position(label), Some((50, 0)));

    assert!(gump.attach(label, a).is_err());
    assert!(gump.attach(a, gump.root()).is_err());
    gump.attach(b, a).unwrap();
    assert!(gump.attach(a, b).is_err());
}

#[test]
fn test_detached_entry_refuses_to_compile() {
    let mut gump = Gump::new("test.detached");
    let label = gump.add_label(0, 0, 0, "hi");
    assert_eq!(gump.compile_entry(label, RenderMode::Interactive).unwrap(), "{ text 0 0 0 0 }");
    assert!(gump.detach(label));
    assert!(!gump.detach(label));
    let e = gump.compile_entry(label, RenderMode::Interactive).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ApiUsage);
    assert!(gump.walk().is_empty());
}

#[test]
fn test_ids_distinct_and_released_on_delete() {
    let mut gump = Gump::new("test.ids");
    let mut keys = Vec::new();
    for i in 0..50 {
        keys.push(gump.add_checkbox(0, i * 20, 210, 211, false, None).unwrap());
    }
    let ids = keys.iter().map(|&k| gump.entry(k).unwrap().id().unwrap()).collect::<HashSet<_>>();
    assert_eq!(ids.len(), 50);

    let explicit = gump.entry(keys[0]).unwrap().id().unwrap();
    assert_eq!(
        gump.add_button(0, 0, 1, 2, explicit).unwrap_err().kind(),
        ErrorKind::ApiUsage,
    );
    assert!(gump.delete(keys[0]));
    gump.add_button(0, 0, 1, 2, explicit).unwrap();
}

#[test]
fn test_macro_protected_gump_ids_distinct() {
    let mut gump = Gump::new("test.macro").with_seed(99);
    gump.set_macro_protected(true);
    let mut ids = HashSet::new();
    for _ in 0..10_000 {
        let key = gump.add_button(0, 0, 1, 2, None).unwrap();
        assert!(ids.insert(gump.entry(key).unwrap().id().unwrap()));
    }
}

#[test]
fn test_new_id_can_be_claimed() {
    let mut gump = Gump::new("test.new_id");
    let id = gump.new_id().unwrap();
    let key = gump.add_button(0, 0, 1, 2, id).unwrap();
    assert_eq!(gump.find_id(id), Some(key));
    assert_ne!(gump.new_id().unwrap(), id);
}

#[test]
fn test_names() {
    let mut gump = Gump::new("test.names");
    let ok = gump.add_button(0, 0, 1, 2, None).unwrap();
    gump.set_name(ok, "ok").unwrap();
    assert_eq!(gump.find("ok"), Some(ok));
    assert_eq!(gump.name(ok), Some("ok"));
    gump.delete(ok);
    assert_eq!(gump.find("ok"), None);
}

#[test]
fn test_counts() {
    let mut gump = Gump::new("test.counts");
    gump.add_checkbox(0, 0, 1, 2, false, None).unwrap();
    gump.add_group(1);
    gump.add_radio(0, 0, 1, 2, true, None).unwrap();
    gump.add_radio(0, 0, 1, 2, false, None).unwrap();
    gump.add_text_entry(0, 0, 10, 10, 0, "", None).unwrap();
    assert_eq!(gump.switch_count(), 3);
    assert_eq!(gump.text_entry_count(), 1);
    assert_eq!(gump.ids_allocated(), 4);
}

#[test]
fn test_intern_on_gump() {
    let mut gump = Gump::new("test.intern");
    let a = gump.intern("X");
    let revision = gump.revision();
    assert_eq!(gump.intern("X"), a);
    assert_eq!(gump.revision(), revision);
    assert_ne!(gump.intern("Y"), a);
}
