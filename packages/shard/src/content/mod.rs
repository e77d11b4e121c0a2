//! Dialogs the shard shows players.
//!
//! Responders can't reach the shard itself, so they report what the player did by pushing an
//! `Action` onto a queue which the shard drains after every reply it hands to the manager.

pub mod confirm;
pub mod bulletin;

use std::sync::Arc;
use crossbeam::queue::SegQueue;


/// Standard gump art.
pub mod art {
    pub const BACKGROUND: u32 = 9270;
    pub const TEXT_BACKGROUND: u32 = 9350;
    pub const OK: u32 = 247;
    pub const CANCEL: u32 = 241;
    pub const NEXT_PAGE: u32 = 4005;
    pub const PREV_PAGE: u32 = 4014;
    pub const CHECKBOX_OFF: u32 = 210;
    pub const CHECKBOX_ON: u32 = 211;
    pub const RADIO_OFF: u32 = 208;
    pub const RADIO_ON: u32 = 209;
    /// Item art of a scroll.
    pub const SCROLL_ITEM: u32 = 0x14ED;
}

/// Hue of ordinary dialog text.
pub const TEXT_HUE: u32 = 0x481;


/// Something a player did in a dialog. The shard knows who replied, so actions don't say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Accepted the welcome dialog.
    Joined {
        name: String,
        /// Wants to post on the board, rather than just read it.
        post: bool,
        /// Wants to be told about new posts.
        notify: bool,
    },
    /// Cancelled or closed the welcome dialog.
    Declined,
    /// Posted to the board.
    Posted {
        text: String,
    },
    /// Closed the board.
    LeftBoard,
}

/// Queue responders push actions onto.
pub type Actions = Arc<SegQueue<Action>>;
