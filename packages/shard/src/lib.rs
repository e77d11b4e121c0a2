//! A small shard which greets players with a welcome dialog and lets them share a bulletin
//! board, built on the `gump` dialog library.
//!
//! There's no real transport here. The shard loop consumes network events from a channel and
//! pushes packets onto a queue, and `demo` plays scripted clients against both.

#[macro_use]
extern crate tracing;

pub mod logging;
pub mod settings;
pub mod event;
pub mod channel;
pub mod sink;
pub mod content;
pub mod runner;
pub mod demo;
