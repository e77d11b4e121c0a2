//! Manager configuration.

use serde::{Serialize, Deserialize};


/// Behavior switches of a `GumpManager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Send a close packet to a session whose dialog is replaced by another
    /// of the same type.
    pub close_replaced: bool,
    /// After a member of a shared instance replies, send the instance again
    /// to every member, since the replying client has closed its copy and
    /// the others should see the updated state.
    pub resend_shared_after_reply: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            close_replaced: true,
            resend_shared_after_reply: true,
        }
    }
}
