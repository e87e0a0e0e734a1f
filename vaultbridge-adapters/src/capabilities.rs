//! The 9-flag capability set every connector exposes.
//! Callers must check a flag before issuing an operation that requires it —
//! this module only describes what a platform can do, it does not enforce
//! the check at the call site (that's each connector's `send_message`/etc.).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub media: bool,
    pub reactions: bool,
    pub threads: bool,
    pub edit: bool,
    pub delete: bool,
    pub typing: bool,
    pub read_receipts: bool,
}

impl Capabilities {
    pub const fn none() -> Self {
        Self {
            read: false,
            write: false,
            media: false,
            reactions: false,
            threads: false,
            edit: false,
            delete: false,
            typing: false,
            read_receipts: false,
        }
    }
}
