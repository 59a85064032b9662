//! Page status flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status bitmask of a page.
///
/// Visibility levels are ordered: a page at or above [`Status::HIDDEN`] is
/// hidden, at or above [`Status::UNPUBLISHED`] unpublished, and so on. The
/// status filter relies on that ordering when it restricts results with a
/// single `status < ceiling` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u32);

#[allow(missing_docs)]
impl Status {
    pub const ON: Status = Status(1);
    pub const LOCKED: Status = Status(4);
    pub const SYSTEM_ID: Status = Status(8);
    pub const SYSTEM: Status = Status(16);
    pub const UNIQUE: Status = Status(32);
    pub const DRAFT: Status = Status(64);
    pub const FLAGGED: Status = Status(128);
    pub const TEMP: Status = Status(512);
    pub const HIDDEN: Status = Status(1024);
    pub const UNPUBLISHED: Status = Status(2048);
    pub const TRASH: Status = Status(8192);
    pub const DELETED: Status = Status(16384);
    pub const SYSTEM_OVERRIDE: Status = Status(32768);
    pub const CORRUPTED: Status = Status(131072);

    /// Looks up a status by name, e.g. `hidden` or `unpublished`.
    pub fn from_name(name: &str) -> Option<Status> {
        let status = match name.trim().to_ascii_lowercase().as_str() {
            "on" | "published" => Status::ON,
            "locked" => Status::LOCKED,
            "systemid" | "system_id" => Status::SYSTEM_ID,
            "system" => Status::SYSTEM,
            "unique" => Status::UNIQUE,
            "draft" => Status::DRAFT,
            "flagged" => Status::FLAGGED,
            "temp" => Status::TEMP,
            "hidden" => Status::HIDDEN,
            "unpublished" => Status::UNPUBLISHED,
            "trash" | "trashed" => Status::TRASH,
            "deleted" => Status::DELETED,
            "systemoverride" | "system_override" => Status::SYSTEM_OVERRIDE,
            "corrupted" => Status::CORRUPTED,
            _ => return None,
        };
        Some(status)
    }

    /// The raw bit value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if all bits of `other` are set.
    pub fn contains(&self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
