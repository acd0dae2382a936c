//! Format-version oracle.
//!
//! Every version-dependent decision in the load pipeline goes through
//! [`SaveVersion::is_older_than`]. The ordering is lexicographic over
//! `(major, minor)`; a snapshot written without a minor revision carries
//! `minor == 0` and is therefore older than any `(major, n)` with `n > 0`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The newest format this build understands. Snapshots tagged with this
/// version skip every gated migration step.
pub const CURRENT_VERSION: SaveVersion = SaveVersion::new(184, 0);

/// Format version carried by a snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SaveVersion {
    pub major: u16,
    pub minor: u8,
}

impl SaveVersion {
    pub const fn new(major: u16, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if this snapshot predates `(major, minor)`.
    pub const fn is_older_than(self, major: u16, minor: u8) -> bool {
        self.major < major || (self.major == major && self.minor < minor)
    }

    /// Shorthand for `is_older_than(major, 0)`.
    pub const fn is_before(self, major: u16) -> bool {
        self.is_older_than(major, 0)
    }

    /// Returns `true` if this version cannot be loaded by this build.
    pub const fn is_from_future(self) -> bool {
        CURRENT_VERSION.is_older_than(self.major, self.minor)
    }
}

impl Default for SaveVersion {
    fn default() -> Self {
        CURRENT_VERSION
    }
}

impl fmt::Display for SaveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

/// Which program family wrote the snapshot. Older flavours went through an
/// external converter before reaching this pipeline, but a few encodings
/// (order flags in particular) still differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveFlavor {
    #[default]
    Native,
    Ttd,
    Tto,
    TtdPatch,
}

/// Snapshot header: immutable for the whole load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub version: SaveVersion,
    #[serde(default)]
    pub flavor: SaveFlavor,
}

impl SnapshotHeader {
    pub fn native(version: SaveVersion) -> Self {
        Self {
            version,
            flavor: SaveFlavor::Native,
        }
    }
}
