//! Serde structs for the files the loader reads and writes.
//!
//! Three kinds of file exist: hand-written fixtures (an ASCII map sketch
//! plus a few records), full snapshot images, and load profiles that
//! describe the context a load runs in.

use serde::{Deserialize, Serialize};

use railmend_core::context::LoadContext;
use railmend_core::services::{ContentPackRef, ContentStatus, RecordingServices};
use railmend_core::settings::GameSettings;
use railmend_core::version::{SaveFlavor, SaveVersion, SnapshotHeader};
use railmend_core::world::World;

// ===========================================================================
// Snapshots
// ===========================================================================

/// A complete world image with its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub header: SnapshotHeader,
    pub world: World,
}

// ===========================================================================
// Fixtures
// ===========================================================================

/// A small hand-written world in some historical format version.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureData {
    pub version: SaveVersion,
    #[serde(default)]
    pub flavor: SaveFlavor,
    /// One string per map row, northern row first. See [`crate::sketch`].
    pub map: Vec<String>,
    #[serde(default)]
    pub towns: Vec<TownData>,
    #[serde(default)]
    pub companies: Vec<CompanyData>,
    #[serde(default)]
    pub content: Vec<ContentPackRef>,
    #[serde(default)]
    pub settings: GameSettings,
}

/// A town centred on a sketch cell. Towns get IDs in list order.
#[derive(Debug, Clone, Deserialize)]
pub struct TownData {
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub population: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyData {
    pub slot: u8,
    #[serde(default)]
    pub ai: bool,
    #[serde(default)]
    pub colour: u8,
}

// ===========================================================================
// Profiles
// ===========================================================================

/// How a content pack resolves against the installed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContentAnswer {
    pub id: u32,
    pub status: ContentStatus,
}

/// The context a load runs in. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileFile {
    pub context: LoadContext,
    /// Packs not listed here resolve as compatible.
    pub content: Vec<ContentAnswer>,
}

impl ProfileFile {
    /// Services that answer content queries from this profile.
    pub fn services(&self) -> RecordingServices {
        self.content
            .iter()
            .fold(RecordingServices::new(), |s, a| s.with_content(a.id, a.status))
    }
}
