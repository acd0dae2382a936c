//! Narrow interface to the subsystems a load has to talk to.
//!
//! Pathfinder caches, the window system, the content-pack registry and the
//! script host live outside this crate. Steps reach them only through
//! [`LoadServices`]. Notifications are buffered by the session and
//! delivered after the last step succeeds, so a failed load never leaves
//! an outside subsystem half informed.

use serde::{Deserialize, Serialize};

use crate::entity::ScriptSlot;
use crate::error::LoadWarning;
use crate::id::CompanyId;
use crate::map::TileIndex;

/// Which tiles a track-layout notice covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileTarget {
    Tile(TileIndex),
    Everywhere,
}

/// Result of matching a content pack against the installed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContentStatus {
    Compatible,
    /// Found, but with a different checksum.
    CompatibleWithWarning,
    Missing,
}

/// A content pack the snapshot was saved with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPackRef {
    pub id: u32,
    #[serde(default)]
    pub checksum: [u8; 16],
    #[serde(default)]
    pub name: String,
}

pub trait LoadServices {
    fn notify_track_layout_changed(&mut self, target: TileTarget);

    fn reset_window_system(&mut self);

    fn resolve_content(&mut self, pack: &ContentPackRef) -> ContentStatus;

    fn start_default_script(&mut self, company: CompanyId) -> ScriptSlot;

    fn show_warning(&mut self, warning: &LoadWarning);
}

/// Services for headless loads: every pack resolves, nothing is shown.
#[derive(Debug, Default)]
pub struct NullServices;

impl LoadServices for NullServices {
    fn notify_track_layout_changed(&mut self, _target: TileTarget) {}

    fn reset_window_system(&mut self) {}

    fn resolve_content(&mut self, _pack: &ContentPackRef) -> ContentStatus {
        ContentStatus::Compatible
    }

    fn start_default_script(&mut self, _company: CompanyId) -> ScriptSlot {
        ScriptSlot {
            name: "dummy".into(),
        }
    }

    fn show_warning(&mut self, _warning: &LoadWarning) {}
}

/// Records every call and answers content queries from a fixed table.
#[derive(Debug, Default)]
pub struct RecordingServices {
    /// Status per pack id; unknown packs are compatible.
    pub content: std::collections::BTreeMap<u32, ContentStatus>,
    pub track_notices: Vec<TileTarget>,
    pub window_resets: u32,
    pub scripts_started: Vec<CompanyId>,
    pub warnings: Vec<LoadWarning>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, id: u32, status: ContentStatus) -> Self {
        self.content.insert(id, status);
        self
    }
}

impl LoadServices for RecordingServices {
    fn notify_track_layout_changed(&mut self, target: TileTarget) {
        self.track_notices.push(target);
    }

    fn reset_window_system(&mut self) {
        self.window_resets += 1;
    }

    fn resolve_content(&mut self, pack: &ContentPackRef) -> ContentStatus {
        self.content
            .get(&pack.id)
            .copied()
            .unwrap_or(ContentStatus::Compatible)
    }

    fn start_default_script(&mut self, company: CompanyId) -> ScriptSlot {
        self.scripts_started.push(company);
        ScriptSlot {
            name: format!("default-{}", company.0),
        }
    }

    fn show_warning(&mut self, warning: &LoadWarning) {
        self.warnings.push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_status_orders_by_severity() {
        assert!(ContentStatus::Compatible < ContentStatus::CompatibleWithWarning);
        assert!(ContentStatus::CompatibleWithWarning < ContentStatus::Missing);
    }

    #[test]
    fn recording_services_answer_from_table() {
        let mut s = RecordingServices::new().with_content(7, ContentStatus::Missing);
        let pack = |id| ContentPackRef {
            id,
            checksum: [0; 16],
            name: String::new(),
        };
        assert_eq!(s.resolve_content(&pack(7)), ContentStatus::Missing);
        assert_eq!(s.resolve_content(&pack(8)), ContentStatus::Compatible);
        s.start_default_script(CompanyId(2));
        assert_eq!(s.scripts_started, vec![CompanyId(2)]);
    }
}
