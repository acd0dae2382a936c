//! Append-only compatibility log.
//!
//! Records what a load had to do to make a snapshot usable. The log never
//! feeds back into the world; it is returned to the caller in the report.

use serde::Serialize;

use crate::context::GameMode;
use crate::hash::StateHash;
use crate::settings::Landscape;
use crate::version::{SaveFlavor, SaveVersion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogEntry {
    OldVersion {
        flavor: SaveFlavor,
        version: SaveVersion,
    },
    Revision(String),
    Mode {
        mode: GameMode,
        landscape: Landscape,
    },
    ContentRemoved {
        id: u32,
    },
    ContentCompatible {
        id: u32,
    },
    ContentAdded {
        id: u32,
    },
    Migrated {
        step: &'static str,
        from: SaveVersion,
    },
    Warning(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompatLog {
    entries: Vec<LogEntry>,
}

impl CompatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the steps that changed something, in order.
    pub fn migrated_steps(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Migrated { step, .. } => Some(*step),
            _ => None,
        })
    }

    /// Order-sensitive digest of the log, for comparing two loads.
    pub fn digest(&self) -> u64 {
        let mut h = StateHash::new();
        for entry in &self.entries {
            h.write_str(&format!("{entry:?}"));
        }
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_append_only_and_ordered() {
        let mut log = CompatLog::new();
        log.push(LogEntry::Revision("r1".into()));
        log.push(LogEntry::Migrated {
            step: "remap_currency",
            from: SaveVersion::new(3, 0),
        });
        assert_eq!(log.len(), 2);
        assert_eq!(log.migrated_steps().collect::<Vec<_>>(), vec!["remap_currency"]);
    }

    #[test]
    fn digest_depends_on_order() {
        let mut a = CompatLog::new();
        a.push(LogEntry::ContentAdded { id: 1 });
        a.push(LogEntry::ContentAdded { id: 2 });
        let mut b = CompatLog::new();
        b.push(LogEntry::ContentAdded { id: 2 });
        b.push(LogEntry::ContentAdded { id: 1 });
        assert_ne!(a.digest(), b.digest());
    }
}
