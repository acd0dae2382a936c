//! The load pipeline: version check, migration, cache rebuild, hand-off.
//!
//! [`after_load`] consumes a decoded snapshot and either returns the
//! migrated world or an error. Notifications for outside subsystems are
//! held back until every step has succeeded, so a rejected load leaves
//! nothing behind but the error.

use serde::Serialize;
use tracing::{info, warn};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadWarning};
use crate::gamelog::CompatLog;
use crate::id::CompanyId;
use crate::migration::{LoadSession, MigrationPlan};
use crate::rebuild::rebuild_caches;
use crate::services::LoadServices;
use crate::version::{CURRENT_VERSION, SaveVersion, SnapshotHeader};
use crate::world::World;

/// A world fresh out of the chunk decoder, tagged with its format version.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSnapshot {
    pub header: SnapshotHeader,
    pub world: World,
}

impl LoadedSnapshot {
    pub fn new(header: SnapshotHeader, world: World) -> Self {
        Self { header, world }
    }
}

/// What a successful load did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub source_version: SaveVersion,
    /// Every step whose gate opened, in order.
    pub applied_steps: Vec<&'static str>,
    pub warnings: Vec<LoadWarning>,
    pub log: CompatLog,
    /// Cache partitions that were rebuilt from dirty marks.
    pub dirty_notes: Vec<&'static str>,
    /// Companies that were given the default script.
    pub scripts_started: Vec<CompanyId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub world: World,
    pub report: LoadReport,
}

/// Migrate `snapshot` with the standard plan.
pub fn after_load(
    snapshot: LoadedSnapshot,
    ctx: &LoadContext,
    services: &mut dyn LoadServices,
) -> Result<LoadOutcome, LoadError> {
    after_load_with_plan(snapshot, ctx, services, &MigrationPlan::standard())
}

/// Migrate `snapshot` with an explicit plan.
pub fn after_load_with_plan(
    snapshot: LoadedSnapshot,
    ctx: &LoadContext,
    services: &mut dyn LoadServices,
    plan: &MigrationPlan,
) -> Result<LoadOutcome, LoadError> {
    let LoadedSnapshot { header, world } = snapshot;
    if header.version.is_from_future() {
        return Err(LoadError::FutureVersion {
            found: header.version,
            supported: CURRENT_VERSION,
        });
    }
    if let Err(e) = world.map.check_shape() {
        warn!(error = %e, "load rejected");
        return Err(LoadError::Corrupt {
            step: "check_map_shape",
            reason: e.to_string(),
        });
    }
    info!(version = %header.version, flavor = ?header.flavor, "loading snapshot");

    let mut session = LoadSession::new(world, header, ctx, services);
    let applied_steps = match plan.run(&mut session) {
        Ok(applied) => applied,
        Err(e) => {
            warn!(error = %e, "load rejected");
            return Err(e);
        }
    };

    let LoadSession {
        mut world,
        services,
        log,
        dirty,
        warnings,
        notices,
        pending_scripts,
        ..
    } = session;

    rebuild_caches(&mut world, &dirty, ctx);

    for target in notices {
        services.notify_track_layout_changed(target);
    }
    for warning in &warnings {
        services.show_warning(warning);
    }
    for &id in &pending_scripts {
        let slot = services.start_default_script(id);
        if let Some(c) = world.companies.get_mut(id) {
            c.script = Some(slot);
        }
    }
    services.reset_window_system();

    info!(
        steps = applied_steps.len(),
        warnings = warnings.len(),
        "snapshot loaded"
    );
    Ok(LoadOutcome {
        world,
        report: LoadReport {
            source_version: header.version,
            applied_steps,
            warnings,
            log,
            dirty_notes: dirty.notes(),
            scripts_started: pending_scripts,
        },
    })
}

/// Migrate `world` where it lies. The migration runs on a copy that
/// replaces `world` only on success; on failure `world` is untouched.
pub fn after_load_in_place(
    world: &mut World,
    header: SnapshotHeader,
    ctx: &LoadContext,
    services: &mut dyn LoadServices,
) -> Result<LoadReport, LoadError> {
    let staged = LoadedSnapshot::new(header, world.clone());
    let outcome = after_load(staged, ctx, services)?;
    *world = outcome.world;
    Ok(outcome.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Company;
    use crate::gamelog::LogEntry;
    use crate::services::{ContentPackRef, ContentStatus, RecordingServices, TileTarget};
    use crate::test_utils::small_world;
    use crate::world::PauseMode;

    fn current(world: World) -> LoadedSnapshot {
        LoadedSnapshot::new(SnapshotHeader::native(CURRENT_VERSION), world)
    }

    #[test]
    fn future_version_is_rejected_before_any_step() {
        let header = SnapshotHeader::native(SaveVersion::new(CURRENT_VERSION.major + 1, 0));
        let mut services = RecordingServices::new();
        let err = after_load(LoadedSnapshot::new(header, small_world()), &LoadContext::default(), &mut services)
            .unwrap_err();
        assert!(matches!(err, LoadError::FutureVersion { .. }));
        assert_eq!(services.window_resets, 0);
    }

    #[test]
    fn shapeless_map_is_corrupt_not_a_panic() {
        let mut world = small_world();
        world.map = crate::map::TileMap::new(0, 16);
        let header = SnapshotHeader::native(SaveVersion::new(85, 0));
        let mut services = RecordingServices::new();
        let err = after_load(LoadedSnapshot::new(header, world), &LoadContext::default(), &mut services)
            .unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
        assert_eq!(err.step(), Some("check_map_shape"));
        assert_eq!(services.window_resets, 0);
    }

    #[test]
    fn current_version_load_changes_nothing_persisted() {
        let world = small_world();
        let before = world.encode().unwrap();
        let mut services = RecordingServices::new();
        let out = after_load(current(world), &LoadContext::default(), &mut services).unwrap();
        assert_eq!(out.world.encode().unwrap(), before);
        assert_eq!(out.report.log.migrated_steps().count(), 0);
        assert_eq!(services.window_resets, 1);
        assert_eq!(services.track_notices, vec![TileTarget::Everywhere]);
    }

    #[test]
    fn ai_scripts_start_only_after_success() {
        let mut world = small_world();
        let mut ai = Company::new(4);
        ai.is_ai = true;
        world.companies.insert_at(CompanyId(3), ai).unwrap();
        let mut services = RecordingServices::new();
        let out = after_load(current(world), &LoadContext::default(), &mut services).unwrap();
        assert_eq!(services.scripts_started, vec![CompanyId(3)]);
        assert_eq!(out.world.companies.get(CompanyId(3)).unwrap().script.as_ref().unwrap().name, "default-3");
        assert_eq!(out.report.scripts_started, vec![CompanyId(3)]);
    }

    #[test]
    fn failed_load_notifies_nobody() {
        let mut world = small_world();
        world.towns.clear();
        let mut ai = Company::new(4);
        ai.is_ai = true;
        world.companies.insert_at(CompanyId(3), ai).unwrap();
        let mut services = RecordingServices::new();
        let err = after_load(current(world), &LoadContext::default(), &mut services).unwrap_err();
        assert_eq!(err.step(), Some("require_town"));
        assert!(services.scripts_started.is_empty());
        assert!(services.track_notices.is_empty());
        assert_eq!(services.window_resets, 0);
    }

    #[test]
    fn missing_content_warns_and_pauses() {
        let mut world = small_world();
        world.content.push(ContentPackRef {
            id: 77,
            checksum: [0; 16],
            name: "trains".into(),
        });
        let mut services = RecordingServices::new().with_content(77, ContentStatus::Missing);
        let out = after_load(current(world), &LoadContext::default(), &mut services).unwrap();
        assert_eq!(out.report.warnings, vec![LoadWarning::ContentMissing]);
        assert_eq!(services.warnings, vec![LoadWarning::ContentMissing]);
        assert_eq!(out.world.pause, PauseMode::ERROR);
        assert!(out.report.log.entries().contains(&LogEntry::ContentRemoved { id: 77 }));
        assert!(out.report.dirty_notes.contains(&"engine availability"));
    }

    #[test]
    fn in_place_failure_leaves_world_untouched() {
        let mut world = small_world();
        world.towns.clear();
        let before = world.clone();
        let mut services = RecordingServices::new();
        let res = after_load_in_place(
            &mut world,
            SnapshotHeader::native(CURRENT_VERSION),
            &LoadContext::default(),
            &mut services,
        );
        assert!(res.is_err());
        assert_eq!(world, before);
    }
}
