//! Cross-crate integration tests: fixture files decoded by `railmend-data`,
//! migrated by `railmend-core`.
//!
//! Fixtures live in `fixtures/` next to this crate's manifest and are
//! written as ASCII map sketches, so the expected map after migration can
//! be compared row by row.

use std::path::{Path, PathBuf};

use railmend_core::context::LoadContext;
use railmend_core::id::CompanyId;
use railmend_core::services::RecordingServices;
use railmend_core::world::PauseMode;
use railmend_core::*;
use railmend_data::{SnapshotFile, load_fixture, load_profile, load_snapshot, render_sketch, save_snapshot};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn migrate(name: &str) -> (Result<LoadOutcome, LoadError>, RecordingServices) {
    let snapshot = load_fixture(&fixture(name)).unwrap();
    let mut services = RecordingServices::new();
    let res = after_load(snapshot, &LoadContext::default(), &mut services);
    (res, services)
}

// ===========================================================================
// Harbour: water classes, dead owners, AI provisioning
// ===========================================================================

#[test]
fn harbour_map_after_migration() {
    let (res, _) = migrate("harbour.ron");
    let out = res.unwrap();

    let expected = [
        "~~~~~~~~",
        "~~~L~~~~",
        "~~~~~~~~",
        "cc......",
        "..00..h.",
        "........",
    ];
    assert_eq!(render_sketch(&out.world.map), expected.map(String::from).to_vec());
}

#[test]
fn harbour_rail_counts_for_its_owner() {
    let (res, _) = migrate("harbour.ron");
    let world = res.unwrap().world;

    let infra = world.caches.infrastructure.get(&CompanyId(0)).unwrap();
    assert_eq!(infra.rail, 2);
    assert_eq!(world.caches.infrastructure.get(&CompanyId(1)).unwrap().rail, 0);
}

#[test]
fn harbour_ai_gets_a_script_after_load() {
    let (res, services) = migrate("harbour.ron");
    let out = res.unwrap();

    assert_eq!(services.scripts_started, vec![CompanyId(1)]);
    assert_eq!(out.report.scripts_started, vec![CompanyId(1)]);
    assert!(out.world.companies.get(CompanyId(1)).unwrap().script.is_some());
    assert!(out.world.companies.get(CompanyId(0)).unwrap().script.is_none());
    assert_eq!(services.window_resets, 1);
}

// ===========================================================================
// Neighbour priority
// ===========================================================================

#[test]
fn lock_between_river_and_canal_is_river() {
    let (res, _) = migrate("river_lock.json");
    let world = res.unwrap().world;

    let t = world.map.tile_xy(2, 1);
    let tile = world.map.get(t).unwrap();
    assert_eq!(tile.water_class(), railmend_core::tile::WaterClass::River);
}

// ===========================================================================
// Profiles and content packs
// ===========================================================================

#[test]
fn missing_content_is_fatal_for_network_clients() {
    let profile = load_profile(&fixture("network_client.toml")).unwrap();
    let snapshot = load_fixture(&fixture("modded.ron")).unwrap();
    let mut services = profile.services();

    let err = after_load(snapshot, &profile.context, &mut services).unwrap_err();
    assert!(matches!(err, LoadError::Incompatible { .. }));
    assert_eq!(err.step(), Some("verify_content_packs"));
    assert_eq!(services.window_resets, 0);
    assert!(services.warnings.is_empty());
}

#[test]
fn missing_content_pauses_offline_games() {
    let profile = load_profile(&fixture("offline_missing.toml")).unwrap();
    let snapshot = load_fixture(&fixture("modded.ron")).unwrap();
    let mut services = profile.services();

    let out = after_load(snapshot, &profile.context, &mut services).unwrap();
    assert_eq!(out.world.pause, PauseMode::ERROR);
    assert_eq!(services.warnings, vec![LoadWarning::ContentMissing]);
    assert_eq!(out.report.warnings, vec![LoadWarning::ContentMissing]);
}

// ===========================================================================
// Written snapshots reload unchanged
// ===========================================================================

#[test]
fn migrated_snapshot_reloads_unchanged() {
    let (res, _) = migrate("harbour.ron");
    let world = res.unwrap().world;
    let hash = world.state_hash().unwrap();

    let path = std::env::temp_dir().join(format!("railmend_harbour_{}.json", std::process::id()));
    let file = SnapshotFile {
        header: SnapshotHeader::native(CURRENT_VERSION),
        world,
    };
    save_snapshot(&path, &file).unwrap();
    let snapshot = load_snapshot(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(snapshot.header.version, CURRENT_VERSION);
    let mut services = RecordingServices::new();
    let again = after_load(snapshot, &LoadContext::default(), &mut services).unwrap();
    assert_eq!(again.world.state_hash().unwrap(), hash);
    assert_eq!(again.report.log.migrated_steps().count(), 0);
}
