//! Reads fixtures, snapshots and profiles from disk.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus the conversion of a fixture into a
//! snapshot ready for migration.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use railmend_core::entity::{Company, Town};
use railmend_core::id::{CompanyId, TownId};
use railmend_core::load::LoadedSnapshot;
use railmend_core::version::SnapshotHeader;
use railmend_core::world::World;

use crate::schema::{FixtureData, ProfileFile, SnapshotFile};
use crate::sketch::{SketchError, parse_sketch};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while reading or writing data files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("cannot write {file}: {detail}")]
    Serialize { file: PathBuf, detail: String },

    #[error("bad map sketch in {file}: {source}")]
    Sketch {
        file: PathBuf,
        #[source]
        source: SketchError,
    },

    /// The fixture parsed but describes an impossible world.
    #[error("invalid fixture {file}: {detail}")]
    Fixture { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Serialize `value` into `path` in the format its extension names. TOML
/// cannot express world images and is rejected.
pub fn serialize_file<T: Serialize>(path: &Path, value: &T) -> Result<(), DataLoadError> {
    let to_error = |detail: String| DataLoadError::Serialize {
        file: path.to_path_buf(),
        detail,
    };
    let text = match detect_format(path)? {
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map_err(|e| to_error(e.to_string()))?,
        Format::Json => serde_json::to_string_pretty(value).map_err(|e| to_error(e.to_string()))?,
        Format::Toml => {
            return Err(DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            });
        }
    };
    std::fs::write(path, text)?;
    Ok(())
}

// ===========================================================================
// Public entry points
// ===========================================================================

/// Load a load profile. A directory is searched for `profile.{ron,toml,json}`;
/// a directory without one yields the default profile.
pub fn load_profile(path: &Path) -> Result<ProfileFile, DataLoadError> {
    if path.is_dir() {
        return match find_data_file(path, "profile")? {
            Some(file) => deserialize_file(&file),
            None => Ok(ProfileFile::default()),
        };
    }
    deserialize_file(path)
}

/// Load a full snapshot image.
pub fn load_snapshot(path: &Path) -> Result<LoadedSnapshot, DataLoadError> {
    let file: SnapshotFile = deserialize_file(path)?;
    debug!(file = %path.display(), version = %file.header.version, "read snapshot");
    Ok(LoadedSnapshot::new(file.header, file.world))
}

/// Write a snapshot image as RON or JSON.
pub fn save_snapshot(path: &Path, snapshot: &SnapshotFile) -> Result<(), DataLoadError> {
    serialize_file(path, snapshot)
}

/// Load a hand-written fixture and build the world it describes.
pub fn load_fixture(path: &Path) -> Result<LoadedSnapshot, DataLoadError> {
    let data: FixtureData = deserialize_file(path)?;
    let snapshot = build_fixture(data).map_err(|e| match e {
        FixtureError::Sketch(source) => DataLoadError::Sketch {
            file: path.to_path_buf(),
            source,
        },
        FixtureError::Invalid(detail) => DataLoadError::Fixture {
            file: path.to_path_buf(),
            detail,
        },
    })?;
    debug!(
        file = %path.display(),
        version = %snapshot.header.version,
        tiles = snapshot.world.map.len(),
        "built fixture world"
    );
    Ok(snapshot)
}

// ===========================================================================
// Fixture building
// ===========================================================================

#[derive(Debug)]
enum FixtureError {
    Sketch(SketchError),
    Invalid(String),
}

/// Turn fixture data into a snapshot. The world keeps whatever the fixture
/// says, however stale; migration is the caller's business.
fn build_fixture(data: FixtureData) -> Result<LoadedSnapshot, FixtureError> {
    let map = parse_sketch(&data.map).map_err(FixtureError::Sketch)?;
    let mut world = World::new(map.size_x(), map.size_y());
    world.map = map;
    world.settings = data.settings;
    world.content = data.content;

    for (i, town) in data.towns.iter().enumerate() {
        let inside = town.x + 1 < world.map.size_x() && town.y + 1 < world.map.size_y();
        if !inside {
            return Err(FixtureError::Invalid(format!(
                "town {i} at ({}, {}) lies outside the map",
                town.x, town.y
            )));
        }
        let id = u16::try_from(i)
            .map_err(|_| FixtureError::Invalid("too many towns".into()))?;
        let mut t = Town::new(world.map.tile_xy(town.x, town.y));
        t.population = town.population;
        world
            .towns
            .insert_at(TownId(id), t)
            .map_err(|e| FixtureError::Invalid(e.to_string()))?;
    }

    for c in &data.companies {
        let mut company = Company::new(c.colour);
        company.is_ai = c.ai;
        world
            .companies
            .insert_at(CompanyId(c.slot), company)
            .map_err(|e| FixtureError::Invalid(format!("company slot {}: {e}", c.slot)))?;
    }

    let header = SnapshotHeader {
        version: data.version,
        flavor: data.flavor,
    };
    Ok(LoadedSnapshot::new(header, world))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use railmend_core::services::ContentStatus;
    use railmend_core::version::SaveVersion;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "railmend_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const FIXTURE_RON: &str = r#"(
        version: (major: 85, minor: 0),
        map: [
            "~~~",
            "~L~",
            "~~~",
        ],
        towns: [(x: 0, y: 0, population: 50)],
        companies: [(slot: 0), (slot: 2, ai: true)],
    )"#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["a.yaml", "a"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_missing() {
        let dir = make_test_dir("find_missing");
        assert_eq!(find_data_file(&dir, "profile").unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("profile.ron"), "()").unwrap();
        fs::write(dir.join("profile.json"), "{}").unwrap();

        let result = find_data_file(&dir, "profile");
        assert!(matches!(
            result,
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    #[test]
    fn profile_from_toml_with_content_answers() {
        let dir = make_test_dir("profile_toml");
        fs::write(
            dir.join("profile.toml"),
            r#"
[context]
game_mode = "Editor"
revision = "test-build"

[[content]]
id = 77
status = "Missing"
"#,
        )
        .unwrap();

        let profile = load_profile(&dir).unwrap();
        assert_eq!(profile.context.game_mode, railmend_core::context::GameMode::Editor);
        assert_eq!(profile.context.revision, "test-build");
        let services = profile.services();
        assert_eq!(services.content.get(&77), Some(&ContentStatus::Missing));

        cleanup(&dir);
    }

    #[test]
    fn directory_without_profile_gives_default() {
        let dir = make_test_dir("profile_none");
        assert_eq!(load_profile(&dir).unwrap(), ProfileFile::default());
        cleanup(&dir);
    }

    #[test]
    fn profile_in_json_allows_network_role() {
        let dir = make_test_dir("profile_json");
        let path = dir.join("server.json");
        fs::write(&path, r#"{"context": {"network": {"Server": {"dedicated": true}}}}"#).unwrap();

        let profile = load_profile(&path).unwrap();
        assert!(profile.context.network.is_dedicated());
        assert!(profile.content.is_empty());

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Fixtures and snapshots
    // -----------------------------------------------------------------------

    #[test]
    fn fixture_builds_world() {
        let dir = make_test_dir("fixture");
        let path = dir.join("lock.ron");
        fs::write(&path, FIXTURE_RON).unwrap();

        let snapshot = load_fixture(&path).unwrap();
        assert_eq!(snapshot.header.version, SaveVersion::new(85, 0));
        assert_eq!(snapshot.world.map.size_x(), 4);
        assert_eq!(snapshot.world.towns.len(), 1);
        assert_eq!(snapshot.world.towns.get(TownId(0)).unwrap().population, 50);
        assert!(snapshot.world.companies.get(CompanyId(2)).unwrap().is_ai);

        cleanup(&dir);
    }

    #[test]
    fn fixture_town_off_map_is_rejected() {
        let dir = make_test_dir("fixture_off_map");
        let path = dir.join("bad.ron");
        fs::write(&path, r#"(version: (major: 85, minor: 0), map: [".."], towns: [(x: 5, y: 0)])"#)
            .unwrap();

        assert!(matches!(
            load_fixture(&path),
            Err(DataLoadError::Fixture { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn fixture_with_bad_sketch_names_the_file() {
        let dir = make_test_dir("fixture_sketch");
        let path = dir.join("bad.json");
        fs::write(&path, r#"{"version": {"major": 85, "minor": 0}, "map": ["..", "."]}"#).unwrap();

        let err = load_fixture(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Sketch {
                source: SketchError::Ragged { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("bad.json"));

        cleanup(&dir);
    }

    #[test]
    fn snapshot_survives_json_and_ron() {
        let dir = make_test_dir("snapshot");
        let world = railmend_core::test_utils::small_world();
        let file = SnapshotFile {
            header: SnapshotHeader::native(SaveVersion::new(120, 0)),
            world,
        };

        for name in ["snap.json", "snap.ron"] {
            let path = dir.join(name);
            save_snapshot(&path, &file).unwrap();
            let back = load_snapshot(&path).unwrap();
            assert_eq!(back.header, file.header);
            assert_eq!(back.world, file.world, "{name}");
        }

        cleanup(&dir);
    }

    #[test]
    fn snapshot_cannot_be_written_as_toml() {
        let dir = make_test_dir("snapshot_toml");
        let file = SnapshotFile {
            header: SnapshotHeader::default(),
            world: railmend_core::test_utils::small_world(),
        };
        assert!(matches!(
            save_snapshot(&dir.join("snap.toml"), &file),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        cleanup(&dir);
    }
}
