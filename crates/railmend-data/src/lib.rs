pub mod loader;
pub mod schema;
pub mod sketch;

pub use loader::{DataLoadError, load_fixture, load_profile, load_snapshot, save_snapshot};
pub use schema::{FixtureData, ProfileFile, SnapshotFile};
pub use sketch::{SketchError, parse_sketch, render_sketch};
