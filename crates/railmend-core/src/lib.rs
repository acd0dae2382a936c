//! Railmend Core -- brings transport-tycoon snapshots of any historical
//! format version up to the current data model.
//!
//! A decoded snapshot arrives as a [`world::World`] tagged with the
//! [`version::SaveVersion`] it was written with. Loading it runs a fixed,
//! ordered table of migration steps over the world, then rebuilds the
//! derived caches the simulation needs.
//!
//! # Load Pipeline
//!
//! Each call to [`load::after_load`] goes through the following phases:
//!
//! 1. **Version check** -- Reject snapshots newer than [`version::CURRENT_VERSION`].
//! 2. **Migration** -- Walk [`migration::STEPS`] in order; each step whose
//!    gate opens for the snapshot's version transforms the world in place.
//! 3. **Rebuild** -- Recompute derived caches from the migrated world.
//! 4. **Hand-off** -- Deliver buffered notices, warnings and script starts
//!    to the outside subsystems, then reset the window system once.
//!
//! The first step that meets a state it cannot interpret aborts the load.
//! Nothing is delivered to outside subsystems for a rejected load.
//!
//! # Key Types
//!
//! - [`world::World`] -- Entity pools, the tile map and global state.
//! - [`version::SaveVersion`] -- The format-version oracle.
//! - [`migration::MigrationStep`] -- One named, gated transformation.
//! - [`migration::LoadSession`] -- Everything a step may read or write.
//! - [`services::LoadServices`] -- Narrow interface to outside subsystems.
//! - [`tile::TileView`] -- A tile decoded under the current layout.

pub mod catalog;
pub mod context;
pub mod dirty;
pub mod economy;
pub mod entity;
pub mod error;
pub mod gamelog;
pub mod hash;
pub mod id;
pub mod load;
pub mod map;
pub mod migration;
pub mod order;
pub mod pool;
pub mod rebuild;
pub mod rng;
pub mod services;
pub mod settings;
pub mod tile;
pub mod version;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{LoadError, LoadWarning, StepError};
pub use load::{LoadOutcome, LoadReport, LoadedSnapshot, after_load, after_load_in_place, after_load_with_plan};
pub use version::{CURRENT_VERSION, SaveVersion, SnapshotHeader};
pub use world::World;
