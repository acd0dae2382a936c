//! Load failures and warnings.
//!
//! Steps return [`StepError`]; the dispatcher attaches the failing step's
//! name and turns it into a [`LoadError`]. Anything a step can repair it
//! repairs silently. Only states with no safe interpretation escalate.

use serde::{Deserialize, Serialize};

use crate::pool::PoolError;
use crate::version::SaveVersion;

/// Failure raised inside a single migration step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Corrupt(String),
    #[error("{0}")]
    Incompatible(String),
}

impl StepError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        StepError::Corrupt(reason.into())
    }
}

impl From<PoolError> for StepError {
    fn from(e: PoolError) -> Self {
        StepError::Corrupt(e.to_string())
    }
}

/// Why a load was rejected. The caller's world is never partially migrated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("snapshot version {found} is newer than the supported {supported}")]
    FutureVersion {
        found: SaveVersion,
        supported: SaveVersion,
    },
    #[error("corrupt snapshot ({step}): {reason}")]
    Corrupt { step: &'static str, reason: String },
    #[error("incompatible snapshot ({step}): {reason}")]
    Incompatible { step: &'static str, reason: String },
}

impl LoadError {
    pub(crate) fn from_step(step: &'static str, err: StepError) -> Self {
        match err {
            StepError::Corrupt(reason) => LoadError::Corrupt { step, reason },
            StepError::Incompatible(reason) => LoadError::Incompatible { step, reason },
        }
    }

    /// Name of the step that failed, if any.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            LoadError::FutureVersion { .. } => None,
            LoadError::Corrupt { step, .. } | LoadError::Incompatible { step, .. } => Some(step),
        }
    }
}

/// A non-fatal problem shown to the user after a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LoadWarning {
    #[error("some content packs differ from the ones the game was saved with")]
    ContentCompatible,
    #[error("some content packs are missing; the game has been paused")]
    ContentMissing,
    #[error("{count} tram(s) removed: trams are not supported by this snapshot")]
    TramsRemoved { count: u32 },
}
