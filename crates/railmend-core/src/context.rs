//! How and where a snapshot is being loaded.
//!
//! None of this is persisted in the snapshot. It is supplied by the caller
//! and influences a handful of steps (strict content checks in network
//! games, first-company provisioning, legacy order interpretation).

use serde::{Deserialize, Serialize};

use crate::entity::CompanySettings;
use crate::order::OrderPreferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Normal,
    Editor,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Savegame,
    Scenario,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkRole {
    #[default]
    Offline,
    Server {
        dedicated: bool,
    },
    Client,
}

impl NetworkRole {
    pub fn is_networking(self) -> bool {
        !matches!(self, NetworkRole::Offline)
    }

    pub fn is_server(self) -> bool {
        matches!(self, NetworkRole::Server { .. })
    }

    pub fn is_dedicated(self) -> bool {
        matches!(self, NetworkRole::Server { dedicated: true })
    }
}

/// Preferences of the local client that shape how legacy data is read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPrefs {
    pub order: OrderPreferences,
    /// Settings a newly provisioned local company starts with.
    pub company: CompanySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadContext {
    pub game_mode: GameMode,
    pub file_type: FileType,
    pub network: NetworkRole,
    pub prefs: ClientPrefs,
    /// Build identifier recorded in the compatibility log.
    pub revision: String,
}

impl Default for LoadContext {
    fn default() -> Self {
        Self {
            game_mode: GameMode::Normal,
            file_type: FileType::Savegame,
            network: NetworkRole::Offline,
            prefs: ClientPrefs::default(),
            revision: concat!("railmend-", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl LoadContext {
    /// Content mismatches abort instead of warning.
    pub fn is_strict(&self) -> bool {
        self.network.is_networking()
    }
}
