//! Typed orders.
//!
//! Before version 93 an order's behaviour lived in a single byte of flags
//! whose meaning depended on the order kind. That byte is kept in
//! `legacy_flags` until the order conversion consumes it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderKind {
    #[default]
    Nothing,
    GotoStation,
    GotoDepot,
    Loading,
    LeaveStation,
    Dummy,
    GotoWaypoint,
    Conditional,
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NonStop {
    #[default]
    StopEverywhere,
    NoStopAtIntermediate,
    NoStopAtDestination,
    NoStopAtAny,
}

pub mod load {
    pub const IF_POSSIBLE: u8 = 0;
    pub const FULL_LOAD: u8 = 2;
    pub const FULL_LOAD_ANY: u8 = 3;
    pub const NO_LOAD: u8 = 4;
}

pub mod unload {
    pub const IF_POSSIBLE: u8 = 0;
    pub const UNLOAD: u8 = 1;
    pub const TRANSFER: u8 = 2;
    pub const NO_UNLOAD: u8 = 4;
}

pub mod depot_type {
    pub const MANUAL: u8 = 0;
    pub const SERVICE: u8 = 1;
    pub const PART_OF_ORDERS: u8 = 2;
}

pub mod depot_action {
    pub const SERVICE_ONLY: u8 = 0;
    pub const HALT: u8 = 1;
}

pub mod stop_location {
    pub const NEAR_END: u8 = 0;
    pub const MIDDLE: u8 = 1;
    pub const FAR_END: u8 = 2;
}

/// Refit target meaning "do not refit".
pub const CT_NO_REFIT: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub kind: OrderKind,
    #[serde(default)]
    pub non_stop: NonStop,
    #[serde(default)]
    pub load: u8,
    #[serde(default)]
    pub unload: u8,
    #[serde(default)]
    pub depot_type: u8,
    #[serde(default)]
    pub depot_action: u8,
    #[serde(default)]
    pub stop_location: u8,
    #[serde(default = "no_refit")]
    pub refit_cargo: u8,
    #[serde(default)]
    pub destination: u16,
    /// Packed flags of the pre-93 encoding.
    #[serde(default)]
    pub legacy_flags: u8,
}

fn no_refit() -> u8 {
    CT_NO_REFIT
}

impl Default for Order {
    fn default() -> Self {
        Self::new(OrderKind::Nothing, 0)
    }
}

impl Order {
    pub fn new(kind: OrderKind, destination: u16) -> Self {
        Self {
            kind,
            non_stop: NonStop::StopEverywhere,
            load: load::IF_POSSIBLE,
            unload: unload::IF_POSSIBLE,
            depot_type: depot_type::MANUAL,
            depot_action: depot_action::SERVICE_ONLY,
            stop_location: stop_location::NEAR_END,
            refit_cargo: CT_NO_REFIT,
            destination,
            legacy_flags: 0,
        }
    }

    pub fn is(&self, kind: OrderKind) -> bool {
        self.kind == kind
    }

    pub fn make_dummy(&mut self) {
        *self = Order::new(OrderKind::Dummy, 0);
    }
}

/// Client preferences that decide how ambiguous legacy order flags are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderPreferences {
    /// The snapshot's non-stop flag means "non-stop" in the new sense.
    pub sg_new_nonstop: bool,
    /// Same, but only honoured for old native snapshots.
    pub new_nonstop: bool,
    /// Full load orders mean "full load any cargo".
    pub sg_full_load_any: bool,
}
