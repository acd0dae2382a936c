use serde::{Deserialize, Serialize};

/// Marker for typed pool indices.
pub trait PoolId: Copy + Eq + Ord {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! pool_ids {
    ($($(#[$meta:meta])* $name:ident($repr:ty);)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            pub struct $name(pub $repr);

            impl PoolId for $name {
                fn from_index(index: usize) -> Self {
                    $name(index as $repr)
                }

                fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

pool_ids! {
    /// Identifies a town.
    TownId(u16);
    /// Identifies a station or waypoint.
    StationId(u16);
    /// Identifies a vehicle (any kind, including effects and disasters).
    VehicleId(u32);
    /// Identifies an order in the global order pool.
    OrderId(u32);
    /// Identifies an industry.
    IndustryId(u16);
    /// Identifies a depot record.
    DepotId(u16);
    /// Identifies a sign.
    SignId(u16);
    /// Identifies a pooled map object (transmitter, lighthouse, statue, HQ, ...).
    ObjectId(u32);
    /// Identifies a subsidy offer or award.
    SubsidyId(u16);
    /// Identifies an engine type.
    EngineId(u16);
    /// Identifies a company. Company IDs double as the low range of [`Owner`].
    CompanyId(u8);
    /// Identifies an in-flight cargo payment.
    CargoPaymentId(u32);
}

impl TownId {
    pub const INVALID: TownId = TownId(0xFFFF);
}

impl StationId {
    pub const INVALID: StationId = StationId(0xFFFF);
}

impl CompanyId {
    pub const FIRST: CompanyId = CompanyId(0);
}

/// Number of company slots.
pub const MAX_COMPANIES: u8 = 15;

/// Owner of a tile or record: a company, or one of the special owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Owner(pub u8);

impl Owner {
    pub const TOWN: Owner = Owner(0x0F);
    pub const NONE: Owner = Owner(0x10);
    pub const WATER: Owner = Owner(0x11);
    pub const DEITY: Owner = Owner(0x12);
    pub const INVALID: Owner = Owner(0xFF);

    /// Returns the company when this owner is one.
    pub fn company(self) -> Option<CompanyId> {
        (self.0 < MAX_COMPANIES).then_some(CompanyId(self.0))
    }

    pub fn is_company(self) -> bool {
        self.0 < MAX_COMPANIES
    }

    /// Companies and the special owners up to `DEITY`. Anything above is
    /// not a value a tile can carry.
    pub fn is_meaningful(self) -> bool {
        self.0 <= Self::DEITY.0
    }
}

impl From<CompanyId> for Owner {
    fn from(c: CompanyId) -> Self {
        Owner(c.0)
    }
}
