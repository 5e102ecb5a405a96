//! Wire types for the gateway load/save contract
//!
//! Pure data definitions shared by the engine and any gateway implementation.
//! No HTTP framework dependencies live here.

pub mod types;

pub use types::{
    CheckoutOption, FeatureRef, GatewayAction, LoadDocument, Location, SaveResponse,
    SessionRecord, Tier, TimeSlotRecord, VenueRecord, Version,
};
