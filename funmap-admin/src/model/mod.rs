//! Venue data model
//!
//! The live, editable form of the nested venue tree. Records from
//! [`funmap_common::api`] are converted into [`Venue`] values on load and back
//! into records for snapshots and save payloads.

pub mod sanitize;
pub mod validate;
pub mod venue;

pub use validate::{currency_codes, format_price, has_priced_tier};
pub use venue::{
    PricingId, PricingLink, Session, SessionMirror, SlotRef, TierAutofill, TimeSlot, Venue,
};
