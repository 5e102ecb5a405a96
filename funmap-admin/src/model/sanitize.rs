//! Payload sanitisation for the nested form data
//!
//! Applied to the venue payload just before it is written:
//!
//! - strings are trimmed and truncated by character count
//!   (names and addresses 255, date/time/price 64, currency 12 and upper-cased)
//! - a location with neither coordinate is dropped
//! - a feature reference with neither type nor id is dropped
//! - a blank session date becomes `None`

use funmap_common::api::types::{FeatureRef, Tier, VenueRecord, Version};

pub const MAX_TEXT: usize = 255;
pub const MAX_SHORT: usize = 64;
pub const MAX_CURRENCY: usize = 12;
const MAX_FEATURE_ID: usize = 128;

/// Trim, then keep at most `max` characters
pub fn sanitize_string(value: &str, max: usize) -> String {
    value.trim().chars().take(max).collect()
}

pub fn sanitize_venues(venues: Vec<VenueRecord>) -> Vec<VenueRecord> {
    venues.into_iter().map(sanitize_venue).collect()
}

fn sanitize_venue(mut venue: VenueRecord) -> VenueRecord {
    venue.name = sanitize_string(&venue.name, MAX_TEXT);
    venue.address = sanitize_string(&venue.address, MAX_TEXT);
    venue.location = venue
        .location
        .filter(|location| location.lat.is_some() || location.lng.is_some());
    venue.feature = venue.feature.and_then(|feature| {
        let feature = FeatureRef {
            kind: sanitize_string(&feature.kind, MAX_SHORT),
            id: sanitize_string(&feature.id, MAX_FEATURE_ID),
        };
        (!feature.kind.is_empty() || !feature.id.is_empty()).then_some(feature)
    });

    for session in &mut venue.sessions {
        session.date = session
            .date
            .as_deref()
            .map(|date| sanitize_string(date, MAX_SHORT))
            .filter(|date| !date.is_empty());
        for slot in &mut session.times {
            slot.time = sanitize_string(&slot.time, MAX_SHORT);
            slot.versions = std::mem::take(&mut slot.versions)
                .into_iter()
                .map(sanitize_version)
                .collect();
        }
    }
    venue
}

fn sanitize_version(version: Version) -> Version {
    Version {
        name: sanitize_string(&version.name, MAX_TEXT),
        tiers: version.tiers.into_iter().map(sanitize_tier).collect(),
    }
}

fn sanitize_tier(tier: Tier) -> Tier {
    Tier {
        name: sanitize_string(&tier.name, MAX_TEXT),
        currency: sanitize_string(&tier.currency, MAX_CURRENCY).to_uppercase(),
        price: sanitize_string(&tier.price, MAX_SHORT),
    }
}
