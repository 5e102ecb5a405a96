//! Pricing checks and price text formatting

use funmap_common::api::types::{Tier, VenueRecord};
use funmap_common::{Error, Result};
use std::collections::BTreeSet;

fn tiers(venues: &[VenueRecord]) -> impl Iterator<Item = &Tier> {
    venues
        .iter()
        .flat_map(|venue| venue.sessions.iter())
        .flat_map(|session| session.times.iter())
        .flat_map(|slot| slot.versions.iter())
        .flat_map(|version| version.tiers.iter())
}

/// Distinct upper-cased currency codes used by any tier
pub fn currency_codes(venues: &[VenueRecord]) -> Vec<String> {
    tiers(venues)
        .map(|tier| tier.currency.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether at least one tier carries both a price and a currency
pub fn has_priced_tier(venues: &[VenueRecord]) -> bool {
    tiers(venues).any(|tier| !tier.price.trim().is_empty() && !tier.currency.trim().is_empty())
}

/// Normalize typed price text to two decimals
///
/// Empty input stays empty (an unset price).
///
/// # Examples
///
/// ```
/// use funmap_admin::model::format_price;
///
/// assert_eq!(format_price(" 12.5 ").unwrap(), "12.50");
/// assert_eq!(format_price("").unwrap(), "");
/// assert!(format_price("twelve").is_err());
/// ```
pub fn format_price(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(format!("{:.2}", value)),
        _ => Err(Error::InvalidInput(format!("\"{}\" is not a price", trimmed))),
    }
}
