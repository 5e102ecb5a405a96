//! Venue editor component
//!
//! Owns the live venue trees and runs the propagation engines on each edit:
//! an edit handler changes the value at its cell, then applies pricing autofill
//! and session mirroring, then notifies the session. All of that happens under
//! one write lock; the notification is sent after the lock is released.
//!
//! Tracked as the `venues` composite. The save payload is the sanitised form of
//! the snapshot.

use crate::autofill::{self, PricingMode};
use crate::mirror::{self, MirrorField, MirrorOutcome, PricingCell};
use crate::model::{self, sanitize, SlotRef, Venue};
use crate::registry::Capturable;
use crate::session::ChangeNotifier;
use funmap_common::api::{Location, VenueRecord};
use funmap_common::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;

pub const VENUES_FIELD: &str = "venues";

/// Effect of one pricing edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    /// The edited value differs from what it was
    pub changed: bool,
    /// Tiers renamed by the version-0 template
    pub autofilled: usize,
    /// This edit locked the slot's tier autofill
    pub autofill_locked: bool,
    pub mirror: MirrorOutcome,
}

impl EditReport {
    fn unchanged() -> Self {
        Self {
            changed: false,
            autofilled: 0,
            autofill_locked: false,
            mirror: MirrorOutcome::Unchanged,
        }
    }
}

pub struct VenueEditor {
    venues: RwLock<Vec<Venue>>,
    currency: String,
    notifier: ChangeNotifier,
}

impl VenueEditor {
    /// # Errors
    ///
    /// `MissingContext` when `site_currency` is blank; tiers are never created
    /// without a currency.
    pub fn new(records: Vec<VenueRecord>, site_currency: &str, notifier: ChangeNotifier) -> Result<Self> {
        let currency = site_currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(Error::MissingContext("venue pricing needs a site currency".to_string()));
        }
        Ok(Self {
            venues: RwLock::new(records.into_iter().map(Venue::from_record).collect()),
            currency,
            notifier,
        })
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn venue_count(&self) -> usize {
        self.venues.read().len()
    }

    /// Copy of one venue
    pub fn venue(&self, index: usize) -> Result<Venue> {
        self.venues
            .read()
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("venue {}", index)))
    }

    pub fn records(&self) -> Vec<VenueRecord> {
        self.venues.read().iter().map(Venue::to_record).collect()
    }

    pub fn currency_codes(&self) -> Vec<String> {
        model::currency_codes(&self.records())
    }

    pub fn has_priced_tier(&self) -> bool {
        model::has_priced_tier(&self.records())
    }

    /// Run `edit` on one venue under the write lock, then notify on success
    fn mutate<R>(&self, index: usize, edit: impl FnOnce(&mut Venue) -> Result<R>) -> Result<R> {
        let result = {
            let mut venues = self.venues.write();
            let venue = venues
                .get_mut(index)
                .ok_or_else(|| Error::NotFound(format!("venue {}", index)))?;
            edit(venue)
        };
        if result.is_ok() {
            self.notifier.notify();
        }
        result
    }

    // ========================================
    // Venue-level edits
    // ========================================

    pub fn add_venue(&self, name: &str) -> usize {
        let index = {
            let mut venues = self.venues.write();
            let mut venue = Venue::new(name);
            if let Ok(tier) = venue.tier_mut(SlotRef::new(0, 0), 0, 0) {
                tier.currency = self.currency.clone();
            }
            venues.push(venue);
            venues.len() - 1
        };
        self.notifier.notify();
        index
    }

    pub fn remove_venue(&self, index: usize) -> Result<()> {
        {
            let mut venues = self.venues.write();
            if index >= venues.len() {
                return Err(Error::NotFound(format!("venue {}", index)));
            }
            venues.remove(index);
        }
        self.notifier.notify();
        Ok(())
    }

    pub fn set_name(&self, venue: usize, name: &str) -> Result<()> {
        self.mutate(venue, |venue| {
            venue.name = name.to_string();
            Ok(())
        })
    }

    pub fn set_address(&self, venue: usize, address: &str) -> Result<()> {
        self.mutate(venue, |venue| {
            venue.address = address.to_string();
            Ok(())
        })
    }

    pub fn set_location(&self, venue: usize, location: Option<Location>) -> Result<()> {
        self.mutate(venue, |venue| {
            venue.location = location;
            Ok(())
        })
    }

    pub fn set_session_date(&self, venue: usize, session: usize, date: Option<String>) -> Result<()> {
        self.mutate(venue, |venue| {
            venue.session_mut(session)?.date = date;
            Ok(())
        })
    }

    pub fn set_slot_time(&self, venue: usize, slot: SlotRef, time: &str) -> Result<()> {
        self.mutate(venue, |venue| {
            venue.slot_mut(slot)?.time = time.to_string();
            Ok(())
        })
    }

    // ========================================
    // Pricing edits (propagating)
    // ========================================

    pub fn edit_version_name(&self, venue: usize, slot: SlotRef, version: usize, name: &str) -> Result<EditReport> {
        self.mutate(venue, |venue| {
            let previous = std::mem::replace(&mut venue.version_mut(slot, version)?.name, name.to_string());
            if previous == name {
                return Ok(EditReport::unchanged());
            }
            let mirror = mirror::mirror_edit(
                venue,
                PricingCell::version(slot, version),
                MirrorField::VersionName,
                &previous,
                name,
            )?;
            Ok(EditReport {
                changed: true,
                autofilled: 0,
                autofill_locked: false,
                mirror,
            })
        })
    }

    pub fn edit_tier_name(
        &self,
        venue: usize,
        slot: SlotRef,
        version: usize,
        tier: usize,
        name: &str,
    ) -> Result<EditReport> {
        self.mutate(venue, |venue| {
            let previous = std::mem::replace(&mut venue.tier_mut(slot, version, tier)?.name, name.to_string());
            if previous == name {
                return Ok(EditReport::unchanged());
            }

            let mut report = EditReport::unchanged();
            report.changed = true;
            if version == 0 {
                report.autofilled = autofill::propagate_tier_name(venue, slot, tier, name)?;
            } else {
                report.autofill_locked = autofill::note_tier_edit(venue, slot, version)?;
            }
            report.mirror = mirror::mirror_edit(
                venue,
                PricingCell::tier(slot, version, tier),
                MirrorField::TierName,
                &previous,
                name,
            )?;
            Ok(report)
        })
    }

    /// Edit a tier price; the text is stored with two decimals
    pub fn edit_tier_price(
        &self,
        venue: usize,
        slot: SlotRef,
        version: usize,
        tier: usize,
        price: &str,
    ) -> Result<EditReport> {
        let price = model::format_price(price)?;
        self.mutate(venue, |venue| {
            let previous = std::mem::replace(&mut venue.tier_mut(slot, version, tier)?.price, price.clone());
            if previous == price {
                return Ok(EditReport::unchanged());
            }

            let mut report = EditReport::unchanged();
            report.changed = true;
            report.autofill_locked = autofill::note_tier_edit(venue, slot, version)?;
            report.mirror = mirror::mirror_edit(
                venue,
                PricingCell::tier(slot, version, tier),
                MirrorField::TierPrice,
                &previous,
                &price,
            )?;
            Ok(report)
        })
    }

    pub fn set_tier_currency(
        &self,
        venue: usize,
        slot: SlotRef,
        version: usize,
        tier: usize,
        currency: &str,
    ) -> Result<()> {
        let currency = currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(Error::InvalidInput("a tier currency cannot be blank".to_string()));
        }
        self.mutate(venue, |venue| {
            venue.tier_mut(slot, version, tier)?.currency = currency;
            Ok(())
        })
    }

    /// The "same pricing as above" choice for a slot
    pub fn set_same_pricing_as_above(&self, venue: usize, slot: SlotRef, same: bool) -> Result<PricingMode> {
        self.mutate(venue, |venue| autofill::set_same_pricing_as_above(venue, slot, same))
    }

    // ========================================
    // Structural edits
    // ========================================

    pub fn add_session(&self, venue: usize) -> Result<usize> {
        self.mutate(venue, Venue::add_session)
    }

    pub fn remove_session(&self, venue: usize, session: usize) -> Result<()> {
        self.mutate(venue, |venue| venue.remove_session(session))
    }

    pub fn add_time_slot(&self, venue: usize, session: usize) -> Result<SlotRef> {
        let currency = self.currency.clone();
        self.mutate(venue, |venue| {
            let slot = venue.add_time_slot(session)?;
            venue.tier_mut(slot, 0, 0)?.currency = currency;
            Ok(slot)
        })
    }

    pub fn remove_time_slot(&self, venue: usize, slot: SlotRef) -> Result<()> {
        self.mutate(venue, |venue| venue.remove_time_slot(slot))
    }

    /// Add a version, seeded from the slot's template
    pub fn add_version(&self, venue: usize, slot: SlotRef) -> Result<usize> {
        self.mutate(venue, |venue| {
            let seeded = autofill::seed_version(venue, slot, &self.currency)?;
            venue.push_version(slot, seeded)
        })
    }

    pub fn remove_version(&self, venue: usize, slot: SlotRef, version: usize) -> Result<()> {
        self.mutate(venue, |venue| venue.remove_version(slot, version))
    }

    pub fn add_tier(&self, venue: usize, slot: SlotRef, version: usize) -> Result<usize> {
        self.mutate(venue, |venue| venue.add_tier(slot, version, &self.currency))
    }

    pub fn remove_tier(&self, venue: usize, slot: SlotRef, version: usize, tier: usize) -> Result<()> {
        self.mutate(venue, |venue| venue.remove_tier(slot, version, tier))
    }
}

impl Capturable for VenueEditor {
    fn capture(&self) -> Value {
        serde_json::to_value(self.records()).unwrap_or_else(|e| {
            tracing::error!("Failed to capture venues: {}", e);
            Value::Null
        })
    }

    /// Rebuilds every venue; session mirrors start active again
    fn restore(&self, snapshot: &Value) -> Result<()> {
        let records: Vec<VenueRecord> = serde_json::from_value(snapshot.clone())?;
        *self.venues.write() = records.into_iter().map(Venue::from_record).collect();
        Ok(())
    }

    fn payload(&self) -> Value {
        serde_json::to_value(sanitize::sanitize_venues(self.records())).unwrap_or_else(|e| {
            tracing::error!("Failed to build venue payload: {}", e);
            Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_two_sessions() -> VenueEditor {
        let editor = VenueEditor::new(Vec::new(), "aud", ChangeNotifier::detached()).unwrap();
        let venue = editor.add_venue("Town Hall");
        editor.edit_tier_name(venue, SlotRef::new(0, 0), 0, 0, "General").unwrap();
        editor.add_session(venue).unwrap();
        editor
    }

    #[test]
    fn test_requires_site_currency() {
        assert!(matches!(
            VenueEditor::new(Vec::new(), "  ", ChangeNotifier::detached()),
            Err(Error::MissingContext(_))
        ));
    }

    #[test]
    fn test_new_tiers_use_site_currency() {
        let editor = editor_with_two_sessions();
        assert_eq!(editor.currency(), "AUD");
        let tier = editor.add_tier(0, SlotRef::new(0, 0), 0).unwrap();
        let venue = editor.venue(0).unwrap();
        assert_eq!(venue.tier(SlotRef::new(0, 0), 0, tier).unwrap().currency, "AUD");
        assert_eq!(editor.currency_codes(), vec!["AUD".to_string()]);
    }

    #[test]
    fn test_tier_name_edit_reports_mirror() {
        let editor = editor_with_two_sessions();
        let report = editor.edit_tier_name(0, SlotRef::new(0, 0), 0, 0, "VIP").unwrap();
        assert!(report.changed);
        assert!(matches!(report.mirror, MirrorOutcome::Propagated(ref cells) if cells.len() == 1));

        let venue = editor.venue(0).unwrap();
        assert_eq!(venue.tier(SlotRef::new(1, 0), 0, 0).unwrap().name, "VIP");
    }

    #[test]
    fn test_price_edit_is_formatted_and_mirrored() {
        let editor = editor_with_two_sessions();
        let report = editor.edit_tier_price(0, SlotRef::new(0, 0), 0, 0, "12.5").unwrap();
        assert!(report.changed);

        let venue = editor.venue(0).unwrap();
        assert_eq!(venue.tier(SlotRef::new(0, 0), 0, 0).unwrap().price, "12.50");
        assert_eq!(venue.tier(SlotRef::new(1, 0), 0, 0).unwrap().price, "12.50");
        assert!(editor.has_priced_tier());

        assert!(matches!(
            editor.edit_tier_price(0, SlotRef::new(0, 0), 0, 0, "abc"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_version_edit_locks_autofill() {
        let editor = editor_with_two_sessions();
        let slot = SlotRef::new(0, 0);
        let version = editor.add_version(0, slot).unwrap();

        let venue = editor.venue(0).unwrap();
        assert_eq!(venue.tier(slot, version, 0).unwrap().name, "General");

        let report = editor.edit_tier_price(0, slot, version, 0, "5").unwrap();
        assert!(report.autofill_locked);

        let report = editor.edit_tier_name(0, slot, 0, 0, "Standard").unwrap();
        assert_eq!(report.autofilled, 0);
        let venue = editor.venue(0).unwrap();
        assert_eq!(venue.tier(slot, version, 0).unwrap().name, "General");
    }

    #[test]
    fn test_payload_is_sanitized() {
        let editor = editor_with_two_sessions();
        editor.set_name(0, "  Town Hall  ").unwrap();
        let payload = editor.payload();
        assert_eq!(payload[0]["name"], "Town Hall");
        assert_eq!(editor.capture()[0]["name"], "  Town Hall  ");
    }

    #[test]
    fn test_restore_rebuilds_aliases() {
        let editor = editor_with_two_sessions();
        let b = SlotRef::new(1, 0);
        editor.set_same_pricing_as_above(0, b, true).unwrap();
        let baseline = editor.capture();

        editor.set_same_pricing_as_above(0, b, false).unwrap();
        assert_ne!(editor.capture(), baseline);

        editor.restore(&baseline).unwrap();
        assert_eq!(editor.capture(), baseline);
        assert!(editor.venue(0).unwrap().shares_pricing(SlotRef::new(0, 0), b).unwrap());
    }

    #[test]
    fn test_unknown_venue_is_not_found() {
        let editor = editor_with_two_sessions();
        assert!(matches!(editor.set_name(9, "x"), Err(Error::NotFound(_))));
        assert!(matches!(editor.remove_venue(9), Err(Error::NotFound(_))));
    }
}
