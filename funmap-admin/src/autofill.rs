//! Pricing autofill engine
//!
//! Within one time slot, version 0's tier names are a template for every other
//! version until a divergent edit locks the slot ([`TierAutofill::Locked`]).
//!
//! Also owns the slot's pricing mode:
//!
//! - `Independent → Mirrored`: "same pricing as above" on, reference exists.
//!   The slot links to the reference's container. A slot outside session 0
//!   now follows another session's template, so its autofill locks.
//! - `Mirrored → Independent`: "same pricing as above" off, or no reference.
//!   The container is deep-copied at this moment and the autofill unlocks.
//!
//! Either transition in a session other than session 0 is a direct edit of
//! that session, so it also locks the venue's session mirror. Slots that share
//! the changed slot's pricing follow it to its new container.

use crate::model::{PricingLink, SlotRef, TierAutofill, Venue};
use funmap_common::api::types::{Tier, Version};
use funmap_common::Result;
use tracing::debug;

/// Whether a slot shares its reference's pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    Independent,
    Mirrored,
}

pub fn pricing_mode(venue: &Venue, at: SlotRef) -> Result<PricingMode> {
    Ok(match venue.slot(at)?.pricing() {
        PricingLink::Shared(_) => PricingMode::Mirrored,
        PricingLink::Owned(_) => PricingMode::Independent,
    })
}

/// Apply the "same pricing as above" choice to a slot; returns the new mode
///
/// Choosing "yes" on a slot without a reference leaves it independent.
pub fn set_same_pricing_as_above(venue: &mut Venue, at: SlotRef, same: bool) -> Result<PricingMode> {
    let current = venue.slot(at)?.pricing();
    let reference = venue.reference_slot(at);

    match (same, reference) {
        (true, Some(reference)) => {
            let target = venue.slot(reference)?.pricing().id();
            if current == PricingLink::Shared(target) {
                return Ok(PricingMode::Mirrored);
            }
            let slot = venue.slot_mut(at)?;
            slot.pricing = PricingLink::Shared(target);
            if at.session > 0 {
                slot.autofill = TierAutofill::Locked;
                venue.lock_session_mirror();
            }
            venue.normalize()?;
            debug!(
                "Slot {}/{} now shares pricing with {}/{}",
                at.session, at.time, reference.session, reference.time
            );
            Ok(PricingMode::Mirrored)
        }
        _ => {
            if detach(venue, at)? {
                if at.session > 0 {
                    venue.lock_session_mirror();
                }
                venue.normalize()?;
            }
            Ok(PricingMode::Independent)
        }
    }
}

/// Give a shared slot its own deep copy; returns whether it was shared
fn detach(venue: &mut Venue, at: SlotRef) -> Result<bool> {
    let PricingLink::Shared(id) = venue.slot(at)?.pricing() else {
        return Ok(false);
    };
    let copy = venue.duplicate_pricing(id)?;
    let slot = venue.slot_mut(at)?;
    slot.pricing = PricingLink::Owned(copy);
    slot.autofill = TierAutofill::Unlocked;
    debug!("Slot {}/{} detached to its own pricing", at.session, at.time);
    Ok(true)
}

/// Copy a version-0 tier name to the same tier of every other version
///
/// No-op while the slot is locked. Versions lacking that tier are left as
/// they are. Returns the number of tiers written.
pub fn propagate_tier_name(venue: &mut Venue, at: SlotRef, tier: usize, name: &str) -> Result<usize> {
    if venue.slot(at)?.autofill().is_locked() {
        return Ok(0);
    }
    let mut written = 0;
    for version in venue.versions_mut(at)?.iter_mut().skip(1) {
        if let Some(target) = version.tiers.get_mut(tier) {
            if target.name != name {
                target.name = name.to_string();
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Record a tier edit; edits outside version 0 lock the slot's template
///
/// Returns true when this edit locked the slot.
pub fn note_tier_edit(venue: &mut Venue, at: SlotRef, version: usize) -> Result<bool> {
    let slot = venue.slot_mut(at)?;
    if version == 0 || slot.autofill.is_locked() {
        return Ok(false);
    }
    slot.autofill = TierAutofill::Locked;
    debug!("Tier autofill locked for slot {}/{}", at.session, at.time);
    Ok(true)
}

/// New version for a slot, seeded from the template when unlocked
///
/// Tiers carry version 0's names and currencies with empty prices.
pub fn seed_version(venue: &Venue, at: SlotRef, currency: &str) -> Result<Version> {
    let slot = venue.slot(at)?;
    let template = venue.version(at, 0)?;
    let tiers: Vec<Tier> = if slot.autofill().is_locked() {
        vec![Tier {
            currency: currency.to_string(),
            ..Tier::default()
        }]
    } else {
        template
            .tiers
            .iter()
            .map(|tier| Tier {
                name: tier.name.clone(),
                currency: if tier.currency.is_empty() {
                    currency.to_string()
                } else {
                    tier.currency.clone()
                },
                price: String::new(),
            })
            .collect()
    };
    Ok(Version {
        name: String::new(),
        tiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue_with_versions() -> Venue {
        let mut venue = Venue::new("Hall");
        let at = SlotRef::new(0, 0);
        venue.tier_mut(at, 0, 0).unwrap().name = "Adult".to_string();
        venue.add_tier(at, 0, "AUD").unwrap();
        venue.tier_mut(at, 0, 1).unwrap().name = "Child".to_string();
        let seeded = seed_version(&venue, at, "AUD").unwrap();
        venue.push_version(at, seeded).unwrap();
        venue
    }

    #[test]
    fn test_seed_version_copies_template_names() {
        let venue = venue_with_versions();
        let second = venue.version(SlotRef::new(0, 0), 1).unwrap();
        let names: Vec<&str> = second.tiers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Adult", "Child"]);
        assert!(second.tiers.iter().all(|t| t.price.is_empty()));
        assert_eq!(second.tiers[1].currency, "AUD");
    }

    #[test]
    fn test_template_propagates_until_divergent_edit() {
        let mut venue = venue_with_versions();
        let at = SlotRef::new(0, 0);

        venue.tier_mut(at, 0, 0).unwrap().name = "Senior".to_string();
        assert_eq!(propagate_tier_name(&mut venue, at, 0, "Senior").unwrap(), 1);
        assert_eq!(venue.tier(at, 1, 0).unwrap().name, "Senior");

        // Divergent edit in version 1 locks the slot
        venue.tier_mut(at, 1, 1).unwrap().name = "Youth".to_string();
        assert!(note_tier_edit(&mut venue, at, 1).unwrap());
        assert!(!note_tier_edit(&mut venue, at, 1).unwrap());

        assert_eq!(propagate_tier_name(&mut venue, at, 0, "Concession").unwrap(), 0);
        assert_eq!(venue.tier(at, 1, 0).unwrap().name, "Senior");
    }

    #[test]
    fn test_version_zero_edit_never_locks() {
        let mut venue = venue_with_versions();
        assert!(!note_tier_edit(&mut venue, SlotRef::new(0, 0), 0).unwrap());
        assert!(!venue.slot(SlotRef::new(0, 0)).unwrap().autofill().is_locked());
    }

    #[test]
    fn test_locked_slot_seeds_single_blank_tier() {
        let mut venue = venue_with_versions();
        let at = SlotRef::new(0, 0);
        note_tier_edit(&mut venue, at, 1).unwrap();
        let seeded = seed_version(&venue, at, "AUD").unwrap();
        assert_eq!(seeded.tiers.len(), 1);
        assert_eq!(seeded.tiers[0].name, "");
    }

    #[test]
    fn test_mirroring_from_later_session_locks_autofill() {
        let mut venue = Venue::new("Hall");
        venue.lock_session_mirror();
        venue.add_session().unwrap();
        let b = SlotRef::new(1, 0);

        assert_eq!(set_same_pricing_as_above(&mut venue, b, true).unwrap(), PricingMode::Mirrored);
        assert!(venue.slot(b).unwrap().autofill().is_locked());
        assert!(venue.shares_pricing(SlotRef::new(0, 0), b).unwrap());
        assert_eq!(venue.container_count(), 1);

        assert_eq!(set_same_pricing_as_above(&mut venue, b, false).unwrap(), PricingMode::Independent);
        assert!(!venue.slot(b).unwrap().autofill().is_locked());
        assert!(!venue.shares_pricing(SlotRef::new(0, 0), b).unwrap());
    }

    #[test]
    fn test_mirroring_within_first_session_keeps_autofill() {
        let mut venue = Venue::new("Hall");
        let later = venue.add_time_slot(0).unwrap();
        set_same_pricing_as_above(&mut venue, later, true).unwrap();
        assert!(!venue.slot(later).unwrap().autofill().is_locked());
        assert_eq!(pricing_mode(&venue, later).unwrap(), PricingMode::Mirrored);
        assert!(!venue.is_mirror_locked());
    }

    #[test]
    fn test_pricing_choice_in_later_session_locks_session_mirror() {
        let mut venue = Venue::new("Hall");
        venue.add_session().unwrap();
        set_same_pricing_as_above(&mut venue, SlotRef::new(1, 0), true).unwrap();
        assert!(venue.is_mirror_locked());
    }

    #[test]
    fn test_follower_tracks_reference_through_detach() {
        let mut venue = Venue::new("Hall");
        venue.add_session().unwrap();
        let head = SlotRef::new(1, 0);
        let follower = venue.add_time_slot(1).unwrap();

        set_same_pricing_as_above(&mut venue, head, true).unwrap();
        set_same_pricing_as_above(&mut venue, follower, true).unwrap();
        assert!(venue.shares_pricing(SlotRef::new(0, 0), follower).unwrap());

        set_same_pricing_as_above(&mut venue, head, false).unwrap();
        assert!(venue.shares_pricing(head, follower).unwrap());
        assert!(!venue.shares_pricing(SlotRef::new(0, 0), follower).unwrap());
        assert_eq!(venue.container_count(), 2);
        assert_eq!(Venue::from_record(venue.to_record()).to_record(), venue.to_record());

        // Re-sharing the head takes its follower along
        set_same_pricing_as_above(&mut venue, head, true).unwrap();
        assert!(venue.shares_pricing(SlotRef::new(0, 0), follower).unwrap());
        assert_eq!(venue.container_count(), 1);
    }

    #[test]
    fn test_first_slot_stays_independent() {
        let mut venue = Venue::new("Hall");
        let first = SlotRef::new(0, 0);
        assert_eq!(set_same_pricing_as_above(&mut venue, first, true).unwrap(), PricingMode::Independent);
        assert!(!venue.slot(first).unwrap().same_pricing_as_above());
    }

    #[test]
    fn test_independent_slot_keeps_lock_when_set_independent_again() {
        let mut venue = venue_with_versions();
        let at = SlotRef::new(0, 0);
        note_tier_edit(&mut venue, at, 1).unwrap();
        set_same_pricing_as_above(&mut venue, at, false).unwrap();
        assert!(venue.slot(at).unwrap().autofill().is_locked());
    }
}
