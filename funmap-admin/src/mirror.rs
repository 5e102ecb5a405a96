//! Session mirror engine
//!
//! Session 0 of a venue is the template for its other sessions. A version name,
//! tier name, or tier price edited in session 0 is written to the same
//! `(time, version, tier)` position of every other session, growing targets
//! with defaults where needed. The first changed edit made in any other session
//! locks the venue's mirror for good.

use crate::autofill;
use crate::model::{SlotRef, Venue};
use funmap_common::{Error, Result};
use tracing::debug;

/// Mirrored field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorField {
    VersionName,
    TierName,
    TierPrice,
}

/// Position of an edited value; `tier` is `None` for version names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingCell {
    pub slot: SlotRef,
    pub version: usize,
    pub tier: Option<usize>,
}

impl PricingCell {
    pub fn version(slot: SlotRef, version: usize) -> Self {
        Self {
            slot,
            version,
            tier: None,
        }
    }

    pub fn tier(slot: SlotRef, version: usize, tier: usize) -> Self {
        Self {
            slot,
            version,
            tier: Some(tier),
        }
    }

    fn in_session(self, session: usize) -> Self {
        Self {
            slot: SlotRef::new(session, self.slot.time),
            ..self
        }
    }
}

/// What the mirror did with an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Value did not change
    Unchanged,
    /// Written to these cells in the other sessions
    Propagated(Vec<PricingCell>),
    /// Edit in a later session; the mirror is locked from now on
    LockedNow,
    /// Edit in a later session with the mirror already locked
    AlreadyLocked,
    /// Session 0 edit while the mirror is locked
    Suppressed,
}

/// Run mirror propagation for an edit already applied at `cell`
pub fn mirror_edit(
    venue: &mut Venue,
    cell: PricingCell,
    field: MirrorField,
    previous: &str,
    value: &str,
) -> Result<MirrorOutcome> {
    if field != MirrorField::VersionName && cell.tier.is_none() {
        return Err(Error::InvalidInput(format!("{:?} edits need a tier index", field)));
    }
    if previous == value {
        return Ok(MirrorOutcome::Unchanged);
    }

    if cell.slot.session > 0 {
        return Ok(if venue.lock_session_mirror() {
            debug!(
                "Session {} diverged from session 0; mirror locked for venue \"{}\"",
                cell.slot.session, venue.name
            );
            MirrorOutcome::LockedNow
        } else {
            MirrorOutcome::AlreadyLocked
        });
    }

    if venue.is_mirror_locked() {
        return Ok(MirrorOutcome::Suppressed);
    }

    let mut targets = Vec::new();
    for session in 1..venue.session_count() {
        let target = cell.in_session(session);
        venue.ensure_version(target.slot, target.version, target.tier)?;
        write_field(venue, target, field, value)?;
        if field == MirrorField::TierName && target.version == 0 {
            if let Some(tier) = target.tier {
                autofill::propagate_tier_name(venue, target.slot, tier, value)?;
            }
        }
        targets.push(target);
    }
    if !targets.is_empty() {
        debug!("Mirrored {:?} to {} session(s)", field, targets.len());
    }
    Ok(MirrorOutcome::Propagated(targets))
}

fn write_field(venue: &mut Venue, cell: PricingCell, field: MirrorField, value: &str) -> Result<()> {
    match (field, cell.tier) {
        (MirrorField::VersionName, _) => {
            venue.version_mut(cell.slot, cell.version)?.name = value.to_string();
        }
        (MirrorField::TierName, Some(tier)) => {
            venue.tier_mut(cell.slot, cell.version, tier)?.name = value.to_string();
        }
        (MirrorField::TierPrice, Some(tier)) => {
            venue.tier_mut(cell.slot, cell.version, tier)?.price = value.to_string();
        }
        (_, None) => {
            return Err(Error::InvalidInput(format!("{:?} edits need a tier index", field)));
        }
    }
    Ok(())
}
