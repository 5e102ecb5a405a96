//! Venue tree with aliased pricing containers
//!
//! Pricing (`Vec<Version>`) lives in a per-venue arena. Each time slot holds a
//! [`PricingLink`] into it:
//!
//! - `Owned(id)`: the slot's private container
//! - `Shared(id)`: the container of the slot's reference slot
//!   ("same pricing as above")
//!
//! Two slots linked to the same id observe every mutation made through either
//! of them. A private copy is only made at the explicit detach transition
//! (see [`crate::autofill::set_same_pricing_as_above`]).
//!
//! A `Shared` link always names its reference slot's current container, so
//! chains of shared slots follow their reference through detaches and
//! removals, exactly as [`Venue::from_record`] would rebuild them.

use funmap_common::api::types::{
    FeatureRef, Location, SessionRecord, Tier, TimeSlotRecord, VenueRecord, Version,
};
use funmap_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Key of a pricing container in a venue's arena
pub type PricingId = u32;

/// How a time slot reaches its versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingLink {
    /// Slot owns this container
    Owned(PricingId),
    /// Slot aliases its reference slot's container
    Shared(PricingId),
}

impl PricingLink {
    pub fn id(self) -> PricingId {
        match self {
            PricingLink::Owned(id) | PricingLink::Shared(id) => id,
        }
    }

    pub fn is_shared(self) -> bool {
        matches!(self, PricingLink::Shared(_))
    }
}

/// Tier-name template state of one time slot
///
/// `Unlocked → Locked` happens on a divergent edit. The only way back is the
/// shared → private detach of the slot's pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierAutofill {
    #[default]
    Unlocked,
    Locked,
}

impl TierAutofill {
    pub fn is_locked(self) -> bool {
        self == TierAutofill::Locked
    }

    fn from_flag(locked: bool) -> Self {
        if locked {
            TierAutofill::Locked
        } else {
            TierAutofill::Unlocked
        }
    }
}

/// Session mirror state of a venue; `Locked` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMirror {
    #[default]
    Active,
    Locked,
}

/// Position of a time slot: session index, then time index within the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef {
    pub session: usize,
    pub time: usize,
}

impl SlotRef {
    pub const fn new(session: usize, time: usize) -> Self {
        Self { session, time }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlot {
    /// HH:MM text
    pub time: String,
    /// Reserved index into the reference set; always 0 today
    pub same_pricing_source_index: u32,
    pub(crate) autofill: TierAutofill,
    pub(crate) pricing: PricingLink,
}

impl TimeSlot {
    pub fn autofill(&self) -> TierAutofill {
        self.autofill
    }

    pub fn pricing(&self) -> PricingLink {
        self.pricing
    }

    pub fn same_pricing_as_above(&self) -> bool {
        self.pricing.is_shared()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// `None` until a date is chosen
    pub date: Option<String>,
    pub(crate) times: Vec<TimeSlot>,
}

impl Session {
    pub fn times(&self) -> &[TimeSlot] {
        &self.times
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PricingArena {
    containers: BTreeMap<PricingId, Vec<Version>>,
    next_id: PricingId,
}

impl PricingArena {
    fn insert(&mut self, versions: Vec<Version>) -> PricingId {
        let id = self.next_id;
        self.next_id += 1;
        self.containers.insert(id, versions);
        id
    }

    fn get(&self, id: PricingId) -> Result<&Vec<Version>> {
        self.containers
            .get(&id)
            .ok_or_else(|| Error::Internal(format!("dangling pricing container {}", id)))
    }

    fn get_mut(&mut self, id: PricingId) -> Result<&mut Vec<Version>> {
        self.containers
            .get_mut(&id)
            .ok_or_else(|| Error::Internal(format!("dangling pricing container {}", id)))
    }

    /// Deep copy of a container under a fresh id
    fn duplicate(&mut self, id: PricingId) -> Result<PricingId> {
        let copy = self.get(id)?.clone();
        Ok(self.insert(copy))
    }

    fn retain(&mut self, live: &BTreeSet<PricingId>) -> usize {
        let before = self.containers.len();
        self.containers.retain(|id, _| live.contains(id));
        before - self.containers.len()
    }
}

/// Editable venue
///
/// Invariants: at least one session, every session at least one time slot,
/// every pricing container at least one version, every version at least one
/// tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Venue {
    pub name: String,
    pub address: String,
    pub location: Option<Location>,
    pub feature: Option<FeatureRef>,
    sessions: Vec<Session>,
    pricing: PricingArena,
    mirror: SessionMirror,
}

impl Venue {
    /// New venue with one session holding one empty time slot
    pub fn new(name: impl Into<String>) -> Self {
        let mut venue = Self::empty(name.into(), String::new(), None, None);
        let slot = venue.fresh_slot(vec![Version::default()]);
        venue.sessions.push(Session {
            date: None,
            times: vec![slot],
        });
        venue
    }

    fn empty(
        name: String,
        address: String,
        location: Option<Location>,
        feature: Option<FeatureRef>,
    ) -> Self {
        Self {
            name,
            address,
            location,
            feature,
            sessions: Vec::new(),
            pricing: PricingArena::default(),
            mirror: SessionMirror::Active,
        }
    }

    fn fresh_slot(&mut self, versions: Vec<Version>) -> TimeSlot {
        TimeSlot {
            time: String::new(),
            same_pricing_source_index: 0,
            autofill: TierAutofill::Unlocked,
            pricing: PricingLink::Owned(self.pricing.insert(versions)),
        }
    }

    /// Build from a stored record, re-establishing pricing aliases
    ///
    /// A slot flagged `samePricingAsAbove` links to its reference slot's
    /// container; its inline copy of the versions is dropped. Empty levels are
    /// filled with defaults so the invariants hold. The mirror starts active.
    pub fn from_record(record: VenueRecord) -> Self {
        let mut venue = Self::empty(record.name, record.address, record.location, record.feature);

        for session_record in record.sessions {
            let session_index = venue.sessions.len();
            venue.sessions.push(Session {
                date: session_record.date,
                times: Vec::new(),
            });

            for slot_record in session_record.times {
                let at = SlotRef::new(session_index, venue.sessions[session_index].times.len());
                let shared_with = if slot_record.same_pricing_as_above {
                    venue
                        .reference_slot(at)
                        .and_then(|reference| venue.slot(reference).ok())
                        .map(|reference| reference.pricing.id())
                } else {
                    None
                };

                let pricing = match shared_with {
                    Some(id) => PricingLink::Shared(id),
                    None => PricingLink::Owned(venue.pricing.insert(complete_versions(slot_record.versions))),
                };
                venue.sessions[session_index].times.push(TimeSlot {
                    time: slot_record.time,
                    same_pricing_source_index: slot_record.same_pricing_source_index,
                    autofill: TierAutofill::from_flag(slot_record.tier_autofill_locked),
                    pricing,
                });
            }

            if venue.sessions[session_index].times.is_empty() {
                let slot = venue.fresh_slot(vec![Version::default()]);
                venue.sessions[session_index].times.push(slot);
            }
        }

        if venue.sessions.is_empty() {
            let slot = venue.fresh_slot(vec![Version::default()]);
            venue.sessions.push(Session {
                date: None,
                times: vec![slot],
            });
        }
        venue
    }

    /// Stored form; shared slots carry a copy of the shared versions inline
    pub fn to_record(&self) -> VenueRecord {
        VenueRecord {
            name: self.name.clone(),
            address: self.address.clone(),
            location: self.location,
            feature: self.feature.clone(),
            sessions: self
                .sessions
                .iter()
                .map(|session| SessionRecord {
                    date: session.date.clone(),
                    times: session
                        .times
                        .iter()
                        .map(|slot| TimeSlotRecord {
                            time: slot.time.clone(),
                            same_pricing_as_above: slot.pricing.is_shared(),
                            same_pricing_source_index: slot.same_pricing_source_index,
                            tier_autofill_locked: slot.autofill.is_locked(),
                            versions: self
                                .pricing
                                .get(slot.pricing.id())
                                .map(Clone::clone)
                                .unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    // ========================================
    // Navigation
    // ========================================

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, index: usize) -> Result<&Session> {
        self.sessions
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("session {}", index)))
    }

    pub fn session_mut(&mut self, index: usize) -> Result<&mut Session> {
        self.sessions
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("session {}", index)))
    }

    pub fn slot(&self, at: SlotRef) -> Result<&TimeSlot> {
        self.session(at.session)?
            .times
            .get(at.time)
            .ok_or_else(|| Error::NotFound(format!("time slot {}/{}", at.session, at.time)))
    }

    pub fn slot_mut(&mut self, at: SlotRef) -> Result<&mut TimeSlot> {
        self.session_mut(at.session)?
            .times
            .get_mut(at.time)
            .ok_or_else(|| Error::NotFound(format!("time slot {}/{}", at.session, at.time)))
    }

    /// Slot whose pricing "same as above" refers to; `None` for slot 0 of session 0
    ///
    /// A later slot refers to the first slot of its session. The first slot of a
    /// later session refers to the slot at the same position in session 0,
    /// falling back to session 0's first slot.
    pub fn reference_slot(&self, at: SlotRef) -> Option<SlotRef> {
        if at.time > 0 {
            return Some(SlotRef::new(at.session, 0));
        }
        if at.session > 0 {
            let first = self.sessions.first()?;
            let time = if at.time < first.times.len() { at.time } else { 0 };
            return Some(SlotRef::new(0, time));
        }
        None
    }

    /// Versions visible through a slot (its own or the shared container)
    pub fn versions(&self, at: SlotRef) -> Result<&[Version]> {
        let id = self.slot(at)?.pricing.id();
        Ok(self.pricing.get(id)?.as_slice())
    }

    pub(crate) fn versions_mut(&mut self, at: SlotRef) -> Result<&mut Vec<Version>> {
        let id = self.slot(at)?.pricing.id();
        self.pricing.get_mut(id)
    }

    pub fn version(&self, at: SlotRef, version: usize) -> Result<&Version> {
        self.versions(at)?
            .get(version)
            .ok_or_else(|| Error::NotFound(format!("version {} of slot {}/{}", version, at.session, at.time)))
    }

    pub fn version_mut(&mut self, at: SlotRef, version: usize) -> Result<&mut Version> {
        self.versions_mut(at)?
            .get_mut(version)
            .ok_or_else(|| Error::NotFound(format!("version {} of slot {}/{}", version, at.session, at.time)))
    }

    pub fn tier(&self, at: SlotRef, version: usize, tier: usize) -> Result<&Tier> {
        self.version(at, version)?
            .tiers
            .get(tier)
            .ok_or_else(|| Error::NotFound(format!("tier {} of version {}", tier, version)))
    }

    pub fn tier_mut(&mut self, at: SlotRef, version: usize, tier: usize) -> Result<&mut Tier> {
        self.version_mut(at, version)?
            .tiers
            .get_mut(tier)
            .ok_or_else(|| Error::NotFound(format!("tier {} of version {}", tier, version)))
    }

    /// Whether two slots currently observe the same pricing container
    pub fn shares_pricing(&self, a: SlotRef, b: SlotRef) -> Result<bool> {
        Ok(self.slot(a)?.pricing.id() == self.slot(b)?.pricing.id())
    }

    // ========================================
    // Mirror lock
    // ========================================

    pub fn mirror(&self) -> SessionMirror {
        self.mirror
    }

    pub fn is_mirror_locked(&self) -> bool {
        self.mirror == SessionMirror::Locked
    }

    /// Lock the session mirror; returns true if it was active until now
    pub fn lock_session_mirror(&mut self) -> bool {
        let was_active = self.mirror == SessionMirror::Active;
        self.mirror = SessionMirror::Locked;
        was_active
    }

    // ========================================
    // Pricing arena plumbing
    // ========================================

    pub(crate) fn duplicate_pricing(&mut self, id: PricingId) -> Result<PricingId> {
        self.pricing.duplicate(id)
    }

    /// Grow session `session` up to `time` with default slots
    pub(crate) fn ensure_slot(&mut self, at: SlotRef) -> Result<()> {
        let missing = self.session(at.session)?.times.len();
        for _ in missing..=at.time {
            let slot = self.fresh_slot(vec![Version::default()]);
            self.sessions[at.session].times.push(slot);
        }
        Ok(())
    }

    /// Grow a slot's versions (and the tiers of `version`) with defaults
    pub(crate) fn ensure_version(&mut self, at: SlotRef, version: usize, tier: Option<usize>) -> Result<()> {
        self.ensure_slot(at)?;
        let versions = self.versions_mut(at)?;
        while versions.len() <= version {
            versions.push(Version::default());
        }
        if let Some(tier) = tier {
            let tiers = &mut versions[version].tiers;
            while tiers.len() <= tier {
                tiers.push(Tier::default());
            }
        }
        Ok(())
    }

    /// Drop containers no slot links to; returns how many were released
    pub(crate) fn prune_pricing(&mut self) -> usize {
        let live: BTreeSet<PricingId> = self
            .sessions
            .iter()
            .flat_map(|session| session.times.iter().map(|slot| slot.pricing.id()))
            .collect();
        let released = self.pricing.retain(&live);
        if released > 0 {
            debug!("Released {} unreferenced pricing container(s)", released);
        }
        released
    }

    pub(crate) fn container_count(&self) -> usize {
        self.pricing.containers.len()
    }

    // ========================================
    // Structural edits
    // ========================================

    /// Append a session and return its index
    ///
    /// While the mirror is active the new session copies session 0's slot
    /// times and a private copy of each slot's pricing.
    pub fn add_session(&mut self) -> Result<usize> {
        let template: Vec<(String, PricingId)> = match (self.mirror, self.sessions.first()) {
            (SessionMirror::Active, Some(first)) => first
                .times
                .iter()
                .map(|slot| (slot.time.clone(), slot.pricing.id()))
                .collect(),
            _ => Vec::new(),
        };

        let mut times = Vec::with_capacity(template.len().max(1));
        for (time, id) in template {
            let copy = self.pricing.duplicate(id)?;
            times.push(TimeSlot {
                time,
                same_pricing_source_index: 0,
                autofill: TierAutofill::Unlocked,
                pricing: PricingLink::Owned(copy),
            });
        }
        if times.is_empty() {
            times.push(self.fresh_slot(vec![Version::default()]));
        }

        self.sessions.push(Session { date: None, times });
        Ok(self.sessions.len() - 1)
    }

    pub fn remove_session(&mut self, index: usize) -> Result<()> {
        self.session(index)?;
        if self.sessions.len() == 1 {
            return Err(Error::InvalidInput("a venue keeps at least one session".to_string()));
        }
        self.sessions.remove(index);
        self.normalize()
    }

    /// Append an empty time slot to a session
    pub fn add_time_slot(&mut self, session: usize) -> Result<SlotRef> {
        self.session(session)?;
        let slot = self.fresh_slot(vec![Version::default()]);
        let times = &mut self.sessions[session].times;
        times.push(slot);
        Ok(SlotRef::new(session, times.len() - 1))
    }

    pub fn remove_time_slot(&mut self, at: SlotRef) -> Result<()> {
        self.slot(at)?;
        if self.sessions[at.session].times.len() == 1 {
            return Err(Error::InvalidInput("a session keeps at least one time slot".to_string()));
        }
        self.sessions[at.session].times.remove(at.time);
        self.normalize()
    }

    /// Append a version to a slot's container (visible through every alias)
    pub fn push_version(&mut self, at: SlotRef, version: Version) -> Result<usize> {
        let versions = self.versions_mut(at)?;
        versions.push(complete_version(version));
        Ok(versions.len() - 1)
    }

    pub fn remove_version(&mut self, at: SlotRef, version: usize) -> Result<()> {
        let versions = self.versions_mut(at)?;
        if version >= versions.len() {
            return Err(Error::NotFound(format!("version {}", version)));
        }
        if versions.len() == 1 {
            return Err(Error::InvalidInput("a time slot keeps at least one version".to_string()));
        }
        versions.remove(version);
        Ok(())
    }

    /// Append a tier priced in `currency`
    pub fn add_tier(&mut self, at: SlotRef, version: usize, currency: &str) -> Result<usize> {
        let tiers = &mut self.version_mut(at, version)?.tiers;
        tiers.push(Tier {
            currency: currency.to_string(),
            ..Tier::default()
        });
        Ok(tiers.len() - 1)
    }

    pub fn remove_tier(&mut self, at: SlotRef, version: usize, tier: usize) -> Result<()> {
        let tiers = &mut self.version_mut(at, version)?.tiers;
        if tier >= tiers.len() {
            return Err(Error::NotFound(format!("tier {}", tier)));
        }
        if tiers.len() == 1 {
            return Err(Error::InvalidInput("a version keeps at least one tier".to_string()));
        }
        tiers.remove(tier);
        Ok(())
    }

    /// Re-establish the pricing invariants after a link changed or a slot went away
    ///
    /// Slot 0 of session 0 has no reference, so if it was sharing it gets a
    /// private copy and its template unlocks. Every other shared slot is
    /// re-pointed at its reference's container. Unreferenced containers are
    /// released.
    pub(crate) fn normalize(&mut self) -> Result<()> {
        let first = SlotRef::new(0, 0);
        if let PricingLink::Shared(id) = self.slot(first)?.pricing {
            let copy = self.pricing.duplicate(id)?;
            let slot = self.slot_mut(first)?;
            slot.pricing = PricingLink::Owned(copy);
            slot.autofill = TierAutofill::Unlocked;
            debug!("First time slot lost its reference; detached its pricing");
        }
        self.relink_shared();
        self.prune_pricing();
        Ok(())
    }

    /// Point every shared slot at its reference slot's current container
    ///
    /// References always precede the slots that use them (same session's first
    /// slot, or session 0), so one pass in order settles whole chains.
    fn relink_shared(&mut self) -> usize {
        let mut relinked = 0;
        for session in 0..self.sessions.len() {
            for time in 0..self.sessions[session].times.len() {
                let PricingLink::Shared(id) = self.sessions[session].times[time].pricing else {
                    continue;
                };
                let Some(target) = self
                    .reference_slot(SlotRef::new(session, time))
                    .and_then(|reference| self.slot(reference).ok())
                    .map(|reference| reference.pricing.id())
                else {
                    continue;
                };
                if target != id {
                    self.sessions[session].times[time].pricing = PricingLink::Shared(target);
                    relinked += 1;
                }
            }
        }
        if relinked > 0 {
            debug!("Re-pointed {} shared slot(s) at their reference pricing", relinked);
        }
        relinked
    }
}

fn complete_version(mut version: Version) -> Version {
    if version.tiers.is_empty() {
        version.tiers.push(Tier::default());
    }
    version
}

fn complete_versions(versions: Vec<Version>) -> Vec<Version> {
    let mut versions: Vec<Version> = versions.into_iter().map(complete_version).collect();
    if versions.is_empty() {
        versions.push(Version::default());
    }
    versions
}
