//! Shared request/response types
//!
//! The nested venue records mirror the JSON the form endpoint stores:
//! venue → sessions → times → versions → tiers, with camelCase keys on the
//! time slot level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ========================================
// Gateway Actions
// ========================================

/// Gateway endpoint actions (`gateway.php?action=...`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatewayAction {
    /// Read the admin document (settings, messages, checkout, venues)
    GetAdminSettings,
    /// Write flat settings, messages, or checkout options
    SaveAdminSettings,
    /// Write nested form data (venues)
    SaveForm,
}

impl GatewayAction {
    /// Query-string value for this action
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayAction::GetAdminSettings => "get-admin-settings",
            GatewayAction::SaveAdminSettings => "save-admin-settings",
            GatewayAction::SaveForm => "save-form",
        }
    }
}

/// Response to every write request
///
/// # Examples
///
/// ```
/// use funmap_common::api::types::SaveResponse;
///
/// let ok: SaveResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
/// assert!(ok.success);
/// assert!(ok.message.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveResponse {
    pub fn ok() -> Self {
        Self { success: true, message: None }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Document returned by the load request
///
/// Consumed once at initialisation to seed registry baselines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadDocument {
    /// Flat key → value settings (`website_currency`, `admin_autosave`, map options...)
    #[serde(default)]
    pub settings: Map<String, Value>,

    /// Free-text message catalog, message key → text
    #[serde(default)]
    pub messages: BTreeMap<String, String>,

    /// Checkout pricing options
    #[serde(default)]
    pub checkout_options: Vec<CheckoutOption>,

    /// Nested venue/session/pricing trees
    #[serde(default)]
    pub venues: Vec<VenueRecord>,
}

// ========================================
// Venue / Pricing Records
// ========================================

/// Map coordinates of a venue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Reference to the map feature a venue was picked from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

/// Venue as stored by the form endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub feature: Option<FeatureRef>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

/// Session (one date) of a venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// `None` until a date has been chosen
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub times: Vec<TimeSlotRecord>,
}

/// Time slot of a session, with its pricing inline
///
/// A slot that shares pricing with its reference slot still carries the
/// (shared) versions inline, so the record is self-contained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRecord {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub same_pricing_as_above: bool,
    #[serde(default)]
    pub same_pricing_source_index: u32,
    #[serde(default)]
    pub tier_autofill_locked: bool,
    #[serde(default)]
    pub versions: Vec<Version>,
}

/// Seating area: a named group of pricing tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

impl Default for Version {
    /// One unnamed version holding one empty tier
    fn default() -> Self {
        Self {
            name: String::new(),
            tiers: vec![Tier::default()],
        }
    }
}

/// Named price point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub name: String,
    /// Currency code; empty means unset
    #[serde(default)]
    pub currency: String,
    /// Decimal-formatted price text; empty means unset
    #[serde(default)]
    pub price: String,
}

// ========================================
// Checkout Options
// ========================================

/// Checkout pricing option offered to posting members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutOption {
    pub id: String,
    #[serde(rename = "checkout_title", default)]
    pub title: String,
    #[serde(rename = "checkout_description", default)]
    pub description: String,
    #[serde(rename = "checkout_flagfall_price", default)]
    pub flagfall_price: f64,
    #[serde(rename = "checkout_basic_day_rate", default)]
    pub basic_day_rate: Option<f64>,
    #[serde(rename = "checkout_discount_day_rate", default)]
    pub discount_day_rate: Option<f64>,
    #[serde(rename = "checkout_featured", default, with = "int_bool")]
    pub featured: bool,
    #[serde(rename = "checkout_sidebar_ad", default, with = "int_bool")]
    pub sidebar_ad: bool,
    #[serde(default, with = "int_bool")]
    pub hidden: bool,
}

/// Flags travel as 0/1 integers
mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => matches!(s.trim(), "1" | "true"),
            _ => false,
        })
    }
}

// ========================================
// Tests
// ========================================
