//! Loaded-document fixtures

use super::ScriptedGateway;
use funmap_admin::{AdminSession, Workspace};
use funmap_common::api::{
    CheckoutOption, LoadDocument, SessionRecord, Tier, TimeSlotRecord, VenueRecord, Version,
};
use funmap_common::events::EditorEvent;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Starting name of every tier in the fixture venue
pub const TIER: &str = "General";

fn session_record(date: &str) -> SessionRecord {
    SessionRecord {
        date: Some(date.to_string()),
        times: vec![TimeSlotRecord {
            time: "19:30".to_string(),
            versions: vec![Version {
                name: "Stalls".to_string(),
                tiers: vec![Tier {
                    name: TIER.to_string(),
                    currency: "AUD".to_string(),
                    price: "25.00".to_string(),
                }],
            }],
            ..TimeSlotRecord::default()
        }],
    }
}

/// Admin document: autosave off, one venue with two sessions
pub fn document() -> LoadDocument {
    let settings = json!({
        "website_name": "Funmap",
        "website_currency": "AUD",
        "admin_autosave": "false",
    });

    let mut messages = BTreeMap::new();
    messages.insert("msg_admin_saved".to_string(), "Saved".to_string());
    messages.insert("msg_admin_discarded".to_string(), "Changes discarded".to_string());

    LoadDocument {
        settings: settings.as_object().cloned().unwrap_or_default(),
        messages,
        checkout_options: vec![CheckoutOption {
            id: "standard".to_string(),
            title: "Standard".to_string(),
            description: String::new(),
            flagfall_price: 10.0,
            basic_day_rate: Some(1.0),
            discount_day_rate: Some(0.5),
            featured: false,
            sidebar_ad: false,
            hidden: false,
        }],
        venues: vec![VenueRecord {
            name: "Town Hall".to_string(),
            address: "1 Main St".to_string(),
            sessions: vec![session_record("2026-03-01"), session_record("2026-03-02")],
            ..VenueRecord::default()
        }],
    }
}

pub fn session_over(gateway: Arc<ScriptedGateway>) -> AdminSession {
    AdminSession::new(gateway, Duration::from_millis(800), 64)
}

/// Session with `document` installed through the gateway
pub async fn loaded_session(document: LoadDocument) -> (AdminSession, Workspace, Arc<ScriptedGateway>) {
    let gateway = Arc::new(ScriptedGateway::new(document));
    loaded_over(gateway).await
}

pub async fn loaded_over(gateway: Arc<ScriptedGateway>) -> (AdminSession, Workspace, Arc<ScriptedGateway>) {
    let session = session_over(gateway.clone());
    let workspace = session.load().await.expect("load");
    (session, workspace, gateway)
}

/// Events received so far
pub fn drain_events(rx: &mut broadcast::Receiver<EditorEvent>) -> Vec<EditorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
