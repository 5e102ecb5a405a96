//! Flat settings: field ids, save routing, and typed readers

use funmap_common::{Error, Result};
use serde_json::{Map, Value};

/// Registry prefix for values loaded from the settings map
pub const SETTINGS_PREFIX: &str = "settings.";

/// Prefixes whose fields are written by the settings request, prefix stripped
const ROUTED_PREFIXES: [&str; 3] = [SETTINGS_PREFIX, "map.", "checkout."];

/// Prefix of image fields, grouped under `system_images` in the request
pub const SYSTEM_IMAGES_PREFIX: &str = "system_images.";

pub const SITE_CURRENCY_KEY: &str = "website_currency";
pub const AUTOSAVE_KEY: &str = "admin_autosave";

/// Registry id of the autosave preference
pub const AUTOSAVE_FIELD: &str = "settings.admin_autosave";

pub fn setting_field_id(key: &str) -> String {
    format!("{}{}", SETTINGS_PREFIX, key)
}

/// Where a simple field lands in the settings request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingTarget<'a> {
    Setting(&'a str),
    SystemImage(&'a str),
}

/// Route a simple field id; `None` if the settings request does not carry it
pub fn route(field_id: &str) -> Option<SettingTarget<'_>> {
    if let Some(name) = field_id.strip_prefix(SYSTEM_IMAGES_PREFIX) {
        return Some(SettingTarget::SystemImage(name));
    }
    ROUTED_PREFIXES
        .iter()
        .find_map(|prefix| field_id.strip_prefix(prefix))
        .map(SettingTarget::Setting)
}

/// Body of the settings request for a set of changed simple fields
///
/// Returns the body and the ids of the fields it covers; unroutable fields
/// are left out.
pub fn settings_body(changes: &[(String, Value)]) -> (Value, Vec<String>) {
    let mut body = Map::new();
    let mut images = Map::new();
    let mut covered = Vec::new();

    for (id, value) in changes {
        match route(id) {
            Some(SettingTarget::Setting(key)) => {
                body.insert(key.to_string(), value.clone());
            }
            Some(SettingTarget::SystemImage(name)) => {
                images.insert(name.to_string(), value.clone());
            }
            None => continue,
        }
        covered.push(id.clone());
    }
    if !images.is_empty() {
        body.insert("system_images".to_string(), Value::Object(images));
    }
    (Value::Object(body), covered)
}

/// Site currency code, required by the pricing and checkout components
///
/// # Errors
///
/// `MissingContext` when the setting is absent or blank. No fallback is used.
pub fn require_site_currency(settings: &Map<String, Value>) -> Result<String> {
    settings
        .get(SITE_CURRENCY_KEY)
        .and_then(Value::as_str)
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| Error::MissingContext(format!("setting \"{}\" is not configured", SITE_CURRENCY_KEY)))
}

/// Loose boolean: `true`, non-zero numbers, and `1`/`true`/`yes`/`on` text
pub fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_prefixes() {
        assert_eq!(route("settings.website_name"), Some(SettingTarget::Setting("website_name")));
        assert_eq!(route("map.start_zoom"), Some(SettingTarget::Setting("start_zoom")));
        assert_eq!(route("checkout.terms"), Some(SettingTarget::Setting("terms")));
        assert_eq!(route("system_images.logo"), Some(SettingTarget::SystemImage("logo")));
        assert_eq!(route("field.12"), None);
    }

    #[test]
    fn test_settings_body_groups_images() {
        let changes = vec![
            ("settings.website_name".to_string(), json!("Funmap")),
            ("system_images.logo".to_string(), json!("logo.png")),
            ("field.3".to_string(), json!("x")),
        ];
        let (body, covered) = settings_body(&changes);
        assert_eq!(body, json!({"website_name": "Funmap", "system_images": {"logo": "logo.png"}}));
        assert_eq!(covered, vec!["settings.website_name", "system_images.logo"]);
    }

    #[test]
    fn test_require_site_currency() {
        let mut settings = Map::new();
        assert!(matches!(require_site_currency(&settings), Err(Error::MissingContext(_))));

        settings.insert(SITE_CURRENCY_KEY.to_string(), json!("  "));
        assert!(require_site_currency(&settings).is_err());

        settings.insert(SITE_CURRENCY_KEY.to_string(), json!(" aud "));
        assert_eq!(require_site_currency(&settings).unwrap(), "AUD");
    }

    #[test]
    fn test_parse_bool() {
        for truthy in [json!(true), json!(1), json!("1"), json!("TRUE"), json!("yes"), json!(" on ")] {
            assert!(parse_bool(&truthy), "{truthy} should be true");
        }
        for falsy in [json!(false), json!(0), json!("0"), json!("no"), json!(null), json!("")] {
            assert!(!parse_bool(&falsy), "{falsy} should be false");
        }
    }
}
