//! Checkout options component and price calculator
//!
//! Tracked as the `checkout_options` composite. Snapshots carry money values
//! rounded to cents, so a price typed as `10` and one typed as `10.001`
//! compare equal once formatted.

use crate::registry::Capturable;
use crate::session::ChangeNotifier;
use funmap_common::api::CheckoutOption;
use funmap_common::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;

pub const CHECKOUT_FIELD: &str = "checkout_options";

/// Days from which the discount day rate replaces the basic rate
pub const DISCOUNT_THRESHOLD_DAYS: f64 = 365.0;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn check_amount(value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("{} is not a valid amount", value)))
    }
}

pub struct CheckoutCatalog {
    options: RwLock<Vec<CheckoutOption>>,
    currency: String,
    notifier: ChangeNotifier,
}

impl CheckoutCatalog {
    /// # Errors
    ///
    /// `MissingContext` when `site_currency` is blank.
    pub fn new(options: Vec<CheckoutOption>, site_currency: &str, notifier: ChangeNotifier) -> Result<Self> {
        let currency = site_currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(Error::MissingContext("checkout options need a site currency".to_string()));
        }
        Ok(Self {
            options: RwLock::new(options),
            currency,
            notifier,
        })
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn options(&self) -> Vec<CheckoutOption> {
        self.options.read().clone()
    }

    pub fn option(&self, id: &str) -> Option<CheckoutOption> {
        self.options.read().iter().find(|option| option.id == id).cloned()
    }

    /// Apply an edit to one option and notify
    pub fn update<F>(&self, id: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut CheckoutOption) -> Result<()>,
    {
        {
            let mut options = self.options.write();
            let option = options
                .iter_mut()
                .find(|option| option.id == id)
                .ok_or_else(|| Error::NotFound(format!("checkout option \"{}\"", id)))?;
            edit(option)?;
        }
        self.notifier.notify();
        Ok(())
    }

    pub fn set_title(&self, id: &str, title: &str) -> Result<()> {
        self.update(id, |option| {
            option.title = title.to_string();
            Ok(())
        })
    }

    pub fn set_description(&self, id: &str, description: &str) -> Result<()> {
        self.update(id, |option| {
            option.description = description.to_string();
            Ok(())
        })
    }

    pub fn set_flagfall_price(&self, id: &str, price: f64) -> Result<()> {
        let price = check_amount(price)?;
        self.update(id, |option| {
            option.flagfall_price = price;
            Ok(())
        })
    }

    pub fn set_basic_day_rate(&self, id: &str, rate: Option<f64>) -> Result<()> {
        let rate = rate.map(check_amount).transpose()?;
        self.update(id, |option| {
            option.basic_day_rate = rate;
            Ok(())
        })
    }

    pub fn set_discount_day_rate(&self, id: &str, rate: Option<f64>) -> Result<()> {
        let rate = rate.map(check_amount).transpose()?;
        self.update(id, |option| {
            option.discount_day_rate = rate;
            Ok(())
        })
    }

    pub fn add_option(&self, id: &str, title: &str) -> Result<()> {
        {
            let mut options = self.options.write();
            if options.iter().any(|option| option.id == id) {
                return Err(Error::InvalidInput(format!("checkout option \"{}\" already exists", id)));
            }
            options.push(CheckoutOption {
                id: id.to_string(),
                title: title.to_string(),
                description: String::new(),
                flagfall_price: 0.0,
                basic_day_rate: None,
                discount_day_rate: None,
                featured: false,
                sidebar_ad: false,
                hidden: false,
            });
        }
        self.notifier.notify();
        Ok(())
    }

    pub fn remove_option(&self, id: &str) -> Result<()> {
        {
            let mut options = self.options.write();
            let before = options.len();
            options.retain(|option| option.id != id);
            if options.len() == before {
                return Err(Error::NotFound(format!("checkout option \"{}\"", id)));
            }
        }
        self.notifier.notify();
        Ok(())
    }

    /// Price an option with the site currency
    pub fn quote(&self, id: &str, request: &QuoteRequest) -> Result<Quote> {
        let option = self
            .option(id)
            .ok_or_else(|| Error::NotFound(format!("checkout option \"{}\"", id)))?;
        quote(&option, request, &self.currency)
    }
}

impl Capturable for CheckoutCatalog {
    fn capture(&self) -> Value {
        let rounded: Vec<CheckoutOption> = self
            .options
            .read()
            .iter()
            .map(|option| CheckoutOption {
                flagfall_price: round_cents(option.flagfall_price),
                basic_day_rate: option.basic_day_rate.map(round_cents),
                discount_day_rate: option.discount_day_rate.map(round_cents),
                ..option.clone()
            })
            .collect();
        serde_json::to_value(&rounded).unwrap_or_else(|e| {
            tracing::error!("Failed to capture checkout options: {}", e);
            Value::Null
        })
    }

    fn restore(&self, snapshot: &Value) -> Result<()> {
        let restored: Vec<CheckoutOption> = serde_json::from_value(snapshot.clone())?;
        *self.options.write() = restored;
        Ok(())
    }
}

/// Calculator inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteRequest {
    pub days: f64,
    /// Values below 1 count as 1
    pub locations: u32,
    pub surcharge_percent: f64,
}

/// Calculated listing price
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub currency: String,
    pub total: f64,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.total)
    }
}

/// Price a listing under `option`
///
/// - `days <= 0` costs nothing
/// - the day rate is the discount rate from [`DISCOUNT_THRESHOLD_DAYS`], the
///   basic rate below it; a missing rate contributes nothing
/// - each extra location is charged the discount rate per day
/// - the surcharge applies to the variable part, never the flagfall
///
/// # Errors
///
/// - `MissingContext` for a blank currency
/// - `Validation` when more than one location is requested and the option
///   has no discount day rate
pub fn quote(option: &CheckoutOption, request: &QuoteRequest, currency: &str) -> Result<Quote> {
    let currency = currency.trim().to_uppercase();
    if currency.is_empty() {
        return Err(Error::MissingContext("checkout calculator needs a site currency".to_string()));
    }

    let days = if request.days.is_finite() { request.days } else { 0.0 };
    if days <= 0.0 {
        return Ok(Quote { currency, total: 0.0 });
    }

    let locations = request.locations.max(1);
    let surcharge = if request.surcharge_percent.is_finite() {
        request.surcharge_percent
    } else {
        0.0
    };

    let day_rate = if days >= DISCOUNT_THRESHOLD_DAYS {
        option.discount_day_rate
    } else {
        option.basic_day_rate
    };
    let extra_location_rate = match (locations > 1, option.discount_day_rate) {
        (true, None) => {
            return Err(Error::Validation(
                "Discount day rate is required when locations > 1".to_string(),
            ))
        }
        (true, Some(rate)) => rate,
        (false, _) => 0.0,
    };

    let duration_charge = day_rate.map_or(0.0, |rate| rate * days);
    let extra_location_charge = f64::from(locations - 1) * extra_location_rate * days;
    let variable = duration_charge + extra_location_charge;
    let total = option.flagfall_price + variable * (1.0 + surcharge / 100.0);

    Ok(Quote { currency, total })
}
