//! Declarative delivery configuration: which days and time ranges each city
//! offers per fulfillment method, plus the strings the schedule renders.

use std::collections::HashMap;
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::config::{read_json, ConfigError};
use crate::schedule::engine::FulfillmentMethod;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MethodSchedule {
    /// Days from today of the first offered date.
    #[validate(range(min = 0, max = 30))]
    pub first_day_offset: i64,
    #[validate(range(min = 1, max = 31))]
    pub days: u32,
    #[validate(length(min = 1))]
    pub time_ranges: Vec<String>,
}

impl Default for MethodSchedule {
    fn default() -> Self { Self { first_day_offset: 0, days: 1, time_ranges: Vec::new() } }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CitySchedule {
    #[validate]
    pub courier: MethodSchedule,
    #[validate]
    pub pickup: MethodSchedule,
}

impl CitySchedule {
    pub fn for_method(&self, method: FulfillmentMethod) -> &MethodSchedule {
        match method { FulfillmentMethod::Courier => &self.courier, FulfillmentMethod::Pickup => &self.pickup }
    }
}

impl Default for CitySchedule {
    fn default() -> Self {
        Self {
            courier: MethodSchedule {
                first_day_offset: 1,
                days: 6,
                time_ranges: ["09:00-12:00", "12:00-15:00", "15:00-18:00", "18:00-21:00"].map(String::from).to_vec(),
            },
            pickup: MethodSchedule { first_day_offset: 0, days: 7, time_ranges: vec!["9:00 AM - 9:00 PM".to_string()] },
        }
    }
}

/// Shopper-facing strings; the place to localize the schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleLabels {
    pub today: String,
    pub tomorrow: String,
    /// strftime pattern for dates past tomorrow.
    pub date_format: String,
    pub courier_title: String,
    pub pickup_title: String,
    pub courier_placeholder: String,
    pub pickup_placeholder: String,
}

impl Default for ScheduleLabels {
    fn default() -> Self {
        Self {
            today: "Today".to_string(),
            tomorrow: "Tomorrow".to_string(),
            date_format: "%a, %b %-d".to_string(),
            courier_title: "Delivery time".to_string(),
            pickup_title: "Pickup time".to_string(),
            courier_placeholder: "Choose a delivery time".to_string(),
            pickup_placeholder: "Choose a pickup time".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeliveryConfiguration {
    /// IANA zone name of the store, e.g. `Africa/Lagos`.
    pub time_zone: Tz,
    pub labels: ScheduleLabels,
    #[validate]
    pub default: CitySchedule,
    /// Per-city overrides, keyed by lowercase city name.
    #[validate(custom = "validate_cities")]
    pub cities: HashMap<String, CitySchedule>,
}

impl Default for DeliveryConfiguration {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::Africa::Lagos,
            labels: ScheduleLabels::default(),
            default: CitySchedule::default(),
            cities: HashMap::new(),
        }
    }
}

/// Names the first bad city (in key order) and the fields it failed on.
fn validate_cities(cities: &HashMap<String, CitySchedule>) -> Result<(), ValidationError> {
    let mut names: Vec<&String> = cities.keys().collect();
    names.sort();
    for name in names {
        let Err(errors) = cities[name].validate() else { continue };
        let mut fields = Vec::new();
        failed_fields(&errors, "", &mut fields);
        fields.sort();

        let mut err = ValidationError::new("city_schedule");
        err.add_param("city".into(), name);
        err.add_param("fields".into(), &fields);
        err.message = Some(format!("city {name}: {}", fields.join(", ")).into());
        return Err(err);
    }
    Ok(())
}

fn failed_fields(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(_) => out.push(path),
            ValidationErrorsKind::Struct(inner) => failed_fields(inner, &path, out),
            ValidationErrorsKind::List(items) => items.values().for_each(|inner| failed_fields(inner, &path, out)),
        }
    }
}

impl DeliveryConfiguration {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn zone(&self) -> Tz { self.time_zone }

    /// Schedule for `city`; unknown or missing cities get the default.
    pub fn city(&self, city: Option<&str>) -> &CitySchedule {
        city.map(|c| c.trim().to_lowercase())
            .and_then(|c| self.cities.get(&c))
            .unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DeliveryConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zone(), chrono_tz::Africa::Lagos);
        assert_eq!(config.default.courier.time_ranges.len(), 4);
    }

    #[test]
    fn test_city_lookup_falls_back() {
        let mut config = DeliveryConfiguration::default();
        let abuja = CitySchedule {
            pickup: MethodSchedule { first_day_offset: 0, days: 3, time_ranges: vec!["10 AM - 6 PM".into()] },
            ..CitySchedule::default()
        };
        config.cities.insert("abuja".into(), abuja.clone());
        assert_eq!(config.city(Some(" Abuja ")), &abuja);
        assert_eq!(config.city(Some("Kano")), &config.default);
        assert_eq!(config.city(None), &config.default);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DeliveryConfiguration = serde_json::from_str(r#"{ "time_zone": "America/New_York", "labels": { "today": "Hoy" } }"#).unwrap();
        assert_eq!(config.zone(), chrono_tz::America::New_York);
        assert_eq!(config.labels.today, "Hoy");
        assert_eq!(config.labels.tomorrow, "Tomorrow");
        assert_eq!(config.default, CitySchedule::default());
    }

    #[test]
    fn test_unknown_zone_is_rejected() {
        let parsed = serde_json::from_str::<DeliveryConfiguration>(r#"{ "time_zone": "Mars/Olympus_Mons" }"#);
        assert!(parsed.is_err());
        let parsed = serde_json::from_str::<DeliveryConfiguration>(r#"{ "time_zone": "+01:00" }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_ranges_fail_validation() {
        let mut config = DeliveryConfiguration::default();
        config.cities.insert("lagos".into(), CitySchedule {
            courier: MethodSchedule { first_day_offset: 1, days: 2, time_ranges: Vec::new() },
            ..CitySchedule::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_city_is_named() {
        let mut config = DeliveryConfiguration::default();
        config.cities.insert("abuja".into(), CitySchedule::default());
        config.cities.insert("lagos".into(), CitySchedule {
            courier: MethodSchedule { first_day_offset: 1, days: 2, time_ranges: Vec::new() },
            ..CitySchedule::default()
        });

        let errors = config.validate().unwrap_err();
        let cities = errors.field_errors()["cities"];
        let err = cities.iter().find(|e| e.code == "city_schedule").unwrap();
        assert_eq!(err.params["city"], serde_json::json!("lagos"));
        assert_eq!(err.params["fields"], serde_json::json!(["courier.time_ranges"]));
        assert_eq!(err.message.as_deref(), Some("city lagos: courier.time_ranges"));
    }
}
