//! Selectable delivery and pickup slots for the checkout form.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::config::{DeliveryConfiguration, MethodSchedule, ScheduleLabels};
use crate::schedule::parser::TimeSlotParser;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentMethod {
    Courier,
    #[default]
    Pickup,
}

impl FulfillmentMethod {
    /// Anything other than `courier` is store pickup.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("courier") { Self::Courier } else { Self::Pickup }
    }

    pub fn as_str(&self) -> &'static str {
        match self { Self::Courier => "courier", Self::Pickup => "pickup" }
    }
}

/// What the shopper picked so far. Only a date and a range together count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySelection {
    pub date: Option<NaiveDate>,
    pub time_range: Option<String>,
}

impl DeliverySelection {
    pub fn new(date: NaiveDate, time_range: impl Into<String>) -> Self {
        Self { date: Some(date), time_range: Some(time_range.into()) }
    }

    /// Decodes an option value (`YYYY-MM-DD|range`).
    pub fn from_value(value: &str) -> Option<Self> {
        let (date, range) = value.split_once('|')?;
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
        if range.is_empty() { return None; }
        Some(Self::new(date, range))
    }

    pub fn is_complete(&self) -> bool { self.date.is_some() && self.time_range.is_some() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryOption {
    pub date: NaiveDate,
    pub time_range: String,
    pub label: String,
    pub value: String,
    pub disabled: bool,
    pub selected: bool,
}

#[derive(Debug)]
pub struct DeliveryScheduleEngine<'a> {
    method: FulfillmentMethod,
    schedule: &'a MethodSchedule,
    labels: &'a ScheduleLabels,
    parser: TimeSlotParser,
    selection: DeliverySelection,
    now: DateTime<Utc>,
}

impl<'a> DeliveryScheduleEngine<'a> {
    pub fn new(
        config: &'a DeliveryConfiguration, method: &str, city: Option<&str>, selection: Option<DeliverySelection>, now: DateTime<Utc>,
    ) -> Self {
        let method = FulfillmentMethod::parse(method);
        Self {
            method,
            schedule: config.city(city).for_method(method),
            labels: &config.labels,
            parser: TimeSlotParser::new(config.zone()),
            selection: selection.unwrap_or_default(),
            now,
        }
    }

    /// Same as [`DeliveryScheduleEngine::new`] at the current instant.
    pub fn current(config: &'a DeliveryConfiguration, method: &str, city: Option<&str>, selection: Option<DeliverySelection>) -> Self {
        Self::new(config, method, city, selection, Utc::now())
    }

    pub fn method(&self) -> FulfillmentMethod { self.method }
    pub fn today(&self) -> NaiveDate { self.parser.today(self.now) }

    pub fn available_options(&self) -> Vec<DeliveryOption> {
        let mut options = Vec::new();
        for date in self.dates() {
            for range in &self.schedule.time_ranges {
                options.push(DeliveryOption {
                    date,
                    time_range: range.clone(),
                    label: self.label_for(date),
                    value: format!("{}|{}", date.format("%Y-%m-%d"), range),
                    disabled: self.is_disabled(date, range),
                    selected: self.is_selected(date, range),
                });
            }
        }
        options
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.available_options().into_iter().map(|o| o.date).collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn is_selected(&self, date: NaiveDate, range: &str) -> bool {
        match (&self.selection.date, &self.selection.time_range) {
            (Some(d), Some(r)) => *d == date && r == range,
            _ => false,
        }
    }

    pub fn title_for_method(&self) -> &str {
        match self.method { FulfillmentMethod::Courier => &self.labels.courier_title, FulfillmentMethod::Pickup => &self.labels.pickup_title }
    }

    pub fn placeholder_text(&self) -> &str {
        match self.method {
            FulfillmentMethod::Courier => &self.labels.courier_placeholder,
            FulfillmentMethod::Pickup => &self.labels.pickup_placeholder,
        }
    }

    pub fn current_selection_display(&self) -> String {
        match (&self.selection.date, &self.selection.time_range) {
            (Some(date), Some(range)) => format!("{}, {}", self.label_for(*date), range),
            _ => self.placeholder_text().to_string(),
        }
    }

    /// Today, Tomorrow, or the configured short date.
    pub fn label_for(&self, date: NaiveDate) -> String {
        let today = self.today();
        if date == today { return self.labels.today.clone(); }
        if today.checked_add_days(Days::new(1)) == Some(date) { return self.labels.tomorrow.clone(); }
        let mut label = String::new();
        if write!(label, "{}", date.format(&self.labels.date_format)).is_err() {
            // bad strftime pattern in the configuration
            return date.format("%Y-%m-%d").to_string();
        }
        label
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let today = self.today();
        let first = u64::try_from(self.schedule.first_day_offset).unwrap_or(0);
        (0..u64::from(self.schedule.days)).filter_map(move |i| today.checked_add_days(Days::new(first + i)))
    }

    fn is_disabled(&self, date: NaiveDate, range: &str) -> bool {
        let today = self.today();
        match self.method {
            // no same-day courier delivery
            FulfillmentMethod::Courier => date <= today,
            FulfillmentMethod::Pickup if date > today => false,
            FulfillmentMethod::Pickup => match self.parser.parse_datetime_range(range, date) {
                Some((_, end)) => end.with_timezone(&Utc) <= self.now,
                None => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::config::CitySchedule;

    fn at(rfc3339: &str) -> DateTime<Utc> { rfc3339.parse().unwrap() }
    fn day(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

    // 2024-03-15 is a Friday; the default zone is Africa/Lagos (UTC+1).
    const MORNING: &str = "2024-03-15T10:00:00Z";

    #[test]
    fn test_method_parse() {
        assert_eq!(FulfillmentMethod::parse("Courier"), FulfillmentMethod::Courier);
        assert_eq!(FulfillmentMethod::parse("pickup"), FulfillmentMethod::Pickup);
        assert_eq!(FulfillmentMethod::parse("drone"), FulfillmentMethod::Pickup);
    }

    #[test]
    fn test_courier_options_start_tomorrow() {
        let config = DeliveryConfiguration::default();
        let engine = DeliveryScheduleEngine::new(&config, "courier", None, None, at(MORNING));
        let options = engine.available_options();
        assert_eq!(options.len(), 6 * 4);
        assert_eq!(options[0].date, day(2024, 3, 16));
        assert_eq!(options[0].label, "Tomorrow");
        assert_eq!(options[0].value, "2024-03-16|09:00-12:00");
        assert!(options.iter().all(|o| !o.disabled));
        assert_eq!(options[4].label, "Sun, Mar 17");

        let dates = engine.available_dates();
        assert_eq!(dates.len(), 6);
        assert_eq!(dates.last(), Some(&day(2024, 3, 21)));
    }

    #[test]
    fn test_courier_same_day_always_disabled() {
        let mut config = DeliveryConfiguration::default();
        config.default.courier.first_day_offset = 0;
        // before any slot has started
        let engine = DeliveryScheduleEngine::new(&config, "courier", None, None, at("2024-03-15T00:30:00Z"));
        for option in engine.available_options() {
            assert_eq!(option.disabled, option.date == day(2024, 3, 15), "{}", option.value);
        }
    }

    #[test]
    fn test_pickup_boundary() {
        let config = DeliveryConfiguration::default();
        // 9:00 PM in UTC+1
        let just_before = DeliveryScheduleEngine::new(&config, "pickup", None, None, at("2024-03-15T19:59:59Z"));
        let today = &just_before.available_options()[0];
        assert_eq!(today.label, "Today");
        assert!(!today.disabled);

        for closed in ["2024-03-15T20:00:00Z", "2024-03-15T20:00:01Z"] {
            let engine = DeliveryScheduleEngine::new(&config, "pickup", None, None, at(closed));
            let options = engine.available_options();
            assert!(options[0].disabled, "{closed}");
            assert!(options[1..].iter().all(|o| !o.disabled));
        }
    }

    #[test]
    fn test_pickup_cutoff_follows_daylight_saving() {
        let config = DeliveryConfiguration { time_zone: chrono_tz::America::New_York, ..DeliveryConfiguration::default() };
        // 9:00 PM EDT on Jul 15 is 01:00Z on Jul 16
        let open = DeliveryScheduleEngine::new(&config, "pickup", None, None, at("2024-07-16T00:59:59Z"));
        assert_eq!(open.available_options()[0].date, day(2024, 7, 15));
        assert!(!open.available_options()[0].disabled);

        let closed = DeliveryScheduleEngine::new(&config, "pickup", None, None, at("2024-07-16T01:00:01Z"));
        assert_eq!(closed.available_options()[0].date, day(2024, 7, 15));
        assert!(closed.available_options()[0].disabled);

        // 9:00 PM EST on Jan 15 is 02:00Z on Jan 16
        let winter = DeliveryScheduleEngine::new(&config, "pickup", None, None, at("2024-01-16T01:30:00Z"));
        assert_eq!(winter.available_options()[0].date, day(2024, 1, 15));
        assert!(!winter.available_options()[0].disabled);
    }

    #[test]
    fn test_unparseable_pickup_range_is_disabled_today_only() {
        let mut config = DeliveryConfiguration::default();
        config.default.pickup.time_ranges = vec!["store hours".into()];
        let engine = DeliveryScheduleEngine::new(&config, "pickup", None, None, at(MORNING));
        let options = engine.available_options();
        assert!(options[0].disabled);
        assert!(!options[1].disabled);
    }

    #[test]
    fn test_city_override() {
        let mut config = DeliveryConfiguration::default();
        let mut abuja = CitySchedule::default();
        abuja.pickup.days = 2;
        config.cities.insert("abuja".into(), abuja);
        let engine = DeliveryScheduleEngine::new(&config, "pickup", Some("Abuja"), None, at(MORNING));
        assert_eq!(engine.available_dates(), vec![day(2024, 3, 15), day(2024, 3, 16)]);
    }

    #[test]
    fn test_selection() {
        let config = DeliveryConfiguration::default();
        let selection = DeliverySelection::from_value("2024-03-17|12:00-15:00").unwrap();
        let engine = DeliveryScheduleEngine::new(&config, "courier", None, Some(selection), at(MORNING));
        let selected: Vec<_> = engine.available_options().into_iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, "2024-03-17|12:00-15:00");
        assert_eq!(engine.current_selection_display(), "Sun, Mar 17, 12:00-15:00");
        assert_eq!(engine.title_for_method(), "Delivery time");
    }

    #[test]
    fn test_partial_selection_is_not_a_selection() {
        let config = DeliveryConfiguration::default();
        let partial = DeliverySelection { date: Some(day(2024, 3, 15)), time_range: None };
        let engine = DeliveryScheduleEngine::new(&config, "pickup", None, Some(partial), at(MORNING));
        assert!(engine.available_options().iter().all(|o| !o.selected));
        assert_eq!(engine.current_selection_display(), "Choose a pickup time");
        assert_eq!(engine.placeholder_text(), "Choose a pickup time");
        assert_eq!(engine.title_for_method(), "Pickup time");
    }

    #[test]
    fn test_selection_value_decoding() {
        assert_eq!(
            DeliverySelection::from_value("2024-03-16|9:00 AM - 9:00 PM"),
            Some(DeliverySelection::new(day(2024, 3, 16), "9:00 AM - 9:00 PM"))
        );
        assert_eq!(DeliverySelection::from_value("2024-03-16"), None);
        assert_eq!(DeliverySelection::from_value("tomorrow|09:00-12:00"), None);
        assert_eq!(DeliverySelection::from_value("2024-03-16|"), None);
    }

    #[test]
    fn test_localized_labels() {
        let mut config = DeliveryConfiguration::default();
        config.labels.today = "Aujourd'hui".into();
        config.labels.date_format = "%d/%m".into();
        let engine = DeliveryScheduleEngine::new(&config, "pickup", None, None, at(MORNING));
        let options = engine.available_options();
        assert_eq!(options[0].label, "Aujourd'hui");
        assert_eq!(options[2].label, "17/03");
    }
}
