//! Delivery and pickup scheduling.
//!
//! Pure computation over [`DeliveryConfiguration`] and a caller-supplied
//! instant; nothing here touches storage.

pub mod config;
pub mod engine;
pub mod parser;

pub use config::{CitySchedule, DeliveryConfiguration, MethodSchedule, ScheduleLabels};
pub use engine::{DeliveryOption, DeliveryScheduleEngine, DeliverySelection, FulfillmentMethod};
pub use parser::{TimeSlot, TimeSlotParser, DELIVERY_TIME_SLOTS};
