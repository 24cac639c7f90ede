//! Cart domain: aggregates, value objects and the quantity policy
pub mod aggregates;
pub mod policy;
pub mod value_objects;

pub use aggregates::{Cart, CartLineItem, CartStatus, InventoryPolicy, StockBearingVariant};
pub use policy::{Decision, QuantityPolicy, Rejection, StockPolicy};
pub use value_objects::{Money, SessionToken};
