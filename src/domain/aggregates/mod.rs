//! Aggregates module
pub mod cart;
pub mod variant;

pub use cart::{Cart, CartLineItem, CartStatus};
pub use variant::{InventoryPolicy, StockBearingVariant};
