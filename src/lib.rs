//! OpenSASE Cart
//!
//! Cart reservation and delivery scheduling for the OpenSASE storefront.
//!
//! ## Features
//! - Stock-aware line quantities (add, increment, decrement, set, clear)
//! - Guest cart to customer cart merge at login
//! - Courier and store pickup time-slot scheduling
//! - Time-range parsing ("9:00 AM - 12:00 PM", "09:00-12:00")
//!
//! Every cart mutation runs in one store transaction and returns an outcome
//! object; policy rejections are reported verbatim, store failures as one
//! generic message.

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod engine;
pub mod schedule;
pub mod store;

pub use domain::{Cart, CartLineItem, CartStatus, Decision, Money, QuantityPolicy, Rejection, SessionToken, StockBearingVariant, StockPolicy};
pub use engine::{CartIdentity, CartLocator, CartMergeEngine, CartReservationEngine, CartSummary, CartViewSync, ClearOutcome, FailureMessages, ItemOutcome, MergeOutcome};
pub use schedule::{DeliveryConfiguration, DeliveryOption, DeliveryScheduleEngine, DeliverySelection, FulfillmentMethod, TimeSlot, TimeSlotParser};
pub use store::{CartStore, CartTransaction, MemoryCartStore, PgCartStore, StoreError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Cart is required")]
    CartRequired,

    #[error("Variant is required")]
    VariantRequired,

    #[error("Item is no longer in your cart")]
    LineNotFound,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl CartError {
    /// Expected outcomes the shopper can act on, as opposed to system failures.
    pub fn is_user_facing(&self) -> bool { !matches!(self, Self::Store(_)) }
}

pub type Result<T> = std::result::Result<T, CartError>;
