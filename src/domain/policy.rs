//! Quantity policy: pure accept/reject decisions for line quantities.
//!
//! Nothing here touches storage. Engines ask for a [`Decision`] before every
//! write and surface a [`Rejection`] to the shopper verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::{CartLineItem, StockBearingVariant};

pub const DEFAULT_MAX_LINE_QUANTITY: i32 = 99;

/// Expected, user-actionable reasons a quantity change is refused.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Quantity must be positive")]
    NotPositive,
    #[error("Quantity cannot be negative")]
    Negative,
    #[error("Quantity cannot exceed {max}")]
    ExceedsMaximum { max: i32 },
    #[error("This item is out of stock")]
    OutOfStock,
    #[error("Only {remaining} more available")]
    OnlyMoreAvailable { remaining: i32 },
    #[error("No more available")]
    NoMoreAvailable,
    #[error("Only {available} available")]
    OnlyAvailable { available: i32 },
    #[error("You cannot add more than {max} of this item")]
    CannotAddMore { max: i32 },
    #[error("This item is no longer available")]
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Accept { quantity: i32 },
    Reject(Rejection),
}

impl Decision {
    pub fn is_accepted(&self) -> bool { matches!(self, Self::Accept { .. }) }

    pub fn into_result(self) -> Result<i32, Rejection> {
        match self { Self::Accept { quantity } => Ok(quantity), Self::Reject(r) => Err(r) }
    }
}

impl From<Result<i32, Rejection>> for Decision {
    fn from(r: Result<i32, Rejection>) -> Self {
        match r { Ok(quantity) => Self::Accept { quantity }, Err(e) => Self::Reject(e) }
    }
}

pub trait QuantityPolicy: Send + Sync {
    /// Additive check: `desired` more units on top of `existing`.
    fn validate_new_line(&self, desired: i32, variant: &StockBearingVariant, existing: i32) -> Decision;

    /// Absolute check. Zero means removal.
    fn validate_set_quantity(&self, line: &CartLineItem, variant: &StockBearingVariant, target: i32) -> Decision;

    fn can_increment(&self, line: &CartLineItem, variant: &StockBearingVariant) -> Decision {
        self.validate_set_quantity(line, variant, line.quantity().saturating_add(1))
    }
}

/// Stock-aware policy with a per-line ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockPolicy {
    max_quantity: i32,
}

impl Default for StockPolicy {
    fn default() -> Self { Self { max_quantity: DEFAULT_MAX_LINE_QUANTITY } }
}

impl StockPolicy {
    pub fn new(max_quantity: i32) -> Self { Self { max_quantity: max_quantity.max(1) } }
    pub fn max_quantity(&self) -> i32 { self.max_quantity }

    fn check_new_line(&self, desired: i32, variant: &StockBearingVariant, existing: i32) -> Result<i32, Rejection> {
        if desired <= 0 { return Err(Rejection::NotPositive); }
        if desired > self.max_quantity { return Err(Rejection::ExceedsMaximum { max: self.max_quantity }); }
        if variant.is_out_of_stock() { return Err(Rejection::OutOfStock); }
        let total = existing.saturating_add(desired);
        if variant.limits_quantity() && total > variant.available {
            return Err(shortfall(variant.available, existing));
        }
        if total > self.max_quantity { return Err(Rejection::CannotAddMore { max: self.max_quantity }); }
        Ok(desired)
    }

    fn check_set_quantity(&self, current: i32, variant: &StockBearingVariant, target: i32) -> Result<i32, Rejection> {
        if target < 0 { return Err(Rejection::Negative); }
        if target == 0 { return Ok(0); }
        if target > self.max_quantity { return Err(Rejection::ExceedsMaximum { max: self.max_quantity }); }
        if variant.is_out_of_stock() { return Err(Rejection::OutOfStock); }
        if variant.limits_quantity() && target > variant.available {
            if target > current { return Err(shortfall(variant.available, current)); }
            return Err(Rejection::OnlyAvailable { available: variant.available });
        }
        Ok(target)
    }
}

fn shortfall(available: i32, existing: i32) -> Rejection {
    let remaining = available - existing;
    if remaining > 0 { Rejection::OnlyMoreAvailable { remaining } } else { Rejection::NoMoreAvailable }
}

impl QuantityPolicy for StockPolicy {
    fn validate_new_line(&self, desired: i32, variant: &StockBearingVariant, existing: i32) -> Decision {
        self.check_new_line(desired, variant, existing).into()
    }

    fn validate_set_quantity(&self, line: &CartLineItem, variant: &StockBearingVariant, target: i32) -> Decision {
        self.check_set_quantity(line.quantity(), variant, target).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Money;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn variant(stock: i32) -> StockBearingVariant {
        StockBearingVariant::tracked("Widget", Money::usd(Decimal::new(10, 0)), stock)
    }

    fn line(variant: &StockBearingVariant, qty: i32) -> CartLineItem {
        CartLineItem::new(Uuid::now_v7(), variant, qty)
    }

    fn reject(d: Decision) -> Rejection {
        match d { Decision::Reject(r) => r, other => panic!("expected rejection, got {other:?}") }
    }

    #[test]
    fn test_new_line_rule_order() {
        let p = StockPolicy::default();
        assert_eq!(reject(p.validate_new_line(0, &variant(0), 0)), Rejection::NotPositive);
        assert_eq!(reject(p.validate_new_line(-3, &variant(5), 0)), Rejection::NotPositive);
        assert_eq!(reject(p.validate_new_line(100, &variant(0), 0)), Rejection::ExceedsMaximum { max: 99 });
        assert_eq!(reject(p.validate_new_line(1, &variant(0), 0)), Rejection::OutOfStock);
    }

    #[test]
    fn test_new_line_stock_shortfall() {
        let p = StockPolicy::default();
        let v = variant(5);
        assert_eq!(p.validate_new_line(3, &v, 0), Decision::Accept { quantity: 3 });
        assert_eq!(reject(p.validate_new_line(3, &v, 3)), Rejection::OnlyMoreAvailable { remaining: 2 });
        assert_eq!(reject(p.validate_new_line(1, &v, 5)), Rejection::NoMoreAvailable);
        assert_eq!(reject(p.validate_new_line(1, &v, 7)), Rejection::NoMoreAvailable);
    }

    #[test]
    fn test_new_line_global_cap_beats_stock() {
        let p = StockPolicy::default();
        let v = variant(500);
        assert_eq!(reject(p.validate_new_line(10, &v, 95)), Rejection::CannotAddMore { max: 99 });
        let untracked = StockBearingVariant::untracked("E-book", Money::default());
        assert_eq!(reject(p.validate_new_line(1, &untracked, 99)), Rejection::CannotAddMore { max: 99 });
        assert!(p.validate_new_line(99, &untracked, 0).is_accepted());
    }

    #[test]
    fn test_backorder_ignores_stock() {
        let p = StockPolicy::default();
        let v = variant(0).with_backorder();
        assert_eq!(p.validate_new_line(40, &v, 10), Decision::Accept { quantity: 40 });
    }

    #[test]
    fn test_set_quantity_zero_and_negative() {
        let p = StockPolicy::default();
        let v = variant(3);
        let l = line(&v, 2);
        let sold_out = variant(0);
        assert_eq!(p.validate_set_quantity(&l, &sold_out, 0), Decision::Accept { quantity: 0 });
        assert_eq!(reject(p.validate_set_quantity(&l, &v, -1)), Rejection::Negative);
    }

    #[test]
    fn test_set_quantity_stock() {
        let p = StockPolicy::default();
        let v = variant(5);
        let l = line(&v, 4);
        assert_eq!(p.validate_set_quantity(&l, &v, 5), Decision::Accept { quantity: 5 });
        assert_eq!(reject(p.validate_set_quantity(&l, &v, 8)), Rejection::OnlyMoreAvailable { remaining: 1 });
        assert_eq!(reject(p.validate_set_quantity(&l, &v, 120)), Rejection::ExceedsMaximum { max: 99 });

        let shrunk = variant(2);
        let big = line(&shrunk, 6);
        assert_eq!(reject(p.validate_set_quantity(&big, &shrunk, 4)), Rejection::OnlyAvailable { available: 2 });
    }

    #[test]
    fn test_can_increment() {
        let p = StockPolicy::default();
        let v = variant(5);
        assert!(p.can_increment(&line(&v, 4), &v).is_accepted());
        assert_eq!(reject(p.can_increment(&line(&v, 5), &v)), Rejection::NoMoreAvailable);
    }

    #[test]
    fn test_custom_ceiling() {
        let p = StockPolicy::new(3);
        let v = StockBearingVariant::untracked("Sticker", Money::default());
        assert_eq!(reject(p.validate_new_line(2, &v, 2)), Rejection::CannotAddMore { max: 3 });
        assert_eq!(Rejection::CannotAddMore { max: 3 }.to_string(), "You cannot add more than 3 of this item");
    }
}
