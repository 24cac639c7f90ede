//! Line-level primitives shared by the reservation and merge engines.
//!
//! Each runs against an open transaction and never commits; the caller owns
//! the transaction boundary.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, Decision, QuantityPolicy, StockBearingVariant};
use crate::store::CartTransaction;
use crate::CartError;

pub(crate) async fn active_cart<T: CartTransaction>(tx: &mut T, cart_id: Uuid) -> Result<Cart, CartError> {
    match tx.cart(cart_id).await? {
        Some(cart) if cart.is_active() => Ok(cart),
        _ => Err(CartError::CartRequired),
    }
}

pub(crate) async fn variant<T: CartTransaction>(tx: &mut T, variant_id: Uuid) -> Result<StockBearingVariant, CartError> {
    tx.variant(variant_id).await?.ok_or(CartError::VariantRequired)
}

pub(crate) async fn line<T: CartTransaction>(tx: &mut T, line_id: Uuid) -> Result<CartLineItem, CartError> {
    tx.line(line_id).await?.ok_or(CartError::LineNotFound)
}

fn accepted(decision: Decision) -> Result<i32, CartError> {
    decision.into_result().map_err(CartError::Rejected)
}

/// Adds `quantity` of `variant` to the cart, creating the line on first add.
pub(crate) async fn add_to_cart<T: CartTransaction, P: QuantityPolicy>(
    tx: &mut T, policy: &P, cart_id: Uuid, variant: &StockBearingVariant, quantity: i32,
) -> Result<CartLineItem, CartError> {
    let existing = tx.line_for_variant(cart_id, variant.id).await?;
    let current = existing.as_ref().map_or(0, CartLineItem::quantity);
    let delta = accepted(policy.validate_new_line(quantity, variant, current))?;
    match existing {
        Some(mut line) => {
            let now = Utc::now();
            tx.update_quantity(line.id(), current + delta, now).await?;
            line.set_quantity(current + delta, now);
            Ok(line)
        }
        None => {
            let line = CartLineItem::new(cart_id, variant, delta);
            tx.insert_line(&line).await?;
            Ok(line)
        }
    }
}

/// Additive path for an existing line: validated as `extra` on top of the current quantity.
pub(crate) async fn add_more<T: CartTransaction, P: QuantityPolicy>(
    tx: &mut T, policy: &P, line: &CartLineItem, variant: &StockBearingVariant, extra: i32,
) -> Result<CartLineItem, CartError> {
    let delta = accepted(policy.validate_new_line(extra, variant, line.quantity()))?;
    let mut line = line.clone();
    let now = Utc::now();
    tx.update_quantity(line.id(), line.quantity() + delta, now).await?;
    line.set_quantity(line.quantity() + delta, now);
    Ok(line)
}

/// Absolute path. A target of zero or below removes the line and yields `None`.
pub(crate) async fn set_quantity<T: CartTransaction, P: QuantityPolicy>(
    tx: &mut T, policy: &P, line: &CartLineItem, variant: &StockBearingVariant, target: i32,
) -> Result<Option<CartLineItem>, CartError> {
    let quantity = accepted(policy.validate_set_quantity(line, variant, target.max(0)))?;
    if quantity == 0 {
        tx.delete_line(line.id()).await?;
        return Ok(None);
    }
    let mut line = line.clone();
    let now = Utc::now();
    tx.update_quantity(line.id(), quantity, now).await?;
    line.set_quantity(quantity, now);
    Ok(Some(line))
}
