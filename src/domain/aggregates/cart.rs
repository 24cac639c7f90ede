//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::variant::StockBearingVariant;
use crate::domain::value_objects::{Money, SessionToken};

/// Lifecycle tag; only `Active` carts are found by owner or session token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    Abandoned { at: DateTime<Utc> },
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Abandoned { .. } => "abandoned" }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub(crate) id: Uuid,
    pub(crate) owner_id: Option<Uuid>,
    pub(crate) session_token: SessionToken,
    pub(crate) status: CartStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn for_session(session_token: SessionToken) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), owner_id: None, session_token, status: CartStatus::Active, created_at: now, updated_at: now }
    }

    pub fn for_customer(owner_id: Uuid, session_token: SessionToken) -> Self {
        let mut cart = Self::for_session(session_token);
        cart.owner_id = Some(owner_id);
        cart
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner_id(&self) -> Option<Uuid> { self.owner_id }
    pub fn session_token(&self) -> &SessionToken { &self.session_token }
    pub fn status(&self) -> CartStatus { self.status }
    pub fn is_active(&self) -> bool { self.status == CartStatus::Active }
    pub fn is_guest(&self) -> bool { self.owner_id.is_none() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn abandoned_at(&self) -> Option<DateTime<Utc>> {
        match self.status { CartStatus::Abandoned { at } => Some(at), CartStatus::Active => None }
    }

    /// Retires the cart. The first abandonment time is kept.
    pub fn abandon(&mut self, at: DateTime<Utc>) {
        if self.is_active() {
            self.status = CartStatus::Abandoned { at };
            self.updated_at = at;
        }
    }
}

/// A (cart, variant) pairing with a positive quantity and a frozen price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub(crate) id: Uuid,
    pub(crate) cart_id: Uuid,
    pub(crate) variant_id: Uuid,
    pub(crate) quantity: i32,
    pub(crate) unit_price: Money,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Snapshots the variant's current price; later price changes never reach this line.
    pub fn new(cart_id: Uuid, variant: &StockBearingVariant, quantity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), cart_id, variant_id: variant.id, quantity,
            unit_price: variant.price.clone(), created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn cart_id(&self) -> Uuid { self.cart_id }
    pub fn variant_id(&self) -> Uuid { self.variant_id }
    pub fn quantity(&self) -> i32 { self.quantity }
    pub fn unit_price(&self) -> &Money { &self.unit_price }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }

    pub(crate) fn set_quantity(&mut self, quantity: i32, at: DateTime<Utc>) {
        self.quantity = quantity;
        self.updated_at = at;
    }

    pub(crate) fn move_to(&mut self, cart_id: Uuid, at: DateTime<Utc>) {
        self.cart_id = cart_id;
        self.updated_at = at;
    }
}
