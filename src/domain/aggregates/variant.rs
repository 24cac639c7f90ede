//! Stock-bearing variant, owned by the catalog and only read here

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// What happens when tracked stock runs out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPolicy {
    #[default]
    Deny,
    /// Backorder: keep selling at or below zero stock.
    Continue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockBearingVariant {
    pub id: Uuid,
    pub title: String,
    pub price: Money,
    pub available: i32,
    pub tracks_inventory: bool,
    pub inventory_policy: InventoryPolicy,
}

impl StockBearingVariant {
    pub fn tracked(title: impl Into<String>, price: Money, available: i32) -> Self {
        Self { id: Uuid::now_v7(), title: title.into(), price, available, tracks_inventory: true, inventory_policy: InventoryPolicy::Deny }
    }

    pub fn untracked(title: impl Into<String>, price: Money) -> Self {
        Self { tracks_inventory: false, ..Self::tracked(title, price, 0) }
    }

    pub fn with_backorder(mut self) -> Self { self.inventory_policy = InventoryPolicy::Continue; self }

    pub fn allows_backorder(&self) -> bool { self.inventory_policy == InventoryPolicy::Continue }

    /// Only tracked variants without backorder cap the quantity by stock.
    pub fn limits_quantity(&self) -> bool { self.tracks_inventory && !self.allows_backorder() }

    pub fn is_out_of_stock(&self) -> bool { self.limits_quantity() && self.available <= 0 }
}
