//! Post-mutation cart summary handed to the rendering layer.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, Money};
use crate::store::{CartStore, StoreResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineSummary {
    pub line_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartSummary {
    pub cart_id: Uuid,
    pub line_count: usize,
    pub item_count: i64,
    pub lines: Vec<LineSummary>,
    /// One total per currency, ordered by currency code.
    pub totals: Vec<Money>,
}

impl CartSummary {
    pub fn from_lines(cart_id: Uuid, lines: &[CartLineItem]) -> Self {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        let lines: Vec<LineSummary> = lines.iter().map(|l| {
            let line_total = l.line_total();
            *totals.entry(line_total.currency().to_string()).or_insert(Decimal::ZERO) += line_total.amount();
            LineSummary { line_id: l.id(), variant_id: l.variant_id(), quantity: l.quantity(), unit_price: l.unit_price().clone(), line_total }
        }).collect();
        Self {
            cart_id,
            line_count: lines.len(),
            item_count: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            lines,
            totals: totals.into_iter().map(|(currency, amount)| Money::new(amount, &currency)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn quantity_of(&self, variant_id: Uuid) -> Option<i32> {
        self.lines.iter().find(|l| l.variant_id == variant_id).map(|l| l.quantity)
    }

    pub fn total_in(&self, currency: &str) -> Option<&Money> {
        self.totals.iter().find(|m| m.currency().eq_ignore_ascii_case(currency))
    }
}

/// Read-only view over committed cart state.
#[derive(Debug)]
pub struct CartViewSync<'a, S> { store: &'a S }

impl<'a, S: CartStore> CartViewSync<'a, S> {
    pub fn new(store: &'a S) -> Self { Self { store } }

    pub async fn summarize(&self, cart: &Cart) -> StoreResult<CartSummary> {
        let lines = self.store.lines(cart.id()).await?;
        Ok(CartSummary::from_lines(cart.id(), &lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionToken, StockBearingVariant};
    use crate::store::MemoryCartStore;

    #[test]
    fn test_totals_per_currency() {
        let cart_id = Uuid::now_v7();
        let tea = StockBearingVariant::tracked("Tea", Money::usd(Decimal::new(250, 2)), 10);
        let jollof = StockBearingVariant::tracked("Jollof", Money::new(Decimal::new(1500, 0), "NGN"), 10);
        let mug = StockBearingVariant::tracked("Mug", Money::usd(Decimal::new(800, 2)), 10);
        let lines = vec![
            CartLineItem::new(cart_id, &tea, 2),
            CartLineItem::new(cart_id, &jollof, 1),
            CartLineItem::new(cart_id, &mug, 3),
        ];
        let summary = CartSummary::from_lines(cart_id, &lines);
        assert_eq!(summary.line_count, 3);
        assert_eq!(summary.item_count, 6);
        assert_eq!(summary.totals.len(), 2);
        assert_eq!(summary.total_in("usd").unwrap().amount(), Decimal::new(2900, 2));
        assert_eq!(summary.total_in("NGN").unwrap().amount(), Decimal::new(1500, 0));
        assert_eq!(summary.quantity_of(mug.id), Some(3));
    }

    #[tokio::test]
    async fn test_summarize_reads_committed_lines() {
        let store = MemoryCartStore::new();
        let cart = Cart::for_session(SessionToken::generate());
        store.put_cart(cart.clone()).await.unwrap();
        assert!(CartViewSync::new(&store).summarize(&cart).await.unwrap().is_empty());

        let variant = StockBearingVariant::untracked("Gift card", Money::usd(Decimal::new(25, 0)));
        store.put_line(CartLineItem::new(cart.id(), &variant, 2)).await.unwrap();
        let summary = CartViewSync::new(&store).summarize(&cart).await.unwrap();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total_in("USD").unwrap().amount(), Decimal::new(50, 0));
    }
}
