//! In-memory cart store.
//!
//! A transaction reads from a private working copy and records its writes in
//! a journal. `commit` replays the journal onto the shared tables under the
//! lock and checks the same uniqueness rules as the Postgres schema, so a
//! write that raced another commit fails there, as it would in the database.
//! Faults can be queued per [`FailPoint`] to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, SessionToken, StockBearingVariant};
use crate::store::{constraints, CartStore, CartTransaction, StoreError, StoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    InsertCart,
    MarkAbandoned,
    InsertLine,
    UpdateQuantity,
    DeleteLine,
    MoveLine,
    Commit,
}

#[derive(Clone, Debug, Default)]
struct Tables {
    carts: HashMap<Uuid, Cart>,
    // v7 ids sort by creation time
    lines: BTreeMap<Uuid, CartLineItem>,
    variants: HashMap<Uuid, StockBearingVariant>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    faults: Vec<(FailPoint, StoreError)>,
}

impl Shared {
    fn take_fault(&mut self, point: FailPoint) -> StoreResult<()> {
        match self.faults.iter().position(|(p, _)| *p == point) {
            Some(i) => Err(self.faults.remove(i).1),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    InsertCart(Cart),
    MarkAbandoned(Uuid, DateTime<Utc>),
    InsertLine(CartLineItem),
    UpdateQuantity(Uuid, i32, DateTime<Utc>),
    DeleteLine(Uuid),
    MoveLine(Uuid, Uuid, DateTime<Utc>),
}

impl Op {
    fn fail_point(&self) -> FailPoint {
        match self {
            Self::InsertCart(_) => FailPoint::InsertCart,
            Self::MarkAbandoned(..) => FailPoint::MarkAbandoned,
            Self::InsertLine(_) => FailPoint::InsertLine,
            Self::UpdateQuantity(..) => FailPoint::UpdateQuantity,
            Self::DeleteLine(_) => FailPoint::DeleteLine,
            Self::MoveLine(..) => FailPoint::MoveLine,
        }
    }
}

impl Tables {
    fn lines_of(&self, cart_id: Uuid) -> Vec<CartLineItem> {
        self.lines.values().filter(|l| l.cart_id == cart_id).cloned().collect()
    }

    fn check_line_unique(&self, line_id: Uuid, cart_id: Uuid, variant_id: Uuid) -> StoreResult<()> {
        let taken = self.lines.values().any(|l| l.id != line_id && l.cart_id == cart_id && l.variant_id == variant_id);
        if taken {
            return Err(StoreError::UniqueViolation { constraint: constraints::LINE_CART_VARIANT.to_string() });
        }
        Ok(())
    }

    fn check_cart_unique(&self, cart: &Cart) -> StoreResult<()> {
        if !cart.is_active() { return Ok(()); }
        for other in self.carts.values().filter(|c| c.id != cart.id && c.is_active()) {
            if cart.owner_id.is_some() && other.owner_id == cart.owner_id {
                return Err(StoreError::UniqueViolation { constraint: constraints::ACTIVE_CART_OWNER.to_string() });
            }
            if other.session_token == cart.session_token {
                return Err(StoreError::UniqueViolation { constraint: constraints::ACTIVE_CART_SESSION.to_string() });
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &Op) -> StoreResult<()> {
        match op {
            Op::InsertCart(cart) => {
                self.check_cart_unique(cart)?;
                if self.carts.contains_key(&cart.id) {
                    return Err(StoreError::UniqueViolation { constraint: "carts_pkey".to_string() });
                }
                self.carts.insert(cart.id, cart.clone());
            }
            Op::MarkAbandoned(id, at) => {
                let cart = self.carts.get_mut(id).ok_or(StoreError::NotFound { entity: "cart", id: *id })?;
                cart.abandon(*at);
            }
            Op::InsertLine(line) => {
                if !self.carts.contains_key(&line.cart_id) {
                    return Err(StoreError::NotFound { entity: "cart", id: line.cart_id });
                }
                self.check_line_unique(line.id, line.cart_id, line.variant_id)?;
                self.lines.insert(line.id, line.clone());
            }
            Op::UpdateQuantity(id, quantity, at) => {
                let line = self.lines.get_mut(id).ok_or(StoreError::NotFound { entity: "line item", id: *id })?;
                line.set_quantity(*quantity, *at);
            }
            Op::DeleteLine(id) => {
                self.lines.remove(id).ok_or(StoreError::NotFound { entity: "line item", id: *id })?;
            }
            Op::MoveLine(id, cart_id, at) => {
                let variant_id = self.lines.get(id).map(|l| l.variant_id).ok_or(StoreError::NotFound { entity: "line item", id: *id })?;
                self.check_line_unique(*id, *cart_id, variant_id)?;
                if let Some(line) = self.lines.get_mut(id) { line.move_to(*cart_id, *at); }
            }
        }
        Ok(())
    }
}

/// Cloning shares the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryCartStore { shared: Arc<Mutex<Shared>> }

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }

    /// Seeds or replaces a catalog variant.
    pub async fn put_variant(&self, variant: StockBearingVariant) {
        self.shared.lock().await.tables.variants.insert(variant.id, variant);
    }

    /// Drops a variant from the catalog; cart lines pointing at it stay.
    pub async fn remove_variant(&self, variant_id: Uuid) {
        self.shared.lock().await.tables.variants.remove(&variant_id);
    }

    /// Adjusts stock the way the catalog would, outside any cart transaction.
    pub async fn set_stock(&self, variant_id: Uuid, available: i32) {
        if let Some(v) = self.shared.lock().await.tables.variants.get_mut(&variant_id) { v.available = available; }
    }

    pub async fn put_cart(&self, cart: Cart) -> StoreResult<()> {
        self.shared.lock().await.tables.apply(&Op::InsertCart(cart))
    }

    pub async fn put_line(&self, line: CartLineItem) -> StoreResult<()> {
        self.shared.lock().await.tables.apply(&Op::InsertLine(line))
    }

    pub async fn cart(&self, id: Uuid) -> Option<Cart> {
        self.shared.lock().await.tables.carts.get(&id).cloned()
    }

    /// Queues a one-shot failure returned the next time `point` is reached.
    pub async fn fail_next(&self, point: FailPoint, error: StoreError) {
        self.shared.lock().await.faults.push((point, error));
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        let mut shared = self.shared.lock().await;
        shared.take_fault(FailPoint::Begin)?;
        Ok(MemoryTransaction { shared: Arc::clone(&self.shared), working: shared.tables.clone(), journal: Vec::new() })
    }

    async fn active_cart_for_owner(&self, owner_id: Uuid) -> StoreResult<Option<Cart>> {
        let shared = self.shared.lock().await;
        Ok(shared.tables.carts.values().find(|c| c.is_active() && c.owner_id == Some(owner_id)).cloned())
    }

    async fn active_cart_for_token(&self, token: &SessionToken) -> StoreResult<Option<Cart>> {
        let shared = self.shared.lock().await;
        Ok(shared.tables.carts.values().find(|c| c.is_active() && &c.session_token == token).cloned())
    }

    async fn lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>> {
        Ok(self.shared.lock().await.tables.lines_of(cart_id))
    }
}

#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    working: Tables,
    journal: Vec<Op>,
}

impl MemoryTransaction {
    async fn write(&mut self, op: Op) -> StoreResult<()> {
        self.shared.lock().await.take_fault(op.fail_point())?;
        self.working.apply(&op)?;
        self.journal.push(op);
        Ok(())
    }
}

#[async_trait]
impl CartTransaction for MemoryTransaction {
    async fn cart(&mut self, id: Uuid) -> StoreResult<Option<Cart>> {
        Ok(self.working.carts.get(&id).cloned())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        self.write(Op::InsertCart(cart.clone())).await
    }

    async fn mark_abandoned(&mut self, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(Op::MarkAbandoned(cart_id, at)).await
    }

    async fn variant(&mut self, id: Uuid) -> StoreResult<Option<StockBearingVariant>> {
        Ok(self.working.variants.get(&id).cloned())
    }

    async fn line(&mut self, id: Uuid) -> StoreResult<Option<CartLineItem>> {
        Ok(self.working.lines.get(&id).cloned())
    }

    async fn line_for_variant(&mut self, cart_id: Uuid, variant_id: Uuid) -> StoreResult<Option<CartLineItem>> {
        Ok(self.working.lines.values().find(|l| l.cart_id == cart_id && l.variant_id == variant_id).cloned())
    }

    async fn lines(&mut self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>> {
        Ok(self.working.lines_of(cart_id))
    }

    async fn lines_with_variants(&mut self, cart_id: Uuid) -> StoreResult<Vec<(CartLineItem, Option<StockBearingVariant>)>> {
        Ok(self.working.lines_of(cart_id).into_iter()
            .map(|line| {
                let variant = self.working.variants.get(&line.variant_id).cloned();
                (line, variant)
            })
            .collect())
    }

    async fn insert_line(&mut self, line: &CartLineItem) -> StoreResult<()> {
        self.write(Op::InsertLine(line.clone())).await
    }

    async fn update_quantity(&mut self, line_id: Uuid, quantity: i32, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(Op::UpdateQuantity(line_id, quantity, at)).await
    }

    async fn delete_line(&mut self, line_id: Uuid) -> StoreResult<()> {
        self.write(Op::DeleteLine(line_id)).await
    }

    async fn move_line(&mut self, line_id: Uuid, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(Op::MoveLine(line_id, cart_id, at)).await
    }

    async fn commit(self) -> StoreResult<()> {
        let mut shared = self.shared.lock().await;
        shared.take_fault(FailPoint::Commit)?;
        let mut next = shared.tables.clone();
        for op in &self.journal {
            next.apply(op)?;
        }
        shared.tables = next;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use rust_decimal::Decimal;

    async fn seeded() -> (MemoryCartStore, Cart, StockBearingVariant) {
        let store = MemoryCartStore::new();
        let variant = StockBearingVariant::tracked("Kettle", Money::usd(Decimal::new(30, 0)), 10);
        store.put_variant(variant.clone()).await;
        let cart = Cart::for_session(SessionToken::generate());
        store.put_cart(cart.clone()).await.unwrap();
        (store, cart, variant)
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let (store, cart, variant) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_line(&CartLineItem::new(cart.id(), &variant, 1)).await.unwrap();
        assert_eq!(tx.lines(cart.id()).await.unwrap().len(), 1);
        assert!(store.lines(cart.id()).await.unwrap().is_empty());
        drop(tx);
        assert!(store.lines(cart.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_insert_fails_at_commit() {
        let (store, cart, variant) = seeded().await;
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_line(&CartLineItem::new(cart.id(), &variant, 1)).await.unwrap();
        second.insert_line(&CartLineItem::new(cart.id(), &variant, 2)).await.unwrap();
        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_unique_violation());
        let lines = store.lines(cart.id()).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_line_rejected_inside_transaction() {
        let (store, cart, variant) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_line(&CartLineItem::new(cart.id(), &variant, 1)).await.unwrap();
        let err = tx.insert_line(&CartLineItem::new(cart.id(), &variant, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == constraints::LINE_CART_VARIANT));
    }

    #[tokio::test]
    async fn test_one_active_cart_per_session_token() {
        let (store, cart, _) = seeded().await;
        let twin = Cart::for_session(cart.session_token().clone());
        assert!(store.put_cart(twin).await.unwrap_err().is_unique_violation());

        let mut tx = store.begin().await.unwrap();
        tx.mark_abandoned(cart.id(), Utc::now()).await.unwrap();
        tx.commit().await.unwrap();
        store.put_cart(Cart::for_session(cart.session_token().clone())).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let (store, cart, variant) = seeded().await;
        store.fail_next(FailPoint::InsertLine, StoreError::Injected("disk full".into())).await;
        let mut tx = store.begin().await.unwrap();
        let line = CartLineItem::new(cart.id(), &variant, 1);
        assert!(matches!(tx.insert_line(&line).await, Err(StoreError::Injected(_))));
        tx.insert_line(&line).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.lines(cart.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lines_with_variants_keeps_orphaned_lines() {
        let (store, cart, variant) = seeded().await;
        let gone = StockBearingVariant::tracked("Discontinued mug", Money::usd(Decimal::new(8, 0)), 3);
        store.put_variant(gone.clone()).await;
        store.put_line(CartLineItem::new(cart.id(), &variant, 1)).await.unwrap();
        let orphan = CartLineItem::new(cart.id(), &gone, 2);
        store.put_line(orphan.clone()).await.unwrap();
        store.remove_variant(gone.id).await;

        let mut tx = store.begin().await.unwrap();
        let rows = tx.lines_with_variants(cart.id()).await.unwrap();
        assert_eq!(rows.len(), 2);
        let (_, missing) = rows.iter().find(|(line, _)| line.id() == orphan.id()).unwrap();
        assert!(missing.is_none());
        assert!(rows.iter().any(|(_, v)| v.as_ref().map(|v| v.id) == Some(variant.id)));
    }
}
