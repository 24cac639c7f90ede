//! Cart reservation engine: quantity changes under stock constraints.
//!
//! One store transaction per call. The policy decides, the store enforces
//! uniqueness, and every entry point returns an outcome instead of an error.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, QuantityPolicy, StockBearingVariant, StockPolicy};
use crate::engine::outcome::{ClearOutcome, FailureMessages, ItemOutcome};
use crate::engine::view::CartSummary;
use crate::engine::{ops, rollback, summarize, user_errors, Operation};
use crate::store::{CartStore, CartTransaction};
use crate::CartError;

#[derive(Clone, Copy, Debug)]
enum Adjustment {
    /// Absolute target through the set-quantity path.
    Set(i32),
    /// Relative step through the set-quantity path (increment / decrement).
    Step(i32),
    /// Extra units through the additive path.
    AddMore(i32),
}

#[derive(Debug)]
pub struct CartReservationEngine<S, P = StockPolicy> {
    store: S,
    policy: P,
    messages: FailureMessages,
}

impl<S: CartStore> CartReservationEngine<S> {
    pub fn new(store: S) -> Self { Self::with_policy(store, StockPolicy::default()) }
}

impl<S: CartStore, P: QuantityPolicy> CartReservationEngine<S, P> {
    pub fn with_policy(store: S, policy: P) -> Self {
        Self { store, policy, messages: FailureMessages::default() }
    }

    pub fn with_messages(mut self, messages: FailureMessages) -> Self { self.messages = messages; self }

    pub fn store(&self) -> &S { &self.store }
    pub fn policy(&self) -> &P { &self.policy }

    fn errors_for(&self, operation: Operation, err: &CartError) -> Vec<String> {
        let fallback = match (operation, err) {
            (Operation::AddItem, CartError::Store(e)) if e.is_unique_violation() => &self.messages.add_conflict,
            (Operation::Clear, _) => &self.messages.clear_failed,
            _ => &self.messages.generic,
        };
        user_errors(operation, err, fallback)
    }

    #[instrument(skip(self, cart, variant), fields(cart_id = %cart.id(), variant_id = %variant.id))]
    pub async fn add_item(&self, cart: &Cart, variant: &StockBearingVariant, quantity: i32) -> ItemOutcome {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return ItemOutcome::failed(Some(cart.clone()), self.errors_for(Operation::AddItem, &e.into())),
        };
        let mut slot = Some(cart.clone());
        let result = self.add_item_in(&mut tx, cart.id(), variant.id, quantity, &mut slot).await;
        self.finish(tx, Operation::AddItem, slot, result).await
    }

    pub async fn add_one(&self, cart: &Cart, variant: &StockBearingVariant) -> ItemOutcome {
        self.add_item(cart, variant, 1).await
    }

    #[instrument(skip_all, fields(line_id = %line.id()))]
    pub async fn increment(&self, line: &CartLineItem) -> ItemOutcome {
        self.adjust(line, Adjustment::Step(1)).await
    }

    /// Going below one removes the line and still counts as success.
    #[instrument(skip_all, fields(line_id = %line.id()))]
    pub async fn decrement(&self, line: &CartLineItem) -> ItemOutcome {
        self.adjust(line, Adjustment::Step(-1)).await
    }

    #[instrument(skip(self, line), fields(line_id = %line.id()))]
    pub async fn add_more(&self, line: &CartLineItem, extra: i32) -> ItemOutcome {
        self.adjust(line, Adjustment::AddMore(extra)).await
    }

    /// Zero or a negative quantity removes the line.
    #[instrument(skip(self, line), fields(line_id = %line.id()))]
    pub async fn set_quantity(&self, line: &CartLineItem, quantity: i32) -> ItemOutcome {
        self.adjust(line, Adjustment::Set(quantity)).await
    }

    /// All-or-nothing: if any line cannot be removed, none are.
    #[instrument(skip_all, fields(cart_id = %cart.id()))]
    pub async fn clear(&self, cart: &Cart) -> ClearOutcome {
        let committed = match self.store.lines(cart.id()).await {
            Ok(lines) => lines,
            Err(e) => return ClearOutcome::failed(cart.clone(), self.errors_for(Operation::Clear, &e.into())),
        };
        if committed.is_empty() {
            return ClearOutcome {
                success: true, cart: cart.clone(), cleared_line_count: 0, cleared_variants: Vec::new(),
                errors: Vec::new(), summary: Some(CartSummary::from_lines(cart.id(), &[])),
            };
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return ClearOutcome::failed(cart.clone(), self.errors_for(Operation::Clear, &e.into())),
        };
        let (fresh, cleared_variants) = match self.clear_in(&mut tx, cart.id()).await {
            Ok(cleared) => cleared,
            Err(err) => {
                rollback(tx).await;
                return ClearOutcome::failed(cart.clone(), self.errors_for(Operation::Clear, &err));
            }
        };
        if let Err(e) = tx.commit().await {
            return ClearOutcome::failed(cart.clone(), self.errors_for(Operation::Clear, &e.into()));
        }
        info!(cart_id = %fresh.id(), cleared = cleared_variants.len(), "cart cleared");
        let summary = summarize(&self.store, &fresh).await;
        ClearOutcome {
            success: true, cart: fresh, cleared_line_count: cleared_variants.len(), cleared_variants,
            errors: Vec::new(), summary,
        }
    }

    async fn add_item_in(
        &self, tx: &mut S::Tx, cart_id: Uuid, variant_id: Uuid, quantity: i32, slot: &mut Option<Cart>,
    ) -> Result<Option<CartLineItem>, CartError> {
        *slot = Some(ops::active_cart(tx, cart_id).await?);
        let variant = ops::variant(tx, variant_id).await?;
        ops::add_to_cart(tx, &self.policy, cart_id, &variant, quantity).await.map(Some)
    }

    async fn adjust(&self, line: &CartLineItem, adjustment: Adjustment) -> ItemOutcome {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return ItemOutcome::failed(None, self.errors_for(Operation::UpdateItem, &e.into())),
        };
        let mut slot = None;
        let result = self.adjust_in(&mut tx, line.id(), adjustment, &mut slot).await;
        self.finish(tx, Operation::UpdateItem, slot, result).await
    }

    async fn adjust_in(
        &self, tx: &mut S::Tx, line_id: Uuid, adjustment: Adjustment, slot: &mut Option<Cart>,
    ) -> Result<Option<CartLineItem>, CartError> {
        // Re-read so the change applies to the committed quantity, not the caller's copy.
        let line = ops::line(tx, line_id).await?;
        *slot = Some(ops::active_cart(tx, line.cart_id()).await?);
        let variant = ops::variant(tx, line.variant_id()).await?;
        match adjustment {
            Adjustment::Set(target) => ops::set_quantity(tx, &self.policy, &line, &variant, target).await,
            Adjustment::Step(step) => {
                ops::set_quantity(tx, &self.policy, &line, &variant, line.quantity().saturating_add(step)).await
            }
            Adjustment::AddMore(extra) => ops::add_more(tx, &self.policy, &line, &variant, extra).await.map(Some),
        }
    }

    async fn clear_in(&self, tx: &mut S::Tx, cart_id: Uuid) -> Result<(Cart, Vec<Uuid>), CartError> {
        let cart = ops::active_cart(tx, cart_id).await?;
        let lines = tx.lines(cart_id).await?;
        let variants: Vec<Uuid> = lines.iter().map(CartLineItem::variant_id).collect();
        for line in &lines {
            match tx.variant(line.variant_id()).await? {
                Some(variant) => { ops::set_quantity(tx, &self.policy, line, &variant, 0).await?; }
                // discontinued variant: nothing to validate a removal against
                None => tx.delete_line(line.id()).await?,
            }
        }
        Ok((cart, variants))
    }

    async fn finish(
        &self, tx: S::Tx, operation: Operation, cart: Option<Cart>, result: Result<Option<CartLineItem>, CartError>,
    ) -> ItemOutcome {
        let line = match result {
            Ok(line) => line,
            Err(err) => {
                rollback(tx).await;
                return ItemOutcome::failed(cart, self.errors_for(operation, &err));
            }
        };
        if let Err(e) = tx.commit().await {
            return ItemOutcome::failed(cart, self.errors_for(operation, &e.into()));
        }
        info!(%operation, line_id = ?line.as_ref().map(CartLineItem::id), quantity = ?line.as_ref().map(CartLineItem::quantity), "cart line updated");
        let summary = match &cart {
            Some(c) => summarize(&self.store, c).await,
            None => None,
        };
        ItemOutcome { success: true, cart, line, errors: Vec::new(), summary }
    }
}
