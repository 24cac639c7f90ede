//! Guest-to-customer cart merge at login.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domain::{Cart, QuantityPolicy, Rejection, StockPolicy};
use crate::engine::outcome::{FailureMessages, MergeOutcome, SkippedLine};
use crate::engine::{ops, rollback, summarize, user_errors, Operation};
use crate::store::{CartStore, CartTransaction};
use crate::CartError;

struct Merged {
    user_cart: Cart,
    count: usize,
    skipped: Vec<SkippedLine>,
}

#[derive(Debug)]
pub struct CartMergeEngine<S, P = StockPolicy> {
    store: S,
    policy: P,
    messages: FailureMessages,
}

impl<S: CartStore> CartMergeEngine<S> {
    pub fn new(store: S) -> Self { Self::with_policy(store, StockPolicy::default()) }
}

impl<S: CartStore, P: QuantityPolicy> CartMergeEngine<S, P> {
    pub fn with_policy(store: S, policy: P) -> Self {
        Self { store, policy, messages: FailureMessages::default() }
    }

    pub fn with_messages(mut self, messages: FailureMessages) -> Self { self.messages = messages; self }

    pub fn store(&self) -> &S { &self.store }
    pub fn policy(&self) -> &P { &self.policy }

    /// Moves the guest cart's lines into the user cart and retires the guest cart.
    ///
    /// Colliding variants are added onto the user's line. Lines the policy
    /// refuses, and lines whose variant is gone from the catalog, stay behind
    /// on the abandoned guest cart and are reported in `skipped`. A store failure undoes the whole merge.
    #[instrument(skip_all, fields(user_cart = ?user_cart.map(Cart::id), guest_cart = ?guest_cart.map(Cart::id)))]
    pub async fn merge(&self, user_cart: Option<&Cart>, guest_cart: Option<&Cart>) -> MergeOutcome {
        let (user_cart, guest_cart) = match (user_cart, guest_cart) {
            (Some(u), Some(g)) if u.id() != g.id() => (u, g),
            (user_cart, _) => return MergeOutcome::nothing_to_merge(user_cart.cloned()),
        };
        match self.store.lines(guest_cart.id()).await {
            Ok(lines) if lines.is_empty() => return MergeOutcome::nothing_to_merge(Some(user_cart.clone())),
            Ok(_) => {}
            Err(e) => return self.failed(user_cart, e.into()),
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return self.failed(user_cart, e.into()),
        };
        let merged = match self.merge_in(&mut tx, user_cart, guest_cart).await {
            Ok(merged) => merged,
            Err(err) => {
                rollback(tx).await;
                return self.failed(user_cart, err);
            }
        };
        if let Err(e) = tx.commit().await {
            return self.failed(user_cart, e.into());
        }

        info!(merged = merged.count, skipped = merged.skipped.len(), "guest cart merged");
        let summary = summarize(&self.store, &merged.user_cart).await;
        MergeOutcome {
            success: true, cart: Some(merged.user_cart), merged_line_count: merged.count,
            skipped: merged.skipped, errors: Vec::new(), summary,
        }
    }

    fn failed(&self, user_cart: &Cart, err: CartError) -> MergeOutcome {
        MergeOutcome::failed(Some(user_cart.clone()), user_errors(Operation::Merge, &err, &self.messages.merge_failed))
    }

    async fn merge_in(&self, tx: &mut S::Tx, user_cart: &Cart, guest_cart: &Cart) -> Result<Merged, CartError> {
        let user_cart = ops::active_cart(tx, user_cart.id()).await?;
        let guest_cart = tx.cart(guest_cart.id()).await?.ok_or(CartError::CartRequired)?;
        let mut merged = Merged { user_cart, count: 0, skipped: Vec::new() };

        for (guest_line, variant) in tx.lines_with_variants(guest_cart.id()).await? {
            let Some(variant) = variant else {
                warn!(line_id = %guest_line.id(), variant_id = %guest_line.variant_id(), "guest line has no catalog variant");
                merged.skipped.push(SkippedLine {
                    line_id: guest_line.id(), variant_id: guest_line.variant_id(), quantity: guest_line.quantity(),
                    reason: Rejection::Unavailable,
                });
                continue;
            };
            match tx.line_for_variant(merged.user_cart.id(), variant.id).await? {
                Some(existing) => match ops::add_more(tx, &self.policy, &existing, &variant, guest_line.quantity()).await {
                    Ok(_) => {
                        tx.delete_line(guest_line.id()).await?;
                        merged.count += 1;
                    }
                    Err(CartError::Rejected(reason)) => {
                        warn!(line_id = %guest_line.id(), variant_id = %variant.id, %reason, "guest line left behind");
                        merged.skipped.push(SkippedLine {
                            line_id: guest_line.id(), variant_id: variant.id, quantity: guest_line.quantity(), reason,
                        });
                    }
                    Err(err) => return Err(err),
                },
                None => {
                    tx.move_line(guest_line.id(), merged.user_cart.id(), Utc::now()).await?;
                    merged.count += 1;
                }
            }
        }

        tx.mark_abandoned(guest_cart.id(), Utc::now()).await?;
        Ok(merged)
    }
}
