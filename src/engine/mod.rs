//! Cart engines: reservation, merge, lookup and the summary view.

use std::fmt;

use tracing::{debug, error, warn};

use crate::domain::Cart;
use crate::store::{CartStore, CartTransaction};
use crate::CartError;

pub mod locator;
pub mod merge;
mod ops;
pub mod outcome;
pub mod reservation;
pub mod view;

pub use locator::{CartIdentity, CartLocator};
pub use merge::CartMergeEngine;
pub use outcome::{ClearOutcome, FailureMessages, ItemOutcome, MergeOutcome, SkippedLine};
pub use reservation::CartReservationEngine;
pub use view::{CartSummary, CartViewSync, LineSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    AddItem,
    UpdateItem,
    Clear,
    Merge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self { Self::AddItem => "add_item", Self::UpdateItem => "update_item", Self::Clear => "clear", Self::Merge => "merge" };
        f.write_str(name)
    }
}

/// Turns an engine error into shopper-facing text. Store failures are logged
/// in full and replaced by `fallback`.
pub(crate) fn user_errors(operation: Operation, err: &CartError, fallback: &str) -> Vec<String> {
    match err {
        CartError::Store(e) => {
            error!(%operation, error = %e, "cart operation failed in the store");
            vec![fallback.to_string()]
        }
        other => {
            debug!(%operation, reason = %other, "cart operation rejected");
            vec![other.to_string()]
        }
    }
}

pub(crate) async fn rollback<T: CartTransaction>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed; transaction dropped");
    }
}

/// Summary of committed state; a failed read only costs the caller its summary.
pub(crate) async fn summarize<S: CartStore>(store: &S, cart: &Cart) -> Option<CartSummary> {
    match CartViewSync::new(store).summarize(cart).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(cart_id = %cart.id(), error = %e, "cart summary unavailable after commit");
            None
        }
    }
}
