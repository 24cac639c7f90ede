//! Uniform result objects returned by every engine entry point

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, Rejection};
use crate::engine::view::CartSummary;

/// Shopper-facing text for failures the policy did not anticipate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureMessages {
    pub generic: String,
    pub add_conflict: String,
    pub clear_failed: String,
    pub merge_failed: String,
}

impl Default for FailureMessages {
    fn default() -> Self {
        Self {
            generic: "Something went wrong, please try again".to_string(),
            add_conflict: "We couldn't add this item, please try again".to_string(),
            clear_failed: "We couldn't clear your cart, please try again".to_string(),
            merge_failed: "We couldn't merge your cart items, please try again".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ItemOutcome {
    pub success: bool,
    pub cart: Option<Cart>,
    /// The affected line; `None` when it was removed or nothing changed.
    pub line: Option<CartLineItem>,
    pub errors: Vec<String>,
    pub summary: Option<CartSummary>,
}

impl ItemOutcome {
    pub(crate) fn failed(cart: Option<Cart>, errors: Vec<String>) -> Self {
        Self { success: false, cart, line: None, errors, summary: None }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ClearOutcome {
    pub success: bool,
    pub cart: Cart,
    pub cleared_line_count: usize,
    pub cleared_variants: Vec<Uuid>,
    pub errors: Vec<String>,
    pub summary: Option<CartSummary>,
}

impl ClearOutcome {
    pub(crate) fn failed(cart: Cart, errors: Vec<String>) -> Self {
        Self { success: false, cart, cleared_line_count: 0, cleared_variants: Vec::new(), errors, summary: None }
    }
}

/// A guest line the user cart could not absorb; it stays on the retired guest cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reason: Rejection,
}

#[derive(Clone, Debug, Serialize)]
pub struct MergeOutcome {
    pub success: bool,
    pub cart: Option<Cart>,
    pub merged_line_count: usize,
    pub skipped: Vec<SkippedLine>,
    pub errors: Vec<String>,
    pub summary: Option<CartSummary>,
}

impl MergeOutcome {
    pub(crate) fn nothing_to_merge(cart: Option<Cart>) -> Self {
        Self { success: true, cart, merged_line_count: 0, skipped: Vec::new(), errors: Vec::new(), summary: None }
    }

    pub(crate) fn failed(cart: Option<Cart>, errors: Vec<String>) -> Self {
        Self { success: false, cart, merged_line_count: 0, skipped: Vec::new(), errors, summary: None }
    }
}
