//! Persistence seam for carts and line items.
//!
//! Every engine mutation runs inside one [`CartTransaction`]. The store, not
//! the engine, owns the uniqueness rules: one line per (cart, variant) and one
//! active cart per owner or session token. Violations come back as
//! [`StoreError::UniqueViolation`] so engines can turn a double-submit race
//! into a retry message.
//!
//! Implementations:
//! - [`PgCartStore`]: PostgreSQL through sqlx
//! - [`MemoryCartStore`]: journaled in-memory store with fault injection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, SessionToken, StockBearingVariant};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryCartStore};
pub use postgres::PgCartStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool { matches!(self, Self::UniqueViolation { .. }) }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::UniqueViolation { constraint: db.constraint().unwrap_or("unknown").to_string() };
            }
        }
        Self::Database(e)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Constraint names shared by both backends.
pub mod constraints {
    pub const LINE_CART_VARIANT: &str = "cart_line_items_cart_id_variant_id_key";
    pub const ACTIVE_CART_OWNER: &str = "carts_active_owner_idx";
    pub const ACTIVE_CART_SESSION: &str = "carts_active_session_token_idx";
}

#[async_trait]
pub trait CartStore: Send + Sync {
    type Tx: CartTransaction;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn active_cart_for_owner(&self, owner_id: Uuid) -> StoreResult<Option<Cart>>;

    async fn active_cart_for_token(&self, token: &SessionToken) -> StoreResult<Option<Cart>>;

    /// Committed lines of a cart, oldest first.
    async fn lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>>;
}

/// Unit of work. Dropping without `commit` discards every write.
#[async_trait]
pub trait CartTransaction: Send {
    async fn cart(&mut self, id: Uuid) -> StoreResult<Option<Cart>>;

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()>;

    async fn mark_abandoned(&mut self, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn variant(&mut self, id: Uuid) -> StoreResult<Option<StockBearingVariant>>;

    async fn line(&mut self, id: Uuid) -> StoreResult<Option<CartLineItem>>;

    async fn line_for_variant(&mut self, cart_id: Uuid, variant_id: Uuid) -> StoreResult<Option<CartLineItem>>;

    async fn lines(&mut self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>>;

    /// Every line of the cart with its variant, `None` where the variant has
    /// left the catalog.
    async fn lines_with_variants(&mut self, cart_id: Uuid) -> StoreResult<Vec<(CartLineItem, Option<StockBearingVariant>)>>;

    async fn insert_line(&mut self, line: &CartLineItem) -> StoreResult<()>;

    async fn update_quantity(&mut self, line_id: Uuid, quantity: i32, at: DateTime<Utc>) -> StoreResult<()>;

    async fn delete_line(&mut self, line_id: Uuid) -> StoreResult<()>;

    async fn move_line(&mut self, line_id: Uuid, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
