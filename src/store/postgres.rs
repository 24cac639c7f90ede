//! PostgreSQL cart store.
//!
//! Uniqueness lives in the schema (see `migrations/`): a unique key on
//! `(cart_id, variant_id)` and partial unique indexes on active carts. Variants
//! are read from the catalog's `product_variants` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::domain::{Cart, CartLineItem, CartStatus, InventoryPolicy, Money, SessionToken, StockBearingVariant};
use crate::store::{CartStore, CartTransaction, StoreError, StoreResult};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    owner_id: Option<Uuid>,
    session_token: String,
    status: String,
    abandoned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = StoreError;

    fn try_from(row: CartRow) -> StoreResult<Self> {
        let session_token = SessionToken::parse(row.session_token)
            .map_err(|e| StoreError::Corrupt { entity: "cart", reason: e.to_string() })?;
        let status = match (row.status.as_str(), row.abandoned_at) {
            ("active", _) => CartStatus::Active,
            ("abandoned", Some(at)) => CartStatus::Abandoned { at },
            (other, _) => {
                return Err(StoreError::Corrupt { entity: "cart", reason: format!("status {other} for cart {}", row.id) })
            }
        };
        Ok(Cart {
            id: row.id, owner_id: row.owner_id, session_token, status,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    cart_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
    price_amount: Decimal,
    price_currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LineRow> for CartLineItem {
    fn from(row: LineRow) -> Self {
        CartLineItem {
            id: row.id, cart_id: row.cart_id, variant_id: row.variant_id, quantity: row.quantity,
            unit_price: Money::new(row.price_amount, &row.price_currency),
            created_at: row.created_at, updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    title: String,
    price_amount: Decimal,
    currency: String,
    inventory_quantity: i32,
    track_inventory: bool,
    inventory_policy: String,
}

impl TryFrom<VariantRow> for StockBearingVariant {
    type Error = StoreError;

    fn try_from(row: VariantRow) -> StoreResult<Self> {
        Ok(StockBearingVariant {
            id: row.id, title: row.title,
            price: Money::new(row.price_amount, &row.currency),
            available: row.inventory_quantity,
            tracks_inventory: row.track_inventory,
            inventory_policy: parse_inventory_policy(&row.inventory_policy)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineVariantRow {
    id: Uuid,
    cart_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
    price_amount: Decimal,
    price_currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    // NULL when the variant has left the catalog
    variant_title: Option<String>,
    variant_price_amount: Option<Decimal>,
    variant_currency: Option<String>,
    inventory_quantity: Option<i32>,
    track_inventory: Option<bool>,
    inventory_policy: Option<String>,
}

impl LineVariantRow {
    fn into_parts(self) -> StoreResult<(CartLineItem, Option<StockBearingVariant>)> {
        let variant = match (
            self.variant_title, self.variant_price_amount, self.variant_currency,
            self.inventory_quantity, self.track_inventory, self.inventory_policy,
        ) {
            (Some(title), Some(amount), Some(currency), Some(available), Some(tracks_inventory), Some(policy)) => {
                Some(StockBearingVariant {
                    id: self.variant_id, title,
                    price: Money::new(amount, &currency),
                    available, tracks_inventory,
                    inventory_policy: parse_inventory_policy(&policy)?,
                })
            }
            _ => None,
        };
        let line = CartLineItem {
            id: self.id, cart_id: self.cart_id, variant_id: self.variant_id, quantity: self.quantity,
            unit_price: Money::new(self.price_amount, &self.price_currency),
            created_at: self.created_at, updated_at: self.updated_at,
        };
        Ok((line, variant))
    }
}

fn parse_inventory_policy(value: &str) -> StoreResult<InventoryPolicy> {
    match value {
        "deny" => Ok(InventoryPolicy::Deny),
        "continue" => Ok(InventoryPolicy::Continue),
        other => Err(StoreError::Corrupt { entity: "variant", reason: format!("inventory policy {other}") }),
    }
}

fn expect_affected(rows: u64, entity: &'static str, id: Uuid) -> StoreResult<()> {
    if rows == 0 { Err(StoreError::NotFound { entity, id }) } else { Ok(()) }
}

#[derive(Clone, Debug)]
pub struct PgCartStore { pool: PgPool }

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("cart migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

#[async_trait]
impl CartStore for PgCartStore {
    type Tx = PgCartTransaction;

    async fn begin(&self) -> StoreResult<PgCartTransaction> {
        Ok(PgCartTransaction { tx: self.pool.begin().await? })
    }

    async fn active_cart_for_owner(&self, owner_id: Uuid) -> StoreResult<Option<Cart>> {
        sqlx::query_as::<_, CartRow>("SELECT id, owner_id, session_token, status, abandoned_at, created_at, updated_at FROM carts WHERE owner_id = $1 AND status = 'active'")
            .bind(owner_id).fetch_optional(&self.pool).await?.map(Cart::try_from).transpose()
    }

    async fn active_cart_for_token(&self, token: &SessionToken) -> StoreResult<Option<Cart>> {
        sqlx::query_as::<_, CartRow>("SELECT id, owner_id, session_token, status, abandoned_at, created_at, updated_at FROM carts WHERE session_token = $1 AND status = 'active'")
            .bind(token.as_str()).fetch_optional(&self.pool).await?.map(Cart::try_from).transpose()
    }

    async fn lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>> {
        let rows = sqlx::query_as::<_, LineRow>("SELECT id, cart_id, variant_id, quantity, price_amount, price_currency, created_at, updated_at FROM cart_line_items WHERE cart_id = $1 ORDER BY created_at, id")
            .bind(cart_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(CartLineItem::from).collect())
    }
}

pub struct PgCartTransaction { tx: Transaction<'static, Postgres> }

#[async_trait]
impl CartTransaction for PgCartTransaction {
    async fn cart(&mut self, id: Uuid) -> StoreResult<Option<Cart>> {
        sqlx::query_as::<_, CartRow>("SELECT id, owner_id, session_token, status, abandoned_at, created_at, updated_at FROM carts WHERE id = $1")
            .bind(id).fetch_optional(&mut *self.tx).await?.map(Cart::try_from).transpose()
    }

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        sqlx::query("INSERT INTO carts (id, owner_id, session_token, status, abandoned_at, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(cart.id).bind(cart.owner_id).bind(cart.session_token.as_str()).bind(cart.status.as_str())
            .bind(cart.abandoned_at()).bind(cart.created_at).bind(cart.updated_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn mark_abandoned(&mut self, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let done = sqlx::query("UPDATE carts SET status = 'abandoned', abandoned_at = COALESCE(abandoned_at, $2), updated_at = $2 WHERE id = $1")
            .bind(cart_id).bind(at).execute(&mut *self.tx).await?;
        expect_affected(done.rows_affected(), "cart", cart_id)
    }

    async fn variant(&mut self, id: Uuid) -> StoreResult<Option<StockBearingVariant>> {
        sqlx::query_as::<_, VariantRow>("SELECT id, title, price_amount, currency, inventory_quantity, track_inventory, inventory_policy FROM product_variants WHERE id = $1")
            .bind(id).fetch_optional(&mut *self.tx).await?.map(StockBearingVariant::try_from).transpose()
    }

    async fn line(&mut self, id: Uuid) -> StoreResult<Option<CartLineItem>> {
        let row = sqlx::query_as::<_, LineRow>("SELECT id, cart_id, variant_id, quantity, price_amount, price_currency, created_at, updated_at FROM cart_line_items WHERE id = $1")
            .bind(id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(CartLineItem::from))
    }

    async fn line_for_variant(&mut self, cart_id: Uuid, variant_id: Uuid) -> StoreResult<Option<CartLineItem>> {
        let row = sqlx::query_as::<_, LineRow>("SELECT id, cart_id, variant_id, quantity, price_amount, price_currency, created_at, updated_at FROM cart_line_items WHERE cart_id = $1 AND variant_id = $2")
            .bind(cart_id).bind(variant_id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(CartLineItem::from))
    }

    async fn lines(&mut self, cart_id: Uuid) -> StoreResult<Vec<CartLineItem>> {
        let rows = sqlx::query_as::<_, LineRow>("SELECT id, cart_id, variant_id, quantity, price_amount, price_currency, created_at, updated_at FROM cart_line_items WHERE cart_id = $1 ORDER BY created_at, id")
            .bind(cart_id).fetch_all(&mut *self.tx).await?;
        Ok(rows.into_iter().map(CartLineItem::from).collect())
    }

    async fn lines_with_variants(&mut self, cart_id: Uuid) -> StoreResult<Vec<(CartLineItem, Option<StockBearingVariant>)>> {
        let rows = sqlx::query_as::<_, LineVariantRow>(
            "SELECT l.id, l.cart_id, l.variant_id, l.quantity, l.price_amount, l.price_currency, l.created_at, l.updated_at, \
             v.title AS variant_title, v.price_amount AS variant_price_amount, v.currency AS variant_currency, \
             v.inventory_quantity, v.track_inventory, v.inventory_policy \
             FROM cart_line_items l LEFT JOIN product_variants v ON v.id = l.variant_id \
             WHERE l.cart_id = $1 ORDER BY l.created_at, l.id")
            .bind(cart_id).fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(LineVariantRow::into_parts).collect()
    }

    async fn insert_line(&mut self, line: &CartLineItem) -> StoreResult<()> {
        sqlx::query("INSERT INTO cart_line_items (id, cart_id, variant_id, quantity, price_amount, price_currency, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(line.id).bind(line.cart_id).bind(line.variant_id).bind(line.quantity)
            .bind(line.unit_price.amount()).bind(line.unit_price.currency())
            .bind(line.created_at).bind(line.updated_at)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn update_quantity(&mut self, line_id: Uuid, quantity: i32, at: DateTime<Utc>) -> StoreResult<()> {
        let done = sqlx::query("UPDATE cart_line_items SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(line_id).bind(quantity).bind(at).execute(&mut *self.tx).await?;
        expect_affected(done.rows_affected(), "line item", line_id)
    }

    async fn delete_line(&mut self, line_id: Uuid) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM cart_line_items WHERE id = $1").bind(line_id).execute(&mut *self.tx).await?;
        expect_affected(done.rows_affected(), "line item", line_id)
    }

    async fn move_line(&mut self, line_id: Uuid, cart_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let done = sqlx::query("UPDATE cart_line_items SET cart_id = $2, updated_at = $3 WHERE id = $1")
            .bind(line_id).bind(cart_id).bind(at).execute(&mut *self.tx).await?;
        expect_affected(done.rows_affected(), "line item", line_id)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
