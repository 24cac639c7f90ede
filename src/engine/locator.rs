//! Finds the active cart for a signed-in customer or an anonymous session.

use std::fmt;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{Cart, SessionToken};
use crate::store::{CartStore, CartTransaction, StoreError, StoreResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartIdentity {
    User(Uuid),
    Session(SessionToken),
}

impl fmt::Display for CartIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(token) => write!(f, "session:{token}"),
        }
    }
}

#[derive(Debug)]
pub struct CartLocator<'a, S> { store: &'a S }

impl<'a, S: CartStore> CartLocator<'a, S> {
    pub fn new(store: &'a S) -> Self { Self { store } }

    pub async fn find(&self, identity: &CartIdentity) -> StoreResult<Option<Cart>> {
        match identity {
            CartIdentity::User(owner_id) => self.store.active_cart_for_owner(*owner_id).await,
            CartIdentity::Session(token) => self.store.active_cart_for_token(token).await,
        }
    }

    /// Returns the active cart, creating one when none exists. Losing a
    /// creation race to a concurrent request yields the winner's cart.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn find_or_create(&self, identity: &CartIdentity) -> StoreResult<Cart> {
        if let Some(cart) = self.find(identity).await? {
            return Ok(cart);
        }

        let cart = match identity {
            CartIdentity::User(owner_id) => Cart::for_customer(*owner_id, SessionToken::generate()),
            CartIdentity::Session(token) => Cart::for_session(token.clone()),
        };
        match self.insert(&cart).await {
            Ok(()) => {
                info!(cart_id = %cart.id(), "cart created");
                Ok(cart)
            }
            Err(e) if e.is_unique_violation() => {
                debug!(error = %e, "cart created concurrently; re-reading");
                self.find(identity).await?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut tx = self.store.begin().await?;
        if let Err(e) = tx.insert_cart(cart).await {
            super::rollback(tx).await;
            return Err(e);
        }
        tx.commit().await
    }
}
