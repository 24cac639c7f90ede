//! Process configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use validator::Validate;

use crate::domain::policy::DEFAULT_MAX_LINE_QUANTITY;
use crate::domain::StockPolicy;
use crate::engine::{CartMergeEngine, CartReservationEngine, FailureMessages};
use crate::schedule::DeliveryConfiguration;
use crate::store::CartStore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("cannot parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// Knobs for the cart engines. Build engines through it so the configured
/// ceiling and messages are the ones in effect.
#[derive(Clone, Debug, Validate)]
pub struct CartConfig {
    #[validate(range(min = 1, max = 9999))]
    pub max_line_quantity: i32,
    pub messages: FailureMessages,
}

impl Default for CartConfig {
    fn default() -> Self { Self { max_line_quantity: DEFAULT_MAX_LINE_QUANTITY, messages: FailureMessages::default() } }
}

impl CartConfig {
    pub fn policy(&self) -> StockPolicy { StockPolicy::new(self.max_line_quantity) }

    pub fn reservation_engine<S: CartStore>(&self, store: S) -> CartReservationEngine<S> {
        CartReservationEngine::with_policy(store, self.policy()).with_messages(self.messages.clone())
    }

    pub fn merge_engine<S: CartStore>(&self, store: S) -> CartMergeEngine<S> {
        CartMergeEngine::with_policy(store, self.policy()).with_messages(self.messages.clone())
    }
}

#[derive(Clone, Debug, Validate)]
pub struct AppConfig {
    /// Only commands that touch the database need it.
    #[validate(length(min = 1))]
    pub database_url: Option<String>,
    #[validate(range(min = 1, max = 200))]
    pub database_max_connections: u32,
    #[validate]
    pub cart: CartConfig,
    #[validate]
    pub delivery: DeliveryConfiguration,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL");
        let database_max_connections = parsed(&lookup, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(10);
        let max_line_quantity = parsed(&lookup, "CART_MAX_LINE_QUANTITY")?.unwrap_or(DEFAULT_MAX_LINE_QUANTITY);
        let messages = match lookup("CART_MESSAGES_PATH") {
            Some(path) => read_json(Path::new(&path))?,
            None => FailureMessages::default(),
        };
        let delivery = match lookup("DELIVERY_CONFIG_PATH") {
            Some(path) => DeliveryConfiguration::from_json_file(path)?,
            None => DeliveryConfiguration::default(),
        };

        let config = Self {
            database_url,
            database_max_connections,
            cart: CartConfig { max_line_quantity, messages },
            delivery,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use crate::domain::{Cart, CartLineItem, Money, SessionToken, StockBearingVariant};
    use crate::store::{FailPoint, MemoryCartStore, StoreError};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/cart")])).unwrap();
        assert_eq!(config.cart.messages, FailureMessages::default());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.cart.max_line_quantity, 99);
        assert_eq!(config.cart.policy(), StockPolicy::default());
    }

    #[test]
    fn test_database_url_only_required_on_demand() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, None);
        assert!(matches!(config.require_database_url(), Err(ConfigError::Missing("DATABASE_URL"))));

        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/cart")])).unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/cart");

        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("CART_MAX_LINE_QUANTITY", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CART_MAX_LINE_QUANTITY", .. }));

        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("CART_MAX_LINE_QUANTITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_delivery_file() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("DELIVERY_CONFIG_PATH", "/nonexistent/delivery.json")])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    fn scratch_file(contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("opensase-cart-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_messages_file_overrides_some_texts() {
        let path = scratch_file(r#"{ "merge_failed": "Votre panier n'a pas pu être fusionné" }"#);
        let config = AppConfig::from_lookup(lookup(&[("CART_MESSAGES_PATH", path.to_str().unwrap())])).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.cart.messages.merge_failed, "Votre panier n'a pas pu être fusionné");
        assert_eq!(config.cart.messages.generic, FailureMessages::default().generic);

        let path = scratch_file("not json");
        let err = AppConfig::from_lookup(lookup(&[("CART_MESSAGES_PATH", path.to_str().unwrap())])).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_engines_carry_configured_ceiling() {
        let config = AppConfig::from_lookup(lookup(&[("CART_MAX_LINE_QUANTITY", "5")])).unwrap();
        let reservation = config.cart.reservation_engine(MemoryCartStore::new());
        assert_eq!(reservation.policy().max_quantity(), 5);
        let merge = config.cart.merge_engine(MemoryCartStore::new());
        assert_eq!(merge.policy().max_quantity(), 5);
    }

    #[tokio::test]
    async fn test_merge_engine_reports_configured_message() {
        let messages = FailureMessages { merge_failed: "Basket merge failed".into(), ..FailureMessages::default() };
        let config = CartConfig { messages, ..CartConfig::default() };
        let store = MemoryCartStore::new();
        let user = Cart::for_customer(uuid::Uuid::now_v7(), SessionToken::generate());
        let guest = Cart::for_session(SessionToken::generate());
        let variant = StockBearingVariant::tracked("Tea", Money::usd(Decimal::new(4, 0)), 10);
        store.put_cart(user.clone()).await.unwrap();
        store.put_cart(guest.clone()).await.unwrap();
        store.put_variant(variant.clone()).await;
        store.put_line(CartLineItem::new(guest.id(), &variant, 1)).await.unwrap();
        store.fail_next(FailPoint::MarkAbandoned, StoreError::Injected("connection lost".into())).await;

        let outcome = config.merge_engine(store).merge(Some(&user), Some(&guest)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.errors, vec!["Basket merge failed".to_string()]);
    }
}
