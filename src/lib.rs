//! OpenSASE Storefront
//!
//! Self-hosted storefront and back-office service.
//!
//! ## Features
//! - Product catalog management
//! - Multi-currency pricing against a base-currency rate table
//! - Promo codes scoped to products, one active promo per product
//! - Shopping cart, checkout and order lifecycle

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;

use thiserror::Error;

use domain::aggregates::{CartError, OrderError, ProductError, PromoError};
use domain::services::CurrencyError;
use domain::value_objects::SkuError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Promo code not found")]
    PromoNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient inventory")]
    InsufficientInventory,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Currency(#[from] CurrencyError),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error("{0}")]
    Product(#[from] ProductError),

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Sku(#[from] SkuError),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(err: sqlx::Error) -> Self { Self::StorageError(err.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
