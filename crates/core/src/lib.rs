//! Agroshop Core - Shared domain types and pricing.
//!
//! This crate provides the types used by every Agroshop client component:
//! - `storefront` - Cart, checkout and order-status client library
//! - `cli` - Command-line front end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. Everything here is deterministic and can be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, statuses, roles and phone numbers
//! - [`cart`] - Cart, product and client-local selection types
//! - [`order`] - Orders, order items and checkout requests
//! - [`pricing`] - Subtotal, tax, shipping and total computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartItem, Product, Selection};
pub use order::{CheckoutOutcome, CheckoutRequest, Order, OrderItem, OrderRef};
pub use pricing::CartTotals;
pub use types::*;
