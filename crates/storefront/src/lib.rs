//! Agroshop Storefront client library.
//!
//! Cart, checkout and order-status tracking against the Agroshop REST API.
//! Front ends drive the stores through async commands and render from the
//! immutable snapshots they publish.
//!
//! # Modules
//!
//! - [`api`] - HTTP transport, session tokens and the shared refresh
//! - [`cart`] - `CartStore` with client-local selection
//! - [`checkout`] - `CheckoutInitiator` state machine
//! - [`orders`] - `OrderStatusTracker` for customers and vendors
//! - [`inflight`] - Per-entity busy tracking
//! - [`state`] - `Storefront`, the assembled client stack

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inflight;
pub mod orders;
pub mod state;

pub use state::Storefront;
