//! # Swapdesk Events
//!
//! This crate defines the events published by the swap lifecycle manager each
//! time an order changes state. Subscribers (the operator alerter, a future UI
//! push channel) receive them over a `tokio::sync::broadcast` channel.
//!
//! As a Layer 0 crate, it depends only on `core-types`.

// Declare the modules that make up this crate.
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use messages::{OrderSnapshot, SwapEvent};
