//! Event bus for transcript changes.
//!
//! Provides an `EventBus` that distributes `ChatEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
