//! In-process notification channel.

pub mod hub;

pub use hub::EventHub;
