//! Ports - Trait definitions for everything outside the core.

pub mod capture;
pub mod clock;
pub mod container;
pub mod notify;
pub mod storage;
pub mod store;
