//! Domain layer - Pure business logic.

pub mod jobs;
pub mod media;
pub mod schedule;
