//! AWS adapters.

pub mod s3;
