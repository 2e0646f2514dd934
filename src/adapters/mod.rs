//! Adapters - Concrete implementations of ports.

#[cfg(feature = "s3")]
pub mod aws;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub mod local;
